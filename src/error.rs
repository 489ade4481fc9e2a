use thiserror::Error;

use crate::fusion::SourceId;
use crate::pose::FrameSchema;
use crate::rig::JointName;

/// パイプライン内で発生する回復可能なエラー
///
/// いずれもティック内で局所的に処理され、描画ループを止めない。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// フレーム内の指定インデックスにランドマークがない
    #[error("landmark {index} is missing from the frame")]
    MissingLandmark { index: usize },

    /// どのカメラもワールド座標を提供していない
    #[error("no camera source supplied world landmarks; using single-camera unprojection")]
    DegradedFusion,

    /// 関節を持たないリグからラグドールを構築しようとした
    #[error("ragdoll requested for a rig without joints")]
    EmptyRig,

    /// 射影結果が有限でない
    #[error("projection produced a non-finite position for {joint:?}")]
    InvalidProjection { joint: JointName },

    /// フレーム長がソースのスキーマと一致しない
    #[error("frame length {actual} does not match schema length {expected}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// パイプラインが扱わないスキーマのソース
    #[error("{0:?} sources are not supported by the pipeline")]
    UnsupportedSchema(FrameSchema),

    /// 登録されていないカメラソース
    #[error("unknown camera source {0:?}")]
    UnknownSource(SourceId),
}
