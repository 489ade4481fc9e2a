use nalgebra::Vector3;

use crate::config::RootConfig;
use crate::pose::{Landmark, LandmarkFrame, PoseLandmark};
use crate::rig::{JointSource, Projection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportLeg {
    Left,
    Right,
}

/// ランドマークのY軸の向き
///
/// Up: ワールド座標（Y上向き）。yが小さいほど低い
/// Down: 正規化画像座標（Y下向き）。yが大きいほど低い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerticalAxis {
    #[default]
    Up,
    Down,
}

/// 低い方の足首を接地脚とみなす
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportLegDetector {
    axis: VerticalAxis,
}

impl SupportLegDetector {
    pub fn new(axis: VerticalAxis) -> Self {
        Self { axis }
    }

    pub fn axis(&self) -> VerticalAxis {
        self.axis
    }

    /// 両足首が揃っていなければ None。同じ高さなら右
    pub fn detect(&self, frame: &LandmarkFrame) -> Option<SupportLeg> {
        let left = frame.pose(PoseLandmark::LeftAnkle)?;
        let right = frame.pose(PoseLandmark::RightAnkle)?;
        let left_lower = match self.axis {
            VerticalAxis::Up => left.y < right.y,
            VerticalAxis::Down => left.y > right.y,
        };
        Some(if left_lower { SupportLeg::Left } else { SupportLeg::Right })
    }
}

/// ルート追従の基準点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootAnchor {
    LeftFoot,
    RightFoot,
    Pelvis,
    Nose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootTarget {
    pub position: Vector3<f32>,
    /// 0.0〜1.0。1.0で即座に追従
    pub smoothing: f32,
    pub anchor: RootAnchor,
}

/// ルートの追従目標を決める
///
/// 接地脚があればその足首、なければ腰中心（最後の手段として鼻）。
/// 射影結果が有限でなければ None
pub fn root_target(
    frame: &LandmarkFrame,
    support: Option<SupportLeg>,
    projection: &dyn Projection,
    depth_scale: f32,
    config: &RootConfig,
) -> Option<RootTarget> {
    let (landmark, smoothing, anchor) = match support {
        Some(SupportLeg::Left) => (
            *frame.pose(PoseLandmark::LeftAnkle)?,
            config.support_smoothing,
            RootAnchor::LeftFoot,
        ),
        Some(SupportLeg::Right) => (
            *frame.pose(PoseLandmark::RightAnkle)?,
            config.support_smoothing,
            RootAnchor::RightFoot,
        ),
        None => pelvis_or_nose(frame, config.pelvis_smoothing)?,
    };

    let position = projection.project(landmark.x, landmark.y, landmark.z, depth_scale);
    if !position.iter().all(|v| v.is_finite()) {
        tracing::debug!("root target {:?} projected to non-finite position", anchor);
        return None;
    }
    Some(RootTarget {
        position,
        smoothing: smoothing.clamp(0.0, 1.0),
        anchor,
    })
}

fn pelvis_or_nose(frame: &LandmarkFrame, smoothing: f32) -> Option<(Landmark, f32, RootAnchor)> {
    if let Ok(hip) = JointSource::HipCenter.resolve(frame) {
        return Some((hip, smoothing, RootAnchor::Pelvis));
    }
    frame
        .pose(PoseLandmark::Nose)
        .map(|nose| (*nose, smoothing, RootAnchor::Nose))
}
