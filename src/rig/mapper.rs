use std::array;

use super::joint::{Joint, JointName, JointSource, Rig, SmoothGroup};
use super::projection::Projection;
use crate::config::{Config, GuardConfig, SmoothConfig};
use crate::error::TrackingError;
use crate::pose::LandmarkFrame;
use crate::tracker::{JumpGuard, Smoother};

/// 入力フレームの座標系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// ワールド座標（メートル）
    World,
    /// 正規化画像座標
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingLandmark,
    JumpRejected,
    InvalidProjection,
}

/// 1関節ぶんの更新結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointUpdate {
    Applied,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapReport {
    pub applied: usize,
    pub skipped: Vec<(JointName, SkipReason)>,
    /// 入力が無く全関節を非表示にした
    pub hidden: bool,
}

#[derive(Debug, Clone)]
struct JointFilter {
    guard: Option<JumpGuard>,
    smoother: Smoother,
}

/// ランドマークフレームをリグの関節位置に写す
///
/// 関節ごとにジャンプガード（脚のみ）とEMA平滑化の状態を持つ。
#[derive(Debug, Clone)]
pub struct JointMapper {
    filters: [JointFilter; JointName::COUNT],
    depth_scale: f32,
    head_bias: f32,
    kind: Option<FrameKind>,
}

impl JointMapper {
    pub fn new(smooth: &SmoothConfig, guard: &GuardConfig, depth_scale: f32, head_bias: f32) -> Self {
        let filters = array::from_fn(|i| {
            let name = JointName::ALL[i];
            JointFilter {
                guard: name.is_guarded().then(|| JumpGuard::from_config(guard)),
                smoother: Smoother::new(group_alpha(smooth, name.spec().group)),
            }
        });
        Self {
            filters,
            depth_scale,
            head_bias,
            kind: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.smooth,
            &config.guard,
            config.projection.depth_scale,
            config.rig.head_bias,
        )
    }

    pub fn depth_scale(&self) -> f32 {
        self.depth_scale
    }

    /// フレーム全体を写す。フレームが無い・空ならリグ全体を非表示にする
    pub fn map_frame(
        &mut self,
        frame: Option<&LandmarkFrame>,
        kind: FrameKind,
        projection: &dyn Projection,
        rig: &mut Rig,
    ) -> MapReport {
        let frame = match frame {
            Some(f) if !f.has_no_landmarks() => f,
            _ => {
                rig.hide_all();
                return MapReport {
                    hidden: true,
                    ..MapReport::default()
                };
            }
        };

        // 座標系が切り替わったらガードの基準は使えない
        if self.kind != Some(kind) {
            if self.kind.is_some() {
                tracing::debug!("landmark frame kind changed to {:?}, resetting jump guards", kind);
            }
            self.reset_guards();
            self.kind = Some(kind);
        }

        rig.set_tracked(true);
        let mut report = MapReport::default();
        for joint in rig.iter_mut() {
            match self.update_joint(joint, frame, projection) {
                JointUpdate::Applied => report.applied += 1,
                JointUpdate::Skipped(reason) => report.skipped.push((joint.name(), reason)),
            }
        }
        report
    }

    /// 全関節共通の更新処理
    ///
    /// 解決 → ガード判定 → 射影 → 有限チェック → ガード確定 → 平滑化 → 格納。
    /// スキップ時は位置・表示状態とも変更しない。射影が不正ならガードの基準も動かさない
    pub fn update_joint(
        &mut self,
        joint: &mut Joint,
        frame: &LandmarkFrame,
        projection: &dyn Projection,
    ) -> JointUpdate {
        let name = joint.name();
        let spec = name.spec();
        let raw = match spec.source.resolve(frame) {
            Ok(raw) => raw,
            Err(_) => return JointUpdate::Skipped(SkipReason::MissingLandmark),
        };

        let candidate = raw.coords();
        let filter = &mut self.filters[name.index()];
        if let Some(guard) = filter.guard.as_mut() {
            if !guard.accepts(&candidate) {
                guard.record(candidate, false);
                return JointUpdate::Skipped(SkipReason::JumpRejected);
            }
        }

        let mut position = projection.project(raw.x, raw.y, raw.z, self.depth_scale);
        if let JointSource::Above(_) = spec.source {
            position.y += self.head_bias;
        }
        if !position.iter().all(|v| v.is_finite()) {
            tracing::warn!("{}", TrackingError::InvalidProjection { joint: name });
            return JointUpdate::Skipped(SkipReason::InvalidProjection);
        }
        if let Some(guard) = filter.guard.as_mut() {
            guard.record(candidate, true);
        }

        joint.position = filter.smoother.apply(position);
        joint.visible = true;
        JointUpdate::Applied
    }

    fn reset_guards(&mut self) {
        for filter in &mut self.filters {
            if let Some(guard) = filter.guard.as_mut() {
                guard.reset();
            }
        }
    }

    /// ガードと平滑化の状態を全て破棄する
    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.smoother.reset();
        }
        self.reset_guards();
        self.kind = None;
    }
}

fn group_alpha(config: &SmoothConfig, group: SmoothGroup) -> f32 {
    match group {
        SmoothGroup::Extremity => config.extremity,
        SmoothGroup::Body => config.body,
        SmoothGroup::Face => config.face,
        SmoothGroup::LowerLimb => config.lower_limb,
    }
}
