use nalgebra::Vector3;

use crate::config::GuardConfig;

/// 移動量が閾値以内なら受理
pub fn guard(prev: &Vector3<f32>, candidate: &Vector3<f32>, max_delta: f32) -> bool {
    (candidate - prev).norm() <= max_delta
}

/// 1関節ぶんのジャンプ除去フィルタ
///
/// 直前に受理した生ランドマークと比較し、1フレームでの移動が大きすぎる候補を捨てる。
/// max_reject_streak > 0 なら、リジェクトがその回数続いた時点で実際に移動したとみなして再アンカーする。
#[derive(Debug, Clone)]
pub struct JumpGuard {
    max_delta: f32,
    max_reject_streak: u32,
    last_accepted: Option<Vector3<f32>>,
    reject_count: u32,
}

impl JumpGuard {
    pub fn new(max_delta: f32, max_reject_streak: u32) -> Self {
        Self {
            max_delta: max_delta.max(f32::EPSILON),
            max_reject_streak,
            last_accepted: None,
            reject_count: 0,
        }
    }

    pub fn from_config(config: &GuardConfig) -> Self {
        Self::new(config.max_delta, config.max_reject_streak)
    }

    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }

    /// 状態を変えずに判定だけ行う
    pub fn accepts(&self, candidate: &Vector3<f32>) -> bool {
        match self.last_accepted {
            Some(prev) => guard(&prev, candidate, self.max_delta) || self.streak_reached(),
            None => true,
        }
    }

    /// 判定結果を反映する。accepts と同じ候補で呼ぶこと
    pub fn record(&mut self, candidate: Vector3<f32>, accepted: bool) {
        if !accepted {
            self.reject_count += 1;
            return;
        }
        if let Some(prev) = self.last_accepted {
            if !guard(&prev, &candidate, self.max_delta) {
                tracing::debug!(
                    "jump guard reject streak reached {}, re-anchoring (jump {:.3})",
                    self.reject_count + 1,
                    (candidate - prev).norm()
                );
            }
        }
        self.reject_count = 0;
        self.last_accepted = Some(candidate);
    }

    fn streak_reached(&self) -> bool {
        self.max_reject_streak > 0 && self.reject_count + 1 >= self.max_reject_streak
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
        self.reject_count = 0;
    }
}
