use nalgebra::Vector3;

use super::support::RootTarget;
use crate::config::RootConfig;

/// アバターのルート（キネマティック剛体）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicBody {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
}

impl KinematicBody {
    pub fn new(position: Vector3<f32>) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
        }
    }
}

/// ルートの速度・高さを制限し、目標へ寄せる
#[derive(Debug, Clone)]
pub struct RootStabilizer {
    max_velocity: f32,
    min_y: f32,
    max_y: f32,
}

impl RootStabilizer {
    pub fn new(max_velocity: f32, min_y: f32, max_y: f32) -> Self {
        Self {
            max_velocity: max_velocity.max(0.0),
            min_y: min_y.min(max_y),
            max_y: max_y.max(min_y),
        }
    }

    pub fn from_config(config: &RootConfig) -> Self {
        Self::new(config.max_velocity, config.min_y, config.max_y)
    }

    /// 1. 速度を軸ごとに ±max_velocity へ
    /// 2. 高さを [min_y, max_y] へ
    /// 3. 目標があれば smoothing で寄せ、速度をゼロにする
    pub fn stabilize(&self, body: &mut KinematicBody, target: Option<&RootTarget>) {
        let v = self.max_velocity;
        body.velocity = body.velocity.map(|c| c.clamp(-v, v));
        body.position.y = body.position.y.clamp(self.min_y, self.max_y);

        if let Some(target) = target {
            let s = target.smoothing.clamp(0.0, 1.0);
            body.position = body.position * (1.0 - s) + target.position * s;
            body.velocity = Vector3::zeros();
        }
    }
}

impl Default for RootStabilizer {
    fn default() -> Self {
        Self::from_config(&RootConfig::default())
    }
}
