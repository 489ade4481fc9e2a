use nalgebra::{Perspective3, Point3, Vector3};

use crate::config::ProjectionConfig;

/// ランドマーク座標 → リグ空間の変換
pub trait Projection {
    fn project(&self, x: f32, y: f32, z: f32, depth_scale: f32) -> Vector3<f32>;
}

impl<F> Projection for F
where
    F: Fn(f32, f32, f32, f32) -> Vector3<f32>,
{
    fn project(&self, x: f32, y: f32, z: f32, depth_scale: f32) -> Vector3<f32> {
        self(x, y, z, depth_scale)
    }
}

/// ワールドランドマーク（腰中心原点, メートル）をそのまま持ち上げる
#[derive(Debug, Clone, Copy)]
pub struct WorldProjection {
    pub eye_height: f32,
    /// false なら入力のYは下向き
    pub y_up: bool,
}

impl WorldProjection {
    pub fn new(eye_height: f32) -> Self {
        Self { eye_height, y_up: true }
    }

    pub fn from_config(config: &ProjectionConfig) -> Self {
        Self {
            eye_height: config.eye_height,
            y_up: config.world_y_up,
        }
    }
}

impl Projection for WorldProjection {
    fn project(&self, x: f32, y: f32, z: f32, _depth_scale: f32) -> Vector3<f32> {
        let y = if self.y_up { y } else { -y };
        Vector3::new(x, y + self.eye_height, -z)
    }
}

/// 正規化画像座標を仮想カメラで逆投影する（ワールド座標が無いときの代替）
#[derive(Debug, Clone, Copy)]
pub struct Unprojection {
    perspective: Perspective3<f32>,
    camera_position: Vector3<f32>,
}

impl Unprojection {
    pub fn new(camera_position: Vector3<f32>, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            perspective: Perspective3::new(aspect, fov_y, near, far),
            camera_position,
        }
    }

    pub fn from_config(config: &ProjectionConfig) -> Self {
        let [x, y, z] = config.camera_position;
        Self::new(
            Vector3::new(x, y, z),
            config.fov_y_deg.to_radians(),
            config.aspect,
            config.near,
            config.far,
        )
    }
}

impl Default for Unprojection {
    fn default() -> Self {
        Self::from_config(&ProjectionConfig::default())
    }
}

impl Projection for Unprojection {
    fn project(&self, x: f32, y: f32, z: f32, depth_scale: f32) -> Vector3<f32> {
        let ndc = Point3::new((x - 0.5) * 2.0, -(y - 0.5) * 2.0, -0.3 - z * depth_scale);
        let view = self.perspective.unproject_point(&ndc);
        view.coords + self.camera_position
    }
}
