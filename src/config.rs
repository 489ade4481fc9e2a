use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub smooth: SmoothConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub root: RootConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub rig: RigConfig,
    #[serde(default)]
    pub ragdoll: RagdollConfig,
    #[serde(default)]
    pub osc: OscConfig,
}

/// 関節グループごとのEMA係数 (0.0〜1.0, 1.0で平滑化なし)
#[derive(Debug, Deserialize, Clone)]
pub struct SmoothConfig {
    /// 手首・手指
    #[serde(default = "default_extremity")]
    pub extremity: f32,
    /// 胴体・肩・肘・腰
    #[serde(default = "default_body")]
    pub body: f32,
    /// 顔・頭
    #[serde(default = "default_face")]
    pub face: f32,
    /// 膝・足首・足（ジャンプガードと併用）
    #[serde(default = "default_lower_limb")]
    pub lower_limb: f32,
    /// 融合前のカメラごとのフレーム平滑化
    #[serde(default = "default_source")]
    pub source: f32,
}

fn default_extremity() -> f32 { 0.6 }
fn default_body() -> f32 { 0.45 }
fn default_face() -> f32 { 0.5 }
fn default_lower_limb() -> f32 { 0.8 }
fn default_source() -> f32 { 0.6 }

impl Default for SmoothConfig {
    fn default() -> Self {
        Self {
            extremity: default_extremity(),
            body: default_body(),
            face: default_face(),
            lower_limb: default_lower_limb(),
            source: default_source(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardConfig {
    /// 1フレームで許容する最大移動量（ランドマーク座標系）
    #[serde(default = "default_max_delta")]
    pub max_delta: f32,
    /// 連続リジェクトがこの回数に達したら現在値で再アンカー。0 なら再アンカーしない
    #[serde(default = "default_max_reject_streak")]
    pub max_reject_streak: u32,
}

fn default_max_delta() -> f32 { 0.15 }
fn default_max_reject_streak() -> u32 { 0 }

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_delta: default_max_delta(),
            max_reject_streak: default_max_reject_streak(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RootConfig {
    /// 速度の軸ごとの上限 (m/s)
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f32,
    #[serde(default = "default_min_y")]
    pub min_y: f32,
    #[serde(default = "default_max_y")]
    pub max_y: f32,
    /// 支持脚が検出されたときの追従係数
    #[serde(default = "default_support_smoothing")]
    pub support_smoothing: f32,
    /// 腰フォールバック時の追従係数
    #[serde(default = "default_pelvis_smoothing")]
    pub pelvis_smoothing: f32,
    /// ルートの初期位置 [x, y, z]
    #[serde(default = "default_initial_position")]
    pub initial_position: [f32; 3],
}

fn default_max_velocity() -> f32 { 4.0 }
fn default_min_y() -> f32 { -2.0 }
fn default_max_y() -> f32 { 3.0 }
fn default_support_smoothing() -> f32 { 0.85 }
fn default_pelvis_smoothing() -> f32 { 0.7 }
fn default_initial_position() -> [f32; 3] { [0.0, 1.6, 0.0] }

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            max_velocity: default_max_velocity(),
            min_y: default_min_y(),
            max_y: default_max_y(),
            support_smoothing: default_support_smoothing(),
            pelvis_smoothing: default_pelvis_smoothing(),
            initial_position: default_initial_position(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectionConfig {
    /// ワールド座標を持ち上げる目線高さ（メートル）
    #[serde(default = "default_eye_height")]
    pub eye_height: f32,
    /// 正規化zを奥行きに変換する係数
    #[serde(default = "default_depth_scale")]
    pub depth_scale: f32,
    /// ワールドランドマークのY軸が上向きか
    #[serde(default = "default_world_y_up")]
    pub world_y_up: bool,
    /// 逆投影用の仮想カメラ垂直画角（度）
    #[serde(default = "default_fov_y_deg")]
    pub fov_y_deg: f32,
    #[serde(default = "default_aspect")]
    pub aspect: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    /// 仮想カメラ位置 [x, y, z]
    #[serde(default = "default_camera_position")]
    pub camera_position: [f32; 3],
}

fn default_eye_height() -> f32 { 1.6 }
fn default_depth_scale() -> f32 { 1.6 }
fn default_world_y_up() -> bool { true }
fn default_fov_y_deg() -> f32 { 60.0 }
fn default_aspect() -> f32 { 16.0 / 9.0 }
fn default_near() -> f32 { 0.05 }
fn default_far() -> f32 { 100.0 }
fn default_camera_position() -> [f32; 3] { [0.0, 1.6, 2.6] }

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            eye_height: default_eye_height(),
            depth_scale: default_depth_scale(),
            world_y_up: default_world_y_up(),
            fov_y_deg: default_fov_y_deg(),
            aspect: default_aspect(),
            near: default_near(),
            far: default_far(),
            camera_position: default_camera_position(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RigConfig {
    /// 鼻から頭部への上方向オフセット（メートル）
    #[serde(default = "default_head_bias")]
    pub head_bias: f32,
    /// これより短い肢セグメントは非表示
    #[serde(default = "default_min_segment_length")]
    pub min_segment_length: f32,
}

fn default_head_bias() -> f32 { 0.08 }
fn default_min_segment_length() -> f32 { 1e-4 }

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            head_bias: default_head_bias(),
            min_segment_length: default_min_segment_length(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RagdollConfig {
    /// 骨盤・腰クラスの質量 (kg)
    #[serde(default = "default_heavy_mass")]
    pub heavy_mass: f32,
    #[serde(default = "default_light_mass")]
    pub light_mass: f32,
    #[serde(default = "default_body_radius")]
    pub body_radius: f32,
    /// 段階的復帰で使うブレンド係数
    #[serde(default = "default_blend_alpha")]
    pub blend_alpha: f32,
    #[serde(default = "default_gravity")]
    pub gravity: f32,
}

fn default_heavy_mass() -> f32 { 10.0 }
fn default_light_mass() -> f32 { 2.0 }
fn default_body_radius() -> f32 { 0.08 }
fn default_blend_alpha() -> f32 { 0.2 }
fn default_gravity() -> f32 { -9.81 }

impl Default for RagdollConfig {
    fn default() -> Self {
        Self {
            heavy_mass: default_heavy_mass(),
            light_mass: default_light_mass(),
            body_radius: default_body_radius(),
            blend_alpha: default_blend_alpha(),
            gravity: default_gravity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OscConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_osc_addr")]
    pub addr: String,
}

fn default_osc_addr() -> String { crate::osc::OSC_DEFAULT_ADDR.to_string() }

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_osc_addr(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 読み込みに失敗したらデフォルト設定で続行する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("config not loaded ({:#}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let alphas = [
            ("smooth.extremity", self.smooth.extremity),
            ("smooth.body", self.smooth.body),
            ("smooth.face", self.smooth.face),
            ("smooth.lower_limb", self.smooth.lower_limb),
            ("smooth.source", self.smooth.source),
            ("root.support_smoothing", self.root.support_smoothing),
            ("root.pelvis_smoothing", self.root.pelvis_smoothing),
            ("ragdoll.blend_alpha", self.ragdoll.blend_alpha),
        ];
        for (name, value) in alphas {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        if !(self.guard.max_delta > 0.0) {
            bail!("guard.max_delta must be positive, got {}", self.guard.max_delta);
        }
        if !(self.root.max_velocity >= 0.0) {
            bail!("root.max_velocity must not be negative, got {}", self.root.max_velocity);
        }
        if self.root.min_y >= self.root.max_y {
            bail!(
                "root.min_y ({}) must be below root.max_y ({})",
                self.root.min_y,
                self.root.max_y
            );
        }
        Ok(())
    }
}
