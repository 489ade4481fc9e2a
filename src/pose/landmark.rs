use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::index::PoseLandmark;
use crate::error::TrackingError;

/// 単一ランドマーク
///
/// ワールド座標（メートル）または正規化画像座標 (0.0〜1.0) のどちらか。
/// どちらの座標系かはフレームの出どころで決まる。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// 可視度 (0.0〜1.0)。検出器が出さない場合は None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, visibility: None }
    }

    pub fn with_visibility(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility: Some(visibility) }
    }

    pub fn coords(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// 2点の中点。可視度は両方ある場合のみ平均する
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        let visibility = match (self.visibility, other.visibility) {
            (Some(a), Some(b)) => Some((a + b) / 2.0),
            _ => None,
        };
        Landmark {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
            visibility,
        }
    }
}

/// ソースごとに固定されたランドマーク数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSchema {
    Hand,
    Pose,
    Face,
}

impl FrameSchema {
    pub fn len(self) -> usize {
        match self {
            Self::Hand => 21,
            Self::Pose => PoseLandmark::COUNT,
            Self::Face => 468,
        }
    }
}

/// 固定長のランドマーク列。欠損インデックスは None
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame {
    landmarks: Vec<Option<Landmark>>,
}

impl LandmarkFrame {
    pub fn new(landmarks: Vec<Option<Landmark>>) -> Self {
        Self { landmarks }
    }

    /// 全インデックスが欠損したフレーム
    pub fn empty(len: usize) -> Self {
        Self { landmarks: vec![None; len] }
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// ランドマークが1つもないか
    pub fn has_no_landmarks(&self) -> bool {
        self.landmarks.iter().all(Option::is_none)
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index).and_then(Option::as_ref)
    }

    pub fn pose(&self, index: PoseLandmark) -> Option<&Landmark> {
        self.get(index.index())
    }

    /// 欠損なら MissingLandmark
    pub fn require(&self, index: PoseLandmark) -> Result<&Landmark, TrackingError> {
        self.pose(index).ok_or(TrackingError::MissingLandmark { index: index.index() })
    }

    pub fn set(&mut self, index: usize, landmark: Option<Landmark>) {
        if let Some(slot) = self.landmarks.get_mut(index) {
            *slot = landmark;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Landmark>> {
        self.landmarks.iter().map(Option::as_ref)
    }

    /// 平均可視度。可視度を持つランドマークがなければ None
    pub fn average_visibility(&self) -> Option<f32> {
        let (sum, count) = self
            .landmarks
            .iter()
            .flatten()
            .filter_map(|l| l.visibility)
            .fold((0.0f32, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f32)
        }
    }
}
