use nalgebra::Vector3;

use crate::error::TrackingError;
use crate::pose::{Landmark, LandmarkFrame, PoseLandmark};
use crate::ragdoll::BodyHandle;

/// リグの関節名（固定集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(usize)]
pub enum JointName {
    Head = 0,
    Nose,
    Neck,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    Torso,
    Pelvis,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

/// 関節の位置をフレームのどこから取るか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointSource {
    Landmark(PoseLandmark),
    /// 2点の中点
    Midpoint(PoseLandmark, PoseLandmark),
    /// 左右ヒップの中点。片方しかなければそちらを使う
    HipCenter,
    /// 肩中点と腰中点の中点
    Torso,
    /// ランドマークを射影後に上方向へずらす（頭部）
    Above(PoseLandmark),
}

impl JointSource {
    /// 最初に見つかった欠損インデックスを MissingLandmark で返す
    pub fn resolve(&self, frame: &LandmarkFrame) -> Result<Landmark, TrackingError> {
        use PoseLandmark::*;
        match *self {
            JointSource::Landmark(idx) | JointSource::Above(idx) => frame.require(idx).copied(),
            JointSource::Midpoint(a, b) => {
                let a = frame.require(a)?;
                let b = frame.require(b)?;
                Ok(a.midpoint(b))
            }
            JointSource::HipCenter => match (frame.pose(LeftHip), frame.pose(RightHip)) {
                (Some(l), Some(r)) => Ok(l.midpoint(r)),
                (Some(l), None) => Ok(*l),
                (None, Some(r)) => Ok(*r),
                (None, None) => Err(TrackingError::MissingLandmark { index: LeftHip.index() }),
            },
            JointSource::Torso => {
                let shoulders = frame.require(LeftShoulder)?.midpoint(frame.require(RightShoulder)?);
                let hips = frame.require(LeftHip)?.midpoint(frame.require(RightHip)?);
                Ok(shoulders.midpoint(&hips))
            }
        }
    }
}

/// 平滑化係数のグループ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothGroup {
    Extremity,
    Body,
    Face,
    LowerLimb,
}

/// 関節ごとの固定定義
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSpec {
    pub source: JointSource,
    pub group: SmoothGroup,
    /// 追跡前の既定位置（メートル, Y上向き, 床=0）
    pub rest: [f32; 3],
}

impl JointName {
    pub const COUNT: usize = 33;

    pub const ALL: [JointName; Self::COUNT] = [
        Self::Head,
        Self::Nose,
        Self::Neck,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::Torso,
        Self::Pelvis,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Nose => "nose",
            Self::Neck => "neck",
            Self::LeftEye => "leftEye",
            Self::RightEye => "rightEye",
            Self::LeftEar => "leftEar",
            Self::RightEar => "rightEar",
            Self::MouthLeft => "mouthLeft",
            Self::MouthRight => "mouthRight",
            Self::LeftShoulder => "leftShoulder",
            Self::RightShoulder => "rightShoulder",
            Self::LeftElbow => "leftElbow",
            Self::RightElbow => "rightElbow",
            Self::LeftWrist => "leftWrist",
            Self::RightWrist => "rightWrist",
            Self::LeftPinky => "leftPinky",
            Self::RightPinky => "rightPinky",
            Self::LeftIndex => "leftIndex",
            Self::RightIndex => "rightIndex",
            Self::LeftThumb => "leftThumb",
            Self::RightThumb => "rightThumb",
            Self::Torso => "torso",
            Self::Pelvis => "pelvis",
            Self::LeftHip => "leftHip",
            Self::RightHip => "rightHip",
            Self::LeftKnee => "leftKnee",
            Self::RightKnee => "rightKnee",
            Self::LeftAnkle => "leftAnkle",
            Self::RightAnkle => "rightAnkle",
            Self::LeftHeel => "leftHeel",
            Self::RightHeel => "rightHeel",
            Self::LeftFootIndex => "leftFootIndex",
            Self::RightFootIndex => "rightFootIndex",
        }
    }

    pub fn spec(self) -> JointSpec {
        use JointSource as S;
        use PoseLandmark as P;
        use SmoothGroup as G;
        let (source, group, rest) = match self {
            Self::Head => (S::Above(P::Nose), G::Face, [0.0, 1.70, 0.0]),
            Self::Nose => (S::Landmark(P::Nose), G::Face, [0.0, 1.62, 0.08]),
            Self::Neck => (S::Midpoint(P::LeftShoulder, P::RightShoulder), G::Body, [0.0, 1.50, 0.0]),
            Self::LeftEye => (S::Landmark(P::LeftEye), G::Face, [0.03, 1.66, 0.07]),
            Self::RightEye => (S::Landmark(P::RightEye), G::Face, [-0.03, 1.66, 0.07]),
            Self::LeftEar => (S::Landmark(P::LeftEar), G::Face, [0.07, 1.63, 0.0]),
            Self::RightEar => (S::Landmark(P::RightEar), G::Face, [-0.07, 1.63, 0.0]),
            Self::MouthLeft => (S::Landmark(P::MouthLeft), G::Face, [0.025, 1.57, 0.07]),
            Self::MouthRight => (S::Landmark(P::MouthRight), G::Face, [-0.025, 1.57, 0.07]),
            Self::LeftShoulder => (S::Landmark(P::LeftShoulder), G::Body, [0.18, 1.45, 0.0]),
            Self::RightShoulder => (S::Landmark(P::RightShoulder), G::Body, [-0.18, 1.45, 0.0]),
            Self::LeftElbow => (S::Landmark(P::LeftElbow), G::Body, [0.45, 1.45, 0.0]),
            Self::RightElbow => (S::Landmark(P::RightElbow), G::Body, [-0.45, 1.45, 0.0]),
            Self::LeftWrist => (S::Landmark(P::LeftWrist), G::Extremity, [0.70, 1.45, 0.0]),
            Self::RightWrist => (S::Landmark(P::RightWrist), G::Extremity, [-0.70, 1.45, 0.0]),
            Self::LeftPinky => (S::Landmark(P::LeftPinky), G::Extremity, [0.78, 1.43, 0.0]),
            Self::RightPinky => (S::Landmark(P::RightPinky), G::Extremity, [-0.78, 1.43, 0.0]),
            Self::LeftIndex => (S::Landmark(P::LeftIndex), G::Extremity, [0.80, 1.46, 0.0]),
            Self::RightIndex => (S::Landmark(P::RightIndex), G::Extremity, [-0.80, 1.46, 0.0]),
            Self::LeftThumb => (S::Landmark(P::LeftThumb), G::Extremity, [0.75, 1.47, 0.03]),
            Self::RightThumb => (S::Landmark(P::RightThumb), G::Extremity, [-0.75, 1.47, 0.03]),
            Self::Torso => (S::Torso, G::Body, [0.0, 1.25, 0.0]),
            Self::Pelvis => (S::HipCenter, G::Body, [0.0, 1.0, 0.0]),
            Self::LeftHip => (S::Landmark(P::LeftHip), G::Body, [0.1, 1.0, 0.0]),
            Self::RightHip => (S::Landmark(P::RightHip), G::Body, [-0.1, 1.0, 0.0]),
            Self::LeftKnee => (S::Landmark(P::LeftKnee), G::LowerLimb, [0.1, 0.55, 0.0]),
            Self::RightKnee => (S::Landmark(P::RightKnee), G::LowerLimb, [-0.1, 0.55, 0.0]),
            Self::LeftAnkle => (S::Landmark(P::LeftAnkle), G::LowerLimb, [0.1, 0.1, 0.0]),
            Self::RightAnkle => (S::Landmark(P::RightAnkle), G::LowerLimb, [-0.1, 0.1, 0.0]),
            Self::LeftHeel => (S::Landmark(P::LeftHeel), G::LowerLimb, [0.1, 0.05, -0.05]),
            Self::RightHeel => (S::Landmark(P::RightHeel), G::LowerLimb, [-0.1, 0.05, -0.05]),
            Self::LeftFootIndex => (S::Landmark(P::LeftFootIndex), G::LowerLimb, [0.1, 0.02, 0.12]),
            Self::RightFootIndex => (S::Landmark(P::RightFootIndex), G::LowerLimb, [-0.1, 0.02, 0.12]),
        };
        JointSpec { source, group, rest }
    }

    /// ジャンプガード対象（脚・足）
    pub fn is_guarded(self) -> bool {
        self.spec().group == SmoothGroup::LowerLimb
    }

    /// ラグドールで重い質量を割り当てる骨盤・腰クラス
    pub fn is_heavy(self) -> bool {
        matches!(self, Self::Pelvis | Self::LeftHip | Self::RightHip)
    }

    pub fn rest_position(self) -> Vector3<f32> {
        let [x, y, z] = self.spec().rest;
        Vector3::new(x, y, z)
    }
}

/// 単一関節。位置は平滑化後の追跡位置
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    name: JointName,
    pub position: Vector3<f32>,
    pub visible: bool,
    /// ラグドールの物理ボディへの参照（所有しない）
    pub binding: Option<BodyHandle>,
}

impl Joint {
    pub fn new(name: JointName) -> Self {
        Self {
            name,
            position: name.rest_position(),
            visible: false,
            binding: None,
        }
    }

    pub fn name(&self) -> JointName {
        self.name
    }
}

/// 関節名→関節の対応。関節の集合は生成時に固定され、以後増減しない
#[derive(Debug, Clone)]
pub struct Rig {
    joints: Vec<Joint>,
    slots: [Option<usize>; JointName::COUNT],
    tracked: bool,
}

impl Rig {
    /// 指定した関節だけを持つリグ。重複は無視する
    pub fn new(names: &[JointName]) -> Self {
        let mut joints = Vec::with_capacity(names.len());
        let mut slots = [None; JointName::COUNT];
        for &name in names {
            if slots[name.index()].is_none() {
                slots[name.index()] = Some(joints.len());
                joints.push(Joint::new(name));
            }
        }
        Self {
            joints,
            slots,
            tracked: false,
        }
    }

    pub fn full() -> Self {
        Self::new(&JointName::ALL)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn contains(&self, name: JointName) -> bool {
        self.slots[name.index()].is_some()
    }

    pub fn get(&self, name: JointName) -> Option<&Joint> {
        self.slots[name.index()].map(|i| &self.joints[i])
    }

    pub fn get_mut(&mut self, name: JointName) -> Option<&mut Joint> {
        match self.slots[name.index()] {
            Some(i) => Some(&mut self.joints[i]),
            None => None,
        }
    }

    pub fn position(&self, name: JointName) -> Option<Vector3<f32>> {
        self.get(name).map(|j| j.position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Joint> {
        self.joints.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Joint> {
        self.joints.iter_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = JointName> + '_ {
        self.joints.iter().map(Joint::name)
    }

    /// ルートが追跡中か
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    pub fn set_tracked(&mut self, tracked: bool) {
        self.tracked = tracked;
    }

    /// 入力フレームがないとき: 全関節を非表示、ルートを未追跡にする
    pub fn hide_all(&mut self) {
        for joint in &mut self.joints {
            joint.visible = false;
        }
        self.tracked = false;
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::full()
    }
}
