use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::avatar::Avatar;
use crate::config::Config;
use crate::error::TrackingError;
use crate::fusion::{FusionState, MultiCameraFusion, SourceId, SourceWriter};
use crate::pose::FrameSchema;
use crate::ragdoll::{Mode, PhysicsWorld};
use crate::rig::{JointName, SkipReason};
use crate::tracker::{classify, HandGesture, PinchEdge, PinchTracker, RootAnchor, SupportLeg};

/// ハンドソースごとのピンチ開始・終了
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PinchEvent {
    pub source: SourceId,
    pub edge: PinchEdge,
    pub strength: f32,
}

/// 1ティックの要約
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub fusion: FusionState,
    /// 融合フレームの平均可視度
    pub confidence: Option<f32>,
    pub mode: Mode,
    pub support_leg: Option<SupportLeg>,
    pub root_anchor: Option<RootAnchor>,
    pub applied: usize,
    pub skipped: Vec<(JointName, SkipReason)>,
    pub gestures: Vec<(SourceId, HandGesture)>,
    pub pinch_events: Vec<PinchEvent>,
}

/// 融合 → 関節マッピング → 接地脚 → ルート安定化 / ラグドール
///
/// 1スレッドで回す。検出スレッドは SourceWriter 経由でスロットに書き込むだけ。
/// リグを動かすのは Pose ソースのみで、Hand ソースはジェスチャー判定にだけ使う。
pub struct Pipeline<W: PhysicsWorld> {
    fusion: MultiCameraFusion,
    avatar: Avatar,
    world: W,
    pinch: BTreeMap<SourceId, PinchTracker>,
    ticks: u64,
}

impl<W: PhysicsWorld> Pipeline<W> {
    pub fn new(config: &Config, world: W) -> Self {
        Self::with_avatar(MultiCameraFusion::from_config(&config.smooth), Avatar::new(config), world)
    }

    pub fn with_avatar(fusion: MultiCameraFusion, avatar: Avatar, world: W) -> Self {
        Self {
            fusion,
            avatar,
            world,
            pinch: BTreeMap::new(),
            ticks: 0,
        }
    }

    /// Pose と Hand のみ受け付ける
    pub fn add_source(&mut self, schema: FrameSchema) -> Result<SourceWriter, TrackingError> {
        match schema {
            FrameSchema::Pose | FrameSchema::Hand => Ok(self.fusion.add_source(schema)),
            FrameSchema::Face => Err(TrackingError::UnsupportedSchema(schema)),
        }
    }

    pub fn remove_source(&mut self, id: SourceId) -> Result<(), TrackingError> {
        self.fusion.remove_source(id)?;
        self.pinch.remove(&id);
        Ok(())
    }

    pub fn tick(&mut self, dt: f32) -> TickReport {
        let fused = self.fusion.fuse_latest();
        let (gestures, pinch_events) = self.update_gestures();
        if self.avatar.mode() == Mode::Ragdoll {
            self.world.step(dt);
        }
        let update = self.avatar.update(&fused, &self.world);
        self.ticks += 1;

        TickReport {
            tick: self.ticks,
            fusion: fused.state,
            confidence: fused.frame.as_ref().and_then(|f| f.average_visibility()),
            mode: update.mode,
            support_leg: update.support_leg,
            root_anchor: update.root_target.map(|t| t.anchor),
            applied: update.mapped.applied,
            skipped: update.mapped.skipped,
            gestures,
            pinch_events,
        }
    }

    fn update_gestures(&mut self) -> (Vec<(SourceId, HandGesture)>, Vec<PinchEvent>) {
        let mut gestures = Vec::new();
        let mut events = Vec::new();
        for (source, frame) in self.fusion.hand_frames() {
            let gesture = classify(frame);
            let tracker = self.pinch.entry(source).or_default();
            if let Some(edge) = tracker.update(gesture.as_ref()) {
                let strength = gesture.map_or(0.0, |g| g.pinch_strength);
                debug!("{} pinch {:?} ({:.2})", source, edge, strength);
                events.push(PinchEvent { source, edge, strength });
            }
            if let Some(gesture) = gesture {
                gestures.push((source, gesture));
            }
        }
        (gestures, events)
    }

    pub fn request_ragdoll(&mut self) -> Result<(), TrackingError> {
        self.avatar.request_ragdoll(&mut self.world)
    }

    pub fn request_tracked(&mut self) {
        self.avatar.request_tracked(&mut self.world);
    }

    pub fn toggle_ragdoll(&mut self) -> Result<Mode, TrackingError> {
        self.avatar.toggle_ragdoll(&mut self.world)
    }

    /// None なら設定値の係数を使う
    pub fn blend_to_tracking(&mut self, alpha: Option<f32>) -> usize {
        self.avatar.blend_to_tracking(alpha, &mut self.world)
    }

    pub fn avatar(&self) -> &Avatar {
        &self.avatar
    }

    pub fn fusion(&self) -> &MultiCameraFusion {
        &self.fusion
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
