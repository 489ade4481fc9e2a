use nalgebra::Vector3;

use crate::config::{Config, RootConfig};
use crate::error::TrackingError;
use crate::fusion::{FusedPose, FusionState};
use crate::ragdoll::{Mode, PhysicsWorld, RagdollController};
use crate::rig::{
    FrameKind, JointMapper, JointName, MapReport, Projection, Rig, Segment, Unprojection,
    WorldProjection, LIMBS,
};
use crate::tracker::{
    root_target, KinematicBody, RootStabilizer, RootTarget, SupportLeg, SupportLegDetector,
    VerticalAxis,
};

/// 描画側に渡す1関節
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointVisual {
    pub name: JointName,
    pub position: Vector3<f32>,
    pub visible: bool,
}

/// 描画用のポーズ（関節・肢セグメント・ルート）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RigPose {
    joints: Vec<JointVisual>,
    pub segments: Vec<Segment>,
    pub root: Vector3<f32>,
    pub tracked: bool,
}

impl RigPose {
    pub fn from_rig(rig: &Rig, root: Vector3<f32>) -> Self {
        let mut pose = Self::default();
        pose.sync_from_rig(rig, root);
        pose
    }

    /// 追跡中の関節位置で上書きする
    pub fn sync_from_rig(&mut self, rig: &Rig, root: Vector3<f32>) {
        self.joints.clear();
        self.joints.extend(rig.iter().map(|j| JointVisual {
            name: j.name(),
            position: j.position,
            visible: j.visible,
        }));
        self.root = root;
        self.tracked = rig.is_tracked();
    }

    /// 関節が無ければ false
    pub fn set_position(&mut self, name: JointName, position: Vector3<f32>, visible: bool) -> bool {
        match self.joints.iter_mut().find(|j| j.name == name) {
            Some(joint) => {
                joint.position = position;
                joint.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: JointName) -> Option<&JointVisual> {
        self.joints.iter().find(|j| j.name == name)
    }

    pub fn joints(&self) -> &[JointVisual] {
        &self.joints
    }

    pub fn rebuild_segments(&mut self, min_length: f32) {
        let segments = LIMBS
            .iter()
            .filter_map(|&(a, b)| {
                let a = self.get(a)?;
                let b = self.get(b)?;
                Some(Segment::between(
                    (a.name, a.position, a.visible),
                    (b.name, b.position, b.visible),
                    min_length,
                ))
            })
            .collect();
        self.segments = segments;
    }
}

/// 1ティック分の更新結果
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarUpdate {
    pub mapped: MapReport,
    pub support_leg: Option<SupportLeg>,
    pub root_target: Option<RootTarget>,
    pub mode: Mode,
}

/// リグ・ルート・ラグドールをまとめたアバター
pub struct Avatar {
    rig: Rig,
    mapper: JointMapper,
    root: KinematicBody,
    stabilizer: RootStabilizer,
    controller: RagdollController,
    world_projection: Box<dyn Projection>,
    image_projection: Box<dyn Projection>,
    world_detector: SupportLegDetector,
    image_detector: SupportLegDetector,
    root_config: RootConfig,
    min_segment_length: f32,
    blend_alpha: f32,
    visual: RigPose,
}

impl Avatar {
    pub fn new(config: &Config) -> Self {
        Self::with_projections(
            config,
            Box::new(WorldProjection::from_config(&config.projection)),
            Box::new(Unprojection::from_config(&config.projection)),
        )
    }

    pub fn with_projections(
        config: &Config,
        world_projection: Box<dyn Projection>,
        image_projection: Box<dyn Projection>,
    ) -> Self {
        Self::with_rig(config, Rig::full(), world_projection, image_projection)
    }

    pub fn with_rig(
        config: &Config,
        rig: Rig,
        world_projection: Box<dyn Projection>,
        image_projection: Box<dyn Projection>,
    ) -> Self {
        let [x, y, z] = config.root.initial_position;
        let root = KinematicBody::new(Vector3::new(x, y, z));
        let world_axis = if config.projection.world_y_up {
            VerticalAxis::Up
        } else {
            VerticalAxis::Down
        };
        let mut visual = RigPose::from_rig(&rig, root.position);
        visual.rebuild_segments(config.rig.min_segment_length);
        Self {
            rig,
            mapper: JointMapper::from_config(config),
            root,
            stabilizer: RootStabilizer::from_config(&config.root),
            controller: RagdollController::new(&config.ragdoll),
            world_projection,
            image_projection,
            world_detector: SupportLegDetector::new(world_axis),
            image_detector: SupportLegDetector::new(VerticalAxis::Down),
            root_config: config.root.clone(),
            min_segment_length: config.rig.min_segment_length,
            blend_alpha: config.ragdoll.blend_alpha,
            visual,
        }
    }

    /// 融合結果を反映する
    ///
    /// 追跡モードではルートを安定化し、ラグドールモードでは剛体位置を表示に使う。
    /// 物理ステップは呼び出し側が先に進めておく
    pub fn update<W: PhysicsWorld + ?Sized>(&mut self, fused: &FusedPose, world: &W) -> AvatarUpdate {
        let kind = match fused.state {
            FusionState::Degraded { .. } => FrameKind::Image,
            _ => FrameKind::World,
        };
        let (projection, detector) = match kind {
            FrameKind::World => (self.world_projection.as_ref(), self.world_detector),
            FrameKind::Image => (self.image_projection.as_ref(), self.image_detector),
        };
        let frame = fused.frame.as_ref();

        let mapped = self.mapper.map_frame(frame, kind, projection, &mut self.rig);
        let support_leg = frame.and_then(|f| detector.detect(f));
        let target = frame.and_then(|f| {
            root_target(
                f,
                support_leg,
                projection,
                self.mapper.depth_scale(),
                &self.root_config,
            )
        });

        let mode = self.controller.mode();
        if mode == Mode::Tracked {
            self.stabilizer.stabilize(&mut self.root, target.as_ref());
        }

        self.visual.sync_from_rig(&self.rig, self.root.position);
        self.controller.read_visuals(world, &mut self.visual);
        self.visual.rebuild_segments(self.min_segment_length);

        AvatarUpdate {
            mapped,
            support_leg,
            root_target: target,
            mode,
        }
    }

    pub fn request_ragdoll<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) -> Result<(), TrackingError> {
        self.controller.request_ragdoll(&mut self.rig, world)
    }

    pub fn request_tracked<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        self.controller.request_tracked(&self.rig, world);
    }

    pub fn toggle_ragdoll<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) -> Result<Mode, TrackingError> {
        self.controller.toggle(&mut self.rig, world)
    }

    /// 設定のブレンド係数で剛体を追跡位置へ寄せる
    pub fn blend_to_tracking<W: PhysicsWorld + ?Sized>(&mut self, alpha: Option<f32>, world: &mut W) -> usize {
        let alpha = alpha.unwrap_or(self.blend_alpha);
        self.controller.blend(alpha, &self.rig, world)
    }

    pub fn mode(&self) -> Mode {
        self.controller.mode()
    }

    pub fn rig(&self) -> &Rig {
        &self.rig
    }

    pub fn root(&self) -> &KinematicBody {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut KinematicBody {
        &mut self.root
    }

    pub fn controller(&self) -> &RagdollController {
        &self.controller
    }

    pub fn visual(&self) -> &RigPose {
        &self.visual
    }
}
