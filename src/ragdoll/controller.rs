use nalgebra::Vector3;
use tracing::{info, warn};

use super::physics::{BodyHandle, Constraint, ConstraintKind, PhysicsWorld, RigidBody};
use crate::avatar::RigPose;
use crate::config::RagdollConfig;
use crate::error::TrackingError;
use crate::rig::{JointName, Rig};

/// アバターの駆動モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Tracked,
    Ragdoll,
}

const HINGES: [(JointName, JointName); 8] = [
    (JointName::LeftShoulder, JointName::LeftElbow),
    (JointName::LeftElbow, JointName::LeftWrist),
    (JointName::RightShoulder, JointName::RightElbow),
    (JointName::RightElbow, JointName::RightWrist),
    (JointName::LeftHip, JointName::LeftKnee),
    (JointName::LeftKnee, JointName::LeftAnkle),
    (JointName::RightHip, JointName::RightKnee),
    (JointName::RightKnee, JointName::RightAnkle),
];

const BALLS: [(JointName, JointName); 11] = [
    (JointName::LeftShoulder, JointName::RightShoulder),
    (JointName::LeftHip, JointName::RightHip),
    (JointName::LeftShoulder, JointName::LeftHip),
    (JointName::RightShoulder, JointName::RightHip),
    (JointName::Pelvis, JointName::LeftHip),
    (JointName::Pelvis, JointName::RightHip),
    (JointName::Pelvis, JointName::Torso),
    (JointName::Torso, JointName::LeftShoulder),
    (JointName::Torso, JointName::RightShoulder),
    (JointName::Torso, JointName::Neck),
    (JointName::Neck, JointName::Head),
];

/// 追跡モードとラグドールモードの切り替え
///
/// ラグドールは最初の要求時に一度だけ組み立て、以後は再利用する。
/// 切り替えのたびに剛体を追跡位置へスナップし、速度をゼロにする。
#[derive(Debug, Clone)]
pub struct RagdollController {
    mode: Mode,
    bodies: Vec<(JointName, BodyHandle)>,
    constraint_count: usize,
    construction_count: u32,
    frozen: bool,
    heavy_mass: f32,
    light_mass: f32,
    body_radius: f32,
}

impl RagdollController {
    pub fn new(config: &RagdollConfig) -> Self {
        Self {
            mode: Mode::Tracked,
            bodies: Vec::new(),
            constraint_count: 0,
            construction_count: 0,
            frozen: false,
            heavy_mass: config.heavy_mass,
            light_mass: config.light_mass,
            body_radius: config.body_radius,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn has_ragdoll(&self) -> bool {
        !self.bodies.is_empty()
    }

    /// ラグドールを組み立てた回数
    pub fn construction_count(&self) -> u32 {
        self.construction_count
    }

    /// 空のリグでラグドールを要求された
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraint_count
    }

    pub fn request_ragdoll<W: PhysicsWorld + ?Sized>(
        &mut self,
        rig: &mut Rig,
        world: &mut W,
    ) -> Result<(), TrackingError> {
        if self.mode == Mode::Ragdoll {
            return Ok(());
        }
        self.ensure_built(rig, world)?;
        self.snap_to_rig(rig, world);
        self.mode = Mode::Ragdoll;
        info!("ragdoll enabled ({} bodies)", self.bodies.len());
        Ok(())
    }

    pub fn request_tracked<W: PhysicsWorld + ?Sized>(&mut self, rig: &Rig, world: &mut W) {
        if self.mode == Mode::Tracked {
            return;
        }
        self.snap_to_rig(rig, world);
        self.mode = Mode::Tracked;
        info!("back to tracking");
    }

    pub fn toggle<W: PhysicsWorld + ?Sized>(
        &mut self,
        rig: &mut Rig,
        world: &mut W,
    ) -> Result<Mode, TrackingError> {
        match self.mode {
            Mode::Tracked => self.request_ragdoll(rig, world)?,
            Mode::Ragdoll => self.request_tracked(rig, world),
        }
        Ok(self.mode)
    }

    /// 各剛体を追跡位置へ alpha だけ寄せる。モードは変えない
    pub fn blend<W: PhysicsWorld + ?Sized>(&self, alpha: f32, rig: &Rig, world: &mut W) -> usize {
        let alpha = alpha.clamp(0.0, 1.0);
        let mut moved = 0;
        for &(name, handle) in &self.bodies {
            let (Some(target), Some(body)) = (rig.position(name), world.body_mut(handle)) else {
                continue;
            };
            body.position = body.position * (1.0 - alpha) + target * alpha;
            moved += 1;
        }
        moved
    }

    /// ラグドール中のみ、剛体位置を表示ポーズへ書き写す
    pub fn read_visuals<W: PhysicsWorld + ?Sized>(&self, world: &W, pose: &mut RigPose) -> usize {
        if self.mode != Mode::Ragdoll {
            return 0;
        }
        let mut copied = 0;
        for &(name, handle) in &self.bodies {
            if let Some(body) = world.body(handle) {
                if pose.set_position(name, body.position, true) {
                    copied += 1;
                }
            }
        }
        copied
    }

    /// 剛体をワールドから取り除き、追跡モードへ戻す
    pub fn dispose<W: PhysicsWorld + ?Sized>(&mut self, rig: &mut Rig, world: &mut W) {
        for (name, handle) in self.bodies.drain(..) {
            world.remove_body(handle);
            if let Some(joint) = rig.get_mut(name) {
                joint.binding = None;
            }
        }
        self.constraint_count = 0;
        self.mode = Mode::Tracked;
    }

    fn ensure_built<W: PhysicsWorld + ?Sized>(
        &mut self,
        rig: &mut Rig,
        world: &mut W,
    ) -> Result<(), TrackingError> {
        if self.has_ragdoll() {
            return Ok(());
        }
        if rig.is_empty() {
            if !self.frozen {
                warn!("rig has no joints, ragdoll not constructed");
            }
            self.frozen = true;
            return Err(TrackingError::EmptyRig);
        }

        for joint in rig.iter_mut() {
            let mass = if joint.name().is_heavy() {
                self.heavy_mass
            } else {
                self.light_mass
            };
            let handle = world.add_body(RigidBody::sphere(joint.position, mass, self.body_radius));
            joint.binding = Some(handle);
            self.bodies.push((joint.name(), handle));
        }

        let pairs = HINGES
            .iter()
            .map(|&p| (p, ConstraintKind::Hinge))
            .chain(BALLS.iter().map(|&p| (p, ConstraintKind::Ball)));
        for ((a, b), kind) in pairs {
            let a = rig.get(a).and_then(|j| j.binding);
            let b = rig.get(b).and_then(|j| j.binding);
            if let (Some(a), Some(b)) = (a, b) {
                world.add_constraint(Constraint { a, b, kind });
                self.constraint_count += 1;
            }
        }

        self.frozen = false;
        self.construction_count += 1;
        tracing::debug!(
            "ragdoll constructed: {} bodies, {} constraints",
            self.bodies.len(),
            self.constraint_count
        );
        Ok(())
    }

    fn snap_to_rig<W: PhysicsWorld + ?Sized>(&self, rig: &Rig, world: &mut W) {
        for &(name, handle) in &self.bodies {
            if let (Some(position), Some(body)) = (rig.position(name), world.body_mut(handle)) {
                body.position = position;
                body.velocity = Vector3::zeros();
            }
        }
    }
}

impl Default for RagdollController {
    fn default() -> Self {
        Self::new(&RagdollConfig::default())
    }
}
