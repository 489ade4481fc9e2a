use nalgebra::Vector3;

/// 物理ワールド内の剛体への参照。剛体自体はワールドが所有する
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBody {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    /// kg
    pub mass: f32,
    pub radius: f32,
}

impl RigidBody {
    pub fn sphere(position: Vector3<f32>, mass: f32, radius: f32) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
            mass,
            radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// 1軸回転（肘・膝）
    Hinge,
    /// 球関節（肩・腰・背骨）
    Ball,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub a: BodyHandle,
    pub b: BodyHandle,
    pub kind: ConstraintKind,
}

/// 物理エンジンとの境界
pub trait PhysicsWorld {
    fn add_body(&mut self, body: RigidBody) -> BodyHandle;
    fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody>;
    fn add_constraint(&mut self, constraint: Constraint);
    fn body(&self, handle: BodyHandle) -> Option<&RigidBody>;
    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody>;
    fn step(&mut self, dt: f32);
}

/// 重力つき陽的オイラー積分だけの最小ワールド。拘束は解かない
#[derive(Debug, Clone, Default)]
pub struct SimpleWorld {
    gravity: f32,
    bodies: Vec<Option<RigidBody>>,
    constraints: Vec<Constraint>,
}

impl SimpleWorld {
    pub fn new(gravity: f32) -> Self {
        Self {
            gravity,
            bodies: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

impl PhysicsWorld for SimpleWorld {
    fn add_body(&mut self, body: RigidBody) -> BodyHandle {
        self.bodies.push(Some(body));
        BodyHandle(self.bodies.len() - 1)
    }

    fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let removed = self.bodies.get_mut(handle.0).and_then(Option::take);
        if removed.is_some() {
            self.constraints.retain(|c| c.a != handle && c.b != handle);
        }
        removed
    }

    fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0).and_then(Option::as_ref)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.0).and_then(Option::as_mut)
    }

    fn step(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        let g = Vector3::new(0.0, self.gravity, 0.0);
        for body in self.bodies.iter_mut().flatten() {
            body.velocity += g * dt;
            body.position += body.velocity * dt;
        }
    }
}
