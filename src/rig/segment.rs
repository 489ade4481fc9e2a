use nalgebra::Vector3;

use super::joint::JointName;

/// 描画する肢セグメント（隣接関節のペア）
pub const LIMBS: [(JointName, JointName); 19] = [
    (JointName::Neck, JointName::Head),
    (JointName::LeftShoulder, JointName::RightShoulder),
    (JointName::LeftShoulder, JointName::LeftElbow),
    (JointName::LeftElbow, JointName::LeftWrist),
    (JointName::RightShoulder, JointName::RightElbow),
    (JointName::RightElbow, JointName::RightWrist),
    (JointName::Neck, JointName::Torso),
    (JointName::Torso, JointName::Pelvis),
    (JointName::LeftHip, JointName::RightHip),
    (JointName::LeftHip, JointName::LeftKnee),
    (JointName::LeftKnee, JointName::LeftAnkle),
    (JointName::LeftAnkle, JointName::LeftHeel),
    (JointName::LeftHeel, JointName::LeftFootIndex),
    (JointName::RightHip, JointName::RightKnee),
    (JointName::RightKnee, JointName::RightAnkle),
    (JointName::RightAnkle, JointName::RightHeel),
    (JointName::RightHeel, JointName::RightFootIndex),
    (JointName::LeftWrist, JointName::LeftIndex),
    (JointName::RightWrist, JointName::RightIndex),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: JointName,
    pub to: JointName,
    pub midpoint: Vector3<f32>,
    /// from → to の単位ベクトル。非表示時はゼロ
    pub direction: Vector3<f32>,
    pub length: f32,
    pub visible: bool,
}

impl Segment {
    /// 端点が片方でも非表示、または長さが min_length 未満なら非表示
    pub fn between(
        from: (JointName, Vector3<f32>, bool),
        to: (JointName, Vector3<f32>, bool),
        min_length: f32,
    ) -> Self {
        let (from_name, a, a_visible) = from;
        let (to_name, b, b_visible) = to;
        let delta = b - a;
        let length = delta.norm();
        let visible = a_visible && b_visible && length.is_finite() && length >= min_length;
        let direction = if visible { delta / length } else { Vector3::zeros() };
        Self {
            from: from_name,
            to: to_name,
            midpoint: (a + b) * 0.5,
            direction,
            length,
            visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_geometry() {
        let s = Segment::between(
            (JointName::LeftHip, Vector3::new(0.0, 1.0, 0.0), true),
            (JointName::LeftKnee, Vector3::new(0.0, 0.0, 0.0), true),
            1e-4,
        );
        assert!(s.visible);
        assert!((s.length - 1.0).abs() < 1e-6);
        assert_eq!(s.midpoint, Vector3::new(0.0, 0.5, 0.0));
        assert_eq!(s.direction, Vector3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_degenerate_segment_hidden() {
        let p = Vector3::new(0.3, 0.3, 0.3);
        let s = Segment::between((JointName::Neck, p, true), (JointName::Head, p, true), 1e-4);
        assert!(!s.visible);
        assert_eq!(s.direction, Vector3::zeros());
    }

    #[test]
    fn test_invisible_endpoint_hides_segment() {
        let s = Segment::between(
            (JointName::LeftElbow, Vector3::new(0.0, 0.0, 0.0), true),
            (JointName::LeftWrist, Vector3::new(1.0, 0.0, 0.0), false),
            1e-4,
        );
        assert!(!s.visible);
    }

    #[test]
    fn test_limbs_have_distinct_ends() {
        for (a, b) in LIMBS {
            assert_ne!(a, b);
        }
    }
}
