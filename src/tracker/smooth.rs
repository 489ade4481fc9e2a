use nalgebra::Vector3;

use crate::pose::{Landmark, LandmarkFrame};

/// フレーム全体の指数平滑化
///
/// - prev が None: cur のコピーを返す（初回）
/// - cur[i] が欠損: prev[i] をそのまま維持
/// - prev[i] が欠損: cur[i] を基準にする
pub fn smooth_frame(prev: Option<&LandmarkFrame>, cur: &LandmarkFrame, alpha: f32) -> LandmarkFrame {
    let prev = match prev {
        Some(prev) => prev,
        None => return cur.clone(),
    };
    let alpha = alpha.clamp(0.0, 1.0);

    let landmarks = (0..cur.len())
        .map(|i| match (prev.get(i), cur.get(i)) {
            (Some(p), Some(c)) => Some(blend_landmark(p, c, alpha)),
            (Some(p), None) => Some(*p),
            (None, Some(c)) => Some(*c),
            (None, None) => None,
        })
        .collect();
    LandmarkFrame::new(landmarks)
}

/// カメラ単位の平滑化。cur で欠損したインデックスは欠損のまま返す
///
/// 欠損を prev で埋めると、一度見えたランドマークが二度と欠損にならない。
pub fn smooth_observed(prev: Option<&LandmarkFrame>, cur: &LandmarkFrame, alpha: f32) -> LandmarkFrame {
    let prev = match prev {
        Some(prev) => prev,
        None => return cur.clone(),
    };
    let alpha = alpha.clamp(0.0, 1.0);

    let landmarks = (0..cur.len())
        .map(|i| {
            let c = cur.get(i)?;
            Some(match prev.get(i) {
                Some(p) => blend_landmark(p, c, alpha),
                None => *c,
            })
        })
        .collect();
    LandmarkFrame::new(landmarks)
}

fn blend_landmark(p: &Landmark, c: &Landmark, alpha: f32) -> Landmark {
    let visibility = match (p.visibility, c.visibility) {
        (Some(pv), Some(cv)) => Some(pv * (1.0 - alpha) + cv * alpha),
        (pv, cv) => cv.or(pv),
    };
    Landmark {
        x: p.x * (1.0 - alpha) + c.x * alpha,
        y: p.y * (1.0 - alpha) + c.y * alpha,
        z: p.z * (1.0 - alpha) + c.z * alpha,
        visibility,
    }
}

/// 関節位置のEMA平滑化フィルタ
#[derive(Debug, Clone)]
pub struct Smoother {
    alpha: f32,
    prev: Option<Vector3<f32>>,
}

impl Smoother {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            prev: None,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn apply(&mut self, position: Vector3<f32>) -> Vector3<f32> {
        let prev = match self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some(position);
                return position;
            }
        };

        let a = self.alpha;
        let result = prev * (1.0 - a) + position * a;
        self.prev = Some(result);
        result
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx_eq_f32(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    fn frame(points: &[Option<(f32, f32, f32)>]) -> LandmarkFrame {
        LandmarkFrame::new(
            points
                .iter()
                .map(|p| p.map(|(x, y, z)| Landmark::with_visibility(x, y, z, 0.9)))
                .collect(),
        )
    }

    #[test]
    fn test_bootstrap_copies_current() {
        let cur = frame(&[Some((1.0, 2.0, 3.0)), None]);
        assert_eq!(smooth_frame(None, &cur, 0.3), cur);
    }

    #[test]
    fn test_alpha_one_returns_current() {
        let prev = frame(&[Some((0.0, 0.0, 0.0)), Some((5.0, 5.0, 5.0))]);
        let cur = frame(&[Some((1.0, 2.0, 3.0)), Some((-1.0, 0.5, 2.0))]);
        assert_eq!(smooth_frame(Some(&prev), &cur, 1.0), cur);
    }

    #[test]
    fn test_alpha_zero_returns_previous() {
        let prev = frame(&[Some((0.0, 0.0, 0.0)), Some((5.0, 5.0, 5.0))]);
        let cur = frame(&[Some((1.0, 2.0, 3.0)), Some((-1.0, 0.5, 2.0))]);
        assert_eq!(smooth_frame(Some(&prev), &cur, 0.0), prev);
    }

    #[test]
    fn test_missing_current_keeps_previous() {
        let prev = frame(&[Some((1.0, 1.0, 1.0)), None]);
        let cur = frame(&[None, Some((2.0, 2.0, 2.0))]);
        let out = smooth_frame(Some(&prev), &cur, 0.5);
        assert_eq!(out.get(0), prev.get(0));
        assert_eq!(out.get(1), cur.get(1));
    }

    #[test]
    fn test_observed_drops_missing_current() {
        let prev = frame(&[Some((1.0, 1.0, 1.0)), Some((0.0, 0.0, 0.0)), None]);
        let cur = frame(&[None, Some((2.0, 2.0, 2.0)), Some((3.0, 3.0, 3.0))]);
        let out = smooth_observed(Some(&prev), &cur, 0.5);
        assert!(out.get(0).is_none());
        assert!(approx_eq_f32(out.get(1).unwrap().x, 1.0, 1e-6));
        assert_eq!(out.get(2), cur.get(2));
    }

    #[test]
    fn test_observed_empty_frame_stays_empty() {
        let prev = frame(&[Some((1.0, 1.0, 1.0)), Some((2.0, 2.0, 2.0))]);
        let out = smooth_observed(Some(&prev), &LandmarkFrame::empty(2), 0.6);
        assert!(out.has_no_landmarks());
    }

    #[test]
    fn test_visibility_blended() {
        let prev = LandmarkFrame::new(vec![Some(Landmark::with_visibility(0.0, 0.0, 0.0, 0.2))]);
        let cur = LandmarkFrame::new(vec![Some(Landmark::with_visibility(0.0, 0.0, 0.0, 1.0))]);
        let out = smooth_frame(Some(&prev), &cur, 0.5);
        assert!(approx_eq_f32(out.get(0).unwrap().visibility.unwrap(), 0.6, 1e-6));
    }

    #[test]
    fn test_repeated_input_converges() {
        let target = frame(&[Some((1.0, -2.0, 0.5))]);
        let mut state = frame(&[Some((0.0, 0.0, 0.0))]);
        for _ in 0..200 {
            state = smooth_frame(Some(&state), &target, 0.45);
        }
        let got = state.get(0).unwrap();
        assert!(approx_eq_f32(got.x, 1.0, 1e-4));
        assert!(approx_eq_f32(got.y, -2.0, 1e-4));
        assert!(approx_eq_f32(got.z, 0.5, 1e-4));
    }

    #[test]
    fn test_smoother_first_sample_passthrough() {
        let mut s = Smoother::new(0.5);
        let p = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(s.apply(p), p);
    }

    #[test]
    fn test_smoother_midpoint() {
        let mut s = Smoother::new(0.5);
        s.apply(Vector3::new(0.0, 0.0, 0.0));
        let out = s.apply(Vector3::new(2.0, 4.0, 6.0));
        assert!((out - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-6);
    }

    #[test]
    fn test_smoother_reset() {
        let mut s = Smoother::new(0.0);
        s.apply(Vector3::new(1.0, 2.0, 3.0));
        s.reset();
        let p = Vector3::new(4.0, 5.0, 6.0);
        assert_eq!(s.apply(p), p);
    }

    #[test]
    fn test_smoother_clamps_alpha() {
        assert_eq!(Smoother::new(1.7).alpha(), 1.0);
        assert_eq!(Smoother::new(-0.2).alpha(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_output_between_prev_and_cur(
            p in -10.0f32..10.0,
            c in -10.0f32..10.0,
            alpha in 0.0f32..=1.0,
        ) {
            let prev = LandmarkFrame::new(vec![Some(Landmark::new(p, p, p))]);
            let cur = LandmarkFrame::new(vec![Some(Landmark::new(c, c, c))]);
            let out = smooth_frame(Some(&prev), &cur, alpha);
            let x = out.get(0).unwrap().x;
            let (lo, hi) = if p < c { (p, c) } else { (c, p) };
            prop_assert!(x >= lo - 1e-4 && x <= hi + 1e-4);
        }

        #[test]
        fn prop_smoother_alpha_one_tracks_input(
            a in -5.0f32..5.0,
            b in -5.0f32..5.0,
        ) {
            let mut s = Smoother::new(1.0);
            s.apply(Vector3::new(a, a, a));
            let out = s.apply(Vector3::new(b, b, b));
            prop_assert_eq!(out, Vector3::new(b, b, b));
        }
    }
}
