use serde::Serialize;

use crate::pose::{Landmark, LandmarkFrame};

const WRIST: usize = 0;
const THUMB_TIP: usize = 4;
const INDEX_TIP: usize = 8;
const MIDDLE_MCP: usize = 9;

/// 人差し指〜小指の (指先, MCP)
const FINGERS: [(usize, usize); 4] = [(8, 5), (12, 9), (16, 13), (20, 17)];

/// この強さを超えたらピンチ
pub const PINCH_THRESHOLD: f32 = 0.45;
/// 指先間距離がハンドスケール × この値で強さ 0
const PINCH_RANGE: f32 = 1.6;
/// 手首・中指MCPが取れない時のハンドスケール
const FALLBACK_HAND_SCALE: f32 = 0.1;

/// 1手ぶんのジェスチャー判定結果
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HandGesture {
    pub pinch: bool,
    /// 0..=1
    pub pinch_strength: f32,
    pub point: bool,
    pub grab: bool,
}

/// 21点のハンドフレームからジェスチャーを判定する。ランドマークが1つも無ければ None
///
/// 座標は画像空間（Y下向き）を想定。
pub fn classify(frame: &LandmarkFrame) -> Option<HandGesture> {
    if frame.has_no_landmarks() {
        return None;
    }

    let pinch_strength = match (frame.get(THUMB_TIP), frame.get(INDEX_TIP)) {
        (Some(thumb), Some(index)) => pinch_strength(thumb, index, hand_scale(frame)),
        _ => 0.0,
    };
    let pinch = pinch_strength > PINCH_THRESHOLD;

    // 片方が欠けた指は「曲げている」扱い
    let curled = |&(tip, mcp): &(usize, usize)| match (frame.get(tip), frame.get(mcp)) {
        (Some(t), Some(m)) => t.y > m.y,
        _ => true,
    };
    let point = match (frame.get(FINGERS[0].0), frame.get(FINGERS[0].1)) {
        (Some(tip), Some(mcp)) => tip.y < mcp.y && FINGERS[1..].iter().all(curled),
        _ => false,
    };
    let grab = FINGERS.iter().all(curled) && !pinch;

    Some(HandGesture {
        pinch,
        pinch_strength,
        point,
        grab,
    })
}

/// 手首〜中指MCPの画像平面距離
fn hand_scale(frame: &LandmarkFrame) -> f32 {
    match (frame.get(WRIST), frame.get(MIDDLE_MCP)) {
        (Some(w), Some(m)) => {
            let scale = (w.x - m.x).hypot(w.y - m.y);
            if scale > f32::EPSILON {
                scale
            } else {
                FALLBACK_HAND_SCALE
            }
        }
        _ => FALLBACK_HAND_SCALE,
    }
}

fn pinch_strength(thumb: &Landmark, index: &Landmark, scale: f32) -> f32 {
    let d = (thumb.coords() - index.coords()).norm();
    (1.0 - d / (scale * PINCH_RANGE)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinchEdge {
    Start,
    End,
}

/// 1手ぶんのピンチ開始・終了の立ち上がり検出
#[derive(Debug, Clone, Default)]
pub struct PinchTracker {
    pinching: bool,
}

impl PinchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pinching(&self) -> bool {
        self.pinching
    }

    /// 手を見失った (None) 場合はピンチ解除として扱う
    pub fn update(&mut self, gesture: Option<&HandGesture>) -> Option<PinchEdge> {
        let now = gesture.is_some_and(|g| g.pinch);
        let was = std::mem::replace(&mut self.pinching, now);
        match (was, now) {
            (false, true) => Some(PinchEdge::Start),
            (true, false) => Some(PinchEdge::End),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq_f32(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    /// 手首 (0.5, 0.9)、中指MCP (0.5, 0.7) でスケール 0.2 の手。指は全て伸ばした状態
    fn open_hand() -> LandmarkFrame {
        let mut frame = LandmarkFrame::empty(21);
        frame.set(WRIST, Some(Landmark::new(0.5, 0.9, 0.0)));
        for (i, &(tip, mcp)) in FINGERS.iter().enumerate() {
            let x = 0.44 + 0.04 * i as f32;
            frame.set(mcp, Some(Landmark::new(x, 0.7, 0.0)));
            frame.set(tip, Some(Landmark::new(x, 0.5, 0.0)));
        }
        frame.set(MIDDLE_MCP, Some(Landmark::new(0.5, 0.7, 0.0)));
        frame.set(THUMB_TIP, Some(Landmark::new(0.1, 0.7, 0.0)));
        frame
    }

    fn curl(frame: &mut LandmarkFrame, finger: usize) {
        let (tip, mcp) = FINGERS[finger];
        let m = *frame.get(mcp).unwrap();
        frame.set(tip, Some(Landmark::new(m.x, m.y + 0.05, 0.0)));
    }

    #[test]
    fn test_empty_frame_has_no_gesture() {
        assert_eq!(classify(&LandmarkFrame::empty(21)), None);
    }

    #[test]
    fn test_open_hand() {
        let g = classify(&open_hand()).unwrap();
        assert!(!g.pinch);
        assert!(!g.point);
        assert!(!g.grab);
        // 親指と人差し指は 0.32 以上離れている
        assert_eq!(g.pinch_strength, 0.0);
    }

    #[test]
    fn test_pinch_strength_normalized_by_hand_scale() {
        let mut frame = open_hand();
        let index = *frame.get(INDEX_TIP).unwrap();
        // スケール 0.2 × 1.6 = 0.32 に対して距離 0.08 → 0.75
        frame.set(THUMB_TIP, Some(Landmark::new(index.x + 0.08, index.y, 0.0)));
        let g = classify(&frame).unwrap();
        assert!(approx_eq_f32(g.pinch_strength, 0.75, 1e-5));
        assert!(g.pinch);

        // 同じ距離でも手が2倍なら強さは上がる
        let mut big = frame.clone();
        big.set(WRIST, Some(Landmark::new(0.5, 1.1, 0.0)));
        let stronger = classify(&big).unwrap();
        assert!(stronger.pinch_strength > g.pinch_strength);
    }

    #[test]
    fn test_pinch_threshold_exclusive() {
        let mut frame = open_hand();
        let index = *frame.get(INDEX_TIP).unwrap();
        // 距離 0.32 × 0.6 で強さ ~0.4
        frame.set(THUMB_TIP, Some(Landmark::new(index.x + 0.192, index.y, 0.0)));
        let g = classify(&frame).unwrap();
        assert!(g.pinch_strength < PINCH_THRESHOLD);
        assert!(!g.pinch);
    }

    #[test]
    fn test_missing_wrist_uses_fallback_scale() {
        let mut frame = open_hand();
        frame.set(WRIST, None);
        let index = *frame.get(INDEX_TIP).unwrap();
        // 0.1 × 1.6 = 0.16 に対して距離 0.04 → 0.75
        frame.set(THUMB_TIP, Some(Landmark::new(index.x, index.y + 0.04, 0.0)));
        let g = classify(&frame).unwrap();
        assert!(approx_eq_f32(g.pinch_strength, 0.75, 1e-5));
    }

    #[test]
    fn test_point() {
        let mut frame = open_hand();
        for finger in 1..4 {
            curl(&mut frame, finger);
        }
        let g = classify(&frame).unwrap();
        assert!(g.point);
        assert!(!g.grab);
    }

    #[test]
    fn test_grab() {
        let mut frame = open_hand();
        for finger in 0..4 {
            curl(&mut frame, finger);
        }
        let g = classify(&frame).unwrap();
        assert!(g.grab);
        assert!(!g.point);
    }

    #[test]
    fn test_pinch_suppresses_grab() {
        let mut frame = open_hand();
        for finger in 0..4 {
            curl(&mut frame, finger);
        }
        let index = *frame.get(INDEX_TIP).unwrap();
        frame.set(THUMB_TIP, Some(index));
        let g = classify(&frame).unwrap();
        assert!(g.pinch);
        assert!(!g.grab);
    }

    #[test]
    fn test_pinch_edges() {
        let pinched = HandGesture {
            pinch: true,
            pinch_strength: 0.9,
            ..Default::default()
        };
        let open = HandGesture::default();

        let mut tracker = PinchTracker::new();
        assert_eq!(tracker.update(Some(&open)), None);
        assert_eq!(tracker.update(Some(&pinched)), Some(PinchEdge::Start));
        assert_eq!(tracker.update(Some(&pinched)), None);
        assert!(tracker.is_pinching());
        assert_eq!(tracker.update(Some(&open)), Some(PinchEdge::End));
        assert_eq!(tracker.update(Some(&open)), None);
    }

    #[test]
    fn test_lost_hand_ends_pinch() {
        let pinched = HandGesture {
            pinch: true,
            pinch_strength: 1.0,
            ..Default::default()
        };
        let mut tracker = PinchTracker::new();
        tracker.update(Some(&pinched));
        assert_eq!(tracker.update(None), Some(PinchEdge::End));
        assert_eq!(tracker.update(None), None);
    }
}
