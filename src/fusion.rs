use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SmoothConfig;
use crate::error::TrackingError;
use crate::pose::{FrameSchema, Landmark, LandmarkFrame};
use crate::tracker::smooth_observed;

/// カメラ（ランドマーク供給元）の識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// 1カメラ・1ティック分の検出結果。publish のたびに丸ごと置き換わる
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraPoseSample {
    pub normalized: LandmarkFrame,
    #[serde(default)]
    pub world: Option<LandmarkFrame>,
}

/// 複数フレームをインデックスごとに平均する
///
/// 欠損は無視し、全入力で欠損なら結果も欠損。
/// 入力が無い・全て None なら Ok(None)。長さが揃わなければ SchemaMismatch
pub fn fuse<'a, I>(frames: I) -> Result<Option<LandmarkFrame>, TrackingError>
where
    I: IntoIterator<Item = Option<&'a LandmarkFrame>>,
{
    let frames: Vec<&LandmarkFrame> = frames.into_iter().flatten().collect();
    let Some(first) = frames.first() else {
        return Ok(None);
    };
    let len = first.len();
    if let Some(bad) = frames.iter().find(|f| f.len() != len) {
        return Err(TrackingError::SchemaMismatch {
            expected: len,
            actual: bad.len(),
        });
    }

    let landmarks = (0..len)
        .map(|i| {
            let mut sum = [0.0f32; 3];
            let mut count = 0usize;
            let mut vis_sum = 0.0f32;
            let mut vis_count = 0usize;
            for l in frames.iter().filter_map(|f| f.get(i)) {
                sum[0] += l.x;
                sum[1] += l.y;
                sum[2] += l.z;
                count += 1;
                if let Some(v) = l.visibility {
                    vis_sum += v;
                    vis_count += 1;
                }
            }
            if count == 0 {
                return None;
            }
            let n = count as f32;
            Some(Landmark {
                x: sum[0] / n,
                y: sum[1] / n,
                z: sum[2] / n,
                visibility: (vis_count > 0).then(|| vis_sum / vis_count as f32),
            })
        })
        .collect();
    Ok(Some(LandmarkFrame::new(landmarks)))
}

/// 最新サンプル1件だけを保持するスロット
#[derive(Debug, Default)]
struct Slot {
    latest: Mutex<Option<CameraPoseSample>>,
    frame_id: AtomicU64,
}

/// 検出スレッド側のハンドル
#[derive(Debug, Clone)]
pub struct SourceWriter {
    id: SourceId,
    schema: FrameSchema,
    slot: Arc<Slot>,
}

impl SourceWriter {
    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn schema(&self) -> FrameSchema {
        self.schema
    }

    /// スロットを上書きする。スキーマ長と合わないフレームは拒否
    pub fn publish(&self, sample: CameraPoseSample) -> Result<(), TrackingError> {
        let expected = self.schema.len();
        let lengths = std::iter::once(sample.normalized.len())
            .chain(sample.world.as_ref().map(LandmarkFrame::len));
        for actual in lengths {
            if actual != expected {
                return Err(TrackingError::SchemaMismatch { expected, actual });
            }
        }
        *self.slot.latest.lock() = Some(sample);
        self.slot.frame_id.fetch_add(1, Ordering::Release);
        Ok(())
    }
}

#[derive(Debug)]
struct SourceState {
    schema: FrameSchema,
    slot: Arc<Slot>,
    seen_frame: u64,
    smoothed: Option<CameraPoseSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionState {
    /// ワールド座標を持つソースを平均した
    World { sources: usize },
    /// ワールド座標が無く、正規化座標で代替した
    Degraded { source: SourceId },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedPose {
    pub frame: Option<LandmarkFrame>,
    pub state: FusionState,
}

impl FusedPose {
    pub fn empty() -> Self {
        Self {
            frame: None,
            state: FusionState::Empty,
        }
    }

    /// 縮退時の理由をエラー値として取り出す
    pub fn degradation(&self) -> Option<TrackingError> {
        match self.state {
            FusionState::Degraded { .. } => Some(TrackingError::DegradedFusion),
            _ => None,
        }
    }
}

/// ソースごとのスロットと平滑化状態を持つ融合器
pub struct MultiCameraFusion {
    sources: BTreeMap<SourceId, SourceState>,
    next_id: u32,
    source_alpha: f32,
    last_state: FusionState,
}

impl MultiCameraFusion {
    pub fn new(source_alpha: f32) -> Self {
        Self {
            sources: BTreeMap::new(),
            next_id: 0,
            source_alpha: source_alpha.clamp(0.0, 1.0),
            last_state: FusionState::Empty,
        }
    }

    pub fn from_config(config: &SmoothConfig) -> Self {
        Self::new(config.source)
    }

    pub fn add_source(&mut self, schema: FrameSchema) -> SourceWriter {
        let id = SourceId(self.next_id);
        self.next_id += 1;
        let slot = Arc::new(Slot::default());
        self.sources.insert(
            id,
            SourceState {
                schema,
                slot: slot.clone(),
                seen_frame: 0,
                smoothed: None,
            },
        );
        info!("{} added ({:?})", id, schema);
        SourceWriter { id, schema, slot }
    }

    /// 次の融合から除外する。書き込み側のハンドルが残っていても読まれない
    pub fn remove_source(&mut self, id: SourceId) -> Result<(), TrackingError> {
        match self.sources.remove(&id) {
            Some(_) => {
                info!("{} removed", id);
                Ok(())
            }
            None => Err(TrackingError::UnknownSource(id)),
        }
    }

    pub fn active_sources(&self) -> Vec<SourceId> {
        self.sources.keys().copied().collect()
    }

    pub fn last_state(&self) -> FusionState {
        self.last_state
    }

    /// 各スロットの最新値を平滑化し、Pose ソースだけを融合する。ロックは複製の間だけ
    pub fn fuse_latest(&mut self) -> FusedPose {
        let alpha = self.source_alpha;
        for state in self.sources.values_mut() {
            let frame_id = state.slot.frame_id.load(Ordering::Acquire);
            if frame_id == state.seen_frame {
                continue;
            }
            let latest = state.slot.latest.lock().clone();
            state.seen_frame = frame_id;
            if let Some(sample) = latest {
                state.smoothed = Some(smooth_sample(state.smoothed.as_ref(), &sample, alpha));
            }
        }

        let fused = self.fuse_smoothed();
        self.log_transition(fused.state);
        fused
    }

    /// Hand ソースの平滑化済み正規化フレーム（ID順）。融合はしない
    pub fn hand_frames(&self) -> impl Iterator<Item = (SourceId, &LandmarkFrame)> + '_ {
        self.sources
            .iter()
            .filter(|(_, s)| s.schema == FrameSchema::Hand)
            .filter_map(|(id, s)| s.smoothed.as_ref().map(|sample| (*id, &sample.normalized)))
    }

    fn pose_sources(&self) -> impl Iterator<Item = (&SourceId, &SourceState)> + '_ {
        self.sources.iter().filter(|(_, s)| s.schema == FrameSchema::Pose)
    }

    fn fuse_smoothed(&self) -> FusedPose {
        let worlds: Vec<&LandmarkFrame> = self
            .pose_sources()
            .filter_map(|(_, s)| s.smoothed.as_ref()?.world.as_ref())
            .collect();

        if !worlds.is_empty() {
            let sources = worlds.len();
            match fuse(worlds.into_iter().map(Some)) {
                Ok(Some(frame)) => {
                    return FusedPose {
                        frame: Some(frame),
                        state: FusionState::World { sources },
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("world landmark fusion failed: {}", e),
            }
        }

        // BTreeMap順なので最小IDのソースが選ばれる
        self.pose_sources()
            .find_map(|(id, s)| {
                s.smoothed.as_ref().map(|sample| FusedPose {
                    frame: Some(sample.normalized.clone()),
                    state: FusionState::Degraded { source: *id },
                })
            })
            .unwrap_or_else(FusedPose::empty)
    }

    fn log_transition(&mut self, state: FusionState) {
        let changed = std::mem::discriminant(&state) != std::mem::discriminant(&self.last_state);
        if changed {
            match state {
                FusionState::World { sources } => info!("fusion using world landmarks from {} source(s)", sources),
                FusionState::Degraded { source } => {
                    warn!("{}, using normalized landmarks of {}", TrackingError::DegradedFusion, source)
                }
                FusionState::Empty => warn!("fusion has no landmark data"),
            }
        }
        self.last_state = state;
    }
}

impl Default for MultiCameraFusion {
    fn default() -> Self {
        Self::from_config(&SmoothConfig::default())
    }
}

fn smooth_sample(prev: Option<&CameraPoseSample>, cur: &CameraPoseSample, alpha: f32) -> CameraPoseSample {
    let normalized = smooth_observed(prev.map(|p| &p.normalized), &cur.normalized, alpha);
    let world = cur
        .world
        .as_ref()
        .map(|w| smooth_observed(prev.and_then(|p| p.world.as_ref()), w, alpha));
    CameraPoseSample { normalized, world }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn approx_eq_f32(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    fn pose_frame(fill: impl Fn(usize) -> Option<Landmark>) -> LandmarkFrame {
        LandmarkFrame::new((0..FrameSchema::Pose.len()).map(fill).collect())
    }

    #[test]
    fn test_fuse_averages() {
        let a = LandmarkFrame::new(vec![Some(Landmark::with_visibility(0.0, 0.0, 0.0, 1.0))]);
        let b = LandmarkFrame::new(vec![Some(Landmark::new(2.0, 4.0, 6.0))]);
        let fused = fuse([Some(&a), Some(&b)]).unwrap().unwrap();
        let l = fused.get(0).unwrap();
        assert_eq!(l.coords(), nalgebra::Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(l.visibility, Some(1.0));
    }

    #[test]
    fn test_fuse_ignores_missing_index() {
        let a = LandmarkFrame::new(vec![None, Some(Landmark::new(1.0, 1.0, 1.0))]);
        let b = LandmarkFrame::new(vec![Some(Landmark::new(0.3, 0.4, 0.5)), Some(Landmark::new(3.0, 3.0, 3.0))]);
        let fused = fuse([Some(&a), Some(&b)]).unwrap().unwrap();
        assert_eq!(fused.get(0), b.get(0));
        assert_eq!(fused.get(1).unwrap().x, 2.0);
    }

    #[test]
    fn test_fuse_all_missing_index_is_none() {
        let a = LandmarkFrame::empty(2);
        let b = LandmarkFrame::empty(2);
        let fused = fuse([Some(&a), Some(&b)]).unwrap().unwrap();
        assert_eq!(fused.len(), 2);
        assert!(fused.has_no_landmarks());
    }

    #[test]
    fn test_fuse_empty_and_none() {
        assert_eq!(fuse(std::iter::empty::<Option<&LandmarkFrame>>()).unwrap(), None);
        assert_eq!(fuse([None::<&LandmarkFrame>, None]).unwrap(), None);
    }

    #[test]
    fn test_fuse_length_mismatch() {
        let a = LandmarkFrame::empty(33);
        let b = LandmarkFrame::empty(21);
        assert_eq!(
            fuse([Some(&a), Some(&b)]),
            Err(TrackingError::SchemaMismatch { expected: 33, actual: 21 })
        );
    }

    #[test]
    fn test_publish_rejects_wrong_length() {
        let mut fusion = MultiCameraFusion::default();
        let writer = fusion.add_source(FrameSchema::Pose);
        let sample = CameraPoseSample {
            normalized: LandmarkFrame::empty(21),
            world: None,
        };
        assert_eq!(
            writer.publish(sample),
            Err(TrackingError::SchemaMismatch { expected: 33, actual: 21 })
        );
        assert_eq!(fusion.fuse_latest().state, FusionState::Empty);
    }

    #[test]
    fn test_degraded_uses_lowest_source() {
        let mut fusion = MultiCameraFusion::new(1.0);
        let first = fusion.add_source(FrameSchema::Pose);
        let second = fusion.add_source(FrameSchema::Pose);
        let a = pose_frame(|_| Some(Landmark::new(0.1, 0.1, 0.0)));
        let b = pose_frame(|_| Some(Landmark::new(0.9, 0.9, 0.0)));
        second.publish(CameraPoseSample { normalized: b, world: None }).unwrap();
        first.publish(CameraPoseSample { normalized: a.clone(), world: None }).unwrap();

        let fused = fusion.fuse_latest();
        assert_eq!(fused.state, FusionState::Degraded { source: first.id() });
        assert_eq!(fused.frame, Some(a));
        assert_eq!(fused.degradation(), Some(TrackingError::DegradedFusion));
    }

    #[test]
    fn test_world_preferred_over_normalized() {
        let mut fusion = MultiCameraFusion::new(1.0);
        let first = fusion.add_source(FrameSchema::Pose);
        let second = fusion.add_source(FrameSchema::Pose);
        let world = pose_frame(|_| Some(Landmark::new(0.0, 1.0, 0.0)));
        first.publish(CameraPoseSample { normalized: LandmarkFrame::empty(33), world: None }).unwrap();
        second
            .publish(CameraPoseSample { normalized: LandmarkFrame::empty(33), world: Some(world.clone()) })
            .unwrap();

        let fused = fusion.fuse_latest();
        assert_eq!(fused.state, FusionState::World { sources: 1 });
        assert_eq!(fused.frame, Some(world));
    }

    #[test]
    fn test_latest_value_wins() {
        let mut fusion = MultiCameraFusion::new(1.0);
        let writer = fusion.add_source(FrameSchema::Pose);
        for i in 0..5 {
            let x = i as f32;
            let frame = pose_frame(|_| Some(Landmark::new(x, 0.0, 0.0)));
            writer.publish(CameraPoseSample { normalized: frame.clone(), world: Some(frame) }).unwrap();
        }
        let fused = fusion.fuse_latest();
        assert_eq!(fused.frame.unwrap().get(0).unwrap().x, 4.0);
    }

    #[test]
    fn test_per_source_smoothing() {
        let mut fusion = MultiCameraFusion::new(0.5);
        let writer = fusion.add_source(FrameSchema::Pose);
        let zero = pose_frame(|_| Some(Landmark::new(0.0, 0.0, 0.0)));
        let one = pose_frame(|_| Some(Landmark::new(1.0, 0.0, 0.0)));
        writer.publish(CameraPoseSample { normalized: zero.clone(), world: Some(zero) }).unwrap();
        fusion.fuse_latest();
        writer.publish(CameraPoseSample { normalized: one.clone(), world: Some(one) }).unwrap();
        let fused = fusion.fuse_latest();
        assert!(approx_eq_f32(fused.frame.unwrap().get(0).unwrap().x, 0.5, 1e-6));

        // 新フレームが無ければ平滑化は進まない
        let again = fusion.fuse_latest();
        assert!(approx_eq_f32(again.frame.unwrap().get(0).unwrap().x, 0.5, 1e-6));
    }

    #[test]
    fn test_landmark_lost_after_being_seen() {
        let mut fusion = MultiCameraFusion::new(0.6);
        let cam_a = fusion.add_source(FrameSchema::Pose);
        let cam_b = fusion.add_source(FrameSchema::Pose);
        let a = pose_frame(|_| Some(Landmark::new(0.0, 0.0, 0.0)));
        let b = pose_frame(|_| Some(Landmark::new(1.0, 0.0, 0.0)));
        cam_a.publish(CameraPoseSample { normalized: a.clone(), world: Some(a.clone()) }).unwrap();
        cam_b.publish(CameraPoseSample { normalized: b.clone(), world: Some(b.clone()) }).unwrap();
        let first = fusion.fuse_latest().frame.unwrap();
        assert!(approx_eq_f32(first.get(15).unwrap().x, 0.5, 1e-6));

        // A だけ左手首を見失う
        let mut lost = a;
        lost.set(15, None);
        cam_a.publish(CameraPoseSample { normalized: lost.clone(), world: Some(lost) }).unwrap();
        let fused = fusion.fuse_latest().frame.unwrap();
        assert!(approx_eq_f32(fused.get(15).unwrap().x, 1.0, 1e-6));
        assert!(approx_eq_f32(fused.get(14).unwrap().x, 0.5, 1e-6));
    }

    #[test]
    fn test_empty_frame_clears_smoothed_landmarks() {
        let mut fusion = MultiCameraFusion::new(0.6);
        let writer = fusion.add_source(FrameSchema::Pose);
        let full = pose_frame(|_| Some(Landmark::new(0.3, 0.3, 0.0)));
        writer.publish(CameraPoseSample { normalized: full.clone(), world: Some(full) }).unwrap();
        fusion.fuse_latest();

        let empty = LandmarkFrame::empty(33);
        writer.publish(CameraPoseSample { normalized: empty.clone(), world: Some(empty) }).unwrap();
        let fused = fusion.fuse_latest();
        assert!(fused.frame.unwrap().has_no_landmarks());
    }

    #[test]
    fn test_hand_sources_not_fused_with_pose() {
        let mut fusion = MultiCameraFusion::new(1.0);
        let hand = fusion.add_source(FrameSchema::Hand);
        let pose = fusion.add_source(FrameSchema::Pose);
        let hand_frame = LandmarkFrame::new(vec![Some(Landmark::new(0.7, 0.7, 0.0)); 21]);
        let world = pose_frame(|_| Some(Landmark::new(0.0, 1.0, 0.0)));
        hand.publish(CameraPoseSample { normalized: hand_frame.clone(), world: Some(hand_frame.clone()) })
            .unwrap();
        pose.publish(CameraPoseSample { normalized: world.clone(), world: Some(world.clone()) }).unwrap();

        let fused = fusion.fuse_latest();
        assert_eq!(fused.state, FusionState::World { sources: 1 });
        assert_eq!(fused.frame, Some(world));

        let hands: Vec<_> = fusion.hand_frames().collect();
        assert_eq!(hands, vec![(hand.id(), &hand_frame)]);
    }

    #[test]
    fn test_hand_only_is_empty_pose() {
        let mut fusion = MultiCameraFusion::new(1.0);
        let hand = fusion.add_source(FrameSchema::Hand);
        let frame = LandmarkFrame::new(vec![Some(Landmark::new(0.7, 0.7, 0.0)); 21]);
        hand.publish(CameraPoseSample { normalized: frame, world: None }).unwrap();
        assert_eq!(fusion.fuse_latest(), FusedPose::empty());
    }

    #[test]
    fn test_remove_source() {
        let mut fusion = MultiCameraFusion::default();
        let writer = fusion.add_source(FrameSchema::Pose);
        let frame = pose_frame(|_| Some(Landmark::new(0.0, 0.0, 0.0)));
        writer.publish(CameraPoseSample { normalized: frame, world: None }).unwrap();
        fusion.remove_source(writer.id()).unwrap();

        assert_eq!(fusion.fuse_latest().state, FusionState::Empty);
        assert_eq!(
            fusion.remove_source(writer.id()),
            Err(TrackingError::UnknownSource(writer.id()))
        );
    }

    #[test]
    fn test_writer_publishes_from_other_thread() {
        let mut fusion = MultiCameraFusion::new(1.0);
        let writer = fusion.add_source(FrameSchema::Pose);
        let handle = thread::spawn(move || {
            let frame = pose_frame(|_| Some(Landmark::new(0.25, 0.0, 0.0)));
            writer.publish(CameraPoseSample { normalized: frame.clone(), world: Some(frame) })
        });
        handle.join().unwrap().unwrap();
        let fused = fusion.fuse_latest();
        assert_eq!(fused.state, FusionState::World { sources: 1 });
    }
}
