use anyhow::{Context, Result};
use avatar_rig::config::Config;
use avatar_rig::fusion::{CameraPoseSample, SourceWriter};
use avatar_rig::osc::OscSink;
use avatar_rig::pipeline::Pipeline;
use avatar_rig::pose::{FrameSchema, LandmarkFrame};
use avatar_rig::ragdoll::SimpleWorld;
use serde::Deserialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config.toml";
const DEFAULT_DT: f32 = 1.0 / 60.0;

/// キャプチャ1行 = 1ティック
#[derive(Debug, Deserialize)]
struct CaptureTick {
    #[serde(default)]
    dt: Option<f32>,
    #[serde(default)]
    samples: Vec<CaptureSample>,
    /// このティックで停止するカメラ
    #[serde(default)]
    stop: Vec<u32>,
    #[serde(default)]
    toggle_ragdoll: bool,
    /// ラグドール剛体を追跡位置へ寄せる係数
    #[serde(default)]
    blend: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CaptureSample {
    camera: u32,
    /// カメラの初出時にだけ見る
    #[serde(default = "default_schema")]
    schema: FrameSchema,
    normalized: LandmarkFrame,
    #[serde(default)]
    world: Option<LandmarkFrame>,
}

fn default_schema() -> FrameSchema {
    FrameSchema::Pose
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let capture_path = args
        .next()
        .context("usage: avatar-rig <capture.jsonl> [config.toml]")?;
    let config_path = args.next().unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path);

    info!("avatar-rig {}", env!("RIG_BUILD_VERSION"));
    info!("replaying {}", capture_path);

    let sink = if config.osc.enabled {
        info!("forwarding pose to {}", config.osc.addr);
        Some(OscSink::new(&config.osc.addr)?)
    } else {
        None
    };

    let mut pipeline = Pipeline::new(&config, SimpleWorld::new(config.ragdoll.gravity));
    let mut cameras: HashMap<u32, SourceWriter> = HashMap::new();

    let file = File::open(&capture_path).with_context(|| format!("Failed to open {}", capture_path))?;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let tick: CaptureTick = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid capture line", capture_path, line_no + 1))?;

        for camera in &tick.stop {
            if let Some(writer) = cameras.remove(camera) {
                pipeline.remove_source(writer.id())?;
            }
        }

        for sample in tick.samples {
            let writer = match cameras.entry(sample.camera) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => match pipeline.add_source(sample.schema) {
                    Ok(writer) => e.insert(writer),
                    Err(err) => {
                        warn!("camera {}: {}", sample.camera, err);
                        continue;
                    }
                },
            };
            let published = writer.publish(CameraPoseSample {
                normalized: sample.normalized,
                world: sample.world,
            });
            if let Err(e) = published {
                warn!("camera {}: {}", sample.camera, e);
            }
        }

        if tick.toggle_ragdoll {
            match pipeline.toggle_ragdoll() {
                Ok(mode) => info!("mode -> {:?}", mode),
                Err(e) => warn!("ragdoll toggle ignored: {}", e),
            }
        }
        if let Some(alpha) = tick.blend {
            pipeline.blend_to_tracking(Some(alpha));
        }

        let report = pipeline.tick(tick.dt.unwrap_or(DEFAULT_DT));
        for event in &report.pinch_events {
            info!("{} pinch {:?} ({:.2})", event.source, event.edge, event.strength);
        }
        debug!(
            "tick {} {:?} confidence={:?} mode={:?} support={:?} applied={} skipped={}",
            report.tick,
            report.fusion,
            report.confidence,
            report.mode,
            report.support_leg,
            report.applied,
            report.skipped.len()
        );

        if let Some(sink) = &sink {
            if let Err(e) = sink.send_pose(pipeline.avatar().visual()) {
                warn!("osc send failed: {:#}", e);
            }
        }
    }

    let avatar = pipeline.avatar();
    let root = avatar.root().position;
    println!("ticks:  {}", pipeline.ticks());
    println!("mode:   {:?}", avatar.mode());
    println!("root:   [{:.3}, {:.3}, {:.3}]", root.x, root.y, root.z);
    println!(
        "joints: {}/{} visible",
        avatar.rig().iter().filter(|j| j.visible).count(),
        avatar.rig().len()
    );
    Ok(())
}
