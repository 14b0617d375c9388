use serde::{Deserialize, Serialize};

use crate::LogFormat;

/// Mean/median/min/max of one measured quantity over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartet {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBucket {
    pub frames: u64,
    pub percent: f64,
}

/// Frames below each FPS cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameThresholds {
    pub below_60: ThresholdBucket,
    pub below_45: ThresholdBucket,
    pub below_30: ThresholdBucket,
    pub below_15: ThresholdBucket,
}

impl FrameThresholds {
    pub const CUTOFFS: [u32; 4] = [60, 45, 30, 15];

    /// Buckets in `CUTOFFS` order.
    pub fn buckets(&self) -> [(u32, &ThresholdBucket); 4] {
        [
            (60, &self.below_60),
            (45, &self.below_45),
            (30, &self.below_30),
            (15, &self.below_15),
        ]
    }
}

/// Per-thread and GPU frame timings in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadTimes {
    pub game_thread: Quartet,
    pub render_thread: Quartet,
    pub gpu_time: Quartet,
}

/// Fields common to both log formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub scene: String,
    pub run: u32,
    pub samples: u64,
    pub duration_s: f64,
    pub fps: Quartet,
    pub thresholds: FrameThresholds,
}

/// One measured run of one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkRecord {
    Legacy(RunStats),
    Instrumented {
        stats: RunStats,
        threads: ThreadTimes,
    },
}

impl BenchmarkRecord {
    pub fn stats(&self) -> &RunStats {
        match self {
            BenchmarkRecord::Legacy(stats) => stats,
            BenchmarkRecord::Instrumented { stats, .. } => stats,
        }
    }

    pub fn thread_times(&self) -> Option<&ThreadTimes> {
        match self {
            BenchmarkRecord::Legacy(_) => None,
            BenchmarkRecord::Instrumented { threads, .. } => Some(threads),
        }
    }

    pub fn format(&self) -> LogFormat {
        match self {
            BenchmarkRecord::Legacy(_) => LogFormat::Legacy,
            BenchmarkRecord::Instrumented { .. } => LogFormat::Primary,
        }
    }
}

/// Frame-rate drop below the stutter alarm threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StutterEvent {
    /// Opaque log timestamp text.
    pub timestamp: String,
    pub fps: f64,
}

/// Result of scanning one log's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Grammar that produced `benchmarks`; `None` when nothing matched.
    pub format: Option<LogFormat>,
    pub benchmarks: Vec<BenchmarkRecord>,
    pub stutters: Vec<StutterEvent>,
}

impl Extraction {
    /// No benchmark record matched either grammar.
    pub fn is_empty(&self) -> bool {
        self.benchmarks.is_empty()
    }
}
