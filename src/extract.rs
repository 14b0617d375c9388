//! Benchmark and stutter record extraction from raw log text.
//!
//! Two record grammars exist in the wild:
//!
//! ```text
//! Primary:
//!   [<ts>] <scene>_<run> - Samples: <n>, Duration: <d>s
//!   === FPS STATISTICS ===
//!   Mean: <v>, Median: <v>, Min: <v>, Max: <v>
//!   Frames < 60 FPS: <count> (<percent>%)      (also 45, 30, 15)
//!   === GAME THREAD (ms) ===
//!   Mean: <v>, Median: <v>, Min: <v>, Max: <v>
//!   === RENDER THREAD (ms) ===
//!   ...
//!   === GPU TIME (ms) ===
//!   ...
//!
//! Legacy:
//!   [<ts>] <scene>_<run> - Samples: <n>, Duration: <d>s
//!   MEAN: <v>
//!   Median: <v>, Min: <v>, Max: <v>
//!   Frames < 60 FPS: <count> (<percent>%)      (also 45, 30, 15)
//! ```
//!
//! Logs carry no version tag, so the primary grammar is tried first and the
//! legacy one only when the primary grammar matched nothing. Stutter lines
//! (`[<ts>] !!! STUTTER !!! <fps> FPS`) are scanned independently.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{AnalyzerError, Result};
use crate::schema::{
    BenchmarkRecord, Extraction, FrameThresholds, Quartet, RunStats, StutterEvent,
    ThreadTimes, ThresholdBucket,
};
use crate::LogFormat;

/// Logged percentages may drift this far (percentage points) from
/// `frames / samples` before a warning is emitted.
pub const DEFAULT_PERCENT_TOLERANCE: f64 = 0.5;

// Number captures take any token up to the next delimiter so that garbage in
// a well-shaped record is reported instead of silently not matching.
const NUM: &str = r"[^\s,()%]+";

const HEADER: &str = r"\[.+?\] (?P<scene>.+?)_(?P<run>[^\s_]+) - Samples: (?P<samples>[^\s,]+), Duration: (?P<duration>[^\s,]+?)s\s+";

fn quartet(prefix: &str) -> String {
    format!(
        r"Mean: (?P<{prefix}_mean>{NUM}), Median: (?P<{prefix}_median>{NUM}), Min: (?P<{prefix}_min>{NUM}), Max: (?P<{prefix}_max>{NUM})"
    )
}

fn thresholds() -> String {
    FrameThresholds::CUTOFFS
        .iter()
        .map(|n| format!(r"\s+Frames < {n} FPS: (?P<b{n}_frames>{NUM}) \((?P<b{n}_pct>{NUM})%\)"))
        .collect()
}

static PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"{HEADER}=== FPS STATISTICS ===\s+{fps}{thresholds}\s+=== GAME THREAD \(ms\) ===\s+{gt}\s+=== RENDER THREAD \(ms\) ===\s+{rt}\s+=== GPU TIME \(ms\) ===\s+{gpu}",
        fps = quartet("fps"),
        thresholds = thresholds(),
        gt = quartet("gt"),
        rt = quartet("rt"),
        gpu = quartet("gpu"),
    );
    Regex::new(&pattern).expect("primary benchmark regex")
});

static LEGACY: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"{HEADER}MEAN: (?P<fps_mean>{NUM})\s+Median: (?P<fps_median>{NUM}), Min: (?P<fps_min>{NUM}), Max: (?P<fps_max>{NUM}){thresholds}",
        thresholds = thresholds(),
    );
    Regex::new(&pattern).expect("legacy benchmark regex")
});

static STUTTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?P<ts>.+?)\] !!! STUTTER !!! (?P<fps>\S+) FPS").expect("stutter regex")
});

/// Typed access to the named groups of one match.
struct Fields<'c, 't> {
    caps: &'c Captures<'t>,
    format: LogFormat,
}

impl Fields<'_, '_> {
    fn text(&self, name: &'static str) -> &str {
        self.caps.name(name).map_or("", |m| m.as_str())
    }

    fn f64(&self, name: &'static str) -> Result<f64> {
        let token = self.text(name);
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(AnalyzerError::malformed(self.format, name, token)),
        }
    }

    fn u64(&self, name: &'static str) -> Result<u64> {
        let token = self.text(name);
        token
            .parse::<u64>()
            .map_err(|_| AnalyzerError::malformed(self.format, name, token))
    }

    fn u32(&self, name: &'static str) -> Result<u32> {
        let token = self.text(name);
        token
            .parse::<u32>()
            .map_err(|_| AnalyzerError::malformed(self.format, name, token))
    }

    fn quartet(
        &self,
        mean: &'static str,
        median: &'static str,
        min: &'static str,
        max: &'static str,
    ) -> Result<Quartet> {
        Ok(Quartet {
            mean: self.f64(mean)?,
            median: self.f64(median)?,
            min: self.f64(min)?,
            max: self.f64(max)?,
        })
    }

    fn bucket(&self, frames: &'static str, pct: &'static str) -> Result<ThresholdBucket> {
        Ok(ThresholdBucket {
            frames: self.u64(frames)?,
            percent: self.f64(pct)?,
        })
    }

    fn run_stats(&self) -> Result<RunStats> {
        Ok(RunStats {
            scene: self.text("scene").to_string(),
            run: self.u32("run")?,
            samples: self.u64("samples")?,
            duration_s: self.f64("duration")?,
            fps: self.quartet("fps_mean", "fps_median", "fps_min", "fps_max")?,
            thresholds: FrameThresholds {
                below_60: self.bucket("b60_frames", "b60_pct")?,
                below_45: self.bucket("b45_frames", "b45_pct")?,
                below_30: self.bucket("b30_frames", "b30_pct")?,
                below_15: self.bucket("b15_frames", "b15_pct")?,
            },
        })
    }
}

fn parse_primary(caps: &Captures<'_>) -> Result<BenchmarkRecord> {
    let fields = Fields {
        caps,
        format: LogFormat::Primary,
    };
    Ok(BenchmarkRecord::Instrumented {
        stats: fields.run_stats()?,
        threads: ThreadTimes {
            game_thread: fields.quartet("gt_mean", "gt_median", "gt_min", "gt_max")?,
            render_thread: fields.quartet("rt_mean", "rt_median", "rt_min", "rt_max")?,
            gpu_time: fields.quartet("gpu_mean", "gpu_median", "gpu_min", "gpu_max")?,
        },
    })
}

fn parse_legacy(caps: &Captures<'_>) -> Result<BenchmarkRecord> {
    let fields = Fields {
        caps,
        format: LogFormat::Legacy,
    };
    Ok(BenchmarkRecord::Legacy(fields.run_stats()?))
}

/// Records of the primary grammar, in text order.
pub fn primary_records(text: &str) -> impl Iterator<Item = Result<BenchmarkRecord>> + '_ {
    PRIMARY.captures_iter(text).map(|caps| parse_primary(&caps))
}

/// Records of the legacy grammar, in text order.
pub fn legacy_records(text: &str) -> impl Iterator<Item = Result<BenchmarkRecord>> + '_ {
    LEGACY.captures_iter(text).map(|caps| parse_legacy(&caps))
}

/// Stutter lines, in text order.
pub fn stutter_events(text: &str) -> impl Iterator<Item = Result<StutterEvent>> + '_ {
    STUTTER.captures_iter(text).map(|caps| {
        let token = caps.name("fps").map_or("", |m| m.as_str());
        let fps = match token.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                return Err(AnalyzerError::MalformedNumber {
                    field: "stutter_fps",
                    token: token.to_string(),
                    format: "stutter",
                })
            }
        };
        Ok(StutterEvent {
            timestamp: caps.name("ts").map_or("", |m| m.as_str()).to_string(),
            fps,
        })
    })
}

/// Log scanner; holds the tolerances used for consistency warnings.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    pub percent_tolerance: f64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            percent_tolerance: DEFAULT_PERCENT_TOLERANCE,
        }
    }
}

impl Extractor {
    pub fn new(percent_tolerance: f64) -> Self {
        Self { percent_tolerance }
    }

    /// Scan `text` for benchmark records and stutter events.
    ///
    /// Zero matching records is not an error; see [`Extraction::is_empty`].
    /// A malformed number in any match fails the whole extraction.
    pub fn extract(&self, text: &str) -> Result<Extraction> {
        let primary = primary_records(text).collect::<Result<Vec<_>>>()?;
        let (format, benchmarks) = if !primary.is_empty() {
            (Some(LogFormat::Primary), primary)
        } else {
            let legacy = legacy_records(text).collect::<Result<Vec<_>>>()?;
            let format = (!legacy.is_empty()).then_some(LogFormat::Legacy);
            (format, legacy)
        };
        debug_assert!(benchmarks.iter().all(|r| Some(r.format()) == format));
        let stutters = stutter_events(text).collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            format = format.map_or("none", |f| f.as_str()),
            records = benchmarks.len(),
            stutters = stutters.len(),
            "scanned benchmark log"
        );

        for record in &benchmarks {
            self.check_percentages(record.stats());
        }

        Ok(Extraction {
            format,
            benchmarks,
            stutters,
        })
    }

    fn check_percentages(&self, stats: &RunStats) {
        if stats.samples == 0 {
            return;
        }
        for (cutoff, bucket) in stats.thresholds.buckets() {
            let expected = bucket.frames as f64 / stats.samples as f64 * 100.0;
            if (expected - bucket.percent).abs() > self.percent_tolerance {
                tracing::warn!(
                    scene = %stats.scene,
                    run = stats.run,
                    cutoff,
                    logged = bucket.percent,
                    expected,
                    "frame threshold percentage disagrees with frame count"
                );
            }
        }
    }
}

/// [`Extractor::extract`] with default tolerances.
pub fn extract(text: &str) -> Result<Extraction> {
    Extractor::default().extract(text)
}
