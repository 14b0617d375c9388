//! Per-scene grouping and sample-weighted statistics.
//!
//! Every scene-level average is weighted by each run's sample count (a run
//! reporting zero samples weighs 1). Extrema are never weighted: a short
//! run with a deep dip still sets the scene minimum.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema::{BenchmarkRecord, Extraction, Quartet, StutterEvent, ThreadTimes};
use crate::LogFormat;

/// One run of a scene as plotted over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run: u32,
    pub samples: u64,
    pub duration_s: f64,
    #[serde(flatten)]
    pub fps: Quartet,
    #[serde(rename = "below60")]
    pub below_60: f64,
    #[serde(rename = "below45")]
    pub below_45: f64,
    #[serde(rename = "below30")]
    pub below_30: f64,
    #[serde(rename = "below15")]
    pub below_15: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_times: Option<ThreadTimes>,
}

impl RunSummary {
    fn from_record(record: &BenchmarkRecord) -> Self {
        let stats = record.stats();
        Self {
            run: stats.run,
            samples: stats.samples,
            duration_s: stats.duration_s,
            fps: stats.fps,
            below_60: stats.thresholds.below_60.percent,
            below_45: stats.thresholds.below_45.percent,
            below_30: stats.thresholds.below_30.percent,
            below_15: stats.thresholds.below_15.percent,
            thread_times: record.thread_times().copied(),
        }
    }

    /// Sample count used for weighting; a run reporting zero counts once.
    pub fn weight_samples(&self) -> u64 {
        self.samples.max(1)
    }

    /// Averaging weight of this run.
    pub fn weight(&self) -> f64 {
        self.weight_samples() as f64
    }
}

/// All runs of one scene, ascending by run number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRuns {
    pub name: String,
    pub runs: Vec<RunSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingAggregate {
    /// Sample-weighted mean of per-run means.
    pub mean: f64,
    pub min_mean: f64,
    pub max_mean: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadTimeAggregate {
    pub game_thread: TimingAggregate,
    pub render_thread: TimingAggregate,
    pub gpu_time: TimingAggregate,
}

/// Scene-level summary across all of its runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAggregate {
    pub name: String,
    #[serde(rename = "meanFPS")]
    pub mean_fps: f64,
    #[serde(rename = "medianFPS")]
    pub median_fps: f64,
    #[serde(rename = "minFPS")]
    pub min_fps: f64,
    #[serde(rename = "maxFPS")]
    pub max_fps: f64,
    #[serde(rename = "minMeanFPS")]
    pub min_mean_fps: f64,
    #[serde(rename = "maxMeanFPS")]
    pub max_mean_fps: f64,
    #[serde(rename = "below60")]
    pub below_60: f64,
    #[serde(rename = "below45")]
    pub below_45: f64,
    #[serde(rename = "below30")]
    pub below_30: f64,
    #[serde(rename = "below15")]
    pub below_15: f64,
    #[serde(rename = "totalSamples")]
    pub total_samples: u64,
    #[serde(
        rename = "threadTimes",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub thread_times: Option<ThreadTimeAggregate>,
}

/// Cross-scene summary for the overview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub scene_count: usize,
    pub total_samples: u64,
    #[serde(rename = "weightedMeanFPS")]
    pub weighted_mean_fps: f64,
    #[serde(rename = "minFPS")]
    pub min_fps: f64,
    #[serde(rename = "maxFPS")]
    pub max_fps: f64,
}

/// Full result of one parse + aggregate pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub format: Option<LogFormat>,
    #[serde(rename = "evolutionData")]
    pub evolution: Vec<SceneRuns>,
    #[serde(rename = "sceneAverages")]
    pub averages: Vec<SceneAggregate>,
    #[serde(default)]
    pub stutters: Vec<StutterEvent>,
}

impl Analysis {
    pub fn from_extraction(extraction: Extraction) -> Self {
        let evolution = group_by_scene(&extraction.benchmarks);
        let averages = scene_averages(&evolution);
        Self {
            format: extraction.format,
            evolution,
            averages,
            stutters: extraction.stutters,
        }
    }

    pub fn overview(&self) -> Option<Overview> {
        overview(&self.averages)
    }
}

/// Group records by scene in first-seen order, runs sorted ascending.
pub fn group_by_scene(records: &[BenchmarkRecord]) -> Vec<SceneRuns> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut scenes: Vec<SceneRuns> = Vec::new();

    for record in records {
        let name = record.stats().scene.as_str();
        let slot = *index.entry(name).or_insert_with(|| {
            scenes.push(SceneRuns {
                name: name.to_string(),
                runs: Vec::new(),
            });
            scenes.len() - 1
        });
        scenes[slot].runs.push(RunSummary::from_record(record));
    }

    // Stable: duplicate run numbers keep log order.
    for scene in &mut scenes {
        scene.runs.sort_by_key(|r| r.run);
    }
    scenes
}

fn weighted_mean(pairs: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let (sum, weight) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(s, w), (value, weight)| {
            (s + value * weight, w + weight)
        });
    if weight == 0.0 {
        0.0
    } else {
        sum / weight
    }
}

fn min_of(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(f64::INFINITY, f64::min)
}

fn max_of(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(f64::NEG_INFINITY, f64::max)
}

fn timing_aggregate(
    runs: &[(&ThreadTimes, f64)],
    pick: fn(&ThreadTimes) -> &Quartet,
) -> TimingAggregate {
    TimingAggregate {
        mean: weighted_mean(runs.iter().map(|(t, w)| (pick(t).mean, *w))),
        min_mean: min_of(runs.iter().map(|(t, _)| pick(t).mean)),
        max_mean: max_of(runs.iter().map(|(t, _)| pick(t).mean)),
    }
}

/// Thread/GPU aggregate over the instrumented runs only; `None` if there
/// are none.
fn thread_time_aggregate(runs: &[RunSummary]) -> Option<ThreadTimeAggregate> {
    let instrumented: Vec<(&ThreadTimes, f64)> = runs
        .iter()
        .filter_map(|r| r.thread_times.as_ref().map(|t| (t, r.weight())))
        .collect();
    if instrumented.is_empty() {
        return None;
    }
    Some(ThreadTimeAggregate {
        game_thread: timing_aggregate(&instrumented, |t| &t.game_thread),
        render_thread: timing_aggregate(&instrumented, |t| &t.render_thread),
        gpu_time: timing_aggregate(&instrumented, |t| &t.gpu_time),
    })
}

impl SceneAggregate {
    /// Summarise one scene. `scene.runs` must not be empty.
    pub fn from_runs(scene: &SceneRuns) -> Self {
        let runs = &scene.runs;
        let weighted = |pick: fn(&RunSummary) -> f64| {
            weighted_mean(runs.iter().map(|r| (pick(r), r.weight())))
        };

        Self {
            name: scene.name.clone(),
            mean_fps: weighted(|r| r.fps.mean),
            median_fps: weighted(|r| r.fps.median),
            min_fps: min_of(runs.iter().map(|r| r.fps.min)),
            max_fps: max_of(runs.iter().map(|r| r.fps.max)),
            min_mean_fps: min_of(runs.iter().map(|r| r.fps.mean)),
            max_mean_fps: max_of(runs.iter().map(|r| r.fps.mean)),
            below_60: weighted(|r| r.below_60),
            below_45: weighted(|r| r.below_45),
            below_30: weighted(|r| r.below_30),
            below_15: weighted(|r| r.below_15),
            total_samples: runs
                .iter()
                .fold(0u64, |acc, r| acc.saturating_add(r.weight_samples())),
            thread_times: thread_time_aggregate(runs),
        }
    }
}

pub fn scene_averages(scenes: &[SceneRuns]) -> Vec<SceneAggregate> {
    scenes
        .iter()
        .filter(|s| !s.runs.is_empty())
        .map(SceneAggregate::from_runs)
        .collect()
}

/// Weighted mean FPS and FPS range across scenes; `None` for no scenes.
pub fn overview(averages: &[SceneAggregate]) -> Option<Overview> {
    if averages.is_empty() {
        return None;
    }
    Some(Overview {
        scene_count: averages.len(),
        total_samples: averages
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.total_samples)),
        weighted_mean_fps: weighted_mean(
            averages
                .iter()
                .map(|s| (s.mean_fps, s.total_samples as f64)),
        ),
        min_fps: min_of(averages.iter().map(|s| s.min_fps)),
        max_fps: max_of(averages.iter().map(|s| s.max_fps)),
    })
}
