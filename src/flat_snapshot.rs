//! Aggregated snapshots in the flat layout written by the web viewer.
//!
//! That layout keys `evolutionData` by scene name and spreads thread timings
//! over flat per-row fields:
//!
//! ```text
//! {"evolutionData": {"<scene>": [{"run": 0, "mean": .., "gameThreadMean": .., ..}]},
//!  "sceneAverages": [{"name": "<scene>", "meanFPS": .., "hasThreadData": true,
//!                     "gameThreadMean": .., "minGameThreadMean": .., ..}],
//!  "stutters": [..], "fileName": "..", "sharedAt": ".."}
//! ```
//!
//! Rows without thread data (absent fields, or `hasThreadData: false`) load
//! as `None`, never as zero timings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::aggregate::{
    Analysis, RunSummary, SceneAggregate, SceneRuns, ThreadTimeAggregate, TimingAggregate,
};
use crate::schema::{Quartet, StutterEvent, ThreadTimes};
use crate::LogFormat;

fn quartet(
    mean: Option<f64>,
    median: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
) -> Option<Quartet> {
    Some(Quartet {
        mean: mean?,
        median: median?,
        min: min?,
        max: max?,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRun {
    pub run: u32,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    #[serde(rename = "below60", default)]
    pub below_60: f64,
    #[serde(rename = "below45", default)]
    pub below_45: f64,
    #[serde(rename = "below30", default)]
    pub below_30: f64,
    #[serde(rename = "below15", default)]
    pub below_15: f64,
    #[serde(default)]
    pub samples: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_thread_mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_thread_median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_thread_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_thread_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_thread_mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_thread_median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_thread_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_thread_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_time_mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_time_median: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_time_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_time_max: Option<f64>,
}

impl FlatRun {
    /// All twelve timing fields, or `None`.
    fn thread_times(&self) -> Option<ThreadTimes> {
        Some(ThreadTimes {
            game_thread: quartet(
                self.game_thread_mean,
                self.game_thread_median,
                self.game_thread_min,
                self.game_thread_max,
            )?,
            render_thread: quartet(
                self.render_thread_mean,
                self.render_thread_median,
                self.render_thread_min,
                self.render_thread_max,
            )?,
            gpu_time: quartet(
                self.gpu_time_mean,
                self.gpu_time_median,
                self.gpu_time_min,
                self.gpu_time_max,
            )?,
        })
    }

    /// The flat layout records no duration; it loads as zero.
    fn into_summary(self) -> RunSummary {
        let thread_times = self.thread_times();
        RunSummary {
            run: self.run,
            samples: self.samples,
            duration_s: 0.0,
            fps: Quartet {
                mean: self.mean,
                median: self.median,
                min: self.min,
                max: self.max,
            },
            below_60: self.below_60,
            below_45: self.below_45,
            below_30: self.below_30,
            below_15: self.below_15,
            thread_times,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatSceneAverage {
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
    #[serde(rename = "below60", default)]
    pub below_60: f64,
    #[serde(rename = "below45", default)]
    pub below_45: f64,
    #[serde(rename = "below30", default)]
    pub below_30: f64,
    #[serde(rename = "below15", default)]
    pub below_15: f64,
    #[serde(rename = "totalSamples", default)]
    pub total_samples: u64,
    #[serde(rename = "hasThreadData", default)]
    pub has_thread_data: bool,
    #[serde(rename = "gameThreadMean", default)]
    pub game_thread_mean: f64,
    #[serde(rename = "minGameThreadMean", default)]
    pub min_game_thread_mean: f64,
    #[serde(rename = "maxGameThreadMean", default)]
    pub max_game_thread_mean: f64,
    #[serde(rename = "renderThreadMean", default)]
    pub render_thread_mean: f64,
    #[serde(rename = "minRenderThreadMean", default)]
    pub min_render_thread_mean: f64,
    #[serde(rename = "maxRenderThreadMean", default)]
    pub max_render_thread_mean: f64,
    #[serde(rename = "gpuTimeMean", default)]
    pub gpu_time_mean: f64,
    #[serde(rename = "minGpuTimeMean", default)]
    pub min_gpu_time_mean: f64,
    #[serde(rename = "maxGpuTimeMean", default)]
    pub max_gpu_time_mean: f64,
}

impl FlatSceneAverage {
    fn into_aggregate(self) -> SceneAggregate {
        let thread_times = self.has_thread_data.then(|| ThreadTimeAggregate {
            game_thread: TimingAggregate {
                mean: self.game_thread_mean,
                min_mean: self.min_game_thread_mean,
                max_mean: self.max_game_thread_mean,
            },
            render_thread: TimingAggregate {
                mean: self.render_thread_mean,
                min_mean: self.min_render_thread_mean,
                max_mean: self.max_render_thread_mean,
            },
            gpu_time: TimingAggregate {
                mean: self.gpu_time_mean,
                min_mean: self.min_gpu_time_mean,
                max_mean: self.max_gpu_time_mean,
            },
        });
        SceneAggregate {
            name: self.name,
            mean_fps: self.mean_fps,
            median_fps: self.median_fps,
            min_fps: self.min_fps,
            max_fps: self.max_fps,
            min_mean_fps: self.min_mean_fps,
            max_mean_fps: self.max_mean_fps,
            below_60: self.below_60,
            below_45: self.below_45,
            below_30: self.below_30,
            below_15: self.below_15,
            total_samples: self.total_samples,
            thread_times,
        }
    }
}

/// Scene name → runs, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMap(pub Vec<(String, Vec<FlatRun>)>);

impl Serialize for SceneMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (scene, runs) in &self.0 {
            map.serialize_entry(scene, runs)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SceneMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SceneMapVisitor;

        impl<'de> Visitor<'de> for SceneMapVisitor {
            type Value = SceneMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of scene name to runs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SceneMap, A::Error> {
                let mut scenes = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((scene, runs)) = access.next_entry::<String, Vec<FlatRun>>()? {
                    scenes.push((scene, runs));
                }
                Ok(SceneMap(scenes))
            }
        }

        deserializer.deserialize_map(SceneMapVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatSnapshot {
    pub evolution_data: SceneMap,
    pub scene_averages: Vec<FlatSceneAverage>,
    #[serde(default)]
    pub stutters: Vec<StutterEvent>,
    #[serde(default)]
    pub file_name: Option<String>,
    pub shared_at: DateTime<Utc>,
}

impl FlatSnapshot {
    /// Convert to the nested [`Analysis`] shape. The log format is inferred:
    /// primary if any run carries thread timings, legacy otherwise.
    pub fn into_analysis(self) -> Analysis {
        let evolution: Vec<SceneRuns> = self
            .evolution_data
            .0
            .into_iter()
            .map(|(name, runs)| {
                let mut runs: Vec<RunSummary> =
                    runs.into_iter().map(FlatRun::into_summary).collect();
                runs.sort_by_key(|r| r.run);
                SceneRuns { name, runs }
            })
            .collect();

        let mut all_runs = evolution.iter().flat_map(|s| &s.runs).peekable();
        let format = if all_runs.peek().is_none() {
            None
        } else if all_runs.any(|r| r.thread_times.is_some()) {
            Some(LogFormat::Primary)
        } else {
            Some(LogFormat::Legacy)
        };

        Analysis {
            format,
            evolution,
            averages: self
                .scene_averages
                .into_iter()
                .map(FlatSceneAverage::into_aggregate)
                .collect(),
            stutters: self.stutters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEB_SNAPSHOT: &str = r#"{
      "evolutionData": {
        "Harbor_North": [
          {"run": 1, "mean": 51.48, "median": 50.9, "min": 12.4, "max": 70.1,
           "below60": 80.0, "below45": 14.97, "below30": 0.95, "below15": 0.14, "samples": 735,
           "gameThreadMean": 12.1, "gameThreadMedian": 11.8, "gameThreadMin": 7.0, "gameThreadMax": 40.1,
           "renderThreadMean": 13.3, "renderThreadMedian": 13.1, "renderThreadMin": 8.8, "renderThreadMax": 44.7,
           "gpuTimeMean": 19.4, "gpuTimeMedian": 19.6, "gpuTimeMin": 13.9, "gpuTimeMax": 80.6},
          {"run": 0, "mean": 65.13, "median": 64.2, "min": 41.3, "max": 88.9,
           "below60": 33.63, "below45": 1.34, "below30": 0, "below15": 0, "samples": 895}
        ],
        "Blockade1": [
          {"run": 0, "mean": 60.0, "median": 60.0, "min": 40.0, "max": 80.0,
           "below60": 50.0, "below45": 5.0, "below30": 0, "below15": 0, "samples": 100}
        ]
      },
      "sceneAverages": [
        {"name": "Harbor_North", "meanFPS": 58.97, "medianFPS": 58.2, "minFPS": 12.4, "maxFPS": 88.9,
         "minMeanFPS": 51.48, "maxMeanFPS": 65.13,
         "gameThreadMean": 5.45, "minGameThreadMean": 12.1, "maxGameThreadMean": 12.1,
         "renderThreadMean": 6.0, "minRenderThreadMean": 13.3, "maxRenderThreadMean": 13.3,
         "gpuTimeMean": 8.75, "minGpuTimeMean": 19.4, "maxGpuTimeMean": 19.4,
         "below60": 54.52, "below45": 7.49, "below30": 0.43, "below15": 0.06,
         "totalSamples": 1630, "hasThreadData": true},
        {"name": "Blockade1", "meanFPS": 60.0, "medianFPS": 60.0, "minFPS": 40.0, "maxFPS": 80.0,
         "minMeanFPS": 60.0, "maxMeanFPS": 60.0,
         "gameThreadMean": 0, "minGameThreadMean": 0, "maxGameThreadMean": 0,
         "renderThreadMean": 0, "minRenderThreadMean": 0, "maxRenderThreadMean": 0,
         "gpuTimeMean": 0, "minGpuTimeMean": 0, "maxGpuTimeMean": 0,
         "below60": 50.0, "below45": 5.0, "below30": 0, "below15": 0,
         "totalSamples": 100, "hasThreadData": false}
      ],
      "stutters": [{"timestamp": "2025.03.10-18.32.15", "fps": 9.91}],
      "fileName": "bench.log",
      "sharedAt": "2025-03-10T18:40:00.000Z"
    }"#;

    #[test]
    fn test_web_snapshot_converts_to_analysis() {
        let snapshot: FlatSnapshot = serde_json::from_str(WEB_SNAPSHOT).unwrap();
        assert_eq!(snapshot.file_name.as_deref(), Some("bench.log"));
        let analysis = snapshot.into_analysis();

        assert_eq!(analysis.format, Some(LogFormat::Primary));
        let names: Vec<_> = analysis.evolution.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Harbor_North", "Blockade1"]);

        let harbor = &analysis.evolution[0].runs;
        assert_eq!(harbor[0].run, 0);
        assert!(harbor[0].thread_times.is_none());
        let threads = harbor[1].thread_times.unwrap();
        assert_eq!(threads.gpu_time.max, 80.6);
        assert_eq!(harbor[1].samples, 735);

        let averages = &analysis.averages;
        assert_eq!(averages[0].total_samples, 1630);
        assert_eq!(averages[0].thread_times.unwrap().game_thread.min_mean, 12.1);
        assert!(averages[1].thread_times.is_none());
        assert_eq!(analysis.stutters.len(), 1);
    }

    #[test]
    fn test_partial_thread_fields_load_as_none() {
        let json = r#"{"run": 0, "mean": 1.0, "median": 1.0, "min": 1.0, "max": 1.0,
                      "gameThreadMean": 4.0}"#;
        let run: FlatRun = serde_json::from_str(json).unwrap();
        assert!(run.into_summary().thread_times.is_none());
    }

    #[test]
    fn test_without_thread_data_is_legacy() {
        let json = r#"{"evolutionData": {"S": [{"run": 0, "mean": 30.0, "median": 30.0,
                      "min": 20.0, "max": 40.0, "samples": 10}]},
                      "sceneAverages": [], "sharedAt": "2025-03-10T18:40:00Z"}"#;
        let snapshot: FlatSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.into_analysis().format, Some(LogFormat::Legacy));
    }
}
