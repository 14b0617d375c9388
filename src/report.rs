//! Report envelope and display-ready views of an [`Analysis`].

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::aggregate::{Analysis, Overview, SceneAggregate, SceneRuns};

pub const SCHEMA_VERSION: u32 = 1;

/// Colour band of an FPS value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FpsTier {
    Good,
    Average,
    Poor,
    Bad,
}

impl FpsTier {
    pub fn classify(fps: f64) -> Self {
        if fps >= 60.0 {
            FpsTier::Good
        } else if fps >= 45.0 {
            FpsTier::Average
        } else if fps >= 30.0 {
            FpsTier::Poor
        } else {
            FpsTier::Bad
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FpsTier::Good => "good",
            FpsTier::Average => "average",
            FpsTier::Poor => "poor",
            FpsTier::Bad => "bad",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneMean {
    pub scene: String,
    pub mean: f64,
}

/// Mean FPS of every scene for one run number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRow {
    pub run: u32,
    pub scenes: Vec<SceneMean>,
}

/// One point per run number, ascending; scenes missing a run are left out
/// of that row.
pub fn evolution_rows(evolution: &[SceneRuns]) -> Vec<EvolutionRow> {
    let mut rows: Vec<EvolutionRow> = Vec::new();
    for scene in evolution {
        for run in &scene.runs {
            let value = SceneMean {
                scene: scene.name.clone(),
                mean: run.fps.mean,
            };
            match rows.iter_mut().find(|r| r.run == run.run) {
                Some(row) => row.scenes.push(value),
                None => rows.push(EvolutionRow {
                    run: run.run,
                    scenes: vec![value],
                }),
            }
        }
    }
    rows.sort_by_key(|r| r.run);
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneRow {
    pub run: u32,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

pub fn scene_rows(scene: &SceneRuns) -> Vec<SceneRow> {
    scene
        .runs
        .iter()
        .map(|r| SceneRow {
            run: r.run,
            mean: r.fps.mean,
            median: r.fps.median,
            min: r.fps.min,
            max: r.fps.max,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadComparisonRow {
    pub name: String,
    pub game_thread: f64,
    pub render_thread: f64,
    pub gpu_time: f64,
}

/// Per-scene thread/GPU means; empty when no scene carries thread data.
pub fn thread_comparison(averages: &[SceneAggregate]) -> Vec<ThreadComparisonRow> {
    averages
        .iter()
        .filter_map(|s| {
            s.thread_times.map(|t| ThreadComparisonRow {
                name: s.name.clone(),
                game_thread: t.game_thread.mean,
                render_thread: t.render_thread.mean,
                gpu_time: t.gpu_time.mean,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub schema_version: u32,
    pub tool_version: String,
    pub source: String,
    pub generated_at_utc: String,
}

impl ReportMeta {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            source: source.into(),
            generated_at_utc: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub meta: ReportMeta,
    pub overview: Option<Overview>,
    pub analysis: Analysis,
}

impl AnalysisReport {
    pub fn new(source: impl Into<String>, analysis: Analysis) -> Self {
        Self {
            meta: ReportMeta::new(source),
            overview: analysis.overview(),
            analysis,
        }
    }
}

/// Fixed-width text summary.
pub fn render_table(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let analysis = &report.analysis;
    let format = analysis.format.map_or("unknown", |f| f.as_str());

    let _ = writeln!(out, "{} ({format} format)", report.meta.source);
    if let Some(o) = &report.overview {
        let _ = writeln!(
            out,
            "{} scenes, {} samples, weighted mean {:.2} FPS [{}], range {:.2} - {:.2}",
            o.scene_count,
            o.total_samples,
            o.weighted_mean_fps,
            FpsTier::classify(o.weighted_mean_fps).as_str(),
            o.min_fps,
            o.max_fps
        );
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "{:<20} {:>4} {:>8} {:>8} {:>8} {:>8} {:>8} {:>7} {:>7}  tier",
        "scene", "runs", "samples", "mean", "median", "min", "max", "<60%", "<30%"
    );
    for scene in &analysis.averages {
        let runs = analysis
            .evolution
            .iter()
            .find(|s| s.name == scene.name)
            .map_or(0, |s| s.runs.len());
        let _ = writeln!(
            out,
            "{:<20} {:>4} {:>8} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>7.2} {:>7.2}  {}",
            scene.name,
            runs,
            scene.total_samples,
            scene.mean_fps,
            scene.median_fps,
            scene.min_fps,
            scene.max_fps,
            scene.below_60,
            scene.below_30,
            FpsTier::classify(scene.mean_fps).as_str()
        );
    }

    let evolution = evolution_rows(&analysis.evolution);
    if evolution.len() > 1 {
        out.push('\n');
        let _ = write!(out, "{:<6}", "run");
        for scene in &analysis.evolution {
            let _ = write!(out, " {:>14}", scene.name);
        }
        out.push('\n');
        for row in &evolution {
            let _ = write!(out, "{:<6}", row.run);
            for scene in &analysis.evolution {
                match row.scenes.iter().find(|m| m.scene == scene.name) {
                    Some(m) => {
                        let _ = write!(out, " {:>14.2}", m.mean);
                    }
                    None => {
                        let _ = write!(out, " {:>14}", "-");
                    }
                }
            }
            out.push('\n');
        }
    }

    for scene in &analysis.evolution {
        out.push('\n');
        let _ = writeln!(out, "{} runs:", scene.name);
        for row in scene_rows(scene) {
            let _ = writeln!(
                out,
                "  {:>4} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
                row.run, row.mean, row.median, row.min, row.max
            );
        }
    }

    let threads = thread_comparison(&analysis.averages);
    if !threads.is_empty() {
        out.push('\n');
        let _ = writeln!(
            out,
            "{:<20} {:>10} {:>10} {:>10}",
            "scene", "game ms", "render ms", "gpu ms"
        );
        for row in &threads {
            let _ = writeln!(
                out,
                "{:<20} {:>10.2} {:>10.2} {:>10.2}",
                row.name, row.game_thread, row.render_thread, row.gpu_time
            );
        }
    }

    if !analysis.stutters.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "{} stutters:", analysis.stutters.len());
        for s in &analysis.stutters {
            let _ = writeln!(out, "  {}  {:.2} FPS", s.timestamp, s.fps);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{self, SynthConfig};
    use crate::LogFormat;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(FpsTier::classify(60.0), FpsTier::Good);
        assert_eq!(FpsTier::classify(59.99), FpsTier::Average);
        assert_eq!(FpsTier::classify(45.0), FpsTier::Average);
        assert_eq!(FpsTier::classify(30.0), FpsTier::Poor);
        assert_eq!(FpsTier::classify(29.9), FpsTier::Bad);
    }

    #[test]
    fn test_evolution_rows_cover_every_run() {
        let analysis = crate::analyze_log(&synth::generate_log(&SynthConfig {
            scenes: 3,
            runs: 5,
            ..Default::default()
        }))
        .unwrap();
        let rows = evolution_rows(&analysis.evolution);
        let runs: Vec<_> = rows.iter().map(|r| r.run).collect();
        assert_eq!(runs, [0, 1, 2, 3, 4]);
        assert!(rows.iter().all(|r| r.scenes.len() == 3));
        assert_eq!(scene_rows(&analysis.evolution[0]).len(), 5);
    }

    #[test]
    fn test_thread_comparison_empty_for_legacy() {
        let analysis = crate::analyze_log(&synth::generate_log(&SynthConfig {
            format: LogFormat::Legacy,
            ..Default::default()
        }))
        .unwrap();
        assert!(thread_comparison(&analysis.averages).is_empty());
        let table = render_table(&AnalysisReport::new("legacy.log", analysis));
        assert!(table.contains("legacy format"));
        assert!(!table.contains("gpu ms"));
    }

    #[test]
    fn test_table_lists_scenes_and_threads() {
        let analysis =
            crate::analyze_log(&synth::generate_log(&SynthConfig::default())).unwrap();
        let report = AnalysisReport::new("bench.log", analysis);
        let table = render_table(&report);
        for scene in &report.analysis.averages {
            assert!(table.contains(&scene.name));
        }
        assert!(table.contains("gpu ms"));
        assert!(table.contains("2 stutters:"));
    }

    #[test]
    fn test_table_includes_run_evolution() {
        let analysis = crate::analyze_log(&synth::generate_log(&SynthConfig {
            scenes: 2,
            runs: 3,
            ..Default::default()
        }))
        .unwrap();
        let report = AnalysisReport::new("bench.log", analysis);
        let table = render_table(&report);

        let first = &report.analysis.evolution[0];
        assert!(table.contains(&format!("{} runs:", first.name)));
        let line = format!("{:<6}", 2);
        assert!(table.lines().any(|l| l.starts_with(&line)));
        let mean = format!("{:.2}", first.runs[2].fps.mean);
        assert!(table.contains(&mean));
    }
}
