//! Deterministic synthetic benchmark logs.
//!
//! Produces text in either log grammar from a seed so benches, tests and
//! demos can work without real captures. Every record derives its RNG from
//! the master seed and its index, so the output for a given config never
//! changes.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::LogFormat;

const SCENE_NAMES: [&str; 8] = [
    "Blockade1",
    "Harbor_North",
    "Citadel",
    "Foundry2",
    "Canyon_Run",
    "Outpost",
    "Reactor_Core",
    "Skyline",
];

#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// Number of distinct scenes (cycled through `SCENE_NAMES`, suffixed
    /// once exhausted).
    pub scenes: usize,
    /// Runs per scene.
    pub runs: u32,
    pub seed: u64,
    pub format: LogFormat,
    /// Stutter lines spread between records.
    pub stutters: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            scenes: 4,
            runs: 3,
            seed: 42,
            format: LogFormat::Primary,
            stutters: 2,
        }
    }
}

fn per_record_seed(master_seed: u64, index: usize) -> u64 {
    master_seed
        .wrapping_add(index as u64)
        .wrapping_mul(0x517cc1b727220a95)
}

fn scene_name(i: usize) -> String {
    let base = SCENE_NAMES[i % SCENE_NAMES.len()];
    match i / SCENE_NAMES.len() {
        0 => base.to_string(),
        n => format!("{base}{n}"),
    }
}

fn timestamp(elapsed_s: u64) -> String {
    let h = 18 + (elapsed_s / 3600) % 6;
    let m = (elapsed_s / 60) % 60;
    let s = elapsed_s % 60;
    format!("2025.03.10-{h:02}.{m:02}.{s:02}")
}

fn write_quartet<W: Write>(w: &mut W, mean: f64, spread: f64) -> io::Result<()> {
    writeln!(
        w,
        "Mean: {:.2}, Median: {:.2}, Min: {:.2}, Max: {:.2}",
        mean,
        mean * 0.98,
        (mean - spread).max(0.1),
        mean + spread * 1.5
    )
}

fn write_record<W: Write>(
    w: &mut W,
    rng: &mut ChaCha8Rng,
    format: LogFormat,
    ts: &str,
    scene: &str,
    run: u32,
) -> io::Result<u64> {
    let samples: u64 = rng.gen_range(600..1000);
    let mean: f64 = rng.gen_range(28.0..95.0);
    let duration = samples as f64 / mean;
    let min = mean * rng.gen_range(0.2..0.8);
    let max = mean * rng.gen_range(1.1..1.6);
    let median = mean * rng.gen_range(0.97..1.02);

    writeln!(
        w,
        "[{ts}] {scene}_{run} - Samples: {samples}, Duration: {duration:.2}s"
    )?;
    match format {
        LogFormat::Primary => {
            writeln!(w, "=== FPS STATISTICS ===")?;
            writeln!(
                w,
                "Mean: {mean:.2}, Median: {median:.2}, Min: {min:.2}, Max: {max:.2}"
            )?;
        }
        LogFormat::Legacy => {
            writeln!(w, "MEAN: {mean:.2}")?;
            writeln!(w, "Median: {median:.2}, Min: {min:.2}, Max: {max:.2}")?;
        }
    }

    // Share of frames under each cutoff shrinks as the mean rises.
    for cutoff in [60.0f64, 45.0, 30.0, 15.0] {
        let share = ((cutoff - min) / (max - min)).clamp(0.0, 1.0).powi(2);
        let frames = (share * samples as f64).round() as u64;
        let percent = frames as f64 / samples as f64 * 100.0;
        writeln!(w, "Frames < {cutoff} FPS: {frames} ({percent:.2}%)")?;
    }

    if format == LogFormat::Primary {
        let frame_ms = 1000.0 / mean;
        writeln!(w, "=== GAME THREAD (ms) ===")?;
        write_quartet(w, frame_ms * rng.gen_range(0.5..0.8), 3.0)?;
        writeln!(w, "=== RENDER THREAD (ms) ===")?;
        write_quartet(w, frame_ms * rng.gen_range(0.6..0.9), 4.0)?;
        writeln!(w, "=== GPU TIME (ms) ===")?;
        write_quartet(w, frame_ms * rng.gen_range(0.7..0.98), 6.0)?;
    }
    Ok(duration.ceil() as u64)
}

/// Stream a synthetic log into `w`.
pub fn write_log_to<W: Write>(w: &mut W, config: &SynthConfig) -> io::Result<()> {
    let total = config.scenes * config.runs as usize;
    let stutter_every = if config.stutters == 0 {
        usize::MAX
    } else {
        (total / config.stutters).max(1)
    };
    let mut stutters_left = config.stutters;
    let mut elapsed = 0u64;

    writeln!(w, "[{}] LogBenchmark: starting benchmark sequence", timestamp(0))?;
    let mut index = 0usize;
    for run in 0..config.runs {
        for s in 0..config.scenes {
            let mut rng = ChaCha8Rng::seed_from_u64(per_record_seed(config.seed, index));
            let ts = timestamp(elapsed);
            elapsed += write_record(w, &mut rng, config.format, &ts, &scene_name(s), run)?;
            index += 1;

            if stutters_left > 0 && index % stutter_every == 0 {
                let fps: f64 = rng.gen_range(4.0..14.9);
                writeln!(w, "[{}] !!! STUTTER !!! {fps:.2} FPS", timestamp(elapsed))?;
                stutters_left -= 1;
            }
        }
    }
    Ok(())
}

pub fn generate_log(config: &SynthConfig) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_log_to(&mut buf, config);
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn write_log<P: AsRef<Path>>(path: P, config: &SynthConfig) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(64 * 1024, file);
    write_log_to(&mut writer, config)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use tempfile::tempdir;

    #[test]
    fn test_generate_deterministic() {
        let config = SynthConfig::default();
        assert_eq!(generate_log(&config), generate_log(&config));

        let other = SynthConfig {
            seed: 43,
            ..Default::default()
        };
        assert_ne!(generate_log(&config), generate_log(&other));
    }

    #[test]
    fn test_generated_primary_log_extracts() {
        let config = SynthConfig {
            scenes: 5,
            runs: 4,
            stutters: 3,
            ..Default::default()
        };
        let out = extract(&generate_log(&config)).unwrap();
        assert_eq!(out.format, Some(LogFormat::Primary));
        assert_eq!(out.benchmarks.len(), 20);
        assert_eq!(out.stutters.len(), 3);
        assert!(out.stutters.iter().all(|s| s.fps < 15.0));
    }

    #[test]
    fn test_generated_legacy_log_extracts() {
        let config = SynthConfig {
            format: LogFormat::Legacy,
            ..Default::default()
        };
        let out = extract(&generate_log(&config)).unwrap();
        assert_eq!(out.format, Some(LogFormat::Legacy));
        assert_eq!(out.benchmarks.len(), 12);
        assert!(out.benchmarks.iter().all(|r| r.thread_times().is_none()));
    }

    #[test]
    fn test_scene_names_stay_distinct() {
        let config = SynthConfig {
            scenes: 10,
            runs: 1,
            stutters: 0,
            ..Default::default()
        };
        let out = extract(&generate_log(&config)).unwrap();
        let mut names: Vec<_> = out
            .benchmarks
            .iter()
            .map(|r| r.stats().scene.clone())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 10);
        assert!(out.stutters.is_empty());
    }

    #[test]
    fn test_write_log_matches_in_memory() {
        let config = SynthConfig::default();
        let dir = tempdir().unwrap();
        let path = dir.path().join("bench.log");
        write_log(&path, &config).unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, generate_log(&config));
    }
}
