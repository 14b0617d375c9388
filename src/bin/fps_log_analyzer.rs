use clap::{Parser, Subcommand, ValueEnum};
use fps_log_analyzer::config::Config;
use fps_log_analyzer::report::{render_table, AnalysisReport};
use fps_log_analyzer::share::{self, Snapshot, SnapshotStore};
use fps_log_analyzer::synth::{self, SynthConfig};
use fps_log_analyzer::{aggregate::Analysis, AnalyzerError, LogFormat, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
enum OutputArg {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract and aggregate benchmark logs (per-scene weighted statistics).
    Analyze {
        /// Log file or directory. Can be provided multiple times.
        ///
        /// Directories are walked for `*.log` and `*.txt` files.
        #[arg(value_name = "PATH", num_args = 1.., required = true)]
        input: Vec<PathBuf>,
    },

    /// Dump the raw extracted records of one log as JSON.
    Extract {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Store a log as a shareable snapshot and print its link.
    Share {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Store the aggregated analysis instead of the raw log text.
        #[arg(long, default_value_t = false)]
        aggregated: bool,

        /// Store the raw text without checking that it contains benchmark data.
        #[arg(long, default_value_t = false, conflicts_with = "aggregated")]
        no_check: bool,
    },

    /// Resolve a share link (or bare snapshot id) and print its analysis.
    Load {
        #[arg(value_name = "URL_OR_ID")]
        reference: String,
    },

    /// Write a deterministic synthetic benchmark log.
    GenerateLog {
        #[arg(long, default_value_t = 4)]
        scenes: usize,

        #[arg(long, default_value_t = 3)]
        runs: u32,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, value_enum, default_value_t = LogFormat::Primary)]
        format: LogFormat,

        #[arg(long, default_value_t = 2)]
        stutters: usize,

        /// Output file for the log. If omitted, prints to stdout.
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Download a log from Google Drive or Dropbox and analyze it.
    #[cfg(feature = "remote")]
    Fetch {
        #[arg(long, value_name = "ID", conflicts_with = "dropbox_url")]
        drive_id: Option<String>,

        #[arg(long, value_name = "URL", required_unless_present = "drive_id")]
        dropbox_url: Option<String>,
    },
}

#[derive(Parser, Debug)]
#[command(name = "fps-log-analyzer")]
#[command(about = "Game-engine FPS benchmark log analyzer (JSON output)")]
struct Args {
    /// Where to write the report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputArg::Json, global = true)]
    output: OutputArg,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    #[arg(long, env = "FPS_ANALYZER_STORE", global = true)]
    store_dir: Option<PathBuf>,

    #[arg(long, env = "FPS_ANALYZER_SHARE_BASE", global = true)]
    share_base: Option<String>,

    #[arg(long, env = "FPS_ANALYZER_RETENTION_DAYS", global = true)]
    retention_days: Option<u32>,

    /// Allowed drift between logged threshold percentages and frame counts.
    #[arg(long, global = true)]
    percent_tolerance: Option<f64>,

    #[command(subcommand)]
    cmd: Command,
}

impl Args {
    fn config(&self) -> Config {
        let mut cfg = Config::default();
        if let Some(dir) = &self.store_dir {
            cfg.store_dir = dir.clone();
        }
        if let Some(base) = &self.share_base {
            cfg.share_base_url = base.clone();
        }
        if let Some(days) = self.retention_days {
            cfg.retention_days = days;
        }
        if let Some(tol) = self.percent_tolerance {
            cfg.percent_tolerance = tol;
        }
        cfg
    }
}

fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if root.is_file() {
        out.push(root.to_path_buf());
        return Ok(out);
    }

    for entry in walkdir::WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let is_log = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                e.eq_ignore_ascii_case("log") || e.eq_ignore_ascii_case("txt")
            });
        if entry.file_type().is_file() && is_log {
            out.push(entry.path().to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("benchmark.log")
        .to_string()
}

fn analyze_text(cfg: &Config, text: &str) -> Result<Analysis> {
    fps_log_analyzer::analyze_log_with(&cfg.extractor(), text)
}

fn analyze_file(cfg: &Config, path: &Path) -> Result<AnalysisReport> {
    let text = fs::read_to_string(path)?;
    let analysis = analyze_text(cfg, &text)?;
    tracing::info!(
        path = %path.display(),
        scenes = analysis.averages.len(),
        stutters = analysis.stutters.len(),
        "analyzed log"
    );
    Ok(AnalysisReport::new(path.display().to_string(), analysis))
}

/// Analyze every input. Files found by walking a directory are skipped when
/// they hold no benchmark data; files named explicitly must have some.
fn analyze_inputs(cfg: &Config, inputs: &[PathBuf]) -> Result<Vec<AnalysisReport>> {
    let mut reports = Vec::new();
    for root in inputs {
        let walked = !root.is_file();
        for path in collect_files(root)? {
            match analyze_file(cfg, &path) {
                Ok(report) => reports.push(report),
                Err(AnalyzerError::NoBenchmarkData) if walked => {
                    tracing::warn!(path = %path.display(), "no benchmark data, skipping");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "analysis failed");
                    return Err(e);
                }
            }
        }
    }
    if reports.is_empty() {
        return Err(AnalyzerError::NoBenchmarkData);
    }
    Ok(reports)
}

fn share_snapshot(
    cfg: &Config,
    text: String,
    name: &str,
    aggregated: bool,
    no_check: bool,
) -> Result<Snapshot> {
    if aggregated {
        return Ok(Snapshot::aggregated(analyze_text(cfg, &text)?, Some(name)));
    }
    if !no_check {
        // Refuse to share logs that would not load again.
        analyze_text(cfg, &text)?;
    }
    Ok(Snapshot::raw_log(text, Some(name)))
}

fn render(output: OutputArg, reports: &[AnalysisReport]) -> Result<String> {
    match output {
        OutputArg::Json => Ok(match reports {
            [single] => serde_json::to_string_pretty(single)?,
            many => serde_json::to_string_pretty(many)?,
        }),
        OutputArg::Table => Ok(reports
            .iter()
            .map(render_table)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn emit(out: Option<&Path>, text: &str) -> Result<()> {
    if let Some(out) = out {
        fs::write(out, text)?;
    } else {
        println!("{text}");
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let cfg = args.config();
    let out = args.out.as_deref();

    match &args.cmd {
        Command::Analyze { input } => {
            let reports = analyze_inputs(&cfg, input)?;
            emit(out, &render(args.output, &reports)?)
        }
        Command::Extract { input } => {
            let text = fs::read_to_string(input)?;
            let extraction = cfg.extractor().extract(&text)?;
            emit(out, &serde_json::to_string_pretty(&extraction)?)
        }
        Command::Share {
            input,
            aggregated,
            no_check,
        } => {
            let text = fs::read_to_string(input)?;
            let snapshot = share_snapshot(&cfg, text, &file_label(input), *aggregated, *no_check)?;
            let store = cfg.snapshot_store();
            let id = store.store(&snapshot)?;
            let link = share::share_url(&cfg.share_base_url, &id)?;
            eprintln!(
                "Snapshot {id} stored in {} (valid for {} days)",
                store.root().display(),
                cfg.retention_days
            );
            emit(out, &link)
        }
        Command::Load { reference } => {
            let id = share::parse_reference(reference)?;
            let store = cfg.snapshot_store();
            let (snapshot, analysis) = share::fetch_analysis(&store, &id, &cfg.extractor())?;
            let source = snapshot.file_name().unwrap_or("Shared Benchmark").to_string();
            let report = AnalysisReport::new(source, analysis);
            emit(out, &render(args.output, std::slice::from_ref(&report))?)
        }
        Command::GenerateLog {
            scenes,
            runs,
            seed,
            format,
            stutters,
            output,
        } => {
            let synth_cfg = SynthConfig {
                scenes: *scenes,
                runs: *runs,
                seed: *seed,
                format: *format,
                stutters: *stutters,
            };
            match output {
                Some(path) => {
                    synth::write_log(path, &synth_cfg)?;
                    eprintln!(
                        "Wrote {} records ({} format, seed={}) to {}",
                        scenes * *runs as usize,
                        format.as_str(),
                        seed,
                        path.display()
                    );
                    Ok(())
                }
                None => {
                    print!("{}", synth::generate_log(&synth_cfg));
                    Ok(())
                }
            }
        }
        #[cfg(feature = "remote")]
        Command::Fetch {
            drive_id,
            dropbox_url,
        } => {
            use fps_log_analyzer::remote::{self, RemoteSource};

            let source = match (drive_id, dropbox_url) {
                (Some(id), _) => RemoteSource::GoogleDrive {
                    file_id: id.clone(),
                },
                (None, Some(url)) => RemoteSource::Dropbox { url: url.clone() },
                (None, None) => {
                    return Err(AnalyzerError::InvalidShareUrl {
                        reason: "either --drive-id or --dropbox-url is required".to_string(),
                    })
                }
            };
            let timeout = std::time::Duration::from_secs(cfg.request_timeout_secs);
            let text = remote::fetch_text(&source, timeout)?;
            let report = AnalysisReport::new(source.to_string(), analyze_text(&cfg, &text)?);
            emit(out, &render(args.output, std::slice::from_ref(&report))?)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("{}", e.user_message());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
