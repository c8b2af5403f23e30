use anyhow::{anyhow, bail, Context, Result};
use crabwatch::source::open_source;
use crabwatch::{
    BackgroundSubtractionDetector, CapturePolicy, Container, MotionPipeline, RunSummary,
    WatchConfig,
};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const USAGE: &str = "\
Usage: crabwatch <command> [args]

Commands:
  run [options]            Watch a source and record motion segments
      --config <path>      Config file (default: crabwatch.toml)
      --source <selector>  camera:<index> or file:<path.y4m>
      --timeout <secs>     Grace period after the last motion
      --min-area <px>      Minimum region area
      --output <dir>       Capture root directory
      --container <kind>   mp4 or y4m
      --buffer <policy>    inline, drop-oldest:<n> or block:<n>
      --no-annotate        Do not draw region boxes
      --json               Print the run summary as JSON
  list-devices [--json]    List capture devices
  init-config [path] [--force]
                           Write a default config file";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "run" => cmd_run(&args[2..]),
        "list-devices" => cmd_list_devices(&args[2..]),
        "init-config" => cmd_init_config(&args[2..]),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} needs a value", flag))
}

fn parse_buffer(s: &str) -> Result<CapturePolicy> {
    if s == "inline" {
        return Ok(CapturePolicy::Inline);
    }
    let (kind, capacity) = s
        .split_once(':')
        .ok_or_else(|| anyhow!("buffer should be inline, drop-oldest:<n> or block:<n>"))?;
    let capacity: usize = capacity
        .parse()
        .with_context(|| format!("invalid buffer capacity '{}'", capacity))?;
    match kind {
        "drop-oldest" => Ok(CapturePolicy::DropOldest { capacity }),
        "block" => Ok(CapturePolicy::Block { capacity }),
        other => bail!("unknown buffer policy '{}'", other),
    }
}

/// Command-line values that override the config file
#[derive(Default)]
struct RunOverrides {
    source: Option<String>,
    timeout_secs: Option<f64>,
    min_area: Option<f64>,
    output: Option<String>,
    container: Option<Container>,
    buffer: Option<CapturePolicy>,
    annotate: Option<bool>,
}

impl RunOverrides {
    fn apply(self, config: &mut WatchConfig) {
        if let Some(selector) = self.source {
            config.source.selector = selector;
        }
        if let Some(timeout) = self.timeout_secs {
            config.recording.motion_timeout_secs = timeout;
        }
        if let Some(min_area) = self.min_area {
            config.detection.min_area = min_area;
        }
        if let Some(output) = self.output {
            config.recording.output_directory = output;
        }
        if let Some(container) = self.container {
            config.recording.container = container;
        }
        if let Some(buffer) = self.buffer {
            config.capture.buffer = buffer;
        }
        if let Some(annotate) = self.annotate {
            config.detection.annotate = annotate;
        }
    }
}

fn cmd_run(args: &[String]) -> Result<()> {
    let mut config_path = WatchConfig::default_path();
    let mut overrides = RunOverrides::default();
    let mut json = false;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" => {
                i += 1;
                config_path = PathBuf::from(value(args, i, flag)?);
            }
            "--source" => {
                i += 1;
                overrides.source = Some(value(args, i, flag)?.to_string());
            }
            "--timeout" => {
                i += 1;
                overrides.timeout_secs =
                    Some(value(args, i, flag)?.parse().context("--timeout expects seconds")?);
            }
            "--min-area" => {
                i += 1;
                overrides.min_area =
                    Some(value(args, i, flag)?.parse().context("--min-area expects a number")?);
            }
            "--output" => {
                i += 1;
                overrides.output = Some(value(args, i, flag)?.to_string());
            }
            "--container" => {
                i += 1;
                overrides.container = Some(value(args, i, flag)?.parse::<Container>()?);
            }
            "--buffer" => {
                i += 1;
                overrides.buffer = Some(parse_buffer(value(args, i, flag)?)?);
            }
            "--no-annotate" => overrides.annotate = Some(false),
            "--json" => json = true,
            other => bail!("unknown option '{}'", other),
        }
        i += 1;
    }

    crabwatch::init_logging();

    let mut config = WatchConfig::load_from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    overrides.apply(&mut config);
    config
        .validate()
        .map_err(|e| anyhow!("invalid configuration: {}", e))?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupt received, finishing current frame");
        handler_stop.store(true, Ordering::Relaxed);
    })
    .context("installing Ctrl+C handler")?;

    let source = open_source(&config.source, config.capture.buffer)
        .with_context(|| format!("opening source {}", config.source.selector))?;
    let detector = BackgroundSubtractionDetector::from_config(&config.detection);
    let mut pipeline = MotionPipeline::from_config(&config, source, detector)?;

    log::info!(
        "Watching {} (timeout {}s, min area {}), writing {:?} to {}",
        config.source.selector,
        config.recording.motion_timeout_secs,
        config.detection.min_area,
        config.recording.container,
        config.recording.output_directory
    );

    let summary = pipeline.run(&stop)?;
    print_summary(&summary, json)
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
        return Ok(());
    }

    println!(
        "Frames: {} processed, {} with motion, {} dropped",
        summary.frames_processed, summary.motion_frames, summary.dropped_frames
    );
    for segment in &summary.segments {
        let skipped = segment.frames_appended.saturating_sub(segment.frames_written);
        let note = if skipped > 0 {
            format!(" ({} skipped by encoder)", skipped)
        } else {
            String::new()
        };
        println!(
            "  {}  {} frames{}  {:.1}s  {}",
            segment.id,
            segment.frames_written,
            note,
            segment.duration_secs,
            segment.path.display()
        );
    }
    if summary.open_failures + summary.write_failures + summary.finalize_failures > 0 {
        println!(
            "Failures: {} open, {} write, {} finalize",
            summary.open_failures, summary.write_failures, summary.finalize_failures
        );
    }
    Ok(())
}

#[cfg(feature = "camera")]
fn cmd_list_devices(args: &[String]) -> Result<()> {
    let devices = crabwatch::source::list_devices()?;
    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(&devices)?);
    } else {
        for d in devices {
            println!("camera:{}  {}  {}", d.index, d.name, d.description);
        }
    }
    Ok(())
}

#[cfg(not(feature = "camera"))]
fn cmd_list_devices(_args: &[String]) -> Result<()> {
    bail!("device listing requires the `camera` feature")
}

fn cmd_init_config(args: &[String]) -> Result<()> {
    let force = args.iter().any(|a| a == "--force");
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from)
        .unwrap_or_else(WatchConfig::default_path);

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    WatchConfig::default().save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
