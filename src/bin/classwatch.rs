//! classwatch - classroom behavior monitor
//!
//! This tool:
//! 1. Loads configuration (TOML file + env overrides + flags)
//! 2. Opens the configured detector backend
//! 3. Analyzes a still image, or plays a video through the background worker
//! 4. Prints a per-frame summary of detected behaviors

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::{select, unbounded, Sender};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use classwatch::{
    analyze_image, open_detector, AppConfig, ClassSelection, Command, Controller, Outcome,
    PlaybackEvent, PlaybackWorker, SharedDetector, Summary,
};

#[derive(Parser, Debug)]
#[command(name = "classwatch", author, version, about = "Classroom behavior monitor")]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "CLASSWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Detector backend (stub, tract).
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model file for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Behavior classes to report, e.g. "0,3,5" or "all".
    #[arg(long)]
    classes: Option<String>,
    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Detect behaviors in a single image
    Image {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Write the annotated image here.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Play a video (or stub:// stream) through the detector
    Video {
        path: String,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Read control commands (pause, resume, classes, snapshot, stop) from stdin.
        #[arg(long)]
        interactive: bool,
        /// Save the last annotated frame here when playback ends.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Html,
    Json,
}

enum ControlMsg {
    Line(String),
    Interrupt,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = AppConfig::load_from(args.config.as_deref())?;
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.to_lowercase();
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = Some(model.clone());
    }
    if let Some(classes) = &args.classes {
        cfg.selection = ClassSelection::parse(classes, cfg.class_names.len())?;
    }
    if cfg.selection.is_empty() {
        return Err(anyhow!("select at least one behavior class"));
    }

    match args.command {
        Mode::Image {
            path,
            format,
            output,
        } => run_image(&cfg, &path, format, output.as_deref()),
        Mode::Video {
            path,
            format,
            interactive,
            snapshot,
        } => run_video(cfg, &path, format, interactive, snapshot.as_deref()),
    }
}

fn run_image(cfg: &AppConfig, path: &Path, format: Format, output: Option<&Path>) -> Result<()> {
    let mut detector = open_detector(&cfg.detector)?;
    let report = analyze_image(&mut detector, path, &cfg.selection, &cfg.class_names)?;
    print_summary(format, None, &report.summary)?;
    if let Some(output) = output {
        report.frame.save(output)?;
        log::info!("annotated image written to {}", output.display());
    }
    Ok(())
}

fn run_video(
    cfg: AppConfig,
    path: &str,
    format: Format,
    interactive: bool,
    snapshot: Option<&Path>,
) -> Result<()> {
    let detector: SharedDetector = Arc::new(Mutex::new(open_detector(&cfg.detector)?));
    let (mut worker, events) = PlaybackWorker::new(detector, cfg.selection.clone(), cfg.playback);
    let mut controller = Controller::new(cfg.class_names.clone());

    let (control_tx, control_rx) = unbounded();
    let interrupt_tx = control_tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(ControlMsg::Interrupt);
    })
    .context("error setting Ctrl-C handler")?;
    if interactive {
        spawn_stdin_reader(control_tx);
        eprintln!("{}", classwatch::control::HELP);
    }

    worker.start(path, cfg.selection.clone())?;

    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                if let Some(summary) = controller.observe(&event) {
                    if let PlaybackEvent::Frame(frame) = &event {
                        print_summary(format, Some(frame.sequence), &summary)?;
                    }
                }
                if let PlaybackEvent::Finished { reason, frames } = event {
                    log::info!("playback finished after {} frames: {:?}", frames, reason);
                    break;
                }
            }
            recv(control_rx) -> msg => match msg {
                Ok(ControlMsg::Line(line)) => handle_line(&mut controller, &mut worker, &line),
                Ok(ControlMsg::Interrupt) => {
                    log::info!("interrupt received, stopping playback");
                    worker.stop()?;
                }
                Err(_) => {}
            },
        }
    }

    worker.stop()?;
    if let Some(path) = snapshot {
        match controller.last_frame() {
            Some(frame) => {
                frame.save(path)?;
                log::info!("last frame written to {}", path.display());
            }
            None => log::warn!("no frame was published, snapshot skipped"),
        }
    }
    Ok(())
}

fn handle_line(controller: &mut Controller, worker: &mut PlaybackWorker, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    let result = Command::parse(line, controller.class_names().len())
        .and_then(|command| controller.apply(worker, command));
    match result {
        Ok(Outcome::Message(message)) => eprintln!("{}", message),
        Ok(Outcome::Quit) => eprintln!("stopped"),
        Err(err) => eprintln!("error: {:#}", err),
    }
}

fn spawn_stdin_reader(tx: Sender<ControlMsg>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(ControlMsg::Line(line)).is_err() {
                break;
            }
        }
    });
}

fn print_summary(format: Format, sequence: Option<u64>, summary: &Summary) -> Result<()> {
    match format {
        Format::Text => {
            if let Some(sequence) = sequence {
                println!("-- frame {} --", sequence);
            }
            print!("{}", summary);
        }
        Format::Html => println!("{}", summary.to_html()),
        Format::Json => {
            let line = serde_json::to_string(&serde_json::json!({
                "frame": sequence,
                "summary": summary,
            }))?;
            println!("{}", line);
        }
    }
    Ok(())
}
