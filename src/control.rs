//! Text command controller for a playback worker.
//!
//! Commands, one per line:
//! - `pause` / `resume` / `stop`
//! - `classes 0,2,5` or `classes all`
//! - `snapshot <path>`: save the last published frame
//! - `status`, `help`

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::classes::ClassSelection;
use crate::frame::Frame;
use crate::playback::{PlaybackEvent, PlaybackWorker};
use crate::summary::{summarize, Summary};

pub const HELP: &str = "commands: pause | resume | stop | classes <ids|all> | snapshot <path> | status | help";

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Pause,
    Resume,
    Stop,
    Classes(ClassSelection),
    Snapshot(PathBuf),
    Status,
    Help,
}

impl Command {
    pub fn parse(line: &str, class_count: usize) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let command = match verb.to_lowercase().as_str() {
            "pause" | "p" => Command::Pause,
            "resume" | "continue" | "r" => Command::Resume,
            "stop" | "quit" | "q" => Command::Stop,
            "status" | "s" => Command::Status,
            "help" | "?" => Command::Help,
            "classes" | "c" => {
                let selection = ClassSelection::parse(rest, class_count)?;
                if selection.is_empty() {
                    return Err(anyhow!("select at least one behavior class"));
                }
                Command::Classes(selection)
            }
            "snapshot" => {
                if rest.is_empty() {
                    return Err(anyhow!("snapshot needs an output path"));
                }
                Command::Snapshot(PathBuf::from(rest))
            }
            "" => return Err(anyhow!("empty command")),
            other => return Err(anyhow!("unknown command '{}' ({})", other, HELP)),
        };
        Ok(command)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Message(String),
    Quit,
}

/// Applies commands to a worker and tracks the latest published frame.
pub struct Controller {
    class_names: Vec<String>,
    last_frame: Option<Frame>,
    frames_seen: u64,
}

impl Controller {
    pub fn new(class_names: Vec<String>) -> Self {
        Self {
            class_names,
            last_frame: None,
            frames_seen: 0,
        }
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Record a worker event. Frame events yield their summary.
    pub fn observe(&mut self, event: &PlaybackEvent) -> Option<Summary> {
        match event {
            PlaybackEvent::Frame(frame) => {
                self.frames_seen += 1;
                self.last_frame = Some(frame.frame.clone());
                Some(summarize(&frame.detections, &self.class_names))
            }
            PlaybackEvent::Finished { .. } => None,
        }
    }

    pub fn apply(&mut self, worker: &mut PlaybackWorker, command: Command) -> Result<Outcome> {
        let outcome = match command {
            Command::Pause => Outcome::Message(format!("state: {:?}", worker.pause()?)),
            Command::Resume => Outcome::Message(format!("state: {:?}", worker.resume()?)),
            Command::Stop => {
                worker.stop()?;
                Outcome::Quit
            }
            Command::Classes(selection) => {
                let message = format!("classes: {}", self.describe_selection(&selection));
                worker.set_class_selection(selection);
                Outcome::Message(message)
            }
            Command::Snapshot(path) => {
                let frame = self
                    .last_frame
                    .as_ref()
                    .ok_or_else(|| anyhow!("no frame to save yet"))?;
                frame.save(&path)?;
                Outcome::Message(format!("saved {}", path.display()))
            }
            Command::Status => Outcome::Message(format!(
                "state: {:?}, frames: {}, classes: {}",
                worker.state(),
                self.frames_seen,
                self.describe_selection(&worker.class_selection())
            )),
            Command::Help => Outcome::Message(HELP.to_string()),
        };
        Ok(outcome)
    }

    fn describe_selection(&self, selection: &ClassSelection) -> String {
        selection
            .ids()
            .map(|id| match self.class_names.get(id) {
                Some(name) => format!("{}:{}", id, name),
                None => id.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
