//! Stage and step progress reporting

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use colored::Colorize;
use tracing::info;

use crate::errors::DeployError;
use crate::ui::Ui;

/// Lifecycle state of a stage step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Started,
    Finished,
    Failed,
    Skipped,
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventState::Started => "started",
            EventState::Finished => "finished",
            EventState::Failed => "failed",
            EventState::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

pub trait EventLogger: Send + Sync {
    fn new_stage(&self, name: &str) -> Box<dyn Stage>;
}

pub trait Stage: Send {
    fn start(&mut self);

    fn new_step(&mut self, name: &str) -> Box<dyn Step>;

    fn finish(&mut self);
}

pub trait Step: Send {
    fn start(&mut self);

    fn finish(&mut self);

    fn fail(&mut self, message: &str);

    fn skip(&mut self, message: &str);
}

/// Finish or fail `step` according to `result`
pub fn track<T>(step: &mut dyn Step, result: Result<T, DeployError>) -> Result<T, DeployError> {
    match &result {
        Ok(_) => step.finish(),
        Err(e) => step.fail(&e.to_string()),
    }
    result
}

/// Event logger rendering progress lines through a [`Ui`]
pub struct ConsoleEventLogger {
    ui: Arc<dyn Ui>,
}

impl ConsoleEventLogger {
    pub fn new(ui: Arc<dyn Ui>) -> Self {
        Self { ui }
    }
}

impl EventLogger for ConsoleEventLogger {
    fn new_stage(&self, name: &str) -> Box<dyn Stage> {
        Box::new(ConsoleStage {
            name: name.to_string(),
            ui: self.ui.clone(),
            started_at: None,
        })
    }
}

struct ConsoleStage {
    name: String,
    ui: Arc<dyn Ui>,
    started_at: Option<DateTime<Utc>>,
}

impl Stage for ConsoleStage {
    fn start(&mut self) {
        self.started_at = Some(Utc::now());
        info!(stage = %self.name, "Stage started");
        self.ui.say(&format!("Started {}", self.name));
    }

    fn new_step(&mut self, name: &str) -> Box<dyn Step> {
        Box::new(ConsoleStep {
            stage: self.name.clone(),
            name: name.to_string(),
            ui: self.ui.clone(),
            started_at: None,
        })
    }

    fn finish(&mut self) {
        info!(stage = %self.name, "Stage finished");
        self.ui.say(&format!(
            "{} {} ({})",
            "Done".green(),
            self.name,
            elapsed(self.started_at)
        ));
    }
}

struct ConsoleStep {
    stage: String,
    name: String,
    ui: Arc<dyn Ui>,
    started_at: Option<DateTime<Utc>>,
}

impl ConsoleStep {
    fn report(&self, state: EventState, outcome: String) {
        info!(stage = %self.stage, step = %self.name, %state, "Step {}", state);
        self.ui.say(&format!(
            "Started {} > {}. {} ({})",
            self.stage,
            self.name,
            outcome,
            elapsed(self.started_at)
        ));
    }
}

impl Step for ConsoleStep {
    fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    fn finish(&mut self) {
        self.report(EventState::Finished, "Done".green().to_string());
    }

    fn fail(&mut self, message: &str) {
        self.report(
            EventState::Failed,
            format!("{} '{}'", "Failed".red(), message),
        );
    }

    fn skip(&mut self, message: &str) {
        self.report(
            EventState::Skipped,
            format!("{} '{}'", "Skipped".yellow(), message),
        );
    }
}

/// Elapsed time since `since` as `HH:MM:SS`
fn elapsed(since: Option<DateTime<Utc>>) -> String {
    let secs = since
        .map(|s| (Utc::now() - s).num_seconds().max(0))
        .unwrap_or(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
