//! UI controller
//!
//! Explicit state machine behind the window: Idle -> FileSelected ->
//! Converting -> Idle. The GUI layer only renders this state and forwards
//! dialog results; dialog cancellation changes nothing. While a job is
//! running every trigger is a no-op, so overlapping jobs cannot start.

use std::path::{Path, PathBuf};

use crate::config::ConvertConfig;
use crate::job::{ConversionJob, JobEvent, JobHandle};

/// Controller phase, derived from what the controller currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    FileSelected,
    Converting,
}

/// Terminal status line shown under the progress indicator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusLine {
    #[default]
    Empty,
    Converting,
    Completed,
    Error(String),
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusLine::Empty => Ok(()),
            StatusLine::Converting => write!(f, "Converting video..."),
            StatusLine::Completed => write!(f, "Conversion completed successfully!"),
            StatusLine::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

/// Owns the selected source and the active job handle
#[derive(Default)]
pub struct Controller {
    source: Option<PathBuf>,
    job: Option<JobHandle>,
    status: StatusLine,
    config: ConvertConfig,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ConvertConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        if self.job.is_some() {
            Phase::Converting
        } else if self.source.is_some() {
            Phase::FileSelected
        } else {
            Phase::Idle
        }
    }

    pub fn is_converting(&self) -> bool {
        self.job.is_some()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    /// A source file was chosen in the open dialog.
    ///
    /// Returns `false` (and changes nothing) while a job is running.
    pub fn select_source(&mut self, path: PathBuf) -> bool {
        if self.job.is_some() {
            return false;
        }
        self.source = Some(path);
        true
    }

    /// A destination was chosen; spawn the worker.
    ///
    /// Returns `false` (and spawns nothing) unless a source is selected and
    /// no job is running.
    pub fn start_conversion(&mut self, output: PathBuf) -> bool {
        if self.job.is_some() {
            return false;
        }
        let source = match self.source.clone() {
            Some(source) => source,
            None => return false,
        };

        let job = ConversionJob::new(source, output).with_config(self.config.clone());
        self.job = Some(job.spawn());
        self.status = StatusLine::Converting;
        true
    }

    /// Poll the active job. On the terminal event the worker is reaped and
    /// the controller returns to idle, ready for the next trigger.
    pub fn poll(&mut self) -> Option<JobEvent> {
        let event = self.job.as_ref()?.try_event()?;

        if let Some(mut handle) = self.job.take() {
            handle.join();
        }
        self.source = None;
        self.status = match &event {
            JobEvent::Completed { .. } => StatusLine::Completed,
            JobEvent::Failed { message } => StatusLine::Error(message.clone()),
        };
        Some(event)
    }
}

/// Default destination next to the source: `<source-stem>_shorts.mp4`
pub fn default_output_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    source.with_file_name(format!("{}_shorts.mp4", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn poll_until_terminal(controller: &mut Controller) -> JobEvent {
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            if let Some(event) = controller.poll() {
                return event;
            }
            assert!(Instant::now() < deadline, "job never reported");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn default_output_appends_shorts_suffix() {
        let out = default_output_path(Path::new("/videos/talk.mkv"));
        assert_eq!(out, PathBuf::from("/videos/talk_shorts.mp4"));
    }

    #[test]
    fn selecting_a_file_moves_to_file_selected() {
        let mut controller = Controller::new();
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.select_source(PathBuf::from("a.mp4")));
        assert_eq!(controller.phase(), Phase::FileSelected);
        assert_eq!(controller.source(), Some(Path::new("a.mp4")));
    }

    #[test]
    fn start_without_selection_is_a_noop() {
        let mut controller = Controller::new();
        assert!(!controller.start_conversion(PathBuf::from("out.mp4")));
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[test]
    fn failed_job_returns_controller_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = Controller::new();
        controller.select_source(dir.path().join("missing.mp4"));
        assert!(controller.start_conversion(dir.path().join("out.mp4")));
        assert_eq!(controller.phase(), Phase::Converting);

        let event = poll_until_terminal(&mut controller);
        assert!(matches!(event, JobEvent::Failed { .. }));
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(matches!(controller.status(), StatusLine::Error(_)));
    }

    #[test]
    fn second_trigger_while_converting_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = Controller::new();
        controller.select_source(dir.path().join("missing.mp4"));
        assert!(controller.start_conversion(dir.path().join("out.mp4")));

        // Both re-selecting and re-starting are rejected while active
        assert!(!controller.select_source(dir.path().join("other.mp4")));
        assert!(!controller.start_conversion(dir.path().join("out2.mp4")));

        poll_until_terminal(&mut controller);
    }

    #[test]
    fn idle_state_is_retriggerable_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = Controller::new();
        controller.select_source(dir.path().join("missing.mp4"));
        controller.start_conversion(dir.path().join("out.mp4"));
        poll_until_terminal(&mut controller);

        assert!(controller.select_source(dir.path().join("again.mp4")));
        assert_eq!(controller.phase(), Phase::FileSelected);
    }
}
