use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::time::Duration;

/// Step a checkpoint or sync run has entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    EnsureRepo,
    CheckRemote,
    Mirror,
    Fetch,
    Pull,
    Stage,
    Commit,
    Push,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::EnsureRepo => "preparing state repository",
            Stage::CheckRemote => "checking remote",
            Stage::Mirror => "mirroring workspace files",
            Stage::Fetch => "fetching",
            Stage::Pull => "pulling remote changes",
            Stage::Stage => "staging files",
            Stage::Commit => "committing",
            Stage::Push => "pushing",
        };
        f.write_str(s)
    }
}

/// Receives stage transitions from the orchestrators.
pub trait Progress {
    fn stage(&self, stage: Stage);
}

/// Discards every update.
pub struct Quiet;

impl Progress for Quiet {
    fn stage(&self, _stage: Stage) {}
}

/// Terminal spinner for one run. Draws nothing when stderr is not a terminal.
pub struct Spinner {
    pb: ProgressBar,
    verbose: bool,
}

impl Spinner {
    pub fn start(message: impl Into<String>, verbose: bool) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(running_style());
        pb.set_message(message.into());
        pb.enable_steady_tick(Duration::from_millis(80));
        Self { pb, verbose }
    }

    pub fn finish_ok(&self, message: impl Into<String>) {
        self.pb.set_style(done_style());
        self.pb.set_prefix("done");
        self.pb.finish_with_message(message.into());
    }

    pub fn finish_err(&self, message: impl Into<String>) {
        self.pb.set_style(failed_style());
        self.pb.set_prefix("failed");
        self.pb.finish_with_message(message.into());
    }
}

impl Progress for Spinner {
    fn stage(&self, stage: Stage) {
        if self.verbose {
            self.pb.println(format!("  → {}", stage));
        }
        self.pb.set_message(stage.to_string());
    }
}

const FRAMES: &[&str] = &["◐", "◓", "◑", "◒"];

// Falls back to the plain spinner if a template fails to parse.
fn template(t: &str) -> ProgressStyle {
    ProgressStyle::with_template(t).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Cyan frames, elapsed seconds, then the current stage.
fn running_style() -> ProgressStyle {
    template("{spinner:.cyan} {elapsed:>3.dim} {wide_msg}").tick_strings(FRAMES)
}

fn done_style() -> ProgressStyle {
    template("{prefix:.green.bold} {wide_msg}")
}

fn failed_style() -> ProgressStyle {
    template("{prefix:.red.bold} {wide_msg}")
}

#[cfg(test)]
pub(crate) mod recording {
    use super::{Progress, Stage};
    use std::cell::RefCell;

    /// Collects stages in the order they were reported.
    #[derive(Default)]
    pub struct Recorder(pub RefCell<Vec<Stage>>);

    impl Recorder {
        pub fn stages(&self) -> Vec<Stage> {
            self.0.borrow().clone()
        }
    }

    impl Progress for Recorder {
        fn stage(&self, stage: Stage) {
            self.0.borrow_mut().push(stage);
        }
    }
}
