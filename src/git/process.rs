use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{Result, SpiritError};

const MAX_POLL: Duration = Duration::from_millis(50);

/// Captured result of one `git` invocation.
#[derive(Debug)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// stdout followed by stderr, trimmed. Diagnostics are classified on this.
    pub fn combined(&self) -> String {
        let mut s = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        s.push_str(self.stdout.trim_end());
        if !s.is_empty() && !self.stderr.trim().is_empty() {
            s.push('\n');
        }
        s.push_str(self.stderr.trim_end());
        s.trim().to_string()
    }
}

/// Run `git <args>` in `dir`, killing it if it is still running after
/// `timeout`.
///
/// Output is forced to the C locale so diagnostics can be matched, and
/// terminal credential prompts are disabled so a missing credential fails
/// instead of hanging.
pub fn run_git<S: AsRef<OsStr>>(dir: &Path, args: &[S], timeout: Duration) -> Result<GitOutput> {
    let args: Vec<OsString> = args.iter().map(|a| a.as_ref().to_os_string()).collect();
    let shown = render(&args);
    debug!(dir = %dir.display(), "git {}", shown);

    let mut child = Command::new("git")
        .args(&args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(SpiritError::Spawn)?;

    let out = drain(child.stdout.take());
    let err = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let mut poll = Duration::from_millis(1);
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            warn!("git {} exceeded {:?}, killing", shown, timeout);
            let _ = child.kill();
            let _ = child.wait();
            // Reader threads are left to finish on their own: a helper
            // process spawned by git may still hold the pipes open.
            return Err(SpiritError::Timeout {
                command: shown,
                after: timeout,
            });
        }
        thread::sleep(poll);
        poll = (poll * 2).min(MAX_POLL);
    };

    let output = GitOutput {
        success: status.success(),
        stdout: String::from_utf8_lossy(&out.join().unwrap_or_default()).into_owned(),
        stderr: String::from_utf8_lossy(&err.join().unwrap_or_default()).into_owned(),
    };
    if !output.success {
        debug!(code = ?status.code(), "git {} failed: {}", shown, output.combined());
    }
    Ok(output)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        buf
    })
}

fn render(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
