//! Foreground watch loop for `spirit autobackup --watch`.
//!
//! Three inputs drive it: an interval ticker, debounced file-change
//! notifications and a shutdown channel. Shutdown is only observed between
//! backups, so a run that has started always completes.

use crossbeam_channel::{Receiver, after, never, select, tick, unbounded};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::paths::{AUTOBACKUP_FILE, LOCK_FILE};

pub const DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The interval elapsed.
    Tick,
    /// Files changed and then stayed quiet for the debounce window.
    Change,
}

/// Watch `dir` recursively, forwarding changed paths on the returned channel.
///
/// The watcher stops when the returned handle is dropped.
pub fn watch_dir(dir: &Path) -> notify::Result<(RecommendedWatcher, Receiver<PathBuf>)> {
    let (tx, rx) = unbounded();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for p in event.paths {
                let _ = tx.send(p);
            }
        }
        Err(e) => warn!("watch error: {}", e),
    })?;
    watcher.watch(dir, RecursiveMode::Recursive)?;
    debug!(dir = %dir.display(), "watching for changes");
    Ok((watcher, rx))
}

/// Changes inside `.git`, to the run lock or to the backup policy are
/// produced by backups themselves and must not trigger another one.
pub fn is_relevant(path: &Path) -> bool {
    if path.components().any(|c| c == Component::Normal(".git".as_ref())) {
        return false;
    }
    !matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(LOCK_FILE) | Some(AUTOBACKUP_FILE)
    )
}

/// Run until `shutdown` fires or its sender is dropped. Returns the number of
/// triggers handled.
pub fn run_loop<F>(
    interval: Duration,
    debounce: Duration,
    events: Receiver<PathBuf>,
    shutdown: Receiver<()>,
    mut on_trigger: F,
) -> usize
where
    F: FnMut(Trigger),
{
    let ticker = tick(interval);
    let mut events = events;
    let mut pending: Option<Instant> = None;
    let mut handled = 0;

    loop {
        let quiet = match pending {
            Some(at) => after(at.saturating_duration_since(Instant::now())),
            None => never(),
        };

        select! {
            recv(shutdown) -> _ => break,
            recv(ticker) -> _ => {
                pending = None;
                on_trigger(Trigger::Tick);
                handled += 1;
            }
            recv(events) -> ev => match ev {
                Ok(path) if is_relevant(&path) => {
                    debug!(path = %path.display(), "change detected");
                    pending = Some(Instant::now() + debounce);
                }
                Ok(_) => {}
                Err(_) => events = never(),
            },
            recv(quiet) -> _ => {
                pending = None;
                on_trigger(Trigger::Change);
                handled += 1;
            }
        }
    }
    handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::thread;

    #[test]
    fn relevance_filter() {
        assert!(is_relevant(Path::new("/ws/memory/a.md")));
        assert!(is_relevant(Path::new("/ws/IDENTITY.md")));
        assert!(!is_relevant(Path::new("/ws/.git/index")));
        assert!(!is_relevant(Path::new("/ws/.git/refs/heads/main")));
        assert!(!is_relevant(Path::new("/ws/.spirit.lock")));
        assert!(!is_relevant(Path::new("/ws/autobackup.json")));
    }

    #[test]
    fn ticks_until_shutdown() {
        let (_etx, erx) = unbounded::<PathBuf>();
        let (stx, srx) = bounded::<()>(1);

        let mut ticks = 0;
        let handled = run_loop(
            Duration::from_millis(20),
            Duration::from_secs(60),
            erx,
            srx,
            |t| {
                assert_eq!(t, Trigger::Tick);
                ticks += 1;
                if ticks == 3 {
                    stx.send(()).unwrap();
                }
            },
        );
        assert_eq!(handled, 3);
    }

    #[test]
    fn burst_of_changes_fires_once() {
        let (etx, erx) = unbounded::<PathBuf>();
        let (stx, srx) = bounded::<()>(1);

        for i in 0..5 {
            etx.send(PathBuf::from(format!("/ws/memory/{}.md", i))).unwrap();
        }
        etx.send(PathBuf::from("/ws/.git/index")).unwrap();

        let mut seen = Vec::new();
        run_loop(
            Duration::from_secs(3600),
            Duration::from_millis(50),
            erx,
            srx,
            |t| {
                seen.push(t);
                stx.send(()).unwrap();
            },
        );
        assert_eq!(seen, vec![Trigger::Change]);
    }

    #[test]
    fn ignored_paths_never_fire() {
        let (etx, erx) = unbounded::<PathBuf>();
        let (stx, srx) = bounded::<()>(1);
        etx.send(PathBuf::from("/ws/.spirit.lock")).unwrap();
        drop(etx);

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            stx.send(()).unwrap();
        });
        let handled = run_loop(
            Duration::from_secs(3600),
            Duration::from_millis(10),
            erx,
            srx,
            |_| panic!("no trigger expected"),
        );
        stopper.join().unwrap();
        assert_eq!(handled, 0);
    }

    #[test]
    fn dropped_shutdown_sender_stops_loop() {
        let (_etx, erx) = unbounded::<PathBuf>();
        let (stx, srx) = bounded::<()>(1);
        drop(stx);
        let handled = run_loop(Duration::from_secs(3600), DEBOUNCE, erx, srx, |_| {});
        assert_eq!(handled, 0);
    }
}
