//! File watching for hot parameter reloading.
//!
//! The watcher never reloads anything itself. It raises the shared staleness
//! flag owned by [`super::TransitionSettings`], and the next parameter lookup
//! re-reads the file on the caller's thread.

use anyhow::{Context, Result, anyhow};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Watches one parameter file and flags it stale when it changes.
pub struct ConfigWatcher {
    /// File being watched
    path: PathBuf,
    /// Flag raised on every relevant change
    stale: Arc<AtomicBool>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>, stale: Arc<AtomicBool>) -> Self {
        Self {
            path: path.into(),
            stale,
        }
    }

    /// Start watching. The returned watcher must be kept alive for as long as
    /// change notifications are wanted.
    pub fn start(self) -> Result<RecommendedWatcher> {
        let file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| anyhow!("{} has no file name", self.path.display()))?;

        // Watch the parent directory: editors often replace the file rather
        // than write it in place, which drops a watch on the file itself
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let stale = self.stale;
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let Ok(event) = res else {
                    return;
                };
                if is_relevant(&event, &file_name) {
                    stale.store(true, Ordering::SeqCst);
                }
            },
            NotifyConfig::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", parent.display()))?;

        log_debug!("Watching {} for transition parameter changes", self.path.display());

        Ok(watcher)
    }
}

/// Start watching `path`, raising `stale` whenever it is created, modified or removed.
pub fn start_config_watcher(path: &Path, stale: Arc<AtomicBool>) -> Result<RecommendedWatcher> {
    ConfigWatcher::new(path, stale).start()
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    kind_matches
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some_and(|name| name == file_name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_changes_to_the_watched_file_are_relevant() {
        let name = OsString::from("transitions.toml");

        assert!(is_relevant(
            &event(EventKind::Modify(ModifyKind::Any), "/cfg/transitions.toml"),
            &name
        ));
        assert!(is_relevant(
            &event(EventKind::Create(CreateKind::File), "/cfg/transitions.toml"),
            &name
        ));
        assert!(!is_relevant(
            &event(EventKind::Modify(ModifyKind::Any), "/cfg/other.toml"),
            &name
        ));
        assert!(!is_relevant(
            &event(EventKind::Access(AccessKind::Any), "/cfg/transitions.toml"),
            &name
        ));
    }
}
