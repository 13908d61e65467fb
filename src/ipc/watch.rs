//! Report profile files that change on disk. The main loop decides whether
//! the change concerns the active profile.

use anyhow::Result;
use log::{debug, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    path::{Path, PathBuf},
    sync::mpsc::Sender,
};

use super::server::IpcMsg;

/// The returned watcher must be kept alive for events to keep flowing.
pub fn watch_profiles(dir: &Path, tx: Sender<IpcMsg>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(ev) => {
            if !matches!(ev.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            for name in changed_profiles(&ev.paths) {
                debug!("profile '{name}' changed on disk");
                let _ = tx.send(IpcMsg::ProfileChanged(name));
            }
        }
        Err(e) => warn!("profile watcher error: {e}"),
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Profile names (file stems of `.toml` paths) touched by one event.
fn changed_profiles(paths: &[PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = paths
        .iter()
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_toml_files_are_reported() {
        let paths = vec![
            PathBuf::from("/cfg/profiles/default.toml"),
            PathBuf::from("/cfg/profiles/default.toml"),
            PathBuf::from("/cfg/profiles/.default.toml.swp"),
            PathBuf::from("/cfg/profiles/notes.txt"),
            PathBuf::from("/cfg/profiles/gentle.toml"),
        ];
        assert_eq!(changed_profiles(&paths), vec!["default", "gentle"]);
    }
}
