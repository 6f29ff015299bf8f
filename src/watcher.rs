//! File system watchers for live reload
//!
//! Watches the styles directory and the config directory. A `.css`
//! modification asks renderers to reload their stylesheet; a
//! `config.json` modification reloads the config and reapplies the theme.
//! Events are debounced by draining the burst a filesystem save produces.

use crate::shell::ShellUpdate;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Editors and `fs::write` produce several events per save; everything
/// inside this window collapses into one reload.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Keeps the underlying watchers alive; dropping stops them.
pub struct ReloadWatcher {
    _watchers: Vec<RecommendedWatcher>,
}

/// What a single filesystem event maps to.
fn classify(event: &Event) -> Option<ShellUpdate> {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return None;
    }
    for path in &event.paths {
        if path.file_name().is_some_and(|name| name == "config.json") {
            return Some(ShellUpdate::ConfigFileChanged);
        }
        if path.extension().is_some_and(|ext| ext == "css") {
            return Some(ShellUpdate::CssFileChanged(path.clone()));
        }
    }
    None
}

/// Watch `styles_dir` and `config_dir`, pushing reload updates onto the
/// main loop's bus.
pub fn start(
    styles_dir: &Path,
    config_dir: &Path,
    updates: Sender<ShellUpdate>,
) -> Result<ReloadWatcher> {
    let (event_tx, event_rx) = mpsc::channel::<notify::Result<Event>>();

    let mut watchers = Vec::new();
    for dir in [styles_dir, config_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create watched directory {:?}", dir))?;
        let tx = event_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .context("failed to create file watcher")?;
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {:?}", dir))?;
        info!("watching {:?} for changes", dir);
        watchers.push(watcher);
    }

    thread::Builder::new()
        .name("goblin-watcher".into())
        .spawn(move || watch_loop(event_rx, updates))?;

    Ok(ReloadWatcher {
        _watchers: watchers,
    })
}

fn watch_loop(
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    updates: Sender<ShellUpdate>,
) {
    loop {
        let first = match event_rx.recv() {
            Ok(res) => res,
            // All watchers dropped; nothing left to do.
            Err(_) => return,
        };

        let mut pending_css: Option<PathBuf> = None;
        let mut pending_config = false;
        let mut note = |res: notify::Result<Event>| match res {
            Ok(event) => match classify(&event) {
                Some(ShellUpdate::ConfigFileChanged) => pending_config = true,
                Some(ShellUpdate::CssFileChanged(path)) => pending_css = Some(path),
                _ => {}
            },
            Err(e) => warn!("watch error: {}", e),
        };
        note(first);

        // Drain the burst before reporting.
        loop {
            match event_rx.recv_timeout(DEBOUNCE) {
                Ok(res) => note(res),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        drop(note);

        if pending_config {
            debug!("config change detected");
            if updates.send(ShellUpdate::ConfigFileChanged).is_err() {
                return;
            }
        }
        if let Some(path) = pending_css {
            debug!("stylesheet change detected: {:?}", path);
            if updates.send(ShellUpdate::CssFileChanged(path)).is_err() {
                return;
            }
        }
    }
}
