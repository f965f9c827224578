//! Watch coordinator for the sink folder.
//!
//! Lifecycle: `Stopped -> Initialized -> Running -> Stopped`. Live creation
//! events and the recovery sweep share one processing gate, so the file
//! processor never runs twice at the same time.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::{Config, ERROR_DIR, PROCESSED_DIR};
use crate::models::internal::{CandidateFile, ResolutionOutcome};
use crate::services::file_processor::FileProcessor;
use crate::services::outcome_router::OutcomeRouter;

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Watch backend error: {0}")]
    Notify(#[from] notify::Error),
    #[error("Sweep failed: {0}")]
    Sweep(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Initialized,
    Running,
}

/// How long to wait for a freshly created file to stop growing.
#[derive(Debug, Clone, Copy)]
pub struct SettlePolicy {
    pub delay: Duration,
    pub max_polls: u32,
}

impl SettlePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            delay: config.settle_delay(),
            max_polls: config.settle_max_polls,
        }
    }

    /// Waits until two consecutive size samples agree. Returns `false` when
    /// the file disappeared in the meantime.
    pub async fn wait(&self, path: &Path) -> bool {
        if self.delay.is_zero() {
            return tokio::fs::try_exists(path).await.unwrap_or(false);
        }

        tokio::time::sleep(self.delay).await;
        let mut last_len = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(_) => return false,
        };

        for _ in 1..self.max_polls {
            tokio::time::sleep(self.delay).await;
            let len = match tokio::fs::metadata(path).await {
                Ok(meta) => meta.len(),
                Err(_) => return false,
            };
            if len == last_len {
                return true;
            }
            last_len = len;
        }

        debug!(
            "File {} still changing after {} polls, processing anyway",
            path.display(),
            self.max_polls
        );
        true
    }
}

struct RunningWatcher {
    watcher: RecommendedWatcher,
    stop_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

pub struct SinkWatcher {
    config: Arc<Config>,
    processor: Arc<FileProcessor>,
    router: Arc<OutcomeRouter>,
    gate: Arc<Mutex<()>>,
    state: WatcherState,
    running: Option<RunningWatcher>,
}

impl SinkWatcher {
    pub fn new(config: Arc<Config>, processor: Arc<FileProcessor>) -> Self {
        let router = Arc::new(OutcomeRouter::new(config.watch_root.clone()));
        Self {
            config,
            processor,
            router,
            gate: Arc::new(Mutex::new(())),
            state: WatcherState::Stopped,
            running: None,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn processor(&self) -> Arc<FileProcessor> {
        self.processor.clone()
    }

    pub fn router(&self) -> Arc<OutcomeRouter> {
        self.router.clone()
    }

    pub fn watch_root(&self) -> &Path {
        &self.config.watch_root
    }

    /// Creates the watch root with its `processed/` and `error/` children.
    pub fn initialize(&mut self) -> Result<(), WatcherError> {
        std::fs::create_dir_all(&self.config.watch_root)?;
        std::fs::create_dir_all(self.config.processed_dir())?;
        std::fs::create_dir_all(self.config.error_dir())?;

        info!(
            "Sink folder initialized at: {}",
            self.config.watch_root.display()
        );
        info!(
            "Layout: {{owner}}/[{{category_id}}/]file, {}/ for imported files, {}/ for failures",
            PROCESSED_DIR, ERROR_DIR
        );

        if self.state == WatcherState::Stopped {
            self.state = WatcherState::Initialized;
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), WatcherError> {
        if self.state == WatcherState::Running {
            warn!("Sink folder watcher already running");
            return Ok(());
        }

        self.initialize()?;

        let (tx, rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            if tx.send(event).is_err() {
                debug!("Watch event dropped because worker channel is closed");
            }
        })?;
        watcher.watch(&self.config.watch_root, RecursiveMode::Recursive)?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_event_loop(
            rx,
            self.config.clone(),
            self.processor.clone(),
            self.router.clone(),
            self.gate.clone(),
            stop_rx,
        ));

        self.running = Some(RunningWatcher {
            watcher,
            stop_tx,
            worker,
        });
        self.state = WatcherState::Running;

        info!(
            "Starting sink folder watcher on: {}",
            self.config.watch_root.display()
        );
        Ok(())
    }

    /// Detaches the subscription. The file being processed, if any, completes;
    /// queued events are left for the next sweep.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        info!("Stopping sink folder watcher...");
        drop(running.watcher);
        // Ignored when the worker already exited.
        let _ = running.stop_tx.send(true);

        if let Err(e) = running.worker.await {
            error!("Sink folder worker terminated abnormally: {}", e);
        }
        self.state = WatcherState::Stopped;
    }

    /// Subscribes first and then sweeps, so a file dropped in between is seen
    /// by at least one of the two. Returns the number of files swept.
    pub async fn start_and_recover(&mut self) -> Result<usize, WatcherError> {
        self.start()?;
        self.sweep().await
    }

    /// Processes every allowed file already below the watch root, skipping the
    /// `processed/` and `error/` subtrees. Returns the number of files handled.
    pub async fn sweep(&self) -> Result<usize, WatcherError> {
        let root = self.config.watch_root.clone();
        let config = self.config.clone();
        let candidates = tokio::task::spawn_blocking(move || collect_candidates(&root, &config))
            .await
            .map_err(|e| WatcherError::Sweep(e.to_string()))?;

        let _gate = self.gate.lock().await;
        let mut count = 0;
        for candidate in candidates {
            if !tokio::fs::try_exists(&candidate.path).await.unwrap_or(false) {
                continue;
            }
            info!("Processing existing file: {}", candidate.path.display());
            resolve_file(&self.processor, &self.router, &candidate).await;
            count += 1;
        }

        info!("Sweep processed {} file(s)", count);
        Ok(count)
    }
}

/// Allowed files below `dir`, which is the watch root or a folder inside it.
fn collect_candidates(dir: &Path, config: &Config) -> Vec<CandidateFile> {
    candidates_from(walk_below(dir, &config.watch_root), config)
}

fn walk_below<'a>(
    dir: &Path,
    watch_root: &'a Path,
) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
    WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| !is_in_reserved_subtree(entry.path(), watch_root))
}

/// Unreadable entries are logged and skipped so one bad folder does not
/// block the rest of the walk.
fn candidates_from(
    entries: impl Iterator<Item = walkdir::Result<DirEntry>>,
    config: &Config,
) -> Vec<CandidateFile> {
    let mut candidates = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry during scan: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !config.is_allowed_extension(entry.path()) {
            continue;
        }
        candidates.push(CandidateFile::new(entry.into_path()));
    }
    candidates
}

fn is_in_reserved_subtree(path: &Path, root: &Path) -> bool {
    path.starts_with(root.join(PROCESSED_DIR)) || path.starts_with(root.join(ERROR_DIR))
}

/// Paths that appeared below the root: creations and rename targets outside
/// the terminal subtrees. Files must carry an allowed extension; folders are
/// kept so their contents can be scanned.
fn created_paths(event: Event, config: &Config) -> Vec<PathBuf> {
    let Event { kind, paths, .. } = event;
    let paths: Vec<PathBuf> = match kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => paths,
        // Both carries [from, to].
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            paths.into_iter().skip(1).take(1).collect()
        }
        _ => return Vec::new(),
    };

    paths
        .into_iter()
        .filter(|path| !is_in_reserved_subtree(path, &config.watch_root))
        .filter(|path| path.is_dir() || config.is_allowed_extension(path))
        .collect()
}

/// A new folder brings no events for files already inside it, so its
/// contents are listed directly once the backend has had `delay` to
/// subscribe to it.
async fn expand_created(path: PathBuf, config: &Arc<Config>, delay: Duration) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path];
    }

    tokio::time::sleep(delay).await;
    let config = config.clone();
    let dir = path.clone();
    match tokio::task::spawn_blocking(move || collect_candidates(&dir, &config)).await {
        Ok(candidates) => {
            debug!(
                "Folder {} appeared with {} file(s)",
                path.display(),
                candidates.len()
            );
            candidates.into_iter().map(|candidate| candidate.path).collect()
        }
        Err(e) => {
            warn!("Failed to scan new folder {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

async fn run_event_loop(
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    config: Arc<Config>,
    processor: Arc<FileProcessor>,
    router: Arc<OutcomeRouter>,
    gate: Arc<Mutex<()>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let settle = SettlePolicy::from_config(&config);
    info!("Sink folder worker started");

    loop {
        let event = tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!("Watch backend reported an error: {}", e);
                continue;
            }
        };

        for created in created_paths(event, &config) {
            for path in expand_created(created, &config, settle.delay).await {
                if *stop_rx.borrow() {
                    debug!("Watcher stopping, leaving {} for the next sweep", path.display());
                    continue;
                }

                if !settle.wait(&path).await {
                    debug!("File {} vanished before processing", path.display());
                    continue;
                }

                let _gate = gate.lock().await;
                // The sweep or an earlier event may have resolved the file already.
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    continue;
                }
                resolve_file(&processor, &router, &CandidateFile::new(path)).await;
            }
        }
    }

    info!("Sink folder worker stopped");
}

/// Runs one candidate through the processor and routes it to its terminal folder.
pub async fn resolve_file(
    processor: &FileProcessor,
    router: &OutcomeRouter,
    candidate: &CandidateFile,
) -> ResolutionOutcome {
    let outcome = processor.process(&candidate.path).await;
    router.route(&candidate.path, &outcome).await;
    outcome
}
