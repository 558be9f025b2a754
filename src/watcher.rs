//! File-system watchers.
//!
//! Two directories are observed: the watch directory for freshly recorded
//! audio (full pipeline) and the review directory for manual subtitle
//! edits (downstream steps only). The notify callback normalizes raw
//! events into `FsEvent`s on a channel; async dispatcher tasks do the
//! stability wait, hash comparison and enqueueing. Keeping the dispatchers
//! as plain consumers of the event stream keeps them testable without a
//! real notification backend.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::hashing::hash_file;
use crate::metadata::{MetadataStore, Step};
use crate::queue::WorkQueue;
use crate::stability::wait_until_stable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created(PathBuf),
    Modified(PathBuf),
}

/// Keeps the underlying notify watcher alive for as long as events are
/// wanted; dropping it stops the subscription.
pub struct DirWatcher {
    _watcher: RecommendedWatcher,
}

/// Subscribe to create/modify events under `path`, non-recursive,
/// forwarding them onto `tx`.
pub fn watch_dir(path: &Path, tx: mpsc::UnboundedSender<FsEvent>) -> Result<DirWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let kind = event.kind;
            for path in event.paths {
                let forwarded = match kind {
                    EventKind::Create(_) => Some(FsEvent::Created(path)),
                    EventKind::Modify(_) => Some(FsEvent::Modified(path)),
                    _ => None,
                };
                if let Some(fs_event) = forwarded {
                    let _ = tx.send(fs_event);
                }
            }
        }
        Err(e) => warn!("Watch error: {}", e),
    })?;

    watcher.watch(path, RecursiveMode::NonRecursive)?;
    info!("Watching {}", path.display());
    Ok(DirWatcher { _watcher: watcher })
}

/// Base name of a newly created audio file, or None when the path is not
/// one we act on.
fn audio_base(path: &Path, config: &Config) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case(&config.pipeline.audio_extension) {
        return None;
    }
    Some(path.file_stem()?.to_str()?.to_string())
}

/// Base name of an edited subtitle file. Pristine `.orig` copies are ours,
/// not the user's, and never trigger anything.
fn subtitle_base(path: &Path, config: &Config) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case(&config.pipeline.subtitle_extension) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.ends_with(".orig") {
        return None;
    }
    Some(stem.to_string())
}

/// Dispatcher for the watch directory: every settled new audio file
/// becomes a queued job.
pub async fn run_audio_dispatcher(
    mut rx: mpsc::UnboundedReceiver<FsEvent>,
    config: Config,
    queue: WorkQueue,
) {
    while let Some(event) = rx.recv().await {
        let FsEvent::Created(path) = event else {
            continue;
        };
        let Some(base) = audio_base(&path, &config) else {
            continue;
        };

        info!("[{}] New audio file detected: {}", base, path.display());
        let stability = &config.stability;
        if !wait_until_stable(
            &path,
            stability.timeout(),
            stability.stable_time(),
            stability.poll(),
        )
        .await
        {
            warn!(
                "[{}] Audio file never settled within {}s, not enqueueing",
                base, stability.timeout_secs
            );
            continue;
        }

        queue.enqueue(&base);
    }
    debug!("Audio dispatcher stopped");
}

/// Dispatcher for the review directory: a subtitle whose content actually
/// changed clears the two downstream flags and re-queues the job. No-op
/// saves, and the pipeline's own file moves, hash identically and are
/// ignored.
pub async fn run_subtitle_dispatcher(
    mut rx: mpsc::UnboundedReceiver<FsEvent>,
    config: Config,
    store: MetadataStore,
    queue: WorkQueue,
) {
    while let Some(event) = rx.recv().await {
        let FsEvent::Modified(path) = event else {
            continue;
        };
        let Some(base) = subtitle_base(&path, &config) else {
            continue;
        };

        let stability = &config.stability;
        if !wait_until_stable(
            &path,
            stability.timeout(),
            stability.stable_time(),
            stability.poll(),
        )
        .await
        {
            warn!("[{}] Edited subtitle never settled, ignoring event", base);
            continue;
        }

        if let Err(e) = handle_subtitle_edit(&base, &path, &store, &queue) {
            warn!("[{}] Could not handle subtitle edit: {}", base, e);
        }
    }
    debug!("Subtitle dispatcher stopped");
}

fn handle_subtitle_edit(
    base: &str,
    path: &Path,
    store: &MetadataStore,
    queue: &WorkQueue,
) -> Result<()> {
    let mut record = store.load(base)?;
    if !record.is_complete(Step::ProcessAudio) {
        // Not a pipeline-produced subtitle yet; nothing to invalidate.
        debug!("[{}] Subtitle event before transcription completed, ignoring", base);
        return Ok(());
    }

    let hash = hash_file(path)?;
    if record.ass_hash.as_deref() == Some(hash.as_str()) {
        debug!("[{}] Subtitle content unchanged, ignoring", base);
        return Ok(());
    }

    info!("[{}] Subtitle edited, re-running conversion and translation", base);
    record.ass_hash = Some(hash);
    record.clear(Step::AssToSrt);
    record.clear(Step::Translate);
    store.save(base, &record)?;
    queue.enqueue(base);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::JobRecord;
    use std::time::Duration;

    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.paths.watch_dir = root.join("incoming");
        config.paths.work_dir = root.join("work");
        config.paths.review_dir = root.join("review");
        config.paths.output_dir = root.join("delivered");
        config.paths.state_dir = root.join("state");
        config.stability.timeout_secs = 1;
        config.stability.stable_secs = 0;
        config.stability.poll_millis = 10;
        for dir in [&config.paths.watch_dir, &config.paths.review_dir] {
            std::fs::create_dir_all(dir).unwrap();
        }
        config
    }

    async fn drain_job(rx: &mut mpsc::UnboundedReceiver<crate::queue::QueueMessage>) -> Option<String> {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(crate::queue::QueueMessage::Job(base))) => Some(base),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_new_audio_file_is_enqueued() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let (queue, mut job_rx) = WorkQueue::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let audio = config.audio_path("demo");
        std::fs::write(&audio, b"riff").unwrap();

        let dispatcher = tokio::spawn(run_audio_dispatcher(rx, config, queue));
        tx.send(FsEvent::Created(audio)).unwrap();
        drop(tx);

        assert_eq!(drain_job(&mut job_rx).await.as_deref(), Some("demo"));
        dispatcher.await.unwrap();
    }

    #[tokio::test]
    async fn test_non_audio_files_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let (queue, mut job_rx) = WorkQueue::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let note = config.paths.watch_dir.join("notes.txt");
        std::fs::write(&note, b"not audio").unwrap();

        let dispatcher = tokio::spawn(run_audio_dispatcher(rx, config, queue));
        tx.send(FsEvent::Created(note)).unwrap();
        drop(tx);
        dispatcher.await.unwrap();

        assert!(job_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_genuine_edit_clears_downstream_flags_and_enqueues() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let store = MetadataStore::new(&config.paths.state_dir).unwrap();
        let (queue, mut job_rx) = WorkQueue::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let subtitle = config.review_subtitle_path("demo");
        std::fs::write(&subtitle, "edited content").unwrap();

        let mut record = JobRecord::default();
        record.mark_complete(Step::ProcessAudio);
        record.mark_complete(Step::AssToSrt);
        record.mark_complete(Step::Translate);
        record.ass_hash = Some("hash-of-the-original".to_string());
        store.save("demo", &record).unwrap();

        let dispatcher = tokio::spawn(run_subtitle_dispatcher(
            rx,
            config.clone(),
            store.clone(),
            queue,
        ));
        tx.send(FsEvent::Modified(subtitle.clone())).unwrap();
        drop(tx);
        dispatcher.await.unwrap();

        assert_eq!(drain_job(&mut job_rx).await.as_deref(), Some("demo"));
        let record = store.load("demo").unwrap();
        assert!(record.is_complete(Step::ProcessAudio));
        assert!(!record.is_complete(Step::AssToSrt));
        assert!(!record.is_complete(Step::Translate));
        assert_eq!(
            record.ass_hash.unwrap(),
            hash_file(&subtitle).unwrap()
        );
    }

    #[tokio::test]
    async fn test_noop_save_changes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let store = MetadataStore::new(&config.paths.state_dir).unwrap();
        let (queue, mut job_rx) = WorkQueue::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let subtitle = config.review_subtitle_path("demo");
        std::fs::write(&subtitle, "same content").unwrap();

        let mut record = JobRecord::default();
        record.mark_complete(Step::ProcessAudio);
        record.mark_complete(Step::AssToSrt);
        record.mark_complete(Step::Translate);
        record.ass_hash = Some(hash_file(&subtitle).unwrap());
        store.save("demo", &record).unwrap();

        let dispatcher = tokio::spawn(run_subtitle_dispatcher(
            rx,
            config,
            store.clone(),
            queue,
        ));
        tx.send(FsEvent::Modified(subtitle)).unwrap();
        drop(tx);
        dispatcher.await.unwrap();

        assert!(job_rx.try_recv().is_err());
        let record = store.load("demo").unwrap();
        assert!(record.is_complete(Step::AssToSrt));
        assert!(record.is_complete(Step::Translate));
    }

    #[tokio::test]
    async fn test_pristine_copy_events_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let store = MetadataStore::new(&config.paths.state_dir).unwrap();
        let (queue, mut job_rx) = WorkQueue::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let pristine = config.pristine_subtitle_path("demo");
        std::fs::write(&pristine, "untouched").unwrap();

        let dispatcher = tokio::spawn(run_subtitle_dispatcher(rx, config, store, queue));
        tx.send(FsEvent::Modified(pristine)).unwrap();
        drop(tx);
        dispatcher.await.unwrap();

        assert!(job_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_edit_before_transcription_completes_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        let config = test_config(root.path());
        let store = MetadataStore::new(&config.paths.state_dir).unwrap();
        let (queue, mut job_rx) = WorkQueue::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let subtitle = config.review_subtitle_path("demo");
        std::fs::write(&subtitle, "half-built").unwrap();

        let dispatcher = tokio::spawn(run_subtitle_dispatcher(
            rx,
            config,
            store.clone(),
            queue,
        ));
        tx.send(FsEvent::Modified(subtitle)).unwrap();
        drop(tx);
        dispatcher.await.unwrap();

        assert!(job_rx.try_recv().is_err());
        assert!(store.load("demo").unwrap().steps_completed.is_empty());
    }
}
