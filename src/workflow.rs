//! Process-level orchestration.
//!
//! The `Workflow` owns the configuration and the metadata store, performs
//! the fatal startup checks, and wires watchers, queue and worker together
//! with an explicit run and shutdown lifecycle.

use tokio::sync::mpsc;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, SubflowError};
use crate::metadata::{MetadataStore, Step};
use crate::queue::{run_worker, WorkQueue};
use crate::steps::Pipeline;
use crate::tools::check_converter;
use crate::watcher::{run_audio_dispatcher, run_subtitle_dispatcher, watch_dir};

#[derive(Debug)]
pub struct Workflow {
    config: Config,
    store: MetadataStore,
}

impl Workflow {
    /// Validate the environment and construct the workflow. Any missing
    /// tool or watched folder is fatal here, before anything starts.
    pub fn new(config: Config) -> Result<Self> {
        Self::check_environment(&config)?;
        let store = MetadataStore::new(&config.paths.state_dir)?;
        Ok(Self { config, store })
    }

    fn check_environment(config: &Config) -> Result<()> {
        if !config.paths.watch_dir.is_dir() {
            return Err(SubflowError::Config(format!(
                "Watched folder does not exist: {}",
                config.paths.watch_dir.display()
            )));
        }

        for dir in [
            &config.paths.work_dir,
            &config.paths.review_dir,
            &config.paths.output_dir,
            &config.paths.state_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }

        for script in [
            &config.tools.process_audio_command,
            &config.tools.translate_command,
        ] {
            if !script.exists() {
                return Err(SubflowError::FileNotFound(format!(
                    "Required tool not found: {}",
                    script.display()
                )));
            }
        }

        check_converter(&config.tools.converter_path)?;
        Ok(())
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Watch mode: catch up on audio files already present, then run the
    /// watchers and the worker until interrupted.
    pub async fn run_watch(self) -> Result<()> {
        let (queue, job_rx) = WorkQueue::new();
        let pipeline = Pipeline::new(self.config.clone(), self.store.clone());
        let worker = tokio::spawn(run_worker(job_rx, queue.clone(), pipeline));

        self.catch_up_scan(&queue);

        let (audio_tx, audio_rx) = mpsc::unbounded_channel();
        let audio_watch = watch_dir(&self.config.paths.watch_dir, audio_tx)?;
        let audio_dispatcher = tokio::spawn(run_audio_dispatcher(
            audio_rx,
            self.config.clone(),
            queue.clone(),
        ));

        let (subtitle_tx, subtitle_rx) = mpsc::unbounded_channel();
        let subtitle_watch = watch_dir(&self.config.paths.review_dir, subtitle_tx)?;
        let subtitle_dispatcher = tokio::spawn(run_subtitle_dispatcher(
            subtitle_rx,
            self.config.clone(),
            self.store.clone(),
            queue.clone(),
        ));

        info!("Watching for work. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;
        info!("Interrupt received, shutting down");

        // Stop the event producers first; the dispatchers drain their
        // channels and exit once the senders are gone.
        drop(audio_watch);
        drop(subtitle_watch);
        let _ = audio_dispatcher.await;
        let _ = subtitle_dispatcher.await;

        // Let the worker finish everything already queued, then stop. An
        // in-flight external tool is never aborted.
        queue.shutdown();
        let _ = worker.await;

        info!("Shutdown complete");
        Ok(())
    }

    /// Enqueue audio files that arrived while we were not running. The
    /// completion flags make this safe for files already processed.
    fn catch_up_scan(&self, queue: &WorkQueue) {
        let mut found = 0usize;
        for entry in WalkDir::new(&self.config.paths.watch_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let matches_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.config.pipeline.audio_extension));
            if !matches_ext {
                continue;
            }
            let Some(base) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.store.load(base) {
                Ok(record) if record.is_complete(Step::Translate) => {}
                Ok(_) => {
                    if queue.enqueue(base) {
                        found += 1;
                    }
                }
                Err(e) => warn!("[{}] Skipping during catch-up scan: {}", base, e),
            }
        }
        if found > 0 {
            info!("Catch-up scan queued {} unfinished job(s)", found);
        }
    }

    /// Resume mode: seed the flags for the steps presumed done, clear the
    /// rest, process the one job, and return once the queue has drained.
    pub async fn run_resume(self, base: &str, from_step: u8) -> Result<()> {
        let step = Step::from_number(from_step).ok_or_else(|| {
            SubflowError::Config(format!(
                "Invalid step number {}, expected 1-3",
                from_step
            ))
        })?;

        let mut record = self.store.load(base)?;
        for s in Step::ALL {
            if s.number() < step.number() {
                record.mark_complete(s);
            } else {
                record.clear(s);
            }
        }
        self.store.save(base, &record)?;
        info!("[{}] Resuming from step {} ({})", base, from_step, step.as_str());

        let (queue, job_rx) = WorkQueue::new();
        queue.enqueue(base);
        queue.shutdown();

        let pipeline = Pipeline::new(self.config.clone(), self.store.clone());
        run_worker(job_rx, queue, pipeline).await;
        Ok(())
    }
}
