//! Pipeline step executors.
//!
//! Three idempotent stages per job: transcribe the audio into an `.ass`
//! subtitle, convert it to `.srt`, translate it. Each stage wraps one
//! external command plus the file relocation and record update around it.
//! Completion flags in the job record decide what still runs; a stage is
//! never entered while its flag is set.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, SubflowError};
use crate::hashing::hash_file;
use crate::metadata::{JobRecord, MetadataStore, Step};
use crate::stability::wait_until_stable;
use crate::tools::{SystemInvoker, ToolCommand, ToolInvoker};

pub struct Pipeline {
    config: Config,
    store: MetadataStore,
    invoker: Box<dyn ToolInvoker>,
}

impl Pipeline {
    pub fn new(config: Config, store: MetadataStore) -> Self {
        Self::with_invoker(config, store, Box::new(SystemInvoker))
    }

    pub fn with_invoker(
        config: Config,
        store: MetadataStore,
        invoker: Box<dyn ToolInvoker>,
    ) -> Self {
        Self {
            config,
            store,
            invoker,
        }
    }

    /// Run whatever is still missing for one job, in stage order.
    ///
    /// The persisted record is the sole authority: a stage whose flag is
    /// already set is skipped, and each stage persists its flag as soon as
    /// it finishes so a failure later on resumes after the last success.
    pub async fn process_job(&self, base: &str) -> Result<()> {
        let mut record = self.store.load(base)?;

        if !record.is_complete(Step::ProcessAudio) {
            info!("[{}] Step 1/3: transcribing audio", base);
            self.generate_subtitles(base, &mut record).await?;
        } else {
            debug!("[{}] Step 1/3 already complete, skipping", base);
        }

        if !record.is_complete(Step::AssToSrt) {
            info!("[{}] Step 2/3: converting subtitle format", base);
            self.convert_format(base).await?;
            record.mark_complete(Step::AssToSrt);
            self.store.save(base, &record)?;
        } else {
            debug!("[{}] Step 2/3 already complete, skipping", base);
        }

        if !record.is_complete(Step::Translate) {
            info!("[{}] Step 3/3: translating subtitles", base);
            self.translate(base).await?;
            record.mark_complete(Step::Translate);
            self.store.save(base, &record)?;
        } else {
            debug!("[{}] Step 3/3 already complete, skipping", base);
        }

        info!("[{}] Pipeline complete", base);
        Ok(())
    }

    /// Step 1: run the transcription tool, preserve a pristine copy of the
    /// resulting subtitle, record its content hash, and move both copies
    /// into the review directory for manual editing.
    async fn generate_subtitles(&self, base: &str, record: &mut JobRecord) -> Result<()> {
        let command = ToolCommand::new(
            &self.config.tools.process_audio_command,
            "Audio transcription",
        )
        .arg(base)
        .current_dir(&self.config.paths.work_dir);
        self.invoker.run(&command).await?;

        let work_subtitle = self.config.work_subtitle_path(base);
        if !work_subtitle.exists() {
            return Err(SubflowError::ArtifactMissing {
                path: work_subtitle,
            });
        }

        let stability = &self.config.stability;
        if !wait_until_stable(
            &work_subtitle,
            stability.timeout(),
            stability.stable_time(),
            stability.poll(),
        )
        .await
        {
            warn!(
                "[{}] Subtitle still changing after {}s, proceeding anyway",
                base, stability.timeout_secs
            );
        }

        let review_subtitle = self.config.review_subtitle_path(base);
        let pristine = self.config.pristine_subtitle_path(base);

        // Keep an untouched copy of the first transcription so manual edits
        // can be diffed against it later.
        if !pristine.exists() {
            tokio::fs::create_dir_all(&self.config.paths.review_dir).await?;
            tokio::fs::copy(&work_subtitle, &pristine).await?;
        }

        let hash = hash_file(&work_subtitle)?;
        move_file(&work_subtitle, &review_subtitle).await?;

        record.ass_hash = Some(hash);
        record.mark_complete(Step::ProcessAudio);
        self.store.save(base, record)?;

        self.maybe_open_editor(&review_subtitle);
        Ok(())
    }

    /// Step 2: convert the reviewed `.ass` into an `.srt` in the work
    /// directory using the converter binary.
    async fn convert_format(&self, base: &str) -> Result<()> {
        let input = self.config.review_subtitle_path(base);
        if !input.exists() {
            return Err(SubflowError::FileNotFound(input.display().to_string()));
        }
        let output = self.config.srt_path(base);

        let command = ToolCommand::new(&self.config.tools.converter_path, "Subtitle conversion")
            .arg("-y")
            .arg("-i")
            .arg(input.to_string_lossy())
            .arg(output.to_string_lossy());
        self.invoker.run(&command).await
    }

    /// Step 3: run the translation tool, then deliver every known output
    /// to the output directory. Individual files may be absent; that is
    /// logged and skipped, never a step failure.
    async fn translate(&self, base: &str) -> Result<()> {
        let command = ToolCommand::new(
            &self.config.tools.translate_command,
            "Subtitle translation",
        )
        .arg(base)
        .current_dir(&self.config.paths.work_dir);
        self.invoker.run(&command).await?;

        let deliveries = [
            self.config.srt_path(base),
            self.config.translated_srt_path(base),
            self.config
                .paths
                .work_dir
                .join(format!("{}.mp4", base)),
            self.config.review_subtitle_path(base),
            self.config.pristine_subtitle_path(base),
        ];

        tokio::fs::create_dir_all(&self.config.paths.output_dir).await?;
        for src in &deliveries {
            self.deliver(src).await;
        }

        let translated_name = self
            .config
            .translated_srt_path(base)
            .file_name()
            .map(PathBuf::from);
        if let Some(name) = translated_name {
            let delivered = self.config.paths.output_dir.join(name);
            if delivered.exists() {
                self.maybe_open_editor(&delivered);
            }
        }

        Ok(())
    }

    /// Move one output into the output directory, best-effort.
    async fn deliver(&self, src: &Path) {
        if !src.exists() {
            debug!("No {} to deliver, skipping", src.display());
            return;
        }
        let Some(name) = src.file_name() else {
            return;
        };
        let dst = self.config.paths.output_dir.join(name);
        match move_file(src, &dst).await {
            Ok(()) => info!("Delivered {}", dst.display()),
            Err(e) => warn!("Could not deliver {}: {}", src.display(), e),
        }
    }

    fn maybe_open_editor(&self, path: &Path) {
        if !self.config.tools.open_in_editor {
            return;
        }
        if let Err(e) = self.invoker.open_in_editor(path) {
            warn!("Could not open {} in editor: {}", path.display(), e);
        }
    }
}

/// Rename, falling back to copy-and-remove when the destination is on a
/// different filesystem.
async fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    match tokio::fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(src, dst).await?;
            tokio::fs::remove_file(src).await?;
            Ok(())
        }
    }
}
