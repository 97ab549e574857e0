//! Generation session: form state, generate/retry/reset and prompt enhancement

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::generation::batcher::{BatchRunner, RunOutcome};
use crate::generation::classify::{classify, GenerationError, Pathway};
use crate::generation::client::GenerationClient;
use crate::generation::enhance::PromptEnhancer;
use crate::generation::models::{
    clamp_image_count, GeneratedImage, GenerationMode, GenerationRequest, ImageQuality, ImageSize,
    ImageStyle, UploadedImage,
};
use crate::generation::progress::{Aggregator, Epoch, GenerationView};
use crate::generation::upload::{PreviewStore, UploadTray};
use crate::generation::usage::{NoopUsageReporter, UsageReporter};

/// User-editable settings of the next request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationForm {
    pub prompt: String,
    pub negative_prompt: String,
    pub image_count: u32,
    pub size: ImageSize,
    pub quality: ImageQuality,
    pub style: ImageStyle,
    pub mode: GenerationMode,
}

impl Default for GenerationForm {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            image_count: 2,
            size: ImageSize::default(),
            quality: ImageQuality::default(),
            style: ImageStyle::default(),
            mode: GenerationMode::default(),
        }
    }
}

/// How a generate action ended without an error
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// All batches landed
    Completed(Vec<GeneratedImage>),
    /// A reset or newer action took over before this one settled
    Superseded,
    /// Another generation was already in flight
    Ignored,
}

/// Releases the enhancement slot even if the enhancing future is dropped
struct EnhanceSlot<'a> {
    flag: &'a AtomicBool,
    view: &'a watch::Sender<GenerationView>,
}

impl<'a> EnhanceSlot<'a> {
    fn acquire(flag: &'a AtomicBool, view: &'a watch::Sender<GenerationView>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        view.send_modify(|v| {
            v.is_enhancing = true;
            v.error = None;
        });
        Some(Self { flag, view })
    }
}

impl Drop for EnhanceSlot<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
        self.view.send_modify(|v| v.is_enhancing = false);
    }
}

/// Orchestrates one user's generation workflow and publishes a [`GenerationView`]
pub struct GenerationSession {
    client: Arc<dyn GenerationClient>,
    enhancer: Arc<dyn PromptEnhancer>,
    usage: Arc<dyn UsageReporter>,
    runner: BatchRunner,
    form: Mutex<GenerationForm>,
    uploads: Mutex<UploadTray>,
    view: Arc<watch::Sender<GenerationView>>,
    epoch: Epoch,
    enhancing: AtomicBool,
}

impl GenerationSession {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        enhancer: Arc<dyn PromptEnhancer>,
        runner: BatchRunner,
    ) -> Self {
        let (view, _) = watch::channel(GenerationView::default());
        Self {
            client,
            enhancer,
            usage: Arc::new(NoopUsageReporter),
            runner,
            form: Mutex::new(GenerationForm::default()),
            uploads: Mutex::new(UploadTray::new(PreviewStore::new())),
            view: Arc::new(view),
            epoch: Epoch::new(),
            enhancing: AtomicBool::new(false),
        }
    }

    /// Report session opens to a usage counter
    pub fn with_usage(mut self, usage: Arc<dyn UsageReporter>) -> Self {
        self.usage = usage;
        self
    }

    /// Track upload previews in the given store
    pub fn with_previews(self, previews: PreviewStore) -> Self {
        *self.uploads.lock() = UploadTray::new(previews);
        self
    }

    /// Record that the session was opened
    pub fn open(&self) {
        self.usage.page_viewed();
    }

    /// Receive every published view
    pub fn subscribe(&self) -> watch::Receiver<GenerationView> {
        self.view.subscribe()
    }

    /// Current view
    pub fn view(&self) -> GenerationView {
        self.view.borrow().clone()
    }

    pub fn form(&self) -> GenerationForm {
        self.form.lock().clone()
    }

    pub fn prompt(&self) -> String {
        self.form.lock().prompt.clone()
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.form.lock().prompt = prompt.into();
    }

    pub fn set_negative_prompt(&self, negative_prompt: impl Into<String>) {
        self.form.lock().negative_prompt = negative_prompt.into();
    }

    /// Set the requested image count, clamped to the allowed range. Returns the effective count.
    pub fn set_image_count(&self, count: u32) -> u32 {
        let effective = clamp_image_count(count);
        self.form.lock().image_count = effective;
        effective
    }

    pub fn image_count(&self) -> u32 {
        self.form.lock().image_count
    }

    pub fn set_size(&self, size: ImageSize) {
        self.form.lock().size = size;
    }

    pub fn set_quality(&self, quality: ImageQuality) {
        self.form.lock().quality = quality;
    }

    pub fn set_style(&self, style: ImageStyle) {
        self.form.lock().style = style;
    }

    pub fn set_mode(&self, mode: GenerationMode) {
        self.form.lock().mode = mode;
    }

    /// Attach a source image; returns its preview URL
    pub fn add_upload(&self, image: UploadedImage) -> String {
        self.uploads.lock().add(image)
    }

    /// Detach the source image at `index`, releasing its preview
    pub fn remove_upload(&self, index: usize) -> Option<UploadedImage> {
        self.uploads.lock().remove(index)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().len()
    }

    pub fn upload_previews(&self) -> Vec<String> {
        self.uploads.lock().preview_urls()
    }

    /// Whether a generate action would currently be accepted
    pub fn can_generate(&self) -> bool {
        let form = self.form.lock();
        let has_sources = form.mode == GenerationMode::TextToImage || self.upload_count() > 0;
        !self.view.borrow().is_loading && !form.prompt.trim().is_empty() && has_sources
    }

    /// Build the request the next generate action would send
    pub fn build_request(&self) -> GenerationRequest {
        let form = self.form.lock().clone();
        let source_images = match form.mode {
            GenerationMode::ImageToImage => self.uploads.lock().images(),
            GenerationMode::TextToImage => Vec::new(),
        };

        GenerationRequest {
            prompt: form.prompt,
            negative_prompt: Some(form.negative_prompt).filter(|n| !n.is_empty()),
            count: clamp_image_count(form.image_count),
            size: form.size,
            quality: form.quality,
            style: form.style,
            mode: form.mode,
            source_images,
        }
    }

    /// Generate images for the current form, publishing results batch by batch
    pub async fn generate(&self) -> Result<GenerationOutcome, GenerationError> {
        let request = self.build_request();

        if let Err(err) = request.validate() {
            self.view.send_modify(|v| v.error = Some(err.clone()));
            return Err(err);
        }

        let Some(mut aggregator) = Aggregator::begin(self.view.clone(), &self.epoch, request.count)
        else {
            info!("Generation already in flight, ignoring request");
            return Ok(GenerationOutcome::Ignored);
        };

        info!(
            epoch = aggregator.token().value(),
            count = request.count,
            mode = request.mode.as_str(),
            "Generation started"
        );

        match self
            .runner
            .run(self.client.as_ref(), &request, &mut aggregator)
            .await
        {
            Ok(RunOutcome::Completed) => {
                let images = aggregator.images().to_vec();
                if aggregator.finish(None) {
                    Ok(GenerationOutcome::Completed(images))
                } else {
                    Ok(GenerationOutcome::Superseded)
                }
            }
            Ok(RunOutcome::Superseded) => Ok(GenerationOutcome::Superseded),
            Err(failure) => {
                let err = classify(&failure, Pathway::Generation);
                warn!(
                    failure = %failure,
                    kept = aggregator.images().len(),
                    "Generation aborted"
                );
                if aggregator.finish(Some(err.clone())) {
                    Err(err)
                } else {
                    Ok(GenerationOutcome::Superseded)
                }
            }
        }
    }

    /// Clear the error and run the same generate action again from scratch
    pub async fn retry(&self) -> Result<GenerationOutcome, GenerationError> {
        self.dismiss_error();
        self.generate().await
    }

    /// Drop results and progress and release the generation slot.
    /// A generation still settling is ignored from here on.
    pub fn reset(&self) {
        let epoch = &self.epoch;
        self.view.send_modify(|v| {
            epoch.advance();
            v.images.clear();
            v.progress = None;
            v.is_loading = false;
            v.error = None;
        });
    }

    pub fn dismiss_error(&self) {
        self.view.send_if_modified(|v| v.error.take().is_some());
    }

    /// Replace the prompt with an enhanced version.
    ///
    /// Returns `Ok(None)` when the prompt is empty or an enhancement is
    /// already in flight.
    pub async fn enhance_prompt(&self) -> Result<Option<String>, GenerationError> {
        let prompt = self.prompt();
        if prompt.is_empty() {
            return Ok(None);
        }

        let Some(_slot) = EnhanceSlot::acquire(&self.enhancing, &self.view) else {
            return Ok(None);
        };

        match self.enhancer.enhance(&prompt).await {
            Ok(enhanced) => {
                self.form.lock().prompt = enhanced.clone();
                Ok(Some(enhanced))
            }
            Err(failure) => {
                let err = classify(&failure, Pathway::Enhancement);
                warn!(failure = %failure, "Prompt enhancement failed");
                self.view.send_modify(|v| v.error = Some(err.clone()));
                Err(err)
            }
        }
    }
}
