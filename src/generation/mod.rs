//! Generation module - batching, remote client, progress, classification and session

pub mod batcher;
pub mod classify;
pub mod client;
pub mod enhance;
pub mod models;
pub mod progress;
pub mod session;
pub mod upload;
pub mod usage;

// Re-export the workflow types for convenience
pub use batcher::{plan_batches, Batch, BatchPlan, BatchRunner, Pacer, RunOutcome, TokioPacer};
pub use classify::{classify, ErrorKind, GenerationError, Pathway};
pub use client::{ClientFailure, GenerationClient, HttpGenerationClient};
pub use enhance::{
    BackendCredential, CredentialSource, EnvCredential, GeminiEnhancer, PromptEnhancer,
    StaticCredential,
};
pub use models::{
    clamp_image_count, BatchRequest, GeneratedImage, GenerationMode, GenerationProgress,
    GenerationRequest, ImageQuality, ImageSize, ImageStyle, UploadedImage,
    MAX_IMAGES_PER_REQUEST,
};
pub use progress::{Aggregator, Epoch, EpochToken, GenerationView};
pub use session::{GenerationForm, GenerationOutcome, GenerationSession};
pub use upload::{PreviewHandle, PreviewStore, UploadError, UploadTray};
pub use usage::{HttpUsageReporter, NoopUsageReporter, UsageReporter};
