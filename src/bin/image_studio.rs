//! Command-line client: generate a set of images in batches from a prompt

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Parser;
use image_studio::config::Settings;
use image_studio::generation::{
    BackendCredential, BatchRunner, CredentialSource, EnvCredential, GeminiEnhancer,
    GeneratedImage, GenerationMode, GenerationOutcome, GenerationSession, HttpGenerationClient,
    HttpUsageReporter, ImageQuality, ImageSize, ImageStyle, NoopUsageReporter, UploadedImage,
    UsageReporter,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "image-studio", version, about = "Generate images in batches from a prompt")]
struct Cli {
    /// Description of the image
    #[arg(default_value = "")]
    prompt: String,
    /// Things the images should not contain
    #[arg(long, default_value = "")]
    negative: String,
    /// Number of images, clamped to 1..=4
    #[arg(short = 'n', long, default_value_t = 2)]
    count: u32,
    /// portrait (1024x1792) or landscape (1792x1024)
    #[arg(long, default_value = "portrait")]
    size: ImageSize,
    #[arg(long, default_value = "standard")]
    quality: ImageQuality,
    /// none, photorealistic, anime, 3d-model, cinematic or digital-art
    #[arg(long, default_value = "none")]
    style: ImageStyle,
    /// Source images; switches to image-to-image
    #[arg(short, long = "image")]
    images: Vec<PathBuf>,
    /// Directory the generated images are written to
    #[arg(short, long, default_value = "out")]
    out: PathBuf,
    /// Rewrite the prompt with the enhancement API before generating
    #[arg(long)]
    enhance: bool,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the effective settings and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    // stdout carries progress lines, logs go to stderr
    if settings.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from_path(path),
        None => Settings::load(),
    }
    .context("Failed to load settings")?;

    if cli.print_config {
        print!("{}", settings.to_yaml()?);
        return Ok(());
    }

    init_logging(&settings);

    let reporter = settings
        .generation
        .usage_base_url
        .as_deref()
        .map(HttpUsageReporter::new)
        .transpose()?;
    let usage: Arc<dyn UsageReporter> = match &reporter {
        Some(reporter) => Arc::new(reporter.clone()),
        None => Arc::new(NoopUsageReporter),
    };

    let credentials: Arc<dyn CredentialSource> = match &settings.enhancement.key_endpoint {
        Some(url) => Arc::new(BackendCredential::new(url.as_str())),
        None => Arc::new(EnvCredential::new(settings.enhancement.api_key_env.as_str())),
    };

    let client = Arc::new(HttpGenerationClient::new(&settings.generation, usage.clone())?);
    let enhancer = Arc::new(GeminiEnhancer::new(&settings.enhancement, credentials)?);
    let runner = BatchRunner::from_config(&settings.generation);

    let session = GenerationSession::new(client, enhancer, runner).with_usage(usage);
    session.open();

    session.set_prompt(cli.prompt.as_str());
    session.set_negative_prompt(cli.negative.as_str());
    let count = session.set_image_count(cli.count);
    if count != cli.count {
        eprintln!("Image count adjusted to {}", count);
    }
    session.set_size(cli.size);
    session.set_quality(cli.quality);
    session.set_style(cli.style);

    if !cli.images.is_empty() {
        session.set_mode(GenerationMode::ImageToImage);
        for path in &cli.images {
            let image = UploadedImage::from_path(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            session.add_upload(image);
        }
    }

    if cli.enhance {
        if let Some(prompt) = session.enhance_prompt().await? {
            println!("Enhanced prompt: {}", prompt);
        }
    }

    let mut views = session.subscribe();
    let printer = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            if let Some(progress) = view.progress {
                println!(
                    "Generated {}/{} ({:.0}%)",
                    progress.completed,
                    progress.total,
                    progress.ratio() * 100.0
                );
            }
        }
    });

    let result = session.generate().await;
    printer.abort();

    // usage events die with the runtime unless they are awaited here
    if let Some(reporter) = &reporter {
        reporter.flush(USAGE_FLUSH_TIMEOUT).await;
    }

    match result {
        Ok(GenerationOutcome::Completed(images)) => {
            let written = write_images(&cli.out, &images)?;
            info!(count = written.len(), out = %cli.out.display(), "Images written");
            for path in written {
                println!("{}", path.display());
            }
            Ok(())
        }
        Ok(outcome) => anyhow::bail!("Generation did not complete: {:?}", outcome),
        Err(err) => {
            // keep whatever landed before the failure
            let kept = session.view().images;
            if !kept.is_empty() {
                for path in write_images(&cli.out, &kept)? {
                    println!("{}", path.display());
                }
            }
            Err(err.into())
        }
    }
}

fn write_images(dir: &Path, images: &[GeneratedImage]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            let bytes = BASE64
                .decode(image.image_data.as_bytes())
                .context("Received image is not valid base64")?;
            let path = dir.join(format!("image-{}-{}.png", stamp, index + 1));
            std::fs::write(&path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}
