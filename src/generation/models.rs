//! Request and result types for image generation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::generation::classify::GenerationError;

/// Largest batch the remote API accepts in one call
pub const MAX_IMAGES_PER_REQUEST: u32 = 4;

/// Bounds of the image count a user may request
pub const MIN_IMAGE_COUNT: u32 = 1;
pub const MAX_IMAGE_COUNT: u32 = 4;

/// Clamp a requested image count into the allowed range
pub fn clamp_image_count(count: u32) -> u32 {
    count.clamp(MIN_IMAGE_COUNT, MAX_IMAGE_COUNT)
}

/// Whether images are generated from text only or from source images plus text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    #[default]
    TextToImage,
    ImageToImage,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::TextToImage => "text-to-image",
            GenerationMode::ImageToImage => "image-to-image",
        }
    }
}

/// Output dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1024x1792")]
    Portrait,
    #[serde(rename = "1792x1024")]
    Landscape,
}

impl ImageSize {
    /// Wire representation sent to the generation API
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Portrait => "1024x1792",
            ImageSize::Landscape => "1792x1024",
        }
    }
}

/// Requested quality. Accepted from callers but not sent to the remote API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
    Ultra,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::Standard => "standard",
            ImageQuality::Hd => "hd",
            ImageQuality::Ultra => "ultra",
        }
    }
}

/// Visual style appended to the prompt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageStyle {
    #[default]
    None,
    Photorealistic,
    Anime,
    #[serde(rename = "3d-model")]
    ThreeDModel,
    Cinematic,
    DigitalArt,
}

impl ImageStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::None => "none",
            ImageStyle::Photorealistic => "photorealistic",
            ImageStyle::Anime => "anime",
            ImageStyle::ThreeDModel => "3d-model",
            ImageStyle::Cinematic => "cinematic",
            ImageStyle::DigitalArt => "digital-art",
        }
    }

    /// Style words for the prompt suffix, `None` for [`ImageStyle::None`]
    pub fn words(&self) -> Option<String> {
        match self {
            ImageStyle::None => None,
            other => Some(other.as_str().replace('-', " ")),
        }
    }

    /// Append `, <style words> style` to the prompt unless the style is `none`
    pub fn apply(&self, prompt: &str) -> String {
        match self.words() {
            Some(words) => format!("{}, {} style", prompt, words),
            None => prompt.to_string(),
        }
    }
}

macro_rules! impl_enum_text {
    ($ty:ty, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                [$($variant),+]
                    .into_iter()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| format!("unknown {} '{}'", stringify!($ty), s))
            }
        }
    };
}

impl_enum_text!(GenerationMode, [GenerationMode::TextToImage, GenerationMode::ImageToImage]);

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    /// Accepts the orientation name or the wire dimensions
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" | "1024x1792" => Ok(ImageSize::Portrait),
            "landscape" | "1792x1024" => Ok(ImageSize::Landscape),
            _ => Err(format!("unknown ImageSize '{}'", s)),
        }
    }
}
impl_enum_text!(ImageQuality, [ImageQuality::Standard, ImageQuality::Hd, ImageQuality::Ultra]);
impl_enum_text!(
    ImageStyle,
    [
        ImageStyle::None,
        ImageStyle::Photorealistic,
        ImageStyle::Anime,
        ImageStyle::ThreeDModel,
        ImageStyle::Cinematic,
        ImageStyle::DigitalArt,
    ]
);

/// A user supplied source image, base64 encoded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub data: String,
    pub mime_type: String,
}

/// One image returned by the generation API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GeneratedImage {
    #[serde(rename = "b64_json")]
    pub image_data: String,
    #[serde(default)]
    pub revised_prompt: String,
}

/// Completed versus requested image count of the operation in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct GenerationProgress {
    pub completed: u32,
    pub total: u32,
}

impl GenerationProgress {
    /// Fraction done in `[0, 1]`
    pub fn ratio(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f32 / self.total as f32
        }
    }
}

/// A complete user request for `count` images
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub count: u32,
    pub size: ImageSize,
    pub quality: ImageQuality,
    pub style: ImageStyle,
    pub mode: GenerationMode,
    pub source_images: Vec<UploadedImage>,
}

impl GenerationRequest {
    /// Text-to-image request with default settings
    pub fn new(prompt: impl Into<String>, count: u32) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: None,
            count,
            size: ImageSize::default(),
            quality: ImageQuality::default(),
            style: ImageStyle::default(),
            mode: GenerationMode::default(),
            source_images: Vec::new(),
        }
    }

    /// Reject requests that must not reach the network
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.prompt.trim().is_empty() {
            return Err(GenerationError::Invalid(
                "Please enter a description of the image.".to_string(),
            ));
        }
        if self.mode == GenerationMode::ImageToImage && self.source_images.is_empty() {
            return Err(GenerationError::Invalid(
                "Please upload at least one image to edit.".to_string(),
            ));
        }
        if self.count == 0 {
            return Err(GenerationError::Invalid(
                "At least one image must be requested.".to_string(),
            ));
        }
        Ok(())
    }

    /// Parameters of a single API call producing `n` images
    pub fn batch(&self, n: u32) -> BatchRequest {
        BatchRequest {
            prompt: self.prompt.clone(),
            negative_prompt: self
                .negative_prompt
                .clone()
                .filter(|negative| !negative.is_empty()),
            n,
            size: self.size,
            quality: self.quality,
            style: self.style,
        }
    }
}

/// Parameters shared by text and edit calls for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub n: u32,
    pub size: ImageSize,
    pub quality: ImageQuality,
    pub style: ImageStyle,
}

impl BatchRequest {
    /// Prompt as transmitted, with the style suffix applied
    pub fn final_prompt(&self) -> String {
        self.style.apply(&self.prompt)
    }
}
