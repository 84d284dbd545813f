//! Video generation configuration presets.
//!
//! The wire shape accepted on job submission is
//! `{ duration: "15"|"30"|"60", imageCount: 3|4|5|6|8, aspectRatio: "9:16"|"16:9"|"1:1" }`.
//! Scene count and per-scene seconds are derived from the duration preset.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target clip duration in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum ClipDuration {
    #[serde(rename = "15")]
    Seconds15,
    #[default]
    #[serde(rename = "30")]
    Seconds30,
    #[serde(rename = "60")]
    Seconds60,
}

impl ClipDuration {
    /// Number of script scenes expected for this duration.
    pub fn scene_count(&self) -> usize {
        match self {
            ClipDuration::Seconds15 => 3,
            ClipDuration::Seconds30 => 5,
            ClipDuration::Seconds60 => 8,
        }
    }

    /// Seconds of narration per scene.
    pub fn scene_seconds(&self) -> f64 {
        match self {
            ClipDuration::Seconds15 => 5.0,
            ClipDuration::Seconds30 => 6.0,
            ClipDuration::Seconds60 => 7.5,
        }
    }

    pub fn as_secs(&self) -> u32 {
        match self {
            ClipDuration::Seconds15 => 15,
            ClipDuration::Seconds30 => 30,
            ClipDuration::Seconds60 => 60,
        }
    }
}

impl fmt::Display for ClipDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// Number of images to generate for the clip.
///
/// Serialized as a bare number on the wire (`3 | 4 | 5 | 6 | 8`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum ImageCount {
    Three,
    Four,
    #[default]
    Five,
    Six,
    Eight,
}

impl ImageCount {
    pub fn as_usize(&self) -> usize {
        match self {
            ImageCount::Three => 3,
            ImageCount::Four => 4,
            ImageCount::Five => 5,
            ImageCount::Six => 6,
            ImageCount::Eight => 8,
        }
    }
}

impl TryFrom<u8> for ImageCount {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(ImageCount::Three),
            4 => Ok(ImageCount::Four),
            5 => Ok(ImageCount::Five),
            6 => Ok(ImageCount::Six),
            8 => Ok(ImageCount::Eight),
            other => Err(format!("unsupported image count: {}", other)),
        }
    }
}

impl From<ImageCount> for u8 {
    fn from(value: ImageCount) -> Self {
        value.as_usize() as u8
    }
}

/// Target aspect ratio for generated images and the final render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional per-job generation configuration.
///
/// Jobs submitted without a config get the defaults (30s, 5 images, 9:16),
/// which match the unconfigured legacy pipeline: 5 scenes, one image each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    #[serde(default)]
    pub duration: ClipDuration,
    #[serde(default)]
    pub image_count: ImageCount,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

impl VideoConfig {
    /// Exact number of scenes the generated script must contain.
    pub fn expected_scene_count(&self) -> usize {
        self.duration.scene_count()
    }
}
