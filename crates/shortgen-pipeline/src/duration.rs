//! Final clip duration in frames.

use shortgen_models::{CaptionWord, VideoConfig};

pub const FPS: u32 = 30;

/// Frames of trailing padding after the last caption word.
const TAIL_FRAMES: u32 = 30;

/// Compute the clip length in frames at 30fps.
///
/// Caption timings are the ground truth when present; without them, the
/// configured duration preset decides.
pub fn calculate_duration_frames(captions: Option<&[CaptionWord]>, config: &VideoConfig) -> u32 {
    match captions.and_then(|words| words.last()) {
        Some(last) => last.end_frame + TAIL_FRAMES,
        None => config.duration.as_secs() * FPS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortgen_models::ClipDuration;

    #[test]
    fn captions_drive_the_duration() {
        let captions = vec![
            CaptionWord::from_millis("hello", 0, 500),
            CaptionWord::from_millis("world", 500, 1200),
        ];
        let frames = calculate_duration_frames(Some(&captions), &VideoConfig::default());
        // last word ends at frame 36, plus one second of tail
        assert_eq!(frames, 36 + 30);
    }

    #[test]
    fn missing_captions_fall_back_to_the_preset() {
        let config = VideoConfig {
            duration: ClipDuration::Seconds60,
            ..Default::default()
        };
        assert_eq!(calculate_duration_frames(None, &config), 60 * 30);
        assert_eq!(calculate_duration_frames(Some(&[]), &config), 60 * 30);
    }
}
