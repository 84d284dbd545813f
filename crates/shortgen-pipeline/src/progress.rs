//! Progress estimation from persisted artifacts.
//!
//! Progress is derived from which artifacts exist on the record, so a
//! resumed or re-driven job reports the same number a continuously-running
//! one would. Weights sum to 100.

use shortgen_models::VideoRecord;

const CONTENT_WEIGHT: u8 = 20;
const IMAGES_WEIGHT: u8 = 30;
const AUDIO_WEIGHT: u8 = 20;
const CAPTIONS_WEIGHT: u8 = 15;
const VIDEO_WEIGHT: u8 = 15;

/// Estimate completion percentage for a video record.
pub fn estimate_progress(record: &VideoRecord) -> u8 {
    let mut progress = 0u8;
    if record.content.as_deref().is_some_and(|c| !c.is_empty()) {
        progress += CONTENT_WEIGHT;
    }
    if !record.image_links.is_empty() {
        progress += IMAGES_WEIGHT;
    }
    if record.audio_url.is_some() {
        progress += AUDIO_WEIGHT;
    }
    if record.captions.as_deref().is_some_and(|c| !c.is_empty()) {
        progress += CAPTIONS_WEIGHT;
    }
    if record.video_url.is_some() {
        progress += VIDEO_WEIGHT;
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortgen_models::{CaptionWord, VideoId};

    fn record() -> VideoRecord {
        VideoRecord::new(VideoId::new(), "test prompt")
    }

    #[test]
    fn empty_record_reports_zero() {
        assert_eq!(estimate_progress(&record()), 0);
    }

    #[test]
    fn progress_grows_monotonically_through_the_pipeline() {
        let mut rec = record();
        let mut last = estimate_progress(&rec);

        rec.content = Some("narration text".into());
        let p = estimate_progress(&rec);
        assert!(p > last);
        last = p;

        rec.image_links = vec!["https://cdn.example/img-0.png".into()];
        let p = estimate_progress(&rec);
        assert!(p > last);
        last = p;

        rec.audio_url = Some("https://cdn.example/audio.mp3".into());
        let p = estimate_progress(&rec);
        assert!(p > last);
        last = p;

        rec.captions = Some(vec![CaptionWord {
            text: "narration".into(),
            start_frame: 0,
            end_frame: 15,
        }]);
        let p = estimate_progress(&rec);
        assert!(p > last);
        last = p;

        rec.video_url = Some("https://cdn.example/final.mp4".into());
        let p = estimate_progress(&rec);
        assert!(p > last);
        assert_eq!(p, 100);
    }

    #[test]
    fn captionless_video_tops_out_below_full() {
        let mut rec = record();
        rec.content = Some("narration".into());
        rec.image_links = vec!["img".into()];
        rec.audio_url = Some("audio".into());
        rec.video_url = Some("video".into());
        assert_eq!(estimate_progress(&rec), 85);
    }
}
