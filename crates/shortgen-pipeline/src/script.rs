//! Strict script parsing.
//!
//! The script provider must return a JSON document of the shape
//! `{"content": [{"contentText": "...", "imagePrompt": "..."}]}` with exactly
//! one scene per expected slot. Anything else is a hard error so a bad
//! generation retries instead of producing a half-formed video.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("script has no content array")]
    MissingContent,
    #[error("expected {expected} scenes, got {got}")]
    WrongSceneCount { expected: usize, got: usize },
    #[error("scene {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
}

#[derive(Debug, Deserialize)]
struct RawScript {
    content: Option<Vec<RawScene>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScene {
    #[serde(default)]
    content_text: String,
    #[serde(default)]
    image_prompt: String,
}

/// A validated script, split into per-scene narration and image prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
    pub content_texts: Vec<String>,
    pub image_prompts: Vec<String>,
}

impl ParsedScript {
    /// Scene narrations joined into the single narration track.
    pub fn full_content(&self) -> String {
        self.content_texts.join(" ")
    }

    pub fn scene_count(&self) -> usize {
        self.content_texts.len()
    }
}

/// Parse and validate a raw script document.
pub fn parse_script(raw: &str, expected_scenes: usize) -> Result<ParsedScript, ScriptError> {
    let parsed: RawScript = serde_json::from_str(raw)?;
    let scenes = parsed.content.ok_or(ScriptError::MissingContent)?;

    if scenes.len() != expected_scenes {
        return Err(ScriptError::WrongSceneCount {
            expected: expected_scenes,
            got: scenes.len(),
        });
    }

    let mut content_texts = Vec::with_capacity(scenes.len());
    let mut image_prompts = Vec::with_capacity(scenes.len());
    for (index, scene) in scenes.into_iter().enumerate() {
        if scene.content_text.trim().is_empty() {
            return Err(ScriptError::EmptyField {
                index,
                field: "contentText",
            });
        }
        if scene.image_prompt.trim().is_empty() {
            return Err(ScriptError::EmptyField {
                index,
                field: "imagePrompt",
            });
        }
        content_texts.push(scene.content_text);
        image_prompts.push(scene.image_prompt);
    }

    Ok(ParsedScript {
        content_texts,
        image_prompts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(text: &str, prompt: &str) -> String {
        format!(r#"{{"contentText":"{text}","imagePrompt":"{prompt}"}}"#)
    }

    #[test]
    fn parses_a_well_formed_script() {
        let raw = format!(
            r#"{{"content":[{},{},{}]}}"#,
            scene("A fox wakes up.", "fox in a den at dawn"),
            scene("It hunts.", "fox stalking through snow"),
            scene("It rests.", "fox curled under a tree"),
        );

        let script = parse_script(&raw, 3).unwrap();
        assert_eq!(script.scene_count(), 3);
        assert_eq!(script.content_texts[0], "A fox wakes up.");
        assert_eq!(script.image_prompts[2], "fox curled under a tree");
        assert_eq!(script.full_content(), "A fox wakes up. It hunts. It rests.");
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            parse_script("Sure! Here is your script:", 3),
            Err(ScriptError::InvalidJson(_))
        ));
    }

    #[test]
    fn rejects_missing_content_key() {
        assert!(matches!(
            parse_script(r#"{"scenes":[]}"#, 3),
            Err(ScriptError::MissingContent)
        ));
    }

    #[test]
    fn rejects_wrong_scene_count() {
        let raw = format!(r#"{{"content":[{}]}}"#, scene("Only one.", "one"));
        assert!(matches!(
            parse_script(&raw, 5),
            Err(ScriptError::WrongSceneCount {
                expected: 5,
                got: 1
            })
        ));
    }

    #[test]
    fn rejects_blank_fields() {
        let raw = format!(
            r#"{{"content":[{},{}]}}"#,
            scene("Fine.", "fine prompt"),
            scene("   ", "prompt"),
        );
        assert!(matches!(
            parse_script(&raw, 2),
            Err(ScriptError::EmptyField {
                index: 1,
                field: "contentText"
            })
        ));
    }
}
