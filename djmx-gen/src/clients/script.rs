//! DJ script generation via the MiniMax chat completion endpoint
//!
//! The model is asked for a single JSON object, but replies often wrap it in
//! reasoning blocks, markdown fences or prose. Parsing peels those layers off
//! and then scans for the first balanced object.

use async_trait::async_trait;
use djmx_common::types::GenerationPreferences;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::{ClientError, MiniMaxConfig, MiniMaxHttp};
use crate::error::GenerationError;

const CHAT_PATH: &str = "/v1/chat/completions";
const MODEL: &str = "MiniMax-M2";
const TEMPERATURE: f32 = 1.0;
const TOP_P: f32 = 0.95;

/// System prompt fixing persona, output schema and field limits
pub const DJ_SYSTEM_PROMPT: &str = r#"You are DJ MX, a warm, high-energy radio host who builds a personal show around each listener's taste.

Respond with exactly one JSON object and nothing else, using these fields:
{
  "dj_intro": "Spoken introduction (2-4 sentences) that name-checks the listener's artists and sets up the next song",
  "song_style": "Style prompt for the music model: genre, tempo, instrumentation, vocal character, production. Max 2000 characters",
  "song_lyrics": "Full lyrics using structure tags such as [Verse], [Chorus], [Bridge], [Outro]. Max 3500 characters",
  "song_title": "Short, catchy title for the song",
  "dj_outro": "Spoken outro (1-3 sentences) reacting to the song and handing back to the music"
}

Rules:
- Speak like a live radio DJ: conversational, upbeat, never robotic.
- Blend the listener's artists into one coherent style rather than copying any single one.
- Keep the lyrics original; do not quote existing songs.
- All five fields are required and must be non-empty strings.
- Return ONLY valid JSON."#;

/// Render the user message for a set of preferences
pub fn build_user_context(preferences: &GenerationPreferences) -> String {
    let artists = if preferences.artists.is_empty() {
        "various artists".to_string()
    } else {
        preferences.artists.join(", ")
    };
    let genres = if preferences.genres.is_empty() {
        "mixed genres".to_string()
    } else {
        preferences.genres.join(", ")
    };
    let mood = if preferences.mood.trim().is_empty() {
        "energetic and ready to vibe"
    } else {
        preferences.mood.as_str()
    };

    format!(
        "Create a DJ experience for a listener who loves:\n\
         - Artists: {artists}\n\
         - Genres: {genres}\n\
         - Current mood: {mood}\n\n\
         Generate an intro that references these artists, a song in their blended style, \
         and an outro. Make it feel like a personalized radio experience."
    )
}

/// Generated textual content for one DJ segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DjScript {
    pub intro_text: String,
    pub song_style: String,
    pub song_lyrics: String,
    pub song_title: String,
    pub outro_text: String,
}

/// Wire shape of the model's JSON; every field optional so absence is reported by name
#[derive(Debug, Deserialize)]
struct RawScript {
    dj_intro: Option<String>,
    song_style: Option<String>,
    song_lyrics: Option<String>,
    song_title: Option<String>,
    dj_outro: Option<String>,
}

fn reasoning_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("static regex is valid"))
}

/// Remove `<think>...</think>` blocks
pub fn strip_reasoning(content: &str) -> String {
    reasoning_block().replace_all(content, "").into_owned()
}

/// Remove a leading ```json / ``` fence and a trailing ``` fence
pub fn strip_code_fences(content: &str) -> &str {
    let mut text = content.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// First balanced `{...}` object in `text`
///
/// Braces inside string literals do not count toward nesting; a backslash
/// escapes the next character only inside a string.
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

fn required(value: Option<String>, field: &str) -> Result<String, GenerationError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GenerationError::ScriptParse(format!("missing required field '{}'", field)))
}

/// Reduce raw model output to a complete DjScript
pub fn parse_dj_script(content: &str) -> Result<DjScript, GenerationError> {
    let without_reasoning = strip_reasoning(content);
    let cleaned = strip_code_fences(&without_reasoning);

    let json = extract_first_json_object(cleaned).ok_or_else(|| {
        GenerationError::ScriptParse("no JSON object found in model output".to_string())
    })?;

    let raw: RawScript = serde_json::from_str(json)
        .map_err(|e| GenerationError::ScriptParse(format!("invalid JSON: {}", e)))?;

    Ok(DjScript {
        intro_text: required(raw.dj_intro, "dj_intro")?,
        song_style: required(raw.song_style, "song_style")?,
        song_lyrics: required(raw.song_lyrics, "song_lyrics")?,
        song_title: required(raw.song_title, "song_title")?,
        outro_text: required(raw.dj_outro, "dj_outro")?,
    })
}

/// Produces a DJ script for a listener
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate_script(
        &self,
        preferences: &GenerationPreferences,
    ) -> Result<DjScript, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Script client backed by MiniMax-M2
#[derive(Clone)]
pub struct MiniMaxScriptClient {
    http: MiniMaxHttp,
}

impl MiniMaxScriptClient {
    pub fn new(config: MiniMaxConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: MiniMaxHttp::new(config)?,
        })
    }
}

#[async_trait]
impl ScriptGenerator for MiniMaxScriptClient {
    async fn generate_script(
        &self,
        preferences: &GenerationPreferences,
    ) -> Result<DjScript, GenerationError> {
        let user_context = build_user_context(preferences);
        let request = ChatRequest {
            model: MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: DJ_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_context,
                },
            ],
            temperature: TEMPERATURE,
            top_p: TOP_P,
        };

        let response: ChatResponse = self.http.post_json(CHAT_PATH, &request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::UpstreamApi("No content in MiniMax response".to_string())
            })?;

        debug!(chars = content.len(), "Received script completion");

        parse_dj_script(&content).map_err(|e| {
            warn!(error = %e, "Model output rejected");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_script_json() -> &'static str {
        r#"{"dj_intro":"Hey!","song_style":"dream pop","song_lyrics":"[Verse] la","song_title":"Glow","dj_outro":"Bye!"}"#
    }

    #[test]
    fn test_extract_from_noisy_content() {
        let content =
            "blah <think>x{y}</think> ```json\n{\"a\":\"b{c}d\",\"e\":1}\n``` trailing";
        let cleaned = strip_reasoning(content);
        let extracted = extract_first_json_object(strip_code_fences(&cleaned));

        assert_eq!(extracted, Some(r#"{"a":"b{c}d","e":1}"#));
    }

    #[test]
    fn test_extract_respects_escaped_quotes() {
        let text = r#"prefix {"a":"say \"}\" now","b":{"c":2}} suffix }"#;
        assert_eq!(
            extract_first_json_object(text),
            Some(r#"{"a":"say \"}\" now","b":{"c":2}}"#)
        );
    }

    #[test]
    fn test_extract_backslash_outside_string_is_plain() {
        let text = r#"\{"a":1}"#;
        assert_eq!(extract_first_json_object(text), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_unbalanced_returns_none() {
        assert_eq!(extract_first_json_object(r#"{"a":{"b":1}"#), None);
        assert_eq!(extract_first_json_object("no braces here"), None);
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn test_strip_reasoning_multiline() {
        let content = "<think>\nplan {\n}\n</think>\n{\"x\":1}";
        assert_eq!(strip_reasoning(content).trim(), "{\"x\":1}");
    }

    #[test]
    fn test_parse_complete_script() {
        let content = format!("<think>hmm</think>```json\n{}\n```", full_script_json());
        let script = parse_dj_script(&content).unwrap();

        assert_eq!(script.intro_text, "Hey!");
        assert_eq!(script.song_style, "dream pop");
        assert_eq!(script.song_title, "Glow");
        assert_eq!(script.outro_text, "Bye!");
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let content = r#"{"dj_intro":"Hey","song_style":"x","song_lyrics":"y","song_title":"z"}"#;
        let err = parse_dj_script(content).unwrap_err();

        assert!(matches!(err, GenerationError::ScriptParse(ref m) if m.contains("dj_outro")));
    }

    #[test]
    fn test_parse_rejects_blank_field() {
        let content = r#"{"dj_intro":"  ","song_style":"x","song_lyrics":"y","song_title":"z","dj_outro":"w"}"#;
        assert!(matches!(
            parse_dj_script(content),
            Err(GenerationError::ScriptParse(_))
        ));
    }

    #[test]
    fn test_parse_without_object() {
        assert!(matches!(
            parse_dj_script("Sorry, I can't help with that."),
            Err(GenerationError::ScriptParse(_))
        ));
    }

    #[test]
    fn test_user_context_interpolation() {
        let prefs = GenerationPreferences::new(
            vec!["Deftones".into(), "The Cure".into()],
            vec![],
            Some("chill".into()),
        );
        let context = build_user_context(&prefs);

        assert!(context.contains("- Artists: Deftones, The Cure"));
        assert!(context.contains("- Genres: mixed genres"));
        assert!(context.contains("- Current mood: chill"));
    }
}
