//! Text-to-speech via the MiniMax t2a_v2 endpoint

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClientError, MiniMaxConfig, MiniMaxHttp};

const SPEECH_PATH: &str = "/v1/t2a_v2";
const MODEL: &str = "speech-2.8-hd";
const OUTPUT_FORMAT: &str = "mp3";
const OUTPUT_SAMPLE_RATE: u32 = 44100;

/// Named voice configurations for DJ segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoicePreset {
    #[default]
    MaleEnergetic,
    MaleCalm,
    FemaleEnergetic,
}

/// Provider voice parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSetting {
    pub voice_id: &'static str,
    pub speed: f32,
    pub vol: f32,
    pub pitch: i32,
}

impl VoicePreset {
    pub fn voice_setting(&self) -> VoiceSetting {
        match self {
            VoicePreset::MaleEnergetic => VoiceSetting {
                voice_id: "male-qn-qingse",
                speed: 1.0,
                vol: 1.0,
                pitch: 0,
            },
            VoicePreset::MaleCalm => VoiceSetting {
                voice_id: "male-qn-jingying",
                speed: 0.9,
                vol: 1.0,
                pitch: 0,
            },
            VoicePreset::FemaleEnergetic => VoiceSetting {
                voice_id: "female-shaonv",
                speed: 1.0,
                vol: 1.0,
                pitch: 0,
            },
        }
    }
}

/// Synthesized speech ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechAudio {
    /// Remote URL or `data:` URL carrying inline audio
    pub audio_url: String,
    pub duration_seconds: Option<f64>,
}

/// Turns DJ text into audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: VoicePreset)
        -> Result<SpeechAudio, ClientError>;
}

#[derive(Debug, Serialize)]
struct AudioSetting {
    format: &'static str,
    sample_rate: u32,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    text: &'a str,
    voice_setting: VoiceSetting,
    audio_setting: AudioSetting,
}

#[derive(Debug, Deserialize)]
struct SpeechResponse {
    audio_url: Option<String>,
    /// Base64 mp3 when the provider inlines the audio
    audio_data: Option<String>,
    duration: Option<f64>,
    error: Option<String>,
}

impl SpeechResponse {
    fn into_audio(self) -> Result<SpeechAudio, ClientError> {
        if let Some(error) = self.error.filter(|e| !e.is_empty()) {
            return Err(ClientError::Api(200, error));
        }

        let audio_url = match (self.audio_url, self.audio_data) {
            (Some(url), _) if !url.is_empty() => url,
            (_, Some(data)) if !data.is_empty() => format!("data:audio/mpeg;base64,{}", data),
            _ => {
                return Err(ClientError::Parse(
                    "speech response contained no audio".to_string(),
                ))
            }
        };

        Ok(SpeechAudio {
            audio_url,
            duration_seconds: self.duration.filter(|d| *d > 0.0),
        })
    }
}

/// Speech client backed by speech-2.8-hd
#[derive(Clone)]
pub struct MiniMaxSpeechClient {
    http: MiniMaxHttp,
}

impl MiniMaxSpeechClient {
    pub fn new(config: MiniMaxConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: MiniMaxHttp::new(config)?,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for MiniMaxSpeechClient {
    async fn synthesize(
        &self,
        text: &str,
        voice: VoicePreset,
    ) -> Result<SpeechAudio, ClientError> {
        if text.trim().is_empty() {
            return Err(ClientError::InvalidRequest("speech text is empty".to_string()));
        }

        let request = SpeechRequest {
            model: MODEL,
            text,
            voice_setting: voice.voice_setting(),
            audio_setting: AudioSetting {
                format: OUTPUT_FORMAT,
                sample_rate: OUTPUT_SAMPLE_RATE,
            },
        };

        let response: SpeechResponse = self.http.post_json(SPEECH_PATH, &request).await?;
        let audio = response.into_audio()?;
        debug!(
            voice = ?voice,
            duration = ?audio.duration_seconds,
            "Speech synthesized"
        );
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_presets() {
        let setting = VoicePreset::MaleCalm.voice_setting();
        assert_eq!(setting.voice_id, "male-qn-jingying");
        assert_eq!(setting.speed, 0.9);
        assert_eq!(VoicePreset::default(), VoicePreset::MaleEnergetic);
        assert_eq!(
            VoicePreset::FemaleEnergetic.voice_setting().voice_id,
            "female-shaonv"
        );
    }

    #[test]
    fn test_inline_audio_becomes_data_url() {
        let response: SpeechResponse =
            serde_json::from_str(r#"{"audio_data":"SUQz","duration":6.5}"#).unwrap();
        let audio = response.into_audio().unwrap();

        assert_eq!(audio.audio_url, "data:audio/mpeg;base64,SUQz");
        assert_eq!(audio.duration_seconds, Some(6.5));
    }

    #[test]
    fn test_url_preferred_over_inline_data() {
        let response: SpeechResponse = serde_json::from_str(
            r#"{"audio_url":"https://cdn.example/a.mp3","audio_data":"SUQz"}"#,
        )
        .unwrap();
        let audio = response.into_audio().unwrap();

        assert_eq!(audio.audio_url, "https://cdn.example/a.mp3");
        assert_eq!(audio.duration_seconds, None);
    }

    #[test]
    fn test_error_field_is_failure() {
        let response: SpeechResponse =
            serde_json::from_str(r#"{"error":"voice not found"}"#).unwrap();
        assert!(matches!(response.into_audio(), Err(ClientError::Api(_, _))));
    }

    #[test]
    fn test_empty_response_is_parse_error() {
        let response: SpeechResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(response.into_audio(), Err(ClientError::Parse(_))));
    }
}
