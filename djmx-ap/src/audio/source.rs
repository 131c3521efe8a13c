//! Audio source fetching
//!
//! Queue items reference their audio by URL. Three forms are accepted:
//! - `http://` / `https://` (fetched with reqwest)
//! - `data:audio/...;base64,...` (inline speech from the generation service)
//! - `file://` URLs and plain filesystem paths

use base64::Engine;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Where an item's bytes come from
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    Http(String),
    Inline { mime: String, data: String },
    File(PathBuf),
}

/// Raw encoded audio plus a container hint for the decoder
#[derive(Debug)]
pub struct FetchedAudio {
    pub bytes: Vec<u8>,
    pub extension: Option<String>,
}

impl AudioSource {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::Decode("Empty audio URL".to_string()));
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(AudioSource::Http(url.to_string()));
        }

        if let Some(rest) = url.strip_prefix("data:") {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| Error::Decode("Malformed data URL".to_string()))?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| Error::Decode("Only base64 data URLs are supported".to_string()))?;
            return Ok(AudioSource::Inline {
                mime: mime.to_string(),
                data: data.to_string(),
            });
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        Ok(AudioSource::File(PathBuf::from(path)))
    }

    /// Extension hint derived from the URL path or MIME type
    pub fn extension_hint(&self) -> Option<String> {
        match self {
            AudioSource::Http(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                extension_of(Path::new(path))
            }
            AudioSource::Inline { mime, .. } => mime_extension(mime).map(str::to_string),
            AudioSource::File(path) => extension_of(path),
        }
    }

    pub async fn fetch(&self, client: &reqwest::Client) -> Result<FetchedAudio> {
        let extension = self.extension_hint();
        let bytes = match self {
            AudioSource::Http(url) => {
                debug!(url = %url, "Fetching audio");
                let response = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| Error::Decode(format!("Failed to fetch {}: {}", url, e)))?;
                if !response.status().is_success() {
                    return Err(Error::Decode(format!(
                        "Failed to fetch {}: HTTP {}",
                        url,
                        response.status()
                    )));
                }
                response
                    .bytes()
                    .await
                    .map_err(|e| Error::Decode(format!("Failed to read {}: {}", url, e)))?
                    .to_vec()
            }
            AudioSource::Inline { data, .. } => base64::engine::general_purpose::STANDARD
                .decode(data.trim())
                .map_err(|e| Error::Decode(format!("Invalid base64 audio: {}", e)))?,
            AudioSource::File(path) => tokio::fs::read(path).await.map_err(|e| {
                Error::Decode(format!("Failed to open file {}: {}", path.display(), e))
            })?,
        };

        Ok(FetchedAudio { bytes, extension })
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn mime_extension(mime: &str) -> Option<&'static str> {
    match mime.trim().to_ascii_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/aac" => Some("aac"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http() {
        let source = AudioSource::parse("https://cdn.test/song.mp3?sig=abc").unwrap();
        assert_eq!(source, AudioSource::Http("https://cdn.test/song.mp3?sig=abc".into()));
        assert_eq!(source.extension_hint().as_deref(), Some("mp3"));
    }

    #[test]
    fn test_parse_data_url() {
        let source = AudioSource::parse("data:audio/mpeg;base64,SUQz").unwrap();
        assert_eq!(
            source,
            AudioSource::Inline {
                mime: "audio/mpeg".into(),
                data: "SUQz".into()
            }
        );
        assert_eq!(source.extension_hint().as_deref(), Some("mp3"));
    }

    #[test]
    fn test_parse_rejects_non_base64_data_url() {
        assert!(AudioSource::parse("data:audio/mpeg,raw").is_err());
        assert!(AudioSource::parse("data:audio/mpeg;base64").is_err());
        assert!(AudioSource::parse("   ").is_err());
    }

    #[test]
    fn test_parse_file_paths() {
        assert_eq!(
            AudioSource::parse("file:///music/a.FLAC").unwrap(),
            AudioSource::File(PathBuf::from("/music/a.FLAC"))
        );
        let source = AudioSource::parse("/music/b.wav").unwrap();
        assert_eq!(source.extension_hint().as_deref(), Some("wav"));
    }

    #[tokio::test]
    async fn test_fetch_inline_decodes_base64() {
        let source = AudioSource::parse("data:audio/wav;base64,AAEC").unwrap();
        let fetched = source.fetch(&reqwest::Client::new()).await.unwrap();
        assert_eq!(fetched.bytes, vec![0, 1, 2]);
        assert_eq!(fetched.extension.as_deref(), Some("wav"));
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let source = AudioSource::parse("/nonexistent/djmx/none.mp3").unwrap();
        let result = source.fetch(&reqwest::Client::new()).await;
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
