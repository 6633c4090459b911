//! Speech synthesis via ElevenLabs.
//!
//! Generated clips are written under the static-serving directory and
//! addressed by public URL. Files accumulate; nothing cleans them up.

use std::path::PathBuf;

use serde_json::json;
use tracing::{debug, info};

const VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const MODEL_ID: &str = "eleven_multilingual_v2";

/// Map a speech style label to the synthesis intensity parameter.
fn style_intensity(style: &str) -> f64 {
    match style {
        "soft" => 0.2,
        "warm" => 0.4,
        "bright" => 0.6,
        "whisper" => 0.1,
        "energetic" => 0.8,
        _ => 0.5,
    }
}

pub struct SpeechSynthesizer {
    api_key: Option<String>,
    base_url: Option<String>,
    static_dir: PathBuf,
    client: reqwest::Client,
}

impl SpeechSynthesizer {
    pub fn new(api_key: Option<String>, base_url: Option<String>, static_dir: PathBuf) -> Self {
        Self {
            api_key,
            base_url,
            static_dir,
            client: reqwest::Client::new(),
        }
    }

    /// Synthesize `text` and return the public URL of the clip.
    ///
    /// Returns `Ok(None)` when no API key is configured, or when the clip
    /// was written but no base URL is configured to address it.
    pub async fn synthesize(&self, text: &str, style: &str) -> Result<Option<String>, String> {
        let Some(ref api_key) = self.api_key else {
            return Ok(None);
        };

        let preview: String = text.chars().take(50).collect();
        info!("TTS: \"{preview}\"");

        let body = json!({
            "text": text,
            "model_id": MODEL_ID,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.8,
                "style": style_intensity(style),
                "use_speaker_boost": true,
            },
        });

        let response = self
            .client
            .post(format!(
                "https://api.elevenlabs.io/v1/text-to-speech/{VOICE_ID}"
            ))
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("TTS request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("TTS error {status}: {body}"));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read TTS response: {e}"))?;

        debug!("Got {} bytes of MP3 audio", audio.len());

        std::fs::create_dir_all(&self.static_dir)
            .map_err(|e| format!("Failed to create static dir: {e}"))?;

        let file_name = format!("voice_{}.mp3", chrono::Utc::now().timestamp_millis());
        let out_path = self.static_dir.join(&file_name);
        std::fs::write(&out_path, &audio)
            .map_err(|e| format!("Failed to write {}: {e}", out_path.display()))?;

        info!("Wrote voice clip {} ({} bytes)", out_path.display(), audio.len());

        // Without a public base URL the clip is unreachable; skip audio.
        let Some(ref base_url) = self.base_url else {
            return Ok(None);
        };
        Ok(Some(format!("{base_url}/static/{file_name}")))
    }
}
