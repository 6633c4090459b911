//! Messenger send API client.
//!
//! Three message shapes against the Graph API send endpoint: plain text,
//! text with quick replies, and an audio attachment by URL. No retries,
//! no delivery confirmation beyond the HTTP status.

use serde_json::{Value, json};
use tracing::{info, warn};

const SEND_API_URL: &str = "https://graph.facebook.com/v19.0/me/messages";

/// The platform renders at most 3 quick replies.
const QUICK_REPLIES_MAX: usize = 3;
/// Visible quick-reply labels are capped by the platform.
const QUICK_REPLY_TITLE_MAX: usize = 20;

pub struct Messenger {
    page_token: String,
    http: reqwest::Client,
}

impl Messenger {
    pub fn new(page_token: String) -> Self {
        Self {
            page_token,
            http: reqwest::Client::new(),
        }
    }

    pub async fn send_text(&self, psid: &str, text: &str) -> Result<(), String> {
        info!("💬 Sending text to {psid}");
        self.post(json!({
            "recipient": { "id": psid },
            "messaging_type": "RESPONSE",
            "message": { "text": text },
        }))
        .await
    }

    /// Send text with up to 3 tappable suggestions. The visible title is
    /// truncated; the payload carries the full label.
    pub async fn send_quick_replies(
        &self,
        psid: &str,
        text: &str,
        options: &[String],
    ) -> Result<(), String> {
        info!("💭 Sending {} quick replies to {psid}", options.len().min(QUICK_REPLIES_MAX));
        self.post(json!({
            "recipient": { "id": psid },
            "message": {
                "text": text,
                "quick_replies": quick_reply_items(options),
            },
        }))
        .await
    }

    pub async fn send_audio(&self, psid: &str, url: &str) -> Result<(), String> {
        info!("🔊 Sending audio to {psid}");
        self.post(json!({
            "recipient": { "id": psid },
            "message": {
                "attachment": {
                    "type": "audio",
                    "payload": { "url": url, "is_reusable": true },
                },
            },
        }))
        .await
    }

    async fn post(&self, payload: Value) -> Result<(), String> {
        let response = self
            .http
            .post(SEND_API_URL)
            .query(&[("access_token", self.page_token.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("Send API request failed: {e}");
                warn!("{}", msg);
                msg
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let msg = format!("Send API error {status}: {body}");
            warn!("{}", msg);
            return Err(msg);
        }

        Ok(())
    }
}

fn quick_reply_items(options: &[String]) -> Vec<Value> {
    options
        .iter()
        .take(QUICK_REPLIES_MAX)
        .map(|label| {
            json!({
                "content_type": "text",
                "title": truncate_title(label),
                "payload": label,
            })
        })
        .collect()
}

/// Truncate a label to the title limit without splitting a character.
fn truncate_title(label: &str) -> String {
    label.chars().take(QUICK_REPLY_TITLE_MAX).collect()
}
