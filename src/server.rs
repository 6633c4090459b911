//! Webhook endpoint: subscription verification, event dispatch, health
//! check, and static serving for generated audio.
//!
//! The POST handler always answers 200. The platform retries delivery on
//! anything else, so internal failures are logged and swallowed rather
//! than surfaced.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::memory::MemoryStore;
use crate::messenger::Messenger;
use crate::reply::ReplyGenerator;
use crate::tts::SpeechSynthesizer;

const QUICK_REPLY_PROMPT: &str = "¿Qué te gustaría ahora? 💭";
const AUDIO_ACK: &str = "¡Gracias por tu audio! Te respondo con mi voz también 💕";

/// Shared state for all request handlers.
pub struct AppState {
    pub config: Config,
    pub memory: MemoryStore,
    pub generator: ReplyGenerator,
    pub speech: SpeechSynthesizer,
    pub messenger: Messenger,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let generator = ReplyGenerator::new(config.openai_api_key.clone());
        let speech = SpeechSynthesizer::new(
            config.eleven_api_key.clone(),
            config.base_url.clone(),
            config.static_dir.clone(),
        );
        let messenger = Messenger::new(config.page_token.clone());

        Self {
            config,
            memory: MemoryStore::new(),
            generator,
            speech,
            messenger,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route("/", get(health))
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "Airi-chan online"
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Subscription handshake: echo the challenge iff the token matches.
async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Response {
    if params.mode.as_deref() == Some("subscribe")
        && params.verify_token.as_deref() == Some(state.config.verify_token.as_str())
    {
        info!("Webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        warn!("Webhook verification failed (mode={:?})", params.mode);
        StatusCode::FORBIDDEN.into_response()
    }
}

/// Inbound event payload. Everything is optional so one malformed field
/// never takes down the whole delivery.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Deserialize)]
struct MessagingEvent {
    #[serde(default)]
    sender: Option<Sender>,
    #[serde(default)]
    message: Option<InboundMessage>,
}

#[derive(Debug, Deserialize)]
struct Sender {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    quick_reply: Option<QuickReplyEcho>,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct QuickReplyEcho {
    #[serde(default)]
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

async fn receive_webhook(State(state): State<Arc<AppState>>, body: String) -> StatusCode {
    let payload: WebhookPayload = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Unparseable webhook payload: {e}");
            return StatusCode::OK;
        }
    };

    for entry in payload.entry {
        for event in entry.messaging {
            if let Err(e) = process_event(&state, event).await {
                error!("Webhook event failed: {e}");
            }
        }
    }

    StatusCode::OK
}

/// Handle one messaging event: reply to text (or quick-reply echoes),
/// acknowledge audio, skip everything else. Audio and quick-reply legs are
/// best-effort; only text delivery failures count as event failures.
async fn process_event(state: &AppState, event: MessagingEvent) -> Result<(), String> {
    let Some(psid) = event.sender.and_then(|s| s.id) else {
        return Ok(());
    };
    let Some(message) = event.message else {
        return Ok(());
    };
    let InboundMessage {
        text,
        quick_reply,
        attachments,
    } = message;

    let text = text.or_else(|| quick_reply.and_then(|q| q.payload));

    if let Some(text) = text {
        info!("📨 Message from {psid}");

        let reply = state
            .generator
            .generate(&state.memory, &psid, &text)
            .await
            .map_err(|e| format!("Reply generation failed: {e}"))?;

        state.messenger.send_text(&psid, &reply.reply_text).await?;

        match state
            .speech
            .synthesize(&reply.reply_text, &reply.speech_style)
            .await
        {
            Ok(Some(url)) => {
                if let Err(e) = state.messenger.send_audio(&psid, &url).await {
                    warn!("Audio delivery failed: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("TTS error: {e}"),
        }

        if !reply.followups.is_empty()
            && let Err(e) = state
                .messenger
                .send_quick_replies(&psid, QUICK_REPLY_PROMPT, &reply.followups)
                .await
        {
            warn!("Quick-reply delivery failed: {e}");
        }
    } else if attachments
        .first()
        .is_some_and(|a| a.kind.as_deref() == Some("audio"))
    {
        state.messenger.send_text(&psid, AUDIO_ACK).await?;
    }

    Ok(())
}
