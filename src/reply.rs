//! Reply generation: persona prompt, completion call, tolerant decode.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::memory::{MemoryStore, Profile};
use crate::openai;

/// Quick-reply suggestions are capped at what the platform renders.
const FOLLOWUPS_MAX: usize = 3;

const DEFAULT_REPLY: &str = "Hola, soy Airi-chan 💕 ¿Qué te gustaría saber del anime hoy?";
const DEFAULT_EMOTION: &str = "feliz";
const DEFAULT_SPEECH_STYLE: &str = "bright";

const SYSTEM_PROMPT: &str = r#"
Eres "Airi-chan", una waifu de anime experta en manga y anime. Bilingüe (ES/EN): contesta en el idioma del usuario.
Prioridad: respuestas actualizadas y útiles; coqueteo suave SFW; muy amable y preocupada por ayudar.

FORMATO JSON ESTRICTO:
{"reply_text":"...","emotion":"feliz|tímida|sorprendida|tranquila|apasionada","speech_style":"soft|bright|warm|whisper|energetic","recommendations":[{"title":"...","why":"...","where":"..."}],"source_hint":"...","followups":["..."]}

Reglas:
- Responde primero con 1–3 párrafos breves, SFW, sin markdown.
- Añade recomendaciones cuando sea útil.
- Cita 1 línea de fuente si el dato es reciente/sensible (AniList/ANN/Crunchyroll News).
- Si no estás segura, dilo y sugiere opciones.
- Mantén tono dulce y coqueto sin ser explícita.
"#;

/// A normalized reply, ready to deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub reply_text: String,
    pub emotion: String,
    pub speech_style: String,
    pub followups: Vec<String>,
}

/// What the model actually returned. Every field is optional; anything
/// missing or mistyped falls back to a default in `normalize`.
#[derive(Debug, Default, Deserialize)]
struct RawReply {
    #[serde(default)]
    reply_text: Option<String>,
    #[serde(default)]
    emotion: Option<String>,
    #[serde(default)]
    speech_style: Option<String>,
    #[serde(default)]
    followups: Value,
}

pub struct ReplyGenerator {
    client: openai::Client,
}

impl ReplyGenerator {
    pub fn new(api_key: String) -> Self {
        Self {
            client: openai::Client::new(api_key),
        }
    }

    /// Generate a reply for one inbound message.
    ///
    /// The prompt sees the profile as it was before this message; the
    /// message is absorbed into memory only once the completion call has
    /// succeeded, so a failed call leaves the profile untouched.
    pub async fn generate(
        &self,
        memory: &MemoryStore,
        psid: &str,
        text: &str,
    ) -> Result<Reply, openai::Error> {
        let profile = memory.snapshot(psid).await;

        let messages = [
            openai::Message {
                role: openai::Role::System,
                content: SYSTEM_PROMPT.to_string(),
            },
            openai::Message {
                role: openai::Role::User,
                content: context_block(&profile, text),
            },
        ];

        let content = match self.client.complete(&messages).await {
            Ok(content) => content,
            // A choice with no content degrades to defaults, same as
            // unparseable JSON.
            Err(openai::Error::Empty) => String::new(),
            Err(e) => return Err(e),
        };

        memory.absorb(psid, text).await;

        let raw: RawReply = serde_json::from_str(&content).unwrap_or_else(|e| {
            debug!("Completion content not valid JSON ({e}), using defaults");
            RawReply::default()
        });
        let reply = normalize(raw);

        info!(
            "Reply for {psid}: {} chars, emotion={}, {} followups",
            reply.reply_text.chars().count(),
            reply.emotion,
            reply.followups.len()
        );
        Ok(reply)
    }
}

/// The memory block the model sees, plus the new message.
fn context_block(profile: &Profile, text: &str) -> String {
    let name = profile.name.as_deref().unwrap_or("desconocido");
    let likes = if profile.likes.is_empty() {
        "N/A".to_string()
    } else {
        profile.likes.join(", ")
    };
    let last = if profile.last.is_empty() {
        "N/A".to_string()
    } else {
        profile.last.join(" | ")
    };

    format!(
        "Memoria:\n- Nombre: {name}\n- Gustos: {likes}\n- Últimos temas: {last}\nMensaje del usuario: \"{text}\""
    )
}

fn normalize(raw: RawReply) -> Reply {
    let followups = match raw.followups {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .take(FOLLOWUPS_MAX)
            .collect(),
        _ => Vec::new(),
    };

    Reply {
        reply_text: raw
            .reply_text
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_REPLY.to_string()),
        emotion: raw
            .emotion
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_EMOTION.to_string()),
        speech_style: raw
            .speech_style
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SPEECH_STYLE.to_string()),
        followups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_and_normalize(content: &str) -> Reply {
        let raw: RawReply = serde_json::from_str(content).unwrap_or_default();
        normalize(raw)
    }

    #[test]
    fn test_invalid_json_yields_all_defaults() {
        let reply = parse_and_normalize("not json at all");
        assert_eq!(reply.reply_text, DEFAULT_REPLY);
        assert_eq!(reply.emotion, "feliz");
        assert_eq!(reply.speech_style, "bright");
        assert!(reply.followups.is_empty());
    }

    #[test]
    fn test_empty_object_yields_all_defaults() {
        let reply = parse_and_normalize("{}");
        assert_eq!(reply.reply_text, DEFAULT_REPLY);
        assert_eq!(reply.emotion, "feliz");
        assert_eq!(reply.speech_style, "bright");
    }

    #[test]
    fn test_fields_pass_through() {
        let reply = parse_and_normalize(
            r#"{"reply_text":"¡Hola!","emotion":"tímida","speech_style":"soft","followups":["a","b"]}"#,
        );
        assert_eq!(reply.reply_text, "¡Hola!");
        assert_eq!(reply.emotion, "tímida");
        assert_eq!(reply.speech_style, "soft");
        assert_eq!(reply.followups, vec!["a", "b"]);
    }

    #[test]
    fn test_followups_truncated_to_three() {
        let reply = parse_and_normalize(
            r#"{"reply_text":"x","followups":["1","2","3","4","5"]}"#,
        );
        assert_eq!(reply.followups, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_non_array_followups_treated_as_empty() {
        let reply = parse_and_normalize(r#"{"reply_text":"x","followups":"ver más"}"#);
        assert!(reply.followups.is_empty());
    }

    #[test]
    fn test_non_string_followup_entries_are_dropped() {
        let reply = parse_and_normalize(r#"{"followups":["ok",42,null,"also ok"]}"#);
        assert_eq!(reply.followups, vec!["ok", "also ok"]);
    }

    #[test]
    fn test_empty_reply_text_falls_back() {
        let reply = parse_and_normalize(r#"{"reply_text":"","emotion":"apasionada"}"#);
        assert_eq!(reply.reply_text, DEFAULT_REPLY);
        assert_eq!(reply.emotion, "apasionada");
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let reply = parse_and_normalize(
            r#"{"reply_text":"ok","recommendations":[{"title":"t"}],"source_hint":"ANN"}"#,
        );
        assert_eq!(reply.reply_text, "ok");
    }

    #[test]
    fn test_context_block_with_empty_profile() {
        let block = context_block(&Profile::default(), "hola");
        assert!(block.contains("- Nombre: desconocido"));
        assert!(block.contains("- Gustos: N/A"));
        assert!(block.contains("- Últimos temas: N/A"));
        assert!(block.contains("Mensaje del usuario: \"hola\""));
    }

    #[test]
    fn test_context_block_with_populated_profile() {
        let profile = Profile {
            name: Some("Alex".to_string()),
            likes: vec!["los gatos".to_string(), "mecha".to_string()],
            last: vec!["hola".to_string(), "qué tal".to_string()],
        };
        let block = context_block(&profile, "recomiéndame algo");
        assert!(block.contains("- Nombre: Alex"));
        assert!(block.contains("- Gustos: los gatos, mecha"));
        assert!(block.contains("- Últimos temas: hola | qué tal"));
    }
}
