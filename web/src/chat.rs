//! The festival guide chat bot, backed by the Gemini `generateContent` API
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub(crate) const MISSING_KEY_REPLY: &str =
    "Errore: API Key mancante. Configura l'ambiente per usare la chat.";
pub(crate) const UPSTREAM_ERROR_REPLY: &str = "Scusami, ho avuto un piccolo problema a connettermi con lo spirito del Capodanno! Riprova tra poco.";
pub(crate) const EMPTY_REPLY: &str = "Non ho capito, puoi ripetere?";

const SYSTEM_INSTRUCTION: &str = r#"Sei "PupoBot", una guida esperta, simpatica e leggermente ironica sulla tradizione dei "Pupi" di Capodanno a Gallipoli (Salento, Puglia).
I Pupi sono statue di cartapesta (simili ai carri di carnevale ma stazionari) che rappresentano il "Vecchio Anno" che sta per finire.
Vengono esposti per le strade negli ultimi giorni di dicembre e bruciati ("lo sparo del Pupo") alla mezzanotte del 31 dicembre.
Simboleggiano l'addio al passato e l'auspicio per il nuovo anno.
Spesso sono satirici e prendono in giro politici o problemi locali.

Il tuo compito è rispondere alle domande dei turisti o curiosi su questa tradizione.
Usa un tono festoso, accogliente e se vuoi usa qualche espressione tipica salentina o gallipolina (ma spiegane il significato).
Sii conciso e utile."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Model,
}

/// One message of a conversation as sent by the chat widget
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct ChatMessage {
    pub(crate) role: Role,
    pub(crate) text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

fn user_content(text: String) -> Content {
    Content {
        role: Some(Role::User),
        parts: vec![Part { text }],
    }
}

/// Build the conversation that is sent upstream. The API requires the
/// conversation to start with a user turn, so any leading model messages
/// (e.g. the widget's greeting) are dropped.
fn build_request(history: Vec<ChatMessage>, message: String) -> GenerateRequest {
    let mut contents: Vec<Content> = history
        .into_iter()
        .skip_while(|m| m.role == Role::Model)
        .filter(|m| !m.text.trim().is_empty())
        .map(|m| Content {
            role: Some(m.role),
            parts: vec![Part { text: m.text }],
        })
        .collect();
    contents.push(user_content(message));
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: SYSTEM_INSTRUCTION.to_string(),
            }],
        },
        contents,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ChatClient {
    http: reqwest::Client,
    model: String,
    api_key: Option<SecretString>,
}

impl ChatClient {
    pub(crate) fn new(http: reqwest::Client, model: String, api_key: Option<SecretString>) -> Self {
        Self {
            http,
            model,
            api_key,
        }
    }

    /// Ask the model to answer `message`. This never fails: problems are
    /// reported to the user as a chat reply.
    pub(crate) async fn reply(&self, history: Vec<ChatMessage>, message: String) -> String {
        let Some(ref key) = self.api_key else {
            return MISSING_KEY_REPLY.to_string();
        };
        match self.generate(key, build_request(history, message)).await {
            Ok(text) if text.trim().is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                warn!("Chat request failed: {e:#}");
                UPSTREAM_ERROR_REPLY.to_string()
            }
        }
    }

    async fn generate(&self, key: &SecretString, request: GenerateRequest) -> Result<String> {
        debug!(model = %self.model, turns = request.contents.len(), "Sending chat request");
        let response: GenerateResponse = self
            .http
            .post(format!("{GEMINI_API_URL}/{}:generateContent", self.model))
            .header("x-goog-api-key", key.expose_secret())
            .json(&request)
            .send()
            .await
            .with_context(|| "Failed to send chat request")?
            .error_for_status()
            .with_context(|| "Chat service returned an error")?
            .json()
            .await
            .with_context(|| "Unable to parse chat response")?;
        Ok(response.text())
    }
}
