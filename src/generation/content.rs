//! Prompted text generation for the three document variants.
//!
//! The completion provider sits behind the `CompletionClient` trait. Retry
//! and fallback behavior is an injected strategy rather than environment
//! flags read at call time, and the debug trace is delivered through an
//! injected observer instead of global mutable state, so concurrent
//! requests never clobber each other.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CompletionConfig;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion provider returned {0}")]
    Provider(u16),
    #[error("completion response had no content")]
    EmptyResponse,
    #[error("all {0} completion attempts failed")]
    Exhausted(u32),
}

/// The three document variants produced per purchased unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentVariant {
    Template,
    Sample,
    StudyMaterial,
}

impl DocumentVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentVariant::Template => "template",
            DocumentVariant::Sample => "sample",
            DocumentVariant::StudyMaterial => "study_material",
        }
    }
}

/// One completion call as seen by observability hooks.
#[derive(Debug, Clone)]
pub struct CompletionTrace {
    pub variant: DocumentVariant,
    pub document_name: String,
    pub attempts: u32,
    pub duration: Duration,
    pub used_fallback: bool,
    pub ok: bool,
}

/// Injected observability hook for completion calls.
pub trait GenerationObserver: Send + Sync {
    fn completion_finished(&self, trace: &CompletionTrace);
}

/// Default observer: structured log lines, nothing retained.
pub struct LogObserver;

impl GenerationObserver for LogObserver {
    fn completion_finished(&self, trace: &CompletionTrace) {
        if trace.ok {
            log::debug!(
                "Generated {} text for '{}' in {:?} ({} attempt(s){})",
                trace.variant.as_str(),
                trace.document_name,
                trace.duration,
                trace.attempts,
                if trace.used_fallback { ", via fallback" } else { "" }
            );
        } else {
            log::warn!(
                "Completion for {} '{}' failed after {} attempt(s)",
                trace.variant.as_str(),
                trace.document_name,
                trace.attempts
            );
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError>;
}

/// Chat-completions HTTP client.
pub struct HttpCompletionClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&serde_json::json!({
                "model": self.config.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user }
                ]
            }))
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GenerationError::Provider(response.status().as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

/// Deterministic stub used in tests and as an optional last-resort
/// fallback when the provider is down.
pub struct StubCompletionClient;

#[async_trait]
impl CompletionClient for StubCompletionClient {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, GenerationError> {
        Ok(format!(
            "BORRADOR PRELIMINAR\n\n{user}\n\nEste documento es un borrador generado \
             automáticamente y debe ser revisado por un profesional."
        ))
    }
}

/// Retry strategy for completion calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff: Duration::from_millis(500),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        // Exponential: 500ms, 1s, 2s, ...
        self.base_backoff * 2u32.saturating_pow(attempt)
    }
}

/// Generates prose for a named document variant. Pure function of
/// (document name, legal area, jurisdiction) up to provider nondeterminism.
pub struct ContentGenerator {
    client: Arc<dyn CompletionClient>,
    fallback: Option<Arc<dyn CompletionClient>>,
    retry: RetryPolicy,
    observer: Arc<dyn GenerationObserver>,
}

impl ContentGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            fallback: None,
            retry,
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn CompletionClient>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn GenerationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Generate the text of one document variant.
    pub async fn generate(
        &self,
        variant: DocumentVariant,
        name: &str,
        area: &str,
        jurisdiction: &str,
    ) -> Result<String, GenerationError> {
        let system = system_prompt(variant);
        let user = user_prompt(variant, name, area, jurisdiction);
        let started = Instant::now();

        let mut attempts = 0;
        let mut last_error = GenerationError::Exhausted(self.retry.max_attempts);
        while attempts < self.retry.max_attempts {
            match self.client.complete(&system, &user).await {
                Ok(text) => {
                    self.observer.completion_finished(&CompletionTrace {
                        variant,
                        document_name: name.to_string(),
                        attempts: attempts + 1,
                        duration: started.elapsed(),
                        used_fallback: false,
                        ok: true,
                    });
                    return Ok(text);
                }
                Err(e) => {
                    attempts += 1;
                    log::warn!(
                        "Completion attempt {}/{} for {} '{}' failed: {}",
                        attempts,
                        self.retry.max_attempts,
                        variant.as_str(),
                        name,
                        e
                    );
                    last_error = e;
                    if attempts < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff(attempts - 1)).await;
                    }
                }
            }
        }

        if let Some(fallback) = &self.fallback {
            if let Ok(text) = fallback.complete(&system, &user).await {
                self.observer.completion_finished(&CompletionTrace {
                    variant,
                    document_name: name.to_string(),
                    attempts,
                    duration: started.elapsed(),
                    used_fallback: true,
                    ok: true,
                });
                return Ok(text);
            }
        }

        self.observer.completion_finished(&CompletionTrace {
            variant,
            document_name: name.to_string(),
            attempts,
            duration: started.elapsed(),
            used_fallback: false,
            ok: false,
        });
        Err(last_error)
    }
}

fn system_prompt(variant: DocumentVariant) -> String {
    let role = match variant {
        DocumentVariant::Template => {
            "Redactas plantillas de documentos legales con campos entre corchetes \
             ([NOMBRE], [FECHA], ...) listos para completar."
        }
        DocumentVariant::Sample => {
            "Redactas ejemplos completos de documentos legales con datos ficticios \
             verosímiles, útiles como referencia de redacción."
        }
        DocumentVariant::StudyMaterial => {
            "Redactas material de estudio: explicas la estructura del documento, \
             los requisitos legales aplicables y errores frecuentes."
        }
    };
    format!(
        "Eres un asistente jurídico experto. {role} Responde únicamente con el \
         contenido del documento, sin comentarios adicionales."
    )
}

fn user_prompt(variant: DocumentVariant, name: &str, area: &str, jurisdiction: &str) -> String {
    let what = match variant {
        DocumentVariant::Template => "una plantilla",
        DocumentVariant::Sample => "un ejemplo completo",
        DocumentVariant::StudyMaterial => "material de estudio",
    };
    format!(
        "Redacta {what} del documento \"{name}\" en el área de derecho {area}, \
         conforme a la legislación de {jurisdiction}."
    )
}
