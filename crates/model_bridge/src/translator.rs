use std::time::Duration;

use pipeline::{PipelineError, Translator};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    config::TranslatorConfig,
    error::{BridgeError, Result},
};

/// Prefix of the marker text emitted in place of a translation
pub const TRANSLATION_ERROR_PREFIX: &str = "[TRANSLATION ERROR";

pub fn translation_error(reason: &str) -> String {
    format!("{}: {}]", TRANSLATION_ERROR_PREFIX, reason)
}

/// How a non-success HTTP status is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Record a marker string and keep going
    Marker,
    /// Fail the page
    Fatal,
}

pub fn classify_status(status: StatusCode) -> StatusOutcome {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            StatusOutcome::Marker
        }
        _ => StatusOutcome::Fatal,
    }
}

/// Extract the first choice's message content from a chat completion body
pub fn parse_completion(body: &Value) -> Result<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| BridgeError::InvalidOutput("completion has no message content".to_string()))
}

/// Translator speaking the OpenAI chat completions protocol
pub struct HttpTranslator {
    config: TranslatorConfig,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(config: TranslatorConfig, api_key: Option<String>) -> Self {
        Self { config, api_key }
    }

    /// Read the API key from the configured environment variable
    pub fn from_config(config: &TranslatorConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            warn!("{} is not set; translations will be marked as errors", config.api_key_env);
        }
        Self::new(config.clone(), api_key)
    }

    pub fn request_body(&self, text: &str) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": [
                { "role": "system", "content": self.config.system_prompt() },
                { "role": "user", "content": text },
            ],
        })
    }

    fn request(&self, api_key: &str, text: &str) -> Result<String> {
        // Built per call so the blocking client never outlives the worker thread
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?;

        let response = match client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&self.request_body(text))
            .send()
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Translation request failed: {}", e);
                return Ok(translation_error(&e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return match classify_status(status) {
                StatusOutcome::Marker => {
                    warn!("Translation endpoint refused the request: {}", status);
                    Ok(translation_error(&status.to_string()))
                }
                StatusOutcome::Fatal => Err(BridgeError::InvalidOutput(format!(
                    "translation endpoint returned {}",
                    status
                ))),
            };
        }

        let body: Value = response.json()?;
        let translated = parse_completion(&body)?;
        debug!("Translated {} chars into {} chars", text.len(), translated.len());
        Ok(translated)
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, text: &str) -> pipeline::Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(translation_error("missing API key"));
        };
        self.request(api_key, text)
            .map_err(|e| PipelineError::Translator(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_not_sent() {
        let translator = HttpTranslator::new(TranslatorConfig::default(), None);
        assert_eq!(translator.translate("   ").unwrap(), "");
    }

    #[test]
    fn test_missing_key_yields_marker() {
        let translator = HttpTranslator::new(TranslatorConfig::default(), None);
        let text = translator.translate("Hello").expect("Should not fail");
        assert!(text.starts_with(TRANSLATION_ERROR_PREFIX));
        assert!(text.ends_with(']'));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), StatusOutcome::Marker);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), StatusOutcome::Marker);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), StatusOutcome::Marker);
        assert_eq!(classify_status(StatusCode::INTERNAL_SERVER_ERROR), StatusOutcome::Fatal);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), StatusOutcome::Fatal);
    }

    #[test]
    fn test_parse_completion() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Bonjour !\n" } }]
        });
        assert_eq!(parse_completion(&body).unwrap(), "Bonjour !");
        assert!(parse_completion(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_request_body() {
        let config = TranslatorConfig {
            target_language: "Spanish".to_string(),
            ..Default::default()
        };
        let body = HttpTranslator::new(config, Some("key".to_string())).request_body("Hi");
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][1]["content"], "Hi");
        assert!(body["messages"][0]["content"].as_str().unwrap().contains("Spanish"));
    }

    #[test]
    fn test_unreachable_endpoint_yields_marker() {
        let config = TranslatorConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let translator = HttpTranslator::new(config, Some("key".to_string()));
        let text = translator.translate("Hello").expect("Should not fail");
        assert!(text.starts_with(TRANSLATION_ERROR_PREFIX));
    }
}
