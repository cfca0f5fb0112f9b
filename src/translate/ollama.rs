use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TranslateConfig;
use crate::error::{LingomuxError, Result};
use crate::language::{LanguagePair, LanguageRegistry};
use super::{TranslationBackend, TranslationHandle};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Ollama server reached over HTTP; one handle per language pair
pub struct OllamaBackend {
    client: Client,
    config: TranslateConfig,
    registry: Arc<LanguageRegistry>,
}

impl OllamaBackend {
    pub fn new(config: TranslateConfig, registry: Arc<LanguageRegistry>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            registry,
        })
    }

    /// Check the server is reachable and the model is pulled
    pub async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "name": self.config.model }))
            .send()
            .await
            .map_err(|e| LingomuxError::engine(format!("Failed to connect to Ollama: {}", e), String::new()))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.config.model);
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(LingomuxError::engine(
                format!(
                    "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                    self.config.model, self.config.model
                ),
                body,
            ))
        }
    }
}

#[async_trait]
impl TranslationBackend for OllamaBackend {
    async fn load(&self, pair: &LanguagePair) -> Result<Arc<dyn TranslationHandle>> {
        let source = self
            .registry
            .resolve(&pair.source)
            .ok_or_else(|| LingomuxError::UnsupportedLanguage(format!("no engine for {}", pair)))?;
        let target = self
            .registry
            .resolve(&pair.target)
            .ok_or_else(|| LingomuxError::UnsupportedLanguage(format!("no engine for {}", pair)))?;
        if source.code == target.code {
            return Err(LingomuxError::UnsupportedLanguage(format!("{} is not a translation", pair)));
        }

        self.check_availability().await?;

        Ok(Arc::new(OllamaHandle {
            client: self.client.clone(),
            endpoint: self.config.endpoint.clone(),
            model: self.config.model.clone(),
            source_name: source.name,
            target_name: target.name,
            target_code: target.code,
        }))
    }
}

pub struct OllamaHandle {
    client: Client,
    endpoint: String,
    model: String,
    source_name: &'static str,
    target_name: &'static str,
    target_code: &'static str,
}

impl OllamaHandle {
    fn build_prompt(&self, text: &str) -> String {
        format!(
            "You are a professional subtitle translator.\n\
             \n\
             Translate the text from {} to {} ONLY (language code: {}).\n\
             Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
             Do not include any explanations, alternatives, or text in other languages.\n\
             \n\
             [Text to translate]\n\
             {}\n",
            self.source_name, self.target_name, self.target_code, self.target_name, text
        )
    }
}

/// Failure status and body from the server
fn classify_failure(status: StatusCode, body: String) -> LingomuxError {
    if status.is_server_error() && body.to_lowercase().contains("memory") {
        return LingomuxError::ResourceExhaustion(format!("Ollama {}: {}", status, body.trim()));
    }
    LingomuxError::engine(format!("Ollama API error {}", status), body)
}

/// Pull the translation out of a reply that ignored the JSON instruction
fn clean_response(response: &str) -> String {
    for line in response.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with("Here is")
            || trimmed.starts_with("Here are")
            || trimmed.starts_with("Translation:")
            || (trimmed.starts_with("**") && trimmed.ends_with("**"))
        {
            continue;
        }
        return trimmed.to_string();
    }
    response.trim().to_string()
}

#[async_trait]
impl TranslationHandle for OllamaHandle {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn detokenize(&self, tokens: &[String]) -> String {
        tokens.join(" ")
    }

    async fn translate(&self, text: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: self.build_prompt(text),
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.endpoint);
        debug!("Sending translation request to: {}", url);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, body));
        }

        let generated: GenerateResponse = response.json().await?;
        let raw = generated.response.trim();
        debug!("Raw Ollama response: {}", raw);

        if raw.is_empty() {
            return Err(LingomuxError::engine("Empty translation received", String::new()));
        }

        if let Ok(result) = serde_json::from_str::<TranslationResult>(raw) {
            return Ok(result.text.trim().to_string());
        }

        Ok(clean_response(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn server_memory_errors_are_exhaustion() {
        let err = classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"model requires more system memory (5.2 GiB) than is available"}"#.into(),
        );
        assert!(err.is_resource_exhaustion());

        let err = classify_failure(StatusCode::NOT_FOUND, r#"{"error":"model not found"}"#.into());
        match err {
            LingomuxError::Engine { diagnostics, .. } => assert!(diagnostics.contains("model not found")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn clean_response_skips_preamble() {
        assert_eq!(clean_response("Here is the translation:\n\nHello world"), "Hello world");
        assert_eq!(clean_response("  Bonjour  "), "Bonjour");
    }

    #[tokio::test]
    async fn unknown_pair_is_rejected_before_any_request() {
        let mut config = Config::default().translate;
        config.endpoint = "http://127.0.0.1:9".into();
        let backend = OllamaBackend::new(config, Arc::new(LanguageRegistry::new())).unwrap();

        let err = backend.load(&LanguagePair::new("fr", "tlh")).await.err().unwrap();
        assert!(matches!(err, LingomuxError::UnsupportedLanguage(_)));
    }

    #[test]
    fn handle_tokenizes_on_whitespace() {
        let handle = OllamaHandle {
            client: Client::new(),
            endpoint: "http://localhost:11434".into(),
            model: "llama3.2:3b".into(),
            source_name: "French",
            target_name: "English",
            target_code: "en",
        };
        let tokens = handle.tokenize(" un  deux\ttrois ");
        assert_eq!(tokens, vec!["un", "deux", "trois"]);
        assert_eq!(handle.detokenize(&tokens), "un deux trois");
        assert!(handle.build_prompt("un").contains("from French to English"));
    }
}
