use onb_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::Llm;
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
}

impl OllamaLlm {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Llm for OllamaLlm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/api/generate", self.client.base_url());
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new("AI_ANSWER_FAILED", "Failed to encode answer request")
                .with_details(e.to_string())
        })?;

        match ureq::post(&url).timeout(self.client.timeout()).send_json(body) {
            Ok(r) if r.status() == 200 => {
                let v: GenerateResponse = r.into_json().map_err(|e| {
                    AppError::new("AI_ANSWER_FAILED", "Failed to decode answer response")
                        .with_details(e.to_string())
                })?;
                if v.response.trim().is_empty() {
                    return Err(AppError::new("AI_ANSWER_FAILED", "Model returned an empty answer"));
                }
                Ok(v.response)
            }
            Ok(r) => Err(AppError::new("AI_ANSWER_FAILED", "Answer request failed")
                .with_details(format!("status={}", r.status()))),
            Err(ureq::Error::Status(code, _)) => Err(AppError::new("AI_ANSWER_FAILED", "Answer request failed")
                .with_details(format!("status={code}"))
                .with_retryable(code >= 500)),
            Err(e) => Err(AppError::new("AI_ANSWER_FAILED", "Failed to call answer endpoint")
                .with_details(e.to_string())
                .with_retryable(true)),
        }
    }
}
