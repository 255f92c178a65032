//! watsonx.ai text generation: renders the verdict prompt, calls the
//! generation endpoint and digs the verdict JSON out of the model output.

use crate::iam::IamTokenProvider;
use crate::model::{Verdict, VerdictRecord};
use anyhow::anyhow;
use askama::Template;
use log::error;
use regex::Regex;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::{Arc, LazyLock};

pub const MISSING_CONFIG: &str =
    "watsonx.ai no configurado (faltan WXA_URL/WATSONX_APIKEY/WXA_PROJECT_ID)";

const GENERATION_VERSION: &str = "2024-05-31";
const MAX_NEW_TOKENS: u32 = 250;

#[derive(Template)]
#[template(path = "verdict_prompt.txt")]
struct VerdictPrompt<'a> {
    system_prompt: &'a str,
    context: &'a str,
    question: &'a str,
    user_answer: &'a str,
}

#[derive(Debug)]
pub struct WatsonxClient {
    http: Client,
    base_url: String,
    project_id: String,
    model_id: String,
    iam: Arc<IamTokenProvider>,
}

impl WatsonxClient {
    pub fn new(
        base_url: &str,
        project_id: String,
        model_id: String,
        iam: Arc<IamTokenProvider>,
    ) -> WatsonxClient {
        WatsonxClient {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id,
            model_id,
            iam,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, anyhow::Error> {
        let token = self.iam.token().await?;
        let body: Value = self
            .http
            .post(format!(
                "{}/ml/v1/text/generation?version={GENERATION_VERSION}",
                self.base_url
            ))
            .bearer_auth(token)
            .json(&json!({
                "model_id": self.model_id,
                "project_id": self.project_id,
                "input": prompt,
                "parameters": {
                    "decoding_method": "greedy",
                    "max_new_tokens": MAX_NEW_TOKENS,
                    "temperature": 0.0,
                    "return_options": {"input_text": true},
                },
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body["results"][0]["generated_text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("results[0].generated_text not found in response"))
    }

    /// Grades one answer. Every failure mode degrades to a null verdict with
    /// the reason (or the raw model output) preserved in `wx_raw`.
    pub async fn correct_answer(
        &self,
        question: &str,
        user_answer: &str,
        context: &str,
        system_prompt: &str,
    ) -> VerdictRecord {
        let prompt = VerdictPrompt {
            system_prompt,
            context,
            question,
            user_answer,
        }
        .render()
        .unwrap();

        let raw = match self.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("watsonx.ai generation failed: {e}");
                return VerdictRecord::unavailable(format!("Error watsonx.ai: {e}"));
            }
        };

        match extract_last_verdict_json(&raw) {
            Some(parsed) => VerdictRecord {
                wx_verdict: parsed
                    .get("verdict")
                    .and_then(Value::as_str)
                    .and_then(Verdict::parse),
                wx_explanation: parsed
                    .get("explanation")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                wx_improved_answer: parsed
                    .get("improved_answer")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                wx_raw: raw,
            },
            None => VerdictRecord::unavailable(raw),
        }
    }
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^```(?:json)?\s*|\s*```$").unwrap());
static OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[\s\S]*?\}").unwrap());

/// Finds the last valid JSON object in the model output that carries the
/// verdict/explanation/improved_answer keys. Code fences are stripped first;
/// chatter around the object is ignored.
pub fn extract_last_verdict_json(text: &str) -> Option<serde_json::Map<String, Value>> {
    let clean = FENCE_RE.replace_all(text.trim(), "");
    let mut last = None;
    for candidate in OBJECT_RE.find_iter(&clean) {
        if let Ok(Value::Object(map)) = serde_json::from_str(candidate.as_str()) {
            if ["verdict", "explanation", "improved_answer"]
                .iter()
                .all(|key| map.contains_key(*key))
            {
                last = Some(map);
            }
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_fenced_output() {
        let raw = "```json\n{\"verdict\": \"Correcta\", \"explanation\": \"ok\", \"improved_answer\": \"Guillermo Treister.\"}\n```";
        let parsed = extract_last_verdict_json(raw).unwrap();
        assert_eq!(parsed["verdict"], "Correcta");
        assert_eq!(parsed["improved_answer"], "Guillermo Treister.");
    }

    #[test]
    fn last_complete_object_wins() {
        let raw = concat!(
            "{\"verdict\": \"Incorrecta\", \"explanation\": \"v1\", \"improved_answer\": \"a\"} ",
            "texto intermedio ",
            "{\"verdict\": \"Mejorable\", \"explanation\": \"v2\", \"improved_answer\": \"b\"}",
        );
        let parsed = extract_last_verdict_json(raw).unwrap();
        assert_eq!(parsed["verdict"], "Mejorable");
    }

    #[test]
    fn object_missing_keys_is_rejected() {
        assert!(extract_last_verdict_json("{\"verdict\": \"Correcta\"}").is_none());
        assert!(extract_last_verdict_json("sin json alguno").is_none());
        assert!(extract_last_verdict_json("{rotas llaves").is_none());
    }

    #[test]
    fn prompt_template_renders_all_fields() {
        let prompt = VerdictPrompt {
            system_prompt: "SP",
            context: "CTX",
            question: "¿Q?",
            user_answer: "UA",
        }
        .render()
        .unwrap();
        assert!(prompt.starts_with("SP"));
        assert!(prompt.contains("\"\"\" CTX \"\"\""));
        assert!(prompt.contains("Pregunta: ¿Q?"));
        assert!(prompt.contains("Respuesta_del_usuario: UA"));
        assert!(prompt.contains("Correcta|Mejorable|Incorrecta"));
    }
}
