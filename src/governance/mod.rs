pub mod demo;
pub mod flatten;

use crate::iam::IamTokenProvider;
use crate::model::{
    DEFAULT_SYSTEM_PROMPT, FRONT_METRICS, METRIC_GROUPS, MetricId, MetricScores, QuizItem,
};
use log::{info, warn};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One evaluation row per quiz item, carrying every field any metric
/// evaluator may ask for.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvalRow {
    pub question: String,
    pub ideal_answer: String,
    pub user_answer: String,
    pub context: String,
    pub input_text: String,
    pub system_prompt: String,
    pub generated_text: String,
    pub ground_truth: String,
}

impl EvalRow {
    /// Row for free-text scoring: the text stands in for answer, generated
    /// text and input alike; the QA fields stay empty.
    pub fn for_text(text: &str, system_prompt: &str) -> EvalRow {
        EvalRow {
            question: String::new(),
            ideal_answer: String::new(),
            user_answer: text.to_string(),
            context: String::new(),
            input_text: text.to_string(),
            system_prompt: system_prompt.to_string(),
            generated_text: text.to_string(),
            ground_truth: String::new(),
        }
    }
}

/// Lowercases, strips diacritics and punctuation and collapses whitespace,
/// so similarity compares content rather than spelling.
pub fn normalize(s: &str) -> String {
    let folded: String = s
        .to_lowercase()
        .chars()
        .map(fold_diacritic)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        other => other,
    }
}

/// Builds the evaluation rows for a quiz. Answers align positionally with
/// quiz items; missing answers become empty strings.
pub fn build_rows(
    quiz: &[QuizItem],
    answers: &[String],
    context: &str,
    system_prompt: &str,
    normalize_answers: bool,
) -> Vec<EvalRow> {
    quiz.iter()
        .enumerate()
        .map(|(i, item)| {
            let answer = answers.get(i).map(String::as_str).unwrap_or("");
            let (generated_text, ground_truth) = if normalize_answers {
                (normalize(answer), normalize(&item.ideal_answer))
            } else {
                (answer.to_string(), item.ideal_answer.clone())
            };
            EvalRow {
                question: item.question.clone(),
                ideal_answer: item.ideal_answer.clone(),
                user_answer: answer.to_string(),
                context: context.to_string(),
                input_text: item.question.clone(),
                system_prompt: system_prompt.to_string(),
                generated_text,
                ground_truth,
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct MetricRequest<'a> {
    metrics: Vec<&'static str>,
    rows: &'a [EvalRow],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
}

/// Client for the remote governance metrics service.
#[derive(Debug)]
pub struct GovernanceClient {
    http: Client,
    evaluate_url: String,
    iam: Arc<IamTokenProvider>,
    log_raw: bool,
}

impl GovernanceClient {
    pub fn new(base_url: &str, iam: Arc<IamTokenProvider>, log_raw: bool) -> GovernanceClient {
        GovernanceClient {
            http: Client::new(),
            evaluate_url: format!("{}/v1/metrics/evaluate", base_url.trim_end_matches('/')),
            iam,
            log_raw,
        }
    }

    async fn evaluate_batch(
        &self,
        metrics: &[MetricId],
        rows: &[EvalRow],
        system_prompt: Option<&str>,
    ) -> Result<Value, anyhow::Error> {
        let token = self.iam.token().await?;
        let raw: Value = self
            .http
            .post(&self.evaluate_url)
            .bearer_auth(token)
            .json(&MetricRequest {
                metrics: metrics.iter().map(|m| m.key()).collect(),
                rows,
                system_prompt,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if self.log_raw {
            info!("[governance][raw] {raw}");
        }
        Ok(raw)
    }

    /// Scores every metric group for every row. Metrics are evaluated one
    /// at a time so a failing evaluator degrades to null for that metric
    /// only.
    pub async fn evaluate_rows(&self, rows: &[EvalRow], system_prompt: &str) -> Vec<MetricScores> {
        let mut out = vec![MetricScores::default(); rows.len()];
        // Owned iteration order: holding the borrowed Flatten iterator across
        // the await trips rustc's higher-ranked auto-trait check (the handler
        // future is no longer provably Send).
        let metrics: Vec<MetricId> = METRIC_GROUPS.iter().copied().flatten().copied().collect();
        for metric in metrics {
            let sp = metric.requires_system_prompt().then_some(system_prompt);
            match self.evaluate_batch(&[metric], rows, sp).await {
                Ok(payload) => {
                    let payload = payload
                        .get("metrics_result")
                        .cloned()
                        .unwrap_or(payload);
                    for (i, scores) in out.iter_mut().enumerate() {
                        scores.set(metric, flatten::record_value(&payload, i));
                    }
                }
                Err(e) => warn!("{} unavailable: {e}", metric.key()),
            }
        }
        out
    }

    /// Scores a single free-text input against the front-facing metrics.
    /// Unreported metrics stay at 0.0.
    pub async fn evaluate_text(&self, text: &str) -> Result<BTreeMap<&'static str, f64>, anyhow::Error> {
        let row = EvalRow::for_text(text, DEFAULT_SYSTEM_PROMPT);
        let raw = self
            .evaluate_batch(FRONT_METRICS, std::slice::from_ref(&row), Some(DEFAULT_SYSTEM_PROMPT))
            .await?;

        let mut out = demo::zero_scores();
        if let Some(items) = raw.get("metrics_result").and_then(Value::as_array) {
            for item in items {
                let Some(name) = item.get("name").and_then(Value::as_str) else {
                    continue;
                };
                let Some(metric) = MetricId::from_reported_name(name) else {
                    continue;
                };
                if let Some(value) = flatten::metric_object_value(item) {
                    out.insert(metric.key(), value);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz() -> Vec<QuizItem> {
        vec![
            QuizItem {
                question: "¿Quién lidera Watson AI Apps en LATAM?".to_string(),
                ideal_answer: "Guillermo Treister.".to_string(),
            },
            QuizItem {
                question: "¿Qué defiende sobre la IA?".to_string(),
                ideal_answer: "Que sea gobernable, explicable y confiable.".to_string(),
            },
        ]
    }

    #[test]
    fn normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize("  ¡Guillermo   TREISTER! "), "guillermo treister");
        assert_eq!(normalize("gobernable, explicable y confiable."), "gobernable explicable y confiable");
        assert_eq!(normalize("está bien"), "esta bien");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn rows_align_with_quiz_items() {
        let answers = vec!["Guillermo Treister".to_string()];
        let rows = build_rows(&quiz(), &answers, "ctx", "sp", true);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_answer, "Guillermo Treister");
        assert_eq!(rows[0].generated_text, "guillermo treister");
        assert_eq!(rows[0].ground_truth, "guillermo treister");
        // missing answer degrades to empty, never truncates the quiz
        assert_eq!(rows[1].user_answer, "");
        assert_eq!(rows[1].generated_text, "");
    }

    #[test]
    fn rows_keep_raw_text_without_normalization() {
        let answers = vec!["  ¡Guillermo! ".to_string()];
        let rows = build_rows(&quiz()[..1].to_vec(), &answers, "ctx", "sp", false);
        assert_eq!(rows[0].generated_text, "  ¡Guillermo! ");
        assert_eq!(rows[0].ground_truth, "Guillermo Treister.");
    }

    #[test]
    fn text_row_mirrors_input_everywhere() {
        let row = EvalRow::for_text("un exploit", DEFAULT_SYSTEM_PROMPT);
        assert_eq!(row.user_answer, "un exploit");
        assert_eq!(row.input_text, "un exploit");
        assert_eq!(row.generated_text, "un exploit");
        assert!(row.question.is_empty());
        assert_eq!(row.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }
}
