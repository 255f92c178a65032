use crate::governance::demo;
use crate::model::{
    DEFAULT_SYSTEM_PROMPT, EvaluationResult, MetricScores, QuizItem, VerdictRecord,
};
use crate::{AppState, exercise, governance, watsonx};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

type ErrorWithStatus = (StatusCode, Json<ErrorResponse>);

#[utoipa::path(get, path = "/health", responses((status = OK)), description = "Liveness probe")]
pub async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    #[serde(default)]
    pub quiz: Option<Vec<QuizItem>>,
    #[serde(default)]
    pub answers: Option<Vec<String>>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_true")]
    pub normalize_answers: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EvaluateResponse {
    pub results: Vec<EvaluationResult>,
}

#[utoipa::path(post, path = "/api/evaluate", request_body = EvaluateRequest, responses((status = OK, body = EvaluateResponse), (status = UNPROCESSABLE_ENTITY)), description = "Grade quiz answers against the ideal answers and context")]
#[axum::debug_handler]
pub async fn evaluate(
    state: State<AppState>,
    body: Json<EvaluateRequest>,
) -> Json<EvaluateResponse> {
    let quiz = body
        .quiz
        .clone()
        .filter(|quiz| !quiz.is_empty())
        .unwrap_or_else(exercise::default_quiz);
    let context = body
        .context
        .clone()
        .filter(|context| !context.trim().is_empty())
        .unwrap_or_else(|| exercise::DEFAULT_CONTEXT.to_string());
    let system_prompt = body
        .system_prompt
        .clone()
        .filter(|prompt| !prompt.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    let answers = body.answers.clone().unwrap_or_default();

    let rows = governance::build_rows(
        &quiz,
        &answers,
        &context,
        &system_prompt,
        body.normalize_answers,
    );
    let metrics = match &state.governance {
        Some(client) => client.evaluate_rows(&rows, &system_prompt).await,
        None => {
            warn!("governance metrics service not configured, returning null metrics");
            vec![MetricScores::default(); quiz.len()]
        }
    };

    let mut results = Vec::with_capacity(quiz.len());
    for (i, item) in quiz.iter().enumerate() {
        let answer = answers.get(i).map(String::as_str).unwrap_or("");
        let verdict = match &state.watsonx {
            Some(model) => {
                let verdict = model
                    .correct_answer(&item.question, answer, &context, &system_prompt)
                    .await;
                // keeps successive generation calls under the rate limit
                tokio::time::sleep(Duration::from_millis(state.config.wxa_delay_ms)).await;
                verdict
            }
            None => VerdictRecord::unavailable(watsonx::MISSING_CONFIG),
        };
        results.push(EvaluationResult {
            metrics: metrics.get(i).cloned().unwrap_or_default(),
            verdict,
        });
    }

    Json(EvaluateResponse { results })
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DefaultExercise {
    pub topic: &'static str,
    pub objective: &'static str,
    pub used_sources: Vec<&'static str>,
    pub quiz: Vec<QuizItem>,
}

#[utoipa::path(get, path = "/api/default_exercise", responses((status = OK, body = DefaultExercise)), description = "Built-in demo exercise")]
pub async fn default_exercise() -> Json<DefaultExercise> {
    Json(DefaultExercise {
        topic: exercise::DEFAULT_TOPIC,
        objective: exercise::DEFAULT_CONTEXT,
        used_sources: exercise::DEFAULT_LINKS.to_vec(),
        quiz: exercise::default_quiz(),
    })
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScoreRequest {
    #[serde(default)]
    pub text: String,
}

#[utoipa::path(post, path = "/api/governance/score", request_body = ScoreRequest, responses((status = OK, body = serde_json::Value), (status = BAD_REQUEST, body = ErrorResponse)), description = "Score a single text against the governance metrics")]
#[axum::debug_handler]
pub async fn governance_score(
    state: State<AppState>,
    body: Json<ScoreRequest>,
) -> Result<Json<Value>, ErrorWithStatus> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "text requerido".to_string(),
            }),
        ));
    }

    if let Some(scores) = demo::demo_scores(text) {
        return Ok(Json(json!(scores)));
    }

    let scores = match &state.governance {
        Some(client) => match client.evaluate_text(text).await {
            Ok(scores) => scores,
            Err(e) => {
                error!("governance evaluation failed: {e}");
                demo::zero_scores()
            }
        },
        None => {
            warn!("governance metrics service not configured, returning zero scores");
            demo::zero_scores()
        }
    };
    Ok(Json(json!(scores)))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SaveRequest {
    pub name: String,
    #[serde(default)]
    pub results: Vec<EvaluationResult>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SaveResponse {
    pub ok: bool,
    pub job: String,
    pub status: String,
}

#[utoipa::path(post, path = "/api/save_results", request_body = SaveRequest, responses((status = OK, body = SaveResponse), (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)), description = "Persist graded results through the Db2 REST gateway")]
#[axum::debug_handler]
pub async fn save_results(
    state: State<AppState>,
    body: Json<SaveRequest>,
) -> Result<Json<SaveResponse>, ErrorWithStatus> {
    let db2 = state.db2.as_ref().ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Db2 REST no configurado (faltan DB2_REST_BASE/DB2_DEPLOYMENT_ID/DB2_UID/DB2_PWD/DB2_DB)"
                    .to_string(),
            }),
        )
    })?;

    match db2.save_results(&body.name, &body.results).await {
        Ok((job, status)) => Ok(Json(SaveResponse {
            ok: status == "completed",
            job,
            status,
        })),
        Err(e) => {
            error!("failed to save results: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluate_request_tolerates_null_fields() {
        let request: EvaluateRequest = serde_json::from_value(json!({
            "quiz": null,
            "answers": null,
            "context": null,
            "system_prompt": null
        }))
        .unwrap();
        assert!(request.quiz.is_none());
        assert!(request.answers.is_none());
        assert!(request.context.is_none());
        assert!(request.normalize_answers);
    }

    #[test]
    fn evaluate_request_defaults_on_empty_body() {
        let request: EvaluateRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.quiz.is_none());
        assert!(request.answers.is_none());
        assert!(request.normalize_answers);
    }
}
