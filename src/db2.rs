//! Db2 REST gateway client. The database is reachable only through a
//! job-submission API: authenticate, submit the SQL as one job, then poll
//! the job status on a fixed interval until it finishes or the wall-clock
//! timeout elapses.

use crate::model::{EvaluationResult, MetricId};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use thiserror::Error;

const RESULTS_TABLE: &str = "QUIZ_RESULTS";
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

const CREATE_RESULTS_TABLE: &str = "CREATE TABLE QUIZ_RESULTS (\
    NAME VARCHAR(128) NOT NULL, \
    SAVED_AT TIMESTAMP NOT NULL, \
    QUESTION_INDEX INTEGER NOT NULL, \
    VERDICT VARCHAR(16), \
    SIMILARITY_PCT DOUBLE, \
    RELEVANCE_PCT DOUBLE, \
    FAITHFULNESS_PCT DOUBLE, \
    CONTEXT_RELEVANCE_PCT DOUBLE)";

#[derive(Debug, Error)]
pub enum Db2Error {
    #[error("db2 request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("db2 auth response carried no token")]
    MissingToken,
    #[error("db2 job response carried no id")]
    MissingJobId,
    #[error("no results to save")]
    EmptyResults,
}

#[derive(Debug)]
pub struct Db2Client {
    http: Client,
    base_url: String,
    deployment_id: String,
    uid: String,
    pwd: String,
    database: String,
}

impl Db2Client {
    pub fn new(
        base_url: &str,
        deployment_id: String,
        uid: String,
        pwd: String,
        database: String,
    ) -> Db2Client {
        Db2Client {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            deployment_id,
            uid,
            pwd,
            database,
        }
    }

    async fn auth(&self) -> Result<String, Db2Error> {
        let response: Value = self
            .http
            .post(format!("{}/auth/tokens", self.base_url))
            .json(&json!({"userid": self.uid, "password": self.pwd}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response["token"]
            .as_str()
            .map(str::to_string)
            .ok_or(Db2Error::MissingToken)
    }

    async fn submit_job(&self, token: &str, commands: &str) -> Result<String, Db2Error> {
        let response: Value = self
            .http
            .post(format!("{}/sql_jobs", self.base_url))
            .bearer_auth(token)
            .json(&json!({
                "commands": commands,
                "separator": ";",
                "stop_on_error": "no",
                "deployment_id": self.deployment_id,
                "database": self.database,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response["id"]
            .as_str()
            .map(str::to_string)
            .ok_or(Db2Error::MissingJobId)
    }

    async fn job_status(&self, token: &str, job_id: &str) -> Result<String, Db2Error> {
        let response: Value = self
            .http
            .get(format!("{}/sql_jobs/{job_id}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response["status"].as_str().unwrap_or("unknown").to_string())
    }

    /// Polls until the job reaches a terminal status or the timeout elapses;
    /// either way the last observed status is reported to the caller.
    async fn wait_for_job(&self, token: &str, job_id: &str) -> Result<String, Db2Error> {
        let deadline = Instant::now() + POLL_TIMEOUT;
        loop {
            let status = self.job_status(token, job_id).await?;
            if status == "completed" || status == "failed" || Instant::now() >= deadline {
                return Ok(status);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Creation is its own best-effort job: the table usually exists already
    /// and the gateway reports that as a job error we don't care about.
    async fn ensure_results_table(&self, token: &str) {
        if let Err(e) = self.submit_job(token, CREATE_RESULTS_TABLE).await {
            warn!("create table job for {RESULTS_TABLE} not accepted: {e}");
        }
    }

    /// Persists one row per result and reports (job id, final status).
    pub async fn save_results(
        &self,
        name: &str,
        results: &[EvaluationResult],
    ) -> Result<(String, String), Db2Error> {
        if results.is_empty() {
            return Err(Db2Error::EmptyResults);
        }
        let token = self.auth().await?;
        self.ensure_results_table(&token).await;

        let commands = insert_statements(name, results, Utc::now());
        debug!("submitting {} insert(s) for {name}", results.len());
        let job_id = self.submit_job(&token, &commands).await?;
        let status = self.wait_for_job(&token, &job_id).await?;
        Ok((job_id, status))
    }
}

/// Quotes a string as a SQL literal, doubling embedded single quotes.
fn sql_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn pct_literal(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v * 100.0),
        None => "NULL".to_string(),
    }
}

/// One INSERT per result row, joined by semicolons for single-job submission.
fn insert_statements(name: &str, results: &[EvaluationResult], now: DateTime<Utc>) -> String {
    let saved_at = now.format("%Y-%m-%d-%H.%M.%S");
    results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            let verdict = match result.verdict.wx_verdict {
                Some(v) => sql_literal(v.as_str()),
                None => "NULL".to_string(),
            };
            format!(
                "INSERT INTO {RESULTS_TABLE} (NAME, SAVED_AT, QUESTION_INDEX, VERDICT, \
                 SIMILARITY_PCT, RELEVANCE_PCT, FAITHFULNESS_PCT, CONTEXT_RELEVANCE_PCT) \
                 VALUES ({}, '{saved_at}', {index}, {verdict}, {}, {}, {}, {})",
                sql_literal(name),
                pct_literal(result.metrics.get(MetricId::AnswerSimilarity)),
                pct_literal(result.metrics.get(MetricId::AnswerRelevance)),
                pct_literal(result.metrics.get(MetricId::Faithfulness)),
                pct_literal(result.metrics.get(MetricId::ContextRelevance)),
            )
        })
        .collect::<Vec<_>>()
        .join(";\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MetricScores, Verdict, VerdictRecord};
    use chrono::TimeZone;

    fn result(verdict: Option<Verdict>, similarity: Option<f64>) -> EvaluationResult {
        EvaluationResult {
            metrics: MetricScores {
                answer_similarity: similarity,
                answer_relevance: Some(0.5),
                faithfulness: Some(1.0),
                context_relevance: None,
                ..MetricScores::default()
            },
            verdict: VerdictRecord {
                wx_verdict: verdict,
                wx_explanation: None,
                wx_improved_answer: None,
                wx_raw: String::new(),
            },
        }
    }

    #[test]
    fn empty_results_never_submit_a_job() {
        // errors before any request leaves the process, so the dead
        // endpoint is never contacted
        let client = Db2Client::new(
            "http://127.0.0.1:9",
            "dep".to_string(),
            "uid".to_string(),
            "pwd".to_string(),
            "db".to_string(),
        );
        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt.block_on(client.save_results("alumno", &[])).unwrap_err();
        assert!(matches!(err, Db2Error::EmptyResults));
    }

    #[test]
    fn literal_doubles_single_quotes() {
        assert_eq!(sql_literal("O'Higgins"), "'O''Higgins'");
        assert_eq!(sql_literal("plain"), "'plain'");
    }

    #[test]
    fn pct_scales_to_percentage_or_null() {
        assert_eq!(pct_literal(Some(0.825)), "82.5");
        assert_eq!(pct_literal(Some(1.0)), "100.0");
        assert_eq!(pct_literal(None), "NULL");
    }

    #[test]
    fn one_insert_per_result_in_order() {
        let now = Utc.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap();
        let results = vec![
            result(Some(Verdict::Correcta), Some(0.9)),
            result(None, None),
        ];
        let sql = insert_statements("alumno d'prueba", &results, now);
        let statements: Vec<&str> = sql.split(";\n").collect();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("'alumno d''prueba'"));
        assert!(statements[0].contains("'2026-08-26-12.00.00'"));
        assert!(statements[0].contains(", 0, 'Correcta', 90.0,"));
        assert!(statements[1].contains(", 1, NULL, NULL,"));
        // context_relevance was absent in both rows
        assert!(statements[0].ends_with("NULL)"));
    }
}
