mod db2;
mod exercise;
mod governance;
mod iam;
mod model;
mod routes;
mod watsonx;

use crate::db2::Db2Client;
use crate::governance::GovernanceClient;
use crate::iam::IamTokenProvider;
use crate::watsonx::WatsonxClient;
use env_logger::Env;
use log::{error, info, warn};
use serde::Deserialize;
use std::process::exit;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_redoc::Redoc;
use utoipa_redoc::Servable;

fn get_default_port() -> u16 {
    8080
}

fn get_default_model() -> String {
    "ibm/granite-3-8b-instruct".to_string()
}

fn get_default_delay_ms() -> u64 {
    600
}

/// All credential-ish settings are optional: the service starts without
/// them and the affected pipeline degrades instead of failing requests.
#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "get_default_port")]
    port: u16,
    wxa_url: Option<String>,
    wxa_project_id: Option<String>,
    #[serde(default = "get_default_model")]
    wxa_model: String,
    watsonx_apikey: Option<String>,
    #[serde(default = "get_default_delay_ms")]
    pub wxa_delay_ms: u64,
    wxg_url: Option<String>,
    db2_rest_base: Option<String>,
    db2_deployment_id: Option<String>,
    db2_uid: Option<String>,
    db2_pwd: Option<String>,
    db2_db: Option<String>,
    #[serde(default)]
    log_raw_gov: bool,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub governance: Option<Arc<GovernanceClient>>,
    pub watsonx: Option<Arc<WatsonxClient>>,
    pub db2: Option<Arc<Db2Client>>,
}

impl AppState {
    fn from_config(config: Config) -> AppState {
        let iam = config
            .watsonx_apikey
            .clone()
            .map(|apikey| Arc::new(IamTokenProvider::new(apikey)));

        let governance = match (&config.wxg_url, &iam) {
            (Some(url), Some(iam)) => Some(Arc::new(GovernanceClient::new(
                url,
                iam.clone(),
                config.log_raw_gov,
            ))),
            _ => {
                warn!("governance metrics disabled (set WXG_URL and WATSONX_APIKEY)");
                None
            }
        };

        let watsonx = match (&config.wxa_url, &config.wxa_project_id, &iam) {
            (Some(url), Some(project_id), Some(iam)) => Some(Arc::new(WatsonxClient::new(
                url,
                project_id.clone(),
                config.wxa_model.clone(),
                iam.clone(),
            ))),
            _ => {
                warn!("watsonx.ai disabled (set WXA_URL, WXA_PROJECT_ID and WATSONX_APIKEY)");
                None
            }
        };

        let db2 = match (
            &config.db2_rest_base,
            &config.db2_deployment_id,
            &config.db2_uid,
            &config.db2_pwd,
            &config.db2_db,
        ) {
            (Some(base), Some(deployment_id), Some(uid), Some(pwd), Some(db)) => {
                Some(Arc::new(Db2Client::new(
                    base,
                    deployment_id.clone(),
                    uid.clone(),
                    pwd.clone(),
                    db.clone(),
                )))
            }
            _ => {
                warn!("result persistence disabled (set the DB2_* variables)");
                None
            }
        };

        AppState {
            config: Arc::new(config),
            governance,
            watsonx,
            db2,
        }
    }
}

#[derive(OpenApi)]
#[openapi(info(description = "API for grading quiz answers with governance metrics"))]
struct ApiDoc;

async fn run() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let config = envy::from_env::<Config>()?;

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(routes::health))
        .routes(routes!(routes::evaluate))
        .routes(routes!(routes::default_exercise))
        .routes(routes!(routes::governance_score))
        .routes(routes!(routes::save_results))
        .split_for_parts();

    let port = config.port;
    info!("Starting on port {}", port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    axum::serve(
        listener,
        router
            .merge(Redoc::with_url("/redoc", api))
            .with_state(AppState::from_config(config)),
    )
    .await?;

    Ok(())
}

fn main() {
    let rt = tokio::runtime::Runtime::new().unwrap();

    if let Err(err) = rt.block_on(run()) {
        error!("{}", err);
        exit(1)
    }
}
