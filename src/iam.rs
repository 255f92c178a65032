//! IBM Cloud IAM token exchange. Both the governance metrics service and
//! the watsonx.ai generation endpoint authenticate with a bearer token
//! obtained from the same API key.

use log::debug;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";
const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct IamTokenProvider {
    http: Client,
    token_url: String,
    apikey: String,
    cached: Mutex<Option<CachedToken>>,
}

impl IamTokenProvider {
    pub fn new(apikey: String) -> IamTokenProvider {
        IamTokenProvider {
            http: Client::new(),
            token_url: IAM_TOKEN_URL.to_string(),
            apikey,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, exchanging the API key only when the
    /// cached one is missing or close to expiry.
    pub async fn token(&self) -> Result<String, anyhow::Error> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.expires_at {
                return Ok(entry.token.clone());
            }
        }

        debug!("exchanging IAM api key for a bearer token");
        let response: TokenResponse = self
            .http
            .post(&self.token_url)
            .form(&[("grant_type", IAM_GRANT_TYPE), ("apikey", self.apikey.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let expires_at = Instant::now()
            + Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        let token = response.access_token.clone();
        *cached = Some(CachedToken {
            token: response.access_token,
            expires_at,
        });
        Ok(token)
    }
}
