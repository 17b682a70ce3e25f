//! Platform API client
//!
//! Authenticates against the platform's UAA with the password grant and
//! describes applications through the v2 apps endpoint.
//!
//! ## API Reference
//!
//! - `GET {api}/v2/info` -> `token_endpoint`
//! - `POST {token_endpoint}/oauth/token` (grant_type=password, client_id=cf)
//! - `GET {api}/v2/apps/{guid}?inline-relations-depth=2`

use crate::config::Config;
use crate::resolver::{AppInfo, AppLookup, LookupError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned status {status}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("response from {0} is missing required fields")]
    Incomplete(String),
}

/// Credentials and endpoint needed to (re)build a [`PlatformClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_address: String,
    pub username: String,
    pub password: String,
    pub skip_ssl_validation: bool,
}

impl From<&Config> for ClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            api_address: config.api_address.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            skip_ssl_validation: config.skip_ssl_validation,
        }
    }
}

/// An authenticated platform client
///
/// Immutable once built. A fresh token means a fresh client, which is
/// published through [`super::SharedClient`].
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    api_address: String,
    access_token: String,
}

#[derive(Deserialize)]
struct InfoResponse {
    token_endpoint: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Resource<T> {
    #[serde(default)]
    metadata: Metadata,
    entity: T,
}

#[derive(Deserialize, Default)]
struct Metadata {
    #[serde(default)]
    guid: String,
}

#[derive(Deserialize)]
struct AppEntity {
    name: String,
    space: Option<Resource<SpaceEntity>>,
}

#[derive(Deserialize)]
struct SpaceEntity {
    name: String,
    organization: Option<Resource<OrgEntity>>,
}

#[derive(Deserialize)]
struct OrgEntity {
    name: String,
}

impl PlatformClient {
    /// Log in and return a client carrying a fresh access token
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.skip_ssl_validation)
            .build()?;

        let info_url = format!("{}/v2/info", config.api_address);
        let response = http.get(&info_url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                endpoint: info_url,
                status: response.status(),
            });
        }
        let info: InfoResponse = response.json().await?;

        let token_url = format!("{}/oauth/token", info.token_endpoint.trim_end_matches('/'));
        let response = http
            .post(&token_url)
            .basic_auth("cf", Some(""))
            .form(&[
                ("grant_type", "password"),
                ("username", config.username.as_str()),
                ("password", config.password.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                endpoint: token_url,
                status: response.status(),
            });
        }
        let token: TokenResponse = response.json().await?;

        Ok(Self {
            http,
            api_address: config.api_address.clone(),
            access_token: token.access_token,
        })
    }

    /// Fetch an app together with its space and org
    pub async fn get_app(&self, app_id: &str) -> Result<AppInfo, ClientError> {
        let url = format!(
            "{}/v2/apps/{}?inline-relations-depth=2",
            self.api_address, app_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                endpoint: url,
                status: response.status(),
            });
        }

        let app: Resource<AppEntity> = response.json().await?;
        app_info_from_resource(app).ok_or(ClientError::Incomplete(url))
    }
}

fn app_info_from_resource(app: Resource<AppEntity>) -> Option<AppInfo> {
    let space = app.entity.space?;
    let org = space.entity.organization?;
    Some(AppInfo {
        app_name: app.entity.name,
        space_name: space.entity.name,
        space_id: space.metadata.guid,
        org_name: org.entity.name,
        org_id: org.metadata.guid,
    })
}

#[async_trait]
impl AppLookup for PlatformClient {
    async fn lookup_app(&self, app_id: &str) -> Result<AppInfo, LookupError> {
        Ok(self.get_app(app_id).await?)
    }
}
