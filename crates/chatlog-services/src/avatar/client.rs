use super::AvatarSelection;
use crate::error::AvatarError;
use crate::settings::SettingsPatch;
use log::{debug, info};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Avatar returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarResponse {
    /// Rendered avatar image.
    #[serde(rename = "default")]
    pub image: String,
    /// Option ids the avatar was generated from.
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
}

impl AvatarResponse {
    /// Settings patch storing this avatar and its configuration.
    pub fn into_settings_patch(self) -> SettingsPatch {
        SettingsPatch {
            avatar: Some(self.image),
            avatar_configuration: Some(self.configuration),
            ..SettingsPatch::default()
        }
    }
}

/// HTTP client for the avatar service.
#[derive(Debug, Clone)]
pub struct AvatarClient {
    http: Client,
    base_url: String,
}

impl AvatarClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AvatarError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Use a preconfigured `reqwest` client.
    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a randomly configured avatar.
    pub async fn random_avatar(&self) -> Result<AvatarResponse, AvatarError> {
        let url = format!("{}/api/v1/avatar/", self.base_url);
        debug!("requesting random avatar (url={url})");
        let response = self.http.get(&url).send().await?;
        let avatar = decode(response).await?;
        info!(
            "random avatar received (options={})",
            avatar.configuration.len()
        );
        Ok(avatar)
    }

    /// Render an avatar from explicit option ids.
    pub async fn configure_avatar(
        &self,
        selection: &AvatarSelection,
    ) -> Result<AvatarResponse, AvatarError> {
        let url = format!("{}/api/v1/avatar/configure", self.base_url);
        debug!("requesting configured avatar (url={url})");
        let response = self.http.post(&url).json(selection).send().await?;
        decode(response).await
    }
}

async fn decode(response: Response) -> Result<AvatarResponse, AvatarError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AvatarError::Server {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json::<AvatarResponse>().await?)
}
