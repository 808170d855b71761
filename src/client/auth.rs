use yup_oauth2::ApplicationDefaultCredentialsAuthenticator;
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::authenticator::ApplicationDefaultCredentialsTypes;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use anyhow::{Result, Context};
use std::sync::Arc;
use tracing::info;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[derive(Clone)]
pub enum AuthMethod {
    ApiKey(String),
    OAuth(Arc<Authenticator<HttpsConnector<HttpConnector>>>),
}

/// Credentials for Google Cloud APIs that accept either an API key or a
/// service account (`GOOGLE_APPLICATION_CREDENTIALS`).
pub struct GoogleAuth {
    method: AuthMethod,
}

impl GoogleAuth {
    pub async fn new(api_key: Option<&str>) -> Result<Self> {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            return Ok(Self { method: AuthMethod::ApiKey(key.to_string()) });
        }

        info!("no API key configured, trying Application Default Credentials");

        let opts = yup_oauth2::ApplicationDefaultCredentialsFlowOpts::default();
        let authenticator = ApplicationDefaultCredentialsAuthenticator::builder(opts).await;

        let auth = match authenticator {
            ApplicationDefaultCredentialsTypes::InstanceMetadata(auth) => auth.build().await,
            ApplicationDefaultCredentialsTypes::ServiceAccount(auth) => auth.build().await,
        }
        .context("no API key and Application Default Credentials unavailable")?;

        info!("connected with ADC credentials");
        Ok(Self { method: AuthMethod::OAuth(Arc::new(auth)) })
    }

    pub async fn get_token(&self) -> Result<Option<String>> {
        match &self.method {
            AuthMethod::ApiKey(_) => Ok(None),
            AuthMethod::OAuth(auth) => {
                let token = auth.token(&[CLOUD_PLATFORM_SCOPE]).await
                    .context("failed to obtain OAuth token")?;
                let token_str = token.token().ok_or_else(|| anyhow::anyhow!("Empty token"))?;
                Ok(Some(token_str.to_string()))
            }
        }
    }

    pub fn get_api_key(&self) -> Option<&str> {
        match &self.method {
            AuthMethod::ApiKey(key) => Some(key),
            AuthMethod::OAuth(_) => None,
        }
    }
}
