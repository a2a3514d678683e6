//! OAuth2 client-credentials injection.
//!
//! Implements the machine-to-machine flow of RFC 6749 section 4.4: the
//! gateway authenticates to the token endpoint with its client id and secret
//! and forwards the call with the bearer token it receives. A token is
//! requested for every forwarded call; nothing is cached.

use super::{AuthError, CredentialInjector};
use crate::config::OAuthConfig;
use crate::proxy::OutboundClient;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: String,
}

pub struct OAuthClientCredentials {
    client_id: String,
    client_secret: String,
    token_endpoint: Url,
    extra_form_values: BTreeMap<String, String>,
    client: OutboundClient,
}

impl OAuthClientCredentials {
    pub fn new(
        token_endpoint: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        extra_form_values: BTreeMap<String, String>,
        client: OutboundClient,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_endpoint,
            extra_form_values,
            client,
        }
    }

    pub fn from_config(config: &OAuthConfig, client: OutboundClient) -> Result<Self, AuthError> {
        let token_endpoint =
            Url::parse(&config.token_endpoint).map_err(|e| AuthError::InvalidTokenEndpoint {
                url: config.token_endpoint.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self::new(
            token_endpoint,
            config.client_id.as_str(),
            config.client_secret.as_str(),
            config.extra_form_values.clone(),
            client,
        ))
    }

    /// Form sent to the token endpoint. Extra values win over the defaults.
    fn token_form(&self) -> BTreeMap<&str, &str> {
        let mut form = BTreeMap::from([
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
        ]);
        for (key, value) in &self.extra_form_values {
            form.insert(key.as_str(), value.as_str());
        }
        form
    }

    async fn fetch_token(&self) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .http()
            .post(self.token_endpoint.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&self.token_form())
            .send()
            .await
            .map_err(AuthError::TokenRequest)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::TokenStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(AuthError::TokenRequest)?;
        serde_json::from_slice(&body).map_err(AuthError::TokenDecode)
    }
}

#[async_trait]
impl CredentialInjector for OAuthClientCredentials {
    fn scheme(&self) -> &'static str {
        "oauth"
    }

    async fn inject_credentials(&self, request: &mut reqwest::Request) -> Result<(), AuthError> {
        let token = self.fetch_token().await?;

        if token.token_type != "Bearer" {
            return Err(AuthError::UnknownTokenType(token.token_type));
        }

        let mut value = HeaderValue::try_from(format!("Bearer {}", token.access_token))
            .map_err(|_| AuthError::InvalidAccessToken)?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);

        debug!(
            "Obtained bearer token from {} (scope: {})",
            self.token_endpoint,
            token.scope.as_deref().unwrap_or("-")
        );
        Ok(())
    }
}
