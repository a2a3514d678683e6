//! Credential injection for forwarded requests.
//!
//! An endpoint may carry one credential scheme. At registration time the
//! scheme is turned into a [`CredentialInjector`], which is then applied to
//! every outbound request of that endpoint before it is sent.
//!
//! # Supported Schemes
//!
//! - **Static key**: fixed headers (API keys and the like)
//! - **Basic**: HTTP Basic Authentication (RFC 7617)
//! - **OAuth**: OAuth2 client-credentials grant (RFC 6749 section 4.4)

mod basic;
mod oauth;
mod static_key;

pub use basic::BasicAuthInjector;
pub use oauth::OAuthClientCredentials;
pub use static_key::StaticKeyInjector;

use crate::config::AuthConfig;
use crate::proxy::OutboundClient;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid header name '{0}'")]
    InvalidHeaderName(String),
    #[error("Invalid value for header '{0}'")]
    InvalidHeaderValue(String),
    #[error("Invalid token endpoint '{url}': {reason}")]
    InvalidTokenEndpoint { url: String, reason: String },
    #[error("Token request failed: {0}")]
    TokenRequest(#[source] reqwest::Error),
    #[error("Received status code {0} instead of 200 from the token endpoint")]
    TokenStatus(u16),
    #[error("Failed to decode token response: {0}")]
    TokenDecode(#[source] serde_json::Error),
    #[error("Unknown token type '{0}'")]
    UnknownTokenType(String),
    #[error("Access token cannot be sent as a header value")]
    InvalidAccessToken,
}

/// Adds authentication evidence to an outbound request.
///
/// Implementations only touch headers; the URL and body are left alone.
/// One instance is shared by every request of an endpoint.
#[async_trait]
pub trait CredentialInjector: Send + Sync {
    /// Scheme name used in logs
    fn scheme(&self) -> &'static str;

    async fn inject_credentials(&self, request: &mut reqwest::Request) -> Result<(), AuthError>;
}

/// Build the injector for an endpoint's credential scheme.
///
/// `client` is used for any request the injector itself has to make
/// (the OAuth token exchange).
pub fn build_injector(
    auth: &AuthConfig,
    client: &OutboundClient,
) -> Result<Arc<dyn CredentialInjector>, AuthError> {
    let injector: Arc<dyn CredentialInjector> = match auth {
        AuthConfig::Basic(basic) => {
            Arc::new(BasicAuthInjector::new(&basic.username, &basic.password))
        }
        AuthConfig::OAuth(oauth) => {
            Arc::new(OAuthClientCredentials::from_config(oauth, client.clone())?)
        }
        AuthConfig::StaticKey(headers) => Arc::new(StaticKeyInjector::new(headers)?),
    };
    Ok(injector)
}
