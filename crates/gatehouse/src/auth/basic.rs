//! HTTP Basic Authentication injection (RFC 7617)
//!
//! ```text
//! Authorization: Basic <base64(username:password)>
//! ```

use super::{AuthError, CredentialInjector};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderValue, AUTHORIZATION};

pub struct BasicAuthInjector {
    username: String,
    authorization: HeaderValue,
}

impl BasicAuthInjector {
    pub fn new(username: &str, password: &str) -> Self {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        // base64 output is always a valid header value
        let mut authorization = HeaderValue::try_from(format!("Basic {encoded}"))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
        authorization.set_sensitive(true);

        Self {
            username: username.to_string(),
            authorization,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

#[async_trait]
impl CredentialInjector for BasicAuthInjector {
    fn scheme(&self) -> &'static str {
        "basic_auth"
    }

    async fn inject_credentials(&self, request: &mut reqwest::Request) -> Result<(), AuthError> {
        request
            .headers_mut()
            .insert(AUTHORIZATION, self.authorization.clone());
        Ok(())
    }
}
