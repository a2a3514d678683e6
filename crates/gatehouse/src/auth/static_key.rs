//! Static header injection (API keys and similar fixed credentials).

use super::{AuthError, CredentialInjector};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// Sets a fixed list of headers on every request.
///
/// Names and values are validated up front, so injection cannot fail.
pub struct StaticKeyInjector {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl StaticKeyInjector {
    pub fn new<I, K, V>(headers: I) -> Result<Self, AuthError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let headers = headers
            .into_iter()
            .map(|(name, value)| {
                let name = name.as_ref();
                let header_name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| AuthError::InvalidHeaderName(name.to_string()))?;
                let mut header_value = HeaderValue::from_str(value.as_ref())
                    .map_err(|_| AuthError::InvalidHeaderValue(name.to_string()))?;
                header_value.set_sensitive(true);
                Ok((header_name, header_value))
            })
            .collect::<Result<Vec<_>, AuthError>>()?;

        Ok(Self { headers })
    }
}

#[async_trait]
impl CredentialInjector for StaticKeyInjector {
    fn scheme(&self) -> &'static str {
        "static_key"
    }

    async fn inject_credentials(&self, request: &mut reqwest::Request) -> Result<(), AuthError> {
        let headers = request.headers_mut();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn request() -> reqwest::Request {
        reqwest::Client::new()
            .get("http://upstream.invalid/resource")
            .header("x-api-key", "caller-supplied")
            .body("payload")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sets_every_header() {
        let injector = StaticKeyInjector::new(BTreeMap::from([
            ("x-api-key", "secret"),
            ("x-tenant", "acme"),
        ]))
        .unwrap();

        let mut req = request();
        injector.inject_credentials(&mut req).await.unwrap();

        assert_eq!(req.headers()["x-api-key"], "secret");
        assert_eq!(req.headers()["x-tenant"], "acme");
        assert_eq!(req.headers().get_all("x-api-key").iter().count(), 1);
    }

    #[tokio::test]
    async fn test_leaves_url_and_body_alone() {
        let injector = StaticKeyInjector::new([("x-api-key", "secret")]).unwrap();

        let mut req = request();
        injector.inject_credentials(&mut req).await.unwrap();

        assert_eq!(req.url().as_str(), "http://upstream.invalid/resource");
        assert_eq!(
            req.body().and_then(|b| b.as_bytes()),
            Some(b"payload".as_slice())
        );
    }

    #[test]
    fn test_invalid_value_names_the_header() {
        let err = StaticKeyInjector::new([("x-api-key", "line\nbreak")])
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::InvalidHeaderValue(ref h) if h == "x-api-key"));
    }
}
