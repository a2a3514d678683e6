//! Endpoint configuration: one local route and the upstream it forwards to.

use hyper::Method;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::http::HttpConfig;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Endpoint {
    pub local_path: String,
    pub local_method: String,
    /// Absolute URL of the upstream
    #[serde(alias = "target_path")]
    pub remote_path: String,
    pub remote_method: String,

    // Credentials: at most one of the three may be set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuthConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthConfig>,
    /// Header name -> value pairs set verbatim on every forwarded request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_key: Option<BTreeMap<String, String>>,

    /// Transport overrides for this endpoint only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

/// OAuth2 client-credentials grant (RFC 6749 section 4.4)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_endpoint: String,
    /// Additional form fields sent to the token endpoint (scope, audience, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_form_values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthConfig {
    Basic(BasicAuthConfig),
    OAuth(OAuthConfig),
    StaticKey(BTreeMap<String, String>),
}

impl AuthConfig {
    pub fn scheme(&self) -> &'static str {
        match self {
            AuthConfig::Basic(_) => "basic_auth",
            AuthConfig::OAuth(_) => "oauth",
            AuthConfig::StaticKey(_) => "static_key",
        }
    }
}

/// An endpoint whose fields have been parsed and checked.
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint<'a> {
    pub local_path: &'a str,
    pub local_method: Method,
    pub remote_url: Url,
    pub remote_method: Method,
    pub auth: Option<AuthConfig>,
    pub http: Option<&'a HttpConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Local path '{0}' must start with '/'")]
    InvalidLocalPath(String),
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("Invalid remote URL '{url}': {reason}")]
    InvalidRemoteUrl { url: String, reason: String },
    #[error("Endpoint {method} {path} configures more than one credential scheme: {}", .schemes.join(", "))]
    AmbiguousAuth {
        path: String,
        method: String,
        schemes: Vec<&'static str>,
    },
}

impl Endpoint {
    /// Parse methods and URL and pick the credential scheme.
    pub fn resolve(&self) -> Result<ResolvedEndpoint<'_>, EndpointError> {
        if !self.local_path.starts_with('/') {
            return Err(EndpointError::InvalidLocalPath(self.local_path.clone()));
        }

        let local_method = parse_method(&self.local_method)?;
        let remote_method = parse_method(&self.remote_method)?;
        let remote_url = parse_remote_url(&self.remote_path)?;

        Ok(ResolvedEndpoint {
            local_path: &self.local_path,
            local_method,
            remote_url,
            remote_method,
            auth: self.auth()?,
            http: self.http.as_ref(),
        })
    }

    /// The configured credential scheme, if any.
    pub fn auth(&self) -> Result<Option<AuthConfig>, EndpointError> {
        let mut configured = Vec::new();
        if let Some(ref basic) = self.basic_auth {
            configured.push(AuthConfig::Basic(basic.clone()));
        }
        if let Some(ref oauth) = self.oauth {
            configured.push(AuthConfig::OAuth(oauth.clone()));
        }
        if let Some(ref headers) = self.static_key {
            configured.push(AuthConfig::StaticKey(headers.clone()));
        }

        if configured.len() > 1 {
            return Err(EndpointError::AmbiguousAuth {
                path: self.local_path.clone(),
                method: self.local_method.clone(),
                schemes: configured.iter().map(AuthConfig::scheme).collect(),
            });
        }
        Ok(configured.pop())
    }
}

/// Methods are case-insensitive in config and always upper case on the wire.
pub fn parse_method(method: &str) -> Result<Method, EndpointError> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| EndpointError::InvalidMethod(method.to_string()))
}

fn parse_remote_url(raw: &str) -> Result<Url, EndpointError> {
    let invalid = |reason: String| EndpointError::InvalidRemoteUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(yaml: &str) -> Endpoint {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_resolve_plain_endpoint() {
        let e = endpoint(
            r#"
local_path: /users
local_method: get
remote_path: https://api.example.com/v1/users
remote_method: post
"#,
        );
        let resolved = e.resolve().unwrap();
        assert_eq!(resolved.local_path, "/users");
        assert_eq!(resolved.local_method, Method::GET);
        assert_eq!(resolved.remote_method, Method::POST);
        assert_eq!(resolved.remote_url.as_str(), "https://api.example.com/v1/users");
        assert!(resolved.auth.is_none());
        assert!(resolved.http.is_none());
    }

    #[test]
    fn test_target_path_alias() {
        let e = endpoint(
            r#"
local_path: /a
local_method: GET
target_path: http://upstream:9000/a
remote_method: GET
"#,
        );
        assert_eq!(e.remote_path, "http://upstream:9000/a");
    }

    #[test]
    fn test_static_key_auth() {
        let e = endpoint(
            r#"
local_path: /a
local_method: GET
remote_path: http://upstream/a
remote_method: GET
static_key:
  x-api-key: secret
"#,
        );
        match e.auth().unwrap() {
            Some(AuthConfig::StaticKey(headers)) => {
                assert_eq!(headers.get("x-api-key").map(String::as_str), Some("secret"));
            }
            other => panic!("unexpected auth: {other:?}"),
        }
    }

    #[test]
    fn test_oauth_extra_form_values_default_empty() {
        let e = endpoint(
            r#"
local_path: /a
local_method: GET
remote_path: http://upstream/a
remote_method: GET
oauth:
  client_id: id
  client_secret: secret
  token_endpoint: http://auth/token
"#,
        );
        match e.auth().unwrap() {
            Some(AuthConfig::OAuth(oauth)) => assert!(oauth.extra_form_values.is_empty()),
            other => panic!("unexpected auth: {other:?}"),
        }
    }

    #[test]
    fn test_ambiguous_auth_rejected() {
        let e = endpoint(
            r#"
local_path: /a
local_method: GET
remote_path: http://upstream/a
remote_method: GET
basic_auth:
  username: u
  password: p
static_key:
  x-api-key: secret
"#,
        );
        match e.resolve() {
            Err(EndpointError::AmbiguousAuth { schemes, .. }) => {
                assert_eq!(schemes, vec!["basic_auth", "static_key"]);
            }
            other => panic!("expected ambiguous auth, got {other:?}"),
        }
    }

    #[test]
    fn test_relative_local_path_rejected() {
        let e = endpoint(
            r#"
local_path: users
local_method: GET
remote_path: http://upstream/a
remote_method: GET
"#,
        );
        assert!(matches!(
            e.resolve(),
            Err(EndpointError::InvalidLocalPath(_))
        ));
    }

    #[test]
    fn test_invalid_remote_url_rejected() {
        for url in ["/relative", "ftp://files.example.com/x", "not a url"] {
            let e = Endpoint {
                local_path: "/a".to_string(),
                local_method: "GET".to_string(),
                remote_path: url.to_string(),
                remote_method: "GET".to_string(),
                basic_auth: None,
                oauth: None,
                static_key: None,
                http: None,
            };
            assert!(
                matches!(e.resolve(), Err(EndpointError::InvalidRemoteUrl { .. })),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_method_rejected() {
        assert!(parse_method("GE T").is_err());
        assert!(parse_method("").is_err());
        assert_eq!(parse_method(" delete ").unwrap(), Method::DELETE);
    }
}
