//! Authentication configuration for the authenticated crawl stage.
//!
//! Credentials live in a TOML file keyed by target URL. Each target may
//! carry a session cookie, a JWT bearer token, a raw OAuth2 header value,
//! and custom headers. When flattening to request headers the precedence is
//! fixed: cookie, then JWT, then OAuth2, then custom headers last, so custom
//! headers can override anything the structured credentials set.

use crate::errors::ConfigError;
use log::info;
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Credentials for one target URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetAuth {
    /// Raw `Cookie` header value, e.g. `session=abc123`.
    #[serde(default)]
    pub session_cookie: Option<String>,
    /// JWT sent as `Authorization: Bearer <token>`.
    #[serde(default)]
    pub jwt_token: Option<String>,
    /// Full `Authorization` header value for OAuth2 flows.
    #[serde(default)]
    pub oauth2_header: Option<String>,
    /// Arbitrary headers, applied last.
    #[serde(default)]
    pub custom_headers: BTreeMap<String, String>,
}

impl TargetAuth {
    /// Flattens the credentials into request headers, sorted by name.
    ///
    /// Applied in order cookie, JWT, OAuth2, custom: an OAuth2 value
    /// replaces a JWT `Authorization` header, and a custom header replaces
    /// anything.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = BTreeMap::new();

        if let Some(cookie) = &self.session_cookie {
            headers.insert("Cookie".to_owned(), cookie.clone());
        }
        if let Some(token) = &self.jwt_token {
            headers.insert("Authorization".to_owned(), format!("Bearer {token}"));
        }
        if let Some(value) = &self.oauth2_header {
            headers.insert("Authorization".to_owned(), value.clone());
        }
        for (name, value) in &self.custom_headers {
            headers.insert(name.clone(), value.clone());
        }

        headers.into_iter().collect()
    }

    fn is_empty(&self) -> bool {
        self.session_cookie.is_none()
            && self.jwt_token.is_none()
            && self.oauth2_header.is_none()
            && self.custom_headers.is_empty()
    }

    fn substitute_env(&mut self, path: &str) -> Result<(), ConfigError> {
        for value in self
            .session_cookie
            .iter_mut()
            .chain(self.jwt_token.iter_mut())
            .chain(self.oauth2_header.iter_mut())
            .chain(self.custom_headers.values_mut())
        {
            *value = expand_env(value, path)?;
        }
        Ok(())
    }
}

/// The whole authentication file: credentials keyed by target URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Credentials per target URL.
    #[serde(default)]
    pub targets: BTreeMap<String, TargetAuth>,
}

impl AuthConfig {
    /// Loads and validates the file at `path`. `${VAR}` references in
    /// credential values are substituted from the environment; a missing
    /// variable is a configuration error, not a runtime surprise.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let fail = |reason: String| ConfigError::AuthConfig {
            path: display.clone(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let mut config: Self = toml::from_str(&raw).map_err(|e| fail(e.to_string()))?;

        if config.targets.is_empty() {
            return Err(fail("no targets defined".to_owned()));
        }
        for (url, auth) in &mut config.targets {
            if auth.is_empty() {
                return Err(fail(format!("target `{url}` has no credentials")));
            }
            auth.substitute_env(&display)?;
        }

        info!("loaded credentials for {} targets", config.targets.len());
        Ok(config)
    }

    /// Credentials for `url`: exact match first, then the longest
    /// configured URL that `url` starts with.
    pub fn for_url(&self, url: &str) -> Option<&TargetAuth> {
        if let Some(auth) = self.targets.get(url) {
            return Some(auth);
        }
        self.targets
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, auth)| auth)
    }
}

fn expand_env(value: &str, path: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = &after[..end];
        let env = std::env::var(name).map_err(|_| ConfigError::AuthConfig {
            path: path.to_owned(),
            reason: format!("environment variable `{name}` is not set"),
        })?;
        out.push_str(&env);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, TargetAuth};
    use std::collections::BTreeMap;

    fn header(headers: &[(String, String)], name: &str) -> Option<String> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    #[test]
    fn oauth2_wins_over_jwt_for_authorization() {
        let auth = TargetAuth {
            jwt_token: Some("jwt-token".to_owned()),
            oauth2_header: Some("Bearer oauth-token".to_owned()),
            ..TargetAuth::default()
        };
        let headers = auth.headers();
        assert_eq!(
            header(&headers, "Authorization").as_deref(),
            Some("Bearer oauth-token")
        );
    }

    #[test]
    fn custom_headers_override_everything() {
        let mut custom = BTreeMap::new();
        custom.insert("Authorization".to_owned(), "Custom abc".to_owned());
        custom.insert("Cookie".to_owned(), "override=1".to_owned());

        let auth = TargetAuth {
            session_cookie: Some("session=abc".to_owned()),
            jwt_token: Some("jwt".to_owned()),
            oauth2_header: Some("Bearer oauth".to_owned()),
            custom_headers: custom,
        };
        let headers = auth.headers();
        assert_eq!(header(&headers, "Authorization").as_deref(), Some("Custom abc"));
        assert_eq!(header(&headers, "Cookie").as_deref(), Some("override=1"));
    }

    #[test]
    fn cookie_and_jwt_coexist() {
        let auth = TargetAuth {
            session_cookie: Some("session=abc".to_owned()),
            jwt_token: Some("tok".to_owned()),
            ..TargetAuth::default()
        };
        let headers = auth.headers();
        assert_eq!(header(&headers, "Cookie").as_deref(), Some("session=abc"));
        assert_eq!(header(&headers, "Authorization").as_deref(), Some("Bearer tok"));
    }

    #[test]
    fn url_lookup_prefers_exact_then_longest_prefix() {
        let mut targets = BTreeMap::new();
        targets.insert(
            "https://example.com".to_owned(),
            TargetAuth {
                jwt_token: Some("root".to_owned()),
                ..TargetAuth::default()
            },
        );
        targets.insert(
            "https://example.com/admin".to_owned(),
            TargetAuth {
                jwt_token: Some("admin".to_owned()),
                ..TargetAuth::default()
            },
        );
        let config = AuthConfig { targets };

        let admin = config.for_url("https://example.com/admin/users").unwrap();
        assert_eq!(admin.jwt_token.as_deref(), Some("admin"));
        let root = config.for_url("https://example.com/public").unwrap();
        assert_eq!(root.jwt_token.as_deref(), Some("root"));
        assert!(config.for_url("https://other.example.net").is_none());
    }

    #[test]
    fn env_substitution_expands_references() {
        std::env::set_var("SURFSCAN_TEST_TOKEN", "sekrit");
        let expanded = super::expand_env("Bearer ${SURFSCAN_TEST_TOKEN}", "test.toml").unwrap();
        assert_eq!(expanded, "Bearer sekrit");
    }

    #[test]
    fn missing_env_variable_is_an_error() {
        let result = super::expand_env("${SURFSCAN_TEST_UNSET_VAR}", "test.toml");
        assert!(result.is_err());
    }
}
