//! Login token extraction strategies.
//!
//! The login endpoint has returned its token in several envelope shapes over
//! time. Strategies are tried in priority order; the first one yielding a
//! non-empty token wins.

use serde_json::Value;

use caddis_shared::{Result, SyncError};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Locates a bearer token inside a login response body.
pub trait TokenStrategy: Send + Sync {
    /// Return the token if this strategy's shape matches.
    fn extract(&self, response: &Value) -> Option<String>;

    /// Human-readable strategy name for tracing.
    fn name(&self) -> &str;
}

/// Token stored under a fixed chain of object keys, e.g. `body.token`.
#[derive(Debug, Clone)]
pub struct FieldPath {
    name: &'static str,
    path: &'static [&'static str],
}

impl FieldPath {
    pub const fn new(name: &'static str, path: &'static [&'static str]) -> Self {
        Self { name, path }
    }
}

impl TokenStrategy for FieldPath {
    fn extract(&self, response: &Value) -> Option<String> {
        let leaf = self
            .path
            .iter()
            .try_fold(response, |node, key| node.as_object()?.get(*key))?;
        leaf.as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
    }

    fn name(&self) -> &str {
        self.name
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered set of token strategies.
pub struct TokenExtractor {
    strategies: Vec<Box<dyn TokenStrategy>>,
}

impl TokenExtractor {
    /// The known login envelope shapes, most common first.
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(FieldPath::new("token", &["token"])),
                Box::new(FieldPath::new("access_token", &["access_token"])),
                Box::new(FieldPath::new("body.token", &["body", "token"])),
                Box::new(FieldPath::new("body.access_token", &["body", "access_token"])),
            ],
        }
    }

    /// Run the strategies in order and return the first token found.
    pub fn extract(&self, response: &Value) -> Result<String> {
        for strategy in &self.strategies {
            if let Some(token) = strategy.extract(response) {
                tracing::debug!(strategy = strategy.name(), "login token located");
                return Ok(token);
            }
        }

        let keys = response
            .as_object()
            .map(|o| o.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_else(|| "<not an object>".into());
        Err(SyncError::Authentication(format!(
            "could not find token in login response (top-level keys: {keys})"
        )))
    }
}

impl Default for TokenExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn each_known_shape_is_found() {
        let extractor = TokenExtractor::new();
        for response in [
            json!({"token": "t1"}),
            json!({"access_token": "t1"}),
            json!({"body": {"token": "t1"}}),
            json!({"body": {"access_token": "t1"}}),
        ] {
            assert_eq!(extractor.extract(&response).unwrap(), "t1", "{response}");
        }
    }

    #[test]
    fn earlier_strategy_wins() {
        let response = json!({"access_token": "outer", "body": {"token": "inner"}});
        assert_eq!(TokenExtractor::new().extract(&response).unwrap(), "outer");
    }

    #[test]
    fn empty_or_non_string_tokens_fall_through() {
        let response = json!({"token": "", "access_token": 12, "body": {"token": "nested"}});
        assert_eq!(TokenExtractor::new().extract(&response).unwrap(), "nested");
    }

    #[test]
    fn missing_token_is_authentication_error() {
        let err = TokenExtractor::new()
            .extract(&json!({"status": "ok", "body": {"user": "x"}}))
            .unwrap_err();
        assert!(matches!(err, SyncError::Authentication(_)));
        assert!(err.to_string().contains("body"));
    }
}
