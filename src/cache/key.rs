//! Cache key composition
//!
//! A wire key is a resource identifier optionally followed by one freshness
//! token in double braces:
//!
//! ```text
//! http://mirror.example.org/current/x86_64-repodata{{1700000000}}
//! └──────────────── resource_id ──────────────────┘  └─ token ─┘
//! ```
//!
//! Keys that differ only in their token are distinct cache entries, so a new
//! token is an implicit invalidation. The loader only ever sees `resource_id`.

use crate::common::utils::validate_key;
use crate::common::Result;
use std::fmt;

const TOKEN_OPEN: &str = "{{";
const TOKEN_CLOSE: &str = "}}";

/// Structured form of a wire key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource_id: String,
    pub freshness_token: Option<String>,
}

impl CacheKey {
    /// Key for a resource without a freshness token
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            freshness_token: None,
        }
    }

    /// Attach a freshness token. Only ASCII digits are accepted.
    pub fn with_token(mut self, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if !is_token(&token) {
            return Err(crate::Error::InvalidKey(format!(
                "freshness token must be digits, got {:?}",
                token
            )));
        }
        self.freshness_token = Some(token);
        Ok(self)
    }

    /// Convenience for numeric tokens such as a unix timestamp bucket
    pub fn with_epoch(self, epoch: u64) -> Self {
        Self {
            freshness_token: Some(epoch.to_string()),
            ..self
        }
    }

    /// Render the wire key
    pub fn to_wire(&self) -> String {
        match &self.freshness_token {
            Some(token) => format!("{}{}{}{}", self.resource_id, TOKEN_OPEN, token, TOKEN_CLOSE),
            None => self.resource_id.clone(),
        }
    }

    /// Parse a wire key.
    ///
    /// Every `{{digits}}` group is removed from the resource id, the same as
    /// a replace-all of `{{\d*}}`, so `R{{}}` and `R{{1}}{{2}}` both load
    /// `R`. The last non-empty group becomes the token. Non-digit or
    /// unterminated braces stay in the resource id verbatim, and a key that
    /// would lose its whole resource id is kept as it is.
    pub fn parse(wire: &str) -> Result<Self> {
        validate_key(wire)?;

        let mut resource_id = String::with_capacity(wire.len());
        let mut freshness_token = None;
        let mut rest = wire;
        while let Some(open) = rest.find(TOKEN_OPEN) {
            let after = &rest[open + TOKEN_OPEN.len()..];
            let digits = after.bytes().take_while(u8::is_ascii_digit).count();
            if after[digits..].starts_with(TOKEN_CLOSE) {
                resource_id.push_str(&rest[..open]);
                if digits > 0 {
                    freshness_token = Some(after[..digits].to_string());
                }
                rest = &after[digits + TOKEN_CLOSE.len()..];
            } else {
                // `{` is one byte, so this stays on a char boundary
                resource_id.push_str(&rest[..open + 1]);
                rest = &rest[open + 1..];
            }
        }
        resource_id.push_str(rest);

        if resource_id.is_empty() {
            return Ok(Self::new(wire));
        }
        Ok(Self {
            resource_id,
            freshness_token,
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

fn is_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}
