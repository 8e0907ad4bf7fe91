//! Parsing of the configured auth cookie into a session cookie.

use std::fmt;

/// A single `name=value` pair installed into the transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    /// Parse the leading `name=value` segment of a raw cookie string.
    ///
    /// Attributes after the first `;` (`Path`, `HttpOnly`, ...) are ignored.
    /// Returns `None` when the segment has no `=`; a malformed cookie is
    /// still valid configuration, it just contributes nothing to the session.
    pub fn parse(raw: &str) -> Option<Self> {
        let segment = raw.split(';').next().unwrap_or_default().trim();
        let (name, value) = segment.split_once('=')?;
        Some(Self {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
        })
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}
