//! Qualified XML names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A namespace-qualified name.
///
/// The prefix is only a serialization hint: two names are equal when their
/// namespace URI and local part are equal, whatever prefix they carry.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QName {
    namespace: String,
    local: String,
    prefix: Option<String>,
}

impl QName {
    /// Create a name in the given namespace (empty string for no namespace).
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
            prefix: None,
        }
    }

    /// Create a name without a namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(String::new(), local)
    }

    /// Attach a preferred prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_part(&self) -> &str {
        &self.local
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn has_namespace(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// `prefix:local`, or just `local` when no prefix hint is set.
    pub fn qualified(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// Error returned when a Clark-notation string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QNameParseError(pub String);

impl fmt::Display for QNameParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid qualified name '{}'", self.0)
    }
}

impl std::error::Error for QNameParseError {}

impl FromStr for QName {
    type Err = QNameParseError;

    /// Parse `{namespace}local`, `{}local` or a bare `local`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(QNameParseError(s.to_string()));
        }
        if let Some(rest) = s.strip_prefix('{') {
            let (namespace, local) = rest
                .split_once('}')
                .ok_or_else(|| QNameParseError(s.to_string()))?;
            if local.is_empty() || local.contains(['{', '}', ':']) {
                return Err(QNameParseError(s.to_string()));
            }
            return Ok(QName::new(namespace, local));
        }
        if s.contains(['{', '}']) {
            return Err(QNameParseError(s.to_string()));
        }
        Ok(QName::local(s))
    }
}

impl TryFrom<String> for QName {
    type Error = QNameParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QName> for String {
    fn from(name: QName) -> Self {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_ignores_prefix() {
        let a = QName::new("urn:a", "Echo").with_prefix("a");
        let b = QName::new("urn:a", "Echo").with_prefix("b");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_clark_notation() {
        let name: QName = "{urn:example}echo".parse().unwrap();
        assert_eq!(name.namespace(), "urn:example");
        assert_eq!(name.local_part(), "echo");
        assert_eq!(name.to_string(), "{urn:example}echo");

        let bare: QName = "echo".parse().unwrap();
        assert!(!bare.has_namespace());
        assert_eq!(bare.to_string(), "echo");

        let empty_ns: QName = "{}echo".parse().unwrap();
        assert_eq!(empty_ns, bare);
    }

    #[test]
    fn test_invalid_clark_notation() {
        assert!("".parse::<QName>().is_err());
        assert!("{urn:x".parse::<QName>().is_err());
        assert!("{urn:x}".parse::<QName>().is_err());
        assert!("a}b".parse::<QName>().is_err());
    }

    #[test]
    fn test_qualified() {
        let name = QName::new("urn:x", "Body").with_prefix("soap");
        assert_eq!(name.qualified(), "soap:Body");
        assert_eq!(QName::new("urn:x", "Body").qualified(), "Body");
    }
}
