//! Slot identifiers
//!
//! Raw, user-supplied names are normalized into tokens that are safe to use
//! as file stems: ASCII letters, digits and underscores only.

use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_SLOT_ID;

/// A sanitized save slot identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct SlotId(String);

impl SlotId {
    /// The reserved slot used by quick save / quick load
    pub fn default_slot() -> Self {
        Self(DEFAULT_SLOT_ID.to_string())
    }

    /// Normalize a raw identifier
    ///
    /// Rules, in order:
    /// 1. empty input becomes `"default"` without a warning
    /// 2. every char other than an ASCII letter, digit, `_` or space is removed
    /// 3. whitespace runs collapse to a single space, edges are trimmed
    /// 4. spaces become underscores
    ///
    /// A result that is still empty (e.g. `"!!!"`) also falls back to
    /// `"default"`. Any change to the input is logged as a warning.
    pub fn sanitize(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default_slot();
        }

        let kept: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == ' ')
            .collect();
        let collapsed = kept.split_whitespace().collect::<Vec<_>>().join("_");

        let id = if collapsed.is_empty() {
            DEFAULT_SLOT_ID.to_string()
        } else {
            collapsed
        };

        if id != raw {
            log::warn!("Invalid save slot id converted: ({raw}) > ({id})");
        }

        Self(id)
    }

    /// Whether `token` is already a valid slot id (sanitizing it is a no-op)
    pub fn is_valid(token: &str) -> bool {
        !token.is_empty()
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Wrap a token that is known to be valid
    pub(crate) fn from_valid(token: &str) -> Option<Self> {
        Self::is_valid(token).then(|| Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the reserved quick-save slot
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_SLOT_ID
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::default_slot()
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SlotId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SlotId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for SlotId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::sanitize(s))
    }
}

impl From<&str> for SlotId {
    fn from(raw: &str) -> Self {
        Self::sanitize(raw)
    }
}

impl From<String> for SlotId {
    fn from(raw: String) -> Self {
        Self::sanitize(&raw)
    }
}

impl From<SlotId> for String {
    fn from(id: SlotId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(SlotId::sanitize("").as_str(), "default");
        assert!(SlotId::sanitize("").is_default());
    }

    #[test]
    fn test_strips_and_joins() {
        assert_eq!(SlotId::sanitize("Hello World!!").as_str(), "Hello_World");
        assert_eq!(SlotId::sanitize("  slot   one\t two ").as_str(), "slot_one_two");
        assert_eq!(SlotId::sanitize("../../etc/passwd").as_str(), "etcpasswd");
    }

    #[test]
    fn test_fully_stripped_falls_back() {
        assert_eq!(SlotId::sanitize("   ").as_str(), "default");
        assert_eq!(SlotId::sanitize("!!!").as_str(), "default");
        assert_eq!(SlotId::sanitize("日本語").as_str(), "default");
    }

    #[test]
    fn test_valid_tokens_untouched() {
        assert_eq!(SlotId::sanitize("save_03").as_str(), "save_03");
        assert!(SlotId::is_valid("save_03"));
        assert!(!SlotId::is_valid("save 03"));
        assert!(!SlotId::is_valid(""));
        assert!(SlotId::from_valid("a.json").is_none());
    }

    #[test]
    fn test_serde_sanitizes_on_read() {
        let id: SlotId = serde_json::from_str("\"my save\"").unwrap();
        assert_eq!(id.as_str(), "my_save");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"my_save\"");
    }

    proptest! {
        #[test]
        fn prop_sanitize_idempotent(raw in ".*") {
            let once = SlotId::sanitize(&raw);
            let twice = SlotId::sanitize(once.as_str());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_valid_input_is_identity(raw in "[A-Za-z0-9_]{1,32}") {
            let id = SlotId::sanitize(&raw);
            prop_assert_eq!(id.as_str(), raw.as_str());
        }

        #[test]
        fn prop_output_is_always_valid(raw in "\\PC{0,48}") {
            prop_assert!(SlotId::is_valid(SlotId::sanitize(&raw).as_str()));
        }
    }
}
