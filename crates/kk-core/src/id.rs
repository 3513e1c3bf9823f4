use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for key IDs. Comparisons are O(1).
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// An interned physical key identifier such as `l-f-1-1`.
///
/// Key IDs are compared constantly while reconciling the keyboard view
/// (active key, related keys, indicator targets), so they are interned once
/// and passed around as a 4-byte `Copy` handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(Spur);

impl KeyId {
    /// Intern a string as a KeyId, or return the existing handle.
    pub fn intern(s: &str) -> Self {
        KeyId(INTERNER.get_or_intern(s))
    }

    /// Look up a KeyId without interning. `None` means no key with this ID
    /// has ever been created, so it cannot exist in any layout.
    pub fn lookup(s: &str) -> Option<Self> {
        INTERNER.get(s).map(KeyId)
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }
}

impl Ord for KeyId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for KeyId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for KeyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(KeyId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = KeyId::intern("l-f-1-1");
        let b = KeyId::intern("l-f-1-1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "l-f-1-1");
        assert_eq!(a.to_string(), "l-f-1-1");
    }

    #[test]
    fn lookup_does_not_intern() {
        assert!(KeyId::lookup("never-interned-key-zz-9").is_none());
        let k = KeyId::intern("r-t-2-2");
        assert_eq!(KeyId::lookup("r-t-2-2"), Some(k));
    }

    #[test]
    fn ordering_is_lexical() {
        let mut ids = vec![KeyId::intern("b-1-1"), KeyId::intern("a-1-1")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a-1-1");
    }
}
