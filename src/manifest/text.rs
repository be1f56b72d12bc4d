use std::borrow::Cow;
use std::fmt;

/// A manifest string field as raw bytes.
///
/// Member names come from file paths and callers, neither of which is
/// guaranteed to be valid UTF-8. The bytes are kept as given and checked
/// only when the manifest is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RawText(Vec<u8>);

impl RawText {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The text as `&str`, or `None` if it is not valid UTF-8
    #[must_use]
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    #[must_use]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl fmt::Display for RawText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl From<&str> for RawText {
    fn from(s: &str) -> Self {
        RawText(s.as_bytes().to_vec())
    }
}

impl From<String> for RawText {
    fn from(s: String) -> Self {
        RawText(s.into_bytes())
    }
}

impl From<&String> for RawText {
    fn from(s: &String) -> Self {
        RawText(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for RawText {
    fn from(b: &[u8]) -> Self {
        RawText(b.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for RawText {
    fn from(b: &[u8; N]) -> Self {
        RawText(b.to_vec())
    }
}

impl From<Vec<u8>> for RawText {
    fn from(b: Vec<u8>) -> Self {
        RawText(b)
    }
}

impl From<crate::metadata::MetadataType> for RawText {
    fn from(kind: crate::metadata::MetadataType) -> Self {
        RawText::from(kind.name())
    }
}

impl PartialEq<str> for RawText {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for RawText {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}
