//! Hierarchical content names
//!
//! A [`Name`] is an ordered list of opaque byte components. The URI form
//! joins components with `/` and percent-escapes every byte outside the
//! unreserved set, so `/%C1.Router/Router0` is two components, the first
//! starting with the byte `0xC1`.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NameError;

/// A single name component
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NameComponent(Vec<u8>);

impl NameComponent {
    /// Create a component from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Create a component holding a decimal number
    pub fn from_number(value: u64) -> Self {
        Self(value.to_string().into_bytes())
    }

    /// Interpret the component as a decimal number
    pub fn to_number(&self) -> Option<u64> {
        if self.0.is_empty() || !self.0.iter().all(u8::is_ascii_digit) {
            return None;
        }
        std::str::from_utf8(&self.0).ok()?.parse().ok()
    }

    /// Raw component bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse one percent-escaped URI segment
    fn parse_escaped(segment: &str) -> Result<Self, NameError> {
        let raw = segment.as_bytes();
        let mut bytes = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'%' {
                let hex = raw
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| NameError::InvalidEscape(segment.to_string()))?;
                bytes.push(hex);
                i += 3;
            } else {
                bytes.push(raw[i]);
                i += 1;
            }
        }
        Ok(Self(bytes))
    }
}

impl Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

impl From<&str> for NameComponent {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

/// A hierarchical name
///
/// Names order component-wise, so a prefix sorts before every name it
/// is a prefix of.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name(Vec<NameComponent>);

impl Name {
    /// The empty name `/`
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a name from its URI form
    ///
    /// Empty segments (from a leading, trailing or doubled `/`) are ignored.
    pub fn parse(uri: &str) -> Result<Self, NameError> {
        let uri = uri.trim();
        let uri = uri.strip_prefix("ndn:").unwrap_or(uri);
        if !uri.starts_with('/') {
            return Err(NameError::MissingLeadingSlash(uri.to_string()));
        }
        uri.split('/')
            .filter(|s| !s.is_empty())
            .map(NameComponent::parse_escaped)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Render the URI form
    pub fn to_uri(&self) -> String {
        self.to_string()
    }

    /// Append a component
    pub fn append(mut self, component: impl Into<NameComponent>) -> Self {
        self.0.push(component.into());
        self
    }

    /// Append every component of another name
    pub fn append_name(mut self, other: &Name) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    /// Append a decimal number component
    pub fn append_number(self, value: u64) -> Self {
        self.append(NameComponent::from_number(value))
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root name
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Component at `index`
    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.0.get(index)
    }

    /// Last component
    pub fn last(&self) -> Option<&NameComponent> {
        self.0.last()
    }

    /// Components in order
    pub fn components(&self) -> &[NameComponent] {
        &self.0
    }

    /// Name made of components `start..end`
    pub fn sub_name(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.0.len());
        let start = start.min(end);
        Self(self.0[start..end].to_vec())
    }

    /// Whether `self` is a prefix of (or equal to) `other`
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a == b)
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for component in &self.0 {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
