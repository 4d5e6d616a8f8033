use crate::error::{RangeError, Result};

/// Attribute marking a real Node or Edge that must survive simplification.
pub const KEEP: &str = ".Keep";

/// Value of a named attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(Vec<i64>),
    Real(Vec<f64>),
    String(String),
}

impl AttrValue {
    /// Numeric type code used by the persisted format.
    #[must_use]
    pub fn type_code(&self) -> u8 {
        match self {
            Self::Int(_) => 1,
            Self::Real(_) => 2,
            Self::String(_) => 3,
        }
    }

    /// Number of stored values (characters for strings).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Real(v) => v.len(),
            Self::String(s) => s.len(),
        }
    }

    /// Returns `true` when no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered list of named attributes attached to one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttrValue)>,
}

impl Attributes {
    /// Creates an empty attribute list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns `true` if an attribute called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Adds or replaces an attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains whitespace, or if a
    /// string value spans more than one line.
    pub fn set(&mut self, name: &str, value: AttrValue) -> Result<()> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(RangeError::InvalidArgument(format!("attribute name {name:?}")).into());
        }
        if let AttrValue::String(s) = &value {
            if s.contains(['\n', '\r']) {
                return Err(RangeError::InvalidArgument(
                    "attribute strings must be a single line".into(),
                )
                .into());
            }
        }
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_owned(), value)),
        }
        Ok(())
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
