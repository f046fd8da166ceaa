use std::fmt;

use arrayvec::ArrayVec;

use crate::error::RecordError;

use super::MAX_PATH_DEPTH;
use super::field::Field;

/// A validated path of one to [`MAX_PATH_DEPTH`] keys, stored inline.
///
/// # Examples
///
/// ```rust
/// use typed_map::{KeyPath, RecordError};
///
/// let path = KeyPath::new(["profile", "address", "city"])?;
/// assert_eq!(path.depth(), 3);
/// assert_eq!(path.to_string(), "profile.address.city");
///
/// assert_eq!(KeyPath::new(Vec::<String>::new()), Err(RecordError::InvalidKeyPath { depth: 0 }));
/// assert!(KeyPath::new(["a", "b", "c", "d", "e"]).is_err());
/// # Ok::<(), RecordError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyPath {
    keys: ArrayVec<String, MAX_PATH_DEPTH>,
}

impl KeyPath {
    /// Builds a path from `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidKeyPath`] for an empty path or one with
    /// more than [`MAX_PATH_DEPTH`] keys.
    pub fn new<I, K>(keys: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut stored = ArrayVec::new();
        let mut depth = 0;
        for key in keys {
            depth += 1;
            if depth <= MAX_PATH_DEPTH {
                stored.push(key.into());
            }
        }
        if depth == 0 || depth > MAX_PATH_DEPTH {
            return Err(RecordError::InvalidKeyPath { depth });
        }
        Ok(Self { keys: stored })
    }

    /// Number of keys.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    /// The keys, outermost first.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns this path extended by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidKeyPath`] when the path is already at
    /// [`MAX_PATH_DEPTH`].
    pub fn child(&self, key: impl Into<String>) -> Result<Self, RecordError> {
        let mut keys = self.keys.clone();
        keys.try_push(key.into())
            .map_err(|_| RecordError::InvalidKeyPath { depth: self.depth() + 1 })?;
        Ok(Self { keys })
    }
}

impl<S, T> From<Field<S, T>> for KeyPath {
    fn from(field: Field<S, T>) -> Self {
        let mut keys = ArrayVec::new();
        keys.push(field.name().to_owned());
        Self { keys }
    }
}

impl TryFrom<&[&str]> for KeyPath {
    type Error = RecordError;

    fn try_from(keys: &[&str]) -> Result<Self, Self::Error> {
        Self::new(keys.iter().copied())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.keys.join("."))
    }
}
