//! Multi-level navigation and update along a key path.
//!
//! Every function here treats a path as a composition of single-level
//! operations across nested containers: persistent mappings
//! ([`Value::Map`]), plain mappings ([`Value::Plain`]) and lists
//! ([`Value::List`], addressed by decimal index keys such as `"0"`). Paths
//! may be of any length.
//!
//! Reads never allocate and never fail: a path that runs into a missing key
//! or a scalar yields `None`. Writes rebuild every container on
//! the path bottom-up and leave everything off the path shared with the
//! original.
//!
//! # Examples
//!
//! ```rust
//! use typed_map::Value;
//! use typed_map::path::{get_in, set_in};
//! use typed_map::persistent::PersistentMap;
//!
//! let root = Value::Map(PersistentMap::new());
//! let path = ["profile", "address", "city"];
//!
//! let updated = set_in(&root, &path, Value::from("LA"));
//! assert_eq!(get_in(&updated, &path), Some(&Value::from("LA")));
//! assert_eq!(get_in(&root, &path), None);
//! ```

use smallvec::SmallVec;

use crate::container::Container;
use crate::merge::Merger;
use crate::persistent::PersistentMap;
use crate::value::{Value, list_index};

/// Containers collected on the way down; four levels stay on the stack.
type Trail = SmallVec<[Value; 4]>;

/// Returns the value at `path`, or `None` if any step is missing or passes
/// through a scalar. An empty path yields `root`.
#[must_use]
pub fn get_in<'v, P: AsRef<str>>(root: &'v Value, path: &[P]) -> Option<&'v Value> {
    path.iter().try_fold(root, |current, key| current.get(key.as_ref()))
}

/// Returns the value at `path`, or `not_set` when the path does not resolve.
#[must_use]
pub fn get_in_or<'v, P: AsRef<str>>(root: &'v Value, path: &[P], not_set: &'v Value) -> &'v Value {
    get_in(root, path).unwrap_or(not_set)
}

/// Returns `true` when `path` resolves to a stored value.
#[must_use]
pub fn has_in<P: AsRef<str>>(root: &Value, path: &[P]) -> bool {
    get_in(root, path).is_some()
}

/// Returns a copy of `root` with `value` stored at `path`.
///
/// Missing, `Null` or scalar intermediates are replaced by empty `Map`s; an
/// existing `Plain` intermediate stays `Plain`. Storing the value that is
/// already there returns a value sharing the original root.
///
/// A list intermediate stays a list:
///
/// - an index inside the list replaces that element
/// - an index past the end appends, padding any gap with `Null`
/// - a key that is not an index leaves the list unchanged
///
/// # Examples
///
/// ```rust
/// use typed_map::Value;
/// use typed_map::path::set_in;
/// use typed_map::persistent::PersistentMap;
///
/// let root = Value::Map(PersistentMap::singleton("profile".to_string(), Value::Null));
/// let updated = set_in(&root, &["profile", "name"], Value::from("Ada"));
///
/// assert_eq!(updated.get("profile").and_then(|profile| profile.get("name")), Some(&Value::from("Ada")));
/// ```
#[must_use]
pub fn set_in<P: AsRef<str>>(root: &Value, path: &[P], value: Value) -> Value {
    update_in(root, path, |_| value)
}

/// Replaces the value at `path` with `updater(current)`.
///
/// Equivalent to `set_in(root, path, updater(get_in(root, path)))`, computed
/// with one descent and one bottom-up rebuild.
///
/// # Examples
///
/// ```rust
/// use typed_map::Value;
/// use typed_map::path::{get_in, update_in};
/// use typed_map::persistent::PersistentMap;
///
/// let root = Value::Map(PersistentMap::new());
/// let counted = update_in(&root, &["stats", "visits"], |current| {
///     Value::from(current.and_then(Value::as_int).unwrap_or(0) + 1)
/// });
/// assert_eq!(get_in(&counted, &["stats", "visits"]), Some(&Value::from(1)));
/// ```
#[must_use]
pub fn update_in<P, F>(root: &Value, path: &[P], updater: F) -> Value
where
    P: AsRef<str>,
    F: FnOnce(Option<&Value>) -> Value,
{
    update_in_option(Some(root), path, updater)
}

/// Removes the key at the end of `path`.
///
/// When the path does not resolve the original value is returned, sharing
/// its root. An empty path returns `root` unchanged. Deleting an index from
/// a list removes that element and shifts the rest down.
#[must_use]
pub fn delete_in<P: AsRef<str>>(root: &Value, path: &[P]) -> Value {
    let Some((last, parents)) = path.split_last() else {
        return root.clone();
    };
    if !get_in(root, parents).is_some_and(|parent| parent.get(last.as_ref()).is_some()) {
        return root.clone();
    }
    update_in(root, parents, |parent| remove_key(parent, last.as_ref()))
}

/// Shallow-merges mapping `sources` into the container at `path`.
///
/// A missing or non-mapping target starts as an empty `Map`.
#[must_use]
pub fn merge_in<'s, P, I>(root: &Value, path: &[P], sources: I) -> Value
where
    P: AsRef<str>,
    I: IntoIterator<Item = &'s Value>,
{
    update_in(root, path, |target| Merger::shallow().merge_value(target, sources))
}

/// Deep-merges mapping `sources` into the container at `path`.
#[must_use]
pub fn merge_deep_in<'s, P, I>(root: &Value, path: &[P], sources: I) -> Value
where
    P: AsRef<str>,
    I: IntoIterator<Item = &'s Value>,
{
    update_in(root, path, |target| Merger::deep().merge_value(target, sources))
}

// =============================================================================
// Container entry points
// =============================================================================

/// [`get_in`] starting from a container. An empty path yields `None`.
pub fn get_in_container<'c, C, P>(container: &'c C, path: &[P]) -> Option<&'c Value>
where
    C: Container,
    P: AsRef<str>,
{
    let (first, rest) = path.split_first()?;
    get_in(container.get_value(first.as_ref())?, rest)
}

/// [`update_in`] starting from a container.
///
/// An empty path returns the container unchanged.
///
/// # Errors
///
/// Returns the container's error when it rejects the first key.
pub fn update_in_container<C, P, F>(container: &C, path: &[P], updater: F) -> Result<C, C::Error>
where
    C: Container,
    P: AsRef<str>,
    F: FnOnce(Option<&Value>) -> Value,
{
    let Some((first, rest)) = path.split_first() else {
        return Ok(container.clone());
    };
    let key = first.as_ref();
    let updated = update_in_option(container.get_value(key), rest, updater);
    container.set_value(key, updated)
}

/// [`delete_in`] starting from a container.
///
/// # Errors
///
/// Returns the container's error when it rejects the first key.
pub fn delete_in_container<C, P>(container: &C, path: &[P]) -> Result<C, C::Error>
where
    C: Container,
    P: AsRef<str>,
{
    let Some((first, rest)) = path.split_first() else {
        return Ok(container.clone());
    };
    let key = first.as_ref();
    match container.get_value(key) {
        Some(_) if rest.is_empty() => Ok(container.delete_value(key)),
        Some(child) if get_in(child, rest).is_some() => container.set_value(key, delete_in(child, rest)),
        _ => Ok(container.clone()),
    }
}

/// [`merge_in`] and [`merge_deep_in`] starting from a container.
///
/// An empty path merges into the container itself.
///
/// # Errors
///
/// Returns the container's error when it rejects a key.
pub fn merge_in_container<'s, C, P, I>(container: &C, path: &[P], sources: I, deep: bool) -> Result<C, C::Error>
where
    C: Container,
    P: AsRef<str>,
    I: IntoIterator<Item = &'s Value>,
{
    let mut merger = if deep { Merger::deep() } else { Merger::shallow() };
    if path.is_empty() {
        let mut merged = container.clone();
        for source in sources {
            for (key, incoming) in source.entries() {
                let value = merger.resolve(key, merged.get_value(key), incoming);
                merged = merged.set_value(key, value)?;
            }
        }
        return Ok(merged);
    }
    update_in_container(container, path, |target| merger.merge_value(target, sources))
}

// =============================================================================
// Internals
// =============================================================================

/// Core of every write: descends once, collecting the container at each
/// level, then rebuilds the path bottom-up around `updater`'s result.
pub(crate) fn update_in_option<P, F>(root: Option<&Value>, path: &[P], updater: F) -> Value
where
    P: AsRef<str>,
    F: FnOnce(Option<&Value>) -> Value,
{
    let mut trail = Trail::with_capacity(path.len());
    let mut cursor = root;
    for key in path {
        trail.push(container_or_empty(cursor));
        cursor = cursor.and_then(|value| value.get(key.as_ref()));
    }

    let mut value = updater(cursor);
    for (container, key) in trail.into_iter().zip(path).rev() {
        value = assign(container, key.as_ref(), value);
    }
    value
}

fn container_or_empty(value: Option<&Value>) -> Value {
    match value {
        Some(container @ (Value::Map(_) | Value::Plain(_) | Value::List(_))) => container.clone(),
        _ => Value::Map(PersistentMap::new()),
    }
}

fn assign(container: Value, key: &str, value: Value) -> Value {
    match container {
        Value::Map(map) => Value::Map(map.insert(key.to_owned(), value)),
        Value::Plain(mut plain) => {
            plain.insert(key.to_owned(), value);
            Value::Plain(plain)
        }
        Value::List(mut values) => {
            let Some(index) = list_index(key) else {
                return Value::List(values);
            };
            if index < values.len() {
                values[index] = value;
            } else {
                values.resize(index, Value::Null);
                values.push(value);
            }
            Value::List(values)
        }
        _ => Value::Map(PersistentMap::singleton(key.to_owned(), value)),
    }
}

fn remove_key(container: Option<&Value>, key: &str) -> Value {
    match container {
        Some(Value::Map(map)) => Value::Map(map.remove(key)),
        Some(Value::Plain(plain)) => {
            let mut plain = plain.clone();
            plain.remove(key);
            Value::Plain(plain)
        }
        Some(Value::List(values)) => {
            let mut values = values.clone();
            if let Some(index) = list_index(key).filter(|index| *index < values.len()) {
                values.remove(index);
            }
            Value::List(values)
        }
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

// =============================================================================
// Tests
// =============================================================================
