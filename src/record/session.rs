//! Batched mutation of typed records.
//!
//! A [`RecordSession`] owns a [`TransientMap`] over the record's trie. Only
//! `set` edits it in place; every other mutation is rejected with
//! [`RecordError::UnsupportedInSession`]. [`RecordSession::end`] consumes the
//! session, so a closed session cannot be used again.
//!
//! [`MutableRecord`] is the long-lived form of the same session: it stays
//! reachable after [`MutableRecord::as_immutable`] and reports
//! [`RecordError::SessionClosed`] from then on.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::error::RecordError;
use crate::persistent::TransientMap;
use crate::value::Value;

use super::field::{Field, FieldValue};
use super::key_path::KeyPath;
use super::schema::Schema;
use super::typed::TypedMap;

/// An open mutation session over a [`TypedMap`].
///
/// # Design
///
/// - Each trie node is copied at most once per session
/// - `PhantomData<Rc<()>>` keeps the session on the thread that opened it
/// - Clone is intentionally not implemented
///
/// # Examples
///
/// ```rust
/// use typed_map::{Schema, TypedMap};
///
/// #[derive(Schema)]
/// struct Scores {
///     alice: i64,
///     bob: i64,
/// }
///
/// let scores = TypedMap::<Scores>::default();
/// let mut session = scores.begin();
/// session.set(Scores::ALICE, 3).set(Scores::BOB, 5);
/// assert!(session.was_altered());
///
/// let updated = session.end();
/// assert_eq!(updated.get(Scores::BOB), Some(5));
/// assert_eq!(scores.get(Scores::BOB), Some(0));
/// ```
pub struct RecordSession<S> {
    transient: TransientMap<String, Value>,
    _schema: PhantomData<fn() -> S>,
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(RecordSession<()>: Send, Sync, Clone);
static_assertions::assert_not_impl_any!(MutableRecord<()>: Send, Sync, Clone);

impl<S: Schema> RecordSession<S> {
    pub(crate) fn new(base: &TypedMap<S>) -> Self {
        tracing::debug!(schema = S::TYPE_NAME, fields = base.len(), "record session opened");
        Self {
            transient: base.as_map().transient(),
            _schema: PhantomData,
            _marker: PhantomData,
        }
    }

    /// Sets `field` to `value` in place.
    pub fn set<T: FieldValue>(&mut self, field: Field<S, T>, value: T) -> &mut Self {
        self.transient
            .insert(field.name().to_owned(), value.into_value());
        self
    }

    /// Sets `key` to `value` in place.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownField`] when `key` is not declared; the
    /// session is left as it was.
    pub fn set_key(&mut self, key: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        TypedMap::<S>::check_field(key)?;
        self.transient.insert(key.to_owned(), value.into());
        Ok(())
    }

    /// Copies every field of `sources` into the session, left to right.
    pub fn merge<'a, I>(&mut self, sources: I) -> &mut Self
    where
        I: IntoIterator<Item = &'a TypedMap<S>>,
    {
        for source in sources {
            for (key, value) in source {
                self.transient.insert(key.clone(), value.clone());
            }
        }
        self
    }

    /// Always fails: only `set` edits a session.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnsupportedInSession`].
    pub fn delete(&mut self, _key: &str) -> Result<(), RecordError> {
        Err(RecordError::UnsupportedInSession { operation: "delete" })
    }

    /// Always fails: only `set` edits a session.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnsupportedInSession`].
    pub fn set_in(&mut self, _path: &KeyPath, _value: impl Into<Value>) -> Result<(), RecordError> {
        Err(RecordError::UnsupportedInSession { operation: "set_in" })
    }

    /// Always fails: only `set` edits a session.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnsupportedInSession`].
    pub fn update_in<F>(&mut self, _path: &KeyPath, _updater: F) -> Result<(), RecordError>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        Err(RecordError::UnsupportedInSession { operation: "update_in" })
    }

    /// Always fails: only `set` edits a session.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnsupportedInSession`].
    pub fn delete_in(&mut self, _path: &KeyPath) -> Result<(), RecordError> {
        Err(RecordError::UnsupportedInSession { operation: "delete_in" })
    }

    /// Always fails: only `set` edits a session.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnsupportedInSession`].
    pub fn merge_in<'s, I>(&mut self, _path: &KeyPath, _sources: I) -> Result<(), RecordError>
    where
        I: IntoIterator<Item = &'s Value>,
    {
        Err(RecordError::UnsupportedInSession { operation: "merge_in" })
    }

    /// Returns the typed value of `field` as the session currently sees it.
    #[must_use]
    pub fn get<T: FieldValue>(&self, field: Field<S, T>) -> Option<T> {
        self.transient.get(field.name()).and_then(T::from_value)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.transient.get(key)
    }

    /// Number of stored fields.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.transient.len()
    }

    /// Returns `true` if no field is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.transient.is_empty()
    }

    /// Reports whether any `set` changed a value since the session began.
    #[must_use]
    pub const fn was_altered(&self) -> bool {
        self.transient.was_altered()
    }

    /// Freezes the session into a record.
    ///
    /// An unaltered session returns the record it was opened on.
    #[must_use]
    pub fn end(self) -> TypedMap<S> {
        tracing::debug!(
            schema = S::TYPE_NAME,
            altered = self.was_altered(),
            "record session closed"
        );
        TypedMap::wrap(self.transient.persistent())
    }
}

/// A long-lived mutable handle on a record.
///
/// Behaves like a [`RecordSession`] until [`as_immutable`](Self::as_immutable)
/// freezes it; every call after that returns [`RecordError::SessionClosed`].
///
/// # Examples
///
/// ```rust
/// use typed_map::{RecordError, Schema, TypedMap};
///
/// #[derive(Schema)]
/// struct Flags {
///     dark_mode: bool,
/// }
///
/// let flags = TypedMap::<Flags>::default();
/// let mut handle = flags.as_mutable();
/// handle.set(Flags::DARK_MODE, true)?;
///
/// let frozen = handle.as_immutable()?;
/// assert_eq!(frozen.get(Flags::DARK_MODE), Some(true));
/// assert_eq!(handle.set(Flags::DARK_MODE, false), Err(RecordError::SessionClosed));
/// # Ok::<(), RecordError>(())
/// ```
pub struct MutableRecord<S> {
    session: Option<RecordSession<S>>,
}

impl<S: Schema> MutableRecord<S> {
    pub(crate) const fn new(session: RecordSession<S>) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn open(&mut self) -> Result<&mut RecordSession<S>, RecordError> {
        self.session.as_mut().ok_or(RecordError::SessionClosed)
    }

    fn open_ref(&self) -> Result<&RecordSession<S>, RecordError> {
        self.session.as_ref().ok_or(RecordError::SessionClosed)
    }

    /// Sets `field` to `value` in place.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SessionClosed`] after `as_immutable`.
    pub fn set<T: FieldValue>(&mut self, field: Field<S, T>, value: T) -> Result<(), RecordError> {
        self.open()?.set(field, value);
        Ok(())
    }

    /// Sets `key` to `value` in place.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SessionClosed`] after `as_immutable`, or
    /// [`RecordError::UnknownField`] when `key` is not declared.
    pub fn set_key(&mut self, key: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        self.open()?.set_key(key, value)
    }

    /// Copies every field of `sources` into the handle.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SessionClosed`] after `as_immutable`.
    pub fn merge<'a, I>(&mut self, sources: I) -> Result<(), RecordError>
    where
        I: IntoIterator<Item = &'a TypedMap<S>>,
    {
        self.open()?.merge(sources);
        Ok(())
    }

    /// Always fails.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SessionClosed`] after `as_immutable`, otherwise
    /// [`RecordError::UnsupportedInSession`].
    pub fn delete(&mut self, key: &str) -> Result<(), RecordError> {
        self.open()?.delete(key)
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SessionClosed`] after `as_immutable`.
    pub fn get_value(&self, key: &str) -> Result<Option<&Value>, RecordError> {
        Ok(self.open_ref()?.get_value(key))
    }

    /// Reports whether any `set` changed a value.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SessionClosed`] after `as_immutable`.
    pub fn was_altered(&self) -> Result<bool, RecordError> {
        Ok(self.open_ref()?.was_altered())
    }

    /// Returns `true` once the handle has been frozen.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    /// Freezes the handle into a record and closes it.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::SessionClosed`] when called a second time.
    pub fn as_immutable(&mut self) -> Result<TypedMap<S>, RecordError> {
        self.session
            .take()
            .map(RecordSession::end)
            .ok_or(RecordError::SessionClosed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent::PersistentMap;
    use rstest::{fixture, rstest};

    struct Tally;

    impl Schema for Tally {
        const TYPE_NAME: &'static str = "Tally";
        const FIELDS: &'static [&'static str] = &["a", "b"];

        fn defaults() -> Vec<(&'static str, Value)> {
            vec![("a", Value::from(0)), ("b", Value::from(0))]
        }

        fn into_fields(self) -> Vec<(&'static str, Value)> {
            Self::defaults()
        }

        fn from_record(_: &TypedMap<Self>) -> Option<Self> {
            Some(Self)
        }
    }

    const A: Field<Tally, i64> = Field::new("a");
    const B: Field<Tally, i64> = Field::new("b");

    #[fixture]
    fn tally() -> TypedMap<Tally> {
        TypedMap::default()
    }

    #[rstest]
    fn test_unaltered_session_returns_original(tally: TypedMap<Tally>) {
        let mut session = tally.begin();
        session.set(A, 0);
        assert!(!session.was_altered());
        assert!(session.end().ptr_eq(&tally));
    }

    #[rstest]
    fn test_session_matches_sequential_sets(tally: TypedMap<Tally>) {
        let mut session = tally.begin();
        session.set(A, 1).set(B, 2).set(A, 3);
        let batched = session.end();

        let sequential = tally.set(A, 1).set(B, 2).set(A, 3);
        assert_eq!(batched, sequential);
        assert_eq!(tally.get(A), Some(0));
    }

    #[rstest]
    fn test_session_reads_its_own_writes(tally: TypedMap<Tally>) {
        let mut session = tally.begin();
        session.set(B, 9);
        assert_eq!(session.get(B), Some(9));
        assert_eq!(session.get_value("a"), Some(&Value::from(0)));
        assert_eq!(session.len(), 2);
    }

    #[rstest]
    #[case::delete(|session: &mut RecordSession<Tally>| session.delete("a"), "delete")]
    #[case::delete_in(|session: &mut RecordSession<Tally>| session.delete_in(&KeyPath::from(A)), "delete_in")]
    #[case::set_in(|session: &mut RecordSession<Tally>| session.set_in(&KeyPath::from(A), 1), "set_in")]
    #[case::update_in(
        |session: &mut RecordSession<Tally>| session.update_in(&KeyPath::from(A), |_| Value::Null),
        "update_in"
    )]
    #[case::merge_in(|session: &mut RecordSession<Tally>| session.merge_in(&KeyPath::from(A), []), "merge_in")]
    fn test_only_set_is_supported(
        tally: TypedMap<Tally>,
        #[case] operation: fn(&mut RecordSession<Tally>) -> Result<(), RecordError>,
        #[case] name: &'static str,
    ) {
        let mut session = tally.begin();
        assert_eq!(
            operation(&mut session),
            Err(RecordError::UnsupportedInSession { operation: name })
        );
        assert!(!session.was_altered());
    }

    #[rstest]
    fn test_set_key_rejects_unknown_field(tally: TypedMap<Tally>) {
        let mut session = tally.begin();
        assert!(session.set_key("c", 1).is_err());
        assert!(session.set_key("b", 1).is_ok());
        assert_eq!(session.end().get(B), Some(1));
    }

    #[rstest]
    fn test_merge_is_repeated_set(tally: TypedMap<Tally>) {
        let other = tally.set(B, 4);
        let mut session = tally.begin();
        session.merge([&other]);
        assert_eq!(session.end(), other);
    }

    #[rstest]
    fn test_mutable_record_closes(tally: TypedMap<Tally>) {
        let mut handle = tally.as_mutable();
        assert_eq!(handle.set(A, 5), Ok(()));
        assert_eq!(handle.delete("a"), Err(RecordError::UnsupportedInSession { operation: "delete" }));

        let frozen = handle.as_immutable();
        assert_eq!(frozen.map(|record| record.get(A)), Ok(Some(5)));
        assert!(handle.is_closed());
        assert_eq!(handle.as_immutable(), Err(RecordError::SessionClosed));
        assert_eq!(handle.was_altered(), Err(RecordError::SessionClosed));
        assert_eq!(handle.get_value("a"), Err(RecordError::SessionClosed));
        assert_eq!(handle.delete("a"), Err(RecordError::SessionClosed));
    }

    #[rstest]
    fn test_session_leaves_source_map_untouched(tally: TypedMap<Tally>) {
        let before: PersistentMap<String, Value> = tally.as_map().clone();
        let mut session = tally.begin();
        session.set(A, 10);
        let _ = session.end();
        assert_eq!(tally.as_map(), &before);
    }
}
