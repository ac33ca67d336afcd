//! Slot identity
//!
//! A slot is addressed by a [`SlotId`] token. At the API surface the token is
//! paired with the value type through [`SlotKey`], so `get`, `reduce` and
//! `observe` are statically typed while the registry stays an ordinary map.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Values delivered to getters and subscribers.
pub type Snapshot<T> = Arc<T>;

/// Bound for values held in a slot.
///
/// `Clone` backs the structural clone policy and `Debug` backs
/// instrumentation.
pub trait State: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> State for T where T: Clone + fmt::Debug + Send + Sync + 'static {}

// ----------------------------------------------------------------------------
// Slot Id
// ----------------------------------------------------------------------------

/// Stable identity token of a slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(Cow<'static, str>);

impl SlotId {
    /// Identity backed by a static name, usable in `const` items
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for SlotId {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for SlotId {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

// ----------------------------------------------------------------------------
// Slot Key
// ----------------------------------------------------------------------------

/// Typed handle to a slot holding values of type `T`
pub struct SlotKey<T> {
    id: SlotId,
    _state: PhantomData<fn() -> T>,
}

impl<T> SlotKey<T> {
    /// ```rust
    /// use slotstate_core::SlotKey;
    ///
    /// #[derive(Debug, Clone, Default)]
    /// struct Counter { value: u32 }
    ///
    /// const COUNTER: SlotKey<Counter> = SlotKey::new("counter");
    /// assert_eq!(COUNTER.id().as_str(), "counter");
    /// ```
    pub const fn new(name: &'static str) -> Self {
        Self {
            id: SlotId::from_static(name),
            _state: PhantomData,
        }
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id: SlotId::new(name),
            _state: PhantomData,
        }
    }

    pub fn id(&self) -> &SlotId {
        &self.id
    }
}

impl<T> Clone for SlotKey<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _state: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SlotKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotKey")
            .field("id", &self.id)
            .field("state", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> PartialEq for SlotKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for SlotKey<T> {}
