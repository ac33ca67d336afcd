//! Reducers
//!
//! A reducer computes the next value of a slot from the current one. Named
//! reducers implement [`Reducer`] and may be built by a [`crate::Resolver`]
//! with their own collaborators; ad-hoc mutations use a [`ReducerDelegate`].

use crate::slot::{SlotKey, Snapshot, State};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;

/// Future returned by a reducer delegate
pub type DelegateFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// Ad-hoc transform submitted without a named reducer
pub type ReducerDelegate<T> =
    Box<dyn FnOnce(Option<Snapshot<T>>) -> DelegateFuture<T> + Send + 'static>;

/// Box an async closure into a [`ReducerDelegate`]
pub fn delegate<T, F, Fut>(transform: F) -> ReducerDelegate<T>
where
    T: State,
    F: FnOnce(Option<Snapshot<T>>) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Box::new(move |state| Box::pin(transform(state)))
}

/// A named state transform bound to one slot
///
/// `reduce` receives the committed value (`None` before the first commit)
/// and the arguments of the submission. Returning an error leaves the slot
/// untouched and rejects only this submission.
#[async_trait]
pub trait Reducer: Send + Sync + 'static {
    type State: State;
    type Args: fmt::Debug + Send + 'static;

    /// Slot this reducer writes to
    fn slot(&self) -> SlotKey<Self::State>;

    async fn reduce(
        &self,
        state: Option<Snapshot<Self::State>>,
        args: Self::Args,
    ) -> anyhow::Result<Self::State>;
}

/// Replaces the slot value with the submitted one
pub struct SetState<T> {
    key: SlotKey<T>,
}

impl<T> SetState<T> {
    pub fn new(key: SlotKey<T>) -> Self {
        Self { key }
    }
}

#[async_trait]
impl<T: State> Reducer for SetState<T> {
    type State = T;
    type Args = T;

    fn slot(&self) -> SlotKey<T> {
        self.key.clone()
    }

    async fn reduce(&self, _state: Option<Snapshot<T>>, next: T) -> anyhow::Result<T> {
        Ok(next)
    }
}
