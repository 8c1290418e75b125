//! Spawning tasks with an explicit scope context
//!
//! Tasks never pick up the spawner's scopes implicitly. These helpers make
//! the choice explicit at the spawn site.

use hieraconf_scope::{inherit_scopes, scoped};
use std::future::Future;
use tokio::task::JoinHandle;

/// Spawn `fut` with a copy of the caller's scopes, taken now
///
/// # Panics
/// Outside a tokio runtime, like [`tokio::spawn`].
pub fn spawn_inheriting<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(inherit_scopes(fut))
}

/// Spawn `fut` with an empty scope stack
///
/// # Panics
/// Outside a tokio runtime, like [`tokio::spawn`].
pub fn spawn_isolated<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(scoped(fut))
}
