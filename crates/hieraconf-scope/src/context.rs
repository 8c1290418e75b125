//! Execution-context-local stacks
//!
//! Outside a tokio runtime every OS thread has its own stack. Inside a
//! runtime, scopes live only on task stacks: wrap a task's future in
//! [`scoped`] (start empty), [`inherit_scopes`] (start from a copy of the
//! caller's stack) or [`within_scope`] (a copy plus one entry). A task that
//! is not wrapped has no stack of its own; it reads an empty context and
//! cannot enter scopes, since a worker thread's stack would be shared by
//! every unwrapped task that thread polls.

use crate::available::AvailableConfigs;
use crate::error::{ScopeError, ScopeResult};
use crate::global::GlobalSlot;
use crate::stack::{MergeMode, ScopeId, ScopeStack, StackId};
use hieraconf_model::Record;
use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;

thread_local! {
    static THREAD_STACK: RefCell<ScopeStack> = RefCell::new(ScopeStack::new());
}

tokio::task_local! {
    static TASK_STACK: RefCell<ScopeStack>;
}

/// Which stack the calling code sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Task,
    Thread,
    /// Inside a runtime, outside any task stack
    Unscoped,
}

fn in_task_scope() -> bool {
    TASK_STACK.try_with(|_| ()).is_ok()
}

fn current_context() -> Context {
    if in_task_scope() {
        Context::Task
    } else if tokio::runtime::Handle::try_current().is_ok() {
        Context::Unscoped
    } else {
        Context::Thread
    }
}

fn read_current<R>(f: impl FnOnce(&ScopeStack) -> R) -> R {
    match current_context() {
        Context::Task => TASK_STACK.with(|cell| f(&cell.borrow())),
        Context::Thread => THREAD_STACK.with(|cell| f(&cell.borrow())),
        Context::Unscoped => f(&ScopeStack::new()),
    }
}

/// Stack a guard releases against; guards entered before a runtime started
/// on this thread still find their thread stack
fn with_owning<R>(f: impl FnOnce(&mut ScopeStack) -> R) -> R {
    if in_task_scope() {
        TASK_STACK.with(|cell| f(&mut cell.borrow_mut()))
    } else {
        THREAD_STACK.with(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Like `with_owning`, but never panics (thread teardown, reentrancy)
fn try_with_owning<R>(f: impl FnOnce(&mut ScopeStack) -> R) -> Option<R> {
    let run = |cell: &RefCell<ScopeStack>| cell.try_borrow_mut().ok().map(|mut s| f(&mut s));
    if in_task_scope() {
        TASK_STACK.try_with(run).ok().flatten()
    } else {
        THREAD_STACK.try_with(run).ok().flatten()
    }
}

fn release_in(stack: &mut ScopeStack, owner: StackId, scope: ScopeId) -> ScopeResult<()> {
    if stack.id() == owner {
        stack.release(scope)
    } else {
        Err(ScopeError::WrongContext {
            scope,
            expected: owner,
            actual: stack.id(),
        })
    }
}

/// Handle for one entered scope
///
/// Dropping the guard releases exactly the entry it pushed, on every exit
/// path including unwinding.
///
/// A guard stays on the thread or task that entered it. It is not `Send`,
/// so it cannot be held across an `.await` in a spawned future; use
/// [`within_scope`] to run a future inside a scope instead.
///
/// ```compile_fail
/// use hieraconf_scope::enter_scope;
/// use hieraconf_test_utils::{sparse, step_hierarchy};
///
/// let h = step_hierarchy();
/// let guard = enter_scope(sparse(&h.global, &[])).unwrap();
/// std::thread::spawn(move || drop(guard));
/// ```
#[derive(Debug)]
#[must_use = "the scope is exited as soon as the guard is dropped"]
pub struct ScopeGuard {
    stack: StackId,
    scope: ScopeId,
    active: bool,
    _local: PhantomData<*const ()>,
}

impl ScopeGuard {
    /// Id of the pushed entry
    #[inline]
    pub fn id(&self) -> ScopeId {
        self.scope
    }

    /// Stack the entry was pushed on
    #[inline]
    pub fn stack_id(&self) -> StackId {
        self.stack
    }

    /// Release now and report discipline violations
    ///
    /// # Errors
    /// - [`ScopeError::StackDiscipline`] if inner scopes are still live
    ///   (the entry is removed anyway)
    /// - [`ScopeError::WrongContext`] if the current stack is not the one
    ///   the scope was entered on
    pub fn exit(mut self) -> ScopeResult<()> {
        self.active = false;
        with_owning(|stack| release_in(stack, self.stack, self.scope))
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let (owner, scope) = (self.stack, self.scope);
        match try_with_owning(|stack| release_in(stack, owner, scope)) {
            Some(Ok(())) => {}
            Some(Err(e)) => tracing::error!("Scope guard dropped out of order: {}", e),
            None => tracing::error!("Scope guard for {} dropped without a live stack", scope),
        }
    }
}

/// Enter a scope on the current context's stack
///
/// # Errors
/// [`ScopeError::UnscopedTask`] inside a tokio runtime when the current
/// task has no stack of its own.
pub fn enter_scope(record: Record) -> ScopeResult<ScopeGuard> {
    enter_scope_with(record, MergeMode::Inherit)
}

/// Enter a scope whose placeholders hide outer values of the same type
///
/// # Errors
/// As [`enter_scope`].
pub fn enter_scope_masked(record: Record) -> ScopeResult<ScopeGuard> {
    enter_scope_with(record, MergeMode::Mask)
}

/// Enter a scope with an explicit merge mode
///
/// # Errors
/// As [`enter_scope`].
pub fn enter_scope_with(record: Record, mode: MergeMode) -> ScopeResult<ScopeGuard> {
    let context = current_context();
    if context == Context::Unscoped {
        tracing::warn!(
            "Refusing {} scope: task has no stack of its own",
            record.type_name()
        );
        return Err(ScopeError::UnscopedTask);
    }
    let push = |cell: &RefCell<ScopeStack>| {
        let mut stack = cell.borrow_mut();
        (stack.id(), stack.push(record, mode))
    };
    let (stack, scope) = if context == Context::Task {
        TASK_STACK.with(push)
    } else {
        THREAD_STACK.with(push)
    };
    Ok(ScopeGuard {
        stack,
        scope,
        active: true,
        _local: PhantomData,
    })
}

/// Depth of the current context's stack
#[must_use]
pub fn current_depth() -> usize {
    read_current(|s| s.depth())
}

/// Copy of the current context's stack
#[must_use]
pub fn current_snapshot() -> ScopeStack {
    read_current(|s| s.fork())
}

/// Flatten the current context's stack over `global`
#[must_use]
pub fn flatten_active_scopes(global: &GlobalSlot) -> AvailableConfigs {
    read_current(|s| s.flatten(global))
}

/// Run `fut` with a fresh, empty task stack
pub fn scoped<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    TASK_STACK.scope(RefCell::new(ScopeStack::new()), fut)
}

/// Run `fut` with a copy of the caller's stack, taken now
pub fn inherit_scopes<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    let stack = current_snapshot();
    TASK_STACK.scope(RefCell::new(stack), fut)
}

/// Run `fut` inside one more scope, on a copy of the caller's stack taken now
///
/// The future owns the entry for as long as it runs, across every `.await`;
/// the caller's stack never sees it.
pub fn within_scope<F: Future>(record: Record, fut: F) -> impl Future<Output = F::Output> {
    within_scope_with(record, MergeMode::Inherit, fut)
}

/// [`within_scope`] with an explicit merge mode
pub fn within_scope_with<F: Future>(
    record: Record,
    mode: MergeMode,
    fut: F,
) -> impl Future<Output = F::Output> {
    let mut stack = current_snapshot();
    stack.push(record, mode);
    TASK_STACK.scope(RefCell::new(stack), fut)
}

/// Run `f` synchronously with `stack` as the current stack
pub fn with_stack<R>(stack: ScopeStack, f: impl FnOnce() -> R) -> R {
    TASK_STACK.sync_scope(RefCell::new(stack), f)
}
