//! Scope stacks stay private to their execution context
//!
//! Run with: cargo test --package hieraconf-scope --test context_isolation

use hieraconf_model::Value;
use hieraconf_scope::prelude::*;
use hieraconf_scope::{current_depth, inherit_scopes, scoped, ScopeError};
use hieraconf_test_utils::{init_tracing, sparse, step_hierarchy, StepHierarchy};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::sync::Barrier;

fn timeout_seen(h: &StepHierarchy) -> Option<Value> {
    flatten_active_scopes(&GlobalSlot::new())
        .field(h.global.id(), "timeout")
        .cloned()
}

fn timeout_record(h: &StepHierarchy, t: i64) -> hieraconf_model::Record {
    sparse(&h.global, &[("timeout", Value::Int(t))])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tasks_see_only_their_own_scopes() {
    init_tracing();
    let h = step_hierarchy();
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16i64)
        .map(|i| {
            let h = h.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(within_scope(timeout_record(&h, i), async move {
                // Every task is inside its scope before any of them reads
                barrier.wait().await;
                tokio::task::yield_now().await;
                let seen = timeout_seen(&h);
                (i, seen, current_depth())
            }))
        })
        .collect();

    for handle in handles {
        let (i, seen, depth) = handle.await.unwrap();
        assert_eq!(seen, Some(Value::Int(i)));
        assert_eq!(depth, 1);
    }
}

/// Plain `tokio::spawn` tasks sharing one worker thread never share scopes.
///
/// The first task tries to enter a scope and is refused; the second runs on
/// the same thread afterwards and must find nothing in force.
#[tokio::test]
async fn unwrapped_tasks_never_leak_scopes() {
    init_tracing();
    let h = step_hierarchy();
    let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();

    let writer = {
        let h = h.clone();
        tokio::spawn(async move {
            let entered = enter_scope(timeout_record(&h, 99)).map(|guard| guard.id());
            let _ = entered_tx.send(());
            tokio::task::yield_now().await;
            entered
        })
    };
    let reader = {
        let h = h.clone();
        tokio::spawn(async move {
            entered_rx.await.unwrap();
            (timeout_seen(&h), current_depth())
        })
    };

    assert_eq!(writer.await.unwrap(), Err(ScopeError::UnscopedTask));
    assert_eq!(reader.await.unwrap(), (None, 0));
}

#[tokio::test]
async fn child_task_inherits_snapshot_taken_at_spawn() {
    let h = step_hierarchy();
    scoped(async {
        let outer = enter_scope(timeout_record(&h, 30)).unwrap();
        let child = inherit_scopes({
            let h = h.clone();
            async move { timeout_seen(&h) }
        });
        // Leaving the parent scope after the snapshot does not affect the child
        drop(outer);
        assert_eq!(child.await, Some(Value::Int(30)));
        assert_eq!(timeout_seen(&h), None);
    })
    .await;
}

#[test]
fn early_return_releases_scope() {
    fn fail(guard: &ScopeGuard) -> Result<(), ScopeError> {
        Err(ScopeError::UnknownScope { id: guard.id() })
    }

    fn work(h: &StepHierarchy) -> Result<(), ScopeError> {
        let guard = enter_scope(timeout_record(h, 5))?;
        assert_eq!(current_depth(), 1);
        fail(&guard)?;
        Ok(())
    }

    let h = step_hierarchy();
    assert!(work(&h).is_err());
    assert_eq!(current_depth(), 0);
}

#[test]
fn explicit_stack_is_independent_of_ambient_stack() {
    let h = step_hierarchy();
    let _ambient = enter_scope(timeout_record(&h, 1)).unwrap();

    let mut explicit = hieraconf_scope::ScopeStack::new();
    explicit.push(timeout_record(&h, 2), MergeMode::Inherit);
    let available = explicit.flatten(&GlobalSlot::new());

    assert_eq!(available.field(h.global.id(), "timeout"), Some(&Value::Int(2)));
    assert_eq!(timeout_seen(&h), Some(Value::Int(1)));
}
