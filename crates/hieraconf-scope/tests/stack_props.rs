use hieraconf_model::Value;
use hieraconf_scope::{ConfigSource, GlobalSlot, MergeMode, ScopeStack};
use hieraconf_test_utils::{sparse, step_hierarchy};
use proptest::prelude::*;

proptest! {
    /// Pushing then releasing in reverse order always restores the prior view
    #[test]
    fn prop_lifo_release_restores_previous_view(timeouts in proptest::collection::vec(proptest::option::of(0..100i64), 1..8)) {
        let h = step_hierarchy();
        let slot = GlobalSlot::new();
        let mut stack = ScopeStack::new();
        let mut pushed = Vec::new();
        let mut views = Vec::new();

        for t in &timeouts {
            views.push(stack.flatten(&slot).field(h.global.id(), "timeout").cloned());
            let values: Vec<(&str, Value)> = t.iter().map(|t| ("timeout", Value::Int(*t))).collect();
            pushed.push(stack.push(sparse(&h.global, &values), MergeMode::Inherit));
        }

        while let Some(id) = pushed.pop() {
            prop_assert!(stack.release(id).is_ok());
            let expected = views.pop().unwrap();
            prop_assert_eq!(stack.flatten(&slot).field(h.global.id(), "timeout").cloned(), expected);
        }
        prop_assert!(stack.is_empty());
    }

    /// The merged value is the innermost concrete one, from the layer that set it
    #[test]
    fn prop_innermost_concrete_wins(timeouts in proptest::collection::vec(proptest::option::of(0..100i64), 1..8)) {
        let h = step_hierarchy();
        let mut stack = ScopeStack::new();
        for t in &timeouts {
            let values: Vec<(&str, Value)> = t.iter().map(|t| ("timeout", Value::Int(*t))).collect();
            stack.push(sparse(&h.global, &values), MergeMode::Inherit);
        }

        let expected = timeouts
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, t)| t.map(|t| (i + 1, t)));
        let available = stack.flatten(&GlobalSlot::new());
        let id = h.global.id();

        match expected {
            Some((depth, t)) => {
                prop_assert_eq!(available.field(id, "timeout"), Some(&Value::Int(t)));
                let source = available.source_of(id, "timeout");
                prop_assert!(matches!(source, Some(ConfigSource::Scope { depth: d, .. }) if d == depth), "source depth mismatch");
            }
            None => prop_assert_eq!(available.field(id, "timeout"), None),
        }
    }
}
