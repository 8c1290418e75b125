//! C3 linearization
//!
//! The merge is generic over the node type so the registry can run it on
//! type ids while tests run it on plain characters.

use std::collections::VecDeque;

/// Merge sequences with the C3 rule
///
/// Repeatedly takes the first head that does not appear in the tail of any
/// sequence. On failure returns the heads that could not be ordered.
///
/// # Errors
/// Returns the blocked heads when no consistent order exists.
pub fn c3_merge<T: Copy + Eq>(sequences: Vec<Vec<T>>) -> Result<Vec<T>, Vec<T>> {
    let mut seqs: Vec<VecDeque<T>> = sequences
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(VecDeque::from)
        .collect();
    let mut out = Vec::new();

    loop {
        seqs.retain(|s| !s.is_empty());
        if seqs.is_empty() {
            return Ok(out);
        }

        let candidate = seqs
            .iter()
            .filter_map(|s| s.front().copied())
            .find(|head| !seqs.iter().any(|s| s.iter().skip(1).any(|t| t == head)));

        let Some(head) = candidate else {
            let mut blocked = Vec::new();
            for head in seqs.iter().filter_map(|s| s.front().copied()) {
                if !blocked.contains(&head) {
                    blocked.push(head);
                }
            }
            return Err(blocked);
        };

        out.push(head);
        for s in &mut seqs {
            if s.front() == Some(&head) {
                s.pop_front();
            }
        }
    }
}

/// Linearize `head` given its direct bases and each base's own order
///
/// # Errors
/// Returns the blocked heads when the hierarchy is inconsistent.
pub fn c3_linearize<T: Copy + Eq>(
    head: T,
    bases: &[T],
    base_orders: &[&[T]],
) -> Result<Vec<T>, Vec<T>> {
    let mut seqs: Vec<Vec<T>> = base_orders.iter().map(|o| o.to_vec()).collect();
    seqs.push(bases.to_vec());
    let mut order = vec![head];
    order.extend(c3_merge(seqs)?);
    Ok(order)
}
