//! Greedy batch planning.

/// Split `items` into batches of at most `batch_size` items.
///
/// With a `token_budget`, a batch is also closed before the item that would
/// push its token total over the budget. An item larger than the whole
/// budget still gets dispatched, alone in its own batch.
pub(crate) fn plan_batches<T, F>(
    items: Vec<T>,
    batch_size: usize,
    token_budget: Option<usize>,
    tokens: F,
) -> Vec<Vec<T>>
where
    F: Fn(&T) -> usize,
{
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut current_tokens = 0usize;

    for item in items {
        let cost = token_budget.map(|_| tokens(&item)).unwrap_or(0);
        let over_budget = token_budget
            .is_some_and(|budget| !current.is_empty() && current_tokens + cost > budget);
        if current.len() == batch_size || over_budget {
            batches.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        current_tokens += cost;
        current.push(item);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_by_size() {
        let batches = plan_batches((0..7).collect(), 3, None, |_| 0);
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }

    #[test]
    fn empty_input_has_no_batches() {
        let batches = plan_batches(Vec::<u32>::new(), 3, Some(10), |_| 1);
        assert!(batches.is_empty());
    }

    #[test]
    fn budget_closes_batches_early() {
        // Token cost equals the value.
        let batches = plan_batches(vec![4, 4, 4, 1, 9], 10, Some(10), |n: &usize| *n);
        assert_eq!(batches, vec![vec![4, 4], vec![4, 1], vec![9]]);
    }

    #[test]
    fn oversized_item_gets_its_own_batch() {
        let batches = plan_batches(vec![2, 50, 2], 10, Some(10), |n: &usize| *n);
        assert_eq!(batches, vec![vec![2], vec![50], vec![2]]);
    }

    #[test]
    fn zero_batch_size_is_treated_as_one() {
        let batches = plan_batches(vec!['a', 'b'], 0, None, |_| 0);
        assert_eq!(batches.len(), 2);
    }
}
