//! Snapshot engine: apply one mutation to an immutable value.
//!
//! The engine never touches the container's bookkeeping; it is a pure step
//! function from `(current, mutator)` to `(next, patches)` that the flush
//! scheduler calls once per drained step.

use std::sync::Arc;

use serde::Serialize;

use strata_types::{MutateError, Patch, PatchMode, diff};

/// Apply `mutate` to a draft of `current` and freeze a new snapshot.
///
/// The draft is a clone of `*current`, so writes to it never affect the
/// current state. Structural sharing is the persistent-data idiom: `Arc`
/// subtrees inside `S` keep pointer identity across the clone, and a mutator
/// that needs to edit one goes through `Arc::make_mut`, copying only the
/// touched spine. A mutator that writes nothing yields a snapshot
/// structurally equal to `current` with every `Arc` subtree shared.
///
/// With [`PatchMode::Track`] both sides are serialized and diffed into an
/// ordered patch list; with [`PatchMode::Skip`] no serialization happens and
/// the patch list is empty.
pub fn apply<S, F>(
    current: &Arc<S>,
    mutate: F,
    mode: PatchMode,
) -> Result<(Arc<S>, Vec<Patch>), MutateError>
where
    S: Clone + Serialize,
    F: FnOnce(&mut S, &S) -> Result<(), MutateError>,
{
    let prior: &S = current.as_ref();
    let mut draft = prior.clone();
    mutate(&mut draft, prior)?;

    let patches = if mode.is_tracking() {
        compute_patches(prior, &draft)?
    } else {
        Vec::new()
    };

    Ok((Arc::new(draft), patches))
}

fn compute_patches<S: Serialize>(prior: &S, next: &S) -> Result<Vec<Patch>, MutateError> {
    let before = serde_json::to_value(prior).map_err(MutateError::diagnostics)?;
    let after = serde_json::to_value(next).map_err(MutateError::diagnostics)?;
    Ok(diff(&before, &after))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::Serialize;
    use serde_json::json;

    use strata_types::{MutateError, PatchMode, PatchOp};

    use super::apply;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Counter {
        count: u64,
        labels: Arc<Vec<String>>,
    }

    fn counter(count: u64) -> Arc<Counter> {
        Arc::new(Counter {
            count,
            labels: Arc::new(vec!["a".into()]),
        })
    }

    #[test]
    fn apply_produces_new_snapshot_without_touching_current() {
        let current = counter(0);
        let (next, _) = apply(
            &current,
            |draft, _| {
                draft.count = 5;
                Ok(())
            },
            PatchMode::Skip,
        )
        .unwrap();
        assert_eq!(current.count, 0);
        assert_eq!(next.count, 5);
    }

    #[test]
    fn mutator_sees_the_prior_state() {
        let current = counter(3);
        let (next, _) = apply(
            &current,
            |draft, prior| {
                draft.count = prior.count + 1;
                Ok(())
            },
            PatchMode::Skip,
        )
        .unwrap();
        assert_eq!(next.count, 4);
    }

    #[test]
    fn untouched_arc_subtree_is_shared() {
        let current = counter(0);
        let (next, _) = apply(
            &current,
            |draft, _| {
                draft.count = 1;
                Ok(())
            },
            PatchMode::Skip,
        )
        .unwrap();
        assert!(Arc::ptr_eq(&current.labels, &next.labels));
    }

    #[test]
    fn no_write_mutator_yields_equal_state() {
        let current = counter(7);
        let (next, patches) = apply(&current, |_, _| Ok(()), PatchMode::Track).unwrap();
        assert_eq!(*next, *current);
        assert!(patches.is_empty());
    }

    #[test]
    fn tracked_apply_reports_the_write() {
        let current = counter(0);
        let (_, patches) = apply(
            &current,
            |draft, _| {
                draft.count = 9;
                Ok(())
            },
            PatchMode::Track,
        )
        .unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].op, PatchOp::Replace);
        assert_eq!(patches[0].path, "/count");
        assert_eq!(patches[0].value, Some(json!(9)));
    }

    #[test]
    fn skip_mode_reports_no_patches_even_for_writes() {
        let current = counter(0);
        let (_, patches) = apply(
            &current,
            |draft, _| {
                draft.count = 9;
                Ok(())
            },
            PatchMode::Skip,
        )
        .unwrap();
        assert!(patches.is_empty());
    }

    #[test]
    fn failing_mutator_propagates_without_a_snapshot() {
        let current = counter(0);
        let result = apply(
            &current,
            |_, _| Err(MutateError::mutator("boom")),
            PatchMode::Skip,
        );
        assert_eq!(result.unwrap_err(), MutateError::Mutator("boom".into()));
        assert_eq!(current.count, 0);
    }
}
