//! Structural diff operations between two immutable snapshots.
//!
//! A [`Patch`] describes one change at a JSON-pointer path (RFC 6901), the
//! same pointer syntax `serde_json::Value::pointer` resolves. Patches are
//! diagnostic output: the engine computes them only in [`PatchMode::Track`].

use std::env;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment variable an adapter may consult to enable patch tracking.
pub const PATCH_ENV_VAR: &str = "STRATA_PATCHES";

/// Whether the snapshot engine computes patches for each applied step.
///
/// The engine only ever receives this explicit value; there is no implicit
/// process-global toggle inside the core. [`PatchMode::from_env`] exists so
/// an adapter can wire an environment switch at construction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatchMode {
    /// Compute an ordered structural diff for every applied step.
    Track,
    /// Skip diff computation entirely (production default).
    #[default]
    Skip,
}

impl PatchMode {
    /// Read the mode from [`PATCH_ENV_VAR`] (`1`, `true`, or `on` enable
    /// tracking). Anything else, including an unset variable, is `Skip`.
    #[must_use]
    pub fn from_env() -> Self {
        match env::var(PATCH_ENV_VAR) {
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => Self::Track,
                _ => Self::Skip,
            },
            Err(_) => Self::Skip,
        }
    }

    #[must_use]
    pub fn is_tracking(self) -> bool {
        matches!(self, Self::Track)
    }
}

/// Kind of structural change a patch describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

/// One structural change between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub op: PatchOp,
    /// JSON-pointer path of the changed location (`""` is the root).
    pub path: String,
    /// New value for `Add`/`Replace`; absent for `Remove`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Patch {
    #[must_use]
    pub fn add(path: String, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path,
            value: Some(value),
        }
    }

    #[must_use]
    pub fn replace(path: String, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path,
            value: Some(value),
        }
    }

    #[must_use]
    pub fn remove(path: String) -> Self {
        Self {
            op: PatchOp::Remove,
            path,
            value: None,
        }
    }
}

/// Compute the ordered structural diff from `prior` to `next`.
///
/// Objects are diffed key-wise (changed and added keys in `next`'s iteration
/// order, removals after); arrays index-wise over the common prefix with tail
/// adds/removes; everything else by equality, yielding a single `Replace`.
/// Equal inputs yield an empty diff.
#[must_use]
pub fn diff(prior: &Value, next: &Value) -> Vec<Patch> {
    let mut out = Vec::new();
    diff_at(&mut out, String::new(), prior, next);
    out
}

fn diff_at(out: &mut Vec<Patch>, path: String, prior: &Value, next: &Value) {
    match (prior, next) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, next_val) in b {
                let child = child_path(&path, key);
                match a.get(key) {
                    Some(prior_val) => diff_at(out, child, prior_val, next_val),
                    None => out.push(Patch::add(child, next_val.clone())),
                }
            }
            for key in a.keys() {
                if !b.contains_key(key) {
                    out.push(Patch::remove(child_path(&path, key)));
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            let shared = a.len().min(b.len());
            for (index, (prior_val, next_val)) in a.iter().zip(b).enumerate().take(shared) {
                diff_at(out, child_path(&path, &index.to_string()), prior_val, next_val);
            }
            for (index, next_val) in b.iter().enumerate().skip(shared) {
                out.push(Patch::add(
                    child_path(&path, &index.to_string()),
                    next_val.clone(),
                ));
            }
            // Remove from the tail inward so earlier paths stay valid.
            for index in (shared..a.len()).rev() {
                out.push(Patch::remove(child_path(&path, &index.to_string())));
            }
        }
        _ => {
            if prior != next {
                out.push(Patch::replace(path, next.clone()));
            }
        }
    }
}

/// Append one RFC 6901 reference token to a pointer path.
fn child_path(parent: &str, token: &str) -> String {
    let mut path = String::with_capacity(parent.len() + token.len() + 1);
    path.push_str(parent);
    path.push('/');
    for ch in token.chars() {
        match ch {
            '~' => path.push_str("~0"),
            '/' => path.push_str("~1"),
            _ => path.push(ch),
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Patch, PatchMode, PatchOp, diff};

    #[test]
    fn equal_values_produce_no_patches() {
        let v = json!({"count": 3, "items": ["a", "b"]});
        assert!(diff(&v, &v.clone()).is_empty());
    }

    #[test]
    fn scalar_change_is_a_replace_at_the_leaf() {
        let prior = json!({"count": 0});
        let next = json!({"count": 5});
        assert_eq!(
            diff(&prior, &next),
            vec![Patch::replace("/count".into(), json!(5))]
        );
    }

    #[test]
    fn nested_change_carries_the_full_pointer() {
        let prior = json!({"a": {"b": {"c": 1}}});
        let next = json!({"a": {"b": {"c": 2}}});
        assert_eq!(
            diff(&prior, &next),
            vec![Patch::replace("/a/b/c".into(), json!(2))]
        );
    }

    #[test]
    fn added_and_removed_keys() {
        let prior = json!({"old": 1, "kept": 2});
        let next = json!({"kept": 2, "new": 3});
        let patches = diff(&prior, &next);
        assert!(patches.contains(&Patch::add("/new".into(), json!(3))));
        assert!(patches.contains(&Patch::remove("/old".into())));
        assert_eq!(patches.len(), 2);
    }

    #[test]
    fn array_growth_adds_tail_elements() {
        let prior = json!([1, 2]);
        let next = json!([1, 2, 3, 4]);
        assert_eq!(
            diff(&prior, &next),
            vec![
                Patch::add("/2".into(), json!(3)),
                Patch::add("/3".into(), json!(4)),
            ]
        );
    }

    #[test]
    fn array_shrink_removes_from_the_tail_inward() {
        let prior = json!([1, 2, 3]);
        let next = json!([1]);
        assert_eq!(
            diff(&prior, &next),
            vec![Patch::remove("/2".into()), Patch::remove("/1".into())]
        );
    }

    #[test]
    fn array_element_change_diffs_in_place() {
        let prior = json!([{"n": 1}, {"n": 2}]);
        let next = json!([{"n": 1}, {"n": 9}]);
        assert_eq!(
            diff(&prior, &next),
            vec![Patch::replace("/1/n".into(), json!(9))]
        );
    }

    #[test]
    fn type_change_replaces_wholesale() {
        let prior = json!({"v": [1, 2]});
        let next = json!({"v": {"a": 1}});
        assert_eq!(
            diff(&prior, &next),
            vec![Patch::replace("/v".into(), json!({"a": 1}))]
        );
    }

    #[test]
    fn root_scalar_replace_uses_empty_pointer() {
        assert_eq!(
            diff(&json!(1), &json!(2)),
            vec![Patch::replace(String::new(), json!(2))]
        );
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        let prior = json!({"a/b": 1, "c~d": 2});
        let next = json!({"a/b": 9, "c~d": 8});
        let patches = diff(&prior, &next);
        assert!(patches.contains(&Patch::replace("/a~1b".into(), json!(9))));
        assert!(patches.contains(&Patch::replace("/c~0d".into(), json!(8))));
    }

    #[test]
    fn patch_paths_resolve_with_value_pointer() {
        let prior = json!({"a": {"b": [1, 2]}});
        let next = json!({"a": {"b": [1, 7]}});
        let patches = diff(&prior, &next);
        assert_eq!(patches.len(), 1);
        assert_eq!(next.pointer(&patches[0].path), Some(&json!(7)));
    }

    #[test]
    fn patch_serializes_with_lowercase_op() {
        let patch = Patch::remove("/gone".into());
        let v = serde_json::to_value(&patch).unwrap();
        assert_eq!(v, json!({"op": "remove", "path": "/gone"}));
        assert_eq!(v.get("value"), None);
    }

    #[test]
    fn patch_mode_defaults_to_skip() {
        assert_eq!(PatchMode::default(), PatchMode::Skip);
        assert!(!PatchMode::Skip.is_tracking());
        assert!(PatchMode::Track.is_tracking());
    }

    #[test]
    fn patch_op_roundtrips_through_serde() {
        let op: PatchOp = serde_json::from_str("\"replace\"").unwrap();
        assert_eq!(op, PatchOp::Replace);
    }
}
