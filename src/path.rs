//! Resource-identifier resolution
//!
//! Converts a REST resource identifier (RFC 8040 3.5.3) into a tree-query
//! expression with bracketed key predicates, walking the schema tree segment
//! by segment.
//!
//! A list member is addressed as `name=k1,k2` with the key values in declared
//! key order, and a key value may itself contain `/`. Splitting the identifier
//! on `/` is therefore ambiguous: a segment that does not resolve to a schema
//! child while a key token is pending is folded back into that key value.
//! `modules-state/module=1/1,2020-08-18` resolves to
//! `modules-state/module[name=1/1][revision=2020-08-18]`. The cost of this
//! leniency is that a genuinely bogus trailing segment after a keyed list
//! member is also folded into the last key value instead of being rejected;
//! only a segment with no pending key context is a hard error.

use std::sync::Arc;

use crate::error::{RestconfError, Result};
use crate::schema::{SchemaKind, SchemaNode};

/// One resolved path step: a schema node plus the key predicates bound to it.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    pub schema: Arc<SchemaNode>,
    /// `(key name, key value)` pairs in declared key order
    pub predicates: Vec<(String, String)>,
}

/// A fully resolved resource identifier.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPath {
    pub steps: Vec<ResolvedStep>,
}

impl ResolvedPath {
    /// The schema node the identifier addresses; `None` for the root itself.
    pub fn target(&self) -> Option<&Arc<SchemaNode>> {
        self.steps.last().map(|s| &s.schema)
    }

    /// True when the identifier addresses a list without a full key, i.e.
    /// the collection form that merges all members into one group result.
    pub fn is_collection(&self) -> bool {
        match self.steps.last() {
            Some(step) => {
                step.schema.kind == SchemaKind::List
                    && step.predicates.len() < step.schema.keys.len()
            }
            None => false,
        }
    }

    /// The tree-query expression, e.g.
    /// `modules-state/module[name=x][revision=y]/namespace`.
    pub fn query(&self) -> String {
        let mut out = String::new();
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            out.push_str(&step.schema.qualified_name());
            for (key, value) in &step.predicates {
                out.push('[');
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push(']');
            }
        }
        out
    }

    /// Rebuild the REST resource identifier this path denotes.
    pub fn resource_identifier(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push('/');
            out.push_str(&step.schema.qualified_name());
            if !step.predicates.is_empty() {
                out.push('=');
                let values: Vec<&str> =
                    step.predicates.iter().map(|(_, v)| v.as_str()).collect();
                out.push_str(&values.join(","));
            }
        }
        out
    }
}

/// Resolve a percent-decoded resource identifier against a schema subtree.
///
/// An empty identifier resolves to the subtree root (an empty step list).
pub fn resolve(root: &Arc<SchemaNode>, rpath: &str) -> Result<ResolvedPath> {
    let mut path = ResolvedPath::default();
    let mut current = Arc::clone(root);
    // Key-value token accumulating for the list step most recently pushed.
    let mut pending: Option<String> = None;

    for segment in rpath.split('/') {
        if segment.is_empty() {
            continue;
        }
        match segment.split_once('=') {
            Some((name, keypart)) => match current.child(name) {
                Some(child) => {
                    if child.keys.is_empty() {
                        return Err(RestconfError::UnresolvablePath(format!(
                            "{}: key predicate on non-list node {}",
                            rpath, name
                        )));
                    }
                    flush_pending(&mut pending, &mut path);
                    let child = Arc::clone(child);
                    current = Arc::clone(&child);
                    path.steps.push(ResolvedStep {
                        schema: child,
                        predicates: Vec::new(),
                    });
                    pending = Some(keypart.to_string());
                }
                // A key value containing '=' continues the pending token.
                None => append_pending(&mut pending, segment, rpath)?,
            },
            None => match current.child(segment) {
                Some(child) => {
                    flush_pending(&mut pending, &mut path);
                    let child = Arc::clone(child);
                    current = Arc::clone(&child);
                    path.steps.push(ResolvedStep {
                        schema: child,
                        predicates: Vec::new(),
                    });
                }
                // A key value containing '/' was split apart; recover it.
                None => append_pending(&mut pending, segment, rpath)?,
            },
        }
    }
    flush_pending(&mut pending, &mut path);
    Ok(path)
}

/// Re-append a segment that did not resolve to a schema child. Legal only
/// while a key token is pending; otherwise the identifier is unresolvable.
fn append_pending(pending: &mut Option<String>, segment: &str, rpath: &str) -> Result<()> {
    match pending {
        Some(token) => {
            token.push('/');
            token.push_str(segment);
            Ok(())
        }
        None => Err(RestconfError::UnresolvablePath(format!(
            "{}: no schema node for segment {}",
            rpath, segment
        ))),
    }
}

/// Bind the accumulated key token to the pending list step, positionally in
/// declared key order. Excess comma-separated text, where the segmentation is
/// irreducibly ambiguous, binds to the last key.
fn flush_pending(pending: &mut Option<String>, path: &mut ResolvedPath) {
    let Some(token) = pending.take() else {
        return;
    };
    let Some(step) = path.steps.last_mut() else {
        return;
    };
    let keys = &step.schema.keys;
    let mut values: Vec<String> = token.split(',').map(str::to_string).collect();
    if values.len() > keys.len() && !keys.is_empty() {
        let tail = values.split_off(keys.len() - 1).join(",");
        values.push(tail);
    }
    for (key, value) in keys.iter().zip(values) {
        step.predicates.push((key.clone(), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaTree;
    use crate::schema::tests::SAMPLE_MANIFEST;

    fn data_root() -> Arc<SchemaNode> {
        SchemaTree::from_json_str(SAMPLE_MANIFEST).unwrap().data
    }

    #[test]
    fn test_keyed_member_with_leaf() {
        let root = data_root();
        let path =
            resolve(&root, "modules-state/module=yangtree,2020-08-18/namespace").unwrap();
        assert_eq!(
            path.query(),
            "modules-state/module[name=yangtree][revision=2020-08-18]/namespace"
        );
        assert!(!path.is_collection());
    }

    #[test]
    fn test_keyed_member_trailing_slash() {
        let root = data_root();
        for rpath in [
            "modules-state/module=yangtree,2020-08-18/",
            "modules-state/module=yangtree,2020-08-18",
        ] {
            let path = resolve(&root, rpath).unwrap();
            assert_eq!(
                path.query(),
                "modules-state/module[name=yangtree][revision=2020-08-18]"
            );
        }
    }

    #[test]
    fn test_collection_form() {
        let root = data_root();
        let path = resolve(&root, "modules-state/module").unwrap();
        assert_eq!(path.query(), "modules-state/module");
        assert!(path.is_collection());
    }

    #[test]
    fn test_slash_in_key_value() {
        let root = data_root();
        let path = resolve(&root, "modules-state/module=1/1,2020-08-18/").unwrap();
        assert_eq!(
            path.query(),
            "modules-state/module[name=1/1][revision=2020-08-18]"
        );

        let path = resolve(&root, "modules-state/module=1/1/1,2020-08-18/").unwrap();
        assert_eq!(
            path.query(),
            "modules-state/module[name=1/1/1][revision=2020-08-18]"
        );
    }

    #[test]
    fn test_unresolvable_tail_folds_into_pending_key() {
        // Documented leniency: junk after a keyed member is folded into the
        // last key value rather than rejected.
        let root = data_root();
        let path = resolve(&root, "modules-state/module=A,2020-08-18/UNKNOWN").unwrap();
        assert_eq!(
            path.query(),
            "modules-state/module[name=A][revision=2020-08-18/UNKNOWN]"
        );
    }

    #[test]
    fn test_unresolvable_segment_without_pending_key() {
        let root = data_root();
        let err = resolve(&root, "modules-state/UNKNOWN").unwrap_err();
        assert!(matches!(err, RestconfError::UnresolvablePath(_)));

        let err = resolve(&root, "UNKNOWN").unwrap_err();
        assert!(matches!(err, RestconfError::UnresolvablePath(_)));
    }

    #[test]
    fn test_excess_comma_binds_to_last_key() {
        let root = data_root();
        let path = resolve(&root, "modules-state/module=a,b,c").unwrap();
        assert_eq!(
            path.query(),
            "modules-state/module[name=a][revision=b,c]"
        );
    }

    #[test]
    fn test_partial_key_is_collection() {
        let root = data_root();
        let path = resolve(&root, "modules-state/module=a").unwrap();
        assert_eq!(path.query(), "modules-state/module[name=a]");
        assert!(path.is_collection());
    }

    #[test]
    fn test_key_predicate_on_non_list() {
        let root = data_root();
        assert!(resolve(&root, "modules-state=x").is_err());
    }

    #[test]
    fn test_empty_identifier_is_root() {
        let root = data_root();
        let path = resolve(&root, "").unwrap();
        assert!(path.steps.is_empty());
        assert!(path.target().is_none());
    }

    #[test]
    fn test_round_trip() {
        let root = data_root();
        let first =
            resolve(&root, "modules-state/module=yangtree,2020-08-18/namespace").unwrap();
        let rebuilt = first.resource_identifier();
        let second = resolve(&root, &rebuilt).unwrap();
        assert_eq!(first.query(), second.query());
    }
}
