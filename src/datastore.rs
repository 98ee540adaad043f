//! Unified YANG datastore management
//!
//! The Datastore owns the runtime data tree bound to the `data` schema root
//! and answers tree-query lookups from the request coordinator. Results are
//! owned snapshots taken under the request's lock; nothing is cached across
//! requests.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{RestconfError, Result};
use crate::schema::{SchemaKind, SchemaNode};

/// An addressable instance in the runtime tree, bound to one schema node.
#[derive(Debug, Clone)]
pub struct DataNode {
    /// Stable composite identifier: node name plus ordered key values
    pub id: String,
    pub name: String,
    pub schema: Arc<SchemaNode>,
    pub value: Value,
}

/// The runtime data tree for `/restconf/data`.
#[derive(Debug, Clone)]
pub struct Datastore {
    schema: Arc<SchemaNode>,
    data: Value,
}

impl Datastore {
    /// Create an empty datastore bound to the data schema root.
    pub fn new(schema: Arc<SchemaNode>) -> Self {
        Self {
            schema,
            data: Value::Object(Map::new()),
        }
    }

    /// Create a datastore with initial data.
    pub fn with_data(schema: Arc<SchemaNode>, data: Value) -> Self {
        Self { schema, data }
    }

    /// Create a datastore from a JSON string.
    pub fn from_json(schema: Arc<SchemaNode>, json: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(json)?;
        Ok(Self::with_data(schema, data))
    }

    pub fn schema(&self) -> &Arc<SchemaNode> {
        &self.schema
    }

    /// Replace the whole tree, used when loading startup data.
    pub fn replace(&mut self, data: Value) {
        self.data = data;
    }

    /// The whole tree as a single node.
    pub fn root_node(&self) -> DataNode {
        DataNode {
            id: self.schema.name.clone(),
            name: self.schema.name.clone(),
            schema: Arc::clone(&self.schema),
            value: self.data.clone(),
        }
    }

    /// Look up all data nodes matching a tree-query expression such as
    /// `modules-state/module[name=x][revision=y]/namespace`.
    ///
    /// Zero results is not an error here; the caller decides whether an empty
    /// result set is reportable.
    pub fn find(&self, query: &str) -> Result<Vec<DataNode>> {
        let steps = parse_query(query)?;
        if steps.is_empty() {
            return Ok(vec![self.root_node()]);
        }

        let mut schema = Arc::clone(&self.schema);
        let mut candidates: Vec<(String, Value)> =
            vec![(schema.name.clone(), self.data.clone())];

        for step in &steps {
            let child = schema.child(&step.name).ok_or_else(|| {
                RestconfError::UnresolvablePath(format!(
                    "{}: no schema node for {}",
                    query, step.name
                ))
            })?;
            let child = Arc::clone(child);
            let mut next: Vec<(String, Value)> = Vec::new();
            for (_, value) in &candidates {
                let Some(sub) = lookup_member(value, &child) else {
                    continue;
                };
                match child.kind {
                    SchemaKind::List => {
                        let Value::Array(members) = sub else {
                            continue;
                        };
                        for member in members {
                            if member_matches(&member, &step.predicates) {
                                let id = member_id(&child, &member);
                                next.push((id, member));
                            }
                        }
                    }
                    SchemaKind::Container | SchemaKind::Leaf => {
                        next.push((child.name.clone(), sub));
                    }
                    SchemaKind::Rpc => {
                        return Err(RestconfError::UnresolvablePath(format!(
                            "{}: rpc {} is not addressable as data",
                            query, child.name
                        )));
                    }
                }
            }
            schema = child;
            candidates = next;
            if candidates.is_empty() {
                break;
            }
        }

        Ok(candidates
            .into_iter()
            .map(|(id, value)| DataNode {
                id,
                name: schema.name.clone(),
                schema: Arc::clone(&schema),
                value,
            })
            .collect())
    }

    /// Synthesize one grouped representation from sibling nodes of the same
    /// schema, used for collection requests and multi-parent matches.
    pub fn group(&self, schema: &Arc<SchemaNode>, nodes: &[DataNode]) -> Result<DataNode> {
        if nodes.is_empty() {
            return Err(RestconfError::DataMissing(format!(
                "{}: nothing to group",
                schema.name
            )));
        }
        if nodes.iter().any(|n| !Arc::ptr_eq(&n.schema, schema)) {
            return Err(RestconfError::RpcFailed(format!(
                "{}: group members bound to different schema nodes",
                schema.name
            )));
        }
        let members: Vec<Value> = nodes.iter().map(|n| n.value.clone()).collect();
        Ok(DataNode {
            id: schema.name.clone(),
            name: schema.name.clone(),
            schema: Arc::clone(schema),
            value: Value::Array(members),
        })
    }
}

/// Fetch the child entry for a schema node from an object value, accepting
/// both the plain and the prefix-qualified member name.
fn lookup_member(value: &Value, child: &SchemaNode) -> Option<Value> {
    let obj = value.as_object()?;
    obj.get(&child.name)
        .or_else(|| obj.get(&child.qualified_name()))
        .cloned()
}

fn member_matches(member: &Value, predicates: &[(String, String)]) -> bool {
    predicates.iter().all(|(key, expected)| {
        member
            .get(key)
            .map(|v| value_text(v) == *expected)
            .unwrap_or(false)
    })
}

/// Composite identifier of a list member, from its own key leaf values.
fn member_id(schema: &SchemaNode, member: &Value) -> String {
    let mut id = schema.name.clone();
    for key in &schema.keys {
        let value = member.get(key).map(value_text).unwrap_or_default();
        id.push('[');
        id.push_str(key);
        id.push('=');
        id.push_str(&value);
        id.push(']');
    }
    id
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug)]
struct QueryStep {
    name: String,
    predicates: Vec<(String, String)>,
}

/// Split a query expression into steps. `/` separates steps only outside
/// `[...]` predicates, since key values may contain slashes.
fn parse_query(query: &str) -> Result<Vec<QueryStep>> {
    let mut steps = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let bytes = query.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b'/' if depth == 0 => {
                if i > start {
                    steps.push(parse_step(&query[start..i])?);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < query.len() {
        steps.push(parse_step(&query[start..])?);
    }
    Ok(steps)
}

fn parse_step(step: &str) -> Result<QueryStep> {
    let (name, rest) = match step.find('[') {
        Some(pos) => (&step[..pos], &step[pos..]),
        None => (step, ""),
    };
    if name.is_empty() {
        return Err(RestconfError::UnresolvablePath(format!(
            "empty step in query near {:?}",
            step
        )));
    }
    let mut predicates = Vec::new();
    let mut remainder = rest;
    while let Some(stripped) = remainder.strip_prefix('[') {
        let end = stripped.find(']').ok_or_else(|| {
            RestconfError::UnresolvablePath(format!("unterminated predicate in {:?}", step))
        })?;
        let clause = &stripped[..end];
        let (key, value) = clause.split_once('=').ok_or_else(|| {
            RestconfError::UnresolvablePath(format!("malformed predicate in {:?}", step))
        })?;
        predicates.push((key.to_string(), value.to_string()));
        remainder = &stripped[end + 1..];
    }
    Ok(QueryStep {
        name: name.to_string(),
        predicates,
    })
}
