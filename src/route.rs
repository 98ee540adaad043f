//! Route table compilation
//!
//! One walk over the schema tree at startup produces a table of URL templates
//! with their matching tree-query templates. Lists emit two entries: the bare
//! collection form and the keyed member form `name={k1},{k2}` with one
//! placeholder per declared key. Rpc nodes emit POST-only entries under the
//! operations root and are never recursed into. Parents are emitted before
//! their children, and the generic list form before the keyed one, so the
//! most specific template wins on partial-match ties.

use std::sync::Arc;

use crate::error::{RestconfError, Result};
use crate::schema::{SchemaKind, SchemaNode, SchemaTree};

/// Addressable node class of a route entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Leaf,
    Container,
    List,
    Rpc,
}

/// One installed route: a URL template and the query template it maps to.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub url_template: String,
    pub query_template: String,
    pub schema: Arc<SchemaNode>,
    pub kind: RouteKind,
}

/// The compiled route table, immutable for the life of the process.
#[derive(Debug, Default)]
pub struct RouteTable {
    pub data: Vec<RouteEntry>,
    pub operations: Vec<RouteEntry>,
}

impl RouteTable {
    /// Compile the table from the two schema roots. Malformed schema
    /// metadata is fatal: the caller must abort instead of serving a
    /// partial table.
    pub fn compile(tree: &SchemaTree) -> Result<Self> {
        let mut table = Self::default();
        for child in &tree.data.children {
            compile_data_node(child, "", "", &mut table.data)?;
        }
        for child in &tree.operations.children {
            if child.kind != SchemaKind::Rpc {
                return Err(RestconfError::InvalidSchema(format!(
                    "operations root holds non-rpc node {}",
                    child.name
                )));
            }
            table.operations.push(RouteEntry {
                url_template: format!("/{}", child.qualified_name()),
                query_template: child.qualified_name(),
                schema: Arc::clone(child),
                kind: RouteKind::Rpc,
            });
        }
        Ok(table)
    }

    /// Look up an rpc entry by its resource name.
    pub fn find_operation(&self, name: &str) -> Option<&RouteEntry> {
        self.operations
            .iter()
            .find(|e| e.schema.name == name || e.schema.qualified_name() == name)
    }

    /// The first (most generic) entry bound to a schema node.
    pub fn entry_for(&self, schema: &Arc<SchemaNode>) -> Option<&RouteEntry> {
        self.data
            .iter()
            .chain(self.operations.iter())
            .find(|e| Arc::ptr_eq(&e.schema, schema))
    }

    pub fn len(&self) -> usize {
        self.data.len() + self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.operations.is_empty()
    }
}

fn route_kind(kind: SchemaKind) -> RouteKind {
    match kind {
        SchemaKind::Container => RouteKind::Container,
        SchemaKind::List => RouteKind::List,
        SchemaKind::Leaf => RouteKind::Leaf,
        SchemaKind::Rpc => RouteKind::Rpc,
    }
}

fn compile_data_node(
    schema: &Arc<SchemaNode>,
    url_prefix: &str,
    query_prefix: &str,
    out: &mut Vec<RouteEntry>,
) -> Result<()> {
    if schema.kind == SchemaKind::Rpc {
        return Err(RestconfError::InvalidSchema(format!(
            "rpc {} inside the data tree",
            schema.name
        )));
    }
    if schema.kind == SchemaKind::List && schema.keys.is_empty() {
        return Err(RestconfError::InvalidSchema(format!(
            "list {} has no keys to route on",
            schema.name
        )));
    }

    let name = schema.qualified_name();
    let url = format!("{}/{}", url_prefix, name);
    let query = if query_prefix.is_empty() {
        name
    } else {
        format!("{}/{}", query_prefix, schema.qualified_name())
    };

    out.push(RouteEntry {
        url_template: url.clone(),
        query_template: query.clone(),
        schema: Arc::clone(schema),
        kind: route_kind(schema.kind),
    });

    let mut parents = vec![(url, query)];
    if schema.kind == SchemaKind::List {
        let placeholders: Vec<String> =
            schema.keys.iter().map(|k| format!("{{{}}}", k)).collect();
        let keyed_url = format!("{}={}", parents[0].0, placeholders.join(","));
        let mut keyed_query = parents[0].1.clone();
        for key in &schema.keys {
            keyed_query.push_str(&format!("[{}={{{}}}]", key, key));
        }
        out.push(RouteEntry {
            url_template: keyed_url.clone(),
            query_template: keyed_query.clone(),
            schema: Arc::clone(schema),
            kind: RouteKind::List,
        });
        parents.push((keyed_url, keyed_query));
    }

    // Children are installed below every form of their parent, after it.
    if schema.is_dir() {
        for (parent_url, parent_query) in &parents {
            for child in &schema.children {
                compile_data_node(child, parent_url, parent_query, out)?;
            }
        }
    }
    Ok(())
}
