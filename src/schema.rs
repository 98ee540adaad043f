//! YANG schema tree
//!
//! The schema tree is loaded once at startup from one or more JSON schema
//! manifests and is immutable afterwards. Route compilation and resource-path
//! resolution both walk it read-only. Module-level data nodes land under the
//! `data` root and rpc nodes under the `operations` root, mirroring the
//! RESTCONF API resource layout.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{RestconfError, Result};

/// Kind of a schema node, matched exhaustively by the route compiler and the
/// path resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Container,
    List,
    Leaf,
    Rpc,
}

impl SchemaKind {
    fn from_manifest(kind: &str) -> Option<Self> {
        match kind {
            "container" => Some(Self::Container),
            "list" => Some(Self::List),
            "leaf" => Some(Self::Leaf),
            "rpc" => Some(Self::Rpc),
            _ => None,
        }
    }
}

/// A node in the immutable schema tree.
#[derive(Debug)]
pub struct SchemaNode {
    pub name: String,
    /// Module prefix, when the node must be addressed as `prefix:name`
    pub prefix: Option<String>,
    pub kind: SchemaKind,
    /// List key leaf names in declared order; empty for non-list nodes
    pub keys: Vec<String>,
    pub children: Vec<Arc<SchemaNode>>,
    /// Declared rpc input subtree
    pub input: Option<Arc<SchemaNode>>,
    /// Declared rpc output subtree
    pub output: Option<Arc<SchemaNode>>,
}

impl SchemaNode {
    /// An empty container node, used for the data/operations roots.
    pub fn container(name: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: None,
            kind: SchemaKind::Container,
            keys: Vec::new(),
            children: Vec::new(),
            input: None,
            output: None,
        }
    }

    /// Node name as it appears in a resource identifier.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// Look up a child by its plain or prefix-qualified name.
    pub fn child(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.children.iter().find(|c| {
            c.name == name || c.qualified_name() == name
        })
    }

    /// True for nodes that contain further addressable children.
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, SchemaKind::Container | SchemaKind::List)
    }
}

/// The two schema roots of the RESTCONF API resource.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    /// Root of `/restconf/data`
    pub data: Arc<SchemaNode>,
    /// Root of `/restconf/operations`
    pub operations: Arc<SchemaNode>,
}

/// Raw manifest structures for deserialization
#[derive(Debug, Deserialize)]
struct RawManifest {
    module: String,
    #[serde(default)]
    prefix: Option<String>,
    nodes: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    name: String,
    kind: String,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    children: Vec<RawNode>,
    #[serde(default)]
    input: Option<Vec<RawNode>>,
    #[serde(default)]
    output: Option<Vec<RawNode>>,
}

impl SchemaTree {
    /// Load and merge one or more schema manifests.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut data = SchemaNode::container("data");
        let mut operations = SchemaNode::container("operations");
        for path in paths {
            let content = fs::read_to_string(path.as_ref())?;
            Self::merge_manifest(&content, &mut data, &mut operations)?;
        }
        Ok(Self {
            data: Arc::new(data),
            operations: Arc::new(operations),
        })
    }

    /// Load a single manifest from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut data = SchemaNode::container("data");
        let mut operations = SchemaNode::container("operations");
        Self::merge_manifest(content, &mut data, &mut operations)?;
        Ok(Self {
            data: Arc::new(data),
            operations: Arc::new(operations),
        })
    }

    fn merge_manifest(
        content: &str,
        data: &mut SchemaNode,
        operations: &mut SchemaNode,
    ) -> Result<()> {
        let raw: RawManifest = serde_json::from_str(content)?;
        for node in raw.nodes {
            let built = build_node(node, raw.prefix.as_deref(), &raw.module)?;
            match built.kind {
                SchemaKind::Rpc => operations.children.push(built),
                _ => data.children.push(built),
            }
        }
        Ok(())
    }
}

/// Convert a raw manifest node, validating the metadata the route compiler
/// depends on. Only top-level nodes carry the module prefix; descendants are
/// addressed by bare name.
fn build_node(raw: RawNode, prefix: Option<&str>, module: &str) -> Result<Arc<SchemaNode>> {
    let kind = SchemaKind::from_manifest(&raw.kind).ok_or_else(|| {
        RestconfError::InvalidSchema(format!(
            "{}: node {} has unknown kind {:?}",
            module, raw.name, raw.kind
        ))
    })?;

    match kind {
        SchemaKind::List if raw.keys.is_empty() => {
            return Err(RestconfError::InvalidSchema(format!(
                "{}: list {} declares no keys",
                module, raw.name
            )));
        }
        SchemaKind::Leaf if !raw.children.is_empty() => {
            return Err(RestconfError::InvalidSchema(format!(
                "{}: leaf {} must not have children",
                module, raw.name
            )));
        }
        _ if kind != SchemaKind::List && !raw.keys.is_empty() => {
            return Err(RestconfError::InvalidSchema(format!(
                "{}: {} {} must not declare keys",
                module, raw.kind, raw.name
            )));
        }
        _ => {}
    }

    let name = raw.name;
    let keys = raw.keys;

    let children = raw
        .children
        .into_iter()
        .map(|c| build_node(c, None, module))
        .collect::<Result<Vec<_>>>()?;

    if kind == SchemaKind::List {
        for key in &keys {
            if !children.iter().any(|c| c.name == *key) {
                return Err(RestconfError::InvalidSchema(format!(
                    "{}: list {} key {} is not one of its leaves",
                    module, name, key
                )));
            }
        }
    }

    let input = match raw.input {
        Some(nodes) if kind == SchemaKind::Rpc => Some(Arc::new(SchemaNode {
            name: "input".to_string(),
            prefix: None,
            kind: SchemaKind::Container,
            keys: Vec::new(),
            children: nodes
                .into_iter()
                .map(|c| build_node(c, None, module))
                .collect::<Result<Vec<_>>>()?,
            input: None,
            output: None,
        })),
        Some(_) => {
            return Err(RestconfError::InvalidSchema(format!(
                "{}: {} declares rpc input but is not an rpc",
                module, name
            )));
        }
        None => None,
    };
    let output = match raw.output {
        Some(nodes) if kind == SchemaKind::Rpc => Some(Arc::new(SchemaNode {
            name: "output".to_string(),
            prefix: None,
            kind: SchemaKind::Container,
            keys: Vec::new(),
            children: nodes
                .into_iter()
                .map(|c| build_node(c, None, module))
                .collect::<Result<Vec<_>>>()?,
            input: None,
            output: None,
        })),
        Some(_) => {
            return Err(RestconfError::InvalidSchema(format!(
                "{}: {} declares rpc output but is not an rpc",
                module, name
            )));
        }
        None => None,
    };

    Ok(Arc::new(SchemaNode {
        name,
        prefix: prefix.map(str::to_string),
        kind,
        keys,
        children,
        input,
        output,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// ietf-yang-library subset used across the crate's tests.
    pub(crate) const SAMPLE_MANIFEST: &str = r#"{
        "module": "ietf-yang-library",
        "nodes": [
            {
                "name": "modules-state",
                "kind": "container",
                "children": [
                    {
                        "name": "module",
                        "kind": "list",
                        "keys": ["name", "revision"],
                        "children": [
                            {"name": "name", "kind": "leaf"},
                            {"name": "revision", "kind": "leaf"},
                            {"name": "namespace", "kind": "leaf"}
                        ]
                    }
                ]
            },
            {
                "name": "reset",
                "kind": "rpc",
                "input": [{"name": "delay", "kind": "leaf"}],
                "output": [{"name": "finished-at", "kind": "leaf"}]
            }
        ]
    }"#;

    #[test]
    fn test_manifest_roots() {
        let tree = SchemaTree::from_json_str(SAMPLE_MANIFEST).unwrap();
        assert!(tree.data.child("modules-state").is_some());
        assert!(tree.data.child("reset").is_none());
        assert!(tree.operations.child("reset").is_some());
    }

    #[test]
    fn test_list_metadata() {
        let tree = SchemaTree::from_json_str(SAMPLE_MANIFEST).unwrap();
        let module = tree
            .data
            .child("modules-state")
            .and_then(|c| c.child("module"))
            .unwrap();
        assert_eq!(module.kind, SchemaKind::List);
        assert_eq!(module.keys, vec!["name", "revision"]);
    }

    #[test]
    fn test_rpc_subtrees() {
        let tree = SchemaTree::from_json_str(SAMPLE_MANIFEST).unwrap();
        let reset = tree.operations.child("reset").unwrap();
        assert_eq!(reset.kind, SchemaKind::Rpc);
        assert!(reset.input.as_ref().unwrap().child("delay").is_some());
        assert!(reset.output.as_ref().unwrap().child("finished-at").is_some());
    }

    #[test]
    fn test_list_without_keys_rejected() {
        let manifest = r#"{
            "module": "bad",
            "nodes": [{"name": "l", "kind": "list", "children": [{"name": "x", "kind": "leaf"}]}]
        }"#;
        let err = SchemaTree::from_json_str(manifest).unwrap_err();
        assert!(matches!(err, RestconfError::InvalidSchema(_)));
    }

    #[test]
    fn test_key_must_be_child_leaf() {
        let manifest = r#"{
            "module": "bad",
            "nodes": [{"name": "l", "kind": "list", "keys": ["missing"],
                       "children": [{"name": "x", "kind": "leaf"}]}]
        }"#;
        assert!(SchemaTree::from_json_str(manifest).is_err());
    }

    #[test]
    fn test_prefixed_lookup() {
        let manifest = r#"{
            "module": "example-mod",
            "prefix": "ex",
            "nodes": [{"name": "top", "kind": "container", "children": []}]
        }"#;
        let tree = SchemaTree::from_json_str(manifest).unwrap();
        assert!(tree.data.child("top").is_some());
        assert!(tree.data.child("ex:top").is_some());
        assert_eq!(tree.data.child("top").unwrap().qualified_name(), "ex:top");
    }
}
