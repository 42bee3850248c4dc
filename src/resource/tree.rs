//! Resource Tree - Load the declarative resource description
//!
//! The tree is parsed from YAML (JSON works too) and validated in full
//! before any client is handed out. Errors here are load-time errors: a
//! broken tree never produces a usable client.

use super::Verb;
use crate::error::{Error, Result};
use crate::schema::SchemaRegistry;
use regex::Regex;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

/// One path segment of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A fixed path segment such as `users`
    Literal(String),
    /// A placeholder such as `{user_id}`, holding the parameter name
    Parameter(String),
}

impl Segment {
    fn parse(raw: &str) -> std::result::Result<Self, String> {
        if raw.is_empty() {
            return Err("empty segment name".to_string());
        }
        if raw.contains('/') {
            return Err(format!("segment `{}` must not contain `/`", raw));
        }

        if let Some(inner) = raw.strip_prefix('{') {
            let Some(name) = inner.strip_suffix('}') else {
                return Err(format!("unbalanced braces in segment `{}`", raw));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("parameter segment `{}` has no name", raw));
            }
            if name.contains(|c| c == '{' || c == '}') {
                return Err(format!("unbalanced braces in segment `{}`", raw));
            }
            return Ok(Segment::Parameter(name.to_string()));
        }

        if raw.contains(|c| c == '{' || c == '}') {
            return Err(format!("unbalanced braces in segment `{}`", raw));
        }
        Ok(Segment::Literal(raw.to_string()))
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self, Segment::Parameter(_))
    }
}

/// Shape of a node, derived from its segment and children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Container,
    Parameterized,
}

/// One node of the resource tree
#[derive(Debug)]
pub struct ResourceNode {
    name: String,
    segment: Segment,
    operations: BTreeSet<Verb>,
    children: BTreeMap<String, Arc<ResourceNode>>,
    parameter: Option<Arc<ResourceNode>>,
    schema: Option<String>,
    responses: BTreeMap<Verb, Option<String>>,
    request_schema: Option<String>,
    pattern: Option<Regex>,
}

impl ResourceNode {
    /// Raw segment name as written in the description (`users`, `{user_id}`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn kind(&self) -> NodeKind {
        if self.segment.is_parameter() {
            NodeKind::Parameterized
        } else if self.children.is_empty() && self.parameter.is_none() {
            NodeKind::Leaf
        } else {
            NodeKind::Container
        }
    }

    /// Allowed operations, in a stable order
    pub fn operations(&self) -> impl Iterator<Item = Verb> + '_ {
        self.operations.iter().copied()
    }

    pub fn allows(&self, verb: Verb) -> bool {
        self.operations.contains(&verb)
    }

    /// Look up a literal child by exact name
    pub fn literal_child(&self, name: &str) -> Option<&Arc<ResourceNode>> {
        self.children.get(name)
    }

    /// The parameterized child, if this node has one
    pub fn parameter_child(&self) -> Option<&Arc<ResourceNode>> {
        self.parameter.as_ref()
    }

    /// All children, literal ones first in name order
    pub fn children(&self) -> impl Iterator<Item = &Arc<ResourceNode>> + '_ {
        self.children.values().chain(self.parameter.iter())
    }

    /// Schema used to validate the response of `verb`
    pub fn response_schema(&self, verb: Verb) -> Option<&str> {
        match self.responses.get(&verb) {
            Some(over) => over.as_deref(),
            None => self.schema.as_deref(),
        }
    }

    /// Schema used to validate request bodies
    pub fn request_schema(&self) -> Option<&str> {
        self.request_schema.as_deref()
    }

    /// Pattern a bound parameter value must match
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// True if this node or any descendant allows an operation
    pub fn has_reachable_operations(&self) -> bool {
        !self.operations.is_empty() || self.children().any(|c| c.has_reachable_operations())
    }

    /// Depth-first listing of every descendant with its template path
    pub fn walk(&self) -> Vec<(String, &ResourceNode)> {
        let mut out = Vec::new();
        self.walk_into("", &mut out);
        out
    }

    fn walk_into<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a ResourceNode)>) {
        for child in self.children() {
            let path = format!("{}/{}", prefix, child.name);
            out.push((path.clone(), child.as_ref()));
            child.walk_into(&path, out);
        }
    }

    fn count(&self) -> usize {
        1 + self.children().map(|c| c.count()).sum::<usize>()
    }
}

/// The loaded, validated resource tree
#[derive(Debug, Clone)]
pub struct ResourceTree {
    root: Arc<ResourceNode>,
}

impl ResourceTree {
    /// Parse and validate a tree description against a schema registry
    pub fn load(source: &str, registry: &SchemaRegistry) -> Result<Self> {
        let entries: Entries = if source.trim().is_empty() {
            Entries::default()
        } else {
            serde_yaml::from_str(source)
                .map_err(|e| Error::tree("/", format!("failed to parse resource tree: {}", e)))?
        };

        let root_desc = NodeDesc {
            children: entries,
            ..NodeDesc::default()
        };
        let root = build_node("", Segment::Literal(String::new()), root_desc, "", registry)?;

        tracing::debug!("Loaded resource tree with {} nodes", root.count() - 1);

        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Arc<ResourceNode> {
        &self.root
    }
}

/// Raw node description as written in the tree file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeDesc {
    #[serde(default)]
    operations: Vec<String>,
    #[serde(default)]
    children: Entries,
    #[serde(default)]
    schema: Option<String>,
    /// Per-verb response schema overrides; `~` disables validation
    #[serde(default)]
    responses: BTreeMap<String, Option<String>>,
    #[serde(default)]
    request: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
}

/// Child entries kept in file order, duplicates included, so that the
/// builder can report them instead of a map silently collapsing them
#[derive(Debug, Default)]
struct Entries(Vec<(String, NodeDesc)>);

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of path segments to resource descriptions")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Entries, E> {
                Ok(Entries::default())
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Entries, E> {
                Ok(Entries::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Entries, A::Error> {
                let mut entries = Vec::new();
                while let Some((name, desc)) = map.next_entry::<String, Option<NodeDesc>>()? {
                    entries.push((name, desc.unwrap_or_default()));
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_any(EntriesVisitor)
    }
}

fn build_node(
    name: &str,
    segment: Segment,
    desc: NodeDesc,
    path: &str,
    registry: &SchemaRegistry,
) -> Result<ResourceNode> {
    let display_path = if path.is_empty() { "/" } else { path };

    let mut operations = BTreeSet::new();
    for op in &desc.operations {
        let verb: Verb = op.parse().map_err(|e: String| Error::tree(display_path, e))?;
        operations.insert(verb);
    }

    let mut responses = BTreeMap::new();
    for (op, schema) in desc.responses {
        let verb: Verb = op.parse().map_err(|e: String| Error::tree(display_path, e))?;
        if !operations.contains(&verb) {
            return Err(Error::tree(
                display_path,
                format!("response schema given for {} which is not an allowed operation", verb),
            ));
        }
        responses.insert(verb, schema);
    }

    let referenced = desc
        .schema
        .iter()
        .chain(desc.request.iter())
        .chain(responses.values().flatten());
    for schema in referenced {
        if !registry.contains(schema) {
            return Err(Error::SchemaNotFound {
                name: schema.clone(),
                referenced_by: format!("resource `{}`", display_path),
            });
        }
    }

    let pattern = match (&segment, desc.pattern) {
        (_, None) => None,
        (Segment::Literal(_), Some(_)) => {
            return Err(Error::tree(
                display_path,
                "only parameterized segments may declare a pattern",
            ));
        }
        (Segment::Parameter(_), Some(p)) => {
            let anchored = format!("^(?:{})$", p);
            let re = Regex::new(&anchored)
                .map_err(|e| Error::tree(display_path, format!("invalid pattern `{}`: {}", p, e)))?;
            Some(re)
        }
    };

    let mut children = BTreeMap::new();
    let mut parameter: Option<Arc<ResourceNode>> = None;
    let mut seen = HashSet::new();

    for (child_name, child_desc) in desc.children.0 {
        let child_path = format!("{}/{}", path, child_name);
        if !seen.insert(child_name.clone()) {
            return Err(Error::tree(
                display_path,
                format!("duplicate child `{}`", child_name),
            ));
        }

        let child_segment =
            Segment::parse(&child_name).map_err(|reason| Error::tree(&child_path, reason))?;
        let child = build_node(&child_name, child_segment, child_desc, &child_path, registry)?;

        if child.segment.is_parameter() {
            if let Some(existing) = &parameter {
                return Err(Error::tree(
                    display_path,
                    format!(
                        "more than one parameterized child (`{}` and `{}`)",
                        existing.name, child_name
                    ),
                ));
            }
            parameter = Some(Arc::new(child));
        } else {
            children.insert(child_name, Arc::new(child));
        }
    }

    let node = ResourceNode {
        name: name.to_string(),
        segment,
        operations,
        children,
        parameter,
        schema: desc.schema,
        responses,
        request_schema: desc.request,
        pattern,
    };

    if node.segment.is_parameter() && !node.has_reachable_operations() {
        return Err(Error::tree(
            display_path,
            "parameterized segment has no operations on itself or any descendant",
        ));
    }

    if !node.segment.is_parameter() && !path.is_empty() && !node.has_reachable_operations() {
        tracing::warn!("Resource `{}` has no reachable operations", display_path);
    }

    Ok(node)
}
