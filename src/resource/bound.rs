//! Bound resources - navigation state over the resource tree
//!
//! A [`BoundResource`] is a position in the tree plus the parameter values
//! bound on the way there. Navigating never touches the network; only the
//! terminal operations (`get`, `post`, ...) reach the transport.

use super::tree::{ResourceNode, ResourceTree, Segment};
use super::Verb;
use crate::api::http::{ApiRequest, Transport};
use crate::error::{Error, Mismatch, Result};
use crate::schema::validate_request;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Immutable pieces shared by every resource of one client
pub(crate) struct Context {
    pub(crate) transport: Transport,
    pub(crate) tree: ResourceTree,
}

/// One step of a navigation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundSegment {
    Literal(String),
    Parameter { name: String, value: String },
}

impl BoundSegment {
    /// The text that ends up in the URL
    pub fn value(&self) -> &str {
        match self {
            BoundSegment::Literal(s) => s,
            BoundSegment::Parameter { value, .. } => value,
        }
    }
}

/// A resource position with its bound parameters
#[derive(Clone)]
pub struct BoundResource {
    context: Arc<Context>,
    node: Arc<ResourceNode>,
    segments: Vec<BoundSegment>,
    timeout: Option<Duration>,
}

impl BoundResource {
    pub(crate) fn root(context: Arc<Context>) -> Self {
        let node = context.tree.root().clone();
        Self {
            context,
            node,
            segments: Vec::new(),
            timeout: None,
        }
    }

    fn descend(&self, node: Arc<ResourceNode>, segment: BoundSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self {
            context: self.context.clone(),
            node,
            segments,
            timeout: self.timeout,
        }
    }

    /// Descend into a child
    ///
    /// A literal child with this name wins; otherwise the name is bound as
    /// the value of the parameterized child.
    pub fn child(&self, name: &str) -> Result<Self> {
        if let Some(node) = self.node.literal_child(name) {
            return Ok(self.descend(node.clone(), BoundSegment::Literal(name.to_string())));
        }

        // Dot segments would be collapsed by URL normalization
        let addressable = !matches!(name, "" | "." | "..");
        let Some(node) = self.node.parameter_child().filter(|_| addressable) else {
            return Err(Error::UnknownResource {
                path: self.path(),
                name: name.to_string(),
            });
        };

        if let Some(re) = node.pattern() {
            if !re.is_match(name) {
                return Err(Error::InvalidParameter {
                    path: format!("{}/{}", self.path().trim_end_matches('/'), node.name()),
                    value: name.to_string(),
                    pattern: re.as_str().to_string(),
                });
            }
        }

        let param = match node.segment() {
            Segment::Parameter(p) | Segment::Literal(p) => p.clone(),
        };
        Ok(self.descend(
            node.clone(),
            BoundSegment::Parameter {
                name: param,
                value: name.to_string(),
            },
        ))
    }

    /// Descend through every `/`-separated segment of `path`
    pub fn at(&self, path: &str) -> Result<Self> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self.clone(), |resource, segment| resource.child(segment))
    }

    /// Same position, with a timeout applied to calls made from it
    pub fn with_timeout(&self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::Configuration(format!(
                "timeout for `{}` must be positive",
                self.path()
            )));
        }
        let mut next = self.clone();
        next.timeout = Some(timeout);
        Ok(next)
    }

    /// Concrete path, e.g. `/users/alice`
    pub fn path(&self) -> String {
        let joined = self
            .segments
            .iter()
            .map(|s| s.value())
            .collect::<Vec<_>>()
            .join("/");
        format!("/{}", joined)
    }

    pub fn segments(&self) -> &[BoundSegment] {
        &self.segments
    }

    /// Value bound to a named parameter along the path
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            BoundSegment::Parameter { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn node(&self) -> &ResourceNode {
        &self.node
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn operations(&self) -> Vec<Verb> {
        self.node.operations().collect()
    }

    /// Names accepted by [`child`](Self::child); the parameter as `{name}`
    pub fn children(&self) -> Vec<String> {
        self.node.children().map(|c| c.name().to_string()).collect()
    }

    /// Build the request for `verb` without sending it
    pub fn prepare(&self, verb: Verb, body: Option<Value>) -> Result<ApiRequest> {
        if !self.node.allows(verb) {
            return Err(Error::OperationNotAllowed {
                path: self.path(),
                verb,
                allowed: self.operations(),
            });
        }

        if let Some(schema) = self.node.request_schema() {
            if body.is_some() || verb.expects_body() {
                let null = Value::Null;
                let value = body.as_ref().unwrap_or(&null);
                validate_request(self.context.transport.registry(), schema, value)
                    .map_err(Error::InvalidRequest)?;
            }
        }

        Ok(ApiRequest {
            method: verb,
            segments: self.segments.iter().map(|s| s.value().to_string()).collect(),
            body,
            response_schema: self.node.response_schema(verb).map(str::to_string),
            timeout: self.timeout,
        })
    }

    /// Perform `verb` on this resource
    pub async fn invoke(&self, verb: Verb, body: Option<Value>) -> Result<Value> {
        let request = self.prepare(verb, body)?;
        self.context.transport.execute(&request).await
    }

    /// Perform `verb` and deserialize the validated response
    pub async fn invoke_as<T: DeserializeOwned>(&self, verb: Verb, body: Option<Value>) -> Result<T> {
        let value = self.invoke(verb, body).await?;
        serde_json::from_value(value).map_err(|e| {
            Error::SchemaMismatch(Mismatch {
                schema: self
                    .node
                    .response_schema(verb)
                    .unwrap_or(std::any::type_name::<T>())
                    .to_string(),
                field_path: "$".to_string(),
                reason: e.to_string(),
            })
        })
    }

    pub async fn get(&self) -> Result<Value> {
        self.invoke(Verb::Get, None).await
    }

    pub async fn delete(&self) -> Result<Value> {
        self.invoke(Verb::Delete, None).await
    }

    pub async fn post(&self, body: Value) -> Result<Value> {
        self.invoke(Verb::Post, Some(body)).await
    }

    pub async fn put(&self, body: Value) -> Result<Value> {
        self.invoke(Verb::Put, Some(body)).await
    }

    pub async fn patch(&self, body: Value) -> Result<Value> {
        self.invoke(Verb::Patch, Some(body)).await
    }
}

impl fmt::Debug for BoundResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundResource")
            .field("path", &self.path())
            .field("operations", &self.operations())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Display for BoundResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Run independent calls concurrently; results come back in input order
pub async fn invoke_all<I>(calls: I) -> Vec<Result<Value>>
where
    I: IntoIterator<Item = (BoundResource, Verb, Option<Value>)>,
{
    let pending = calls
        .into_iter()
        .map(|(resource, verb, body)| async move { resource.invoke(verb, body).await });
    futures::future::join_all(pending).await
}
