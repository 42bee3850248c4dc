//! Resource abstraction layer
//!
//! This module turns a declarative resource tree into a navigable value
//! graph. The tree is loaded once (see [`tree`]) and shared read-only;
//! navigation produces [`BoundResource`] values that accumulate path
//! segments and bound parameters until a terminal operation is invoked.
//!
//! # Architecture
//!
//! - [`tree`] - Parses and validates the resource tree description
//! - [`bound`] - Navigation state and terminal operations
//!
//! # Resource Tree
//!
//! The Campus tree is embedded from `src/resources/api_tree.yaml`:
//!
//! ```yaml
//! users:
//!   operations: [POST]
//!   children:
//!     "{user_id}":
//!       operations: [GET, PUT, DELETE]
//!       schema: User
//! ```
//!
//! # Example
//!
//! ```ignore
//! let root = campus::get_client(config)?;
//! let user = root.child("users")?.child("alice")?.get().await?;
//! ```

pub(crate) mod bound;
mod tree;

use std::fmt;
use std::str::FromStr;

pub use bound::{invoke_all, BoundResource, BoundSegment};
pub use tree::{NodeKind, ResourceNode, ResourceTree, Segment};

/// HTTP verbs a resource may allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// Every recognized verb
    pub const ALL: [Verb; 5] = [Verb::Get, Verb::Post, Verb::Put, Verb::Patch, Verb::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    /// Verbs whose request normally carries a body
    pub fn expects_body(self) -> bool {
        matches!(self, Verb::Post | Verb::Put | Verb::Patch)
    }

    pub(crate) fn to_method(self) -> reqwest::Method {
        match self {
            Verb::Get => reqwest::Method::GET,
            Verb::Post => reqwest::Method::POST,
            Verb::Put => reqwest::Method::PUT,
            Verb::Patch => reqwest::Method::PATCH,
            Verb::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unrecognized operation `{}`", s))
    }
}
