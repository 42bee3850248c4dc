//! Campus - a resource-tree HTTP client
//!
//! The Campus API is described declaratively (a resource tree plus schema
//! definitions, both embedded in the crate). [`get_client`] turns that
//! description into a navigable root; navigation is pure and only terminal
//! operations reach the network:
//!
//! ```no_run
//! # async fn demo() -> campus::Result<()> {
//! use campus::{get_client, ClientConfig, Credential};
//!
//! let config = ClientConfig::new("https://campus.example.com", Credential::Bearer("token".into()))?;
//! let root = get_client(config)?;
//! let user = root.child("users")?.child("alice")?.get().await?;
//! println!("{}", user["name"]);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod resource;
pub mod schema;

pub use api::{CachedCredentials, Credential, CredentialProvider, StaticCredentials};
pub use client::{get_client, load_embedded, ClientBuilder};
pub use config::ClientConfig;
pub use error::{Error, Mismatch, Result, TransportKind};
pub use resource::{invoke_all, BoundResource, BoundSegment, Verb};
pub use schema::SchemaRegistry;
