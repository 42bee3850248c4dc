//! Client construction
//!
//! Loads the schema registry and resource tree, builds the transport and
//! hands back the root [`BoundResource`].

use crate::api::auth::{CredentialProvider, StaticCredentials};
use crate::api::http::Transport;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::resource::bound::Context;
use crate::resource::{BoundResource, ResourceTree};
use crate::schema::SchemaRegistry;
use std::sync::Arc;

/// Resource tree shipped with the crate
pub const API_TREE: &str = include_str!("resources/api_tree.yaml");

/// Schema definitions shipped with the crate
pub const SCHEMA: &str = include_str!("resources/schema.yaml");

/// Load the embedded schemas and resource tree
pub fn load_embedded() -> Result<(SchemaRegistry, ResourceTree)> {
    let registry = SchemaRegistry::load(SCHEMA)?;
    let tree = ResourceTree::load(API_TREE, &registry)?;
    Ok((registry, tree))
}

/// Build a client for the embedded Campus API
pub fn get_client(config: ClientConfig) -> Result<BoundResource> {
    ClientBuilder::new(config).build()
}

/// Builder for clients with a custom tree, schema set or credential source
pub struct ClientBuilder {
    config: ClientConfig,
    tree_source: Option<String>,
    schema_source: Option<String>,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            tree_source: None,
            schema_source: None,
            credentials: None,
        }
    }

    /// Use a YAML resource tree instead of the embedded one
    pub fn tree_source(mut self, source: impl Into<String>) -> Self {
        self.tree_source = Some(source.into());
        self
    }

    /// Use YAML schema definitions instead of the embedded ones
    pub fn schema_source(mut self, source: impl Into<String>) -> Self {
        self.schema_source = Some(source.into());
        self
    }

    /// Fetch credentials from `provider` instead of the configuration
    pub fn credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn build(self) -> Result<BoundResource> {
        let registry = SchemaRegistry::load(self.schema_source.as_deref().unwrap_or(SCHEMA))?;
        let tree = ResourceTree::load(self.tree_source.as_deref().unwrap_or(API_TREE), &registry)?;

        let credentials = self.credentials.unwrap_or_else(|| {
            Arc::new(StaticCredentials::new(self.config.credentials.clone()))
        });

        let transport = Transport::new(&self.config, credentials, Arc::new(registry))?;

        tracing::debug!(
            "Client ready for {} ({} top-level resources)",
            self.config.base_url,
            tree.root().children().count()
        );

        Ok(BoundResource::root(Arc::new(Context { transport, tree })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::Credential;
    use crate::error::Error;
    use crate::resource::Verb;

    fn config() -> ClientConfig {
        ClientConfig::new("http://localhost:5000", Credential::Bearer("t".to_string())).unwrap()
    }

    #[test]
    fn test_embedded_artifacts_load() {
        let (registry, tree) = load_embedded().unwrap();
        assert!(registry.contains("User"));
        assert!(registry.contains("Circle"));

        let paths: Vec<String> = tree.root().walk().into_iter().map(|(p, _)| p).collect();
        assert!(paths.contains(&"/users/{user_id}".to_string()));
        assert!(paths.contains(&"/circles/{circle_id}/members/{member_id}".to_string()));
    }

    #[test]
    fn test_embedded_client_navigation() {
        let client = get_client(config()).unwrap();
        let user = client.at("users/alice").unwrap();
        assert_eq!(user.operations(), vec![Verb::Get, Verb::Put, Verb::Delete]);

        let circle = client.at("circles/uid-circle-0a1b2c3d").unwrap();
        assert!(circle.children().contains(&"members".to_string()));

        let err = client.at("clients/alice").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn test_bad_tree_source_rejected() {
        let err = ClientBuilder::new(config())
            .tree_source("users:\n  operations: [FETCH]\n")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ResourceTree { .. }));
    }

    #[test]
    fn test_tree_must_match_schemas() {
        let err = ClientBuilder::new(config())
            .schema_source("")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaNotFound { .. }));
    }
}
