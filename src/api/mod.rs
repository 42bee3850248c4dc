//! Campus API interaction module
//!
//! Authentication and the HTTP transport that every resource call goes
//! through.
//!
//! # Module Structure
//!
//! - [`auth`] - Credential providers and token caching
//! - [`http`] - URL composition, requests, retries and response validation

pub mod auth;
pub mod http;

pub use auth::{CachedCredentials, Credential, CredentialProvider, StaticCredentials};
pub use http::{ApiRequest, Transport};
