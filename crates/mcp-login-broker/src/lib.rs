//! MCP Login Broker
//!
//! An OAuth 2.0 authorization broker that sits between an MCP host (a generic
//! OAuth client) and a social-login identity provider. The broker mediates the
//! authorization-code flow and hands a verified identity payload to the
//! token-issuing component.
//!
//! # Security mechanisms
//!
//! - **CSRF guard**: double-submit token on the consent form
//! - **Session binding**: `SHA-256(state)` cookie ties the IdP round trip to one browser
//! - **Approval cache**: HMAC-signed list of clients the user already consented to
//! - **One-time state**: pending requests are consumed with an atomic take
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mcp_login_broker::config::Config;
//! use mcp_login_broker::exchange::HttpIdentityExchange;
//! use mcp_login_broker::flow::AuthorizationFlow;
//! use mcp_login_broker::issuer::CodeIssuer;
//! use mcp_login_broker::registry::InMemoryClientRegistry;
//! use mcp_login_broker::store::MemoryKvStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let exchange = HttpIdentityExchange::new(&config)?;
//!     let flow = AuthorizationFlow::new(
//!         config,
//!         Arc::new(MemoryKvStore::new()),
//!         Arc::new(InMemoryClientRegistry::new()),
//!         Arc::new(exchange),
//!         Arc::new(CodeIssuer::new()),
//!     )?;
//!
//!     // Serve `flow` with `server::transport::create_router`
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod idp;
pub mod issuer;
pub mod models;
pub mod registry;
pub mod security;
pub mod server;
pub mod store;

pub use config::Config;
pub use error::FlowError;
pub use flow::AuthorizationFlow;
