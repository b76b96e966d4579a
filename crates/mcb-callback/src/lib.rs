pub mod api;
pub mod canonical;
pub mod config;
pub mod error;
pub mod handler;
pub mod keystore;
pub mod metrics;
pub mod policy;
pub mod server;
pub mod types;

#[cfg(test)]
mod proptests;

pub use error::CallbackError;
pub use handler::CallbackHandler;
pub use keystore::KeyStore;
pub use server::CallbackServer;
