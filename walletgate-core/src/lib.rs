//! walletgate-core: a local authentication broker for decentralized-identity
//! sign-in. An application's signed request comes in over HTTP, the user
//! picks one of their seed-derived identities, and a signed, transit-
//! encrypted credential goes back out, with the identity's public profile
//! reconciled against the application's storage endpoint along the way.

pub mod backup;
pub mod config;
pub mod error;
pub mod handshake;
pub mod http;
pub mod hub;
pub mod identity;
pub mod keys;
pub mod logging;
pub mod manifest;
pub mod profile;
pub mod registry;
pub mod token;

pub use config::BrokerConfig;
pub use error::{BrokerError, BrokerResult};
pub use handshake::Broker;
pub use http::BrokerServer;
pub use keys::{Seed, TransitKeys};
pub use logging::{init_logging, LogLevel};
