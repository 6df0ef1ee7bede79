//! HTTP surface of the broker
//!
//! Two routes: `GET /auth` renders the sign-in page, `GET /signin` finishes
//! the handshake with a redirect. Handlers are thin wrappers over the
//! handshake pipelines; if the client disconnects mid-handshake axum drops
//! the handler future, so the pipeline stops at its next await point and no
//! storage write happens on behalf of a disconnected client.

pub mod api;
pub mod handlers;
pub mod server;
pub mod state;

pub use api::build_router;
pub use server::BrokerServer;
pub use state::AppState;
