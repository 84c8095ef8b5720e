//! WebSocket gateway for room-scoped chat fan-out.
//!
//! ## Architecture
//!
//! ```text
//! client ──ws──▶ read pump ──▶ chat-in (keyed by room)
//!                   │              │
//!                   ▼              ▼
//!                  Hub ◀── fan-out consumer (peer-gateway records only)
//!                   │
//!                   ▼ bounded outbound queues (self-evicting)
//!               write pumps ──ws──▶ clients
//! ```
//!
//! A message accepted by the read pump is fanned out to local room members
//! through the hub and published to the log in the same breath; the fan-out
//! consumer replays only records that originated on peer gateways, so each
//! subscriber sees a message exactly once per path.

pub mod error;
pub mod fanout;
pub mod hub;
pub mod token;
pub mod ws_server;

pub use error::{GatewayError, Result};
pub use fanout::FanoutHandler;
pub use hub::{ClientId, Hub};
pub use token::{AuthenticatedUser, JwtVerifier, TokenVerifier};
pub use ws_server::{create_router, AppState};
