//! Persister service: drains `chat-in` into Postgres with at-least-once
//! semantics, retrying transient store failures and dead-lettering the rest.

pub mod handler;

pub use handler::PersistHandler;
