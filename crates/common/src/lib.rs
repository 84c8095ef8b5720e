//! Types and utilities shared by the chat services.

pub mod config;
pub mod signal;
pub mod wire;

pub use wire::{InboundFrame, WireMessage, SYSTEM_AUTHOR};
