pub mod config;
pub mod hub;
pub mod server;

pub use config::{RelayConfig, RunMode};
pub use hub::{Outbox, RoomHub};
pub use server::{serve, spawn, RelayHandle};
