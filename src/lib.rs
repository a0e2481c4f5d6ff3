pub mod auth;
pub mod config;
pub mod console;
pub mod error;
pub mod kafka;
pub mod metadata;
pub mod utils;

pub use config::ConsoleConfig;
pub use console::{Console, ConsoleEvent, ConsoleEvents, ConsoleHandle, ConsoleOutcome, Ticket};
pub use error::{AuthError, ConsoleError, Result};
pub use kafka::{ConnectionConfig, ConsumedMessage, DeliveryReceipt, OutboundMessage, SecurityProtocol};
pub use metadata::{DataKind, NormalizedRecord};
