//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the ledger and the outside world.
//!
//! - **Driving Port (Inbound)**: `DatasetMarketApi`
//! - **Driven Ports (Outbound)**: `TokenGateway`, `EventSink`, `Clock`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
