// src/adapters/mod.rs
pub mod memory;
pub mod postgres;

pub use memory::{FaultPoint, MemoryStore, MemoryTx};
pub use postgres::{PostgresStore, PostgresTx};
