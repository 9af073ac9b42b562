//! Deterministic test harness for the MedBox client.
//!
//! In-memory implementations of the external-service contracts with fault
//! injection, so the state machines can be exercised end to end without a
//! backend and every run is reproducible.
//!
//! # Components
//!
//! - [`MemoryStore`]: document store with live snapshot push and per-target
//!   read/write faults
//! - [`MemoryGateway`]: identity gateway with deterministic ids and an
//!   injectable network fault
//! - [`SimEnv`]: seeded RNG and virtual clock

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod memory_gateway;
mod memory_store;
mod sim_env;

pub use memory_gateway::MemoryGateway;
pub use memory_store::{FaultTarget, MemoryStore};
pub use sim_env::SimEnv;
