//! Application layer for the MedBox client.
//!
//! Wires the pure state machines from [`medbox_client`] to the external
//! services: gateway identity notifications and store snapshots flow in,
//! resolver actions are executed, and a [`ViewState`] is derived for
//! whatever frontend hosts the portal. The same orchestration code runs in
//! production and against the deterministic test harness.
//!
//! # Components
//!
//! - [`Portal`]: single-tasked dispatch loop and command surface
//! - [`ViewState`]: reactive view model published over a watch channel
//! - [`SystemEnv`]: production time/randomness environment

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod portal;
mod system_env;
mod view;

pub use portal::{Portal, PortalError};
pub use system_env::SystemEnv;
pub use view::{PortalView, ViewState};
