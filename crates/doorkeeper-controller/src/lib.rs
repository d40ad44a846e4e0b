//! Door controller for the RFID access system.
//!
//! The controller ties the devices, the card cache, the outbound
//! dispatchers and the gateway together:
//!
//! ```text
//!  card reader ─┐                         ┌─> lock actuator
//!  button panel ┼─> DoorController::tick ─┼─> reader pattern / sound
//!  lock sensors ┘        │       ^        ├─> status display
//!                        v       │        └─> EventLog / Notifier / MembershipUpdater
//!                   AccessCheck  GatewayLink <─── run_sync ───> gateway
//! ```

pub mod access;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod state;

pub use access::AccessCheck;
pub use config::ControllerConfig;
pub use controller::{Devices, DoorController, OPEN_DAY, Outbound};
pub use error::{ControllerError, GatewayError, Result};
pub use gateway::{GatewayClient, GatewayConfig, GatewayLink, GatewayStatus, run_sync};
pub use state::{DoorState, InputSnapshot};
