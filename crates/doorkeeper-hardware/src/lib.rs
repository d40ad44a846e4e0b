//! Serial device layer of the door controller.
//!
//! The door hardware consists of three serial-attached modules: a card
//! reader, a lock actuator and a button panel. Each module is owned by a
//! session that polls it from a dedicated thread, because `serialport` I/O is
//! blocking. The controller only sees the traits in [`traits`], so the
//! sessions and the in-memory [`mock`] devices are interchangeable.
//!
//! # Example
//!
//! ```no_run
//! use doorkeeper_hardware::{
//!     CardReaderSession, LockConfig, LockSession, ReaderConfig, Shutdown, open_serial,
//! };
//!
//! # fn main() -> doorkeeper_hardware::Result<()> {
//! let shutdown = Shutdown::new();
//! let (reader, _reader_thread) = CardReaderSession::spawn(
//!     open_serial("/dev/ttyUSB0", 115_200)?,
//!     ReaderConfig::default(),
//!     shutdown.clone(),
//! )?;
//! let (lock, _lock_thread) = LockSession::spawn(
//!     open_serial("/dev/ttyUSB1", 115_200)?,
//!     LockConfig::default(),
//!     shutdown.clone(),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod display;
pub mod error;
pub mod lock;
pub mod mock;
pub mod panel;
pub mod reader;
pub mod traits;
pub mod transport;
pub mod types;
pub mod worker;

pub use display::LogDisplay;
pub use error::{HardwareError, Result};
pub use lock::{LockConfig, LockSession};
pub use panel::{PanelConfig, SerialButtonPanel};
pub use reader::{CardReaderSession, ReaderConfig};
pub use traits::{ButtonPanel, CardSource, DoorLock, StatusDisplay};
pub use transport::{SerialTransport, open_serial};
pub use types::Color;
pub use worker::Shutdown;
