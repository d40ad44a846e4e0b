//! Mock devices for testing without hardware.

pub mod devices;
pub mod serial;

pub use devices::{
    MockCardSource, MockCardSourceHandle, MockDoorLock, MockDoorLockHandle, MockPanel,
    RecordingDisplay,
};
pub use serial::{MockSerial, MockSerialHandle};
