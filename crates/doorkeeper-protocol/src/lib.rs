pub mod card_decoder;
pub mod line;
pub mod lock;
pub mod panel;
pub mod reader;

pub use card_decoder::{CardDecoder, DecoderState};
pub use line::{LineAssembler, LineKind};
pub use lock::{CalibrationRanges, LockCommand};
pub use reader::{Pattern, Sound};
