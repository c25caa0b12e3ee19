//! Protocol implementations.

pub mod crc;
pub mod frame;

// Re-export common types
pub use crc::crc32;
pub use frame::{FRAME_MAGIC, FRAME_OVERHEAD, Frame, Opcode};
