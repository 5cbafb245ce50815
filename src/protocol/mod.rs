//! The protocol module contains the wire-level pieces of the Joseta link: CRC, raw
//! frame layout, the escape/resync de-framer, the link state machine and the command
//! encoder. Nothing in here blocks or shares state.

pub mod command;
pub mod crc;
pub mod deframer;
pub mod frame;
pub mod link;

pub use command::{ByteSink, Command, CommandEncoder};
pub use crc::{crc16, verify};
pub use deframer::{stuff_frame, Deframer};
pub use frame::{parse, parse_frame, FrameFlags, ParsedRecord, RawFields, RawFrame};
pub use link::{on_complete_frame, Action, Clock, Discard, LinkState};
