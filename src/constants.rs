//! # Joseta Protocol Constants
//!
//! Wire-level sentinels, frame geometry, command type codes and the driver defaults
//! used when no configuration file is supplied.

// Stream sentinels
pub const JOSETA_START_BYTE: u8 = 0xFF;
pub const JOSETA_ESCAPE_BYTE: u8 = 0xFE;

// Raw frame geometry
pub const JOSETA_RAW_FRAME_SIZE: usize = 15;
pub const JOSETA_CRC_SIZE: usize = 2;
pub const JOSETA_CRC_OFFSET: usize = JOSETA_RAW_FRAME_SIZE - JOSETA_CRC_SIZE;

// Flag bits carried in the first frame byte
pub const JOSETA_FLAG_OCCUPANCY: u8 = 0x01;
pub const JOSETA_FLAG_RELAY: u8 = 0x02;

// Command type codes (high nibble of the first command byte)
pub const JOSETA_CMD_DATA_REQUEST: u8 = 0x1;
pub const JOSETA_CMD_CONTROL: u8 = 0x4;
pub const JOSETA_CMD_STREAM: u8 = 0x5;

pub const JOSETA_COMMAND_SIZE: usize = 3;

/// Payload bit that turns a control command into a time sync.
pub const JOSETA_SYNC_FLAG: u8 = 0x80;
/// Payload bit that enables streaming on a stream command.
pub const JOSETA_STREAM_ENABLE: u8 = 0x80;
pub const JOSETA_MAX_STREAM_RATE: u8 = 0x7F;
pub const JOSETA_MAX_SYNC_OFFSET: u8 = 0x7F;

/// Data request address that every board answers.
pub const JOSETA_BROADCAST_ADDRESS: u8 = 0xF;
/// Frames the board sends back for a one-minute request.
pub const JOSETA_MINUTE_FRAMES: u32 = 60;

pub const SECONDS_PER_DAY: u64 = 86_400;

// Driver defaults
pub const JOSETA_DEFAULT_PURGETHRESH: usize = 60;
pub const JOSETA_DEFAULT_BAUDRATE: u32 = 9600;
pub const JOSETA_UART_BUF: usize = 256;
pub const JOSETA_BUFFER_COUNT: usize = 128;
pub const JOSETA_EVENT_QUEUE_DEPTH: usize = 32;
pub const JOSETA_TIMER_PERIOD_MS: u64 = 10;
pub const JOSETA_TIMER_INTERVAL: u32 = 100;
pub const JOSETA_TIMER_DRIFT: u64 = 1000;
pub const JOSETA_REQUEST_PERIOD: u64 = 60;
pub const JOSETA_SETTLE_DELAY_MS: u64 = 1000;
