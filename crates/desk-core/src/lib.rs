//! # desk-core
//!
//! Shared library for the desk bridge containing the serial frame assembler,
//! the display/button codec and the domain values they produce.
//!
//! It has no dependencies on async runtimes, serial drivers or GPIO; every
//! function here works on byte slices, which keeps it testable on any host.
//!
//! # Architecture overview
//!
//! A standing desk consists of a motor controller and a wired handset that
//! talk over a 9600 baud serial link using 5-byte frames:
//!
//! ```text
//! [header:1][payload:3][checksum:1]     checksum = sum(payload) mod 256
//! ```
//!
//! Handset frames (`0xA5`) carry a button bitmask; controller frames (`0x5A`)
//! carry three 7-segment digit patterns for the height display.
//!
//! - **`protocol`** – How bytes travel on the wire: the [`Frame`] type, the
//!   [`FrameAssembler`] that recovers frames from a chunked byte stream, the
//!   7-segment digit table, and the decode/encode functions.
//!
//! - **`domain`** – The values decoded frames turn into: [`Position`],
//!   [`ButtonState`] and [`ControllerFault`].

pub mod domain;
pub mod protocol;

pub use domain::fault::ControllerFault;
pub use domain::keys::{Button, ButtonState};
pub use domain::position::Position;
pub use protocol::assembler::{FrameAssembler, FramingError};
pub use protocol::codec::{
    classify, decode_button, decode_display, encode_command, encode_keepalive, ChecksumMismatch,
    DecodeError, Decoded, DisplayReading, EncodeError, FrameKind,
};
pub use protocol::frame::{Frame, CONTROLLER_HEADER, FRAME_LEN, HANDSET_HEADER};
