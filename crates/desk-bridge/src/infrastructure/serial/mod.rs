//! Serial line implementations of [`ByteSource`] and [`ByteSink`].
//!
//! [`ByteSource`]: crate::application::ports::ByteSource
//! [`ByteSink`]: crate::application::ports::ByteSink

pub mod mock;
pub mod uart;

pub use uart::{open_uart, UartReader, UartWriter};
