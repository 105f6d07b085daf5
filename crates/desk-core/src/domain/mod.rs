//! Domain values produced by the desk protocol.
//!
//! Nothing in here knows about bytes on the wire; the codec in
//! [`crate::protocol`] is responsible for turning frames into these types.
//!
//! - [`position::Position`] – a height reading from the controller display.
//! - [`keys::ButtonState`] – the set of handset keys held down in one frame.
//! - [`fault::ControllerFault`] – an `Exx` error code shown by the controller.

pub mod fault;
pub mod keys;
pub mod position;
