//! Wire protocol: frames, framing, digit table and codec.

pub mod assembler;
pub mod codec;
pub mod digits;
pub mod frame;
