//! 7-segment digit decoding for controller display frames.
//!
//! Each payload byte of a controller frame is the segment pattern of one
//! display digit.  Bit 7 is the decimal point; bits 0-6 are segments:
//!
//! ```text
//!     -2-
//!   |     |
//!   5     1
//!   |     |
//!     -6-
//!   |     |
//!   4     0
//!   |     |
//!     -3-   7
//! ```
//!
//! The controller does not follow this wiring for every glyph: `4` arrives as
//! `0x66` (true wiring would be `0x63`) and `E` arrives as `0x79` (true wiring
//! would be `0x7C`).  The table holds the bytes the controller actually sends.

/// Decimal point bit.
pub const DECIMAL_POINT: u8 = 0x80;

/// Glyph returned for any pattern not in the table.
pub const UNKNOWN_GLYPH: u8 = b'?';

/// Glyph the controller uses to prefix fault codes.
pub const FAULT_GLYPH: u8 = b'E';

/// Segment pattern → ASCII glyph.  Zero entries are unmapped.
static GLYPHS: [u8; 128] = {
    let mut t = [0u8; 128];
    t[0x3F] = b'0';
    t[0x06] = b'1';
    t[0x5B] = b'2';
    t[0x4F] = b'3';
    t[0x66] = b'4'; // not 0x63
    t[0x6D] = b'5';
    t[0x7D] = b'6';
    t[0x07] = b'7';
    t[0x7F] = b'8';
    t[0x6F] = b'9';
    // Status glyphs.
    t[0x77] = b'R';
    t[0x78] = b'T';
    t[0x79] = b'E'; // not 0x7C
    t
};

/// Decodes one display byte into its ASCII glyph and decimal-point flag.
///
/// Unmapped patterns decode to `?` with the decimal point cleared.
///
/// ```rust
/// use desk_core::protocol::digits::digit;
///
/// assert_eq!(digit(0x06), (b'1', false));
/// assert_eq!(digit(0x86), (b'1', true));
/// assert_eq!(digit(0x80), (b'?', false));
/// ```
pub fn digit(b: u8) -> (u8, bool) {
    match GLYPHS[(b & !DECIMAL_POINT) as usize] {
        0 => (UNKNOWN_GLYPH, false),
        glyph => (glyph, b & DECIMAL_POINT != 0),
    }
}

/// Segment pattern for an ASCII glyph, without the decimal point.
///
/// Inverse of [`digit`] for mapped glyphs.
pub fn segments(glyph: u8) -> Option<u8> {
    GLYPHS.iter().position(|g| *g == glyph).map(|i| i as u8)
}
