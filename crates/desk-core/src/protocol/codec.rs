//! Decoding and encoding of desk protocol frame bodies.
//!
//! Decoders take the 4-byte *body* of a frame (three payload bytes followed by
//! the checksum) and report checksum failures softly: the best-effort value is
//! still returned inside a [`Decoded`] so the caller can decide whether to
//! trust it.  Structural problems (wrong length, two decimal points) are hard
//! errors and yield no value.
//!
//! Controller display bodies fall into one of four readings:
//!
//! ```text
//! 00 00 00 00            → NoHeight
//! 77 6D 78 5C   ("RST")  → Reset
//! 79 d1 d2 cs   ("Exx")  → Fault(xx)
//! d0 d1 d2 cs            → Height
//! ```

use thiserror::Error;

use crate::domain::fault::ControllerFault;
use crate::domain::keys::{Button, ButtonState};
use crate::domain::position::Position;
use crate::protocol::digits::{digit, FAULT_GLYPH};
use crate::protocol::frame::{checksum, Frame, CONTROLLER_HEADER, HANDSET_HEADER};

/// Length of a frame body: three payload bytes plus the checksum.
pub const BODY_LEN: usize = 4;

/// Body sent by the controller while the display is blank.
const NO_HEIGHT_BODY: [u8; BODY_LEN] = [0x00, 0x00, 0x00, 0x00];

/// Body sent by the controller while it shows `RST` after a reset.
const RESET_BODY: [u8; BODY_LEN] = [0x77, 0x6D, 0x78, 0x5C];

/// Checksum byte that disagrees with the payload it covers.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("checksum mismatch: frame carries {received:#04x}, payload sums to {computed:#04x}")]
pub struct ChecksumMismatch {
    pub received: u8,
    pub computed: u8,
}

/// Errors that prevent a frame body from being decoded at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body is not exactly [`BODY_LEN`] bytes.
    #[error("invalid packet length: need {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// More than one display digit has its decimal point lit.
    #[error("unexpected decimal point at digit {position}")]
    ExtraDecimalPoint { position: usize },

    /// The frame header is neither the handset nor the controller header.
    #[error("unknown frame header {0:#04x}")]
    UnknownHeader(u8),

    /// A checksum mismatch promoted to a hard error by [`Decoded::strict`].
    #[error(transparent)]
    Checksum(#[from] ChecksumMismatch),
}

/// Errors that can occur when building a command frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("invalid memory slot {0}: must be 1-4")]
    InvalidSlot(u8),
}

/// A decoded value together with the result of its checksum check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded<T> {
    pub value: T,
    /// `Some` when the checksum byte did not match the payload.
    pub mismatch: Option<ChecksumMismatch>,
}

impl<T> Decoded<T> {
    /// A value whose checksum matched.
    pub fn trusted(value: T) -> Self {
        Self {
            value,
            mismatch: None,
        }
    }

    /// Returns `true` when the checksum matched.
    pub fn is_trusted(&self) -> bool {
        self.mismatch.is_none()
    }

    /// Discards the value if the checksum did not match.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Checksum`] on a mismatch.
    pub fn strict(self) -> Result<T, DecodeError> {
        match self.mismatch {
            None => Ok(self.value),
            Some(m) => Err(m.into()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        Decoded {
            value: f(self.value),
            mismatch: self.mismatch,
        }
    }
}

/// What a controller display frame says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayReading {
    /// A height reading.
    Height(Position),
    /// The display is blank; the current height is unknown.
    NoHeight,
    /// The controller is showing `RST` and needs a reset sequence.
    Reset,
    /// The controller is showing an `Exx` error code.
    Fault(ControllerFault),
}

/// Every frame falls into exactly one of these categories.
///
/// Produced once by [`classify`] so that readers dispatch on the category
/// instead of re-inspecting bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Button(Decoded<ButtonState>),
    DisplayValue(Decoded<Position>),
    DisplayNoHeight,
    DisplayReset,
    DisplayFault(Decoded<ControllerFault>),
    Malformed(DecodeError),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes the body of a handset (`0xA5`) frame into the set of held keys.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] unless `body` is 4 bytes.  A bad
/// checksum is reported through [`Decoded::mismatch`], not as an error.
///
/// # Examples
///
/// ```rust
/// use desk_core::decode_button;
///
/// let keys = decode_button(&[0x60, 0x00, 0x00, 0x60]).unwrap();
/// assert!(keys.is_trusted());
/// assert_eq!(keys.value.to_string(), "ud");
/// ```
pub fn decode_button(body: &[u8]) -> Result<Decoded<ButtonState>, DecodeError> {
    require_body(body)?;
    Ok(Decoded {
        value: ButtonState::from_bits(body[0]),
        mismatch: verify(body),
    })
}

/// Decodes the body of a controller (`0x5A`) frame.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidLength`] unless `body` is 4 bytes, and
/// [`DecodeError::ExtraDecimalPoint`] when more than one digit carries a
/// decimal point.  A bad checksum on a height or fault is reported through
/// [`Decoded::mismatch`] alongside the decoded value.
///
/// # Examples
///
/// ```rust
/// use desk_core::{decode_display, DisplayReading, Position};
///
/// // "72.5"
/// let reading = decode_display(&[0x07, 0xDB, 0x6D, 0x4F]).unwrap();
/// assert_eq!(reading.value, DisplayReading::Height(Position::new(725, -1)));
/// ```
pub fn decode_display(body: &[u8]) -> Result<Decoded<DisplayReading>, DecodeError> {
    require_body(body)?;
    if body == NO_HEIGHT_BODY {
        return Ok(Decoded::trusted(DisplayReading::NoHeight));
    }
    if body == RESET_BODY {
        return Ok(Decoded::trusted(DisplayReading::Reset));
    }
    if let Some(fault) = decode_fault(body) {
        return Ok(fault.map(DisplayReading::Fault));
    }

    let mut mantissa: i32 = 0;
    let mut point: Option<usize> = None;
    for (i, b) in body[..3].iter().enumerate() {
        let (glyph, dot) = digit(*b);
        if dot {
            if point.is_some() {
                return Err(DecodeError::ExtraDecimalPoint { position: i });
            }
            point = Some(i);
        }
        mantissa = 10 * mantissa + i32::from(glyph.wrapping_sub(b'0'));
    }
    let exponent = point.map_or(0, |i| i as i32 - 2);

    Ok(Decoded {
        value: DisplayReading::Height(Position::new(mantissa, exponent)),
        mismatch: verify(body),
    })
}

/// Builds the frame that recalls memory preset `slot` (1-4).
///
/// The payload is `[0x00, 1 << slot, 0xFF - (1 << slot)]`, which always sums
/// to `0xFF`.
///
/// # Errors
///
/// Returns [`EncodeError::InvalidSlot`] for slots outside 1-4.
///
/// # Examples
///
/// ```rust
/// use desk_core::encode_command;
///
/// let frame = encode_command(2).unwrap();
/// assert_eq!(frame.as_bytes(), &[0xA5, 0x00, 0x04, 0xFB, 0xFF]);
/// ```
pub fn encode_command(slot: u8) -> Result<Frame, EncodeError> {
    let button = Button::preset(slot).ok_or(EncodeError::InvalidSlot(slot))?;
    let b = ButtonState::NONE.with(button).bits();
    Ok(Frame::from_bytes([HANDSET_HEADER, 0x00, b, 0xFF - b, 0xFF]))
}

/// Builds the up+down chord frame used to keep the controller awake.
///
/// Holding up and down together never moves the desk but still counts as
/// handset activity for the controller's inactivity timer.
pub fn encode_keepalive() -> Frame {
    let b = ButtonState::NONE.with(Button::Up).with(Button::Down).bits();
    Frame::from_bytes([HANDSET_HEADER, 0x00, b, 0xFF - b, 0xFF])
}

/// Sorts a frame into its [`FrameKind`] by header and body.
pub fn classify(frame: &Frame) -> FrameKind {
    match frame.header() {
        HANDSET_HEADER => match decode_button(frame.body()) {
            Ok(keys) => FrameKind::Button(keys),
            Err(e) => FrameKind::Malformed(e),
        },
        CONTROLLER_HEADER => match decode_display(frame.body()) {
            Ok(Decoded {
                value: DisplayReading::Height(p),
                mismatch,
            }) => FrameKind::DisplayValue(Decoded { value: p, mismatch }),
            Ok(Decoded {
                value: DisplayReading::Fault(f),
                mismatch,
            }) => FrameKind::DisplayFault(Decoded { value: f, mismatch }),
            Ok(Decoded {
                value: DisplayReading::NoHeight,
                ..
            }) => FrameKind::DisplayNoHeight,
            Ok(Decoded {
                value: DisplayReading::Reset,
                ..
            }) => FrameKind::DisplayReset,
            Err(e) => FrameKind::Malformed(e),
        },
        other => FrameKind::Malformed(DecodeError::UnknownHeader(other)),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn require_body(body: &[u8]) -> Result<(), DecodeError> {
    if body.len() != BODY_LEN {
        return Err(DecodeError::InvalidLength {
            expected: BODY_LEN,
            actual: body.len(),
        });
    }
    Ok(())
}

/// Checks the last byte of `body` against the sum of the rest.
fn verify(body: &[u8]) -> Option<ChecksumMismatch> {
    let computed = checksum(&body[..3]);
    let received = body[3];
    (computed != received).then_some(ChecksumMismatch { received, computed })
}

/// Decodes an `Exx` fault body, or returns `None` if the first digit is not `E`.
///
/// The code digits go through the same ASCII arithmetic as heights, so a
/// garbled digit yields a garbled code rather than an error.
fn decode_fault(body: &[u8]) -> Option<Decoded<ControllerFault>> {
    if digit(body[0]).0 != FAULT_GLYPH {
        return None;
    }
    let (hi, _) = digit(body[1]);
    let (lo, _) = digit(body[2]);
    let code = hi
        .wrapping_sub(b'0')
        .wrapping_mul(10)
        .wrapping_add(lo.wrapping_sub(b'0'));
    Some(Decoded {
        value: ControllerFault::new(code),
        mismatch: verify(body),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn body(payload: [u8; 3]) -> [u8; 4] {
        [payload[0], payload[1], payload[2], checksum(&payload)]
    }

    // ── Buttons ──────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_button_no_press_is_underscore() {
        let keys = decode_button(&body([0x00, 0x00, 0x00])).unwrap();
        assert_eq!(keys.value, ButtonState::NONE);
        assert_eq!(keys.value.to_string(), "_");
    }

    #[test]
    fn test_decode_button_each_bit_maps_to_its_symbol() {
        for (bit, symbol) in "m1234ud".chars().enumerate() {
            let keys = decode_button(&body([1 << bit, 0, 0])).unwrap();
            assert_eq!(keys.value.to_string(), symbol.to_string());
        }
    }

    #[test]
    fn test_decode_button_checksum_mismatch_keeps_best_effort_value() {
        // Arrange: up key with a wrong checksum byte
        let bytes = [0x20, 0x00, 0x00, 0x21];

        // Act
        let keys = decode_button(&bytes).unwrap();

        // Assert
        assert_eq!(keys.value.to_string(), "u");
        assert_eq!(
            keys.mismatch,
            Some(ChecksumMismatch {
                received: 0x21,
                computed: 0x20
            })
        );
        assert!(matches!(keys.strict(), Err(DecodeError::Checksum(_))));
    }

    #[test]
    fn test_decode_button_rejects_wrong_length() {
        assert_eq!(
            decode_button(&[0x01, 0x00, 0x01]),
            Err(DecodeError::InvalidLength {
                expected: 4,
                actual: 3
            })
        );
    }

    // ── Display ──────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_display_integer_height() {
        let reading = decode_display(&body([0x06, 0x5B, 0x4F])).unwrap();
        assert!(reading.is_trusted());
        assert_eq!(reading.value, DisplayReading::Height(Position::new(123, 0)));
    }

    #[test]
    fn test_decode_display_decimal_point_sets_exponent() {
        // "7.25": point on the first digit
        let reading = decode_display(&body([0x87, 0x5B, 0x6D])).unwrap();
        assert_eq!(reading.value, DisplayReading::Height(Position::new(725, -2)));

        // "72.5": point on the second digit
        let reading = decode_display(&body([0x07, 0xDB, 0x6D])).unwrap();
        assert_eq!(reading.value, DisplayReading::Height(Position::new(725, -1)));

        // point on the last digit reads as an integer
        let reading = decode_display(&body([0x07, 0x5B, 0xED])).unwrap();
        assert_eq!(reading.value, DisplayReading::Height(Position::new(725, 0)));
    }

    #[test]
    fn test_decode_display_two_decimal_points_is_format_error() {
        let result = decode_display(&body([0x86, 0xDB, 0x4F]));
        assert_eq!(result, Err(DecodeError::ExtraDecimalPoint { position: 1 }));
    }

    #[test]
    fn test_decode_display_all_zero_is_no_height() {
        let reading = decode_display(&[0, 0, 0, 0]).unwrap();
        assert_eq!(reading.value, DisplayReading::NoHeight);
    }

    #[test]
    fn test_decode_display_rst_pattern_is_reset() {
        let reading = decode_display(&[0x77, 0x6D, 0x78, 0x5C]).unwrap();
        assert_eq!(reading.value, DisplayReading::Reset);
    }

    #[test]
    fn test_decode_display_fault_code_zero() {
        let reading = decode_display(&body([0x79, 0x3F, 0x3F])).unwrap();
        assert_eq!(reading.value, DisplayReading::Fault(ControllerFault::new(0)));
        assert!(reading.is_trusted());
    }

    #[test]
    fn test_decode_display_fault_code_from_two_digits() {
        let reading = decode_display(&body([0x79, 0x06, 0x06])).unwrap();
        assert_eq!(reading.value, DisplayReading::Fault(ControllerFault::new(11)));
    }

    #[test]
    fn test_decode_display_fault_ignores_checksum_but_reports_it() {
        // E05 with a bad checksum
        let reading = decode_display(&[0x79, 0x3F, 0x6D, 0x00]).unwrap();
        assert_eq!(reading.value, DisplayReading::Fault(ControllerFault::new(5)));
        assert!(!reading.is_trusted());
    }

    #[test]
    fn test_decode_display_checksum_mismatch_still_returns_height() {
        let reading = decode_display(&[0x06, 0x5B, 0x4F, 0x00]).unwrap();
        assert_eq!(reading.value, DisplayReading::Height(Position::new(123, 0)));
        assert!(reading.mismatch.is_some());
    }

    #[test]
    fn test_decode_display_rejects_wrong_length() {
        assert!(matches!(
            decode_display(&[0x06, 0x5B, 0x4F, 0xB0, 0x00]),
            Err(DecodeError::InvalidLength { actual: 5, .. })
        ));
    }

    // ── Encoding ─────────────────────────────────────────────────────────────

    #[test]
    fn test_encode_command_payload_sums_to_ff() {
        for slot in 1..=4 {
            let frame = encode_command(slot).unwrap();
            assert_eq!(frame.header(), HANDSET_HEADER);
            assert_eq!(frame.payload()[1], 1 << slot);
            assert!(frame.is_checksum_valid());
            assert_eq!(frame.checksum(), 0xFF);
        }
    }

    #[test]
    fn test_encode_command_rejects_out_of_range_slots() {
        assert_eq!(encode_command(0), Err(EncodeError::InvalidSlot(0)));
        assert_eq!(encode_command(5), Err(EncodeError::InvalidSlot(5)));
    }

    #[test]
    fn test_encode_keepalive_is_up_down_chord() {
        let frame = encode_keepalive();
        assert_eq!(frame.as_bytes(), &[0xA5, 0x00, 0x60, 0x9F, 0xFF]);
    }

    // ── Classification ───────────────────────────────────────────────────────

    #[test]
    fn test_classify_dispatches_by_header() {
        let button = Frame::with_payload(HANDSET_HEADER, [0x02, 0, 0]);
        assert!(matches!(classify(&button), FrameKind::Button(_)));

        let height = Frame::with_payload(CONTROLLER_HEADER, [0x06, 0x5B, 0x4F]);
        assert!(matches!(
            classify(&height),
            FrameKind::DisplayValue(Decoded { value, mismatch: None }) if value == Position::new(123, 0)
        ));

        let blank = Frame::from_bytes([CONTROLLER_HEADER, 0, 0, 0, 0]);
        assert_eq!(classify(&blank), FrameKind::DisplayNoHeight);

        let reset = Frame::from_bytes([CONTROLLER_HEADER, 0x77, 0x6D, 0x78, 0x5C]);
        assert_eq!(classify(&reset), FrameKind::DisplayReset);

        let fault = Frame::with_payload(CONTROLLER_HEADER, [0x79, 0x5B, 0x4F]);
        assert!(matches!(
            classify(&fault),
            FrameKind::DisplayFault(Decoded { value, .. }) if value.code == 23
        ));
    }

    #[test]
    fn test_classify_unknown_header_is_malformed() {
        let frame = Frame::from_bytes([0x00, 1, 2, 3, 6]);
        assert_eq!(
            classify(&frame),
            FrameKind::Malformed(DecodeError::UnknownHeader(0x00))
        );
    }

    #[test]
    fn test_classify_double_point_is_malformed() {
        let frame = Frame::with_payload(CONTROLLER_HEADER, [0x86, 0x86, 0x06]);
        assert!(matches!(
            classify(&frame),
            FrameKind::Malformed(DecodeError::ExtraDecimalPoint { .. })
        ));
    }
}
