//! Desk height position as shown on the controller's 3-digit display.
//!
//! The display shows three 7-segment digits, one of which may have its
//! decimal point lit.  The reading is kept exactly as displayed: an integer
//! mantissa built from the digits and a base-10 exponent given by the column
//! of the decimal point.
//!
//! | Display | Mantissa | Exponent |
//! |---------|----------|----------|
//! | `123`   | 123      | 0        |
//! | `72.5`  | 725      | -1       |
//! | `1.05`  | 105      | -2       |

use std::fmt;

use serde::{Deserialize, Serialize};

/// A decimal height reading.
///
/// The zero value (`Position::default()`) means "no reading yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Digits of the reading with the decimal point removed.
    pub mantissa: i32,
    /// Power of ten the mantissa is scaled by.
    pub exponent: i32,
}

impl Position {
    /// Creates a position from its mantissa and exponent.
    pub const fn new(mantissa: i32, exponent: i32) -> Self {
        Self { mantissa, exponent }
    }

    /// Returns `true` when no height has been read yet.
    pub const fn is_unknown(&self) -> bool {
        self.mantissa == 0
    }

    /// Packs the position into a single `u64` (mantissa in the high half).
    ///
    /// Used to publish the position through an `AtomicU64` so readers never
    /// observe a mantissa from one update paired with an exponent from
    /// another.
    pub const fn to_bits(self) -> u64 {
        ((self.mantissa as u32 as u64) << 32) | (self.exponent as u32 as u64)
    }

    /// Inverse of [`Position::to_bits`].
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            mantissa: (bits >> 32) as u32 as i32,
            exponent: bits as u32 as i32,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exponent {
            0 => write!(f, "{}", self.mantissa),
            e if e < 0 => {
                // The controller never reports heights below 1, so the
                // integer part always has at least one digit.
                let places = e.unsigned_abs() as usize;
                let scale = 10_i32.pow(e.unsigned_abs());
                write!(
                    f,
                    "{}.{:0places$}",
                    self.mantissa / scale,
                    (self.mantissa % scale).abs(),
                    places = places
                )
            }
            e => write!(f, "{}{}", self.mantissa, "0".repeat(e as usize)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
