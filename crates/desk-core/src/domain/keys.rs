//! Handset button state.
//!
//! The handset reports every key currently held down as one bit of the first
//! payload byte of an `0xA5` frame:
//!
//! ```text
//! bit:    0  1  2  3  4  5  6
//! key:    m  1  2  3  4  u  d
//! ```
//!
//! Several bits may be set at once (a chord).  The up+down chord is what the
//! bridge sends as a keep-alive because it never moves the desk.

use std::fmt;

/// Symbols for each key, indexed by bit position.
const SYMBOLS: [char; 7] = ['m', '1', '2', '3', '4', 'u', 'd'];

/// Mask of all defined key bits.
const KEY_MASK: u8 = 0b0111_1111;

/// A single handset key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Button {
    Memory = 0,
    Preset1 = 1,
    Preset2 = 2,
    Preset3 = 3,
    Preset4 = 4,
    Up = 5,
    Down = 6,
}

impl Button {
    /// All keys in wire (and display) order.
    pub const ALL: [Button; 7] = [
        Button::Memory,
        Button::Preset1,
        Button::Preset2,
        Button::Preset3,
        Button::Preset4,
        Button::Up,
        Button::Down,
    ];

    /// Bit mask of this key within the button byte.
    pub const fn mask(self) -> u8 {
        1 << self as u8
    }

    /// The one-character symbol used when logging key presses.
    pub const fn symbol(self) -> char {
        SYMBOLS[self as usize]
    }

    /// Returns the preset key for a memory slot (1-4).
    pub fn preset(slot: u8) -> Option<Button> {
        match slot {
            1 => Some(Button::Preset1),
            2 => Some(Button::Preset2),
            3 => Some(Button::Preset3),
            4 => Some(Button::Preset4),
            _ => None,
        }
    }
}

/// The set of keys held down in one handset frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ButtonState(u8);

impl ButtonState {
    /// No keys pressed.
    pub const NONE: ButtonState = ButtonState(0);

    /// Builds a state from the raw button byte, ignoring the undefined top bit.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & KEY_MASK)
    }

    /// The raw button byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when no key is held.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` when `button` is held.
    pub const fn contains(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    /// Returns this state with `button` added.
    #[must_use]
    pub const fn with(self, button: Button) -> Self {
        Self(self.0 | button.mask())
    }

    /// Iterates over the held keys in fixed symbol order.
    pub fn iter(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl FromIterator<Button> for ButtonState {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        iter.into_iter().fold(ButtonState::NONE, ButtonState::with)
    }
}

impl fmt::Display for ButtonState {
    /// Renders held keys as `m1234ud` symbols, or `_` when nothing is held.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("_");
        }
        for button in self.iter() {
            write!(f, "{}", button.symbol())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_renders_underscore() {
        assert_eq!(ButtonState::NONE.to_string(), "_");
    }

    #[test]
    fn test_chord_renders_in_symbol_order() {
        // Arrange: build the chord in reverse order
        let state: ButtonState = [Button::Down, Button::Up, Button::Memory].into_iter().collect();

        // Assert: display order follows m1234ud, not insertion order
        assert_eq!(state.to_string(), "mud");
    }

    #[test]
    fn test_from_bits_ignores_top_bit() {
        let state = ButtonState::from_bits(0x80 | Button::Preset2.mask());
        assert_eq!(state.bits(), 0b0000_0100);
        assert_eq!(state.to_string(), "2");
    }

    #[test]
    fn test_preset_slots() {
        assert_eq!(Button::preset(1), Some(Button::Preset1));
        assert_eq!(Button::preset(4), Some(Button::Preset4));
        assert_eq!(Button::preset(0), None);
        assert_eq!(Button::preset(5), None);
    }

    #[test]
    fn test_up_down_chord_mask_is_0x60() {
        let chord = ButtonState::NONE.with(Button::Up).with(Button::Down);
        assert_eq!(chord.bits(), 0x60);
    }
}
