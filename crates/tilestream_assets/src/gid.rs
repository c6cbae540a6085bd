//! Global tile id (GID) encoding.
//!
//! Each cell of a tile layer is a 32-bit value. The three highest bits carry the
//! flip flags, the remaining bits carry the global tile id. A value whose id
//! bits are zero is an empty cell.

/// Horizontal flip flag (bit 31).
pub const FLIP_H: u32 = 0x8000_0000;
/// Vertical flip flag (bit 30).
pub const FLIP_V: u32 = 0x4000_0000;
/// Diagonal flip flag (bit 29).
pub const FLIP_D: u32 = 0x2000_0000;
/// Mask selecting the global tile id (bits 0-28).
pub const GID_MASK: u32 = 0x1FFF_FFFF;

/// Flip flags of a single tile instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlipFlags {
    /// Mirrored along the vertical axis.
    pub horizontal: bool,
    /// Mirrored along the horizontal axis.
    pub vertical: bool,
    /// Mirrored along the top-left to bottom-right diagonal.
    pub diagonal: bool,
}

impl FlipFlags {
    /// No flipping.
    pub const NONE: Self = Self {
        horizontal: false,
        vertical: false,
        diagonal: false,
    };

    /// Pack the flags back into the high bits of a raw cell value.
    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.horizontal {
            bits |= FLIP_H;
        }
        if self.vertical {
            bits |= FLIP_V;
        }
        if self.diagonal {
            bits |= FLIP_D;
        }
        bits
    }
}

/// A raw layer cell value: global tile id plus flip flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gid(pub u32);

impl Gid {
    /// The empty cell.
    pub const EMPTY: Gid = Gid(0);

    /// Raw value as stored in the document.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Global tile id with the flip flags stripped.
    #[inline]
    pub fn id(self) -> u32 {
        self.0 & GID_MASK
    }

    /// Whether this cell holds no tile.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.id() == 0
    }

    /// Decoded flip flags.
    #[inline]
    pub fn flip(self) -> FlipFlags {
        FlipFlags {
            horizontal: self.0 & FLIP_H != 0,
            vertical: self.0 & FLIP_V != 0,
            diagonal: self.0 & FLIP_D != 0,
        }
    }
}

impl From<u32> for Gid {
    fn from(raw: u32) -> Self {
        Gid(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_split_from_id() {
        let gid = Gid(FLIP_H | FLIP_D | 42);
        assert_eq!(gid.id(), 42);
        assert_eq!(
            gid.flip(),
            FlipFlags {
                horizontal: true,
                vertical: false,
                diagonal: true,
            }
        );
        assert_eq!(gid.flip().bits() | gid.id(), gid.raw());
    }

    #[test]
    fn test_flag_only_value_is_empty() {
        assert!(Gid(FLIP_V).is_empty());
        assert!(Gid::EMPTY.is_empty());
        assert!(!Gid(1).is_empty());
    }
}
