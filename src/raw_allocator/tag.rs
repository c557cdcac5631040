//! Boundary-tag codec.
//!
//! Every header (and, for free regular blocks, footer) is a single 64-bit
//! word, laid out as:
//!
//! ```text
//! bit 0      alloc
//! bit 1      prev_alloc
//! bit 2      prev_mini
//! bit 3      reserved, always zero
//! bits 4-63  size (low 4 bits always zero, since size is a multiple of 16)
//! ```

use core::mem;

/// Size in bytes of a header or footer word.
pub const HEADER_SIZE: usize = mem::size_of::<u64>();
/// Alignment quantum every block size and payload address is a multiple of.
pub const ALIGN: usize = 16;

const ALLOC_BIT: u64 = 1 << 0;
const PREV_ALLOC_BIT: u64 = 1 << 1;
const PREV_MINI_BIT: u64 = 1 << 2;
const SIZE_MASK: u64 = !0xF;

/// A decoded boundary tag: the bit field stored in a block's header (and, for
/// free regular blocks, mirrored in its footer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag(u64);

impl Tag {
    /// Pack a tag from its fields.
    ///
    /// # Panics (debug only)
    /// Panics if `size`'s low 4 bits are set, i.e. it isn't a multiple of the
    /// 16-byte alignment quantum.
    pub const fn pack(size: usize, alloc: bool, prev_alloc: bool, prev_mini: bool) -> Self {
        debug_assert!(size & 0xF == 0, "block size must be a multiple of 16");
        let mut word = size as u64;
        if alloc {
            word |= ALLOC_BIT;
        }
        if prev_alloc {
            word |= PREV_ALLOC_BIT;
        }
        if prev_mini {
            word |= PREV_MINI_BIT;
        }
        Self(word)
    }

    /// Reinterpret a raw 64-bit word as a tag, without validation.
    pub const fn from_raw(word: u64) -> Self {
        Self(word)
    }

    /// The raw 64-bit word, as stored in memory.
    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn size(self) -> usize {
        (self.0 & SIZE_MASK) as usize
    }

    pub const fn alloc(self) -> bool {
        self.0 & ALLOC_BIT != 0
    }

    pub const fn prev_alloc(self) -> bool {
        self.0 & PREV_ALLOC_BIT != 0
    }

    pub const fn prev_mini(self) -> bool {
        self.0 & PREV_MINI_BIT != 0
    }

    /// Whether this tag describes a mini (exactly 16-byte) block.
    pub const fn is_mini(self) -> bool {
        self.size() == 16
    }

    pub const fn with_alloc(self, alloc: bool) -> Self {
        Self::pack(self.size(), alloc, self.prev_alloc(), self.prev_mini())
    }

    pub const fn with_prev_alloc(self, prev_alloc: bool) -> Self {
        Self::pack(self.size(), self.alloc(), prev_alloc, self.prev_mini())
    }

    pub const fn with_prev_mini(self, prev_mini: bool) -> Self {
        Self::pack(self.size(), self.alloc(), self.prev_alloc(), prev_mini)
    }

    pub const fn with_size(self, size: usize) -> Self {
        Self::pack(size, self.alloc(), self.prev_alloc(), self.prev_mini())
    }
}
