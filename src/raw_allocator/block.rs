//! Forward/backward traversal between neighboring blocks, and the
//! payload/header address conversions every other module builds on.

use super::buffer::{Buffer, Offset};
use super::tag::{Tag, HEADER_SIZE};

/// A block, identified by the offset of its header.
///
/// This is the one typed handle the rest of the engine traffics in; only
/// this module and [`tag`](super::tag) ever reason about raw offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block(pub Offset);

impl Block {
    pub fn header_offset(self) -> Offset {
        self.0
    }

    pub fn payload_offset(self) -> Offset {
        self.0 + HEADER_SIZE
    }

    /// Offset of the footer belonging to a free regular block of this size.
    pub fn footer_offset(self, size: usize) -> Offset {
        self.0 + size - HEADER_SIZE
    }

    /// Read this block's header tag.
    pub fn tag<const N: usize>(self, buffer: &Buffer<N>) -> Tag {
        Tag::from_raw(buffer.read_word(self.0))
    }

    /// Write `tag` as this block's header, mirroring it to the footer when
    /// the block is a free regular block (the only variant with one).
    pub fn set_tag<const N: usize>(self, buffer: &mut Buffer<N>, tag: Tag) {
        buffer.write_word(self.0, tag.raw());
        if !tag.alloc() && !tag.is_mini() {
            buffer.write_word(self.footer_offset(tag.size()), tag.raw());
        }
    }

    /// The block immediately following this one in address order.
    ///
    /// Valid to call on any real block; returns the epilogue for the tail
    /// block, since the epilogue's own header lies at `address + size`.
    pub fn next<const N: usize>(self, buffer: &Buffer<N>) -> Block {
        let size = self.tag(buffer).size();
        Block(self.0 + size)
    }

    /// The block immediately preceding this one, if it is free.
    ///
    /// Returns `None` when `prev_alloc` is set: an allocated predecessor
    /// carries no footer, so its exact address is unknowable (and
    /// unneeded, since callers only ever touch an allocated predecessor's
    /// flags via *this* block's own `prev_alloc` bit). The first real block
    /// in the heap always has `prev_alloc` set, because its predecessor is
    /// the permanently-allocated prologue — so this never needs a separate
    /// bounds check against `heap_start`.
    pub fn prev<const N: usize>(self, buffer: &Buffer<N>) -> Option<Block> {
        let tag = self.tag(buffer);
        if tag.prev_alloc() {
            return None;
        }
        if tag.prev_mini() {
            return Some(Block(self.0 - 16));
        }
        let footer = Tag::from_raw(buffer.read_word(self.0 - HEADER_SIZE));
        Some(Block(self.0 - footer.size()))
    }

    /// Refresh `prev_alloc`/`prev_mini` on the block following this one, so
    /// it reflects this block's current state. The single place every
    /// state-changing operation routes through to keep the two flags in
    /// sync with at most one extra header write.
    pub fn refresh_next_flags<const N: usize>(self, buffer: &mut Buffer<N>) {
        let tag = self.tag(buffer);
        let next = self.next(buffer);
        let next_tag = next.tag(buffer);
        let updated = next_tag
            .with_prev_alloc(tag.alloc())
            .with_prev_mini(tag.is_mini());
        next.set_tag(buffer, updated);
    }
}
