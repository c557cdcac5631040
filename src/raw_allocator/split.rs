//! Splitting a free block into an allocated prefix and a (possibly absent)
//! free remainder.

use super::block::Block;
use super::buffer::Buffer;
use super::free_list::FreeLists;
use super::tag::Tag;

/// Carve `asize` allocated bytes from the front of `block`, which must
/// currently be free with at least `asize` bytes. Links any leftover
/// remainder into `free_lists` and returns `block` (now allocated, size
/// possibly shrunk to `asize`).
///
/// `rem == 0`: the whole block is consumed, no split.
/// `rem == 16`: the remainder becomes a mini block.
/// `rem >= 32`: the remainder becomes a regular block.
///
/// A remainder of exactly 16 bytes less than 32 (i.e. neither 0 nor >=32)
/// cannot occur because both `asize` and the original block size are
/// multiples of 16, and a remainder strictly between 0 and 32 that isn't
/// 16 would have to be some other multiple of 16 less than 32 — there is
/// none.
pub fn split<const N: usize>(
    buffer: &mut Buffer<N>,
    free_lists: &mut FreeLists,
    block: Block,
    asize: usize,
) -> Block {
    let old_tag = block.tag(buffer);
    let rem = old_tag.size() - asize;
    debug_assert!(rem == 0 || rem == 16 || rem >= 32);

    if rem == 0 {
        block.set_tag(buffer, old_tag.with_alloc(true));
        block.refresh_next_flags(buffer);
        return block;
    }

    block.set_tag(buffer, old_tag.with_size(asize).with_alloc(true));
    let remainder = Block(block.0 + asize);
    let remainder_tag = Tag::pack(rem, false, true, asize == 16);
    remainder.set_tag(buffer, remainder_tag);
    remainder.refresh_next_flags(buffer);

    if rem == 16 {
        free_lists.insert_mini(buffer, remainder);
    } else {
        free_lists.insert_regular(buffer, remainder);
    }

    block
}
