//! Heap growth: commit more of the fixed reservation and fold the new space
//! into the heap as a single free block (subject to coalescing with
//! whatever free block, if any, sits just before the old epilogue).

use super::block::Block;
use super::buffer::Buffer;
use super::coalesce::coalesce;
use super::free_list::FreeLists;
use super::tag::{Tag, ALIGN, HEADER_SIZE};

/// Amortization unit: growth requests round up to at least this many bytes
/// when the fixed reservation has room, trading a larger one-time commit
/// for fewer future extensions.
pub const CHUNK_SIZE: usize = 4096;

fn round_up(n: usize, quantum: usize) -> usize {
    (n + quantum - 1) & !(quantum - 1)
}

/// Grow the heap by enough to satisfy an allocation request of
/// `request_bytes` usable bytes (a normalized, 16-aligned block size,
/// already including header overhead), returning the resulting free block
/// ready to be handed to `find_fit`/`split`.
///
/// Tries to commit `max(request_bytes, CHUNK_SIZE)` first to amortize
/// future growth; if the fixed reservation can't hold that much, falls
/// back to committing exactly `request_bytes`. Returns `None` only if even
/// that minimal request doesn't fit — out of memory.
pub fn extend_by<const N: usize>(
    buffer: &mut Buffer<N>,
    free_lists: &mut FreeLists,
    request_bytes: usize,
) -> Option<Block> {
    let minimum = round_up(request_bytes, ALIGN);
    let preferred = round_up(minimum.max(CHUNK_SIZE), ALIGN);

    let old_epilogue_offset = buffer.committed() - HEADER_SIZE;
    let old_epilogue = Tag::from_raw(buffer.read_word(old_epilogue_offset));

    buffer.grow(preferred).or_else(|| buffer.grow(minimum))?;

    let new_size = buffer.committed() - HEADER_SIZE - old_epilogue_offset;
    let new_block = Block(old_epilogue_offset);
    let tag = Tag::pack(
        new_size,
        false,
        old_epilogue.prev_alloc(),
        old_epilogue.prev_mini(),
    );
    new_block.set_tag(buffer, tag);

    let new_epilogue_offset = buffer.committed() - HEADER_SIZE;
    let epilogue = Tag::pack(0, true, false, new_size == 16);
    buffer.write_word(new_epilogue_offset, epilogue.raw());

    let merged = coalesce(buffer, free_lists, new_block);
    Some(merged)
}
