//! This module provides the raw allocator and its support types.
//!
//! A "raw allocator" is one that simply gets requests for a specific memory
//! size but does not need to worry about alignment beyond the 16-byte
//! quantum every block already satisfies. It implements boundary-tag
//! blocks, kept in segregated free lists, with splitting and coalescing —
//! see the submodules for the pieces: [`tag`] for the header encoding,
//! [`buffer`] for the backing storage, [`block`] for block-to-block
//! navigation, [`free_list`] for the size-class index, [`coalesce`] and
//! [`split`] for the two block-surgery operations, [`grow`] for extending
//! the heap, and [`checker`] for the read-only invariant walker.

mod block;
mod buffer;
mod checker;
mod coalesce;
mod free_list;
mod grow;
mod split;
mod tag;

use block::Block;
use buffer::Buffer;
use free_list::FreeLists;
use tag::{Tag, HEADER_SIZE};

/// An error occurred when calling `free()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    /// There is a double-free detected. An already freed-up block is freed
    /// up again.
    DoubleFreeDetected,
    /// An invalid pointer was freed up (either a pointer outside of the heap
    /// memory or a pointer to a header).
    AllocationNotFound,
}

/// The smallest possible block: header, no footer, no prev pointer.
const MINI_SIZE: usize = 16;
/// The smallest regular block: header, next, prev, footer.
const MIN_REGULAR_SIZE: usize = 32;

/// A raw memory allocator for contiguous slices of bytes without any
/// user-facing alignment guarantee beyond the 16-byte block quantum.
///
/// This allocator is an intermediate one, which does not need to handle the
/// alignment of a [`Layout`](core::alloc::Layout) beyond that; the
/// `GlobalAlloc` front-end in the crate root rejects requests for a coarser
/// alignment.
pub struct RawAllocator<const N: usize> {
    buffer: Buffer<N>,
    free_lists: FreeLists,
    initialized: bool,
}

impl<const N: usize> RawAllocator<N> {
    /// Create a new, uninitialized [`RawAllocator`] with a given heap
    /// reservation size.
    ///
    /// # Panics
    /// Panics if the reservation is smaller than `32` bytes (too small to
    /// ever hold a regular block alongside the prologue/epilogue sentinels)
    /// or is not a multiple of `16`.
    pub const fn new() -> Self {
        assert!(N >= MIN_REGULAR_SIZE, "too small heap memory: minimum size is 32");
        assert!(N % 16 == 0, "memory size has to be a multiple of 16");

        Self {
            buffer: Buffer::new(),
            free_lists: FreeLists::new(),
            initialized: false,
        }
    }

    /// Commit the prologue, epilogue, and the first free block. Called
    /// lazily on first use so that `new()` stays a `const fn`.
    fn ensure_initialized(&mut self) {
        if self.initialized {
            return;
        }

        let prologue_and_epilogue = 2 * HEADER_SIZE;
        let chunk = grow::CHUNK_SIZE.min(N).max(prologue_and_epilogue + MINI_SIZE);
        self.buffer.grow(chunk).expect("initial chunk must fit in reservation");

        self.buffer.write_word(0, Tag::pack(0, true, true, false).raw());

        let body_size = chunk - prologue_and_epilogue;
        let body = Block(HEADER_SIZE);
        body.set_tag(&mut self.buffer, Tag::pack(body_size, false, true, false));

        let epilogue_offset = chunk - HEADER_SIZE;
        let epilogue = Tag::pack(0, true, false, body_size == MINI_SIZE);
        self.buffer.write_word(epilogue_offset, epilogue.raw());

        if body_size == MINI_SIZE {
            self.free_lists.insert_mini(&mut self.buffer, body);
        } else {
            self.free_lists.insert_regular(&mut self.buffer, body);
        }

        self.initialized = true;
    }

    /// Round a requested payload size up to a block size this allocator can
    /// hand out: `0` has no valid block, `1..=8` fits a mini block, anything
    /// larger rounds up to a 16-aligned regular block with header+footer
    /// overhead folded in.
    fn normalize(n: usize) -> Option<usize> {
        if n == 0 {
            return None;
        }
        if n <= MINI_SIZE - HEADER_SIZE {
            return Some(MINI_SIZE);
        }
        let with_overhead = n.checked_add(HEADER_SIZE)?;
        let rounded = (with_overhead + 15) & !15;
        Some(rounded.max(MIN_REGULAR_SIZE))
    }

    /// Allocate a block of at least `n` usable bytes.
    ///
    /// Returns `None` if `n` is `0` or the heap cannot grow enough to
    /// satisfy the request.
    pub fn allocate(&mut self, n: usize) -> Option<*mut u8> {
        self.ensure_initialized();
        let asize = Self::normalize(n)?;

        let block = match self.free_lists.find_fit(&self.buffer, asize) {
            Some(block) => {
                if block.tag(&self.buffer).is_mini() {
                    self.free_lists.remove_mini(&mut self.buffer, block);
                } else {
                    self.free_lists.remove_regular(&mut self.buffer, block);
                }
                split::split(&mut self.buffer, &mut self.free_lists, block, asize)
            }
            None => {
                let grown = grow::extend_by(&mut self.buffer, &mut self.free_lists, asize)?;
                if grown.tag(&self.buffer).is_mini() {
                    self.free_lists.remove_mini(&mut self.buffer, grown);
                } else {
                    self.free_lists.remove_regular(&mut self.buffer, grown);
                }
                split::split(&mut self.buffer, &mut self.free_lists, grown, asize)
            }
        };

        Some(self.buffer.payload_ptr(block.header_offset()))
    }

    /// Free a pointer previously returned by [`allocate`](Self::allocate).
    ///
    /// Freeing a null pointer is a well-defined no-op.
    pub fn free(&mut self, ptr: *mut u8) -> Result<(), FreeError> {
        if ptr.is_null() {
            return Ok(());
        }

        let header_offset = self
            .buffer
            .offset_of_payload(ptr)
            .ok_or(FreeError::AllocationNotFound)?;
        let block = Block(header_offset);

        if !block.tag(&self.buffer).alloc() {
            return Err(FreeError::DoubleFreeDetected);
        }

        let size = block.tag(&self.buffer).size();
        let freed = block.tag(&self.buffer).with_alloc(false).with_size(size);
        block.set_tag(&mut self.buffer, freed);

        coalesce::coalesce(&mut self.buffer, &mut self.free_lists, block);
        Ok(())
    }

    /// Resize a previously allocated block, preserving its contents up to
    /// the smaller of the old and new sizes. Behaves like `malloc`+`memcpy`:
    /// it never shrinks or grows in place, matching the spec's non-goal of
    /// not optimizing in-place growth.
    ///
    /// `reallocate(null, n)` behaves exactly like `allocate(n)`.
    /// `reallocate(ptr, 0)` frees `ptr` and returns null.
    pub fn reallocate(&mut self, ptr: *mut u8, n: usize) -> Option<*mut u8> {
        if ptr.is_null() {
            return self.allocate(n);
        }
        if n == 0 {
            self.free(ptr).ok();
            return None;
        }

        let header_offset = self.buffer.offset_of_payload(ptr)?;
        let block = Block(header_offset);
        // The source is always allocated here: reallocating a free block is
        // a use-after-free on the caller's part, which this layer does not
        // defend against (mirroring `free`'s own contract).
        let old_usable = block.tag(&self.buffer).size() - HEADER_SIZE;

        let new_ptr = self.allocate(n)?;
        let copy_len = old_usable.min(n);
        // SAFETY: `ptr` and `new_ptr` both come from this allocator's own
        // buffer and `copy_len` is bounded by both blocks' usable sizes.
        unsafe {
            core::ptr::copy_nonoverlapping(ptr, new_ptr, copy_len);
        }
        self.free(ptr).expect("ptr was just validated as allocated");
        Some(new_ptr)
    }

    /// Allocate `count * size` bytes, zeroed.
    pub fn zeroed_allocate(&mut self, count: usize, size: usize) -> Option<*mut u8> {
        let total = count.checked_mul(size)?;
        let ptr = self.allocate(total)?;
        // SAFETY: `allocate` returns a pointer to at least `total` usable
        // bytes freshly carved out of this allocator's own buffer.
        unsafe {
            core::ptr::write_bytes(ptr, 0, total);
        }
        Some(ptr)
    }

    /// Validate every heap invariant, reporting any violation (when the
    /// `std` feature is enabled) tagged with `line` for the call site.
    pub fn check_heap(&self, line: i32) -> bool {
        checker::check_heap(&self.buffer, &self.free_lists, line)
    }
}
