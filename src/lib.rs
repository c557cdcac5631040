//! A general-purpose dynamic memory allocator for `#![no_std]` targets.
//!
//! This crate provides a single type called [`Allocator`]. This type
//! implements the [`core::alloc::GlobalAlloc`]-trait, which is required to
//! use the [`alloc`-crate][alloc] on `#![no_std]`-targets.
//!
//! # Usage
//! The usage is simple: just copy and paste the following code snippet into
//! your binary crate and potentially adjust the number of bytes of the heap
//! (here 4K):
//! ```no_run
//! #[global_allocator]
//! static ALLOCATOR: segfit::Allocator<4096> = segfit::Allocator::new();
//!
//! extern crate alloc;
//! ```
//! Afterwards you don't need to interact with the crate or the variable
//! `ALLOCATOR` anymore. Now you can just `use alloc::vec::Vec` or even
//! `use alloc::collections::HashMap`, i.e. every fancy collection which is
//! normally provided by the `std`.
//!
//! The minimal buffer size is `32`, and `N` must be a multiple of `16`.
//! Adjust the size as necessary, e.g. by doing a worst-case calculation and
//! potentially adding some backup space of 10% (for example).
//!
//! Note to users with things like `MPU`s, `MMU`s, etc.: your device might
//! support things like memory remapping or memory protection with setting
//! read/write/execution rights. This crate _doesn't use_ those features at
//! all! If that is desired, you should take the address of the buffer and
//! use that along with the known size `N` to protect the heap memory. To
//! users with a fully-working MMU: it is recommended that you use an
//! allocator that actually supports paging, etc. This crate might still be
//! helpful, e.g. before setting up the MMU.
//!
//! # Implementation
//! Internally the heap is organized as a chain of boundary-tagged blocks,
//! bracketed by a permanently-allocated prologue and epilogue. Each header
//! (and, for free blocks of 32 bytes or more, a mirrored footer) is a single
//! 64-bit word encoding the block's size plus three flag bits: whether the
//! block itself is allocated, whether its predecessor is allocated, and
//! whether its predecessor is a 16-byte "mini" block. Free blocks are kept
//! in segregated-by-size free lists rather than scanned for linearly:
//! regular free blocks (32 bytes or more) sit in doubly-linked lists bucketed
//! by size class, while 16-byte mini blocks — too small to hold a footer or a
//! prev pointer — get their own singly-linked list. Allocation tries the
//! mini list first for tiny requests, then an exact-fit scan of the
//! requested size class, then a bounded best-fit scan of larger classes.
//! Freeing a block immediately coalesces it with any free neighbor, and the
//! heap extends itself, amortized in 4K chunks, only when no free block is
//! large enough.
//!
//! See [`check_heap`](Allocator::check_heap) for a read-only diagnostic walk
//! over every invariant above, useful when debugging a custom allocator
//! integration.
//!
//! [alloc]: https://doc.rust-lang.org/alloc/index.html
#![no_std]

#[cfg(feature = "std")]
extern crate std;

mod raw_allocator;

use core::alloc::{GlobalAlloc, Layout};
use raw_allocator::RawAllocator;
use spin::Mutex;

pub use raw_allocator::FreeError;

/// Every block this allocator hands out is aligned to this many bytes. A
/// `Layout` requesting a coarser alignment cannot be satisfied and causes
/// the `GlobalAlloc` methods to return a null pointer.
pub const ALIGNMENT: usize = 16;

/// The memory allocator for `#![no_std]` targets.
///
/// This is the core type of this crate: it is an allocator with a predefined
/// heap size. Therefore the heap memory usage is statically limited to an
/// upper value, which also helps to prevent issues with heap/stack-smashes,
/// as the heap is counted to the static memory (e.g. `.data`/`.bss`
/// sections). Such a smash might still happen though, if the stack pointer
/// grows into the heap, but the heap cannot grow into the stack pointer.
///
/// Its usage is simple: just copy and paste the following in the binary
/// crate you're developing. The memory size of the heap is `4096` or 4K in
/// this example. Adjust that value to your needs.
/// ```no_run
/// #[global_allocator]
/// static ALLOCATOR: segfit::Allocator<4096> = segfit::Allocator::new();
/// ```
/// Also please refer to the [crate-level](crate) documentation for
/// recommendations on the buffer size and general usage.
///
/// Interior mutability is provided by a [`spin::Mutex`], since
/// `GlobalAlloc`'s methods all take `&self`; this crate does not depend on
/// an OS for locking, matching its `#![no_std]` target.
pub struct Allocator<const N: usize>(Mutex<RawAllocator<N>>);

impl<const N: usize> Allocator<N> {
    /// Create a new [`Allocator`].
    ///
    /// This function is a `const fn`, therefore you can call it directly
    /// when creating the allocator.
    ///
    /// Please see the [crate-level](crate) documentation for recommendations
    /// on the buffer size and general usage.
    ///
    /// # Panics
    /// This function will panic if the supplied buffer size, i.e. `N`, is
    /// less than `32` or not a multiple of `16`.
    #[must_use = "assign the allocator to a static variable and apply the `#[global_allocator]`-attribute to make it the global allocator"]
    pub const fn new() -> Self {
        Self(Mutex::new(RawAllocator::new()))
    }

    /// Validate every heap invariant: block-chain consistency, free-list
    /// membership, and that the two views of the heap agree on which blocks
    /// are free.
    ///
    /// Intended for debug builds or tests, not the allocation hot path.
    /// Pass `line!() as i32` (or any caller-chosen tag) so a failure report
    /// (emitted via `eprintln!` when the `std` feature is enabled) can be
    /// traced back to its call site.
    pub fn check_heap(&self, line: i32) -> bool {
        self.0.lock().check_heap(line)
    }
}

impl<const N: usize> Default for Allocator<N> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<const N: usize> GlobalAlloc for Allocator<N> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return core::ptr::null_mut();
        }
        self.0
            .lock()
            .allocate(layout.size())
            .unwrap_or(core::ptr::null_mut())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Err(error) = self.0.lock().free(ptr) {
            debug_assert!(false, "invalid free of {ptr:?}: {error:?}");
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return core::ptr::null_mut();
        }
        self.0
            .lock()
            .zeroed_allocate(1, layout.size())
            .unwrap_or(core::ptr::null_mut())
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            return core::ptr::null_mut();
        }
        self.0
            .lock()
            .reallocate(ptr, new_size)
            .unwrap_or(core::ptr::null_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::Allocator;
    use core::alloc::{GlobalAlloc, Layout};

    #[test]
    fn new_allocator_passes_its_own_heap_check() {
        let allocator = Allocator::<4096>::new();
        // force initialization via a trivial allocation
        let layout = Layout::from_size_align(1, 1).unwrap();
        unsafe {
            let ptr = allocator.alloc(layout);
            assert!(!ptr.is_null());
            allocator.dealloc(ptr, layout);
        }
        assert!(allocator.check_heap(line!() as i32));
    }

    #[test]
    fn over_aligned_request_returns_null() {
        let allocator = Allocator::<4096>::new();
        let layout = Layout::from_size_align(16, 4096).unwrap();
        let ptr = unsafe { allocator.alloc(layout) };
        assert!(ptr.is_null());
    }

    #[test]
    fn alloc_zeroed_is_actually_zeroed() {
        let allocator = Allocator::<4096>::new();
        let layout = Layout::from_size_align(64, 8).unwrap();
        unsafe {
            let ptr = allocator.alloc_zeroed(layout);
            assert!(!ptr.is_null());
            let bytes = core::slice::from_raw_parts(ptr, 64);
            assert!(bytes.iter().all(|&b| b == 0));
            allocator.dealloc(ptr, layout);
        }
    }

    #[test]
    fn realloc_grows_and_preserves_contents() {
        let allocator = Allocator::<4096>::new();
        let small = Layout::from_size_align(16, 8).unwrap();
        unsafe {
            let ptr = allocator.alloc(small);
            assert!(!ptr.is_null());
            core::ptr::write_bytes(ptr, 0x42, 16);
            let grown = allocator.realloc(ptr, small, 256);
            assert!(!grown.is_null());
            let bytes = core::slice::from_raw_parts(grown, 16);
            assert!(bytes.iter().all(|&b| b == 0x42));
            allocator.dealloc(grown, Layout::from_size_align(256, 8).unwrap());
        }
    }
}
