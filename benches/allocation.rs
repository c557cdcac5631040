#![feature(test)]
extern crate test;
use test::Bencher;

use std::alloc::{GlobalAlloc as _, Layout};

mod repeated_allocation_deallocation {
    use super::*;

    /// Run a benchmark which repeatedly allocates and deallocates the same
    /// block. The benchmark will allocate the given amount of blocks
    /// beforehand (before running the actual benchmark) in order to fill up
    /// the heap with unrelated allocations, so the free list the benchmark's
    /// block comes from is representative of a heap under some load.
    ///
    /// # Panics
    /// This will panic, if the requested pre-allocations will fill up the
    /// whole heap (so the actual benchmark cannot allocate blocks anymore).
    fn benchmark_with_preallocation(b: &mut Bencher, pre_allocations: usize) {
        let allocator = segfit::Allocator::<8192>::new();
        for _ in 0..pre_allocations {
            unsafe { allocator.alloc(Layout::new::<u8>()) };
        }

        let layout = Layout::new::<u8>();

        let ptr = unsafe { allocator.alloc(layout) };
        assert_ne!(ptr, std::ptr::null_mut::<u8>());
        unsafe { allocator.dealloc(ptr, layout) };

        b.iter(|| {
            let ptr = unsafe { allocator.alloc(layout) };
            let ptr = test::black_box(ptr);
            unsafe { allocator.dealloc(ptr, layout) };
        });
    }

    #[bench]
    fn no_memory_usage(b: &mut Bencher) {
        benchmark_with_preallocation(b, 0);
    }

    #[bench]
    fn low_memory_usage(b: &mut Bencher) {
        benchmark_with_preallocation(b, 8);
    }

    #[bench]
    fn medium_memory_usage(b: &mut Bencher) {
        benchmark_with_preallocation(b, 80);
    }

    #[bench]
    fn high_memory_usage(b: &mut Bencher) {
        benchmark_with_preallocation(b, 160);
    }
}

mod best_fit_search {
    use super::*;

    /// Benchmarks the cost of `find_fit`'s bounded best-fit scan by filling a
    /// size class with many free blocks of varying sizes (via alloc-then-free
    /// of different sizes) before timing an allocation that must fall back to
    /// the best-fit path rather than an exact-class first fit.
    #[bench]
    fn fragmented_class_best_fit(b: &mut Bencher) {
        let allocator = segfit::Allocator::<65536>::new();
        let sizes = [80usize, 96, 112, 120];
        let mut handles = std::vec::Vec::new();

        for &size in sizes.iter().cycle().take(64) {
            let layout = Layout::from_size_align(size, 8).unwrap();
            let ptr = unsafe { allocator.alloc(layout) };
            assert!(!ptr.is_null());
            handles.push((ptr, layout));
        }
        // Free every other handle so the class has a mix of free sizes but
        // no two adjacent free blocks (coalescing would otherwise merge them
        // away before the benchmark runs).
        for (i, (ptr, layout)) in handles.iter().enumerate() {
            if i % 2 == 0 {
                unsafe { allocator.dealloc(*ptr, *layout) };
            }
        }

        let request = Layout::from_size_align(64, 8).unwrap();
        b.iter(|| {
            let ptr = unsafe { allocator.alloc(request) };
            let ptr = test::black_box(ptr);
            unsafe { allocator.dealloc(ptr, request) };
        });
    }
}
