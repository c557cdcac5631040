//! Read-only heap invariant checker.
//!
//! Walks the block chain and the free lists independently and cross-checks
//! them. Never mutates anything; intended to be wired behind a debug-only
//! call site, not the allocation hot path.

use super::block::Block;
use super::buffer::Buffer;
use super::free_list::{class_of, FreeLists, NUM_CLASSES};
use super::tag::HEADER_SIZE;

/// Walk the whole heap and the free lists, checking that they agree, and
/// report any violation through [`diagnostic`]. Returns whether the heap
/// passed every check.
pub fn check_heap<const N: usize>(
    buffer: &Buffer<N>,
    free_lists: &FreeLists,
    line: i32,
) -> bool {
    let mut ok = true;
    let free_by_walk = walk_blocks(buffer, line, &mut ok);
    let free_by_lists = walk_free_lists(buffer, free_lists, line, &mut ok);

    if free_by_walk != free_by_lists {
        diagnostic(
            line,
            "free block count disagrees between block walk and free lists",
        );
        ok = false;
    }

    ok
}

/// Walk every block from the first real block through the epilogue,
/// validating:
/// 1. every size is a positive multiple of 16 (except the epilogue's 0),
/// 2. every block lies within the committed heap,
/// 4. `prev_alloc`/`prev_mini` on each block match the actual predecessor,
/// 5. no two adjacent blocks are both free (a missed coalesce),
/// 6. a free regular block's header and footer agree.
///
/// Returns the number of free blocks encountered.
fn walk_blocks<const N: usize>(buffer: &Buffer<N>, line: i32, ok: &mut bool) -> usize {
    let mut free_count = 0;
    let mut prev_was_free = false;
    let mut block = Block(HEADER_SIZE); // first real block, just past the prologue

    loop {
        let tag = block.tag(buffer);

        if block.header_offset() + HEADER_SIZE > buffer.committed() {
            diagnostic(line, "block header lies outside the committed heap");
            *ok = false;
            break;
        }

        if tag.size() == 0 {
            break; // reached the epilogue
        }

        if tag.size() % 16 != 0 {
            diagnostic(line, "block size is not a multiple of 16");
            *ok = false;
        }

        if let Some(prev) = block.prev(buffer) {
            let prev_tag = prev.tag(buffer);
            if prev_tag.alloc() {
                diagnostic(line, "prev_alloc bit disagrees with predecessor's alloc bit");
                *ok = false;
            }
            if prev_tag.is_mini() != tag.prev_mini() {
                diagnostic(line, "prev_mini bit disagrees with predecessor's actual size");
                *ok = false;
            }
        } else if !tag.prev_alloc() {
            diagnostic(line, "prev_alloc bit claims a free predecessor but prev() found none");
            *ok = false;
        }

        if !tag.alloc() {
            if prev_was_free {
                diagnostic(line, "two adjacent free blocks found (missed coalesce)");
                *ok = false;
            }
            if !tag.is_mini() {
                let footer = super::tag::Tag::from_raw(
                    buffer.read_word(block.footer_offset(tag.size())),
                );
                if footer != tag {
                    diagnostic(line, "free block header and footer disagree");
                    *ok = false;
                }
            }
            free_count += 1;
        }

        prev_was_free = !tag.alloc();
        block = block.next(buffer);
    }

    free_count
}

/// Walk every size class plus the mini list, validating:
/// 7. every listed block is actually marked free and belongs in that class,
/// 8. the doubly-linked lists' next/prev pointers are mutually consistent.
///
/// Returns the total number of blocks found across all lists.
fn walk_free_lists<const N: usize>(
    buffer: &Buffer<N>,
    free_lists: &FreeLists,
    line: i32,
    ok: &mut bool,
) -> usize {
    let mut count = 0;

    for class in 0..NUM_CLASSES {
        let mut node = free_lists.class_head(class);
        let mut prev_offset = super::free_list::NULL;
        while node != super::free_list::NULL {
            let block = Block(node);
            let tag = block.tag(buffer);
            if tag.alloc() {
                diagnostic(line, "free list contains an allocated block");
                *ok = false;
            }
            if class_of(tag.size()) != class {
                diagnostic(line, "free block is linked into the wrong size class");
                *ok = false;
            }
            if FreeLists::prev_of(buffer, node) != prev_offset {
                diagnostic(line, "free list prev pointer is inconsistent");
                *ok = false;
            }
            count += 1;
            prev_offset = node;
            node = FreeLists::next_of(buffer, node);
        }
    }

    let mut node = free_lists.mini_head_offset();
    while node != super::free_list::NULL {
        let block = Block(node);
        let tag = block.tag(buffer);
        if tag.alloc() || !tag.is_mini() {
            diagnostic(line, "mini list contains a non-mini or allocated block");
            *ok = false;
        }
        count += 1;
        node = FreeLists::mini_next_of(buffer, node);
    }

    count
}

#[cfg(feature = "std")]
fn diagnostic(line: i32, message: &str) {
    std::eprintln!("heap check failed at line {line}: {message}");
}

#[cfg(not(feature = "std"))]
fn diagnostic(_line: i32, _message: &str) {}
