//! Segregated free-list index.
//!
//! `NUM_CLASSES` size-class buckets hold doubly-linked lists of free regular
//! blocks, plus one singly-linked list dedicated to mini (16-byte) blocks,
//! which have no room for a prev pointer.

use super::block::Block;
use super::buffer::{Buffer, Offset};

/// Number of size-class buckets.
pub const NUM_CLASSES: usize = 15;

/// Upper bound (inclusive) of each class except the last, which takes
/// everything larger than `CLASS_UPPER_BOUNDS`'s final entry. Ranges double:
/// <=32, 33-64, 65-128, ..., 131073-262144, >=262145.
const CLASS_UPPER_BOUNDS: [usize; NUM_CLASSES - 1] = [
    32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536, 131072, 262144,
];

/// Sentinel meaning "no block" in an in-band next/prev pointer slot, or as a
/// list head. No real header offset is ever this large.
pub const NULL: Offset = usize::MAX;

/// Maximum number of nodes inspected per size class during bounded
/// best-fit. A tuning knob, not a correctness requirement: lowering it
/// trades utilization for throughput, raising it does the opposite.
pub const BEST_FIT_SCAN_CAP: usize = 10;

/// Map a block size to the size-class bucket that covers it.
///
/// Pure and monotone non-decreasing in `size`.
pub fn class_of(size: usize) -> usize {
    CLASS_UPPER_BOUNDS
        .iter()
        .position(|&bound| size <= bound)
        .unwrap_or(NUM_CLASSES - 1)
}

/// The segregated free-list state.
pub struct FreeLists {
    class_heads: [Offset; NUM_CLASSES],
    mini_head: Offset,
}

impl FreeLists {
    pub const fn new() -> Self {
        Self {
            class_heads: [NULL; NUM_CLASSES],
            mini_head: NULL,
        }
    }

    pub fn class_head(&self, class: usize) -> Offset {
        self.class_heads[class]
    }

    pub fn mini_head_offset(&self) -> Offset {
        self.mini_head
    }

    // -- regular (doubly-linked) lists ---------------------------------------

    pub(crate) fn next_of<const N: usize>(buffer: &Buffer<N>, node: Offset) -> Offset {
        buffer.read_word(node + 8) as Offset
    }

    pub(crate) fn prev_of<const N: usize>(buffer: &Buffer<N>, node: Offset) -> Offset {
        buffer.read_word(node + 16) as Offset
    }

    fn set_next<const N: usize>(buffer: &mut Buffer<N>, node: Offset, next: Offset) {
        buffer.write_word(node + 8, next as u64);
    }

    fn set_prev<const N: usize>(buffer: &mut Buffer<N>, node: Offset, prev: Offset) {
        buffer.write_word(node + 16, prev as u64);
    }

    /// Push `block` onto the front of its size class's list. O(1).
    pub fn insert_regular<const N: usize>(&mut self, buffer: &mut Buffer<N>, block: Block) {
        let class = class_of(block.tag(buffer).size());
        let old_head = self.class_heads[class];
        Self::set_prev(buffer, block.0, NULL);
        Self::set_next(buffer, block.0, old_head);
        if old_head != NULL {
            Self::set_prev(buffer, old_head, block.0);
        }
        self.class_heads[class] = block.0;
    }

    /// Unlink `block` from its size class's list. O(1).
    ///
    /// The caller is responsible for knowing `block` is currently linked.
    pub fn remove_regular<const N: usize>(&mut self, buffer: &mut Buffer<N>, block: Block) {
        let class = class_of(block.tag(buffer).size());
        let prev = Self::prev_of(buffer, block.0);
        let next = Self::next_of(buffer, block.0);
        if prev != NULL {
            Self::set_next(buffer, prev, next);
        } else {
            self.class_heads[class] = next;
        }
        if next != NULL {
            Self::set_prev(buffer, next, prev);
        }
    }

    // -- mini (singly-linked) list --------------------------------------------

    pub(crate) fn mini_next_of<const N: usize>(buffer: &Buffer<N>, node: Offset) -> Offset {
        buffer.read_word(node + 8) as Offset
    }

    fn set_mini_next<const N: usize>(buffer: &mut Buffer<N>, node: Offset, next: Offset) {
        buffer.write_word(node + 8, next as u64);
    }

    pub fn insert_mini<const N: usize>(&mut self, buffer: &mut Buffer<N>, block: Block) {
        Self::set_mini_next(buffer, block.0, self.mini_head);
        self.mini_head = block.0;
    }

    /// Unlink `block` from the mini list.
    ///
    /// O(n) in the mini list's length: with no prev pointer, its
    /// predecessor must be found by walking from the head.
    pub fn remove_mini<const N: usize>(&mut self, buffer: &mut Buffer<N>, block: Block) {
        if self.mini_head == block.0 {
            self.mini_head = Self::mini_next_of(buffer, block.0);
            return;
        }
        let mut node = self.mini_head;
        while node != NULL {
            let next = Self::mini_next_of(buffer, node);
            if next == block.0 {
                Self::set_mini_next(buffer, node, Self::mini_next_of(buffer, block.0));
                return;
            }
            node = next;
        }
        debug_assert!(false, "block {:?} not found in mini list", block.0);
    }

    pub fn mini_head_block(&self) -> Option<Block> {
        if self.mini_head == NULL {
            None
        } else {
            Some(Block(self.mini_head))
        }
    }

    // -- search ----------------------------------------------------------------

    /// Find a free block of at least `asize` bytes, or `None`.
    ///
    /// Mini blocks are served from `mini_head` directly; regular sizes try
    /// an exhaustive first-fit in their own class, then a bounded best-fit
    /// in each larger class in turn.
    pub fn find_fit<const N: usize>(&self, buffer: &Buffer<N>, asize: usize) -> Option<Block> {
        if asize <= 16 {
            if let Some(mini) = self.mini_head_block() {
                return Some(mini);
            }
        }
        let class = class_of(asize);
        if let Some(found) = self.first_fit_in_class(buffer, class, asize) {
            return Some(found);
        }
        for class in class + 1..NUM_CLASSES {
            if let Some(found) = self.bounded_best_fit_in_class(buffer, class, asize) {
                return Some(found);
            }
        }
        None
    }

    fn first_fit_in_class<const N: usize>(
        &self,
        buffer: &Buffer<N>,
        class: usize,
        asize: usize,
    ) -> Option<Block> {
        let mut node = self.class_heads[class];
        while node != NULL {
            let block = Block(node);
            if block.tag(buffer).size() >= asize {
                return Some(block);
            }
            node = Self::next_of(buffer, node);
        }
        None
    }

    fn bounded_best_fit_in_class<const N: usize>(
        &self,
        buffer: &Buffer<N>,
        class: usize,
        asize: usize,
    ) -> Option<Block> {
        let mut node = self.class_heads[class];
        let mut best: Option<(Block, usize)> = None;
        let mut scanned = 0;
        while node != NULL && scanned < BEST_FIT_SCAN_CAP {
            let size = Block(node).tag(buffer).size();
            let improves = match best {
                Some((_, best_size)) => size < best_size,
                None => true,
            };
            if size >= asize && improves {
                best = Some((Block(node), size));
            }
            node = Self::next_of(buffer, node);
            scanned += 1;
        }
        best.map(|(block, _)| block)
    }
}

#[cfg(test)]
mod tests {
    use super::super::buffer::Buffer;
    use super::super::tag::Tag;
    use super::{class_of, Block, FreeLists, NUM_CLASSES};

    #[test]
    fn class_of_is_monotone_and_covers_boundaries() {
        assert_eq!(class_of(32), 0);
        assert_eq!(class_of(33), 1);
        assert_eq!(class_of(64), 1);
        assert_eq!(class_of(65), 2);
        assert_eq!(class_of(262144), NUM_CLASSES - 2);
        assert_eq!(class_of(262145), NUM_CLASSES - 1);
        assert_eq!(class_of(usize::MAX - 0xF), NUM_CLASSES - 1);

        let mut prev = 0;
        for size in (16..=300_000).step_by(16) {
            let class = class_of(size);
            assert!(class >= prev);
            prev = class;
        }
    }

    #[test]
    fn insert_then_remove_regular_empties_the_class() {
        let mut buffer = Buffer::<64>::new();
        buffer.grow(64).unwrap();
        let mut lists = FreeLists::new();
        let block = Block(0);
        block.set_tag(&mut buffer, Tag::pack(32, false, true, false));

        lists.insert_regular(&mut buffer, block);
        assert_eq!(lists.class_head(class_of(32)), 0);

        lists.remove_regular(&mut buffer, block);
        assert_eq!(lists.class_head(class_of(32)), super::NULL);
    }

    #[test]
    fn regular_list_is_lifo_and_bidirectional() {
        let mut buffer = Buffer::<96>::new();
        buffer.grow(96).unwrap();
        let mut lists = FreeLists::new();
        let a = Block(0);
        let b = Block(32);
        let c = Block(64);
        for block in [a, b, c] {
            block.set_tag(&mut buffer, Tag::pack(32, false, true, false));
        }

        lists.insert_regular(&mut buffer, a);
        lists.insert_regular(&mut buffer, b);
        lists.insert_regular(&mut buffer, c);

        // LIFO: c is head.
        assert_eq!(lists.class_head(class_of(32)), c.0);
        assert_eq!(FreeLists::next_of(&buffer, c.0), b.0);
        assert_eq!(FreeLists::next_of(&buffer, b.0), a.0);
        assert_eq!(FreeLists::next_of(&buffer, a.0), super::NULL);
        assert_eq!(FreeLists::prev_of(&buffer, c.0), super::NULL);
        assert_eq!(FreeLists::prev_of(&buffer, b.0), c.0);
        assert_eq!(FreeLists::prev_of(&buffer, a.0), b.0);

        lists.remove_regular(&mut buffer, b);
        assert_eq!(FreeLists::next_of(&buffer, c.0), a.0);
        assert_eq!(FreeLists::prev_of(&buffer, a.0), c.0);
    }

    #[test]
    fn mini_list_is_lifo_singly_linked() {
        let mut buffer = Buffer::<48>::new();
        buffer.grow(48).unwrap();
        let mut lists = FreeLists::new();
        let a = Block(0);
        let b = Block(16);
        let c = Block(32);
        for block in [a, b, c] {
            block.set_tag(&mut buffer, Tag::pack(16, false, true, false));
        }

        lists.insert_mini(&mut buffer, a);
        lists.insert_mini(&mut buffer, b);
        lists.insert_mini(&mut buffer, c);
        assert_eq!(lists.mini_head_offset(), c.0);

        lists.remove_mini(&mut buffer, b);
        assert_eq!(FreeLists::mini_next_of(&buffer, c.0), a.0);
    }

    #[test]
    fn find_fit_prefers_mini_list_for_small_sizes() {
        let mut buffer = Buffer::<32>::new();
        buffer.grow(32).unwrap();
        let mut lists = FreeLists::new();
        let mini = Block(0);
        mini.set_tag(&mut buffer, Tag::pack(16, false, true, false));
        lists.insert_mini(&mut buffer, mini);

        assert_eq!(lists.find_fit(&buffer, 16), Some(mini));
    }

    #[test]
    fn find_fit_best_fit_picks_smallest_sufficient_block() {
        let mut buffer = Buffer::<384>::new();
        buffer.grow(384).unwrap();
        let mut lists = FreeLists::new();
        // All three land in the 65-128 class (class_of(72) == class_of(96)
        // == class_of(128) == 2).
        let a = Block(0);
        let b = Block(128);
        let c = Block(256);
        a.set_tag(&mut buffer, Tag::pack(72, false, true, false));
        b.set_tag(&mut buffer, Tag::pack(96, false, true, false));
        c.set_tag(&mut buffer, Tag::pack(128, false, true, false));
        lists.insert_regular(&mut buffer, a);
        lists.insert_regular(&mut buffer, b);
        lists.insert_regular(&mut buffer, c);

        // Request from class 1 (33-64), smaller than all three candidates,
        // forcing the bounded-best-fit path rather than the exact-class
        // first-fit path.
        assert_eq!(lists.find_fit(&buffer, 40), Some(a));
    }

    #[test]
    fn find_fit_returns_none_when_nothing_fits() {
        let buffer = Buffer::<32>::new();
        let lists = FreeLists::new();
        assert_eq!(lists.find_fit(&buffer, 32), None);
    }
}
