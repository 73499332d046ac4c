//! Boundary-tagged heap blocks.
//!
//! A block is a contiguous span of an [`Area`]. It starts with a [`Block`]
//! header and ends with a [`Footer`] that mirrors the block size, so both
//! neighbors of any block can be found from size fields alone.
//!
//! ```text
//! ┌────────────────────────┬─────────────────────────┬──────────────┐
//! │ Block header           │ payload                 │ Footer       │
//! │ ┌──────┬─────────────┐ │                         │ ┌──────────┐ │
//! │ │ size │ owner|free  │ │                         │ │ size     │ │
//! │ └──────┴─────────────┘ │                         │ └──────────┘ │
//! └────────────────────────┴─────────────────────────┴──────────────┘
//! ▲                        ▲                                        ▲
//! block                    payload (returned to callers)  block + size
//! ```
//!
//! Blocks are never allocated as objects. [`Block::init`] stamps a header
//! and footer onto raw memory, and every split or merge is expressed as one
//! or two calls to it.

use crate::{
    align::{BASE_ALIGN, align_base},
    area::Area,
    tagged::TaggedArea,
};

/// Header placed at the start of every block.
#[repr(C, align(16))]
#[derive(Debug)]
pub(crate) struct Block {
    /// Total size of the block: header, payload and footer.
    size: usize,
    /// Owning area and free flag.
    owner: TaggedArea,
}

/// Trailer placed at the end of every block.
#[repr(C, align(16))]
#[derive(Debug)]
pub(crate) struct Footer {
    size: usize,
}

const _: () = assert!(align_of::<Block>() == BASE_ALIGN);
const _: () = assert!(align_of::<Footer>() == BASE_ALIGN);

pub(crate) const HEADER_SIZE: usize = align_base(size_of::<Block>());
pub(crate) const FOOTER_SIZE: usize = align_base(size_of::<Footer>());

/// Size of the smallest well-formed block, one with an empty payload.
pub(crate) const MIN_BLOCK_SIZE: usize = Block::raw_size(0);

impl Block {
    /// Returns the block size needed to hold `payload_size` bytes.
    pub(crate) const fn raw_size(payload_size: usize) -> usize {
        payload_size + HEADER_SIZE + FOOTER_SIZE
    }

    /// Like [`raw_size`](Self::raw_size), but returns `None` on overflow.
    pub(crate) const fn checked_raw_size(payload_size: usize) -> Option<usize> {
        payload_size.checked_add(HEADER_SIZE + FOOTER_SIZE)
    }

    /// Returns the payload capacity of a block of `raw_size` bytes.
    pub(crate) const fn payload_size(raw_size: usize) -> usize {
        raw_size - HEADER_SIZE - FOOTER_SIZE
    }

    /// Writes a well-formed block of `block_size` bytes at `memory` and
    /// returns it.
    ///
    /// This is the only way blocks come into existence.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `memory..memory + block_size` lies inside `area`'s block span
    /// - no live allocation overlaps that range, except the payload of a
    ///   block being resized in place by this call
    pub(crate) unsafe fn init(
        memory: *mut u8,
        block_size: usize,
        free: bool,
        area: *mut Area,
    ) -> *mut Self {
        #[expect(clippy::cast_ptr_alignment)]
        let block = memory.cast::<Self>();
        assert!(
            block.is_aligned(),
            "block must be aligned to the base alignment"
        );
        assert!(
            block_size >= MIN_BLOCK_SIZE,
            "block must be able to hold its header and footer"
        );
        assert!(
            block_size.is_multiple_of(BASE_ALIGN),
            "block size must be a multiple of the base alignment"
        );

        unsafe {
            block.write(Self {
                size: block_size,
                owner: TaggedArea::new(area, free),
            });
            Self::footer(block).write(Footer { size: block_size });
        }

        block
    }

    /// Recovers the block header from a payload pointer.
    ///
    /// # Safety
    ///
    /// `payload` must have been returned by [`payload`](Self::payload) for a
    /// block that is still live.
    #[expect(clippy::cast_ptr_alignment)]
    pub(crate) unsafe fn from_payload(payload: *mut u8) -> *mut Self {
        unsafe { payload.byte_sub(HEADER_SIZE) }.cast::<Self>()
    }

    /// Returns the payload pointer of `block`.
    ///
    /// # Safety
    ///
    /// `block` must point to a well-formed block.
    pub(crate) unsafe fn payload(block: *mut Self) -> *mut u8 {
        unsafe { block.byte_add(HEADER_SIZE).cast() }
    }

    /// # Safety
    ///
    /// `block` must point to a well-formed block.
    pub(crate) unsafe fn size(block: *mut Self) -> usize {
        unsafe { (*block).size }
    }

    /// # Safety
    ///
    /// `block` must point to a well-formed block.
    pub(crate) unsafe fn is_free(block: *mut Self) -> bool {
        unsafe { (*block).owner.is_free() }
    }

    /// # Safety
    ///
    /// `block` must point to a well-formed block.
    pub(crate) unsafe fn set_free(block: *mut Self, free: bool) {
        unsafe { (*block).owner.set_free(free) }
    }

    /// # Safety
    ///
    /// `block` must point to a well-formed block.
    pub(crate) unsafe fn area(block: *mut Self) -> *mut Area {
        unsafe { (*block).owner.owner() }
    }

    /// Returns the footer of `block`.
    ///
    /// # Safety
    ///
    /// `block` must point to a block whose header size is already written.
    pub(crate) unsafe fn footer(block: *mut Self) -> *mut Footer {
        unsafe { block.byte_add((*block).size - FOOTER_SIZE).cast::<Footer>() }
    }

    /// Returns the size recorded in the footer of `block`.
    ///
    /// # Safety
    ///
    /// `block` must point to a block whose header size is already written.
    pub(crate) unsafe fn footer_size(block: *mut Self) -> usize {
        unsafe { (*Self::footer(block)).size }
    }

    /// Returns the address right after `block`.
    ///
    /// The result is only a block if it is below the owning area's end.
    ///
    /// # Safety
    ///
    /// `block` must point to a well-formed block.
    pub(crate) unsafe fn next(block: *mut Self) -> *mut Self {
        unsafe { block.byte_add((*block).size) }
    }

    /// Returns the block right before `block`, found through its footer.
    ///
    /// # Safety
    ///
    /// `block` must point to a well-formed block that is not the first block
    /// of its area.
    pub(crate) unsafe fn prev(block: *mut Self) -> *mut Self {
        unsafe {
            let footer = block.byte_sub(FOOTER_SIZE).cast::<Footer>();
            block.byte_sub((*footer).size)
        }
    }

    /// Marks a free block allocated, splitting off the tail if it is large.
    ///
    /// If `block` is bigger than `raw_size(mark_size)`, it is split into an
    /// allocated block of `mark_size` bytes followed by a free remainder.
    /// Otherwise the whole block is marked allocated; the unused tail would be
    /// too small to be worth tracking.
    ///
    /// # Safety
    ///
    /// `block` must point to a well-formed free block of at least `mark_size`
    /// bytes, and `mark_size` must itself be a valid block size.
    pub(crate) unsafe fn fragment_and_mark(block: *mut Self, mark_size: usize) {
        unsafe {
            let size = Self::size(block);
            assert!(Self::is_free(block), "only free blocks can be marked");
            assert!(
                size >= mark_size,
                "block is smaller than the requested size"
            );

            if size - mark_size > HEADER_SIZE + FOOTER_SIZE {
                let area = Self::area(block);
                Self::init(block.cast(), mark_size, false, area);
                let rest = block.byte_add(mark_size).cast();
                Self::init(rest, size - mark_size, true, area);
            } else {
                Self::set_free(block, false);
            }
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    extern crate std;

    use std::alloc::{self, Layout};

    use super::*;

    fn with_test_area<F>(size: usize, test_fn: F)
    where
        F: FnOnce(*mut Area, *mut u8),
    {
        unsafe {
            let layout = Layout::from_size_align(size, BASE_ALIGN).unwrap();
            let memory = alloc::alloc(layout);
            memory.write_bytes(0x11, size);
            let area = Area::init(memory, size);
            test_fn(area, Area::first_block(area).cast());
            alloc::dealloc(memory, layout);
        }
    }

    #[test]
    fn test_sizes() {
        assert!(HEADER_SIZE.is_multiple_of(BASE_ALIGN));
        assert!(FOOTER_SIZE.is_multiple_of(BASE_ALIGN));
        assert_eq!(MIN_BLOCK_SIZE, HEADER_SIZE + FOOTER_SIZE);
        assert_eq!(Block::payload_size(Block::raw_size(48)), 48);
        assert_eq!(Block::checked_raw_size(usize::MAX), None);
    }

    #[test]
    fn test_init_mirrors_size_in_footer() {
        with_test_area(1024, |area, memory| unsafe {
            let block = Block::init(memory, 256, false, area);
            assert_eq!(Block::size(block), 256);
            assert_eq!(Block::footer_size(block), 256);
            assert!(!Block::is_free(block));
            assert_eq!(Block::area(block), area);
            assert_eq!(Block::payload(block), memory.add(HEADER_SIZE));
            assert_eq!(Block::from_payload(Block::payload(block)), block);
        });
    }

    #[test]
    fn test_next_and_prev() {
        with_test_area(1024, |area, memory| unsafe {
            let first = Block::init(memory, 128, false, area);
            let second = Block::init(memory.add(128), 64, true, area);
            assert_eq!(Block::next(first), second);
            assert_eq!(Block::prev(second), first);
        });
    }

    #[test]
    fn test_fragment_and_mark_splits_large_block() {
        with_test_area(1024, |area, memory| unsafe {
            let block = Block::init(memory, 512, true, area);
            Block::fragment_and_mark(block, 128);

            assert_eq!(Block::size(block), 128);
            assert!(!Block::is_free(block));

            let rest = Block::next(block);
            assert_eq!(Block::size(rest), 384);
            assert_eq!(Block::footer_size(rest), 384);
            assert!(Block::is_free(rest));
        });
    }

    #[test]
    fn test_fragment_and_mark_keeps_small_tail() {
        with_test_area(1024, |area, memory| unsafe {
            let size = 128 + MIN_BLOCK_SIZE;
            let block = Block::init(memory, size, true, area);
            Block::fragment_and_mark(block, 128);

            assert_eq!(Block::size(block), size);
            assert!(!Block::is_free(block));
        });
    }

    #[test]
    #[should_panic = "only free blocks can be marked"]
    fn test_fragment_and_mark_allocated_block() {
        with_test_area(1024, |area, memory| unsafe {
            let block = Block::init(memory, 256, false, area);
            Block::fragment_and_mark(block, 128);
        });
    }
}
