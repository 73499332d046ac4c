//! Heap areas: raw memory regions obtained from an
//! [`AreaProvider`](crate::provider::AreaProvider).
//!
//! An area starts with a small [`Area`] header and is tiled, without gaps, by
//! [`Block`]s from [`Area::first_block`] up to [`Area::end`]. Areas are
//! linked into an [`AreaList`] in creation order and are never released.

use core::ptr;

use crate::{
    align::{BASE_ALIGN, align_base},
    block::{Block, MIN_BLOCK_SIZE},
};

/// Header placed at the start of every area.
#[repr(C, align(16))]
#[derive(Debug)]
pub(crate) struct Area {
    /// First address past the area.
    end: *mut u8,
    /// Next area in creation order, or null.
    next: *mut Self,
}

const _: () = assert!(align_of::<Area>() == BASE_ALIGN);

pub(crate) const AREA_HEADER_SIZE: usize = align_base(size_of::<Area>());

impl Area {
    /// Returns the size an area needs to host `payload_size` bytes of blocks,
    /// or `None` on overflow.
    pub(crate) const fn checked_raw_size(payload_size: usize) -> Option<usize> {
        payload_size.checked_add(AREA_HEADER_SIZE)
    }

    /// Turns `size` bytes at `memory` into an area holding one free block.
    ///
    /// The area is not linked into any list yet.
    ///
    /// # Safety
    ///
    /// `memory..memory + size` must be valid for reads and writes, unused, and
    /// must outlive the heap that links the area.
    pub(crate) unsafe fn init(memory: *mut u8, size: usize) -> *mut Self {
        #[expect(clippy::cast_ptr_alignment)]
        let area = memory.cast::<Self>();
        assert!(
            area.is_aligned(),
            "area must be aligned to the base alignment"
        );
        assert!(
            size >= AREA_HEADER_SIZE + MIN_BLOCK_SIZE,
            "area must be able to hold at least one block"
        );
        assert!(
            size.is_multiple_of(BASE_ALIGN),
            "area size must be a multiple of the base alignment"
        );

        unsafe {
            area.write(Self {
                end: memory.add(size),
                next: ptr::null_mut(),
            });
            Block::init(
                Self::first_block(area).cast(),
                size - AREA_HEADER_SIZE,
                true,
                area,
            );
        }

        area
    }

    /// Returns the first block of `area`.
    ///
    /// # Safety
    ///
    /// `area` must point to an initialized area.
    pub(crate) unsafe fn first_block(area: *mut Self) -> *mut Block {
        unsafe { area.byte_add(AREA_HEADER_SIZE) }.cast::<Block>()
    }

    /// # Safety
    ///
    /// `area` must point to an initialized area.
    pub(crate) unsafe fn end(area: *mut Self) -> *mut u8 {
        unsafe { (*area).end }
    }

    /// # Safety
    ///
    /// `area` must point to an initialized area.
    pub(crate) unsafe fn next(area: *mut Self) -> *mut Self {
        unsafe { (*area).next }
    }

    /// Returns `true` if `block` starts inside `area`'s block span.
    ///
    /// This is how callers tell a live neighbor from the end of the area after
    /// [`Block::next`].
    ///
    /// # Safety
    ///
    /// `area` must point to an initialized area.
    pub(crate) unsafe fn contains(area: *mut Self, block: *mut Block) -> bool {
        unsafe {
            block.addr() >= Self::first_block(area).addr() && block.addr() < (*area).end.addr()
        }
    }

    /// Returns `true` if `block` is the first block of `area`.
    ///
    /// # Safety
    ///
    /// `area` must point to an initialized area.
    pub(crate) unsafe fn is_first_block(area: *mut Self, block: *mut Block) -> bool {
        unsafe { ptr::eq(Self::first_block(area), block) }
    }

    /// Returns the total size of `area`, header included.
    ///
    /// # Safety
    ///
    /// `area` must point to an initialized area.
    pub(crate) unsafe fn size(area: *mut Self) -> usize {
        unsafe { (*area).end.addr() - area.addr() }
    }
}

/// Creation-ordered list of every area of a heap.
#[derive(Debug)]
pub(crate) struct AreaList {
    first: *mut Area,
    last: *mut Area,
}

impl AreaList {
    pub(crate) const fn new() -> Self {
        Self {
            first: ptr::null_mut(),
            last: ptr::null_mut(),
        }
    }

    pub(crate) fn first(&self) -> *mut Area {
        self.first
    }

    /// Appends `area` to the end of the list.
    ///
    /// # Safety
    ///
    /// `area` must point to an initialized area that is not linked yet.
    pub(crate) unsafe fn push(&mut self, area: *mut Area) {
        unsafe {
            assert!((*area).next.is_null(), "area must not be already linked");

            if self.last.is_null() {
                self.first = area;
            } else {
                (*self.last).next = area;
            }
            self.last = area;
        }
    }
}
