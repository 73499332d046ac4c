//! The heap context and its allocation, deallocation and reallocation
//! engines.
//!
//! # Algorithm
//!
//! Free blocks are not kept in a separate list. Instead, every block carries
//! a boundary tag (see [`block`](crate::block)) and the engines walk the
//! block chain of each area directly:
//!
//! - **Allocation** uses a **next-fit** pass that resumes from the most
//!   recently touched block, followed by a **first-fit** pass over every area
//!   that stops where the next-fit pass started. If both fail, a new area is
//!   requested from the [`AreaProvider`].
//! - **Deallocation** marks the block free and merges it with free neighbors
//!   on both sides, so no two free blocks are ever adjacent.
//! - **Reallocation** shrinks in place, grows in place into a free successor
//!   when possible, and falls back to allocate-copy-free.
//!
//! # Thread Safety
//!
//! [`Heap`] is `Send` when its provider is, but not `Sync`. Concurrent use
//! requires an external lock around every call; see
//! [`LockedHeap`](crate::LockedHeap).

use core::{cmp, fmt, ptr, ptr::NonNull};

use snafu::{OptionExt as _, ResultExt as _};

use crate::{
    align::{self, BASE_ALIGN},
    area::{Area, AreaList},
    block::{Block, MIN_BLOCK_SIZE},
    error::{
        AllocError, AllocSnafu, InvalidAlignmentSnafu, MemalignError, OutOfMemorySnafu,
        OverflowSnafu,
    },
    provider::AreaProvider,
};

/// Returns the block size needed for a request of `size` payload bytes.
fn request_size(size: usize) -> Option<usize> {
    align::checked_align_base(size).and_then(Block::checked_raw_size)
}

/// A boundary-tag heap growing through an [`AreaProvider`].
///
/// All allocator state lives in this value: the list of areas and the
/// next-fit cursor. Independent heaps never share anything.
pub struct Heap<P> {
    provider: P,
    areas: AreaList,
    /// Most recently allocated or freed block, where next-fit resumes.
    touched: *mut Block,
}

unsafe impl<P> Send for Heap<P> where P: Send {}

impl<P> fmt::Debug for Heap<P>
where
    P: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("provider", &self.provider)
            .field("areas", &self.areas().count())
            .field("touched", &self.touched)
            .finish()
    }
}

impl<P> Heap<P> {
    /// Creates an empty heap. No memory is requested until the first
    /// allocation.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            areas: AreaList::new(),
            touched: ptr::null_mut(),
        }
    }

    /// Returns the area provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub(crate) fn first_area(&self) -> *mut Area {
        self.areas.first()
    }

    pub(crate) fn touched(&self) -> *mut Block {
        self.touched
    }

    /// Returns the number of payload bytes usable through `ptr`.
    ///
    /// This can be more than was requested, as block sizes are rounded.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this heap.
    pub unsafe fn usable_size(&self, ptr: NonNull<u8>) -> usize {
        unsafe { Block::payload_size(Block::size(Block::from_payload(ptr.as_ptr()))) }
    }

    /// Frees the allocation at `ptr` and coalesces it with free neighbors.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `ptr` was returned by this heap and has not been freed since
    /// - the memory behind `ptr` is no longer used
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        unsafe {
            let mut block = Block::from_payload(ptr.as_ptr());
            let area = Block::area(block);
            debug_assert!(!Block::is_free(block), "double free of {ptr:p}");

            Block::set_free(block, true);

            let next = Block::next(block);
            if Area::contains(area, next) && Block::is_free(next) {
                let size = Block::size(block) + Block::size(next);
                block = Block::init(block.cast(), size, true, area);
            }

            if !Area::is_first_block(area, block) {
                let prev = Block::prev(block);
                if Block::is_free(prev) {
                    let size = Block::size(prev) + Block::size(block);
                    block = Block::init(prev.cast(), size, true, area);
                }
            }

            self.touched = block;
        }
    }

    /// Places a request of `request_size` bytes aligned to `align` into the
    /// free block `block`.
    ///
    /// Returns `None` without modifying anything if the block cannot hold the
    /// request once its payload is aligned.
    ///
    /// # Safety
    ///
    /// `block` must be a free block of this heap at least `request_size` bytes
    /// long, and `align` a multiple of [`BASE_ALIGN`].
    unsafe fn place(
        &mut self,
        block: *mut Block,
        request_size: usize,
        align: usize,
    ) -> Option<NonNull<u8>> {
        unsafe {
            let size = Block::size(block);
            let area = Block::area(block);
            let payload = Block::payload(block);

            let aligned = payload.addr().checked_next_multiple_of(align)?;
            let mut prefix = aligned - payload.addr();

            if prefix == 0 {
                Block::fragment_and_mark(block, request_size);
                self.touched = block;
                return NonNull::new(payload);
            }

            // The padding in front of the first block of an area must become a
            // block of its own.
            let is_first = Area::is_first_block(area, block);
            if is_first {
                while prefix < MIN_BLOCK_SIZE {
                    prefix = prefix.checked_add(align)?;
                }
            }

            if size.checked_sub(prefix)? < request_size {
                trace!("block {block:p} too small: size={size}, request={request_size}");
                return None;
            }

            let padding = if is_first {
                Block::init(block.cast(), prefix, true, area)
            } else {
                let prev = Block::prev(block);
                if !Block::is_free(prev) && prefix >= MIN_BLOCK_SIZE {
                    Block::init(block.cast(), prefix, true, area);
                } else {
                    let prev_size = Block::size(prev);
                    Block::init(prev.cast(), prev_size + prefix, Block::is_free(prev), area);
                }
                ptr::null_mut()
            };

            let placed = Block::init(block.byte_add(prefix).cast(), size - prefix, true, area);
            Block::fragment_and_mark(placed, request_size);

            self.touched = if is_first {
                padding
            } else {
                let next = Block::next(placed);
                if Area::contains(area, next) { next } else { placed }
            };

            let payload = Block::payload(placed);
            debug_assert!(payload.addr().is_multiple_of(align));
            NonNull::new(payload)
        }
    }

    /// Scans the blocks of `area` from `start` up to, but excluding, `until`
    /// (or the end of the area), placing the request into the first block
    /// that can hold it.
    ///
    /// # Safety
    ///
    /// `area` must be an area of this heap and `start` one of its blocks.
    unsafe fn scan(
        &mut self,
        area: *mut Area,
        start: *mut Block,
        until: *mut Block,
        request_size: usize,
        align: usize,
    ) -> Option<NonNull<u8>> {
        unsafe {
            let mut block = start;
            while Area::contains(area, block) && !ptr::eq(block, until) {
                if Block::is_free(block) && Block::size(block) >= request_size {
                    if let Some(ptr) = self.place(block, request_size, align) {
                        return Some(ptr);
                    }
                }
                block = Block::next(block);
            }
            None
        }
    }

    /// Next-fit pass: from the touched block to the end of its area.
    fn next_fit(&mut self, request_size: usize, align: usize) -> Option<NonNull<u8>> {
        let start = self.touched;
        if start.is_null() {
            return None;
        }
        unsafe {
            let area = Block::area(start);
            self.scan(area, start, ptr::null_mut(), request_size, align)
        }
    }

    /// First-fit pass over every area, skipping the blocks the next-fit pass
    /// already examined.
    fn first_fit(&mut self, request_size: usize, align: usize) -> Option<NonNull<u8>> {
        let sentinel = self.touched;
        let mut area = self.areas.first();
        unsafe {
            while !area.is_null() {
                let start = Area::first_block(area);
                if let Some(ptr) = self.scan(area, start, sentinel, request_size, align) {
                    return Some(ptr);
                }
                area = Area::next(area);
            }
        }
        None
    }
}

impl<P> Heap<P>
where
    P: AreaProvider,
{
    /// Allocates `size` bytes aligned to `align`.
    ///
    /// An `align` of zero requests [`BASE_ALIGN`]. Any other alignment,
    /// including values that are not powers of two, is honored: the returned
    /// address is a multiple of both `align` and `BASE_ALIGN`.
    ///
    /// A zero `size` yields a unique, freeable pointer.
    ///
    /// # Examples
    ///
    /// ```
    /// use heap::{Heap, provider::RegionProvider};
    ///
    /// let mut pool = vec![0u128; 4096];
    /// let provider = unsafe { RegionProvider::new(pool.as_mut_ptr().cast(), 64 * 1024, 4096) };
    /// let mut heap = Heap::new(provider);
    ///
    /// let ptr = heap.allocate(24, 96).unwrap();
    /// assert_eq!(ptr.as_ptr().addr() % 96, 0);
    /// unsafe { heap.deallocate(ptr) };
    /// ```
    pub fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, AllocError> {
        let total_align = align::total_alignment(align).context(OverflowSnafu { size, align })?;
        let request_size = request_size(size).context(OverflowSnafu { size, align })?;

        if let Some(ptr) = self.next_fit(request_size, total_align) {
            return Ok(ptr);
        }
        if let Some(ptr) = self.first_fit(request_size, total_align) {
            return Ok(ptr);
        }

        let area = self.grow(request_size, total_align)?;
        unsafe {
            let block = Area::first_block(area);
            let size = Area::size(area);
            self.place(block, request_size, total_align)
                .context(OutOfMemorySnafu { size })
        }
    }

    /// Requests a new area able to hold `request_size` bytes aligned to
    /// `align`, and links it.
    fn grow(&mut self, request_size: usize, align: usize) -> Result<*mut Area, AllocError> {
        let granularity = self.provider.granularity();
        assert!(
            granularity > 0 && granularity.is_multiple_of(BASE_ALIGN),
            "granularity must be a non-zero multiple of the base alignment"
        );

        let slack = if align > BASE_ALIGN {
            align - BASE_ALIGN + MIN_BLOCK_SIZE
        } else {
            0
        };
        let area_size = request_size
            .checked_add(slack)
            .and_then(Area::checked_raw_size)
            .and_then(|size| align::checked_align_up(size, granularity))
            .context(OverflowSnafu {
                size: Block::payload_size(request_size),
                align,
            })?;

        let Some(memory) = self.provider.create_area(area_size) else {
            warn!("area provider refused {area_size} bytes");
            return OutOfMemorySnafu { size: area_size }.fail();
        };
        assert!(
            memory.as_ptr().addr().is_multiple_of(BASE_ALIGN),
            "area provider returned misaligned memory"
        );

        unsafe {
            let area = Area::init(memory.as_ptr(), area_size);
            self.areas.push(area);
            debug!("heap grew by {area_size} bytes at {area:p}");
            Ok(area)
        }
    }

    /// Resizes the allocation at `ptr` to `new_size` bytes.
    ///
    /// The first `min(old, new)` payload bytes are preserved. The block is
    /// shrunk or grown in place when possible; otherwise a new block is
    /// allocated, the contents copied, and the old block freed. On error the
    /// original allocation is left untouched.
    ///
    /// A shrink that would free less than one minimal block keeps the excess
    /// in the block.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live allocation of this heap.
    pub unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let request_size = request_size(new_size).context(OverflowSnafu {
            size: new_size,
            align: BASE_ALIGN,
        })?;

        unsafe {
            let block = Block::from_payload(ptr.as_ptr());
            let area = Block::area(block);
            let size = Block::size(block);

            if request_size == size {
                return Ok(ptr);
            }

            if request_size < size {
                self.shrink(block, request_size);
                return Ok(ptr);
            }

            let next = Block::next(block);
            if Area::contains(area, next)
                && Block::is_free(next)
                && size + Block::size(next) >= request_size
            {
                let merged = Block::init(block.cast(), size + Block::size(next), true, area);
                Block::fragment_and_mark(merged, request_size);
                self.touched = merged;
                return Ok(ptr);
            }

            let new_ptr = self.allocate(new_size, BASE_ALIGN)?;
            let count = cmp::min(Block::payload_size(size), new_size);
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), count);
            self.deallocate(ptr);
            Ok(new_ptr)
        }
    }

    /// Splits the tail of an allocated block off as a free block.
    ///
    /// # Safety
    ///
    /// `block` must be an allocated block of this heap larger than
    /// `request_size`.
    unsafe fn shrink(&mut self, block: *mut Block, request_size: usize) {
        unsafe {
            let size = Block::size(block);
            let excess = size - request_size;
            if excess < MIN_BLOCK_SIZE {
                return;
            }

            let area = Block::area(block);
            Block::init(block.cast(), request_size, false, area);
            let mut rest = Block::init(block.byte_add(request_size).cast(), excess, true, area);

            let next = Block::next(rest);
            if Area::contains(area, next) && Block::is_free(next) {
                rest = Block::init(rest.cast(), excess + Block::size(next), true, area);
            }
            self.touched = rest;
        }
    }

    /// Allocates `count * size` zeroed bytes.
    ///
    /// Fails before touching the heap if the multiplication overflows.
    pub fn allocate_zeroed(
        &mut self,
        count: usize,
        size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let total = count.checked_mul(size).context(OverflowSnafu {
            size,
            align: BASE_ALIGN,
        })?;
        let ptr = self.allocate(total, BASE_ALIGN)?;
        unsafe { ptr.as_ptr().write_bytes(0, total) };
        Ok(ptr)
    }

    /// Allocates with `posix_memalign` rules: `align` must be a power of two
    /// and a multiple of the pointer size.
    pub fn allocate_memalign(
        &mut self,
        align: usize,
        size: usize,
    ) -> Result<NonNull<u8>, MemalignError> {
        snafu::ensure!(
            align.is_power_of_two() && align.is_multiple_of(size_of::<*mut u8>()),
            InvalidAlignmentSnafu { align }
        );
        self.allocate(size, align).context(AllocSnafu)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    extern crate std;

    use std::{
        alloc::{self, Layout},
        vec::Vec,
    };

    use super::*;
    use crate::provider::RegionProvider;

    fn with_test_heap<F>(pool_size: usize, granularity: usize, test_fn: F)
    where
        F: FnOnce(&mut Heap<RegionProvider>),
    {
        unsafe {
            let layout = Layout::from_size_align(pool_size, 4096).unwrap();
            let pool = alloc::alloc(layout);
            pool.write_bytes(0x11, pool_size);
            let mut heap = Heap::new(RegionProvider::new(pool, pool_size, granularity));
            test_fn(&mut heap);
            heap.verify().unwrap();
            alloc::dealloc(pool, layout);
        }
    }

    fn blocks(heap: &Heap<RegionProvider>) -> Vec<(usize, bool)> {
        let mut blocks = Vec::new();
        for area in heap.areas() {
            blocks.extend(area.blocks().map(|block| (block.size(), block.is_free())));
        }
        blocks
    }

    #[test]
    fn test_first_allocation_creates_area() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            assert_eq!(heap.areas().count(), 0);
            let ptr = heap.allocate(64, 0).unwrap();
            assert!(ptr.as_ptr().addr().is_multiple_of(BASE_ALIGN));
            assert_eq!(heap.areas().count(), 1);
            assert_eq!(heap.provider().areas_created(), 1);
            heap.deallocate(ptr);
        });
    }

    #[test]
    fn test_split_and_coalesce() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let a = heap.allocate(64, 0).unwrap();
            let b = heap.allocate(64, 0).unwrap();
            let c = heap.allocate(64, 0).unwrap();

            let block = Block::raw_size(64);
            let rest = 4096 - crate::area::AREA_HEADER_SIZE - 3 * block;
            assert_eq!(
                blocks(heap),
                [(block, false), (block, false), (block, false), (rest, true)]
            );

            heap.deallocate(b);
            assert_eq!(
                blocks(heap),
                [(block, false), (block, true), (block, false), (rest, true)]
            );

            heap.deallocate(a);
            assert_eq!(
                blocks(heap),
                [(2 * block, true), (block, false), (rest, true)]
            );

            heap.deallocate(c);
            assert_eq!(blocks(heap), [(4096 - crate::area::AREA_HEADER_SIZE, true)]);
        });
    }

    #[test]
    fn test_reuse_after_free() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let x = heap.allocate(100, 0).unwrap();
            let y = heap.allocate(100, 0).unwrap();
            let z = heap.allocate(100, 0).unwrap();

            heap.deallocate(y);
            let w = heap.allocate(80, 0).unwrap();
            assert_eq!(w, y);

            heap.deallocate(x);
            heap.deallocate(z);
            heap.deallocate(w);
        });
    }

    #[test]
    fn test_first_fit_reuses_hole_before_cursor() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            // Five 816 byte blocks fill the first area exactly.
            let first = (0..5)
                .map(|_| heap.allocate(Block::payload_size(816), 0).unwrap())
                .collect::<Vec<_>>();
            heap.deallocate(first[1]);

            // Too large for the hole: a second area is created, then filled.
            let big = heap.allocate(2000, 0).unwrap();
            let tail = heap.allocate(2016, 0).unwrap();
            assert_eq!(heap.provider().areas_created(), 2);
            assert_eq!(
                blocks(heap),
                [
                    (816, false),
                    (816, true),
                    (816, false),
                    (816, false),
                    (816, false),
                    (2032, false),
                    (2048, false),
                ]
            );

            // Nothing fits after the cursor, so the search wraps to the hole.
            let small = heap.allocate(64, 0).unwrap();
            assert_eq!(small, first[1]);
            assert_eq!(heap.provider().areas_created(), 2);

            for ptr in [first[0], first[2], first[3], first[4], big, tail, small] {
                heap.deallocate(ptr);
            }
        });
    }

    #[test]
    fn test_small_remainder_is_not_split() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let a = heap.allocate(96, 0).unwrap();
            let b = heap.allocate(16, 0).unwrap();
            heap.deallocate(a);

            // A 64 byte request leaves exactly one minimal block of slack,
            // which stays inside the allocation.
            let c = heap.allocate(64, 0).unwrap();
            assert_eq!(c, a);
            assert_eq!(heap.usable_size(c), 96);

            heap.deallocate(b);
            heap.deallocate(c);
        });
    }

    #[test]
    fn test_aligned_allocation_in_first_block() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let ptr = heap.allocate(32, 256).unwrap();
            assert!(ptr.as_ptr().addr().is_multiple_of(256));

            let first = blocks(heap)[0];
            assert!(first.1, "padding in front of the first block must be free");
            assert!(first.0 >= MIN_BLOCK_SIZE);

            heap.deallocate(ptr);
            assert_eq!(blocks(heap).len(), 1);
        });
    }

    #[test]
    fn test_aligned_allocation_after_allocated_block() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let a = heap.allocate(16, 0).unwrap();
            let b = heap.allocate(64, 512).unwrap();
            assert!(b.as_ptr().addr().is_multiple_of(512));

            let c = heap.allocate(64, 48).unwrap();
            assert!(c.as_ptr().addr().is_multiple_of(48));

            heap.verify().unwrap();
            heap.deallocate(b);
            heap.deallocate(a);
            heap.deallocate(c);
            assert_eq!(blocks(heap).len(), 1);
        });
    }

    #[test]
    fn test_small_prefix_extends_previous_block() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            // The pool is page aligned, so the free block after `a` has its
            // payload 16 bytes short of a 32 byte boundary.
            let a = heap.allocate(16, 0).unwrap();
            let b = heap.allocate(16, 32).unwrap();
            assert!(b.as_ptr().addr().is_multiple_of(32));
            assert_eq!(heap.usable_size(a), 32);
            assert_eq!(blocks(heap).len(), 3);

            heap.deallocate(a);
            heap.deallocate(b);
        });
    }

    #[test]
    fn test_growth_adds_areas() {
        with_test_heap(64 * 1024, 4096, |heap| unsafe {
            let ptrs = (0..12)
                .map(|_| heap.allocate(1024, 0).unwrap())
                .collect::<Vec<_>>();
            assert!(heap.areas().count() > 1);
            for ptr in ptrs {
                heap.deallocate(ptr);
            }
            for area in heap.areas() {
                assert_eq!(area.blocks().count(), 1);
            }
        });
    }

    #[test]
    fn test_large_request_gets_large_area() {
        with_test_heap(64 * 1024, 4096, |heap| unsafe {
            let ptr = heap.allocate(20_000, 0).unwrap();
            assert_eq!(heap.areas().count(), 1);
            assert_eq!(heap.areas().next().unwrap().size(), 20 * 1024);
            heap.deallocate(ptr);
        });
    }

    #[test]
    fn test_out_of_memory() {
        with_test_heap(8 * 1024, 4096, |heap| {
            let err = heap.allocate(16 * 1024, 0).unwrap_err();
            assert!(err.is_out_of_memory());
            assert_eq!(heap.areas().count(), 0);
        });
    }

    #[test]
    fn test_overflow() {
        with_test_heap(8 * 1024, 4096, |heap| {
            let err = heap.allocate(usize::MAX - 8, 0).unwrap_err();
            assert!(!err.is_out_of_memory());
            let err = heap.allocate(16, usize::MAX).unwrap_err();
            assert!(!err.is_out_of_memory());
            let err = heap.allocate_zeroed(usize::MAX, 2).unwrap_err();
            assert!(!err.is_out_of_memory());
            assert_eq!(heap.areas().count(), 0);
        });
    }

    #[test]
    fn test_allocate_zeroed() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let ptr = heap.allocate(256, 0).unwrap();
            ptr.as_ptr().write_bytes(0xff, 256);
            heap.deallocate(ptr);

            let ptr = heap.allocate_zeroed(16, 16).unwrap();
            for i in 0..256 {
                assert_eq!(ptr.as_ptr().add(i).read(), 0);
            }
            heap.deallocate(ptr);
        });
    }

    #[test]
    fn test_memalign_rejects_bad_alignment() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            assert!(matches!(
                heap.allocate_memalign(24, 16),
                Err(MemalignError::InvalidAlignment { align: 24, .. })
            ));
            assert!(matches!(
                heap.allocate_memalign(2, 16),
                Err(MemalignError::InvalidAlignment { .. })
            ));
            let ptr = heap.allocate_memalign(128, 16).unwrap();
            assert!(ptr.as_ptr().addr().is_multiple_of(128));
            heap.deallocate(ptr);
        });
    }

    #[test]
    fn test_realloc_same_size() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let ptr = heap.allocate(100, 0).unwrap();
            assert_eq!(heap.reallocate(ptr, 112).unwrap(), ptr);
            assert_eq!(heap.reallocate(ptr, 97).unwrap(), ptr);
            heap.deallocate(ptr);
        });
    }

    #[test]
    fn test_realloc_shrink_in_place() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let a = heap.allocate(256, 0).unwrap();
            let b = heap.allocate(16, 0).unwrap();

            let shrunk = heap.reallocate(a, 64).unwrap();
            assert_eq!(shrunk, a);
            assert_eq!(heap.usable_size(a), 64);
            assert_eq!(blocks(heap)[1], (256 - 64, true));

            // Less than a minimal block of excess stays in the allocation.
            let shrunk = heap.reallocate(a, 48).unwrap();
            assert_eq!(shrunk, a);
            assert_eq!(heap.usable_size(a), 64);

            heap.deallocate(a);
            heap.deallocate(b);
        });
    }

    #[test]
    fn test_realloc_shrink_merges_with_free_successor() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let a = heap.allocate(256, 0).unwrap();
            let b = heap.allocate(64, 0).unwrap();
            let c = heap.allocate(16, 0).unwrap();
            heap.deallocate(b);

            heap.reallocate(a, 32).unwrap();
            heap.verify().unwrap();
            assert_eq!(
                blocks(heap)[1],
                (256 - 32 + Block::raw_size(64), true)
            );

            heap.deallocate(a);
            heap.deallocate(c);
        });
    }

    #[test]
    fn test_realloc_grow_in_place() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let a = heap.allocate(64, 0).unwrap();
            let b = heap.allocate(256, 0).unwrap();
            let c = heap.allocate(16, 0).unwrap();
            heap.deallocate(b);

            for i in 0..64 {
                a.as_ptr().add(i).write(i as u8);
            }
            let grown = heap.reallocate(a, 200).unwrap();
            assert_eq!(grown, a);
            for i in 0..64 {
                assert_eq!(grown.as_ptr().add(i).read(), i as u8);
            }

            heap.deallocate(grown);
            heap.deallocate(c);
        });
    }

    #[test]
    fn test_realloc_moves_when_successor_is_allocated() {
        with_test_heap(16 * 1024, 4096, |heap| unsafe {
            let a = heap.allocate(64, 0).unwrap();
            let b = heap.allocate(64, 0).unwrap();
            for i in 0..64 {
                a.as_ptr().add(i).write(0xa0 ^ i as u8);
            }

            let moved = heap.reallocate(a, 1024).unwrap();
            assert_ne!(moved, a);
            for i in 0..64 {
                assert_eq!(moved.as_ptr().add(i).read(), 0xa0 ^ i as u8);
            }

            heap.deallocate(moved);
            heap.deallocate(b);
        });
    }

    #[test]
    fn test_realloc_failure_keeps_original() {
        with_test_heap(4096, 4096, |heap| unsafe {
            let a = heap.allocate(64, 0).unwrap();
            let b = heap.allocate(64, 0).unwrap();
            a.as_ptr().write_bytes(0x5a, 64);

            assert!(heap.reallocate(a, 8192).unwrap_err().is_out_of_memory());
            for i in 0..64 {
                assert_eq!(a.as_ptr().add(i).read(), 0x5a);
            }

            heap.deallocate(a);
            heap.deallocate(b);
        });
    }
}
