//! Read-only views of a heap: area and block walks, statistics, and a
//! structural verifier.

use core::{fmt, marker::PhantomData, ptr};

use snafu::ensure;

use crate::{
    Heap,
    align::BASE_ALIGN,
    area::Area,
    block::{Block, MIN_BLOCK_SIZE},
    error::{
        AdjacentFreeSnafu, BadBlockSizeSnafu, CorruptionError, DanglingCursorSnafu,
        FooterMismatchSnafu, ForeignOwnerSnafu, OverrunSnafu,
    },
};

/// A view of one area of a heap.
#[derive(Clone, Copy)]
pub struct AreaInfo<'a> {
    area: *mut Area,
    _heap: PhantomData<&'a ()>,
}

impl<'a> AreaInfo<'a> {
    /// Returns the address of the area.
    #[must_use]
    pub fn start(&self) -> usize {
        self.area.addr()
    }

    /// Returns the first address past the area.
    #[must_use]
    pub fn end(&self) -> usize {
        unsafe { Area::end(self.area).addr() }
    }

    /// Returns the total size of the area, header included.
    #[must_use]
    pub fn size(&self) -> usize {
        unsafe { Area::size(self.area) }
    }

    /// Returns an iterator over the blocks of the area, in address order.
    #[must_use]
    pub fn blocks(&self) -> Blocks<'a> {
        Blocks {
            area: self.area,
            block: unsafe { Area::first_block(self.area) },
            _heap: PhantomData,
        }
    }
}

impl fmt::Debug for AreaInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaInfo")
            .field("start", &format_args!("{:#x}", self.start()))
            .field("end", &format_args!("{:#x}", self.end()))
            .finish()
    }
}

/// A snapshot of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    addr: usize,
    size: usize,
    payload: usize,
    is_free: bool,
}

impl BlockInfo {
    /// Returns the address of the block header.
    #[must_use]
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Returns the total size of the block, header and footer included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the address of the payload.
    #[must_use]
    pub fn payload(&self) -> usize {
        self.payload
    }

    /// Returns the number of payload bytes of the block.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        Block::payload_size(self.size)
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.is_free
    }
}

/// Iterator over the areas of a heap, in creation order.
pub struct Areas<'a> {
    area: *mut Area,
    _heap: PhantomData<&'a ()>,
}

impl<'a> Iterator for Areas<'a> {
    type Item = AreaInfo<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.area.is_null() {
            return None;
        }
        let info = AreaInfo {
            area: self.area,
            _heap: PhantomData,
        };
        self.area = unsafe { Area::next(self.area) };
        Some(info)
    }
}

/// Iterator over the blocks of an area, in address order.
pub struct Blocks<'a> {
    area: *mut Area,
    block: *mut Block,
    _heap: PhantomData<&'a ()>,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        unsafe {
            if !Area::contains(self.area, self.block) {
                return None;
            }
            let block = self.block;
            let size = Block::size(block);
            // A zero size would never advance; stop instead of spinning on a
            // damaged heap.
            if size == 0 {
                self.block = Area::end(self.area).cast();
            } else {
                self.block = block.wrapping_byte_add(size);
            }
            Some(BlockInfo {
                addr: block.addr(),
                size,
                payload: Block::payload(block).addr(),
                is_free: Block::is_free(block),
            })
        }
    }
}

/// Aggregate figures about a heap.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of areas obtained from the provider.
    pub areas: usize,
    /// Bytes obtained from the provider, area headers included.
    pub reserved_bytes: usize,
    /// Number of allocated blocks.
    pub allocated_blocks: usize,
    /// Bytes in allocated blocks, headers and footers included.
    pub allocated_bytes: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Bytes in free blocks, headers and footers included.
    pub free_bytes: usize,
    /// Payload capacity of the largest free block.
    pub largest_free_payload: usize,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} areas, {} bytes reserved, {} allocated blocks ({} bytes), {} free blocks ({} bytes, largest payload {})",
            self.areas,
            self.reserved_bytes,
            self.allocated_blocks,
            self.allocated_bytes,
            self.free_blocks,
            self.free_bytes,
            self.largest_free_payload,
        )
    }
}

impl<P> Heap<P> {
    /// Returns an iterator over the areas of the heap.
    #[must_use]
    pub fn areas(&self) -> Areas<'_> {
        Areas {
            area: self.first_area(),
            _heap: PhantomData,
        }
    }

    /// Computes statistics by walking every block of the heap.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats::default();
        for area in self.areas() {
            stats.areas += 1;
            stats.reserved_bytes += area.size();
            for block in area.blocks() {
                if block.is_free() {
                    stats.free_blocks += 1;
                    stats.free_bytes += block.size();
                    stats.largest_free_payload =
                        stats.largest_free_payload.max(block.payload_size());
                } else {
                    stats.allocated_blocks += 1;
                    stats.allocated_bytes += block.size();
                }
            }
        }
        stats
    }

    /// Checks every structural invariant of the heap.
    ///
    /// Every block must have a valid size that matches its footer, belong to
    /// the area it lies in, and end inside that area. No two free blocks may
    /// be adjacent, and the next-fit cursor must designate a block.
    pub fn verify(&self) -> Result<(), CorruptionError> {
        let touched = self.touched();
        let mut touched_found = touched.is_null();

        let mut area = self.first_area();
        while !area.is_null() {
            unsafe {
                let end = Area::end(area);
                let mut block = Area::first_block(area);
                let mut prev_free = false;
                let mut prev = ptr::null_mut::<Block>();

                while block.addr() < end.addr() {
                    let size = Block::size(block);
                    ensure!(
                        size >= MIN_BLOCK_SIZE && size.is_multiple_of(BASE_ALIGN),
                        BadBlockSizeSnafu {
                            block: block.addr(),
                            size
                        }
                    );
                    ensure!(
                        size <= end.addr() - block.addr(),
                        OverrunSnafu {
                            block: block.addr(),
                            area_end: end.addr()
                        }
                    );
                    let footer = Block::footer_size(block);
                    ensure!(
                        footer == size,
                        FooterMismatchSnafu {
                            block: block.addr(),
                            header: size,
                            footer
                        }
                    );
                    let owner = Block::area(block);
                    ensure!(
                        ptr::eq(owner, area),
                        ForeignOwnerSnafu {
                            block: block.addr(),
                            owner: owner.addr(),
                            area: area.addr()
                        }
                    );
                    let is_free = Block::is_free(block);
                    ensure!(
                        !(is_free && prev_free),
                        AdjacentFreeSnafu {
                            block: prev.addr(),
                            next: block.addr()
                        }
                    );

                    touched_found |= ptr::eq(block, touched);
                    prev_free = is_free;
                    prev = block;
                    block = Block::next(block);
                }
                area = Area::next(area);
            }
        }

        ensure!(
            touched_found,
            DanglingCursorSnafu {
                block: touched.addr()
            }
        );
        Ok(())
    }
}
