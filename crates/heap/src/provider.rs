//! Sources of raw memory for heap areas.
//!
//! The heap never obtains memory on its own. Whenever no free block can
//! satisfy a request, it asks its [`AreaProvider`] for a fresh region whose
//! size is a multiple of the provider's [granularity](AreaProvider::granularity).
//! Areas are never handed back.

use core::ptr::NonNull;

use crate::align::BASE_ALIGN;

/// A supplier of raw memory regions for a [`Heap`](crate::Heap).
///
/// # Safety
///
/// Implementors must guarantee that:
///
/// - every region returned by [`create_area`](Self::create_area) is valid for
///   reads and writes of at least the requested size
/// - every region is aligned to [`BASE_ALIGN`]
/// - regions never overlap each other or any other live memory, and stay valid
///   for as long as the heap using them exists
/// - [`granularity`](Self::granularity) returns a non-zero multiple of
///   [`BASE_ALIGN`] and never changes
pub unsafe trait AreaProvider {
    /// Returns the unit every area request is rounded up to.
    fn granularity(&self) -> usize;

    /// Returns a fresh region of at least `size` bytes, or `None` if memory is
    /// exhausted.
    fn create_area(&mut self, size: usize) -> Option<NonNull<u8>>;
}

/// An [`AreaProvider`] carving areas out of one fixed region.
///
/// Areas are bump-allocated from the front of the region. This is the
/// provider of choice for freestanding programs with a static heap pool.
///
/// # Examples
///
/// ```
/// use heap::{Heap, provider::RegionProvider};
///
/// let mut pool = vec![0u128; 1024];
/// let provider = unsafe { RegionProvider::new(pool.as_mut_ptr().cast(), 16 * 1024, 4096) };
/// let mut heap = Heap::new(provider);
///
/// let ptr = heap.allocate(100, 0).unwrap();
/// unsafe { heap.deallocate(ptr) };
/// ```
#[derive(Debug)]
pub struct RegionProvider {
    next: *mut u8,
    remaining: usize,
    granularity: usize,
    areas_created: usize,
}

unsafe impl Send for RegionProvider {}

impl RegionProvider {
    /// Creates a provider with no memory; every request fails.
    #[must_use]
    pub const fn empty(granularity: usize) -> Self {
        Self {
            next: NonNull::dangling().as_ptr(),
            remaining: 0,
            granularity,
            areas_created: 0,
        }
    }

    /// Creates a provider handing out areas from `start..start + size`.
    ///
    /// The region is trimmed so that it starts on a [`BASE_ALIGN`] boundary.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - the range `start..start + size` is valid for reads and writes
    /// - the range is not used by anything else and outlives every heap using
    ///   this provider
    ///
    /// # Panics
    ///
    /// Panics if `granularity` is zero or not a multiple of [`BASE_ALIGN`].
    #[must_use]
    pub unsafe fn new(start: *mut u8, size: usize, granularity: usize) -> Self {
        assert!(
            granularity > 0 && granularity.is_multiple_of(BASE_ALIGN),
            "granularity must be a non-zero multiple of the base alignment"
        );

        let align_offset = start.align_offset(BASE_ALIGN);
        let remaining = size.saturating_sub(align_offset);
        Self {
            next: start.wrapping_add(align_offset),
            remaining,
            granularity,
            areas_created: 0,
        }
    }

    /// Returns the number of bytes not handed out yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Returns the number of areas handed out so far.
    #[must_use]
    pub fn areas_created(&self) -> usize {
        self.areas_created
    }
}

unsafe impl AreaProvider for RegionProvider {
    fn granularity(&self) -> usize {
        self.granularity
    }

    fn create_area(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 || size > self.remaining || !size.is_multiple_of(BASE_ALIGN) {
            return None;
        }

        let area = NonNull::new(self.next)?;
        self.next = self.next.wrapping_add(size);
        self.remaining -= size;
        self.areas_created += 1;
        Some(area)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    extern crate std;

    use std::{vec, vec::Vec};

    use super::*;

    #[test]
    fn test_areas_are_carved_in_order() {
        let mut pool = vec![0_u128; 256];
        let start = pool.as_mut_ptr().cast::<u8>();
        let mut provider = unsafe { RegionProvider::new(start, 4096, 1024) };
        assert_eq!(provider.granularity(), 1024);

        let areas = (0..4)
            .map(|_| provider.create_area(1024).unwrap())
            .collect::<Vec<_>>();
        for (i, area) in areas.iter().enumerate() {
            assert_eq!(area.as_ptr().addr(), start.addr() + i * 1024);
            assert!(area.as_ptr().addr().is_multiple_of(BASE_ALIGN));
        }
        assert_eq!(provider.areas_created(), 4);
        assert_eq!(provider.remaining(), 0);
        assert!(provider.create_area(1024).is_none());
    }

    #[test]
    fn test_unaligned_start_is_trimmed() {
        let mut pool = vec![0_u128; 256];
        let start = pool.as_mut_ptr().cast::<u8>().wrapping_add(1);
        let mut provider = unsafe { RegionProvider::new(start, 4095, 1024) };
        assert_eq!(provider.remaining(), 4096 - BASE_ALIGN);

        let area = provider.create_area(1024).unwrap();
        assert_eq!(area.as_ptr().addr(), start.addr() - 1 + BASE_ALIGN);
    }

    #[test]
    fn test_empty_provider() {
        let mut provider = RegionProvider::empty(4096);
        assert!(provider.create_area(4096).is_none());
        assert_eq!(provider.areas_created(), 0);
    }

    #[test]
    #[should_panic = "granularity must be a non-zero multiple"]
    fn test_invalid_granularity() {
        let mut pool = vec![0_u128; 4];
        let _ = unsafe { RegionProvider::new(pool.as_mut_ptr().cast(), 64, 24) };
    }
}
