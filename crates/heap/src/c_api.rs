//! The C dynamic memory contract on top of a [`Heap`].
//!
//! [`CHeap`] translates between the engines' `Result`s and the C convention
//! of null pointers plus `errno`. The errno storage itself belongs to the
//! runtime and is reached through the [`Errno`] trait.

use core::ptr::{self, NonNull};

use crate::{Heap, align::BASE_ALIGN, error::MemalignError, provider::AreaProvider};

/// Access to the `errno` of the calling context.
pub trait Errno {
    /// Records an out-of-memory condition (`ENOMEM`).
    fn set_out_of_memory(&mut self);
}

/// An [`Errno`] that counts out-of-memory reports.
///
/// Useful for embedders without a real `errno` and for tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordedErrno {
    out_of_memory: usize,
}

impl RecordedErrno {
    #[must_use]
    pub const fn new() -> Self {
        Self { out_of_memory: 0 }
    }

    /// Returns how many times `ENOMEM` was reported.
    #[must_use]
    pub fn out_of_memory_count(&self) -> usize {
        self.out_of_memory
    }
}

impl Errno for RecordedErrno {
    fn set_out_of_memory(&mut self) {
        self.out_of_memory += 1;
    }
}

/// A [`Heap`] exposing `malloc`, `calloc`, `realloc`, `aligned_alloc` and
/// `free` semantics.
///
/// # Examples
///
/// ```
/// use heap::{CHeap, Heap, RecordedErrno, provider::RegionProvider};
///
/// let mut pool = vec![0u128; 1024];
/// let provider = unsafe { RegionProvider::new(pool.as_mut_ptr().cast(), 16 * 1024, 4096) };
/// let mut heap = CHeap::new(Heap::new(provider), RecordedErrno::new());
///
/// let ptr = heap.calloc(4, 8);
/// assert!(!ptr.is_null());
/// assert!(heap.calloc(usize::MAX, 2).is_null());
/// assert_eq!(heap.errno().out_of_memory_count(), 1);
/// unsafe { heap.free(ptr) };
/// ```
#[derive(Debug)]
pub struct CHeap<P, E> {
    heap: Heap<P>,
    errno: E,
}

impl<P, E> CHeap<P, E> {
    #[must_use]
    pub const fn new(heap: Heap<P>, errno: E) -> Self {
        Self { heap, errno }
    }

    /// Returns the underlying heap.
    pub fn heap(&self) -> &Heap<P> {
        &self.heap
    }

    pub fn errno(&self) -> &E {
        &self.errno
    }

    /// Releases `ptr`. A null pointer is ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live allocation of this heap.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if let Some(ptr) = NonNull::new(ptr) {
            unsafe { self.heap.deallocate(ptr) }
        }
    }

    /// Returns the usable size of `ptr`, or zero for a null pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live allocation of this heap.
    pub unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
        NonNull::new(ptr).map_or(0, |ptr| unsafe { self.heap.usable_size(ptr) })
    }
}

impl<P, E> CHeap<P, E>
where
    P: AreaProvider,
    E: Errno,
{
    fn null_on_error<T>(&mut self, result: Result<NonNull<u8>, T>) -> *mut u8 {
        match result {
            Ok(ptr) => ptr.as_ptr(),
            Err(_) => {
                self.errno.set_out_of_memory();
                ptr::null_mut()
            }
        }
    }

    /// Allocates `size` bytes aligned to [`BASE_ALIGN`].
    pub fn malloc(&mut self, size: usize) -> *mut u8 {
        let result = self.heap.allocate(size, BASE_ALIGN);
        self.null_on_error(result)
    }

    /// Allocates `size` bytes aligned to `align`.
    ///
    /// Alignments that are not powers of two are honored as well.
    pub fn aligned_alloc(&mut self, align: usize, size: usize) -> *mut u8 {
        let result = self.heap.allocate(size, align);
        self.null_on_error(result)
    }

    /// Allocates a zeroed array of `count` elements of `size` bytes.
    ///
    /// Returns null without allocating if `count * size` overflows.
    pub fn calloc(&mut self, count: usize, size: usize) -> *mut u8 {
        let result = self.heap.allocate_zeroed(count, size);
        self.null_on_error(result)
    }

    /// Resizes `ptr` to `size` bytes. A null `ptr` behaves like
    /// [`malloc`](Self::malloc).
    ///
    /// On failure, null is returned and `ptr` stays valid and unchanged.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live allocation of this heap.
    pub unsafe fn realloc(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        let Some(ptr) = NonNull::new(ptr) else {
            return self.malloc(size);
        };
        let result = unsafe { self.heap.reallocate(ptr, size) };
        self.null_on_error(result)
    }

    /// Allocates with `posix_memalign` rules.
    ///
    /// Unlike the other entry points, this reports failures through its
    /// result only and leaves `errno` alone.
    pub fn posix_memalign(
        &mut self,
        align: usize,
        size: usize,
    ) -> Result<NonNull<u8>, MemalignError> {
        self.heap.allocate_memalign(align, size)
    }
}
