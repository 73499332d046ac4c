//! The C dynamic memory functions backed by a process-wide [`heap`].
//!
//! This crate hosts a single [`CHeap`] that grows through anonymous memory
//! mappings ([`MmapProvider`]) and reports failures through the C library's
//! `errno` ([`LibcErrno`]). Every entry point takes a global spin lock for the
//! whole call.
//!
//! # Entry Points
//!
//! | function | failure |
//! |----------|---------|
//! | [`malloc`] | null, `ENOMEM` |
//! | [`calloc`] | null, `ENOMEM` (also on `count * size` overflow) |
//! | [`realloc`] | null, `ENOMEM`, original block untouched |
//! | [`aligned_alloc`] | null, `ENOMEM` |
//! | [`posix_memalign`] | returns `EINVAL` or `ENOMEM`, `errno` untouched |
//! | [`free`] | none, null is ignored |
//! | [`malloc_usable_size`] | zero for null |
//!
//! # Features
//!
//! - `export-symbols`: exports the entry points under their C names so the
//!   crate can replace the system allocator when linked as a static or
//!   dynamic library. Test builds never export them.
//!
//! The `heap` dependency is used without its `log` feature. A logger that
//! allocates would otherwise re-enter the global lock.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use core::ffi::{c_int, c_void};

use heap::{CHeap, Heap, MemalignError};
use spin::Mutex;

pub use self::{errno::LibcErrno, mmap::MmapProvider};

pub mod errno;
mod mmap;

static HEAP: Mutex<CHeap<MmapProvider, LibcErrno>> =
    Mutex::new(CHeap::new(Heap::new(MmapProvider::new()), LibcErrno {}));

/// Allocates `size` bytes aligned for any scalar type.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn malloc(size: usize) -> *mut c_void {
    HEAP.lock().malloc(size).cast()
}

/// Allocates a zeroed array of `count` elements of `size` bytes.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn calloc(count: usize, size: usize) -> *mut c_void {
    HEAP.lock().calloc(count, size).cast()
}

/// Allocates `size` bytes aligned to `align`.
///
/// Alignments that are not powers of two are accepted.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub extern "C" fn aligned_alloc(align: usize, size: usize) -> *mut c_void {
    HEAP.lock().aligned_alloc(align, size).cast()
}

/// Resizes the allocation at `ptr` to `size` bytes.
///
/// # Safety
///
/// `ptr` must be null or a live pointer returned by this crate.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    unsafe { HEAP.lock().realloc(ptr.cast(), size).cast() }
}

/// Releases the allocation at `ptr`.
///
/// # Safety
///
/// `ptr` must be null or a live pointer returned by this crate.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    unsafe { HEAP.lock().free(ptr.cast()) }
}

/// Allocates `size` bytes aligned to `align` and stores the pointer in
/// `*memptr`.
///
/// `align` must be a power of two multiple of the pointer size.
///
/// # Safety
///
/// `memptr` must be valid for writes.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn posix_memalign(
    memptr: *mut *mut c_void,
    align: usize,
    size: usize,
) -> c_int {
    match HEAP.lock().posix_memalign(align, size) {
        Ok(ptr) => {
            unsafe { memptr.write(ptr.as_ptr().cast()) };
            0
        }
        Err(MemalignError::InvalidAlignment { .. }) => libc::EINVAL,
        Err(MemalignError::Alloc { .. }) => libc::ENOMEM,
    }
}

/// Returns the number of bytes usable through `ptr`.
///
/// # Safety
///
/// `ptr` must be null or a live pointer returned by this crate.
#[cfg_attr(all(feature = "export-symbols", not(test)), unsafe(no_mangle))]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> usize {
    if ptr.is_null() {
        return 0;
    }
    unsafe { HEAP.lock().usable_size(ptr.cast()) }
}

/// Returns a snapshot of the global heap's statistics.
#[must_use]
pub fn stats() -> heap::HeapStats {
    HEAP.lock().heap().stats()
}

/// Checks the global heap for structural damage.
pub fn verify() -> Result<(), heap::CorruptionError> {
    HEAP.lock().heap().verify()
}
