//! A spin-locked heap usable as the global allocator.

use core::{
    alloc::{GlobalAlloc, Layout},
    cmp,
    ptr::{self, NonNull},
};

use spin::{Mutex, MutexGuard};

use crate::{Heap, align::BASE_ALIGN, provider::AreaProvider};

/// A [`Heap`] behind a spin lock.
///
/// Every entry point takes the lock for the whole operation, including the
/// allocate-copy-free fallback of `realloc`.
///
/// # Examples
///
/// ```rust,ignore
/// use heap::{LockedHeap, provider::RegionProvider};
///
/// #[global_allocator]
/// static ALLOCATOR: LockedHeap<RegionProvider> = LockedHeap::new(RegionProvider::empty(4096));
/// ```
pub struct LockedHeap<P> {
    heap: Mutex<Heap<P>>,
}

impl<P> LockedHeap<P> {
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self {
            heap: Mutex::new(Heap::new(provider)),
        }
    }

    /// Locks the heap for direct use.
    pub fn lock(&self) -> MutexGuard<'_, Heap<P>> {
        self.heap.lock()
    }
}

unsafe impl<P> GlobalAlloc for LockedHeap<P>
where
    P: AreaProvider + Send,
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.heap
            .lock()
            .allocate(layout.size(), layout.align())
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            unsafe { self.heap.lock().deallocate(ptr) }
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let mut heap = self.heap.lock();
        if layout.align() <= BASE_ALIGN {
            return heap
                .allocate_zeroed(1, layout.size())
                .map_or(ptr::null_mut(), NonNull::as_ptr);
        }

        let Ok(ptr) = heap.allocate(layout.size(), layout.align()) else {
            return ptr::null_mut();
        };
        unsafe { ptr.as_ptr().write_bytes(0, layout.size()) };
        ptr.as_ptr()
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let Some(ptr) = NonNull::new(ptr) else {
            return ptr::null_mut();
        };
        let mut heap = self.heap.lock();

        if layout.align() <= BASE_ALIGN {
            let new_ptr = unsafe { heap.reallocate(ptr, new_size) };
            return new_ptr.map_or(ptr::null_mut(), NonNull::as_ptr);
        }

        // Over-aligned blocks must stay over-aligned, which the in-place
        // engine does not guarantee when it moves.
        let Ok(new_ptr) = heap.allocate(new_size, layout.align()) else {
            return ptr::null_mut();
        };
        let size = cmp::min(layout.size(), new_size);
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), size);
            heap.deallocate(ptr);
        }
        new_ptr.as_ptr()
    }
}
