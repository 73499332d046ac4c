//! Areas backed by anonymous memory mappings.

use core::ptr::{self, NonNull};

use heap::{align::BASE_ALIGN, provider::AreaProvider};
use spin::Lazy;

const FALLBACK_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: Lazy<usize> = Lazy::new(|| {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(size)
        .ok()
        .filter(|size| *size > 0 && size.is_multiple_of(BASE_ALIGN))
        .unwrap_or(FALLBACK_PAGE_SIZE)
});

/// An [`AreaProvider`] mapping every area with `mmap`.
///
/// The granularity is the system page size. Mappings are never unmapped.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmapProvider {}

impl MmapProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

unsafe impl AreaProvider for MmapProvider {
    fn granularity(&self) -> usize {
        *PAGE_SIZE
    }

    fn create_area(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return None;
        }
        NonNull::new(addr.cast())
    }
}
