//! Error types of the heap.

use core::fmt;

use snafu::{GenerateImplicitData, Snafu};

/// Source location at which an error was created.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location(&'static core::panic::Location<'static>);

impl Location {
    /// Returns the location of the caller.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        Self(core::panic::Location::caller())
    }
}

impl GenerateImplicitData for Location {
    #[track_caller]
    fn generate() -> Self {
        Self::caller()
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Errors returned by the allocation and reallocation engines.
///
/// Neither variant leaves any trace in the heap: every check happens before
/// the first write to block or area metadata.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AllocError {
    /// A size or alignment computation overflowed.
    #[snafu(display("allocation size overflowed, size: {size}, align: {align}"))]
    Overflow {
        size: usize,
        align: usize,
        #[snafu(implicit)]
        location: Location,
    },
    /// The area provider could not supply a new area.
    #[snafu(display("area provider is out of memory, requested area size: {size}"))]
    OutOfMemory {
        size: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

impl AllocError {
    /// Returns `true` if the provider ran out of memory.
    ///
    /// Overflow errors are reported to C callers the same way, as `ENOMEM`.
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

/// Errors returned by `posix_memalign` style allocation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MemalignError {
    /// The alignment is not a power of two multiple of the pointer size.
    #[snafu(display("invalid alignment for posix_memalign: {align}"))]
    InvalidAlignment {
        align: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to allocate aligned memory"))]
    Alloc {
        #[snafu(source)]
        source: AllocError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Structural damage detected by [`Heap::verify`](crate::Heap::verify).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CorruptionError {
    #[snafu(display("block {block:#x} has size {size} which is not a valid block size"))]
    BadBlockSize {
        block: usize,
        size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("block {block:#x} overruns its area, area end: {area_end:#x}"))]
    Overrun {
        block: usize,
        area_end: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("block {block:#x} header size {header} differs from footer size {footer}"))]
    FooterMismatch {
        block: usize,
        header: usize,
        footer: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("block {block:#x} claims to belong to area {owner:#x} instead of {area:#x}"))]
    ForeignOwner {
        block: usize,
        owner: usize,
        area: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("free blocks {block:#x} and {next:#x} are adjacent"))]
    AdjacentFree {
        block: usize,
        next: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("touched block {block:#x} is not a block boundary of any area"))]
    DanglingCursor {
        block: usize,
        #[snafu(implicit)]
        location: Location,
    },
}
