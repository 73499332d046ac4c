//! A boundary-tag memory allocator for freestanding environments.
//!
//! This crate implements the C dynamic memory contract (`malloc`, `free`,
//! `calloc`, `realloc` and `aligned_alloc`) on top of memory regions supplied
//! by an [`AreaProvider`](provider::AreaProvider). It is `no_std`, does not
//! allocate on its own, and keeps all of its state inside a [`Heap`] value.
//!
//! # Memory Layout
//!
//! A heap is a chain of *areas*. Each area is tiled with *blocks* that carry
//! a header and a footer, so both neighbors of a block can be reached in
//! constant time:
//!
//! ```text
//! area:  | Area header | block | block | ... | block |
//! block: | size | owner + free bit | payload ... | size |
//! ```
//!
//! Every block payload is aligned to [`BASE_ALIGN`](align::BASE_ALIGN). Larger
//! alignments, including ones that are not powers of two, are honored by
//! splitting off or absorbing padding in front of the chosen block.
//!
//! # Allocation Strategy
//!
//! - **Next fit** from the most recently allocated or freed block.
//! - **First fit** over all areas when next fit fails.
//! - **Growth** through the provider when no free block fits.
//!
//! Freed blocks are merged with free neighbors immediately, so two free
//! blocks are never adjacent. Areas are never returned to the provider.
//!
//! # Usage Examples
//!
//! ## Using [`Heap`] Directly
//!
//! ```rust
//! use heap::{Heap, provider::RegionProvider};
//!
//! let mut pool = vec![0u128; 4096];
//! let provider = unsafe { RegionProvider::new(pool.as_mut_ptr().cast(), 64 * 1024, 4096) };
//! let mut heap = Heap::new(provider);
//!
//! let ptr = heap.allocate(100, 0).unwrap();
//! let ptr = unsafe { heap.reallocate(ptr, 1000) }.unwrap();
//! assert!(unsafe { heap.usable_size(ptr) } >= 1000);
//! unsafe { heap.deallocate(ptr) };
//!
//! heap.verify().unwrap();
//! ```
//!
//! ## C Semantics
//!
//! [`CHeap`] wraps a heap with null-pointer and `errno` reporting:
//!
//! ```rust
//! use heap::{CHeap, Heap, RecordedErrno, provider::RegionProvider};
//!
//! let mut pool = vec![0u128; 1024];
//! let provider = unsafe { RegionProvider::new(pool.as_mut_ptr().cast(), 16 * 1024, 4096) };
//! let mut heap = CHeap::new(Heap::new(provider), RecordedErrno::new());
//!
//! let ptr = heap.aligned_alloc(48, 10);
//! assert_eq!(ptr.addr() % 48, 0);
//! unsafe { heap.free(ptr) };
//! ```
//!
//! ## Integration with Global Allocator
//!
//! [`LockedHeap`] serializes every call through a spin lock and implements
//! `GlobalAlloc`:
//!
//! ```rust,ignore
//! use heap::{LockedHeap, provider::RegionProvider};
//!
//! #[global_allocator]
//! static ALLOCATOR: LockedHeap<RegionProvider> = LockedHeap::new(RegionProvider::empty(4096));
//! ```
//!
//! # Thread Safety
//!
//! [`Heap`] and [`CHeap`] are `Send` but not `Sync`. Concurrent use requires
//! an external lock such as the one in [`LockedHeap`].
//!
//! # Features
//!
//! - `log` (default): emits diagnostics through the `log` facade. Disable it
//!   when the installed logger allocates from this heap.

#![no_std]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[macro_use]
mod log;

pub mod align;
mod area;
mod block;
pub mod c_api;
mod error;
mod heap;
mod inspect;
mod locked;
pub mod provider;
mod tagged;

pub use self::{
    c_api::{CHeap, Errno, RecordedErrno},
    error::{AllocError, CorruptionError, Location, MemalignError},
    heap::Heap,
    inspect::{AreaInfo, Areas, BlockInfo, Blocks, HeapStats},
    locked::LockedHeap,
};
