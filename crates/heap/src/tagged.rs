//! Owner pointer with an embedded free flag.
//!
//! Areas are always aligned to [`BASE_ALIGN`], so the lowest bit of a pointer
//! to an [`Area`] is always zero. [`TaggedArea`] stores the free/allocated
//! state of a block in that bit. All bit manipulation is confined to this
//! module.

use crate::{align::BASE_ALIGN, area::Area};

const FREE_BIT: usize = 0b1;
const _: () = assert!(BASE_ALIGN > FREE_BIT);

/// A pointer to the owning area of a block, packed with the block's free flag.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct TaggedArea(*mut Area);

impl TaggedArea {
    /// Packs `owner` and `free` into one word.
    ///
    /// # Panics
    ///
    /// Panics if `owner` is not aligned to [`BASE_ALIGN`].
    pub(crate) fn new(owner: *mut Area, free: bool) -> Self {
        assert!(
            owner.addr().is_multiple_of(BASE_ALIGN),
            "area pointer must be aligned to the base alignment"
        );
        Self(owner.map_addr(|addr| addr | usize::from(free)))
    }

    /// Returns the owning area with the flag bit cleared.
    pub(crate) fn owner(self) -> *mut Area {
        self.0.map_addr(|addr| addr & !FREE_BIT)
    }

    /// Returns `true` if the block is free.
    pub(crate) fn is_free(self) -> bool {
        self.0.addr() & FREE_BIT != 0
    }

    /// Updates the free flag, keeping the owner.
    pub(crate) fn set_free(&mut self, free: bool) {
        *self = Self::new(self.owner(), free);
    }
}

impl core::fmt::Debug for TaggedArea {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaggedArea")
            .field("owner", &self.owner())
            .field("free", &self.is_free())
            .finish()
    }
}
