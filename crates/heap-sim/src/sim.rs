//! Replays script operations against an in-process heap.

use std::{fmt, ptr::NonNull};

use heap::{CHeap, CorruptionError, Heap, HeapStats, RecordedErrno, provider::RegionProvider};
use snafu::{OptionExt as _, ResultExt as _, Snafu};

use crate::script::Op;

#[derive(Debug, Snafu)]
pub enum SimError {
    #[snafu(display("slot #{id} is not live"))]
    DeadSlot { id: usize },
    #[snafu(display("slot #{id} lost its contents at offset {offset}"))]
    Clobbered { id: usize, offset: usize },
    #[snafu(display("heap is corrupted after `{op}`"))]
    Corrupted {
        op: Op,
        #[snafu(source)]
        source: CorruptionError,
    },
}

/// What a single operation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The slot now holds an allocation at the given address.
    Allocated { id: usize, addr: usize },
    /// The allocation failed and `errno` was set.
    Failed,
    /// The slot was released.
    Freed { id: usize },
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    ptr: NonNull<u8>,
    size: usize,
    fill: u8,
}

impl Slot {
    fn check(&self, id: usize) -> Result<(), SimError> {
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) };
        match bytes.iter().position(|&b| b != self.fill) {
            Some(offset) => ClobberedSnafu { id, offset }.fail(),
            None => Ok(()),
        }
    }
}

/// A heap carved out of a fixed, owned pool.
///
/// Every allocation is filled with a per-slot byte pattern, which is checked
/// whenever the slot is reallocated or freed.
pub struct Simulator {
    heap: CHeap<RegionProvider, RecordedErrno>,
    slots: Vec<Option<Slot>>,
    _pool: Vec<u128>,
}

impl Simulator {
    /// Creates a simulator with `pool_size` bytes of backing memory, handed out
    /// in areas of multiples of `granularity` bytes.
    #[must_use]
    pub fn new(pool_size: usize, granularity: usize) -> Self {
        let mut pool = vec![0_u128; pool_size.div_ceil(16)];
        let len = pool.len() * 16;
        let provider = unsafe { RegionProvider::new(pool.as_mut_ptr().cast(), len, granularity) };
        Self {
            heap: CHeap::new(Heap::new(provider), RecordedErrno::new()),
            slots: vec![],
            _pool: pool,
        }
    }

    pub fn heap(&self) -> &Heap<RegionProvider> {
        self.heap.heap()
    }

    pub fn stats(&self) -> HeapStats {
        self.heap().stats()
    }

    /// Returns the number of failed allocations so far.
    pub fn failures(&self) -> usize {
        self.heap.errno().out_of_memory_count()
    }

    fn take_slot(&mut self, id: usize) -> Result<Slot, SimError> {
        let slot = self
            .slots
            .get_mut(id)
            .and_then(Option::take)
            .context(DeadSlotSnafu { id })?;
        slot.check(id)?;
        Ok(slot)
    }

    fn fill_slot(&mut self, id: Option<usize>, ptr: *mut u8, size: usize, kept: usize) -> Outcome {
        let Some(ptr) = NonNull::new(ptr) else {
            return Outcome::Failed;
        };
        let id = id.unwrap_or(self.slots.len());
        #[expect(clippy::cast_possible_truncation)]
        let fill = (id % 251) as u8 + 1;
        unsafe { ptr.as_ptr().add(kept).write_bytes(fill, size - kept) };
        if id == self.slots.len() {
            self.slots.push(None);
        }
        self.slots[id] = Some(Slot { ptr, size, fill });
        Outcome::Allocated {
            id,
            addr: ptr.as_ptr().addr(),
        }
    }

    /// Applies `op` and verifies the heap afterwards.
    pub fn apply(&mut self, op: Op) -> Result<Outcome, SimError> {
        let outcome = match op {
            Op::Malloc { size } => {
                let ptr = self.heap.malloc(size);
                self.fill_slot(None, ptr, size, 0)
            }
            Op::AlignedAlloc { align, size } => {
                let ptr = self.heap.aligned_alloc(align, size);
                self.fill_slot(None, ptr, size, 0)
            }
            Op::Calloc { count, size } => {
                let ptr = self.heap.calloc(count, size);
                let total = count.saturating_mul(size);
                if !ptr.is_null() {
                    let bytes = unsafe { std::slice::from_raw_parts(ptr, total) };
                    if let Some(offset) = bytes.iter().position(|&b| b != 0) {
                        let id = self.slots.len();
                        return ClobberedSnafu { id, offset }.fail();
                    }
                }
                self.fill_slot(None, ptr, total, 0)
            }
            Op::Realloc { id, size } => {
                let slot = self.take_slot(id)?;
                let ptr = unsafe { self.heap.realloc(slot.ptr.as_ptr(), size) };
                let Some(ptr) = NonNull::new(ptr) else {
                    self.slots[id] = Some(slot);
                    return self.verified(op, Outcome::Failed);
                };
                let kept = slot.size.min(size);
                let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), kept) };
                if let Some(offset) = bytes.iter().position(|&b| b != slot.fill) {
                    return ClobberedSnafu { id, offset }.fail();
                }
                self.fill_slot(Some(id), ptr.as_ptr(), size, kept)
            }
            Op::Free { id } => {
                let slot = self.take_slot(id)?;
                unsafe { self.heap.free(slot.ptr.as_ptr()) };
                Outcome::Freed { id }
            }
        };

        self.verified(op, outcome)
    }

    fn verified(&self, op: Op, outcome: Outcome) -> Result<Outcome, SimError> {
        self.heap().verify().context(CorruptedSnafu { op })?;
        Ok(outcome)
    }

    #[must_use]
    pub fn block_map(&self) -> BlockMap<'_> {
        BlockMap { heap: self.heap() }
    }
}

/// Displays every area as one line of `[A size]` and `[F size]` blocks.
pub struct BlockMap<'a> {
    heap: &'a Heap<RegionProvider>,
}

impl fmt::Display for BlockMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for area in self.heap.areas() {
            write!(f, "  area {:#x}..{:#x}:", area.start(), area.end())?;
            for block in area.blocks() {
                let tag = if block.is_free() { 'F' } else { 'A' };
                write!(f, " [{tag} {}]", block.size())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    fn run(sim: &mut Simulator, script: &str) -> Vec<Outcome> {
        script
            .split_whitespace()
            .map(|op| sim.apply(op.parse().unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_replay() {
        let mut sim = Simulator::new(64 * 1024, 4096);
        let outcomes = run(
            &mut sim,
            "m:100 m:100 m:100 f:1 m:80 a:96:24 c:8:8 r:0:3000 f:2",
        );

        let Outcome::Allocated { addr: freed, .. } = outcomes[1] else {
            panic!("unexpected outcome: {:?}", outcomes[1]);
        };
        assert_eq!(outcomes[3], Outcome::Freed { id: 1 });
        assert!(matches!(outcomes[4], Outcome::Allocated { id: 3, addr } if addr == freed));
        assert!(matches!(outcomes[5], Outcome::Allocated { id: 4, addr } if addr % 96 == 0));
        assert!(matches!(outcomes[6], Outcome::Allocated { id: 5, .. }));
        assert!(matches!(outcomes[7], Outcome::Allocated { id: 0, .. }));
        assert_eq!(outcomes[8], Outcome::Freed { id: 2 });

        let stats = sim.stats();
        assert_eq!(stats.allocated_blocks, 4);
        assert_eq!(sim.failures(), 0);
        let map = sim.block_map().to_string();
        assert_eq!(map.lines().count(), stats.areas);
        assert!(map.lines().all(|line| line.starts_with("  area 0x")));
    }

    #[test]
    fn test_failures_are_counted() {
        let mut sim = Simulator::new(8 * 1024, 4096);
        let outcomes = run(
            &mut sim,
            "m:100 m:100000 c:18446744073709551615:2 r:0:100000",
        );
        assert!(matches!(outcomes[0], Outcome::Allocated { id: 0, .. }));
        assert_eq!(&outcomes[1..], &[Outcome::Failed; 3]);
        assert_eq!(sim.failures(), 3);
        assert!(sim.apply(Op::Free { id: 0 }).is_ok());
    }

    #[test]
    fn test_dead_slot() {
        let mut sim = Simulator::new(8 * 1024, 4096);
        run(&mut sim, "m:10 f:0");
        assert!(matches!(
            sim.apply(Op::Free { id: 0 }),
            Err(SimError::DeadSlot { id: 0 })
        ));
        assert!(matches!(
            sim.apply(Op::Realloc { id: 7, size: 1 }),
            Err(SimError::DeadSlot { id: 7 })
        ));
    }
}
