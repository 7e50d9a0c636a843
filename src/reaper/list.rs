/*!
 * PID Slot Arena
 * Intrusive singly-linked lists over reusable indexed slots
 */

use crate::core::types::Pid;

const NIL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Slot {
    pid: Pid,
    next: u32,
}

/// Head of an intrusive list of slot indices.
///
/// The head is a plain value: the signal handler detaches a whole chain
/// into a local `ListHead`, processes it, and reattaches what is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListHead {
    head: u32,
}

impl ListHead {
    #[must_use]
    pub const fn empty() -> Self {
        Self { head: NIL }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head == NIL
    }

    /// Detach the whole chain, leaving this head empty.
    #[must_use]
    pub fn take(&mut self) -> ListHead {
        std::mem::replace(self, ListHead::empty())
    }

    fn append(&mut self, slots: &mut [Slot], idx: u32) {
        slots[idx as usize].next = NIL;

        if self.head == NIL {
            self.head = idx;
            return;
        }

        // Always walk to the tail rather than keeping a tail pointer. These
        // lists are short and touched infrequently.
        let mut tail = self.head;
        while slots[tail as usize].next != NIL {
            tail = slots[tail as usize].next;
        }
        slots[tail as usize].next = idx;
    }

    fn remove(&mut self, slots: &mut [Slot], idx: u32) {
        if self.head == idx {
            self.head = slots[idx as usize].next;
            slots[idx as usize].next = NIL;
            return;
        }

        let mut prev = self.head;
        while prev != NIL {
            let cur = slots[prev as usize].next;
            if cur == idx {
                slots[prev as usize].next = slots[idx as usize].next;
                slots[idx as usize].next = NIL;
                return;
            }
            prev = cur;
        }
    }

    fn pop_front(&mut self, slots: &mut [Slot]) -> Option<u32> {
        if self.head == NIL {
            return None;
        }
        let idx = self.head;
        self.head = slots[idx as usize].next;
        slots[idx as usize].next = NIL;
        Some(idx)
    }

    fn append_list(&mut self, slots: &mut [Slot], other: ListHead) {
        if other.head == NIL {
            return;
        }
        if self.head == NIL {
            self.head = other.head;
            return;
        }
        let mut tail = self.head;
        while slots[tail as usize].next != NIL {
            tail = slots[tail as usize].next;
        }
        slots[tail as usize].next = other.head;
    }

    fn len(&self, slots: &[Slot]) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while cur != NIL {
            n += 1;
            cur = slots[cur as usize].next;
        }
        n
    }

    fn pids(&self, slots: &[Slot]) -> Vec<Pid> {
        let mut out = Vec::new();
        let mut cur = self.head;
        while cur != NIL {
            out.push(slots[cur as usize].pid);
            cur = slots[cur as usize].next;
        }
        out
    }
}

/// Arena backing the reaper's `tracked` and `free` lists.
///
/// Slots are reused through the free list and never deallocated, so the
/// signal handler can relink them without allocating; `alloc` is the only
/// operation that may grow the arena and is never called from the handler.
/// A live slot belongs to exactly one list at any time.
#[derive(Debug)]
pub struct PidSlab {
    slots: Vec<Slot>,
    tracked: ListHead,
    free: ListHead,
}

impl PidSlab {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            tracked: ListHead::empty(),
            free: ListHead::empty(),
        }
    }

    /// Track `pid`, reusing a free slot when one is available.
    pub fn track(&mut self, pid: Pid) {
        let idx = match self.free.pop_front(&mut self.slots) {
            Some(idx) => {
                self.slots[idx as usize].pid = pid;
                idx
            }
            None => {
                let idx = self.slots.len() as u32;
                self.slots.push(Slot { pid, next: NIL });
                idx
            }
        };
        self.tracked.append(&mut self.slots, idx);
    }

    /// Detach the entire tracked chain for out-of-lock processing.
    #[must_use]
    pub fn detach_tracked(&mut self) -> ListHead {
        self.tracked.take()
    }

    /// PID and successor index of a detached slot.
    #[must_use]
    pub fn peek(&self, idx: u32) -> (Pid, Option<u32>) {
        let slot = &self.slots[idx as usize];
        (slot.pid, (slot.next != NIL).then_some(slot.next))
    }

    /// First index of a detached chain.
    #[must_use]
    pub fn chain_head(&self, list: ListHead) -> Option<u32> {
        (list.head != NIL).then_some(list.head)
    }

    /// Append a single slot onto a (possibly local) list.
    pub fn append_to(&mut self, list: &mut ListHead, idx: u32) {
        list.append(&mut self.slots, idx);
    }

    /// Put not-yet-exited slots back on `tracked` (appending, since new
    /// registrations may have arrived meanwhile) and recycle waited slots.
    pub fn reattach(&mut self, remaining: ListHead, waited: ListHead) {
        let Self { slots, tracked, free } = self;
        tracked.append_list(slots, remaining);
        free.append_list(slots, waited);
    }

    #[must_use]
    pub fn tracked_len(&self) -> usize {
        self.tracked.len(&self.slots)
    }

    #[must_use]
    pub fn free_len(&self) -> usize {
        self.free.len(&self.slots)
    }

    #[must_use]
    pub fn tracked_pids(&self) -> Vec<Pid> {
        self.tracked.pids(&self.slots)
    }
}

impl Default for PidSlab {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_append_and_order() {
        let mut slab = PidSlab::new();
        slab.track(500);
        slab.track(501);
        slab.track(502);

        assert_eq!(slab.tracked_pids(), [500, 501, 502]);
        assert_eq!(slab.tracked_len(), 3);
        assert_eq!(slab.free_len(), 0);
    }

    #[test]
    fn test_pop_front_then_append_moves_to_tail() {
        let mut slab = PidSlab::new();
        slab.track(500);
        slab.track(501);
        slab.track(502);

        let idx = slab.tracked.pop_front(&mut slab.slots).unwrap();
        assert_eq!(slab.peek(idx).0, 500);
        assert_eq!(slab.tracked_pids(), [501, 502]);

        let mut tracked = slab.tracked;
        slab.append_to(&mut tracked, idx);
        slab.tracked = tracked;
        assert_eq!(slab.tracked_pids(), [501, 502, 500]);
    }

    #[test]
    fn test_remove_non_head_preserves_order() {
        let mut slab = PidSlab::new();
        for pid in [10, 11, 12, 13] {
            slab.track(pid);
        }

        // index 2 holds pid 12
        let mut tracked = slab.tracked;
        tracked.remove(&mut slab.slots, 2);
        slab.tracked = tracked;
        assert_eq!(slab.tracked_pids(), [10, 11, 13]);

        let mut tracked = slab.tracked;
        tracked.remove(&mut slab.slots, 0);
        slab.tracked = tracked;
        assert_eq!(slab.tracked_pids(), [11, 13]);
    }

    #[test]
    fn test_detach_and_reattach() {
        let mut slab = PidSlab::new();
        slab.track(1);
        slab.track(2);
        slab.track(3);

        let detached = slab.detach_tracked();
        assert_eq!(slab.tracked_len(), 0);

        // registration arriving while the chain is detached
        slab.track(4);

        let mut remaining = ListHead::empty();
        let mut waited = ListHead::empty();
        let mut cur = slab.chain_head(detached);
        while let Some(idx) = cur {
            let (pid, next) = slab.peek(idx);
            if pid == 2 {
                let mut w = waited;
                slab.append_to(&mut w, idx);
                waited = w;
            } else {
                let mut r = remaining;
                slab.append_to(&mut r, idx);
                remaining = r;
            }
            cur = next;
        }
        slab.reattach(remaining, waited);

        assert_eq!(slab.tracked_pids(), [4, 1, 3]);
        assert_eq!(slab.free_len(), 1);

        // the freed slot is reused before the arena grows
        slab.track(5);
        assert_eq!(slab.slots.len(), 4);
        assert_eq!(slab.tracked_pids(), [4, 1, 3, 5]);
        assert_eq!(slab.free_len(), 0);
    }

    proptest! {
        // Model check against a Vec: no duplicates, order preserved.
        #[test]
        fn prop_matches_vec_model(ops in proptest::collection::vec(0u8..3, 1..64)) {
            let mut slab = PidSlab::new();
            let mut model: Vec<Pid> = Vec::new();
            let mut next_pid: Pid = 100;

            for op in ops {
                match op {
                    0 => {
                        slab.track(next_pid);
                        model.push(next_pid);
                        next_pid += 1;
                    }
                    1 => {
                        // pop front and recycle
                        if let Some(idx) = slab.tracked.pop_front(&mut slab.slots) {
                            let mut free = slab.free;
                            slab.append_to(&mut free, idx);
                            slab.free = free;
                            model.remove(0);
                        }
                    }
                    _ => {
                        // remove a middle element by pid order
                        if model.len() > 1 {
                            // pids are unique and never reused, so pid
                            // equality identifies the slot
                            let victim = model[model.len() / 2];
                            let idx = (0..slab.slots.len() as u32)
                                .find(|&i| slab.slots[i as usize].pid == victim)
                                .unwrap();
                            let mut tracked = slab.tracked;
                            tracked.remove(&mut slab.slots, idx);
                            slab.tracked = tracked;
                            let mut free = slab.free;
                            slab.append_to(&mut free, idx);
                            slab.free = free;
                            model.retain(|&p| p != victim);
                        }
                    }
                }

                let pids = slab.tracked_pids();
                prop_assert_eq!(&pids, &model);

                let mut dedup = pids.clone();
                dedup.sort_unstable();
                dedup.dedup();
                prop_assert_eq!(dedup.len(), pids.len());

                prop_assert_eq!(
                    slab.tracked_len() + slab.free_len(),
                    slab.slots.len()
                );
            }
        }
    }
}
