//! Instruction reference table: symbolic labels for branch targets that
//! have not been emitted yet.
//!
//! A label is opened before the code it should point at is compiled and is
//! bound to the next instruction emitted into the same buffer. Final
//! addresses are only known at finalize time, when buffers are laid out.

use rustc_hash::FxHashMap;
use std::fmt;

/// A symbolic branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Stable identity of an emitted instruction.
///
/// Positions inside a buffer never shift: the compiler only appends or
/// rewrites in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionId {
    pub buffer: usize,
    pub position: usize,
}

/// Label bookkeeping for one compilation.
#[derive(Debug, Default)]
pub struct InstructionReferenceTable {
    next: u32,
    bound: FxHashMap<Label, InstructionId>,
    /// Open labels waiting for the next instruction, per buffer
    pending: FxHashMap<usize, Vec<Label>>,
}

impl InstructionReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a label without opening it.
    pub fn reserve(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }

    /// Mints a label bound to the next instruction emitted into `buffer`.
    pub fn open(&mut self, buffer: usize) -> Label {
        let label = self.reserve();
        self.open_reserved(label, buffer);
        label
    }

    /// Opens a previously reserved label.
    pub fn open_reserved(&mut self, label: Label, buffer: usize) {
        self.pending.entry(buffer).or_default().push(label);
    }

    /// Binds every label pending on `at.buffer` to `at`.
    pub fn close(&mut self, at: InstructionId) {
        if let Some(labels) = self.pending.remove(&at.buffer) {
            for label in labels {
                self.bound.insert(label, at);
            }
        }
    }

    /// Returns true if a label is waiting on `buffer`.
    pub fn has_pending(&self, buffer: usize) -> bool {
        self.pending.get(&buffer).is_some_and(|labels| !labels.is_empty())
    }

    pub fn get(&self, label: Label) -> Option<InstructionId> {
        self.bound.get(&label).copied()
    }

    /// Number of bound labels.
    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(buffer: usize, position: usize) -> InstructionId {
        InstructionId { buffer, position }
    }

    #[test]
    fn test_open_binds_to_next_instruction() {
        let mut table = InstructionReferenceTable::new();
        let label = table.open(0);
        assert!(table.has_pending(0));
        assert_eq!(table.get(label), None);

        table.close(at(0, 4));
        assert_eq!(table.get(label), Some(at(0, 4)));
        assert!(!table.has_pending(0));
    }

    #[test]
    fn test_several_open_labels_share_a_target() {
        let mut table = InstructionReferenceTable::new();
        let inner = table.open(0);
        let outer = table.open(0);
        table.close(at(0, 9));
        assert_eq!(table.get(inner), table.get(outer));
    }

    #[test]
    fn test_pending_is_per_buffer() {
        let mut table = InstructionReferenceTable::new();
        let main = table.open(0);
        let entry = table.reserve();
        table.open_reserved(entry, 1);

        table.close(at(1, 0));
        assert_eq!(table.get(entry), Some(at(1, 0)));
        assert_eq!(table.get(main), None);

        table.close(at(0, 2));
        assert_eq!(table.get(main), Some(at(0, 2)));
    }

    #[test]
    fn test_labels_are_unique() {
        let mut table = InstructionReferenceTable::new();
        assert_ne!(table.reserve(), table.reserve());
        assert_eq!(Label(3).to_string(), "L3");
    }
}
