//! Unique-name generation for buffer and image identities.
//!
//! Every buffer and bound image carries a name used for debugging and
//! for symbol generation in the compiled pipeline. Names come from a
//! [`NameGenerator`] owned by the execution context, never from global
//! state, so independent compilation sessions stay independent.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::Cell;

/// Counter-backed name service.
///
/// Hands out names of the form `"{tag}{n}"` from a shared monotonic
/// counter. Clones share the counter, so any name drawn through any
/// clone of one generator is distinct from every other. Names are never
/// reused or recomputed for the generator's lifetime; create a fresh
/// generator only between independent pipeline-compilation sessions,
/// never mid-session.
#[derive(Clone, Debug)]
pub struct NameGenerator {
    next: Rc<Cell<u64>>,
}

impl NameGenerator {
    /// Generator starting at zero.
    pub fn new() -> Self {
        Self {
            next: Rc::new(Cell::new(0)),
        }
    }

    /// Draw a fresh name under the given one-character namespace tag.
    pub fn fresh(&self, tag: char) -> String {
        let n = self.next.get();
        self.next.set(n + 1);
        format!("{tag}{n}")
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new()
    }
}
