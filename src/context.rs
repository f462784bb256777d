//! Per-pipeline execution context.

use alloc::rc::Rc;
use core::fmt;

use crate::allocator::{Allocator, SystemAllocator};
use crate::names::NameGenerator;

/// Configuration for one pipeline-execution context.
///
/// Owns the two services buffer and image construction depend on: the
/// unique-name generator and the storage allocation strategy. Cloning a
/// context is cheap and shares both, so handles created through any
/// clone draw from one name space and one allocator.
///
/// Install a custom allocator before the first buffer is constructed;
/// each buffer is permanently tied to the strategy that was active when
/// it was built.
///
/// # Example
///
/// ```
/// use zenbuf::{Buffer, Context, ScalarType};
///
/// let ctx = Context::new();
/// let frame = Buffer::new(&ctx, ScalarType::U8, &[640, 480]).unwrap();
/// assert_eq!(frame.stride(1), 640);
/// ```
#[derive(Clone)]
pub struct Context {
    names: NameGenerator,
    allocator: Rc<dyn Allocator>,
}

impl Context {
    /// Context with a fresh name generator and the default allocation
    /// strategy.
    pub fn new() -> Self {
        Self {
            names: NameGenerator::new(),
            allocator: Rc::new(SystemAllocator),
        }
    }

    /// Replace the allocation strategy.
    ///
    /// Every buffer constructed through this context afterwards
    /// allocates its storage through `allocator` and releases it through
    /// the same `allocator` when the last handle drops.
    pub fn with_allocator(mut self, allocator: Rc<dyn Allocator>) -> Self {
        self.allocator = allocator;
        self
    }

    pub(crate) fn names(&self) -> &NameGenerator {
        &self.names
    }

    pub(crate) fn allocator(&self) -> &Rc<dyn Allocator> {
        &self.allocator
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}
