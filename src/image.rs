//! Rebindable bound images.
//!
//! [`BoundImage`] is the placeholder a pipeline definition indexes
//! before any pixel data exists: element type and dimensionality are
//! fixed up front, extents are symbolic [`SizeParam`]s, and a concrete
//! [`Buffer`] is attached before each run. Code generated against the
//! symbolic sizes resolves them at run time, so rebinding never
//! invalidates already-built expressions.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::buffer::{Buffer, BufferError};
use crate::context::Context;
use crate::expr::{Expr, SizeParam};
use crate::scalar::ScalarType;

struct Contents {
    scalar: ScalarType,
    sizes: Vec<SizeParam>,
    name: String,
    bound: RefCell<Option<Buffer>>,
}

/// Named, fixed-shape placeholder for a buffer supplied at run time.
///
/// Handles have reference semantics like [`Buffer`]: clones share the
/// binding, and equality is handle identity. An image starts unbound;
/// [`attach`](Self::attach) binds it and may be called again before
/// every run. There is no way back to the unbound state.
///
/// Not thread-safe: attach racing a data access on another thread needs
/// external synchronization (handles are `!Send` anyway).
///
/// # Example
///
/// ```
/// use zenbuf::{BoundImage, Buffer, Context, ScalarType};
///
/// let ctx = Context::new();
/// let input = BoundImage::new(&ctx, ScalarType::U8, 2).unwrap();
/// assert!(input.size(0).value().is_none());
///
/// let frame = Buffer::new(&ctx, ScalarType::U8, &[640, 480]).unwrap();
/// input.attach(&frame);
/// assert_eq!(input.size(0).value(), Some(640));
/// assert_eq!(input.size(1).value(), Some(480));
/// ```
#[derive(Clone)]
pub struct BoundImage {
    contents: Rc<Contents>,
}

impl BoundImage {
    /// Create an unbound image with `dims` fresh symbolic size
    /// parameters, one per dimension.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::DimensionCount`] unless `1 <= dims <= 4`.
    pub fn new(ctx: &Context, scalar: ScalarType, dims: usize) -> Result<BoundImage, BufferError> {
        if dims == 0 || dims > 4 {
            return Err(BufferError::DimensionCount);
        }
        let name = ctx.names().fresh('i');
        let sizes = (0..dims)
            .map(|d| SizeParam::new(format!("{name}_d{d}")))
            .collect();
        Ok(BoundImage {
            contents: Rc::new(Contents {
                scalar,
                sizes,
                name,
                bound: RefCell::new(None),
            }),
        })
    }

    /// Attach a concrete buffer, resolving every size parameter to the
    /// buffer's extents.
    ///
    /// Call again before each run to rebind. Expressions already built
    /// against this image pick up the new extents through the live
    /// parameters; nothing needs recompiling.
    ///
    /// # Panics
    ///
    /// Panics if the buffer's element type or dimensionality differs
    /// from this image's — that is a pipeline/data mismatch the caller
    /// must fix, not a recoverable condition. A failed attach leaves any
    /// previous binding untouched.
    pub fn attach(&self, buffer: &Buffer) {
        assert!(
            buffer.scalar_type() == self.contents.scalar,
            "cannot attach {} buffer {} to {} image {}",
            buffer.scalar_type(),
            buffer.name(),
            self.contents.scalar,
            self.contents.name,
        );
        assert!(
            buffer.dimensions() == self.dimensions(),
            "cannot attach {}-d buffer {} to {}-d image {}",
            buffer.dimensions(),
            buffer.name(),
            self.dimensions(),
            self.contents.name,
        );
        for (d, param) in self.contents.sizes.iter().enumerate() {
            param.set(buffer.size(d));
        }
        *self.contents.bound.borrow_mut() = Some(buffer.clone());
    }

    /// Whether a buffer is currently attached.
    pub fn is_bound(&self) -> bool {
        self.contents.bound.borrow().is_some()
    }

    /// Handle to the currently attached buffer.
    ///
    /// # Panics
    ///
    /// Panics if no buffer has been attached.
    pub fn bound_buffer(&self) -> Buffer {
        match &*self.contents.bound.borrow() {
            Some(buffer) => buffer.clone(),
            None => panic!("image {} has no buffer attached", self.contents.name),
        }
    }

    /// 16-byte-aligned pointer to the attached buffer's first element.
    ///
    /// # Panics
    ///
    /// Panics if no buffer has been attached.
    pub fn as_ptr(&self) -> *const u8 {
        self.bound_buffer().as_ptr()
    }

    /// Element type every attached buffer must match.
    #[inline]
    pub fn scalar_type(&self) -> ScalarType {
        self.contents.scalar
    }

    /// Number of dimensions (1–4).
    #[inline]
    pub fn dimensions(&self) -> usize {
        self.contents.sizes.len()
    }

    /// Unique identity, distinct from every buffer identity.
    pub fn name(&self) -> &str {
        &self.contents.name
    }

    /// Live symbolic extent of dimension `d`.
    ///
    /// The returned parameter shares its value cell with this image, so
    /// expressions built from it resolve against whichever buffer is
    /// attached when the pipeline runs — not a snapshot.
    ///
    /// # Panics
    ///
    /// Panics if `d >= dimensions()`.
    pub fn size(&self, d: usize) -> SizeParam {
        self.contents.sizes[d].clone()
    }

    /// Build the nested row-major address
    /// `c0 + size(0) * (c1 + size(1) * (c2 + size(2) * c3))`, truncated
    /// to the actual dimensionality and wrapped in a load leaf naming
    /// this image.
    ///
    /// Equivalent to [`Buffer::index`]'s flat stride sum once each size
    /// resolves, since attached buffers are packed. No bounds checking,
    /// no memory access.
    ///
    /// # Panics
    ///
    /// Panics unless `coords.len() == dimensions()`.
    pub fn index(&self, coords: &[Expr]) -> Expr {
        assert!(
            coords.len() == self.dimensions(),
            "image {} indexed with {} coordinates, has {} dimensions",
            self.name(),
            coords.len(),
            self.dimensions(),
        );
        let mut addr = coords[coords.len() - 1].clone();
        for d in (0..coords.len() - 1).rev() {
            addr = coords[d].clone() + Expr::from(self.size(d)) * addr;
        }
        Expr::image_load(self.clone(), addr)
    }
}

impl PartialEq for BoundImage {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.contents, &other.contents)
    }
}

impl Eq for BoundImage {}

impl fmt::Debug for BoundImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundImage({}, {}, {}-d, ",
            self.name(),
            self.scalar_type(),
            self.dimensions()
        )?;
        match &*self.contents.bound.borrow() {
            Some(buffer) => write!(f, "bound to {})", buffer.name()),
            None => write!(f, "unbound)"),
        }
    }
}
