//! Symbolic address expressions.
//!
//! Indexing a [`Buffer`] or [`BoundImage`] produces an [`Expr`]: an
//! unevaluated arithmetic formula over coordinates, strides, and size
//! parameters, terminated by a load leaf naming the indexed container.
//! This crate only builds these trees — the pipeline compiler walks
//! [`Node`]s to emit actual memory accesses. Nothing here reads or
//! writes pixel data, checks bounds, or simplifies arithmetic.

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::Cell;
use core::fmt;
use core::ops::{Add, Mul};

use crate::buffer::Buffer;
use crate::image::BoundImage;

/// An unevaluated integer expression.
///
/// Cheap to clone; clones share the underlying node. Build expressions
/// from integer literals, [`Expr::var`] coordinates, and size
/// parameters using ordinary `+` and `*`:
///
/// ```
/// use zenbuf::Expr;
///
/// let addr = Expr::var("x") + Expr::var("y") * Expr::from(4u32);
/// assert_eq!(format!("{addr}"), "(x + (y * 4))");
/// ```
#[derive(Clone)]
pub struct Expr {
    node: Rc<Node>,
}

/// Expression tree node.
///
/// Consumed by the pipeline compiler; this crate never evaluates or
/// rewrites nodes after construction.
#[non_exhaustive]
pub enum Node {
    /// Integer constant.
    Const(i64),
    /// Free coordinate variable, bound by the surrounding pipeline.
    Var(String),
    /// Symbolic image extent, resolved whenever a buffer is attached.
    Size(SizeParam),
    /// Sum of two subexpressions.
    Add(Expr, Expr),
    /// Product of two subexpressions.
    Mul(Expr, Expr),
    /// Element load from a buffer at a precomputed element offset.
    BufferLoad {
        /// The indexed buffer; its identity and element type tell the
        /// compiler what to load.
        buffer: Buffer,
        /// Linear element offset from the buffer's aligned base.
        offset: Expr,
    },
    /// Element load from a bound image at a precomputed element offset.
    ImageLoad {
        /// The indexed image; resolved to a concrete buffer at run time.
        image: BoundImage,
        /// Linear element offset in the row-major nested form.
        offset: Expr,
    },
}

impl Expr {
    /// Free coordinate variable.
    pub fn var(name: &str) -> Self {
        Self::from_node(Node::Var(String::from(name)))
    }

    /// The root node, for consumption by the pipeline compiler.
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub(crate) fn from_node(node: Node) -> Self {
        Self {
            node: Rc::new(node),
        }
    }

    pub(crate) fn buffer_load(buffer: Buffer, offset: Expr) -> Self {
        Self::from_node(Node::BufferLoad { buffer, offset })
    }

    pub(crate) fn image_load(image: BoundImage, offset: Expr) -> Self {
        Self::from_node(Node::ImageLoad { image, offset })
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::from_node(Node::Const(value))
    }
}

impl From<u32> for Expr {
    fn from(value: u32) -> Self {
        Self::from_node(Node::Const(value as i64))
    }
}

impl From<SizeParam> for Expr {
    fn from(param: SizeParam) -> Self {
        Self::from_node(Node::Size(param))
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::from_node(Node::Add(self, rhs))
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::from_node(Node::Mul(self, rhs))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Const(v) => write!(f, "{v}"),
            Node::Var(name) => f.write_str(name),
            Node::Size(param) => f.write_str(param.name()),
            Node::Add(a, b) => write!(f, "({a} + {b})"),
            Node::Mul(a, b) => write!(f, "({a} * {b})"),
            Node::BufferLoad { buffer, offset } => {
                write!(f, "{}[{offset}]", buffer.name())
            }
            Node::ImageLoad { image, offset } => {
                write!(f, "{}[{offset}]", image.name())
            }
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({self})")
    }
}

// ---------------------------------------------------------------------------
// SizeParam
// ---------------------------------------------------------------------------

/// Named symbolic extent of one bound-image dimension.
///
/// The parameter is live: clones share one value cell, and every
/// expression built from the parameter observes whichever buffer is
/// attached when the compiled pipeline finally runs.
/// [`value`](Self::value) is `None` until the owning image's first
/// attach.
///
/// Equality is identity — two parameters compare equal only if they
/// share the same cell.
#[derive(Clone)]
pub struct SizeParam {
    inner: Rc<ParamContents>,
}

struct ParamContents {
    name: String,
    value: Cell<Option<u32>>,
}

impl SizeParam {
    pub(crate) fn new(name: String) -> Self {
        Self {
            inner: Rc::new(ParamContents {
                name,
                value: Cell::new(None),
            }),
        }
    }

    /// Parameter name, derived from the owning image's identity.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current resolution, `None` until a buffer has been attached.
    pub fn value(&self) -> Option<u32> {
        self.inner.value.get()
    }

    pub(crate) fn set(&self, value: u32) {
        self.inner.value.set(Some(value));
    }
}

impl PartialEq for SizeParam {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for SizeParam {}

impl fmt::Display for SizeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for SizeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizeParam")
            .field("name", &self.inner.name)
            .field("value", &self.inner.value.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Test-only evaluation
// ---------------------------------------------------------------------------
