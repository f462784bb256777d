//! Runtime buffer and bound-image types for zen* image pipelines.
//!
//! This crate is the data layer at the edges of a compiled image
//! pipeline: the containers that hold pixel data for inputs, outputs,
//! and materialized intermediates, and the symbolic indexing that lets
//! a pipeline definition reference them lazily.
//!
//! - [`Buffer`] — owning, reference-counted, 16-byte-aligned storage
//!   for 1–4 dimensional data of a dynamically chosen [`ScalarType`]
//! - [`BoundImage`] — a named, shape-fixed placeholder rebindable to a
//!   fresh [`Buffer`] before each pipeline run
//! - [`Expr`] / [`SizeParam`] — symbolic address expressions produced
//!   by indexing, consumed by the pipeline compiler
//! - [`Context`] — per-pipeline configuration: unique-name generation
//!   and the storage [`Allocator`]
//!
//! Indexing a buffer or image never touches memory; it builds the
//! address formula the compiler turns into loads and stores. Scheduling
//! and code generation live in the compiler crates, not here.

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

mod allocator;
mod buffer;
mod context;
mod expr;
mod image;
mod names;
mod scalar;

pub use allocator::{AllocError, Allocator, SystemAllocator};
pub use buffer::{Buffer, BufferError};
pub use context::Context;
pub use expr::{Expr, Node, SizeParam};
pub use image::BoundImage;
pub use names::NameGenerator;
pub use scalar::{ScalarKind, ScalarType};

// Re-exports for pipeline front ends that populate buffers.
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb;
pub use rgb::Gray;
