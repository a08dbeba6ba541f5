//! Shared types for the quill toolchain.

pub mod span;

pub use span::{LineIndex, Span};
