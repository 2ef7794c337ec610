//! Static computation graph → self-contained Rust source.

pub mod codegen;
pub mod error;
pub mod format;
pub mod ir;
pub mod parse;

pub use codegen::{compile, compile_with, CompileOptions};
pub use error::CompileError;
