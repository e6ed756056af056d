//! Quill semantic analysis
//!
//! The semantic-analysis stage of Quill, a small statically typed
//! scripting language with per-call-site generic instantiation and
//! element-wise array operators. The parser hands a rooted [`frontend::ast::Ast`]
//! to [`frontend::semantic::analyze`], which resolves names, computes the
//! type of every declaration and expression, validates the language rules,
//! and returns the annotated facts the interpreter consumes.

pub mod frontend;
pub mod solver;
pub mod types;
pub mod utils;
