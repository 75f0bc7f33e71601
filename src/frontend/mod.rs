//! 编译前端
//!
//! Everything between a root path and a fully annotated library graph:
//! configuration, sources, syntax, the library graph and the phases that
//! run over it.

pub mod config;
pub mod module;
pub mod phases;
pub mod pipeline;
pub mod source;
pub mod syntax;
pub mod types;
