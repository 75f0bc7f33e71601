//! Syntax layer
//!
//! A small Dart-like surface: directives (`library`, `import`, `export`,
//! `part`, `part of`) followed by top-level classes, functions and
//! variables. Bodies are kept as raw text; only the names they call or
//! construct are extracted, which is all the later phases look at.
//!
//! [`scan_directives`] reads the header only and never reports errors; it is
//! what the dependency resolver uses. [`parse_unit`] is the full parse used by
//! the parse phase.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::{parse_unit, scan_directives, ParsedUnit};

use crate::util::diagnostic::{DiagnosticEvent, ErrorCode, SourceLocation};
use crate::util::span::Span;

/// A lexical or syntactic problem, not yet tied to a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub code: ErrorCode,
    pub span: Span,
    params: Vec<(&'static str, String)>,
}

impl SyntaxError {
    pub fn new(
        code: ErrorCode,
        span: Span,
    ) -> Self {
        Self {
            code,
            span,
            params: Vec::new(),
        }
    }

    /// Bind a message template parameter
    pub fn with(
        mut self,
        name: &'static str,
        value: impl ToString,
    ) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    /// Attach to a source and build the diagnostic
    pub fn to_event(
        &self,
        source_id: &str,
    ) -> DiagnosticEvent {
        let mut builder = self.code.builder().at(SourceLocation::new(
            source_id,
            self.span.start.line,
            self.span.start.column,
            self.span.len(),
        ));
        for (name, value) in &self.params {
            builder = builder.param(name, value);
        }
        builder.build()
    }
}
