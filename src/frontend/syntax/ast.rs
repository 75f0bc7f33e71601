//! Unit syntax tree
//!
//! One [`CompilationUnit`] per source file. Later phases annotate it in
//! place: resolution fills [`Reference::binding`], type checking fills
//! [`Declaration::static_type`], optimization sets
//! [`Declaration::eliminated`].

use std::sync::Arc;

use crate::frontend::module::LibraryId;
use crate::frontend::source::Source;
use crate::util::intern::Symbol;
use crate::util::span::Span;
use crate::util::Spanned;

/// Directive kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Library,
    Import,
    Export,
    Part,
    PartOf,
}

/// One directive; `value` is a URI for import/export/part and a dotted
/// name for library/part of
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub value: String,
    pub span: Span,
}

/// The directive header of a unit, in source order per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    pub library_name: Option<String>,
    pub part_of: Option<String>,
    pub imports: Vec<Directive>,
    pub exports: Vec<Directive>,
    pub parts: Vec<Directive>,
}

impl Directives {
    /// Whether this unit is a part of another library
    pub fn is_part(&self) -> bool {
        self.part_of.is_some()
    }

    pub(crate) fn push(
        &mut self,
        directive: Directive,
    ) {
        match directive.kind {
            DirectiveKind::Library => self.library_name = Some(directive.value),
            DirectiveKind::PartOf => self.part_of = Some(directive.value),
            DirectiveKind::Import => self.imports.push(directive),
            DirectiveKind::Export => self.exports.push(directive),
            DirectiveKind::Part => self.parts.push(directive),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Class,
    Function,
    Variable,
}

/// Shape of a variable initializer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Int,
    Double,
    String,
    Bool,
    Null,
    List,
    Map,
    /// Anything that is not a single literal
    Expression,
}

impl LiteralKind {
    /// Core type name of the literal, if it has one
    pub fn type_name(self) -> Option<&'static str> {
        match self {
            LiteralKind::Int => Some("int"),
            LiteralKind::Double => Some("double"),
            LiteralKind::String => Some("String"),
            LiteralKind::Bool => Some("bool"),
            LiteralKind::List => Some("List"),
            LiteralKind::Map => Some("Map"),
            LiteralKind::Null | LiteralKind::Expression => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// `name(...)`
    Call,
    /// `new Name(...)`
    Construct,
}

/// What a reference resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Declared in the same library
    Local,
    /// Exported by an imported library
    Imported(LibraryId),
    /// Implicitly available core name
    Core,
}

/// A name used inside a body or initializer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: Symbol,
    pub kind: ReferenceKind,
    pub span: Span,
    pub binding: Option<Binding>,
}

/// Top-level declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub name: Symbol,
    /// Span of the name
    pub span: Span,
    /// Line the declaration starts on
    pub line: usize,
    /// Library-private (`_name`)
    pub private: bool,
    pub type_annotation: Option<Spanned<Symbol>>,
    pub superclass: Option<Spanned<Symbol>>,
    pub parameters: Vec<Symbol>,
    pub initializer: Option<Spanned<LiteralKind>>,
    /// Raw text: the braced body for classes and functions, the initializer
    /// expression for variables
    pub body: String,
    pub references: Vec<Reference>,
    pub static_type: Option<Symbol>,
    pub eliminated: bool,
}

impl Declaration {
    /// Declarations the backend still emits
    pub fn is_live(&self) -> bool {
        !self.eliminated
    }
}

/// One source file and its syntax tree
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub source: Source,
    /// Text read during graph expansion; empty when the source is unreadable
    pub text: Arc<str>,
    pub directives: Directives,
    pub declarations: Vec<Declaration>,
    pub parsed: bool,
}

impl CompilationUnit {
    /// A unit whose header has been scanned but not yet parsed
    pub fn new(
        source: Source,
        text: Arc<str>,
        directives: Directives,
    ) -> Self {
        Self {
            source,
            text,
            directives,
            declarations: Vec::new(),
            parsed: false,
        }
    }

    /// Live declarations in source order
    pub fn live_declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.is_live())
    }
}
