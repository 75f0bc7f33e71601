//! Recovering parser
//!
//! Errors never stop the parse: the offending statement is skipped up to
//! the next `;` or balanced block and parsing resumes, so later phases can
//! work on the partial tree.

use std::collections::HashSet;

use super::ast::{
    Declaration, DeclarationKind, Directive, DirectiveKind, Directives, LiteralKind, Reference,
    ReferenceKind,
};
use super::lexer::{tokenize, Token, TokenKind};
use super::SyntaxError;
use crate::util::diagnostic::ErrorCode;
use crate::util::intern::{Interner, Symbol};
use crate::util::span::Span;
use crate::util::Spanned;

const DIRECTIVE_KEYWORDS: &[&str] = &["library", "import", "export", "part"];
const MODIFIERS: &[&str] = &["abstract", "external", "static", "const", "final", "var", "late"];
/// Identifiers followed by `(` that are not calls
const NON_CALL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "assert", "super", "this", "return", "throw", "await",
    "yield", "new", "const",
];
/// Identifiers that may directly precede a call
const CALL_PREFIX_KEYWORDS: &[&str] = &["return", "await", "throw", "else", "yield", "case", "in"];

/// Result of a full parse
#[derive(Debug, Clone, Default)]
pub struct ParsedUnit {
    pub directives: Directives,
    pub declarations: Vec<Declaration>,
    /// Lexical and syntax errors in source order
    pub errors: Vec<SyntaxError>,
}

/// Read the directive header only; errors are ignored
pub fn scan_directives(text: &str) -> Directives {
    let (tokens, _) = tokenize(text);
    let interner = Interner::new();
    let mut parser = Parser::new(text, &tokens, &interner);
    parser.parse_header();
    parser.directives
}

/// Parse a whole unit
pub fn parse_unit(
    text: &str,
    interner: &Interner,
) -> ParsedUnit {
    let (tokens, mut errors) = tokenize(text);
    let mut parser = Parser::new(text, &tokens, interner);
    parser.parse_header();
    parser.parse_declarations();

    errors.append(&mut parser.errors);
    errors.sort_by_key(|e| e.span.start);
    ParsedUnit {
        directives: parser.directives,
        declarations: parser.declarations,
        errors,
    }
}

struct Parser<'a> {
    text: &'a str,
    tokens: &'a [Token],
    pos: usize,
    interner: &'a Interner,
    directives: Directives,
    declarations: Vec<Declaration>,
    errors: Vec<SyntaxError>,
}

struct Body {
    text: String,
    references: Vec<Reference>,
}

impl<'a> Parser<'a> {
    fn new(
        text: &'a str,
        tokens: &'a [Token],
        interner: &'a Interner,
    ) -> Self {
        Self {
            text,
            tokens,
            pos: 0,
            interner,
            directives: Directives::default(),
            declarations: Vec::new(),
            errors: Vec::new(),
        }
    }

    // ---- token cursor ----

    fn current(&self) -> &'a Token {
        let tokens: &'a [Token] = self.tokens;
        &tokens[self.pos.min(tokens.len() - 1)]
    }

    fn nth(
        &self,
        n: usize,
    ) -> &'a TokenKind {
        let tokens: &'a [Token] = self.tokens;
        &tokens[(self.pos + n).min(tokens.len() - 1)].kind
    }

    fn at_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn bump(&mut self) -> &'a Token {
        let token = self.current();
        if !self.at_eof() {
            self.pos += 1;
        }
        token
    }

    fn at_punct(
        &self,
        c: char,
    ) -> bool {
        self.current().kind.is_punct(c)
    }

    fn current_ident(&self) -> Option<&'a str> {
        match &self.current().kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    fn slice(
        &self,
        from: usize,
        to: usize,
    ) -> &'a str {
        let text: &'a str = self.text;
        text.get(from..to).unwrap_or("")
    }

    fn expected(
        &mut self,
        what: &str,
    ) {
        let token = self.current();
        self.errors.push(
            SyntaxError::new(ErrorCode::EXPECTED, token.span)
                .with("expected", what)
                .with("found", token.kind.describe()),
        );
    }

    fn expect_semicolon(&mut self) {
        if self.at_punct(';') {
            self.bump();
        } else {
            self.expected("';'");
        }
    }

    /// Skip to the end of the current statement
    fn recover(&mut self) {
        loop {
            match &self.current().kind {
                TokenKind::Eof => return,
                TokenKind::Punct(';') | TokenKind::Punct('}') => {
                    self.bump();
                    return;
                }
                TokenKind::Punct('{') => {
                    self.skip_balanced('{', '}');
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Skip a balanced group starting at the current `open`
    fn skip_balanced(
        &mut self,
        open: char,
        close: char,
    ) {
        let mut depth = 0usize;
        loop {
            let kind = &self.bump().kind;
            if kind.is_punct(open) {
                depth += 1;
            } else if kind.is_punct(close) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return;
                }
            } else if *kind == TokenKind::Eof {
                return;
            }
        }
    }

    fn skip_type_arguments(&mut self) {
        if self.at_punct('<') {
            self.skip_balanced('<', '>');
        }
    }

    fn spanned_symbol(
        &self,
        token: &Token,
    ) -> Option<Spanned<Symbol>> {
        match &token.kind {
            TokenKind::Ident(name) => Some(Spanned::new(self.interner.intern(name), token.span)),
            _ => None,
        }
    }

    // ---- directives ----

    fn at_directive(&self) -> bool {
        match self.current_ident() {
            Some(word) if DIRECTIVE_KEYWORDS.contains(&word) => !matches!(
                self.nth(1),
                TokenKind::Punct('(') | TokenKind::Punct('=') | TokenKind::Punct('.')
            ),
            _ => false,
        }
    }

    fn parse_header(&mut self) {
        while self.at_directive() {
            if let Some(directive) = self.parse_directive() {
                self.directives.push(directive);
            }
        }
    }

    fn parse_directive(&mut self) -> Option<Directive> {
        let keyword = self.bump();
        let mut kind = match &keyword.kind {
            TokenKind::Ident(word) if word == "library" => DirectiveKind::Library,
            TokenKind::Ident(word) if word == "import" => DirectiveKind::Import,
            TokenKind::Ident(word) if word == "export" => DirectiveKind::Export,
            _ => DirectiveKind::Part,
        };
        if kind == DirectiveKind::Part && self.current().kind.is_ident("of") {
            self.bump();
            kind = DirectiveKind::PartOf;
        }

        let value = match (kind, &self.current().kind) {
            (DirectiveKind::Library | DirectiveKind::PartOf, TokenKind::Ident(_)) => {
                self.dotted_name()
            }
            (DirectiveKind::PartOf, TokenKind::Str(uri)) => {
                self.bump();
                uri.clone()
            }
            (DirectiveKind::Import | DirectiveKind::Export | DirectiveKind::Part, TokenKind::Str(uri)) => {
                self.bump();
                uri.clone()
            }
            (DirectiveKind::Library | DirectiveKind::PartOf, _) => {
                self.expected("library name");
                self.recover();
                return None;
            }
            _ => {
                self.expected("string literal");
                self.recover();
                return None;
            }
        };

        // combinators and prefixes: `as p`, `show a, b`, `hide c`
        while matches!(self.current().kind, TokenKind::Ident(_) | TokenKind::Punct(',')) {
            self.bump();
        }
        let end = self.current().span;
        self.expect_semicolon();
        Some(Directive {
            kind,
            value,
            span: keyword.span.to(end),
        })
    }

    fn dotted_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(part) = self.current_ident() {
            name.push_str(part);
            self.bump();
            if self.at_punct('.') && matches!(self.nth(1), TokenKind::Ident(_)) {
                self.bump();
                name.push('.');
            } else {
                break;
            }
        }
        name
    }

    // ---- declarations ----

    fn parse_declarations(&mut self) {
        while !self.at_eof() {
            if self.at_directive() {
                let token = self.current();
                self.errors.push(
                    SyntaxError::new(ErrorCode::DIRECTIVE_AFTER_DECLARATION, token.span)
                        .with("directive", token.kind.describe()),
                );
                self.recover();
                continue;
            }
            self.parse_declaration();
        }
    }

    fn skip_metadata(&mut self) {
        while self.at_punct('@') {
            self.bump();
            self.dotted_name();
            if self.at_punct('(') {
                self.skip_balanced('(', ')');
            }
        }
    }

    fn parse_declaration(&mut self) {
        let start = self.current().span;
        self.skip_metadata();
        while self
            .current_ident()
            .is_some_and(|word| MODIFIERS.contains(&word))
        {
            self.bump();
        }

        match self.current_ident() {
            Some("class") => self.parse_class(start),
            Some(_) => self.parse_member(start),
            None => {
                let token = self.current();
                self.errors.push(
                    SyntaxError::new(ErrorCode::UNEXPECTED_TOKEN, token.span)
                        .with("token", token.kind.describe()),
                );
                self.recover();
            }
        }
    }

    fn parse_class(
        &mut self,
        start: Span,
    ) {
        self.bump();
        let name_token = self.current();
        let name = match &name_token.kind {
            TokenKind::Ident(name) => name.as_str(),
            _ => {
                self.expected("class name");
                self.recover();
                return;
            }
        };
        self.bump();
        self.skip_type_arguments();

        let mut superclass = None;
        if self.current().kind.is_ident("extends") {
            self.bump();
            superclass = self.spanned_symbol(self.current());
            if superclass.is_some() {
                self.bump();
                self.skip_type_arguments();
            }
        }

        // `with` / `implements` clauses are not modelled
        while !matches!(
            self.current().kind,
            TokenKind::Punct('{') | TokenKind::Punct(';') | TokenKind::Eof
        ) {
            self.bump();
        }
        if !self.at_punct('{') {
            self.expected("class body");
            self.recover();
            return;
        }

        let body = self.parse_body(name, true, &[]);
        let mut declaration = self.declaration(DeclarationKind::Class, name_token, name, start);
        declaration.superclass = superclass;
        declaration.body = body.text;
        declaration.references = body.references;
        self.declarations.push(declaration);
    }

    /// Function or variable: `[Type] name (...) body` or `[Type] name [= init];`
    fn parse_member(
        &mut self,
        start: Span,
    ) {
        let first = self.bump();
        self.skip_type_arguments();
        let (type_token, name_token) = match self.current().kind {
            TokenKind::Ident(_) => (Some(first), self.bump()),
            _ => (None, first),
        };
        let name = match &name_token.kind {
            TokenKind::Ident(name) => name.as_str(),
            _ => return,
        };
        let type_annotation = type_token.and_then(|t| self.spanned_symbol(t));

        match &self.current().kind {
            TokenKind::Punct('(') => {
                let parameters = self.parse_parameters();
                let body = match &self.current().kind {
                    TokenKind::Punct('{') => self.parse_body(name, false, &parameters),
                    TokenKind::Arrow => {
                        self.bump();
                        let (from, to) = self.expression_until_semicolon();
                        let expression = self.expression_text(from, to);
                        Body {
                            text: format!("{{ return {}; }}", expression),
                            references: self.references(&self.tokens[from..to], false, &parameters),
                        }
                    }
                    TokenKind::Punct(';') => {
                        self.bump();
                        Body {
                            text: String::new(),
                            references: Vec::new(),
                        }
                    }
                    _ => {
                        self.expected("function body");
                        self.recover();
                        return;
                    }
                };
                let mut declaration =
                    self.declaration(DeclarationKind::Function, name_token, name, start);
                declaration.type_annotation = type_annotation;
                declaration.parameters = parameters
                    .iter()
                    .map(|p| self.interner.intern(p))
                    .collect();
                declaration.body = body.text;
                declaration.references = body.references;
                self.declarations.push(declaration);
            }
            TokenKind::Punct('=') => {
                self.bump();
                let (from, to) = self.expression_until_semicolon();
                let tokens = &self.tokens[from..to];
                let mut declaration =
                    self.declaration(DeclarationKind::Variable, name_token, name, start);
                declaration.type_annotation = type_annotation;
                if let (Some(first), Some(last)) = (tokens.first(), tokens.last()) {
                    declaration.initializer =
                        Some(Spanned::new(literal_kind(tokens), first.span.to(last.span)));
                }
                declaration.body = self.expression_text(from, to).to_string();
                declaration.references = self.references(tokens, false, &[]);
                self.declarations.push(declaration);
            }
            TokenKind::Punct(';') => {
                self.bump();
                let mut declaration =
                    self.declaration(DeclarationKind::Variable, name_token, name, start);
                declaration.type_annotation = type_annotation;
                self.declarations.push(declaration);
            }
            _ => {
                self.expected("'(', '=' or ';'");
                self.recover();
            }
        }
    }

    fn declaration(
        &self,
        kind: DeclarationKind,
        name_token: &Token,
        name: &str,
        start: Span,
    ) -> Declaration {
        Declaration {
            kind,
            name: self.interner.intern(name),
            span: name_token.span,
            line: start.start.line,
            private: name.starts_with('_'),
            type_annotation: None,
            superclass: None,
            parameters: Vec::new(),
            initializer: None,
            body: String::new(),
            references: Vec::new(),
            static_type: None,
            eliminated: false,
        }
    }

    /// Parameter names of a `( ... )` list
    fn parse_parameters(&mut self) -> Vec<String> {
        let open = self.bump();
        let mut names = Vec::new();
        let mut depth = 1usize;
        loop {
            let token = self.bump();
            match &token.kind {
                TokenKind::Eof => {
                    self.errors.push(
                        SyntaxError::new(ErrorCode::EXPECTED, open.span)
                            .with("expected", "')'")
                            .with("found", TokenKind::Eof.describe()),
                    );
                    break;
                }
                TokenKind::Punct('(') => depth += 1,
                TokenKind::Punct(')') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Ident(name)
                    if matches!(
                        self.current().kind,
                        TokenKind::Punct(',' | ')' | '=' | ':' | '}' | ']')
                    ) =>
                {
                    names.push(name.clone())
                }
                _ => {}
            }
        }
        names
    }

    /// Token range of an expression, consuming the terminating `;`
    fn expression_until_semicolon(&mut self) -> (usize, usize) {
        let from = self.pos;
        let mut depth = 0usize;
        loop {
            match &self.current().kind {
                TokenKind::Eof => break,
                TokenKind::Punct(';') if depth == 0 => break,
                TokenKind::Punct('(' | '[' | '{') => depth += 1,
                TokenKind::Punct(')' | ']' | '}') => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.bump();
        }
        let to = self.pos;
        self.expect_semicolon();
        (from, to)
    }

    fn expression_text(
        &self,
        from: usize,
        to: usize,
    ) -> &'a str {
        if from >= to {
            return "";
        }
        let tokens: &'a [Token] = self.tokens;
        self.slice(tokens[from].span.start.offset, tokens[to - 1].span.end.offset)
    }

    /// Braced body starting at the current `{`
    fn parse_body(
        &mut self,
        owner: &str,
        class_body: bool,
        parameters: &[String],
    ) -> Body {
        let open = self.bump();
        let inner_start = self.pos;
        let mut depth = 1usize;
        let (inner_end, text_end) = loop {
            let token = self.current();
            match &token.kind {
                TokenKind::Eof => {
                    self.errors.push(
                        SyntaxError::new(ErrorCode::UNBALANCED_BRACES, open.span)
                            .with("name", owner),
                    );
                    break (self.pos, self.text.len());
                }
                TokenKind::Punct('{') => depth += 1,
                TokenKind::Punct('}') => {
                    depth -= 1;
                    if depth == 0 {
                        let end = self.pos;
                        self.bump();
                        break (end, token.span.end.offset);
                    }
                }
                _ => {}
            }
            self.bump();
        };
        Body {
            text: self.slice(open.span.start.offset, text_end).to_string(),
            references: self.references(&self.tokens[inner_start..inner_end], class_body, parameters),
        }
    }

    /// Calls and constructions inside `tokens`.
    ///
    /// Parameters, locally declared functions and (for class bodies) members
    /// are not references.
    fn references(
        &self,
        tokens: &[Token],
        class_body: bool,
        parameters: &[String],
    ) -> Vec<Reference> {
        let mut locals: HashSet<&str> = parameters.iter().map(String::as_str).collect();
        let mut found: Vec<(&str, ReferenceKind, Span)> = Vec::new();
        let mut depth = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            let name = match &token.kind {
                TokenKind::Punct('{') => {
                    depth += 1;
                    continue;
                }
                TokenKind::Punct('}') => {
                    depth = depth.saturating_sub(1);
                    continue;
                }
                TokenKind::Ident(name) => name.as_str(),
                _ => continue,
            };
            let next = tokens.get(i + 1).map(|t| &t.kind);
            let prev = i.checked_sub(1).map(|p| &tokens[p].kind);

            if name == "new" || name == "const" {
                if let Some(target) = tokens.get(i + 1) {
                    let follows = tokens.get(i + 2).map(|t| &t.kind);
                    if let (TokenKind::Ident(ctor), Some(TokenKind::Punct('(' | '.' | '<'))) =
                        (&target.kind, follows)
                    {
                        found.push((ctor.as_str(), ReferenceKind::Construct, target.span));
                    }
                }
                continue;
            }
            if next != Some(&TokenKind::Punct('(')) || NON_CALL_KEYWORDS.contains(&name) {
                continue;
            }
            match prev {
                Some(TokenKind::Punct('.')) => continue,
                Some(TokenKind::Ident(p)) if p == "new" || p == "const" => continue,
                Some(TokenKind::Ident(p)) if !CALL_PREFIX_KEYWORDS.contains(&p.as_str()) => {
                    // `Type name(` declares a local function or a member
                    locals.insert(name);
                    continue;
                }
                _ => {}
            }
            if class_body && depth == 0 {
                locals.insert(name);
                continue;
            }
            found.push((name, ReferenceKind::Call, token.span));
        }

        found
            .into_iter()
            .filter(|(name, _, _)| !locals.contains(name))
            .map(|(name, kind, span)| Reference {
                name: self.interner.intern(name),
                kind,
                span,
                binding: None,
            })
            .collect()
    }
}

/// Classify an initializer by its tokens
fn literal_kind(tokens: &[Token]) -> LiteralKind {
    let kinds: Vec<&TokenKind> = tokens.iter().map(|t| &t.kind).collect();
    match kinds.as_slice() {
        [TokenKind::Int(_)] | [TokenKind::Punct('-'), TokenKind::Int(_)] => LiteralKind::Int,
        [TokenKind::Double(_)] | [TokenKind::Punct('-'), TokenKind::Double(_)] => {
            LiteralKind::Double
        }
        [TokenKind::Ident(word)] if word == "true" || word == "false" => LiteralKind::Bool,
        [TokenKind::Ident(word)] if word == "null" => LiteralKind::Null,
        all if !all.is_empty() && all.iter().all(|k| matches!(k, TokenKind::Str(_))) => {
            LiteralKind::String
        }
        [first, .., last] => {
            // optional type arguments before the brackets
            let open = if first.is_punct('<') {
                kinds
                    .iter()
                    .position(|k| k.is_punct('>'))
                    .and_then(|p| kinds.get(p + 1))
            } else {
                Some(first)
            };
            match open {
                Some(k) if k.is_punct('[') && last.is_punct(']') => LiteralKind::List,
                Some(k) if k.is_punct('{') && last.is_punct('}') => LiteralKind::Map,
                _ => LiteralKind::Expression,
            }
        }
        _ => LiteralKind::Expression,
    }
}
