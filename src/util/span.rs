//! Where tokens and directives sit in their compilation unit
//!
//! Diagnostics report a [`Span`] as the line and column of its start plus
//! its byte length.

use std::fmt;

/// A point in unit text. Lines and columns count from 1, columns in
/// characters; `offset` is in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    /// First character of a unit
    pub const START: Position = Position {
        line: 1,
        column: 1,
        offset: 0,
    };

    #[inline]
    pub fn at(
        line: usize,
        column: usize,
        offset: usize,
    ) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open range `[start, end)` of unit text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    #[inline]
    pub fn new(
        start: Position,
        end: Position,
    ) -> Self {
        Self { start, end }
    }

    /// Zero-width span at `at`, for errors with nothing to underline
    #[inline]
    pub fn point(at: Position) -> Self {
        Self { start: at, end: at }
    }

    /// Bytes covered
    #[inline]
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// From the earlier start to the later end; a directive spans its
    /// keyword through its semicolon
    pub fn to(
        self,
        other: Span,
    ) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.is_empty() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}+{}", self.start, self.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_span_runs_keyword_to_semicolon() {
        let keyword = Span::new(Position::at(3, 1, 20), Position::at(3, 7, 26));
        let semicolon = Span::new(Position::at(3, 18, 37), Position::at(3, 19, 38));
        let directive = keyword.to(semicolon);
        assert_eq!(directive, semicolon.to(keyword));
        assert_eq!(directive.start.column, 1);
        assert_eq!(directive.len(), 18);
        assert_eq!(directive.to_string(), "3:1+18");
    }

    #[test]
    fn test_point_span() {
        let eof = Span::point(Position::at(4, 2, 30));
        assert!(eof.is_empty());
        assert_eq!(eof.to_string(), "4:2");
        assert_eq!(Span::point(Position::START).start.line, 1);
    }
}
