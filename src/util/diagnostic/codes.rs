//! Error code registry
//!
//! Every diagnostic the driver can produce is declared here with its
//! subsystem, its intrinsic severity and a message template using `{param}`
//! placeholders.
//!
//! | Range | Subsystem |
//! |-------|-----------|
//! | E01xx | parser |
//! | E05xx | resolver / imports |
//! | E10xx | static types |
//! | E70xx | I/O |

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{DiagnosticEvent, Severity, SourceLocation, SubSystem};

/// Error code definition (metadata only; rendering happens in the builder)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Code, e.g. "E0503"
    pub code: &'static str,
    /// Subsystem that owns the code
    pub subsystem: SubSystem,
    /// Intrinsic severity
    pub severity: Severity,
    /// Message template, `{param}` placeholders
    pub message_template: &'static str,
}

macro_rules! error_codes {
    ($( $(#[$doc:meta])* $name:ident = ($code:literal, $sub:ident, $sev:ident, $tmpl:literal); )*) => {
        impl ErrorCode {
            $(
                $(#[$doc])*
                pub const $name: ErrorCode = ErrorCode {
                    code: $code,
                    subsystem: SubSystem::$sub,
                    severity: Severity::$sev,
                    message_template: $tmpl,
                };
            )*
        }

        /// Complete registry, in code order
        pub static ALL_CODES: &[ErrorCode] = &[$(ErrorCode::$name),*];
    };
}

error_codes! {
    /// E0101 unexpected token
    UNEXPECTED_TOKEN = ("E0101", Parser, Error, "Unexpected token '{token}'");
    /// E0102 unterminated string literal
    UNTERMINATED_STRING = ("E0102", Parser, Error, "Unterminated string literal");
    /// E0103 unterminated block comment
    UNTERMINATED_COMMENT = ("E0103", Parser, Error, "Unterminated block comment");
    /// E0104 missing closing brace
    UNBALANCED_BRACES = ("E0104", Parser, Error, "Expected '}' before end of file to close '{name}'");
    /// E0105 directive after a declaration
    DIRECTIVE_AFTER_DECLARATION = ("E0105", Parser, Error, "Directive '{directive}' must appear before any declaration");
    /// E0106 unexpected character
    UNEXPECTED_CHARACTER = ("E0106", Parser, Error, "Unexpected character '{char}'");
    /// E0107 expected something else
    EXPECTED = ("E0107", Parser, Error, "Expected {expected} but found '{found}'");

    /// E0501 imported library does not exist
    UNRESOLVED_IMPORT = ("E0501", Resolver, Error, "Cannot find library '{uri}'");
    /// E0502 part does not exist
    MISSING_PART = ("E0502", Resolver, Error, "Cannot find part '{uri}'");
    /// E0503 reference to an unknown name
    CANNOT_RESOLVE = ("E0503", Resolver, Warning, "Cannot resolve '{name}'");
    /// E0504 top-level name declared twice in one library
    DUPLICATE_DEFINITION = ("E0504", Resolver, Error, "Duplicate definition of '{name}'");
    /// E0505 `part of` names another library
    PART_OF_MISMATCH = ("E0505", Resolver, Warning, "Part declares 'part of {actual}' but is included by library '{expected}'");
    /// E0506 import cycle, recorded and broken in discovery order
    IMPORT_CYCLE = ("E0506", Resolver, Info, "Import cycle: {path}");
    /// E0507 import specification cannot be mapped to a source
    INVALID_IMPORT = ("E0507", Resolver, Error, "Invalid import specification '{spec}'");

    /// E1001 unknown type name
    NO_SUCH_TYPE = ("E1001", StaticType, Warning, "No such type '{name}'");
    /// E1002 initializer does not match the declared type
    TYPE_MISMATCH = ("E1002", StaticType, Warning, "A value of type '{actual}' cannot be assigned to a variable of type '{expected}'");

    /// E7001 source could not be read
    SOURCE_READ_FAILED = ("E7001", Io, Error, "Failed to read '{uri}': {reason}");
    /// E7002 artifact write failed
    ARTIFACT_WRITE_FAILED = ("E7002", Io, Error, "Failed to write artifact '{key}': {reason}");
    /// E7003 artifact read failed
    ARTIFACT_READ_FAILED = ("E7003", Io, Error, "Failed to read artifact '{key}': {reason}");
}

/// Code string → definition
static BY_CODE: Lazy<HashMap<&'static str, ErrorCode>> =
    Lazy::new(|| ALL_CODES.iter().map(|c| (c.code, *c)).collect());

impl ErrorCode {
    /// Look up a code by its string form, case-insensitively
    pub fn find(code: &str) -> Option<ErrorCode> {
        BY_CODE.get(code.to_ascii_uppercase().as_str()).copied()
    }

    /// Start building a diagnostic for this code
    pub fn builder(self) -> DiagnosticBuilder {
        DiagnosticBuilder::new(self)
    }
}

/// Fills a code's template and attaches a location.
#[derive(Debug, Clone)]
pub struct DiagnosticBuilder {
    code: ErrorCode,
    params: Vec<(&'static str, String)>,
    location: Option<SourceLocation>,
}

impl DiagnosticBuilder {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            params: Vec::new(),
            location: None,
        }
    }

    /// Bind a template parameter
    pub fn param(
        mut self,
        name: &'static str,
        value: impl ToString,
    ) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    /// Attach a source location
    pub fn at(
        mut self,
        location: SourceLocation,
    ) -> Self {
        self.location = Some(location);
        self
    }

    /// Render the message and produce the event
    pub fn build(self) -> DiagnosticEvent {
        let mut message = self.code.message_template.to_string();
        for (name, value) in &self.params {
            message = message.replace(&format!("{{{}}}", name), value);
        }
        DiagnosticEvent {
            code: self.code,
            subsystem: self.code.subsystem,
            severity: self.code.severity,
            location: self.location,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            assert!(seen.insert(code.code), "duplicate code {}", code.code);
        }
    }

    #[test]
    fn test_find_code() {
        let code = ErrorCode::find("E0503").unwrap();
        assert_eq!(code, ErrorCode::CANNOT_RESOLVE);
        assert_eq!(code.severity, Severity::Warning);
        assert_eq!(ErrorCode::find("e7002"), Some(ErrorCode::ARTIFACT_WRITE_FAILED));
        assert!(ErrorCode::find("E9999").is_none());
    }

    #[test]
    fn test_builder_fills_template() {
        let event = ErrorCode::TYPE_MISMATCH
            .builder()
            .param("actual", "String")
            .param("expected", "int")
            .at(SourceLocation::new("file:///a.dart", 3, 5, 4))
            .build();
        assert_eq!(
            event.message,
            "A value of type 'String' cannot be assigned to a variable of type 'int'"
        );
        assert_eq!(event.subsystem, SubSystem::StaticType);
        assert_eq!(event.location.as_ref().unwrap().line, 3);
    }
}
