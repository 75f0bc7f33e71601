//! Line-granular source maps
//!
//! Per-unit maps record, for each emitted declaration, the generated line
//! it starts on and the source line it came from. The packaged application
//! gets an index map: one section per unit, offset by the lines emitted
//! before it.

use serde::{Deserialize, Serialize};

pub const VERSION: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineMapping {
    /// 1-based line in the generated file
    pub generated_line: usize,
    /// Index into `sources`
    pub source: usize,
    /// 1-based line in the source
    pub source_line: usize,
    /// Index into `names`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<usize>,
}

/// Map of one generated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    pub version: u32,
    pub file: String,
    pub sources: Vec<String>,
    pub names: Vec<String>,
    pub mappings: Vec<LineMapping>,
}

impl SourceMap {
    /// Empty map for `file` generated from `source`
    pub fn new(
        file: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            version: VERSION,
            file: file.into(),
            sources: vec![source.into()],
            names: Vec::new(),
            mappings: Vec::new(),
        }
    }

    pub fn add(
        &mut self,
        generated_line: usize,
        source_line: usize,
        name: &str,
    ) {
        let index = match self.names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.names.push(name.to_string());
                self.names.len() - 1
            }
        };
        self.mappings.push(LineMapping {
            generated_line,
            source: 0,
            source_line,
            name: Some(index),
        });
    }

    /// Source line that produced `generated_line`, if it starts a mapping
    pub fn lookup(
        &self,
        generated_line: usize,
    ) -> Option<&LineMapping> {
        self.mappings.iter().find(|m| m.generated_line == generated_line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    /// Lines emitted before the section (0-based)
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub offset: Offset,
    pub map: SourceMap,
}

/// Map of a concatenated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionedMap {
    pub version: u32,
    pub file: String,
    pub sections: Vec<Section>,
}

impl SectionedMap {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            version: VERSION,
            file: file.into(),
            sections: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        line_offset: usize,
        map: SourceMap,
    ) {
        self.sections.push(Section {
            offset: Offset {
                line: line_offset,
                column: 0,
            },
            map,
        });
    }

    /// Resolve a 1-based line of the concatenated file to `(source, line)`
    pub fn lookup(
        &self,
        generated_line: usize,
    ) -> Option<(&str, usize)> {
        let section = self
            .sections
            .iter()
            .rev()
            .find(|s| s.offset.line < generated_line)?;
        let mapping = section.map.lookup(generated_line - section.offset.line)?;
        let source = section.map.sources.get(mapping.source)?;
        Some((source.as_str(), mapping.source_line))
    }
}
