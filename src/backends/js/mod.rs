//! JavaScript reference backend
//!
//! Artifacts, all keyed by the unit's (or, when packaging, the root
//! library's) source id:
//!
//! | Extension | Content |
//! |-----------|---------|
//! | `opt.js` | one unit's declarations |
//! | `opt.js.map` | its source map |
//! | `app.js` | every unit, dependency order |
//! | `app.js.map` | sectioned map of `app.js` |

pub mod source_map;

pub use source_map::{SectionedMap, SourceMap};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use super::{Backend, BackendError, PackagedApp};
use crate::context::{artifact_key, CompilerContext};
use crate::frontend::module::LibraryUnit;
use crate::frontend::source::LibrarySource;
use crate::frontend::syntax::{CompilationUnit, Declaration, DeclarationKind};
use crate::frontend::types::TypeProvider;
use crate::util::intern::Interner;

pub const UNIT_EXTENSION: &str = "opt.js";
pub const UNIT_MAP_EXTENSION: &str = "opt.js.map";
pub const APP_EXTENSION: &str = "app.js";
pub const APP_MAP_EXTENSION: &str = "app.js.map";

#[derive(Debug, Default, Clone, Copy)]
pub struct JsBackend;

impl JsBackend {
    pub fn new() -> Self {
        JsBackend
    }

    /// Generated code and map for one unit
    pub fn emit(
        &self,
        unit: &CompilationUnit,
        library: &LibraryUnit,
        interner: &Interner,
    ) -> (String, SourceMap) {
        let file = format!("{}.{}", unit.source.display_name(), UNIT_EXTENSION);
        let mut map = SourceMap::new(file, unit.source.unique_id());
        let mut code = format!(
            "// {} (library {})\n",
            unit.source.display_name(),
            library.name()
        );
        let mut line = 2;

        for declaration in unit.live_declarations() {
            let text = emit_declaration(declaration, interner);
            let name = interner.display(declaration.name);
            // the type comment sits on its own line above the variable
            let offset = usize::from(text.starts_with("/**"));
            map.add(line + offset, declaration.line, &name);
            line += text.lines().count();
            code.push_str(&text);
            code.push('\n');
        }
        (code, map)
    }

    fn read_unit(
        &self,
        unit: &CompilationUnit,
        ctx: &dyn CompilerContext,
    ) -> Result<(Vec<u8>, SourceMap), BackendError> {
        let code = ctx.read_artifact(&unit.source, "", UNIT_EXTENSION)?;
        let raw = ctx.read_artifact(&unit.source, "", UNIT_MAP_EXTENSION)?;
        let map = serde_json::from_slice(&raw).map_err(|source| BackendError::SourceMap {
            key: artifact_key(&unit.source, "", UNIT_MAP_EXTENSION),
            source,
        })?;
        Ok((code, map))
    }
}

fn emit_declaration(
    declaration: &Declaration,
    interner: &Interner,
) -> String {
    let name = interner.display(declaration.name);
    let body = if declaration.body.is_empty() {
        "{}"
    } else {
        declaration.body.as_str()
    };
    match declaration.kind {
        DeclarationKind::Class => match declaration.superclass {
            Some(superclass) => {
                format!("class {} extends {} {}", name, interner.display(superclass.value), body)
            }
            None => format!("class {} {}", name, body),
        },
        DeclarationKind::Function => {
            let parameters: Vec<String> = declaration
                .parameters
                .iter()
                .map(|p| interner.display(*p))
                .collect();
            format!("function {}({}) {}", name, parameters.join(", "), body)
        }
        DeclarationKind::Variable => {
            let static_type = declaration
                .static_type
                .map_or_else(|| "*".to_string(), |t| interner.display(t));
            if declaration.body.is_empty() {
                format!("/** @type {{{}}} */\nvar {};", static_type, name)
            } else {
                format!("/** @type {{{}}} */\nvar {} = {};", static_type, name, declaration.body)
            }
        }
    }
}

fn line_count(code: &[u8]) -> usize {
    code.iter().filter(|b| **b == b'\n').count()
}

/// `<library name>.js`
fn published_name(app: &LibrarySource) -> String {
    format!("{}.js", app.name())
}

/// Copy `content` to `dir/file` through a temporary file in `dir`
fn publish(
    dir: &Path,
    file: &str,
    content: &[u8],
) -> Result<PathBuf, BackendError> {
    let target = dir.join(file);
    let to_error = |source| BackendError::Publish {
        path: target.clone(),
        source,
    };
    fs::create_dir_all(dir).map_err(to_error)?;
    let mut temp = NamedTempFile::new_in(dir).map_err(to_error)?;
    temp.write_all(content).map_err(to_error)?;
    temp.as_file().sync_all().map_err(to_error)?;
    temp.persist(&target).map_err(|err| to_error(err.error))?;
    Ok(target)
}

impl Backend for JsBackend {
    fn name(&self) -> &'static str {
        "js"
    }

    fn unit_extension(&self) -> &'static str {
        UNIT_EXTENSION
    }

    fn source_map_extension(&self) -> &'static str {
        UNIT_MAP_EXTENSION
    }

    fn app_extension(&self) -> &'static str {
        APP_EXTENSION
    }

    fn published_files(
        &self,
        app: &LibrarySource,
    ) -> Vec<String> {
        let code = published_name(app);
        vec![format!("{}.map", code), code]
    }

    /// Stale against the newest source of the library: eliminating a private
    /// declaration depends on every part
    fn is_out_of_date(
        &self,
        unit: &CompilationUnit,
        library: &LibraryUnit,
        ctx: &dyn CompilerContext,
    ) -> bool {
        let base = library.newest_source();
        ctx.is_out_of_date(&unit.source, base, UNIT_EXTENSION)
            || ctx.is_out_of_date(&unit.source, base, UNIT_MAP_EXTENSION)
    }

    fn compile_unit(
        &self,
        unit: &CompilationUnit,
        library: &LibraryUnit,
        ctx: &dyn CompilerContext,
        _types: &TypeProvider,
    ) -> Result<(), BackendError> {
        let (code, map) = self.emit(unit, library, ctx.interner());
        let map = serde_json::to_vec_pretty(&map).map_err(|source| BackendError::SourceMap {
            key: artifact_key(&unit.source, "", UNIT_MAP_EXTENSION),
            source,
        })?;

        // primary first: a map never exists without its code
        let base = library.newest_source();
        ctx.write_artifact(&unit.source, "", UNIT_EXTENSION, base, code.as_bytes())?;
        ctx.write_artifact(&unit.source, "", UNIT_MAP_EXTENSION, base, &map)?;
        trace!(unit = %unit.source, bytes = code.len(), "unit compiled");
        Ok(())
    }

    fn package_app(
        &self,
        app: &LibraryUnit,
        libraries: &[Arc<LibraryUnit>],
        ctx: &dyn CompilerContext,
        _types: &TypeProvider,
    ) -> Result<PackagedApp, BackendError> {
        let app_source = app.source().source();
        let base = libraries
            .iter()
            .map(|library| library.newest_source())
            .max_by_key(|source| source.last_modified())
            .unwrap_or_else(|| app.newest_source());
        let app_file = published_name(app.source());
        let mut index = SectionedMap::new(app_file.clone());
        let mut written = 0;
        let mut failure: Option<BackendError> = None;

        let result = ctx.with_writer(app_source, "", APP_EXTENSION, base, &mut |out| {
            index.sections.clear();
            written = 0;
            let mut lines = 0;
            for unit in libraries.iter().flat_map(|library| library.units()) {
                let (code, map) = match self.read_unit(unit, ctx) {
                    Ok(read) => read,
                    Err(err) => {
                        let reason = io::Error::other(err.to_string());
                        failure = Some(err);
                        return Err(reason);
                    }
                };
                out.write_all(&code)?;
                index.push(lines, map);
                lines += line_count(&code);
                written += code.len();
            }
            Ok(())
        });
        if let Err(err) = result {
            return Err(failure.take().unwrap_or_else(|| err.into()));
        }

        let index = serde_json::to_vec_pretty(&index).map_err(|source| BackendError::SourceMap {
            key: artifact_key(app_source, "", APP_MAP_EXTENSION),
            source,
        })?;
        ctx.write_artifact(app_source, "", APP_MAP_EXTENSION, base, &index)?;

        let output_path = match ctx.config().out_dir() {
            Some(dir) => {
                let code = ctx.read_artifact(app_source, "", APP_EXTENSION)?;
                let path = publish(dir, &app_file, &code)?;
                if let Err(err) = publish(dir, &format!("{}.map", app_file), &index) {
                    // no code copy without its map
                    if let Err(remove) = fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %remove, "cannot remove published code");
                    }
                    return Err(err);
                }
                Some(path)
            }
            None => None,
        };

        let key = artifact_key(app_source, "", APP_EXTENSION);
        debug!(app = %key, bytes = written, "application packaged");
        Ok(PackagedApp {
            key,
            output_path,
            bytes: written,
        })
    }
}
