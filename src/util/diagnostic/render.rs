//! 诊断渲染器
//!
//! Plain-text rendering used by the console listener:
//!
//! ```text
//! warning[E0503]: Cannot resolve 'undefinedFn'
//!  --> file:///work/app.dart:4:3
//! ```

use owo_colors::OwoColorize;

use super::{DiagnosticEvent, Severity};

/// Text renderer configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Whether to colour the header
    pub use_colors: bool,
    /// Whether to print the ` --> location` line
    pub show_location: bool,
    /// Whether to print the subsystem after the code
    pub show_subsystem: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_location: true,
            show_subsystem: false,
        }
    }
}

/// Renders diagnostics as text
#[derive(Debug, Clone, Default)]
pub struct TextRenderer {
    config: RenderConfig,
}

impl TextRenderer {
    /// Create a renderer with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a renderer with a custom configuration
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Renderer with colours switched off
    pub fn plain() -> Self {
        Self::with_config(RenderConfig {
            use_colors: false,
            ..RenderConfig::default()
        })
    }

    /// Render one diagnostic, newline-terminated
    pub fn render(
        &self,
        event: &DiagnosticEvent,
    ) -> String {
        let mut output = self.render_header(event);
        if self.config.show_location {
            if let Some(location) = &event.location {
                output.push_str(&format!(" --> {}\n", location));
            }
        }
        output
    }

    fn render_header(
        &self,
        event: &DiagnosticEvent,
    ) -> String {
        let label = event.severity.to_string();
        let label = if self.config.use_colors {
            match event.severity {
                Severity::Error => label.red().bold().to_string(),
                Severity::Warning => label.yellow().bold().to_string(),
                Severity::Info => label.cyan().to_string(),
            }
        } else {
            label
        };

        let code = if self.config.use_colors {
            format!("[{}]", event.code.code).bold().to_string()
        } else {
            format!("[{}]", event.code.code)
        };

        if self.config.show_subsystem {
            format!("{}{} ({}): {}\n", label, code, event.subsystem, event.message)
        } else {
            format!("{}{}: {}\n", label, code, event.message)
        }
    }
}
