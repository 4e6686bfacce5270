use std::fmt;

use crate::position::Span;

/// One call frame of a runtime traceback: where execution entered the
/// named context.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub span: Span,
    pub context: String,
}

/// Render model shared by every stage of the pipeline. Lexer and parser
/// errors carry an empty trace; runtime errors add one frame per context,
/// innermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub name: &'static str,
    pub message: String,
    pub span: Span,
    pub trace: Vec<Frame>,
}

impl Diagnostic {
    pub fn new(name: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            name,
            message: message.into(),
            span,
            trace: Vec::new(),
        }
    }

    pub fn with_trace(mut self, trace: Vec<Frame>) -> Self {
        self.trace = trace;
        self
    }

    pub fn render(&self, use_color: bool) -> String {
        DiagnosticRenderer { use_color }.render(self)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

pub struct DiagnosticRenderer {
    pub use_color: bool,
}

impl DiagnosticRenderer {
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{}: {}\n",
            self.style_red_bold(diagnostic.name),
            self.style_bold(&diagnostic.message)
        ));

        if diagnostic.trace.is_empty() {
            out.push_str(&format!(
                "File {}, line {}\n",
                diagnostic.span.label(),
                diagnostic.span.start.line + 1
            ));
        } else {
            for frame in &diagnostic.trace {
                out.push_str(&format!(
                    "File {}, line {}, in {}\n",
                    frame.span.label(),
                    frame.span.start.line + 1,
                    frame.context
                ));
            }
        }

        out.push('\n');
        self.render_snippet(&mut out, &diagnostic.span);
        out
    }

    /// Offending source lines with a caret underline. Tabs are flattened
    /// to single spaces so the carets line up with the text.
    fn render_snippet(&self, out: &mut String, span: &Span) {
        let source = &span.start.source;
        for line_num in span.start.line..=span.end.line {
            let Some(text) = source.line(line_num) else {
                break;
            };
            let display: String = text
                .chars()
                .map(|c| if c == '\t' { ' ' } else { c })
                .collect();
            let width = display.chars().count() as u32;

            let col_start = if line_num == span.start.line {
                span.start.column.min(width)
            } else {
                0
            };
            let col_end = if line_num == span.end.line {
                span.end.column.min(width)
            } else {
                width
            };
            let caret_count = (col_end.saturating_sub(col_start)).max(1);

            out.push_str(&display);
            out.push('\n');
            out.push_str(&" ".repeat(col_start as usize));
            out.push_str(&self.style_red(&"^".repeat(caret_count as usize)));
            out.push('\n');
        }
    }

    fn style_red(&self, text: &str) -> String {
        if self.use_color {
            format!("\x1b[31m{}\x1b[0m", text)
        } else {
            text.to_string()
        }
    }

    fn style_red_bold(&self, text: &str) -> String {
        if self.use_color {
            format!("\x1b[1;31m{}\x1b[0m", text)
        } else {
            text.to_string()
        }
    }

    fn style_bold(&self, text: &str) -> String {
        if self.use_color {
            format!("\x1b[1m{}\x1b[0m", text)
        } else {
            text.to_string()
        }
    }
}
