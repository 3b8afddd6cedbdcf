//! Human-readable diagnostic rendering with source context.

use colored::Colorize;

use crate::errors::{Diagnostic, Severity};

/// Renders diagnostics against the source text they refer to.
pub struct DiagnosticRenderer<'a> {
    source: &'a str,
    filename: Option<&'a str>,
}

struct SourceContext {
    line: usize,
    column: usize,
    line_text: String,
    span_length: usize,
}

impl<'a> DiagnosticRenderer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: &'a str) -> Self {
        self.filename = Some(filename);
        self
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut output = String::new();

        let header = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
        };
        output.push_str(&format!(
            "{}{} {}\n",
            header,
            ":".bold(),
            diagnostic.error.to_string().bold()
        ));

        if let Some(context) = self.get_source_context(diagnostic.span.start, diagnostic.span.end) {
            let location = if let Some(filename) = self.filename {
                format!("{}:{}:{}", filename, context.line, context.column)
            } else {
                format!("line {}:{}", context.line, context.column)
            };
            output.push_str(&format!("  {} {}\n", "-->".cyan().bold(), location));
            output.push_str(&format!("   {}\n", "|".cyan().bold()));
            output.push_str(&format!(
                " {} {} {}\n",
                format!("{:>3}", context.line).cyan().bold(),
                "|".cyan().bold(),
                context.line_text
            ));
            output.push_str(&format!(
                "   {} {}{}\n",
                "|".cyan().bold(),
                " ".repeat(context.column.saturating_sub(1)),
                "^".repeat(context.span_length.max(1)).red().bold(),
            ));
        }

        output
    }

    fn get_source_context(&self, start: usize, end: usize) -> Option<SourceContext> {
        if start >= self.source.len() && start != 0 {
            return None;
        }

        let mut line = 1;
        let mut line_start = 0;
        for (i, ch) in self.source.char_indices() {
            if i >= start {
                break;
            }
            if ch == '\n' {
                line += 1;
                line_start = i + 1;
            }
        }

        let line_end = self.source[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(self.source.len());

        Some(SourceContext {
            line,
            column: start - line_start + 1,
            line_text: self.source[line_start..line_end].to_string(),
            span_length: end.saturating_sub(start).min(line_end.saturating_sub(start)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CheckError;
    use sable_ast::Span;

    #[test]
    fn renders_with_context() {
        let source = "x := 1\ny := x + true\n";
        let renderer = DiagnosticRenderer::new(source).with_filename("demo.sb");
        let diag = Diagnostic {
            severity: Severity::Error,
            span: Span::new(11, 19),
            error: CheckError::BadBinaryOp {
                op: "+",
                left: "i32".into(),
                right: "bool".into(),
            },
        };

        let rendered = renderer.render(&diag);
        assert!(rendered.contains("demo.sb:2:5"));
        assert!(rendered.contains("y := x + true"));
    }
}
