use super::{Diagnostic, Severity};

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn bold(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold_red(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;31m{s}\x1b[0m") } else { s.to_string() }
    }

    fn yellow(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;33m{s}\x1b[0m") } else { s.to_string() }
    }

    fn cyan(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[36m{s}\x1b[0m") } else { s.to_string() }
    }

    fn dim(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[2m{s}\x1b[0m") } else { s.to_string() }
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // "error[AVM-R003]: message"
        let severity = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let head = match d.code {
            Some(code) => format!("{severity}[{code}]"),
            None => severity.to_string(),
        };
        let head = match d.severity {
            Severity::Error => self.bold_red(&head),
            Severity::Warning => self.yellow(&head),
        };
        out.push_str(&format!("{}: {}\n", head, self.bold(&d.message)));

        // "  --> instruction 4, line 12"
        if let Some(loc) = d.location {
            let place = if loc.line > 0 {
                format!("instruction {}, line {}", loc.instruction, loc.line)
            } else {
                format!("instruction {}", loc.instruction)
            };
            out.push_str(&format!("  {} {}\n", self.cyan("-->"), place));
        }

        for note in &d.notes {
            out.push_str(&format!("  {} note: {}\n", self.dim("="), note));
        }

        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  {} suggestion: {}\n", self.dim("="), suggestion));
        }

        if let Some(code) = d.code {
            out.push_str(&format!("  {} run `avm --explain {code}` for details\n", self.dim("=")));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_diag() -> Diagnostic {
        Diagnostic::error("type mismatch in equality: string vs number")
            .with_code("AVM-R003")
            .at(5, 12)
            .with_note("operands were 'x' and 0")
            .with_suggestion("compare values of the same type")
    }

    #[test]
    fn render_contains_error_label_and_code() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag());
        assert!(out.starts_with("error[AVM-R003]: type mismatch"), "bad header in:\n{out}");
    }

    #[test]
    fn render_contains_location() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag());
        assert!(out.contains("--> instruction 5, line 12"), "missing location in:\n{out}");
    }

    #[test]
    fn render_omits_unknown_line() {
        let r = AnsiRenderer { use_color: false };
        let d = Diagnostic::error("bad").at(3, 0);
        let out = r.render(&d);
        assert!(out.contains("--> instruction 3\n"), "unexpected location in:\n{out}");
        assert!(!out.contains("line"));
    }

    #[test]
    fn render_contains_note_and_suggestion() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag());
        assert!(out.contains("note: operands were"), "missing note in:\n{out}");
        assert!(out.contains("suggestion: compare values"), "missing suggestion in:\n{out}");
        assert!(out.contains("avm --explain AVM-R003"), "missing explain hint in:\n{out}");
    }

    #[test]
    fn render_without_location_still_works() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&Diagnostic::error("something bad"));
        assert_eq!(out, "error: something bad\n");
    }

    #[test]
    fn render_warning() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&Diagnostic::warning("careful"));
        assert!(out.starts_with("warning: careful"));
    }

    #[test]
    fn render_with_color_contains_ansi_codes() {
        let r = AnsiRenderer { use_color: true };
        let out = r.render(&make_diag());
        assert!(out.contains("\x1b["), "expected ANSI codes when use_color=true");
    }

    #[test]
    fn render_without_color_no_ansi_codes() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag());
        assert!(!out.contains("\x1b["), "unexpected ANSI codes when use_color=false");
    }
}
