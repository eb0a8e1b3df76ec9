use super::{Diagnostic, Severity};

pub fn render(d: &Diagnostic) -> String {
    let severity = match d.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };

    let mut obj = serde_json::json!({
        "severity": severity,
        "message": d.message,
        "notes": d.notes,
    });

    if let Some(code) = d.code {
        obj["code"] = serde_json::Value::String(code.to_string());
    }

    if let Some(loc) = d.location {
        obj["instruction"] = serde_json::Value::from(loc.instruction);
        if loc.line > 0 {
            obj["line"] = serde_json::Value::from(loc.line);
        }
    }

    if let Some(s) = &d.suggestion {
        obj["suggestion"] = serde_json::Value::String(s.clone());
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_json(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn render_basic_error() {
        let d = Diagnostic::error("stack overflow");
        let v = parse_json(&render(&d));
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "stack overflow");
        assert!(v["notes"].as_array().unwrap().is_empty());
        assert!(v.get("code").is_none());
        assert!(v.get("instruction").is_none());
    }

    #[test]
    fn render_with_code_and_location() {
        let d = Diagnostic::error("key not found: k").with_code("AVM-R008").at(4, 9);
        let v = parse_json(&render(&d));
        assert_eq!(v["code"], "AVM-R008");
        assert_eq!(v["instruction"], 4);
        assert_eq!(v["line"], 9);
    }

    #[test]
    fn render_unknown_line_is_omitted() {
        let d = Diagnostic::error("bad").at(2, 0);
        let v = parse_json(&render(&d));
        assert_eq!(v["instruction"], 2);
        assert!(v.get("line").is_none());
    }

    #[test]
    fn render_with_suggestion() {
        let d = Diagnostic::error("bad").with_suggestion("try this instead");
        let v = parse_json(&render(&d));
        assert_eq!(v["suggestion"], "try this instead");
    }

    #[test]
    fn render_with_notes() {
        let d = Diagnostic::error("bad").with_note("first").with_note("second");
        let v = parse_json(&render(&d));
        let notes = v["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0], "first");
    }

    #[test]
    fn render_warning_severity() {
        let v = parse_json(&render(&Diagnostic::warning("careful")));
        assert_eq!(v["severity"], "warning");
    }

    #[test]
    fn render_escapes_message() {
        let d = Diagnostic::error("key not found: \"quoted\"\nnext");
        let v = parse_json(&render(&d));
        assert_eq!(v["message"], "key not found: \"quoted\"\nnext");
    }
}
