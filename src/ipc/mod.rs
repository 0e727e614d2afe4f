//! S-expression plumbing for the replay script and event output.
//!
//! Messages are Emacs-style plists, one per line:
//! `(:type :frame :t 120 :hands ((x y z ...)))`.  Output uses the same
//! shape: `(:type :event :event :confirmed :label "A" :confidence 91)`.

pub mod script;

pub use script::{ReplaySession, ScriptCommand};

use lexpr::Value;

use crate::pipeline::PipelineEvent;

// ── Responses ──────────────────────────────────────────────

pub fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

pub fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason \"{}\")",
        id,
        escape_string(reason)
    )
}

/// Escape a string for s-expression output.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote a string, or `nil` when absent.
fn quoted(s: Option<&str>) -> String {
    match s {
        Some(s) => format!("\"{}\"", escape_string(s)),
        None => "nil".to_string(),
    }
}

/// Format an event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}

/// Render a pipeline event for output.
pub fn event_sexp(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::LiveUpdate {
            best_label,
            confidence_percent,
        } => {
            let label = quoted(best_label.as_deref());
            let confidence = confidence_percent.to_string();
            format_event(
                event.kind(),
                &[("label", label.as_str()), ("confidence", confidence.as_str())],
            )
        }
        PipelineEvent::HoldStarted {
            label,
            confidence_percent,
        }
        | PipelineEvent::Confirmed {
            label,
            confidence_percent,
        } => {
            let label = quoted(Some(label.as_str()));
            let confidence = confidence_percent.to_string();
            format_event(
                event.kind(),
                &[("label", label.as_str()), ("confidence", confidence.as_str())],
            )
        }
        PipelineEvent::HoldCancelled { label, reason } => {
            let label = quoted(Some(label.as_str()));
            let reason = format!(":{}", reason.as_str());
            format_event(
                event.kind(),
                &[("label", label.as_str()), ("reason", reason.as_str())],
            )
        }
    }
}

// ── Plist access ───────────────────────────────────────────

/// Find the value following `:key` in a plist.
/// Handles both `Value::Keyword("key")` (elisp parser) and
/// `Value::Symbol(":key")` (default parser) forms.
pub fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Extract a keyword value from a plist as text.  Keywords lose their
/// leading colon; booleans and the empty list become `t`/`nil`.
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let val = get_value(value, key)?;
    Some(match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => (if *b { "t" } else { "nil" }).to_string(),
        Value::Nil | Value::Null => "nil".to_string(),
        _ => val.to_string(),
    })
}

pub fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

pub fn get_string(value: &Value, key: &str) -> Option<String> {
    get_keyword(value, key)
}

/// Treats "nil" as false, anything else as true.
pub fn get_bool(value: &Value, key: &str) -> Option<bool> {
    get_keyword(value, key).map(|s| s != "nil")
}

pub fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Top-level elements of a proper list.  `nil` and `()` are empty.
pub fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        items.push(pair.car());
        current = pair.cdr();
    }
    items
}

/// Flatten a possibly nested list/cons structure into a Vec of leaf values.
pub fn flatten_list(value: &Value) -> Vec<&Value> {
    let mut result = Vec::new();
    fn walk<'a>(v: &'a Value, out: &mut Vec<&'a Value>) {
        match v {
            Value::Cons(pair) => {
                walk(pair.car(), out);
                walk(pair.cdr(), out);
            }
            Value::Nil | Value::Null => {} // end of list
            other => out.push(other),
        }
    }
    walk(value, &mut result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::hold::CancelReason;

    // ── responses ───────────────────────────────────────────

    #[test]
    fn test_ok_response_format() {
        let r = ok_response(42);
        assert!(r.contains(":type :response"));
        assert!(r.contains(":id 42"));
        assert!(r.contains(":status :ok"));
    }

    #[test]
    fn test_error_response_escapes_quotes() {
        let r = error_response(1, "label \"A\" unknown");
        assert!(r.contains(":status :error"));
        assert!(r.contains("label \\\"A\\\" unknown"));
    }

    #[test]
    fn test_escape_string_backslash() {
        assert_eq!(escape_string("a\\b"), "a\\\\b");
        assert_eq!(escape_string("plain"), "plain");
    }

    // ── events ──────────────────────────────────────────────

    #[test]
    fn test_live_update_sexp() {
        let e = PipelineEvent::LiveUpdate {
            best_label: Some("A".into()),
            confidence_percent: 82,
        };
        assert_eq!(
            event_sexp(&e),
            "(:type :event :event :live-update :label \"A\" :confidence 82)"
        );
    }

    #[test]
    fn test_live_update_without_label() {
        let e = PipelineEvent::LiveUpdate {
            best_label: None,
            confidence_percent: 0,
        };
        assert!(event_sexp(&e).contains(":label nil"));
    }

    #[test]
    fn test_cancel_sexp_reason() {
        let e = PipelineEvent::HoldCancelled {
            label: "B".into(),
            reason: CancelReason::LostDetection,
        };
        assert_eq!(
            event_sexp(&e),
            "(:type :event :event :hold-cancelled :label \"B\" :reason :lost-detection)"
        );
    }

    #[test]
    fn test_confirmed_sexp() {
        let e = PipelineEvent::Confirmed {
            label: "A".into(),
            confidence_percent: 91,
        };
        assert!(event_sexp(&e).starts_with("(:type :event :event :confirmed"));
        assert!(event_sexp(&e).contains(":confidence 91"));
    }

    // ── plist access ────────────────────────────────────────

    #[test]
    fn test_get_keyword_from_plist() {
        let v = lexpr::from_str("(:type :frame :t 120)").unwrap();
        assert_eq!(get_keyword(&v, "type"), Some("frame".to_string()));
        assert_eq!(get_int(&v, "t"), Some(120));
        assert_eq!(get_float(&v, "t"), Some(120.0));
    }

    #[test]
    fn test_get_keyword_string_value() {
        let v = lexpr::from_str("(:type :expect :label \"thumbs up\")").unwrap();
        assert_eq!(get_string(&v, "label"), Some("thumbs up".to_string()));
    }

    #[test]
    fn test_get_keyword_missing_key() {
        let v = lexpr::from_str("(:type :stop)").unwrap();
        assert_eq!(get_keyword(&v, "label"), None);
    }

    #[test]
    fn test_get_keyword_key_without_value() {
        let v = lexpr::from_str("(:type :frame :t)").unwrap();
        assert_eq!(get_keyword(&v, "t"), None);
    }

    #[test]
    fn test_get_bool_nil() {
        let v = lexpr::from_str("(:enabled nil :mirror t)").unwrap();
        assert_eq!(get_bool(&v, "enabled"), Some(false));
        assert_eq!(get_bool(&v, "mirror"), Some(true));
    }

    #[test]
    fn test_get_value_nested_list() {
        let v = lexpr::from_str("(:type :frame :hands ((1 2 3) (4 5 6)))").unwrap();
        let hands = get_value(&v, "hands").unwrap();
        let items = list_items(hands);
        assert_eq!(items.len(), 2);
        assert_eq!(flatten_list(items[1]).len(), 3);
    }

    #[test]
    fn test_list_items_empty() {
        let v = lexpr::from_str("()").unwrap();
        assert!(list_items(&v).is_empty());
    }

    #[test]
    fn test_flatten_nested() {
        let v = lexpr::from_str("((1 2) (3 (4 5)))").unwrap();
        assert_eq!(flatten_list(&v).len(), 5);
    }
}
