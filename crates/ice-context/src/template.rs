//! A restricted Jinja subset: `{{ dotted.path }}` substitutions and an
//! `{{ x or "literal" }}` fallback form. Strict-undefined: a referenced
//! name with no value is an error, never a silent empty string.

use serde_json::Value;

use crate::error::ContextError;

/// Render every `{{ ... }}` expression in `template` against `vars`.
pub fn render_template(template: &str, vars: &Value) -> Result<String, ContextError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            return Err(ContextError::InvalidTemplate("unterminated {{ ... }}".to_owned()));
        };
        let expr = after_open[..end].trim();
        out.push_str(&render_expr(expr, vars)?);
        rest = &after_open[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn render_expr(expr: &str, vars: &Value) -> Result<String, ContextError> {
    if let Some((lhs, rhs)) = split_or(expr) {
        return match resolve_path(lhs.trim(), vars) {
            Some(value) => Ok(value_to_string(value)),
            None => Ok(unquote(rhs.trim())),
        };
    }

    resolve_path(expr, vars)
        .map(value_to_string)
        .ok_or_else(|| ContextError::UndefinedVariable(expr.to_owned()))
}

/// Split `x or "fallback"` at the first top-level ` or `, ignoring
/// occurrences inside quotes.
fn split_or(expr: &str) -> Option<(&str, &str)> {
    let bytes = expr.as_bytes();
    let mut in_quote = false;
    let mut i = 0;
    while i + 4 <= bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => in_quote = !in_quote,
            b' ' if !in_quote && &expr[i..i + 4] == " or " => {
                return Some((&expr[..i], &expr[i + 4..]));
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"') || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'') {
            return s[1..s.len() - 1].to_owned();
        }
    }
    s.to_owned()
}

fn resolve_path<'a>(path: &str, vars: &'a Value) -> Option<&'a Value> {
    let mut cur = vars;
    for part in path.split('.') {
        if part.is_empty() {
            return None;
        }
        cur = cur.get(part)?;
    }
    Some(cur)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_simple_dotted_path() {
        let vars = json!({"user": {"name": "ada"}});
        assert_eq!(render_template("hello {{ user.name }}", &vars).unwrap(), "hello ada");
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let vars = json!({});
        let err = render_template("{{ missing }}", &vars).unwrap_err();
        assert!(matches!(err, ContextError::UndefinedVariable(_)));
    }

    #[test]
    fn or_fallback_used_when_undefined() {
        let vars = json!({});
        let rendered = render_template(r#"{{ missing or "default" }}"#, &vars).unwrap();
        assert_eq!(rendered, "default");
    }

    #[test]
    fn or_fallback_not_used_when_defined() {
        let vars = json!({"name": "bob"});
        let rendered = render_template(r#"{{ name or "default" }}"#, &vars).unwrap();
        assert_eq!(rendered, "bob");
    }

    #[test]
    fn renders_multiple_substitutions() {
        let vars = json!({"a": 1, "b": 2});
        assert_eq!(render_template("{{ a }}-{{ b }}", &vars).unwrap(), "1-2");
    }
}
