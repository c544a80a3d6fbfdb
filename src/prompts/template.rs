//! `{name}` placeholder substitution.

use crate::{MimirError, Result};

enum Piece<'a> {
    Text(&'a str),
    Var(&'a str),
}

fn parse(template: &str) -> Result<Vec<Piece<'_>>> {
    let mut pieces = Vec::new();
    let mut rest = template;
    while !rest.is_empty() {
        let Some(pos) = rest.find(['{', '}']) else {
            pieces.push(Piece::Text(rest));
            break;
        };
        if pos > 0 {
            pieces.push(Piece::Text(&rest[..pos]));
        }
        rest = &rest[pos..];
        if let Some(tail) = rest.strip_prefix("{{") {
            pieces.push(Piece::Text("{"));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("}}") {
            pieces.push(Piece::Text("}"));
            rest = tail;
        } else if rest.starts_with('}') {
            return Err(MimirError::InvalidInput(
                "unmatched '}' in template (use '}}' for a literal brace)".into(),
            ));
        } else {
            let end = rest.find('}').ok_or_else(|| {
                MimirError::InvalidInput("unterminated placeholder in template".into())
            })?;
            let name = &rest[1..end];
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(MimirError::InvalidInput(format!(
                    "invalid placeholder '{{{name}}}' (use '{{{{' for a literal brace)"
                )));
            }
            pieces.push(Piece::Var(name));
            rest = &rest[end + 1..];
        }
    }
    Ok(pieces)
}

pub(super) fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    for piece in parse(template)? {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Var(name) => {
                let value = vars
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or_else(|| {
                        MimirError::InvalidInput(format!("missing value for placeholder '{name}'"))
                    })?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

pub(super) fn placeholders(template: &str) -> Vec<String> {
    let Ok(pieces) = parse(template) else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for piece in pieces {
        if let Piece::Var(name) = piece {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_and_escapes() {
        let out = render(
            "Translate {word} to {lang}. Reply as {{\"uid\": ...}}",
            &[("word", "kot"), ("lang", "English")],
        )
        .unwrap();
        assert_eq!(out, "Translate kot to English. Reply as {\"uid\": ...}");
    }

    #[test]
    fn values_are_not_reparsed() {
        let out = render("{items_json}", &[("items_json", "[{\"uid\": \"a\"}]")]).unwrap();
        assert_eq!(out, "[{\"uid\": \"a\"}]");
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = render("{a} {b}", &[("a", "1")]).unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(render("{unterminated", &[]).is_err());
        assert!(render("stray }", &[]).is_err());
        assert!(render("{not valid}", &[]).is_err());
    }

    #[test]
    fn placeholder_names_deduplicated_in_order() {
        assert_eq!(placeholders("{b} {a} {b} {{c}}"), vec!["b", "a"]);
    }
}
