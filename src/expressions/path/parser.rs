//! Text-to-model parsing for path expressions.
//!
//! The grammar is small enough for a hand-rolled scanner: `|` separates
//! alternates, `/` separates parts, and `${...}` delimits an interpolated
//! part whose inner text is itself a complete path expression. Separators
//! inside `${...}` belong to the inner expression.

use super::ast::{AlternateExpression, PathExpression, PathPart};
use crate::errors::{Result, ZptError};

/// Parses path-expression text into its model.
///
/// Parsing is pure: no context, no configuration, no evaluation. Empty (or
/// all-whitespace) text parses to a single alternate with zero parts, which
/// evaluates to the root object itself.
pub fn parse(text: &str) -> Result<PathExpression> {
    parse_inner(text, text)
}

fn parse_inner(text: &str, full: &str) -> Result<PathExpression> {
    if text.trim().is_empty() {
        return Ok(PathExpression {
            alternates: vec![AlternateExpression { parts: Vec::new() }],
        });
    }

    let mut alternates = Vec::new();
    for alternate in split_top_level(text, '|', full)? {
        alternates.push(parse_alternate(alternate, full)?);
    }
    Ok(PathExpression { alternates })
}

fn parse_alternate(text: &str, full: &str) -> Result<AlternateExpression> {
    if text.trim().is_empty() {
        return Err(error(full, "an alternate between `|` separators is empty"));
    }

    let mut parts = Vec::new();
    for part in split_top_level(text.trim(), '/', full)? {
        parts.push(parse_part(part, full)?);
    }
    Ok(AlternateExpression { parts })
}

fn parse_part(text: &str, full: &str) -> Result<PathPart> {
    let part = text.trim();
    if part.is_empty() {
        return Err(error(full, "a path part between `/` separators is empty"));
    }

    if let Some(rest) = part.strip_prefix("${") {
        let Some(inner) = rest.strip_suffix('}') else {
            return Err(error(full, "unterminated `${` interpolation"));
        };
        return Ok(PathPart::Interpolated {
            text: inner.to_owned(),
            expression: parse_inner(inner, full)?,
        });
    }

    if part.contains(['$', '{', '}']) {
        return Err(error(
            full,
            "`${...}` interpolation must span a whole path part",
        ));
    }
    Ok(PathPart::Named(part.to_owned()))
}

/// Splits on a separator at nesting depth zero; `${...}` regions pass
/// through intact (including any separators they contain).
fn split_top_level<'a>(text: &'a str, separator: char, full: &str) -> Result<Vec<&'a str>> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '$' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                depth += 1;
            }
            '}' if depth > 0 => depth -= 1,
            '}' => return Err(error(full, "unmatched `}`")),
            c if c == separator && depth == 0 => {
                pieces.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(error(full, "unterminated `${` interpolation"));
    }
    pieces.push(&text[start..]);
    Ok(pieces)
}

fn error(expression: &str, reason: &str) -> ZptError {
    ZptError::CannotParsePath {
        expression: expression.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn named(name: &str) -> PathPart {
        PathPart::Named(name.to_owned())
    }

    #[test]
    fn parses_alternates_and_parts() {
        let parsed = parse("here/user/name | options/fallback").unwrap();
        assert_eq!(
            parsed,
            PathExpression {
                alternates: vec![
                    AlternateExpression {
                        parts: vec![named("here"), named("user"), named("name")],
                    },
                    AlternateExpression {
                        parts: vec![named("options"), named("fallback")],
                    },
                ],
            }
        );
    }

    #[test]
    fn empty_text_is_one_alternate_with_no_parts() {
        let parsed = parse("  ").unwrap();
        assert_eq!(parsed.alternates.len(), 1);
        assert!(parsed.alternates[0].parts.is_empty());
    }

    #[test]
    fn interpolated_parts_parse_recursively() {
        let parsed = parse("here/${key/name}/value").unwrap();
        let PathPart::Interpolated { text, expression } = &parsed.alternates[0].parts[1] else {
            panic!("expected an interpolated part");
        };
        assert_eq!(text, "key/name");
        assert_eq!(
            expression.alternates[0].parts,
            vec![named("key"), named("name")]
        );
    }

    #[test]
    fn separators_inside_interpolation_are_not_split_points() {
        let parsed = parse("here/${a/b | c}/x").unwrap();
        assert_eq!(parsed.alternates.len(), 1);
        assert_eq!(parsed.alternates[0].parts.len(), 3);
    }

    #[test]
    fn rejects_malformed_expressions() {
        for bad in ["a//b", "a |", "| a", "x/${open", "a$b", "x/}y"] {
            let err = parse(bad).unwrap_err();
            assert!(
                matches!(err, ZptError::CannotParsePath { .. }),
                "{bad} should not parse"
            );
        }
    }
}
