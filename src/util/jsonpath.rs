//! Minimal JSONPath walker
//!
//! Supports:
//! - $.a.b.c (dot notation)
//! - $.a[0].b (array index)
//! - a.b.0 (numeric segment as index, no $ prefix)
//!
//! Does NOT support filters, wildcards or slices. Unsupported syntax parses
//! to `None` rather than an error: callers degrade to the raw value.

use serde_json::Value;

/// A parsed path segment
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Object field access: .field
    Field(String),
    /// Array index access: [0]
    Index(usize),
}

/// Parse a path string into segments
///
/// Examples:
/// - "$.price.currency" → [Field("price"), Field("currency")]
/// - "items[0].name" → [Field("items"), Index(0), Field("name")]
pub fn parse(path: &str) -> Option<Vec<Segment>> {
    let path = path.trim();
    let path = if let Some(rest) = path.strip_prefix("$.") {
        rest
    } else if path == "$" {
        return Some(vec![]);
    } else {
        path
    };

    if path.is_empty() {
        return Some(vec![]);
    }

    let mut segments = Vec::new();

    for part in path.split('.') {
        if part.is_empty() {
            return None;
        }

        if let Some(bracket_pos) = part.find('[') {
            let field = &part[..bracket_pos];
            if !field.is_empty() {
                segments.push(Segment::Field(field.to_string()));
            }

            // One or more [n] suffixes: a[0][1]
            let mut rest = &part[bracket_pos..];
            while !rest.is_empty() {
                let inner = rest.strip_prefix('[')?;
                let close = inner.find(']')?;
                let index: usize = inner[..close].trim().parse().ok()?;
                segments.push(Segment::Index(index));
                rest = &inner[close + 1..];
            }
        } else if let Ok(index) = part.parse::<usize>() {
            segments.push(Segment::Index(index));
        } else {
            segments.push(Segment::Field(part.to_string()));
        }
    }

    Some(segments)
}

/// Walk segments by reference
pub fn apply<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;

    for segment in segments {
        current = match segment {
            Segment::Field(name) => current.get(name.as_str())?,
            Segment::Index(idx) => current.get(*idx)?,
        };
    }

    Some(current)
}

/// Parse and apply in one step
pub fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse(path)?;
    apply(value, &segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_simple_path() {
        assert_eq!(
            parse("$.a.b").unwrap(),
            vec![Segment::Field("a".into()), Segment::Field("b".into())]
        );
    }

    #[test]
    fn parse_indices() {
        assert_eq!(
            parse("items[0].name").unwrap(),
            vec![
                Segment::Field("items".into()),
                Segment::Index(0),
                Segment::Field("name".into())
            ]
        );
        assert_eq!(
            parse("m[1][2]").unwrap(),
            vec![Segment::Field("m".into()), Segment::Index(1), Segment::Index(2)]
        );
        assert_eq!(parse("a.3").unwrap()[1], Segment::Index(3));
    }

    #[test]
    fn parse_root() {
        assert!(parse("$").unwrap().is_empty());
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_bad_syntax() {
        assert!(parse("a..b").is_none());
        assert!(parse("a[x]").is_none());
        assert!(parse("a[0").is_none());
    }

    #[test]
    fn resolve_nested() {
        let v = json!({"a": {"b": [10, {"c": "deep"}]}});
        assert_eq!(resolve(&v, "$.a.b[1].c"), Some(&json!("deep")));
        assert_eq!(resolve(&v, "a.b.0"), Some(&json!(10)));
        assert_eq!(resolve(&v, "$.a.missing"), None);
        assert_eq!(resolve(&v, "$"), Some(&v));
    }
}
