//! Dotted/indexed path parsing.
//!
//! A path like `a.b[2].c` navigates nested structures and arrays. The
//! workspace additionally uses [`split_leading_name`] to separate a variable
//! name from the field path that follows it.

use crate::error::ValueError;

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Structure field access by name.
    Field(String),
    /// Array element access by index.
    Index(usize),
}

/// Parse a full path string into segments.
///
/// The empty string parses to no segments (the value itself). A leading `[`
/// is accepted so that the remainder of [`split_leading_name`] parses as-is.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, ValueError> {
    let mut segments = Vec::new();
    let mut rest = path;
    let malformed = || ValueError::MalformedPath(path.to_string());
    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped.find(']').ok_or_else(malformed)?;
            let index: usize = stripped[..close].parse().map_err(|_| malformed())?;
            segments.push(PathSegment::Index(index));
            rest = &stripped[close + 1..];
            // An index may be followed by a dot, another index, or the end.
            if let Some(after_dot) = rest.strip_prefix('.') {
                if after_dot.is_empty() {
                    return Err(malformed());
                }
                rest = after_dot;
            }
        } else {
            let end = rest
                .find(['.', '['])
                .unwrap_or(rest.len());
            if end == 0 {
                return Err(malformed());
            }
            segments.push(PathSegment::Field(rest[..end].to_string()));
            match rest.as_bytes().get(end) {
                None => rest = "",
                Some(b'[') => rest = &rest[end..],
                Some(_) => {
                    rest = &rest[end + 1..];
                    if rest.is_empty() {
                        return Err(malformed());
                    }
                }
            }
        }
    }
    Ok(segments)
}

/// Split `name[.field][index]...` into the leading name and the remaining
/// field path. An index bracket stays part of the remainder.
pub fn split_leading_name(full: &str) -> (&str, &str) {
    let dot = full.find('.');
    let bracket = full.find('[');
    match (dot, bracket) {
        (None, None) => (full, ""),
        (Some(d), None) => (&full[..d], &full[d + 1..]),
        (None, Some(b)) => (&full[..b], &full[b..]),
        (Some(d), Some(b)) if d < b => (&full[..d], &full[d + 1..]),
        (Some(_), Some(b)) => (&full[..b], &full[b..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fields_and_indices() {
        let segments = parse_path("a.b[2].c").unwrap();
        assert_eq!(
            segments,
            vec![
                PathSegment::Field("a".into()),
                PathSegment::Field("b".into()),
                PathSegment::Index(2),
                PathSegment::Field("c".into()),
            ]
        );
    }

    #[test]
    fn empty_path_is_no_segments() {
        assert!(parse_path("").unwrap().is_empty());
    }

    #[test]
    fn leading_index_is_accepted() {
        let segments = parse_path("[0].x").unwrap();
        assert_eq!(
            segments,
            vec![PathSegment::Index(0), PathSegment::Field("x".into())]
        );
    }

    #[test]
    fn rejects_malformed() {
        assert!(parse_path(".a").is_err());
        assert!(parse_path("a.").is_err());
        assert!(parse_path("a[b]").is_err());
        assert!(parse_path("a[1").is_err());
    }

    #[test]
    fn splits_variable_name() {
        assert_eq!(split_leading_name("var"), ("var", ""));
        assert_eq!(split_leading_name("var.a.b"), ("var", "a.b"));
        assert_eq!(split_leading_name("var[3]"), ("var", "[3]"));
        assert_eq!(split_leading_name("var[3].a"), ("var", "[3].a"));
        assert_eq!(split_leading_name("var.a[3]"), ("var", "a[3]"));
    }
}
