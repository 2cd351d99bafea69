// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dotted paths addressing nested map keys. A literal dot inside a key is
//! written `\.`; any other backslash is kept as is.

use std::borrow::Cow;

use thiserror::Error;

use crate::value::Kind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid parameter path for {op}: {path}")]
    Malformed { op: &'static str, path: String },

    #[error("invalid parameter type for {op}: {kind}")]
    InvalidType { op: &'static str, kind: Kind },
}

/// One resolved level of a path: the key to match at this level and the
/// unparsed remainder, if any.
#[derive(Debug, PartialEq, Eq)]
pub struct Segment<'a> {
    pub head: Cow<'a, str>,
    pub tail: Option<&'a str>,
}

/// Returns the byte offset of the first dot that is not directly preceded by
/// a backslash, and whether an escaped dot was skipped on the way.
fn separator(path: &str) -> (Option<usize>, bool) {
    let bytes = path.as_bytes();
    let mut escaped = false;
    for (i, b) in bytes.iter().enumerate() {
        if *b != b'.' {
            continue;
        }
        if i == 0 || bytes[i - 1] != b'\\' {
            return (Some(i), escaped);
        }
        escaped = true;
    }
    (None, escaped)
}

fn unescape(s: &str, escaped: bool) -> Cow<'_, str> {
    if escaped {
        Cow::Owned(s.replace("\\.", "."))
    } else {
        Cow::Borrowed(s)
    }
}

/// Splits off the first segment of `path`. The remainder is parsed only when
/// a traversal reaches the next level.
pub fn split<'a>(op: &'static str, path: &'a str) -> Result<Segment<'a>, PathError> {
    match separator(path) {
        (Some(idx), _) if idx == 0 || idx == path.len() - 1 => Err(PathError::Malformed {
            op,
            path: path.to_string(),
        }),
        (Some(idx), escaped) => Ok(Segment {
            head: unescape(&path[..idx], escaped),
            tail: Some(&path[idx + 1..]),
        }),
        (None, escaped) => Ok(Segment {
            head: unescape(path, escaped),
            tail: None,
        }),
    }
}

/// Parses all segments of a path eagerly.
pub fn parse(op: &'static str, path: &str) -> Result<Vec<String>, PathError> {
    let mut segments = vec![];
    let mut rest = path;
    loop {
        let seg = match split(op, rest) {
            Ok(seg) => seg,
            Err(_) => {
                return Err(PathError::Malformed {
                    op,
                    path: path.to_string(),
                })
            }
        };
        segments.push(seg.head.into_owned());
        match seg.tail {
            Some(tail) => rest = tail,
            None => return Ok(segments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment() {
        let seg = split("collate", "a").unwrap();
        assert_eq!(seg.head, "a");
        assert_eq!(seg.tail, None);
    }

    #[test]
    fn head_and_lazy_tail() {
        let seg = split("collate", "a.b.c").unwrap();
        assert_eq!(seg.head, "a");
        assert_eq!(seg.tail, Some("b.c"));
    }

    #[test]
    fn escaped_dots_stay_in_the_segment() {
        let seg = split("drop", r"dotted\.path.b").unwrap();
        assert_eq!(seg.head, "dotted.path");
        assert_eq!(seg.tail, Some("b"));

        assert_eq!(
            parse("drop", r"a\.b\.c.d").unwrap(),
            vec!["a.b.c".to_string(), "d".to_string()]
        );
        assert_eq!(parse("drop", r"a.b\.c").unwrap(), vec!["a", "b.c"]);
    }

    #[test]
    fn tail_is_not_unescaped_twice() {
        let seg = split("drop", r"a.b\\.c").unwrap();
        assert_eq!(seg.tail, Some(r"b\\.c"));
        let next = split("drop", seg.tail.unwrap()).unwrap();
        assert_eq!(next.head, r"b\.c");
        assert_eq!(next.tail, None);
    }

    #[test]
    fn empty_segments_are_rejected() {
        for path in [".a", "a.", "."] {
            let err = split("drop", path).unwrap_err();
            assert_eq!(err.to_string(), format!("invalid parameter path for drop: {path}"));
        }
        // The doubled dot is only found when the second level is parsed.
        assert!(split("drop", "a..b").is_ok());
        assert!(parse("drop", "a..b").is_err());
    }

    #[test]
    fn backslash_without_dot_is_literal() {
        assert_eq!(parse("collate", r"a\b.c").unwrap(), vec![r"a\b", "c"]);
    }
}
