// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins::utils::{
    ensure_args_count, ensure_bytes, ensure_int, ensure_string, ensure_string_collection,
};
use crate::builtins::{builtin, Overload};
use crate::env::{Library, Registry};
use crate::lexer::Span;
use crate::value::{Kind, Value};

use anyhow::Result;

/// String methods. Search results are byte offsets; substring bounds are
/// counted in code points.
pub struct Strings;

impl Library for Strings {
    fn name(&self) -> &'static str {
        "strings"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        use Kind::*;

        let methods: &[(&str, &str, &[Kind], crate::builtins::BuiltinFcn)] = &[
            ("compare", "string_compare_string_int", &[String, String], builtin(compare)),
            (
                "contains_substr",
                "string_contains_substr_string_bool",
                &[String, String],
                builtin(contains_substr),
            ),
            (
                "contains_any",
                "string_contains_any_string_bool",
                &[String, String],
                builtin(contains_any),
            ),
            ("count", "string_count_string_int", &[String, String], builtin(count)),
            (
                "equal_fold",
                "string_equal_fold_string_bool",
                &[String, String],
                builtin(equal_fold),
            ),
            ("fields", "string_fields_list_string", &[String], builtin(fields)),
            (
                "has_prefix",
                "string_has_prefix_string_bool",
                &[String, String],
                builtin(has_prefix),
            ),
            (
                "has_suffix",
                "string_has_suffix_string_bool",
                &[String, String],
                builtin(has_suffix),
            ),
            ("index", "string_index_string_int", &[String, String], builtin(index)),
            (
                "index_any",
                "string_index_any_string_int",
                &[String, String],
                builtin(index_any),
            ),
            (
                "last_index",
                "string_last_index_string_int",
                &[String, String],
                builtin(last_index),
            ),
            (
                "last_index_any",
                "string_last_index_any_string_int",
                &[String, String],
                builtin(last_index_any),
            ),
            ("repeat", "string_repeat_int_string", &[String, Int], builtin(repeat)),
            (
                "replace",
                "string_replace_string_string_int_string",
                &[String, String, String, Int],
                builtin(replace),
            ),
            (
                "replace_all",
                "string_replace_all_string_string_string",
                &[String, String, String],
                builtin(replace_all),
            ),
            ("split", "string_split_string_list_string", &[String, String], builtin(split)),
            (
                "split_n",
                "string_split_n_string_int_list_string",
                &[String, String, Int],
                builtin(split_n),
            ),
            (
                "split_after",
                "string_split_after_string_list_string",
                &[String, String],
                builtin(split_after),
            ),
            (
                "split_after_n",
                "string_split_after_n_string_int_list_string",
                &[String, String, Int],
                builtin(split_after_n),
            ),
            (
                "substring",
                "string_substring_int_int_string",
                &[String, Int, Int],
                builtin(substring),
            ),
            ("to_lower", "string_to_lower_string", &[String], builtin(to_lower)),
            ("to_upper", "string_to_upper_string", &[String], builtin(to_upper)),
            ("to_title", "string_to_title_string", &[String], builtin(to_title)),
            ("trim", "string_trim_string_string", &[String, String], builtin(trim)),
            (
                "trim_left",
                "string_trim_left_string_string",
                &[String, String],
                builtin(trim_left),
            ),
            (
                "trim_right",
                "string_trim_right_string_string",
                &[String, String],
                builtin(trim_right),
            ),
            (
                "trim_prefix",
                "string_trim_prefix_string_string",
                &[String, String],
                builtin(trim_prefix),
            ),
            (
                "trim_suffix",
                "string_trim_suffix_string_string",
                &[String, String],
                builtin(trim_suffix),
            ),
            ("trim_space", "string_trim_space_string", &[String], builtin(trim_space)),
            ("valid_utf8", "bytes_valid_utf8_bool", &[Bytes], builtin(valid_utf8)),
            (
                "to_valid_utf8",
                "bytes_to_valid_utf8_string_string",
                &[Bytes, String],
                builtin(to_valid_utf8),
            ),
        ];
        for (name, id, params, fcn) in methods {
            r.function(name, vec![Overload::receiver(id, params)], fcn.clone())?;
        }

        r.function(
            "join",
            vec![Overload::both("list_string_join_string_string", &[List, String])],
            builtin(join),
        )?;
        Ok(())
    }
}

fn offset(byte_idx: Option<usize>) -> Value {
    match byte_idx {
        Some(i) => Value::from(i),
        None => Value::Int(-1),
    }
}

fn compare(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "compare";
    ensure_args_count(span, name, params, args, 2)?;
    let a = ensure_string(name, &params[0], &args[0])?;
    let b = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::Int(a.cmp(&b) as i64))
}

fn contains_substr(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "contains_substr";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let substr = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::Bool(s.contains(substr.as_ref())))
}

fn contains_any(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "contains_any";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let chars = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::Bool(s.chars().any(|c| chars.contains(c))))
}

fn count(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "count";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let substr = ensure_string(name, &params[1], &args[1])?;
    Ok(match substr.is_empty() {
        true => Value::from(s.chars().count() + 1),
        false => Value::from(s.matches(substr.as_ref()).count()),
    })
}

fn equal_fold(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "equal_fold";
    ensure_args_count(span, name, params, args, 2)?;
    let a = ensure_string(name, &params[0], &args[0])?;
    let b = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::Bool(a.to_lowercase() == b.to_lowercase()))
}

fn fields(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "fields";
    ensure_args_count(span, name, params, args, 1)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    Ok(Value::from(
        s.split_whitespace().map(Value::from).collect::<Vec<_>>(),
    ))
}

fn has_prefix(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "has_prefix";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let prefix = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::Bool(s.starts_with(prefix.as_ref())))
}

fn has_suffix(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "has_suffix";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let suffix = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::Bool(s.ends_with(suffix.as_ref())))
}

fn index(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "index";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let substr = ensure_string(name, &params[1], &args[1])?;
    Ok(offset(s.find(substr.as_ref())))
}

fn index_any(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "index_any";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let chars = ensure_string(name, &params[1], &args[1])?;
    Ok(offset(s.find(|c: char| chars.contains(c))))
}

fn last_index(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "last_index";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let substr = ensure_string(name, &params[1], &args[1])?;
    Ok(offset(s.rfind(substr.as_ref())))
}

fn last_index_any(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "last_index_any";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let chars = ensure_string(name, &params[1], &args[1])?;
    Ok(offset(s.rfind(|c: char| chars.contains(c))))
}

fn join(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "join";
    ensure_args_count(span, name, params, args, 2)?;
    let elems = ensure_string_collection(name, &params[0], &args[0])?;
    let sep = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::from(elems.join(sep.as_ref())))
}

fn repeat(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "repeat";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let n = ensure_int(name, &params[1], &args[1])?;
    Ok(match usize::try_from(n) {
        Ok(n) => Value::from(s.repeat(n)),
        Err(_) => Value::error(format!("repeat: negative count {n}")),
    })
}

fn replace(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "replace";
    ensure_args_count(span, name, params, args, 4)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let old = ensure_string(name, &params[1], &args[1])?;
    let new = ensure_string(name, &params[2], &args[2])?;
    let n = ensure_int(name, &params[3], &args[3])?;
    Ok(Value::from(match usize::try_from(n) {
        Ok(n) => s.replacen(old.as_ref(), &new, n),
        Err(_) => s.replace(old.as_ref(), &new),
    }))
}

fn replace_all(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "replace_all";
    ensure_args_count(span, name, params, args, 3)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let old = ensure_string(name, &params[1], &args[1])?;
    let new = ensure_string(name, &params[2], &args[2])?;
    Ok(Value::from(s.replace(old.as_ref(), &new)))
}

// An empty separator splits after each code point. At most n parts are
// produced when n is non-negative, the last holding the unsplit remainder.
fn split_parts<'a>(s: &'a str, sep: &str, n: Option<usize>) -> Vec<&'a str> {
    let limit = n.unwrap_or(usize::MAX);
    if limit == 0 {
        return vec![];
    }
    if !sep.is_empty() {
        return s.splitn(limit, sep).collect();
    }
    let mut parts = vec![];
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        if parts.len() + 1 == limit {
            break;
        }
        let (head, tail) = rest.split_at(c.len_utf8());
        parts.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}

// Like split_parts, but each part keeps its trailing separator.
fn split_after_parts<'a>(s: &'a str, sep: &str, n: Option<usize>) -> Vec<&'a str> {
    if sep.is_empty() {
        return split_parts(s, sep, n);
    }
    let limit = n.unwrap_or(usize::MAX);
    if limit == 0 {
        return vec![];
    }
    let mut parts = vec![];
    let mut start = 0;
    for (i, m) in s.match_indices(sep) {
        if parts.len() + 1 == limit {
            break;
        }
        let end = i + m.len();
        parts.push(&s[start..end]);
        start = end;
    }
    parts.push(&s[start..]);
    parts
}

fn string_list(parts: Vec<&str>) -> Value {
    Value::from(parts.into_iter().map(Value::from).collect::<Vec<_>>())
}

fn split(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "split";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let sep = ensure_string(name, &params[1], &args[1])?;
    Ok(string_list(split_parts(&s, &sep, None)))
}

fn split_n(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "split_n";
    ensure_args_count(span, name, params, args, 3)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let sep = ensure_string(name, &params[1], &args[1])?;
    let n = ensure_int(name, &params[2], &args[2])?;
    Ok(string_list(split_parts(&s, &sep, usize::try_from(n).ok())))
}

fn split_after(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "split_after";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let sep = ensure_string(name, &params[1], &args[1])?;
    Ok(string_list(split_after_parts(&s, &sep, None)))
}

fn split_after_n(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "split_after_n";
    ensure_args_count(span, name, params, args, 3)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let sep = ensure_string(name, &params[1], &args[1])?;
    let n = ensure_int(name, &params[2], &args[2])?;
    Ok(string_list(split_after_parts(&s, &sep, usize::try_from(n).ok())))
}

fn substring(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "substring";
    ensure_args_count(span, name, params, args, 3)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let start = ensure_int(name, &params[1], &args[1])?;
    let end = ensure_int(name, &params[2], &args[2])?;

    if start < 0 {
        return Ok(Value::error(format!(
            "substring: start out of range: {start} < 0"
        )));
    }
    if end < start {
        return Ok(Value::error(format!(
            "substring: end out of range: {end} < {start}"
        )));
    }
    let len = s.chars().count() as i64;
    if end > len {
        return Ok(Value::error(format!(
            "substring: end out of range: {end} > {len}"
        )));
    }
    Ok(Value::from(
        s.chars()
            .skip(start as usize)
            .take((end - start) as usize)
            .collect::<String>(),
    ))
}

fn to_lower(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "to_lower";
    ensure_args_count(span, name, params, args, 1)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    Ok(Value::from(s.to_lowercase()))
}

fn to_upper(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "to_upper";
    ensure_args_count(span, name, params, args, 1)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    Ok(Value::from(s.to_uppercase()))
}

// Title case differs from upper case only for the Latin digraphs.
fn title_char(c: char) -> char {
    match c {
        '\u{01C4}'..='\u{01C6}' => '\u{01C5}',
        '\u{01C7}'..='\u{01C9}' => '\u{01C8}',
        '\u{01CA}'..='\u{01CC}' => '\u{01CB}',
        '\u{01F1}'..='\u{01F3}' => '\u{01F2}',
        c => {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(u), None) => u,
                _ => c,
            }
        }
    }
}

fn to_title(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "to_title";
    ensure_args_count(span, name, params, args, 1)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    Ok(Value::from(s.chars().map(title_char).collect::<String>()))
}

fn trim(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "trim";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let cutset = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::from(s.trim_matches(|c: char| cutset.contains(c))))
}

fn trim_left(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "trim_left";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let cutset = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::from(s.trim_start_matches(|c: char| cutset.contains(c))))
}

fn trim_right(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "trim_right";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let cutset = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::from(s.trim_end_matches(|c: char| cutset.contains(c))))
}

fn trim_prefix(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "trim_prefix";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let prefix = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::from(
        s.strip_prefix(prefix.as_ref()).unwrap_or(s.as_ref()),
    ))
}

fn trim_suffix(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "trim_suffix";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    let suffix = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::from(
        s.strip_suffix(suffix.as_ref()).unwrap_or(s.as_ref()),
    ))
}

fn trim_space(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "trim_space";
    ensure_args_count(span, name, params, args, 1)?;
    let s = ensure_string(name, &params[0], &args[0])?;
    Ok(Value::from(s.trim()))
}

fn valid_utf8(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "valid_utf8";
    ensure_args_count(span, name, params, args, 1)?;
    let b = ensure_bytes(name, &params[0], &args[0])?;
    Ok(Value::Bool(std::str::from_utf8(&b).is_ok()))
}

/// Replaces each run of invalid UTF-8 with `replacement`.
pub fn valid_utf8_lossy(b: &[u8], replacement: &str) -> String {
    let mut out = String::with_capacity(b.len());
    let mut in_invalid = false;
    for chunk in b.utf8_chunks() {
        if !chunk.valid().is_empty() {
            out.push_str(chunk.valid());
            in_invalid = false;
        }
        if !chunk.invalid().is_empty() && !in_invalid {
            out.push_str(replacement);
            in_invalid = true;
        }
    }
    out
}

fn to_valid_utf8(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "to_valid_utf8";
    ensure_args_count(span, name, params, args, 2)?;
    let b = ensure_bytes(name, &params[0], &args[0])?;
    let replacement = ensure_string(name, &params[1], &args[1])?;
    Ok(Value::from(valid_utf8_lossy(&b, &replacement)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_with_limits() {
        assert_eq!(split_parts("a,b,c", ",", None), vec!["a", "b", "c"]);
        assert_eq!(split_parts("a,b,c", ",", Some(2)), vec!["a", "b,c"]);
        assert!(split_parts("a,b,c", ",", Some(0)).is_empty());
        assert_eq!(split_parts("héllo", "", None), vec!["h", "é", "l", "l", "o"]);
        assert_eq!(split_parts("abc", "", Some(2)), vec!["a", "bc"]);
        assert_eq!(split_parts("", ",", None), vec![""]);
    }

    #[test]
    fn split_after_keeps_separators() {
        assert_eq!(split_after_parts("a,b,c", ",", None), vec!["a,", "b,", "c"]);
        assert_eq!(split_after_parts("a,b,", ",", None), vec!["a,", "b,", ""]);
        assert_eq!(split_after_parts("a,b,c", ",", Some(2)), vec!["a,", "b,c"]);
        assert_eq!(split_after_parts("a,b,c", ",", Some(1)), vec!["a,b,c"]);
        assert!(split_after_parts("a,b,c", ",", Some(0)).is_empty());
        assert_eq!(split_after_parts("", ",", None), vec![""]);
        assert_eq!(split_after_parts("hé", "", None), vec!["h", "é"]);
    }

    #[test]
    fn title_case_of_digraphs() {
        assert_eq!(title_char('\u{01C6}'), '\u{01C5}');
        assert_eq!(title_char('\u{01C4}'), '\u{01C5}');
        assert_eq!(title_char('a'), 'A');
        assert_eq!(title_char('ß'), 'ß');
        assert_eq!(title_char('1'), '1');
    }

    #[test]
    fn invalid_runs_are_replaced_once() {
        assert_eq!(valid_utf8_lossy(b"a\xff\xfeb\xffc", "?"), "a?b?c");
        assert_eq!(valid_utf8_lossy("héllo".as_bytes(), "?"), "héllo");
    }
}
