// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins::utils::{ensure_args_count, ensure_string};
use crate::builtins::{builtin, Overload};
use crate::env::{Library, Registry};
use crate::lexer::Span;
use crate::value::{Kind, Value};
use crate::Rc;

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use log::debug;
use regex::bytes;
use regex::Regex;

/// A configured pattern, compiled for both string and bytes subjects.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: Regex,
    bytes: bytes::Regex,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            text: Regex::new(pattern)?,
            bytes: bytes::Regex::new(pattern)?,
        })
    }
}

/// Regular expressions referenced by name from expressions.
#[derive(Debug, Clone, Default)]
pub struct Regexp {
    patterns: BTreeMap<String, Pattern>,
}

impl Regexp {
    /// Compiles each named pattern. A pattern that fails to compile is
    /// reported by name.
    pub fn new(patterns: &BTreeMap<String, String>) -> Result<Self> {
        let mut compiled = BTreeMap::new();
        for (name, pattern) in patterns {
            let p = Pattern::new(pattern)
                .map_err(|e| anyhow!("failed to compile regexp {name:?}: {e}"))?;
            compiled.insert(name.clone(), p);
        }
        debug!("compiled {} regexp patterns", compiled.len());
        Ok(Self {
            patterns: compiled,
        })
    }
}

type Patterns = Rc<BTreeMap<String, Pattern>>;

fn bind_patterns(
    patterns: &Patterns,
    f: fn(&Span, &[Ref<Expr>], &[Value], &Pattern) -> Result<Value>,
    name: &'static str,
) -> crate::builtins::BuiltinFcn {
    let patterns = patterns.clone();
    builtin(move |span, params, args| {
        if args.len() < 2 {
            bail!(span.error(&format!("`{name}` expects a pattern name")));
        }
        let pattern_name = ensure_string(name, &params[1], &args[1])?;
        match patterns.get(pattern_name.as_ref()) {
            Some(p) => f(span, params, args, p),
            None => Ok(Value::error(format!("no regexp {pattern_name}"))),
        }
    })
}

impl Library for Regexp {
    fn name(&self) -> &'static str {
        "regexp"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        use Kind::*;

        let patterns: Patterns = Rc::new(self.patterns.clone());
        let unary: &[(&'static str, fn(&Span, &[Ref<Expr>], &[Value], &Pattern) -> Result<Value>)] = &[
            ("re_match", re_match),
            ("re_find", re_find),
            ("re_find_all", re_find_all),
            ("re_find_submatch", re_find_submatch),
            ("re_find_all_submatch", re_find_all_submatch),
        ];
        for (name, f) in unary {
            r.function(
                name,
                vec![
                    Overload::receiver(&format!("string_{name}_string"), &[String, String]),
                    Overload::receiver(&format!("bytes_{name}_string"), &[Bytes, String]),
                ],
                bind_patterns(&patterns, *f, *name),
            )?;
        }
        r.function(
            "re_replace_all",
            vec![
                Overload::receiver("string_re_replace_all_string_string", &[String, String, String]),
                Overload::receiver("bytes_re_replace_all_string_bytes", &[Bytes, String, Bytes]),
            ],
            bind_patterns(&patterns, re_replace_all, "re_replace_all"),
        )?;
        Ok(())
    }
}

fn invalid_subject(name: &str, v: &Value) -> Value {
    Value::error(format!("invalid type for {name}: {}", v.kind()))
}

fn re_match(span: &Span, params: &[Ref<Expr>], args: &[Value], p: &Pattern) -> Result<Value> {
    let name = "re_match";
    ensure_args_count(span, name, params, args, 2)?;
    Ok(match &args[0] {
        Value::String(s) => Value::Bool(p.text.is_match(s)),
        Value::Bytes(b) => Value::Bool(p.bytes.is_match(b)),
        v => invalid_subject(name, v),
    })
}

fn re_find(span: &Span, params: &[Ref<Expr>], args: &[Value], p: &Pattern) -> Result<Value> {
    let name = "re_find";
    ensure_args_count(span, name, params, args, 2)?;
    Ok(match &args[0] {
        Value::String(s) => Value::from(p.text.find(s).map_or("", |m| m.as_str())),
        Value::Bytes(b) => Value::from(p.bytes.find(b).map_or(vec![], |m| m.as_bytes().to_vec())),
        v => invalid_subject(name, v),
    })
}

fn re_find_all(span: &Span, params: &[Ref<Expr>], args: &[Value], p: &Pattern) -> Result<Value> {
    let name = "re_find_all";
    ensure_args_count(span, name, params, args, 2)?;
    Ok(match &args[0] {
        Value::String(s) => Value::from(
            p.text
                .find_iter(s)
                .map(|m| Value::from(m.as_str()))
                .collect::<Vec<_>>(),
        ),
        Value::Bytes(b) => Value::from(
            p.bytes
                .find_iter(b)
                .map(|m| Value::from(m.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        ),
        v => invalid_subject(name, v),
    })
}

fn text_groups(c: &regex::Captures) -> Value {
    Value::from(
        c.iter()
            .map(|g| Value::from(g.map_or("", |m| m.as_str())))
            .collect::<Vec<_>>(),
    )
}

fn bytes_groups(c: &bytes::Captures) -> Value {
    Value::from(
        c.iter()
            .map(|g| Value::from(g.map_or(vec![], |m| m.as_bytes().to_vec())))
            .collect::<Vec<_>>(),
    )
}

fn re_find_submatch(
    span: &Span,
    params: &[Ref<Expr>],
    args: &[Value],
    p: &Pattern,
) -> Result<Value> {
    let name = "re_find_submatch";
    ensure_args_count(span, name, params, args, 2)?;
    Ok(match &args[0] {
        Value::String(s) => p
            .text
            .captures(s)
            .map_or_else(Value::new_list, |c| text_groups(&c)),
        Value::Bytes(b) => p
            .bytes
            .captures(b)
            .map_or_else(Value::new_list, |c| bytes_groups(&c)),
        v => invalid_subject(name, v),
    })
}

fn re_find_all_submatch(
    span: &Span,
    params: &[Ref<Expr>],
    args: &[Value],
    p: &Pattern,
) -> Result<Value> {
    let name = "re_find_all_submatch";
    ensure_args_count(span, name, params, args, 2)?;
    Ok(match &args[0] {
        Value::String(s) => Value::from(
            p.text
                .captures_iter(s)
                .map(|c| text_groups(&c))
                .collect::<Vec<_>>(),
        ),
        Value::Bytes(b) => Value::from(
            p.bytes
                .captures_iter(b)
                .map(|c| bytes_groups(&c))
                .collect::<Vec<_>>(),
        ),
        v => invalid_subject(name, v),
    })
}

fn re_replace_all(
    span: &Span,
    params: &[Ref<Expr>],
    args: &[Value],
    p: &Pattern,
) -> Result<Value> {
    let name = "re_replace_all";
    ensure_args_count(span, name, params, args, 3)?;
    Ok(match (&args[0], &args[2]) {
        (Value::String(s), Value::String(rep)) => {
            Value::from(p.text.replace_all(s, rep.as_ref()).into_owned())
        }
        (Value::Bytes(b), Value::Bytes(rep)) => {
            Value::from(p.bytes.replace_all(b, rep.as_ref()).into_owned())
        }
        (v, _) => invalid_subject(name, v),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_errors_name_the_pattern() {
        let mut patterns = BTreeMap::new();
        patterns.insert("ok".to_string(), "foo(.)".to_string());
        patterns.insert("bad".to_string(), "foo(".to_string());
        let err = Regexp::new(&patterns).unwrap_err();
        assert!(err.to_string().starts_with("failed to compile regexp \"bad\""));
    }

    #[test]
    fn replacement_expands_groups() {
        let p = Pattern::new("(f)oo([ld])").unwrap();
        assert_eq!(p.text.replace_all("food fool", "${1}u${2}"), "fud ful");
        assert_eq!(
            p.bytes.replace_all(b"food fool", &b"${1}u${2}"[..]).as_ref(),
            b"fud ful"
        );
    }
}
