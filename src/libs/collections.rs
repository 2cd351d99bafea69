// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, ExprRef, Ref};
use crate::builtins::utils::{ensure_args_count, ensure_list, ensure_map};
use crate::builtins::{builtin, Overload};
use crate::env::{Library, Registry};
use crate::lexer::Span;
use crate::libs::path::{self, PathError};
use crate::macros::{ident_arg, Macro};
use crate::value::{Kind, Value};

use core::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::Result;

/// Collection reshaping: `collate`, `drop`, `drop_empty`, `flatten`, `max`,
/// `min`, the `with` family and the `as` macro.
pub struct Collections;

impl Library for Collections {
    fn name(&self) -> &'static str {
        "collections"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        use Kind::*;

        r.declare_macro(Macro::receiver("as", 2, expand_as));

        r.function(
            "collate",
            vec![
                Overload::receiver("list_collate_string", &[List, String]),
                Overload::receiver("list_collate_list_string", &[List, List]),
                Overload::receiver("map_collate_string", &[Map, String]),
                Overload::receiver("map_collate_list_string", &[Map, List]),
            ],
            builtin(collate_fcn),
        )?;
        r.function(
            "drop",
            vec![
                Overload::receiver("list_drop_string", &[List, String]),
                Overload::receiver("list_drop_list_string", &[List, List]),
                Overload::receiver("map_drop_string", &[Map, String]),
                Overload::receiver("map_drop_list_string", &[Map, List]),
            ],
            builtin(drop_fcn),
        )?;
        r.function(
            "drop_empty",
            vec![
                Overload::receiver("list_drop_empty", &[List]),
                Overload::receiver("map_drop_empty", &[Map]),
            ],
            builtin(drop_empty_fcn),
        )?;
        r.function(
            "flatten",
            vec![Overload::receiver("list_flatten", &[List])],
            builtin(flatten_fcn),
        )?;
        r.function(
            "max",
            vec![
                Overload::receiver("list_max", &[List]),
                Overload::global("max_list", &[List]),
            ],
            builtin(max_fcn),
        )?;
        r.function(
            "min",
            vec![
                Overload::receiver("list_min", &[List]),
                Overload::global("min_list", &[List]),
            ],
            builtin(min_fcn),
        )?;
        r.function(
            "with",
            vec![Overload::receiver("map_with_map", &[Map, Map])],
            builtin(with_fcn),
        )?;
        r.function(
            "with_update",
            vec![Overload::receiver("map_with_update_map", &[Map, Map])],
            builtin(with_update_fcn),
        )?;
        r.function(
            "with_replace",
            vec![Overload::receiver("map_with_replace_map", &[Map, Map])],
            builtin(with_replace_fcn),
        )?;
        Ok(())
    }
}

// target.as(v, expr) evaluates expr once with v bound to target.
fn expand_as(span: &Span, target: Option<&ExprRef>, args: &[ExprRef]) -> Result<Expr> {
    let var = ident_arg(&args[0])?;
    let value = match target {
        Some(t) => t.clone(),
        None => anyhow::bail!(span.error("`as` requires a receiver")),
    };
    Ok(Expr::Let {
        span: span.clone(),
        var,
        value,
        body: args[1].clone(),
    })
}

/// Resolves the path argument: a single string or a list of strings.
fn path_list<'a>(op: &'static str, paths: &'a Value) -> Result<Vec<&'a str>, PathError> {
    match paths {
        Value::String(s) => Ok(vec![s.as_ref()]),
        Value::List(list) => list
            .iter()
            .map(|p| match p {
                Value::String(s) => Ok(s.as_ref()),
                _ => Err(PathError::InvalidType {
                    op,
                    kind: p.kind(),
                }),
            })
            .collect(),
        _ => Err(PathError::InvalidType {
            op,
            kind: paths.kind(),
        }),
    }
}

/// Gathers the values found at each path, in path order.
pub fn collate(root: &Value, paths: &Value) -> Result<Vec<Value>, PathError> {
    let mut out = vec![];
    for p in path_list("collate fields", paths)? {
        collate_path(root, p, &mut out)?;
    }
    Ok(out)
}

fn collate_path(root: &Value, path: &str, out: &mut Vec<Value>) -> Result<(), PathError> {
    match root {
        Value::List(list) => {
            for elem in list.iter() {
                collate_path(elem, path, out)?;
            }
        }
        Value::Map(m) => {
            let seg = path::split("collate", path)?;
            let Some(v) = m.get(&Value::from(seg.head.as_ref())) else {
                return Ok(());
            };
            match (seg.tail, v) {
                (None, Value::List(items)) => out.extend(items.iter().cloned()),
                (None, _) => out.push(v.clone()),
                (Some(tail), _) => collate_path(v, tail, out)?,
            }
        }
        _ if path.is_empty() => out.push(root.clone()),
        _ => (),
    }
    Ok(())
}

/// Removes the values at each path, applying the paths in order.
pub fn drop(root: &Value, paths: &Value) -> Result<Value, PathError> {
    let mut v = root.clone();
    for p in path_list("drop", paths)? {
        v = drop_path(&v, p)?;
    }
    Ok(v)
}

fn has_path(root: &Value, path: &str) -> Result<bool, PathError> {
    match root {
        Value::List(list) => {
            for elem in list.iter() {
                if has_path(elem, path)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Map(m) => {
            let seg = path::split("drop", path)?;
            match (m.get(&Value::from(seg.head.as_ref())), seg.tail) {
                (None, _) => Ok(false),
                (Some(_), None) => Ok(true),
                (Some(v), Some(tail)) => has_path(v, tail),
            }
        }
        _ => Ok(false),
    }
}

fn drop_path(root: &Value, path: &str) -> Result<Value, PathError> {
    if !has_path(root, path)? {
        return Ok(root.clone());
    }

    match root {
        Value::List(list) => {
            let mut out = Vec::with_capacity(list.len());
            for elem in list.iter() {
                out.push(drop_path(elem, path)?);
            }
            Ok(Value::from(out))
        }
        Value::Map(m) => {
            let seg = path::split("drop", path)?;
            let head = Value::from(seg.head.as_ref());
            let mut out = m.as_ref().clone();
            match seg.tail {
                None => {
                    out.remove(&head);
                }
                Some(tail) => {
                    if let Some(v) = out.get_mut(&head) {
                        *v = drop_path(v, tail)?;
                    }
                }
            }
            Ok(Value::from(out))
        }
        _ => Ok(root.clone()),
    }
}

fn container_len(v: &Value) -> Option<usize> {
    match v {
        Value::List(l) => Some(l.len()),
        Value::Map(m) => Some(m.len()),
        _ => None,
    }
}

fn has_empty(v: &Value) -> bool {
    let children: Box<dyn Iterator<Item = &Value>> = match v {
        Value::List(l) => Box::new(l.iter()),
        Value::Map(m) => Box::new(m.values()),
        _ => return false,
    };
    for child in children {
        match container_len(child) {
            Some(0) => return true,
            Some(_) if has_empty(child) => return true,
            _ => (),
        }
    }
    false
}

// Some(v) if the child survives pruning.
fn prune_child(child: &Value) -> Option<Value> {
    match container_len(child) {
        None => Some(child.clone()),
        Some(0) => None,
        Some(_) => {
            let res = drop_empty(child);
            match container_len(&res) {
                Some(0) => None,
                _ => Some(res),
            }
        }
    }
}

/// Removes empty lists and maps at every depth. Scalars are never empty.
pub fn drop_empty(v: &Value) -> Value {
    if !has_empty(v) {
        return v.clone();
    }
    match v {
        Value::List(l) => Value::from(l.iter().filter_map(prune_child).collect::<Vec<_>>()),
        Value::Map(m) => Value::from(
            m.iter()
                .filter_map(|(k, child)| prune_child(child).map(|c| (k.clone(), c)))
                .collect::<BTreeMap<_, _>>(),
        ),
        _ => v.clone(),
    }
}

/// Depth-first concatenation of nested lists. A list holding any non-list
/// element contributes its elements as they are.
pub fn flatten(list: &[Value]) -> Vec<Value> {
    let mut out = vec![];
    flatten_parts(&mut out, list);
    out
}

fn flatten_parts(out: &mut Vec<Value>, list: &[Value]) {
    if list.iter().any(|e| !matches!(e, Value::List(_))) {
        out.extend(list.iter().cloned());
        return;
    }
    for elem in list {
        if let Value::List(inner) = elem {
            flatten_parts(out, inner);
        }
    }
}

/// Union of two maps; `src` wins on conflicting keys.
pub fn with(dst: &BTreeMap<Value, Value>, src: &BTreeMap<Value, Value>) -> BTreeMap<Value, Value> {
    let mut out = dst.clone();
    for (k, v) in src {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Adds keys from `src` that `dst` does not have.
pub fn with_update(
    dst: &BTreeMap<Value, Value>,
    src: &BTreeMap<Value, Value>,
) -> BTreeMap<Value, Value> {
    let mut out = dst.clone();
    for (k, v) in src {
        out.entry(k.clone()).or_insert_with(|| v.clone());
    }
    out
}

/// Replaces values of keys that `dst` already has.
pub fn with_replace(
    dst: &BTreeMap<Value, Value>,
    src: &BTreeMap<Value, Value>,
) -> BTreeMap<Value, Value> {
    let mut out = dst.clone();
    for (k, v) in src {
        if let Some(slot) = out.get_mut(k) {
            *slot = v.clone();
        }
    }
    out
}

fn extremum(op: &str, list: &[Value], want: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for elem in list {
        best = match best {
            None => Some(elem),
            Some(b) => match elem.compare(b) {
                Some(o) if o == want => Some(elem),
                Some(_) => Some(b),
                None => {
                    return Value::error(format!(
                        "no such overload: {op} of {} and {}",
                        b.kind(),
                        elem.kind()
                    ))
                }
            },
        };
    }
    match best {
        Some(v) => v.clone(),
        None => Value::error(format!("{op} of empty list")),
    }
}

fn collate_fcn(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "collate", params, args, 2)?;
    Ok(match collate(&args[0], &args[1]) {
        Ok(list) => Value::from(list),
        Err(e) => Value::error(e.to_string()),
    })
}

fn drop_fcn(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "drop", params, args, 2)?;
    Ok(match drop(&args[0], &args[1]) {
        Ok(v) => v,
        Err(e) => Value::error(e.to_string()),
    })
}

fn drop_empty_fcn(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "drop_empty", params, args, 1)?;
    Ok(drop_empty(&args[0]))
}

fn flatten_fcn(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "flatten", params, args, 1)?;
    let list = ensure_list("flatten", &params[0], &args[0])?;
    Ok(Value::from(flatten(&list)))
}

fn max_fcn(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "max", params, args, 1)?;
    let list = ensure_list("max", &params[0], &args[0])?;
    Ok(extremum("max", &list, Ordering::Greater))
}

fn min_fcn(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "min", params, args, 1)?;
    let list = ensure_list("min", &params[0], &args[0])?;
    Ok(extremum("min", &list, Ordering::Less))
}

fn with_fcn(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "with", params, args, 2)?;
    let dst = ensure_map("with", &params[0], &args[0])?;
    let src = ensure_map("with", &params[1], &args[1])?;
    Ok(Value::from(with(&dst, &src)))
}

fn with_update_fcn(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "with_update", params, args, 2)?;
    let dst = ensure_map("with_update", &params[0], &args[0])?;
    let src = ensure_map("with_update", &params[1], &args[1])?;
    Ok(Value::from(with_update(&dst, &src)))
}

fn with_replace_fcn(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "with_replace", params, args, 2)?;
    let dst = ensure_map("with_replace", &params[0], &args[0])?;
    let src = ensure_map("with_replace", &params[1], &args[1])?;
    Ok(Value::from(with_replace(&dst, &src)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(json: &str) -> Value {
        Value::from_json_str(json).unwrap()
    }

    fn sample() -> Value {
        v(r#"{
            "a": [{"b": 1}, {"b": 2}, {"b": 3}],
            "b": [{"b": -1, "c": 10}, {"b": -2, "c": 20}, {"b": -3, "c": 30}]
        }"#)
    }

    #[test]
    fn collate_paths() {
        let s = sample();
        assert_eq!(
            Value::from(collate(&s, &Value::from("a")).unwrap()),
            v(r#"[{"b": 1}, {"b": 2}, {"b": 3}]"#)
        );
        assert_eq!(
            Value::from(collate(&s, &Value::from("a.b")).unwrap()),
            v("[1, 2, 3]")
        );
        assert_eq!(
            Value::from(collate(&s, &v(r#"["a.b", "b.b"]"#)).unwrap()),
            v("[1, 2, 3, -1, -2, -3]")
        );
        assert_eq!(
            Value::from(collate(&s, &v(r#"["a", "b.b"]"#)).unwrap()),
            v(r#"[{"b": 1}, {"b": 2}, {"b": 3}, -1, -2, -3]"#)
        );
        assert!(collate(&s, &Value::from("x.y")).unwrap().is_empty());
    }

    #[test]
    fn collate_reports_bad_paths() {
        let err = collate(&sample(), &Value::from("a.")).unwrap_err();
        assert_eq!(err.to_string(), "invalid parameter path for collate: a.");
        let err = collate(&sample(), &v(r#"["a", 1]"#)).unwrap_err();
        assert_eq!(err.to_string(), "invalid parameter type for collate fields: int");
    }

    #[test]
    fn drop_paths() {
        let s = sample();
        assert_eq!(
            drop(&s, &Value::from("a")).unwrap(),
            v(r#"{"b": [{"b": -1, "c": 10}, {"b": -2, "c": 20}, {"b": -3, "c": 30}]}"#)
        );
        assert_eq!(
            drop(&s, &Value::from("a.b")).unwrap(),
            v(r#"{"a": [{}, {}, {}], "b": [{"b": -1, "c": 10}, {"b": -2, "c": 20}, {"b": -3, "c": 30}]}"#)
        );
        assert_eq!(
            drop(&s, &v(r#"["a", "b.b"]"#)).unwrap(),
            v(r#"{"b": [{"c": 10}, {"c": 20}, {"c": 30}]}"#)
        );
    }

    #[test]
    fn drop_escaped_dot() {
        let s = v(r#"{"dotted.path": [{"b": -1, "c": 10}, {"b": -2, "c": 20}]}"#);
        assert_eq!(
            drop(&s, &Value::from(r"dotted\.path.b")).unwrap(),
            v(r#"{"dotted.path": [{"c": 10}, {"c": 20}]}"#)
        );
    }

    #[test]
    fn drop_absent_path_is_identity() {
        let s = sample();
        for p in ["x", "a.x", "a.b.c", "b.c.d"] {
            assert_eq!(drop(&s, &Value::from(p)).unwrap(), s, "{p}");
        }
    }

    #[test]
    fn drop_empty_prunes_bottom_up() {
        let s = v(r#"{"a": [{}, {}, {}], "b": [{"b": -1, "c": 10}]}"#);
        assert_eq!(drop_empty(&s), v(r#"{"b": [{"b": -1, "c": 10}]}"#));

        let s = v(r#"{"a": {"b": {"c": []}}, "d": "", "e": 0, "f": [[], [1]]}"#);
        assert_eq!(drop_empty(&s), v(r#"{"d": "", "e": 0, "f": [[1]]}"#));
    }

    #[test]
    fn flatten_follows_homogeneity() {
        let l = v("[[1],[2,3],[[[4]],[5,6]]]");
        assert_eq!(Value::from(flatten(l.as_list().unwrap())), v("[1,2,3,4,5,6]"));

        let l = v(r#"[[{"a":1,"b":[10,11]}],[2,3],[[[4]],[5,6]]]"#);
        assert_eq!(
            Value::from(flatten(l.as_list().unwrap())),
            v(r#"[{"a":1,"b":[10,11]},2,3,4,5,6]"#)
        );

        let l = v("[1,[2,[3]]]");
        assert_eq!(Value::from(flatten(l.as_list().unwrap())), l);
    }

    #[test]
    fn with_family() {
        let dst = v(r#"{"a": 1, "b": 2}"#);
        let src = v(r#"{"a": 10, "c": 3}"#);
        let (d, s) = (dst.as_map().unwrap(), src.as_map().unwrap());
        assert_eq!(Value::from(with(d, s)), v(r#"{"a": 10, "b": 2, "c": 3}"#));
        assert_eq!(Value::from(with_update(d, s)), v(r#"{"a": 1, "b": 2, "c": 3}"#));
        assert_eq!(Value::from(with_replace(d, s)), v(r#"{"a": 10, "b": 2}"#));
    }

    #[test]
    fn with_partition_law_for_disjoint_keys() {
        let dst = v(r#"{"a": 1, "b": 2}"#);
        let src = v(r#"{"c": 3, "d": 4}"#);
        let (d, s) = (dst.as_map().unwrap(), src.as_map().unwrap());
        assert_eq!(with(d, s), with_update(d, s));
        assert_eq!(&with_replace(d, s), d);
    }

    #[test]
    fn extremes() {
        let l = v("[3, 1.5, 7, 2]");
        assert_eq!(extremum("max", l.as_list().unwrap(), Ordering::Greater), Value::Int(7));
        assert_eq!(extremum("min", l.as_list().unwrap(), Ordering::Less), Value::Float(1.5));
        assert!(extremum("min", &[], Ordering::Less).is_error());
        assert!(extremum("max", v(r#"[1, "a"]"#).as_list().unwrap(), Ordering::Greater).is_error());
    }
}
