// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::lexer::Span;
use crate::Rc;
use crate::Value;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, TimeDelta, Utc};

pub fn ensure_args_count(
    span: &Span,
    fcn: &'static str,
    params: &[Ref<Expr>],
    args: &[Value],
    expected: usize,
) -> Result<()> {
    if args.len() != expected {
        let span = match args.len() > expected && !params.is_empty() {
            false => span,
            true => params[params.len().min(args.len()) - 1].span(),
        };
        if expected == 1 {
            bail!(span.error(format!("`{fcn}` expects 1 argument").as_str()))
        } else {
            bail!(span.error(format!("`{fcn}` expects {expected} arguments").as_str()))
        }
    }
    Ok(())
}

pub fn ensure_bool(fcn: &str, arg: &Expr, v: &Value) -> Result<bool> {
    Ok(match &v {
        Value::Bool(b) => *b,
        _ => {
            let span = arg.span();
            bail!(span.error(format!("`{fcn}` expects bool argument. Got `{v}` instead").as_str()))
        }
    })
}

pub fn ensure_int(fcn: &str, arg: &Expr, v: &Value) -> Result<i64> {
    Ok(match &v {
        Value::Int(i) => *i,
        _ => {
            let span = arg.span();
            bail!(span.error(format!("`{fcn}` expects int argument. Got `{v}` instead").as_str()))
        }
    })
}

pub fn ensure_string(fcn: &str, arg: &Expr, v: &Value) -> Result<Rc<str>> {
    Ok(match &v {
        Value::String(s) => s.clone(),
        _ => {
            let span = arg.span();
            bail!(span.error(format!("`{fcn}` expects string argument. Got `{v}` instead").as_str()))
        }
    })
}

pub fn ensure_bytes(fcn: &str, arg: &Expr, v: &Value) -> Result<Rc<[u8]>> {
    Ok(match &v {
        Value::Bytes(b) => b.clone(),
        _ => {
            let span = arg.span();
            bail!(span.error(format!("`{fcn}` expects bytes argument. Got `{v}` instead").as_str()))
        }
    })
}

/// Accepts either a string or bytes and returns the raw bytes.
pub fn ensure_string_or_bytes(fcn: &str, arg: &Expr, v: &Value) -> Result<Vec<u8>> {
    Ok(match &v {
        Value::String(s) => s.as_bytes().to_vec(),
        Value::Bytes(b) => b.to_vec(),
        _ => {
            let span = arg.span();
            bail!(span.error(
                format!("`{fcn}` expects string or bytes argument. Got `{v}` instead").as_str()
            ))
        }
    })
}

pub fn ensure_string_element<'a>(
    fcn: &str,
    arg: &Expr,
    v: &'a Value,
    idx: usize,
) -> Result<&'a str> {
    Ok(match &v {
        Value::String(s) => s.as_ref(),
        _ => {
            let span = arg.span();
            bail!(span.error(
                format!("`{fcn}` expects list of strings. Element {idx} is not a string.").as_str()
            ))
        }
    })
}

pub fn ensure_string_collection<'a>(fcn: &str, arg: &Expr, v: &'a Value) -> Result<Vec<&'a str>> {
    let mut collection = vec![];
    match &v {
        Value::List(a) => {
            for (idx, elem) in a.iter().enumerate() {
                collection.push(ensure_string_element(fcn, arg, elem, idx)?);
            }
        }
        _ => {
            let span = arg.span();
            bail!(span.error(format!("`{fcn}` expects list of strings.").as_str()))
        }
    }
    Ok(collection)
}

pub fn ensure_list(fcn: &str, arg: &Expr, v: &Value) -> Result<Rc<Vec<Value>>> {
    Ok(match v {
        Value::List(a) => a.clone(),
        _ => {
            let span = arg.span();
            bail!(span.error(format!("`{fcn}` expects list argument. Got `{v}` instead").as_str()))
        }
    })
}

pub fn ensure_map(fcn: &str, arg: &Expr, v: &Value) -> Result<Rc<BTreeMap<Value, Value>>> {
    Ok(match v {
        Value::Map(m) => m.clone(),
        _ => {
            let span = arg.span();
            bail!(span.error(format!("`{fcn}` expects map argument. Got `{v}` instead").as_str()))
        }
    })
}

pub fn ensure_timestamp(fcn: &str, arg: &Expr, v: &Value) -> Result<DateTime<Utc>> {
    Ok(match v {
        Value::Timestamp(t) => *t,
        _ => {
            let span = arg.span();
            bail!(span
                .error(format!("`{fcn}` expects timestamp argument. Got `{v}` instead").as_str()))
        }
    })
}

pub fn ensure_duration(fcn: &str, arg: &Expr, v: &Value) -> Result<TimeDelta> {
    Ok(match v {
        Value::Duration(d) => *d,
        _ => {
            let span = arg.span();
            bail!(span
                .error(format!("`{fcn}` expects duration argument. Got `{v}` instead").as_str()))
        }
    })
}
