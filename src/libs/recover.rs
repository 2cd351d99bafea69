// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins::utils::{ensure_args_count, ensure_string};
use crate::builtins::{builtin, Overload};
use crate::env::{Library, Registry};
use crate::lexer::Span;
use crate::value::{Kind, Value};

use std::collections::BTreeMap;

use anyhow::Result;

/// Error interception: `try(x)`, `try(x, key)` and `is_error(x)`.
pub struct Try;

impl Library for Try {
    fn name(&self) -> &'static str {
        "try"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        use Kind::*;

        r.declare(
            "try",
            vec![
                Overload::global("try_dyn", &[Dyn]),
                Overload::global("try_dyn_string", &[Dyn, String]),
            ],
        )?;
        r.declare("is_error", vec![Overload::global("is_error_dyn", &[Dyn])])?;

        r.bind_non_strict("try_dyn", builtin(try_value))?;
        r.bind_non_strict("try_dyn_string", builtin(try_message))?;
        r.bind_non_strict("is_error_dyn", builtin(is_error))?;
        Ok(())
    }
}

fn try_value(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "try", params, args, 1)?;
    Ok(match &args[0] {
        Value::Error(msg) => Value::String(msg.clone()),
        v => v.clone(),
    })
}

fn try_message(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "try", params, args, 2)?;
    let key = ensure_string("try", &params[1], &args[1])?;
    Ok(match &args[0] {
        Value::Error(msg) => {
            let mut m = BTreeMap::new();
            m.insert(Value::String(key), Value::String(msg.clone()));
            Value::from(m)
        }
        v => v.clone(),
    })
}

fn is_error(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "is_error", params, args, 1)?;
    Ok(Value::Bool(args[0].is_error()))
}
