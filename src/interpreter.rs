// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::env::Registry;
use crate::lexer::Span;
use crate::value::Value;

use core::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use log::debug;

pub struct Interpreter<'a> {
    registry: &'a Registry,
    activation: &'a BTreeMap<String, Value>,
    scopes: Vec<(String, Value)>,
    start: DateTime<Utc>,
}

fn first_error(values: &[Value]) -> Option<&Value> {
    values.iter().find(|v| v.is_error())
}

fn kinds(values: &[&Value]) -> String {
    values
        .iter()
        .map(|v| v.kind().name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn no_overload(span: &Span, op: &str, values: &[&Value]) -> anyhow::Error {
    span.error(&format!(
        "found no matching overload for '{op}' applied to ({})",
        kinds(values)
    ))
}

fn overflow() -> Value {
    Value::error("integer overflow")
}

impl<'a> Interpreter<'a> {
    pub fn new(
        registry: &'a Registry,
        activation: &'a BTreeMap<String, Value>,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            registry,
            activation,
            scopes: vec![],
            start,
        }
    }

    fn lookup_var(&self, span: &Span) -> Result<Value> {
        let name = span.text();
        if let Some((_, v)) = self.scopes.iter().rev().find(|(n, _)| n == name) {
            return Ok(v.clone());
        }
        if let Some(v) = self.activation.get(name) {
            return Ok(v.clone());
        }
        match self.registry.variable(name) {
            Some(Some(f)) => Ok(f(&self.start)),
            Some(None) => Ok(Value::error(format!("no such attribute: {name}"))),
            None => bail!(span.error(&format!("undeclared reference to '{name}'"))),
        }
    }

    fn eval_list(&mut self, items: &[ExprRef]) -> Result<Value> {
        let mut list = Vec::with_capacity(items.len());
        for item in items {
            let v = self.eval_expr(item)?;
            if v.is_error() {
                return Ok(v);
            }
            list.push(v);
        }
        Ok(Value::from(list))
    }

    fn eval_map(&mut self, entries: &[(ExprRef, ExprRef)]) -> Result<Value> {
        let mut map = BTreeMap::new();
        for (k, v) in entries {
            let key = self.eval_expr(k)?;
            match &key {
                Value::Error(_) => return Ok(key),
                Value::String(_) | Value::Int(_) | Value::Bool(_) => (),
                _ => bail!(k
                    .span()
                    .error(&format!("unsupported key type '{}'", key.kind()))),
            }
            let value = self.eval_expr(v)?;
            if value.is_error() {
                return Ok(value);
            }
            if map.insert(key.clone(), value).is_some() {
                return Ok(Value::error(format!("repeated key: {key}")));
            }
        }
        Ok(Value::from(map))
    }

    fn eval_select(
        &mut self,
        span: &Span,
        operand: &ExprRef,
        field: &Span,
        test_only: bool,
    ) -> Result<Value> {
        let v = self.eval_expr(operand)?;
        match &v {
            Value::Map(m) => {
                let key = Value::from(field.text());
                if test_only {
                    return Ok(Value::Bool(m.contains_key(&key)));
                }
                Ok(match m.get(&key) {
                    Some(v) => v.clone(),
                    None => Value::error(format!("no such key: {}", field.text())),
                })
            }
            Value::Error(_) => Ok(v.clone()),
            _ => bail!(span.error(&format!(
                "type '{}' does not support field selection",
                v.kind()
            ))),
        }
    }

    fn eval_index(&mut self, span: &Span, operand: &ExprRef, index: &ExprRef) -> Result<Value> {
        let v = self.eval_expr(operand)?;
        let idx = self.eval_expr(index)?;
        if let Some(e) = first_error(&[v.clone(), idx.clone()]) {
            return Ok(e.clone());
        }
        match (&v, &idx) {
            (Value::List(list), Value::Int(i)) => Ok(match usize::try_from(*i) {
                Ok(u) if u < list.len() => list[u].clone(),
                _ => Value::error(format!("index out of range: {i}")),
            }),
            (Value::Map(m), _) => {
                if let Some(v) = m.get(&idx) {
                    return Ok(v.clone());
                }
                Ok(match m.iter().find(|(k, _)| k.equals(&idx)) {
                    Some((_, v)) => v.clone(),
                    None => Value::error(format!("no such key: {idx}")),
                })
            }
            _ => Err(no_overload(span, "_[_]", &[&v, &idx])),
        }
    }

    fn eval_call(
        &mut self,
        span: &Span,
        target: Option<&ExprRef>,
        name: &Span,
        args: &[ExprRef],
    ) -> Result<Value> {
        let mut params = Vec::with_capacity(args.len() + 1);
        let mut values = Vec::with_capacity(args.len() + 1);
        if let Some(t) = target {
            params.push(t.clone());
            values.push(self.eval_expr(t)?);
        }
        for a in args {
            params.push(a.clone());
            values.push(self.eval_expr(a)?);
        }
        self.dispatch(span, name.text(), target.is_some(), &params, &values)
    }

    fn dispatch(
        &self,
        span: &Span,
        name: &str,
        receiver: bool,
        params: &[ExprRef],
        values: &[Value],
    ) -> Result<Value> {
        let Some(overloads) = self.registry.overloads(name) else {
            bail!(span.error(&format!("undeclared reference to '{name}'")));
        };
        if let Some(o) = overloads.iter().find(|o| o.accepts(receiver, values)) {
            let Some(binding) = self.registry.binding(&o.id) else {
                bail!(span.error(&format!("no implementation bound to overload '{}'", o.id)));
            };
            if binding.strict {
                if let Some(e) = first_error(values) {
                    return Ok(e.clone());
                }
            }
            return (binding.fcn)(span, params, values);
        }
        if let Some(e) = first_error(values) {
            return Ok(e.clone());
        }
        let refs: Vec<&Value> = values.iter().collect();
        Err(no_overload(span, name, &refs))
    }

    fn eval_unary(&mut self, span: &Span, op: UnaryOp, expr: &ExprRef) -> Result<Value> {
        let v = self.eval_expr(expr)?;
        Ok(match (op, &v) {
            (_, Value::Error(_)) => v.clone(),
            (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
            (UnaryOp::Neg, Value::Int(i)) => match i.checked_neg() {
                Some(n) => Value::Int(n),
                None => overflow(),
            },
            (UnaryOp::Neg, Value::Float(f)) => Value::Float(-f),
            (UnaryOp::Neg, Value::Duration(d)) => Value::Duration(-*d),
            (UnaryOp::Not, _) => return Err(no_overload(span, "!_", &[&v])),
            (UnaryOp::Neg, _) => return Err(no_overload(span, "-_", &[&v])),
        })
    }

    fn arith_name(op: ArithOp) -> &'static str {
        match op {
            ArithOp::Add => "_+_",
            ArithOp::Sub => "_-_",
            ArithOp::Mul => "_*_",
            ArithOp::Div => "_/_",
            ArithOp::Mod => "_%_",
        }
    }

    fn eval_arith(
        &mut self,
        span: &Span,
        op: ArithOp,
        lhs: &ExprRef,
        rhs: &ExprRef,
    ) -> Result<Value> {
        let l = self.eval_expr(lhs)?;
        let r = self.eval_expr(rhs)?;
        if l.is_error() {
            return Ok(l);
        }
        if r.is_error() {
            return Ok(r);
        }

        let checked = |v: Option<i64>| v.map(Value::Int).unwrap_or_else(overflow);
        Ok(match (op, &l, &r) {
            (ArithOp::Add, Value::Int(a), Value::Int(b)) => checked(a.checked_add(*b)),
            (ArithOp::Sub, Value::Int(a), Value::Int(b)) => checked(a.checked_sub(*b)),
            (ArithOp::Mul, Value::Int(a), Value::Int(b)) => checked(a.checked_mul(*b)),
            (ArithOp::Div, Value::Int(_), Value::Int(0)) => Value::error("division by zero"),
            (ArithOp::Div, Value::Int(a), Value::Int(b)) => checked(a.checked_div(*b)),
            (ArithOp::Mod, Value::Int(_), Value::Int(0)) => Value::error("modulus by zero"),
            (ArithOp::Mod, Value::Int(a), Value::Int(b)) => checked(a.checked_rem(*b)),

            (ArithOp::Add, Value::Float(a), Value::Float(b)) => Value::Float(a + b),
            (ArithOp::Sub, Value::Float(a), Value::Float(b)) => Value::Float(a - b),
            (ArithOp::Mul, Value::Float(a), Value::Float(b)) => Value::Float(a * b),
            (ArithOp::Div, Value::Float(a), Value::Float(b)) => Value::Float(a / b),

            (ArithOp::Add, Value::String(a), Value::String(b)) => {
                Value::from(format!("{a}{b}"))
            }
            (ArithOp::Add, Value::Bytes(a), Value::Bytes(b)) => {
                Value::from([&a[..], &b[..]].concat())
            }
            (ArithOp::Add, Value::List(a), Value::List(b)) => {
                let mut list = a.as_ref().clone();
                list.extend(b.iter().cloned());
                Value::from(list)
            }

            (ArithOp::Add, Value::Timestamp(t), Value::Duration(d))
            | (ArithOp::Add, Value::Duration(d), Value::Timestamp(t)) => {
                match t.checked_add_signed(*d) {
                    Some(t) => Value::Timestamp(t),
                    None => Value::error("timestamp overflow"),
                }
            }
            (ArithOp::Sub, Value::Timestamp(t), Value::Duration(d)) => {
                match t.checked_sub_signed(*d) {
                    Some(t) => Value::Timestamp(t),
                    None => Value::error("timestamp overflow"),
                }
            }
            (ArithOp::Sub, Value::Timestamp(a), Value::Timestamp(b)) => {
                Value::Duration(a.signed_duration_since(*b))
            }
            (ArithOp::Add, Value::Duration(a), Value::Duration(b)) => match a.checked_add(b) {
                Some(d) => Value::Duration(d),
                None => Value::error("duration overflow"),
            },
            (ArithOp::Sub, Value::Duration(a), Value::Duration(b)) => match a.checked_sub(b) {
                Some(d) => Value::Duration(d),
                None => Value::error("duration overflow"),
            },
            _ => return Err(no_overload(span, Self::arith_name(op), &[&l, &r])),
        })
    }

    fn eval_compare(
        &mut self,
        span: &Span,
        op: BoolOp,
        lhs: &ExprRef,
        rhs: &ExprRef,
    ) -> Result<Value> {
        let l = self.eval_expr(lhs)?;
        let r = self.eval_expr(rhs)?;
        if l.is_error() {
            return Ok(l);
        }
        if r.is_error() {
            return Ok(r);
        }

        let ordered = |name: &str, f: fn(Ordering) -> bool| match l.compare(&r) {
            Some(o) => Ok(Value::Bool(f(o))),
            None => Err(no_overload(span, name, &[&l, &r])),
        };

        match op {
            BoolOp::Eq => Ok(Value::Bool(l.equals(&r))),
            BoolOp::Ne => Ok(Value::Bool(!l.equals(&r))),
            BoolOp::Lt => ordered("_<_", |o| o == Ordering::Less),
            BoolOp::Le => ordered("_<=_", |o| o != Ordering::Greater),
            BoolOp::Gt => ordered("_>_", |o| o == Ordering::Greater),
            BoolOp::Ge => ordered("_>=_", |o| o != Ordering::Less),
            BoolOp::In => match &r {
                Value::List(list) => Ok(Value::Bool(list.iter().any(|v| v.equals(&l)))),
                Value::Map(m) => Ok(Value::Bool(
                    m.contains_key(&l) || m.keys().any(|k| k.equals(&l)),
                )),
                _ => Err(no_overload(span, "@in", &[&l, &r])),
            },
        }
    }

    // Logical operators ignore an error on one side when the other side
    // decides the result.
    fn eval_logic(
        &mut self,
        span: &Span,
        op: LogicOp,
        lhs: &ExprRef,
        rhs: &ExprRef,
    ) -> Result<Value> {
        let decisive = matches!(op, LogicOp::Or);
        let name = match op {
            LogicOp::And => "_&&_",
            LogicOp::Or => "_||_",
        };

        let l = self.eval_expr(lhs)?;
        match &l {
            Value::Bool(b) if *b == decisive => return Ok(l.clone()),
            Value::Bool(_) | Value::Error(_) => (),
            _ => return Err(no_overload(span, name, &[&l])),
        }

        let r = self.eval_expr(rhs)?;
        match &r {
            Value::Bool(b) if *b == decisive => Ok(r.clone()),
            Value::Bool(_) | Value::Error(_) if l.is_error() => Ok(l),
            Value::Bool(_) | Value::Error(_) => Ok(r.clone()),
            _ => Err(no_overload(span, name, &[&l, &r])),
        }
    }

    fn eval_cond(
        &mut self,
        span: &Span,
        cond: &ExprRef,
        then: &ExprRef,
        otherwise: &ExprRef,
    ) -> Result<Value> {
        let c = self.eval_expr(cond)?;
        match c {
            Value::Bool(true) => self.eval_expr(then),
            Value::Bool(false) => self.eval_expr(otherwise),
            Value::Error(_) => Ok(c),
            _ => Err(no_overload(span, "_?_:_", &[&c])),
        }
    }

    fn eval_scoped(&mut self, var: &Span, value: Value, expr: &ExprRef) -> Result<Value> {
        self.scopes.push((var.text().to_string(), value));
        let r = self.eval_expr(expr);
        self.scopes.pop();
        r
    }

    // Evaluates a predicate; only bool or error results are allowed.
    fn eval_predicate(
        &mut self,
        span: &Span,
        var: &Span,
        item: &Value,
        expr: &ExprRef,
    ) -> Result<Value> {
        let v = self.eval_scoped(var, item.clone(), expr)?;
        match v {
            Value::Bool(_) | Value::Error(_) => Ok(v),
            _ => Err(no_overload(span, "predicate", &[&v])),
        }
    }

    fn eval_comprehension(
        &mut self,
        span: &Span,
        kind: ComprehensionKind,
        var: &Span,
        range: &ExprRef,
        body: &ExprRef,
        filter: Option<&ExprRef>,
    ) -> Result<Value> {
        let range = self.eval_expr(range)?;
        let items: Vec<Value> = match &range {
            Value::List(list) => list.as_ref().clone(),
            Value::Map(m) => m.keys().cloned().collect(),
            Value::Error(_) => return Ok(range.clone()),
            _ => bail!(span.error(&format!(
                "expression of type '{}' cannot be range of a comprehension",
                range.kind()
            ))),
        };

        match kind {
            ComprehensionKind::All | ComprehensionKind::Exists => {
                let decisive = kind == ComprehensionKind::Exists;
                let mut err = None;
                for item in &items {
                    match self.eval_predicate(span, var, item, body)? {
                        Value::Bool(b) if b == decisive => return Ok(Value::Bool(decisive)),
                        Value::Error(e) if err.is_none() => err = Some(Value::Error(e)),
                        _ => (),
                    }
                }
                Ok(err.unwrap_or(Value::Bool(!decisive)))
            }
            ComprehensionKind::ExistsOne => {
                let mut count = 0;
                for item in &items {
                    match self.eval_predicate(span, var, item, body)? {
                        Value::Bool(true) => count += 1,
                        e @ Value::Error(_) => return Ok(e),
                        _ => (),
                    }
                }
                Ok(Value::Bool(count == 1))
            }
            ComprehensionKind::Filter => {
                let mut out = vec![];
                for item in items {
                    match self.eval_predicate(span, var, &item, body)? {
                        Value::Bool(true) => out.push(item),
                        e @ Value::Error(_) => return Ok(e),
                        _ => (),
                    }
                }
                Ok(Value::from(out))
            }
            ComprehensionKind::Map => {
                let mut out = vec![];
                for item in items {
                    if let Some(f) = filter {
                        match self.eval_predicate(span, var, &item, f)? {
                            Value::Bool(true) => (),
                            e @ Value::Error(_) => return Ok(e),
                            _ => continue,
                        }
                    }
                    let v = self.eval_scoped(var, item, body)?;
                    if v.is_error() {
                        return Ok(v);
                    }
                    out.push(v);
                }
                Ok(Value::from(out))
            }
        }
    }

    pub fn eval_expr(&mut self, expr: &ExprRef) -> Result<Value> {
        match expr.as_ref() {
            Expr::Null(_) => Ok(Value::Null),
            Expr::Bool(_, b) => Ok(Value::Bool(*b)),
            Expr::Int(_, i) => Ok(Value::Int(*i)),
            Expr::Float(_, f) => Ok(Value::Float(*f)),
            Expr::String(_, s) => Ok(Value::String(s.clone())),
            Expr::Bytes(_, b) => Ok(Value::Bytes(b.clone())),
            Expr::Ident(span) => self.lookup_var(span),
            Expr::List { items, .. } => self.eval_list(items),
            Expr::Map { entries, .. } => self.eval_map(entries),
            Expr::Select {
                span,
                operand,
                field,
                test_only,
            } => self.eval_select(span, operand, field, *test_only),
            Expr::Index {
                span,
                operand,
                index,
            } => self.eval_index(span, operand, index),
            Expr::Call {
                span,
                target,
                name,
                args,
            } => self.eval_call(span, target.as_ref(), name, args),
            Expr::Unary { span, op, expr } => self.eval_unary(span, *op, expr),
            Expr::Arith { span, op, lhs, rhs } => self.eval_arith(span, *op, lhs, rhs),
            Expr::Compare { span, op, lhs, rhs } => self.eval_compare(span, *op, lhs, rhs),
            Expr::Logic { span, op, lhs, rhs } => self.eval_logic(span, *op, lhs, rhs),
            Expr::Cond {
                span,
                cond,
                then,
                otherwise,
            } => self.eval_cond(span, cond, then, otherwise),
            Expr::Comprehension {
                span,
                kind,
                var,
                range,
                body,
                filter,
            } => self.eval_comprehension(span, *kind, var, range, body, filter.as_ref()),
            Expr::Let {
                var, value, body, ..
            } => {
                let v = self.eval_expr(value)?;
                if v.is_error() {
                    return Ok(v);
                }
                debug!("binding `{}`", var.text());
                self.eval_scoped(var, v, body)
            }
        }
    }
}
