// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::lexer::Span;

use anyhow::{bail, Result};
use lazy_static::lazy_static;
use log::debug;

/// Rewrites a matched call into a new expression. Receives the call span,
/// the (already expanded) receiver and arguments.
pub type MacroFcn = fn(&Span, Option<&ExprRef>, &[ExprRef]) -> Result<Expr>;

#[derive(Clone)]
pub struct Macro {
    pub name: &'static str,
    pub arity: usize,
    pub receiver: bool,
    pub expand: MacroFcn,
}

impl Macro {
    pub const fn global(name: &'static str, arity: usize, expand: MacroFcn) -> Self {
        Self {
            name,
            arity,
            receiver: false,
            expand,
        }
    }

    pub const fn receiver(name: &'static str, arity: usize, expand: MacroFcn) -> Self {
        Self {
            name,
            arity,
            receiver: true,
            expand,
        }
    }

    fn matches(&self, name: &str, receiver: bool, arity: usize) -> bool {
        self.name == name && self.receiver == receiver && self.arity == arity
    }
}

#[rustfmt::skip]
lazy_static! {
    pub static ref STANDARD_MACROS: Vec<Macro> = vec![
        Macro::global("has", 1, expand_has),
        Macro::receiver("all", 2, expand_all),
        Macro::receiver("exists", 2, expand_exists),
        Macro::receiver("exists_one", 2, expand_exists_one),
        Macro::receiver("map", 2, expand_map),
        Macro::receiver("map", 3, expand_map_filter),
        Macro::receiver("filter", 2, expand_filter),
    ];
}

/// The loop variable of a comprehension-style macro must be a plain name.
pub fn ident_arg(arg: &ExprRef) -> Result<Span> {
    match arg.as_ident() {
        Some(s) => Ok(s.clone()),
        None => bail!(arg.span().error("argument must be a simple name")),
    }
}

fn target<'a>(span: &Span, target: Option<&'a ExprRef>) -> Result<&'a ExprRef> {
    match target {
        Some(t) => Ok(t),
        None => bail!(span.error("macro requires a receiver")),
    }
}

fn expand_has(span: &Span, _target: Option<&ExprRef>, args: &[ExprRef]) -> Result<Expr> {
    match args[0].as_ref() {
        Expr::Select {
            span,
            operand,
            field,
            ..
        } => Ok(Expr::Select {
            span: span.clone(),
            operand: operand.clone(),
            field: field.clone(),
            test_only: true,
        }),
        _ => bail!(span.error("invalid argument to has() macro")),
    }
}

fn comprehension(
    span: &Span,
    kind: ComprehensionKind,
    t: Option<&ExprRef>,
    args: &[ExprRef],
) -> Result<Expr> {
    let range = target(span, t)?.clone();
    let var = ident_arg(&args[0])?;
    let (body, filter) = match args.len() {
        3 => (args[2].clone(), Some(args[1].clone())),
        _ => (args[1].clone(), None),
    };
    Ok(Expr::Comprehension {
        span: span.clone(),
        kind,
        var,
        range,
        body,
        filter,
    })
}

fn expand_all(span: &Span, t: Option<&ExprRef>, args: &[ExprRef]) -> Result<Expr> {
    comprehension(span, ComprehensionKind::All, t, args)
}

fn expand_exists(span: &Span, t: Option<&ExprRef>, args: &[ExprRef]) -> Result<Expr> {
    comprehension(span, ComprehensionKind::Exists, t, args)
}

fn expand_exists_one(span: &Span, t: Option<&ExprRef>, args: &[ExprRef]) -> Result<Expr> {
    comprehension(span, ComprehensionKind::ExistsOne, t, args)
}

fn expand_map(span: &Span, t: Option<&ExprRef>, args: &[ExprRef]) -> Result<Expr> {
    comprehension(span, ComprehensionKind::Map, t, args)
}

fn expand_map_filter(span: &Span, t: Option<&ExprRef>, args: &[ExprRef]) -> Result<Expr> {
    comprehension(span, ComprehensionKind::Map, t, args)
}

fn expand_filter(span: &Span, t: Option<&ExprRef>, args: &[ExprRef]) -> Result<Expr> {
    comprehension(span, ComprehensionKind::Filter, t, args)
}

fn expand_all_refs(exprs: &[ExprRef], macros: &[Macro]) -> Result<Vec<ExprRef>> {
    exprs.iter().map(|e| expand(e, macros)).collect()
}

/// Applies macros bottom-up over the whole tree.
pub fn expand(expr: &ExprRef, macros: &[Macro]) -> Result<ExprRef> {
    let e = match expr.as_ref() {
        Expr::Null(_)
        | Expr::Bool(..)
        | Expr::Int(..)
        | Expr::Float(..)
        | Expr::String(..)
        | Expr::Bytes(..)
        | Expr::Ident(_) => return Ok(expr.clone()),
        Expr::List { span, items } => Expr::List {
            span: span.clone(),
            items: expand_all_refs(items, macros)?,
        },
        Expr::Map { span, entries } => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push((expand(k, macros)?, expand(v, macros)?));
            }
            Expr::Map {
                span: span.clone(),
                entries: out,
            }
        }
        Expr::Select {
            span,
            operand,
            field,
            test_only,
        } => Expr::Select {
            span: span.clone(),
            operand: expand(operand, macros)?,
            field: field.clone(),
            test_only: *test_only,
        },
        Expr::Index {
            span,
            operand,
            index,
        } => Expr::Index {
            span: span.clone(),
            operand: expand(operand, macros)?,
            index: expand(index, macros)?,
        },
        Expr::Call {
            span,
            target,
            name,
            args,
        } => {
            let target = match target {
                Some(t) => Some(expand(t, macros)?),
                None => None,
            };
            let args = expand_all_refs(args, macros)?;
            if let Some(m) = macros
                .iter()
                .find(|m| m.matches(name.text(), target.is_some(), args.len()))
            {
                debug!("expanding macro `{}` at {}:{}", m.name, name.line, name.col);
                let mut call_span = name.clone();
                call_span.start = span.start;
                call_span.end = span.end;
                return Ok(Ref::new((m.expand)(&call_span, target.as_ref(), &args)?));
            }
            Expr::Call {
                span: span.clone(),
                target,
                name: name.clone(),
                args,
            }
        }
        Expr::Unary { span, op, expr } => Expr::Unary {
            span: span.clone(),
            op: *op,
            expr: expand(expr, macros)?,
        },
        Expr::Arith { span, op, lhs, rhs } => Expr::Arith {
            span: span.clone(),
            op: *op,
            lhs: expand(lhs, macros)?,
            rhs: expand(rhs, macros)?,
        },
        Expr::Compare { span, op, lhs, rhs } => Expr::Compare {
            span: span.clone(),
            op: *op,
            lhs: expand(lhs, macros)?,
            rhs: expand(rhs, macros)?,
        },
        Expr::Logic { span, op, lhs, rhs } => Expr::Logic {
            span: span.clone(),
            op: *op,
            lhs: expand(lhs, macros)?,
            rhs: expand(rhs, macros)?,
        },
        Expr::Cond {
            span,
            cond,
            then,
            otherwise,
        } => Expr::Cond {
            span: span.clone(),
            cond: expand(cond, macros)?,
            then: expand(then, macros)?,
            otherwise: expand(otherwise, macros)?,
        },
        Expr::Comprehension {
            span,
            kind,
            var,
            range,
            body,
            filter,
        } => Expr::Comprehension {
            span: span.clone(),
            kind: *kind,
            var: var.clone(),
            range: expand(range, macros)?,
            body: expand(body, macros)?,
            filter: match filter {
                Some(f) => Some(expand(f, macros)?),
                None => None,
            },
        },
        Expr::Let {
            span,
            var,
            value,
            body,
        } => Expr::Let {
            span: span.clone(),
            var: var.clone(),
            value: expand(value, macros)?,
            body: expand(body, macros)?,
        },
    };
    Ok(Ref::new(e))
}
