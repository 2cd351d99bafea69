// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::env::Registry;
use crate::lexer::Span;

use anyhow::{bail, Result};

/// Validates names and call shapes of an expanded expression against the
/// declarations in a registry.
pub struct Checker<'a> {
    registry: &'a Registry,
    scopes: Vec<String>,
}

impl<'a> Checker<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            scopes: vec![],
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s == name) || self.registry.has_variable(name)
    }

    fn check_scoped(&mut self, var: &str, exprs: &[&ExprRef]) -> Result<()> {
        self.scopes.push(var.to_string());
        let r = exprs.iter().try_for_each(|e| self.check(e));
        self.scopes.pop();
        r
    }

    fn check_call(&self, name: &str, span: &Span, receiver: bool, arity: usize) -> Result<()> {
        let Some(overloads) = self.registry.overloads(name) else {
            bail!(span.error(&format!("undeclared reference to '{name}'")));
        };
        let arity = arity + usize::from(receiver);
        if !overloads
            .iter()
            .any(|o| o.style.allows(receiver) && o.params.len() == arity)
        {
            let style = if receiver { "receiver" } else { "global" };
            bail!(span.error(&format!(
                "found no matching overload for '{name}' as {style} call with {arity} argument(s)"
            )));
        }
        Ok(())
    }

    pub fn check(&mut self, expr: &ExprRef) -> Result<()> {
        match expr.as_ref() {
            Expr::Null(_)
            | Expr::Bool(..)
            | Expr::Int(..)
            | Expr::Float(..)
            | Expr::String(..)
            | Expr::Bytes(..) => Ok(()),
            Expr::Ident(span) => {
                if !self.is_bound(span.text()) {
                    bail!(span.error(&format!("undeclared reference to '{}'", span.text())));
                }
                Ok(())
            }
            Expr::List { items, .. } => items.iter().try_for_each(|i| self.check(i)),
            Expr::Map { entries, .. } => entries.iter().try_for_each(|(k, v)| {
                self.check(k)?;
                self.check(v)
            }),
            Expr::Select { operand, .. } => self.check(operand),
            Expr::Index { operand, index, .. } => {
                self.check(operand)?;
                self.check(index)
            }
            Expr::Call {
                target, name, args, ..
            } => {
                self.check_call(name.text(), name, target.is_some(), args.len())?;
                if let Some(t) = target {
                    self.check(t)?;
                }
                args.iter().try_for_each(|a| self.check(a))
            }
            Expr::Unary { expr, .. } => self.check(expr),
            Expr::Arith { lhs, rhs, .. }
            | Expr::Compare { lhs, rhs, .. }
            | Expr::Logic { lhs, rhs, .. } => {
                self.check(lhs)?;
                self.check(rhs)
            }
            Expr::Cond {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.check(cond)?;
                self.check(then)?;
                self.check(otherwise)
            }
            Expr::Comprehension {
                var,
                range,
                body,
                filter,
                ..
            } => {
                self.check(range)?;
                match filter {
                    Some(f) => self.check_scoped(var.text(), &[f, body]),
                    None => self.check_scoped(var.text(), &[body]),
                }
            }
            Expr::Let {
                var, value, body, ..
            } => {
                self.check(value)?;
                self.check_scoped(var.text(), &[body])
            }
        }
    }
}
