// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::lexer::*;
use crate::*;

use core::{cmp, fmt, ops::Deref};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BoolOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    In,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogicOp {
    And,
    Or,
}

/// Loop shapes produced by the comprehension macros.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ComprehensionKind {
    All,
    Exists,
    ExistsOne,
    Map,
    Filter,
}

pub struct NodeRef<T> {
    r: Rc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.r).eq(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Rc::new(t) }
    }
}

pub type Ref<T> = NodeRef<T>;

#[derive(Debug)]
pub enum Expr {
    Null(Span),
    Bool(Span, bool),
    Int(Span, i64),
    Float(Span, f64),
    String(Span, Rc<str>),
    Bytes(Span, Rc<[u8]>),

    Ident(Span),

    List {
        span: Span,
        items: Vec<ExprRef>,
    },

    Map {
        span: Span,
        entries: Vec<(ExprRef, ExprRef)>,
    },

    // a.f, or has(a.f) when test_only is set.
    Select {
        span: Span,
        operand: ExprRef,
        field: Span,
        test_only: bool,
    },

    Index {
        span: Span,
        operand: ExprRef,
        index: ExprRef,
    },

    // f(args) or target.f(args)
    Call {
        span: Span,
        target: Option<ExprRef>,
        name: Span,
        args: Vec<ExprRef>,
    },

    Unary {
        span: Span,
        op: UnaryOp,
        expr: ExprRef,
    },

    Arith {
        span: Span,
        op: ArithOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },

    Compare {
        span: Span,
        op: BoolOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },

    Logic {
        span: Span,
        op: LogicOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },

    Cond {
        span: Span,
        cond: ExprRef,
        then: ExprRef,
        otherwise: ExprRef,
    },

    Comprehension {
        span: Span,
        kind: ComprehensionKind,
        var: Span,
        range: ExprRef,
        body: ExprRef,
        filter: Option<ExprRef>,
    },

    // Evaluates body once with var bound to value.
    Let {
        span: Span,
        var: Span,
        value: ExprRef,
        body: ExprRef,
    },
}

impl Expr {
    pub const fn span(&self) -> &Span {
        match self {
            Expr::Null(s)
            | Expr::Bool(s, _)
            | Expr::Int(s, _)
            | Expr::Float(s, _)
            | Expr::String(s, _)
            | Expr::Bytes(s, _)
            | Expr::Ident(s) => s,
            Expr::List { span, .. }
            | Expr::Map { span, .. }
            | Expr::Select { span, .. }
            | Expr::Index { span, .. }
            | Expr::Call { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Arith { span, .. }
            | Expr::Compare { span, .. }
            | Expr::Logic { span, .. }
            | Expr::Cond { span, .. }
            | Expr::Comprehension { span, .. }
            | Expr::Let { span, .. } => span,
        }
    }

    /// Returns the identifier span if the expression is a plain name.
    pub fn as_ident(&self) -> Option<&Span> {
        match self {
            Expr::Ident(s) => Some(s),
            _ => None,
        }
    }
}

pub type ExprRef = Ref<Expr>;
