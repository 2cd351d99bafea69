// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod standard;
pub mod utils;

use crate::ast::ExprRef;
use crate::lexer::Span;
use crate::value::{Kind, Value};
use crate::Rc;

use anyhow::Result;

/// Native implementation of a declared overload.
///
/// `params` are the argument expressions (receiver first for method calls) and
/// are used to point error messages at the offending argument.
pub type BuiltinFcn = Rc<dyn Fn(&Span, &[ExprRef], &[Value]) -> Result<Value>>;

pub fn builtin<F>(f: F) -> BuiltinFcn
where
    F: Fn(&Span, &[ExprRef], &[Value]) -> Result<Value> + 'static,
{
    Rc::new(f)
}

/// How an overload may be called: `f(x, y)`, `x.f(y)` or either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    Global,
    Receiver,
    Both,
}

impl CallStyle {
    pub fn allows(self, receiver: bool) -> bool {
        match self {
            CallStyle::Global => !receiver,
            CallStyle::Receiver => receiver,
            CallStyle::Both => true,
        }
    }
}

/// A single signature of a declared function. For receiver calls the
/// receiver is the first parameter.
#[derive(Debug, Clone)]
pub struct Overload {
    pub id: String,
    pub style: CallStyle,
    pub params: Vec<Kind>,
}

impl Overload {
    pub fn new(id: &str, style: CallStyle, params: &[Kind]) -> Self {
        Self {
            id: id.to_string(),
            style,
            params: params.to_vec(),
        }
    }

    pub fn global(id: &str, params: &[Kind]) -> Self {
        Self::new(id, CallStyle::Global, params)
    }

    pub fn receiver(id: &str, params: &[Kind]) -> Self {
        Self::new(id, CallStyle::Receiver, params)
    }

    pub fn both(id: &str, params: &[Kind]) -> Self {
        Self::new(id, CallStyle::Both, params)
    }

    pub fn accepts(&self, receiver: bool, args: &[Value]) -> bool {
        self.style.allows(receiver)
            && self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(k, v)| k.accepts(v))
    }
}
