// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A small CEL-like expression evaluator together with a set of extension
//! libraries that get registered into it: collection reshaping over
//! dotted paths, rate-limit header policy interpretation, string, JSON,
//! crypto, time and regular expression helpers.
//!
//! ```ignore
//! use evalkit::{libs, Env, Value};
//!
//! let mut env = Env::new();
//! env.add_library(&libs::Collections)?;
//! env.declare_variable("state");
//!
//! let program = env.compile(r#"state.collate("a.b")"#)?;
//! let input = Value::from_json_str(r#"{"a": [{"b": 1}, {"b": 2}]}"#)?;
//! let result = program.eval_with("state", input)?;
//! ```

mod ast;
pub mod builtins;
mod checker;
mod clock;
pub mod config;
mod env;
mod interpreter;
mod lexer;
pub mod libs;
mod macros;
mod parser;
mod value;

pub use clock::{Clock, FixedClock, SystemClock};
pub use env::{Env, Library, Program, Registry};
pub use value::{Kind, Value};

use std::rc::Rc;

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::lexer::*;
    pub use crate::macros::*;
    pub use crate::parser::*;
}
