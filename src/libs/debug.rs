// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins::utils::{ensure_args_count, ensure_string};
use crate::builtins::{builtin, Overload};
use crate::env::{Library, Registry};
use crate::lexer::Span;
use crate::value::{Kind, Value};
use crate::Rc;

use anyhow::Result;

/// Receives the tag and value of each `debug` call.
pub type DebugHandler = Rc<dyn Fn(&str, &Value)>;

/// Logging of intermediate values: `debug(tag, value)` returns `value`
/// unaltered, errors included.
#[derive(Clone, Default)]
pub struct DebugLog {
    handler: Option<DebugHandler>,
}

impl DebugLog {
    /// Sends values to `handler` instead of the `debug` log level.
    pub fn with_handler(handler: DebugHandler) -> Self {
        Self {
            handler: Some(handler),
        }
    }
}

impl Library for DebugLog {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        use Kind::*;

        r.declare(
            "debug",
            vec![Overload::global("debug_string_dyn", &[String, Dyn])],
        )?;
        let handler = self.handler.clone();
        r.bind_non_strict(
            "debug_string_dyn",
            builtin(move |span, params, args| {
                log_value(span, params, args, handler.as_deref())
            }),
        )?;
        Ok(())
    }
}

fn log_value(
    span: &Span,
    params: &[Ref<Expr>],
    args: &[Value],
    handler: Option<&dyn Fn(&str, &Value)>,
) -> Result<Value> {
    let name = "debug";
    ensure_args_count(span, name, params, args, 2)?;
    if let Value::Error(msg) = &args[0] {
        return Ok(Value::Error(msg.clone()));
    }
    let tag = ensure_string(name, &params[0], &args[0])?;
    let value = &args[1];

    match handler {
        Some(handler) => handler(&tag, value),
        None => match value {
            Value::Error(msg) => log::debug!("{tag}: error: {msg}"),
            v => match v.to_json_str() {
                Ok(json) => log::debug!("{tag}: {json}"),
                Err(e) => log::debug!("{tag}: {e}"),
            },
        },
    }
    Ok(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use crate::libs::Try;

    use std::cell::RefCell;

    #[test]
    fn values_and_errors_pass_through() {
        let seen: Rc<RefCell<Vec<(String, Value)>>> = Rc::default();
        let sink = seen.clone();
        let lib = DebugLog::with_handler(Rc::new(move |tag: &str, v: &Value| {
            sink.borrow_mut().push((tag.to_string(), v.clone()))
        }));

        let mut env = Env::new();
        env.add_library(&lib).unwrap();
        env.add_library(&Try).unwrap();

        let program = env.compile(r#"debug("sum", 1 + 2) * 2"#).unwrap();
        assert_eq!(program.eval(&Default::default()).unwrap(), Value::Int(6));

        let program = env.compile(r#"try(debug("div", 1 / 0))"#).unwrap();
        assert_eq!(
            program.eval(&Default::default()).unwrap(),
            Value::from("division by zero")
        );

        assert_eq!(
            *seen.borrow(),
            vec![
                ("sum".to_string(), Value::Int(3)),
                ("div".to_string(), Value::error("division by zero")),
            ]
        );
    }
}
