// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins::utils::{ensure_args_count, ensure_string_or_bytes};
use crate::builtins::{builtin, Overload};
use crate::env::{Library, Registry};
use crate::lexer::Span;
use crate::value::{Kind, Value};

use anyhow::Result;

/// JSON encoding and decoding of values.
pub struct Json;

impl Library for Json {
    fn name(&self) -> &'static str {
        "json"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        use Kind::*;

        r.function(
            "encode_json",
            vec![Overload::both("encode_json_dyn", &[Dyn])],
            builtin(encode_json),
        )?;
        r.function(
            "decode_json",
            vec![
                Overload::both("decode_json_string", &[String]),
                Overload::both("decode_json_bytes", &[Bytes]),
            ],
            builtin(decode_json),
        )?;
        r.function(
            "decode_json_stream",
            vec![
                Overload::both("decode_json_stream_string", &[String]),
                Overload::both("decode_json_stream_bytes", &[Bytes]),
            ],
            builtin(decode_json_stream),
        )?;
        Ok(())
    }
}

fn encode_json(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "encode_json", params, args, 1)?;
    Ok(match serde_json::to_string(&args[0]) {
        Ok(s) => Value::from(s),
        Err(e) => Value::error(format!("failed to encode json: {e}")),
    })
}

fn decode_json(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "decode_json";
    ensure_args_count(span, name, params, args, 1)?;
    let doc = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(match serde_json::from_slice::<Value>(&doc) {
        Ok(v) => v,
        Err(e) => Value::error(format!("failed to decode json: {e}")),
    })
}

/// Decodes a sequence of concatenated JSON documents into a list.
pub fn decode_stream(doc: &[u8]) -> Result<Vec<Value>, serde_json::Error> {
    serde_json::Deserializer::from_slice(doc)
        .into_iter::<Value>()
        .collect()
}

fn decode_json_stream(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "decode_json_stream";
    ensure_args_count(span, name, params, args, 1)?;
    let doc = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(match decode_stream(&doc) {
        Ok(list) => Value::from(list),
        Err(e) => Value::error(format!("failed to decode json stream: {e}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_of_documents() {
        let list = decode_stream(br#"{"a":1} {"a":2}
[3]"#)
        .unwrap();
        assert_eq!(
            Value::from(list),
            Value::from_json_str(r#"[{"a":1},{"a":2},[3]]"#).unwrap()
        );
        assert!(decode_stream(b"{} {").is_err());
        assert!(decode_stream(b"").unwrap().is_empty());
    }
}
