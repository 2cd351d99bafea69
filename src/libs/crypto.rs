// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins::utils::{ensure_args_count, ensure_bytes, ensure_string, ensure_string_or_bytes};
use crate::builtins::{builtin, BuiltinFcn, Overload};
use crate::env::{Library, Registry};
use crate::lexer::Span;
use crate::value::{Kind, Value};

use anyhow::{bail, Result};
use data_encoding::{BASE64, BASE64_NOPAD, HEXLOWER};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;

/// Encodings, digests, HMAC and random UUIDs.
pub struct Crypto;

impl Library for Crypto {
    fn name(&self) -> &'static str {
        "crypto"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        use Kind::*;

        // Functions taking either string or bytes data.
        let data_fcns: &[(&str, BuiltinFcn)] = &[
            ("base64", builtin(base64)),
            ("base64_raw", builtin(base64_raw)),
            ("hex", builtin(hex)),
            ("md5", builtin(md5_hash)),
            ("sha1", builtin(sha1_hash)),
            ("sha256", builtin(sha256_hash)),
        ];
        for (name, fcn) in data_fcns {
            r.function(
                name,
                vec![
                    Overload::both(&format!("{name}_bytes"), &[Bytes]),
                    Overload::both(&format!("{name}_string"), &[String]),
                ],
                fcn.clone(),
            )?;
        }

        r.function(
            "base64_decode",
            vec![
                Overload::both("base64_decode_string", &[String]),
                Overload::both("base64_decode_bytes", &[Bytes]),
            ],
            builtin(base64_decode),
        )?;
        r.function(
            "base64_raw_decode",
            vec![
                Overload::both("base64_raw_decode_string", &[String]),
                Overload::both("base64_raw_decode_bytes", &[Bytes]),
            ],
            builtin(base64_raw_decode),
        )?;
        r.function(
            "hmac",
            vec![
                Overload::both("hmac_bytes_string_bytes", &[Bytes, String, Bytes]),
                Overload::both("hmac_string_string_bytes", &[String, String, Bytes]),
            ],
            builtin(hmac_sum),
        )?;
        r.function(
            "uuid",
            vec![Overload::global("uuid_string", &[])],
            builtin(uuid_v4),
        )?;
        Ok(())
    }
}

fn base64(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "base64";
    ensure_args_count(span, name, params, args, 1)?;
    let data = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(Value::from(BASE64.encode(&data)))
}

fn base64_raw(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "base64_raw";
    ensure_args_count(span, name, params, args, 1)?;
    let data = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(Value::from(BASE64_NOPAD.encode(&data)))
}

fn base64_decode(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "base64_decode";
    ensure_args_count(span, name, params, args, 1)?;
    let data = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(match BASE64.decode(&data) {
        Ok(b) => Value::from(b),
        Err(e) => Value::error(format!("{name}: {e}")),
    })
}

fn base64_raw_decode(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "base64_raw_decode";
    ensure_args_count(span, name, params, args, 1)?;
    let data = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(match BASE64_NOPAD.decode(&data) {
        Ok(b) => Value::from(b),
        Err(e) => Value::error(format!("{name}: {e}")),
    })
}

fn hex(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "hex";
    ensure_args_count(span, name, params, args, 1)?;
    let data = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(Value::from(HEXLOWER.encode(&data)))
}

fn md5_hash(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "md5";
    ensure_args_count(span, name, params, args, 1)?;
    let data = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(Value::from(Md5::digest(&data).to_vec()))
}

fn sha1_hash(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "sha1";
    ensure_args_count(span, name, params, args, 1)?;
    let data = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(Value::from(Sha1::digest(&data).to_vec()))
}

fn sha256_hash(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "sha256";
    ensure_args_count(span, name, params, args, 1)?;
    let data = ensure_string_or_bytes(name, &params[0], &args[0])?;
    Ok(Value::from(Sha256::digest(&data).to_vec()))
}

fn hmac_sum(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "hmac";
    ensure_args_count(span, name, params, args, 3)?;
    let data = ensure_string_or_bytes(name, &params[0], &args[0])?;
    let algorithm = ensure_string(name, &params[1], &args[1])?;
    let key = ensure_bytes(name, &params[2], &args[2])?;

    let sum = match algorithm.as_ref() {
        "sha1" => {
            let mut mac = Hmac::<Sha1>::new_from_slice(&key)
                .or_else(|_| bail!(span.error("failed to create hmac instance")))?;
            mac.update(&data);
            mac.finalize().into_bytes().to_vec()
        }
        "sha256" => {
            let mut mac = Hmac::<Sha256>::new_from_slice(&key)
                .or_else(|_| bail!(span.error("failed to create hmac instance")))?;
            mac.update(&data);
            mac.finalize().into_bytes().to_vec()
        }
        _ => return Ok(Value::error(format!("invalid hash for hmac: {algorithm}"))),
    };
    Ok(Value::from(sum))
}

fn uuid_v4(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "uuid", params, args, 0)?;
    Ok(Value::from(uuid::Uuid::new_v4().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digests() {
        assert_eq!(
            HEXLOWER.encode(&Md5::digest(b"hello world")),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            HEXLOWER.encode(&Sha256::digest(b"hello world")),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
