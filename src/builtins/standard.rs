// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins::utils::ensure_args_count;
use crate::builtins::{builtin, Overload};
use crate::env::Registry;
use crate::lexer::Span;
use crate::value::{format_duration, format_timestamp, Kind, Value};

use anyhow::{bail, Result};
use chrono::{DateTime, TimeDelta, Utc};

pub fn register(r: &mut Registry) -> Result<()> {
    use Kind::*;

    r.function(
        "size",
        vec![
            Overload::both("size_string", &[String]),
            Overload::both("size_bytes", &[Bytes]),
            Overload::both("size_list", &[List]),
            Overload::both("size_map", &[Map]),
        ],
        builtin(size),
    )?;
    r.function(
        "int",
        vec![
            Overload::global("int_int", &[Int]),
            Overload::global("double_to_int", &[Float]),
            Overload::global("string_to_int", &[String]),
            Overload::global("timestamp_to_int", &[Timestamp]),
        ],
        builtin(to_int),
    )?;
    r.function(
        "double",
        vec![
            Overload::global("double_double", &[Float]),
            Overload::global("int_to_double", &[Int]),
            Overload::global("string_to_double", &[String]),
        ],
        builtin(to_double),
    )?;
    r.function(
        "string",
        vec![
            Overload::global("string_string", &[String]),
            Overload::global("bool_to_string", &[Bool]),
            Overload::global("int_to_string", &[Int]),
            Overload::global("double_to_string", &[Float]),
            Overload::global("bytes_to_string", &[Bytes]),
            Overload::global("timestamp_to_string", &[Timestamp]),
            Overload::global("duration_to_string", &[Duration]),
        ],
        builtin(to_string),
    )?;
    r.function(
        "bytes",
        vec![
            Overload::global("bytes_bytes", &[Bytes]),
            Overload::global("string_to_bytes", &[String]),
        ],
        builtin(to_bytes),
    )?;
    r.function(
        "duration",
        vec![
            Overload::global("duration_duration", &[Duration]),
            Overload::global("string_to_duration", &[String]),
        ],
        builtin(to_duration),
    )?;
    r.function(
        "timestamp",
        vec![
            Overload::global("timestamp_timestamp", &[Timestamp]),
            Overload::global("string_to_timestamp", &[String]),
            Overload::global("int_to_timestamp", &[Int]),
        ],
        builtin(to_timestamp),
    )?;
    r.function(
        "type",
        vec![Overload::global("type", &[Dyn])],
        builtin(type_name),
    )?;
    Ok(())
}

fn size(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "size", params, args, 1)?;
    Ok(match &args[0] {
        Value::String(s) => Value::from(s.chars().count()),
        Value::Bytes(b) => Value::from(b.len()),
        Value::List(l) => Value::from(l.len()),
        Value::Map(m) => Value::from(m.len()),
        v => bail!(params[0].span().error(&format!("`size` cannot be applied to {}", v.kind()))),
    })
}

fn to_int(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "int", params, args, 1)?;
    Ok(match &args[0] {
        Value::Int(i) => Value::Int(*i),
        Value::Float(f) => {
            // i64::MAX as f64 rounds up to 2^63 which is itself out of range.
            if f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                Value::Int(f.trunc() as i64)
            } else {
                Value::error(format!("range error converting {f} to int"))
            }
        }
        Value::String(s) => match s.parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(e) => Value::error(format!("cannot convert {s:?} to int: {e}")),
        },
        Value::Timestamp(t) => Value::Int(t.timestamp()),
        v => bail!(params[0].span().error(&format!("`int` cannot be applied to {}", v.kind()))),
    })
}

fn to_double(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "double", params, args, 1)?;
    Ok(match &args[0] {
        Value::Float(f) => Value::Float(*f),
        Value::Int(i) => Value::Float(*i as f64),
        Value::String(s) => match s.parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(e) => Value::error(format!("cannot convert {s:?} to double: {e}")),
        },
        v => bail!(params[0]
            .span()
            .error(&format!("`double` cannot be applied to {}", v.kind()))),
    })
}

fn to_string(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "string", params, args, 1)?;
    Ok(match &args[0] {
        Value::String(s) => Value::String(s.clone()),
        Value::Bool(b) => Value::from(b.to_string()),
        Value::Int(i) => Value::from(i.to_string()),
        Value::Float(f) => Value::from(f.to_string()),
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::from(s),
            Err(e) => Value::error(format!("invalid UTF-8 in bytes: {e}")),
        },
        Value::Timestamp(t) => Value::from(format_timestamp(t)),
        Value::Duration(d) => Value::from(format_duration(d)),
        v => bail!(params[0]
            .span()
            .error(&format!("`string` cannot be applied to {}", v.kind()))),
    })
}

fn to_bytes(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "bytes", params, args, 1)?;
    Ok(match &args[0] {
        Value::Bytes(b) => Value::Bytes(b.clone()),
        Value::String(s) => Value::from(s.as_bytes().to_vec()),
        v => bail!(params[0]
            .span()
            .error(&format!("`bytes` cannot be applied to {}", v.kind()))),
    })
}

fn to_duration(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "duration", params, args, 1)?;
    Ok(match &args[0] {
        Value::Duration(d) => Value::Duration(*d),
        Value::String(s) => match parse_duration(s) {
            Some(d) => Value::Duration(d),
            None => Value::error(format!("invalid duration {s:?}")),
        },
        v => bail!(params[0]
            .span()
            .error(&format!("`duration` cannot be applied to {}", v.kind()))),
    })
}

fn to_timestamp(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "timestamp", params, args, 1)?;
    Ok(match &args[0] {
        Value::Timestamp(t) => Value::Timestamp(*t),
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(t) => Value::Timestamp(t.with_timezone(&Utc)),
            Err(e) => Value::error(format!("cannot parse {s:?} as timestamp: {e}")),
        },
        Value::Int(i) => match DateTime::from_timestamp(*i, 0) {
            Some(t) => Value::Timestamp(t),
            None => Value::error(format!("timestamp {i} out of range")),
        },
        v => bail!(params[0]
            .span()
            .error(&format!("`timestamp` cannot be applied to {}", v.kind()))),
    })
}

fn type_name(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    ensure_args_count(span, "type", params, args, 1)?;
    Ok(Value::from(args[0].kind().name()))
}

/// Parses durations of the form `1h2m3.5s`, `-300ms` or `0`.
/// Units are ns, us (or µs), ms, s, m and h.
pub fn parse_duration(s: &str) -> Option<TimeDelta> {
    let (neg, mut rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if rest == "0" {
        return Some(TimeDelta::zero());
    }
    if rest.is_empty() {
        return None;
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (num, tail) = rest.split_at(num_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        rest = tail;

        let scale: i128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return None,
        };

        let (whole, frac) = num.split_once('.').unwrap_or((num, ""));
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if !whole.is_empty() {
            total += whole.parse::<i128>().ok()?.checked_mul(scale)?;
        }
        // Digits beyond nanosecond precision of an hour are dropped.
        let frac = &frac[..frac.len().min(15)];
        if !frac.is_empty() {
            let digits = frac.parse::<i128>().ok()?;
            total += digits * scale / 10i128.pow(frac.len() as u32);
        }
        if total > i64::MAX as i128 {
            return None;
        }
    }

    let nanos = i64::try_from(if neg { -total } else { total }).ok()?;
    Some(TimeDelta::nanoseconds(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("1h2m3.5s"), Some(TimeDelta::milliseconds(3_723_500)));
        assert_eq!(parse_duration("-300ms"), Some(TimeDelta::milliseconds(-300)));
        assert_eq!(parse_duration("0"), Some(TimeDelta::zero()));
        assert_eq!(parse_duration("1.5us"), Some(TimeDelta::nanoseconds(1500)));
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("1d"), None);
        assert_eq!(parse_duration(""), None);
    }
}
