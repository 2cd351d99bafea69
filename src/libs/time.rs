// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Expr, Ref};
use crate::builtins::utils::{
    ensure_args_count, ensure_string, ensure_string_collection, ensure_timestamp,
};
use crate::builtins::{builtin, Overload};
use crate::env::{Library, Registry};
use crate::lexer::Span;
use crate::value::{Kind, Value};
use crate::Rc;

use std::collections::BTreeMap;
use std::fmt::Write;

use anyhow::Result;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;

lazy_static! {
    /// Named layouts exposed as the `time_layout` variable.
    pub static ref TIME_LAYOUTS: BTreeMap<&'static str, &'static str> = {
        let mut m = BTreeMap::new();
        m.insert("Layout", "%m/%d %I:%M:%S%p '%y %z");
        m.insert("ANSIC", "%a %b %e %H:%M:%S %Y");
        m.insert("UnixDate", "%a %b %e %H:%M:%S %Z %Y");
        m.insert("RubyDate", "%a %b %d %H:%M:%S %z %Y");
        m.insert("RFC822", "%d %b %y %H:%M %Z");
        m.insert("RFC822Z", "%d %b %y %H:%M %z");
        m.insert("RFC850", "%A, %d-%b-%y %H:%M:%S %Z");
        m.insert("RFC1123", "%a, %d %b %Y %H:%M:%S %Z");
        m.insert("RFC1123Z", "%a, %d %b %Y %H:%M:%S %z");
        m.insert("RFC3339", "%Y-%m-%dT%H:%M:%S%:z");
        m.insert("RFC3339Nano", "%Y-%m-%dT%H:%M:%S%.f%:z");
        m.insert("Kitchen", "%-I:%M%p");
        m.insert("Stamp", "%b %e %H:%M:%S");
        m.insert("StampMilli", "%b %e %H:%M:%S%.3f");
        m.insert("StampMicro", "%b %e %H:%M:%S%.6f");
        m.insert("StampNano", "%b %e %H:%M:%S%.9f");
        m
    };
}

/// Time variables and layout based formatting and parsing.
pub struct Time;

impl Library for Time {
    fn name(&self) -> &'static str {
        "time"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        use Kind::*;

        r.bind_variable("now", Rc::new(|start: &DateTime<Utc>| Value::from(*start)));
        r.bind_variable(
            "time_layout",
            Rc::new(|_: &DateTime<Utc>| {
                Value::from(
                    TIME_LAYOUTS
                        .iter()
                        .map(|(k, v)| (Value::from(*k), Value::from(*v)))
                        .collect::<BTreeMap<_, _>>(),
                )
            }),
        );

        let clock = r.clock();
        r.function(
            "now",
            vec![Overload::global("now_void", &[])],
            builtin(move |span, params, args| {
                ensure_args_count(span, "now", params, args, 0)?;
                Ok(Value::from(clock.now()))
            }),
        )?;
        r.function(
            "format",
            vec![Overload::receiver("timestamp_format_string", &[Timestamp, String])],
            builtin(format),
        )?;
        r.function(
            "parse_time",
            vec![
                Overload::receiver("string_parse_time_string", &[String, String]),
                Overload::receiver("string_parse_time_list_string", &[String, List]),
            ],
            builtin(parse_time),
        )?;
        Ok(())
    }
}

/// Formats `t` with a strftime layout. Invalid layouts are rejected rather
/// than rendered partially.
pub fn format_time(t: &DateTime<Utc>, layout: &str) -> Option<String> {
    let items: Vec<Item> = StrftimeItems::new(layout).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", t.format_with_items(items.iter())).ok()?;
    Some(out)
}

/// Parses `s` with a strftime layout. Values without an offset are taken to
/// be UTC; a missing date defaults to January 1 of year 0 and a missing year
/// to year 0.
pub fn parse_with_layout(s: &str, layout: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let normalized;
    let s = match (layout.ends_with("%:z"), s.strip_suffix('Z')) {
        (true, Some(rest)) => {
            normalized = format!("{rest}+00:00");
            normalized.as_str()
        }
        _ => s,
    };

    let first = match DateTime::parse_from_str(s, layout) {
        Ok(t) => return Ok(t.with_timezone(&Utc)),
        Err(e) => e,
    };
    if let Ok(t) = NaiveDateTime::parse_from_str(s, layout) {
        return Ok(t.and_utc());
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(&format!("0000 {s}"), &format!("%Y {layout}")) {
        return Ok(t.and_utc());
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(
        &format!("0000-01-01 {s}"),
        &format!("%Y-%m-%d {layout}"),
    ) {
        return Ok(t.and_utc());
    }
    Err(first)
}

fn format(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "format";
    ensure_args_count(span, name, params, args, 2)?;
    let t = ensure_timestamp(name, &params[0], &args[0])?;
    let layout = ensure_string(name, &params[1], &args[1])?;
    Ok(match format_time(&t, &layout) {
        Some(s) => Value::from(s),
        None => Value::error(format!("invalid time layout: {layout:?}")),
    })
}

fn parse_time(span: &Span, params: &[Ref<Expr>], args: &[Value]) -> Result<Value> {
    let name = "parse_time";
    ensure_args_count(span, name, params, args, 2)?;
    let s = ensure_string(name, &params[0], &args[0])?;

    if let Value::String(layout) = &args[1] {
        return Ok(match parse_with_layout(&s, layout) {
            Ok(t) => Value::from(t),
            Err(e) => Value::error(format!("failed to parse {s:?} as {layout:?}: {e}")),
        });
    }

    let layouts = ensure_string_collection(name, &params[1], &args[1])?;
    for layout in layouts {
        if let Ok(t) = parse_with_layout(&s, layout) {
            return Ok(Value::from(t));
        }
    }
    Ok(Value::error(format!(
        "failed to parse {s} with any provided layout"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(name: &str) -> &'static str {
        TIME_LAYOUTS[name]
    }

    #[test]
    fn rfc3339_round_trip() {
        let t = parse_with_layout("2022-04-16T07:48:40Z", layout("RFC3339")).unwrap();
        assert_eq!(t.timestamp(), 1650095320);
        assert_eq!(
            format_time(&t, layout("RFC3339")).unwrap(),
            "2022-04-16T07:48:40+00:00"
        );
        let t = parse_with_layout("2022-04-16T09:48:40+02:00", layout("RFC3339")).unwrap();
        assert_eq!(t.timestamp(), 1650095320);
    }

    #[test]
    fn partial_layouts() {
        let t = parse_with_layout("11:17AM", layout("Kitchen")).unwrap();
        assert_eq!(format_time(&t, "%Y-%m-%d %H:%M").unwrap(), "0000-01-01 11:17");

        let t = parse_with_layout("Apr 16 07:48:40", layout("Stamp")).unwrap();
        assert_eq!(format_time(&t, "%m-%d %H:%M:%S").unwrap(), "04-16 07:48:40");

        assert!(parse_with_layout("11:17AM", layout("RFC3339")).is_err());
    }

    #[test]
    fn named_zone_is_skipped() {
        let t = parse_with_layout("Sat, 16 Apr 2022 07:48:40 GMT", layout("RFC1123")).unwrap();
        assert_eq!(t.timestamp(), 1650095320);
    }

    #[test]
    fn invalid_layout() {
        let t = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!(format_time(&t, "%Q"), None);
        assert_eq!(format_time(&t, "%Y").unwrap(), "1970");
    }
}
