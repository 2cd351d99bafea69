// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Translation of HTTP rate-limit response headers into a token bucket
//! description: `rate` and `next` (events per second), `burst` and `reset`.
//!
//! A result holding only `headers` means a required header was missing.
//! A result with an `error` field means a header could not be parsed.

use crate::ast::{Expr, Ref};
use crate::builtins::utils::{
    ensure_args_count, ensure_bool, ensure_duration, ensure_int, ensure_map, ensure_string,
};
use crate::builtins::{builtin, Overload};
use crate::clock::Clock;
use crate::env::{Library, Registry};
use crate::lexer::Span;
use crate::value::{Kind, Value};
use crate::Rc;

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use log::debug;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("parsing {0:?}: invalid syntax")]
    InvalidNumber(String),

    #[error("could not parse {0:?} as number or timestamp")]
    InvalidReset(String),

    #[error("invalid policy: {0:?}")]
    InvalidPolicy(String),

    #[error("unknown policy: {0:?}")]
    UnknownPolicy(String),

    #[error("invalid header value for {key}: {kind}")]
    InvalidHeader { key: String, kind: Kind },
}

/// Response headers; each name maps to one or more values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, Vec<String>>);

impl Headers {
    pub fn from_value(v: &BTreeMap<Value, Value>) -> Result<Self, LimitError> {
        let mut headers = BTreeMap::new();
        for (k, v) in v {
            let key = match k {
                Value::String(s) => s.to_string(),
                _ => k.to_string(),
            };
            let values = match v {
                Value::String(s) => vec![s.to_string()],
                Value::List(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items.iter() {
                        match item {
                            Value::String(s) => values.push(s.to_string()),
                            _ => {
                                return Err(LimitError::InvalidHeader {
                                    key,
                                    kind: item.kind(),
                                })
                            }
                        }
                    }
                    values
                }
                _ => return Err(LimitError::InvalidHeader { key, kind: v.kind() }),
            };
            headers.insert(key, values);
        }
        Ok(Self(headers))
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.0
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }

    /// First value of the header, matching names in canonical MIME form.
    pub fn get(&self, key: &str) -> &str {
        let want = canonical_key(key);
        self.0
            .iter()
            .find(|(k, _)| canonical_key(k) == want)
            .and_then(|(_, v)| v.first())
            .map_or("", |s| s.as_str())
    }

    /// First value of the header with exactly this name.
    pub fn get_exact(&self, key: &str) -> &str {
        self.0
            .get(key)
            .and_then(|v| v.first())
            .map_or("", |s| s.as_str())
    }

    fn lookup(&self, key: &str, canonical: bool) -> &str {
        match canonical {
            true => self.get(key),
            false => self.get_exact(key),
        }
    }
}

/// `x-rate-limit-limit` becomes `X-Rate-Limit-Limit`. Names containing
/// spaces or non-token bytes are returned unchanged.
pub fn canonical_key(key: &str) -> String {
    let valid = key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for c in key.chars() {
        out.push(match upper {
            true => c.to_ascii_uppercase(),
            false => c.to_ascii_lowercase(),
        });
        upper = c == '-';
    }
    out
}

/// Result of translating one set of headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    pub headers: String,
    pub rate: Option<f64>,
    pub next: Option<f64>,
    pub burst: Option<i64>,
    pub reset: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

struct Rates {
    rate: f64,
    next: f64,
    burst: i64,
    reset: DateTime<Utc>,
}

impl Translation {
    fn new(keys: [&str; 3], values: [&str; 3]) -> Self {
        let headers = keys
            .iter()
            .zip(values.iter())
            .map(|(k, v)| format!("{k}={v:?}"))
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            headers,
            ..Default::default()
        }
    }

    fn complete(mut self, rates: Result<Rates, LimitError>) -> Self {
        match rates {
            Ok(r) => {
                self.rate = Some(r.rate);
                self.next = Some(r.next);
                self.burst = Some(r.burst);
                self.reset = Some(r.reset);
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self
    }

    pub fn to_value(&self) -> Value {
        let mut m = BTreeMap::new();
        m.insert(Value::from("headers"), Value::from(self.headers.as_str()));
        if let Some(rate) = self.rate {
            m.insert(Value::from("rate"), limit_value(rate));
        }
        if let Some(next) = self.next {
            m.insert(Value::from("next"), limit_value(next));
        }
        if let Some(burst) = self.burst {
            m.insert(Value::from("burst"), Value::from(burst));
        }
        if let Some(reset) = self.reset {
            m.insert(Value::from("reset"), Value::from(reset));
        }
        if let Some(error) = &self.error {
            m.insert(Value::from("error"), Value::from(error.as_str()));
        }
        Value::from(m)
    }
}

fn limit_value(f: f64) -> Value {
    match f {
        f if f.is_nan() => Value::from("nan"),
        f if f.is_infinite() => Value::from("inf"),
        f => Value::Float(f),
    }
}

fn parse_float(s: &str) -> Result<f64, LimitError> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| LimitError::InvalidNumber(s.to_string()))
}

fn parse_int(s: &str) -> Result<i64, LimitError> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| LimitError::InvalidNumber(s.to_string()))
}

fn seconds(d: TimeDelta) -> f64 {
    match d.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => d.num_milliseconds() as f64 / 1e3,
    }
}

fn unix_time(secs: i64, reset: &str) -> Result<DateTime<Utc>, LimitError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| LimitError::InvalidReset(reset.to_string()))
}

/// Parses an HTTP-date (`Sat, 16 Apr 2022 07:48:40 GMT`) or an RFC1123 date
/// with a numeric or named zone. The weekday is not checked against the
/// date and zone abbreviations without a known offset are read as UTC.
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let stamp = match s.split_once(',') {
        Some((_, rest)) => rest.trim_start(),
        None => s,
    };
    if let Ok(t) = DateTime::parse_from_rfc2822(stamp) {
        return Some(t.with_timezone(&Utc));
    }
    let (stamp, zone) = stamp.rsplit_once(' ')?;
    if !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, "%d %b %Y %H:%M:%S")
        .ok()
        .map(|t| t.and_utc())
}

/// Resolves a reset header to an instant. Integers are seconds from `now`
/// when `delta` is set and Unix times otherwise.
fn parse_reset(reset: &str, delta: bool, now: DateTime<Utc>) -> Result<DateTime<Utc>, LimitError> {
    if let Ok(d) = reset.trim().parse::<i64>() {
        return match delta {
            true => TimeDelta::try_seconds(d)
                .and_then(|d| now.checked_add_signed(d))
                .ok_or_else(|| LimitError::InvalidReset(reset.to_string())),
            false => unix_time(d, reset),
        };
    }
    parse_date(reset).ok_or_else(|| LimitError::InvalidReset(reset.to_string()))
}

/// A translation from headers to a rate description for a named policy.
pub type Policy = fn(&Headers, TimeDelta, DateTime<Utc>) -> Translation;

/// Okta `X-Rate-Limit-*` headers. The reset header is a Unix time and the
/// window is the quota period documented for the endpoint.
pub fn okta(h: &Headers, window: TimeDelta, now: DateTime<Utc>) -> Translation {
    let keys = [
        "X-Rate-Limit-Limit",
        "X-Rate-Limit-Remaining",
        "X-Rate-Limit-Reset",
    ];
    let values = keys.map(|k| h.get(k));
    let t = Translation::new(keys, values);
    if values.iter().any(|v| v.is_empty()) {
        return t;
    }
    let [limit, remaining, reset] = values;

    let rates = (|| -> Result<Rates, LimitError> {
        let lim = parse_float(limit)?;
        let rem = parse_float(remaining)?;
        let reset = unix_time(parse_int(reset)?, reset)?;
        Ok(Rates {
            rate: rem / seconds(reset - now),
            next: lim / seconds(window),
            // Okta does not document burst rates.
            burst: 1,
            reset,
        })
    })();
    t.complete(rates)
}

/// Splits on `sep` outside double quotes. Backslash escapes inside quotes
/// are kept verbatim.
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = vec![];
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            _ if c == sep && !quoted => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => (),
        }
    }
    parts.push(&s[start..]);
    parts
}

/// One `<quota>;window=<secs>;burst=<n>;...` item of a draft limit header.
struct QuotaPolicy<'a> {
    quota: i64,
    params: Vec<&'a str>,
}

impl<'a> QuotaPolicy<'a> {
    fn parse(field: &'a str) -> Result<Self, LimitError> {
        let mut parts = split_unquoted(field, ';').into_iter().map(str::trim);
        let quota = match (parts.next(), field.contains(';')) {
            (Some(q), true) => parse_int(q)?,
            _ => return Err(LimitError::InvalidPolicy(field.to_string())),
        };
        Ok(Self {
            quota,
            params: parts.collect(),
        })
    }

    fn param(&self, name: &str) -> Result<Option<i64>, LimitError> {
        let mut found = None;
        for p in &self.params {
            if let Some(v) = p.strip_prefix(name).and_then(|p| p.strip_prefix('=')) {
                found = Some(parse_int(v)?);
            }
        }
        Ok(found)
    }
}

/// `Rate-Limit-*` headers from draft-polli-ratelimit-headers. `window` is
/// the quota period used unless a sub-policy in the limit header names one.
pub fn draft(h: &Headers, window: TimeDelta, now: DateTime<Utc>) -> Translation {
    let keys = ["Rate-Limit-Limit", "Rate-Limit-Remaining", "Rate-Limit-Reset"];
    let values = keys.map(|k| h.get(k));
    let t = Translation::new(keys, values);
    if values.iter().any(|v| v.is_empty()) {
        return t;
    }
    let [limit, remaining, reset] = values;

    let rates = (|| -> Result<Rates, LimitError> {
        let rem = parse_float(remaining)?;
        let reset = parse_reset(reset, false, now)?;

        let fields = split_unquoted(limit, ',');
        let quota = parse_int(fields[0])?;
        let mut win = seconds(window);
        let mut burst = 1;
        for field in &fields[1..] {
            let policy = QuotaPolicy::parse(field.trim())?;
            if policy.quota > quota {
                break;
            }
            if let Some(w) = policy.param("window")?.filter(|w| *w >= 0) {
                win = w as f64;
            }
            if let Some(b) = policy.param("burst")?.filter(|b| *b > 0) {
                burst = b;
            }
        }
        debug!("draft quota {quota} over {win}s with burst {burst}");

        Ok(Rates {
            rate: rem / (seconds(reset - now) * win),
            next: quota as f64 / win,
            burst,
            reset,
        })
    })();
    t.complete(rates)
}

/// Headers named `{prefix}-Limit`, `{prefix}-Remaining` and `{prefix}-Reset`.
pub fn generic(
    h: &Headers,
    prefix: &str,
    canonical: bool,
    delta: bool,
    window: TimeDelta,
    burst: i64,
    now: DateTime<Utc>,
) -> Translation {
    let keys = [
        format!("{prefix}-Limit"),
        format!("{prefix}-Remaining"),
        format!("{prefix}-Reset"),
    ];
    let values = [
        h.lookup(&keys[0], canonical),
        h.lookup(&keys[1], canonical),
        h.lookup(&keys[2], canonical),
    ];
    let t = Translation::new([keys[0].as_str(), keys[1].as_str(), keys[2].as_str()], values);
    if values.iter().any(|v| v.is_empty()) {
        return t;
    }
    let [limit, remaining, reset] = values;

    let rates = (|| -> Result<Rates, LimitError> {
        let lim = parse_float(limit)?;
        let rem = parse_float(remaining)?;
        let reset = parse_reset(reset, delta, now)?;
        let win = seconds(window);
        Ok(Rates {
            rate: rem / (seconds(reset - now) * win),
            next: lim / win,
            burst: burst.max(1),
            reset,
        })
    })();
    t.complete(rates)
}

/// The rate_limit function. Named policies are looked up in `policies`.
pub struct Limit {
    pub policies: BTreeMap<&'static str, Policy>,
}

impl Default for Limit {
    fn default() -> Self {
        let mut policies: BTreeMap<&'static str, Policy> = BTreeMap::new();
        policies.insert("okta", okta);
        policies.insert("draft", draft);
        Self { policies }
    }
}

impl Library for Limit {
    fn name(&self) -> &'static str {
        "limit"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        use Kind::*;

        let clock = r.clock();
        let policies = Rc::new(self.policies.clone());
        r.declare(
            "rate_limit",
            vec![
                Overload::global(
                    "map_dyn_rate_limit_string_duration",
                    &[Map, String, Duration],
                ),
                Overload::global(
                    "map_dyn_rate_limit_string_bool_bool_duration_int",
                    &[Map, String, Bool, Bool, Duration, Int],
                ),
            ],
        )?;

        let named_clock = clock.clone();
        r.bind(
            "map_dyn_rate_limit_string_duration",
            builtin(move |span, params, args| {
                rate_limit_policy(span, params, args, &policies, named_clock.as_ref())
            }),
        )?;
        r.bind(
            "map_dyn_rate_limit_string_bool_bool_duration_int",
            builtin(move |span, params, args| {
                rate_limit_generic(span, params, args, clock.as_ref())
            }),
        )?;
        Ok(())
    }
}

fn rate_limit_policy(
    span: &Span,
    params: &[Ref<Expr>],
    args: &[Value],
    policies: &BTreeMap<&'static str, Policy>,
    clock: &dyn Clock,
) -> Result<Value> {
    let name = "rate_limit";
    ensure_args_count(span, name, params, args, 3)?;
    let headers = ensure_map(name, &params[0], &args[0])?;
    let policy = ensure_string(name, &params[1], &args[1])?;
    let window = ensure_duration(name, &params[2], &args[2])?;

    let Some(translate) = policies.get(policy.as_ref()) else {
        return Ok(Value::error(
            LimitError::UnknownPolicy(policy.to_string()).to_string(),
        ));
    };
    let headers = match Headers::from_value(&headers) {
        Ok(h) => h,
        Err(e) => return Ok(Value::error(e.to_string())),
    };
    Ok(translate(&headers, window, clock.now()).to_value())
}

fn rate_limit_generic(
    span: &Span,
    params: &[Ref<Expr>],
    args: &[Value],
    clock: &dyn Clock,
) -> Result<Value> {
    let name = "rate_limit";
    ensure_args_count(span, name, params, args, 6)?;
    let headers = ensure_map(name, &params[0], &args[0])?;
    let prefix = ensure_string(name, &params[1], &args[1])?;
    let canonical = ensure_bool(name, &params[2], &args[2])?;
    let delta = ensure_bool(name, &params[3], &args[3])?;
    let window = ensure_duration(name, &params[4], &args[4])?;
    let burst = ensure_int(name, &params[5], &args[5])?;

    let headers = match Headers::from_value(&headers) {
        Ok(h) => h,
        Err(e) => return Ok(Value::error(e.to_string())),
    };
    Ok(generic(&headers, &prefix, canonical, delta, window, burst, clock.now()).to_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut h = Headers::default();
        for (k, v) in pairs {
            h.insert(k, v);
        }
        h
    }

    #[test]
    fn canonical_keys() {
        assert_eq!(canonical_key("x-rate-limit-limit"), "X-Rate-Limit-Limit");
        assert_eq!(canonical_key("RATE-LIMIT"), "Rate-Limit");
        assert_eq!(canonical_key("bad key"), "bad key");
    }

    #[test]
    fn okta_policy() {
        let h = headers(&[
            ("X-Rate-Limit-Limit", "600"),
            ("x-rate-limit-remaining", "598"),
            ("X-Rate-Limit-Reset", "1650094960"),
        ]);
        let t = okta(&h, TimeDelta::minutes(1), at(1650094960 - 598));
        assert_eq!(
            t.headers,
            r#"X-Rate-Limit-Limit="600" X-Rate-Limit-Remaining="598" X-Rate-Limit-Reset="1650094960""#
        );
        assert_eq!(t.rate, Some(1.0));
        assert_eq!(t.next, Some(10.0));
        assert_eq!(t.burst, Some(1));
        assert_eq!(t.reset, Some(at(1650094960)));
        assert_eq!(t.error, None);
    }

    #[test]
    fn missing_header_is_partial() {
        let h = headers(&[("X-Rate-Limit-Remaining", "598"), ("X-Rate-Limit-Reset", "1")]);
        let t = okta(&h, TimeDelta::minutes(1), at(0));
        assert_eq!(
            t,
            Translation {
                headers: r#"X-Rate-Limit-Limit="" X-Rate-Limit-Remaining="598" X-Rate-Limit-Reset="1""#
                    .to_string(),
                ..Default::default()
            }
        );
        assert_eq!(t.to_value().as_map().unwrap().len(), 1);
    }

    #[test]
    fn parse_error_is_reported_in_result() {
        let h = headers(&[
            ("Rate-Limit-Limit", "5000"),
            ("Rate-Limit-Remaining", "bad syntax"),
            ("Rate-Limit-Reset", "36000"),
        ]);
        let t = draft(&h, TimeDelta::minutes(1), at(0));
        assert_eq!(t.error.as_deref(), Some(r#"parsing "bad syntax": invalid syntax"#));
        assert_eq!(t.rate, None);
        assert_eq!(t.burst, None);
    }

    #[test]
    fn draft_sub_policy_overrides_window_and_burst() {
        let h = headers(&[
            (
                "Rate-Limit-Limit",
                r#"12, 12;window=1; burst=1000;policy="leaky bucket""#,
            ),
            ("Rate-Limit-Remaining", "100"),
            ("Rate-Limit-Reset", "36000"),
        ]);
        let t = draft(&h, TimeDelta::minutes(1), at(35999));
        assert_eq!(t.rate, Some(100.0));
        assert_eq!(t.next, Some(12.0));
        assert_eq!(t.burst, Some(1000));
        assert_eq!(t.reset, Some(at(36000)));
    }

    #[test]
    fn draft_scan_stops_at_larger_quota() {
        let h = headers(&[
            (
                "Rate-Limit-Limit",
                "10, 10;window=2;burst=5, 10;burst=7, 100;window=60;burst=50",
            ),
            ("Rate-Limit-Remaining", "4"),
            ("Rate-Limit-Reset", "Thu, 01 Jan 1970 00:00:10 GMT"),
        ]);
        let t = draft(&h, TimeDelta::minutes(1), at(8));
        assert_eq!(t.burst, Some(7));
        assert_eq!(t.next, Some(5.0));
        assert_eq!(t.rate, Some(1.0));
    }

    #[test]
    fn draft_quoted_separators() {
        let h = headers(&[
            ("Rate-Limit-Limit", r#"1, 1;policy="a;b, \"c\"";burst=3"#),
            ("Rate-Limit-Remaining", "1"),
            ("Rate-Limit-Reset", "10"),
        ]);
        let t = draft(&h, TimeDelta::seconds(1), at(9));
        assert_eq!(t.error, None);
        assert_eq!(t.burst, Some(3));
    }

    #[test]
    fn draft_bad_reset() {
        let h = headers(&[
            ("Rate-Limit-Limit", "1"),
            ("Rate-Limit-Remaining", "1"),
            ("Rate-Limit-Reset", "soon"),
        ]);
        let t = draft(&h, TimeDelta::seconds(1), at(0));
        assert_eq!(
            t.error.as_deref(),
            Some(r#"could not parse "soon" as number or timestamp"#)
        );
    }

    #[test]
    fn generic_delta_and_minimum_burst() {
        let h = headers(&[
            ("X-RateLimit-Limit", "60"),
            ("X-RateLimit-Remaining", "30"),
            ("X-RateLimit-Reset", "15"),
        ]);
        let t = generic(&h, "X-RateLimit", false, true, TimeDelta::seconds(2), 0, at(100));
        assert_eq!(t.reset, Some(at(115)));
        assert_eq!(t.rate, Some(1.0));
        assert_eq!(t.next, Some(30.0));
        assert_eq!(t.burst, Some(1));
    }

    #[test]
    fn generic_exact_keys() {
        let h = headers(&[
            ("x-ratelimit-limit", "60"),
            ("x-ratelimit-remaining", "30"),
            ("x-ratelimit-reset", "115"),
        ]);
        let t = generic(&h, "X-RateLimit", false, false, TimeDelta::seconds(1), 5, at(100));
        assert_eq!(t.rate, None);
        assert_eq!(t.error, None);

        let t = generic(&h, "X-RateLimit", true, false, TimeDelta::seconds(1), 5, at(100));
        assert_eq!(t.rate, Some(2.0));
        assert_eq!(t.burst, Some(5));
    }

    #[test]
    fn infinite_rate_is_rendered_as_inf() {
        let h = headers(&[
            ("X-Rate-Limit-Limit", "10"),
            ("X-Rate-Limit-Remaining", "10"),
            ("X-Rate-Limit-Reset", "100"),
        ]);
        let v = okta(&h, TimeDelta::seconds(1), at(100)).to_value();
        assert_eq!(v["rate"], Value::from("inf"));
        assert_eq!(v["next"], Value::Float(10.0));
    }

    #[test]
    fn reset_dates_with_named_and_numeric_zones() {
        let now = at(0);
        let want = Ok(at(1650095320));
        assert_eq!(parse_reset("Sat, 16 Apr 2022 07:48:40 GMT", false, now), want);
        assert_eq!(parse_reset("Sat, 16 Apr 2022 07:48:40 UTC", false, now), want);
        assert_eq!(parse_reset("Sat, 16 Apr 2022 07:48:40 CET", false, now), want);
        assert_eq!(parse_reset("Fri, 16 Apr 2022 07:48:40 GMT", false, now), want);
        assert_eq!(parse_reset("Sat, 16 Apr 2022 09:48:40 +0200", false, now), want);
        assert_eq!(parse_reset("Sat, 16 Apr 2022 00:48:40 PDT", false, now), want);
        assert_eq!(
            parse_reset("16 Apr 2022 07:48:40 +02:00x", false, now),
            Err(LimitError::InvalidReset("16 Apr 2022 07:48:40 +02:00x".to_string()))
        );
    }

    #[test]
    fn malformed_limits_are_reported() {
        let h = headers(&[
            ("X-RateLimit-Limit", "x"),
            ("X-RateLimit-Remaining", "30"),
            ("X-RateLimit-Reset", "15"),
        ]);
        let t = generic(&h, "X-RateLimit", false, true, TimeDelta::seconds(1), 1, at(0));
        assert_eq!(t.error.as_deref(), Some(r#"parsing "x": invalid syntax"#));
        assert_eq!(t.rate, None);

        let h = headers(&[
            ("X-Rate-Limit-Limit", "many"),
            ("X-Rate-Limit-Remaining", "1"),
            ("X-Rate-Limit-Reset", "10"),
        ]);
        let t = okta(&h, TimeDelta::seconds(1), at(0));
        assert_eq!(t.error.as_deref(), Some(r#"parsing "many": invalid syntax"#));
    }

    #[test]
    fn okta_reset_must_be_an_integer() {
        let h = headers(&[
            ("X-Rate-Limit-Limit", "10"),
            ("X-Rate-Limit-Remaining", "1"),
            ("X-Rate-Limit-Reset", "Sat, 16 Apr 2022 07:48:40 GMT"),
        ]);
        let t = okta(&h, TimeDelta::seconds(1), at(0));
        assert_eq!(
            t.error.as_deref(),
            Some(r#"parsing "Sat, 16 Apr 2022 07:48:40 GMT": invalid syntax"#)
        );
        assert_eq!(t.reset, None);
    }

    #[test]
    fn draft_field_without_parameters() {
        let h = headers(&[
            ("Rate-Limit-Limit", "10, 5"),
            ("Rate-Limit-Remaining", "1"),
            ("Rate-Limit-Reset", "10"),
        ]);
        let t = draft(&h, TimeDelta::seconds(1), at(0));
        assert_eq!(t.error.as_deref(), Some(r#"invalid policy: "5""#));
    }

    #[test]
    fn exhausted_quota_at_reset_is_rendered_as_nan() {
        let h = headers(&[
            ("X-Rate-Limit-Limit", "10"),
            ("X-Rate-Limit-Remaining", "0"),
            ("X-Rate-Limit-Reset", "100"),
        ]);
        let t = okta(&h, TimeDelta::seconds(1), at(100));
        assert!(t.rate.is_some_and(f64::is_nan));
        let v = t.to_value();
        assert_eq!(v["rate"], Value::from("nan"));
        assert_eq!(v["next"], Value::Float(10.0));
    }

    #[test]
    fn header_values_must_be_strings() {
        let v = Value::from_json_str(r#"{"A": ["x", 1]}"#).unwrap();
        let err = Headers::from_value(v.as_map().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "invalid header value for A: int");

        let v = Value::from_json_str(r#"{"A": ["x", "y"], "B": "z"}"#).unwrap();
        let h = Headers::from_value(v.as_map().unwrap()).unwrap();
        assert_eq!(h.get("a"), "x");
        assert_eq!(h.get_exact("B"), "z");
    }
}
