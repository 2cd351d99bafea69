// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

/// Source of the current time for `now` and rate-limit reset arithmetic.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(t: DateTime<Utc>) -> Self {
        Self(t)
    }

    pub fn from_unix(secs: i64) -> Result<Self> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| anyhow!("unix time {secs} is out of range"))
    }

    pub fn from_rfc3339(s: &str) -> Result<Self> {
        Ok(Self(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
