// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::env::{Library, Registry};
use crate::value::Value;
use crate::Rc;

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Configured constants exposed as variables.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub values: BTreeMap<String, Value>,
}

impl Library for Globals {
    fn name(&self) -> &'static str {
        "globals"
    }

    fn register(&self, r: &mut Registry) -> Result<()> {
        for (name, value) in &self.values {
            let value = value.clone();
            r.bind_variable(name, Rc::new(move |_: &DateTime<Utc>| value.clone()));
        }
        Ok(())
    }
}
