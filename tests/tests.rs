// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{bail, Result};
use evalkit::config::Config;
use evalkit::unstable::Source;
use evalkit::{libs, Env, FixedClock, Value};
use serde::Deserialize;
use test_generator::test_resources;

mod cli;

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    expr: String,
    data: Option<Value>,
    libs: Option<String>,
    now: Option<String>,
    cfg: Option<Config>,
    want_result: Option<Value>,
    error: Option<String>,
    skip: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn display_values(computed: &Value, expected: &Value) -> Result<String> {
    Ok(format!(
        "\nleft  = {}\nright = {}\n",
        computed.to_json_str_pretty()?,
        expected.to_json_str_pretty()?
    ))
}

fn eval_case(case: &TestCase) -> Result<Value> {
    let mut env = match &case.now {
        Some(now) => Env::with_clock(Rc::new(FixedClock::from_rfc3339(now)?)),
        None => Env::new(),
    };
    let config = case.cfg.clone().unwrap_or_default();
    let selection = case.libs.as_deref().unwrap_or("all");
    for lib in libs::libraries(selection, &config)? {
        env.add_library(lib.as_ref())?;
    }
    env.declare_variable("state");

    let source = Source::from_contents(format!("<{}>", case.note), case.expr.clone())?;
    let program = env.compile_source(&source)?;

    let mut activation = BTreeMap::new();
    activation.insert(
        "state".to_string(),
        case.data.clone().unwrap_or(Value::Null),
    );
    program.eval(&activation)
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    println!("running {file}");

    for case in &test.cases {
        print!("case {} ", case.note);
        if case.skip == Some(true) {
            println!("skipped");
            continue;
        }

        match (&case.want_result, &case.error) {
            (Some(_), None) | (None, Some(_)) => (),
            _ => bail!("{}: either want_result or error must be specified", case.note),
        }

        match (eval_case(case), &case.want_result, &case.error) {
            (Ok(Value::Error(msg)), None, Some(expected)) => {
                if !msg.contains(expected.as_str()) {
                    bail!("{}: error `{msg}` does not contain `{expected}`", case.note);
                }
            }
            (Ok(computed), Some(expected), _) => {
                // Compare in the JSON domain so timestamps, durations and
                // bytes can be written as strings in the case files.
                let computed = Value::from_json_str(&computed.to_json_str()?)?;
                if computed != *expected {
                    bail!(
                        "{}: value mismatch{}",
                        case.note,
                        display_values(&computed, expected)?
                    );
                }
            }
            (Ok(computed), None, _) => {
                bail!(
                    "{}: eval succeeded with {} and did not produce any errors",
                    case.note,
                    computed.to_json_str()?
                );
            }
            (Err(actual), _, Some(expected)) => {
                let actual = actual.to_string();
                if !actual.contains(expected.as_str()) {
                    bail!(
                        "{}: error message\n`{actual}`\ndoes not contain `{expected}`",
                        case.note
                    );
                }
            }
            (Err(actual), _, None) => return Err(actual),
        }

        println!("passed");
    }

    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/cases/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
