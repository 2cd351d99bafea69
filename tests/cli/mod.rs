// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::Result;

fn scratch(name: &str, contents: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("evalkit-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(name);
    std::fs::write(&path, contents)?;
    Ok(path)
}

fn evalkit(args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_evalkit")).args(args).output()?)
}

fn path_str(p: &PathBuf) -> &str {
    p.to_str().unwrap()
}

#[test]
fn evaluates_against_state() -> Result<()> {
    let src = scratch("collate.cel", r#"state.collate("a.b")"#)?;
    let data = scratch("collate.json", r#"{"a": [{"b": 1}, {"b": 2}]}"#)?;
    let out = evalkit(&["--data", path_str(&data), path_str(&src)])?;
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8(out.stdout)?, "[\n\t1,\n\t2\n]\n");
    Ok(())
}

#[test]
fn globals_from_config() -> Result<()> {
    let src = scratch("globals.cel", "limit * 2")?;
    let cfg = scratch("globals.yaml", "globals:\n  limit: 21\n")?;
    let out = evalkit(&["--use", "json", "--cfg", path_str(&cfg), path_str(&src)])?;
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8(out.stdout)?, "42\n");
    Ok(())
}

#[test]
fn unknown_library_is_a_usage_error() -> Result<()> {
    let src = scratch("unknown.cel", "1")?;
    let out = evalkit(&["--use", "http", path_str(&src)])?;
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8(out.stderr)?.contains(r#"no lib "http""#));
    Ok(())
}

#[test]
fn soft_error_result_fails() -> Result<()> {
    let src = scratch("empty.cel", "[].max()")?;
    let out = evalkit(&[path_str(&src)])?;
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8(out.stderr)?.contains("max of empty list"));
    Ok(())
}

#[test]
fn compile_error_fails() -> Result<()> {
    let src = scratch("undeclared.cel", "nope + 1")?;
    let out = evalkit(&[path_str(&src)])?;
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8(out.stderr)?.contains("undeclared reference to 'nope'"));
    Ok(())
}
