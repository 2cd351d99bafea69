// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use evalkit::config::Config;
use evalkit::unstable::Source;
use evalkit::{libs, Env, Value};

/// Evaluate an expression file against JSON input bound to `state`.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Comma separated libraries to enable, or `all`.
    #[arg(long = "use", default_value = "all")]
    libs: String,

    /// JSON file exposed as `state`.
    #[arg(long)]
    data: Option<String>,

    /// YAML configuration file.
    #[arg(long)]
    cfg: Option<String>,

    /// Expression file.
    src: String,
}

/// Failures that prevent evaluation from starting.
struct Setup(anyhow::Error);

fn setup(cli: &Cli) -> Result<(Env, Source, Value), Setup> {
    let prepare = || -> Result<(Env, Source, Value)> {
        let config = match &cli.cfg {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        let mut env = Env::new();
        for lib in libs::libraries(&cli.libs, &config)? {
            env.add_library(lib.as_ref())?;
        }
        env.declare_variable("state");

        let src =
            Source::from_file(&cli.src).with_context(|| format!("failed to read {}", cli.src))?;
        let input = match &cli.data {
            Some(path) => Value::from_json_file(path)?,
            None => Value::Null,
        };
        Ok((env, src, input))
    };
    prepare().map_err(Setup)
}

fn run(env: &Env, src: &Source, input: Value) -> Result<Value> {
    let program = env.compile_source(src)?;
    let mut activation = BTreeMap::new();
    activation.insert("state".to_string(), input);
    let result = program.eval(&activation)?;
    if let Value::Error(msg) = &result {
        anyhow::bail!("{msg}");
    }
    Ok(result)
}

fn main() -> ExitCode {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "warn");
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let (env, src, input) = match setup(&cli) {
        Ok(v) => v,
        Err(Setup(e)) => {
            eprintln!("{e:#}");
            return ExitCode::from(2);
        }
    };

    match run(&env, &src, input).and_then(|v| v.to_json_str_pretty()) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}
