// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod collections;
#[cfg(feature = "crypto")]
mod crypto;
mod debug;
mod globals;
mod json;
pub mod limit;
pub mod path;
mod recover;
#[cfg(feature = "regexp")]
mod regexp;
mod strings;
mod time;

pub use collections::Collections;
#[cfg(feature = "crypto")]
pub use crypto::Crypto;
pub use debug::{DebugHandler, DebugLog};
pub use globals::Globals;
pub use json::Json;
pub use limit::{Limit, LimitError};
pub use recover::Try;
#[cfg(feature = "regexp")]
pub use regexp::Regexp;
pub use strings::Strings;
pub use time::{Time, TIME_LAYOUTS};

use crate::config::Config;
use crate::env::Library;

use anyhow::{bail, Result};

/// Names of the libraries that can be selected without configuration.
pub const STANDARD_LIBRARIES: &[&str] = &[
    "collections",
    #[cfg(feature = "crypto")]
    "crypto",
    "debug",
    "json",
    "limit",
    "strings",
    "time",
    "try",
];

/// Returns the library with the given name.
pub fn library(name: &str) -> Option<Box<dyn Library>> {
    let lib: Box<dyn Library> = match name {
        "collections" => Box::new(Collections),
        #[cfg(feature = "crypto")]
        "crypto" => Box::new(Crypto),
        "debug" => Box::<DebugLog>::default(),
        "json" => Box::new(Json),
        "limit" => Box::<Limit>::default(),
        "strings" => Box::new(Strings),
        "time" => Box::new(Time),
        "try" => Box::new(Try),
        _ => return None,
    };
    Some(lib)
}

/// Resolves a comma separated selection such as `collections,try` or `all`,
/// then appends the libraries implied by the configuration.
pub fn libraries(selection: &str, config: &Config) -> Result<Vec<Box<dyn Library>>> {
    let mut libs: Vec<Box<dyn Library>> = vec![];
    if selection == "all" {
        for name in STANDARD_LIBRARIES {
            if let Some(lib) = library(name) {
                libs.push(lib);
            }
        }
    } else {
        for name in selection.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match library(name) {
                Some(lib) => libs.push(lib),
                None => bail!("no lib {name:?}"),
            }
        }
    }

    if !config.globals.is_empty() {
        libs.push(Box::new(Globals {
            values: config.globals.clone(),
        }));
    }
    if !config.regexp.is_empty() {
        #[cfg(feature = "regexp")]
        libs.push(Box::new(Regexp::new(&config.regexp)?));
        #[cfg(not(feature = "regexp"))]
        bail!("regexp support is not enabled");
    }
    Ok(libs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(libs: &[Box<dyn Library>]) -> Vec<&'static str> {
        libs.iter().map(|l| l.name()).collect()
    }

    #[test]
    fn selection() {
        let cfg = Config::default();
        assert_eq!(names(&libraries("all", &cfg).unwrap()), STANDARD_LIBRARIES);
        assert_eq!(
            names(&libraries("try, collections", &cfg).unwrap()),
            vec!["try", "collections"]
        );
        let err = libraries("collections,http", &cfg).err().unwrap();
        assert_eq!(err.to_string(), r#"no lib "http""#);
    }

    #[test]
    fn configured_libraries_are_appended() {
        let cfg = Config::from_yaml_str("globals: {x: 1}").unwrap();
        assert_eq!(names(&libraries("json", &cfg).unwrap()), vec!["json", "globals"]);
    }
}
