// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers shared by the `build.rs` scripts in this workspace.
//!
//! Build-time configuration arrives as TOML in an environment variable, the
//! same way the image packager hands each task its `[tasks.*.config]` table.
//! Deserialization is driven by the caller's type: the top-level type should
//! not set `deny_unknown_fields`, but the task-specific types within it
//! should.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::env;

/// Name of the variable carrying a task's own configuration table.
pub const TASK_CONFIG_VAR: &str = "HUBRIS_TASK_CONFIG";

/// Pulls the task configuration, using `T::default()` if the environment
/// variable is missing. If the variable is present but fails to parse, this
/// still fails with `Err`.
pub fn task_config_or_default<T: DeserializeOwned + Default>() -> Result<T> {
    toml_from_env_def(TASK_CONFIG_VAR)
}

/// Parses a configuration table from text. Split out so the parse rules can
/// be exercised without touching the process environment.
pub fn config_from_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    toml::from_str(text).context("malformed task configuration")
}

fn toml_from_env_def<T: DeserializeOwned + Default>(var: &str) -> Result<T> {
    // We want to emit this whether or not the env var is present, so that we'll
    // be re-run if it becomes present.
    println!("cargo:rerun-if-env-changed={}", var);

    let config = match env::var(var) {
        Ok(text) => {
            println!("--- toml for ${} ---", var);
            println!("{}", text);
            text
        }
        Err(_) => {
            println!("--- var ${} not present, using default ---", var);
            return Ok(T::default());
        }
    };
    config_from_str(&config)
}
