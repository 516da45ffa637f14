//! Shared config-loading helper (`spec.md` §6).
//!
//! Command-line argument parsing is an explicit non-goal, so every
//! service is configured purely from a TOML file whose path can be
//! overridden by a single environment variable. Missing or unparsable
//! config falls back to field defaults rather than panicking — the same
//! policy the teacher's `Config::load()` uses.

use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;

pub fn load<T>(env_var: &str, default_path: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let path = std::env::var(env_var).unwrap_or_else(|_| default_path.to_string());
    let path = PathBuf::from(path);
    match fs::read_to_string(&path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => T::default(),
    }
}
