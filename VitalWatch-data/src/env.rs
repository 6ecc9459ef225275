//! Environment variable parsing shared by every configuration layer

use std::env;
use std::str::FromStr;

use thiserror::Error;

/// An environment variable is set but does not parse as the expected type
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{name} has invalid value '{value}'")]
pub struct InvalidVar {
    pub name: String,
    pub value: String,
}

/// Parse `name` from the environment, or return `default` when it is unset
pub fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, InvalidVar> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| InvalidVar {
            name: name.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
