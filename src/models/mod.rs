// src/models/mod.rs

use std::fmt;

pub mod pilot;
pub mod quiz;
pub mod response;
pub mod schedule;
pub mod user;

/// Raised when a status or type column holds a value no enum variant matches.
#[derive(Debug)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}
