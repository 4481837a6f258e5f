//! Caller-supplied urgency.

use std::fmt;

use axum::http::HeaderMap;

/// Header carrying the caller's priority signal.
pub const PRIORITY_HEADER: &str = "x-priority";

/// Service urgency; lower values are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u32);

impl Priority {
    /// Priority used when the caller sends none, or nothing usable.
    pub const DEFAULT: Priority = Priority(5);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Interpret a raw signal. Anything other than a non-negative integer
    /// falls back to [`Priority::DEFAULT`]. Integers too large to represent
    /// saturate to the least urgent priority.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.map(|value| {
            let value = value.trim();
            value.strip_prefix('+').unwrap_or(value)
        })
        .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
        .map(|digits| Priority(digits.parse().unwrap_or(u32::MAX)))
        .unwrap_or(Self::DEFAULT)
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::parse(
            headers
                .get(PRIORITY_HEADER)
                .and_then(|value| value.to_str().ok()),
        )
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for Priority {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
