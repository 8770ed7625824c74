//! Cross-origin policy for incoming upgrade requests.

use std::fmt;

/// Methods advertised in `Access-Control-Allow-Methods`.
pub const ALLOWED_METHODS: &str = "GET, POST";

/// Which browser origins may open a connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    /// Any origin, including requests without an `Origin` header.
    #[default]
    Any,

    /// Only the listed origins (exact, case-insensitive match).
    /// Requests without an `Origin` header are non-browser clients and
    /// are let through.
    List(Vec<String>),
}

impl OriginPolicy {
    /// Parses `*` or a comma-separated list of origins.
    ///
    /// Returns `None` when the list contains no origins at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == "*" {
            return Some(Self::Any);
        }
        let origins: Vec<String> = raw
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if origins.is_empty() {
            None
        } else {
            Some(Self::List(origins))
        }
    }

    /// Returns `true` if a request carrying this `Origin` may connect.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (Self::Any, _) | (Self::List(_), None) => true,
            (Self::List(allowed), Some(origin)) => {
                let origin = origin.trim_end_matches('/');
                allowed.iter().any(|a| a.eq_ignore_ascii_case(origin))
            }
        }
    }

    /// The `Access-Control-Allow-Origin` value to answer with.
    pub fn allow_origin_header(&self, origin: Option<&str>) -> String {
        match (self, origin) {
            (Self::List(_), Some(origin)) => origin.to_string(),
            _ => "*".to_string(),
        }
    }
}

impl fmt::Display for OriginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::List(origins) => write!(f, "{}", origins.join(",")),
        }
    }
}
