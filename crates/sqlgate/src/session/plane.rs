use std::fmt;
use std::str::FromStr;

/// Independent capability namespace with its own token space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    Sql,
    Log,
}

impl Plane {
    pub const ALL: [Self; 2] = [Self::Sql, Self::Log];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Log => "log",
        }
    }

    /// Whether sessions on this plane own a downstream connection
    #[must_use]
    pub const fn holds_connections(self) -> bool {
        matches!(self, Self::Sql)
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sql" => Ok(Self::Sql),
            "log" => Ok(Self::Log),
            other => Err(format!("unknown plane '{other}'")),
        }
    }
}

/// What an inbound request wants to do on its plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Connect,
    Disconnect,
    Operate,
}

/// Split a request path such as `/sql/connect` into plane and access kind
pub fn classify_path(path: &str) -> Option<(Plane, AccessKind)> {
    let mut segments = path.trim_matches('/').split('/');
    let plane = segments.next()?.parse().ok()?;
    let kind = match segments.next() {
        None => AccessKind::Operate,
        Some("connect") => AccessKind::Connect,
        Some("disconnect") => AccessKind::Disconnect,
        Some(_) => return None,
    };

    if segments.next().is_some() {
        return None;
    }

    Some((plane, kind))
}
