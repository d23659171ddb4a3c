//! Read-only inspection of gateway state for the `debug:` command

use std::str::FromStr;

use serde_json::{Value, json};

use crate::helpers::pretty_json;
use crate::server::Gateway;
use crate::session::Plane;

/// Every expression `debug:` understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    Sessions,
    SqlUsers,
    LogUsers,
    SessionsCount,
    Version,
    Uptime,
    Config,
}

impl Inspection {
    pub const NAMES: [&'static str; 7] = [
        "sessions",
        "sql.users",
        "log.users",
        "sessions.count",
        "version",
        "uptime",
        "config",
    ];
}

impl FromStr for Inspection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sessions" => Ok(Self::Sessions),
            "sql.users" => Ok(Self::SqlUsers),
            "log.users" => Ok(Self::LogUsers),
            "sessions.count" => Ok(Self::SessionsCount),
            "version" => Ok(Self::Version),
            "uptime" => Ok(Self::Uptime),
            "config" => Ok(Self::Config),
            other => Err(format!(
                "Unknown expression '{other}'. Available: {}",
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Evaluate an inspection expression against the gateway
pub fn evaluate(expr: &str, gateway: &Gateway) -> Result<String, String> {
    let inspection: Inspection = expr.parse()?;
    let sessions = gateway.sessions();

    let value = match inspection {
        Inspection::Sessions => json!({
            "sql": sessions.usernames(Plane::Sql),
            "log": sessions.usernames(Plane::Log),
        }),
        Inspection::SqlUsers => json!(sessions.usernames(Plane::Sql)),
        Inspection::LogUsers => json!(sessions.usernames(Plane::Log)),
        Inspection::SessionsCount => json!({
            "sql": sessions.live_count(Plane::Sql),
            "log": sessions.live_count(Plane::Log),
        }),
        Inspection::Version => Value::String(env!("CARGO_PKG_VERSION").to_string()),
        Inspection::Uptime => Value::String(format!("{}s", gateway.uptime().as_secs())),
        Inspection::Config => json!({
            "query_timeout_ms": u64::try_from(gateway.proxy().default_timeout().as_millis())
                .unwrap_or(u64::MAX),
            "allowed_hosts": if gateway.policy().is_open() {
                Value::String("*".to_string())
            } else {
                json!(gateway.policy().allowed_hosts())
            },
        }),
    };

    Ok(match value {
        Value::String(s) => s,
        other => pretty_json(&other),
    })
}
