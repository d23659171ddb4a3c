//! Environment variable loading for configuration

use std::env;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use super::builder::ConfigBuilder;
use crate::Result;

/// Environment variable names
mod vars {
    pub const PORT: &str = "PORT";
    pub const SQLGATE_HTTP_HOST: &str = "SQLGATE_HTTP_HOST";
    pub const ADMIN_DB_URL: &str = "ADMIN_DB_URL";
    pub const ADMIN_DB_USERNAME: &str = "ADMIN_DB_USERNAME";
    pub const ADMIN_DB_PASSWORD: &str = "ADMIN_DB_PASSWORD";
    pub const ADMIN_DB_HOST: &str = "ADMIN_DB_HOST";
    pub const ADMIN_DB_PORT: &str = "ADMIN_DB_PORT";
    pub const ADMIN_DB_NAME: &str = "ADMIN_DB_NAME";
    pub const ADMIN_DB_POOL_SIZE: &str = "ADMIN_DB_POOL_SIZE";
    pub const SQLGATE_QUERY_TIMEOUT_MS: &str = "SQLGATE_QUERY_TIMEOUT_MS";
    pub const SQLGATE_CONSOLE: &str = "SQLGATE_CONSOLE";
    pub const SQLGATE_CONSOLE_SHELL: &str = "SQLGATE_CONSOLE_SHELL";
    pub const SQLGATE_ALLOWED_HOSTS: &str = "SQLGATE_ALLOWED_HOSTS";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const SQLGATE_JSON_LOGS: &str = "SQLGATE_JSON_LOGS";
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    // Admin connection
    if let Ok(url_str) = env::var(vars::ADMIN_DB_URL) {
        let url = Url::parse(&url_str).map_err(|e| {
            crate::Error::Config(format!("Invalid {}: {}", vars::ADMIN_DB_URL, e))
        })?;
        builder = builder.admin_url(url);
    }

    if let Ok(host) = env::var(vars::ADMIN_DB_HOST) {
        builder = builder.admin_host(host);
    }

    if let Ok(port_str) = env::var(vars::ADMIN_DB_PORT) {
        let port = port_str.parse::<u16>().map_err(|e| {
            crate::Error::Config(format!("Invalid {}: {}", vars::ADMIN_DB_PORT, e))
        })?;
        builder = builder.admin_port(port);
    }

    if let Ok(user) = env::var(vars::ADMIN_DB_USERNAME) {
        builder = builder.admin_user(user);
    }

    if let Ok(password) = env::var(vars::ADMIN_DB_PASSWORD) {
        builder = builder.admin_password(password);
    }

    if let Ok(database) = env::var(vars::ADMIN_DB_NAME) {
        builder = builder.admin_database(database);
    }

    if let Ok(size_str) = env::var(vars::ADMIN_DB_POOL_SIZE)
        && let Ok(size) = size_str.parse::<usize>()
        && let Some(nz) = NonZeroUsize::new(size)
    {
        builder = builder.admin_pool_size(nz);
    }

    // HTTP listener
    if let Ok(host_str) = env::var(vars::SQLGATE_HTTP_HOST)
        && let Ok(host) = host_str.parse::<IpAddr>()
    {
        builder = builder.http_host(host);
    }

    if let Ok(port_str) = env::var(vars::PORT)
        && let Ok(port) = port_str.parse::<u16>()
    {
        builder = builder.http_port(port);
    }

    // Query deadline
    if let Ok(timeout_str) = env::var(vars::SQLGATE_QUERY_TIMEOUT_MS)
        && let Ok(millis) = timeout_str.parse::<u64>()
    {
        builder = builder.query_timeout(Duration::from_millis(millis));
    }

    // Console
    if let Ok(val) = env::var(vars::SQLGATE_CONSOLE) {
        builder = builder.console_enabled(parse_bool(&val));
    }

    if let Ok(val) = env::var(vars::SQLGATE_CONSOLE_SHELL) {
        builder = builder.allow_shell(parse_bool(&val));
    }

    // Targets
    if let Ok(hosts) = env::var(vars::SQLGATE_ALLOWED_HOSTS) {
        builder = builder.allowed_hosts(hosts.split(',').map(str::to_string).collect());
    }

    // Telemetry
    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::SQLGATE_JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
