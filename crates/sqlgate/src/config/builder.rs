//! Configuration builder

use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use crate::Error;
use crate::downstream::TargetParams;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub admin: AdminConfig,
    pub http: HttpConfig,
    pub query: QueryConfig,
    pub console: ConsoleConfig,
    pub targets: TargetsConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        self.query.default_timeout
    }
}

/// Credential store connection
#[derive(Clone)]
pub struct AdminConfig {
    pub url: Url,
    pub pool_size: NonZeroUsize,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut redacted = self.url.clone();
        if redacted.password().is_some() {
            let _ = redacted.set_password(Some("***"));
        }
        f.debug_struct("AdminConfig")
            .field("url", &redacted.as_str())
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// HTTP listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Deadline applied when a request does not name one
    pub default_timeout: Duration,
}

/// Operator console
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Run unrecognized lines through the host shell
    pub allow_shell: bool,
    /// Pause between two commands
    pub interval: Duration,
}

/// Downstream targets callers may connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetsConfig {
    /// Empty permits any host
    pub allowed_hosts: Vec<String>,
    pub default_connection_limit: NonZeroUsize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json_logs: bool,
}

/// Pieces of the admin connection when no full URL is given
#[derive(Debug, Default)]
struct AdminParts {
    url: Option<Url>,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    admin: AdminParts,
    admin_pool_size: NonZeroUsize,
    http: HttpConfig,
    query_timeout: Duration,
    console: ConsoleConfig,
    allowed_hosts: Vec<String>,
    default_connection_limit: NonZeroUsize,
    telemetry: TelemetryConfig,
}

impl ConfigBuilder {
    const DEFAULT_ADMIN_POOL_SIZE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(4); // 5
    const DEFAULT_CONNECTION_LIMIT: NonZeroUsize = NonZeroUsize::MIN.saturating_add(9); // 10
    pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(12_000);
    pub const DEFAULT_CONSOLE_INTERVAL: Duration = Duration::from_millis(250);

    #[must_use]
    pub const fn new() -> Self {
        Self {
            admin: AdminParts {
                url: None,
                host: None,
                port: None,
                user: None,
                password: None,
                database: None,
            },
            admin_pool_size: Self::DEFAULT_ADMIN_POOL_SIZE,
            http: HttpConfig {
                host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: 8080,
            },
            query_timeout: Self::DEFAULT_QUERY_TIMEOUT,
            console: ConsoleConfig {
                enabled: true,
                allow_shell: true,
                interval: Self::DEFAULT_CONSOLE_INTERVAL,
            },
            allowed_hosts: Vec::new(),
            default_connection_limit: Self::DEFAULT_CONNECTION_LIMIT,
            telemetry: TelemetryConfig {
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    #[must_use]
    pub fn admin_url(mut self, url: Url) -> Self {
        self.admin.url = Some(url);
        self
    }

    #[must_use]
    pub fn admin_host(mut self, host: String) -> Self {
        self.admin.host = Some(host);
        self
    }

    #[must_use]
    pub const fn admin_port(mut self, port: u16) -> Self {
        self.admin.port = Some(port);
        self
    }

    #[must_use]
    pub fn admin_user(mut self, user: String) -> Self {
        self.admin.user = Some(user);
        self
    }

    #[must_use]
    pub fn admin_password(mut self, password: String) -> Self {
        self.admin.password = Some(password);
        self
    }

    #[must_use]
    pub fn admin_database(mut self, database: String) -> Self {
        self.admin.database = Some(database);
        self
    }

    #[must_use]
    pub const fn admin_pool_size(mut self, size: NonZeroUsize) -> Self {
        self.admin_pool_size = size;
        self
    }

    #[must_use]
    pub const fn http_host(mut self, host: IpAddr) -> Self {
        self.http.host = host;
        self
    }

    #[must_use]
    pub const fn http_port(mut self, port: u16) -> Self {
        self.http.port = port;
        self
    }

    /// Default request deadline; zero disables it
    #[must_use]
    pub const fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn console_enabled(mut self, enabled: bool) -> Self {
        self.console.enabled = enabled;
        self
    }

    #[must_use]
    pub const fn allow_shell(mut self, allow: bool) -> Self {
        self.console.allow_shell = allow;
        self
    }

    #[must_use]
    pub const fn console_interval(mut self, interval: Duration) -> Self {
        self.console.interval = interval;
        self
    }

    #[must_use]
    pub fn allowed_hosts(mut self, hosts: Vec<String>) -> Self {
        self.allowed_hosts = hosts;
        self
    }

    #[must_use]
    pub const fn default_connection_limit(mut self, limit: NonZeroUsize) -> Self {
        self.default_connection_limit = limit;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        let url = Self::resolve_admin_url(self.admin)?;

        let log_level = if self.telemetry.log_level.is_empty() {
            "info".to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(Config {
            admin: AdminConfig {
                url,
                pool_size: self.admin_pool_size,
            },
            http: self.http,
            query: QueryConfig {
                default_timeout: self.query_timeout,
            },
            console: self.console,
            targets: TargetsConfig {
                allowed_hosts: self
                    .allowed_hosts
                    .into_iter()
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty())
                    .collect(),
                default_connection_limit: self.default_connection_limit,
            },
            telemetry: TelemetryConfig {
                log_level,
                json_logs: self.telemetry.json_logs,
            },
        })
    }

    fn resolve_admin_url(parts: AdminParts) -> crate::Result<Url> {
        if let Some(mut url) = parts.url {
            if let Some(ref user) = parts.user {
                url.set_username(user)
                    .map_err(|()| Error::Config("Failed to set admin user in URL".into()))?;
            }
            if let Some(ref password) = parts.password {
                url.set_password(Some(password))
                    .map_err(|()| Error::Config("Failed to set admin password in URL".into()))?;
            }
            return Ok(url);
        }

        let host = parts.host.ok_or_else(|| {
            Error::Config("admin database url or host is required".into())
        })?;

        let target = TargetParams {
            user: parts.user.unwrap_or_default(),
            password: parts.password.unwrap_or_default(),
            host,
            port: parts.port,
            database: parts.database,
            connection_limit: None,
        };

        target
            .to_url()
            .map_err(|e| Error::Config(format!("Invalid admin database settings: {e}")))
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
