//! Constants for the gateway

/// Credential lookup run against the admin connection
pub const CREDENTIAL_LOOKUP_QUERY: &str = "SELECT * FROM LOGINS WHERE USERNAME = ?";

/// Column holding the hex SHA-512 digest of the user's password
pub const PASSWORD_HASH_COLUMN: &str = "password_hash";

/// Default SQL port for downstream targets
pub const DEFAULT_TARGET_PORT: u16 = 30015;

/// Upper bound for any downstream pool size, requested or configured
pub const MAX_CONNECTION_LIMIT: usize = 1000;

/// Response status for successful operations
pub const STATUS_OK: &str = "OK";

/// Response status for query-level failures
pub const STATUS_FAIL: &str = "FAIL";

/// Response status for successful disconnects
pub const STATUS_SUCCESS: &str = "SUCCESS";

/// Short-shape result code for a successful query
pub const SHORT_RESULT_OK: i64 = 1;

/// Body returned by the log plane
pub const LOG_ACK: &str = "[SUCCESS]\nLogged to the console!";

/// Tracing target for messages submitted through the log plane
pub const LOG_PLANE_TARGET: &str = "sqlgate::log_plane";

/// Terminal reset sequence emitted by the console `clear` command
pub const TERMINAL_RESET: &str = "\x1Bc";

/// Console output when a command produced nothing
pub const CONSOLE_NULL: &str = "null";
