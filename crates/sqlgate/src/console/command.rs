//! Console line grammar

use std::path::PathBuf;

use thiserror::Error;

const DIR_PREFIX: &str = "dir:\"";
const SQL_USER_PREFIX: &str = "sql-user:\"";
const SQL_ADMIN_PREFIX: &str = "sql-admin:";
const DEBUG_PREFIX: &str = "debug:";

/// One parsed control-channel line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Run a statement on a user's sql-plane connection
    SqlUser { username: String, sql: String },
    /// Run a statement on the credential store connection
    SqlAdmin { sql: String },
    /// Look up a named piece of gateway state
    Debug { expr: String },
    Exit,
    Clear,
    /// Raw host command, optionally in a working directory
    Shell {
        command: String,
        cwd: Option<PathBuf>,
    },
    Empty,
}

impl ConsoleCommand {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SqlUser { .. } => "sql-user",
            Self::SqlAdmin { .. } => "sql-admin",
            Self::Debug { .. } => "debug",
            Self::Exit => "exit",
            Self::Clear => "clear",
            Self::Shell { .. } => "shell",
            Self::Empty => "empty",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unterminated quote after '{0}'")]
    UnterminatedQuote(&'static str),
}

/// Split `"<value>"<sep><rest>` after an opening quote has been consumed.
/// One separator character after the closing quote is dropped.
fn quoted<'a>(input: &'a str, prefix: &'static str) -> Result<(&'a str, &'a str), ParseError> {
    let end = input
        .find('"')
        .ok_or(ParseError::UnterminatedQuote(prefix))?;
    let value = &input[..end];

    let mut rest = input[end + 1..].chars();
    rest.next();
    Ok((value, rest.as_str()))
}

/// Parse one line. Prefixes are checked in order and the first match wins.
pub fn parse(line: &str) -> Result<ConsoleCommand, ParseError> {
    let mut input = line.trim();
    let mut cwd = None;

    if let Some(after) = input.strip_prefix(DIR_PREFIX) {
        let (dir, rest) = quoted(after, "dir:")?;
        cwd = Some(PathBuf::from(dir));
        input = rest.trim_start();
    }

    if let Some(after) = input.strip_prefix(SQL_USER_PREFIX) {
        let (username, sql) = quoted(after, "sql-user:")?;
        return Ok(ConsoleCommand::SqlUser {
            username: username.to_string(),
            sql: sql.trim().to_string(),
        });
    }

    if let Some(sql) = input.strip_prefix(SQL_ADMIN_PREFIX) {
        return Ok(ConsoleCommand::SqlAdmin {
            sql: sql.trim().to_string(),
        });
    }

    if let Some(expr) = input.strip_prefix(DEBUG_PREFIX) {
        return Ok(ConsoleCommand::Debug {
            expr: expr.trim().to_string(),
        });
    }

    Ok(match input {
        "exit" | "stop" => ConsoleCommand::Exit,
        "clear" => ConsoleCommand::Clear,
        "" => ConsoleCommand::Empty,
        command => ConsoleCommand::Shell {
            command: command.to_string(),
            cwd,
        },
    })
}
