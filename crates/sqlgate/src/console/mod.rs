//! Operator console
//!
//! A strictly sequential read-dispatch-print loop over the control channel.
//! It shares the session registry with the HTTP surface but never goes
//! through the token checks: a local operator can query any user's
//! connection, the credential store, gateway state, and (when enabled) the
//! host shell. Every command prints exactly one `> <output>` block, and a
//! failing command never stops the loop.

mod command;
mod debug;
mod shell;

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub use command::{ConsoleCommand, ParseError, parse};
pub use debug::Inspection;

use crate::config::ConsoleConfig;
use crate::constants::{CONSOLE_NULL, TERMINAL_RESET};
use crate::helpers::pretty_json;
use crate::server::Gateway;

/// What a dispatched command asks the loop to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Output(String),
    Exit,
}

pub struct Console {
    gateway: Arc<Gateway>,
    allow_shell: bool,
    interval: Duration,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("allow_shell", &self.allow_shell)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Console {
    pub fn new(gateway: Arc<Gateway>, config: &ConsoleConfig) -> Self {
        Self {
            gateway,
            allow_shell: config.allow_shell,
            interval: config.interval,
        }
    }

    /// Read commands until end of input, `exit`/`stop`, or cancellation.
    ///
    /// `exit`/`stop` cancels `shutdown` so the rest of the process can wind
    /// down. End of input only stops the console.
    pub async fn run<R, W>(
        &self,
        mut reader: R,
        mut writer: W,
        shutdown: CancellationToken,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                () = shutdown.cancelled() => break,
                read = reader.read_until(b'\n', &mut buf) => read?,
            };

            if read == 0 {
                tracing::debug!("Control channel closed");
                break;
            }

            let line = decode_line(&buf);
            match self.handle_line(&line).await {
                Reply::Exit => {
                    tracing::info!("Shutdown requested from console");
                    shutdown.cancel();
                    break;
                }
                Reply::Output(text) => {
                    writer.write_all(format_output(&text).as_bytes()).await?;
                    writer.flush().await?;
                }
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        Ok(())
    }

    /// Parse and dispatch one line
    pub async fn handle_line(&self, line: &str) -> Reply {
        match parse(line) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => Reply::Output(format!("Error: {e}")),
        }
    }

    pub async fn dispatch(&self, command: ConsoleCommand) -> Reply {
        #[cfg(feature = "metrics")]
        crate::observability::record_console_command(command.kind());

        tracing::debug!(kind = command.kind(), "Console command");

        let output = match command {
            ConsoleCommand::SqlUser { username, sql } => {
                match self.gateway.sessions().connection(&username) {
                    Some(connection) => self.fetch(&sql, &connection).await,
                    None => format!("User '{username}' not found!"),
                }
            }
            ConsoleCommand::SqlAdmin { sql } => {
                let admin = Arc::clone(self.gateway.credentials().connection());
                self.fetch(&sql, &admin).await
            }
            ConsoleCommand::Debug { expr } => match debug::evaluate(&expr, &self.gateway) {
                Ok(value) => format!("Success!\n{value}"),
                Err(e) => format!("Error!\n{e}"),
            },
            ConsoleCommand::Exit => return Reply::Exit,
            ConsoleCommand::Clear => TERMINAL_RESET.to_string(),
            ConsoleCommand::Shell { command, cwd } => {
                if self.allow_shell {
                    shell::run(&command, cwd.as_deref()).await
                } else {
                    "Host commands are disabled".to_string()
                }
            }
            ConsoleCommand::Empty => CONSOLE_NULL.to_string(),
        };

        Reply::Output(output)
    }

    async fn fetch(&self, sql: &str, connection: &Arc<dyn crate::downstream::SqlConnection>) -> String {
        match self.gateway.proxy().fetch(sql, connection).await {
            Ok(rows) => pretty_json(&rows),
            Err(e) => e.to_string(),
        }
    }
}

/// Strip the line terminator; invalid UTF-8 is replaced, never rejected
fn decode_line(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}

/// `> <text>` with exactly one trailing newline
fn format_output(text: &str) -> String {
    let text = text.strip_suffix('\n').unwrap_or(text);
    format!("> {text}\n")
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use tokio_test::assert_ok;

    use super::*;
    use crate::downstream::{Connector, DownstreamError, SqlConnection, TargetParams};
    use crate::session::Plane;
    use crate::targets::TargetPolicy;

    #[derive(Debug)]
    struct Echo(&'static str);

    #[async_trait]
    impl SqlConnection for Echo {
        async fn query(
            &self,
            sql: &str,
            _params: &[Value],
        ) -> Result<Value, DownstreamError> {
            if sql == "BAD" {
                return Err(DownstreamError::Query {
                    code: "HDB-260".into(),
                    errno: 260,
                    message: "invalid column name".into(),
                });
            }
            Ok(json!([{ "SOURCE": self.0, "ONE": 1 }]))
        }

        async fn close(&self) -> Result<(), DownstreamError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct EchoConnector;

    #[async_trait]
    impl Connector for EchoConnector {
        async fn open(&self, _: &TargetParams) -> Result<Arc<dyn SqlConnection>, DownstreamError> {
            Ok(Arc::new(Echo("user")))
        }
    }

    fn gateway() -> Arc<Gateway> {
        Arc::new(Gateway::new(
            Arc::new(Echo("admin")),
            Arc::new(EchoConnector),
            TargetPolicy::default(),
            Duration::from_secs(12),
        ))
    }

    fn console(gateway: Arc<Gateway>, allow_shell: bool) -> Console {
        Console::new(
            gateway,
            &ConsoleConfig {
                enabled: true,
                allow_shell,
                interval: Duration::from_millis(1),
            },
        )
    }

    async fn connect_bob(gateway: &Gateway) {
        let mut body = Map::new();
        body.insert("user".into(), json!("app"));
        body.insert("password".into(), json!("pw"));
        body.insert("host".into(), json!("db"));
        gateway.connect(Plane::Sql, "bob", &body).await.unwrap();
    }

    fn output(reply: Reply) -> String {
        match reply {
            Reply::Output(text) => text,
            Reply::Exit => panic!("unexpected exit"),
        }
    }

    #[test]
    fn test_format_output_trims_one_newline() {
        assert_eq!(format_output("hello\n"), "> hello\n");
        assert_eq!(format_output("hello"), "> hello\n");
        assert_eq!(format_output("a\n\n"), "> a\n\n");
    }

    #[tokio::test]
    async fn test_sql_user_not_found() {
        let console = console(gateway(), false);
        let text = output(console.handle_line(r#"sql-user:"bob" SELECT 1"#).await);
        assert_eq!(text, "User 'bob' not found!");
    }

    #[tokio::test]
    async fn test_sql_user_pretty_prints_rows() {
        let gw = gateway();
        connect_bob(&gw).await;
        let console = console(gw, false);

        let text = output(console.handle_line(r#"sql-user:"bob" SELECT 1"#).await);
        assert_eq!(text, "[\n {\n  \"SOURCE\": \"user\",\n  \"ONE\": 1\n }\n]");
    }

    #[tokio::test]
    async fn test_sql_user_query_failure_is_printed() {
        let gw = gateway();
        connect_bob(&gw).await;
        let console = console(gw, false);

        let text = output(console.handle_line(r#"sql-user:"bob" BAD"#).await);
        assert_eq!(text, "[HDB-260] - invalid column name");
    }

    #[tokio::test]
    async fn test_sql_admin_uses_admin_connection() {
        let console = console(gateway(), false);
        let text = output(console.handle_line("sql-admin:SELECT 1").await);
        assert!(text.contains("\"admin\""));
    }

    #[tokio::test]
    async fn test_debug_inspections() {
        let gw = gateway();
        connect_bob(&gw).await;
        let console = console(gw, false);

        assert_eq!(
            output(console.handle_line("debug:sql.users").await),
            "Success!\n[\n \"bob\"\n]"
        );
        assert_eq!(
            output(console.handle_line("debug:version").await),
            format!("Success!\n{}", env!("CARGO_PKG_VERSION"))
        );
        assert!(
            output(console.handle_line("debug:sessions.count").await).contains("\"sql\": 1")
        );
        assert!(output(console.handle_line("debug:config").await).contains("query_timeout_ms"));
    }

    #[tokio::test]
    async fn test_debug_rejects_arbitrary_expressions() {
        let console = console(gateway(), false);
        let text = output(console.handle_line("debug:process.exit(1)").await);
        assert!(text.starts_with("Error!\nUnknown expression"));
    }

    #[tokio::test]
    async fn test_shell_disabled() {
        let console = console(gateway(), false);
        assert_eq!(
            output(console.handle_line("echo hi").await),
            "Host commands are disabled"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_enabled() {
        let console = console(gateway(), true);
        assert_eq!(output(console.handle_line("echo hi").await), "hi\n");
    }

    #[tokio::test]
    async fn test_clear_and_empty() {
        let console = console(gateway(), false);
        assert_eq!(output(console.handle_line("clear").await), "\x1Bc");
        assert_eq!(output(console.handle_line("").await), "null");
    }

    #[tokio::test]
    async fn test_parse_error_is_printed() {
        let console = console(gateway(), false);
        let text = output(console.handle_line(r#"sql-user:"bob"#).await);
        assert!(text.starts_with("Error: unterminated quote"));
    }

    #[tokio::test]
    async fn test_run_loop_prints_each_command() {
        let console = console(gateway(), false);
        let input: &[u8] = b"clear\nsql-user:\"nobody\" SELECT 1\n\n";
        let mut out = Vec::new();

        assert_ok!(console.run(input, &mut out, CancellationToken::new()).await);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "> \x1Bc\n> User 'nobody' not found!\n> null\n");
    }

    #[test]
    fn test_decode_line_terminators() {
        assert_eq!(decode_line(b"clear\r\n"), "clear");
        assert_eq!(decode_line(b"clear"), "clear");
        assert_eq!(decode_line(b"\xff\n"), "\u{FFFD}");
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_stop_loop() {
        let console = console(gateway(), false);
        let input: &[u8] = b"\xff\xfe\nclear\n";
        let mut out = Vec::new();

        assert_ok!(console.run(input, &mut out, CancellationToken::new()).await);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "> Host commands are disabled\n> \x1Bc\n");
    }

    #[tokio::test]
    async fn test_exit_cancels_shutdown_token() {
        let console = console(gateway(), false);
        let shutdown = CancellationToken::new();
        let input: &[u8] = b"stop\nclear\n";
        let mut out = Vec::new();

        assert_ok!(console.run(input, &mut out, shutdown.clone()).await);

        assert!(shutdown.is_cancelled());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_end_of_input_does_not_request_shutdown() {
        let console = console(gateway(), false);
        let shutdown = CancellationToken::new();
        let mut out = Vec::new();

        assert_ok!(console.run(&b""[..], &mut out, shutdown.clone()).await);
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_console_stops_immediately() {
        let console = console(gateway(), false);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let (reader, _writer) = tokio::io::duplex(64);
        let reader = tokio::io::BufReader::new(reader);
        let mut out = Vec::new();

        assert_ok!(console.run(reader, &mut out, shutdown).await);
        assert!(out.is_empty());
    }
}
