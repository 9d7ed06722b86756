//! Command execution inside the Aurora SDK build engine.
//!
//! Two transports reach the engine: the SDK's `sfdk` tool (`sfdk engine exec
//! <cmd>`) and plain ssh. Both are represented by one [`Transport`] value
//! selected from [`SdkSettings`] at construction time; everything downstream
//! only sees [`Transport::execute`] and [`Transport::execute_streaming`].
//!
//! Processes are launched through a [`CommandRunner`], so tests can replace the
//! SDK with a scripted runner.

use crate::bundler::error::{Error, Result};
use crate::bundler::settings::{SdkSettings, TransportKind};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

const STREAM_CAPACITY: usize = 256;

/// Exit status and combined stdout/stderr of a finished process.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code, -1 when terminated by a signal
    pub exit_code: i32,
    /// stdout followed by stderr
    pub output: String,
}

impl CommandOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Incremental output of a running process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OutputEvent {
    /// One line of stdout or stderr, without the trailing newline
    Line(String),
    /// Process finished; always the last event
    Exited(i32),
}

/// Receiving end of a streaming command.
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::Receiver<OutputEvent>,
}

impl OutputStream {
    /// Creates a connected sender/stream pair.
    pub fn channel() -> (mpsc::Sender<OutputEvent>, Self) {
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        (tx, Self { rx })
    }

    /// Stream that replays an already finished command.
    pub fn finished(output: CommandOutput) -> Self {
        let lines: Vec<&str> = output.output.lines().collect();
        let (tx, rx) = mpsc::channel(lines.len() + 1);
        for line in lines {
            let _ = tx.try_send(OutputEvent::Line(line.to_string()));
        }
        let _ = tx.try_send(OutputEvent::Exited(output.exit_code));
        Self { rx }
    }

    /// Waits for the next event; `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<OutputEvent> {
        self.rx.recv().await
    }
}

/// Launches host processes.
#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// Runs `program` to completion.
    ///
    /// A process that could not be launched is an error; a non-zero exit is not.
    async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput>;

    /// Runs `program` and yields its output line by line while it runs.
    async fn run_streaming(&self, program: &Path, args: &[String]) -> Result<OutputStream> {
        Ok(OutputStream::finished(self.run(program, args).await?))
    }
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|error| Error::CommandFailed {
                command: render_command(program, args),
                error,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            output: combined,
        })
    }

    async fn run_streaming(&self, program: &Path, args: &[String]) -> Result<OutputStream> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| Error::CommandFailed {
                command: render_command(program, args),
                error,
            })?;

        let (tx, stream) = OutputStream::channel();
        let stdout = child.stdout.take().map(|out| tokio::spawn(forward_lines(out, tx.clone())));
        let stderr = child.stderr.take().map(|err| tokio::spawn(forward_lines(err, tx.clone())));

        tokio::spawn(async move {
            for reader in [stdout, stderr].into_iter().flatten() {
                let _ = reader.await;
            }
            let exit_code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    log::warn!("Failed to wait for child process: {}", e);
                    -1
                }
            };
            let _ = tx.send(OutputEvent::Exited(exit_code)).await;
        });

        Ok(stream)
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<OutputEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(OutputEvent::Line(line)).await.is_err() {
            break;
        }
    }
}

/// How the transport reaches the build engine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Connection {
    /// `sfdk engine exec ...`
    LocalTool,
    /// `ssh -o IdentitiesOnly=yes -i <key> -p <port> <user>@<host> ...`
    Ssh {
        /// Engine private key
        identity_key: PathBuf,
        /// Engine ssh port
        port: u16,
        /// Engine user
        user: String,
        /// Engine host
        host: String,
    },
}

/// Executes commands inside the build engine.
#[derive(Clone)]
pub struct Transport {
    connection: Connection,
    tool: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("connection", &self.connection)
            .field("tool", &self.tool)
            .finish()
    }
}

impl Transport {
    /// Transport through the SDK's `sfdk` binary.
    pub fn local_tool(tool: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            connection: Connection::LocalTool,
            tool: tool.into(),
            runner,
        }
    }

    /// Transport through an ssh client.
    pub fn ssh(
        tool: impl Into<PathBuf>,
        identity_key: impl Into<PathBuf>,
        port: u16,
        user: impl Into<String>,
        host: impl Into<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            connection: Connection::Ssh {
                identity_key: identity_key.into(),
                port,
                user: user.into(),
                host: host.into(),
            },
            tool: tool.into(),
            runner,
        }
    }

    /// Builds the configured transport.
    ///
    /// Binaries are not checked here; see [`crate::bundler::preflight`].
    pub fn from_settings(sdk: &SdkSettings, runner: Arc<dyn CommandRunner>) -> Self {
        match sdk.tool {
            TransportKind::Sfdk => Self::local_tool(sdk.sfdk_path(), runner),
            TransportKind::Ssh => Self::ssh(
                &sdk.ssh_tool_path,
                sdk.ssh_identity_key(),
                sdk.ssh_port,
                &sdk.ssh_user,
                &sdk.ssh_host,
                runner,
            ),
        }
    }

    /// Active connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Binary every command is launched with.
    pub fn tool(&self) -> &Path {
        &self.tool
    }

    /// Whether `sfdk check` can validate packages through this transport.
    pub fn supports_validation(&self) -> bool {
        matches!(self.connection, Connection::LocalTool)
    }

    /// Arguments placed before every engine command.
    pub fn prefix(&self) -> Vec<String> {
        match &self.connection {
            Connection::LocalTool => vec!["engine".into(), "exec".into()],
            Connection::Ssh {
                identity_key,
                port,
                user,
                host,
            } => vec![
                "-o".into(),
                "IdentitiesOnly=yes".into(),
                "-i".into(),
                identity_key.to_string_lossy().into_owned(),
                "-p".into(),
                port.to_string(),
                format!("{}@{}", user, host),
            ],
        }
    }

    /// Full argument vector for an engine command.
    ///
    /// ssh hands the remote part to a shell, so those arguments are quoted.
    pub fn engine_args(&self, args: &[String]) -> Vec<String> {
        let mut full = self.prefix();
        match self.connection {
            Connection::LocalTool => full.extend(args.iter().cloned()),
            Connection::Ssh { .. } => full.extend(args.iter().map(|a| shell_quote(a))),
        }
        full
    }

    /// Runs an engine command and returns its exit status and output.
    pub async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        let full = self.engine_args(args);
        log::debug!("Executing: {}", render_command(&self.tool, &full));
        self.runner.run(&self.tool, &full).await
    }

    /// Runs an engine command, failing with [`Error::ExecutionFailed`] on a non-zero exit.
    pub async fn execute(&self, args: &[String]) -> Result<String> {
        let full = self.engine_args(args);
        self.checked(&full).await
    }

    /// Runs an engine command and streams its output.
    ///
    /// The caller sees each line as it is produced and the exit code as the last event.
    pub async fn execute_streaming(&self, args: &[String]) -> Result<OutputStream> {
        let full = self.engine_args(args);
        log::debug!("Executing (streaming): {}", render_command(&self.tool, &full));
        self.runner.run_streaming(&self.tool, &full).await
    }

    /// Runs the transport binary itself without the engine prefix (`sfdk check ...`).
    pub async fn execute_tool(&self, args: &[String]) -> Result<String> {
        self.checked(args).await
    }

    async fn checked(&self, full: &[String]) -> Result<String> {
        let command = render_command(&self.tool, full);
        log::debug!("Executing: {}", command);
        let result = self.runner.run(&self.tool, full).await?;
        for line in result.output.lines() {
            log::debug!("  {}", line);
        }
        if result.success() {
            Ok(result.output)
        } else {
            Err(Error::ExecutionFailed {
                command,
                exit_code: result.exit_code,
                output: result.output,
            })
        }
    }
}

/// Renders a command line for logs and error messages.
pub fn render_command(program: &Path, args: &[String]) -> String {
    let mut text = program.display().to_string();
    for arg in args {
        text.push(' ');
        text.push_str(arg);
    }
    text
}

/// Quotes `arg` for a POSIX shell when it contains anything but safe characters.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
