//! The operator console, a non blocking line source polled between messages.

use std::{
    io::{self, BufRead},
    thread,
    time::Duration,
};

use log::{debug, info};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    time,
};

const INTERRUPTED: &str = "[[[ interrupted ]]]\n";
const PROMPT: &str = "[[[ Please input (save, quit, ...) ]]]\n";
const UNKNOWN: &str = "[[[ unknown cmd... ]]]\n";

/// An operator command read inside the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Save,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parses a raw console line, surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "save" => Self::Save,
            "quit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Operator console.
///
/// Lines are produced by a separate reader and consumed here, so polling never
/// blocks the coordinator loop longer than the poll interval.
pub struct Console<W: AsyncWrite + Unpin> {
    lines: mpsc::Receiver<String>,
    out: W,
    poll_interval: Duration,
    closed: bool,
}

impl Console<tokio::io::Stdout> {
    /// Creates a console over the process' stdin and stdout.
    ///
    /// Stdin is read by a dedicated thread since it can't be read without
    /// blocking.
    pub fn stdio(poll_interval: Duration) -> Self {
        let (tx, lines) = mpsc::channel(1);

        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };

                if tx.blocking_send(line).is_err() {
                    break;
                }
            }

            debug!("console input closed");
        });

        Self::new(lines, tokio::io::stdout(), poll_interval)
    }
}

impl<W: AsyncWrite + Unpin> Console<W> {
    /// Creates a new `Console`.
    ///
    /// # Arguments
    /// * `lines` - The operator's input lines.
    /// * `out` - Where banners and prompts are written.
    /// * `poll_interval` - Upper bound for a single poll.
    pub fn new(lines: mpsc::Receiver<String>, out: W, poll_interval: Duration) -> Self {
        Self {
            lines,
            out,
            poll_interval,
            closed: false,
        }
    }

    /// Checks whether the operator interrupted training.
    ///
    /// The interrupting line itself is discarded. Once the input is exhausted
    /// this always returns `false` without waiting.
    pub async fn poll(&mut self) -> io::Result<bool> {
        if self.closed {
            return Ok(false);
        }

        match time::timeout(self.poll_interval, self.lines.recv()).await {
            Ok(Some(_)) => {
                info!("training interrupted by the operator");
                self.write(INTERRUPTED).await?;
                Ok(true)
            }
            Ok(None) => {
                self.closed = true;
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    /// Prompts for a single command and waits for it.
    ///
    /// Unknown commands are reported back to the operator and still returned.
    ///
    /// # Returns
    /// `None` if the input closed while waiting.
    pub async fn prompt(&mut self) -> io::Result<Option<Command>> {
        self.write(PROMPT).await?;

        let Some(line) = self.lines.recv().await else {
            self.closed = true;
            return Ok(None);
        };

        let cmd = Command::parse(&line);
        if let Command::Unknown(_) = cmd {
            self.write(UNKNOWN).await?;
        }

        Ok(Some(cmd))
    }

    async fn write(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    fn lines(input: &[&str]) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(input.len().max(1));
        for line in input {
            tx.try_send(line.to_string()).unwrap();
        }
        rx
    }

    #[test]
    fn commands_are_trimmed() {
        assert_eq!(Command::parse("  save\n"), Command::Save);
        assert_eq!(Command::parse("quit"), Command::Quit);
        assert_eq!(Command::parse(" halt "), Command::Unknown("halt".into()));
    }

    #[tokio::test]
    async fn interrupt_then_commands() -> io::Result<()> {
        let out = Builder::new()
            .write(INTERRUPTED.as_bytes())
            .write(PROMPT.as_bytes())
            .write(PROMPT.as_bytes())
            .write(UNKNOWN.as_bytes())
            .write(PROMPT.as_bytes())
            .build();

        let mut console = Console::new(
            lines(&["", "save", "bogus", "quit"]),
            out,
            Duration::from_millis(1),
        );

        assert!(console.poll().await?);
        assert_eq!(console.prompt().await?, Some(Command::Save));
        assert_eq!(console.prompt().await?, Some(Command::Unknown("bogus".into())));
        assert_eq!(console.prompt().await?, Some(Command::Quit));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn idle_poll_returns_false() -> io::Result<()> {
        let (_tx, rx) = mpsc::channel(1);
        let mut console = Console::new(rx, Builder::new().build(), Duration::from_millis(1));

        assert!(!console.poll().await?);
        Ok(())
    }

    #[tokio::test]
    async fn closed_input_disables_polling() -> io::Result<()> {
        let out = Builder::new().write(PROMPT.as_bytes()).build();
        let mut console = Console::new(lines(&[]), out, Duration::from_secs(3600));

        assert_eq!(console.prompt().await?, None);
        assert!(!console.poll().await?);
        Ok(())
    }
}
