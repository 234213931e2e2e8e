use std::io::{self, BufRead};
use std::thread;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::warn;

use crate::server::testname::TestName;

/// Feeds stdin lines into a channel from a detached reader thread.
///
/// Stdin reads block and cannot be cancelled. On the runtime's blocking
/// pool they would hold up shutdown until the next Enter; this thread
/// simply ends with the process.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    let spawned = thread::Builder::new()
        .name("operator-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "cannot read operator input");
    }
    rx
}

/// How the stop prompt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    Confirmed,
    InputClosed,
}

/// Line-oriented operator console.
///
/// Every `read_*` method returns `Ok(None)` once the input is exhausted.
pub struct Operator<W> {
    input: mpsc::Receiver<String>,
    output: W,
}

impl<W> Operator<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(input: mpsc::Receiver<String>, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Collects a test name field by field and asks for confirmation.
    pub async fn read_test_name(&mut self) -> io::Result<Option<TestName>> {
        loop {
            self.say("\nENTER TEST INFORMATION:").await?;
            let Some(tester) = self.ask_required("Input Tester ID >>> ").await? else {
                return Ok(None);
            };
            let Some(vendor) = self.ask_required("Input Vendor Code >>> ").await? else {
                return Ok(None);
            };
            let Some(category) = self.ask_required("Input Test Category >>> ").await? else {
                return Ok(None);
            };
            let Some(batch) = self.ask_number("Input Batch Number (e.g. 1, 2, 3) >>> ").await? else {
                return Ok(None);
            };
            let Some(iteration) = self
                .ask_number("Input Iteration Number (e.g. 1, 2, 3) >>> ")
                .await?
            else {
                return Ok(None);
            };
            let Some(test_type) = self
                .ask("Input Test Type (e.g. PRIVATE, PUBLIC, SMOKE, TEST; blank for none) >>> ")
                .await?
            else {
                return Ok(None);
            };

            let name = TestName {
                vendor: vendor.to_uppercase(),
                category: category.to_uppercase(),
                batch,
                iteration,
                test_type: Some(test_type.to_uppercase()).filter(|t| !t.is_empty()),
                tester: tester.to_uppercase(),
            };
            self.say(&format!("\nTest Name >>> {name}")).await?;

            match self.ask("Do you want to continue (yes/no)? >>> ").await? {
                None => return Ok(None),
                Some(answer) if is_yes(&answer) => return Ok(Some(name)),
                Some(_) => self.say("TEST INFORMATION DISCARDED").await?,
            }
        }
    }

    /// Keeps asking until the operator confirms the stop twice.
    pub async fn confirm_stop(&mut self) -> io::Result<StopRequest> {
        loop {
            self.say("--INFO--[ TEST IN PROGRESS ]").await?;
            match self.ask("Do you want to stop (y/n)? >>> ").await? {
                None => return Ok(StopRequest::InputClosed),
                Some(answer) if is_yes(&answer) => {}
                Some(_) => continue,
            }
            match self.ask("Are you sure (y/n)? >>> ").await? {
                None => return Ok(StopRequest::InputClosed),
                Some(answer) if is_yes(&answer) => return Ok(StopRequest::Confirmed),
                Some(_) => {}
            }
        }
    }

    async fn say(&mut self, line: &str) -> io::Result<()> {
        self.output.write_all(line.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }

    async fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.output.write_all(prompt.as_bytes()).await?;
        self.output.flush().await?;
        Ok(self.input.recv().await.map(|line| line.trim().to_string()))
    }

    async fn ask_required(&mut self, prompt: &str) -> io::Result<Option<String>> {
        loop {
            match self.ask(prompt).await? {
                Some(answer) if answer.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    async fn ask_number(&mut self, prompt: &str) -> io::Result<Option<u32>> {
        loop {
            let Some(answer) = self.ask(prompt).await? else {
                return Ok(None);
            };
            match answer.parse::<u32>() {
                Ok(n) if n > 0 => return Ok(Some(n)),
                _ => self.say("Please enter a positive number").await?,
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "y" | "yes")
}
