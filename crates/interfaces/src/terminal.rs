use crate::traits::Interface;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

pub struct TerminalInterface {
    prompt: String,
    stdin: Mutex<BufReader<Stdin>>,
}

impl TerminalInterface {
    pub fn new() -> Self {
        Self::with_prompt("opsdeck> ")
    }

    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    async fn write(&self, text: &str) {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(text.as_bytes()).await;
        let _ = stdout.flush().await;
    }
}

impl Default for TerminalInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interface for TerminalInterface {
    async fn receive_input(&self) -> Option<String> {
        self.write(&self.prompt).await;

        let mut reader = self.stdin.lock().await;
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => None, // EOF
            Ok(_) => Some(line.trim().to_string()),
            Err(_) => None,
        }
    }

    async fn send_output(&self, message: &str) {
        self.write(&format!("{}\n", message)).await;
    }

    async fn show_status(&self, status: &str) {
        self.send_output(&format!("ℹ️  {}", status)).await;
    }

    async fn show_error(&self, message: &str) {
        self.send_output(&format!("❌ {}", message)).await;
    }
}
