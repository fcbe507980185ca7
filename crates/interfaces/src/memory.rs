use crate::traits::Interface;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Scripted interface: replays queued input lines and records everything
/// written. Used to drive the console without a terminal.
#[derive(Default)]
pub struct MemoryInterface {
    input: Mutex<VecDeque<String>>,
    output: Mutex<Vec<String>>,
}

impl MemoryInterface {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: Mutex::new(lines.into_iter().map(Into::into).collect()),
            output: Mutex::new(Vec::new()),
        }
    }

    pub fn output(&self) -> Vec<String> {
        self.output.lock().clone()
    }

    pub fn transcript(&self) -> String {
        self.output.lock().join("\n")
    }
}

#[async_trait]
impl Interface for MemoryInterface {
    async fn receive_input(&self) -> Option<String> {
        self.input.lock().pop_front().map(|l| l.trim().to_string())
    }

    async fn send_output(&self, message: &str) {
        self.output.lock().push(message.to_string());
    }

    async fn show_status(&self, status: &str) {
        self.output.lock().push(format!("status: {}", status));
    }

    async fn show_error(&self, message: &str) {
        self.output.lock().push(format!("error: {}", message));
    }
}
