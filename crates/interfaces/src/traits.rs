use async_trait::async_trait;

/// A line-oriented operator surface.
#[async_trait]
pub trait Interface: Send + Sync {
    /// Next input line, trimmed. `None` once the input is exhausted.
    async fn receive_input(&self) -> Option<String>;
    async fn send_output(&self, message: &str);
    async fn show_status(&self, status: &str);
    async fn show_error(&self, message: &str);
}
