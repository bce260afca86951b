use std::future::Future;

use onb_core::error::AppError;
use tokio::io::{AsyncBufRead, Lines};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Stdin closed.
    Eof,
    Interrupted,
}

/// Next line from `lines`, or `Interrupted` if `interrupt` resolves first.
/// `next_line` is cancel safe, so losing the race drops no input.
pub async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> Result<Input, AppError>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::select! {
        line = lines.next_line() => match line {
            Ok(Some(line)) => Ok(Input::Line(line)),
            Ok(None) => Ok(Input::Eof),
            Err(e) => Err(AppError::new("CHAT_INPUT_FAILED", "Failed to read input").with_details(e.to_string())),
        },
        _ = interrupt => Ok(Input::Interrupted),
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves,
/// leaving the default signal action in place.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}
