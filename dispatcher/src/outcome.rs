/// Result of one dispatch cycle. Never propagated beyond the chat it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler succeeded and its unit of work committed.
    Success { reply: Option<String> },
    /// No command token, or no handler bound to it. No unit of work was opened.
    Unhandled,
    /// Handler returned an error; the unit of work was rolled back.
    HandlerFailed { cause: String },
    /// Persistence was unavailable (pool exhausted, upsert or commit failed).
    Unavailable { cause: String },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success { .. })
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchOutcome::Success { .. } => "success",
            DispatchOutcome::Unhandled => "unhandled",
            DispatchOutcome::HandlerFailed { .. } => "handler_failed",
            DispatchOutcome::Unavailable { .. } => "unavailable",
        }
    }
}
