use relay_core::ids::ConnectionId;
use relay_core::messages::Turn;
use relay_core::provider::GenerateOptions;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Closed,
}

/// Per-connection conversation state. Lives exactly as long as the
/// connection; nothing is persisted.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    history: Vec<Turn>,
    status: SessionStatus,
    options: GenerateOptions,
}

impl Session {
    pub fn new(options: GenerateOptions) -> Self {
        Self {
            id: ConnectionId::new(),
            history: Vec::new(),
            status: SessionStatus::Active,
            options,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Prior turns in conversational order.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Number of completed multi-turn exchanges.
    pub fn turn_count(&self) -> usize {
        self.history.len() / 2
    }

    /// Append a completed exchange. Ignored once the session is closed.
    pub fn record_turn(&mut self, user: impl Into<String>, reply: impl Into<String>) {
        if !self.is_active() {
            return;
        }
        self.history.push(Turn::user(user));
        self.history.push(Turn::model(reply));
    }

    pub fn close(&mut self) {
        self.status = SessionStatus::Closed;
    }
}
