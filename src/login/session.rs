//! Login session: the anti-forgery nonce and the forward-only status

use parking_lot::Mutex;

/// Nonce entropy in bytes (hex-encoded to twice as many characters)
pub const NONCE_BYTES: usize = 16;

/// Status of the one login session a process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Listener is live and the browser has been sent to the login page
    Pending,
    /// A callback carried the right `state` and a `code`
    CodeReceived,
    /// Code exchanged and token confirmed; the principal is known
    Validated,
    /// The most recent callback attempt was rejected; still waiting
    Failed,
    /// Listener torn down; nothing else is served
    Closed,
}

impl SessionStatus {
    /// Whether the session may move from `self` to `next`.
    ///
    /// `Pending` is never re-entered, `Validated` only leads to `Closed`, and
    /// `Closed` is final. `CodeReceived` and `Failed` describe individual
    /// callback attempts, so either may follow the other while still waiting,
    /// and an attempt already past its code check may still validate after a
    /// concurrent attempt failed.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Pending) => false,
            (Validated, Closed) => true,
            (Validated, _) => false,
            (CodeReceived | Failed, Validated) => true,
            (_, Validated) => false,
            (Pending | CodeReceived | Failed, CodeReceived | Failed | Closed) => true,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionStatus::Closed
    }
}

/// The single login session owned by the coordinator
#[derive(Debug)]
pub struct AuthSession {
    nonce: String,
    status: Mutex<SessionStatus>,
}

impl AuthSession {
    /// Create a session with a fresh random nonce
    pub fn new() -> Self {
        let bytes: [u8; NONCE_BYTES] = rand::random();
        Self::with_nonce(hex::encode(bytes))
    }

    /// Create a session with a caller-chosen nonce
    pub fn with_nonce(nonce: impl Into<String>) -> Self {
        Self {
            nonce: nonce.into(),
            status: Mutex::new(SessionStatus::Pending),
        }
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.lock()
    }

    /// Move to `next` if the transition is allowed. Returns whether it moved.
    pub fn advance(&self, next: SessionStatus) -> bool {
        let mut status = self.status.lock();
        if status.can_transition_to(next) {
            *status = next;
            true
        } else {
            false
        }
    }

    /// Compare a callback's `state` against the nonce in constant time
    pub fn verify_state(&self, state: &str) -> bool {
        constant_time_eq(self.nonce.as_bytes(), state.as_bytes())
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
