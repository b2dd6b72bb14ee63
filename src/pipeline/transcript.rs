//! Conversation transcript state
//!
//! Turns are only appended, never removed, and all mutation goes through
//! transition methods looked up by id, never by position, so concurrent
//! appends cannot redirect an in-flight update to the wrong turn.

/// User-text shown while transcription is still in flight
pub const PROCESSING_PLACEHOLDER: &str = "Processing audio…";

/// Identity of one turn, assigned monotonically by the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(u64);

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user utterance and its assistant response
#[derive(Debug, Clone)]
pub struct Turn {
    /// Transcript-assigned identity
    pub id: TurnId,
    /// Transcribed utterance; starts as [`PROCESSING_PLACEHOLDER`]
    pub user_text: String,
    /// Assistant response; empty until the first content arrives
    pub assistant_text: String,
    /// False when the command was unclear (gates synthesis in batch mode)
    pub understood: bool,
    /// True once the response text is complete and immutable
    pub finalized: bool,
    user_text_applied: bool,
}

impl Turn {
    fn new(id: TurnId) -> Self {
        Self {
            id,
            user_text: PROCESSING_PLACEHOLDER.to_string(),
            assistant_text: String::new(),
            understood: false,
            finalized: false,
            user_text_applied: false,
        }
    }

    /// True once the real transcription replaced the placeholder
    #[must_use]
    pub const fn user_text_applied(&self) -> bool {
        self.user_text_applied
    }
}

/// Ordered history of turns with monotonic id assignment
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    next_id: u64,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub const fn new() -> Self {
        Self {
            turns: Vec::new(),
            next_id: 0,
        }
    }

    /// Append a new turn with the placeholder user text
    pub fn begin_turn(&mut self) -> TurnId {
        let id = TurnId(self.next_id);
        self.next_id += 1;
        self.turns.push(Turn::new(id));
        tracing::debug!(turn = %id, "turn started");
        id
    }

    /// Look up a turn by id
    #[must_use]
    pub fn turn(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    fn turn_mut(&mut self, id: TurnId) -> Option<&mut Turn> {
        self.turns.iter_mut().find(|t| t.id == id)
    }

    /// Replace the placeholder user text, the first time only
    ///
    /// Returns whether the write was applied; repeat calls leave the text
    /// untouched.
    pub fn apply_user_text(&mut self, id: TurnId, text: &str) -> bool {
        let Some(turn) = self.turn_mut(id) else {
            return false;
        };
        if turn.user_text_applied || turn.finalized {
            return false;
        }

        turn.user_text = text.to_string();
        turn.user_text_applied = true;
        true
    }

    /// Overwrite the assistant text with a newer cumulative snapshot
    ///
    /// Snapshots shorter than what is already applied are dropped, so a
    /// reader can never observe the text regress; finalized turns are
    /// immutable. Returns whether the write was applied.
    pub fn apply_snapshot(&mut self, id: TurnId, snapshot: &str) -> bool {
        let Some(turn) = self.turn_mut(id) else {
            return false;
        };
        if turn.finalized || snapshot.len() < turn.assistant_text.len() {
            return false;
        }

        turn.assistant_text = snapshot.to_string();
        true
    }

    /// Complete a turn: set its final response text and understood verdict
    ///
    /// Returns false (and changes nothing) if the turn is already finalized.
    pub fn finalize(&mut self, id: TurnId, text: &str, understood: bool) -> bool {
        let Some(turn) = self.turn_mut(id) else {
            return false;
        };
        if turn.finalized {
            return false;
        }

        turn.assistant_text = text.to_string();
        turn.understood = understood;
        turn.finalized = true;
        tracing::debug!(turn = %id, understood, "turn finalized");
        true
    }

    /// All turns in append order
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when no turn has been started
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recently appended turn
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}
