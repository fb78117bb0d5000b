//! The top-level state bundle a processor drives one top-level invocation through:
//! persistent variables plus undo log, and the two transient accumulators that live
//! only for the invocation's duration.

use crate::funds::FundsAccumulator;
use crate::sigs::SignatureAccumulator;
use crate::undo::UndoLog;
use crate::var_store::VariableStore;

#[derive(Debug, Default)]
pub struct State {
    pub vars: VariableStore,
    pub undo: UndoLog,
    pub funds: FundsAccumulator,
    pub sigs: SignatureAccumulator,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the point a top-level invocation begins. On failure the caller rewinds
    /// `self.vars` to this checkpoint and discards `self.funds`/`self.sigs` outright,
    /// since neither accumulator is ever persisted.
    pub fn checkpoint(&self) -> usize {
        self.undo.checkpoint()
    }

    pub fn rollback(&mut self, checkpoint: usize) {
        self.undo.rewind_to(checkpoint, &self.vars);
        self.funds = FundsAccumulator::new();
        self.sigs = SignatureAccumulator::new();
    }

    /// Clears the transient accumulators after a successful invocation, so the next
    /// one starts from zero regardless of what this one left behind.
    pub fn finish_invocation(&mut self) {
        self.funds = FundsAccumulator::new();
        self.sigs = SignatureAccumulator::new();
    }
}
