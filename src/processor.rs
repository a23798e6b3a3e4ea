//! Per-session adapter between a generation loop and a shared matcher.
//!
//! The loop calls [`LogitsProcessor::process`] once per step with the full
//! id sequence generated so far and the logits for the next position. The
//! processor feeds the newest id through the automaton, then masks the
//! logits. One processor per sequence; batching is not supported.

use std::sync::Arc;

use tracing::trace;

use crate::error::{GrammarError, Result};
use crate::matcher::{GrammarMatcher, StackSet};

pub struct LogitsProcessor {
    matcher: Arc<GrammarMatcher>,
    stacks: StackSet,
    /// Length of `input_ids` on the previous `process` call.
    last_len: Option<usize>,
}

impl LogitsProcessor {
    pub fn new(matcher: Arc<GrammarMatcher>) -> Self {
        let stacks = matcher.initial_stacks();
        Self { matcher, stacks, last_len: None }
    }

    /// Advance by the newest id in `input_ids` (except on the first call),
    /// then reject every logit the grammar does not allow.
    ///
    /// The first call only records the length, so a prompt of any size may
    /// precede generation. Every later call must see exactly one more id.
    pub fn process(&mut self, input_ids: &[u32], logits: &mut [f32]) -> Result<()> {
        let mut next = None;
        if let Some(last) = self.last_len {
            if input_ids.len() != last + 1 {
                return Err(GrammarError::SequenceLength {
                    expected: last + 1,
                    actual: input_ids.len(),
                });
            }
            if let Some(&token_id) = input_ids.last() {
                next = Some((token_id, self.matcher.accept_token(token_id, &self.stacks)?));
            }
        }

        // Nothing is committed until the logits are masked, so a failed call
        // can be retried with the same ids.
        let stacks = next.as_ref().map_or(&self.stacks, |(_, s)| s);
        self.matcher.filter_logits(logits, stacks)?;

        if let Some((token_id, stacks)) = next {
            self.stacks = stacks;
            trace!(token_id, stacks = self.stacks.len(), "processor advanced");
        }
        self.last_len = Some(input_ids.len());
        Ok(())
    }

    /// Advance by a token the caller chose outside of [`Self::process`].
    ///
    /// Keeps the expected sequence length in step, so a following `process`
    /// call must include this token.
    pub fn accept_token(&mut self, token_id: u32) -> Result<()> {
        self.advance(token_id)?;
        if let Some(last) = self.last_len.as_mut() {
            *last += 1;
        }
        Ok(())
    }

    pub fn stacks(&self) -> &StackSet {
        &self.stacks
    }

    pub fn matcher(&self) -> &Arc<GrammarMatcher> {
        &self.matcher
    }

    pub fn can_terminate(&self) -> bool {
        self.stacks.can_terminate()
    }

    /// Back to the initial state, as if no call had been made.
    pub fn reset(&mut self) {
        self.stacks = self.matcher.initial_stacks();
        self.last_len = None;
    }

    fn advance(&mut self, token_id: u32) -> Result<()> {
        self.stacks = self.matcher.accept_token(token_id, &self.stacks)?;
        trace!(token_id, stacks = self.stacks.len(), "processor advanced");
        Ok(())
    }
}
