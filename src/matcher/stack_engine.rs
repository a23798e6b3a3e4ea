//! Pushdown automaton over bytecode positions.
//!
//! The engine's transition relation works on [`StackSet`]s: every stack it
//! hands out is *closed*, i.e. empty or topped by a byte-class item, so the
//! next byte can be tested directly against the top frame.

use std::sync::Arc;

use tracing::trace;

use super::cache::{CacheStats, StackCache};
use super::stack::{Stack, StackSet};
use crate::compiled_grammar::CompiledGrammar;
use crate::grammar::{END, RuleId};

pub struct StackEngine {
    compiled: Arc<CompiledGrammar>,
    /// Closed stacks reachable from a stack topped by a rule reference.
    closures: StackCache<Arc<[Stack]>>,
}

impl StackEngine {
    pub fn new(compiled: Arc<CompiledGrammar>, closure_cache_capacity: usize) -> Self {
        Self { compiled, closures: StackCache::new(closure_cache_capacity) }
    }

    pub fn compiled(&self) -> &Arc<CompiledGrammar> {
        &self.compiled
    }

    /// All closed stacks reachable from `stack` without consuming input.
    ///
    /// Grammars with an epsilon cycle (a rule reaching itself through
    /// references alone) make this recurse without bound.
    pub fn epsilon_close(&self, stack: &Stack) -> StackSet {
        let mut out = StackSet::new();
        self.close_into(stack, &mut out);
        out
    }

    /// Stack set before any input: every alternate of the start rule, closed.
    pub fn initial_stacks(&self) -> StackSet {
        let mut out = StackSet::new();
        self.expand_rule(&[], None, self.compiled.start_rule(), &mut out);
        out
    }

    /// Advance every stack whose top class admits `byte`; drop the rest.
    ///
    /// An empty result means `byte` is illegal in this state.
    pub fn accept_byte(&self, byte: u8, stacks: &StackSet) -> StackSet {
        let code = self.compiled.code();
        let mut out = StackSet::new();
        for stack in stacks {
            let Some(pos) = stack.top() else { continue };
            let Some(set) = self.compiled.byte_set(pos) else { continue };
            if !set.contains(byte) {
                continue;
            }
            let next = pos as usize + 1 + code[pos as usize] as usize;
            let cont = (code[next] != END).then_some(next as u32);
            self.close_into(&stack.replace_top([cont, None]), &mut out);
        }
        out
    }

    /// Fold [`Self::accept_byte`] over `bytes`, stopping early once nothing survives.
    pub fn accept_bytes(&self, bytes: &[u8], stacks: &StackSet) -> StackSet {
        let mut current = stacks.clone();
        for &b in bytes {
            current = self.accept_byte(b, &current);
            if current.is_empty() {
                break;
            }
        }
        current
    }

    pub fn closure_stats(&self) -> CacheStats {
        self.closures.stats()
    }

    pub fn clear_cache(&self) {
        self.closures.clear();
    }

    fn close_into(&self, stack: &Stack, out: &mut StackSet) {
        match stack.top() {
            None => {
                out.insert(stack.clone());
            }
            Some(pos) if self.compiled.is_terminal(pos) => {
                out.insert(stack.clone());
            }
            Some(_) => out.extend(self.closure(stack).iter().cloned()),
        }
    }

    /// Memoized closure of a stack topped by a rule reference.
    fn closure(&self, stack: &Stack) -> Arc<[Stack]> {
        if let Some(closed) = self.closures.get(stack) {
            return closed;
        }

        let code = self.compiled.code();
        let frames = stack.frames();
        let (&pos, below) = match frames.split_last() {
            Some(split) => split,
            None => return Arc::from([stack.clone()]),
        };
        let pos = pos as usize;
        let next = pos + 2;
        let cont = (code[next] != END).then_some(next as u32);

        let mut result = StackSet::new();
        self.expand_rule(below, cont, RuleId(code[pos + 1]), &mut result);
        trace!(depth = frames.len(), closed = result.len(), "epsilon closure");

        let closed: Arc<[Stack]> = result.iter().cloned().collect();
        self.closures.put(stack.clone(), closed.clone());
        closed
    }

    /// For each alternate of `rule`, close `below ++ cont? ++ first_item?`.
    fn expand_rule(&self, below: &[u32], cont: Option<u32>, rule: RuleId, out: &mut StackSet) {
        let code = self.compiled.code();
        let offset = self.compiled.rule_offset(rule);
        for alt in self.compiled.grammar().alternates(offset) {
            let first = alt + 1;
            let mut frames = Vec::with_capacity(below.len() + 2);
            frames.extend_from_slice(below);
            frames.extend(cont);
            if code[first] != END {
                frames.push(first as u32);
            }
            self.close_into(&Stack::from(frames), out);
        }
    }
}
