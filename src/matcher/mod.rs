//! Grammar matcher: stack automaton + token acceptance + logits masking.
//!
//! `GrammarMatcher` is the main runtime entry point. It owns everything that
//! is immutable once built (compiled grammar, token trie, vocabulary) plus
//! the memo tables derived from them, and is meant to be shared by `Arc`
//! between generation sessions. Per-session state is a [`StackSet`] value,
//! usually held by a [`LogitsProcessor`](crate::processor::LogitsProcessor).
//!
//! Acceptance is computed per stack by walking the token trie and the
//! automaton together: a trie subtree is skipped as soon as its prefix
//! kills every stack, so shared prefixes are only matched once.

pub mod cache;
pub mod stack;
pub mod stack_engine;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::bitmask::TokenBitmask;
use crate::compiled_grammar::CompiledGrammar;
use crate::config::SamplerConfig;
use crate::error::{GrammarError, Result};
use crate::grammar::Grammar;
use crate::processor::LogitsProcessor;
use crate::tokenizer::Vocabulary;
use crate::trie::{NodeId, TokenTrie};

pub use cache::CacheStats;
pub use stack::{Stack, StackSet};
pub use stack_engine::StackEngine;

/// Counters for both memo tables plus time spent computing acceptance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatcherStats {
    pub closure: CacheStats,
    pub acceptance: CacheStats,
    /// Number of per-stack bitmaps computed (acceptance cache misses).
    pub acceptance_computed: u64,
    pub acceptance_time: Duration,
}

/// Grammar-guided token matcher.
pub struct GrammarMatcher {
    engine: StackEngine,
    vocab: Arc<dyn Vocabulary>,
    trie: TokenTrie,
    acceptance: cache::StackCache<Arc<TokenBitmask>>,
    acceptance_computed: AtomicU64,
    acceptance_nanos: AtomicU64,
}

impl GrammarMatcher {
    /// Create a matcher with default cache sizes.
    pub fn new(grammar: Grammar, start_rule: &str, vocab: Arc<dyn Vocabulary>) -> Result<Self> {
        let config = SamplerConfig { start_rule: start_rule.to_owned(), ..Default::default() };
        Self::with_config(grammar, vocab, &config)
    }

    /// Compile `source` and build a matcher for it.
    pub fn from_ebnf(source: &str, start_rule: &str, vocab: Arc<dyn Vocabulary>) -> Result<Self> {
        Self::new(Grammar::from_ebnf(source)?, start_rule, vocab)
    }

    pub fn with_config(
        grammar: Grammar,
        vocab: Arc<dyn Vocabulary>,
        config: &SamplerConfig,
    ) -> Result<Self> {
        let compiled = Arc::new(CompiledGrammar::new(grammar, &config.start_rule)?);
        let trie = TokenTrie::build(vocab.as_ref());
        debug!(
            vocab_size = vocab.vocab_size(),
            trie_nodes = trie.num_nodes(),
            closure_cache = config.closure_cache_capacity,
            acceptance_cache = config.acceptance_cache_capacity,
            "created grammar matcher"
        );
        Ok(Self {
            engine: StackEngine::new(compiled, config.closure_cache_capacity),
            vocab,
            trie,
            acceptance: cache::StackCache::new(config.acceptance_cache_capacity),
            acceptance_computed: AtomicU64::new(0),
            acceptance_nanos: AtomicU64::new(0),
        })
    }

    pub fn engine(&self) -> &StackEngine {
        &self.engine
    }

    pub fn compiled(&self) -> &Arc<CompiledGrammar> {
        self.engine.compiled()
    }

    pub fn trie(&self) -> &TokenTrie {
        &self.trie
    }

    pub fn vocab(&self) -> &Arc<dyn Vocabulary> {
        &self.vocab
    }

    /// A fresh [`LogitsProcessor`] sharing this matcher.
    pub fn logits_processor(self: &Arc<Self>) -> LogitsProcessor {
        LogitsProcessor::new(Arc::clone(self))
    }

    // ---- Automaton ----

    pub fn initial_stacks(&self) -> StackSet {
        self.engine.initial_stacks()
    }

    pub fn epsilon_close(&self, stack: &Stack) -> StackSet {
        self.engine.epsilon_close(stack)
    }

    pub fn accept_byte(&self, byte: u8, stacks: &StackSet) -> StackSet {
        self.engine.accept_byte(byte, stacks)
    }

    /// Feed raw bytes; an empty result means they are not a valid continuation.
    pub fn accept_bytes(&self, bytes: &[u8], stacks: &StackSet) -> StackSet {
        self.engine.accept_bytes(bytes, stacks)
    }

    pub fn accept_str(&self, s: &str, stacks: &StackSet) -> StackSet {
        self.accept_bytes(s.as_bytes(), stacks)
    }

    /// True if end-of-sequence is legal in `stacks`.
    pub fn can_terminate(&self, stacks: &StackSet) -> bool {
        stacks.can_terminate()
    }

    /// Advance `stacks` by one token.
    ///
    /// End-of-sequence yields the empty (terminated) stack set. Any failure
    /// means the token was never marked acceptable by [`Self::filter_logits`].
    pub fn accept_token(&self, token_id: u32, stacks: &StackSet) -> Result<StackSet> {
        if token_id == self.vocab.eos_token_id() {
            if stacks.can_terminate() {
                trace!(token_id, "accepted end of sequence");
                return Ok(StackSet::new());
            }
            return Err(GrammarError::EndOfSequenceRejected);
        }

        let vocab_size = self.vocab.vocab_size();
        if token_id as usize >= vocab_size {
            return Err(GrammarError::TokenOutOfRange { token_id, vocab_size });
        }
        let bytes = self
            .vocab
            .token_bytes(token_id)
            .ok_or(GrammarError::SpecialToken { token_id })?;

        let mut current = stacks.clone();
        for (byte_offset, &b) in bytes.iter().enumerate() {
            current = self.engine.accept_byte(b, &current);
            if current.is_empty() {
                return Err(GrammarError::TokenRejected { token_id, byte_offset });
            }
        }
        trace!(token_id, stacks = current.len(), "accepted token");
        Ok(current)
    }

    // ---- Acceptance ----

    /// Tokens that keep `stack` alive (or, for end-of-sequence, that `stack`
    /// is already complete). Memoized by stack content.
    pub fn acceptance_for(&self, stack: &Stack) -> Arc<TokenBitmask> {
        self.acceptance.get_or_insert_with(stack, || Arc::new(self.compute_acceptance(stack)))
    }

    /// Bitwise OR of [`Self::acceptance_for`] over every stack in `stacks`.
    pub fn acceptance_for_stackset(&self, stacks: &StackSet) -> TokenBitmask {
        let mut merged = TokenBitmask::new(self.vocab.vocab_size());
        for stack in stacks {
            merged.union_with(&self.acceptance_for(stack));
        }
        merged
    }

    /// Set every logit the grammar rejects in `stacks` to `-inf`.
    ///
    /// Entries past the vocabulary are rejected too; a vector shorter than
    /// the vocabulary is an error.
    pub fn filter_logits(&self, logits: &mut [f32], stacks: &StackSet) -> Result<()> {
        let vocab_size = self.vocab.vocab_size();
        if logits.len() < vocab_size {
            return Err(GrammarError::LogitsLength { expected: vocab_size, actual: logits.len() });
        }
        self.acceptance_for_stackset(stacks).apply_to_logits(logits);
        Ok(())
    }

    fn compute_acceptance(&self, stack: &Stack) -> TokenBitmask {
        let start = Instant::now();
        let mut accepts = TokenBitmask::new(self.vocab.vocab_size());

        if stack.is_empty() {
            let eos = self.vocab.eos_token_id() as usize;
            if eos < accepts.len() {
                accepts.set(eos);
            }
        } else {
            let stacks: StackSet = std::iter::once(stack.clone()).collect();
            self.walk_trie(self.trie.root(), &stacks, &mut accepts);
        }

        let elapsed = start.elapsed();
        self.acceptance_computed.fetch_add(1, Ordering::Relaxed);
        self.acceptance_nanos.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        trace!(
            depth = stack.len(),
            accepted = accepts.count_ones(),
            elapsed_us = elapsed.as_micros() as u64,
            "computed token acceptance"
        );
        accepts
    }

    /// Depth-first over trie edges, carrying the stacks alive after the prefix.
    fn walk_trie(&self, node: NodeId, stacks: &StackSet, accepts: &mut TokenBitmask) {
        for &(byte, child) in self.trie.children(node) {
            let next = self.engine.accept_byte(byte, stacks);
            if next.is_empty() {
                continue;
            }
            for &token_id in self.trie.tokens_at(child) {
                accepts.set(token_id as usize);
            }
            self.walk_trie(child, &next, accepts);
        }
    }

    // ---- Diagnostics ----

    pub fn stats(&self) -> MatcherStats {
        MatcherStats {
            closure: self.engine.closure_stats(),
            acceptance: self.acceptance.stats(),
            acceptance_computed: self.acceptance_computed.load(Ordering::Relaxed),
            acceptance_time: Duration::from_nanos(self.acceptance_nanos.load(Ordering::Relaxed)),
        }
    }

    /// Drop all memoized closures and bitmaps.
    pub fn clear_caches(&self) {
        self.engine.clear_cache();
        self.acceptance.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
