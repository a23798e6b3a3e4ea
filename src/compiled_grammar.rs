//! Runtime view of a compiled grammar: rule index, start rule, byte sets.
//!
//! `CompiledGrammar` is built once from a [`Grammar`] and is immutable
//! afterwards, so it can be shared by `Arc` between any number of sessions.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{GrammarError, Result};
use crate::grammar::{END, Grammar, RULE_REF, RuleId};

// ---------------------------------------------------------------------------
// Byte sets
// ---------------------------------------------------------------------------

/// 256-bit membership table for one byte-class item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteSet([u64; 4]);

impl ByteSet {
    pub fn from_ranges(ranges: impl IntoIterator<Item = (u8, u8)>) -> Self {
        let mut bits = [0u64; 4];
        for (lo, hi) in ranges {
            for b in lo..=hi {
                bits[(b / 64) as usize] |= 1u64 << (b % 64);
            }
        }
        ByteSet(bits)
    }

    #[inline]
    pub fn contains(&self, byte: u8) -> bool {
        self.0[(byte / 64) as usize] & (1u64 << (byte % 64)) != 0
    }
}

// ---------------------------------------------------------------------------
// Rule index
// ---------------------------------------------------------------------------

/// Rule id → bytecode offset of that rule's `rule_id` field.
#[derive(Debug, Clone)]
pub struct RuleIndex {
    offsets: Vec<Option<u32>>,
}

impl RuleIndex {
    /// One linear scan over the bytecode.
    pub fn build(grammar: &Grammar) -> Self {
        let mut offsets = vec![None; grammar.symbols().len()];
        for (offset, rule_id) in grammar.rule_offsets() {
            let slot = rule_id.0 as usize;
            if slot >= offsets.len() {
                offsets.resize(slot + 1, None);
            }
            offsets[slot] = Some(offset as u32);
        }
        Self { offsets }
    }

    pub fn offset(&self, id: RuleId) -> Option<usize> {
        self.offsets.get(id.0 as usize).copied().flatten().map(|o| o as usize)
    }

    /// Ids that have a symbol but no definition.
    fn undefined(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.offsets
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_none())
            .map(|(i, _)| RuleId(i as u32))
    }
}

// ---------------------------------------------------------------------------
// Compiled grammar
// ---------------------------------------------------------------------------

pub struct CompiledGrammar {
    grammar: Grammar,
    rule_index: RuleIndex,
    start_rule: RuleId,
    /// Byte set of every class item, keyed by its bytecode position.
    byte_sets: FxHashMap<u32, ByteSet>,
}

impl CompiledGrammar {
    /// Index `grammar` and resolve `start_rule_name`.
    ///
    /// Fails if the start rule is unknown or if any referenced rule has no
    /// definition.
    pub fn new(grammar: Grammar, start_rule_name: &str) -> Result<Self> {
        let rule_index = RuleIndex::build(&grammar);

        if let Some(missing) = rule_index.undefined().next() {
            let name = grammar.symbols().name_of(missing).unwrap_or("?").to_owned();
            return Err(GrammarError::UndefinedRule { name });
        }

        let start_rule = grammar
            .symbols()
            .id_of(start_rule_name)
            .ok_or_else(|| GrammarError::UnknownStartRule { name: start_rule_name.to_owned() })?;

        let byte_sets = collect_byte_sets(&grammar);

        debug!(
            rules = grammar.num_rules(),
            classes = byte_sets.len(),
            start = start_rule_name,
            "indexed grammar"
        );

        Ok(Self { grammar, rule_index, start_rule, byte_sets })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn rule_index(&self) -> &RuleIndex {
        &self.rule_index
    }

    pub fn start_rule(&self) -> RuleId {
        self.start_rule
    }

    #[inline]
    pub(crate) fn code(&self) -> &[u32] {
        &self.grammar.bytecode
    }

    /// Offset of a rule that is known to be defined (checked in [`Self::new`]).
    #[inline]
    pub(crate) fn rule_offset(&self, id: RuleId) -> usize {
        self.rule_index.offset(id).unwrap_or_default()
    }

    /// Byte set of the class item at `pos`; `None` if `pos` holds a rule reference.
    #[inline]
    pub fn byte_set(&self, pos: u32) -> Option<&ByteSet> {
        self.byte_sets.get(&pos)
    }

    /// True if `pos` holds a byte-class item.
    #[inline]
    pub fn is_terminal(&self, pos: u32) -> bool {
        self.code()[pos as usize] > RULE_REF
    }
}

fn collect_byte_sets(grammar: &Grammar) -> FxHashMap<u32, ByteSet> {
    let code = grammar.bytecode();
    let mut sets = FxHashMap::default();
    for (offset, _) in grammar.rule_offsets() {
        for alt in grammar.alternates(offset) {
            let mut pos = alt + 1;
            while code[pos] != END {
                if code[pos] == RULE_REF {
                    pos += 2;
                    continue;
                }
                if let Some(ranges) = grammar.class_ranges(pos) {
                    sets.insert(pos as u32, ByteSet::from_ranges(ranges));
                }
                pos += 1 + code[pos] as usize;
            }
        }
    }
    sets
}
