//! Compiled grammar representation.
//!
//! A grammar compiles to a flat `u32` bytecode plus a [`SymbolTable`]:
//!
//! ```text
//! grammar   := rule* END_OF_GRAMMAR
//! rule      := rule_id alternate* END
//! alternate := size item* END          size counts size field + items
//! item      := RULE_REF rule_id        nonterminal reference
//!            | 2k lo_1 hi_1 .. lo_k hi_k    byte class, k >= 1
//! ```
//!
//! Positions into the bytecode are the automaton's currency: a stack frame
//! is the offset of the item still to be matched.

pub mod compiler;
pub mod symbols;

use std::fmt;

pub use symbols::SymbolTable;

/// Dense nonterminal id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

/// Terminates an alternate, and the alternate list of a rule.
pub const END: u32 = 0;
/// Tag of a nonterminal reference item.
pub const RULE_REF: u32 = 1;
/// Terminates the rule list.
pub const END_OF_GRAMMAR: u32 = 0xFFFF;

/// An immutable compiled grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub(crate) bytecode: Vec<u32>,
    pub(crate) symbols: SymbolTable,
}

impl Grammar {
    pub fn bytecode(&self) -> &[u32] {
        &self.bytecode
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Number of rules defined in the bytecode (synthesized ones included).
    pub fn num_rules(&self) -> usize {
        self.rule_offsets().count()
    }

    /// Iterate `(offset, rule_id)` for every rule definition, in bytecode order.
    pub fn rule_offsets(&self) -> RuleOffsets<'_> {
        RuleOffsets { code: &self.bytecode, pos: 0 }
    }

    /// Byte ranges of the class item at `pos`, or `None` if `pos` is not a class item.
    pub fn class_ranges(&self, pos: usize) -> Option<impl Iterator<Item = (u8, u8)> + '_> {
        let count = *self.bytecode.get(pos)? as usize;
        if count <= RULE_REF as usize {
            return None;
        }
        let body = self.bytecode.get(pos + 1..pos + 1 + count)?;
        Some(body.chunks_exact(2).map(|pair| (pair[0] as u8, pair[1] as u8)))
    }

    /// Iterate the offsets of the alternates of the rule defined at `rule_offset`.
    pub(crate) fn alternates(&self, rule_offset: usize) -> Alternates<'_> {
        Alternates { code: &self.bytecode, pos: rule_offset + 1 }
    }

    fn rule_name(&self, id: u32) -> &str {
        self.symbols.name_of(RuleId(id)).unwrap_or("?")
    }

    fn fmt_rule(&self, f: &mut fmt::Formatter<'_>, offset: usize) -> fmt::Result {
        let code = &self.bytecode;
        write!(f, "<{}>{} ::=", offset, self.rule_name(code[offset]))?;
        for (i, alt) in self.alternates(offset).enumerate() {
            if i > 0 {
                write!(f, " |")?;
            }
            let mut pos = alt + 1;
            while code[pos] != END {
                if code[pos] == RULE_REF {
                    write!(f, " <{}>{}", pos, self.rule_name(code[pos + 1]))?;
                    pos += 2;
                } else {
                    write!(f, " <{}>[", pos)?;
                    let count = code[pos] as usize;
                    for pair in code[pos + 1..pos + 1 + count].chunks_exact(2) {
                        fmt_class_byte(f, pair[0])?;
                        if pair[1] != pair[0] {
                            write!(f, "-")?;
                            fmt_class_byte(f, pair[1])?;
                        }
                    }
                    write!(f, "]")?;
                    pos += 1 + count;
                }
            }
        }
        writeln!(f)
    }
}

fn fmt_class_byte(f: &mut fmt::Formatter<'_>, b: u32) -> fmt::Result {
    match b {
        0x5c => write!(f, "\\\\"),
        0x5d => write!(f, "\\]"),
        0x09 => write!(f, "\\t"),
        0x0a => write!(f, "\\n"),
        0x0d => write!(f, "\\r"),
        // `-` is hex-escaped so it never reads as a range.
        0x20..=0x7e if b != 0x2d => write!(f, "{}", b as u8 as char),
        _ => write!(f, "\\x{:02x}", b),
    }
}

/// Debug dump: one line per rule, then the raw bytecode in hex.
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (offset, _) in self.rule_offsets() {
            self.fmt_rule(f, offset)?;
        }
        for &value in self.bytecode.iter().take_while(|&&v| v != END_OF_GRAMMAR) {
            write!(f, "{:04x} ", value)?;
        }
        writeln!(f, "{:04x}", END_OF_GRAMMAR)
    }
}

/// Iterator over rule definitions; see [`Grammar::rule_offsets`].
pub struct RuleOffsets<'a> {
    code: &'a [u32],
    pos: usize,
}

impl Iterator for RuleOffsets<'_> {
    type Item = (usize, RuleId);

    fn next(&mut self) -> Option<Self::Item> {
        let rule_id = *self.code.get(self.pos)?;
        if rule_id == END_OF_GRAMMAR {
            return None;
        }
        let offset = self.pos;
        let mut pos = self.pos + 1;
        while self.code[pos] != END {
            pos += 1 + self.code[pos] as usize;
        }
        self.pos = pos + 1;
        Some((offset, RuleId(rule_id)))
    }
}

/// Iterator over the offsets of a rule's alternates (each pointing at its size field).
pub(crate) struct Alternates<'a> {
    code: &'a [u32],
    pos: usize,
}

impl Iterator for Alternates<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let size = *self.code.get(self.pos)?;
        if size == END {
            return None;
        }
        let alt = self.pos;
        self.pos += 1 + size as usize;
        Some(alt)
    }
}
