//! Rule name ↔ id mapping.

use rustc_hash::FxHashMap;

use super::RuleId;

/// Dense name → id table for grammar nonterminals.
///
/// Ids are handed out in first-seen order and never change once assigned.
/// Helper rules synthesized by the compiler are named `<base>_<id>'`. The
/// trailing `'` is not a name character, so no rule written in a grammar
/// can share a helper's spelling, whichever of the two is seen first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    ids: FxHashMap<String, RuleId>,
    names: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, allocating the next one if unseen.
    pub fn intern(&mut self, name: &str) -> RuleId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = RuleId(self.names.len() as u32);
        self.ids.insert(name.to_owned(), id);
        self.names.push(name.to_owned());
        id
    }

    /// Allocate a helper rule derived from `base`.
    pub fn synthesize(&mut self, base: &str) -> RuleId {
        let id = RuleId(self.names.len() as u32);
        let mut name = format!("{}_{}'", base, id.0);
        // Only reachable through `intern` calls made outside the compiler.
        let mut suffix = 0;
        while self.ids.contains_key(&name) {
            suffix += 1;
            name = format!("{}_{}'{}", base, id.0, suffix);
        }
        self.ids.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<RuleId> {
        self.ids.get(name).copied()
    }

    pub fn name_of(&self, id: RuleId) -> Option<&str> {
        self.names.get(id.0 as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(id, name)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (RuleId(i as u32), name.as_str()))
    }
}
