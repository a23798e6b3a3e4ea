//! Automaton state values.
//!
//! A [`Stack`] is the explicit call stack of a recursive-descent recognizer:
//! each frame is the bytecode offset of an item still to be matched, top
//! last. Stacks are immutable and compare/hash by content, since they double
//! as cache keys. A [`StackSet`] holds every parse alternative still alive.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Stack(Arc<[u32]>);

impl Stack {
    /// The accepting stack: nothing left to match.
    pub fn empty() -> Self {
        Stack(Arc::from(Vec::new()))
    }

    pub fn frames(&self) -> &[u32] {
        &self.0
    }

    pub fn top(&self) -> Option<u32> {
        self.0.last().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pop the top frame, then push each of `pushes` that is present.
    pub(crate) fn replace_top(&self, pushes: [Option<u32>; 2]) -> Stack {
        let below = &self.0[..self.0.len().saturating_sub(1)];
        let mut frames = Vec::with_capacity(below.len() + 2);
        frames.extend_from_slice(below);
        frames.extend(pushes.into_iter().flatten());
        Stack(frames.into())
    }
}

impl From<Vec<u32>> for Stack {
    fn from(frames: Vec<u32>) -> Self {
        Stack(frames.into())
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// StackSet
// ---------------------------------------------------------------------------

/// Linear dedup below this size, hashed above.
const SMALL_DEDUP_THRESHOLD: usize = 12;

/// Insertion-ordered set of stacks.
#[derive(Clone, Default)]
pub struct StackSet {
    stacks: Vec<Stack>,
    index: Option<FxHashSet<Stack>>,
}

impl StackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `stack` unless already present. Returns true if it was added.
    pub fn insert(&mut self, stack: Stack) -> bool {
        if let Some(ref mut index) = self.index {
            if !index.insert(stack.clone()) {
                return false;
            }
            self.stacks.push(stack);
            return true;
        }

        if self.stacks.contains(&stack) {
            return false;
        }
        self.stacks.push(stack);

        if self.stacks.len() >= SMALL_DEDUP_THRESHOLD {
            self.index = Some(self.stacks.iter().cloned().collect());
        }
        true
    }

    pub fn contains(&self, stack: &Stack) -> bool {
        match &self.index {
            Some(index) => index.contains(stack),
            None => self.stacks.contains(stack),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stack> {
        self.stacks.iter()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// True if some alternative has nothing left to match.
    pub fn can_terminate(&self) -> bool {
        self.stacks.iter().any(Stack::is_empty)
    }
}

/// Set equality, ignoring insertion order.
impl PartialEq for StackSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.stacks.iter().all(|s| other.contains(s))
    }
}

impl Eq for StackSet {}

impl fmt::Debug for StackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.stacks.iter()).finish()
    }
}

impl Extend<Stack> for StackSet {
    fn extend<I: IntoIterator<Item = Stack>>(&mut self, iter: I) {
        for stack in iter {
            self.insert(stack);
        }
    }
}

impl FromIterator<Stack> for StackSet {
    fn from_iter<I: IntoIterator<Item = Stack>>(iter: I) -> Self {
        let mut set = StackSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a StackSet {
    type Item = &'a Stack;
    type IntoIter = std::slice::Iter<'a, Stack>;

    fn into_iter(self) -> Self::IntoIter {
        self.stacks.iter()
    }
}
