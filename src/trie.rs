//! Byte trie over vocabulary tokens.
//!
//! Nodes live in a flat arena and refer to their children by index. Each
//! node keeps its outgoing edges sorted by byte, plus the ids of the tokens
//! whose byte string ends there (several ids may decode to the same bytes).

use smallvec::SmallVec;
use tracing::debug;

use crate::tokenizer::Vocabulary;

pub type NodeId = u32;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: Vec<(u8, NodeId)>,
    tokens: SmallVec<[u32; 1]>,
}

#[derive(Debug, Clone)]
pub struct TokenTrie {
    nodes: Vec<TrieNode>,
    num_tokens: usize,
}

impl Default for TokenTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenTrie {
    pub fn new() -> Self {
        Self { nodes: vec![TrieNode::default()], num_tokens: 0 }
    }

    /// Insert every text token of `vocab`. Special ids and end-of-sequence
    /// are left out.
    pub fn build(vocab: &dyn Vocabulary) -> Self {
        let mut trie = Self::new();
        let eos = vocab.eos_token_id();
        let mut skipped = 0usize;
        for id in 0..vocab.vocab_size() as u32 {
            if id == eos {
                continue;
            }
            match vocab.token_bytes(id) {
                Some(bytes) if !bytes.is_empty() => trie.insert(bytes, id),
                _ => skipped += 1,
            }
        }
        debug!(
            nodes = trie.num_nodes(),
            tokens = trie.num_tokens,
            special = skipped,
            "built token trie"
        );
        trie
    }

    pub fn insert(&mut self, bytes: &[u8], token_id: u32) {
        let mut node = ROOT;
        for &b in bytes {
            node = match self.child(node, b) {
                Some(next) => next,
                None => {
                    let next = self.nodes.len() as NodeId;
                    self.nodes.push(TrieNode::default());
                    let children = &mut self.nodes[node as usize].children;
                    let at = children.partition_point(|&(edge, _)| edge < b);
                    children.insert(at, (b, next));
                    next
                }
            };
        }
        self.nodes[node as usize].tokens.push(token_id);
        self.num_tokens += 1;
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// Outgoing edges of `node`, in increasing byte order.
    pub fn children(&self, node: NodeId) -> &[(u8, NodeId)] {
        &self.nodes[node as usize].children
    }

    pub fn child(&self, node: NodeId, byte: u8) -> Option<NodeId> {
        let children = self.children(node);
        children
            .binary_search_by_key(&byte, |&(edge, _)| edge)
            .ok()
            .map(|i| children[i].1)
    }

    /// Tokens whose byte string ends exactly at `node`.
    pub fn tokens_at(&self, node: NodeId) -> &[u32] {
        &self.nodes[node as usize].tokens
    }

    /// Node reached by `bytes` from the root, if any.
    pub fn find(&self, bytes: &[u8]) -> Option<NodeId> {
        bytes.iter().try_fold(ROOT, |node, &b| self.child(node, b))
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_tokens(&self) -> usize {
        self.num_tokens
    }
}
