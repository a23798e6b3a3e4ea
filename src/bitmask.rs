//! Token acceptance bitmaps.
//!
//! A bitmask is a run of `u32` words where bit `i` indicates whether token
//! `i` is allowed. Bit 1 = allowed, bit 0 = rejected.

/// Compute the number of `u32` words needed for a bitmask of `vocab_size` tokens.
pub fn bitmask_size(vocab_size: usize) -> usize {
    vocab_size.div_ceil(32)
}

/// Set bit `i` in the bitmask (mark token as allowed).
#[inline]
pub fn set_bit(bitmask: &mut [u32], i: usize) {
    bitmask[i / 32] |= 1 << (i % 32);
}

/// Get bit `i` from the bitmask. Returns true if the token is allowed.
#[inline]
pub fn get_bit(bitmask: &[u32], i: usize) -> bool {
    (bitmask[i / 32] >> (i % 32)) & 1 == 1
}

/// Apply the token bitmask to logits in-place.
/// Sets logits to `-inf` for rejected tokens (bit = 0), including any
/// logits past the end of the bitmask.
pub fn apply_token_bitmask_inplace(logits: &mut [f32], bitmask: &[u32]) {
    let covered = bitmask.len() * 32;
    for (i, logit) in logits.iter_mut().enumerate() {
        if i >= covered || !get_bit(bitmask, i) {
            *logit = f32::NEG_INFINITY;
        }
    }
}

/// Fixed-size acceptance bitmap over a vocabulary.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenBitmask {
    words: Vec<u32>,
    len: usize,
}

impl TokenBitmask {
    /// All tokens rejected.
    pub fn new(len: usize) -> Self {
        Self { words: vec![0; bitmask_size(len)], len }
    }

    /// Number of tokens covered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn set(&mut self, token_id: usize) {
        debug_assert!(token_id < self.len);
        set_bit(&mut self.words, token_id);
    }

    /// False for ids outside the bitmap.
    #[inline]
    pub fn get(&self, token_id: usize) -> bool {
        token_id < self.len && get_bit(&self.words, token_id)
    }

    /// Bitwise OR of `other` into `self`.
    pub fn union_with(&mut self, other: &TokenBitmask) {
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= *o;
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Allowed token ids in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros();
                rest &= rest - 1;
                Some(i as u32 * 32 + bit)
            })
        })
    }

    /// Raw words, suitable for handing to a batched masking kernel.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Set every rejected logit to `-inf`.
    pub fn apply_to_logits(&self, logits: &mut [f32]) {
        apply_token_bitmask_inplace(logits, &self.words);
    }
}

impl std::fmt::Debug for TokenBitmask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBitmask")
            .field("len", &self.len)
            .field("allowed", &self.iter_ones().collect::<Vec<_>>())
            .finish()
    }
}
