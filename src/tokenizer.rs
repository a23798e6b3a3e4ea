//! Tokenizer vocabulary handling.
//!
//! The matcher only needs three things from a tokenizer: its size, the raw
//! bytes each token contributes when emitted, and the end-of-sequence id.
//! [`Vocabulary`] is that capability; [`TokenizerInfo`] implements it for an
//! encoded vocabulary list plus an explicit [`VocabType`] decoding rule.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Token id → byte string provider consumed by the matcher.
pub trait Vocabulary: Send + Sync {
    /// Number of token ids; valid ids are `0..vocab_size()`.
    fn vocab_size(&self) -> usize;

    /// Raw bytes of a text token, or `None` for special/non-text ids.
    fn token_bytes(&self, token_id: u32) -> Option<&[u8]>;

    fn eos_token_id(&self) -> u32;
}

/// The type of vocabulary encoding used by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabType {
    /// Tokens are used as-is, no decoding needed.
    Raw,
    /// Byte fallback encoding: `<0xAB>` → byte 0xAB, `▁` (U+2581) → space.
    /// Used by SentencePiece tokenizers (e.g., Llama).
    #[default]
    ByteFallback,
    /// Byte-level BPE: each byte is mapped to a unique Unicode character.
    /// Used by GPT-2/GPT-3 style tokenizers.
    ByteLevel,
}

/// Decoded tokenizer vocabulary.
#[derive(Debug, Clone)]
pub struct TokenizerInfo {
    /// decoded_vocab[token_id] = raw bytes emitted by that token.
    decoded_vocab: Vec<Vec<u8>>,
    /// Total vocabulary size (may be larger than decoded_vocab.len() due to padding tokens).
    vocab_size: usize,
    vocab_type: VocabType,
    eos_token_id: u32,
    /// special[token_id]: no text representation.
    special: Vec<bool>,
}

impl TokenizerInfo {
    /// Create a new TokenizerInfo from an encoded vocabulary.
    ///
    /// - `encoded_vocab`: The raw token strings from the tokenizer.
    /// - `vocab_type`: How to decode token strings.
    /// - `eos_token_id`: The end-of-sequence token.
    /// - `vocab_size`: Total vocabulary size (if larger than encoded_vocab.len(), extra tokens are
    ///   treated as special).
    pub fn new(
        encoded_vocab: &[String],
        vocab_type: VocabType,
        eos_token_id: u32,
        vocab_size: Option<usize>,
    ) -> Result<Self> {
        let vocab_size = vocab_size.unwrap_or(encoded_vocab.len());
        if vocab_size < encoded_vocab.len() {
            bail!(
                "vocab_size ({}) must be >= encoded_vocab.len() ({})",
                vocab_size,
                encoded_vocab.len()
            );
        }
        if eos_token_id as usize >= vocab_size {
            bail!("eos_token_id ({}) out of range for vocab_size ({})", eos_token_id, vocab_size);
        }

        let decoded_vocab: Vec<Vec<u8>> = encoded_vocab
            .iter()
            .map(|tok| decode_token(tok, vocab_type))
            .collect::<Result<Vec<_>>>()?;

        let mut special = vec![true; vocab_size];
        for (id, decoded) in decoded_vocab.iter().enumerate() {
            special[id] = decoded.is_empty();
        }
        special[eos_token_id as usize] = true;

        Ok(Self { decoded_vocab, vocab_size, vocab_type, eos_token_id, special })
    }

    /// Additionally mark `ids` as special (control tokens that decode to text
    /// but must never be produced by the grammar).
    pub fn with_special_tokens(mut self, ids: impl IntoIterator<Item = u32>) -> Result<Self> {
        for id in ids {
            match self.special.get_mut(id as usize) {
                Some(flag) => *flag = true,
                None => bail!(
                    "special token id {} out of range for vocab_size ({})",
                    id,
                    self.vocab_size
                ),
            }
        }
        Ok(self)
    }

    pub fn vocab_type(&self) -> VocabType {
        self.vocab_type
    }

    pub fn decoded_vocab(&self) -> &[Vec<u8>] {
        &self.decoded_vocab
    }

    pub fn special_token_ids(&self) -> Vec<u32> {
        self.special
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s)
            .map(|(id, _)| id as u32)
            .collect()
    }
}

impl Vocabulary for TokenizerInfo {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn token_bytes(&self, token_id: u32) -> Option<&[u8]> {
        if *self.special.get(token_id as usize)? {
            return None;
        }
        self.decoded_vocab.get(token_id as usize).map(|b| b.as_slice())
    }

    fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }
}

/// Decode a single token according to the vocabulary type.
fn decode_token(encoded: &str, vocab_type: VocabType) -> Result<Vec<u8>> {
    match vocab_type {
        VocabType::Raw => Ok(encoded.as_bytes().to_vec()),
        VocabType::ByteFallback => decode_byte_fallback(encoded),
        VocabType::ByteLevel => Ok(decode_byte_level(encoded)),
    }
}

/// Decode a byte-fallback token (SentencePiece style).
/// `<0xAB>` → byte 0xAB, `▁` (U+2581) → space.
fn decode_byte_fallback(encoded: &str) -> Result<Vec<u8>> {
    if encoded.len() == 6 && encoded.starts_with("<0x") && encoded.ends_with('>') {
        let hex = &encoded[3..5];
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|_| anyhow::anyhow!("invalid byte fallback token: {}", encoded))?;
        return Ok(vec![byte]);
    }
    Ok(encoded.replace('\u{2581}', " ").into_bytes())
}

/// Decode a byte-level BPE token (GPT-2 style).
fn decode_byte_level(encoded: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(encoded.len());
    for c in encoded.chars() {
        match byte_level_char_to_byte(c as u32) {
            Some(b) => bytes.push(b),
            None => {
                // Not in the mapping: keep the character's own UTF-8 bytes.
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    bytes
}

/// Inverse of GPT-2's `bytes_to_unicode()` mapping.
///
/// Printable bytes map to themselves. The remaining 68 bytes (0x00..=0x20,
/// 0x7F..=0xA0, 0xAD) were assigned codepoints 256.. in increasing order.
fn byte_level_char_to_byte(cp: u32) -> Option<u8> {
    match cp {
        0x21..=0x7E | 0xA1..=0xAC | 0xAE..=0xFF => Some(cp as u8),
        256..=288 => Some((cp - 256) as u8),
        289..=322 => Some((0x7F + (cp - 289)) as u8),
        323 => Some(0xAD),
        _ => None,
    }
}
