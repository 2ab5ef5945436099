//! Minimal Solidity ABI codec for the Genesis contract.
//!
//! Covers exactly the types the contract uses: `uint256`, `uint8`, `address`,
//! `bool`, `string` and tuples / arrays of those.

use num_bigint::BigUint;
use sha3::{Digest, Keccak256};

use crate::errors::{ClientError, Result};
use crate::models::{Address, LedgerUint, RawBacker, RawProject, RawStats};

const WORD: usize = 32;
const BACKER_FIELDS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(BigUint),
    Address(Address),
    Bool(bool),
    String(String),
}

impl From<u64> for Token {
    fn from(value: u64) -> Self {
        Token::Uint(BigUint::from(value))
    }
}

/// First four bytes of the Keccak-256 hash of a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// Calldata for `signature` applied to `args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Result<Vec<u8>> {
    let mut data = selector(signature).to_vec();
    data.extend(encode_args(args)?);
    Ok(data)
}

/// Head/tail encoding of an argument list (also the encoding of a tuple).
pub fn encode_args(args: &[Token]) -> Result<Vec<u8>> {
    let head_len = args.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in args {
        match token {
            Token::Uint(value) => head.extend(uint_word(value)?),
            Token::Address(address) => {
                let mut word = [0u8; WORD];
                word[WORD - 20..].copy_from_slice(&address.to_bytes());
                head.extend(word);
            }
            Token::Bool(flag) => head.extend(uint_word(&BigUint::from(u8::from(*flag)))?),
            Token::String(text) => {
                head.extend(uint_word(&BigUint::from(head_len + tail.len()))?);
                tail.extend(uint_word(&BigUint::from(text.len()))?);
                tail.extend(text.as_bytes());
                tail.resize(tail.len().next_multiple_of(WORD), 0);
            }
        }
    }

    head.extend(tail);
    Ok(head)
}

fn uint_word(value: &BigUint) -> Result<[u8; WORD]> {
    let bytes = value.to_bytes_be();
    if bytes.len() > WORD {
        return Err(ClientError::InvalidAmount(format!(
            "{value} does not fit in uint256"
        )));
    }
    let mut word = [0u8; WORD];
    word[WORD - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

// ─────────────────────────────────────────────────────────
// Return data decoding
// ─────────────────────────────────────────────────────────

/// Decode the return of `getProject(uint256)`: one dynamic tuple.
pub fn decode_project(data: &[u8]) -> Result<RawProject> {
    let dec = Decoder { data };
    dec.project(dec.offset(0)?)
}

/// Decode the return of `getProjects()`: an array of dynamic tuples.
pub fn decode_projects(data: &[u8]) -> Result<Vec<RawProject>> {
    let dec = Decoder { data };
    let array = dec.offset(0)?;
    let len = dec.length(array)?;
    let elements = array + WORD;

    (0..len)
        .map(|i| dec.project(elements + dec.offset(elements + i * WORD)?))
        .collect()
}

/// Decode the return of `getBackers(uint256)`: an array of static tuples.
pub fn decode_backers(data: &[u8]) -> Result<Vec<RawBacker>> {
    let dec = Decoder { data };
    let array = dec.offset(0)?;
    let len = dec.length(array)?;

    (0..len)
        .map(|i| {
            let base = array + WORD + i * BACKER_FIELDS * WORD;
            Ok(RawBacker {
                owner: dec.address(base)?,
                contribution: LedgerUint(dec.uint(base + WORD)?),
                timestamp: LedgerUint(dec.uint(base + 2 * WORD)?),
                refunded: dec.boolean(base + 3 * WORD)?,
            })
        })
        .collect()
}

/// Decode the return of `stats()`: a static tuple of three counters.
pub fn decode_stats(data: &[u8]) -> Result<RawStats> {
    let dec = Decoder { data };
    Ok(RawStats {
        total_projects: LedgerUint(dec.uint(0)?),
        total_backing: LedgerUint(dec.uint(WORD)?),
        total_donations: LedgerUint(dec.uint(2 * WORD)?),
    })
}

struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    fn word(&self, pos: usize) -> Result<&'a [u8]> {
        pos.checked_add(WORD)
            .and_then(|end| self.data.get(pos..end))
            .ok_or_else(|| self.short(pos.saturating_add(WORD)))
    }

    fn uint(&self, pos: usize) -> Result<BigUint> {
        Ok(BigUint::from_bytes_be(self.word(pos)?))
    }

    /// A byte offset or length; must point inside the data.
    fn offset(&self, pos: usize) -> Result<usize> {
        let value = self.uint(pos)?;
        usize::try_from(&value)
            .ok()
            .filter(|offset| *offset <= self.data.len())
            .ok_or_else(|| ClientError::Decode(format!("offset {value} out of bounds at {pos}")))
    }

    /// An array length. Bounded by what the remaining data could hold.
    fn length(&self, pos: usize) -> Result<usize> {
        let len = self.offset(pos)?;
        if len > self.data.len() / WORD {
            return Err(ClientError::Decode(format!("array length {len} out of bounds")));
        }
        Ok(len)
    }

    fn address(&self, pos: usize) -> Result<String> {
        let word = self.word(pos)?;
        Ok(format!("0x{}", hex::encode(&word[WORD - 20..])))
    }

    fn boolean(&self, pos: usize) -> Result<bool> {
        Ok(self.uint(pos)?.bits() != 0)
    }

    fn small(&self, pos: usize) -> Result<u8> {
        let value = self.uint(pos)?;
        u8::try_from(&value).map_err(|_| ClientError::Decode(format!("{value} is not a uint8")))
    }

    /// A string whose offset at `pos` is relative to `base`.
    fn string(&self, base: usize, pos: usize) -> Result<String> {
        let start = base
            .checked_add(self.offset(pos)?)
            .ok_or_else(|| self.short(usize::MAX))?;
        let len = self.offset(start)?;
        let from = start + WORD;
        let bytes = from
            .checked_add(len)
            .and_then(|end| self.data.get(from..end))
            .ok_or_else(|| self.short(from.saturating_add(len)))?;

        String::from_utf8(bytes.to_vec())
            .map_err(|e| ClientError::Decode(format!("string at {start} is not UTF-8: {e}")))
    }

    fn project(&self, base: usize) -> Result<RawProject> {
        let field = |i: usize| base + i * WORD;

        Ok(RawProject {
            id: LedgerUint(self.uint(field(0))?),
            owner: self.address(field(1))?,
            title: self.string(base, field(2))?,
            description: self.string(base, field(3))?,
            image_url: self.string(base, field(4))?,
            cost: LedgerUint(self.uint(field(5))?),
            raised: LedgerUint(self.uint(field(6))?),
            timestamp: LedgerUint(self.uint(field(7))?),
            expires_at: LedgerUint(self.uint(field(8))?),
            backers: LedgerUint(self.uint(field(9))?),
            status: self.small(field(10))?,
        })
    }

    fn short(&self, needed: usize) -> ClientError {
        ClientError::Decode(format!(
            "return data too short: need {needed} bytes, have {}",
            self.data.len()
        ))
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
