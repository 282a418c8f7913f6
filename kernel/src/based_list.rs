//! Based-list codec: a lossless radix-`p` little-endian encoding of an
//! arbitrary-width unsigned integer as a sequence of field elements, where
//! `p = 2^64 - 2^32 + 1` (the Goldilocks prime). Every element of a valid
//! `BasedList` is `< P`, which is what makes it safe to feed into the
//! hashable encoder and to use as a map key.

use serde::{Deserialize, Serialize};

use crate::types::EvmAddr;

/// `p = 2^64 - 2^32 + 1`.
pub const P: u128 = (1u128 << 64) - (1u128 << 32) + 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BasedListError {
    #[error("based-list element is not < p")]
    ElementOutOfRange,
    #[error("value does not fit in 3 based-list chunks")]
    EvmAddressTooWide,
    #[error("based-list does not have exactly 3 chunks")]
    NotThreeChunks,
    #[error("based-list value does not fit in 20 bytes")]
    DecodedTooWide,
}

/// A lossless little-endian radix-`p` encoding of an unbounded unsigned
/// integer. `BasedList::from_atom(0) == BasedList(vec![0])`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BasedList(pub Vec<u64>);

impl BasedList {
    /// `valid(l) <=> every l[i] < p`.
    pub fn valid(&self) -> bool {
        self.0.iter().all(|&e| (e as u128) < P)
    }

    /// Encode a `u128` atom.
    pub fn from_atom(n: u128) -> Self {
        Self::from_bytes_be(&n.to_be_bytes())
    }

    /// Decode back to a `u128` atom, if it fits.
    pub fn to_atom(&self) -> Option<u128> {
        let bytes = self.to_bytes_be();
        if bytes.len() > 16 {
            return None;
        }
        let mut buf = [0u8; 16];
        buf[16 - bytes.len()..].copy_from_slice(&bytes);
        Some(u128::from_be_bytes(buf))
    }

    /// Encode an arbitrary-width big-endian byte string.
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        let mut cur = trim_leading_zeros(bytes.to_vec());
        let mut elems = Vec::new();
        loop {
            let (q, r) = divmod_bytes_be(&cur, P);
            elems.push(r as u64);
            if q.is_empty() {
                break;
            }
            cur = q;
        }
        BasedList(elems)
    }

    /// Decode back to a big-endian byte string (minimal length, no leading
    /// zero byte unless the value is zero, in which case the result is
    /// empty).
    pub fn to_bytes_be(&self) -> Vec<u8> {
        let mut acc: Vec<u8> = Vec::new();
        for &elem in self.0.iter().rev() {
            acc = mul_small_add(&acc, P, elem as u128);
        }
        trim_leading_zeros(acc)
    }

    /// Encode a 20-byte EVM address as exactly three chunks. Fails if a
    /// fourth, nonzero chunk would be required (never happens for genuine
    /// 160-bit addresses, but the input is untrusted driver data).
    pub fn evm_to_based(addr: &EvmAddr) -> Result<Self, BasedListError> {
        let n = addr.0.to_vec();
        let (q0, r0) = divmod_bytes_be(&n, P);
        let (q1, r1) = divmod_bytes_be(&q0, P);
        let (q2, r2) = divmod_bytes_be(&q1, P);
        if !q2.is_empty() {
            return Err(BasedListError::EvmAddressTooWide);
        }
        Ok(BasedList(vec![r0 as u64, r1 as u64, r2 as u64]))
    }

    /// Decode exactly three chunks back into a 20-byte EVM address.
    pub fn based_to_evm(&self) -> Result<EvmAddr, BasedListError> {
        if self.0.len() != 3 {
            return Err(BasedListError::NotThreeChunks);
        }
        if !self.valid() {
            return Err(BasedListError::ElementOutOfRange);
        }
        let bytes = self.to_bytes_be();
        if bytes.len() > 20 {
            return Err(BasedListError::DecodedTooWide);
        }
        let mut out = [0u8; 20];
        out[20 - bytes.len()..].copy_from_slice(&bytes);
        Ok(EvmAddr(out))
    }
}

fn trim_leading_zeros(mut bytes: Vec<u8>) -> Vec<u8> {
    let first_nonzero = bytes.iter().position(|&b| b != 0);
    match first_nonzero {
        Some(0) => bytes,
        Some(idx) => bytes.split_off(idx),
        None => Vec::new(),
    }
}

/// `bytes_be / divisor`, returning `(quotient_be, remainder)`. `divisor` is
/// assumed `> 255` (true for `P`), which keeps each base-256 quotient digit
/// within a `u8`.
fn divmod_bytes_be(bytes_be: &[u8], divisor: u128) -> (Vec<u8>, u128) {
    let mut quotient = Vec::with_capacity(bytes_be.len());
    let mut rem: u128 = 0;
    for &b in bytes_be {
        let cur = rem * 256 + b as u128;
        let q = cur / divisor;
        rem = cur % divisor;
        quotient.push(q as u8);
    }
    (trim_leading_zeros(quotient), rem)
}

/// `bytes_be * mult + add`, used to fold based-list chunks back into a big
/// integer via Horner's method.
fn mul_small_add(bytes_be: &[u8], mult: u128, add: u128) -> Vec<u8> {
    let mut carry = add;
    let mut out = Vec::with_capacity(bytes_be.len() + 9);
    for &b in bytes_be.iter().rev() {
        let v = (b as u128) * mult + carry;
        out.push((v & 0xff) as u8);
        carry = v >> 8;
    }
    while carry > 0 {
        out.push((carry & 0xff) as u8);
        carry >>= 8;
    }
    out.reverse();
    trim_leading_zeros(out)
}
