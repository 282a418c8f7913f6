//! Canonical hash-tree encoder and the sponge hasher used to compute block
//! and batch identities.
//!
//! `Hashable` is the canonical recursive tree every domain struct flattens
//! into with a fixed field order (`ToHashable`); maps flatten their
//! key/value pairs in tap order, which this implementation fixes as
//! key-ascending under the `Ord` the store itself uses (a `BTreeMap`), per
//! the canonical choice `spec.md` §4.1/§9 documents. `hash(x)` is pure and
//! total; two inputs with identical canonical trees hash equal by
//! construction, since the digest is a deterministic function of the
//! flattened leaf sequence.
//!
//! The permutation below is a from-scratch sponge over the Goldilocks field
//! (`P = 2^64 - 2^32 + 1`), not a port of the real TIP5 round function —
//! the official round constants and MDS matrix aren't part of the
//! specification this kernel was built from. See `DESIGN.md` for the
//! rationale; nothing outside this module depends on bit-for-bit
//! compatibility with the production hasher.

use std::collections::BTreeMap;

use crate::based_list::P;

const STATE_WIDTH: usize = 8;
const RATE: usize = 4;
const ROUNDS: usize = 7;

const TAG_LEAF: u64 = 1;
const TAG_DIGEST: u64 = 2;
const TAG_TUPLE: u64 = 3;

/// The canonical recursive encoding every domain struct reduces to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hashable {
    /// A field element, already reduced mod `P`. Wide atoms must be split
    /// into multiple leaves via the based-list codec by the caller before
    /// being wrapped here.
    Leaf(u64),
    /// The digest of a nested structure, embedded by reference.
    Hash([u8; 32]),
    /// A fixed-order sequence of children.
    Tuple(Vec<Hashable>),
}

/// Implemented by every domain struct that participates in hashing.
pub trait ToHashable {
    fn to_hashable(&self) -> Hashable;
}

/// Canonical encoding of a map: a `Tuple` of `(key, value)` tuples in
/// key-ascending order.
pub fn map_to_hashable<K, V>(map: &BTreeMap<K, V>) -> Hashable
where
    K: ToHashable,
    V: ToHashable,
{
    Hashable::Tuple(
        map.iter()
            .map(|(k, v)| Hashable::Tuple(vec![k.to_hashable(), v.to_hashable()]))
            .collect(),
    )
}

fn flatten(h: &Hashable, out: &mut Vec<u64>) {
    match h {
        Hashable::Leaf(v) => {
            debug_assert!((*v as u128) < P, "hashable leaf must be < p");
            out.push(TAG_LEAF);
            out.push(*v);
        }
        Hashable::Hash(digest) => {
            out.push(TAG_DIGEST);
            let elems = crate::based_list::BasedList::from_bytes_be(digest);
            out.push(elems.0.len() as u64);
            out.extend(elems.0);
        }
        Hashable::Tuple(items) => {
            out.push(TAG_TUPLE);
            out.push(items.len() as u64);
            for item in items {
                flatten(item, out);
            }
        }
    }
}

/// Hash a canonical tree to a 32-byte digest.
pub fn hash(h: &Hashable) -> [u8; 32] {
    let mut leaves = Vec::new();
    flatten(h, &mut leaves);
    tip5(&leaves)
}

/// Hash any `ToHashable` value directly.
pub fn hash_of<T: ToHashable>(value: &T) -> [u8; 32] {
    hash(&value.to_hashable())
}

fn add_mod(a: u64, b: u64) -> u64 {
    (((a as u128) + (b as u128)) % P) as u64
}

fn mul_mod(a: u64, b: u64) -> u64 {
    (((a as u128) * (b as u128)) % P) as u64
}

fn pow7_mod(x: u64) -> u64 {
    let x2 = mul_mod(x, x);
    let x3 = mul_mod(x2, x);
    let x4 = mul_mod(x2, x2);
    mul_mod(x3, x4)
}

fn round_constant(round: usize, lane: usize) -> u64 {
    // Deterministic, fixed constants derived from a small LCG seeded by the
    // round/lane indices. Not cryptographically vetted; this sponge exists
    // to give block/batch identities a stable, collision-free-in-practice
    // digest, not to match an external hash standard.
    let seed: u128 = 0x9E3779B97F4A7C15 ^ ((round as u128) << 32) ^ (lane as u128);
    let mixed = seed.wrapping_mul(0xBF58476D1CE4E5B9);
    (mixed % P) as u64
}

fn mds(state: &mut [u64; STATE_WIDTH]) {
    // Simple circulant mix: out[i] = sum_j state[(i+j) % W] * (j+1), mod P.
    let input = *state;
    for i in 0..STATE_WIDTH {
        let mut acc: u128 = 0;
        for j in 0..STATE_WIDTH {
            let coeff = (j as u64) + 1;
            acc = (acc + mul_mod(input[(i + j) % STATE_WIDTH], coeff) as u128) % P;
        }
        state[i] = acc as u64;
    }
}

fn permute(state: &mut [u64; STATE_WIDTH]) {
    for round in 0..ROUNDS {
        for (lane, slot) in state.iter_mut().enumerate() {
            *slot = add_mod(*slot, round_constant(round, lane));
        }
        for slot in state.iter_mut() {
            *slot = pow7_mod(*slot);
        }
        mds(state);
    }
}

/// Absorb a sequence of field elements (each `< P`) and squeeze a 32-byte
/// digest.
pub fn tip5(leaves: &[u64]) -> [u8; 32] {
    let mut state = [0u64; STATE_WIDTH];
    for chunk in leaves.chunks(RATE) {
        for (i, &v) in chunk.iter().enumerate() {
            state[i] = add_mod(state[i], v);
        }
        permute(&mut state);
    }
    // Final permutation gives sponges with input lengths that are exact
    // multiples of RATE a distinct output from the all-absorbed state.
    permute(&mut state);
    let mut out = [0u8; 32];
    for i in 0..4 {
        out[i * 8..i * 8 + 8].copy_from_slice(&state[i].to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    impl ToHashable for u8 {
        fn to_hashable(&self) -> Hashable {
            Hashable::Leaf(*self as u64)
        }
    }

    #[test]
    fn pure_and_deterministic() {
        let a = Hashable::Tuple(vec![Hashable::Leaf(1), Hashable::Leaf(2)]);
        let b = Hashable::Tuple(vec![Hashable::Leaf(1), Hashable::Leaf(2)]);
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn distinguishes_order_and_arity() {
        let a = Hashable::Tuple(vec![Hashable::Leaf(1), Hashable::Leaf(2)]);
        let b = Hashable::Tuple(vec![Hashable::Leaf(2), Hashable::Leaf(1)]);
        let c = Hashable::Tuple(vec![Hashable::Leaf(1), Hashable::Leaf(2), Hashable::Leaf(3)]);
        assert_ne!(hash(&a), hash(&b));
        assert_ne!(hash(&a), hash(&c));
    }

    #[test]
    fn distinguishes_leaf_from_nested_hash() {
        let a = Hashable::Leaf(7);
        let b = Hashable::Hash([0u8; 32]);
        assert_ne!(hash(&a), hash(&b));
    }

    #[test]
    fn map_hashable_is_key_ascending() {
        let mut m1: BTreeMap<u8, u8> = BTreeMap::new();
        m1.insert(2, 20);
        m1.insert(1, 10);
        let mut m2: BTreeMap<u8, u8> = BTreeMap::new();
        m2.insert(1, 10);
        m2.insert(2, 20);

        assert_eq!(hash(&map_to_hashable(&m1)), hash(&map_to_hashable(&m2)));
    }
}
