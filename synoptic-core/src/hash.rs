//! Deterministic hashing. The engine must produce the same counter-example
//! enumeration order given the same seed; ordinary `RandomState` hashing
//! would leak process-start randomness into iteration order of every
//! `HashMap`/`IndexMap` the engine touches, defeating that.

use std::hash::BuildHasher;

pub use foldhash::fast::{FixedState, FoldHasher as DefaultHasher};

const FIXED_HASHER: FixedState =
    FixedState::with_seed(0b1001010111101110000001001100010000000011001001101011001001111000);

/// A [`BuildHasher`] with a fixed, non-random seed.
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHasher;

impl BuildHasher for FixedHasher {
    type Hasher = DefaultHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASHER.build_hasher()
    }
}

pub type HashMap<K, V> = std::collections::HashMap<K, V, FixedHasher>;
pub type HashSet<T> = std::collections::HashSet<T, FixedHasher>;
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, FixedHasher>;
pub type IndexSet<T> = indexmap::IndexSet<T, FixedHasher>;
