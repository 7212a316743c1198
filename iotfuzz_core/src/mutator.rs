// Buffer mutations are modeled after the classic AFL havoc stages (bit flip, byte flip,
// block repeat, truncate, append).

use rand::Rng;
use rand::distr::{Alphanumeric, StandardUniform};
use rand::prelude::Distribution;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::Ipv4Addr;

/// Max number of bytes the `Append` mutation adds to a buffer
pub const MAX_APPEND_LEN: usize = 100;

#[derive(Debug)]
/// The mutator is initialized by the fuzzing session with a deterministic RNG and handed to
/// every encoder. All randomness of a session has to be drawn from it, so a campaign started
/// with the same seed produces the same sequence of messages.
pub struct Mutator<R: Rng> {
    rng: R,
}

/// The buffer level mutations that can be applied to a byte buffer
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOperation {
    /// Flips single bits at random offsets
    BitFlip,
    /// Replaces bytes at random offsets with random values
    ByteFlip,
    /// Duplicates a random slice 2 to 4 times
    Repeat,
    /// Cuts the buffer at a random offset
    Truncate,
    /// Adds 1 to 100 random bytes at the end
    Append,
}

impl MutationOperation {
    /// Name used in the result details
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationOperation::BitFlip => "bit_flip",
            MutationOperation::ByteFlip => "byte_flip",
            MutationOperation::Repeat => "repeat",
            MutationOperation::Truncate => "truncate",
            MutationOperation::Append => "append",
        }
    }
}

impl Display for MutationOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Every operation is equally likely
impl Distribution<MutationOperation> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> MutationOperation {
        match rng.random_range(0..5) {
            0 => MutationOperation::BitFlip,
            1 => MutationOperation::ByteFlip,
            2 => MutationOperation::Repeat,
            3 => MutationOperation::Truncate,
            _ => MutationOperation::Append,
        }
    }
}

impl<R: Rng> Mutator<R> {
    /// creates a new Mutator
    pub fn new(rng: R) -> Mutator<R> {
        Mutator { rng }
    }

    /// Picks one operation uniformly and applies it once to `data`.
    pub fn mutate(&mut self, data: &[u8]) -> (MutationOperation, Vec<u8>) {
        let operation: MutationOperation = self.rng.random();
        (operation, self.apply(operation, data))
    }

    /// Applies the given operation to `data` and returns the new buffer.
    pub fn apply(&mut self, operation: MutationOperation, data: &[u8]) -> Vec<u8> {
        match operation {
            MutationOperation::BitFlip => self.bit_flip(data),
            MutationOperation::ByteFlip => self.byte_flip(data),
            MutationOperation::Repeat => self.repeat(data),
            MutationOperation::Truncate => self.truncate(data),
            MutationOperation::Append => self.append(data),
        }
    }

    /// Flips between 1 and `len` random bits. The length is preserved.
    pub fn bit_flip(&mut self, data: &[u8]) -> Vec<u8> {
        let mut result = data.to_vec();
        if result.is_empty() {
            return result;
        }
        let flips = self.rng.random_range(1..=result.len());
        for _ in 0..flips {
            let pos = self.rng.random_range(0..result.len());
            let bit: u8 = self.rng.random_range(0..8);
            result[pos] ^= 1 << bit;
        }
        result
    }

    /// Replaces between 1 and `len` random bytes with random values. The length is preserved.
    pub fn byte_flip(&mut self, data: &[u8]) -> Vec<u8> {
        let mut result = data.to_vec();
        if result.is_empty() {
            return result;
        }
        let flips = self.rng.random_range(1..=result.len());
        for _ in 0..flips {
            let pos = self.rng.random_range(0..result.len());
            result[pos] = self.rng.random();
        }
        result
    }

    /// Repeats a random slice 2 to 4 times in place of its single occurrence.
    pub fn repeat(&mut self, data: &[u8]) -> Vec<u8> {
        if data.is_empty() {
            return vec![];
        }
        let start = self.rng.random_range(0..data.len());
        let len = self.rng.random_range(1..=data.len() - start);
        let repeats = self.rng.random_range(2..=4);
        let section = &data[start..start + len];

        let mut result = Vec::with_capacity(data.len() + (repeats - 1) * len);
        result.extend_from_slice(&data[..start]);
        for _ in 0..repeats {
            result.extend_from_slice(section);
        }
        result.extend_from_slice(&data[start + len..]);
        result
    }

    /// Cuts the buffer at an offset in `[0, len]`.
    pub fn truncate(&mut self, data: &[u8]) -> Vec<u8> {
        if data.is_empty() {
            return vec![];
        }
        let pos = self.rng.random_range(0..=data.len());
        data[..pos].to_vec()
    }

    /// Appends 1 to `MAX_APPEND_LEN` fresh random bytes.
    pub fn append(&mut self, data: &[u8]) -> Vec<u8> {
        let len = self.rng.random_range(1..=MAX_APPEND_LEN);
        let mut result = data.to_vec();
        result.extend(self.gen_bytes(len));
        result
    }

    /// Returns a value between min and max (inclusive)
    pub fn gen_range_inclusive(&mut self, min: usize, max: usize) -> usize {
        self.rng.random_range(min..=max)
    }

    /// Can be used to select a random element from a given slice
    /// # Panics
    /// Panics if `items` is empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        assert!(!items.is_empty(), "cannot choose from an empty slice");
        &items[self.rng.random_range(0..items.len())]
    }

    /// Returns `len` random bytes
    pub fn gen_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.rng.fill(&mut buf[..]);
        buf
    }

    /// Returns a random buffer with a length between 1 and `max_len`
    pub fn gen_payload(&mut self, max_len: usize) -> Vec<u8> {
        let len = self.rng.random_range(1..=max_len.max(1));
        self.gen_bytes(len)
    }

    /// Returns an ASCII alphanumeric string
    pub fn gen_string(&mut self, len: usize) -> String {
        (&mut self.rng)
            .sample_iter(Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    /// Returns a random dotted quad
    pub fn gen_ipv4(&mut self) -> Ipv4Addr {
        Ipv4Addr::from(self.rng.random::<u32>())
    }

    /// Returns a random `u16`
    pub fn gen_u16(&mut self) -> u16 {
        self.rng.random()
    }

    /// Returns a random `u8`
    pub fn gen_u8(&mut self) -> u8 {
        self.rng.random()
    }

    /// Returns a random float in `[0, 1)`
    pub fn gen_unit_f64(&mut self) -> f64 {
        self.rng.random()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    fn mutator(seed: u64) -> Mutator<ChaChaRng> {
        Mutator::new(ChaChaRng::seed_from_u64(seed))
    }

    proptest! {
        #[test]
        fn bit_flip_preserves_length(data in proptest::collection::vec(any::<u8>(), 0..512), seed in any::<u64>()) {
            prop_assert_eq!(mutator(seed).bit_flip(&data).len(), data.len());
        }

        #[test]
        fn byte_flip_preserves_length(data in proptest::collection::vec(any::<u8>(), 0..512), seed in any::<u64>()) {
            prop_assert_eq!(mutator(seed).byte_flip(&data).len(), data.len());
        }

        #[test]
        fn truncate_never_grows(data in proptest::collection::vec(any::<u8>(), 0..512), seed in any::<u64>()) {
            let out = mutator(seed).truncate(&data);
            prop_assert!(out.len() <= data.len());
            prop_assert_eq!(&data[..out.len()], &out[..]);
        }

        #[test]
        fn append_adds_up_to_hundred_bytes(data in proptest::collection::vec(any::<u8>(), 0..512), seed in any::<u64>()) {
            let out = mutator(seed).append(&data);
            let added = out.len() - data.len();
            prop_assert!((1..=MAX_APPEND_LEN).contains(&added));
            prop_assert_eq!(&out[..data.len()], &data[..]);
        }

        #[test]
        fn repeat_never_shrinks(data in proptest::collection::vec(any::<u8>(), 1..512), seed in any::<u64>()) {
            let out = mutator(seed).repeat(&data);
            prop_assert!(out.len() > data.len());
            // the slice is repeated 2..=4 times, so at most 3 extra copies of the whole buffer
            prop_assert!(out.len() <= data.len() * 4);
        }
    }

    #[test]
    fn test_empty_input() {
        let mut m = mutator(1);
        assert!(m.bit_flip(&[]).is_empty());
        assert!(m.byte_flip(&[]).is_empty());
        assert!(m.repeat(&[]).is_empty());
        assert!(m.truncate(&[]).is_empty());
        assert!(!m.append(&[]).is_empty());
    }

    #[test]
    fn test_bit_flip_changes_single_byte_buffer() {
        // a single byte buffer gets exactly one flip
        let mut m = mutator(7);
        let out = m.bit_flip(&[0x00]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].count_ones(), 1);
    }

    #[test]
    fn test_repeat_keeps_prefix_and_suffix() {
        let data: Vec<u8> = (0..32).collect();
        let mut m = mutator(3);
        let out = m.repeat(&data);
        let extra = out.len() - data.len();
        assert!(extra > 0);
        // the buffer starts with the original start and ends with the original end
        assert_eq!(out[0], 0);
        assert_eq!(out[out.len() - 1], 31);
    }

    #[test]
    fn test_same_seed_same_mutations() {
        let data = b"iotfuzz mutation engine".to_vec();
        let mut a = mutator(42);
        let mut b = mutator(42);
        for _ in 0..100 {
            assert_eq!(a.mutate(&data), b.mutate(&data));
        }
    }

    #[test]
    fn test_all_operations_are_selected() {
        let mut m = mutator(0);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(m.mutate(&[1, 2, 3]).0);
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_generators() {
        let mut m = mutator(9);
        let s = m.gen_string(16);
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));

        for _ in 0..100 {
            let payload = m.gen_payload(8);
            assert!((1..=8).contains(&payload.len()));
        }
        assert_eq!(m.gen_payload(0).len(), 1);
        assert_eq!(*m.choose(&[5u8]), 5);
    }
}
