use crate::error::FuzzError;
use crate::mutator::Mutator;
use crate::traits::{Encoded, Encoder};
use crate::types::{Details, Protocol};

/// Generates a random buffer and applies one uniformly chosen mutation to it.
#[derive(Debug, Clone)]
pub struct CustomEncoder {
    max_payload_size: usize,
}

impl CustomEncoder {
    /// The base buffer is between 1 and `max_payload_size` bytes long
    #[must_use]
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Encoder for CustomEncoder {
    fn protocol(&self) -> Protocol {
        Protocol::Custom
    }

    fn encode<R: rand::Rng>(&self, mutator: &mut Mutator<R>) -> Result<Encoded, FuzzError> {
        let base = mutator.gen_payload(self.max_payload_size);
        let (mutation, bytes) = mutator.mutate(&base);

        let mut details = Details::new();
        details.insert("payload_size".into(), bytes.len().into());
        details.insert("base_size".into(), base.len().into());
        details.insert("mutation".into(), mutation.as_str().into());

        Ok(Encoded { bytes, details })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutator::MutationOperation;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    #[test]
    fn test_same_seed_same_payloads() {
        let encoder = CustomEncoder::new(512);
        let mut a = Mutator::new(ChaChaRng::seed_from_u64(1234));
        let mut b = Mutator::new(ChaChaRng::seed_from_u64(1234));
        for _ in 0..50 {
            assert_eq!(
                encoder.encode(&mut a).expect("encode"),
                encoder.encode(&mut b).expect("encode")
            );
        }
    }

    #[test]
    fn test_details_explain_size() {
        let encoder = CustomEncoder::new(64);
        let mut mutator = Mutator::new(ChaChaRng::seed_from_u64(77));
        for _ in 0..200 {
            let encoded = encoder.encode(&mut mutator).expect("encode");
            let base = encoded.details["base_size"].as_u64().expect("base") as usize;
            let size = encoded.bytes.len();
            assert_eq!(encoded.details["payload_size"], size);
            assert!((1..=64).contains(&base));

            let mutation: MutationOperation =
                serde_json::from_value(encoded.details["mutation"].clone()).expect("mutation");
            match mutation {
                MutationOperation::BitFlip | MutationOperation::ByteFlip => assert_eq!(size, base),
                MutationOperation::Truncate => assert!(size <= base),
                MutationOperation::Repeat => assert!(size > base),
                MutationOperation::Append => assert!((base + 1..=base + 100).contains(&size)),
            }
        }
    }
}
