use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::codec::SlotCodec;

// Fixed keys: an index written by one process must probe identically in the next.
const SIP_KEY_0: u64 = 0x636c_6f63_6b64_6221;
const SIP_KEY_1: u64 = 0x6c69_6e65_6172_7072;

/// Maps keys to the starting slot of their probe sequence.
pub trait KeyHasher<K>: Send + Sync {
    fn hash(&self, key: &K) -> u64;
}

/// SipHash-1-3 over the key's encoded bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SipKeyHasher;

impl<K: SlotCodec> KeyHasher<K> for SipKeyHasher {
    fn hash(&self, key: &K) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(SIP_KEY_0, SIP_KEY_1);
        key.write_encoded(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{GenericKey, Rid};

    #[test]
    fn sip_hash_is_deterministic_and_spreads() {
        let hasher = SipKeyHasher;
        assert_eq!(hasher.hash(&42i64), hasher.hash(&42i64));
        assert_ne!(hasher.hash(&42i64), hasher.hash(&43i64));

        let a = GenericKey::<8>::from_integer(42);
        assert_eq!(
            KeyHasher::<GenericKey<8>>::hash(&hasher, &a),
            KeyHasher::<i64>::hash(&hasher, &42i64),
            "same encoded bytes hash the same"
        );
    }

    #[test]
    fn streamed_rid_matches_encoded_bytes() {
        let rid = Rid::new(0x0102_0304_0506_0708, 9);
        let mut buf = [0u8; Rid::SIZE];
        rid.encode(&mut buf);
        let mut whole = SipHasher13::new_with_keys(SIP_KEY_0, SIP_KEY_1);
        whole.write(&buf);

        assert_eq!(SipKeyHasher.hash(&rid), whole.finish());
    }
}
