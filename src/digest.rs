///
/// Convert the data hash reported for an event into a SHA-1 digest
///
use openssl::sha;
use tpm_model::{DigestOrigin, Sha1Digest, SHA1_DIGEST_LEN};

/// A reported digest, reconciled with the fixed SHA-1 size
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedDigest {
    /// Digest to use for the measurement
    pub digest: Sha1Digest,
    /// Whether `digest` is the reported value or a substitute
    pub origin: DigestOrigin,
}

impl NormalizedDigest {
    /// True when the reported value was used unchanged
    pub fn is_canonical(&self) -> bool {
        !self.origin.is_degraded()
    }
}

/// Normalize a reported data hash. Never fails:
///
/// * a 20-byte value is the digest,
/// * a value of any other size containing only zeroes becomes the zero digest,
/// * any other value is hashed with SHA-1.
///
/// In the last two cases the reported bytes are kept in the returned origin.
pub fn normalize(raw: &[u8]) -> NormalizedDigest {
    let digest_hex = hex::encode(raw);

    if digest_hex.len() == 2 * SHA1_DIGEST_LEN {
        let mut bytes = [0; SHA1_DIGEST_LEN];
        bytes.copy_from_slice(raw);
        return NormalizedDigest {
            digest: Sha1Digest::from(bytes),
            origin: DigestOrigin::Reported,
        };
    }

    if digest_hex.replace('0', "").is_empty() {
        log::debug!("zero digest of {} bytes", raw.len());
        return NormalizedDigest {
            digest: Sha1Digest::ZERO,
            origin: DigestOrigin::ZeroFilled {
                reported: raw.to_vec(),
            },
        };
    }

    // A PCR can only be extended with 20 bytes, so the TSS hashes anything
    // else before extending.
    log::debug!("hashing digest {digest_hex} of {} bytes", raw.len());
    NormalizedDigest {
        digest: Sha1Digest::from(sha::sha1(raw)),
        origin: DigestOrigin::Rehashed {
            reported: raw.to_vec(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical() {
        let raw: Vec<u8> = (1..=20).collect();
        let n = normalize(&raw);
        assert!(n.is_canonical());
        assert_eq!(n.digest.as_bytes(), &raw[..]);
        assert_eq!(n.origin.reported(), None);

        // All zeroes with the right size is still a reported value
        let n = normalize(&[0; 20]);
        assert!(n.is_canonical());
        assert!(n.digest.is_zero());
    }

    #[test]
    fn test_zero_filled() {
        for len in [0, 1, 19, 21, 32, 40] {
            let raw = vec![0; len];
            let n = normalize(&raw);
            assert_eq!(n.digest, Sha1Digest::ZERO, "length {len}");
            assert_eq!(
                n.origin,
                DigestOrigin::ZeroFilled {
                    reported: raw.clone()
                }
            );
        }
    }

    #[test]
    fn test_rehashed() {
        let n = normalize(b"abc");
        assert_eq!(
            n.digest.to_hex(),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(n.origin.reported(), Some(&b"abc"[..]));
        assert!(matches!(n.origin, DigestOrigin::Rehashed { .. }));

        // One non-zero nibble is enough
        let mut raw = vec![0; 40];
        raw[39] = 0x01;
        let n = normalize(&raw);
        assert!(!n.is_canonical());
        assert!(!n.digest.is_zero());
        assert_eq!(n.digest, Sha1Digest::from(sha::sha1(&raw)));
    }
}
