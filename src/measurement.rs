use tpm_model::Measurement;

use crate::classifier::ClassifiedEvent;
use crate::digest;

/// Build the measurement of a classified event. The reported data hash is
/// normalized first, see [digest::normalize]; the returned measurement keeps
/// the reported bytes when they had to be replaced.
pub fn build(data_hash: &[u8], classified: ClassifiedEvent) -> Measurement {
    let normalized = digest::normalize(data_hash);
    log::debug!(
        "measurement '{}' digest {}",
        classified.label,
        normalized.digest
    );
    Measurement::new(normalized.digest, classified.label, classified.attributes)
        .with_origin(normalized.origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::EventClassifier;
    use crate::report::{EventShape, OptionEvent};
    use tpm_model::{DigestOrigin, Sha1Digest};

    fn boot_cfg() -> ClassifiedEvent {
        EventClassifier::default().classify(&EventShape::Option(OptionEvent {
            options_file_name: "boot.cfg".to_string(),
        }))
    }

    #[test]
    fn test_build() {
        let hash = [0x5a; 20];
        let m = build(&hash, boot_cfg());
        assert_eq!(m.digest().as_bytes(), &hash);
        assert_eq!(m.label(), "boot.cfg");
        assert_eq!(m.attribute("EventType"), Some("HostTpmOptionEvent"));
        assert_eq!(m.origin(), &DigestOrigin::Reported);
    }

    #[test]
    fn test_build_degraded() {
        let m = build(&[0; 40], boot_cfg());
        assert_eq!(m.digest(), &Sha1Digest::ZERO);
        assert_eq!(
            m.origin(),
            &DigestOrigin::ZeroFilled {
                reported: vec![0; 40]
            }
        );

        let m = build(&[0x5a; 32], boot_cfg());
        assert!(matches!(m.origin(), DigestOrigin::Rehashed { .. }));
        assert_eq!(m.origin().reported(), Some(&[0x5a; 32][..]));
        assert_eq!(m.label(), "boot.cfg");
    }
}
