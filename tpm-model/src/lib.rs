//! Structures describing the measured state of a TPM-equipped host
//!
//! This library provides the values a verifier works on once an attestation
//! report has been decoded: the current value of each Platform Configuration
//! Register (PCR), and the ordered log of measurements that were extended into
//! it. For the moment only SHA-1 banks are represented.
#![warn(missing_docs)]
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Size of a SHA-1 digest, in bytes
pub const SHA1_DIGEST_LEN: usize = 20;
/// Number of PCRs in a bank
pub const PCR_COUNT: u32 = 24;

/// Error from the model library
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// PCR index outside of the bank
    #[error("invalid PCR index {0}")]
    InvalidPcrIndex(u32),

    /// Digest doesn't have the expected size
    #[error("invalid digest length {0}, expected 20")]
    InvalidDigestLength(usize),

    /// Digest isn't valid hex
    #[error("invalid hex digest")]
    Hex(#[from] hex::FromHexError),
}
type Result<T> = core::result::Result<T, ModelError>;

/// Index of a PCR, between 0 and [PCR_COUNT] - 1
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PcrIndex(u8);

impl PcrIndex {
    /// The register number
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u32> for PcrIndex {
    type Error = ModelError;
    fn try_from(index: u32) -> Result<Self> {
        if index >= PCR_COUNT {
            return Err(ModelError::InvalidPcrIndex(index));
        }
        Ok(PcrIndex(index as u8))
    }
}

impl fmt::Display for PcrIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A SHA-1 digest
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Sha1Digest([u8; SHA1_DIGEST_LEN]);

impl Sha1Digest {
    /// The all-zero digest
    pub const ZERO: Sha1Digest = Sha1Digest([0; SHA1_DIGEST_LEN]);

    /// Copy a digest from a slice, which must be exactly
    /// [SHA1_DIGEST_LEN] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SHA1_DIGEST_LEN] = bytes
            .try_into()
            .map_err(|_| ModelError::InvalidDigestLength(bytes.len()))?;
        Ok(Sha1Digest(bytes))
    }

    /// The raw digest
    pub fn as_bytes(&self) -> &[u8; SHA1_DIGEST_LEN] {
        &self.0
    }

    /// Lower-case hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// True for the all-zero digest
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<[u8; SHA1_DIGEST_LEN]> for Sha1Digest {
    fn from(bytes: [u8; SHA1_DIGEST_LEN]) -> Self {
        Sha1Digest(bytes)
    }
}

impl FromStr for Sha1Digest {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Sha1Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Where the digest of a [Measurement] comes from. When the reported value
/// could not be used as-is, the reported bytes are kept so that a verifier can
/// tell a genuine match from a recovered one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DigestOrigin {
    /// The reported value had the right size and is used unchanged
    #[default]
    Reported,
    /// The reported value was all zeroes with the wrong size, and was replaced
    /// with the zero digest
    ZeroFilled {
        /// The reported bytes
        #[serde(serialize_with = "hex::serde::serialize")]
        reported: Vec<u8>,
    },
    /// The reported value had the wrong size, and was replaced with its SHA-1
    Rehashed {
        /// The reported bytes
        #[serde(serialize_with = "hex::serde::serialize")]
        reported: Vec<u8>,
    },
}

impl DigestOrigin {
    /// True when the digest was substituted
    pub fn is_degraded(&self) -> bool {
        !matches!(self, DigestOrigin::Reported)
    }

    /// The reported bytes, when they differ from the digest
    pub fn reported(&self) -> Option<&[u8]> {
        match self {
            DigestOrigin::Reported => None,
            DigestOrigin::ZeroFilled { reported } | DigestOrigin::Rehashed { reported } => {
                Some(reported)
            }
        }
    }
}

/// Current value of a PCR, as reported by the host
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pcr {
    index: PcrIndex,
    value: String,
}

impl Pcr {
    /// Create a PCR value from its hex encoding
    pub fn new(index: PcrIndex, value: String) -> Self {
        Pcr { index, value }
    }

    /// Register index
    pub fn index(&self) -> PcrIndex {
        self.index
    }

    /// Hex-encoded value
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// One event extended into a PCR. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Measurement {
    digest: Sha1Digest,
    label: String,
    info: BTreeMap<String, String>,
    origin: DigestOrigin,
}

impl Measurement {
    /// Create a measurement whose digest was reported as-is
    pub fn new(digest: Sha1Digest, label: String, info: BTreeMap<String, String>) -> Self {
        Measurement {
            digest,
            label,
            info,
            origin: DigestOrigin::Reported,
        }
    }

    /// Record where the digest comes from
    pub fn with_origin(mut self, origin: DigestOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// The measured digest
    pub fn digest(&self) -> &Sha1Digest {
        &self.digest
    }

    /// Human-readable description
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Event attributes
    pub fn info(&self) -> &BTreeMap<String, String> {
        &self.info
    }

    /// Event attribute `key`
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.info.get(key).map(String::as_str)
    }

    /// Where the digest comes from
    pub fn origin(&self) -> &DigestOrigin {
        &self.origin
    }
}

/// Ordered measurements of a single PCR
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PcrEventLog {
    index: PcrIndex,
    events: Vec<Measurement>,
}

impl PcrEventLog {
    /// Create an event log, `events` being in the order they were extended
    pub fn new(index: PcrIndex, events: Vec<Measurement>) -> Self {
        PcrEventLog { index, events }
    }

    /// Register index
    pub fn index(&self) -> PcrIndex {
        self.index
    }

    /// Measurements in extension order
    pub fn events(&self) -> &[Measurement] {
        &self.events
    }
}

/// Current PCR values and event logs of one attestation report. The two maps
/// are independent: a PCR may have a value and no log, or a log and no value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PcrManifest {
    pcrs: BTreeMap<PcrIndex, Pcr>,
    event_logs: BTreeMap<PcrIndex, PcrEventLog>,
}

impl PcrManifest {
    /// Create a manifest from its values and logs
    pub fn new(
        pcrs: BTreeMap<PcrIndex, Pcr>,
        event_logs: BTreeMap<PcrIndex, PcrEventLog>,
    ) -> Self {
        PcrManifest { pcrs, event_logs }
    }

    /// Current value of PCR `index`
    pub fn pcr(&self, index: PcrIndex) -> Option<&Pcr> {
        self.pcrs.get(&index)
    }

    /// All current values, sorted by index
    pub fn pcrs(&self) -> impl Iterator<Item = &Pcr> {
        self.pcrs.values()
    }

    /// Event log of PCR `index`
    pub fn event_log(&self, index: PcrIndex) -> Option<&PcrEventLog> {
        self.event_logs.get(&index)
    }

    /// All event logs, sorted by index
    pub fn event_logs(&self) -> impl Iterator<Item = &PcrEventLog> {
        self.event_logs.values()
    }

    /// True when the manifest has neither values nor logs
    pub fn is_empty(&self) -> bool {
        self.pcrs.is_empty() && self.event_logs.is_empty()
    }
}
