///
/// Attestation report of a host, as returned by the hypervisor management
/// endpoint and decoded from JSON.
///
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::manifest::ManifestError;

/// Shape of a software component event (module loaded by the boot loader)
pub const SOFTWARE_COMPONENT_SHAPE: &str = "HostTpmSoftwareComponentEventDetails";
/// Shape of a command event (boot command line)
pub const COMMAND_SHAPE: &str = "HostTpmCommandEventDetails";
/// Shape of an option event (boot options file)
pub const OPTION_SHAPE: &str = "HostTpmOptionEventDetails";
/// Shape of a boot security option event
pub const BOOT_SECURITY_OPTION_SHAPE: &str = "HostTpmBootSecurityOptionEventDetails";

const DEFAULT_DIGEST_METHOD: &str = "SHA1";

/// A full report: current PCR values and the event log, in the order given by
/// the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationReport {
    /// Current PCR values
    #[serde(default)]
    pub tpm_pcr_values: Vec<DigestInfo>,
    /// Events extended into the PCRs
    #[serde(default)]
    pub tpm_events: Vec<EventLogEntry>,
}

impl AttestationReport {
    /// Decode a JSON report. Fails only when the document doesn't have the
    /// structure of a report; events with unexpected content are kept as
    /// [EventShape::Unrecognized].
    pub fn from_json(data: &[u8]) -> Result<Self, ManifestError> {
        serde_json::from_slice(data).map_err(ManifestError::Parse)
    }
}

/// Current value of one PCR
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestInfo {
    /// PCR index
    pub pcr_number: u32,
    /// Name of the hash algorithm, normally "SHA1"
    #[serde(default = "default_digest_method")]
    pub digest_method: String,
    /// PCR value
    #[serde(deserialize_with = "deserialize_bytes")]
    pub digest_value: Vec<u8>,
}

fn default_digest_method() -> String {
    DEFAULT_DIGEST_METHOD.to_string()
}

/// One event of the log
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    /// PCR extended with this event
    pub pcr_index: u32,
    /// What was measured
    pub event_details: EventDetails,
}

/// Measured data of an event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawEventDetails")]
pub struct EventDetails {
    /// Hash reported for the event. Its size isn't validated.
    pub data_hash: Vec<u8>,
    /// Event-specific fields
    pub shape: EventShape,
}

/// The event detail shapes known to the classifier, plus a catch-all for
/// shapes added by newer hypervisors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum EventShape {
    SoftwareComponent(SoftwareComponentEvent),
    Command(CommandEvent),
    Option(OptionEvent),
    BootSecurityOption(BootSecurityOptionEvent),
    Unrecognized(UnrecognizedEvent),
}

impl EventShape {
    /// Name of the shape in the report
    pub fn name(&self) -> &str {
        match self {
            EventShape::SoftwareComponent(_) => SOFTWARE_COMPONENT_SHAPE,
            EventShape::Command(_) => COMMAND_SHAPE,
            EventShape::Option(_) => OPTION_SHAPE,
            EventShape::BootSecurityOption(_) => BOOT_SECURITY_OPTION_SHAPE,
            EventShape::Unrecognized(e) => &e.shape,
        }
    }
}

/// A software module loaded at boot. The package fields are empty for
/// the state archives (imgdb.tgz, state.tgz, onetime.tgz).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareComponentEvent {
    /// File name of the component
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub component_name: String,
    /// Package name
    #[serde(default)]
    pub vib_name: Option<String>,
    /// Package vendor
    #[serde(default)]
    pub vib_vendor: Option<String>,
    /// Package version
    #[serde(default)]
    pub vib_version: Option<String>,
}

/// The boot command line
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEvent {
    /// Full command line
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub command_line: String,
}

/// A boot options file. Only the name is kept, policies match the digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionEvent {
    /// Options file name
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub options_file_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct BootSecurityOptionEvent {
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub boot_security_option: String,
}

/// Event of a shape we don't know, or whose fields have the wrong type. Only
/// the generic properties are available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnrecognizedEvent {
    /// Name of the shape in the report
    pub shape: String,
    /// Type discriminator given by the host
    pub dynamic_type: Option<String>,
    /// Generic (name, value) properties
    pub properties: Vec<(String, String)>,
    /// Why a known shape could not be decoded
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DynamicProperty {
    name: String,
    #[serde(default)]
    val: Value,
}

// Fields common to all shapes. The remaining ones are decoded once the shape
// is known.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEventDetails {
    #[serde(rename = "type")]
    shape: String,
    #[serde(deserialize_with = "deserialize_bytes")]
    data_hash: Vec<u8>,
    #[serde(default)]
    dynamic_type: Option<String>,
    #[serde(default)]
    dynamic_property: Vec<DynamicProperty>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl RawEventDetails {
    fn decode_shape(&self) -> serde_json::Result<Option<EventShape>> {
        let fields = Value::Object(self.fields.clone());
        let shape = match self.shape.as_str() {
            SOFTWARE_COMPONENT_SHAPE => EventShape::SoftwareComponent(serde_json::from_value(fields)?),
            COMMAND_SHAPE => EventShape::Command(serde_json::from_value(fields)?),
            OPTION_SHAPE => EventShape::Option(serde_json::from_value(fields)?),
            BOOT_SECURITY_OPTION_SHAPE => {
                EventShape::BootSecurityOption(serde_json::from_value(fields)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(shape))
    }
}

impl From<RawEventDetails> for EventDetails {
    fn from(raw: RawEventDetails) -> Self {
        let reason = match raw.decode_shape() {
            Ok(Some(shape)) => {
                return EventDetails {
                    data_hash: raw.data_hash,
                    shape,
                }
            }
            Ok(None) => None,
            Err(e) => Some(e.to_string()),
        };

        let properties = raw
            .dynamic_property
            .into_iter()
            .map(|p| {
                let val = match p.val {
                    Value::String(s) => s,
                    v => v.to_string(),
                };
                (p.name, val)
            })
            .collect();

        EventDetails {
            data_hash: raw.data_hash,
            shape: EventShape::Unrecognized(UnrecognizedEvent {
                shape: raw.shape,
                dynamic_type: raw.dynamic_type,
                properties,
                reason,
            }),
        }
    }
}

// Missing and null strings are both empty
fn deserialize_nullable<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ByteField {
    Hex(String),
    Array(Vec<i16>),
}

// Bytes are either hex-encoded, or an array of byte values. Java-based
// endpoints send signed bytes.
fn deserialize_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    match ByteField::deserialize(deserializer)? {
        ByteField::Hex(s) => {
            hex::decode(&s).map_err(|e| de::Error::custom(format!("invalid hex '{s}': {e}")))
        }
        ByteField::Array(v) => v
            .into_iter()
            .map(|b| {
                if b < -128 || b > 255 {
                    return Err(de::Error::custom(format!("invalid byte value {b}")));
                }
                Ok(b as u8)
            })
            .collect(),
    }
}
