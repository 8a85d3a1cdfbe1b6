///
/// Derive labels and attributes of log events
///
use std::collections::BTreeMap;

use crate::boot_cmdline::CommandLineSanitizer;
use crate::report::{
    EventShape, SoftwareComponentEvent, UnrecognizedEvent, BOOT_SECURITY_OPTION_SHAPE,
    COMMAND_SHAPE, OPTION_SHAPE, SOFTWARE_COMPONENT_SHAPE,
};

/// Attribute holding the event type
pub const EVENT_TYPE: &str = "EventType";
/// Attribute holding the shape identifier
pub const EVENT_NAME: &str = "EventName";
/// Attribute holding the prefixed component name
pub const COMPONENT_NAME: &str = "ComponentName";
/// Attribute holding the package name of a software component
pub const PACKAGE_NAME: &str = "PackageName";
/// Attribute holding the package vendor of a software component
pub const PACKAGE_VENDOR: &str = "PackageVendor";
/// Attribute holding the package version of a software component
pub const PACKAGE_VERSION: &str = "PackageVersion";
/// Attribute holding the boot identifier found on the command line
pub const UUID: &str = "UUID";

const EVENT_NAME_PREFIX: &str = "Vim25Api.";

/// Canonical description of an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    /// Event type, None for unrecognized shapes
    pub event_type: Option<&'static str>,
    /// Stable identifier of the shape
    pub event_name: String,
    /// Prefixed component name, None for unrecognized shapes
    pub component_name: Option<String>,
    /// Human-readable label
    pub label: String,
    /// All attributes, including the three above
    pub attributes: BTreeMap<String, String>,
}

impl ClassifiedEvent {
    fn known(
        event_type: &'static str,
        shape: &str,
        component_name: String,
        label: String,
    ) -> Self {
        let event_name = format!("{EVENT_NAME_PREFIX}{shape}");
        let attributes = BTreeMap::from([
            (EVENT_TYPE.to_string(), event_type.to_string()),
            (EVENT_NAME.to_string(), event_name.clone()),
            (COMPONENT_NAME.to_string(), component_name.clone()),
        ]);
        ClassifiedEvent {
            event_type: Some(event_type),
            event_name,
            component_name: Some(component_name),
            label,
            attributes,
        }
    }

    fn attribute(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(v) = value {
            self.attributes.insert(key.to_string(), v.to_string());
        }
        self
    }
}

/// Classify events according to their shape. Classification is total:
/// unknown shapes get a generic description.
#[derive(Debug, Clone, Default)]
pub struct EventClassifier {
    sanitizer: CommandLineSanitizer,
}

impl EventClassifier {
    /// Create a classifier using `sanitizer` for command events
    pub fn new(sanitizer: CommandLineSanitizer) -> Self {
        EventClassifier { sanitizer }
    }

    /// Describe an event
    pub fn classify(&self, shape: &EventShape) -> ClassifiedEvent {
        match shape {
            EventShape::SoftwareComponent(e) => Self::software_component(e),
            EventShape::Command(e) => {
                let command_line = self.sanitizer.sanitize(&e.command_line);
                ClassifiedEvent::known(
                    "HostTpmCommandEvent",
                    COMMAND_SHAPE,
                    format!("commandLine.{command_line}"),
                    command_line.to_string(),
                )
                // Extracted before redaction
                .attribute(UUID, self.sanitizer.extract_identifier(&e.command_line))
            }
            EventShape::Option(e) => ClassifiedEvent::known(
                "HostTpmOptionEvent",
                OPTION_SHAPE,
                format!("bootOptions.{}", e.options_file_name),
                e.options_file_name.clone(),
            ),
            EventShape::BootSecurityOption(e) => ClassifiedEvent::known(
                "HostTpmBootSecurityOptionEvent",
                BOOT_SECURITY_OPTION_SHAPE,
                format!("bootSecurityOption.{}", e.boot_security_option),
                e.boot_security_option.clone(),
            ),
            EventShape::Unrecognized(e) => Self::unrecognized(e),
        }
    }

    // Policies match modules by digest, so the bare component name is enough
    // for a label, whether or not the package fields are set.
    fn software_component(e: &SoftwareComponentEvent) -> ClassifiedEvent {
        ClassifiedEvent::known(
            "HostTpmSoftwareComponentEvent",
            SOFTWARE_COMPONENT_SHAPE,
            format!("componentName.{}", e.component_name),
            e.component_name.clone(),
        )
        .attribute(PACKAGE_NAME, e.vib_name.as_deref())
        .attribute(PACKAGE_VENDOR, e.vib_vendor.as_deref())
        .attribute(PACKAGE_VERSION, e.vib_version.as_deref())
    }

    fn unrecognized(e: &UnrecognizedEvent) -> ClassifiedEvent {
        let event_name = format!("{EVENT_NAME_PREFIX}{}", e.shape);
        let mut attributes: BTreeMap<String, String> = e.properties.iter().cloned().collect();
        attributes.insert(EVENT_TYPE.to_string(), e.shape.clone());
        attributes.insert(EVENT_NAME.to_string(), event_name.clone());

        ClassifiedEvent {
            event_type: None,
            event_name,
            component_name: None,
            // "null" when the host gives no type
            label: format!(
                "{}: {}",
                e.shape,
                e.dynamic_type.as_deref().unwrap_or("null")
            ),
            attributes,
        }
    }
}
