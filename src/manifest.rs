///
/// Assemble the PCR manifest of an attestation report
///
use std::collections::BTreeMap;

use thiserror::Error;
use tpm_model::{
    DigestOrigin, Measurement, ModelError, Pcr, PcrEventLog, PcrIndex, PcrManifest,
    SHA1_DIGEST_LEN,
};

use crate::classifier::EventClassifier;
use crate::config::{AssemblerConfig, ConfigError};
use crate::diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::measurement;
use crate::report::{AttestationReport, DigestInfo, EventLogEntry, EventShape};

#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ManifestError {
    #[error("cannot parse report: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid report: {0}")]
    Model(#[from] ModelError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}
type Result<T> = core::result::Result<T, ManifestError>;

/// Result of an assembly: the manifest and the anomalies found on the way
#[derive(Debug)]
pub struct Assembly {
    /// The manifest
    pub manifest: PcrManifest,
    /// Anomalies, in the order they were found
    pub diagnostics: Diagnostics,
}

/// Build PCR manifests from attestation reports.
///
/// An assembler holds only configuration, so it can be shared between threads
/// and used for several reports concurrently. Each call returns a new
/// manifest.
///
/// ```
/// use pcr_manifest::ManifestAssembler;
///
/// let assembler = ManifestAssembler::new();
/// let report = br#"{"tpmPcrValues": [{"pcrNumber": 0, "digestValue": "00"}]}"#;
/// let assembly = assembler.assemble_json(report).unwrap();
/// assert_eq!(assembly.manifest.pcrs().count(), 1);
/// assert_eq!(assembly.diagnostics.len(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct ManifestAssembler {
    classifier: EventClassifier,
    lenient: bool,
}

impl ManifestAssembler {
    /// Create an assembler with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an assembler from a configuration
    pub fn from_config(config: &AssemblerConfig) -> Result<Self> {
        let mut assembler = Self::new();
        assembler
            .classifier(EventClassifier::new(config.sanitizer()?))
            .lenient(config.lenient());
        Ok(assembler)
    }

    /// Set the event classifier
    pub fn classifier(&mut self, classifier: EventClassifier) -> &mut Self {
        self.classifier = classifier;
        self
    }

    /// When false (the default), an entry with an invalid PCR index aborts the
    /// assembly. When true, the entry is skipped and reported as a diagnostic.
    pub fn lenient(&mut self, v: bool) -> &mut Self {
        self.lenient = v;
        self
    }

    /// Decode a JSON report and assemble its manifest
    pub fn assemble_json(&self, data: &[u8]) -> Result<Assembly> {
        self.assemble_report(&AttestationReport::from_json(data)?)
    }

    /// Assemble the manifest of a report
    pub fn assemble_report(&self, report: &AttestationReport) -> Result<Assembly> {
        self.assemble(&report.tpm_pcr_values, &report.tpm_events)
    }

    /// Assemble a manifest from PCR values and log events. A PCR value given
    /// twice replaces the first one. Events are kept in the given order.
    pub fn assemble(&self, digests: &[DigestInfo], events: &[EventLogEntry]) -> Result<Assembly> {
        let mut diagnostics = Diagnostics::default();

        let mut pcrs = BTreeMap::new();
        for info in digests {
            let Some(index) = self.pcr_index(info.pcr_number, None, &mut diagnostics)? else {
                continue;
            };
            // The digest method is expected to be SHA1, always
            log::debug!("PCR {index} digest method {}", info.digest_method);
            if !info.digest_method.eq_ignore_ascii_case("SHA1") {
                diagnostics.push(Diagnostic::pcr(
                    Some(index),
                    DiagnosticKind::UnexpectedDigestMethod {
                        method: info.digest_method.clone(),
                    },
                ));
            }
            if info.digest_value.len() != SHA1_DIGEST_LEN {
                diagnostics.push(Diagnostic::pcr(
                    Some(index),
                    DiagnosticKind::PcrValueLength {
                        len: info.digest_value.len(),
                    },
                ));
            }

            let pcr = Pcr::new(index, hex::encode(&info.digest_value));
            if pcrs.insert(index, pcr).is_some() {
                diagnostics.push(Diagnostic::pcr(Some(index), DiagnosticKind::DuplicatePcrValue));
            }
        }

        let mut logs: BTreeMap<PcrIndex, Vec<Measurement>> = BTreeMap::new();
        for (position, entry) in events.iter().enumerate() {
            let Some(index) = self.pcr_index(entry.pcr_index, Some(position), &mut diagnostics)?
            else {
                continue;
            };
            let m = self.measure(index, position, entry, &mut diagnostics);
            logs.entry(index).or_default().push(m);
        }

        let event_logs = logs
            .into_iter()
            .map(|(index, events)| (index, PcrEventLog::new(index, events)))
            .collect();

        Ok(Assembly {
            manifest: PcrManifest::new(pcrs, event_logs),
            diagnostics,
        })
    }

    fn measure(
        &self,
        index: PcrIndex,
        position: usize,
        entry: &EventLogEntry,
        diagnostics: &mut Diagnostics,
    ) -> Measurement {
        let details = &entry.event_details;
        log::debug!("PCR {index} event {}", details.shape.name());

        if let EventShape::Unrecognized(e) = &details.shape {
            diagnostics.push(Diagnostic::event(
                Some(index),
                position,
                DiagnosticKind::UnrecognizedEvent {
                    shape: e.shape.clone(),
                    reason: e.reason.clone(),
                },
            ));
        }

        let classified = self.classifier.classify(&details.shape);
        let m = measurement::build(&details.data_hash, classified);

        let kind = match m.origin() {
            DigestOrigin::Reported => None,
            DigestOrigin::ZeroFilled { reported } => {
                Some(DiagnosticKind::ZeroFilledDigest { len: reported.len() })
            }
            DigestOrigin::Rehashed { reported } => Some(DiagnosticKind::RehashedDigest {
                reported: reported.clone(),
            }),
        };
        if let Some(kind) = kind {
            diagnostics.push(Diagnostic::event(Some(index), position, kind));
        }
        m
    }

    fn pcr_index(
        &self,
        index: u32,
        event: Option<usize>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<PcrIndex>> {
        match PcrIndex::try_from(index) {
            Ok(i) => Ok(Some(i)),
            Err(_) if self.lenient => {
                let kind = DiagnosticKind::InvalidPcrIndex { index };
                diagnostics.push(match event {
                    Some(position) => Diagnostic::event(None, position, kind),
                    None => Diagnostic::pcr(None, kind),
                });
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
