///
/// Anomalies found while assembling a manifest. None of them stops the
/// assembly, but they are kept next to the manifest for operators to audit.
///
use std::fmt;

use tpm_model::PcrIndex;

/// How much a diagnostic matters
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Benign anomaly
    Info,
    /// The input is unusual but nothing was lost
    Warning,
    /// A value was substituted or dropped
    Error,
}

impl From<Severity> for log::Level {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DiagnosticKind {
    ZeroFilledDigest { len: usize },
    RehashedDigest { reported: Vec<u8> },
    UnrecognizedEvent { shape: String, reason: Option<String> },
    UnexpectedDigestMethod { method: String },
    PcrValueLength { len: usize },
    DuplicatePcrValue,
    InvalidPcrIndex { index: u32 },
}

impl DiagnosticKind {
    /// Severity of this kind of anomaly
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::ZeroFilledDigest { .. } | DiagnosticKind::DuplicatePcrValue => {
                Severity::Info
            }
            DiagnosticKind::UnrecognizedEvent { .. }
            | DiagnosticKind::UnexpectedDigestMethod { .. }
            | DiagnosticKind::PcrValueLength { .. } => Severity::Warning,
            DiagnosticKind::RehashedDigest { .. } | DiagnosticKind::InvalidPcrIndex { .. } => {
                Severity::Error
            }
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::ZeroFilledDigest { len } => {
                write!(f, "zero digest of {len} bytes replaced with 20 zero bytes")
            }
            DiagnosticKind::RehashedDigest { reported } => write!(
                f,
                "digest {} of {} bytes replaced with its SHA-1",
                hex::encode(reported),
                reported.len()
            ),
            DiagnosticKind::UnrecognizedEvent {
                shape,
                reason: None,
            } => write!(f, "unrecognized event {shape}"),
            DiagnosticKind::UnrecognizedEvent {
                shape,
                reason: Some(reason),
            } => write!(f, "unrecognized event {shape}: {reason}"),
            DiagnosticKind::UnexpectedDigestMethod { method } => {
                write!(f, "unexpected digest method '{method}', assuming SHA1")
            }
            DiagnosticKind::PcrValueLength { len } => {
                write!(f, "PCR value of {len} bytes")
            }
            DiagnosticKind::DuplicatePcrValue => write!(f, "PCR value reported twice"),
            DiagnosticKind::InvalidPcrIndex { index } => {
                write!(f, "invalid PCR index {index}, entry skipped")
            }
        }
    }
}

/// One anomaly
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity of `kind`
    pub severity: Severity,
    /// PCR concerned, if the index was valid
    pub pcr: Option<PcrIndex>,
    /// Position of the event in the report, for event anomalies
    pub event: Option<usize>,
    /// What happened
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Create a diagnostic for a PCR value
    pub fn pcr(pcr: Option<PcrIndex>, kind: DiagnosticKind) -> Self {
        Diagnostic {
            severity: kind.severity(),
            pcr,
            event: None,
            kind,
        }
    }

    /// Create a diagnostic for the event at position `event` in the report
    pub fn event(pcr: Option<PcrIndex>, event: usize, kind: DiagnosticKind) -> Self {
        Diagnostic {
            severity: kind.severity(),
            pcr,
            event: Some(event),
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pcr) = self.pcr {
            write!(f, "PCR {pcr}: ")?;
        }
        if let Some(event) = self.event {
            write!(f, "event #{event}: ")?;
        }
        write!(f, "{}", self.kind)
    }
}

/// Diagnostics in the order they were found. Each one is also sent to the
/// logger when recorded.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Record a diagnostic
    pub fn push(&mut self, d: Diagnostic) {
        let level: log::Level = d.severity.into();
        log::log!(level, "{d}");
        self.entries.push(d);
    }

    /// Diagnostics in the order they were found
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was found
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest severity found
    pub fn max_severity(&self) -> Option<Severity> {
        self.entries.iter().map(|d| d.severity).max()
    }
}
