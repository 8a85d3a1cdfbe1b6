//! Normalize hypervisor TPM attestation reports into PCR manifests.
//!
//! A host attestation report contains the current value of each Platform
//! Configuration Register (PCR), and an event log describing what was
//! extended into them: boot modules, the boot command line, option files and
//! security options. This crate turns such a report into a [PcrManifest]
//! where each event becomes a labelled [Measurement] with a SHA-1 digest,
//! ready to be compared against reference values.
//!
//! Reports come from a source that isn't fully trusted, so assembly is
//! lenient with individual events:
//!
//! * event shapes that we don't know are kept with their generic properties,
//! * data hashes with the wrong size are normalized (see [digest::normalize])
//!   and the reported bytes are kept in the measurement origin.
//!
//! Each anomaly is recorded as a [Diagnostic] next to the manifest. Only a
//! report that cannot be read at all is an error.
//!
//! Example
//! ```bash
//! pcr-manifest -c testdata/esxi.toml testdata/esxi-report.json
//! PCR 0: 1f3b1d7c8a3be0ebf1c6d3ba35c94b5b1fc0a2d4
//! ...
//! PCR 19 events:
//!   9e6fd1f34b1b42ba1ba8ad7e7bb0fc1b06b76e32 imgdb.tgz
//! ```
//!
//! [PcrManifest]: tpm_model::PcrManifest
//! [Measurement]: tpm_model::Measurement

#![warn(missing_docs)]
/// Kernel command line helpers
pub mod boot_cmdline;
/// Event classification
pub mod classifier;
/// Command-line arguments of the pcr-manifest tool
pub mod command_line;
/// Configuration files
pub mod config;
/// Assembly anomalies
pub mod diagnostic;
/// Digest normalization
pub mod digest;
/// Manifest assembly
pub mod manifest;
/// Measurement construction
pub mod measurement;
/// Attestation report input
pub mod report;

pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use manifest::{Assembly, ManifestAssembler, ManifestError};
pub use report::AttestationReport;
pub use tpm_model;
