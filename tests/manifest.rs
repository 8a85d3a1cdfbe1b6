/// Assemble manifests from JSON reports
use std::sync::Arc;
use std::thread;

use pcr_manifest::tpm_model::{DigestOrigin, PcrIndex, Sha1Digest};
use pcr_manifest::{DiagnosticKind, ManifestAssembler, ManifestError, Severity};
use serde_json::json;

fn pcr(i: u32) -> PcrIndex {
    PcrIndex::try_from(i).unwrap()
}

fn assemble(report: serde_json::Value) -> pcr_manifest::Assembly {
    ManifestAssembler::new()
        .assemble_json(report.to_string().as_bytes())
        .unwrap()
}

#[test]
fn esxi_report() {
    let report = std::fs::read("testdata/esxi-report.json").unwrap();
    let assembly = ManifestAssembler::new().assemble_json(&report).unwrap();
    let manifest = &assembly.manifest;

    assert_eq!(manifest.pcrs().count(), 4);
    assert_eq!(
        manifest.pcr(pcr(0)).unwrap().value(),
        "1f3b1d7c8a3be0ebf1c6d3ba35c94b5b1fc0a2d4"
    );

    let cmdline = &manifest.event_log(pcr(18)).unwrap().events()[0];
    assert_eq!(cmdline.label(), "");
    assert_eq!(cmdline.attribute("ComponentName"), Some("commandLine."));
    assert_eq!(
        cmdline.attribute("UUID"),
        Some("772753050c0a140bdfbf92e306b9793d")
    );

    let events = manifest.event_log(pcr(19)).unwrap().events();
    let labels: Vec<_> = events.iter().map(|m| m.label()).collect();
    assert_eq!(
        labels,
        [
            "imgdb.tgz",
            "state.tgz",
            "net-e1000",
            "boot.cfg",
            "HostTpmNvTagEventDetails: NvTag"
        ]
    );
    assert_eq!(
        events[0].attribute("ComponentName"),
        Some("componentName.imgdb.tgz")
    );
    assert_eq!(
        events[0].digest().to_hex(),
        "9e6fd1f34b1b42ba1ba8ad7e7bb0fc1b06b76e32"
    );
    // 32 zero bytes
    assert_eq!(events[1].digest(), &Sha1Digest::ZERO);
    assert!(events[1].origin().is_degraded());
    assert_eq!(events[2].attribute("PackageVendor"), Some("VMware"));
    assert_eq!(events[4].attribute("tag"), Some("asset-7"));

    let security = &manifest.event_log(pcr(17)).unwrap().events()[0];
    assert_eq!(security.label(), "secureBoot=enabled");

    let kinds: Vec<_> = assembly.diagnostics.iter().map(|d| &d.kind).collect();
    assert_eq!(
        kinds,
        [
            &DiagnosticKind::ZeroFilledDigest { len: 32 },
            &DiagnosticKind::UnrecognizedEvent {
                shape: "HostTpmNvTagEventDetails".to_string(),
                reason: None
            },
        ]
    );
}

#[test]
fn empty_report() {
    let assembly = assemble(json!({}));
    assert!(assembly.manifest.is_empty());
    assert!(assembly.diagnostics.is_empty());

    let assembly = assemble(json!({"tpmPcrValues": [], "tpmEvents": []}));
    assert!(assembly.manifest.is_empty());
}

#[test]
fn last_pcr_value_wins() {
    let assembly = assemble(json!({
        "tpmPcrValues": [
            {"pcrNumber": 0, "digestMethod": "SHA1", "digestValue": "11".repeat(20)},
            {"pcrNumber": 0, "digestMethod": "SHA1", "digestValue": "22".repeat(20)},
        ]
    }));
    assert_eq!(
        assembly.manifest.pcr(pcr(0)).unwrap().value(),
        "22".repeat(20)
    );
}

#[test]
fn arrival_order() {
    let events: Vec<_> = (0..10)
        .map(|i| {
            json!({
                "pcrIndex": 19 - (i % 2),
                "eventDetails": {
                    "type": "HostTpmSoftwareComponentEventDetails",
                    "dataHash": format!("{i:02x}").repeat(20),
                    "componentName": format!("module{i}"),
                }
            })
        })
        .collect();
    let assembly = assemble(json!({ "tpmEvents": events }));

    for (index, expected) in [(19, [0, 2, 4, 6, 8]), (18, [1, 3, 5, 7, 9])] {
        let labels: Vec<String> = assembly
            .manifest
            .event_log(pcr(index))
            .unwrap()
            .events()
            .iter()
            .map(|m| m.label().to_string())
            .collect();
        let expected: Vec<String> = expected.iter().map(|i| format!("module{i}")).collect();
        assert_eq!(labels, expected);
    }
}

#[test]
fn bad_events_degrade() {
    let assembly = assemble(json!({
        "tpmEvents": [
            {"pcrIndex": 19, "eventDetails": {
                "type": "HostTpmOptionEventDetails", "dataHash": "aa".repeat(20),
                "optionsFileName": "boot.cfg"}},
            // Known shape, wrongly typed field
            {"pcrIndex": 19, "eventDetails": {
                "type": "HostTpmOptionEventDetails", "dataHash": "bb".repeat(20),
                "optionsFileName": 7, "dynamicType": "Options"}},
            // Unknown shape
            {"pcrIndex": 20, "eventDetails": {
                "type": "HostTpmFutureEventDetails", "dataHash": "cc".repeat(24)}},
            {"pcrIndex": 19, "eventDetails": {
                "type": "HostTpmBootSecurityOptionEventDetails", "dataHash": "dd".repeat(20),
                "bootSecurityOption": "secureBoot"}},
        ]
    }));
    let manifest = &assembly.manifest;

    let events = manifest.event_log(pcr(19)).unwrap().events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].label(), "boot.cfg");
    assert_eq!(events[1].label(), "HostTpmOptionEventDetails: Options");
    assert_eq!(
        events[1].attribute("EventName"),
        Some("Vim25Api.HostTpmOptionEventDetails")
    );
    assert_eq!(events[2].label(), "secureBoot");

    let future = &manifest.event_log(pcr(20)).unwrap().events()[0];
    assert_eq!(future.label(), "HostTpmFutureEventDetails: null");
    assert!(matches!(future.origin(), DigestOrigin::Rehashed { .. }));
    assert_eq!(future.origin().reported(), Some(&[0xcc; 24][..]));

    assert_eq!(assembly.diagnostics.len(), 3);
    assert_eq!(assembly.diagnostics.max_severity(), Some(Severity::Error));
    let reason = assembly.diagnostics.iter().find_map(|d| match &d.kind {
        DiagnosticKind::UnrecognizedEvent { reason, .. } => reason.clone(),
        _ => None,
    });
    assert!(reason.unwrap().contains("expected a string"));
}

#[test]
fn null_fields_keep_shape() {
    let assembly = assemble(json!({
        "tpmEvents": [
            {"pcrIndex": 18, "eventDetails": {
                "type": "HostTpmCommandEventDetails", "dataHash": "aa".repeat(20),
                "commandLine": null}},
            {"pcrIndex": 19, "eventDetails": {
                "type": "HostTpmSoftwareComponentEventDetails", "dataHash": "bb".repeat(20),
                "vibName": null, "vibVendor": "VMware"}},
        ]
    }));
    let manifest = &assembly.manifest;

    let command = &manifest.event_log(pcr(18)).unwrap().events()[0];
    assert_eq!(command.label(), "");
    assert_eq!(command.attribute("EventType"), Some("HostTpmCommandEvent"));
    assert_eq!(command.attribute("ComponentName"), Some("commandLine."));
    assert_eq!(command.attribute("UUID"), None);

    let component = &manifest.event_log(pcr(19)).unwrap().events()[0];
    assert_eq!(component.label(), "");
    assert_eq!(
        component.attribute("EventType"),
        Some("HostTpmSoftwareComponentEvent")
    );
    assert_eq!(component.attribute("ComponentName"), Some("componentName."));
    assert_eq!(component.attribute("PackageName"), None);
    assert_eq!(component.attribute("PackageVendor"), Some("VMware"));

    assert!(assembly.diagnostics.is_empty());
}

#[test]
fn unreadable_report() {
    let assembler = ManifestAssembler::new();
    assert!(matches!(
        assembler.assemble_json(b"not json"),
        Err(ManifestError::Parse(_))
    ));
    // Events without a data hash can't be measured at all
    assert!(matches!(
        assembler.assemble_json(
            json!({"tpmEvents": [{"pcrIndex": 1, "eventDetails": {"type": "X"}}]})
                .to_string()
                .as_bytes()
        ),
        Err(ManifestError::Parse(_))
    ));
    assert!(matches!(
        assembler.assemble_json(
            json!({"tpmPcrValues": [{"pcrNumber": 40, "digestValue": "00"}]})
                .to_string()
                .as_bytes()
        ),
        Err(ManifestError::Model(_))
    ));
}

#[test]
fn shared_assembler() {
    let report = Arc::new(std::fs::read("testdata/esxi-report.json").unwrap());
    let assembler = Arc::new(ManifestAssembler::new());

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let assembler = Arc::clone(&assembler);
            let report = Arc::clone(&report);
            thread::spawn(move || assembler.assemble_json(&report).unwrap().manifest)
        })
        .collect();
    let manifests: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    assert!(manifests.windows(2).all(|w| w[0] == w[1]));
}
