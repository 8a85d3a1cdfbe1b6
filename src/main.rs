use std::fs;
use std::process;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as base64_standard, Engine as _};
use clap::Parser;

use pcr_manifest::command_line::Args;
use pcr_manifest::config::AssemblerConfig;
use pcr_manifest::tpm_model::PcrManifest;
use pcr_manifest::{Assembly, ManifestAssembler, Severity};

// PCR values are kept in hex, as reported
fn dump_hex(value: &str, print_b64: bool) -> String {
    if !print_b64 {
        return value.to_string();
    }
    hex::decode(value)
        .map(|b| base64_standard.encode(b))
        .unwrap_or_else(|_| value.to_string())
}

fn print_manifest(manifest: &PcrManifest, print_b64: bool) {
    for pcr in manifest.pcrs() {
        println!("PCR {}: {}", pcr.index(), dump_hex(pcr.value(), print_b64));
    }
    for log in manifest.event_logs() {
        println!("PCR {} events:", log.index());
        for m in log.events() {
            println!(
                "  {} {}",
                dump_hex(&m.digest().to_hex(), print_b64),
                m.label()
            );
        }
    }
}

fn build_manifest(args: &Args) -> Result<Assembly> {
    let config = AssemblerConfig::from_args(args)?;
    let assembler = ManifestAssembler::from_config(&config)?;

    let report = fs::read(&args.report).with_context(|| args.report.to_string())?;
    let assembly = assembler
        .assemble_json(&report)
        .with_context(|| args.report.to_string())?;
    Ok(assembly)
}

fn main() {
    let args = Args::parse();

    // Warnings by default
    let verbosity = args.verbose as usize + 1;
    if let Err(e) = stderrlog::new().verbosity(verbosity).init() {
        eprintln!("cannot initialize logger: {e}");
    }

    let assembly = build_manifest(&args).unwrap_or_else(|e| {
        log::error!("Cannot build manifest: {e:#}");
        process::exit(1);
    });

    if args.json {
        match serde_json::to_string_pretty(&assembly.manifest) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                log::error!("Cannot encode manifest: {e}");
                process::exit(1);
            }
        }
    } else {
        print_manifest(&assembly.manifest, args.print_b64);
    }

    if args.deny_degraded && assembly.diagnostics.max_severity() == Some(Severity::Error) {
        log::error!("Report contains degraded measurements");
        process::exit(1);
    }
}
