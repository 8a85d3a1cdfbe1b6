/// Parse the main command-line
///
use clap::Parser;

// This is the help blurb:
/// Build the PCR manifest of a host attestation report: the current value of
/// each PCR and the measurements extended into it. Digests with an unexpected
/// size are normalized and reported as diagnostics.
#[derive(Debug, Parser)]
#[command(version, long_about, verbatim_doc_comment)]
pub struct Args {
    /// Display more information (use multiple times to increase verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Config file. Can be specified multiple times to provide overlays.
    /// For example: -c site.toml -c host.toml
    #[arg(short, long, verbatim_doc_comment, value_name = "file")]
    pub config: Vec<String>,

    /// Redact command lines containing this string (in addition to
    /// "no-auto-partition"). Can be specified multiple times.
    #[arg(long, value_name = "string")]
    pub redact_marker: Vec<String>,

    /// Key of the boot identifier on the command line
    #[arg(long, value_name = "key")]
    pub identifier_key: Option<String>,

    /// Skip entries with an invalid PCR index instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Display the manifest as JSON
    #[arg(long)]
    pub json: bool,

    /// Display digests encoded in base64, instead of raw hex
    #[arg(long, conflicts_with = "json")]
    pub print_b64: bool,

    /// Fail if a digest had to be re-hashed or an entry was skipped
    #[arg(long)]
    pub deny_degraded: bool,

    /// Attestation report in JSON
    #[arg(value_name = "report")]
    pub report: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args() {
        Args::command().debug_assert();

        let args = Args::try_parse_from([
            "pcr-manifest",
            "-vv",
            "-c",
            "a.toml",
            "--config",
            "b.toml",
            "--redact-marker",
            "secret",
            "report.json",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.config, ["a.toml", "b.toml"]);
        assert_eq!(args.redact_marker, ["secret"]);
        assert_eq!(args.report, "report.json");
        assert!(!args.lenient);

        assert!(Args::try_parse_from(["pcr-manifest"]).is_err());
        assert!(
            Args::try_parse_from(["pcr-manifest", "--json", "--print-b64", "r.json"]).is_err()
        );
    }
}
