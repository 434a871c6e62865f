use clap::Parser;
use std::path::PathBuf;

/// Import X.509 certificates into a trust store, reconciling duplicates
/// and alias conflicts before anything is committed.
#[derive(Debug, Parser)]
#[command(name = "certimport", version, about)]
pub struct Cli {
    /// Certificate files to import (PEM, DER, PKCS#12 or JKS)
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Do not ask for confirmation
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,

    /// The input file is password-protected; prompts for the password
    /// when the value is omitted
    #[arg(
        long,
        value_name = "PASSWORD",
        num_args = 0..=1,
        require_equals = true
    )]
    pub password: Option<Option<String>>,

    /// Target store: 'system' or a path to a PKCS#12 store file
    #[arg(long, value_name = "system|PATH", default_value = "system")]
    pub target: String,

    /// Password of the target store (not recommended on the command line)
    #[arg(long, value_name = "PASSWORD")]
    pub store_password: Option<String>,

    /// Fetch CA certificate(s) from the given hostname/port
    #[arg(long, value_name = "HOST[:PORT]")]
    pub fetch_from: Vec<String>,

    /// Only import CA certificates
    #[arg(long)]
    pub ca_only: bool,

    /// Recommend a certificate ID for a single imported certificate
    #[arg(long, value_name = "ID")]
    pub cert: Option<String>,

    /// Import all certificates installed in the system trust store
    #[arg(long)]
    pub installed_certs: bool,
}
