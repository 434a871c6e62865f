//! Live retrieval of peer certificates from a TLS endpoint, delegated
//! to `openssl s_client`. The output is only accepted on a zero exit
//! status with a recognizable certificate block, and the operator must
//! explicitly trust the material before it is persisted for import.

use crate::{
    confirm::Confirm,
    error::{AppResult, ErrorReason},
    tempfiles::TempWorkspace,
};
use colored::Colorize;
use std::{
    path::PathBuf,
    process::{Command, Stdio},
};

const DEFAULT_TLS_PORT: u16 = 443;
const CERT_END_MARKER: &str = "END CERTIFICATE";

/// Fetch the certificate chain presented by `endpoint` (host or
/// host:port) and write it, PEM-encoded, to a file in the temp
/// workspace. Returns the file path for the loader.
pub fn fetch_certificates(
    endpoint: &str,
    confirm: &mut dyn Confirm,
    workspace: &TempWorkspace,
) -> AppResult<PathBuf> {
    let connect = if endpoint.contains(':') {
        endpoint.to_string()
    } else {
        format!("{endpoint}:{DEFAULT_TLS_PORT}")
    };

    info!("fetching certificates from {connect}");
    let output = Command::new("openssl")
        .arg("s_client")
        .arg("-connect")
        .arg(&connect)
        .arg("-showcerts")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ErrorReason::Load(format!("failed to execute openssl s_client: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() || !stdout.contains(CERT_END_MARKER) {
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            eprintln!("{}", line.red());
        }
        return Err(ErrorReason::Load(format!(
            "error extracting trusted certificates from {connect}"
        ))
        .into());
    }

    for line in stdout.lines() {
        println!("{}", line.cyan());
    }

    let trusted = confirm.confirm("Do you trust the certificate(s) listed above?", false)?;
    if !trusted {
        return Err(ErrorReason::UserCanceled.into());
    }

    // Keep only the certificate blocks; s_client output is mostly
    // handshake chatter around them.
    let mut reader = std::io::BufReader::new(stdout.as_bytes());
    let mut contents = String::new();
    for der in rustls_pemfile::certs(&mut reader) {
        let der =
            der.map_err(|e| ErrorReason::Load(format!("malformed certificate output: {e}")))?;
        let block = pem::Pem::new("CERTIFICATE", der.as_ref().to_vec());
        contents.push_str(&pem::encode(&block));
    }
    if contents.is_empty() {
        return Err(ErrorReason::Load(format!(
            "no certificates found in the output of openssl s_client for {connect}"
        ))
        .into());
    }

    workspace.create_file(&format!("{connect}.pem"), contents.as_bytes())
}
