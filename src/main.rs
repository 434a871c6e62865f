#[macro_use]
extern crate tracing;

use crate::{
    backend::{Pkcs12FileStore, StoreBackend, SYSTEM_STORE_PATH, TRANSFER_KEYSTORE_PASSWORD},
    cli::Cli,
    confirm::{AutoConfirm, Confirm, TerminalConfirm},
    error::{AppResult, ErrorReason},
    loader::{CertSource, LoadOptions},
    reconcile::{reconcile, ChangeKind},
    tempfiles::TempWorkspace,
};
use clap::Parser;
use colored::Colorize;
use std::{path::PathBuf, process::ExitCode};

mod backend;
mod cert;
mod cli;
mod confirm;
mod error;
mod fetch;
mod jks;
mod keystore;
mod loader;
mod reconcile;
mod tempfiles;

fn main() -> ExitCode {
    // Load environment variables from the `.env` file
    dotenvy::dotenv().ok();
    // Initialize the logger after loading the environment variables
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {
            println!("{}", "SUCCESS!".green());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", format!("ERROR: {err}").bright_red());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> AppResult<()> {
    if !cli.files.is_empty() && !cli.fetch_from.is_empty() {
        return Err(
            ErrorReason::Usage("cannot specify file(s) when using '--fetch-from'".to_string())
                .into(),
        );
    }
    if cli.files.is_empty() && cli.fetch_from.is_empty() && !cli.installed_certs {
        return Err(ErrorReason::Usage("no input files specified".to_string()).into());
    }

    // Owns every temporary artifact of this run; dropped (and deleted)
    // on all exit paths below.
    let workspace = TempWorkspace::new()?;
    let mut gate: Box<dyn Confirm> = if cli.yes {
        Box::new(AutoConfirm)
    } else {
        Box::new(TerminalConfirm)
    };

    let mut sources: Vec<CertSource> = cli.files.iter().cloned().map(CertSource::File).collect();
    for endpoint in &cli.fetch_from {
        let fetched = fetch::fetch_certificates(endpoint, gate.as_mut(), &workspace)?;
        sources.push(CertSource::File(fetched));
    }
    if cli.installed_certs {
        sources.push(CertSource::Installed);
    }

    let opts = LoadOptions {
        password: resolve_input_password(&cli, gate.as_mut())?,
        preferred_alias: cli.cert.clone(),
        // Fetched endpoint chains are only useful as trust anchors.
        cas_only: cli.ca_only || !cli.fetch_from.is_empty(),
    };
    let incoming = loader::load_sources(&sources, &opts)?;
    println!("{}", "Sanity check successful".green());

    let store_path = if cli.target.eq_ignore_ascii_case("system")
        || cli.target.eq_ignore_ascii_case("*system")
    {
        PathBuf::from(SYSTEM_STORE_PATH)
    } else {
        PathBuf::from(&cli.target)
    };
    let store_password = match cli.store_password.clone() {
        Some(password) => password,
        None => gate.password("Enter target store password: ")?,
    };
    let store = Pkcs12FileStore::new(store_path, store_password);

    let snapshot = store.read_snapshot()?;
    let outcome = reconcile(incoming, &snapshot, gate.as_mut())?;
    for change in &outcome.changes {
        match change.kind {
            ChangeKind::New => {
                println!("{}", format!("NEW: {}", change.alias).green());
            }
            ChangeKind::Replace => {
                println!("{}", format!("REPLACE: {}", change.alias).yellow());
            }
            ChangeKind::DuplicateRemoved => {
                println!(
                    "{}",
                    format!("SKIPPED (already trusted): {}\n{}", change.alias, change.detail)
                        .yellow()
                );
            }
        }
    }

    // Export to the transfer format the backend expects, staged in the
    // run workspace like every other temporary artifact.
    let transfer = outcome.keystore.to_pkcs12(TRANSFER_KEYSTORE_PASSWORD)?;
    workspace.create_file("transfer.p12", &transfer)?;
    store.commit(&transfer, TRANSFER_KEYSTORE_PASSWORD)
}

fn resolve_input_password(cli: &Cli, gate: &mut dyn Confirm) -> AppResult<Option<String>> {
    match &cli.password {
        None => Ok(None),
        Some(Some(password)) => Ok(Some(password.clone())),
        // Bare `--password` in batch mode: nobody can answer a prompt,
        // so leave the password unset instead of passing an empty one
        // into keystore integrity checks.
        Some(None) if cli.yes => Ok(None),
        Some(None) => Ok(Some(gate.password("Enter input file password: ")?)),
    }
}
