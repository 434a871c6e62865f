use crate::{
    cert::ParsedCertificate,
    error::{AppResult, ErrorReason},
    jks,
    keystore::Keystore,
};
use rustls_pki_types::CertificateDer;
use std::{fs, io::BufReader, path::PathBuf};

/// One input descriptor for the loader.
#[derive(Clone, Debug)]
pub enum CertSource {
    /// A PEM/DER certificate file or a PKCS#12/JKS keystore.
    File(PathBuf),
    /// Every trust anchor installed in the running system.
    Installed,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Password for password-protected keystore inputs.
    pub password: Option<String>,
    /// Caller-recommended alias, applied iff exactly one certificate
    /// results from all sources.
    pub preferred_alias: Option<String>,
    /// Drop entries that are not CA certificates.
    pub cas_only: bool,
}

/// Load and merge all sources into a single keystore. Later sources win
/// on alias conflicts.
pub fn load_sources(sources: &[CertSource], opts: &LoadOptions) -> AppResult<Keystore> {
    let mut merged = Keystore::new();
    for source in sources {
        let keystore = match source {
            CertSource::File(path) => load_file(path, opts)?,
            CertSource::Installed => load_installed()?,
        };
        merged.merge(keystore);
    }

    if opts.cas_only {
        merged.retain_cas();
        if merged.is_empty() {
            return Err(ErrorReason::Load(
                "no CA certificates found in the input".to_string(),
            )
            .into());
        }
    }

    if let Some(alias) = &opts.preferred_alias {
        if merged.len() == 1 {
            let current = merged.aliases().remove(0);
            if let Some(cert) = merged.remove(&current) {
                info!("using recommended certificate id '{alias}'");
                merged.insert(alias.clone(), cert);
            }
        } else {
            warn!(
                "ignoring recommended certificate id '{alias}': \
                 {} certificates were loaded",
                merged.len()
            );
        }
    }

    Ok(merged)
}

fn load_file(path: &PathBuf, opts: &LoadOptions) -> AppResult<Keystore> {
    debug!("loading certificates from {}", path.display());
    let data = fs::read(path)
        .map_err(|e| ErrorReason::Load(format!("cannot read {}: {e}", path.display())))?;

    if jks::is_jks(&data) {
        let keystore = jks::read_jks(&data, opts.password.as_deref())?;
        return non_empty(keystore, path);
    }
    if data.windows(5).any(|w| w == b"-----") {
        return non_empty(load_pem(&data)?, path);
    }
    // Raw DER: either a single certificate or a PKCS#12 keystore, both
    // start with an ASN.1 SEQUENCE.
    if let Ok(cert) = ParsedCertificate::from_der(data.clone()) {
        let mut keystore = Keystore::new();
        keystore.insert(cert.default_alias(), cert);
        return Ok(keystore);
    }
    let keystore = Keystore::from_pkcs12(&data, opts.password.as_deref().unwrap_or(""))?;
    non_empty(keystore, path)
}

fn load_pem(data: &[u8]) -> AppResult<Keystore> {
    let mut reader = BufReader::new(data);
    let mut keystore = Keystore::new();
    for der in rustls_pemfile::certs(&mut reader) {
        let der = der.map_err(|e| ErrorReason::Load(format!("malformed PEM input: {e}")))?;
        let cert = ParsedCertificate::from_der(der.as_ref().to_vec())?;
        keystore.insert(cert.default_alias(), cert);
    }
    Ok(keystore)
}

/// Expand the installed-certs sentinel to one entry per system trust
/// anchor. Anchors carry no natural alias, so each gets the derived
/// default.
fn load_installed() -> AppResult<Keystore> {
    let mut keystore = Keystore::new();
    let anchors: Vec<CertificateDer<'static>> = rustls_native_certs::load_native_certs()
        .map_err(|e| ErrorReason::Load(format!("cannot load installed certificates: {e}")))?;
    for der in anchors {
        match ParsedCertificate::from_der(der.as_ref().to_vec()) {
            Ok(cert) => {
                keystore.insert(cert.default_alias(), cert);
            }
            Err(e) => warn!("skipping unparsable installed certificate: {e}"),
        }
    }
    if keystore.is_empty() {
        return Err(ErrorReason::Load("no installed certificates found".to_string()).into());
    }
    info!("loaded {} installed trust anchors", keystore.len());
    Ok(keystore)
}

fn non_empty(keystore: Keystore, path: &PathBuf) -> AppResult<Keystore> {
    if keystore.is_empty() {
        return Err(
            ErrorReason::Load(format!("no certificates found in {}", path.display())).into(),
        );
    }
    Ok(keystore)
}

#[cfg(test)]
mod test {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
    use std::io::Write;

    fn generate_pem(cn: &str, ca: bool) -> String {
        let mut params = CertificateParams::new(Vec::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        if ca {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        }
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().pem()
    }

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_pem_file_with_default_aliases() {
        let pem = format!("{}{}", generate_pem("Alpha CA", true), generate_pem("beta", false));
        let file = write_temp(&pem);

        let sources = [CertSource::File(file.path().to_path_buf())];
        let keystore = load_sources(&sources, &LoadOptions::default()).unwrap();
        assert_eq!(
            keystore.aliases(),
            vec!["alpha_ca".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn empty_source_is_a_load_error() {
        let file = write_temp("no certificates here\n");
        let sources = [CertSource::File(file.path().to_path_buf())];

        let err = load_sources(&sources, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err.reason(), ErrorReason::Load(_)));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let sources = [CertSource::File(PathBuf::from("/nonexistent/certs.pem"))];
        let err = load_sources(&sources, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err.reason(), ErrorReason::Load(_)));
    }

    #[test]
    fn cas_only_drops_leaf_certificates() {
        let pem = format!(
            "{}{}",
            generate_pem("Root CA", true),
            generate_pem("leaf.example.org", false)
        );
        let file = write_temp(&pem);

        let sources = [CertSource::File(file.path().to_path_buf())];
        let opts = LoadOptions {
            cas_only: true,
            ..Default::default()
        };
        let keystore = load_sources(&sources, &opts).unwrap();
        assert_eq!(keystore.aliases(), vec!["root_ca".to_string()]);
    }

    #[test]
    fn preferred_alias_applies_to_single_certificate() {
        let file = write_temp(&generate_pem("Solo", false));
        let sources = [CertSource::File(file.path().to_path_buf())];
        let opts = LoadOptions {
            preferred_alias: Some("friendly-name".to_string()),
            ..Default::default()
        };

        let keystore = load_sources(&sources, &opts).unwrap();
        assert_eq!(keystore.aliases(), vec!["friendly-name".to_string()]);
    }

    #[test]
    fn preferred_alias_ignored_for_multiple_certificates() {
        let pem = format!("{}{}", generate_pem("one", false), generate_pem("two", false));
        let file = write_temp(&pem);
        let sources = [CertSource::File(file.path().to_path_buf())];
        let opts = LoadOptions {
            preferred_alias: Some("friendly-name".to_string()),
            ..Default::default()
        };

        let keystore = load_sources(&sources, &opts).unwrap();
        assert_eq!(keystore.aliases(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn later_file_wins_on_alias_conflict() {
        let first = write_temp(&generate_pem("shared", false));
        let second_pem = generate_pem("shared", false);
        let second = write_temp(&second_pem);

        let sources = [
            CertSource::File(first.path().to_path_buf()),
            CertSource::File(second.path().to_path_buf()),
        ];
        let keystore = load_sources(&sources, &LoadOptions::default()).unwrap();
        assert_eq!(keystore.len(), 1);

        let expected = pem::parse(second_pem).unwrap();
        assert_eq!(keystore.get("shared").unwrap().der(), expected.contents());
    }
}
