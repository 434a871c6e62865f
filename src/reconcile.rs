use crate::{
    confirm::Confirm,
    error::{AppResult, ErrorReason},
    keystore::{Keystore, StoreSnapshot},
};
use std::fmt::Write as _;

/// What the reconciliation decided for one alias. Records are created
/// in pass order and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRecord {
    pub alias: String,
    pub kind: ChangeKind,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Replace,
    DuplicateRemoved,
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    pub keystore: Keystore,
    pub changes: Vec<ChangeRecord>,
}

/// Reconcile the incoming keystore against the store snapshot.
///
/// Pass 1 removes certificates that are already trusted under another
/// alias; pass 2 surfaces alias collisions for per-entry confirmation.
/// The duplicate pass must complete before the collision pass: a
/// certificate that is already trusted elsewhere must never be offered
/// as a "replace" decision. A final bulk confirmation covers everything
/// that remains; declining it is the same terminal condition as an
/// empty working set.
pub fn reconcile(
    mut incoming: Keystore,
    snapshot: &StoreSnapshot,
    confirm: &mut dyn Confirm,
) -> AppResult<ReconcileOutcome> {
    let mut changes = Vec::new();

    info!("checking whether the certificates are already in the store");
    for alias in incoming.aliases() {
        let Some(cert) = incoming.get(&alias).cloned() else {
            continue;
        };
        match snapshot.find_alias_of(&cert) {
            Some(existing) if existing != alias => {
                warn!(
                    "certificate at alias '{alias}' already exists in the store \
                     with certificate id '{existing}'"
                );
                changes.push(ChangeRecord {
                    alias: alias.clone(),
                    kind: ChangeKind::DuplicateRemoved,
                    detail: format!(
                        "already trusted as '{existing}'\n{}",
                        cert.summary("    ")
                    ),
                });
                incoming.remove(&alias);
            }
            Some(_) => {
                // Same alias, same bytes: the store already satisfies
                // this entry. Not a duplicate, not a replace.
                debug!("alias '{alias}' already satisfied by the store");
            }
            None => {}
        }
    }

    info!("checking whether the aliases already exist");
    for alias in incoming.aliases() {
        let Some(cert) = incoming.get(&alias).cloned() else {
            continue;
        };
        let Some(existing) = snapshot.get(&alias) else {
            changes.push(ChangeRecord {
                alias: alias.clone(),
                kind: ChangeKind::New,
                detail: cert.summary("    "),
            });
            continue;
        };
        if *existing == cert {
            continue;
        }
        warn!("importing '{alias}' will replace an existing certificate");
        let prompt = format!(
            "WARNING: The following certificate will be replaced at certificate id '{alias}':\n{}\n\
             Do you want to continue anyway and replace it?",
            existing.summary("    ")
        );
        if confirm.confirm(&prompt, false)? {
            changes.push(ChangeRecord {
                alias: alias.clone(),
                kind: ChangeKind::Replace,
                detail: existing.summary("    "),
            });
        } else {
            info!("OK, not importing the certificate at alias '{alias}'");
            incoming.remove(&alias);
        }
    }

    if incoming.is_empty() {
        return Err(ErrorReason::NothingToImport.into());
    }

    let mut prompt = String::from("The following certificates will be processed:\n");
    for alias in incoming.aliases() {
        if let Some(cert) = incoming.get(&alias) {
            let _ = writeln!(prompt, "    {alias}: {}", cert.issuer_name());
        }
    }
    let _ = write!(prompt, "Do you want to import ALL of the above certificates?");
    if !confirm.confirm(&prompt, false)? {
        return Err(ErrorReason::NothingToImport.into());
    }

    Ok(ReconcileOutcome {
        keystore: incoming,
        changes,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cert::ParsedCertificate;
    use rcgen::{CertificateParams, DnType, KeyPair};
    use std::collections::VecDeque;

    fn generate(cn: &str) -> ParsedCertificate {
        let mut params = CertificateParams::new(Vec::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        ParsedCertificate::from_der(cert.der().to_vec()).unwrap()
    }

    fn keystore(entries: &[(&str, &ParsedCertificate)]) -> Keystore {
        let mut store = Keystore::new();
        for (alias, cert) in entries {
            store.insert(alias.to_string(), (*cert).clone());
        }
        store
    }

    /// Scripted gate: answers are consumed in order, prompts recorded.
    #[derive(Default)]
    struct ScriptedConfirm {
        answers: VecDeque<bool>,
        prompts: Vec<String>,
    }

    impl ScriptedConfirm {
        fn answering(answers: &[bool]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                prompts: Vec::new(),
            }
        }
    }

    impl Confirm for ScriptedConfirm {
        fn confirm(&mut self, prompt: &str, _default_answer: bool) -> AppResult<bool> {
            self.prompts.push(prompt.to_string());
            Ok(self.answers.pop_front().expect("unexpected prompt"))
        }

        fn password(&mut self, _prompt: &str) -> AppResult<String> {
            unreachable!("reconciliation never asks for a password")
        }
    }

    fn kinds(changes: &[ChangeRecord]) -> Vec<(&str, ChangeKind)> {
        changes
            .iter()
            .map(|c| (c.alias.as_str(), c.kind))
            .collect()
    }

    #[test]
    fn duplicate_under_other_alias_is_removed_without_prompting() {
        let cert = generate("dup");
        let incoming = keystore(&[("mycert", &cert)]);
        let snapshot = keystore(&[("othercert", &cert)]);

        let mut gate = ScriptedConfirm::answering(&[]);
        let err = reconcile(incoming, &snapshot, &mut gate).unwrap_err();
        assert!(matches!(err.reason(), ErrorReason::NothingToImport));
        assert!(gate.prompts.is_empty(), "duplicates must never be offered as replaces");
    }

    #[test]
    fn duplicate_record_names_the_conflicting_alias() {
        let dup = generate("dup");
        let fresh = generate("fresh");
        let incoming = keystore(&[("mycert", &dup), ("new", &fresh)]);
        let snapshot = keystore(&[("othercert", &dup)]);

        let mut gate = ScriptedConfirm::answering(&[true]);
        let outcome = reconcile(incoming, &snapshot, &mut gate).unwrap();

        assert_eq!(
            kinds(&outcome.changes),
            vec![
                ("mycert", ChangeKind::DuplicateRemoved),
                ("new", ChangeKind::New),
            ]
        );
        assert!(outcome.changes[0].detail.contains("othercert"));
        assert_eq!(outcome.keystore.aliases(), vec!["new".to_string()]);
    }

    #[test]
    fn declined_replace_removes_exactly_that_alias() {
        let incoming_cert = generate("incoming");
        let existing_cert = generate("existing");
        let fresh = generate("fresh");
        let incoming = keystore(&[("mycert", &incoming_cert), ("new", &fresh)]);
        let snapshot = keystore(&[("mycert", &existing_cert)]);

        // Decline the replace, approve the bulk confirmation.
        let mut gate = ScriptedConfirm::answering(&[false, true]);
        let outcome = reconcile(incoming, &snapshot, &mut gate).unwrap();

        assert_eq!(outcome.keystore.aliases(), vec!["new".to_string()]);
        assert_eq!(kinds(&outcome.changes), vec![("new", ChangeKind::New)]);
    }

    #[test]
    fn declined_replace_of_sole_entry_is_nothing_to_import() {
        let incoming_cert = generate("incoming");
        let existing_cert = generate("existing");
        let incoming = keystore(&[("mycert", &incoming_cert)]);
        let snapshot = keystore(&[("mycert", &existing_cert)]);

        let mut gate = ScriptedConfirm::answering(&[false]);
        let err = reconcile(incoming, &snapshot, &mut gate).unwrap_err();
        assert!(matches!(err.reason(), ErrorReason::NothingToImport));
    }

    #[test]
    fn accepted_replace_is_kept_and_recorded() {
        let incoming_cert = generate("incoming");
        let existing_cert = generate("existing");
        let incoming = keystore(&[("mycert", &incoming_cert)]);
        let snapshot = keystore(&[("mycert", &existing_cert)]);

        let mut gate = ScriptedConfirm::answering(&[true, true]);
        let outcome = reconcile(incoming, &snapshot, &mut gate).unwrap();

        assert_eq!(outcome.keystore.get("mycert"), Some(&incoming_cert));
        assert_eq!(kinds(&outcome.changes), vec![("mycert", ChangeKind::Replace)]);
        assert!(gate.prompts.iter().all(|p| !p.contains("[y/")));
    }

    #[test]
    fn new_certificate_into_empty_store() {
        let cert = generate("new");
        let incoming = keystore(&[("new", &cert)]);
        let snapshot = Keystore::new();

        let mut gate = ScriptedConfirm::answering(&[true]);
        let outcome = reconcile(incoming, &snapshot, &mut gate).unwrap();

        assert_eq!(outcome.keystore.get("new"), Some(&cert));
        assert_eq!(kinds(&outcome.changes), vec![("new", ChangeKind::New)]);
        // One bulk confirmation, listing the issuer. The terminal gate
        // renders the yes/no hint itself, so the prompt carries none.
        assert_eq!(gate.prompts.len(), 1);
        assert!(gate.prompts[0].contains("new:"));
        assert!(!gate.prompts[0].contains("[y/"));
    }

    #[test]
    fn same_alias_same_bytes_is_a_silent_no_op() {
        let cert = generate("unchanged");
        let incoming = keystore(&[("unchanged", &cert)]);
        let snapshot = keystore(&[("unchanged", &cert)]);

        let mut gate = ScriptedConfirm::answering(&[true]);
        let outcome = reconcile(incoming, &snapshot, &mut gate).unwrap();

        // Entry remains, no change record, and the only prompt was the
        // final bulk confirmation.
        assert_eq!(outcome.keystore.aliases(), vec!["unchanged".to_string()]);
        assert!(outcome.changes.is_empty());
        assert_eq!(gate.prompts.len(), 1);
    }

    #[test]
    fn declined_bulk_confirmation_is_nothing_to_import() {
        let cert = generate("new");
        let incoming = keystore(&[("new", &cert)]);
        let snapshot = Keystore::new();

        let mut gate = ScriptedConfirm::answering(&[false]);
        let err = reconcile(incoming, &snapshot, &mut gate).unwrap_err();
        assert!(matches!(err.reason(), ErrorReason::NothingToImport));
    }
}
