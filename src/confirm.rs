use crate::error::AppResult;
use dialoguer::{Confirm as ConfirmPrompt, Password as PasswordPrompt};

/// Interactive boundary of the importer. The reconciliation engine only
/// ever talks to this trait, so it can be driven by a scripted
/// implementation in tests and by auto-approval in batch mode.
pub trait Confirm {
    /// Ask a yes/no question. Multi-line prompts carry their context in
    /// the leading lines; the last line is the question itself.
    fn confirm(&mut self, prompt: &str, default_answer: bool) -> AppResult<bool>;

    /// Read a secret without echoing it.
    fn password(&mut self, prompt: &str) -> AppResult<String>;
}

/// Terminal-backed gate used for normal interactive runs. Empty input
/// takes the default answer, which is "no" everywhere in this tool.
#[derive(Debug, Default)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, prompt: &str, default_answer: bool) -> AppResult<bool> {
        let (context, question) = match prompt.rsplit_once('\n') {
            Some((context, question)) => (Some(context), question),
            None => (None, prompt),
        };
        if let Some(context) = context {
            println!("{context}");
        }
        Ok(ConfirmPrompt::new()
            .with_prompt(question)
            .default(default_answer)
            .interact()?)
    }

    fn password(&mut self, prompt: &str) -> AppResult<String> {
        Ok(PasswordPrompt::new().with_prompt(prompt).interact()?)
    }
}

/// Batch-mode gate: every question is answered "yes" without blocking.
/// Secrets cannot be prompted for in batch mode; the caller must supply
/// them up front.
#[derive(Debug, Default)]
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&mut self, _prompt: &str, _default_answer: bool) -> AppResult<bool> {
        Ok(true)
    }

    fn password(&mut self, _prompt: &str) -> AppResult<String> {
        Ok(String::new())
    }
}
