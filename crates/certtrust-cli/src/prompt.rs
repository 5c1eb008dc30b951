//! Terminal implementation of the trust prompt.

use certtrust::{DecisionResponder, TrustDecision, TrustPrompt};
use certtrust_core::CertificateSummary;
use dialoguer::Confirm;
use tracing::warn;

use crate::output::print_summary;

/// How the terminal prompt answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Ask on the terminal
    Ask,
    /// Answer without asking
    Fixed(TrustDecision),
}

/// Asks on stdin/stderr. The question runs on a blocking thread so the
/// coordinator never waits on the terminal.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPrompt {
    mode: PromptMode,
}

impl TerminalPrompt {
    #[must_use]
    pub const fn new(mode: PromptMode) -> Self {
        Self { mode }
    }
}

impl TrustPrompt for TerminalPrompt {
    fn request_trust_decision(&self, summary: CertificateSummary, responder: DecisionResponder) {
        match self.mode {
            PromptMode::Fixed(decision) => responder.respond(decision),
            PromptMode::Ask => {
                tokio::task::spawn_blocking(move || {
                    print_summary(&summary);
                    match Confirm::new()
                        .with_prompt("Trust this certificate from now on?")
                        .default(false)
                        .interact()
                    {
                        Ok(true) => responder.accept(),
                        Ok(false) => responder.reject(),
                        Err(e) => {
                            warn!(
                                error = %e,
                                "could not read an answer, leaving certificate untrusted"
                            );
                            drop(responder);
                        }
                    }
                });
            }
        }
    }
}
