//! Trust prompts for certificates no validator accepted.
//!
//! The coordinator sits between the [`TrustAuthority`] and whatever asks the
//! user. Every full rejection becomes one prompt; an affirmative answer is
//! written to the store and the chain is rebuilt so the next handshake
//! succeeds. The handshake that triggered the prompt is never retried here.

use certtrust_core::{
    Certificate, CertificateSummary, Fingerprint, Result, TrustDecision,
};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::authority::{RejectionReceiver, TrustAuthority};

/// Event channel depth; slow subscribers miss the oldest events.
const EVENT_CAPACITY: usize = 64;

/// Asks a human whether to trust a certificate.
///
/// Implementations must return promptly and answer later through the
/// responder. Dropping the responder unanswered counts as a rejection.
pub trait TrustPrompt: Send + Sync {
    fn request_trust_decision(&self, summary: CertificateSummary, responder: DecisionResponder);
}

impl<F> TrustPrompt for F
where
    F: Fn(CertificateSummary, DecisionResponder) + Send + Sync,
{
    fn request_trust_decision(&self, summary: CertificateSummary, responder: DecisionResponder) {
        self(summary, responder);
    }
}

/// Single-use answer handle for one prompt.
#[derive(Debug)]
pub struct DecisionResponder(oneshot::Sender<TrustDecision>);

impl DecisionResponder {
    pub fn respond(self, decision: TrustDecision) {
        if self.0.send(decision).is_err() {
            debug!(?decision, "trust decision arrived after the coordinator stopped");
        }
    }

    pub fn accept(self) {
        self.respond(TrustDecision::Accepted);
    }

    pub fn reject(self) {
        self.respond(TrustDecision::Rejected);
    }
}

/// A prompt that has been shown and not yet answered.
#[derive(Debug)]
pub struct PendingDecision {
    certificate: Certificate,
    summary: CertificateSummary,
    answer: oneshot::Receiver<TrustDecision>,
}

impl PendingDecision {
    #[must_use]
    pub const fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    #[must_use]
    pub const fn summary(&self) -> &CertificateSummary {
        &self.summary
    }

    /// Wait for the answer.
    pub async fn wait(self) -> (Certificate, TrustDecision) {
        let decision = self.answer.await.unwrap_or_else(|_| {
            debug!(
                fingerprint = %self.certificate.fingerprint().short(),
                "trust prompt dismissed without an answer"
            );
            TrustDecision::Rejected
        });
        (self.certificate, decision)
    }
}

/// Something the presentation layer may want to tell the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrustEvent {
    /// A prompt was handed to the collaborator
    PromptRequested {
        fingerprint: Fingerprint,
        summary: CertificateSummary,
    },
    /// The certificate could not be summarized so nobody was asked
    PromptAbandoned { fingerprint: Fingerprint, reason: String },
    /// The user accepted and the certificate is now trusted
    CertificateTrusted { fingerprint: Fingerprint, subject: String },
    /// The user declined
    CertificateRejected { fingerprint: Fingerprint },
    /// The user accepted but the certificate could not be stored
    TrustFailed { fingerprint: Fingerprint, reason: String },
}

/// Turns full rejections into prompts and answers into trust.
pub struct TrustDecisionCoordinator {
    authority: Arc<TrustAuthority>,
    prompt: Arc<dyn TrustPrompt>,
    events: broadcast::Sender<TrustEvent>,
}

impl TrustDecisionCoordinator {
    pub fn new(authority: Arc<TrustAuthority>, prompt: impl TrustPrompt + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            authority,
            prompt: Arc::new(prompt),
            events,
        }
    }

    /// Receive events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrustEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: TrustEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Ask the collaborator about a leaf every validator rejected.
    ///
    /// Returns without waiting for the answer. `None` when the certificate
    /// cannot be summarized; the prompt is then dropped silently.
    pub fn on_full_rejection(&self, leaf: Certificate) -> Option<PendingDecision> {
        let summary = match CertificateSummary::from_certificate(&leaf) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(
                    fingerprint = %leaf.fingerprint().short(),
                    error = %e,
                    "cannot prompt for certificate"
                );
                self.emit(TrustEvent::PromptAbandoned {
                    fingerprint: leaf.fingerprint().clone(),
                    reason: e.to_string(),
                });
                return None;
            }
        };

        let (tx, rx) = oneshot::channel();
        debug!(subject = %summary.subject, "requesting trust decision");
        self.prompt
            .request_trust_decision(summary.clone(), DecisionResponder(tx));
        self.emit(TrustEvent::PromptRequested {
            fingerprint: leaf.fingerprint().clone(),
            summary: summary.clone(),
        });

        Some(PendingDecision {
            certificate: leaf,
            summary,
            answer: rx,
        })
    }

    /// Trust the certificate and rebuild the chain.
    pub fn on_accept(&self, certificate: Certificate) -> Result<Fingerprint> {
        let subject = certificate.subject().to_string();
        let fingerprint = certificate.fingerprint().clone();

        match self.authority.trust(certificate) {
            Ok(fingerprint) => {
                info!(
                    subject = %subject,
                    fingerprint = %fingerprint.short(),
                    "user trusted certificate"
                );
                self.emit(TrustEvent::CertificateTrusted {
                    fingerprint: fingerprint.clone(),
                    subject,
                });
                Ok(fingerprint)
            }
            Err(e) => {
                warn!(subject = %subject, error = %e, "could not trust certificate");
                self.emit(TrustEvent::TrustFailed {
                    fingerprint,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// The user declined; nothing changes.
    pub fn on_reject(&self, certificate: &Certificate) {
        debug!(fingerprint = %certificate.fingerprint().short(), "user declined certificate");
        self.emit(TrustEvent::CertificateRejected {
            fingerprint: certificate.fingerprint().clone(),
        });
    }

    /// Apply one answer.
    pub fn resolve(&self, certificate: Certificate, decision: TrustDecision) {
        match decision {
            TrustDecision::Accepted => {
                // failures are already reported as TrustFailed
                let _ = self.on_accept(certificate);
            }
            TrustDecision::Rejected => self.on_reject(&certificate),
        }
    }

    /// Prompt for every rejected leaf and apply answers as they arrive.
    ///
    /// Identical leaves are not deduplicated; each rejection gets its own
    /// prompt. Runs until every rejection sender is dropped, then waits for
    /// outstanding prompts. Embedders usually spawn it and abort the task on
    /// shutdown.
    pub async fn run(&self, mut rejections: RejectionReceiver) {
        let mut pending = FuturesUnordered::new();

        loop {
            tokio::select! {
                leaf = rejections.recv() => match leaf {
                    Some(leaf) => {
                        if let Some(decision) = self.on_full_rejection(leaf) {
                            pending.push(decision.wait());
                        }
                    }
                    None => break,
                },
                Some((certificate, decision)) = pending.next(), if !pending.is_empty() => {
                    self.resolve(certificate, decision);
                }
            }
        }

        debug!(outstanding = pending.len(), "rejection channel closed");
        while let Some((certificate, decision)) = pending.next().await {
            self.resolve(certificate, decision);
        }
    }
}

impl fmt::Debug for TrustDecisionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustDecisionCoordinator")
            .field("authority", &self.authority)
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}
