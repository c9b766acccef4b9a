//! Tamper classification
//!
//! Turns a failed verification into a user-facing explanation: was the
//! signature itself damaged, or did the document change after signing?
//!
//! This is a heuristic. A failed RSA check cannot tell the two cases apart
//! cryptographically; the classification only reads the structured cause, or
//! failing that, keywords in the diagnostic text. Do not present it as
//! forensic evidence.

use crate::sig::{MismatchCause, Verification};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TamperKind {
    SignatureTampered,
    ContentTampered,
    Undetermined,
}

impl TamperKind {
    pub fn describe(&self) -> &'static str {
        match self {
            TamperKind::SignatureTampered => "the signature has been corrupted or altered",
            TamperKind::ContentTampered => "the content changed after it was signed",
            TamperKind::Undetermined => "the signature does not match",
        }
    }
}

/// Keyword classification of a diagnostic message.
///
/// Digest/hash wording wins over signature wording, since digest mismatch
/// messages also mention the signed digest.
pub fn classify_diagnostic(diagnostic: &str) -> TamperKind {
    let lower = diagnostic.to_lowercase();

    if lower.contains("hash") || lower.contains("digest") {
        TamperKind::ContentTampered
    } else if lower.contains("signature") {
        TamperKind::SignatureTampered
    } else {
        TamperKind::Undetermined
    }
}

/// Classifies a verification result. Valid results are `None`.
pub fn classify(verification: &Verification) -> Option<TamperKind> {
    if verification.valid {
        return None;
    }

    Some(match verification.cause {
        Some(MismatchCause::SignatureOutOfRange) | Some(MismatchCause::SignatureLength) => {
            TamperKind::SignatureTampered
        }
        Some(MismatchCause::DigestMismatch) => TamperKind::ContentTampered,
        None => classify_diagnostic(&verification.diagnostic),
    })
}
