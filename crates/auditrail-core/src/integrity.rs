//! Hash-chain integrity verification.
//!
//! Rules, checked for every event in order:
//!
//! 1. **Hash correctness**: the stored `hash` equals the value recomputed
//!    from the event's own fields and `prev_hash`.
//! 2. **Linkage**: the first event's `prev_hash` equals the anchor; every
//!    later event's `prev_hash` equals both the stored and the recomputed
//!    hash of its predecessor.  Checking both means that editing an event's
//!    content *or* its `hash` field also breaks the link to its successor.
//! 3. **Signature**: when a signer is supplied, each event carries a valid
//!    signature of its stored hash.
//!
//! A failed verification is a normal outcome: every finding is collected
//! into the report instead of aborting on the first mismatch.

use tracing::{debug, warn};

use auditrail_contracts::{config::HashMode, event::AuditEvent, query::VerificationReport};

use crate::traits::{EntrySigner, HashEngine};

/// Verify `events` as a contiguous slice of one chain starting at `anchor`.
///
/// Pass an empty anchor for a chain that starts at its first event, or the
/// storage anchor after eviction/cleanup.  An empty slice is valid.  With
/// no `engine` (tamper detection disabled) nothing can be verified and the
/// report is invalid with mode `Disabled`.
pub fn verify_chain(
    engine: Option<&dyn HashEngine>,
    signer: Option<&dyn EntrySigner>,
    events: &[AuditEvent],
    anchor: &str,
) -> VerificationReport {
    let Some(engine) = engine else {
        return VerificationReport {
            valid: false,
            errors: vec![
                "tamper detection is disabled; events carry no hashes to verify".to_string(),
            ],
            mode: HashMode::Disabled,
            cryptographic: false,
            checked: 0,
        };
    };

    let mode = engine.mode();
    let mut errors = Vec::new();
    // (stored hash, recomputed hash) of the previous event.
    let mut previous: Option<(&str, Option<String>)> = None;

    for event in events {
        let recomputed = match engine.hash_event(event, &event.prev_hash) {
            Ok(hash) => Some(hash),
            Err(e) => {
                errors.push(format!("cannot recompute hash of event {}: {}", event.id, e));
                None
            }
        };

        if let Some(recomputed) = &recomputed {
            if *recomputed != event.hash {
                errors.push(format!("hash mismatch at event {}", event.id));
            }
        }

        match &previous {
            None => {
                if event.prev_hash != anchor {
                    errors.push(format!(
                        "chain broken at event {}: prev_hash does not match anchor '{}'",
                        event.id, anchor
                    ));
                }
            }
            Some((stored, recomputed_prev)) => {
                let matches_stored = event.prev_hash == *stored;
                let matches_recomputed = recomputed_prev
                    .as_deref()
                    .map_or(true, |h| h == event.prev_hash);
                if !matches_stored || !matches_recomputed {
                    errors.push(format!(
                        "chain broken at event {}: prev_hash does not match previous event",
                        event.id
                    ));
                }
            }
        }

        if let Some(signer) = signer {
            let signed = event
                .signature
                .as_deref()
                .is_some_and(|sig| signer.verify(&event.hash, sig));
            if !signed {
                errors.push(format!("invalid signature at event {}", event.id));
            }
        }

        previous = Some((event.hash.as_str(), recomputed));
    }

    let valid = errors.is_empty();
    if valid {
        debug!(checked = events.len(), mode = mode.as_str(), "hash chain verified");
    } else {
        warn!(
            checked = events.len(),
            findings = errors.len(),
            mode = mode.as_str(),
            "hash chain verification failed"
        );
    }

    VerificationReport {
        valid,
        errors,
        mode,
        cryptographic: mode.is_cryptographic(),
        checked: events.len(),
    }
}
