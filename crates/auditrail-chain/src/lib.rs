//! # auditrail-chain
//!
//! Hash engines, entry signing and storage backends for the audit chain.
//!
//! ## Overview
//!
//! Every event links to its predecessor through `prev_hash`; its own `hash`
//! commits to the canonical event bytes plus that link.  Changing any
//! stored byte breaks either the event's own hash or the link from its
//! successor, and `auditrail_core::verify_chain` reports both.
//!
//! - `Sha256HashEngine` / `ChecksumHashEngine`: the two digest modes
//! - `HmacSigner`: optional HMAC-SHA256 signature per entry
//! - `InMemoryAuditStorage`: bounded ring buffer
//! - `JsonlAuditStorage`: durable JSON-lines file with chain resume
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auditrail_chain::{InMemoryAuditStorage, Sha256HashEngine};
//!
//! let logger = AuditLogger::builder(config)
//!     .hasher(Box::new(Sha256HashEngine))
//!     .storage(Arc::new(InMemoryAuditStorage::new(10_000)))
//!     .policy(Box::new(policy))
//!     .build()?;
//! ```

pub mod chain;
pub mod file;
pub mod memory;

pub use chain::{engine_for, ChecksumHashEngine, HmacSigner, Sha256HashEngine};
pub use file::{read_events, JsonlAuditStorage};
pub use memory::InMemoryAuditStorage;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use auditrail_contracts::{
        config::HashMode,
        event::{AuditEvent, EventType},
        query::QueryFilter,
    };
    use auditrail_core::{
        traits::{AuditStorage, EntrySigner, HashEngine},
        verify_chain, EventBuilder, LogOptions,
    };

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// One chained event per entry in `ages_days`, each that many days old.
    fn make_chain(
        engine: &dyn HashEngine,
        signer: Option<&dyn EntrySigner>,
        ages_days: &[i64],
    ) -> Vec<AuditEvent> {
        let builder = EventBuilder::new("chain-tests");
        let mut prev = String::new();
        let mut events = Vec::new();
        for (step, age) in ages_days.iter().enumerate() {
            let mut event = builder.build(
                EventType::ToolCall,
                LogOptions::new().detail("step", step).trace("t1"),
            );
            event.timestamp = Utc::now() - Duration::days(*age);
            event.prev_hash = prev.clone();
            event.hash = engine.hash_event(&event, &prev).unwrap();
            if let Some(signer) = signer {
                event.signature = Some(signer.sign(&event.hash));
            }
            prev = event.hash.clone();
            events.push(event);
        }
        events
    }

    // ── Hash engines ──────────────────────────────────────────────────────────

    #[test]
    fn test_sha256_digest_vector() {
        assert_eq!(
            Sha256HashEngine.digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_checksum_digest_vector() {
        assert_eq!(ChecksumHashEngine.digest(b""), "cbf29ce484222325");
        assert_eq!(ChecksumHashEngine.digest(b"a"), "af63dc4c8601ec8c");
    }

    #[test]
    fn test_hash_is_deterministic_and_linked() {
        let events = make_chain(&Sha256HashEngine, None, &[0]);
        let event = &events[0];

        let again = Sha256HashEngine.hash_event(event, "").unwrap();
        assert_eq!(again, event.hash);
        assert_eq!(event.hash.len(), 64);

        let other_link = Sha256HashEngine.hash_event(event, "abc").unwrap();
        assert_ne!(other_link, event.hash, "prev_hash must feed the digest");
    }

    #[test]
    fn test_hash_ignores_hash_and_signature_fields() {
        let mut event = make_chain(&Sha256HashEngine, None, &[0]).remove(0);
        let original = event.hash.clone();
        event.hash = "bogus".to_string();
        event.signature = Some("bogus".to_string());
        assert_eq!(Sha256HashEngine.hash_event(&event, "").unwrap(), original);
    }

    #[test]
    fn test_engine_for_mode() {
        assert_eq!(engine_for(HashMode::Sha256).unwrap().mode(), HashMode::Sha256);
        assert_eq!(engine_for(HashMode::Checksum).unwrap().mode(), HashMode::Checksum);
        assert!(engine_for(HashMode::Disabled).is_none());
    }

    #[test]
    fn test_sha256_chain_verifies() {
        let events = make_chain(&Sha256HashEngine, None, &[0, 0, 0]);
        let report = verify_chain(Some(&Sha256HashEngine), None, &events, "");
        assert!(report.valid, "errors: {:?}", report.errors);
        assert!(report.cryptographic);
        assert_eq!(report.mode, HashMode::Sha256);
        assert_eq!(report.checked, 3);
    }

    #[test]
    fn test_checksum_chain_is_labelled_weak() {
        let events = make_chain(&ChecksumHashEngine, None, &[0, 0]);
        let report = verify_chain(Some(&ChecksumHashEngine), None, &events, "");
        assert!(report.valid);
        assert!(!report.cryptographic);
        assert_eq!(report.mode, HashMode::Checksum);
    }

    // ── Signing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_hmac_sign_and_verify() {
        let signer = HmacSigner::new("secret-key").unwrap();
        let signature = signer.sign("deadbeef");

        assert_eq!(signature.len(), 64);
        assert!(signer.verify("deadbeef", &signature));
        assert!(!signer.verify("deadbeee", &signature));
        assert!(!signer.verify("deadbeef", "not-hex"));

        let other = HmacSigner::new("other-key").unwrap();
        assert!(!other.verify("deadbeef", &signature));
    }

    #[test]
    fn test_signed_chain_detects_missing_signature() {
        let signer = HmacSigner::new("k").unwrap();
        let mut events = make_chain(&Sha256HashEngine, Some(&signer), &[0, 0]);

        let report = verify_chain(Some(&Sha256HashEngine), Some(&signer), &events, "");
        assert!(report.valid, "errors: {:?}", report.errors);

        events[1].signature = None;
        let report = verify_chain(Some(&Sha256HashEngine), Some(&signer), &events, "");
        assert_eq!(
            report.errors,
            vec![format!("invalid signature at event {}", events[1].id)]
        );
    }

    // ── In-memory storage ─────────────────────────────────────────────────────

    #[test]
    fn test_memory_tamper_detection() {
        let storage = InMemoryAuditStorage::new(100);
        storage
            .write_batch(&make_chain(&Sha256HashEngine, None, &[0, 0, 0]))
            .unwrap();

        // Directly mutate the internal state to simulate tampering.
        {
            let mut state = storage.state.lock().unwrap();
            state.events[1].details.insert("step".to_string(), json!(99));
        }

        let events = storage.all().unwrap();
        let report = verify_chain(Some(&Sha256HashEngine), None, &events, &storage.anchor().unwrap());
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2, "errors: {:?}", report.errors);
        assert!(report.errors[0].starts_with("hash mismatch"));
        assert!(report.errors[1].starts_with("chain broken"));
    }

    #[test]
    fn test_memory_eviction_moves_anchor() {
        let events = make_chain(&Sha256HashEngine, None, &[0, 0, 0]);
        let storage = InMemoryAuditStorage::new(2);
        storage.write_batch(&events).unwrap();

        assert_eq!(storage.len(), 2);
        assert_eq!(storage.anchor().unwrap(), events[0].hash);
        assert_eq!(storage.tail_hash().unwrap(), Some(events[2].hash.clone()));
        assert!(storage.get(&events[0].id).unwrap().is_none());

        let report = verify_chain(
            Some(&Sha256HashEngine),
            None,
            &storage.all().unwrap(),
            &storage.anchor().unwrap(),
        );
        assert!(report.valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn test_memory_cleanup_removes_old_prefix() {
        let events = make_chain(&Sha256HashEngine, None, &[40, 35, 1]);
        let storage = InMemoryAuditStorage::new(100);
        storage.write_batch(&events).unwrap();

        let deleted = storage.cleanup(Utc::now() - Duration::days(30)).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(storage.anchor().unwrap(), events[1].hash);

        let report = verify_chain(
            Some(&Sha256HashEngine),
            None,
            &storage.all().unwrap(),
            &storage.anchor().unwrap(),
        );
        assert!(report.valid);
    }

    #[test]
    fn test_memory_query_and_count() {
        let storage = InMemoryAuditStorage::default();
        let events = make_chain(&Sha256HashEngine, None, &[3, 2, 1]);
        storage.write_batch(&events).unwrap();

        let newest_first = storage.query(&QueryFilter::new().descending().limit(2)).unwrap();
        assert_eq!(newest_first.len(), 2);
        assert_eq!(newest_first[0].id, events[2].id);
        assert_eq!(newest_first[1].id, events[1].id);

        assert_eq!(storage.count(&QueryFilter::new().trace("t1").limit(1)).unwrap(), 3);
        assert_eq!(storage.count(&QueryFilter::new().trace("t2")).unwrap(), 0);
    }

    // ── JSONL storage ─────────────────────────────────────────────────────────

    #[test]
    fn test_jsonl_roundtrip_and_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("events.jsonl");
        let events = make_chain(&Sha256HashEngine, None, &[0, 0]);

        {
            let storage = JsonlAuditStorage::open(&path).unwrap();
            storage.write_batch(&events).unwrap();
            storage.flush().unwrap();
        }

        let reopened = JsonlAuditStorage::open(&path).unwrap();
        assert_eq!(reopened.all().unwrap(), events);
        assert_eq!(reopened.tail_hash().unwrap(), Some(events[1].hash.clone()));
        assert_eq!(reopened.get(&events[0].id).unwrap().unwrap().id, events[0].id);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with('\n'));
    }

    #[test]
    fn test_jsonl_failed_append_leaves_file_and_memory_in_step() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let events = make_chain(&Sha256HashEngine, None, &[0, 0, 0]);
        let storage = JsonlAuditStorage::open(&path).unwrap();
        storage.write_batch(&events[..2]).unwrap();

        // A read-only handle makes the next flush fail.
        storage.state.lock().unwrap().writer =
            std::io::BufWriter::new(std::fs::File::open(&path).unwrap());
        assert!(storage.write_batch(&events[2..]).is_err());

        assert_eq!(storage.all().unwrap(), events[..2].to_vec());
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);

        // The writer was replaced, so the retry lands exactly once.
        storage.write_batch(&events[2..]).unwrap();
        let reopened = JsonlAuditStorage::open(&path).unwrap();
        assert_eq!(reopened.all().unwrap(), events);
        assert_eq!(storage.all().unwrap(), events);
        let report = verify_chain(Some(&Sha256HashEngine), None, &events, "");
        assert!(report.valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn test_jsonl_rejects_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let events = make_chain(&Sha256HashEngine, None, &[0]);
        let line = serde_json::to_string(&events[0]).unwrap();
        std::fs::write(&path, format!("{}\n{{not json\n", line)).unwrap();

        let err = JsonlAuditStorage::open(&path).err().unwrap();
        assert!(err.to_string().contains("events.jsonl:2"), "got: {}", err);
    }

    #[test]
    fn test_jsonl_cleanup_persists_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let events = make_chain(&Sha256HashEngine, None, &[10, 9, 0]);

        {
            let storage = JsonlAuditStorage::open(&path).unwrap();
            storage.write_batch(&events).unwrap();
            assert_eq!(storage.cleanup(Utc::now() - Duration::days(5)).unwrap(), 2);
            assert_eq!(storage.cleanup(Utc::now() - Duration::days(5)).unwrap(), 0);
        }

        let reopened = JsonlAuditStorage::open(&path).unwrap();
        let remaining = reopened.all().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(reopened.anchor().unwrap(), events[1].hash);

        let report = verify_chain(
            Some(&Sha256HashEngine),
            None,
            &remaining,
            &reopened.anchor().unwrap(),
        );
        assert!(report.valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn test_jsonl_appends_after_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let events = make_chain(&Sha256HashEngine, None, &[10, 0, 0]);

        let storage = JsonlAuditStorage::open(&path).unwrap();
        storage.write_batch(&events[..2]).unwrap();
        storage.cleanup(Utc::now() - Duration::days(5)).unwrap();
        storage.write(&events[2]).unwrap();

        let on_disk = read_events(&path).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk[1].id, events[2].id);
    }
}
