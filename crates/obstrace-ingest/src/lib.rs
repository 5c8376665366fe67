//! The Ingestion Contract & Persistence Core: payload parsing,
//! validation, and the `submit_run` orchestration.

pub mod payload;
pub mod service;
pub mod validate;

pub use payload::RunPayload;
pub use service::{IngestService, SubmitOutcome};
pub use validate::validate_run_payload;

#[cfg(test)]
mod tests {
    use super::*;
    use obstrace_store::Store;
    use std::sync::Arc;

    fn minimal_payload_json(run_id: &str) -> serde_json::Value {
        serde_json::json!({
            "run_id": run_id,
            "agent_id": "agent-a",
            "agent_version": "1.0.0",
            "environment": "production",
            "status": "success",
            "started_at": "2026-01-01T00:00:00Z",
            "ended_at": "2026-01-01T00:00:01Z",
            "steps": [
                {
                    "step_id": "11111111-1111-1111-1111-111111111111",
                    "seq": 0,
                    "step_type": "plan",
                    "name": "p",
                    "latency_ms": 10,
                    "started_at": "2026-01-01T00:00:00Z",
                    "ended_at": "2026-01-01T00:00:00.5Z",
                    "metadata": {}
                }
            ],
            "failure": null,
            "decisions": [],
            "quality_signals": []
        })
    }

    #[test]
    fn rejects_non_contiguous_seq() {
        let mut value = minimal_payload_json("22222222-2222-2222-2222-222222222222");
        value["steps"][0]["seq"] = serde_json::json!(1);
        let payload: RunPayload = serde_json::from_value(value).unwrap();
        assert!(validate_run_payload(payload).is_err());
    }

    #[test]
    fn rejects_blocked_metadata_key() {
        let mut value = minimal_payload_json("33333333-3333-3333-3333-333333333333");
        value["steps"][0]["metadata"] = serde_json::json!({"prompt": "leak"});
        let payload: RunPayload = serde_json::from_value(value).unwrap();
        assert!(validate_run_payload(payload).is_err());
    }

    #[test]
    fn failure_status_without_failure_object_is_rejected() {
        let mut value = minimal_payload_json("44444444-4444-4444-4444-444444444444");
        value["status"] = serde_json::json!("failure");
        let payload: RunPayload = serde_json::from_value(value).unwrap();
        assert!(validate_run_payload(payload).is_err());
    }

    #[tokio::test]
    async fn submit_is_idempotent() {
        let store = Arc::new(Store::connect_in_memory().await.unwrap());
        let service = IngestService::new(store);

        let value = minimal_payload_json("55555555-5555-5555-5555-555555555555");
        let payload: RunPayload = serde_json::from_value(value.clone()).unwrap();
        let payload_again: RunPayload = serde_json::from_value(value).unwrap();

        let first = service.submit_run(payload).await.unwrap();
        assert!(matches!(first, SubmitOutcome::Created(_)));

        let second = service.submit_run(payload_again).await.unwrap();
        assert!(matches!(second, SubmitOutcome::Replayed(_)));
    }

    fn payload_with_steps(run_id: &str, seqs: &[u32]) -> serde_json::Value {
        let mut value = minimal_payload_json(run_id);
        let steps: Vec<serde_json::Value> = seqs
            .iter()
            .enumerate()
            .map(|(i, seq)| {
                serde_json::json!({
                    "step_id": uuid::Uuid::new_v4(),
                    "seq": seq,
                    "step_type": "plan",
                    "name": format!("step-{i}"),
                    "latency_ms": 10,
                    "started_at": "2026-01-01T00:00:00Z",
                    "ended_at": "2026-01-01T00:00:00.5Z",
                    "metadata": {}
                })
            })
            .collect();
        value["steps"] = serde_json::json!(steps);
        value
    }

    proptest::proptest! {
        /// `{0, ..., n-1}` in any order is a contiguous sequence; step
        /// arrival order in the payload must not matter. Reversal and a
        /// rotation both exercise orderings other than already-sorted.
        #[test]
        fn permuted_contiguous_seq_validates(n in 1u32..16, rotate_by in 0u32..16) {
            let rotate_by = rotate_by % n.max(1);
            let mut seqs: Vec<u32> = (0..n).collect();
            seqs.rotate_left(rotate_by as usize);
            let value = payload_with_steps("66666666-6666-6666-6666-666666666666", &seqs);
            let payload: RunPayload = serde_json::from_value(value).unwrap();
            proptest::prop_assert!(validate_run_payload(payload).is_ok());

            seqs.reverse();
            let value = payload_with_steps("66666666-6666-6666-6666-666666666667", &seqs);
            let payload: RunPayload = serde_json::from_value(value).unwrap();
            proptest::prop_assert!(validate_run_payload(payload).is_ok());
        }

        /// A seq sequence with a duplicate (so some value in `0..n` is
        /// missing) is never contiguous and is always rejected.
        #[test]
        fn seq_with_a_duplicate_is_rejected(n in 2u32..16) {
            let mut seqs: Vec<u32> = (0..n).collect();
            seqs[0] = seqs[1];
            let value = payload_with_steps("77777777-7777-7777-7777-777777777777", &seqs);
            let payload: RunPayload = serde_json::from_value(value).unwrap();
            proptest::prop_assert!(validate_run_payload(payload).is_err());
        }
    }
}
