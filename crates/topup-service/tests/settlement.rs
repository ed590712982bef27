//! Settlement engine integration tests: redemption, batch issuance and
//! code administration against the in-memory store.

mod common;

use std::sync::Arc;

use common::Engines;
use futures::future::join_all;

use topup_core::{BatchSpec, LogCategory, RedemptionStatus, UserId};
use topup_service::settlement::{RedemptionUpdate, UpdateMode};
use topup_service::SettlementError;
use topup_store::{FaultPoint, Store};

// ============================================================================
// Redemption
// ============================================================================

#[tokio::test]
async fn redeem_credits_quota_and_marks_used() {
    let engines = Engines::new();
    let user_id = engines.add_user("a@example.com").await;
    let record = engines.add_code(100).await;

    let credited = engines.redemptions.redeem(&record.code, user_id).await.unwrap();

    assert_eq!(credited, 100);
    assert_eq!(engines.quota(&user_id).await, 100);
    let stored = engines.store.get_redemption(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RedemptionStatus::Used);
    assert!(stored.redeemed_at.is_some());

    let entries = engines.audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].user_id, user_id);
    assert_eq!(entries[0].category, LogCategory::Topup);
    assert!(entries[0].message.contains("$0.000200"));
}

#[tokio::test]
async fn second_redemption_is_rejected() {
    let engines = Engines::new();
    let first = engines.add_user("a@example.com").await;
    let second = engines.add_user("b@example.com").await;
    let record = engines.add_code(100).await;

    engines.redemptions.redeem(&record.code, first).await.unwrap();
    let err = engines.redemptions.redeem(&record.code, second).await.unwrap_err();

    assert!(matches!(err, SettlementError::CodeAlreadyUsed));
    assert_eq!(engines.quota(&second).await, 0);
    assert_eq!(engines.audit.entries().len(), 1);
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let engines = Engines::new();
    let user_id = engines.add_user("a@example.com").await;

    let err = engines
        .redemptions
        .redeem("0123456789abcdef0123456789abcdef", user_id)
        .await
        .unwrap_err();

    assert!(matches!(err, SettlementError::CodeNotFound));
}

#[tokio::test]
async fn redeem_validates_input() {
    let engines = Engines::new();
    let user_id = engines.add_user("a@example.com").await;
    let record = engines.add_code(100).await;

    assert!(matches!(
        engines.redemptions.redeem("", user_id).await,
        Err(SettlementError::InvalidInput(_))
    ));
    assert!(matches!(
        engines.redemptions.redeem(&record.code, UserId::nil()).await,
        Err(SettlementError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn disabled_code_cannot_be_redeemed() {
    let engines = Engines::new();
    let admin = engines.add_user("admin@example.com").await;
    let user_id = engines.add_user("a@example.com").await;
    let record = engines.add_code(100).await;

    engines
        .redemptions
        .update(
            RedemptionUpdate {
                id: record.id,
                name: None,
                status: Some(RedemptionStatus::Disabled),
                quota_value: None,
            },
            UpdateMode::StatusOnly,
            admin,
        )
        .await
        .unwrap();

    let err = engines.redemptions.redeem(&record.code, user_id).await.unwrap_err();
    assert!(matches!(err, SettlementError::CodeAlreadyUsed));
    assert_eq!(engines.quota(&user_id).await, 0);
}

#[tokio::test]
async fn redeem_for_missing_account_rolls_back() {
    let engines = Engines::new();
    let record = engines.add_code(100).await;

    let err = engines
        .redemptions
        .redeem(&record.code, UserId::generate())
        .await
        .unwrap_err();

    assert!(matches!(err, SettlementError::AccountNotFound(_)));
    assert!(!err.is_retryable());
    let stored = engines.store.get_redemption(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RedemptionStatus::Enabled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemption_of_one_code_succeeds_once() {
    let engines = Engines::new();
    let record = engines.add_code(250).await;

    let mut users = Vec::new();
    for i in 0..32 {
        users.push(engines.add_user(&format!("user{i}@example.com")).await);
    }

    let engine = Arc::new(engines.redemptions.clone());
    let attempts = users.iter().map(|user_id| {
        let engine = Arc::clone(&engine);
        let code = record.code.clone();
        let user_id = *user_id;
        tokio::spawn(async move { engine.redeem(&code, user_id).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, SettlementError::CodeAlreadyUsed)));

    let mut total = 0;
    for user_id in &users {
        total += engines.quota(user_id).await;
    }
    assert_eq!(total, 250);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_of_distinct_codes_all_succeed() {
    let engines = Engines::new();
    let user_id = engines.add_user("a@example.com").await;

    let mut codes = Vec::new();
    for _ in 0..20 {
        codes.push(engines.add_code(10).await.code);
    }

    let engine = Arc::new(engines.redemptions.clone());
    let attempts = codes.into_iter().map(|code| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.redeem(&code, user_id).await })
    });
    for joined in join_all(attempts).await {
        assert_eq!(joined.expect("task panicked").unwrap(), 10);
    }

    assert_eq!(engines.quota(&user_id).await, 200);
}

// ============================================================================
// Failure injection
// ============================================================================

#[tokio::test]
async fn failure_between_credit_and_status_update_leaves_no_credit() {
    let engines = Engines::new();
    let user_id = engines.add_user("a@example.com").await;
    let record = engines.add_code(100).await;
    engines.store.inject_fault(FaultPoint::SaveRedemption, 0);

    let err = engines.redemptions.redeem(&record.code, user_id).await.unwrap_err();

    assert!(matches!(err, SettlementError::RedemptionFailed(_)));
    assert!(err.is_retryable());
    assert_eq!(engines.quota(&user_id).await, 0);
    let stored = engines.store.get_redemption(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RedemptionStatus::Enabled);
    assert!(stored.redeemed_at.is_none());
    assert!(engines.audit.entries().is_empty());

    // The lock was released and the retry succeeds.
    assert_eq!(
        engines.redemptions.redeem(&record.code, user_id).await.unwrap(),
        100
    );
    assert_eq!(engines.quota(&user_id).await, 100);
}

#[tokio::test]
async fn commit_failure_leaves_no_credit() {
    let engines = Engines::new();
    let user_id = engines.add_user("a@example.com").await;
    let record = engines.add_code(100).await;
    engines.store.inject_fault(FaultPoint::Commit, 0);

    let err = engines.redemptions.redeem(&record.code, user_id).await.unwrap_err();

    assert!(matches!(err, SettlementError::RedemptionFailed(_)));
    assert_eq!(engines.quota(&user_id).await, 0);
    let stored = engines.store.get_redemption(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RedemptionStatus::Enabled);
}

#[tokio::test]
async fn increment_failure_leaves_record_enabled() {
    let engines = Engines::new();
    let user_id = engines.add_user("a@example.com").await;
    let record = engines.add_code(100).await;
    engines.store.inject_fault(FaultPoint::IncrementQuota, 0);

    assert!(engines.redemptions.redeem(&record.code, user_id).await.is_err());

    let stored = engines.store.get_redemption(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RedemptionStatus::Enabled);
    assert_eq!(engines.quota(&user_id).await, 0);
}

// ============================================================================
// Batch issuance
// ============================================================================

fn batch(name: &str, count: i64, quota_value: i64) -> BatchSpec {
    BatchSpec {
        name: name.into(),
        count,
        quota_value,
    }
}

#[tokio::test]
async fn issue_batch_creates_unique_enabled_codes() {
    let engines = Engines::new();
    let issuer = UserId::generate();

    let codes = engines
        .redemptions
        .issue_batch(&batch("promo", 5, 100), issuer)
        .await
        .unwrap();

    assert_eq!(codes.len(), 5);
    let unique: std::collections::HashSet<_> = codes.iter().collect();
    assert_eq!(unique.len(), 5);

    let records = engines.store.list_redemptions(10, 0).await.unwrap();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.status == RedemptionStatus::Enabled
        && r.quota_value == 100
        && r.name == "promo"
        && r.owner_user_id == issuer
        && r.redeemed_at.is_none()));
}

#[tokio::test]
async fn batch_lists_newest_first_in_issue_order() {
    let engines = Engines::new();

    let mut codes = engines
        .redemptions
        .issue_batch(&batch("promo", 50, 100), UserId::generate())
        .await
        .unwrap();

    let listed: Vec<String> = engines
        .store
        .list_redemptions(50, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.code)
        .collect();
    codes.reverse();
    assert_eq!(listed, codes);
}

#[tokio::test]
async fn issue_batch_rejects_bad_counts() {
    let engines = Engines::new();
    let issuer = UserId::generate();

    for count in [0, 101] {
        let err = engines
            .redemptions
            .issue_batch(&batch("promo", count, 100), issuer)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInput(_)), "count {count}");
    }
    assert_eq!(engines.store.redemption_count().unwrap(), 0);
}

#[tokio::test]
async fn issue_batch_rejects_bad_names() {
    let engines = Engines::new();
    let issuer = UserId::generate();

    for name in ["", "this-name-is-longer-than-twenty"] {
        let err = engines
            .redemptions
            .issue_batch(&batch(name, 5, 100), issuer)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInput(_)));
    }
    assert_eq!(engines.store.redemption_count().unwrap(), 0);
}

#[tokio::test]
async fn partial_issue_returns_codes_issued_so_far() {
    let engines = Engines::new();
    engines.store.inject_fault(FaultPoint::InsertRedemption, 3);

    let err = engines
        .redemptions
        .issue_batch(&batch("promo", 10, 100), UserId::generate())
        .await
        .unwrap_err();

    match err {
        SettlementError::PartialIssue { issued, .. } => {
            assert_eq!(issued.len(), 3);
            let records = engines.store.list_redemptions(10, 0).await.unwrap();
            assert_eq!(records.len(), 3);
            assert!(records.iter().all(|r| issued.contains(&r.code)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Administration
// ============================================================================

#[tokio::test]
async fn used_code_can_be_disabled_but_not_reenabled() {
    let engines = Engines::new();
    let admin = UserId::generate();
    let user_id = engines.add_user("a@example.com").await;
    let record = engines.add_code(100).await;
    engines.redemptions.redeem(&record.code, user_id).await.unwrap();

    let status = |status| RedemptionUpdate {
        id: record.id,
        name: None,
        status: Some(status),
        quota_value: None,
    };

    let disabled = engines
        .redemptions
        .update(status(RedemptionStatus::Disabled), UpdateMode::StatusOnly, admin)
        .await
        .unwrap();
    assert_eq!(disabled.status, RedemptionStatus::Disabled);
    assert!(disabled.redeemed_at.is_some());

    let err = engines
        .redemptions
        .update(status(RedemptionStatus::Enabled), UpdateMode::StatusOnly, admin)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::PreconditionFailed(_)));

    let manage_entries = engines
        .audit
        .entries()
        .into_iter()
        .filter(|e| e.category == LogCategory::Manage)
        .count();
    assert_eq!(manage_entries, 1);
}

#[tokio::test]
async fn rename_keeps_quota_value() {
    let engines = Engines::new();
    let record = engines.add_code(100).await;

    let updated = engines
        .redemptions
        .update(
            RedemptionUpdate {
                id: record.id,
                name: Some("renamed".into()),
                status: None,
                quota_value: Some(100),
            },
            UpdateMode::Details,
            UserId::generate(),
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.quota_value, 100);
    assert_eq!(updated.code, record.code);
}

#[tokio::test]
async fn delete_removes_record() {
    let engines = Engines::new();
    let user_id = engines.add_user("a@example.com").await;
    let record = engines.add_code(100).await;

    engines.redemptions.delete(&record.id, UserId::generate()).await.unwrap();

    assert!(engines.store.get_redemption(&record.id).await.unwrap().is_none());
    assert!(matches!(
        engines.redemptions.redeem(&record.code, user_id).await,
        Err(SettlementError::CodeNotFound)
    ));
    assert!(matches!(
        engines.redemptions.delete(&record.id, UserId::generate()).await,
        Err(SettlementError::CodeNotFound)
    ));
}
