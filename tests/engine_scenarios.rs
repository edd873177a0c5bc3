//! Engine Scenario Tests
//!
//! End-to-end behavior of the metering engine over the in-memory ledger with
//! a manual clock: caps, rolling window, purchased credit, and grants.
//!
//! Run: cargo nextest run --test engine_scenarios

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use usage_meter::prelude::*;
use usage_meter::ledger::{CreditGrant, MemoryLedger};

struct Harness {
    engine: MeterEngine,
    ledger: Arc<MemoryLedger>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let ledger = Arc::new(MemoryLedger::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let engine = MeterEngine::builder()
        .ledger(ledger.clone())
        .clock(clock.clone())
        .build();
    Harness {
        engine,
        ledger,
        clock,
    }
}

fn account(id: &str) -> AccountId {
    AccountId::parse(id).unwrap()
}

async fn start(h: &Harness, id: &str, tier: Tier, mode: Mode, audio: bool) -> StartOutcome {
    h.engine
        .start(StartRequest::new(account(id), tier, mode, audio))
        .await
        .unwrap()
}

async fn tick(
    h: &Harness,
    session_id: SessionId,
    delta: i64,
    tier: Tier,
    mode: Mode,
) -> Result<TickOutcome> {
    h.engine
        .tick(TickRequest::new(session_id, delta, true, tier, mode))
        .await
}

// =============================================================================
// Entitlement Policy
// =============================================================================

mod policy_tests {
    use super::*;

    #[test]
    fn test_session_caps() {
        let policy = EntitlementPolicy::default();
        for tier in Tier::ALL {
            for mode in Mode::ALL {
                let cap = policy.session_cap(tier, mode);
                if tier == Tier::Trial && mode == Mode::Friend {
                    assert_eq!(cap, 600);
                } else {
                    let expected = match mode {
                        Mode::Friend => 900,
                        Mode::Romantic => 1800,
                        Mode::Intimate => 3600,
                        Mode::Unknown => 0,
                    };
                    assert_eq!(cap, expected, "{tier}/{mode}");
                }
            }
        }
        assert_eq!(policy.session_cap(Tier::Trial, Mode::Unknown), 0);
    }

    #[test]
    fn test_monthly_pools() {
        let policy = EntitlementPolicy::default();
        assert_eq!(policy.monthly_pool(Tier::Trial), 600);
        assert_eq!(policy.monthly_pool(Tier::MemberFriend), 900);
        assert_eq!(policy.monthly_pool(Tier::MemberRomantic), 2700);
        assert_eq!(policy.monthly_pool(Tier::MemberIntimate), 6300);
        assert_eq!(policy.monthly_pool(Tier::from("platinum")), 0);
    }
}

// =============================================================================
// Session Lifecycle
// =============================================================================

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_trial_friend_reaches_cap() {
        let h = harness();
        let started = start(&h, "trial", Tier::Trial, Mode::Friend, false).await;
        assert_eq!(started.cap_seconds, 600);

        let outcome = tick(&h, started.session_id, 600, Tier::Trial, Mode::Friend)
            .await
            .unwrap();
        assert_eq!(outcome.remaining_session_seconds, 0);

        let err = tick(&h, started.session_id, 10, Tier::Trial, Mode::Friend)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionCapReached { .. }));
        assert_eq!(err.status_code(), 402);
    }

    #[tokio::test]
    async fn test_remaining_is_monotonic_until_cap() {
        let h = harness();
        let started = start(&h, "steady", Tier::MemberIntimate, Mode::Friend, false).await;

        let mut last_remaining = started.cap_seconds;
        let mut last_active = 0;
        loop {
            match tick(&h, started.session_id, 125, Tier::MemberIntimate, Mode::Friend).await {
                Ok(outcome) => {
                    assert!(outcome.remaining_session_seconds <= last_remaining);
                    last_remaining = outcome.remaining_session_seconds;

                    let status = h.engine.status(&started.session_id).await.unwrap();
                    assert!(status.session.active_seconds >= last_active);
                    last_active = status.session.active_seconds;
                }
                Err(err) => {
                    assert!(matches!(err, Error::SessionCapReached { .. }));
                    break;
                }
            }
        }
        assert_eq!(last_remaining, 0);
        assert_eq!(last_active, 900);
    }

    #[tokio::test]
    async fn test_zero_delta_tick_is_idempotent() {
        let h = harness();
        let started = start(&h, "idle", Tier::MemberFriend, Mode::Friend, false).await;
        tick(&h, started.session_id, 100, Tier::MemberFriend, Mode::Friend)
            .await
            .unwrap();

        let first = tick(&h, started.session_id, 0, Tier::MemberFriend, Mode::Friend)
            .await
            .unwrap();
        let second = tick(&h, started.session_id, 0, Tier::MemberFriend, Mode::Friend)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.remaining_session_seconds, 800);
    }

    #[tokio::test]
    async fn test_unknown_mode_is_not_entitled() {
        let h = harness();
        let err = h
            .engine
            .start(StartRequest::new(
                account("curious"),
                Tier::MemberIntimate,
                Mode::from("villain"),
                false,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotEntitled { .. }));
        assert_eq!(err.status_code(), 403);
        assert_eq!(h.ledger.session_count(), 0);
        assert_eq!(h.ledger.account_count(), 1);
    }

    #[tokio::test]
    async fn test_member_romantic_pool_exhausted_without_text_credit() {
        let h = harness();
        for _ in 0..2 {
            let s = start(&h, "romantic", Tier::MemberRomantic, Mode::Romantic, false).await;
            tick(&h, s.session_id, 1350, Tier::MemberRomantic, Mode::Romantic)
                .await
                .unwrap();
        }
        let summary = h
            .engine
            .summary(&account("romantic"), Tier::MemberRomantic)
            .await
            .unwrap();
        assert_eq!(summary.included_remaining_30d, 0);

        let s = start(&h, "romantic", Tier::MemberRomantic, Mode::Romantic, false).await;
        let err = tick(&h, s.session_id, 10, Tier::MemberRomantic, Mode::Romantic)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::BalanceExhausted {
                channel: Channel::Text,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_audio_session_bills_against_tts_credit() {
        let h = harness();
        let trial = start(&h, "voice", Tier::Trial, Mode::Friend, true).await;
        tick(&h, trial.session_id, 600, Tier::Trial, Mode::Friend)
            .await
            .unwrap();

        h.engine
            .grant(&account("voice"), "tts_15m_499", Channel::Tts)
            .await
            .unwrap();

        let audio = start(&h, "voice", Tier::Trial, Mode::Romantic, true).await;
        assert_eq!(audio.included_remaining_30d, 0);
        assert_eq!(audio.purchased_tts_seconds, 900);
        let outcome = tick(&h, audio.session_id, 60, Tier::Trial, Mode::Romantic)
            .await
            .unwrap();
        assert_eq!(outcome.remaining_session_seconds, 1740);
        // Purchased credit is checked, not drawn down.
        assert_eq!(outcome.purchased_tts_seconds, 900);

        let text = start(&h, "voice", Tier::Trial, Mode::Romantic, false).await;
        assert!(matches!(
            tick(&h, text.session_id, 60, Tier::Trial, Mode::Romantic).await,
            Err(Error::BalanceExhausted { .. })
        ));
    }

    #[tokio::test]
    async fn test_status_and_stop() {
        let h = harness();
        let started = start(&h, "viewer", Tier::MemberFriend, Mode::Friend, false).await;

        let status = h.engine.status(&started.session_id).await.unwrap();
        assert_eq!(status.phase, SessionPhase::Created);
        assert_eq!(status.cap_seconds, 900);

        tick(&h, started.session_id, 30, Tier::MemberFriend, Mode::Friend)
            .await
            .unwrap();
        let status = h.engine.status(&started.session_id).await.unwrap();
        assert_eq!(status.phase, SessionPhase::Active);

        h.clock.advance(Duration::minutes(1));
        let stopped = h.engine.stop(&started.session_id).await.unwrap();
        assert_eq!(stopped.stopped_at, Some(h.clock.now()));
        assert_eq!(stopped.active_seconds, 30);
    }
}

// =============================================================================
// Rolling Window
// =============================================================================

mod window_tests {
    use super::*;

    async fn consume(h: &Harness, id: &str, seconds: i64) {
        let s = start(h, id, Tier::MemberIntimate, Mode::Intimate, false).await;
        tick(h, s.session_id, seconds, Tier::MemberIntimate, Mode::Intimate)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_session_29_days_old_counts_fully() {
        let h = harness();
        consume(&h, "recent", 1000).await;

        h.clock.advance(Duration::days(29));
        let consumed = h
            .engine
            .usage()
            .consumed_in_window(&account("recent"))
            .await
            .unwrap();
        assert_eq!(consumed, 1000);
    }

    #[tokio::test]
    async fn test_session_31_days_old_contributes_nothing() {
        let h = harness();
        consume(&h, "aged", 1000).await;

        h.clock.advance(Duration::days(31));
        let consumed = h
            .engine
            .usage()
            .consumed_in_window(&account("aged"))
            .await
            .unwrap();
        assert_eq!(consumed, 0);

        let summary = h
            .engine
            .summary(&account("aged"), Tier::MemberIntimate)
            .await
            .unwrap();
        assert_eq!(summary.included_remaining_30d, 6300);
    }

    #[tokio::test]
    async fn test_included_never_negative() {
        let h = harness();
        consume(&h, "heavy", 3600).await;
        consume(&h, "heavy", 3600).await;

        let summary = h
            .engine
            .summary(&account("heavy"), Tier::MemberFriend)
            .await
            .unwrap();
        assert_eq!(summary.included_remaining_30d, 0);
    }
}

// =============================================================================
// Credit Grants
// =============================================================================

mod credit_tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_known_and_unknown_sku() {
        let h = harness();
        let outcome = h
            .engine
            .grant(&account("buyer"), "text_30m_299", Channel::Text)
            .await
            .unwrap();
        assert_eq!(outcome.seconds_granted, 1800);
        assert_eq!(outcome.expires_at, h.clock.now() + Duration::days(365));

        let err = h
            .engine
            .grant(&account("buyer"), "bogus", Channel::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSku { .. }));
        assert_eq!(err.status_code(), 400);
        assert_eq!(h.ledger.grant_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_grant_contributes_nothing() {
        let h = harness();
        let issued_at = h.clock.now() - Duration::days(400);
        let stale = CreditGrant::new(
            account("lapsed"),
            Channel::Text,
            "text_60m_599",
            3600,
            issued_at,
            Duration::days(365),
        );
        h.ledger
            .upsert_account(&account("lapsed"), Tier::Trial, issued_at)
            .await
            .unwrap();
        h.ledger.insert_grant(&stale).await.unwrap();

        let balance = h
            .engine
            .usage()
            .purchased_balance(&account("lapsed"), Channel::Text)
            .await
            .unwrap();
        assert_eq!(balance, 0);
        assert_eq!(stale.seconds_remaining, 3600);
    }

    #[tokio::test]
    async fn test_balances_sum_per_channel() {
        let h = harness();
        let buyer = account("collector");
        for sku in ["text_15m_099", "text_30m_299"] {
            h.engine.grant(&buyer, sku, Channel::Text).await.unwrap();
        }
        h.engine
            .grant(&buyer, "tts_60m_1499", Channel::Tts)
            .await
            .unwrap();

        let balances = h.engine.usage().balances(&buyer).await.unwrap();
        assert_eq!(balances.text, 2700);
        assert_eq!(balances.tts, 3600);
    }
}
