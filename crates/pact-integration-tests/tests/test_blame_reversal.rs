//! # Blame Reversal — End-to-End Integration Tests
//!
//! Runs deals to completion through the real engine/watcher wiring, then
//! overturns their outcomes with blame documents and checks that the
//! justice snapshot taken at decision time is what activation measures
//! against — not the deciding judge's justice as it stands later.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};

use pact_core::{BlameMark, DealId, DealStage, SideKind, UserId, Winner};
use pact_engine::DealEngine;
use pact_ledger::MemoryLedger;
use pact_watcher::TimeoutWatcher;

struct Stack {
    engine: Arc<DealEngine>,
}

fn stack() -> Stack {
    let ledger = Arc::new(MemoryLedger::new());
    let engine = Arc::new(DealEngine::new(ledger.clone()));
    let watcher = TimeoutWatcher::new(ledger, engine.clone()).unwrap();
    engine.bind_scheduler(Arc::new(watcher));
    Stack { engine }
}

fn deadline_in_millis(ms: i64) -> String {
    (Utc::now() + chrono::Duration::milliseconds(ms))
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drive one deal from creation to its terminal stage, decided by `judge`.
async fn settled_deal(
    stack: &Stack,
    red: &UserId,
    blue_handle: &str,
    blue: &UserId,
    judge: &UserId,
    winner: Winner,
) -> DealId {
    let deal_id = stack
        .engine
        .create_deal(red, "terms", &deadline_in_millis(200))
        .unwrap();
    stack.engine.offer_deal(&deal_id, blue_handle, false).unwrap();
    stack
        .engine
        .accept_deal(blue, &deal_id, SideKind::Blue)
        .unwrap();
    stack.engine.judge_accept(judge, &deal_id).unwrap();
    stack.engine.judge_decide(judge, &deal_id, winner).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        stack.engine.deal(&deal_id).unwrap().stage().unwrap(),
        DealStage::TimedOut
    );
    deal_id
}

#[tokio::test(flavor = "multi_thread")]
async fn activated_blame_overturns_a_ruling_and_its_scores() {
    let stack = stack();
    let alice = stack
        .engine
        .register_user("Alice", "Arden", "alice", false)
        .unwrap();
    let bob = stack
        .engine
        .register_user("Bob", "Breck", "bob", false)
        .unwrap();
    let ruling_judge = stack
        .engine
        .register_user("June", "Gavel", "june", true)
        .unwrap();
    let blamer = stack
        .engine
        .register_user("Britt", "Stern", "britt", true)
        .unwrap();

    // The ruling under scrutiny. Its justice snapshot is 0: June had no
    // decision history when she ruled.
    let disputed = settled_deal(&stack, &alice, "bob", &bob, &ruling_judge, Winner::Red).await;
    assert_eq!(stack.engine.deal(&disputed).unwrap().justice_count, 0);
    assert_eq!(stack.engine.success_score(&alice).unwrap(), 2);

    // Britt builds standing by deciding an unrelated deal.
    settled_deal(&stack, &alice, "bob", &bob, &blamer, Winner::Blue).await;
    assert_eq!(stack.engine.justice_score(&blamer).unwrap(), 2);

    // Britt's 2 pooled justice clears the snapshot of 0; the ruling flips.
    let blame = stack
        .engine
        .create_blame(&blamer, &disputed, "the ruling ignored the delivery logs")
        .unwrap();
    stack.engine.activate_blame(&blamer, &blame).unwrap();

    let disputed_doc = stack.engine.deal(&disputed).unwrap();
    assert_eq!(disputed_doc.blame, Some(BlameMark::Yes));

    // Alice's win inverted, Bob's loss inverted, June's credibility paid.
    assert_eq!(stack.engine.success_score(&alice).unwrap(), -2);
    assert_eq!(stack.engine.justice_score(&ruling_judge).unwrap(), -4);
    // Britt earned credit for the successful blame document.
    assert_eq!(stack.engine.justice_score(&blamer).unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshot_justice_keeps_later_standing_out_of_the_threshold() {
    let stack = stack();
    let alice = stack
        .engine
        .register_user("Alice", "Arden", "alice", false)
        .unwrap();
    let bob = stack
        .engine
        .register_user("Bob", "Breck", "bob", false)
        .unwrap();
    let veteran = stack
        .engine
        .register_user("Vera", "Gavel", "vera", true)
        .unwrap();
    let challenger = stack
        .engine
        .register_user("Cal", "Stern", "cal", true)
        .unwrap();

    // Vera decides a first deal with zero history, then a second one with
    // justice 2. The snapshots differ even though both are her rulings.
    let first = settled_deal(&stack, &alice, "bob", &bob, &veteran, Winner::Red).await;
    let second = settled_deal(&stack, &alice, "bob", &bob, &veteran, Winner::Red).await;
    assert_eq!(stack.engine.deal(&first).unwrap().justice_count, 0);
    assert_eq!(stack.engine.deal(&second).unwrap().justice_count, 2);
    assert_eq!(stack.engine.justice_score(&veteran).unwrap(), 4);

    // Cal's standing of 2 clears the first ruling's snapshot of 0. Vera's
    // current justice of 4 never enters the comparison.
    settled_deal(&stack, &alice, "bob", &bob, &challenger, Winner::Blue).await;
    let blame_first = stack
        .engine
        .create_blame(&challenger, &first, "wrongly decided")
        .unwrap();
    stack.engine.activate_blame(&challenger, &blame_first).unwrap();
    assert_eq!(
        stack.engine.deal(&first).unwrap().blame,
        Some(BlameMark::Yes)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn blaming_a_blame_restores_the_original_outcome() {
    let stack = stack();
    let alice = stack
        .engine
        .register_user("Alice", "Arden", "alice", false)
        .unwrap();
    let bob = stack
        .engine
        .register_user("Bob", "Breck", "bob", false)
        .unwrap();
    let ruling_judge = stack
        .engine
        .register_user("June", "Gavel", "june", true)
        .unwrap();
    let blamer = stack
        .engine
        .register_user("Britt", "Stern", "britt", true)
        .unwrap();

    let disputed = settled_deal(&stack, &alice, "bob", &bob, &ruling_judge, Winner::Red).await;
    settled_deal(&stack, &alice, "bob", &bob, &blamer, Winner::Blue).await;

    let blame = stack
        .engine
        .create_blame(&blamer, &disputed, "bad ruling")
        .unwrap();
    stack.engine.activate_blame(&blamer, &blame).unwrap();
    assert_eq!(
        stack.engine.deal(&disputed).unwrap().blame,
        Some(BlameMark::Yes)
    );

    // The reversed ruling costs June 4 justice, so she needs three clean
    // rulings before she can stake a counter-blame. Then the walk passes
    // through the blame document and restores the original outcome.
    for _ in 0..3 {
        settled_deal(&stack, &alice, "bob", &bob, &ruling_judge, Winner::Red).await;
    }
    assert_eq!(stack.engine.justice_score(&ruling_judge).unwrap(), 2);
    let counter = stack
        .engine
        .create_blame(&ruling_judge, &blame, "the blame was retaliatory")
        .unwrap();
    stack.engine.activate_blame(&ruling_judge, &counter).unwrap();

    assert_eq!(
        stack.engine.deal(&blame).unwrap().blame,
        Some(BlameMark::Yes)
    );
    assert_eq!(
        stack.engine.deal(&disputed).unwrap().blame,
        Some(BlameMark::No)
    );
    // disputed (+2), Britt's standing deal (-2), three recovery deals (+6).
    assert_eq!(stack.engine.success_score(&alice).unwrap(), 6);
}
