// tests/spam_daily_reset.rs
//
// Repetition counting across a UTC day, driven by an injected clock.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use ticker_sentiment::analyze::{AntiSpamParams, DailyState, SpamFilter, SpamReason};
use ticker_sentiment::clock::ManualClock;
use ticker_sentiment::ingest::normalize;
use ticker_sentiment::ingest::types::{NormalizedMessage, RawMessage};

fn message(id: usize, author: &str, body: &str) -> NormalizedMessage {
    normalize(&RawMessage {
        ticker: "TSLA".into(),
        author_id: author.into(),
        body: body.into(),
        timestamp: Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        source_id: format!("m{id}"),
    })
}

fn filter_at(h: u32) -> (SpamFilter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 10, h, 0, 0).unwrap(),
    ));
    let params = AntiSpamParams {
        repetition_threshold: 3,
        ..Default::default()
    };
    (SpamFilter::new(params, clock.clone()), clock)
}

#[test]
fn fourth_copy_in_a_day_is_spam_and_resets_after_midnight() {
    let (f, clock) = filter_at(20);
    let mut state = DailyState::new();
    let body = "Loading up on more shares before earnings";

    let verdicts: Vec<_> = (0..4)
        .map(|i| f.classify(&message(i, &format!("u{i}"), body), &mut state))
        .collect();
    assert!(verdicts[..3].iter().all(|v| !v.is_spam));
    assert!(verdicts[3].is_spam);
    assert_eq!(verdicts[3].reason, Some(SpamReason::Repetition));

    // Still the same day: stays spam.
    clock.advance(Duration::hours(3)); // 23:00
    assert!(f.classify(&message(5, "u5", body), &mut state).is_spam);

    // Past the UTC boundary the counter starts over.
    clock.advance(Duration::hours(2)); // 01:00 next day
    let v = f.classify(&message(6, "u6", body), &mut state);
    assert!(!v.is_spam);
    assert_eq!(v.reason, None);
}

#[test]
fn punctuation_and_case_variants_share_a_fingerprint() {
    let (f, _) = filter_at(9);
    let mut state = DailyState::new();
    let variants = [
        "Buy the dip, NOW.",
        "buy the dip now",
        "BUY... the DIP!! now",
        "<b>buy</b> the dip &amp; now",
    ];
    let last = variants
        .iter()
        .enumerate()
        .map(|(i, b)| f.classify(&message(i, &format!("u{i}"), b), &mut state))
        .last()
        .unwrap();
    // "&amp;" decodes to "&", which the canonical form drops.
    assert_eq!(last.reason, Some(SpamReason::Repetition));
}

#[test]
fn explicit_reset_clears_counters() {
    let (f, _) = filter_at(9);
    let mut state = DailyState::new();
    let body = "same copy pasted hype";
    for i in 0..4 {
        f.classify(&message(i, "a", body), &mut state);
    }
    assert!(state.tracked_fingerprints() > 0);
    state.reset();
    assert_eq!(state.tracked_fingerprints(), 0);
    assert!(!f.classify(&message(9, "a", body), &mut state).is_spam);
}

#[test]
fn author_volume_trips_source_heuristic() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
    ));
    let params = AntiSpamParams {
        author_daily_cap: 5,
        source_heuristic_threshold: 0.8,
        ..Default::default()
    };
    let f = SpamFilter::new(params, clock);
    let mut state = DailyState::new();
    let bodies = [
        "first distinct take on deliveries",
        "second opinion about the margins",
        "third thought regarding energy storage",
        "fourth note on the robotaxi event",
        "fifth remark about china sales figures",
    ];
    let verdicts: Vec<_> = bodies
        .iter()
        .enumerate()
        .map(|(i, b)| f.classify(&message(i, "firehose", b), &mut state))
        .collect();
    // 4/5 = 0.8 is not above the threshold, 5/5 is.
    assert!(!verdicts[3].is_spam);
    assert_eq!(verdicts[4].reason, Some(SpamReason::SourceHeuristic));
}
