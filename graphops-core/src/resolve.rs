//! Assertion resolution: picking the single winning claim per conceptual
//! fact.
//!
//! Given a multiset of [`AssertionRecord`]s sharing one `assertion_key`,
//! resolution applies a total ordering where every step is a strict
//! tiebreaker feeding the next:
//!
//! 1. temporal filter (`valid_from ≤ as_of < valid_to`)
//! 2. scenario preference (target scenario shadows `base`)
//! 3. manual override (`source_type = manual` beats everything)
//! 4. authority (minimum `authority_rank`; unknown sources rank last)
//! 5. recency (maximum `recorded_at`)
//! 6. confidence (maximum `confidence`)
//! 7. deterministic tiebreak (lexicographically smallest `assertion_id`)
//!
//! The algorithm is pure: it never consults the clock, and its result is
//! independent of input order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::model::{AssertionRecord, SourceType, BASE_SCENARIO};

/// Parameters of one resolution pass.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Target scenario; `"base"` selects reality.
    pub scenario_id: &'a str,
    /// Point in time the reader asks about.
    pub as_of: DateTime<Utc>,
    /// `source_id` → `authority_rank` (lower = higher priority).
    pub authority: &'a HashMap<String, i64>,
}

/// Why a temporally-valid assertion lost resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LossReason {
    /// A record in the target scenario shadowed this base/foreign record.
    ScenarioShadowed,
    /// A manual record overrode this one.
    ManualOverride,
    /// A higher-authority source (lower rank) won.
    LowerAuthority,
    /// A more recently recorded claim from equal authority won.
    OlderRecord,
    /// An equally recent claim with higher confidence won.
    LowerConfidence,
    /// Lost the final assertion-id tiebreak.
    TieBreak,
}

/// One record of the all-claims view, annotated with its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedAssertion {
    #[serde(flatten)]
    pub record: AssertionRecord,
    pub is_winner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost: Option<LossReason>,
}

fn in_validity(record: &AssertionRecord, as_of: DateTime<Utc>) -> bool {
    record.valid_from <= as_of && record.valid_to.map_or(true, |end| as_of < end)
}

fn rank_of(record: &AssertionRecord, ctx: &ResolveContext<'_>) -> i64 {
    record
        .source_id
        .as_ref()
        .and_then(|sid| ctx.authority.get(sid).copied())
        .unwrap_or(i64::MAX)
}

/// Run the elimination chain over temporally-valid records.
///
/// Returns the winner (if any) and, for every loser, the step at which it
/// was eliminated.
fn eliminate<'a>(
    valid: &[&'a AssertionRecord],
    ctx: &ResolveContext<'_>,
) -> (Option<&'a AssertionRecord>, HashMap<&'a str, LossReason>) {
    let mut lost: HashMap<&str, LossReason> = HashMap::new();
    if valid.is_empty() {
        return (None, lost);
    }

    // Step 2: scenario preference.
    let in_target: Vec<&AssertionRecord> = valid
        .iter()
        .copied()
        .filter(|r| r.scenario_id == ctx.scenario_id)
        .collect();
    let survivors: Vec<&AssertionRecord> = if !in_target.is_empty() {
        in_target
    } else {
        valid
            .iter()
            .copied()
            .filter(|r| r.scenario_id == BASE_SCENARIO)
            .collect()
    };
    for r in valid {
        if !survivors.iter().any(|s| s.assertion_id == r.assertion_id) {
            lost.insert(&r.assertion_id, LossReason::ScenarioShadowed);
        }
    }
    if survivors.is_empty() {
        return (None, lost);
    }

    // Step 3: manual override.
    let survivors = shrink(survivors, &mut lost, LossReason::ManualOverride, |set| {
        let manual: Vec<_> = set
            .iter()
            .copied()
            .filter(|r| r.source_type == SourceType::Manual)
            .collect();
        if manual.is_empty() { set.to_vec() } else { manual }
    });

    // Step 4: authority.
    let survivors = shrink(survivors, &mut lost, LossReason::LowerAuthority, |set| {
        let best = set.iter().map(|r| rank_of(r, ctx)).min().unwrap();
        set.iter().copied().filter(|r| rank_of(r, ctx) == best).collect()
    });

    // Step 5: recency.
    let survivors = shrink(survivors, &mut lost, LossReason::OlderRecord, |set| {
        let newest = set.iter().map(|r| r.recorded_at).max().unwrap();
        set.iter().copied().filter(|r| r.recorded_at == newest).collect()
    });

    // Step 6: confidence.
    let survivors = shrink(survivors, &mut lost, LossReason::LowerConfidence, |set| {
        let best = set
            .iter()
            .map(|r| r.confidence)
            .fold(f64::NEG_INFINITY, f64::max);
        set.iter().copied().filter(|r| r.confidence == best).collect()
    });

    // Step 7: deterministic tiebreak by smallest assertion id.
    let winner = survivors
        .iter()
        .copied()
        .min_by(|a, b| a.assertion_id.cmp(&b.assertion_id))
        .unwrap();
    for r in survivors {
        if r.assertion_id != winner.assertion_id {
            lost.insert(&r.assertion_id, LossReason::TieBreak);
        }
    }
    (Some(winner), lost)
}

fn shrink<'a>(
    set: Vec<&'a AssertionRecord>,
    lost: &mut HashMap<&'a str, LossReason>,
    reason: LossReason,
    keep: impl Fn(&[&'a AssertionRecord]) -> Vec<&'a AssertionRecord>,
) -> Vec<&'a AssertionRecord> {
    let kept = keep(&set);
    for r in &set {
        if !kept.iter().any(|k| k.assertion_id == r.assertion_id) {
            lost.insert(&r.assertion_id, reason);
        }
    }
    kept
}

/// Resolve one assertion-key group to at most one winner.
pub fn resolve<'a>(
    records: &'a [AssertionRecord],
    ctx: &ResolveContext<'_>,
) -> Option<&'a AssertionRecord> {
    let valid: Vec<&AssertionRecord> =
        records.iter().filter(|r| in_validity(r, ctx.as_of)).collect();
    eliminate(&valid, ctx).0
}

/// Resolve a mixed set of records, grouped by `assertion_key`.
///
/// Returns `assertion_key → winner` for every key that has one.
pub fn resolve_groups<'a>(
    records: &'a [AssertionRecord],
    ctx: &ResolveContext<'_>,
) -> HashMap<&'a str, &'a AssertionRecord> {
    let mut grouped: HashMap<&str, Vec<&AssertionRecord>> = HashMap::new();
    for r in records {
        if in_validity(r, ctx.as_of) {
            grouped.entry(&r.assertion_key).or_default().push(r);
        }
    }
    grouped
        .into_iter()
        .filter_map(|(key, group)| eliminate(&group, ctx).0.map(|w| (key, w)))
        .collect()
}

/// All-claims view: every record passing the temporal filter, annotated
/// with winner/loser status and the reason it lost.
pub fn annotate(records: &[AssertionRecord], ctx: &ResolveContext<'_>) -> Vec<AnnotatedAssertion> {
    let mut grouped: HashMap<&str, Vec<&AssertionRecord>> = HashMap::new();
    for r in records {
        if in_validity(r, ctx.as_of) {
            grouped.entry(&r.assertion_key).or_default().push(r);
        }
    }

    let mut out = Vec::new();
    for group in grouped.values() {
        let (winner, lost) = eliminate(group, ctx);
        let winner_id = winner.map(|w| w.assertion_id.as_str());
        for r in group {
            let is_winner = winner_id == Some(r.assertion_id.as_str());
            out.push(AnnotatedAssertion {
                record: (*r).clone(),
                is_winner,
                lost: if is_winner {
                    None
                } else {
                    Some(
                        lost.get(r.assertion_id.as_str())
                            .copied()
                            .unwrap_or(LossReason::TieBreak),
                    )
                },
            });
        }
    }
    // Deterministic output order regardless of map iteration.
    out.sort_by(|a, b| {
        a.record
            .assertion_key
            .cmp(&b.record.assertion_key)
            .then_with(|| a.record.assertion_id.cmp(&b.record.assertion_id))
    });
    out
}
