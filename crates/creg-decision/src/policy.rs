use creg_schemas::{category, Decision, MatchReport, MatchSignal, MatchValue};

/// Exact-identity categories. Any hit rejects the submission as a duplicate.
pub const HARD_CATEGORIES: &[&str] = &[
    category::INCORPORATION_NUMBER,
    category::REGISTRATION_NUMBER,
];

/// Similarity categories. Any hit routes the submission to a reviewer.
pub const SOFT_CATEGORIES: &[&str] = &[
    category::LEGAL_NAME,
    category::INDIVIDUAL,
    category::CONTACT,
    category::LOCATION,
    category::DOING_BUSINESS_AS,
];

fn is_hard(s: &MatchSignal) -> bool {
    HARD_CATEGORIES.contains(&s.field.as_str())
}

fn is_soft(s: &MatchSignal) -> bool {
    SOFT_CATEGORIES.contains(&s.field.as_str())
}

fn is_standing_advisory(s: &MatchSignal) -> bool {
    s.field == category::GOOD_STANDING && s.has_advisory()
}

/// Map aggregated signals to a decision.
///
/// Precedence: hard identity → good-standing advisory → soft similarity →
/// auto-approve. Evidence keeps the input order of contributing signals.
pub fn decide(signals: &[MatchSignal]) -> Decision {
    let live = signals.iter().filter(|s| !s.is_empty());

    let hard: Vec<MatchSignal> = live.clone().filter(|s| is_hard(s)).cloned().collect();
    if !hard.is_empty() {
        return Decision::RejectDuplicate { evidence: hard };
    }

    let review: Vec<MatchSignal> = live
        .filter(|s| is_standing_advisory(s) || is_soft(s))
        .cloned()
        .collect();
    if !review.is_empty() {
        return Decision::NeedsReview { evidence: review };
    }

    Decision::AutoApprove
}

/// [`decide`] over a full report.
///
/// An incomplete report never auto-approves: the gap is surfaced to a
/// reviewer under [`category::MATCHER_UNAVAILABLE`]. A hard duplicate still
/// rejects.
pub fn decide_report(report: &MatchReport) -> Decision {
    let decision = decide(&report.signals);
    if report.is_complete() {
        return decision;
    }

    let gap = MatchSignal {
        field: category::MATCHER_UNAVAILABLE.to_string(),
        values: report
            .failures
            .iter()
            .map(|f| MatchValue::Advisory(f.matcher.clone()))
            .collect(),
    };

    match decision {
        Decision::RejectDuplicate { .. } => decision,
        Decision::NeedsReview { mut evidence } => {
            evidence.push(gap);
            Decision::NeedsReview { evidence }
        }
        Decision::AutoApprove | Decision::RejectInvalid => {
            Decision::NeedsReview { evidence: vec![gap] }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creg_schemas::MatcherFailure;

    #[test]
    fn zero_signals_auto_approve() {
        assert_eq!(decide(&[]), Decision::AutoApprove);
        assert_eq!(
            decide(&[MatchSignal::empty(category::LEGAL_NAME)]),
            Decision::AutoApprove
        );
    }

    #[test]
    fn hard_beats_soft() {
        let d = decide(&[
            MatchSignal::records(category::LEGAL_NAME, ["00000005"]),
            MatchSignal::records(category::REGISTRATION_NUMBER, ["00000011"]),
            MatchSignal::advisory(category::GOOD_STANDING, "client not in good standing"),
        ]);
        assert_eq!(d.as_str(), "REJECT_DUPLICATE");
        assert_eq!(d.matched_ids(), vec!["00000011"]);
    }

    #[test]
    fn standing_advisory_alone_needs_review() {
        let d = decide(&[MatchSignal::advisory(
            category::GOOD_STANDING,
            "client not in good standing",
        )]);
        assert_eq!(d.as_str(), "NEEDS_REVIEW");
        assert!(d.matched_ids().is_empty());
    }

    #[test]
    fn soft_signals_carry_all_contributing_categories() {
        let d = decide(&[
            MatchSignal::records(category::LEGAL_NAME, ["00000005"]),
            MatchSignal::records(category::LOCATION, ["00000005", "00000008"]),
        ]);
        assert_eq!(d.ids_for(category::LEGAL_NAME), vec!["00000005"]);
        assert_eq!(d.ids_for(category::LOCATION), vec!["00000005", "00000008"]);
        assert_eq!(d.evidence().len(), 2);
    }

    #[test]
    fn unknown_category_is_ignored() {
        let d = decide(&[MatchSignal::records("somethingElse", ["1"])]);
        assert_eq!(d, Decision::AutoApprove);
    }

    #[test]
    fn incomplete_report_never_auto_approves() {
        let report = MatchReport {
            signals: vec![],
            failures: vec![MatcherFailure {
                matcher: "legal_name".into(),
                reason: "timed out after 5000ms".into(),
            }],
        };
        let d = decide_report(&report);
        assert_eq!(d.as_str(), "NEEDS_REVIEW");
        assert_eq!(d.evidence()[0].field, category::MATCHER_UNAVAILABLE);
    }

    #[test]
    fn incomplete_report_still_rejects_hard_duplicate() {
        let report = MatchReport {
            signals: vec![MatchSignal::records(
                category::INCORPORATION_NUMBER,
                ["00000011"],
            )],
            failures: vec![MatcherFailure {
                matcher: "location".into(),
                reason: "search transport error".into(),
            }],
        };
        assert_eq!(decide_report(&report).as_str(), "REJECT_DUPLICATE");
    }
}
