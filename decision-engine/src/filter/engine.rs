//! Hard/soft filter evaluation, priority scoring and ranking.
//!
//! Pure over (candidates, configuration); the only ambient input is the check
//! instant, which the caller passes in or the configuration carries.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::geo;
use super::hours;
use super::types::{
    Candidate, FilterConfiguration, FilterCriteria, FilterItem, FilterReport, FilterResult,
    HardFilterOutcome, RelaxationSuggestion, SoftFilterOutcome, TagMatch,
};
use crate::error::{DecisionError, EngineResult};

/// Stateless filter engine
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEngine;

impl FilterEngine {
    pub fn new() -> Self {
        Self
    }

    /// Reject configurations that cannot be evaluated.
    pub fn validate(&self, configuration: &FilterConfiguration) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for filter in &configuration.filters {
            if !seen.insert(filter.id.as_str()) {
                return Err(DecisionError::invalid_filter(&filter.id, "duplicate filter id"));
            }
            if let FilterCriteria::Location {
                max_distance_km, ..
            } = &filter.criteria
            {
                if !max_distance_km.is_finite() || *max_distance_km < 0.0 {
                    return Err(DecisionError::invalid_filter(
                        &filter.id,
                        format!("radius must be a non-negative number, got {max_distance_km}"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Evaluate every candidate. One result per candidate, input order.
    pub fn evaluate(
        &self,
        candidates: &[Candidate],
        configuration: &FilterConfiguration,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<FilterResult>> {
        self.validate(configuration)?;
        let at = configuration.check_time.unwrap_or(now);
        let soft_filters = configuration.soft_filters_by_priority();

        Ok(candidates
            .iter()
            .map(|candidate| self.evaluate_candidate(candidate, configuration, &soft_filters, at))
            .collect())
    }

    /// Evaluate, rank the admissible set and, if it is empty, suggest relaxations.
    pub fn apply(
        &self,
        candidates: &[Candidate],
        configuration: &FilterConfiguration,
        now: DateTime<Utc>,
    ) -> EngineResult<FilterReport> {
        let results = self.evaluate(candidates, configuration, now)?;

        let (mut admissible, rejected): (Vec<FilterResult>, Vec<FilterResult>) =
            results.into_iter().partition(|r| r.passed_hard_filters);
        rank(&mut admissible);

        let relaxation = if admissible.is_empty() && !rejected.is_empty() {
            relaxation_suggestions(&rejected, configuration)
        } else {
            Vec::new()
        };

        info!(
            candidates = candidates.len(),
            admissible = admissible.len(),
            rejected = rejected.len(),
            "Filters applied"
        );

        Ok(FilterReport {
            admissible,
            rejected,
            relaxation,
        })
    }

    fn evaluate_candidate(
        &self,
        candidate: &Candidate,
        configuration: &FilterConfiguration,
        soft_filters: &[&FilterItem],
        at: DateTime<Utc>,
    ) -> FilterResult {
        let hard_results: Vec<_> = configuration
            .hard_filters()
            .map(|filter| HardFilterOutcome {
                filter_id: filter.id.clone(),
                passed: matches(filter, candidate, at),
            })
            .collect();
        let passed_hard_filters = hard_results.iter().all(|r| r.passed);

        if !passed_hard_filters {
            debug!(candidate = %candidate.id, "Rejected by hard filter");
            return FilterResult {
                candidate_id: candidate.id.clone(),
                hard_results,
                passed_hard_filters,
                soft_results: Vec::new(),
                violation_count: 0,
                priority_score: 0.0,
            };
        }

        let soft_results: Vec<_> = soft_filters
            .iter()
            .map(|filter| SoftFilterOutcome {
                filter_id: filter.id.clone(),
                priority: filter.priority,
                passed: matches(filter, candidate, at),
            })
            .collect();

        let violation_count = soft_results.iter().filter(|r| !r.passed).count() as u32;
        let priority_score = priority_score(&soft_results);

        FilterResult {
            candidate_id: candidate.id.clone(),
            hard_results,
            passed_hard_filters,
            soft_results,
            violation_count,
            priority_score,
        }
    }
}

/// Weighted fraction of passed soft filters; 1.0 when there are none.
pub fn priority_score(outcomes: &[SoftFilterOutcome]) -> f64 {
    let (earned, total) = outcomes.iter().fold((0.0, 0.0), |(earned, total), o| {
        let weight = 1.0 / (f64::from(o.priority) + 1.0);
        let earned = if o.passed { earned + weight } else { earned };
        (earned, total + weight)
    });

    if total == 0.0 {
        1.0
    } else {
        earned / total
    }
}

/// Score desc, violations asc, candidate id asc.
pub fn rank(results: &mut [FilterResult]) {
    results.sort_by(|a, b| {
        b.priority_score
            .partial_cmp(&a.priority_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.violation_count.cmp(&b.violation_count))
            .then_with(|| a.candidate_id.cmp(&b.candidate_id))
    });
}

fn relaxation_suggestions(
    rejected: &[FilterResult],
    configuration: &FilterConfiguration,
) -> Vec<RelaxationSuggestion> {
    let mut rejected_counts: HashMap<&str, usize> = HashMap::new();
    let mut restorable_counts: HashMap<&str, usize> = HashMap::new();

    for result in rejected {
        let failed: Vec<&str> = result.failed_hard_filters().collect();
        for id in &failed {
            *rejected_counts.entry(*id).or_insert(0) += 1;
        }
        if let [only] = failed.as_slice() {
            *restorable_counts.entry(*only).or_insert(0) += 1;
        }
    }

    let mut suggestions: Vec<RelaxationSuggestion> = configuration
        .hard_filters()
        .filter_map(|filter| {
            let rejected_count = *rejected_counts.get(filter.id.as_str())?;
            Some(RelaxationSuggestion {
                filter_id: filter.id.clone(),
                description: filter.description.clone(),
                rejected_count,
                restorable_count: restorable_counts
                    .get(filter.id.as_str())
                    .copied()
                    .unwrap_or(0),
            })
        })
        .collect();

    suggestions.sort_by(|a, b| {
        b.restorable_count
            .cmp(&a.restorable_count)
            .then_with(|| a.filter_id.cmp(&b.filter_id))
    });
    suggestions
}

fn contains_ignore_case(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|h| h.eq_ignore_ascii_case(needle))
}

/// Whether `candidate` satisfies one filter. Missing or malformed candidate
/// data passes.
fn matches(filter: &FilterItem, candidate: &Candidate, at: DateTime<Utc>) -> bool {
    match &filter.criteria {
        FilterCriteria::Category { include, exclude } => match &candidate.category {
            Some(category) => {
                (include.is_empty() || contains_ignore_case(include, category))
                    && !contains_ignore_case(exclude, category)
            }
            None => include.is_empty(),
        },
        FilterCriteria::Dietary { required } => required
            .iter()
            .all(|tag| contains_ignore_case(&candidate.dietary_tags, tag)),
        FilterCriteria::Location {
            center,
            max_distance_km,
        } => match candidate.location {
            Some(point) => geo::within_radius(*center, point, *max_distance_km),
            None => true,
        },
        FilterCriteria::RecentActivity {
            exclude_within_days,
        } => match candidate.last_selected_at {
            Some(last) => last <= at - Duration::days(i64::from(*exclude_within_days)),
            None => true,
        },
        FilterCriteria::OpeningHours => match hours::is_open_at(
            candidate.business_hours.as_ref(),
            candidate.timezone.as_deref(),
            at,
        ) {
            Ok(open) => open,
            Err(e) => {
                warn!(
                    candidate = %candidate.id,
                    filter = %filter.id,
                    error = %e,
                    "Malformed opening hours, treating as open"
                );
                true
            }
        },
        FilterCriteria::Tag { tags, mode } => match mode {
            TagMatch::Any => tags.iter().any(|t| contains_ignore_case(&candidate.tags, t)),
            TagMatch::All => tags.iter().all(|t| contains_ignore_case(&candidate.tags, t)),
            TagMatch::None => !tags.iter().any(|t| contains_ignore_case(&candidate.tags, t)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::{BusinessHours, GeoPoint, OpeningPeriod};
    use chrono::{TimeZone, Weekday};

    fn now() -> DateTime<Utc> {
        // Monday
        Utc.with_ymd_and_hms(2026, 3, 2, 19, 0, 0).unwrap()
    }

    fn restaurants() -> Vec<Candidate> {
        vec![
            Candidate::new("r1", "Green Bowl")
                .with_category("salad")
                .with_dietary(&["vegan", "vegetarian"])
                .with_tags(&["quiet", "outdoor"]),
            Candidate::new("r2", "Smoke House")
                .with_category("bbq")
                .with_tags(&["loud"]),
            Candidate::new("r3", "Pasta Piu")
                .with_category("italian")
                .with_dietary(&["vegetarian"])
                .with_tags(&["quiet"]),
            Candidate::new("r4", "Noodle Bar")
                .with_category("asian")
                .with_dietary(&["vegetarian"])
                .with_tags(&["outdoor"]),
        ]
    }

    fn tag(id: &str, priority: u32, tags: &[&str]) -> FilterItem {
        FilterItem::soft(
            id,
            priority,
            FilterCriteria::Tag {
                tags: tags.iter().map(|t| t.to_string()).collect(),
                mode: TagMatch::Any,
            },
        )
    }

    #[test]
    fn test_zero_soft_filters_scores_one() {
        let config = FilterConfiguration::new(vec![FilterItem::hard(
            "veg",
            FilterCriteria::Dietary {
                required: vec!["vegetarian".to_string()],
            },
        )]);
        let report = FilterEngine::new()
            .apply(&restaurants(), &config, now())
            .unwrap();

        assert_eq!(report.admissible.len(), 3);
        assert!(report.admissible.iter().all(|r| r.priority_score == 1.0));
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].candidate_id, "r2");
        assert!(report.relaxation.is_empty());
        // All tied on score and violations: id order
        assert_eq!(report.admissible_ids(), vec!["r1", "r3", "r4"]);
    }

    #[test]
    fn test_weighted_scoring_and_ranking() {
        let config = FilterConfiguration::new(vec![
            tag("quiet", 0, &["quiet"]),
            tag("outdoor", 1, &["outdoor"]),
        ]);
        let report = FilterEngine::new()
            .apply(&restaurants(), &config, now())
            .unwrap();

        // Weights: quiet 1.0, outdoor 0.5, total 1.5
        let by_id: HashMap<&str, &FilterResult> = report
            .admissible
            .iter()
            .map(|r| (r.candidate_id.as_str(), r))
            .collect();
        assert_eq!(by_id["r1"].priority_score, 1.0);
        assert!((by_id["r3"].priority_score - 1.0 / 1.5).abs() < 1e-12);
        assert!((by_id["r4"].priority_score - 0.5 / 1.5).abs() < 1e-12);
        assert_eq!(by_id["r2"].priority_score, 0.0);
        assert_eq!(by_id["r2"].violation_count, 2);

        assert_eq!(report.admissible_ids(), vec!["r1", "r3", "r4", "r2"]);
        // Soft outcomes ordered by priority
        assert_eq!(by_id["r1"].soft_results[0].filter_id, "quiet");
    }

    #[test]
    fn test_score_non_increasing_with_violations() {
        let outcomes = |passes: [bool; 3]| -> Vec<SoftFilterOutcome> {
            passes
                .iter()
                .enumerate()
                .map(|(i, p)| SoftFilterOutcome {
                    filter_id: format!("f{i}"),
                    priority: i as u32,
                    passed: *p,
                })
                .collect()
        };
        let zero = priority_score(&outcomes([true, true, true]));
        let one = priority_score(&outcomes([true, true, false]));
        let two = priority_score(&outcomes([true, false, false]));
        let three = priority_score(&outcomes([false, false, false]));
        assert!(zero >= one && one >= two && two >= three);
        assert_eq!(zero, 1.0);
        assert_eq!(three, 0.0);
    }

    #[test]
    fn test_relaxation_when_everything_rejected() {
        let config = FilterConfiguration::new(vec![
            FilterItem::hard(
                "vegan",
                FilterCriteria::Dietary {
                    required: vec!["vegan".to_string()],
                },
            )
            .with_description("Vegan only"),
            FilterItem::hard(
                "no-salad",
                FilterCriteria::Category {
                    include: vec![],
                    exclude: vec!["salad".to_string()],
                },
            ),
        ]);
        let report = FilterEngine::new()
            .apply(&restaurants(), &config, now())
            .unwrap();

        assert!(report.is_empty());
        assert_eq!(report.rejected.len(), 4);
        // r2..r4 fail only "vegan"; r1 fails only "no-salad"
        assert_eq!(report.relaxation.len(), 2);
        assert_eq!(report.relaxation[0].filter_id, "vegan");
        assert_eq!(report.relaxation[0].restorable_count, 3);
        assert_eq!(report.relaxation[0].description, "Vegan only");
        assert_eq!(report.relaxation[1].filter_id, "no-salad");
        assert_eq!(report.relaxation[1].restorable_count, 1);
    }

    #[test]
    fn test_location_filter_fails_open_without_coordinates() {
        let berlin = GeoPoint::new(52.52, 13.405);
        let candidates = vec![
            Candidate::new("near", "Near").with_location(52.53, 13.41),
            Candidate::new("far", "Far").with_location(48.8566, 2.3522),
            Candidate::new("unknown", "Unknown"),
        ];
        let config = FilterConfiguration::new(vec![FilterItem::hard(
            "radius",
            FilterCriteria::Location {
                center: berlin,
                max_distance_km: 10.0,
            },
        )]);
        let report = FilterEngine::new()
            .apply(&candidates, &config, now())
            .unwrap();
        assert_eq!(report.admissible_ids(), vec!["near", "unknown"]);
    }

    #[test]
    fn test_recent_activity_and_opening_hours() {
        let hours = BusinessHours {
            periods: vec![OpeningPeriod::new(Weekday::Mon, "11:00", "22:00")],
        };
        let candidates = vec![
            Candidate::new("fresh", "Fresh").with_hours(hours.clone(), Some("UTC")),
            Candidate::new("stale", "Stale").with_last_selected(now() - Duration::days(2)),
            Candidate::new("closed", "Closed").with_hours(hours, Some("Asia/Tokyo")),
        ];
        let config = FilterConfiguration::new(vec![
            FilterItem::hard(
                "not-recent",
                FilterCriteria::RecentActivity {
                    exclude_within_days: 7,
                },
            ),
            FilterItem::hard("open", FilterCriteria::OpeningHours),
        ]);
        let report = FilterEngine::new()
            .apply(&candidates, &config, now())
            .unwrap();
        // 19:00 UTC Monday is 04:00 Tuesday in Tokyo
        assert_eq!(report.admissible_ids(), vec!["fresh"]);

        let later = config.clone().at(now() + Duration::days(14));
        let results = FilterEngine::new()
            .evaluate(&candidates, &later, now())
            .unwrap();
        // Two weeks later is also a Monday, 19:00 UTC
        assert!(results[1].passed_hard_filters);
    }

    #[test]
    fn test_duplicate_filter_ids_rejected() {
        let config = FilterConfiguration::new(vec![
            tag("dup", 0, &["quiet"]),
            tag("dup", 1, &["loud"]),
        ]);
        let err = FilterEngine::new()
            .apply(&restaurants(), &config, now())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_FILTER");
    }

    #[test]
    fn test_tag_modes() {
        let candidate = Candidate::new("c", "C").with_tags(&["quiet", "Outdoor"]);
        let filter = |mode| {
            FilterItem::soft(
                "t",
                0,
                FilterCriteria::Tag {
                    tags: vec!["outdoor".to_string(), "wifi".to_string()],
                    mode,
                },
            )
        };
        assert!(matches(&filter(TagMatch::Any), &candidate, now()));
        assert!(!matches(&filter(TagMatch::All), &candidate, now()));
        assert!(!matches(&filter(TagMatch::None), &candidate, now()));
    }

    #[test]
    fn test_malformed_hours_fail_open_for_that_candidate_only() {
        let good = BusinessHours {
            periods: vec![OpeningPeriod::new(Weekday::Mon, "11:00", "22:00")],
        };
        let bad = BusinessHours {
            periods: vec![OpeningPeriod::new(Weekday::Mon, "9", "22:00")],
        };
        let late = BusinessHours {
            periods: vec![OpeningPeriod::new(Weekday::Mon, "06:00", "10:00")],
        };
        let candidates = vec![
            Candidate::new("good", "Good").with_hours(good, Some("UTC")),
            Candidate::new("bad", "Bad").with_hours(bad.clone(), Some("UTC")),
            Candidate::new("closed", "Closed").with_hours(late, Some("UTC")),
        ];
        assert!(hours::validate(&bad).is_err());

        let config = FilterConfiguration::new(vec![FilterItem::soft(
            "open",
            0,
            FilterCriteria::OpeningHours,
        )]);
        let report = FilterEngine::new()
            .apply(&candidates, &config, now())
            .unwrap();
        assert_eq!(report.admissible.len(), 3);
        let bad_result = report
            .admissible
            .iter()
            .find(|r| r.candidate_id == "bad")
            .unwrap();
        assert!(bad_result.soft_results[0].passed);
        assert_eq!(bad_result.priority_score, 1.0);
        assert_eq!(report.admissible.last().unwrap().candidate_id, "closed");

        let strict = FilterConfiguration::new(vec![FilterItem::hard(
            "open",
            FilterCriteria::OpeningHours,
        )]);
        let report = FilterEngine::new()
            .apply(&candidates, &strict, now())
            .unwrap();
        assert_eq!(report.admissible_ids(), vec!["bad", "good"]);
    }
}
