//! Grouping of assignments by accreditation outcome.

use crate::analyzers::types::OutcomeMeta;
use crate::config::{DuplicatePolicy, OutcomeConfig};
use crate::lms::{Assignment, Criterion, OutcomeId};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("markup pattern is valid"));

/// Outcomes found in a set of assignments.
///
/// `assignments` lists, per outcome, every assignment whose rubric tags it;
/// `meta` holds the outcome's identification from its first sighting.
#[derive(Debug, Default)]
pub struct OutcomeIndex<'a> {
    pub assignments: BTreeMap<OutcomeId, Vec<&'a Assignment>>,
    pub meta: BTreeMap<OutcomeId, OutcomeMeta>,
}

impl OutcomeIndex<'_> {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }
}

/// Removes HTML tags from `text`.
pub fn strip_markup(text: &str) -> String {
    MARKUP_RE.replace_all(text, "").into_owned()
}

fn contains_marker(text: &str, marker: &str) -> bool {
    text.to_lowercase().contains(&marker.to_lowercase())
}

/// The outcome a criterion is tagged with, if its description carries the
/// marker and it is linked to an outcome.
pub fn tagged_outcome<'c>(criterion: &'c Criterion, marker: &str) -> Option<&'c OutcomeId> {
    if contains_marker(criterion.description(), marker) {
        criterion.outcome_id.as_ref()
    } else {
        None
    }
}

/// Assignments that mention the marker in their name or in any rubric
/// criterion description.
pub fn find_tagged_assignments<'a>(assignments: &'a [Assignment], marker: &str) -> Vec<&'a Assignment> {
    assignments
        .iter()
        .filter(|a| {
            contains_marker(&a.name, marker)
                || a.criteria()
                    .iter()
                    .any(|c| contains_marker(c.description(), marker))
        })
        .collect()
}

fn outcome_meta(criterion: &Criterion) -> OutcomeMeta {
    let description = criterion.description().trim();
    OutcomeMeta {
        title: strip_markup(description).trim().to_string(),
        description: description.to_string(),
        long_description: criterion.long_description().trim().to_string(),
    }
}

/// Groups assignments by the outcomes their rubrics are tagged with.
pub fn extract_outcomes<'a, I>(assignments: I, config: &OutcomeConfig) -> OutcomeIndex<'a>
where
    I: IntoIterator<Item = &'a Assignment>,
{
    let mut index = OutcomeIndex::default();

    for assignment in assignments {
        for criterion in assignment.criteria() {
            let Some(outcome) = tagged_outcome(criterion, &config.marker) else {
                continue;
            };

            let listed = index.assignments.entry(outcome.clone()).or_default();
            let already_listed = listed.iter().any(|a| a.id == assignment.id);
            if config.duplicates == DuplicatePolicy::PerCriterion || !already_listed {
                listed.push(assignment);
            }

            index
                .meta
                .entry(outcome.clone())
                .or_insert_with(|| outcome_meta(criterion));
        }
    }

    debug!(outcomes = index.len(), "Outcome extraction complete");
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn criterion(description: &str, outcome: Option<u64>) -> Criterion {
        Criterion {
            id: Some(format!("_{}", outcome.unwrap_or(0))),
            description: Some(description.to_string()),
            long_description: Some(format!(" long {description} ")),
            outcome_id: outcome.map(OutcomeId::from),
            points: Some(4.0),
        }
    }

    fn assignment(id: u64, name: &str, rubric: Vec<Criterion>) -> Assignment {
        Assignment {
            id,
            name: name.to_string(),
            rubric: Some(rubric),
            ..Default::default()
        }
    }

    fn ids(index: &OutcomeIndex<'_>, outcome: u64) -> Vec<u64> {
        index.assignments[&OutcomeId::from(outcome)]
            .iter()
            .map(|a| a.id)
            .collect()
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup("<p><strong>CS ABET 1</strong> Analyze</p>"),
            "CS ABET 1 Analyze"
        );
    }

    #[test]
    fn test_criterion_needs_marker_and_outcome() {
        assert!(tagged_outcome(&criterion("ABET 1: design", Some(1)), "abet").is_some());
        assert!(tagged_outcome(&criterion("ABET 1: design", None), "abet").is_none());
        assert!(tagged_outcome(&criterion("Code style", Some(2)), "abet").is_none());
    }

    #[test]
    fn test_groups_assignments_by_outcome() {
        let assignments = vec![
            assignment(
                10,
                "Lab 1",
                vec![criterion("<b>CS ABET 1</b>", Some(1)), criterion("Style", Some(9))],
            ),
            assignment(11, "Lab 2", vec![criterion("cs abet 1", Some(1))]),
            assignment(12, "Lab 3", vec![criterion("CS ABET 2", Some(2))]),
            Assignment {
                id: 13,
                name: "No rubric".to_string(),
                ..Default::default()
            },
        ];

        let index = extract_outcomes(&assignments, &OutcomeConfig::default());

        assert_eq!(index.len(), 2);
        assert_eq!(ids(&index, 1), vec![10, 11]);
        assert_eq!(ids(&index, 2), vec![12]);
        assert!(!index.assignments.contains_key(&OutcomeId::from(9)));

        let meta = &index.meta[&OutcomeId::from(1)];
        assert_eq!(meta.title, "CS ABET 1");
        assert_eq!(meta.description, "<b>CS ABET 1</b>");
        assert_eq!(meta.long_description, "long <b>CS ABET 1</b>");
    }

    #[test]
    fn test_duplicate_criteria_policy() {
        let assignments = vec![assignment(
            10,
            "Project",
            vec![
                criterion("ABET 3 part a", Some(3)),
                criterion("ABET 3 part b", Some(3)),
            ],
        )];

        let once = extract_outcomes(&assignments, &OutcomeConfig::default());
        assert_eq!(ids(&once, 3), vec![10]);
        assert_eq!(once.meta[&OutcomeId::from(3)].title, "ABET 3 part a");

        let config = OutcomeConfig {
            duplicates: DuplicatePolicy::PerCriterion,
            ..Default::default()
        };
        let per_criterion = extract_outcomes(&assignments, &config);
        assert_eq!(ids(&per_criterion, 3), vec![10, 10]);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let assignments = vec![
            assignment(1, "A", vec![criterion("ABET 1", Some(1))]),
            assignment(2, "B", vec![criterion("ABET 1", Some(1)), criterion("ABET 2", Some(2))]),
        ];
        let config = OutcomeConfig::default();

        let first = extract_outcomes(&assignments, &config);
        let second = extract_outcomes(&assignments, &config);

        let as_sets = |index: &OutcomeIndex<'_>| -> BTreeMap<OutcomeId, BTreeSet<u64>> {
            index
                .assignments
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().map(|a| a.id).collect()))
                .collect()
        };
        assert_eq!(as_sets(&first), as_sets(&second));
        assert_eq!(first.meta, second.meta);
    }

    #[test]
    fn test_find_tagged_assignments() {
        let assignments = vec![
            assignment(1, "ABET Lab", vec![]),
            assignment(2, "Lab", vec![criterion("abet 4", None)]),
            assignment(3, "Quiz", vec![criterion("Correctness", Some(1))]),
        ];

        let tagged: Vec<u64> = find_tagged_assignments(&assignments, "ABET")
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(tagged, vec![1, 2]);
    }
}
