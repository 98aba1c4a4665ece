//! Autocomplete ranking over candidate entries

use ledger_core::{LedgerEntry, Suggestion};
use std::collections::HashMap;

/// Sentences longer than this are not offered as suggestions
const MAX_SENTENCE_CHARS: usize = 100;

/// Which entry fields contribute suggestion values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionSource {
    /// Project names, locations and sentences of the entry body
    ProjectItems,
    Locations,
}

/// Count distinct values containing `query` and return the most frequent.
///
/// Ties are broken by value in ascending order so results are stable.
pub fn rank_suggestions(
    entries: &[LedgerEntry],
    query: &str,
    source: SuggestionSource,
    limit: usize,
) -> Vec<Suggestion> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    let matches = |value: &str| value.to_lowercase().contains(&needle);

    let mut counts: HashMap<String, u32> = HashMap::new();
    let mut add = |value: &str| {
        let value = value.trim();
        if !value.is_empty() && matches(value) {
            *counts.entry(value.to_string()).or_insert(0) += 1;
        }
    };

    for entry in entries {
        match source {
            SuggestionSource::ProjectItems => {
                add(&entry.project_name);
                add(&entry.location);
                for sentence in entry.specific_matters.split(['。', '\n']) {
                    if sentence.trim().chars().count() < MAX_SENTENCE_CHARS {
                        add(sentence);
                    }
                }
            }
            SuggestionSource::Locations => add(&entry.location),
        }
    }

    let mut ranked: Vec<Suggestion> = counts
        .into_iter()
        .map(|(value, count)| Suggestion { value, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn entry(project: &str, location: &str, matters: &str) -> LedgerEntry {
        LedgerEntry {
            id: 1,
            user_id: 1,
            recorder: None,
            province: "上海".to_string(),
            project_name: project.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            location: location.to_string(),
            personnel: "张三".to_string(),
            nature: "其他".to_string(),
            specific_matters: matters.to_string(),
            follow_up_points: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn blank_query_yields_nothing() {
        let entries = vec![entry("Alpha", "Room", "")];
        assert!(rank_suggestions(&entries, "   ", SuggestionSource::ProjectItems, 20).is_empty());
    }

    #[test]
    fn counts_sentences_and_fields() {
        let entries = vec![
            entry("Alpha 项目", "Alpha 会议室", "Alpha 评审。其他事项"),
            entry("Alpha 项目", "二楼", "Alpha 评审"),
        ];
        let ranked = rank_suggestions(&entries, "alpha", SuggestionSource::ProjectItems, 20);
        assert_eq!(
            ranked,
            vec![
                Suggestion { value: "Alpha 评审".to_string(), count: 2 },
                Suggestion { value: "Alpha 项目".to_string(), count: 2 },
                Suggestion { value: "Alpha 会议室".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn long_sentences_are_skipped() {
        let long = format!("Beta {}", "x".repeat(120));
        let entries = vec![entry("Gamma", "Room", &long)];
        assert!(rank_suggestions(&entries, "beta", SuggestionSource::ProjectItems, 20).is_empty());
    }

    #[test]
    fn locations_only_and_limit() {
        let entries = vec![
            entry("P1", "Hall A", "Hall A meeting"),
            entry("P2", "Hall B", ""),
            entry("P3", "Hall B", ""),
        ];
        let ranked = rank_suggestions(&entries, "hall", SuggestionSource::Locations, 1);
        assert_eq!(ranked, vec![Suggestion { value: "Hall B".to_string(), count: 2 }]);
    }
}
