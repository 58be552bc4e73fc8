//! The per-session answer cache.

use std::collections::HashMap;

use crate::{
    domain::{AnswerEntry, AnswerKind, AnswerSet, QuestionKey},
    normalize::normalize_text,
};

/// Question-key → normalized answer store. Built once per successful fetch,
/// fully replaced on the next one, never partially updated.
#[derive(Debug, Default)]
pub struct AnswerCache {
    entries: HashMap<QuestionKey, AnswerEntry>,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything and insert the given set. Items without a question
    /// key and items whose values normalize away to nothing are dropped
    /// silently; a garbled entry never fails the whole load. Returns the
    /// number of entries inserted.
    ///
    /// Callers gate this on a successful fetch: a failed fetch must leave
    /// the previous cache in effect, so it must not reach rebuild at all.
    pub fn rebuild(&mut self, set: &AnswerSet) -> usize {
        self.entries.clear();

        for item in &set.items {
            let Some(key) = item.question_key.as_deref() else {
                continue;
            };
            let key = QuestionKey(key.to_string());

            match item.kind {
                AnswerKind::Multiple => {
                    let values: Vec<String> = item
                        .raw_values
                        .iter()
                        .map(|raw| normalize_text(raw))
                        .filter(|s| !s.is_empty())
                        .collect();
                    if !values.is_empty() {
                        self.entries.insert(key, AnswerEntry::Multiple(values));
                    }
                }
                AnswerKind::Single => {
                    let value = item
                        .raw_values
                        .first()
                        .map(|raw| normalize_text(raw))
                        .unwrap_or_default();
                    if !value.is_empty() {
                        self.entries.insert(key, AnswerEntry::Single(value));
                    }
                }
            }
        }

        tracing::debug!(entries = self.entries.len(), "answer cache rebuilt");
        self.entries.len()
    }

    pub fn lookup(&self, key: &QuestionKey) -> Option<&AnswerEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnswerItem;

    fn item(key: Option<&str>, kind: AnswerKind, raw: &[&str]) -> AnswerItem {
        AnswerItem {
            question_key: key.map(str::to_string),
            kind,
            raw_values: raw.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn builds_single_and_multiple_entries() {
        let set = AnswerSet {
            items: vec![
                item(Some("q1"), AnswerKind::Multiple, &["<p>A</p>", "<p>B</p>"]),
                item(Some("q2"), AnswerKind::Single, &["42"]),
            ],
        };
        let mut cache = AnswerCache::new();
        assert_eq!(cache.rebuild(&set), 2);

        assert_eq!(
            cache.lookup(&QuestionKey("q1".into())),
            Some(&AnswerEntry::Multiple(vec!["A".into(), "B".into()]))
        );
        assert_eq!(
            cache.lookup(&QuestionKey("q2".into())),
            Some(&AnswerEntry::Single("42".into()))
        );
        assert_eq!(cache.lookup(&QuestionKey("q3".into())), None);
    }

    #[test]
    fn rebuild_replaces_previous_entries_entirely() {
        let mut cache = AnswerCache::new();
        cache.rebuild(&AnswerSet {
            items: vec![item(Some("a"), AnswerKind::Single, &["one"])],
        });
        cache.rebuild(&AnswerSet {
            items: vec![item(Some("b"), AnswerKind::Single, &["two"])],
        });

        assert!(cache.lookup(&QuestionKey("a".into())).is_none());
        assert_eq!(
            cache.lookup(&QuestionKey("b".into())),
            Some(&AnswerEntry::Single("two".into()))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keyless_and_empty_items_are_dropped() {
        let set = AnswerSet {
            items: vec![
                item(None, AnswerKind::Single, &["orphan"]),
                item(Some("blank"), AnswerKind::Single, &["<p>  </p>"]),
                item(Some("none"), AnswerKind::Single, &[]),
                item(Some("empties"), AnswerKind::Multiple, &["", "<i></i>"]),
                item(Some("ok"), AnswerKind::Multiple, &["", "kept"]),
            ],
        };
        let mut cache = AnswerCache::new();
        assert_eq!(cache.rebuild(&set), 1);
        assert_eq!(
            cache.lookup(&QuestionKey("ok".into())),
            Some(&AnswerEntry::Multiple(vec!["kept".into()]))
        );
    }

    #[test]
    fn multiple_preserves_value_order() {
        let set = AnswerSet {
            items: vec![item(
                Some("q"),
                AnswerKind::Multiple,
                &["third?", "<b>first</b>", "second"],
            )],
        };
        let mut cache = AnswerCache::new();
        cache.rebuild(&set);
        assert_eq!(
            cache.lookup(&QuestionKey("q".into())),
            Some(&AnswerEntry::Multiple(vec![
                "third?".into(),
                "first".into(),
                "second".into()
            ]))
        );
    }
}
