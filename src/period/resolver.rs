//! Category key <-> event-type resolution.
//!
//! The event store has no foreign key from a category to an event type, only
//! a shared display name. A configured stable mapping (category key -> event
//! type id) is consulted first; keyword search over display names is the
//! fallback.
//!
//! Keyword priority when several catalog entries match a key: the longest
//! matching fragment wins, then the shorter display name, then catalog order.

use crate::period::catalog::CategoryKey;
use crate::store::EventTypeCatalogEntry;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

pub type CategoryMapping = BTreeMap<CategoryKey, String>;

#[derive(Debug, Clone)]
pub struct EventTypeResolver {
    catalog: Vec<EventTypeCatalogEntry>,
    lowered: Vec<String>,
    mapping: CategoryMapping,
    mapped_ids: HashMap<String, CategoryKey>,
}

fn longest_fragment(haystack: &str, fragments: &[&str]) -> Option<usize> {
    fragments
        .iter()
        .filter(|f| haystack.contains(**f))
        .map(|f| f.chars().count())
        .max()
}

impl EventTypeResolver {
    pub fn new(catalog: Vec<EventTypeCatalogEntry>, mapping: CategoryMapping) -> Self {
        let lowered = catalog.iter().map(|e| e.name.to_lowercase()).collect();
        let mut mapped_ids = HashMap::new();
        for (key, id) in &mapping {
            mapped_ids.entry(id.clone()).or_insert(*key);
        }
        EventTypeResolver {
            catalog,
            lowered,
            mapping,
            mapped_ids,
        }
    }

    pub fn catalog(&self) -> &[EventTypeCatalogEntry] {
        &self.catalog
    }

    pub fn mapping(&self) -> &CategoryMapping {
        &self.mapping
    }

    pub fn entry_by_id(&self, id: &str) -> Option<&EventTypeCatalogEntry> {
        self.catalog.iter().find(|e| e.id == id)
    }

    /// Forward resolution. A mapped id that is missing from the catalog falls
    /// through to keyword search.
    pub fn resolve_forward(&self, key: CategoryKey) -> Option<&EventTypeCatalogEntry> {
        if let Some(id) = self.mapping.get(&key) {
            if let Some(entry) = self.entry_by_id(id) {
                return Some(entry);
            }
        }
        self.search_forward(key)
    }

    /// Keyword-only forward resolution.
    pub fn search_forward(&self, key: CategoryKey) -> Option<&EventTypeCatalogEntry> {
        let fragments = key.fragments();
        self.lowered
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| {
                longest_fragment(name, fragments)
                    .map(|len| (Reverse(len), name.chars().count(), idx))
            })
            .min()
            .map(|(_, _, idx)| &self.catalog[idx])
    }

    /// Reverse resolution by display name only.
    ///
    /// Across families the longest fragment wins, ties going to the earlier
    /// family (lesson, point, class violation, student violation). Within
    /// student violations any attire match beats every general match.
    pub fn resolve_reverse(&self, event_type_name: &str) -> Option<CategoryKey> {
        let name = event_type_name.to_lowercase();

        let mut best: Option<(usize, CategoryKey)> = None;
        let non_student = CategoryKey::all()
            .filter(|k| matches!(k, CategoryKey::Lesson(_)))
            .chain(CategoryKey::all().filter(|k| {
                matches!(k, CategoryKey::Point(_) | CategoryKey::ClassViolation(_))
            }));
        for key in non_student {
            if let Some(len) = longest_fragment(&name, key.fragments()) {
                if best.map(|(b, _)| len > b).unwrap_or(true) {
                    best = Some((len, key));
                }
            }
        }

        let student = best_student_violation(&name, true)
            .or_else(|| best_student_violation(&name, false));
        match (best, student) {
            (Some((b, _)), Some((s, key))) if s > b => Some(key),
            (Some((_, key)), _) => Some(key),
            (None, Some((_, key))) => Some(key),
            (None, None) => None,
        }
    }

    /// Reverse resolution for a persisted event: the stable mapping by id
    /// first, then the display name.
    pub fn resolve_event(&self, event_type_id: &str, event_type_name: &str) -> Option<CategoryKey> {
        if let Some(key) = self.mapped_ids.get(event_type_id) {
            return Some(*key);
        }
        self.resolve_reverse(event_type_name)
    }

    /// Builds a stable mapping by running keyword search once for every key.
    pub fn autoconfigure(&self) -> CategoryMapping {
        CategoryKey::all()
            .filter_map(|key| self.search_forward(key).map(|e| (key, e.id.clone())))
            .collect()
    }
}

fn best_student_violation(name: &str, attire: bool) -> Option<(usize, CategoryKey)> {
    let mut best: Option<(usize, CategoryKey)> = None;
    for key in CategoryKey::all() {
        let CategoryKey::StudentViolation(kind) = key else {
            continue;
        };
        if kind.is_attire() != attire {
            continue;
        }
        if let Some(len) = longest_fragment(name, key.fragments()) {
            if best.map(|(b, _)| len > b).unwrap_or(true) {
                best = Some((len, key));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::catalog::{
        ClassViolation, LessonRating, PointColumn, StudentViolation,
    };

    fn entry(id: &str, name: &str) -> EventTypeCatalogEntry {
        EventTypeCatalogEntry {
            id: id.to_string(),
            name: name.to_string(),
            category: "study".to_string(),
            default_points: 1,
        }
    }

    #[test]
    fn forward_matches_case_insensitive_substring() {
        let r = EventTypeResolver::new(
            vec![entry("a", "Misc"), entry("b", "NOISY CLASS (whole room)")],
            CategoryMapping::new(),
        );
        let e = r
            .resolve_forward(CategoryKey::ClassViolation(ClassViolation::NoisyClass))
            .expect("noisy class resolves");
        assert_eq!(e.id, "b");
        assert!(r
            .resolve_forward(CategoryKey::Lesson(LessonRating::Poor))
            .is_none());
    }

    #[test]
    fn forward_prefers_longest_fragment_then_shorter_name() {
        let r = EventTypeResolver::new(
            vec![
                entry("below", "Below average score"),
                entry("avg", "Average score"),
            ],
            CategoryMapping::new(),
        );
        // both contain "average score"; the shorter name is the specific one
        let avg = r
            .resolve_forward(CategoryKey::Point(PointColumn::AverageScore))
            .expect("average");
        assert_eq!(avg.id, "avg");
        // "below average score" is longer than any fragment matching "avg"
        let below = r
            .resolve_forward(CategoryKey::Point(PointColumn::BelowAverage))
            .expect("below");
        assert_eq!(below.id, "below");
    }

    #[test]
    fn forward_is_deterministic_for_ties() {
        let r = EventTypeResolver::new(
            vec![entry("first", "Noisy class"), entry("second", "noisy class")],
            CategoryMapping::new(),
        );
        for _ in 0..3 {
            let e = r
                .resolve_forward(CategoryKey::ClassViolation(ClassViolation::NoisyClass))
                .expect("resolves");
            assert_eq!(e.id, "first");
        }
    }

    #[test]
    fn stable_mapping_wins_over_keywords() {
        let key = CategoryKey::Point(PointColumn::Score10);
        let mut mapping = CategoryMapping::new();
        mapping.insert(key, "renamed".to_string());
        let r = EventTypeResolver::new(
            vec![entry("kw", "Score 10"), entry("renamed", "Top mark")],
            mapping.clone(),
        );
        assert_eq!(r.resolve_forward(key).map(|e| e.id.as_str()), Some("renamed"));
        assert_eq!(r.resolve_event("renamed", "Top mark"), Some(key));
        assert_eq!(r.resolve_reverse("Top mark"), None);

        // stale id falls back to keyword search
        mapping.insert(key, "gone".to_string());
        let r = EventTypeResolver::new(vec![entry("kw", "Score 10")], mapping);
        assert_eq!(r.resolve_forward(key).map(|e| e.id.as_str()), Some("kw"));
    }

    #[test]
    fn reverse_prefers_attire_over_general() {
        let r = EventTypeResolver::new(vec![], CategoryMapping::new());
        // "late arrival" is longer than "no badge" but attire is tried first
        assert_eq!(
            r.resolve_reverse("Late arrival, no badge"),
            Some(CategoryKey::StudentViolation(StudentViolation::NoBadge))
        );
        assert_eq!(
            r.resolve_reverse("Late arrival"),
            Some(CategoryKey::StudentViolation(StudentViolation::LateArrival))
        );
    }

    #[test]
    fn reverse_resolves_every_label() {
        let r = EventTypeResolver::new(vec![], CategoryMapping::new());
        for key in CategoryKey::all() {
            assert_eq!(r.resolve_reverse(key.label()), Some(key), "label {}", key.label());
        }
        assert_eq!(r.resolve_reverse("Field trip"), None);
    }

    #[test]
    fn autoconfigure_covers_resolvable_keys() {
        let r = EventTypeResolver::new(
            vec![entry("t10", "Score 10"), entry("fair", "Lesson: fair")],
            CategoryMapping::new(),
        );
        let m = r.autoconfigure();
        assert_eq!(m.len(), 2);
        assert_eq!(
            m.get(&CategoryKey::Lesson(LessonRating::Fair)).map(String::as_str),
            Some("fair")
        );
    }
}
