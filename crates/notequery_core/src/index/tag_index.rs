//! Tag membership index: tag -> ids of notes carrying it.

use crate::model::note::{Note, NoteId};
use std::collections::{BTreeMap, BTreeSet};

/// One row of the tag frequency listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Maps each tag to the set of notes whose tag set contains it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    members: BTreeMap<String, BTreeSet<NoteId>>,
}

impl TagIndex {
    pub fn build<'a>(notes: impl IntoIterator<Item = &'a Note>) -> Self {
        let mut members: BTreeMap<String, BTreeSet<NoteId>> = BTreeMap::new();
        for note in notes {
            for tag in &note.tags {
                members.entry(tag.clone()).or_default().insert(note.id);
            }
        }
        Self { members }
    }

    /// Returns the notes tagged with `tag`, or `None` for a tag nobody uses.
    pub fn notes_with(&self, tag: &str) -> Option<&BTreeSet<NoteId>> {
        self.members.get(tag)
    }

    /// Returns known tags in lexicographic order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Counts tag usage among `scope`, most used first, ties by tag name.
    ///
    /// Tags with no note in `scope` are omitted.
    pub fn counts_within(&self, scope: &BTreeSet<NoteId>) -> Vec<TagCount> {
        let mut counts = self
            .members
            .iter()
            .map(|(tag, ids)| TagCount {
                tag: tag.clone(),
                count: ids.intersection(scope).count(),
            })
            .filter(|row| row.count > 0)
            .collect::<Vec<_>>();
        counts.sort_by(|left, right| {
            right
                .count
                .cmp(&left.count)
                .then_with(|| left.tag.cmp(&right.tag))
        });
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::{TagCount, TagIndex};
    use crate::model::note::{Note, NoteId, Position};
    use std::collections::BTreeSet;

    fn note(id: u32, tags: &[&str]) -> Note {
        Note {
            id: NoteId(id),
            field: "ml".to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            body: String::new(),
            position: Position {
                field: 0,
                notebook: 0,
                cell: id,
            },
            external_id: None,
        }
    }

    #[test]
    fn membership_matches_note_tag_sets() {
        let notes = vec![note(0, &["nlp", "rnn"]), note(1, &["nlp"]), note(2, &[])];
        let index = TagIndex::build(&notes);

        assert_eq!(
            index.notes_with("nlp"),
            Some(&BTreeSet::from([NoteId(0), NoteId(1)]))
        );
        assert_eq!(index.notes_with("rnn"), Some(&BTreeSet::from([NoteId(0)])));
        assert_eq!(index.notes_with("cv"), None);
        assert_eq!(index.tags().collect::<Vec<_>>(), vec!["nlp", "rnn"]);
    }

    #[test]
    fn counts_sort_by_frequency_then_name() {
        let notes = vec![
            note(0, &["b", "a"]),
            note(1, &["b", "c"]),
            note(2, &["c"]),
            note(3, &["d"]),
        ];
        let index = TagIndex::build(&notes);
        let scope = BTreeSet::from([NoteId(0), NoteId(1), NoteId(2)]);

        let counts = index.counts_within(&scope);
        let rows = counts
            .iter()
            .map(|TagCount { tag, count }| (tag.as_str(), *count))
            .collect::<Vec<_>>();
        assert_eq!(rows, vec![("b", 2), ("c", 2), ("a", 1)]);
    }
}
