use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};

/// In-memory item↔tag collection with both directions indexed.
///
/// Items never map to an empty tag set: inserts with no tags are ignored and
/// removals prune items left without tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastCollection {
    items: BTreeMap<String, BTreeSet<String>>,  // item -> tags
    tags: BTreeMap<String, BTreeSet<String>>,   // tag -> items
}

impl FastCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&mut self, item: &str, tags: &BTreeSet<String>) {
        if tags.is_empty() {
            return;
        }

        self.items
            .entry(item.to_string())
            .or_default()
            .extend(tags.iter().cloned());

        for tag in tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(item.to_string());
        }
    }

    pub fn insert_tag(&mut self, items: &BTreeSet<String>, tag: &str) {
        if items.is_empty() {
            return;
        }

        for item in items {
            self.items
                .entry(item.clone())
                .or_default()
                .insert(tag.to_string());
        }

        self.tags
            .entry(tag.to_string())
            .or_default()
            .extend(items.iter().cloned());
    }

    pub fn insert_many(&mut self, items: &BTreeSet<String>, tags: &BTreeSet<String>) {
        if tags.is_empty() {
            return;
        }
        for item in items {
            self.insert_item(item, tags);
        }
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.items.contains_key(item)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn tags_of(&self, item: &str) -> BTreeSet<String> {
        self.items.get(item).cloned().unwrap_or_default()
    }

    pub fn items_of(&self, tag: &str) -> BTreeSet<String> {
        self.tags.get(tag).cloned().unwrap_or_default()
    }

    /// Items carrying every tag in `tags`; an empty query matches nothing
    pub fn items_having_all(&self, tags: &BTreeSet<String>) -> BTreeSet<String> {
        let mut iter = tags.iter();
        let Some(first) = iter.next() else {
            return BTreeSet::new();
        };

        let mut result = self.items_of(first);
        for tag in iter {
            if result.is_empty() {
                break;
            }
            match self.tags.get(tag) {
                Some(items) => result.retain(|item| items.contains(item)),
                None => result.clear(),
            }
        }
        result
    }

    /// Items whose complete tag set is exactly `tags`
    pub fn items_exact_match(&self, tags: &BTreeSet<String>) -> BTreeSet<String> {
        let mut result = self.items_having_all(tags);
        result.retain(|item| self.items.get(item).is_some_and(|t| t == tags));
        result
    }

    /// Tags whose item set contains the item set of `tag`, excluding `tag`
    pub fn tags_implying(&self, tag: &str) -> BTreeSet<String> {
        let Some(items) = self.tags.get(tag) else {
            return BTreeSet::new();
        };

        self.tags
            .iter()
            .filter(|(name, other)| name.as_str() != tag && items.is_subset(other))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn remove_tag(&mut self, tag: &str) {
        let Some(items) = self.tags.remove(tag) else {
            return;
        };

        for item in items {
            if let btree_map::Entry::Occupied(mut entry) = self.items.entry(item) {
                entry.get_mut().remove(tag);
                if entry.get().is_empty() {
                    entry.remove();
                }
            }
        }
    }

    /// Items tagged with `tag`, with `tag` removed from their tag sets
    pub fn child_collection(&self, tag: &str) -> FastCollection {
        let mut child = FastCollection::new();
        for item in self.items_of(tag) {
            let mut tags = self.tags_of(&item);
            tags.remove(tag);
            child.insert_item(&item, &tags);
        }
        child
    }

    pub fn remove_tags_below_cardinality(&mut self, min: usize) {
        let rare: Vec<String> = self
            .tags
            .iter()
            .filter(|(_, items)| items.len() < min)
            .map(|(tag, _)| tag.clone())
            .collect();

        for tag in rare {
            self.remove_tag(&tag);
        }
    }

    /// Tag with the most items; ties go to the first tag in sort order
    pub fn find_tag_with_max_cardinality(&self) -> Option<(&str, usize)> {
        let mut best: Option<(&str, usize)> = None;
        for (tag, items) in &self.tags {
            if best.is_none_or(|(_, count)| items.len() > count) {
                best = Some((tag.as_str(), items.len()));
            }
        }
        best
    }

    pub fn tagged_items(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn all_tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn cardinality(&self, tag: &str) -> usize {
        self.tags.get(tag).map_or(0, BTreeSet::len)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.tags.clear();
    }

    /// `(item, tags)` pairs in item order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.items.iter()
    }
}
