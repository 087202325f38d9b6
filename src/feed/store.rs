use super::Item;

/// The authoritative, newest-first list of shared items.
///
/// Owned exclusively by the hub; nothing else mutates it. Uniqueness is
/// checked with a linear scan, since the board holds a LAN session's worth
/// of items, not a database.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: Vec<Item>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends an item. A duplicate `id` leaves the store untouched and
    /// returns `false`; redundant retries are tolerated, not errors.
    pub fn insert(&mut self, item: Item) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.insert(0, item);
        true
    }

    /// Removes the first item with the given `id`, returning it so the
    /// caller can decide whether to broadcast and which upload to discard.
    pub fn remove(&mut self, id: &str) -> Option<Item> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    /// Empties the store unconditionally, yielding the drained items.
    pub fn clear(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.items)
    }

    /// Full ordered copy for initial sync.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(id: &str, content: &str) -> Item {
        Item {
            id: id.into(),
            kind: crate::feed::ItemKind::Text,
            content: content.into(),
            locator: None,
            media_type: None,
        }
    }

    #[test]
    fn insert_is_newest_first() {
        let mut store = ItemStore::new();
        assert!(store.insert(text("a", "first")));
        assert!(store.insert(text("b", "second")));

        let ids: Vec<_> = store.snapshot().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn duplicate_insert_is_a_noop() {
        let mut store = ItemStore::new();
        assert!(store.insert(text("a", "first")));
        assert!(!store.insert(text("a", "retry")));

        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].content, "first");
    }

    #[test]
    fn remove_reports_what_happened() {
        let mut store = ItemStore::new();
        store.insert(text("a", "first"));

        let removed = store.remove("a").expect("item was present");
        assert_eq!(removed.content, "first");
        assert!(store.remove("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_drains_everything() {
        let mut store = ItemStore::new();
        store.insert(text("a", "first"));
        store.insert(text("b", "second"));

        let drained = store.clear();
        assert_eq!(drained.len(), 2);
        assert!(store.is_empty());
        assert!(store.clear().is_empty());
    }
}
