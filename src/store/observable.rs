//! An ordered list whose mutations are gated by an observer.
//!
//! The observer runs *before* the in-memory change is applied.  If it
//! fails, the list is left exactly as it was and the error is returned,
//! so memory never drifts out of sync with whatever the observer persists.

use crate::errors::Result;

/// Side effects paired with list mutations.
pub trait MutationObserver<T> {
    /// Called with the item about to be appended.
    fn on_add(&mut self, item: &T) -> Result<()>;

    /// Called with the item about to be removed.
    fn on_remove(&mut self, item: &T) -> Result<()>;
}

/// Observer that accepts every mutation without side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl<T> MutationObserver<T> for NoopObserver {
    fn on_add(&mut self, _item: &T) -> Result<()> {
        Ok(())
    }

    fn on_remove(&mut self, _item: &T) -> Result<()> {
        Ok(())
    }
}

/// Insertion-ordered collection with observed `add`/`remove`.
#[derive(Debug, Clone)]
pub struct ObservableList<T> {
    items: Vec<T>,
}

impl<T> Default for ObservableList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> ObservableList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` once `observer` has accepted it.
    pub fn add_with<O>(&mut self, item: T, observer: &mut O) -> Result<()>
    where
        O: MutationObserver<T> + ?Sized,
    {
        observer.on_add(&item)?;
        self.items.push(item);
        Ok(())
    }

    /// Remove the first item matching `predicate` once `observer` has
    /// accepted it.  Returns `Ok(None)` when nothing matches.
    pub fn remove_where_with<O, F>(&mut self, predicate: F, observer: &mut O) -> Result<Option<T>>
    where
        O: MutationObserver<T> + ?Sized,
        F: Fn(&T) -> bool,
    {
        let Some(index) = self.items.iter().position(predicate) else {
            return Ok(None);
        };
        observer.on_remove(&self.items[index])?;
        Ok(Some(self.items.remove(index)))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
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
    use crate::errors::KeystoreError;

    /// Records every call and optionally refuses them.
    #[derive(Default)]
    struct Recorder {
        added: Vec<u32>,
        removed: Vec<u32>,
        refuse: bool,
    }

    impl MutationObserver<u32> for Recorder {
        fn on_add(&mut self, item: &u32) -> Result<()> {
            if self.refuse {
                return Err(KeystoreError::IllegalUsage("refused".into()));
            }
            self.added.push(*item);
            Ok(())
        }

        fn on_remove(&mut self, item: &u32) -> Result<()> {
            if self.refuse {
                return Err(KeystoreError::IllegalUsage("refused".into()));
            }
            self.removed.push(*item);
            Ok(())
        }
    }

    #[test]
    fn observer_sees_each_mutation_in_order() {
        let mut list = ObservableList::new();
        let mut recorder = Recorder::default();

        list.add_with(1, &mut recorder).unwrap();
        list.add_with(2, &mut recorder).unwrap();
        list.add_with(3, &mut recorder).unwrap();
        let removed = list.remove_where_with(|v| *v == 2, &mut recorder).unwrap();

        assert_eq!(removed, Some(2));
        assert_eq!(list.as_slice(), &[1, 3]);
        assert_eq!(recorder.added, vec![1, 2, 3]);
        assert_eq!(recorder.removed, vec![2]);
    }

    #[test]
    fn failed_observer_leaves_list_untouched() {
        let mut list = ObservableList::new();
        list.add_with(10, &mut NoopObserver).unwrap();

        let mut recorder = Recorder {
            refuse: true,
            ..Recorder::default()
        };
        assert!(list.add_with(11, &mut recorder).is_err());
        assert!(list.remove_where_with(|v| *v == 10, &mut recorder).is_err());
        assert_eq!(list.as_slice(), &[10]);
    }

    #[test]
    fn removing_a_missing_item_skips_the_observer() {
        let mut list: ObservableList<u32> = ObservableList::new();
        let mut recorder = Recorder::default();
        assert_eq!(list.remove_where_with(|_| true, &mut recorder).unwrap(), None);
        assert!(recorder.removed.is_empty());
    }
}
