//! Differential sync: the row changes needed to turn one collection into
//! another.
//!
//! `identity` decides whether two values are the same entity (business key
//! equality); `equal` decides full value equality. Value objects without a
//! natural identity pass full equality for both, in which case `updated`
//! stays empty and callers rewrite the whole parent scope instead.

/// Row sets to apply, in order, to bring `before` to `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet<T> {
    pub added: Vec<T>,
    pub updated: Vec<T>,
    pub deleted: Vec<T>,
}

impl<T> Default for ChangeSet<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

impl<T> ChangeSet<T> {
    pub fn is_zero(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Compute the change set between `before` and `after`.
pub fn changes<T: Clone>(
    before: &[T],
    after: &[T],
    identity: impl Fn(&T, &T) -> bool,
    equal: impl Fn(&T, &T) -> bool,
) -> ChangeSet<T> {
    let mut set = ChangeSet::default();

    for old in before {
        match after.iter().find(|new| identity(old, new)) {
            None => set.deleted.push(old.clone()),
            Some(new) if !equal(old, new) => set.updated.push(new.clone()),
            Some(_) => {}
        }
    }

    for new in after {
        if !before.iter().any(|old| identity(old, new)) {
            set.added.push(new.clone());
        }
    }

    set
}
