//! Run-wide registry guaranteeing unique prompt ids.

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use prompt_primitives::PromptId;
use tracing::debug;

/// Set of prompt ids reserved during one migration run.
///
/// Every reservation is a single check-and-insert under one lock, so callers
/// on different threads can never both obtain the same id.
#[derive(Default)]
pub struct IdRegistry {
    reserved: Mutex<HashSet<String>>,
}

impl fmt::Debug for IdRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reserved = self.reserved.lock().expect("id registry poisoned");
        let mut ids: Vec<_> = reserved.iter().cloned().collect();
        ids.sort();
        f.debug_struct("IdRegistry").field("reserved", &ids).finish()
    }
}

impl IdRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that treats `ids` as already taken.
    #[must_use]
    pub fn seeded(ids: impl IntoIterator<Item = PromptId>) -> Self {
        Self {
            reserved: Mutex::new(ids.into_iter().map(String::from).collect()),
        }
    }

    /// Reserves `base`, or `base_2`, `base_3`, ... when it is taken.
    ///
    /// # Errors
    ///
    /// Returns [`prompt_primitives::Error::InvalidPromptId`] when `base` is not
    /// a valid prompt id.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn reserve(&self, base: &str) -> prompt_primitives::Result<PromptId> {
        PromptId::new(base)?;
        let mut reserved = self.reserved.lock().expect("id registry poisoned");
        let mut candidate = base.to_owned();
        let mut suffix = 2usize;
        while reserved.contains(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        if candidate != base {
            debug!(base, id = %candidate, "prompt id collision resolved by suffix");
        }
        let id = PromptId::new(candidate.clone())?;
        reserved.insert(candidate);
        Ok(id)
    }

    /// Returns `true` if `id` has been reserved.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.reserved
            .lock()
            .expect("id registry poisoned")
            .contains(id)
    }

    /// Returns the number of reserved ids.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reserved.lock().expect("id registry poisoned").len()
    }

    /// Returns `true` if nothing has been reserved.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    #[test]
    fn collisions_get_numeric_suffixes() {
        let registry = IdRegistry::new();
        assert_eq!(registry.reserve("chat_prompt").unwrap().as_str(), "chat_prompt");
        assert_eq!(registry.reserve("chat_prompt").unwrap().as_str(), "chat_prompt_2");
        assert_eq!(registry.reserve("chat_prompt").unwrap().as_str(), "chat_prompt_3");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn seeded_ids_are_taken() {
        let registry = IdRegistry::seeded([PromptId::new("greeting").unwrap()]);
        assert!(registry.contains("greeting"));
        assert_eq!(registry.reserve("greeting").unwrap().as_str(), "greeting_2");
    }

    #[test]
    fn invalid_base_is_rejected() {
        let registry = IdRegistry::new();
        assert!(registry.reserve("").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_reservations_are_unique() {
        let registry = Arc::new(IdRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    (0..25)
                        .map(|_| registry.reserve("shared").unwrap().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 200);
    }
}
