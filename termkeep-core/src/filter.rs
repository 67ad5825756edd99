//! Output filter chain
//!
//! Filters are pure text transforms applied to every output chunk before it
//! is stored or emitted. They run in registration order and the chain stops
//! as soon as a filter produces empty output.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type FilterFn = dyn Fn(&str) -> String + Send + Sync;

/// A named output transform.
#[derive(Clone)]
pub struct OutputFilter {
    id: String,
    description: String,
    transform: Arc<FilterFn>,
}

impl OutputFilter {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        transform: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            transform: Arc::new(transform),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn apply(&self, data: &str) -> String {
        (self.transform)(data)
    }
}

impl fmt::Debug for OutputFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputFilter")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Ordered, mutable list of [`OutputFilter`]s.
#[derive(Debug, Default)]
pub struct OutputFilterChain {
    filters: RwLock<Vec<OutputFilter>>,
}

impl OutputFilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter. Re-registering an existing id is a no-op.
    ///
    /// Returns `true` if the filter was added.
    pub fn register(&self, filter: OutputFilter) -> bool {
        let mut filters = self.write();
        if filters.iter().any(|f| f.id == filter.id) {
            tracing::debug!(filter_id = %filter.id, "Output filter already registered");
            return false;
        }
        tracing::debug!(filter_id = %filter.id, "Registered output filter");
        filters.push(filter);
        true
    }

    /// Remove a filter by id. Returns `true` if one was removed.
    pub fn unregister(&self, id: &str) -> bool {
        let mut filters = self.write();
        let before = filters.len();
        filters.retain(|f| f.id != id);
        filters.len() != before
    }

    /// Run every filter over `data` in registration order.
    pub fn apply(&self, data: &str) -> String {
        let filters = self.read();
        let mut current = data.to_string();
        for filter in filters.iter() {
            if current.is_empty() {
                break;
            }
            current = filter.apply(&current);
        }
        current
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Registered filter ids, in application order.
    pub fn registered_filters(&self) -> Vec<String> {
        self.read().iter().map(|f| f.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<OutputFilter>> {
        self.filters.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<OutputFilter>> {
        self.filters.write().unwrap_or_else(|e| e.into_inner())
    }
}
