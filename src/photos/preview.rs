use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::trace;
use uuid::Uuid;

/// Bookkeeping for the local preview references handed out to one wizard session.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    live: Mutex<HashSet<Uuid>>,
}

impl PreviewRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acquires a preview reference; it is released when the handle drops.
    pub fn acquire(self: &Arc<Self>) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.entries().insert(id);
        trace!(target = "wizard.photos", preview = %id, "preview_acquired");
        PreviewHandle {
            id,
            url: format!("blob:preview/{id}"),
            registry: Arc::clone(self),
        }
    }

    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    fn release(&self, id: Uuid) {
        if self.entries().remove(&id) {
            trace!(target = "wizard.photos", preview = %id, "preview_released");
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        // A poisoned set is still a valid set of ids.
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Short-lived local render reference for a staged photo.
pub struct PreviewHandle {
    id: Uuid,
    url: String,
    registry: Arc<PreviewRegistry>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("id", &self.id)
            .field("url", &self.url)
            .finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
