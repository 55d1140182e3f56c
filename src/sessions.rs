use crate::{
    catalog::CategoryTree,
    wizard::{ExistingListing, ListingWizard},
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info};
use uuid::Uuid;

pub type SharedWizard = Arc<Mutex<ListingWizard>>;

struct Session {
    wizard: SharedWizard,
    last_access: Instant,
}

/// In-memory wizard sessions. Each session serialises access to its own wizard.
#[derive(Clone)]
pub struct SessionStore {
    tree: Arc<CategoryTree>,
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new(tree: CategoryTree) -> Self {
        Self {
            tree: Arc::new(tree),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn tree(&self) -> &CategoryTree {
        &self.tree
    }

    pub async fn open(&self, existing: Option<ExistingListing>) -> (Uuid, SharedWizard) {
        let id = Uuid::new_v4();
        let editing = existing.as_ref().map(|listing| listing.id.clone());
        let wizard = match existing {
            Some(listing) => ListingWizard::edit(self.tree.clone(), listing),
            None => ListingWizard::new(self.tree.clone()),
        };
        let shared = Arc::new(Mutex::new(wizard));
        let open = {
            let mut sessions = self.sessions.lock().await;
            sessions.insert(
                id,
                Session {
                    wizard: shared.clone(),
                    last_access: Instant::now(),
                },
            );
            sessions.len()
        };
        info!(target = "wizard.flow", session = %id, editing = ?editing, open, "session_opened");
        (id, shared)
    }

    /// Looks a session up and marks it as recently used.
    pub async fn get(&self, id: Uuid) -> Option<SharedWizard> {
        self.sessions.lock().await.get_mut(&id).map(|session| {
            session.last_access = Instant::now();
            session.wizard.clone()
        })
    }

    /// Drops the session and releases every preview it still holds.
    pub async fn close(&self, id: Uuid) -> bool {
        let removed = self.sessions.lock().await.remove(&id);
        match removed {
            Some(session) => {
                session.wizard.lock().await.close();
                info!(target = "wizard.flow", session = %id, "session_closed");
                true
            }
            None => false,
        }
    }

    /// Closes every session idle for at least `idle`. Sessions busy with a
    /// request are left for a later sweep.
    pub async fn sweep(&self, idle: Duration) -> usize {
        let expired: Vec<(Uuid, SharedWizard)> = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, session)| {
                    session.last_access.elapsed() >= idle && session.wizard.try_lock().is_ok()
                })
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|session| (id, session.wizard)))
                .collect()
        };
        for (id, wizard) in &expired {
            wizard.lock().await.close();
            info!(target = "wizard.flow", session = %id, "session_expired");
        }
        expired.len()
    }

    /// Background task sweeping idle sessions for the lifetime of the process.
    pub fn spawn_sweeper(&self, idle: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let period = idle.clamp(Duration::from_secs(1), Duration::from_secs(60));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let closed = store.sweep(idle).await;
                if closed > 0 {
                    debug!(target = "wizard.flow", closed, "idle_sessions_swept");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::categories::demo_tree, photos::PhotoFile, wizard::Step};

    #[tokio::test]
    async fn sessions_are_isolated_and_close_releases_previews() {
        let store = SessionStore::new(demo_tree());
        let (first, wizard) = store.open(None).await;
        let (second, _) = store.open(None).await;
        assert_ne!(first, second);
        assert!(store.get(second).await.is_some());

        {
            let mut guard = wizard.lock().await;
            guard.choose_category("13").unwrap();
            guard
                .submit_details(crate::wizard::DetailsSlice {
                    title: "Lot de chaises".into(),
                    description: "Six chaises en bois massif, très bon état".into(),
                    price: "30000".into(),
                    ..Default::default()
                })
                .unwrap();
            guard
                .add_photos(vec![PhotoFile::from_bytes("a.jpg", "image/jpeg", vec![1])])
                .unwrap();
            assert_eq!(guard.live_previews(), 1);
        }
        let other = store.get(second).await.unwrap();
        assert_eq!(other.lock().await.step(), Step::Category);

        assert!(store.close(first).await);
        assert_eq!(wizard.lock().await.live_previews(), 0);
        assert!(store.get(first).await.is_none());
        assert!(!store.close(first).await);
    }

    #[tokio::test]
    async fn sweep_closes_idle_sessions_and_releases_previews() {
        let store = SessionStore::new(demo_tree());
        let (id, wizard) = store.open(None).await;
        {
            let mut guard = wizard.lock().await;
            guard.choose_category("13").unwrap();
            guard
                .submit_details(crate::wizard::DetailsSlice {
                    title: "Lot de chaises".into(),
                    description: "Six chaises en bois massif, très bon état".into(),
                    price: "30000".into(),
                    ..Default::default()
                })
                .unwrap();
            guard
                .add_photos(vec![PhotoFile::from_bytes("a.jpg", "image/jpeg", vec![1])])
                .unwrap();
        }

        assert_eq!(store.sweep(Duration::from_secs(3600)).await, 0);
        assert!(store.get(id).await.is_some());

        assert_eq!(store.sweep(Duration::ZERO).await, 1);
        assert_eq!(wizard.lock().await.live_previews(), 0);
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn sweep_skips_sessions_in_use() {
        let store = SessionStore::new(demo_tree());
        let (id, wizard) = store.open(None).await;
        let held = wizard.lock().await;

        assert_eq!(store.sweep(Duration::ZERO).await, 0);
        drop(held);
        assert!(store.get(id).await.is_some());
        assert_eq!(store.sweep(Duration::ZERO).await, 1);
    }
}
