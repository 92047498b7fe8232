use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Keyed per-user mutual exclusion: actions for one user are serialized so two
/// concurrent replies can't race on the same session context; different users
/// proceed independently.
#[derive(Default)]
pub struct SessionLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_user_is_serialized() {
        let locks = Arc::new(SessionLocks::new());
        let user = Uuid::new_v4();
        let guard = locks.acquire(user).await;
        let locks2 = locks.clone();
        let contended = tokio::spawn(async move { locks2.acquire(user).await });
        tokio::task::yield_now().await;
        assert!(!contended.is_finished());
        drop(guard);
        contended.await.expect("lock task");
    }

    #[tokio::test]
    async fn different_users_do_not_block() {
        let locks = SessionLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let _b = locks.acquire(Uuid::new_v4()).await;
    }
}
