use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use vsh_sdk::{FsError, FsResult, Node, Store};

/// Keeps the last saved tree in process memory.
///
/// Saves can be made to fail on demand, which is how save-failure handling
/// is exercised.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Node>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn last_saved(&self) -> Option<Node> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self) -> FsResult<Option<Node>> {
        Ok(self.last_saved())
    }

    async fn save(&self, root: &Node) -> FsResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FsError::persistence("memory store is set to fail"));
        }
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(root.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
