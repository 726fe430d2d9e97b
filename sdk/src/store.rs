use async_trait::async_trait;

use crate::error::FsResult;
use crate::types::Node;

/// Persistence collaborator for the file-system tree.
///
/// The VFS calls `save` explicitly after each mutation. A failed save leaves
/// the in-memory tree as it is; callers surface the error as a warning.
#[async_trait]
pub trait Store: Send + Sync {
    /// Load the last saved tree, or `None` when nothing was saved yet.
    async fn load(&self) -> FsResult<Option<Node>>;

    async fn save(&self, root: &Node) -> FsResult<()>;

    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Box<S> {
    async fn load(&self) -> FsResult<Option<Node>> {
        (**self).load().await
    }

    async fn save(&self, root: &Node) -> FsResult<()> {
        (**self).save(root).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn load(&self) -> FsResult<Option<Node>> {
        (**self).load().await
    }

    async fn save(&self, root: &Node) -> FsResult<()> {
        (**self).save(root).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        saved: Mutex<Vec<Node>>,
    }

    #[async_trait]
    impl Store for Recorder {
        async fn load(&self) -> FsResult<Option<Node>> {
            Ok(self.saved.lock().unwrap().last().cloned())
        }

        async fn save(&self, root: &Node) -> FsResult<()> {
            self.saved.lock().unwrap().push(root.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "recorder".to_string()
        }
    }

    #[tokio::test]
    async fn arc_and_box_forward() {
        let inner = Arc::new(Recorder::default());
        let boxed: Box<dyn Store> = Box::new(inner.clone());
        assert!(boxed.load().await.unwrap().is_none());

        boxed.save(&Node::directory("root", "root")).await.unwrap();
        assert_eq!(inner.saved.lock().unwrap().len(), 1);
        assert!(boxed.load().await.unwrap().unwrap().is_dir());
        assert_eq!(boxed.describe(), "recorder");
    }
}
