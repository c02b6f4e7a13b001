use std::sync::Arc;

use clmock_execution::ExecutionClient;
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

/// The execution clients the mocker keeps in sync.
///
/// A production cycle holds the registry lock for its whole body, so registrations made while
/// a block is in flight take effect from the next cycle on. Reads go through a copy of the
/// membership that is updated together with the locked list, so they never wait on the cycle.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<Arc<ExecutionClient>>>,
    members: RwLock<Vec<Arc<ExecutionClient>>>,
}

impl ClientRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `client`. Waits for an in-flight cycle to finish its bookkeeping.
    pub async fn register(&self, client: Arc<ExecutionClient>) {
        let mut clients = self.clients.lock().await;
        info!(client = client.name(), registered = clients.len() + 1, "Registered execution client");
        clients.push(client);
        *self.members.write() = clients.clone();
    }

    /// Removes `client` by identity. Order of the remaining clients is not preserved.
    /// Returns whether the client was registered.
    pub async fn unregister(&self, client: &Arc<ExecutionClient>) -> bool {
        let mut clients = self.clients.lock().await;
        let Some(idx) = clients.iter().position(|c| Arc::ptr_eq(c, client)) else {
            return false;
        };
        clients.swap_remove(idx);
        *self.members.write() = clients.clone();
        info!(client = client.name(), registered = clients.len(), "Unregistered execution client");
        true
    }

    /// Number of registered clients. Does not block while a cycle is running.
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// Whether no client is registered.
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// The registered clients in registry order.
    pub fn snapshot(&self) -> Vec<Arc<ExecutionClient>> {
        self.members.read().clone()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Vec<Arc<ExecutionClient>>> {
        self.clients.lock().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clmock_test_support::MockExecutionNode;

    use super::*;

    #[tokio::test]
    async fn unregister_swaps_in_last_client() {
        let registry = ClientRegistry::new();
        let [a, b, c] = ["a", "b", "c"].map(|n| MockExecutionNode::with_difficulty(n, 0).client());
        for client in [&a, &b, &c] {
            registry.register(client.clone()).await;
        }

        assert!(registry.unregister(&a).await);
        let names: Vec<_> = registry.snapshot().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["c", "b"]);
    }

    #[tokio::test]
    async fn unregister_is_by_identity_and_absent_is_noop() {
        let registry = ClientRegistry::new();
        let node = MockExecutionNode::with_difficulty("a", 0);
        let registered = node.client();
        // Same backing node and name, different handle.
        let other_handle = node.client();
        registry.register(registered.clone()).await;

        assert!(!registry.unregister(&other_handle).await);
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(&registered).await);
        assert!(!registry.unregister(&registered).await);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn reads_do_not_wait_on_a_held_cycle_lock() {
        let registry = Arc::new(ClientRegistry::new());
        let [a, b] = ["a", "b"].map(|n| MockExecutionNode::with_difficulty(n, 0).client());
        registry.register(a.clone()).await;

        let held = registry.lock().await;
        let pending = tokio::spawn({
            let registry = registry.clone();
            async move { registry.register(b).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert!(Arc::ptr_eq(&registry.snapshot()[0], &a));
        assert!(!pending.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), pending).await.unwrap().unwrap();
        assert_eq!(registry.len(), 2);
    }
}
