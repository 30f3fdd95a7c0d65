//! Active connection tracking

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

/// Random per-connection id, hex encoded
///
/// Doubles as the conversation thread id for the connection.
#[must_use]
pub fn new_thread_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[derive(Clone, Debug)]
struct ConnectionInfo {
    token: String,
    connected_at: Instant,
}

/// Authenticated connections currently open on the server
///
/// Cheap to clone; clones share state.
#[derive(Clone, Debug, Default)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<String, ConnectionInfo>>,
}

impl ConnectionRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection; it is removed when the guard drops
    #[must_use]
    pub fn register(&self, thread_id: String, token: String) -> RegistrationGuard {
        self.inner.insert(
            thread_id.clone(),
            ConnectionInfo {
                token,
                connected_at: Instant::now(),
            },
        );
        RegistrationGuard {
            registry: self.clone(),
            thread_id,
        }
    }

    /// Number of open connections
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no connection is open
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Tokens of the open connections, sorted
    #[must_use]
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.inner.iter().map(|e| e.value().token.clone()).collect();
        tokens.sort();
        tokens
    }

    /// Age of the oldest open connection
    #[must_use]
    pub fn oldest_age(&self) -> Option<std::time::Duration> {
        self.inner.iter().map(|e| e.value().connected_at.elapsed()).max()
    }
}

/// Removes a connection from the registry on drop
#[derive(Debug)]
pub struct RegistrationGuard {
    registry: ConnectionRegistry,
    thread_id: String,
}

impl RegistrationGuard {
    /// Id the connection was registered under
    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.inner.remove(&self.thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_thread_ids_are_random_hex() {
        let a = new_thread_id();
        let b = new_thread_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_guard_unregisters() {
        let registry = ConnectionRegistry::new();
        let first = registry.register(new_thread_id(), "T2".to_string());
        let second = registry.register(new_thread_id(), "T1".to_string());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tokens(), vec!["T1".to_string(), "T2".to_string()]);
        assert!(registry.oldest_age().is_some());

        drop(first);
        assert_eq!(registry.tokens(), vec!["T1".to_string()]);
        assert_eq!(second.thread_id().len(), 32);

        drop(second);
        assert!(registry.is_empty());
    }
}
