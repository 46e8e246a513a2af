//! Worker phases and controlled clients.

use hashbrown::HashMap;
use url::Url;

/// Dispatcher phase.
///
/// There is no installed-but-waiting phase: installation completes straight
/// back to Idle, ready for immediate activation, so a deployed update never
/// waits for open pages to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Registered, not yet installing or active.
    Idle,
    /// Precache population in progress.
    Installing,
    /// Generation sweep and client takeover in progress.
    Activating,
    /// Controlling pages and handling fetches.
    Active,
}

impl WorkerPhase {
    /// Check if fetch interception is allowed in this phase.
    pub fn can_handle_fetch(&self) -> bool {
        matches!(self, WorkerPhase::Active)
    }
}

impl std::fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerPhase::Idle => write!(f, "idle"),
            WorkerPhase::Installing => write!(f, "installing"),
            WorkerPhase::Activating => write!(f, "activating"),
            WorkerPhase::Active => write!(f, "active"),
        }
    }
}

/// An open page the worker can control.
#[derive(Debug, Clone)]
pub struct PageClient {
    /// Client ID.
    pub id: String,

    /// Page URL.
    pub url: Url,

    /// Whether this worker controls the page.
    pub controlled: bool,
}

/// Registry of open pages.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, PageClient>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open page as uncontrolled.
    pub fn add(&mut self, id: &str, url: Url) {
        self.clients.insert(
            id.to_string(),
            PageClient {
                id: id.to_string(),
                url,
                controlled: false,
            },
        );
    }

    /// Remove a page (tab closed).
    pub fn remove(&mut self, id: &str) -> Option<PageClient> {
        self.clients.remove(id)
    }

    /// Get a page by ID.
    pub fn get(&self, id: &str) -> Option<&PageClient> {
        self.clients.get(id)
    }

    /// Take control of every open page, including those opened before this
    /// worker activated. Returns the IDs that changed controller.
    pub fn claim(&mut self) -> Vec<String> {
        let mut claimed = Vec::new();
        for client in self.clients.values_mut() {
            if !client.controlled {
                client.controlled = true;
                claimed.push(client.id.clone());
            }
        }
        claimed
    }

    /// Number of controlled pages.
    pub fn controlled_count(&self) -> usize {
        self.clients.values().filter(|c| c.controlled).count()
    }

    /// Number of registered pages.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://example.com/about").unwrap()
    }

    #[test]
    fn test_only_active_phase_handles_fetch() {
        assert!(!WorkerPhase::Idle.can_handle_fetch());
        assert!(!WorkerPhase::Installing.can_handle_fetch());
        assert!(!WorkerPhase::Activating.can_handle_fetch());
        assert!(WorkerPhase::Active.can_handle_fetch());
    }

    #[test]
    fn test_claim_takes_over_existing_pages() {
        let mut registry = ClientRegistry::new();
        registry.add("tab-1", page_url());
        registry.add("tab-2", page_url());
        assert_eq!(registry.controlled_count(), 0);

        let mut claimed = registry.claim();
        claimed.sort();
        assert_eq!(claimed, vec!["tab-1", "tab-2"]);
        assert_eq!(registry.controlled_count(), 2);

        // A second claim is a no-op.
        assert!(registry.claim().is_empty());
    }

    #[test]
    fn test_add_remove() {
        let mut registry = ClientRegistry::new();
        registry.add("tab-1", page_url());
        assert_eq!(registry.len(), 1);
        assert!(registry.get("tab-1").is_some());

        let removed = registry.remove("tab-1").unwrap();
        assert_eq!(removed.id, "tab-1");
        assert!(registry.is_empty());
    }
}
