//! In-memory catalog.
//!
//! Thread-safe reference implementation of [`HealthResolver`]. The join yields
//! one view per service instance on a node, carrying the node-level checks
//! followed by that instance's own checks.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::catalog::{HealthCheck, HealthView, Node, NodeId, ServiceInstance};
use crate::error::ResolverError;

use super::traits::{CatalogSnapshot, HealthResolver, ViewFilter};

fn lock_err(context: &'static str) -> ResolverError {
    ResolverError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Clone)]
struct NodeEntry {
    node: Node,
    // Keyed by instance id so views come out in a stable order.
    services: BTreeMap<String, ServiceInstance>,
    checks: BTreeMap<String, HealthCheck>,
}

#[derive(Debug, Default)]
struct CatalogState {
    nodes: BTreeMap<NodeId, NodeEntry>,
}

/// Thread-safe in-memory catalog.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
}

impl MemoryCatalog {
    /// Create a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a node, keeping its services and checks.
    pub fn register_node(&self, node: Node) -> Result<(), ResolverError> {
        let mut state = self.state.write().map_err(|_| lock_err("catalog.register_node"))?;
        match state.nodes.get_mut(&node.node) {
            Some(entry) => entry.node = node,
            None => {
                state.nodes.insert(
                    node.node.clone(),
                    NodeEntry {
                        node,
                        services: BTreeMap::new(),
                        checks: BTreeMap::new(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Register or replace a service instance on an existing node.
    pub fn register_service(&self, node: &NodeId, service: ServiceInstance) -> Result<(), ResolverError> {
        let mut state = self.state.write().map_err(|_| lock_err("catalog.register_service"))?;
        let entry = state
            .nodes
            .get_mut(node)
            .ok_or_else(|| ResolverError::NodeNotFound(node.clone()))?;
        entry.services.insert(service.id.clone(), service);
        Ok(())
    }

    /// Register or replace a check on its node.
    ///
    /// Service-level checks must reference an instance registered on the node.
    pub fn register_check(&self, check: HealthCheck) -> Result<(), ResolverError> {
        let mut state = self.state.write().map_err(|_| lock_err("catalog.register_check"))?;
        let entry = state
            .nodes
            .get_mut(&check.node)
            .ok_or_else(|| ResolverError::NodeNotFound(check.node.clone()))?;
        if !check.is_node_level() && !entry.services.contains_key(&check.service_id) {
            return Err(ResolverError::Backend(format!(
                "check {} references unknown service instance {} on node {}",
                check.check_id, check.service_id, check.node
            )));
        }
        entry.checks.insert(check.check_id.clone(), check);
        Ok(())
    }

    /// Remove a node with all its services and checks. Returns whether it existed.
    pub fn deregister_node(&self, node: &NodeId) -> Result<bool, ResolverError> {
        let mut state = self.state.write().map_err(|_| lock_err("catalog.deregister_node"))?;
        Ok(state.nodes.remove(node).is_some())
    }

    /// Remove a service instance and its checks. Returns whether it existed.
    pub fn deregister_service(&self, node: &NodeId, service_id: &str) -> Result<bool, ResolverError> {
        let mut state = self.state.write().map_err(|_| lock_err("catalog.deregister_service"))?;
        let Some(entry) = state.nodes.get_mut(node) else {
            return Ok(false);
        };
        let existed = entry.services.remove(service_id).is_some();
        entry.checks.retain(|_, c| c.service_id != service_id);
        Ok(existed)
    }

    /// Remove a check. Returns whether it existed.
    pub fn deregister_check(&self, node: &NodeId, check_id: &str) -> Result<bool, ResolverError> {
        let mut state = self.state.write().map_err(|_| lock_err("catalog.deregister_check"))?;
        Ok(state
            .nodes
            .get_mut(node)
            .is_some_and(|entry| entry.checks.remove(check_id).is_some()))
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> Result<usize, ResolverError> {
        let state = self.state.read().map_err(|_| lock_err("catalog.node_count"))?;
        Ok(state.nodes.len())
    }
}

impl HealthResolver for MemoryCatalog {
    fn resolve(&self, node: &NodeId, filter: &ViewFilter) -> Result<Vec<HealthView>, ResolverError> {
        let state = self.state.read().map_err(|_| lock_err("catalog.resolve"))?;
        let entry = state
            .nodes
            .get(node)
            .ok_or_else(|| ResolverError::NodeNotFound(node.clone()))?;

        let node_checks: Vec<&HealthCheck> =
            entry.checks.values().filter(|c| c.is_node_level()).collect();

        let views = entry
            .services
            .values()
            .filter(|svc| !filter.connect || svc.is_connect_capable())
            .map(|svc| {
                let checks = node_checks
                    .iter()
                    .copied()
                    .chain(entry.checks.values().filter(|c| c.service_id == svc.id))
                    .cloned()
                    .collect();
                HealthView {
                    node: entry.node.clone(),
                    service: Some(svc.clone()),
                    checks,
                }
            })
            .collect();

        Ok(views)
    }
}

impl CatalogSnapshot for MemoryCatalog {
    fn node_ids(&self) -> Result<Vec<NodeId>, ResolverError> {
        let state = self.state.read().map_err(|_| lock_err("catalog.node_ids"))?;
        Ok(state.nodes.keys().cloned().collect())
    }
}
