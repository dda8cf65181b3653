//! Catalog entity types.
//!
//! These are the read-only shapes the pipeline sees: node identities and the
//! denormalized health views a resolver produces for them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ContractViolation;

/// Stable key identifying a catalog node, independent of its services.
///
/// Never empty. Every mutation record is scoped to exactly one `NodeId`.
///
/// # Examples
///
/// ```
/// use healthstream::NodeId;
///
/// let id = NodeId::new("node-1").unwrap();
/// assert_eq!(id.as_str(), "node-1");
/// assert!(NodeId::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node identity, rejecting the empty string.
    pub fn new(name: impl Into<String>) -> Result<Self, ContractViolation> {
        let name = name.into();
        if name.is_empty() {
            return Err(ContractViolation::EmptyNodeId);
        }
        Ok(Self(name))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeId {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A catalog node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The node identity (name).
    pub node: NodeId,
    /// Optional machine-level UUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Network address.
    #[serde(default)]
    pub address: String,
    /// Datacenter the node is registered in.
    #[serde(default)]
    pub datacenter: String,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl Node {
    /// Creates a node with just an identity and an address.
    #[must_use]
    pub fn new(node: NodeId, address: impl Into<String>) -> Self {
        Self {
            node,
            id: None,
            address: address.into(),
            datacenter: String::new(),
            meta: BTreeMap::new(),
        }
    }
}

/// Kind of a service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    /// A regular service.
    #[default]
    Typical,
    /// A sidecar proxy fronting another service.
    ConnectProxy,
    /// A mesh gateway.
    MeshGateway,
    /// A terminating gateway.
    TerminatingGateway,
    /// An ingress gateway.
    IngressGateway,
}

impl ServiceKind {
    /// Returns true for proxies and gateways.
    #[must_use]
    pub const fn is_proxy_or_gateway(self) -> bool {
        !matches!(self, Self::Typical)
    }
}

/// A service instance registered on a node.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub kind: ServiceKind,
    #[serde(default)]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// The service speaks the mesh protocol natively.
    #[serde(default)]
    pub connect_native: bool,
    /// For sidecar proxies: the service being proxied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl ServiceInstance {
    /// Creates a typical service whose instance id equals its name.
    #[must_use]
    pub fn new(service: impl Into<String>, port: u16) -> Self {
        let service = service.into();
        Self {
            id: service.clone(),
            service,
            kind: ServiceKind::Typical,
            port,
            tags: Vec::new(),
            connect_native: false,
            destination: None,
        }
    }

    /// Returns true if this instance belongs in a connect-aware view.
    #[must_use]
    pub const fn is_connect_capable(&self) -> bool {
        self.connect_native || self.kind.is_proxy_or_gateway()
    }
}

/// Health check state, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    #[default]
    Passing,
    Warning,
    Critical,
    /// Node or service is in maintenance mode.
    Maintenance,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passing => write!(f, "passing"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// A single health check result.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub node: NodeId,
    pub check_id: String,
    pub name: String,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    /// Empty for node-level checks.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_id: String,
}

impl HealthCheck {
    /// Returns true if the check applies to the whole node.
    #[must_use]
    pub fn is_node_level(&self) -> bool {
        self.service_id.is_empty()
    }
}

/// Denormalized health snapshot for one service instance on one node, or for
/// the bare node when `service` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthView {
    /// The node the view belongs to.
    pub node: Node,
    /// The service instance, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInstance>,
    /// Node-level checks followed by the service's own checks.
    #[serde(default)]
    pub checks: Vec<HealthCheck>,
}

impl HealthView {
    /// The identity of the node this view describes.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node.node
    }

    /// Service name used as the routing key, empty for bare nodes.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.service.as_ref().map_or("", |s| s.service.as_str())
    }

    /// Worst status across all checks, `Passing` when there are none.
    #[must_use]
    pub fn aggregate_status(&self) -> CheckStatus {
        self.checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(node: &NodeId, id: &str, status: CheckStatus) -> HealthCheck {
        HealthCheck {
            node: node.clone(),
            check_id: id.to_string(),
            name: id.to_string(),
            status,
            output: String::new(),
            service_id: String::new(),
        }
    }

    #[test]
    fn node_id_rejects_empty() {
        assert_eq!(NodeId::new(""), Err(ContractViolation::EmptyNodeId));
        assert_eq!(NodeId::new("a").unwrap().to_string(), "a");
    }

    #[test]
    fn node_id_deserialization_rejects_empty() {
        let err = serde_json::from_str::<NodeId>("\"\"").unwrap_err();
        assert!(err.to_string().contains("empty"));

        let id: NodeId = serde_json::from_str("\"web-1\"").unwrap();
        assert_eq!(id.as_str(), "web-1");
    }

    #[test]
    fn aggregate_status_is_worst_check() {
        let node = NodeId::new("n1").unwrap();
        let mut view = HealthView {
            node: Node::new(node.clone(), "10.0.0.1"),
            service: None,
            checks: Vec::new(),
        };
        assert_eq!(view.aggregate_status(), CheckStatus::Passing);

        view.checks.push(check(&node, "serf", CheckStatus::Passing));
        view.checks.push(check(&node, "disk", CheckStatus::Critical));
        view.checks.push(check(&node, "mem", CheckStatus::Warning));
        assert_eq!(view.aggregate_status(), CheckStatus::Critical);
    }

    #[test]
    fn service_name_is_empty_for_bare_node() {
        let node = NodeId::new("n1").unwrap();
        let mut view = HealthView {
            node: Node::new(node, "10.0.0.1"),
            service: None,
            checks: Vec::new(),
        };
        assert_eq!(view.service_name(), "");

        view.service = Some(ServiceInstance::new("web", 80));
        assert_eq!(view.service_name(), "web");
    }

    #[test]
    fn connect_capability() {
        let mut svc = ServiceInstance::new("web", 80);
        assert!(!svc.is_connect_capable());

        svc.connect_native = true;
        assert!(svc.is_connect_capable());

        let mut proxy = ServiceInstance::new("web-sidecar-proxy", 21000);
        proxy.kind = ServiceKind::ConnectProxy;
        proxy.destination = Some("web".to_string());
        assert!(proxy.is_connect_capable());
    }
}
