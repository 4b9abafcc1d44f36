//! Resource node definitions: kinds, removal policies, property values
//! and identifying outputs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

/// Kind of a provisioned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Network,
    SecurityBoundary,
    RelationalStore,
    Secret,
    KeyValueTable,
    ObjectStore,
    ComputeFunction,
    UserPool,
    UserPoolClient,
    RestApi,
    Parameter,
    ManagedPolicy,
    Repository,
    WebApp,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::SecurityBoundary => "security_boundary",
            ResourceKind::RelationalStore => "relational_store",
            ResourceKind::Secret => "secret",
            ResourceKind::KeyValueTable => "key_value_table",
            ResourceKind::ObjectStore => "object_store",
            ResourceKind::ComputeFunction => "compute_function",
            ResourceKind::UserPool => "user_pool",
            ResourceKind::UserPoolClient => "user_pool_client",
            ResourceKind::RestApi => "rest_api",
            ResourceKind::Parameter => "parameter",
            ResourceKind::ManagedPolicy => "managed_policy",
            ResourceKind::Repository => "repository",
            ResourceKind::WebApp => "web_app",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happens to a resource when its topology is torn down.
///
/// Stores default to `Destroy` for development convenience; flipping a
/// topology to `Retain` is a single-point configuration override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    #[default]
    Destroy,
    Retain,
}

/// A property value on a resource spec.
///
/// Values are either literals, lists, or references to another node's
/// output. A reference is resolvable only after the target resource has
/// been created, which is how the graph encodes "outputs are undefined
/// until all dependencies have valid outputs".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attr {
    Literal { value: String },
    Output { resource: String, output: String },
    List { items: Vec<Attr> },
}

impl Attr {
    /// A literal string value.
    pub fn lit(value: impl Into<String>) -> Self {
        Attr::Literal { value: value.into() }
    }

    /// A reference to another resource's output.
    pub fn output(resource: impl Into<String>, output: impl Into<String>) -> Self {
        Attr::Output {
            resource: resource.into(),
            output: output.into(),
        }
    }

    /// A list of values, resolved to a JSON array of strings.
    pub fn list(items: impl IntoIterator<Item = Attr>) -> Self {
        Attr::List {
            items: items.into_iter().collect(),
        }
    }

    /// Names of the resources this value references.
    pub fn referenced_resources(&self) -> Vec<&str> {
        match self {
            Attr::Literal { .. } => Vec::new(),
            Attr::Output { resource, .. } => vec![resource.as_str()],
            Attr::List { items } => items
                .iter()
                .flat_map(|a| a.referenced_resources())
                .collect(),
        }
    }

    /// Resolve this value against the outputs of already-created resources.
    pub fn resolve(&self, outputs: &HashMap<String, ResourceOutputs>) -> GraphResult<String> {
        match self {
            Attr::Literal { value } => Ok(value.clone()),
            Attr::Output { resource, output } => {
                let res = outputs.get(resource).ok_or_else(|| GraphError::MissingOutput {
                    resource: resource.clone(),
                    output: output.clone(),
                })?;
                res.get(output)
                    .map(str::to_string)
                    .ok_or_else(|| GraphError::MissingOutput {
                        resource: resource.clone(),
                        output: output.clone(),
                    })
            }
            Attr::List { items } => {
                let values: Vec<String> = items
                    .iter()
                    .map(|a| a.resolve(outputs))
                    .collect::<GraphResult<_>>()?;
                serde_json::to_string(&values).map_err(|e| GraphError::Serialization(e.to_string()))
            }
        }
    }
}

/// Well-known output names populated by provisioners.
pub mod outputs {
    pub const ARN: &str = "arn";
    pub const NAME: &str = "name";
    pub const ENDPOINT: &str = "endpoint";
    pub const ID: &str = "id";
    pub const URL: &str = "url";
}

/// Identifying outputs of a created resource (ARN, name, endpoint, ...).
///
/// Populated exactly once by the provisioner at creation time and
/// immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceOutputs(BTreeMap<String, String>);

impl ResourceOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn arn(&self) -> Option<&str> {
        self.get(outputs::ARN)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(outputs::NAME)
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.get(outputs::ENDPOINT)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Specification of a single resource node in a topology graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Stable logical name, unique within the topology.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Removal policy applied at teardown.
    pub removal_policy: RemovalPolicy,
    /// Properties handed to the provisioner, resolved at creation time.
    pub properties: BTreeMap<String, Attr>,
    /// Explicit dependencies in addition to those implied by references.
    pub depends_on: BTreeSet<String>,
}

impl ResourceSpec {
    /// Create a new spec with default removal policy.
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            removal_policy: RemovalPolicy::default(),
            properties: BTreeMap::new(),
            depends_on: BTreeSet::new(),
        }
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Attr) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Add an explicit creation precondition.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.insert(name.into());
        self
    }

    /// All dependencies: explicit preconditions plus referenced resources.
    pub fn dependencies(&self) -> BTreeSet<&str> {
        let mut deps: BTreeSet<&str> = self.depends_on.iter().map(String::as_str).collect();
        for attr in self.properties.values() {
            deps.extend(attr.referenced_resources());
        }
        deps
    }

    /// Resolve all properties against already-created resource outputs.
    pub fn resolve_properties(
        &self,
        outputs: &HashMap<String, ResourceOutputs>,
    ) -> GraphResult<ResolvedProperties> {
        let mut values = BTreeMap::new();
        for (key, attr) in &self.properties {
            values.insert(key.clone(), attr.resolve(outputs)?);
        }
        Ok(ResolvedProperties { values })
    }
}

/// Property map after reference resolution, as handed to provisioners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProperties {
    pub values: BTreeMap<String, String>,
}

impl ResolvedProperties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}
