//! Durable stores: relational cluster with generated credential secret,
//! session key-value table, artifact object store.

use serde::{Deserialize, Serialize};

use weft_graph::{Attr, RemovalPolicy, ResourceKind, ResourceSpec};

use crate::network::{SubnetKind, DB_PORT};

/// Relational cluster configuration.
///
/// The credential is always generated, never a literal password; the
/// secret is its own resource with its own identifier, readable only by
/// principals explicitly granted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalStoreConfig {
    pub engine_version: String,
    pub default_database: String,
    pub admin_username: String,
    pub port: u16,
}

impl Default for RelationalStoreConfig {
    fn default() -> Self {
        Self {
            engine_version: "aurora-postgresql-15.3".to_string(),
            default_database: "AgentSQLDBandVectorStore".to_string(),
            admin_username: "AgentDBAdmin".to_string(),
            port: DB_PORT,
        }
    }
}

impl RelationalStoreConfig {
    /// Spec for the generated credential secret.
    pub fn secret_spec(&self, name: &str, policy: RemovalPolicy) -> ResourceSpec {
        ResourceSpec::new(name, ResourceKind::Secret)
            .with_removal_policy(policy)
            .with_property("generated", Attr::lit("true"))
            .with_property("username", Attr::lit(&self.admin_username))
    }

    /// Spec for the cluster itself, placed in isolated subnets only.
    pub fn cluster_spec(
        &self,
        name: &str,
        network: &str,
        secret: &str,
        boundary: &str,
        policy: RemovalPolicy,
    ) -> ResourceSpec {
        ResourceSpec::new(name, ResourceKind::RelationalStore)
            .with_removal_policy(policy)
            .with_property("engine_version", Attr::lit(&self.engine_version))
            .with_property("database", Attr::lit(&self.default_database))
            .with_property("port", Attr::lit(self.port.to_string()))
            .with_property("credentials_secret", Attr::output(secret, "arn"))
            .with_property(
                "subnet_kind",
                Attr::lit(SubnetKind::PrivateIsolated.as_str()),
            )
            .with_property(
                "subnet_ids",
                Attr::output(network, SubnetKind::PrivateIsolated.output_key()),
            )
            .with_property("security_boundary", Attr::output(boundary, "id"))
    }
}

/// Session history table configuration.
///
/// History retrieval is always by exact session id, so a string
/// partition key with no secondary indexes is the whole contract;
/// capacity is on-demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValueTableConfig {
    pub partition_key: String,
}

impl Default for KeyValueTableConfig {
    fn default() -> Self {
        Self {
            partition_key: "SessionId".to_string(),
        }
    }
}

impl KeyValueTableConfig {
    pub fn to_spec(&self, name: &str, policy: RemovalPolicy) -> ResourceSpec {
        ResourceSpec::new(name, ResourceKind::KeyValueTable)
            .with_removal_policy(policy)
            .with_property("partition_key", Attr::lit(&self.partition_key))
            .with_property("partition_key_type", Attr::lit("string"))
            .with_property("billing", Attr::lit("pay_per_request"))
    }
}

/// Artifact bucket configuration. Never public; access is granted per
/// principal through the permission synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObjectStoreConfig {
    /// Delete objects together with the bucket on teardown.
    pub auto_delete_objects: bool,
}

impl ObjectStoreConfig {
    pub fn to_spec(&self, name: &str, policy: RemovalPolicy) -> ResourceSpec {
        // Auto-delete only ever pairs with Destroy; a retained bucket
        // keeps its objects.
        let auto_delete = self.auto_delete_objects && policy == RemovalPolicy::Destroy;
        ResourceSpec::new(name, ResourceKind::ObjectStore)
            .with_removal_policy(policy)
            .with_property("public_access", Attr::lit("blocked"))
            .with_property("auto_delete_objects", Attr::lit(auto_delete.to_string()))
    }
}
