//! Network topology: VPC, subnet kinds, security boundaries and paired
//! rules.
//!
//! Stateful stores only ever land in isolated subnets; anything needing
//! outbound internet access lands in egress-capable subnets. Subnet
//! selection is always by kind, never by identifier.

use serde::{Deserialize, Serialize};

use weft_graph::{Attr, ResourceKind, ResourceOutputs, ResourceSpec};

use crate::error::{CloudError, CloudResult};

/// PostgreSQL port used for store reachability rules.
pub const DB_PORT: u16 = 5432;

/// Subnet placement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetKind {
    /// Routable from the internet.
    Public,
    /// No inbound route, outbound egress through NAT.
    PrivateWithEgress,
    /// No route to the internet in either direction.
    PrivateIsolated,
}

impl SubnetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetKind::Public => "public",
            SubnetKind::PrivateWithEgress => "private_with_egress",
            SubnetKind::PrivateIsolated => "private_isolated",
        }
    }

    /// Output key under which the provisioner reports this kind's
    /// subnet ids (as a JSON array).
    pub fn output_key(&self) -> &'static str {
        match self {
            SubnetKind::Public => "public_subnet_ids",
            SubnetKind::PrivateWithEgress => "egress_subnet_ids",
            SubnetKind::PrivateIsolated => "isolated_subnet_ids",
        }
    }
}

/// Requested network topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Availability zones to spread subnets across.
    pub max_azs: usize,
    /// NAT gateways for the egress-capable subnets.
    pub nat_gateways: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_azs: 2,
            nat_gateways: 1,
        }
    }
}

impl NetworkConfig {
    /// Check isolation constraints before any dependent resource exists.
    pub fn validate(&self) -> CloudResult<()> {
        if self.max_azs < 2 {
            return Err(CloudError::TopologyUnsatisfiable(format!(
                "isolated subnets require at least 2 availability zones, got {}",
                self.max_azs
            )));
        }
        if self.nat_gateways == 0 {
            return Err(CloudError::TopologyUnsatisfiable(
                "egress-capable subnets require at least one NAT gateway".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the network resource spec.
    pub fn to_spec(&self, name: &str) -> CloudResult<ResourceSpec> {
        self.validate()?;
        Ok(ResourceSpec::new(name, ResourceKind::Network)
            .with_property("max_azs", Attr::lit(self.max_azs.to_string()))
            .with_property("nat_gateways", Attr::lit(self.nat_gateways.to_string())))
    }
}

/// Queryable view over a created network's outputs.
#[derive(Debug, Clone)]
pub struct NetworkHandle {
    pub vpc_id: String,
    public: Vec<String>,
    egress: Vec<String>,
    isolated: Vec<String>,
}

impl NetworkHandle {
    /// Parse a handle from the network resource's outputs.
    pub fn from_outputs(outputs: &ResourceOutputs) -> CloudResult<Self> {
        let vpc_id = outputs
            .get("id")
            .ok_or_else(|| CloudError::MalformedOutput("network id".to_string()))?
            .to_string();
        let parse = |key: &str| -> CloudResult<Vec<String>> {
            let raw = outputs
                .get(key)
                .ok_or_else(|| CloudError::MalformedOutput(key.to_string()))?;
            serde_json::from_str(raw).map_err(|e| CloudError::Serialization(e.to_string()))
        };
        Ok(Self {
            vpc_id,
            public: parse(SubnetKind::Public.output_key())?,
            egress: parse(SubnetKind::PrivateWithEgress.output_key())?,
            isolated: parse(SubnetKind::PrivateIsolated.output_key())?,
        })
    }

    /// Subnet ids by kind.
    pub fn subnet_ids(&self, kind: SubnetKind) -> &[String] {
        match kind {
            SubnetKind::Public => &self.public,
            SubnetKind::PrivateWithEgress => &self.egress,
            SubnetKind::PrivateIsolated => &self.isolated,
        }
    }
}

/// Traffic direction of a network rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ingress,
    Egress,
}

/// A single rule between two security boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRule {
    /// Boundary the rule is attached to.
    pub boundary: String,
    /// Boundary on the other side.
    pub peer: String,
    pub port: u16,
    pub direction: Direction,
}

impl NetworkRule {
    /// Stable string form stored on the boundary's resource spec.
    pub fn encode(&self) -> String {
        let dir = match self.direction {
            Direction::Ingress => "ingress",
            Direction::Egress => "egress",
        };
        format!("{dir}:tcp:{}:peer={}", self.port, self.peer)
    }
}

/// Rules are always created in matched ingress/egress pairs so a
/// principal on either side can both initiate and complete the
/// connection.
pub fn rule_pair(boundary_a: &str, boundary_b: &str, port: u16) -> [NetworkRule; 2] {
    [
        NetworkRule {
            boundary: boundary_a.to_string(),
            peer: boundary_b.to_string(),
            port,
            direction: Direction::Ingress,
        },
        NetworkRule {
            boundary: boundary_b.to_string(),
            peer: boundary_a.to_string(),
            port,
            direction: Direction::Egress,
        },
    ]
}

/// Verify the pairing invariant over a topology's full rule set.
pub fn verify_paired(rules: &[NetworkRule]) -> CloudResult<()> {
    for rule in rules {
        let reverse_direction = match rule.direction {
            Direction::Ingress => Direction::Egress,
            Direction::Egress => Direction::Ingress,
        };
        let paired = rules.iter().any(|r| {
            r.boundary == rule.peer
                && r.peer == rule.boundary
                && r.port == rule.port
                && r.direction == reverse_direction
        });
        if !paired {
            return Err(CloudError::UnpairedRule(rule.encode()));
        }
    }
    Ok(())
}

/// Build a security boundary spec inside a network.
pub fn boundary_spec(name: &str, network: &str, rules: &[NetworkRule]) -> ResourceSpec {
    let mut spec = ResourceSpec::new(name, ResourceKind::SecurityBoundary)
        .with_property("vpc", Attr::output(network, "id"));
    for (i, rule) in rules.iter().filter(|r| r.boundary == name).enumerate() {
        spec = spec.with_property(format!("rule_{i}"), Attr::lit(rule.encode()));
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_az_topology_is_rejected_before_build() {
        let config = NetworkConfig {
            max_azs: 1,
            ..NetworkConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CloudError::TopologyUnsatisfiable(_)));
        assert!(config.to_spec("vpc").is_err());
    }

    #[test]
    fn handle_selects_subnets_by_kind() {
        let outputs = ResourceOutputs::new()
            .with("id", "vpc-1234")
            .with("public_subnet_ids", r#"["subnet-pub-a"]"#)
            .with("egress_subnet_ids", r#"["subnet-egr-a","subnet-egr-b"]"#)
            .with("isolated_subnet_ids", r#"["subnet-iso-a","subnet-iso-b"]"#);

        let handle = NetworkHandle::from_outputs(&outputs).unwrap();
        assert_eq!(handle.vpc_id, "vpc-1234");
        assert_eq!(handle.subnet_ids(SubnetKind::PrivateWithEgress).len(), 2);
        assert_eq!(
            handle.subnet_ids(SubnetKind::PrivateIsolated),
            ["subnet-iso-a", "subnet-iso-b"]
        );
    }

    #[test]
    fn rule_pairs_always_match() {
        let rules = rule_pair("agent-db-sg", "processing-sg", DB_PORT);
        assert_eq!(rules[0].direction, Direction::Ingress);
        assert_eq!(rules[1].direction, Direction::Egress);
        verify_paired(&rules).unwrap();
    }

    #[test]
    fn unpaired_rule_fails_verification() {
        let rules = [NetworkRule {
            boundary: "agent-db-sg".to_string(),
            peer: "processing-sg".to_string(),
            port: DB_PORT,
            direction: Direction::Ingress,
        }];
        let err = verify_paired(&rules).unwrap_err();
        assert!(matches!(err, CloudError::UnpairedRule(_)));
    }
}
