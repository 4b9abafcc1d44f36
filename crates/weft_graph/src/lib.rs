//! # weft_graph
//!
//! Typed resource graph and dependency-ordered deployment engine.
//!
//! A topology is declared as an explicit graph of [`ResourceSpec`] nodes
//! whose properties may reference other nodes' outputs. The graph is
//! validated (unique names, known dependencies, no cycles) before any
//! resource is touched, then deployed in topological waves through a
//! pluggable [`Provisioner`]. Deployment state is persisted per topology
//! so that re-running an unchanged graph converges without creating
//! anything.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use weft_graph::{Attr, Engine, ResourceKind, ResourceSpec, TopologyGraph};
//!
//! let mut graph = TopologyGraph::new();
//! graph.add(ResourceSpec::new("vpc", ResourceKind::Network))?;
//! graph.add(
//!     ResourceSpec::new("db", ResourceKind::RelationalStore)
//!         .depends_on("vpc"),
//! )?;
//!
//! let engine = Engine::new(Arc::new(provisioner), state_dir);
//! let (state, summary) = engine.deploy("backend", &graph).await?;
//! ```

pub mod error;
pub mod graph;
pub mod node;
pub mod provision;
pub mod state;

pub use error::{GraphError, GraphResult};
pub use graph::TopologyGraph;
pub use node::{
    outputs, Attr, RemovalPolicy, ResolvedProperties, ResourceKind, ResourceOutputs, ResourceSpec,
};
pub use provision::{DeploySummary, DestroySummary, Engine, Provisioner};
pub use state::{DeploymentState, ResourceRecord};
