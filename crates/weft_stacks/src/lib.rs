//! Topology assembly for the agentic assistant: the backend stack
//! (network, stores, compute, identity, API) and the delivery stack
//! (hosted chat UI), connected only through the parameter channel.

pub mod backend;
pub mod config;
pub mod delivery;
pub mod error;

pub use backend::{BackendOutputs, BackendPlan, BackendTopology, BACKEND_TOPOLOGY};
pub use config::{DeployConfig, DEFAULT_MODEL_ID, DEFAULT_REGION};
pub use delivery::{DeliveryOutputs, DeliveryTopology, DELIVERY_TOPOLOGY};
pub use error::{StackError, StackResult};
