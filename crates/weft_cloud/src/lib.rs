//! # weft_cloud
//!
//! Concrete resource models for the assistant topology: network with
//! subnet kinds and paired security rules, durable stores, the compute
//! unit and its invocation contract, identity provider binding, and the
//! public API gateway state machine. Ships a [`LocalProvisioner`] that
//! fabricates plausible identifiers behind the `weft_graph::Provisioner`
//! seam.

pub mod compute;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod network;
pub mod provisioner;
pub mod stores;

pub use compute::{
    invoke_with_limit, ComputeConfig, ComputeEnv, ComputeInvoker, InvocationError,
    InvocationOutcome, InvocationRequest,
};
pub use error::{CloudError, CloudResult};
pub use gateway::{rest_api_spec, ApiRequest, ApiResponse, CorsConfig, Gateway, RequestState};
pub use identity::{AuthError, Claims, IdentityConfig, StaticTokenValidator, TokenValidator};
pub use network::{
    boundary_spec, rule_pair, verify_paired, Direction, NetworkConfig, NetworkHandle, NetworkRule,
    SubnetKind, DB_PORT,
};
pub use provisioner::{CapturedCreate, LocalProvisioner};
pub use stores::{KeyValueTableConfig, ObjectStoreConfig, RelationalStoreConfig};
