//! # weft_params
//!
//! Cross-topology parameter channel.
//!
//! The backend topology publishes resource identifiers (ARNs, names,
//! endpoint URLs) under the `/AgenticLLMAssistant` namespace; the
//! delivery topology, deployed independently and later, reads them to
//! discover the backend's public surface. The coupling is strictly
//! one-way: the backend does not know its readers exist.

pub mod channel;
pub mod error;
pub mod keys;

pub use channel::{
    ChannelBackend, FileBackend, InMemoryBackend, ParameterChannel, ParameterEntry,
};
pub use error::{ParamError, ParamResult};
