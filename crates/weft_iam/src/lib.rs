//! # weft_iam
//!
//! Least-privilege permission synthesis.
//!
//! Each principal (the compute unit, or an external processing job)
//! declares a [`Wiring`]: the exact set of resources its logic touches.
//! [`synthesize`] turns a wiring into the minimal grant list and
//! [`verify`] checks a grant list against the wiring, permitting exactly
//! one unscoped selector: the managed model-invocation API, which the
//! platform cannot scope, and which must carry its justification.

pub mod error;
pub mod grant;
pub mod synthesizer;

pub use error::{IamError, IamResult};
pub use grant::{actions, Grant, Principal, ANY_RESOURCE};
pub use synthesizer::{synthesize, verify, Wiring, MODEL_INVOKE_JUSTIFICATION};
