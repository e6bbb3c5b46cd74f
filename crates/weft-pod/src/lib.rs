//! Pod synthesis for weft workflow steps
//!
//! Compiles a workflow [`Template`](weft_common::crd::Template) into an
//! [`ExecutionUnit`]: a Pod with a staging role (`init`), a monitor role
//! (`wait`), the user payload (`main`) and any sidecars, plus every volume
//! those roles mount. Submission treats an already-existing pod as success
//! since pod names are deterministic per workflow node.
//!
//! ```text
//! Template + WorkflowContext
//!        │
//!        ▼
//!   PodCompiler::compile ──► ExecutionUnit ──► submit(PodClient) ──► Created | AlreadyExists
//! ```

#![deny(missing_docs)]

pub mod artifacts;
pub mod compiler;
pub mod context;
pub mod roles;
pub mod submit;
pub mod unit;
pub mod volumes;

pub use compiler::PodCompiler;
pub use context::WorkflowContext;
pub use submit::{
    compile_and_submit, submit, CreateError, KubePodClient, PodClient, SubmitOutcome,
    DEFAULT_SUBMIT_TIMEOUT,
};
pub use unit::ExecutionUnit;
