//! acltool: least-privilege access-control mutations for Windows events,
//! services, processes and files.
//!
//! The engine resolves an [`policy::AccessPolicy`] for a (kind, command),
//! enables only the privileges it names through [`privilege::SecurityContext`]
//! guards, opens a [`session`] with the minimal mask and either performs the
//! lifecycle action or hands the handle to the [`mutator`]. All OS access is
//! behind [`platform::Platform`].

pub mod acl;
pub mod cli;
pub mod config;
pub mod error;
pub mod mutator;
pub mod object;
pub mod orchestrator;
pub mod platform;
pub mod policy;
pub mod privilege;
pub mod report;
pub mod session;
pub mod sid;
pub mod testing;

pub use error::{AclError, AclResult};
pub use orchestrator::{Invocation, Orchestrator, Outcome};
