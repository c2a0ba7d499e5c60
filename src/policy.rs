//! Access policy resolution: which rights to open an object with and which
//! token privileges to hold while doing it, per (kind, command).

use serde::Serialize;

use crate::object::{rights, AccessMask, EventCommand, FileCommand, ObjectKind, Operation, ProcessCommand, ServiceCommand};
use crate::privilege::Privilege;

/// How the security-descriptor change or action reaches the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    /// Through a handle opened with `open_access`.
    Handle,
    /// By name; no handle is opened.
    ByName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPolicy {
    pub open_access: AccessMask,
    /// Acquired in this order, released in reverse.
    pub privileges: Vec<Privilege>,
    pub target: TargetMode,
}

impl AccessPolicy {
    fn handle(open_access: AccessMask, privileges: &[Privilege]) -> Self {
        Self { open_access, privileges: privileges.to_vec(), target: TargetMode::Handle }
    }
}

const DAC_AND_OWNER: AccessMask = rights::WRITE_DAC.union(rights::WRITE_OWNER);

/// Pure table lookup; performs no I/O.
pub fn resolve(op: Operation) -> AccessPolicy {
    use Privilege::{Debug, Restore, TakeOwnership};
    match op {
        Operation::Event(cmd) => match cmd {
            EventCommand::Set | EventCommand::Unset => AccessPolicy::handle(rights::EVENT_MODIFY_STATE, &[]),
            EventCommand::Query => AccessPolicy::handle(rights::SYNCHRONIZE, &[]),
            EventCommand::Harden => AccessPolicy::handle(DAC_AND_OWNER, &[TakeOwnership, Restore]),
            EventCommand::TakeOwn => AccessPolicy::handle(rights::WRITE_OWNER, &[TakeOwnership]),
            EventCommand::Weaken => AccessPolicy::handle(rights::WRITE_DAC, &[]),
        },
        Operation::Service(cmd) => match cmd {
            ServiceCommand::Start => AccessPolicy::handle(rights::SERVICE_START, &[]),
            ServiceCommand::Stop => AccessPolicy::handle(rights::SERVICE_STOP, &[]),
            ServiceCommand::Query => AccessPolicy::handle(rights::SERVICE_QUERY_STATUS, &[]),
            ServiceCommand::Harden => AccessPolicy::handle(DAC_AND_OWNER, &[TakeOwnership, Restore]),
            ServiceCommand::TakeOwn => AccessPolicy::handle(rights::WRITE_OWNER, &[TakeOwnership]),
            ServiceCommand::Weaken => AccessPolicy::handle(rights::WRITE_DAC, &[]),
        },
        // Debug always comes first for processes.
        Operation::Process(cmd) => match cmd {
            ProcessCommand::Terminate => AccessPolicy::handle(rights::PROCESS_TERMINATE, &[Debug]),
            ProcessCommand::Harden => AccessPolicy::handle(DAC_AND_OWNER, &[Debug, Restore]),
            ProcessCommand::TakeOwn => AccessPolicy::handle(rights::WRITE_OWNER, &[Debug]),
            ProcessCommand::Weaken => AccessPolicy::handle(rights::WRITE_DAC, &[Debug]),
        },
        Operation::File(cmd) => match cmd {
            FileCommand::Harden => AccessPolicy::handle(DAC_AND_OWNER, &[TakeOwnership, Restore]),
            FileCommand::TakeOwn => AccessPolicy::handle(rights::WRITE_OWNER, &[TakeOwnership, Restore]),
            FileCommand::Weaken => AccessPolicy {
                open_access: rights::WRITE_DAC,
                privileges: vec![TakeOwnership, Restore],
                target: TargetMode::ByName,
            },
        },
    }
}

/// Resolve from command-line spellings. Unknown commands fail before anything is acquired.
pub fn resolve_named(kind: ObjectKind, command: &str) -> crate::error::AclResult<(Operation, AccessPolicy)> {
    let op = Operation::parse(kind, command)?;
    Ok((op, resolve(op)))
}
