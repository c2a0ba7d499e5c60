//! Securable object kinds, the commands each kind accepts, and access masks.
//!
//! Commands are a closed variant per kind wrapped in [`Operation`], so every
//! table keyed on (kind, command) is an exhaustive `match` rather than a
//! lookup with a fallback.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::BitOr;

use crate::error::{AclError, AclResult};

/// Access rights bit values used by the resolver and the mutator.
pub mod rights {
    use super::AccessMask;

    pub const READ_CONTROL: AccessMask = AccessMask(0x0002_0000);
    pub const WRITE_DAC: AccessMask = AccessMask(0x0004_0000);
    pub const WRITE_OWNER: AccessMask = AccessMask(0x0008_0000);
    pub const SYNCHRONIZE: AccessMask = AccessMask(0x0010_0000);
    pub const GENERIC_READ: AccessMask = AccessMask(0x8000_0000);

    pub const EVENT_MODIFY_STATE: AccessMask = AccessMask(0x0002);
    pub const EVENT_ALL_ACCESS: AccessMask = AccessMask(0x001F_0003);

    pub const SC_MANAGER_CONNECT: AccessMask = AccessMask(0x0001);
    pub const SERVICE_QUERY_STATUS: AccessMask = AccessMask(0x0004);
    pub const SERVICE_START: AccessMask = AccessMask(0x0010);
    pub const SERVICE_STOP: AccessMask = AccessMask(0x0020);
    pub const SERVICE_ALL_ACCESS: AccessMask = AccessMask(0x000F_01FF);

    pub const PROCESS_TERMINATE: AccessMask = AccessMask(0x0001);
    pub const PROCESS_QUERY_INFORMATION: AccessMask = AccessMask(0x0400);
    pub const PROCESS_ALL_ACCESS: AccessMask = AccessMask(0x001F_FFFF);

    pub const FILE_GENERIC_READ: AccessMask = AccessMask(0x0012_0089);
    pub const FILE_ALL_ACCESS: AccessMask = AccessMask(0x001F_01FF);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMask(pub u32);

impl AccessMask {
    pub const NONE: AccessMask = AccessMask(0);

    #[inline]
    pub const fn bits(self) -> u32 { self.0 }

    #[inline]
    pub const fn contains(self, other: AccessMask) -> bool { self.0 & other.0 == other.0 }

    #[inline]
    pub const fn union(self, other: AccessMask) -> AccessMask { AccessMask(self.0 | other.0) }
}

impl BitOr for AccessMask {
    type Output = AccessMask;
    fn bitor(self, rhs: AccessMask) -> AccessMask { self.union(rhs) }
}

impl Display for AccessMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "0x{:x}", self.0) }
}

/// Object-type tag handed to the security-info APIs (`SE_OBJECT_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SecurityObjectType {
    File = 1,
    Service = 2,
    KernelObject = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Event,
    Service,
    Process,
    File,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 4] = [ObjectKind::Event, ObjectKind::Service, ObjectKind::Process, ObjectKind::File];

    /// Accepts `--event` style flags as well as the bare `event` spelling.
    pub fn parse(selector: &str) -> AclResult<Self> {
        match selector.trim_start_matches("--").to_ascii_lowercase().as_str() {
            "event" => Ok(ObjectKind::Event),
            "service" => Ok(ObjectKind::Service),
            "process" => Ok(ObjectKind::Process),
            "file" => Ok(ObjectKind::File),
            _ => Err(AclError::unknown_kind(
                "unknown_object_kind",
                format!("Unknown object type: {} (valid types: --event, --service, --process, --file)", selector),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Event => "event",
            ObjectKind::Service => "service",
            ObjectKind::Process => "process",
            ObjectKind::File => "file",
        }
    }

    pub fn security_type(&self) -> SecurityObjectType {
        match self {
            ObjectKind::Event | ObjectKind::Process => SecurityObjectType::KernelObject,
            ObjectKind::Service => SecurityObjectType::Service,
            ObjectKind::File => SecurityObjectType::File,
        }
    }

    /// Rights granted to SYSTEM by harden and to Everyone by weaken.
    pub fn full_access(&self) -> AccessMask {
        match self {
            ObjectKind::Event => rights::EVENT_ALL_ACCESS,
            ObjectKind::Service => rights::SERVICE_ALL_ACCESS,
            ObjectKind::Process => rights::PROCESS_ALL_ACCESS,
            ObjectKind::File => rights::FILE_ALL_ACCESS,
        }
    }

    /// Rights left to INTERACTIVE users by harden.
    pub fn interactive_access(&self) -> AccessMask {
        match self {
            ObjectKind::Event => rights::SYNCHRONIZE,
            ObjectKind::Service => rights::GENERIC_READ,
            ObjectKind::Process => rights::PROCESS_QUERY_INFORMATION,
            ObjectKind::File => rights::FILE_GENERIC_READ,
        }
    }

    pub fn command_names(&self) -> &'static [&'static str] {
        match self {
            ObjectKind::Event => &["set", "unset", "harden", "query", "takeown", "weaken"],
            ObjectKind::Service => &["start", "stop", "query", "harden", "takeown", "weaken"],
            ObjectKind::Process => &["terminate", "harden", "takeown", "weaken"],
            ObjectKind::File => &["harden", "takeown", "weaken"],
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCommand { Set, Unset, Harden, Query, TakeOwn, Weaken }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCommand { Start, Stop, Query, Harden, TakeOwn, Weaken }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessCommand { Terminate, Harden, TakeOwn, Weaken }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCommand { Harden, TakeOwn, Weaken }

/// The three security-descriptor mutations shared by every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation { Harden, TakeOwn, Weaken }

/// A command bound to the kind it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Event(EventCommand),
    Service(ServiceCommand),
    Process(ProcessCommand),
    File(FileCommand),
}

impl Operation {
    /// Parse a command name for `kind`; names outside the kind's set are `UnknownCommand`.
    pub fn parse(kind: ObjectKind, command: &str) -> AclResult<Self> {
        let op = match (kind, command) {
            (ObjectKind::Event, "set") => Some(Operation::Event(EventCommand::Set)),
            (ObjectKind::Event, "unset") => Some(Operation::Event(EventCommand::Unset)),
            (ObjectKind::Event, "harden") => Some(Operation::Event(EventCommand::Harden)),
            (ObjectKind::Event, "query") => Some(Operation::Event(EventCommand::Query)),
            (ObjectKind::Event, "takeown") => Some(Operation::Event(EventCommand::TakeOwn)),
            (ObjectKind::Event, "weaken") => Some(Operation::Event(EventCommand::Weaken)),
            (ObjectKind::Service, "start") => Some(Operation::Service(ServiceCommand::Start)),
            (ObjectKind::Service, "stop") => Some(Operation::Service(ServiceCommand::Stop)),
            (ObjectKind::Service, "query") => Some(Operation::Service(ServiceCommand::Query)),
            (ObjectKind::Service, "harden") => Some(Operation::Service(ServiceCommand::Harden)),
            (ObjectKind::Service, "takeown") => Some(Operation::Service(ServiceCommand::TakeOwn)),
            (ObjectKind::Service, "weaken") => Some(Operation::Service(ServiceCommand::Weaken)),
            (ObjectKind::Process, "terminate") => Some(Operation::Process(ProcessCommand::Terminate)),
            (ObjectKind::Process, "harden") => Some(Operation::Process(ProcessCommand::Harden)),
            (ObjectKind::Process, "takeown") => Some(Operation::Process(ProcessCommand::TakeOwn)),
            (ObjectKind::Process, "weaken") => Some(Operation::Process(ProcessCommand::Weaken)),
            (ObjectKind::File, "harden") => Some(Operation::File(FileCommand::Harden)),
            (ObjectKind::File, "takeown") => Some(Operation::File(FileCommand::TakeOwn)),
            (ObjectKind::File, "weaken") => Some(Operation::File(FileCommand::Weaken)),
            _ => None,
        };
        op.ok_or_else(|| AclError::unknown_command(
            "unknown_command",
            format!("Unknown {} command: {} (valid commands: {})", kind, command, kind.command_names().join(", ")),
        ))
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Operation::Event(_) => ObjectKind::Event,
            Operation::Service(_) => ObjectKind::Service,
            Operation::Process(_) => ObjectKind::Process,
            Operation::File(_) => ObjectKind::File,
        }
    }

    pub fn command_str(&self) -> &'static str {
        match self {
            Operation::Event(EventCommand::Set) => "set",
            Operation::Event(EventCommand::Unset) => "unset",
            Operation::Event(EventCommand::Query) | Operation::Service(ServiceCommand::Query) => "query",
            Operation::Service(ServiceCommand::Start) => "start",
            Operation::Service(ServiceCommand::Stop) => "stop",
            Operation::Process(ProcessCommand::Terminate) => "terminate",
            Operation::Event(EventCommand::Harden)
            | Operation::Service(ServiceCommand::Harden)
            | Operation::Process(ProcessCommand::Harden)
            | Operation::File(FileCommand::Harden) => "harden",
            Operation::Event(EventCommand::TakeOwn)
            | Operation::Service(ServiceCommand::TakeOwn)
            | Operation::Process(ProcessCommand::TakeOwn)
            | Operation::File(FileCommand::TakeOwn) => "takeown",
            Operation::Event(EventCommand::Weaken)
            | Operation::Service(ServiceCommand::Weaken)
            | Operation::Process(ProcessCommand::Weaken)
            | Operation::File(FileCommand::Weaken) => "weaken",
        }
    }

    /// The security-descriptor mutation this operation performs, if any.
    pub fn mutation(&self) -> Option<Mutation> {
        match self {
            Operation::Event(EventCommand::Harden)
            | Operation::Service(ServiceCommand::Harden)
            | Operation::Process(ProcessCommand::Harden)
            | Operation::File(FileCommand::Harden) => Some(Mutation::Harden),
            Operation::Event(EventCommand::TakeOwn)
            | Operation::Service(ServiceCommand::TakeOwn)
            | Operation::Process(ProcessCommand::TakeOwn)
            | Operation::File(FileCommand::TakeOwn) => Some(Mutation::TakeOwn),
            Operation::Event(EventCommand::Weaken)
            | Operation::Service(ServiceCommand::Weaken)
            | Operation::Process(ProcessCommand::Weaken)
            | Operation::File(FileCommand::Weaken) => Some(Mutation::Weaken),
            Operation::Event(EventCommand::Set | EventCommand::Unset | EventCommand::Query)
            | Operation::Service(ServiceCommand::Start | ServiceCommand::Stop | ServiceCommand::Query)
            | Operation::Process(ProcessCommand::Terminate) => None,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind(), self.command_str())
    }
}
