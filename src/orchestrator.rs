//! Command orchestration.
//!
//! One invocation moves through
//! `Resolved -> PrivilegesAcquired -> SessionOpened | ByNameTargeted -> ActionExecuted -> Released`.
//! Validation (kind, command, process name) happens entirely in `Resolved`,
//! before any privilege or handle is touched. Sessions close before the
//! privileges are released, and privileges are released on every path.

use serde::Serialize;
use tracing::debug;

use crate::error::AclResult;
use crate::mutator::{self, MutationRecord};
use crate::object::{EventCommand, FileCommand, Mutation, ObjectKind, Operation, ProcessCommand, ServiceCommand};
use crate::platform::{self, Platform, SecurityTarget};
use crate::policy::{self, AccessPolicy, TargetMode};
use crate::privilege::{PrivilegeStack, SecurityContext};
use crate::session::{qualify_event_name, EventSession, EventState, FileSession, ProcessSession, ServiceSession, ServiceState};

pub const DEFAULT_EVENT_NAMESPACE: &str = "Global";

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub kind: ObjectKind,
    /// Event or service name, PID or process image name, or file path.
    pub target: String,
    pub command: String,
}

impl Invocation {
    pub fn new(kind: ObjectKind, target: impl Into<String>, command: impl Into<String>) -> Self {
        Self { kind, target: target.into(), command: command.into() }
    }
}

/// What the action produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Detail {
    Completed,
    EventState { state: EventState },
    ServiceState { state: ServiceState },
    Security { dacl: Option<String>, owner: Option<String> },
}

impl From<MutationRecord> for Detail {
    fn from(rec: MutationRecord) -> Self { Detail::Security { dacl: rec.dacl, owner: rec.owner } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub kind: ObjectKind,
    /// The object as addressed: qualified event name, service name, PID or path.
    pub target: String,
    #[serde(rename = "command", serialize_with = "serialize_command")]
    pub operation: Operation,
    pub detail: Detail,
}

fn serialize_command<S: serde::Serializer>(op: &Operation, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(op.command_str())
}

impl Outcome {
    pub fn command(&self) -> &'static str { self.operation.command_str() }

    /// The line printed on success.
    pub fn summary(&self) -> String {
        let noun = match self.kind {
            ObjectKind::Event => "Event",
            ObjectKind::Service => "Service",
            ObjectKind::Process => "Process",
            ObjectKind::File => "File",
        };
        match self.operation {
            Operation::Event(EventCommand::Set) => "Event set successfully".to_string(),
            Operation::Event(EventCommand::Unset) => "Event reset successfully".to_string(),
            Operation::Event(EventCommand::Query) => match &self.detail {
                Detail::EventState { state } => format!("Event state  : {}", state),
                _ => "Event state  : unavailable".to_string(),
            },
            Operation::Service(ServiceCommand::Start) => "Service started successfully".to_string(),
            Operation::Service(ServiceCommand::Stop) => "Service stopped successfully".to_string(),
            Operation::Service(ServiceCommand::Query) => match &self.detail {
                Detail::ServiceState { state } => format!("Service state: {}", state),
                _ => "Service state: unavailable".to_string(),
            },
            Operation::Process(ProcessCommand::Terminate) => "Process terminated successfully".to_string(),
            Operation::Event(EventCommand::Harden)
            | Operation::Service(ServiceCommand::Harden)
            | Operation::Process(ProcessCommand::Harden)
            | Operation::File(FileCommand::Harden) => format!("{} ACL hardened successfully", noun),
            Operation::Event(EventCommand::TakeOwn)
            | Operation::Service(ServiceCommand::TakeOwn)
            | Operation::Process(ProcessCommand::TakeOwn)
            | Operation::File(FileCommand::TakeOwn) => format!("{} ownership transferred to Administrators", noun),
            Operation::Event(EventCommand::Weaken)
            | Operation::Service(ServiceCommand::Weaken)
            | Operation::Process(ProcessCommand::Weaken)
            | Operation::File(FileCommand::Weaken) => {
                format!("{} ACL weakened successfully (Everyone has full access)", noun)
            }
        }
    }
}

/// The addressed object after name resolution.
enum ResolvedTarget {
    Name(String),
    Pid(u32),
}

impl ResolvedTarget {
    fn display(&self) -> String {
        match self {
            ResolvedTarget::Name(n) => n.clone(),
            ResolvedTarget::Pid(pid) => pid.to_string(),
        }
    }
}

pub struct Orchestrator<'p> {
    platform: &'p dyn Platform,
    event_namespace: String,
}

impl<'p> Orchestrator<'p> {
    pub fn new(platform: &'p dyn Platform) -> Self {
        Self { platform, event_namespace: DEFAULT_EVENT_NAMESPACE.to_string() }
    }

    pub fn with_event_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.event_namespace = namespace.into();
        self
    }

    pub fn run(&self, inv: &Invocation) -> AclResult<Outcome> {
        let op = Operation::parse(inv.kind, &inv.command)?;
        let policy = policy::resolve(op);
        let target = self.resolve_target(op.kind(), &inv.target)?;
        debug!(
            target: "acltool::orchestrator",
            state = "resolved",
            operation = %op,
            access = %policy.open_access,
            privileges = ?policy.privileges,
            mode = ?policy.target
        );

        let ctx = SecurityContext::new(self.platform);
        let privileges = ctx.acquire_all(&policy.privileges)?;
        debug!(target: "acltool::orchestrator", state = "privileges_acquired", held = ?privileges.privileges());

        let result = self.execute(op, &policy, &target);
        release(privileges);

        let detail = result?;
        Ok(Outcome { kind: op.kind(), target: target.display(), operation: op, detail })
    }

    fn resolve_target(&self, kind: ObjectKind, raw: &str) -> AclResult<ResolvedTarget> {
        Ok(match kind {
            ObjectKind::Event => ResolvedTarget::Name(qualify_event_name(&self.event_namespace, raw)),
            ObjectKind::Process => ResolvedTarget::Pid(platform::resolve_process(self.platform, raw)?),
            ObjectKind::Service | ObjectKind::File => ResolvedTarget::Name(raw.to_string()),
        })
    }

    fn execute(&self, op: Operation, policy: &AccessPolicy, target: &ResolvedTarget) -> AclResult<Detail> {
        let kind = op.kind();
        let p = self.platform;

        if policy.target == TargetMode::ByName {
            let name = target.display();
            let mutation = match op.mutation() {
                Some(m) => m,
                None => return Err(crate::error::AclError::unsupported(op.to_string(), "by-name targeting applies only to security mutations")),
            };
            println!("Targeting {}: {} by name", kind, name);
            debug!(target: "acltool::orchestrator", state = "by_name_targeted", object = %name);
            let detail = Detail::from(mutator::apply(p, mutation, &SecurityTarget::Named(&name), kind)?);
            debug!(target: "acltool::orchestrator", state = "action_executed");
            return Ok(detail);
        }

        println!("Opening {}: {} with permissions: {}", kind, target.display(), policy.open_access);
        let mask = policy.open_access;
        let detail = match (op, target) {
            (Operation::Event(cmd), ResolvedTarget::Name(name)) => {
                let session = EventSession::open(p, name, mask)?;
                opened(kind);
                match cmd {
                    EventCommand::Set => session.set().map(|_| Detail::Completed),
                    EventCommand::Unset => session.unset().map(|_| Detail::Completed),
                    EventCommand::Query => session.query().map(|state| Detail::EventState { state }),
                    EventCommand::Harden => secure(p, Mutation::Harden, &session.target(), kind),
                    EventCommand::TakeOwn => secure(p, Mutation::TakeOwn, &session.target(), kind),
                    EventCommand::Weaken => secure(p, Mutation::Weaken, &session.target(), kind),
                }
            }
            (Operation::Service(cmd), ResolvedTarget::Name(name)) => {
                let session = ServiceSession::open(p, name, mask)?;
                opened(kind);
                match cmd {
                    ServiceCommand::Start => session.start().map(|_| Detail::Completed),
                    ServiceCommand::Stop => session.stop().map(|_| Detail::Completed),
                    ServiceCommand::Query => session.query().map(|state| Detail::ServiceState { state }),
                    ServiceCommand::Harden => secure(p, Mutation::Harden, &session.target(), kind),
                    ServiceCommand::TakeOwn => secure(p, Mutation::TakeOwn, &session.target(), kind),
                    ServiceCommand::Weaken => secure(p, Mutation::Weaken, &session.target(), kind),
                }
            }
            (Operation::Process(cmd), ResolvedTarget::Pid(pid)) => {
                let session = ProcessSession::open(p, *pid, mask)?;
                opened(kind);
                match cmd {
                    ProcessCommand::Terminate => session.terminate().map(|_| Detail::Completed),
                    ProcessCommand::Harden => secure(p, Mutation::Harden, &session.target(), kind),
                    ProcessCommand::TakeOwn => secure(p, Mutation::TakeOwn, &session.target(), kind),
                    ProcessCommand::Weaken => secure(p, Mutation::Weaken, &session.target(), kind),
                }
            }
            (Operation::File(cmd), ResolvedTarget::Name(path)) => {
                let session = FileSession::open(p, path, mask)?;
                opened(kind);
                match cmd {
                    FileCommand::Harden => secure(p, Mutation::Harden, &session.target(), kind),
                    FileCommand::TakeOwn => secure(p, Mutation::TakeOwn, &session.target(), kind),
                    FileCommand::Weaken => secure(p, Mutation::Weaken, &session.target(), kind),
                }
            }
            (op, _) => Err(crate::error::AclError::unsupported(op.to_string(), "target does not match object kind")),
        }?;
        debug!(target: "acltool::orchestrator", state = "action_executed");
        Ok(detail)
    }
}

fn opened(kind: ObjectKind) {
    debug!(target: "acltool::orchestrator", state = "session_opened", kind = %kind);
}

fn secure(p: &dyn Platform, mutation: Mutation, target: &SecurityTarget<'_>, kind: ObjectKind) -> AclResult<Detail> {
    mutator::apply(p, mutation, target, kind).map(Detail::from)
}

/// Release privileges innermost first.
fn release(privileges: PrivilegeStack<'_>) {
    let held = privileges.privileges();
    privileges.release();
    debug!(target: "acltool::orchestrator", state = "released", released = ?held);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::rights;
    use crate::privilege::Privilege;
    use crate::testing::{Call, FakePlatform};

    #[test]
    fn event_names_are_qualified_before_open() {
        let fake = FakePlatform::new();
        fake.add_event(r"Global\Ready", true);
        let out = Orchestrator::new(&fake).run(&Invocation::new(ObjectKind::Event, "Ready", "query")).unwrap();
        assert_eq!(out.target, r"Global\Ready");
        assert_eq!(out.detail, Detail::EventState { state: EventState::Signaled });
        assert_eq!(out.summary(), "Event state  : Signaled");
        assert!(fake.calls().contains(&Call::OpenEvent(r"Global\Ready".to_string(), rights::SYNCHRONIZE)));
    }

    #[test]
    fn custom_namespace() {
        let fake = FakePlatform::new();
        fake.add_event(r"Local\Ready", false);
        let orch = Orchestrator::new(&fake).with_event_namespace("Local");
        orch.run(&Invocation::new(ObjectKind::Event, "Ready", "set")).unwrap();
        assert_eq!(fake.event_signaled(r"Local\Ready"), Some(true));
    }

    #[test]
    fn session_closes_before_privileges_release() {
        let fake = FakePlatform::new();
        fake.add_process(55, "victim.exe");
        Orchestrator::new(&fake).run(&Invocation::new(ObjectKind::Process, "55", "terminate")).unwrap();
        let calls = fake.calls();
        let close = calls.iter().position(|c| matches!(c, Call::CloseHandle(_))).unwrap();
        let disable = calls.iter().position(|c| *c == Call::SetPrivilege(Privilege::Debug, false)).unwrap();
        assert!(close < disable);
        assert_eq!(fake.exit_code_of(55), Some(1));
    }

    #[test]
    fn action_failure_still_releases_everything() {
        let fake = FakePlatform::new();
        fake.add_service("Spooler", 1);
        let err = Orchestrator::new(&fake).run(&Invocation::new(ObjectKind::Service, "Spooler", "stop")).unwrap_err();
        assert_eq!(err.code_str(), "ControlService");
        assert_eq!(fake.open_handle_count(), 0);
    }

    #[test]
    fn summaries() {
        let o = |operation: Operation, detail| Outcome { kind: operation.kind(), target: "x".into(), operation, detail };
        assert_eq!(o(Operation::Event(EventCommand::Unset), Detail::Completed).summary(), "Event reset successfully");
        assert_eq!(
            o(Operation::File(FileCommand::TakeOwn), Detail::Completed).summary(),
            "File ownership transferred to Administrators"
        );
        assert_eq!(
            o(Operation::Service(ServiceCommand::Query), Detail::ServiceState { state: ServiceState::Running }).summary(),
            "Service state: Running"
        );
        assert_eq!(
            o(Operation::Process(ProcessCommand::Weaken), Detail::Completed).summary(),
            "Process ACL weakened successfully (Everyone has full access)"
        );
    }

    #[test]
    fn every_operation_has_its_own_summary() {
        for kind in ObjectKind::ALL {
            for name in kind.command_names() {
                let operation = Operation::parse(kind, name).unwrap();
                let out = Outcome { kind, target: "x".into(), operation, detail: Detail::Completed };
                assert_eq!(out.command(), *name);
                assert!(out.summary().to_lowercase().starts_with(&kind.to_string()), "{}: {}", operation, out.summary());
            }
        }
    }
}
