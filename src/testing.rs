//! In-memory [`Platform`] for tests and dry runs.
//!
//! `FakePlatform` models a small object namespace (events, services,
//! processes, files) with per-object DACLs and owners, a process token with
//! enable/disable state, and a call log recording every platform call in
//! order. Access checks follow the rules the engine relies on:
//!
//! - the caller is an interactive administrator: rights come from DACL
//!   entries for INTERACTIVE, Administrators and Everyone; an object with no
//!   DACL grants everything
//! - an owner the caller belongs to implicitly gets `READ_CONTROL | WRITE_DAC`
//! - `SeTakeOwnershipPrivilege` grants `WRITE_OWNER` on open
//! - `SeDebugPrivilege` grants everything on processes
//! - `SeRestorePrivilege` grants `WRITE_DAC | WRITE_OWNER` on files, lets a
//!   by-name DACL write bypass the object's DACL, and allows assigning an
//!   owner the caller is not a member of (SYSTEM)
//!
//! Failures can be injected per operation with [`FakePlatform::fail_on`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::acl::Dacl;
use crate::object::{rights, AccessMask, ObjectKind, SecurityObjectType};
use crate::platform::{status, NativeAcl, Platform, ProcessEntry, RawHandle, SecurityTarget, Status};
use crate::privilege::Privilege;
use crate::sid::{Sid, Trustee};

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetPrivilege(Privilege, bool),
    WellKnownSid(Trustee),
    BuildAcl(Vec<(Trustee, AccessMask)>),
    SetDacl { target: String, object_type: SecurityObjectType },
    SetOwner { target: String, owner: String },
    OpenEvent(String, AccessMask),
    SetEvent(RawHandle),
    ResetEvent(RawHandle),
    ProbeEvent(RawHandle),
    OpenServiceManager(AccessMask),
    OpenService(String, AccessMask),
    StartService(RawHandle),
    StopService(RawHandle),
    QueryService(RawHandle),
    CloseServiceHandle(RawHandle),
    OpenProcess(u32, AccessMask),
    TerminateProcess(RawHandle, u32),
    ListProcesses,
    OpenFile(String, AccessMask),
    CloseHandle(RawHandle),
}

impl Call {
    /// True for calls that open a handle to an object or the service manager.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Call::OpenEvent(..) | Call::OpenServiceManager(..) | Call::OpenService(..) | Call::OpenProcess(..) | Call::OpenFile(..)
        )
    }
}

type ObjectKey = (ObjectKind, String);

#[derive(Debug, Clone, Default)]
struct FakeObject {
    dacl: Option<Vec<(Trustee, AccessMask)>>,
    owner: Option<Trustee>,
    signaled: bool,
    service_state: u32,
    exit_code: Option<u32>,
}

#[derive(Debug, Clone)]
struct OpenHandle {
    key: Option<ObjectKey>,
    access: AccessMask,
    service_api: bool,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    enabled: HashSet<Privilege>,
    denied: HashMap<Privilege, Status>,
    failures: HashMap<&'static str, Status>,
    objects: HashMap<ObjectKey, FakeObject>,
    processes: Vec<ProcessEntry>,
    handles: HashMap<usize, OpenHandle>,
    next_handle: usize,
    built: Vec<Vec<(Trustee, AccessMask)>>,
}

const CALLER_GROUPS: [Trustee; 3] = [Trustee::Interactive, Trustee::BuiltinAdministrators, Trustee::World];

#[derive(Default)]
pub struct FakePlatform {
    state: RefCell<State>,
}

impl FakePlatform {
    pub fn new() -> Self { Self::default() }

    pub fn add_event(&self, name: &str, signaled: bool) {
        let obj = FakeObject { signaled, ..FakeObject::default() };
        self.state.borrow_mut().objects.insert((ObjectKind::Event, name.to_string()), obj);
    }

    /// `state` is a `SERVICE_STATUS_PROCESS::dwCurrentState` code.
    pub fn add_service(&self, name: &str, state: u32) {
        let obj = FakeObject { service_state: state, ..FakeObject::default() };
        self.state.borrow_mut().objects.insert((ObjectKind::Service, name.to_string()), obj);
    }

    pub fn add_process(&self, pid: u32, exe_name: &str) {
        let mut st = self.state.borrow_mut();
        st.processes.push(ProcessEntry { pid, exe_name: exe_name.to_string() });
        st.objects.insert((ObjectKind::Process, pid.to_string()), FakeObject::default());
    }

    pub fn add_file(&self, path: &str) {
        self.state.borrow_mut().objects.insert((ObjectKind::File, path.to_string()), FakeObject::default());
    }

    /// Replace an object's DACL and owner directly, bypassing access checks.
    pub fn set_object_security(&self, kind: ObjectKind, name: &str, dacl: Vec<(Trustee, AccessMask)>, owner: Option<Trustee>) {
        if let Some(obj) = self.state.borrow_mut().objects.get_mut(&(kind, name.to_string())) {
            obj.dacl = Some(dacl);
            obj.owner = owner;
        }
    }

    /// Make enabling `privilege` fail with `code`.
    pub fn deny_privilege(&self, privilege: Privilege, code: Status) {
        self.state.borrow_mut().denied.insert(privilege, code);
    }

    /// Make every call to the named `Platform` method fail with `code`.
    pub fn fail_on(&self, op: &'static str, code: Status) {
        self.state.borrow_mut().failures.insert(op, code);
    }

    pub fn calls(&self) -> Vec<Call> { self.state.borrow().calls.clone() }

    pub fn privilege_log(&self) -> Vec<(Privilege, bool)> {
        self.state.borrow().calls.iter().filter_map(|c| match c {
            Call::SetPrivilege(p, on) => Some((*p, *on)),
            _ => None,
        }).collect()
    }

    pub fn privilege_enabled(&self, privilege: Privilege) -> bool { self.state.borrow().enabled.contains(&privilege) }

    pub fn open_handle_count(&self) -> usize { self.state.borrow().handles.len() }

    pub fn event_signaled(&self, name: &str) -> Option<bool> {
        self.object(ObjectKind::Event, name).map(|o| o.signaled)
    }

    pub fn service_state(&self, name: &str) -> Option<u32> {
        self.object(ObjectKind::Service, name).map(|o| o.service_state)
    }

    pub fn dacl_of(&self, kind: ObjectKind, name: &str) -> Option<Vec<(Trustee, AccessMask)>> {
        self.object(kind, name).and_then(|o| o.dacl)
    }

    pub fn owner_of(&self, kind: ObjectKind, name: &str) -> Option<Trustee> {
        self.object(kind, name).and_then(|o| o.owner)
    }

    pub fn exit_code_of(&self, pid: u32) -> Option<u32> {
        self.object(ObjectKind::Process, &pid.to_string()).and_then(|o| o.exit_code)
    }

    fn object(&self, kind: ObjectKind, name: &str) -> Option<FakeObject> {
        self.state.borrow().objects.get(&(kind, name.to_string())).cloned()
    }

    fn record(&self, call: Call, op: &'static str) -> Result<(), Status> {
        let mut st = self.state.borrow_mut();
        st.calls.push(call);
        match st.failures.get(op) {
            Some(code) => Err(*code),
            None => Ok(()),
        }
    }

    fn granted(st: &State, kind: ObjectKind, obj: &FakeObject) -> AccessMask {
        let mut granted = match &obj.dacl {
            None => AccessMask(u32::MAX),
            Some(entries) => entries
                .iter()
                .filter(|(t, _)| CALLER_GROUPS.contains(t))
                .fold(AccessMask::NONE, |acc, (_, r)| acc | *r),
        };
        if obj.owner.map(|o| CALLER_GROUPS.contains(&o)).unwrap_or(false) {
            granted = granted | rights::READ_CONTROL | rights::WRITE_DAC;
        }
        if st.enabled.contains(&Privilege::TakeOwnership) {
            granted = granted | rights::WRITE_OWNER;
        }
        if kind == ObjectKind::Process && st.enabled.contains(&Privilege::Debug) {
            granted = AccessMask(u32::MAX);
        }
        if kind == ObjectKind::File && st.enabled.contains(&Privilege::Restore) {
            granted = granted | rights::WRITE_DAC | rights::WRITE_OWNER;
        }
        granted
    }

    fn open_object(&self, kind: ObjectKind, name: &str, access: AccessMask, missing: Status) -> Result<RawHandle, Status> {
        let mut st = self.state.borrow_mut();
        let key = (kind, name.to_string());
        let obj = st.objects.get(&key).ok_or(missing)?;
        if kind == ObjectKind::Process && obj.exit_code.is_some() {
            return Err(status::ERROR_INVALID_PARAMETER);
        }
        if !Self::granted(&st, kind, obj).contains(access) {
            return Err(status::ERROR_ACCESS_DENIED);
        }
        Ok(Self::issue(&mut st, OpenHandle { key: Some(key), access, service_api: kind == ObjectKind::Service }))
    }

    fn issue(st: &mut State, handle: OpenHandle) -> RawHandle {
        st.next_handle += 4;
        let raw = 0x100 + st.next_handle;
        st.handles.insert(raw, handle);
        RawHandle(raw)
    }

    /// Look up an open handle and check it carries `needed`.
    fn with_handle<T>(&self, handle: RawHandle, needed: AccessMask, f: impl FnOnce(&mut FakeObject) -> Result<T, Status>) -> Result<T, Status> {
        let mut st = self.state.borrow_mut();
        let entry = st.handles.get(&handle.0).cloned().ok_or(status::ERROR_INVALID_HANDLE)?;
        if !entry.access.contains(needed) {
            return Err(status::ERROR_ACCESS_DENIED);
        }
        let key = entry.key.ok_or(status::ERROR_INVALID_HANDLE)?;
        let obj = st.objects.get_mut(&key).ok_or(status::ERROR_INVALID_HANDLE)?;
        f(obj)
    }

    fn describe_target(&self, target: &SecurityTarget<'_>) -> String {
        match target {
            SecurityTarget::Named(name) => name.to_string(),
            SecurityTarget::Handle(h) => {
                let st = self.state.borrow();
                match st.handles.get(&h.0).and_then(|e| e.key.clone()) {
                    Some((_, name)) => name,
                    None => format!("handle {:#x}", h.0),
                }
            }
        }
    }

    fn named_key(object_type: SecurityObjectType, name: &str) -> ObjectKey {
        let kind = match object_type {
            SecurityObjectType::File => ObjectKind::File,
            SecurityObjectType::Service => ObjectKind::Service,
            SecurityObjectType::KernelObject => ObjectKind::Event,
        };
        (kind, name.to_string())
    }

    fn trustee_of(sid: &Sid) -> Option<Trustee> {
        [Trustee::LocalSystem, Trustee::Interactive, Trustee::BuiltinAdministrators, Trustee::World]
            .into_iter()
            .find(|t| t.canonical() == *sid)
    }
}

impl Platform for FakePlatform {
    fn set_privilege(&self, privilege: Privilege, enable: bool) -> Result<(), Status> {
        self.record(Call::SetPrivilege(privilege, enable), "set_privilege")?;
        let mut st = self.state.borrow_mut();
        if enable {
            if let Some(code) = st.denied.get(&privilege) { return Err(*code); }
            st.enabled.insert(privilege);
        } else {
            st.enabled.remove(&privilege);
        }
        Ok(())
    }

    fn well_known_sid(&self, trustee: Trustee) -> Result<Sid, Status> {
        self.record(Call::WellKnownSid(trustee), "well_known_sid")?;
        Ok(trustee.canonical())
    }

    fn build_acl(&self, dacl: &Dacl) -> Result<NativeAcl, Status> {
        let entries: Vec<(Trustee, AccessMask)> = dacl.entries().iter().map(|e| (e.trustee, e.rights)).collect();
        self.record(Call::BuildAcl(entries.clone()), "build_acl")?;
        let mut st = self.state.borrow_mut();
        st.built.push(entries);
        Ok(NativeAcl::from_words(vec![(st.built.len() - 1) as u32]))
    }

    fn set_dacl(&self, target: &SecurityTarget<'_>, object_type: SecurityObjectType, acl: &NativeAcl) -> Result<(), Status> {
        let label = self.describe_target(target);
        self.record(Call::SetDacl { target: label, object_type }, "set_dacl")?;
        let mut st = self.state.borrow_mut();
        let entries = acl
            .as_words()
            .first()
            .and_then(|i| st.built.get(*i as usize).cloned())
            .ok_or(status::ERROR_INVALID_ACL)?;
        let key = match target {
            SecurityTarget::Handle(h) => {
                let entry = st.handles.get(&h.0).cloned().ok_or(status::ERROR_INVALID_HANDLE)?;
                if !entry.access.contains(rights::WRITE_DAC) { return Err(status::ERROR_ACCESS_DENIED); }
                entry.key.ok_or(status::ERROR_INVALID_HANDLE)?
            }
            SecurityTarget::Named(name) => {
                let key = Self::named_key(object_type, name);
                let obj = st.objects.get(&key).ok_or(status::ERROR_FILE_NOT_FOUND)?;
                let allowed = st.enabled.contains(&Privilege::Restore)
                    || Self::granted(&st, key.0, obj).contains(rights::WRITE_DAC);
                if !allowed { return Err(status::ERROR_ACCESS_DENIED); }
                key
            }
        };
        let obj = st.objects.get_mut(&key).ok_or(status::ERROR_FILE_NOT_FOUND)?;
        obj.dacl = Some(entries);
        Ok(())
    }

    fn set_owner(&self, target: &SecurityTarget<'_>, object_type: SecurityObjectType, owner: &Sid) -> Result<(), Status> {
        let label = self.describe_target(target);
        self.record(Call::SetOwner { target: label, owner: owner.to_string() }, "set_owner")?;
        let trustee = Self::trustee_of(owner).ok_or(status::ERROR_INVALID_OWNER)?;
        let mut st = self.state.borrow_mut();
        if !CALLER_GROUPS.contains(&trustee) && !st.enabled.contains(&Privilege::Restore) {
            return Err(status::ERROR_INVALID_OWNER);
        }
        let key = match target {
            SecurityTarget::Handle(h) => {
                let entry = st.handles.get(&h.0).cloned().ok_or(status::ERROR_INVALID_HANDLE)?;
                if !entry.access.contains(rights::WRITE_OWNER) { return Err(status::ERROR_ACCESS_DENIED); }
                entry.key.ok_or(status::ERROR_INVALID_HANDLE)?
            }
            SecurityTarget::Named(name) => Self::named_key(object_type, name),
        };
        let obj = st.objects.get_mut(&key).ok_or(status::ERROR_FILE_NOT_FOUND)?;
        obj.owner = Some(trustee);
        Ok(())
    }

    fn open_event(&self, name: &str, access: AccessMask) -> Result<RawHandle, Status> {
        self.record(Call::OpenEvent(name.to_string(), access), "open_event")?;
        self.open_object(ObjectKind::Event, name, access, status::ERROR_FILE_NOT_FOUND)
    }

    fn set_event(&self, handle: RawHandle) -> Result<(), Status> {
        self.record(Call::SetEvent(handle), "set_event")?;
        self.with_handle(handle, rights::EVENT_MODIFY_STATE, |o| { o.signaled = true; Ok(()) })
    }

    fn reset_event(&self, handle: RawHandle) -> Result<(), Status> {
        self.record(Call::ResetEvent(handle), "reset_event")?;
        self.with_handle(handle, rights::EVENT_MODIFY_STATE, |o| { o.signaled = false; Ok(()) })
    }

    fn probe_event(&self, handle: RawHandle) -> Result<bool, Status> {
        self.record(Call::ProbeEvent(handle), "probe_event")?;
        self.with_handle(handle, rights::SYNCHRONIZE, |o| Ok(o.signaled))
    }

    fn open_service_manager(&self, access: AccessMask) -> Result<RawHandle, Status> {
        self.record(Call::OpenServiceManager(access), "open_service_manager")?;
        let mut st = self.state.borrow_mut();
        Ok(Self::issue(&mut st, OpenHandle { key: None, access, service_api: true }))
    }

    fn open_service(&self, manager: RawHandle, name: &str, access: AccessMask) -> Result<RawHandle, Status> {
        self.record(Call::OpenService(name.to_string(), access), "open_service")?;
        {
            let st = self.state.borrow();
            match st.handles.get(&manager.0) {
                Some(h) if h.key.is_none() && h.service_api => {}
                _ => return Err(status::ERROR_INVALID_HANDLE),
            }
        }
        self.open_object(ObjectKind::Service, name, access, status::ERROR_SERVICE_DOES_NOT_EXIST)
    }

    fn start_service(&self, service: RawHandle) -> Result<(), Status> {
        self.record(Call::StartService(service), "start_service")?;
        self.with_handle(service, rights::SERVICE_START, |o| {
            if o.service_state != 1 { return Err(status::ERROR_SERVICE_ALREADY_RUNNING); }
            o.service_state = 4;
            Ok(())
        })
    }

    fn stop_service(&self, service: RawHandle) -> Result<(), Status> {
        self.record(Call::StopService(service), "stop_service")?;
        self.with_handle(service, rights::SERVICE_STOP, |o| {
            if o.service_state == 1 { return Err(status::ERROR_SERVICE_NOT_ACTIVE); }
            o.service_state = 1;
            Ok(())
        })
    }

    fn query_service_state(&self, service: RawHandle) -> Result<u32, Status> {
        self.record(Call::QueryService(service), "query_service_state")?;
        self.with_handle(service, rights::SERVICE_QUERY_STATUS, |o| Ok(o.service_state))
    }

    fn close_service_handle(&self, handle: RawHandle) -> Result<(), Status> {
        self.record(Call::CloseServiceHandle(handle), "close_service_handle")?;
        let mut st = self.state.borrow_mut();
        match st.handles.get(&handle.0) {
            Some(h) if h.service_api => { st.handles.remove(&handle.0); Ok(()) }
            _ => Err(status::ERROR_INVALID_HANDLE),
        }
    }

    fn open_process(&self, pid: u32, access: AccessMask) -> Result<RawHandle, Status> {
        self.record(Call::OpenProcess(pid, access), "open_process")?;
        self.open_object(ObjectKind::Process, &pid.to_string(), access, status::ERROR_INVALID_PARAMETER)
    }

    fn terminate_process(&self, handle: RawHandle, exit_code: u32) -> Result<(), Status> {
        self.record(Call::TerminateProcess(handle, exit_code), "terminate_process")?;
        self.with_handle(handle, rights::PROCESS_TERMINATE, |o| { o.exit_code = Some(exit_code); Ok(()) })?;
        let mut st = self.state.borrow_mut();
        let pid = st.handles.get(&handle.0).and_then(|h| h.key.as_ref()).and_then(|(_, name)| name.parse::<u32>().ok());
        if let Some(pid) = pid { st.processes.retain(|p| p.pid != pid); }
        Ok(())
    }

    fn list_processes(&self) -> Result<Vec<ProcessEntry>, Status> {
        self.record(Call::ListProcesses, "list_processes")?;
        Ok(self.state.borrow().processes.clone())
    }

    fn open_file(&self, path: &str, access: AccessMask) -> Result<RawHandle, Status> {
        self.record(Call::OpenFile(path.to_string(), access), "open_file")?;
        self.open_object(ObjectKind::File, path, access, status::ERROR_FILE_NOT_FOUND)
    }

    fn close_handle(&self, handle: RawHandle) -> Result<(), Status> {
        self.record(Call::CloseHandle(handle), "close_handle")?;
        let mut st = self.state.borrow_mut();
        match st.handles.get(&handle.0) {
            Some(h) if !h.service_api => { st.handles.remove(&handle.0); Ok(()) }
            _ => Err(status::ERROR_INVALID_HANDLE),
        }
    }

    fn describe_error(&self, code: Status) -> String {
        match code {
            status::ERROR_FILE_NOT_FOUND => "The system cannot find the file specified.",
            status::ERROR_ACCESS_DENIED => "Access is denied.",
            status::ERROR_INVALID_HANDLE => "The handle is invalid.",
            status::ERROR_INVALID_PARAMETER => "The parameter is incorrect.",
            status::ERROR_SERVICE_ALREADY_RUNNING => "An instance of the service is already running.",
            status::ERROR_SERVICE_DOES_NOT_EXIST => "The specified service does not exist as an installed service.",
            status::ERROR_SERVICE_NOT_ACTIVE => "The service has not been started.",
            status::ERROR_NOT_ALL_ASSIGNED => "Not all privileges or groups referenced are assigned to the caller.",
            status::ERROR_INVALID_OWNER => "This security ID may not be assigned as the owner of this object.",
            status::ERROR_NO_SUCH_PRIVILEGE => "A specified privilege does not exist.",
            status::ERROR_PRIVILEGE_NOT_HELD => "A required privilege is not held by the client.",
            status::ERROR_INVALID_ACL => "The access control list (ACL) structure is invalid.",
            _ => "",
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restrictive_dacl_denies_open_until_privilege_held() {
        let fake = FakePlatform::new();
        fake.add_file(r"C:\data\locked.txt");
        fake.set_object_security(
            ObjectKind::File,
            r"C:\data\locked.txt",
            vec![(Trustee::LocalSystem, rights::FILE_ALL_ACCESS)],
            Some(Trustee::LocalSystem),
        );
        assert_eq!(fake.open_file(r"C:\data\locked.txt", rights::WRITE_DAC), Err(status::ERROR_ACCESS_DENIED));
        fake.set_privilege(Privilege::Restore, true).unwrap();
        let h = fake.open_file(r"C:\data\locked.txt", rights::WRITE_DAC).unwrap();
        fake.close_handle(h).unwrap();
        assert_eq!(fake.open_handle_count(), 0);
    }

    #[test]
    fn service_handles_close_through_service_api_only() {
        let fake = FakePlatform::new();
        fake.add_service("Spooler", 4);
        let scm = fake.open_service_manager(rights::SC_MANAGER_CONNECT).unwrap();
        let svc = fake.open_service(scm, "Spooler", rights::SERVICE_STOP).unwrap();
        assert_eq!(fake.close_handle(svc), Err(status::ERROR_INVALID_HANDLE));
        fake.close_service_handle(svc).unwrap();
        fake.close_service_handle(scm).unwrap();
        assert_eq!(fake.open_handle_count(), 0);
    }

    #[test]
    fn injected_failures_are_recorded_first() {
        let fake = FakePlatform::new();
        fake.fail_on("well_known_sid", status::ERROR_INVALID_PARAMETER);
        assert_eq!(fake.well_known_sid(Trustee::World), Err(status::ERROR_INVALID_PARAMETER));
        assert_eq!(fake.calls(), vec![Call::WellKnownSid(Trustee::World)]);
    }
}
