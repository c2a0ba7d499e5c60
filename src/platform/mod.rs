//! The operating-system seam.
//!
//! Everything the engine asks of the OS goes through [`Platform`]: token
//! privilege adjustment, well-known SID construction, ACL building and
//! application, object handles, lifecycle calls and error text. Each call
//! returns the raw platform status on failure; callers decide which
//! [`AclError`](crate::error::AclError) variant that becomes.
//!
//! The Windows implementation lives in [`windows`]. Tests and dry runs use
//! [`crate::testing::FakePlatform`].

#[cfg(windows)]
pub mod windows;

use crate::acl::Dacl;
use crate::error::{AclError, AclResult};
use crate::object::{AccessMask, SecurityObjectType};
use crate::privilege::Privilege;
use crate::sid::{Sid, Trustee};

/// Win32 error code as returned by `GetLastError` or the security-info APIs.
pub type Status = u32;

/// Win32 status codes the engine inspects or that the fake platform reports.
pub mod status {
    use super::Status;

    pub const ERROR_SUCCESS: Status = 0;
    pub const ERROR_FILE_NOT_FOUND: Status = 2;
    pub const ERROR_ACCESS_DENIED: Status = 5;
    pub const ERROR_INVALID_HANDLE: Status = 6;
    pub const ERROR_INVALID_PARAMETER: Status = 87;
    pub const ERROR_SERVICE_ALREADY_RUNNING: Status = 1056;
    pub const ERROR_SERVICE_DOES_NOT_EXIST: Status = 1060;
    pub const ERROR_SERVICE_NOT_ACTIVE: Status = 1062;
    pub const ERROR_NOT_ALL_ASSIGNED: Status = 1300;
    pub const ERROR_INVALID_OWNER: Status = 1307;
    pub const ERROR_NO_SUCH_PRIVILEGE: Status = 1313;
    pub const ERROR_PRIVILEGE_NOT_HELD: Status = 1314;
    pub const ERROR_INVALID_ACL: Status = 1336;
}

/// `SECURITY_INFORMATION` flags passed with a security-descriptor change.
pub mod security_info {
    pub const OWNER: u32 = 0x0000_0001;
    pub const DACL: u32 = 0x0000_0004;
    pub const PROTECTED_DACL: u32 = 0x8000_0000;

    /// A replacement DACL is written protected, so the parent's inheritable
    /// entries are not merged back into it.
    pub const REPLACE_DACL: u32 = DACL | PROTECTED_DACL;
}

/// An open object handle. Opaque to everything but the platform that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub usize);

/// Where a security-descriptor change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityTarget<'a> {
    Handle(RawHandle),
    /// By object name; the platform checks privileges rather than handle rights.
    Named(&'a str),
}

/// A DACL in the platform's native binary layout, ready to apply.
/// Stored as `u32` words so the buffer keeps the ACL header's alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAcl {
    words: Vec<u32>,
}

impl NativeAcl {
    pub fn from_words(words: Vec<u32>) -> Self { Self { words } }
    pub fn as_words(&self) -> &[u32] { &self.words }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub exe_name: String,
}

pub trait Platform {
    /// Enable or disable one privilege on the calling process's token.
    fn set_privilege(&self, privilege: Privilege, enable: bool) -> Result<(), Status>;

    fn well_known_sid(&self, trustee: Trustee) -> Result<Sid, Status>;
    fn build_acl(&self, dacl: &Dacl) -> Result<NativeAcl, Status>;
    fn set_dacl(&self, target: &SecurityTarget<'_>, object_type: SecurityObjectType, acl: &NativeAcl) -> Result<(), Status>;
    fn set_owner(&self, target: &SecurityTarget<'_>, object_type: SecurityObjectType, owner: &Sid) -> Result<(), Status>;

    fn open_event(&self, name: &str, access: AccessMask) -> Result<RawHandle, Status>;
    fn set_event(&self, handle: RawHandle) -> Result<(), Status>;
    fn reset_event(&self, handle: RawHandle) -> Result<(), Status>;
    /// Zero-timeout wait. `Ok(true)` when signaled, `Ok(false)` on timeout.
    fn probe_event(&self, handle: RawHandle) -> Result<bool, Status>;

    fn open_service_manager(&self, access: AccessMask) -> Result<RawHandle, Status>;
    fn open_service(&self, manager: RawHandle, name: &str, access: AccessMask) -> Result<RawHandle, Status>;
    fn start_service(&self, service: RawHandle) -> Result<(), Status>;
    /// Send a stop control; does not wait for the service to reach `Stopped`.
    fn stop_service(&self, service: RawHandle) -> Result<(), Status>;
    /// Current state code (`SERVICE_STATUS_PROCESS::dwCurrentState`).
    fn query_service_state(&self, service: RawHandle) -> Result<u32, Status>;
    fn close_service_handle(&self, handle: RawHandle) -> Result<(), Status>;

    fn open_process(&self, pid: u32, access: AccessMask) -> Result<RawHandle, Status>;
    fn terminate_process(&self, handle: RawHandle, exit_code: u32) -> Result<(), Status>;
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, Status>;

    /// Open with backup semantics so directories open the same way as files.
    fn open_file(&self, path: &str, access: AccessMask) -> Result<RawHandle, Status>;

    fn close_handle(&self, handle: RawHandle) -> Result<(), Status>;

    /// Human-readable text for a status; used for reporting only.
    fn describe_error(&self, status: Status) -> String;
}

/// The platform the binary runs against.
#[cfg(windows)]
pub fn native() -> AclResult<Box<dyn Platform>> {
    Ok(Box::new(windows::WindowsPlatform::new()))
}

#[cfg(not(windows))]
pub fn native() -> AclResult<Box<dyn Platform>> {
    Err(AclError::unsupported(
        "platform",
        format!("acltool manipulates Windows security descriptors and cannot run on {}", std::env::consts::OS),
    ))
}

/// Build an error for a failed platform call, attaching the platform's text for `code`.
pub fn failure(platform: &dyn Platform, ctor: fn(String, String) -> AclError, context: &str, code: Status) -> AclError {
    let text = platform.describe_error(code);
    ctor(context.to_string(), crate::error::status_message(code, &text))
}

/// Resolve a process target to a PID.
///
/// A decimal target is taken as the PID itself. Anything else is matched
/// against running image names, case-insensitively, with `.exe` appended when
/// the target has no extension. Exactly one match is required.
pub fn resolve_process(platform: &dyn Platform, target: &str) -> AclResult<u32> {
    if let Ok(pid) = target.parse::<u32>() { return Ok(pid); }
    let image = if target.to_ascii_lowercase().ends_with(".exe") { target.to_string() } else { format!("{}.exe", target) };
    let entries = platform
        .list_processes()
        .map_err(|code| failure(platform, AclError::action, "CreateToolhelp32Snapshot", code))?;
    let matches: Vec<&ProcessEntry> = entries.iter().filter(|e| e.exe_name.eq_ignore_ascii_case(&image)).collect();
    match matches.as_slice() {
        [] => Err(AclError::not_found(image.clone(), format!("Process not found: {}", image))),
        [only] => {
            println!("Found process: {} (PID: {})", only.exe_name, only.pid);
            tracing::debug!(target: "acltool::platform", pid = only.pid, image = %only.exe_name, "resolved process name");
            Ok(only.pid)
        }
        many => {
            let pids: Vec<String> = many.iter().map(|e| e.pid.to_string()).collect();
            Err(AclError::ambiguous(
                image.clone(),
                format!("{} processes match {} (PIDs: {}); pass a PID instead", many.len(), image, pids.join(", ")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlatform;

    #[test]
    fn dacl_replacement_is_protected_from_inheritance() {
        assert_eq!(security_info::REPLACE_DACL & security_info::DACL, security_info::DACL);
        assert_eq!(security_info::REPLACE_DACL & security_info::PROTECTED_DACL, security_info::PROTECTED_DACL);
        assert_eq!(security_info::REPLACE_DACL & security_info::OWNER, 0);
    }

    #[test]
    fn numeric_targets_skip_enumeration() {
        let fake = FakePlatform::new();
        assert_eq!(resolve_process(&fake, "4242").unwrap(), 4242);
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn names_match_case_insensitively_with_implied_extension() {
        let fake = FakePlatform::new();
        fake.add_process(700, "Notepad.EXE");
        fake.add_process(701, "calc.exe");
        assert_eq!(resolve_process(&fake, "notepad").unwrap(), 700);
        assert_eq!(resolve_process(&fake, "CALC.exe").unwrap(), 701);
    }

    #[test]
    fn zero_or_many_matches_fail() {
        let fake = FakePlatform::new();
        fake.add_process(10, "svchost.exe");
        fake.add_process(11, "svchost.exe");
        let err = resolve_process(&fake, "svchost").unwrap_err();
        assert_eq!(err.kind_str(), "ambiguous_target");
        assert!(err.message().contains("10, 11"), "got: {}", err);
        assert_eq!(resolve_process(&fake, "nope").unwrap_err().kind_str(), "target_not_found");
    }
}
