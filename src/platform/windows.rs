//! Win32 implementation of [`Platform`] over `windows-sys`.
//!
//! Every function here is a thin, checked wrapper: it converts arguments to
//! the Win32 shapes, makes one call and turns a failure into the thread's
//! last-error (or the returned `WIN32_ERROR`). No policy lives here.

use std::ffi::c_void;
use std::ptr::{null, null_mut};

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, LocalFree, ERROR_NOT_ALL_ASSIGNED, ERROR_SUCCESS, HANDLE, INVALID_HANDLE_VALUE, LUID,
    WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::Security::Authorization::{
    SetEntriesInAclW, SetNamedSecurityInfoW, SetSecurityInfo, EXPLICIT_ACCESS_W, GRANT_ACCESS, NO_MULTIPLE_TRUSTEE,
    SE_OBJECT_TYPE, TRUSTEE_IS_SID, TRUSTEE_IS_USER, TRUSTEE_IS_WELL_KNOWN_GROUP, TRUSTEE_W,
};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, CreateWellKnownSid, LookupPrivilegeValueW, ACL, LUID_AND_ATTRIBUTES,
    NO_INHERITANCE, OBJECT_SECURITY_INFORMATION, PSID, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES,
    TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_FLAG_BACKUP_SEMANTICS, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::System::Diagnostics::Debug::{FormatMessageW, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS};
use windows_sys::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};
use windows_sys::Win32::System::Services::{
    CloseServiceHandle, ControlService, OpenSCManagerW, OpenServiceW, QueryServiceStatusEx, StartServiceW, SC_HANDLE,
    SC_STATUS_PROCESS_INFO, SERVICE_CONTROL_STOP, SERVICE_STATUS, SERVICE_STATUS_PROCESS,
};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, OpenEventW, OpenProcess, OpenProcessToken, ResetEvent, SetEvent, TerminateProcess, WaitForSingleObject,
};

use super::{security_info, NativeAcl, Platform, ProcessEntry, RawHandle, SecurityTarget, Status};
use crate::acl::Dacl;
use crate::object::{AccessMask, SecurityObjectType};
use crate::privilege::Privilege;
use crate::sid::{Sid, Trustee, MAX_SID_SIZE};

fn wide(s: &str) -> Vec<u16> { s.encode_utf16().chain(std::iter::once(0)).collect() }

fn last_error() -> Status { unsafe { GetLastError() } }

fn handle(raw: RawHandle) -> HANDLE { raw.0 as HANDLE }

fn sc_handle(raw: RawHandle) -> SC_HANDLE { raw.0 as SC_HANDLE }

fn check(ok: i32) -> Result<(), Status> { if ok != 0 { Ok(()) } else { Err(last_error()) } }

fn check_status(code: u32) -> Result<(), Status> { if code == ERROR_SUCCESS { Ok(()) } else { Err(code) } }

/// Returned pointers that are null (or `INVALID_HANDLE_VALUE`) mean failure.
fn check_handle(h: *mut c_void) -> Result<RawHandle, Status> {
    if h.is_null() || h == INVALID_HANDLE_VALUE { Err(last_error()) } else { Ok(RawHandle(h as usize)) }
}

#[derive(Debug, Default)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self { WindowsPlatform }

    fn security_info(
        &self,
        target: &SecurityTarget<'_>,
        object_type: SecurityObjectType,
        info: OBJECT_SECURITY_INFORMATION,
        owner: PSID,
        dacl: *const ACL,
    ) -> Result<(), Status> {
        let object_type = object_type as SE_OBJECT_TYPE;
        let code = match target {
            SecurityTarget::Handle(raw) => unsafe {
                SetSecurityInfo(handle(*raw), object_type, info, owner, null_mut(), dacl, null())
            },
            SecurityTarget::Named(name) => {
                let name = wide(name);
                unsafe { SetNamedSecurityInfoW(name.as_ptr(), object_type, info, owner, null_mut(), dacl, null()) }
            }
        };
        check_status(code)
    }
}

impl Platform for WindowsPlatform {
    fn set_privilege(&self, privilege: Privilege, enable: bool) -> Result<(), Status> {
        let mut token: HANDLE = null_mut();
        check(unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY, &mut token) })?;
        let result = (|| -> Result<(), Status> {
            let name = wide(privilege.name());
            let mut luid = LUID { LowPart: 0, HighPart: 0 };
            check(unsafe { LookupPrivilegeValueW(null(), name.as_ptr(), &mut luid) })?;
            let tp = TOKEN_PRIVILEGES {
                PrivilegeCount: 1,
                Privileges: [LUID_AND_ATTRIBUTES { Luid: luid, Attributes: if enable { SE_PRIVILEGE_ENABLED } else { 0 } }],
            };
            check(unsafe { AdjustTokenPrivileges(token, 0, &tp, 0, null_mut(), null_mut()) })?;
            // Success with ERROR_NOT_ALL_ASSIGNED means the token lacks the privilege.
            match last_error() {
                ERROR_NOT_ALL_ASSIGNED => Err(ERROR_NOT_ALL_ASSIGNED),
                _ => Ok(()),
            }
        })();
        unsafe { CloseHandle(token) };
        result
    }

    fn well_known_sid(&self, trustee: Trustee) -> Result<Sid, Status> {
        let mut buf = [0u8; MAX_SID_SIZE];
        let mut size = MAX_SID_SIZE as u32;
        check(unsafe { CreateWellKnownSid(trustee.well_known_type(), null_mut(), buf.as_mut_ptr() as PSID, &mut size) })?;
        Sid::from_bytes(&buf[..size as usize]).ok_or(windows_sys::Win32::Foundation::ERROR_INVALID_SID)
    }

    fn build_acl(&self, dacl: &Dacl) -> Result<NativeAcl, Status> {
        let mut sids: Vec<Vec<u8>> = dacl.entries().iter().map(|e| e.sid.as_bytes().to_vec()).collect();
        let entries: Vec<EXPLICIT_ACCESS_W> = dacl
            .entries()
            .iter()
            .zip(sids.iter_mut())
            .map(|(e, sid)| EXPLICIT_ACCESS_W {
                grfAccessPermissions: e.rights.bits(),
                grfAccessMode: GRANT_ACCESS,
                grfInheritance: NO_INHERITANCE,
                Trustee: TRUSTEE_W {
                    pMultipleTrustee: null_mut(),
                    MultipleTrusteeOperation: NO_MULTIPLE_TRUSTEE,
                    TrusteeForm: TRUSTEE_IS_SID,
                    TrusteeType: if e.trustee.is_group() { TRUSTEE_IS_WELL_KNOWN_GROUP } else { TRUSTEE_IS_USER },
                    ptstrName: sid.as_mut_ptr() as *mut u16,
                },
            })
            .collect();
        let mut acl: *mut ACL = null_mut();
        check_status(unsafe { SetEntriesInAclW(entries.len() as u32, entries.as_ptr(), null(), &mut acl) })?;
        // Copy out of the LocalAlloc'd buffer so the caller owns plain memory.
        let size = unsafe { (*acl).AclSize } as usize;
        let mut words = vec![0u32; size.div_ceil(4)];
        unsafe {
            std::ptr::copy_nonoverlapping(acl as *const u8, words.as_mut_ptr() as *mut u8, size);
            LocalFree(acl as _);
        }
        Ok(NativeAcl::from_words(words))
    }

    fn set_dacl(&self, target: &SecurityTarget<'_>, object_type: SecurityObjectType, acl: &NativeAcl) -> Result<(), Status> {
        self.security_info(target, object_type, security_info::REPLACE_DACL, null_mut(), acl.as_words().as_ptr() as *const ACL)
    }

    fn set_owner(&self, target: &SecurityTarget<'_>, object_type: SecurityObjectType, owner: &Sid) -> Result<(), Status> {
        let mut sid = owner.as_bytes().to_vec();
        self.security_info(target, object_type, security_info::OWNER, sid.as_mut_ptr() as PSID, null())
    }

    fn open_event(&self, name: &str, access: AccessMask) -> Result<RawHandle, Status> {
        let name = wide(name);
        check_handle(unsafe { OpenEventW(access.bits(), 0, name.as_ptr()) })
    }

    fn set_event(&self, h: RawHandle) -> Result<(), Status> { check(unsafe { SetEvent(handle(h)) }) }

    fn reset_event(&self, h: RawHandle) -> Result<(), Status> { check(unsafe { ResetEvent(handle(h)) }) }

    fn probe_event(&self, h: RawHandle) -> Result<bool, Status> {
        match unsafe { WaitForSingleObject(handle(h), 0) } {
            WAIT_OBJECT_0 => Ok(true),
            WAIT_TIMEOUT => Ok(false),
            _ => Err(last_error()),
        }
    }

    fn open_service_manager(&self, access: AccessMask) -> Result<RawHandle, Status> {
        check_handle(unsafe { OpenSCManagerW(null(), null(), access.bits()) })
    }

    fn open_service(&self, manager: RawHandle, name: &str, access: AccessMask) -> Result<RawHandle, Status> {
        let name = wide(name);
        check_handle(unsafe { OpenServiceW(sc_handle(manager), name.as_ptr(), access.bits()) })
    }

    fn start_service(&self, service: RawHandle) -> Result<(), Status> {
        check(unsafe { StartServiceW(sc_handle(service), 0, null()) })
    }

    fn stop_service(&self, service: RawHandle) -> Result<(), Status> {
        let mut status: SERVICE_STATUS = unsafe { std::mem::zeroed() };
        check(unsafe { ControlService(sc_handle(service), SERVICE_CONTROL_STOP, &mut status) })
    }

    fn query_service_state(&self, service: RawHandle) -> Result<u32, Status> {
        let mut info: SERVICE_STATUS_PROCESS = unsafe { std::mem::zeroed() };
        let mut needed = 0u32;
        check(unsafe {
            QueryServiceStatusEx(
                sc_handle(service),
                SC_STATUS_PROCESS_INFO,
                &mut info as *mut SERVICE_STATUS_PROCESS as *mut u8,
                std::mem::size_of::<SERVICE_STATUS_PROCESS>() as u32,
                &mut needed,
            )
        })?;
        Ok(info.dwCurrentState)
    }

    fn close_service_handle(&self, h: RawHandle) -> Result<(), Status> { check(unsafe { CloseServiceHandle(sc_handle(h)) }) }

    fn open_process(&self, pid: u32, access: AccessMask) -> Result<RawHandle, Status> {
        check_handle(unsafe { OpenProcess(access.bits(), 0, pid) })
    }

    fn terminate_process(&self, h: RawHandle, exit_code: u32) -> Result<(), Status> {
        check(unsafe { TerminateProcess(handle(h), exit_code) })
    }

    fn list_processes(&self) -> Result<Vec<ProcessEntry>, Status> {
        let snapshot = check_handle(unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) })?;
        let mut entry: PROCESSENTRY32W = unsafe { std::mem::zeroed() };
        entry.dwSize = std::mem::size_of::<PROCESSENTRY32W>() as u32;
        let mut out = Vec::new();
        let mut more = unsafe { Process32FirstW(handle(snapshot), &mut entry) } != 0;
        while more {
            let len = entry.szExeFile.iter().position(|c| *c == 0).unwrap_or(entry.szExeFile.len());
            out.push(ProcessEntry { pid: entry.th32ProcessID, exe_name: String::from_utf16_lossy(&entry.szExeFile[..len]) });
            more = unsafe { Process32NextW(handle(snapshot), &mut entry) } != 0;
        }
        unsafe { CloseHandle(handle(snapshot)) };
        Ok(out)
    }

    fn open_file(&self, path: &str, access: AccessMask) -> Result<RawHandle, Status> {
        let path = wide(path);
        check_handle(unsafe {
            CreateFileW(
                path.as_ptr(),
                access.bits(),
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                null(),
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS,
                null_mut(),
            )
        })
    }

    fn close_handle(&self, h: RawHandle) -> Result<(), Status> { check(unsafe { CloseHandle(handle(h)) }) }

    fn describe_error(&self, status: Status) -> String {
        let mut buf = [0u16; 512];
        let len = unsafe {
            FormatMessageW(
                FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
                null(),
                status,
                0,
                buf.as_mut_ptr(),
                buf.len() as u32,
                null(),
            )
        } as usize;
        String::from_utf16_lossy(&buf[..len.min(buf.len())]).trim_end_matches(['\r', '\n']).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::security_info;
    use windows_sys::Win32::Security::{
        DACL_SECURITY_INFORMATION, OWNER_SECURITY_INFORMATION, PROTECTED_DACL_SECURITY_INFORMATION,
    };

    #[test]
    fn security_info_flags_match_win32() {
        assert_eq!(security_info::OWNER, OWNER_SECURITY_INFORMATION);
        assert_eq!(security_info::DACL, DACL_SECURITY_INFORMATION);
        assert_eq!(security_info::PROTECTED_DACL, PROTECTED_DACL_SECURITY_INFORMATION);
    }
}
