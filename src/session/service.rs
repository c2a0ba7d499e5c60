use serde::Serialize;
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};

use crate::error::{status_message, AclError, AclResult};
use crate::object::{rights, AccessMask};
use crate::platform::{self, Platform, RawHandle, SecurityTarget};

/// `SERVICE_STATUS_PROCESS::dwCurrentState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Stopped,
    StartPending,
    StopPending,
    Running,
    ContinuePending,
    PausePending,
    Paused,
    Unknown(u32),
}

impl ServiceState {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ServiceState::Stopped,
            2 => ServiceState::StartPending,
            3 => ServiceState::StopPending,
            4 => ServiceState::Running,
            5 => ServiceState::ContinuePending,
            6 => ServiceState::PausePending,
            7 => ServiceState::Paused,
            other => ServiceState::Unknown(other),
        }
    }
}

impl Display for ServiceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Stopped => f.write_str("Stopped"),
            ServiceState::StartPending => f.write_str("Starting..."),
            ServiceState::StopPending => f.write_str("Stopping..."),
            ServiceState::Running => f.write_str("Running"),
            ServiceState::ContinuePending => f.write_str("Continue pending..."),
            ServiceState::PausePending => f.write_str("Pause pending..."),
            ServiceState::Paused => f.write_str("Paused"),
            ServiceState::Unknown(code) => write!(f, "Unknown (0x{:x})", code),
        }
    }
}

/// A service-manager handle closed through `CloseServiceHandle`.
struct ScHandle<'p> {
    platform: &'p dyn Platform,
    raw: RawHandle,
    what: &'static str,
}

impl Drop for ScHandle<'_> {
    fn drop(&mut self) {
        match self.platform.close_service_handle(self.raw) {
            Ok(()) => debug!(target: "acltool::session", handle = self.raw.0, "{} closed", self.what),
            Err(code) => warn!(
                target: "acltool::session",
                "failed to close {}: {}",
                self.what,
                status_message(code, &self.platform.describe_error(code))
            ),
        }
    }
}

/// A service plus the manager it was opened through.
pub struct ServiceSession<'p> {
    platform: &'p dyn Platform,
    name: String,
    // Field order is drop order: the service closes before the manager.
    service: ScHandle<'p>,
    _manager: ScHandle<'p>,
}

impl<'p> ServiceSession<'p> {
    pub fn open(platform: &'p dyn Platform, name: &str, access: AccessMask) -> AclResult<Self> {
        let raw = platform
            .open_service_manager(rights::SC_MANAGER_CONNECT)
            .map_err(|code| platform::failure(platform, AclError::open, "OpenSCManager", code))?;
        let manager = ScHandle { platform, raw, what: "service manager" };
        let raw = platform
            .open_service(manager.raw, name, access)
            .map_err(|code| platform::failure(platform, AclError::open, "OpenService", code))?;
        debug!(target: "acltool::session", service = name, handle = raw.0, "service opened");
        let service = ScHandle { platform, raw, what: "service" };
        Ok(Self { platform, name: name.to_string(), service, _manager: manager })
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn target(&self) -> SecurityTarget<'static> { SecurityTarget::Handle(self.service.raw) }

    pub fn start(&self) -> AclResult<()> {
        println!("Starting service...");
        self.platform
            .start_service(self.service.raw)
            .map_err(|code| platform::failure(self.platform, AclError::action, "StartService", code))
    }

    /// Sends the stop control and returns without waiting for `Stopped`.
    pub fn stop(&self) -> AclResult<()> {
        println!("Stopping service...");
        self.platform
            .stop_service(self.service.raw)
            .map_err(|code| platform::failure(self.platform, AclError::action, "ControlService", code))
    }

    pub fn query(&self) -> AclResult<ServiceState> {
        self.platform
            .query_service_state(self.service.raw)
            .map(ServiceState::from_code)
            .map_err(|code| platform::failure(self.platform, AclError::action, "QueryServiceStatusEx", code))
    }
}
