//! Unified error model for the mutation engine and its CLI front end.
//! Every failure is converted to one of these at the point it happens and
//! travels up as a single `Result`; `main` maps any of them to exit status 1.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AclError {
    Usage { code: String, message: String },
    UnknownObjectKind { code: String, message: String },
    UnknownCommand { code: String, message: String },
    PrivilegeAcquisition { code: String, message: String },
    ObjectOpen { code: String, message: String },
    IdentifierResolution { code: String, message: String },
    AclBuild { code: String, message: String },
    AclApply { code: String, message: String },
    OwnershipApply { code: String, message: String },
    Action { code: String, message: String },
    AmbiguousTarget { code: String, message: String },
    TargetNotFound { code: String, message: String },
    Unsupported { code: String, message: String },
}

impl AclError {
    pub fn code_str(&self) -> &str {
        match self {
            AclError::Usage { code, .. }
            | AclError::UnknownObjectKind { code, .. }
            | AclError::UnknownCommand { code, .. }
            | AclError::PrivilegeAcquisition { code, .. }
            | AclError::ObjectOpen { code, .. }
            | AclError::IdentifierResolution { code, .. }
            | AclError::AclBuild { code, .. }
            | AclError::AclApply { code, .. }
            | AclError::OwnershipApply { code, .. }
            | AclError::Action { code, .. }
            | AclError::AmbiguousTarget { code, .. }
            | AclError::TargetNotFound { code, .. }
            | AclError::Unsupported { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AclError::Usage { message, .. }
            | AclError::UnknownObjectKind { message, .. }
            | AclError::UnknownCommand { message, .. }
            | AclError::PrivilegeAcquisition { message, .. }
            | AclError::ObjectOpen { message, .. }
            | AclError::IdentifierResolution { message, .. }
            | AclError::AclBuild { message, .. }
            | AclError::AclApply { message, .. }
            | AclError::OwnershipApply { message, .. }
            | AclError::Action { message, .. }
            | AclError::AmbiguousTarget { message, .. }
            | AclError::TargetNotFound { message, .. }
            | AclError::Unsupported { message, .. } => message.as_str(),
        }
    }

    /// Stable snake_case name of the variant, matching the serde tag.
    pub fn kind_str(&self) -> &'static str {
        match self {
            AclError::Usage { .. } => "usage",
            AclError::UnknownObjectKind { .. } => "unknown_object_kind",
            AclError::UnknownCommand { .. } => "unknown_command",
            AclError::PrivilegeAcquisition { .. } => "privilege_acquisition",
            AclError::ObjectOpen { .. } => "object_open",
            AclError::IdentifierResolution { .. } => "identifier_resolution",
            AclError::AclBuild { .. } => "acl_build",
            AclError::AclApply { .. } => "acl_apply",
            AclError::OwnershipApply { .. } => "ownership_apply",
            AclError::Action { .. } => "action",
            AclError::AmbiguousTarget { .. } => "ambiguous_target",
            AclError::TargetNotFound { .. } => "target_not_found",
            AclError::Unsupported { .. } => "unsupported",
        }
    }

    /// Input-validation failures happen before any privilege or handle is touched.
    pub fn is_validation(&self) -> bool {
        matches!(self, AclError::Usage { .. } | AclError::UnknownObjectKind { .. } | AclError::UnknownCommand { .. })
    }

    /// Process exit status for this failure. Every failure maps to 1.
    pub fn exit_status(&self) -> i32 { 1 }

    pub fn usage<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::Usage { code: code.into(), message: msg.into() } }
    pub fn unknown_kind<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::UnknownObjectKind { code: code.into(), message: msg.into() } }
    pub fn unknown_command<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::UnknownCommand { code: code.into(), message: msg.into() } }
    pub fn privilege<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::PrivilegeAcquisition { code: code.into(), message: msg.into() } }
    pub fn open<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::ObjectOpen { code: code.into(), message: msg.into() } }
    pub fn identifier<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::IdentifierResolution { code: code.into(), message: msg.into() } }
    pub fn acl_build<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::AclBuild { code: code.into(), message: msg.into() } }
    pub fn acl_apply<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::AclApply { code: code.into(), message: msg.into() } }
    pub fn ownership<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::OwnershipApply { code: code.into(), message: msg.into() } }
    pub fn action<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::Action { code: code.into(), message: msg.into() } }
    pub fn ambiguous<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::AmbiguousTarget { code: code.into(), message: msg.into() } }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::TargetNotFound { code: code.into(), message: msg.into() } }
    pub fn unsupported<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AclError::Unsupported { code: code.into(), message: msg.into() } }
}

/// Render a platform status the way diagnostics print it: `0x5 (Access is denied.)`.
/// The description is omitted when the platform had no text for the code.
pub fn status_message(status: u32, description: &str) -> String {
    if description.is_empty() { format!("0x{:x}", status) } else { format!("0x{:x} ({})", status, description) }
}

impl Display for AclError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AclError {}

pub type AclResult<T> = Result<T, AclError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_exits_one() {
        assert_eq!(AclError::usage("usage", "bad").exit_status(), 1);
        assert_eq!(AclError::unknown_command("unknown_command", "x").exit_status(), 1);
        assert_eq!(AclError::acl_apply("SetSecurityInfo (DACL)", "0x5").exit_status(), 1);
        assert_eq!(AclError::not_found("process", "none").exit_status(), 1);
    }

    #[test]
    fn display_joins_code_and_message() {
        let e = AclError::open("OpenEventW", &status_message(2, "The system cannot find the file specified."));
        assert_eq!(e.to_string(), "OpenEventW: 0x2 (The system cannot find the file specified.)");
        assert_eq!(status_message(0x522, ""), "0x522");
    }

    #[test]
    fn validation_classification() {
        assert!(AclError::unknown_kind("unknown_object_kind", "--pipe").is_validation());
        assert!(AclError::unknown_command("unknown_command", "frob").is_validation());
        assert!(!AclError::privilege("SeDebugPrivilege", "0x522").is_validation());
    }

    #[test]
    fn serde_tag_matches_kind_str() {
        let e = AclError::ambiguous("notepad.exe", "2 matches");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v.get("type").and_then(|t| t.as_str()), Some(e.kind_str()));
        assert_eq!(v.get("code").and_then(|t| t.as_str()), Some("notepad.exe"));
        let back: AclError = serde_json::from_value(v).unwrap();
        assert_eq!(back, e);
    }
}
