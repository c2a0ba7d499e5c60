//! Command-line parsing and usage text for the `acltool` binary.

use crate::error::{AclError, AclResult};
use crate::object::{ObjectKind, Operation};
use crate::orchestrator::Invocation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Help,
    Run(Invocation),
}

pub fn usage_text(program: &str) -> String {
    format!(
        r#"Usage:
  {program} <--event|--service|--process|--file> <name|pid|path> <command>

Event commands:
  set      : Set the event to signaled state
  unset    : Reset the event to non-signaled state
  harden   : Apply restrictive ACL (SYSTEM full, INTERACTIVE wait)
  query    : Query the event state
  takeown  : Transfer ownership to Administrators
  weaken   : Grant Everyone full access (owner unchanged)

Service commands:
  start    : Start the service
  stop     : Stop the service
  query    : Query the service status
  harden   : Apply restrictive ACL (SYSTEM full, INTERACTIVE read)
  takeown  : Transfer ownership to Administrators
  weaken   : Grant Everyone full access (owner unchanged)

Process commands (target is a PID or an image name such as notepad or notepad.exe):
  terminate: Terminate the process (exit code 1)
  harden   : Apply restrictive ACL (SYSTEM full, INTERACTIVE query)
  takeown  : Transfer ownership to Administrators
  weaken   : Grant Everyone full access (owner unchanged)

File commands (files or directories):
  harden   : Apply restrictive ACL (SYSTEM full, INTERACTIVE read)
  takeown  : Transfer ownership to Administrators
  weaken   : Grant Everyone full access, applied by name

Environment:
  ACLTOOL_LOG              log filter, e.g. acltool=debug (default: RUST_LOG, then warn)
  ACLTOOL_OUTPUT           text or json (default: text)
  ACLTOOL_EVENT_NAMESPACE  prefix for event names without a backslash (default: Global)

Examples:
  {program} --event MyReadyEvent query
  {program} --service Spooler stop
  {program} --process notepad terminate
  {program} --file C:\data\report.txt harden"#
    )
}

/// Parse the arguments after the program name.
pub fn parse_args(args: &[String]) -> AclResult<CliAction> {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Ok(CliAction::Help);
    }
    match args {
        [kind, target, command] => {
            let kind = ObjectKind::parse(kind)?;
            if target.is_empty() {
                return Err(AclError::usage("usage", format!("empty {} target", kind)));
            }
            Operation::parse(kind, command)?;
            Ok(CliAction::Run(Invocation::new(kind, target.clone(), command.clone())))
        }
        _ => Err(AclError::usage("usage", format!("expected 3 arguments, got {}", args.len()))),
    }
}
