//! Token privileges and their scope guards.
//!
//! A privilege enabled on the process token is visible to every handle the
//! process opens afterwards, so it is held only for as long as a
//! [`PrivilegeGuard`] lives. Guards borrow a [`SecurityContext`] that tracks
//! what is currently held; guards for the same privilege nest. The token is
//! enabled by the first hold and disabled when the last hold goes, whichever
//! guard that is.

use serde::Serialize;
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};

use crate::error::{AclError, AclResult};
use crate::platform::{self, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Privilege {
    TakeOwnership,
    Restore,
    Debug,
}

impl Privilege {
    /// Name passed to `LookupPrivilegeValueW`.
    pub fn name(&self) -> &'static str {
        match self {
            Privilege::TakeOwnership => "SeTakeOwnershipPrivilege",
            Privilege::Restore => "SeRestorePrivilege",
            Privilege::Debug => "SeDebugPrivilege",
        }
    }
}

impl Display for Privilege {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.name()) }
}

/// Privilege state for one invocation. Not `Sync`: the held stack lives in a `RefCell`.
pub struct SecurityContext<'p> {
    platform: &'p dyn Platform,
    held: RefCell<Vec<Privilege>>,
}

impl<'p> SecurityContext<'p> {
    pub fn new(platform: &'p dyn Platform) -> Self {
        Self { platform, held: RefCell::new(Vec::new()) }
    }

    pub fn platform(&self) -> &'p dyn Platform { self.platform }

    /// Privileges currently held, outermost first.
    pub fn held(&self) -> Vec<Privilege> { self.held.borrow().clone() }

    /// Enable `privilege` for the lifetime of the returned guard.
    /// `None` yields a guard that is enabled and never touches the token.
    pub fn acquire(&self, privilege: Option<Privilege>) -> AclResult<PrivilegeGuard<'_>> {
        let Some(p) = privilege else {
            return Ok(PrivilegeGuard { ctx: self, privilege: None });
        };
        let already_held = self.held.borrow().contains(&p);
        if !already_held {
            self.platform
                .set_privilege(p, true)
                .map_err(|code| platform::failure(self.platform, AclError::privilege, p.name(), code))?;
            debug!(target: "acltool::privilege", privilege = p.name(), "enabled");
        } else {
            debug!(target: "acltool::privilege", privilege = p.name(), "already enabled by an outer scope");
        }
        self.held.borrow_mut().push(p);
        Ok(PrivilegeGuard { ctx: self, privilege: Some(p) })
    }

    /// Acquire each privilege in order. If one fails, those already enabled
    /// are released in reverse before the error is returned.
    pub fn acquire_all(&self, privileges: &[Privilege]) -> AclResult<PrivilegeStack<'_>> {
        let mut stack = PrivilegeStack { guards: Vec::with_capacity(privileges.len()) };
        for p in privileges {
            stack.guards.push(self.acquire(Some(*p))?);
        }
        Ok(stack)
    }

    fn release(&self, p: Privilege) {
        let still_held = {
            let mut held = self.held.borrow_mut();
            match held.iter().rposition(|h| *h == p) {
                Some(pos) => {
                    if pos + 1 != held.len() {
                        warn!(target: "acltool::privilege", privilege = p.name(), "released out of acquisition order");
                    }
                    held.remove(pos);
                }
                None => warn!(target: "acltool::privilege", privilege = p.name(), "released but not tracked as held"),
            }
            held.contains(&p)
        };
        if still_held {
            debug!(target: "acltool::privilege", privilege = p.name(), "still held by another scope");
            return;
        }
        match self.platform.set_privilege(p, false) {
            Ok(()) => debug!(target: "acltool::privilege", privilege = p.name(), "disabled"),
            Err(code) => warn!(
                target: "acltool::privilege",
                privilege = p.name(),
                "failed to disable: {}",
                crate::error::status_message(code, &self.platform.describe_error(code))
            ),
        }
    }
}

/// Holds one privilege enabled; disables it exactly once on drop.
#[must_use = "the privilege is disabled as soon as the guard is dropped"]
pub struct PrivilegeGuard<'a> {
    ctx: &'a SecurityContext<'a>,
    privilege: Option<Privilege>,
}

impl PrivilegeGuard<'_> {
    pub fn privilege(&self) -> Option<Privilege> { self.privilege }

    /// A guard only exists once its privilege is enabled, so this is always true.
    pub fn is_enabled(&self) -> bool { true }
}

impl Drop for PrivilegeGuard<'_> {
    fn drop(&mut self) {
        if let Some(p) = self.privilege.take() {
            self.ctx.release(p);
        }
    }
}

/// An ordered set of guards released strictly last-in first-out.
/// A plain `Vec` drops its elements front to back, which would be the wrong order.
#[must_use]
pub struct PrivilegeStack<'a> {
    guards: Vec<PrivilegeGuard<'a>>,
}

impl PrivilegeStack<'_> {
    pub fn privileges(&self) -> Vec<Privilege> { self.guards.iter().filter_map(|g| g.privilege()).collect() }

    pub fn is_empty(&self) -> bool { self.guards.is_empty() }

    /// Release every guard, innermost first.
    pub fn release(mut self) { self.unwind(); }

    fn unwind(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

impl Drop for PrivilegeStack<'_> {
    fn drop(&mut self) { self.unwind(); }
}
