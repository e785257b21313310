//! Post-authentication authorization
//!
//! A pure decision table over (identity, requested resource owner,
//! admin-only flag). Evaluated in order, first match wins:
//!
//! 1. admin             => allow
//! 2. admin_only        => deny
//! 3. no resource owner => allow
//! 4. anonymous caller  => allow
//! 5. caller owns it    => allow
//! 6. otherwise         => deny
//!
//! No state, no I/O; the middleware maps a deny to 403.

use crate::models::Identity;

/// Authorization decision for one request
pub fn authorize(identity: &Identity, admin_only: bool) -> bool {
    // Admins bypass all further checks
    if identity.is_admin() {
        return true;
    }

    if admin_only {
        return false;
    }

    // The route has no owner concept; the request targets the caller's own
    // resources
    if identity.requested_owner.is_empty() {
        return true;
    }

    // Ownership checks only apply to authenticated callers
    if identity.is_anonymous() {
        return true;
    }

    identity.username() == identity.requested_owner
}
