/// Router Module Index
///
/// Routes are split by access rule so the authorization gate is applied once,
/// at the module level, rather than remembered per handler.

/// Read-only item pages, open to everyone.
pub mod public;

/// Account entry points (register, login, logout). Unprotected: login has to be
/// reachable while anonymous.
pub mod admin;

/// Item mutations. Mounted behind the `require_admin` gate.
pub mod authenticated;
