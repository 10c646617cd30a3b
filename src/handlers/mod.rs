// handlers/mod.rs - two-tier handler layout
//
// Public (no token, or optional token for user bootstrap) and
// Protected (long token required, scope and tenant checks in services).

pub mod protected;
pub mod public;
