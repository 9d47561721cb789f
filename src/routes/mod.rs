/// Router Module Index
///
/// Groups the `/api` endpoints by the extractor that guards them. Access control lives in the
/// handler signatures (`AuthUser`, `Firefighter`), so the grouping documents intent and keeps
/// each surface easy to audit.

/// Anonymous, read-only endpoints plus login.
pub mod public;

/// Endpoints whose handlers take `AuthUser` (or `BearerToken` for logout).
pub mod authenticated;

/// Endpoints whose handlers take `Firefighter`.
pub mod firefighter;
