//! Pricing plan resolution for BUSINESS callers.
//!
//! Plans are resolved from the identifier itself: API keys issued to basic
//! customers start with `BX001-`, professional keys with `PX001-`, and every
//! other identifier (including `IP:` identifiers) is treated as free.

/// Plan assigned to identifiers without a recognised prefix.
pub const FREE_PLAN: &str = "free";
pub const BASIC_PLAN: &str = "basic";
pub const PROFESSIONAL_PLAN: &str = "professional";

const BASIC_PREFIX: &str = "BX001-";
const PROFESSIONAL_PREFIX: &str = "PX001-";

/// Resolve the pricing plan for `identifier`.
pub fn resolve_plan(identifier: &str) -> &'static str {
    if identifier.starts_with(BASIC_PREFIX) {
        BASIC_PLAN
    } else if identifier.starts_with(PROFESSIONAL_PREFIX) {
        PROFESSIONAL_PLAN
    } else {
        FREE_PLAN
    }
}
