pub mod guard;
pub mod threshold;

pub use guard::{Authorization, AuthorizationGuard, DenialReason};
pub use threshold::{required_levels, AmountBand, ThresholdPolicy};
