use orderflow_core::approvals::{AmountBand, ThresholdPolicy};
use orderflow_core::domain::approval::AdminLevel;
use orderflow_core::domain::order::ApprovalStatus;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct LevelsReport {
    amount: Decimal,
    band: AmountBand,
    required_levels: Vec<AdminLevel>,
    initial_status: ApprovalStatus,
}

/// Previews the approval plan for an amount. Needs no configuration or database.
/// Total over all amounts; order creation is where negative amounts are refused.
pub fn run(amount: Decimal) -> CommandResult {
    let policy = ThresholdPolicy;
    let required_levels = policy.required_levels(amount);
    let initial_status = match required_levels.first() {
        Some(level) => ApprovalStatus::AwaitingLevel(*level),
        None => ApprovalStatus::Pending,
    };
    let labels = required_levels.iter().map(ToString::to_string).collect::<Vec<_>>();

    CommandResult::success_with_data(
        "levels",
        format!("amount {amount} requires {}", labels.join(", ")),
        &LevelsReport { amount, band: policy.band(amount), required_levels, initial_status },
    )
}
