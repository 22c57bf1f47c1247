use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::AdminLevel;

pub const LEVEL_1_THRESHOLD: Decimal = Decimal::from_parts(500, 0, 0, false, 0);
pub const LEVEL_2_THRESHOLD: Decimal = Decimal::from_parts(2_000, 0, 0, false, 0);
pub const LEVEL_3_THRESHOLD: Decimal = Decimal::from_parts(15_000, 0, 0, false, 0);

/// Where an amount falls relative to the three thresholds.
///
/// `AboveLevel3` requires the same levels as `UpToLevel3`; there is no fourth tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountBand {
    UpToLevel1,
    UpToLevel2,
    UpToLevel3,
    AboveLevel3,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThresholdPolicy;

impl ThresholdPolicy {
    pub fn band(&self, amount: Decimal) -> AmountBand {
        if amount <= LEVEL_1_THRESHOLD {
            AmountBand::UpToLevel1
        } else if amount <= LEVEL_2_THRESHOLD {
            AmountBand::UpToLevel2
        } else if amount <= LEVEL_3_THRESHOLD {
            AmountBand::UpToLevel3
        } else {
            AmountBand::AboveLevel3
        }
    }

    /// Ascending, non-empty prefix of `[1, 2, 3]`.
    pub fn required_levels(&self, amount: Decimal) -> Vec<AdminLevel> {
        let depth = match self.band(amount) {
            AmountBand::UpToLevel1 => 1,
            AmountBand::UpToLevel2 => 2,
            AmountBand::UpToLevel3 | AmountBand::AboveLevel3 => 3,
        };
        AdminLevel::ALL[..depth].to_vec()
    }

    pub fn requires(&self, amount: Decimal, level: AdminLevel) -> bool {
        self.required_levels(amount).contains(&level)
    }
}

pub fn required_levels(amount: Decimal) -> Vec<AdminLevel> {
    ThresholdPolicy.required_levels(amount)
}
