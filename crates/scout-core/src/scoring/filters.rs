// Candidate pool filters shared by the similarity engine and the preset finder.

use crate::dataset::{ContractStatus, PlayerRecord};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

/// Contract-expiry cutoff. `exclude_null` decides whether players without a
/// contract date are dropped; there is no built-in default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ContractFilter {
    pub expires_before: NaiveDate,
    pub exclude_null: bool,
}

/// Candidate constraints. `Default` applies no constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FilterSpec {
    pub min_minutes: u32,
    /// Inclusive (min, max) age bounds.
    pub age_range: Option<(u32, u32)>,
    /// Require the candidate's position string to equal the reference's.
    /// Ignored by the preset finder, which has no reference.
    pub same_position: bool,
    pub contract: Option<ContractFilter>,
    /// Keep only players flagged as contract-expiring.
    pub only_expiring: bool,
}

impl FilterSpec {
    pub fn with_min_minutes(mut self, minutes: u32) -> Self {
        self.min_minutes = minutes;
        self
    }

    pub fn with_age_range(mut self, min: u32, max: u32) -> Self {
        self.age_range = Some((min, max));
        self
    }

    pub fn with_same_position(mut self, same: bool) -> Self {
        self.same_position = same;
        self
    }

    pub fn with_contract(mut self, expires_before: NaiveDate, exclude_null: bool) -> Self {
        self.contract = Some(ContractFilter {
            expires_before,
            exclude_null,
        });
        self
    }

    pub fn with_only_expiring(mut self, only: bool) -> Self {
        self.only_expiring = only;
        self
    }

    /// Minutes, age, contract and expiring-flag checks. Reference exclusion
    /// and the same-position rule live with the similarity engine.
    pub fn accepts(&self, player: &PlayerRecord) -> bool {
        if player.minutes < self.min_minutes {
            return false;
        }
        if let Some((min, max)) = self.age_range {
            if player.age < min || player.age > max {
                return false;
            }
        }
        if let Some(contract) = &self.contract {
            if !contract.accepts(player) {
                return false;
            }
        }
        if self.only_expiring && !player.contract_expiring {
            return false;
        }
        true
    }
}

impl ContractFilter {
    pub fn accepts(&self, player: &PlayerRecord) -> bool {
        match player.contract_status() {
            ContractStatus::Expires(date) => date <= self.expires_before,
            ContractStatus::Missing => !self.exclude_null,
            ContractStatus::Malformed => {
                debug!(
                    "unparseable contract date '{}' for {}; contract filter not applied",
                    player.contract_expires.as_deref().unwrap_or_default(),
                    player.name
                );
                true
            }
        }
    }
}
