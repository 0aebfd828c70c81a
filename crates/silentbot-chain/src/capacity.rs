//! Voting mana arithmetic.

use serde_json::Value;

use silentbot_core::{Error, Result};

/// Seconds for an empty manabar to refill completely (5 days).
pub const MANA_REGENERATION_SECS: i64 = 432_000;

/// Voting manabar as reported by `condenser_api.get_accounts`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Manabar {
    pub current_mana: f64,
    pub last_update_time: i64,
    pub max_mana: f64,
}

impl Manabar {
    /// Extract the manabar from an account object.
    ///
    /// Maximum mana is the effective vesting balance (own + received
    /// − delegated − pending withdrawal) scaled to raw mana units.
    pub fn from_account(account: &Value) -> Result<Self> {
        let bar = &account["voting_manabar"];
        let current_mana = number(&bar["current_mana"])
            .ok_or_else(|| Error::Malformed("account without voting_manabar".into()))?;
        let last_update_time = bar["last_update_time"].as_i64().unwrap_or(0);

        let vests = |field: &str| asset_amount(&account[field]).unwrap_or(0.0);
        let withdrawing = number(&account["to_withdraw"]).unwrap_or(0.0)
            - number(&account["withdrawn"]).unwrap_or(0.0);
        let effective = vests("vesting_shares") + vests("received_vesting_shares")
            - vests("delegated_vesting_shares")
            - withdrawing.max(0.0) / 1e6;

        Ok(Self {
            current_mana,
            last_update_time,
            max_mana: (effective * 1e6).max(0.0),
        })
    }

    /// Percentage of full mana at `now`, regenerated linearly and capped.
    pub fn percentage(&self, now: i64) -> f64 {
        if self.max_mana <= 0.0 {
            return 0.0;
        }
        let elapsed = (now - self.last_update_time).max(0) as f64;
        let regenerated = elapsed * self.max_mana / MANA_REGENERATION_SECS as f64;
        let mana = (self.current_mana + regenerated).min(self.max_mana);
        (mana * 100.0 / self.max_mana).clamp(0.0, 100.0)
    }
}

/// Numbers arrive either as JSON numbers or as decimal strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Amount part of an asset string such as `"1234.567890 VESTS"`.
fn asset_amount(value: &Value) -> Option<f64> {
    value.as_str()?.split_whitespace().next()?.parse().ok()
}
