//! Market-session admission control.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use common::AssetType;
use serde::{Deserialize, Serialize};

/// Whether an executor account may trade outside venue hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionPolicy {
    /// Only accept session-bound assets while the venue is open.
    MarketHoursOnly,
    /// Explicit all-hours override for this account.
    AllHours,
}

/// Venue trading hours, expressed in UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCalendar {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub trading_days: Vec<Weekday>,
}

impl Default for SessionCalendar {
    /// US cash equity session, 09:30-16:00 New York expressed as UTC.
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(14, 30, 0).expect("valid time"),
            close: NaiveTime::from_hms_opt(21, 0, 0).expect("valid time"),
            trading_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }
}

impl SessionCalendar {
    /// Whether the venue itself is open at `at`.
    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        use chrono::{Datelike, Timelike};
        let weekday = at.weekday();
        if !self.trading_days.contains(&weekday) {
            return false;
        }
        let time = NaiveTime::from_hms_opt(at.hour(), at.minute(), at.second()).expect("valid time");
        time >= self.open && time < self.close
    }

    /// Session check for an asset class: crypto-class assets bypass the
    /// calendar entirely, everything else is bound to venue hours.
    pub fn asset_in_session(&self, asset_type: AssetType, at: DateTime<Utc>) -> bool {
        asset_type.trades_all_hours() || self.is_open(at)
    }
}
