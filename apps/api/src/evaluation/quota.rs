//! Usage quota — daily cap on report generations for non-premium accounts.
//!
//! Stateless functions over the profile's `{is_premium, daily_usage}`. The day
//! rollover is checked inline by both admission and recording; there is no
//! separate reset step.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::profile::{DailyUsage, TeacherProfile};

/// Reports a free account may generate per calendar day.
pub const DAILY_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaState {
    Premium,
    FreeUnderLimit,
    FreeAtLimit,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub state: QuotaState,
    pub used_today: u32,
    pub daily_limit: u32,
    /// `None` for premium accounts.
    pub remaining: Option<u32>,
}

/// Generations already counted for `today`. A stale date counts as zero.
pub fn used_today(profile: &TeacherProfile, today: NaiveDate) -> u32 {
    match profile.daily_usage {
        Some(usage) if usage.date == today => usage.count,
        _ => 0,
    }
}

pub fn quota_state(profile: &TeacherProfile, today: NaiveDate) -> QuotaState {
    if profile.is_premium {
        QuotaState::Premium
    } else if used_today(profile, today) < DAILY_LIMIT {
        QuotaState::FreeUnderLimit
    } else {
        QuotaState::FreeAtLimit
    }
}

pub fn quota_status(profile: &TeacherProfile, today: NaiveDate) -> QuotaStatus {
    let state = quota_state(profile, today);
    let used = used_today(profile, today);
    QuotaStatus {
        state,
        used_today: used,
        daily_limit: DAILY_LIMIT,
        remaining: (state != QuotaState::Premium).then(|| DAILY_LIMIT.saturating_sub(used)),
    }
}

/// Whether another report may be generated today. False only at the free limit.
pub fn check_admission(profile: &TeacherProfile, today: NaiveDate) -> bool {
    quota_state(profile, today) != QuotaState::FreeAtLimit
}

/// Counts one successful generation. Call only after the generator succeeded.
///
/// Premium profiles are returned unchanged. A new day restarts the count at 1.
pub fn record_usage(mut profile: TeacherProfile, today: NaiveDate) -> TeacherProfile {
    if profile.is_premium {
        return profile;
    }
    profile.daily_usage = Some(match profile.daily_usage {
        Some(usage) if usage.date == today => DailyUsage {
            date: today,
            count: usage.count.saturating_add(1),
        },
        _ => DailyUsage {
            date: today,
            count: 1,
        },
    });
    profile
}
