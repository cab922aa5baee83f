//! Grant/deny decisions for transcription requests.
//!
//! Everything here is a pure function of its inputs; reading and recording
//! usage is the ledger's job.

use std::fmt;
use thiserror::Error;

pub const FREE_CAP_SECONDS: u32 = 300;
pub const PREMIUM_CAP_SECONDS: u32 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative seconds each tier may process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierCaps {
    pub free: u32,
    pub premium: u32,
}

impl Default for TierCaps {
    fn default() -> Self {
        Self {
            free: FREE_CAP_SECONDS,
            premium: PREMIUM_CAP_SECONDS,
        }
    }
}

impl TierCaps {
    pub fn cap(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Free => self.free,
            Tier::Premium => self.premium,
        }
    }
}

/// Remaining allowance split for display. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemainingTime {
    pub minutes: i64,
    pub seconds: i64,
}

impl RemainingTime {
    pub fn from_seconds(total: i64) -> Self {
        let total = total.max(0);
        Self {
            minutes: total / 60,
            seconds: total % 60,
        }
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02} minutes {:02} seconds", self.minutes, self.seconds)
    }
}

/// Why a request was turned away. `Display` is the text shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error("The audio file is too long. Only {max_minutes} minutes allowed for users without premium")]
    DurationExceeded { max_minutes: u32 },

    #[error("Too long audio, you dont have enough free time, remaining time: {remaining}")]
    QuotaExhausted { remaining: RemainingTime },

    #[error(
        "Dear {first_name}, You have exceeded maximum numbers of free decoding of audio,to get premium - type /premium"
    )]
    Blocked { first_name: String },

    #[error("There is an error occurred, please try again later")]
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Grant,
    Deny(Denial),
}

/// Rejects a single request longer than the free cap, whatever was consumed
/// before. Premium requests have no per-request ceiling.
pub fn check_duration(requested: u32, tier: Tier, caps: &TierCaps) -> Option<Denial> {
    match tier {
        Tier::Premium => None,
        Tier::Free if requested > caps.free => Some(Denial::DurationExceeded {
            max_minutes: caps.free / 60,
        }),
        Tier::Free => None,
    }
}

pub fn check_admission(requested: u32, tier: Tier, consumed: i64, caps: &TierCaps) -> Decision {
    if let Some(denial) = check_duration(requested, tier, caps) {
        return Decision::Deny(denial);
    }

    if tier == Tier::Premium {
        return Decision::Grant;
    }

    let cap = i64::from(caps.free);
    if consumed + i64::from(requested) > cap {
        return Decision::Deny(Denial::QuotaExhausted {
            remaining: RemainingTime::from_seconds(cap - consumed),
        });
    }

    Decision::Grant
}

/// Allowance left for `tier` once `consumed` seconds are on the ledger,
/// clamped at zero.
pub fn remaining_time(tier: Tier, consumed: i64, caps: &TierCaps) -> RemainingTime {
    RemainingTime::from_seconds(i64::from(caps.cap(tier)) - consumed)
}
