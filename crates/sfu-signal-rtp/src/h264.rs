//! H.264 `profile-level-id` parsing and offer/answer negotiation.
//!
//! A profile-level-id is three hex bytes: `profile_idc`, `profile_iop`
//! (constraint flags) and `level_idc`. The profile is derived from the first
//! two bytes through a fixed set of bit patterns; the level from the third,
//! with level 1b encoded as `level_idc == 11` plus constraint-set-3.

use tracing::{debug, warn};

use crate::error::H264Error;
use crate::rtp_parameters::CodecParameters;

/// H.264 profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Profile {
    ConstrainedBaseline,
    Baseline,
    Main,
    ConstrainedHigh,
    High,
}

/// H.264 level. The discriminant is `level_idc`, except for 1b.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Level {
    L1b = 0,
    L1 = 10,
    L1_1 = 11,
    L1_2 = 12,
    L1_3 = 13,
    L2 = 20,
    L2_1 = 21,
    L2_2 = 22,
    L3 = 30,
    L3_1 = 31,
    L3_2 = 32,
    L4 = 40,
    L4_1 = 41,
    L4_2 = 42,
    L5 = 50,
    L5_1 = 51,
    L5_2 = 52,
}

impl Level {
    /// Level for a `level_idc` other than 11 (which needs the constraint
    /// flags to tell 1.1 from 1b).
    fn from_idc(level_idc: u8) -> Option<Self> {
        let level = match level_idc {
            10 => Level::L1,
            11 => Level::L1_1,
            12 => Level::L1_2,
            13 => Level::L1_3,
            20 => Level::L2,
            21 => Level::L2_1,
            22 => Level::L2_2,
            30 => Level::L3,
            31 => Level::L3_1,
            32 => Level::L3_2,
            40 => Level::L4,
            41 => Level::L4_1,
            42 => Level::L4_2,
            50 => Level::L5,
            51 => Level::L5_1,
            52 => Level::L5_2,
            _ => return None,
        };
        Some(level)
    }

    pub fn level_idc(self) -> u8 {
        self as u8
    }
}

/// Parsed profile-level-id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileLevelId {
    pub profile: Profile,
    pub level: Level,
}

impl ProfileLevelId {
    pub const fn new(profile: Profile, level: Level) -> Self {
        Self { profile, level }
    }
}

/// Used when an SDP codec carries no profile-level-id.
pub const DEFAULT_PROFILE_LEVEL_ID: ProfileLevelId =
    ProfileLevelId::new(Profile::ConstrainedBaseline, Level::L3_1);

const CONSTRAINT_SET3_FLAG: u8 = 0x10;

/// Mask/value pair over `profile_iop`, built from an 8 character pattern
/// where `x` is "don't care".
struct BitPattern {
    mask: u8,
    masked_value: u8,
}

impl BitPattern {
    const fn new(pattern: &[u8; 8]) -> Self {
        Self {
            mask: !byte_mask(b'x', pattern),
            masked_value: byte_mask(b'1', pattern),
        }
    }

    fn is_match(&self, value: u8) -> bool {
        self.masked_value == (value & self.mask)
    }
}

const fn byte_mask(c: u8, pattern: &[u8; 8]) -> u8 {
    let mut out = 0u8;
    let mut i = 0;
    while i < 8 {
        if pattern[i] == c {
            out |= 1 << (7 - i);
        }
        i += 1;
    }
    out
}

struct ProfilePattern {
    profile_idc: u8,
    profile_iop: BitPattern,
    profile: Profile,
}

// First match wins.
const PROFILE_PATTERNS: [ProfilePattern; 8] = [
    ProfilePattern {
        profile_idc: 0x42,
        profile_iop: BitPattern::new(b"x1xx0000"),
        profile: Profile::ConstrainedBaseline,
    },
    ProfilePattern {
        profile_idc: 0x4D,
        profile_iop: BitPattern::new(b"1xxx0000"),
        profile: Profile::ConstrainedBaseline,
    },
    ProfilePattern {
        profile_idc: 0x58,
        profile_iop: BitPattern::new(b"11xx0000"),
        profile: Profile::ConstrainedBaseline,
    },
    ProfilePattern {
        profile_idc: 0x42,
        profile_iop: BitPattern::new(b"x0xx0000"),
        profile: Profile::Baseline,
    },
    ProfilePattern {
        profile_idc: 0x58,
        profile_iop: BitPattern::new(b"10xx0000"),
        profile: Profile::Baseline,
    },
    ProfilePattern {
        profile_idc: 0x4D,
        profile_iop: BitPattern::new(b"0x0x0000"),
        profile: Profile::Main,
    },
    ProfilePattern {
        profile_idc: 0x64,
        profile_iop: BitPattern::new(b"00000000"),
        profile: Profile::High,
    },
    ProfilePattern {
        profile_idc: 0x64,
        profile_iop: BitPattern::new(b"00001100"),
        profile: Profile::ConstrainedHigh,
    },
];

/// Parse a profile-level-id given as 6 hex digits.
///
/// Returns `None` for anything that is not a recognized H.264 profile/level.
pub fn parse_profile_level_id(value: &str) -> Option<ProfileLevelId> {
    if value.len() != 6 {
        return None;
    }
    let numeric = u32::from_str_radix(value, 16).ok()?;
    if numeric == 0 {
        return None;
    }

    let level_idc = (numeric & 0xFF) as u8;
    let profile_iop = ((numeric >> 8) & 0xFF) as u8;
    let profile_idc = ((numeric >> 16) & 0xFF) as u8;

    let level = if level_idc == Level::L1_1.level_idc() {
        if profile_iop & CONSTRAINT_SET3_FLAG != 0 {
            Level::L1b
        } else {
            Level::L1_1
        }
    } else {
        match Level::from_idc(level_idc) {
            Some(level) => level,
            None => {
                debug!(level_idc, "unrecognized H264 level_idc");
                return None;
            }
        }
    };

    let profile = PROFILE_PATTERNS
        .iter()
        .find(|pattern| {
            pattern.profile_idc == profile_idc && pattern.profile_iop.is_match(profile_iop)
        })
        .map(|pattern| pattern.profile);
    match profile {
        Some(profile) => Some(ProfileLevelId { profile, level }),
        None => {
            debug!(
                profile_idc,
                profile_iop, "unrecognized H264 profile_idc/profile_iop combination"
            );
            None
        }
    }
}

/// Canonical 6 hex digit form, or `None` for combinations that have none
/// (level 1b is only defined for the baseline and main profiles).
pub fn profile_level_id_to_string(profile_level_id: &ProfileLevelId) -> Option<String> {
    if profile_level_id.level == Level::L1b {
        return match profile_level_id.profile {
            Profile::ConstrainedBaseline => Some("42f00b".to_string()),
            Profile::Baseline => Some("42100b".to_string()),
            Profile::Main => Some("4d100b".to_string()),
            other => {
                debug!(profile = ?other, "level 1b not allowed for profile");
                None
            }
        };
    }

    let prefix = match profile_level_id.profile {
        Profile::ConstrainedBaseline => "42e0",
        Profile::Baseline => "4200",
        Profile::Main => "4d00",
        Profile::ConstrainedHigh => "640c",
        Profile::High => "6400",
    };
    Some(format!("{prefix}{:02x}", profile_level_id.level.level_idc()))
}

/// Parse the profile-level-id SDP parameter; a missing (or empty) value means
/// constrained baseline level 3.1.
pub fn parse_sdp_profile_level_id(value: Option<&str>) -> Option<ProfileLevelId> {
    match value {
        None | Some("") => Some(DEFAULT_PROFILE_LEVEL_ID),
        Some(value) => parse_profile_level_id(value),
    }
}

/// True when both values parse and name the same profile (levels may differ).
pub fn is_same_profile(a: Option<&str>, b: Option<&str>) -> bool {
    match (parse_sdp_profile_level_id(a), parse_sdp_profile_level_id(b)) {
        (Some(a), Some(b)) => a.profile == b.profile,
        _ => false,
    }
}

/// Level ordering with 1b sorting between 1 and 1.1.
fn is_less_level(a: Level, b: Level) -> bool {
    if a == Level::L1b {
        return b != Level::L1 && b != Level::L1b;
    }
    if b == Level::L1b {
        return a != Level::L1;
    }
    a.level_idc() < b.level_idc()
}

fn min_level(a: Level, b: Level) -> Level {
    if is_less_level(a, b) {
        a
    } else {
        b
    }
}

/// Profile-level-id to put in an answer given the local and remote codec
/// parameters.
///
/// A side without a profile-level-id counts as [`DEFAULT_PROFILE_LEVEL_ID`].
/// The answer level is the local level when both sides set
/// `level-asymmetry-allowed`, otherwise the lower of the two.
pub fn generate_profile_level_id_for_answer(
    local: &CodecParameters,
    remote: &CodecParameters,
) -> Result<String, H264Error> {
    let local_value = local.profile_level_id.as_deref();
    let remote_value = remote.profile_level_id.as_deref();

    let local_id = parse_sdp_profile_level_id(local_value)
        .ok_or_else(|| H264Error::InvalidLocal(local_value.unwrap_or_default().to_string()))?;
    let remote_id = parse_sdp_profile_level_id(remote_value)
        .ok_or_else(|| H264Error::InvalidRemote(remote_value.unwrap_or_default().to_string()))?;

    if local_id.profile != remote_id.profile {
        warn!(
            local = ?local_id.profile,
            remote = ?remote_id.profile,
            "H264 profile mismatch"
        );
        return Err(H264Error::ProfileMismatch);
    }

    let level_asymmetry_allowed = local.level_asymmetry_allowed == Some(true)
        && remote.level_asymmetry_allowed == Some(true);
    let answer_level = if level_asymmetry_allowed {
        local_id.level
    } else {
        min_level(local_id.level, remote_id.level)
    };

    debug!(
        profile = ?local_id.profile,
        level = ?answer_level,
        "generated answer profile-level-id"
    );
    profile_level_id_to_string(&ProfileLevelId::new(local_id.profile, answer_level))
        .ok_or(H264Error::Unrepresentable)
}
