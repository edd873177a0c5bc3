//! Subscription tiers, conversation modes and consumption channels.
//!
//! Unrecognized wire values parse to an `Unknown` variant instead of
//! failing, so policy lookups can fail closed (zero cap, zero pool).

use serde::{Deserialize, Serialize};

/// Subscription level of an account. Determines the rolling included pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tier {
    Trial,
    MemberFriend,
    MemberRomantic,
    MemberIntimate,
    /// Any tier string the engine does not recognize.
    Unknown,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::Trial,
        Tier::MemberFriend,
        Tier::MemberRomantic,
        Tier::MemberIntimate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Trial => "trial",
            Tier::MemberFriend => "member_friend",
            Tier::MemberRomantic => "member_romantic",
            Tier::MemberIntimate => "member_intimate",
            Tier::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Tier {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trial" => Tier::Trial,
            "member_friend" => Tier::MemberFriend,
            "member_romantic" => Tier::MemberRomantic,
            "member_intimate" => Tier::MemberIntimate,
            _ => Tier::Unknown,
        }
    }
}

impl From<String> for Tier {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.as_str().to_string()
    }
}

/// Conversational style of a session. Determines the per-session cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    Friend,
    Romantic,
    Intimate,
    /// Any mode string the engine does not recognize.
    Unknown,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Friend, Mode::Romantic, Mode::Intimate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Friend => "friend",
            Mode::Romantic => "romantic",
            Mode::Intimate => "intimate",
            Mode::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Mode {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "friend" => Mode::Friend,
            "romantic" => Mode::Romantic,
            "intimate" => Mode::Intimate,
            _ => Mode::Unknown,
        }
    }
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.as_str().to_string()
    }
}

/// Consumption category that purchased credit is tracked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Text,
    Tts,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Text, Channel::Tts];

    /// Audio sessions consume `tts` credit, everything else consumes `text`.
    pub fn for_session(uses_audio_channel: bool) -> Self {
        if uses_audio_channel {
            Channel::Tts
        } else {
            Channel::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Text => "text",
            Channel::Tts => "tts",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Channel::Text),
            "tts" | "audio" => Ok(Channel::Tts),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_round_trip_names() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from(tier.as_str()), tier);
        }
        assert_eq!(Tier::from("platinum"), Tier::Unknown);
        assert_eq!(Tier::from(" Member_Romantic "), Tier::MemberRomantic);
    }

    #[test]
    fn test_mode_unknown_value() {
        assert_eq!(Mode::from("spicy"), Mode::Unknown);
        let mode: Mode = serde_json::from_str("\"romantic\"").unwrap();
        assert_eq!(mode, Mode::Romantic);
        let mode: Mode = serde_json::from_str("\"something-else\"").unwrap();
        assert_eq!(mode, Mode::Unknown);
    }

    #[test]
    fn test_tier_serializes_snake_case() {
        let json = serde_json::to_string(&Tier::MemberIntimate).unwrap();
        assert_eq!(json, "\"member_intimate\"");
    }

    #[test]
    fn test_channel_for_session() {
        assert_eq!(Channel::for_session(true), Channel::Tts);
        assert_eq!(Channel::for_session(false), Channel::Text);
        assert_eq!("TTS".parse::<Channel>().unwrap(), Channel::Tts);
        assert!("video".parse::<Channel>().is_err());
        assert_eq!(serde_json::to_string(&Channel::Text).unwrap(), "\"text\"");
    }
}
