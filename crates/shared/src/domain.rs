use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                // canonical hyphenated lowercase hex
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ConferenceId);
id_newtype!(RequestId);
id_newtype!(SessionId);
id_newtype!(RegistrationId);
id_newtype!(FeedbackId);
id_newtype!(MediaId);

/// Raised when a persisted status string is outside the enum. This is a
/// programmer or data-corruption error, not a runtime business outcome.
#[derive(Debug, Clone, Error)]
#[error("invalid {kind} value: {value}")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConferenceStatus {
    Submitted,
    UnderValidation,
    Scheduled,
    Archived,
}

impl ConferenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderValidation => "under_validation",
            Self::Scheduled => "scheduled",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Result<Self, InvalidEnumValue> {
        match value {
            "submitted" => Ok(Self::Submitted),
            "under_validation" => Ok(Self::UnderValidation),
            "scheduled" => Ok(Self::Scheduled),
            "archived" => Ok(Self::Archived),
            other => Err(InvalidEnumValue {
                kind: "conference status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ConferenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, InvalidEnumValue> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(InvalidEnumValue {
                kind: "moderation request status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Moderator,
    Presenter,
    Participant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Presenter => "presenter",
            Self::Participant => "participant",
        }
    }

    pub fn parse(value: &str) -> Result<Self, InvalidEnumValue> {
        match value {
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            "presenter" => Ok(Self::Presenter),
            "participant" => Ok(Self::Participant),
            other => Err(InvalidEnumValue {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Slides,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slides => "slides",
            Self::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Result<Self, InvalidEnumValue> {
        match value {
            "slides" => Ok(Self::Slides),
            "video" => Ok(Self::Video),
            other => Err(InvalidEnumValue {
                kind: "media type",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
