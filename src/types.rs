/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Text-backed enums: string conversions plus PostgreSQL encode/decode as TEXT.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <str as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let text = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(text.parse()?)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

/// Account role chosen at sign-up. `Admin` is only ever granted by another admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Expert,
    Organization,
    Admin,
}

text_enum!(Role, "role", {
    Expert => "expert",
    Organization => "organization",
    Admin => "admin",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Open,
    InProgress,
    Completed,
    Cancelled,
}

text_enum!(CampaignStatus, "campaign status", {
    Draft => "draft",
    Open => "open",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl CampaignStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Draft, Open) | (Draft, Cancelled) => true,
            (Open, InProgress) | (Open, Completed) | (Open, Cancelled) => true,
            (InProgress, Completed) | (InProgress, Cancelled) => true,
            _ => false,
        }
    }

    /// Whether experts may still submit proposals.
    pub fn accepts_proposals(self) -> bool {
        self == CampaignStatus::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

text_enum!(ProposalStatus, "proposal status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
    Withdrawn => "withdrawn",
});

impl ProposalStatus {
    pub fn can_transition_to(self, next: ProposalStatus) -> bool {
        self == ProposalStatus::Pending && next != ProposalStatus::Pending
    }

    /// Decisions belong to the campaign owner; withdrawal to the expert.
    pub fn decided_by_organization(self) -> bool {
        matches!(self, ProposalStatus::Accepted | ProposalStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

text_enum!(TaskStatus, "task status", {
    Todo => "todo",
    InProgress => "in_progress",
    Done => "done",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_transitions_follow_lifecycle() {
        use CampaignStatus::*;
        assert!(Draft.can_transition_to(Open));
        assert!(Open.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(!Open.can_transition_to(Draft));
        assert!(!Completed.can_transition_to(Open));
        assert!(!Cancelled.can_transition_to(Draft));
        assert!(Completed.is_terminal());
    }

    #[test]
    fn proposal_leaves_pending_once() {
        use ProposalStatus::*;
        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Withdrawn));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Accepted.can_transition_to(Rejected));
        assert!(!Withdrawn.can_transition_to(Accepted));
    }

    #[test]
    fn text_round_trip_and_unknown_values() {
        for status in CampaignStatus::ALL {
            assert_eq!(status.as_str().parse::<CampaignStatus>().unwrap(), *status);
        }
        let err = "archived".parse::<TaskStatus>().unwrap_err();
        assert_eq!(err.kind, "task status");
        assert_eq!(err.to_string(), "unknown task status 'archived'");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&CampaignStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let role: Role = serde_json::from_str("\"organization\"").unwrap();
        assert_eq!(role, Role::Organization);
    }
}
