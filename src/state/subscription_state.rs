//! # Subscription health state.
//!
//! [`SubscriptionState`] captures whether the relay currently holds a working
//! subscription and how many events it has accepted since the subscription was
//! (re)established.
//!
//! ## Transitions
//! ```text
//!                 increment(k)                    increment(k)
//! Establishing ─────────────────► Available{k} ◄──────────────── Unavailable
//!                                   │      ▲
//!                                   └──────┘ increment(k): Available{n + k}
//!
//! subscribe ok     → Available{0}
//! subscribe failed → Unavailable
//! ```
//!
//! ## Wire form
//! Compact tagged representation: the tag plus the count when the state has one.
//! ```text
//! Establishing  ⇄ {"state":"establishing"}
//! Unavailable   ⇄ {"state":"unavailable"}
//! Available{0}  ⇄ {"state":"available","received":0}
//! ```
//! The count is always emitted for `Available`, including zero, so a decoded state
//! is exactly the encoded one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Health of the relay's event-stream subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "StateRepr", try_from = "StateRepr")]
pub enum SubscriptionState {
    /// A subscription is being set up and no outcome is known yet.
    #[default]
    Establishing,
    /// The last subscribe attempt failed.
    Unavailable,
    /// The subscription is live; `received` counts events accepted for processing.
    Available {
        /// Events accepted since the state last became available.
        received: u64,
    },
}

impl SubscriptionState {
    /// Returns the state after accepting `by` more events.
    ///
    /// From `Establishing` / `Unavailable` the result is `Available{by}`;
    /// from `Available{n}` it is `Available{n + by}` (saturating).
    #[must_use]
    pub fn incremented(self, by: u64) -> Self {
        match self {
            SubscriptionState::Establishing | SubscriptionState::Unavailable => {
                SubscriptionState::Available { received: by }
            }
            SubscriptionState::Available { received } => SubscriptionState::Available {
                received: received.saturating_add(by),
            },
        }
    }

    /// Events accepted while available, `None` otherwise.
    pub fn received(&self) -> Option<u64> {
        match self {
            SubscriptionState::Available { received } => Some(*received),
            _ => None,
        }
    }

    /// True for `Available{..}`.
    pub fn is_available(&self) -> bool {
        matches!(self, SubscriptionState::Available { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscriptionState::Establishing => "establishing",
            SubscriptionState::Unavailable => "unavailable",
            SubscriptionState::Available { .. } => "available",
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionState::Available { received } => write!(f, "available({received})"),
            other => f.write_str(other.as_label()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StateTag {
    Establishing,
    Unavailable,
    Available,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct StateRepr {
    state: StateTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    received: Option<u64>,
}

/// Decoding failure for the compact representation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateDecodeError {
    /// `available` was encoded without its count.
    #[error("available state is missing its received count")]
    MissingCount,
}

impl From<SubscriptionState> for StateRepr {
    fn from(state: SubscriptionState) -> Self {
        match state {
            SubscriptionState::Establishing => StateRepr {
                state: StateTag::Establishing,
                received: None,
            },
            SubscriptionState::Unavailable => StateRepr {
                state: StateTag::Unavailable,
                received: None,
            },
            SubscriptionState::Available { received } => StateRepr {
                state: StateTag::Available,
                received: Some(received),
            },
        }
    }
}

impl TryFrom<StateRepr> for SubscriptionState {
    type Error = StateDecodeError;

    fn try_from(repr: StateRepr) -> Result<Self, Self::Error> {
        match repr.state {
            StateTag::Establishing => Ok(SubscriptionState::Establishing),
            StateTag::Unavailable => Ok(SubscriptionState::Unavailable),
            StateTag::Available => repr
                .received
                .map(|received| SubscriptionState::Available { received })
                .ok_or(StateDecodeError::MissingCount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_enters_available_with_step() {
        for start in [SubscriptionState::Establishing, SubscriptionState::Unavailable] {
            for k in [1, 2, 7] {
                assert_eq!(
                    start.incremented(k),
                    SubscriptionState::Available { received: k }
                );
            }
        }
    }

    #[test]
    fn increment_accumulates_while_available() {
        let state = SubscriptionState::Available { received: 5 };
        assert_eq!(state.incremented(3), SubscriptionState::Available { received: 8 });
        assert_eq!(
            SubscriptionState::Available { received: u64::MAX }.incremented(1),
            SubscriptionState::Available { received: u64::MAX }
        );
    }

    #[test]
    fn compact_encoding() {
        let json = serde_json::to_string(&SubscriptionState::Available { received: 0 }).unwrap();
        assert_eq!(json, r#"{"state":"available","received":0}"#);

        let json = serde_json::to_string(&SubscriptionState::Unavailable).unwrap();
        assert_eq!(json, r#"{"state":"unavailable"}"#);
    }

    #[test]
    fn round_trip_preserves_every_state() {
        let states = [
            SubscriptionState::Establishing,
            SubscriptionState::Unavailable,
            SubscriptionState::Available { received: 0 },
            SubscriptionState::Available { received: 42 },
        ];
        for state in states {
            let json = serde_json::to_string(&state).unwrap();
            let back: SubscriptionState = serde_json::from_str(&json).unwrap();
            assert_eq!(back, state, "round trip of {json}");
        }
    }

    #[test]
    fn available_without_count_is_rejected() {
        let res = serde_json::from_str::<SubscriptionState>(r#"{"state":"available"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn stray_count_on_countless_state_is_ignored() {
        let state: SubscriptionState =
            serde_json::from_str(r#"{"state":"establishing","received":3}"#).unwrap();
        assert_eq!(state, SubscriptionState::Establishing);
    }
}
