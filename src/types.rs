//! # Core Types for the Election Engine
//!
//! This module defines the entity records owned by the record store and the
//! small wire encodings the snapshot codec relies on.
//!
//! ## Entity Categories
//!
//! - [`User`]: identity record with role and opaque credential material
//! - [`Election`]: title, candidate list, and lifecycle phase
//! - [`Vote`]: immutable (election, voter, choice) record
//! - [`Tally`]: per-candidate counts plus the winning index
//!
//! Ids are monotonic 64-bit integers allocated from watermarks that the
//! snapshot header persists; they are never reused. Timestamps are Unix
//! seconds and live in memory only; the snapshot resources carry no
//! timestamp columns.

use serde::{Deserialize, Serialize};

use crate::credential::Credential;

/// Unique user identifier (monotonic, allocated by the record store)
pub type UserId = u64;

/// Unique election identifier (monotonic, allocated by the record store)
pub type ElectionId = u64;

/// Unique vote identifier (monotonic, allocated by the record store)
pub type VoteId = u64;

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Upper bound on the number of candidates in a single election
pub const MAX_CANDIDATES: usize = 128;

/// Account role, wire-encoded as 0 (voter) / 1 (admin)
///
/// At most one admin account may exist system-wide; registration enforces
/// this and the snapshot header records whether one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Voter,
    Admin,
}

impl Role {
    /// Wire encoding used by the users snapshot resource
    pub fn as_u8(self) -> u8 {
        match self {
            Role::Voter => 0,
            Role::Admin => 1,
        }
    }

    /// Decode the wire encoding; `None` for unknown values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Role::Voter),
            1 => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Election lifecycle phase, wire-encoded as 0..4
///
/// Legal transitions only move forward:
/// `Created -> RegistrationOpen -> VotingOpen -> VotingClosed`.
///
/// `TallyComplete` exists in the model and wire encoding but is never
/// assigned by any current operation; running a tally does not advance the
/// phase. The value is reserved for future use and still decodes cleanly
/// from snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionPhase {
    Created,
    RegistrationOpen,
    VotingOpen,
    VotingClosed,
    TallyComplete,
}

impl ElectionPhase {
    /// Wire encoding used by the elections snapshot resource
    pub fn as_u8(self) -> u8 {
        match self {
            ElectionPhase::Created => 0,
            ElectionPhase::RegistrationOpen => 1,
            ElectionPhase::VotingOpen => 2,
            ElectionPhase::VotingClosed => 3,
            ElectionPhase::TallyComplete => 4,
        }
    }

    /// Decode the wire encoding; `None` for unknown values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ElectionPhase::Created),
            1 => Some(ElectionPhase::RegistrationOpen),
            2 => Some(ElectionPhase::VotingOpen),
            3 => Some(ElectionPhase::VotingClosed),
            4 => Some(ElectionPhase::TallyComplete),
            _ => None,
        }
    }
}

/// Identity record for a registered voter or the single admin
///
/// Created by registration; the active flag is the only mutable field and
/// users are never deleted in the current scope. The credential material is
/// opaque to the store; derivation and verification live in
/// [`crate::credential`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user id
    pub id: UserId,

    /// Display name
    pub name: String,

    /// Email address, unique system-wide, case-sensitive as stored
    pub email: String,

    /// Account role
    pub role: Role,

    /// Opaque credential material (salt + keyed hash)
    pub credential: Credential,

    /// Whether the account is active
    pub active: bool,
}

/// An election with an ordered, bounded candidate list
///
/// Created by an admin with phase [`ElectionPhase::Created`]; mutated only
/// via phase transitions; never deleted. Candidate order is preserved and
/// duplicate names are allowed. Start/end times are optional scheduling
/// metadata and are not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    /// Unique election id
    pub id: ElectionId,

    /// Human-readable election title
    pub title: String,

    /// Detailed description
    pub description: String,

    /// Current lifecycle phase
    pub phase: ElectionPhase,

    /// Ordered candidate names; index is the ballot choice
    pub candidates: Vec<String>,

    /// Optional scheduled start time (in-memory only)
    pub start_time: Option<Timestamp>,

    /// Optional scheduled end time (in-memory only)
    pub end_time: Option<Timestamp>,
}

impl Election {
    /// Number of candidates on the ballot
    pub fn candidate_count(&self) -> u32 {
        self.candidates.len() as u32
    }

    /// Whether votes are currently accepted
    pub fn is_voting_open(&self) -> bool {
        self.phase == ElectionPhase::VotingOpen
    }
}

/// A single cast vote
///
/// Created once per (election, voter) pair and immutable thereafter. The
/// dedup index guarantees that for any two distinct votes in the same
/// election the voter ids differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Unique vote id
    pub id: VoteId,

    /// Election this vote was cast in
    pub election_id: ElectionId,

    /// Voter who cast it
    pub voter_id: UserId,

    /// Candidate choice index into the election's candidate list
    pub choice: u32,

    /// When the vote was cast (in-memory only, not persisted)
    pub cast_at: Timestamp,
}

/// Tally report for one election
///
/// Produced by scanning all vote rows for the election and reducing the
/// per-candidate counts through the selection tree. The winner is the
/// lowest candidate index among those tied at the maximum count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    /// Election the tally was computed for
    pub election_id: ElectionId,

    /// Vote count per candidate, indexed by ballot choice
    pub counts: Vec<u64>,

    /// Winning candidate index (deterministic first-max tie-break)
    pub winner: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_round_trip() {
        for role in [Role::Voter, Role::Admin] {
            assert_eq!(Role::from_u8(role.as_u8()), Some(role));
        }
        assert_eq!(Role::from_u8(2), None);
    }

    #[test]
    fn test_phase_wire_round_trip() {
        for raw in 0..=4 {
            let phase = ElectionPhase::from_u8(raw).unwrap();
            assert_eq!(phase.as_u8(), raw);
        }
        assert_eq!(ElectionPhase::from_u8(5), None);
    }

    #[test]
    fn test_election_helpers() {
        let election = Election {
            id: 1,
            title: "Board Seat".to_string(),
            description: String::new(),
            phase: ElectionPhase::VotingOpen,
            candidates: vec!["X".to_string(), "Y".to_string()],
            start_time: None,
            end_time: None,
        };

        assert_eq!(election.candidate_count(), 2);
        assert!(election.is_voting_open());

        let closed = Election {
            phase: ElectionPhase::VotingClosed,
            ..election
        };
        assert!(!closed.is_voting_open());
    }
}
