//! Election lifecycle: sessions, role gating, phase transitions, tallying
//!
//! `ElectionService` wraps one [`RecordStore`] and enforces every rule that
//! gates mutation: email uniqueness, the single-admin limit, credential and
//! admin-PIN verification, the phase state machine, choice bounds, and
//! one-vote-per-voter dedup.
//!
//! The current session is at most one non-owning user id scoped to this
//! instance; it is cleared by logout and does not survive a snapshot load.
//! All operations run to completion on the calling thread. The service is
//! single-writer by design: `cast_vote`'s dedup check and insert are two
//! steps, so concurrent callers must serialize every mutating operation
//! behind one critical section per instance.

use chrono::Utc;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::credential::{constant_time_eq, CredentialManager};
use crate::snapshot;
use crate::store::RecordStore;
use crate::tally::SelectionTree;
use crate::types::{
    Election, ElectionId, ElectionPhase, Role, Tally, User, UserId, Vote, VoteId, MAX_CANDIDATES,
};
use crate::{Error, Result};

/// Single-writer facade over the record store
pub struct ElectionService {
    store: RecordStore,
    credentials: CredentialManager,
    audit: AuditLog,
    session: Option<UserId>,
}

impl ElectionService {
    /// Create a service backed by a fresh store
    ///
    /// The admin PIN is seeded from configuration; once a snapshot is
    /// loaded, the header's PIN takes over.
    pub fn new(config: &Config) -> Result<Self> {
        let credentials = CredentialManager::from_base64(&config.security.credential_pepper)?;
        let mut store = RecordStore::new();
        store.set_admin_pin(&config.security.admin_pin);
        Ok(Self {
            store,
            credentials,
            audit: AuditLog::new(),
            session: None,
        })
    }

    /// Create for testing with random credential material and PIN "4242"
    pub fn for_testing() -> Self {
        let mut store = RecordStore::new();
        store.set_admin_pin("4242");
        Self {
            store,
            credentials: CredentialManager::for_testing(),
            audit: AuditLog::new(),
            session: None,
        }
    }

    // --- identity ---

    /// Register a new user and return its id
    ///
    /// Fails with `DuplicateEmail` if the email is taken and with
    /// `AdminLimitExceeded` if an admin registration would create a second
    /// admin account.
    pub fn register_user(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<UserId> {
        if self.store.user_by_email(email).is_some() {
            return Err(Error::DuplicateEmail {
                email: email.to_string(),
            });
        }
        if role == Role::Admin && self.store.admin_exists() {
            return Err(Error::AdminLimitExceeded);
        }

        let id = self.store.alloc_user_id();
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role,
            credential: self.credentials.derive(password),
            active: true,
        };
        self.store.insert_user(user)?;

        tracing::info!(id, email, ?role, "user registered");
        self.audit
            .record(self.session, "register_user", format!("{email} as {role:?}"));
        Ok(id)
    }

    /// Authenticate and open a session
    ///
    /// Admin accounts additionally require the out-of-band PIN; a missing
    /// or wrong PIN yields `InvalidCredential`, same as a bad password.
    pub fn login(
        &mut self,
        email: &str,
        password: &str,
        admin_pin: Option<&str>,
    ) -> Result<UserId> {
        let user = self
            .store
            .user_by_email(email)
            .ok_or_else(|| Error::not_found(format!("user {email}")))?;

        if !self.credentials.verify(&user.credential, password) {
            tracing::debug!(email, "password verification failed");
            return Err(Error::InvalidCredential);
        }

        let (id, role) = (user.id, user.role);
        if role == Role::Admin {
            let pin_ok = admin_pin.is_some_and(|pin| {
                constant_time_eq(pin.as_bytes(), self.store.admin_pin().as_bytes())
            });
            if !pin_ok {
                tracing::debug!(email, "admin PIN verification failed");
                return Err(Error::InvalidCredential);
            }
        }

        self.session = Some(id);
        tracing::info!(id, email, "login");
        self.audit.record(Some(id), "login", email);
        Ok(id)
    }

    /// Clear the current session; idempotent
    pub fn logout(&mut self) {
        if let Some(id) = self.session.take() {
            tracing::info!(id, "logout");
            self.audit.record(Some(id), "logout", "");
        }
    }

    /// The logged-in user, if any
    pub fn current_user(&self) -> Option<&User> {
        self.store.user_by_id(self.session?)
    }

    // --- election lifecycle ---

    /// Create an election in phase `Created` and return its id
    ///
    /// Requires an admin session. The candidate list must hold between 1
    /// and 128 names, none containing the reserved `|` delimiter; order is
    /// preserved and duplicates are allowed.
    pub fn create_election(
        &mut self,
        title: &str,
        description: &str,
        candidates: Vec<String>,
    ) -> Result<ElectionId> {
        let admin = self.require_admin("create_election")?;

        if candidates.is_empty() {
            return Err(Error::InvalidCandidates {
                reason: "candidate list is empty".to_string(),
            });
        }
        if candidates.len() > MAX_CANDIDATES {
            return Err(Error::InvalidCandidates {
                reason: format!("{} candidates exceeds the {MAX_CANDIDATES} limit", candidates.len()),
            });
        }
        if let Some(name) = candidates
            .iter()
            .find(|name| name.contains(snapshot::CANDIDATE_DELIMITER))
        {
            return Err(Error::InvalidCandidates {
                reason: format!("candidate name {name:?} contains the reserved delimiter"),
            });
        }

        let id = self.store.alloc_election_id();
        let election = Election {
            id,
            title: title.to_string(),
            description: description.to_string(),
            phase: ElectionPhase::Created,
            candidates,
            start_time: None,
            end_time: None,
        };
        self.store.insert_election(election)?;

        tracing::info!(id, title, "election created");
        self.audit.record(Some(admin), "create_election", title);
        Ok(id)
    }

    /// Transition an election to `VotingOpen`
    ///
    /// Requires an admin session; legal only from `Created` or
    /// `RegistrationOpen`.
    pub fn open_voting(&mut self, election_id: ElectionId) -> Result<()> {
        let admin = self.require_admin("open_voting")?;
        let election = self
            .store
            .election_by_id_mut(election_id)
            .ok_or_else(|| Error::not_found(format!("election {election_id}")))?;

        match election.phase {
            ElectionPhase::Created | ElectionPhase::RegistrationOpen => {
                election.phase = ElectionPhase::VotingOpen;
            }
            phase => return Err(Error::PhaseViolation { phase }),
        }

        tracing::info!(election_id, "voting opened");
        self.audit
            .record(Some(admin), "open_voting", format!("election {election_id}"));
        Ok(())
    }

    /// Transition an election to `VotingClosed`
    ///
    /// Requires an admin session; legal only from `VotingOpen`.
    pub fn close_voting(&mut self, election_id: ElectionId) -> Result<()> {
        let admin = self.require_admin("close_voting")?;
        let election = self
            .store
            .election_by_id_mut(election_id)
            .ok_or_else(|| Error::not_found(format!("election {election_id}")))?;

        match election.phase {
            ElectionPhase::VotingOpen => {
                election.phase = ElectionPhase::VotingClosed;
            }
            phase => return Err(Error::PhaseViolation { phase }),
        }

        tracing::info!(election_id, "voting closed");
        self.audit
            .record(Some(admin), "close_voting", format!("election {election_id}"));
        Ok(())
    }

    /// Cast the session user's vote in an election
    ///
    /// Checks run in order: session present, election exists, phase is
    /// `VotingOpen`, choice in range, voter has not voted yet. The dedup
    /// lookup and the insert are separate steps (single-writer discipline).
    pub fn cast_vote(&mut self, election_id: ElectionId, choice: u32) -> Result<VoteId> {
        let voter_id = self
            .session
            .ok_or_else(|| Error::unauthorized("cast_vote"))?;

        let election = self
            .store
            .election_by_id(election_id)
            .ok_or_else(|| Error::not_found(format!("election {election_id}")))?;

        if !election.is_voting_open() {
            return Err(Error::PhaseViolation {
                phase: election.phase,
            });
        }
        let candidates = election.candidate_count();
        if choice >= candidates {
            return Err(Error::InvalidChoice { choice, candidates });
        }
        if self.store.has_voted(election_id, voter_id) {
            return Err(Error::AlreadyVoted);
        }

        let id = self.store.alloc_vote_id();
        let vote = Vote {
            id,
            election_id,
            voter_id,
            choice,
            cast_at: Utc::now().timestamp(),
        };
        self.store.insert_vote(vote)?;

        tracing::info!(id, election_id, voter_id, choice, "vote cast");
        self.audit.record(
            Some(voter_id),
            "cast_vote",
            format!("election {election_id} choice {choice}"),
        );
        Ok(id)
    }

    // --- tallying ---

    /// Tally an election: scan its vote rows and reduce through the
    /// selection tree
    ///
    /// Computable in any phase (the scan ignores phase); conventionally run
    /// after `VotingClosed`. Does not advance the election's phase. Ties
    /// break to the lowest candidate index.
    pub fn tally(&self, election_id: ElectionId) -> Result<Tally> {
        let election = self
            .store
            .election_by_id(election_id)
            .ok_or_else(|| Error::not_found(format!("election {election_id}")))?;

        let mut counts = vec![0u64; election.candidates.len()];
        for vote in self.store.votes() {
            if vote.election_id == election_id {
                if let Some(slot) = counts.get_mut(vote.choice as usize) {
                    *slot += 1;
                }
            }
        }

        let tree = SelectionTree::build(&counts)?;
        let winner = tree.winner().unwrap_or(0) as u32;

        tracing::info!(election_id, winner, ?counts, "tally computed");
        Ok(Tally {
            election_id,
            counts,
            winner,
        })
    }

    // --- persistence & listings ---

    /// Save the full store state to a snapshot directory
    pub fn save(&self, dir: impl AsRef<std::path::Path>) -> Result<()> {
        snapshot::save(&self.store, dir)
    }

    /// Replace the store with one loaded from a snapshot directory
    ///
    /// Clears the session; indices are rebuilt and id watermarks restored
    /// by the codec.
    pub fn load(&mut self, dir: impl AsRef<std::path::Path>) -> Result<()> {
        self.store = snapshot::load(dir)?;
        self.session = None;
        Ok(())
    }

    /// Export only the votes table for external aggregation
    pub fn export_votes(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        snapshot::export_votes(self.store.votes(), path)
    }

    /// Drain queued audit events to an append-only file
    pub fn flush_audit(&mut self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.audit.flush(path)
    }

    /// Read access to the underlying store (listings, inspection)
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    fn require_admin(&self, action: &str) -> Result<UserId> {
        let id = self
            .session
            .ok_or_else(|| Error::unauthorized(action))?;
        match self.store.user_by_id(id) {
            Some(user) if user.role == Role::Admin => Ok(id),
            _ => Err(Error::unauthorized(action)),
        }
    }
}
