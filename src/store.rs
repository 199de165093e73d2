//! Record store: owning collections plus derived lookup indices
//!
//! Owns the ordered User/Election/Vote collections exclusively. The indices
//! hold array offsets into those collections (never addresses) and are
//! rebuilt in full on snapshot load; they are derived state and are never
//! persisted. Id watermarks advance past the highest id seen so restored
//! stores keep allocating unique ids.

use crate::index::IndexedMap;
use crate::types::{Election, ElectionId, Role, User, UserId, Vote, VoteId};
use crate::{Error, Result};

/// Dedup-index key for the (election, voter) pair
fn vote_key(election_id: ElectionId, voter_id: UserId) -> u64 {
    (election_id << 32) ^ (voter_id & 0xffff_ffff)
}

/// FNV-1a 64 over the email bytes (case-sensitive as stored)
fn email_hash64(email: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in email.bytes() {
        h ^= u64::from(byte);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

/// Owning store for all election-management records
#[derive(Debug, Clone)]
pub struct RecordStore {
    users: Vec<User>,
    elections: Vec<Election>,
    votes: Vec<Vote>,

    user_by_id: IndexedMap,
    user_by_email: IndexedMap,
    election_by_id: IndexedMap,
    has_voted: IndexedMap,

    next_user_id: UserId,
    next_election_id: ElectionId,
    next_vote_id: VoteId,
    admin_exists: bool,
    admin_pin: String,
}

impl RecordStore {
    /// Create an empty store with watermarks at 1
    pub fn new() -> Self {
        Self {
            users: Vec::new(),
            elections: Vec::new(),
            votes: Vec::new(),
            user_by_id: IndexedMap::new(),
            user_by_email: IndexedMap::new(),
            election_by_id: IndexedMap::new(),
            has_voted: IndexedMap::new(),
            next_user_id: 1,
            next_election_id: 1,
            next_vote_id: 1,
            admin_exists: false,
            admin_pin: String::new(),
        }
    }

    // --- id watermarks ---

    /// Allocate the next user id
    pub fn alloc_user_id(&mut self) -> UserId {
        let id = self.next_user_id;
        self.next_user_id += 1;
        id
    }

    /// Allocate the next election id
    pub fn alloc_election_id(&mut self) -> ElectionId {
        let id = self.next_election_id;
        self.next_election_id += 1;
        id
    }

    /// Allocate the next vote id
    pub fn alloc_vote_id(&mut self) -> VoteId {
        let id = self.next_vote_id;
        self.next_vote_id += 1;
        id
    }

    pub fn next_user_id(&self) -> UserId {
        self.next_user_id
    }

    pub fn next_election_id(&self) -> ElectionId {
        self.next_election_id
    }

    pub fn next_vote_id(&self) -> VoteId {
        self.next_vote_id
    }

    /// Set all three watermarks at once (snapshot header restore)
    pub fn set_watermarks(&mut self, user: UserId, election: ElectionId, vote: VoteId) {
        self.next_user_id = user.max(1);
        self.next_election_id = election.max(1);
        self.next_vote_id = vote.max(1);
    }

    // --- admin bookkeeping ---

    /// Whether the single admin account has been registered
    pub fn admin_exists(&self) -> bool {
        self.admin_exists
    }

    /// The out-of-band admin PIN (persisted in the snapshot header)
    pub fn admin_pin(&self) -> &str {
        &self.admin_pin
    }

    pub fn set_admin_exists(&mut self, exists: bool) {
        self.admin_exists = exists;
    }

    pub fn set_admin_pin(&mut self, pin: impl Into<String>) {
        self.admin_pin = pin.into();
    }

    // --- users ---

    /// Insert a user, indexing it by id and email hash
    ///
    /// Used by both registration and snapshot restore; advances the user-id
    /// watermark past the inserted id and records admin existence.
    pub fn insert_user(&mut self, user: User) -> Result<()> {
        let offset = self.users.len() as u64;
        self.user_by_id.put(user.id, offset)?;
        self.user_by_email.put(email_hash64(&user.email), offset)?;
        if user.role == Role::Admin {
            self.admin_exists = true;
        }
        self.next_user_id = self.next_user_id.max(user.id + 1);
        self.users.push(user);
        Ok(())
    }

    /// Look up a user by id
    pub fn user_by_id(&self, id: UserId) -> Option<&User> {
        let offset = self.user_by_id.get(id)? as usize;
        self.users.get(offset)
    }

    /// Look up a user by email (case-sensitive)
    ///
    /// The email index maps a 64-bit hash of the email; the resolved record
    /// is re-checked for equality so a hash collision degrades to a miss.
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        let offset = self.user_by_email.get(email_hash64(email))? as usize;
        self.users.get(offset).filter(|u| u.email == email)
    }

    /// All users in insertion order
    pub fn users(&self) -> &[User] {
        &self.users
    }

    // --- elections ---

    /// Insert an election, indexing it by id
    pub fn insert_election(&mut self, election: Election) -> Result<()> {
        let offset = self.elections.len() as u64;
        self.election_by_id.put(election.id, offset)?;
        self.next_election_id = self.next_election_id.max(election.id + 1);
        self.elections.push(election);
        Ok(())
    }

    /// Look up an election by id
    pub fn election_by_id(&self, id: ElectionId) -> Option<&Election> {
        let offset = self.election_by_id.get(id)? as usize;
        self.elections.get(offset)
    }

    /// Mutable lookup for phase transitions
    pub fn election_by_id_mut(&mut self, id: ElectionId) -> Option<&mut Election> {
        let offset = self.election_by_id.get(id)? as usize;
        self.elections.get_mut(offset)
    }

    /// All elections in insertion order
    pub fn elections(&self) -> &[Election] {
        &self.elections
    }

    // --- votes ---

    /// Insert a vote and mark its (election, voter) pair in the dedup index
    ///
    /// Fails with `AlreadyVoted` if the pair is already marked. The
    /// check-then-insert here is not atomic; the store relies on the
    /// documented single-writer discipline.
    pub fn insert_vote(&mut self, vote: Vote) -> Result<()> {
        let key = vote_key(vote.election_id, vote.voter_id);
        if self.has_voted.contains(key) {
            return Err(Error::AlreadyVoted);
        }
        self.has_voted.put(key, 1)?;
        self.next_vote_id = self.next_vote_id.max(vote.id + 1);
        self.votes.push(vote);
        Ok(())
    }

    /// Whether the voter already has a vote recorded for the election
    pub fn has_voted(&self, election_id: ElectionId, voter_id: UserId) -> bool {
        self.has_voted.contains(vote_key(election_id, voter_id))
    }

    /// All votes in insertion order
    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
