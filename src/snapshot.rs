//! Snapshot codec: row-oriented persistence for the record store
//!
//! The store serializes to a directory of four text resources, one per
//! concern, each with a leading column-header row:
//!
//! | resource       | columns                                                          |
//! |----------------|------------------------------------------------------------------|
//! | `header.csv`   | admin_exists, admin_pin, next_user_id, next_election_id, next_vote_id |
//! | `users.csv`    | id, name, email, role, active, salt_hex, hash_hex                |
//! | `elections.csv`| id, title, description, phase, candidate_count, candidates       |
//! | `votes.csv`    | id, election_id, voter_id, choice                                |
//!
//! Candidate lists are joined with `|`, which election creation forbids
//! inside individual names. Credential bytes are lowercase fixed-width hex.
//! Loading is partial-load-tolerant: a row whose required leading fields
//! fail to parse is warn-logged and skipped, never aborting the load.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::credential::Credential;
use crate::store::RecordStore;
use crate::types::{Election, ElectionPhase, Role, User, Vote};
use crate::Result;

/// Reserved separator for candidate lists; not permitted inside names
pub const CANDIDATE_DELIMITER: char = '|';

const HEADER_FILE: &str = "header.csv";
const USERS_FILE: &str = "users.csv";
const ELECTIONS_FILE: &str = "elections.csv";
const VOTES_FILE: &str = "votes.csv";

/// Serialize the full store state into `dir`, creating it if needed
pub fn save(store: &RecordStore, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut header = String::from(
        "admin_exists,admin_pin,next_user_id,next_election_id,next_vote_id\n",
    );
    let _ = writeln!(
        header,
        "{},{},{},{},{}",
        u8::from(store.admin_exists()),
        store.admin_pin(),
        store.next_user_id(),
        store.next_election_id(),
        store.next_vote_id(),
    );
    fs::write(dir.join(HEADER_FILE), header)?;

    let mut users = String::from("id,name,email,role,active,salt_hex,hash_hex\n");
    for user in store.users() {
        let _ = writeln!(
            users,
            "{},{},{},{},{},{},{}",
            user.id,
            user.name,
            user.email,
            user.role.as_u8(),
            u8::from(user.active),
            user.credential.salt_hex(),
            user.credential.hash_hex(),
        );
    }
    fs::write(dir.join(USERS_FILE), users)?;

    let mut elections =
        String::from("id,title,description,phase,candidate_count,candidates\n");
    for election in store.elections() {
        let mut joined = String::new();
        for (i, name) in election.candidates.iter().enumerate() {
            if i > 0 {
                joined.push(CANDIDATE_DELIMITER);
            }
            joined.push_str(name);
        }
        let _ = writeln!(
            elections,
            "{},{},{},{},{},{}",
            election.id,
            election.title,
            election.description,
            election.phase.as_u8(),
            election.candidate_count(),
            joined,
        );
    }
    fs::write(dir.join(ELECTIONS_FILE), elections)?;

    fs::write(dir.join(VOTES_FILE), encode_votes(store.votes()))?;

    tracing::info!(
        dir = %dir.display(),
        users = store.users().len(),
        elections = store.elections().len(),
        votes = store.votes().len(),
        "snapshot saved"
    );
    Ok(())
}

/// Load a fresh store from a snapshot directory
///
/// Resources are read in dependency order: header (watermarks, admin flag
/// and PIN), then users, elections, and votes, rebuilding every index as
/// rows are restored. Watermarks additionally advance past the highest id
/// seen. Missing resources are an I/O failure; corrupt rows are skipped.
pub fn load(dir: impl AsRef<Path>) -> Result<RecordStore> {
    let dir = dir.as_ref();
    let mut store = RecordStore::new();
    let mut skipped = 0usize;

    let header = fs::read_to_string(dir.join(HEADER_FILE))?;
    if let Some(line) = header.lines().nth(1) {
        if !decode_header(line, &mut store) {
            tracing::warn!(line, "skipping malformed header row");
            skipped += 1;
        }
    }

    let users = fs::read_to_string(dir.join(USERS_FILE))?;
    for line in users.lines().skip(1) {
        match decode_user(line) {
            Some(user) => store.insert_user(user)?,
            None => {
                tracing::warn!(line, "skipping malformed user row");
                skipped += 1;
            }
        }
    }

    let elections = fs::read_to_string(dir.join(ELECTIONS_FILE))?;
    for line in elections.lines().skip(1) {
        match decode_election(line) {
            Some(election) => store.insert_election(election)?,
            None => {
                tracing::warn!(line, "skipping malformed election row");
                skipped += 1;
            }
        }
    }

    let votes = fs::read_to_string(dir.join(VOTES_FILE))?;
    for line in votes.lines().skip(1) {
        match decode_vote(line) {
            Some(vote) => match store.insert_vote(vote) {
                Ok(()) => {}
                Err(crate::Error::AlreadyVoted) => {
                    tracing::warn!(line, "skipping duplicate vote row");
                    skipped += 1;
                }
                Err(err) => return Err(err),
            },
            None => {
                tracing::warn!(line, "skipping malformed vote row");
                skipped += 1;
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        users = store.users().len(),
        elections = store.elections().len(),
        votes = store.votes().len(),
        skipped,
        "snapshot loaded"
    );
    Ok(store)
}

/// Write only the votes table to `path` for external aggregation
pub fn export_votes(votes: &[Vote], path: impl AsRef<Path>) -> Result<()> {
    fs::write(path.as_ref(), encode_votes(votes))?;
    Ok(())
}

fn encode_votes(votes: &[Vote]) -> String {
    let mut out = String::from("id,election_id,voter_id,choice\n");
    for vote in votes {
        let _ = writeln!(
            out,
            "{},{},{},{}",
            vote.id, vote.election_id, vote.voter_id, vote.choice
        );
    }
    out
}

fn decode_header(line: &str, store: &mut RecordStore) -> bool {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 5 {
        return false;
    }
    let (Ok(admin_exists), Ok(next_user), Ok(next_election), Ok(next_vote)) = (
        fields[0].parse::<u8>(),
        fields[2].parse::<u64>(),
        fields[3].parse::<u64>(),
        fields[4].parse::<u64>(),
    ) else {
        return false;
    };
    store.set_admin_exists(admin_exists != 0);
    store.set_admin_pin(fields[1]);
    store.set_watermarks(next_user, next_election, next_vote);
    true
}

fn decode_user(line: &str) -> Option<User> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 7 {
        return None;
    }
    Some(User {
        id: fields[0].parse().ok()?,
        name: fields[1].to_string(),
        email: fields[2].to_string(),
        role: Role::from_u8(fields[3].parse().ok()?)?,
        active: fields[4].parse::<u8>().ok()? != 0,
        credential: Credential::from_hex(fields[5], fields[6])?,
    })
}

fn decode_election(line: &str) -> Option<Election> {
    // Candidates are the final field and may themselves contain commas
    let fields: Vec<&str> = line.splitn(6, ',').collect();
    if fields.len() != 6 {
        return None;
    }
    let candidate_count: usize = fields[4].parse().ok()?;
    let candidates: Vec<String> = if fields[5].is_empty() {
        Vec::new()
    } else {
        fields[5]
            .split(CANDIDATE_DELIMITER)
            .map(str::to_string)
            .collect()
    };
    if candidates.len() != candidate_count {
        return None;
    }
    Some(Election {
        id: fields[0].parse().ok()?,
        title: fields[1].to_string(),
        description: fields[2].to_string(),
        phase: ElectionPhase::from_u8(fields[3].parse().ok()?)?,
        candidates,
        start_time: None,
        end_time: None,
    })
}

fn decode_vote(line: &str) -> Option<Vote> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 4 {
        return None;
    }
    Some(Vote {
        id: fields[0].parse().ok()?,
        election_id: fields[1].parse().ok()?,
        voter_id: fields[2].parse().ok()?,
        choice: fields[3].parse().ok()?,
        cast_at: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialManager;

    fn populated_store() -> RecordStore {
        let manager = CredentialManager::for_testing();
        let mut store = RecordStore::new();
        store.set_admin_pin("4242");

        let admin_id = store.alloc_user_id();
        store
            .insert_user(User {
                id: admin_id,
                name: "Root".to_string(),
                email: "root@x.com".to_string(),
                role: Role::Admin,
                credential: manager.derive("admin-pw"),
                active: true,
            })
            .unwrap();
        let voter_id = store.alloc_user_id();
        store
            .insert_user(User {
                id: voter_id,
                name: "Ada".to_string(),
                email: "a@x.com".to_string(),
                role: Role::Voter,
                credential: manager.derive("pw"),
                active: true,
            })
            .unwrap();
        let election_id = store.alloc_election_id();
        store
            .insert_election(Election {
                id: election_id,
                title: "Board Seat".to_string(),
                description: "annual".to_string(),
                phase: ElectionPhase::VotingClosed,
                candidates: vec!["X".to_string(), "Y".to_string()],
                start_time: None,
                end_time: None,
            })
            .unwrap();
        let vote_id = store.alloc_vote_id();
        store
            .insert_vote(Vote {
                id: vote_id,
                election_id,
                voter_id,
                choice: 0,
                cast_at: 0,
            })
            .unwrap();
        store
    }

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ballot-snap-{tag}-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn test_round_trip_preserves_records_and_watermarks() {
        let dir = temp_dir("roundtrip");
        let store = populated_store();
        save(&store, &dir).unwrap();

        let loaded = load(&dir).unwrap();
        assert_eq!(loaded.users(), store.users());
        assert_eq!(loaded.elections(), store.elections());
        assert_eq!(loaded.votes(), store.votes());
        assert_eq!(loaded.next_user_id(), store.next_user_id());
        assert_eq!(loaded.next_election_id(), store.next_election_id());
        assert_eq!(loaded.next_vote_id(), store.next_vote_id());
        assert_eq!(loaded.admin_pin(), "4242");
        assert!(loaded.admin_exists());

        // Indices were rebuilt, not just the collections
        assert_eq!(loaded.user_by_email("a@x.com").unwrap().id, 2);
        assert!(loaded.has_voted(1, 2));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_user_row_is_skipped() {
        let dir = temp_dir("corrupt");
        let store = populated_store();
        save(&store, &dir).unwrap();

        // Mangle the admin row's id field; the voter row must survive
        let users_path = dir.join("users.csv");
        let users = std::fs::read_to_string(&users_path).unwrap();
        let mangled: String = users
            .lines()
            .map(|l| {
                if l.starts_with("1,") {
                    format!("garbage{l}\n")
                } else {
                    format!("{l}\n")
                }
            })
            .collect();
        std::fs::write(&users_path, mangled).unwrap();

        let loaded = load(&dir).unwrap();
        assert_eq!(loaded.users().len(), 1);
        assert_eq!(loaded.users()[0].email, "a@x.com");
        // Watermark still comes from the header
        assert_eq!(loaded.next_user_id(), 3);
        assert_eq!(loaded.elections().len(), 1);
        assert_eq!(loaded.votes().len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_candidate_count_mismatch_skips_row() {
        assert!(decode_election("1,T,D,0,3,X|Y").is_none());
        let election = decode_election("1,T,D,0,2,X|Y").unwrap();
        assert_eq!(election.candidates, vec!["X", "Y"]);
    }

    #[test]
    fn test_decode_vote_rejects_short_rows() {
        assert!(decode_vote("1,2,3").is_none());
        assert!(decode_vote("1,2,3,nope").is_none());
        let vote = decode_vote("9,1,2,0").unwrap();
        assert_eq!(vote.id, 9);
        assert_eq!(vote.choice, 0);
    }

    #[test]
    fn test_missing_resource_is_io_failure() {
        let dir = temp_dir("missing");
        assert!(matches!(load(&dir), Err(crate::Error::Io(_))));
    }
}
