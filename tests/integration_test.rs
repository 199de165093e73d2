//! End-to-end flows through the public service API

use ballot::config::Config;
use ballot::types::{ElectionPhase, Role};
use ballot::{ElectionService, Result};

fn test_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("ballot-it-{tag}-{}", std::process::id()));
    std::fs::remove_dir_all(&dir).ok();
    dir
}

#[test]
fn test_full_election_scenario() -> Result<()> {
    let mut service = ElectionService::for_testing();

    // Register a voter and the single admin
    let voter_id = service.register_user("Ada", "a@x.com", "pw", Role::Voter)?;
    service.register_user("Root", "root@x.com", "admin-pw", Role::Admin)?;

    // Admin sets up the election and opens voting
    service.login("root@x.com", "admin-pw", Some("4242"))?;
    let election_id = service.create_election(
        "Board Seat",
        "Annual board seat election",
        vec!["X".to_string(), "Y".to_string()],
    )?;
    service.open_voting(election_id)?;
    service.logout();

    // Voter casts their ballot
    service.login("a@x.com", "pw", None)?;
    service.cast_vote(election_id, 0)?;
    service.logout();

    // Admin closes voting and tallies
    service.login("root@x.com", "admin-pw", Some("4242"))?;
    service.close_voting(election_id)?;

    let tally = service.tally(election_id)?;
    assert_eq!(tally.counts, vec![1, 0]);
    assert_eq!(tally.winner, 0);
    assert_eq!(
        service.store().election_by_id(election_id).unwrap().phase,
        ElectionPhase::VotingClosed
    );

    // The vote is attributable in the raw rows (no anonymity in scope)
    let votes = service.store().votes();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].voter_id, voter_id);
    assert_eq!(votes[0].choice, 0);

    println!("full election scenario verified");
    Ok(())
}

#[test]
fn test_snapshot_round_trip_through_service() -> Result<()> {
    let dir = test_dir("roundtrip");
    let config = Config::for_testing();

    let mut service = ElectionService::new(&config)?;
    service.register_user("Root", "root@x.com", "admin-pw", Role::Admin)?;
    service.register_user("Ada", "a@x.com", "pw", Role::Voter)?;
    service.login("root@x.com", "admin-pw", Some(&config.security.admin_pin))?;
    let election_id =
        service.create_election("Board Seat", "", vec!["X".to_string(), "Y".to_string()])?;
    service.open_voting(election_id)?;
    service.login("a@x.com", "pw", None)?;
    service.cast_vote(election_id, 1)?;
    service.save(&dir)?;

    // Same configuration (same pepper), fresh process equivalent
    let mut restored = ElectionService::new(&config)?;
    restored.load(&dir)?;

    // Session does not survive a restart
    assert!(restored.current_user().is_none());

    assert_eq!(restored.store().users(), service.store().users());
    assert_eq!(restored.store().elections(), service.store().elections());

    // Vote timestamps are in-memory only; compare the persisted fields
    assert_eq!(restored.store().votes().len(), service.store().votes().len());
    for (r, s) in restored.store().votes().iter().zip(service.store().votes()) {
        assert_eq!(
            (r.id, r.election_id, r.voter_id, r.choice),
            (s.id, s.election_id, s.voter_id, s.choice)
        );
    }
    assert_eq!(
        restored.store().next_vote_id(),
        service.store().next_vote_id()
    );

    // Credentials still verify under the shared pepper
    restored.login("a@x.com", "pw", None)?;
    // And the dedup index was rebuilt from the vote rows
    assert!(matches!(
        restored.cast_vote(election_id, 0),
        Err(ballot::Error::AlreadyVoted)
    ));

    // Id allocation continues past restored ids
    let next = restored.register_user("New", "n@x.com", "pw", Role::Voter)?;
    assert_eq!(next, service.store().next_user_id());

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[test]
fn test_export_and_aggregate() -> Result<()> {
    let dir = test_dir("export");
    std::fs::create_dir_all(&dir)?;

    let mut service = ElectionService::for_testing();
    service.register_user("Root", "root@x.com", "admin-pw", Role::Admin)?;
    service.login("root@x.com", "admin-pw", Some("4242"))?;
    let election_id =
        service.create_election("T", "", vec!["X".to_string(), "Y".to_string()])?;
    service.open_voting(election_id)?;

    for (email, choice) in [("v1@x.com", 0u32), ("v2@x.com", 0), ("v3@x.com", 1)] {
        service.register_user("V", email, "pw", Role::Voter)?;
        service.login(email, "pw", None)?;
        service.cast_vote(election_id, choice)?;
    }

    let export = dir.join("votes-export.csv");
    service.export_votes(&export)?;

    // An external aggregator re-derives the counts from the export alone
    let counts = ballot::tally::aggregate_vote_exports(&[&export])?;
    assert_eq!(counts.len(), 2);
    assert_eq!((counts[0].choice, counts[0].votes), (0, 2));
    assert_eq!((counts[1].choice, counts[1].votes), (1, 1));

    // Two copies of the same export double the counts
    let counts = ballot::tally::aggregate_vote_exports(&[&export, &export])?;
    assert_eq!(counts[0].votes, 4);

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[test]
fn test_audit_trail_records_lifecycle() -> Result<()> {
    let dir = test_dir("audit");
    std::fs::create_dir_all(&dir)?;
    let log_path = dir.join("audit.log");

    let mut service = ElectionService::for_testing();
    service.register_user("Root", "root@x.com", "admin-pw", Role::Admin)?;
    service.login("root@x.com", "admin-pw", Some("4242"))?;
    let election_id = service.create_election("T", "", vec!["X".to_string()])?;
    service.open_voting(election_id)?;
    service.logout();
    service.flush_audit(&log_path)?;

    let content = std::fs::read_to_string(&log_path)?;
    let actions: Vec<String> = content
        .lines()
        .map(|line| {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            event["action"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        actions,
        vec![
            "register_user",
            "login",
            "create_election",
            "open_voting",
            "logout"
        ]
    );

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}
