//! End-to-end runs of the curation bot against the in-memory ledger.

use std::collections::HashSet;
use std::sync::Arc;

use silentbot_chain::{Block, CommentOperation, MemoryLedger, Operation, PostInfo};
use silentbot_core::{AccountInterests, BotConfig, ContentRef, Error, VoteClass};
use silentbot_runtime::{BlockCursor, Checkpoint, CheckpointStore, CurationBot, DailyTally};

const NOW: i64 = 1_700_000_000;

fn now() -> i64 {
    NOW
}

fn config() -> BotConfig {
    let entry = |pct: i32| serde_json::json!({"link": "https://example.com", "icon": "https://example.com/i.png", "percentage": pct});
    serde_json::from_value(serde_json::json!({
        "bot": "silentbot",
        "voters": ["alice"],
        "curators": ["carol"],
        "tribe": "creativecoin",
        "tags": ["art"],
        "responses": {
            "standard": [entry(1000), entry(2000), entry(3000), entry(4000), entry(5000)],
            "power_up": [entry(1500), entry(3000), entry(4500), entry(6000), entry(7500)],
        },
        "abuse": {"spam": entry(0), "tag": entry(0)},
        "retry_delay_secs": 0,
    }))
    .unwrap()
}

fn ledger() -> MemoryLedger {
    let ledger = MemoryLedger::new();
    ledger.set_interests(
        "alice",
        AccountInterests {
            following: HashSet::from(["bob".to_string()]),
            ..AccountInterests::default()
        },
    );
    ledger.add_post(PostInfo {
        target: ContentRef::new("bob", "painting"),
        created: NOW - 100,
        tags: vec!["creativecoin".into(), "art".into()],
        percent_hbd: Some(10_000),
    });
    for permlink in ["one", "two"] {
        ledger.add_post(PostInfo {
            target: ContentRef::new("eve", permlink),
            created: NOW - 50,
            tags: vec![],
            percent_hbd: None,
        });
    }
    ledger
}

fn mention(caller: &str, reply_permlink: &str, target: &ContentRef, body: &str) -> Operation {
    Operation::Comment(CommentOperation {
        parent_author: target.author.clone(),
        parent_permlink: target.permlink.clone(),
        author: caller.into(),
        permlink: reply_permlink.into(),
        title: String::new(),
        body: body.into(),
        json_metadata: r#"{"app":"peakd/1.0"}"#.into(),
    })
}

fn root_post(author: &str, permlink: &str) -> Operation {
    Operation::Comment(CommentOperation {
        parent_author: String::new(),
        parent_permlink: "life".into(),
        author: author.into(),
        permlink: permlink.into(),
        title: "Today".into(),
        body: "...".into(),
        json_metadata: r#"{"app":"peakd/1.0","tags":["life"]}"#.into(),
    })
}

fn artwork(ledger: &MemoryLedger, permlink: &str) -> ContentRef {
    let target = ContentRef::new("bob", permlink);
    ledger.add_post(PostInfo {
        target: target.clone(),
        created: NOW - 100,
        tags: vec!["creativecoin".into(), "art".into()],
        percent_hbd: Some(10_000),
    });
    target
}

/// 250 blocks with star commands in blocks 1, 150 and 250.
fn long_backlog() -> MemoryLedger {
    let ledger = ledger();
    for (height, permlink) in [(1, "a"), (150, "b"), (250, "c")] {
        let target = artwork(&ledger, permlink);
        ledger.set_head(height - 1);
        let reply = format!("re-{}", permlink);
        ledger.push_block(Block::new(
            NOW,
            vec![mention("carol", &reply, &target, "@silentbot star 3")],
        ));
    }
    ledger
}

async fn start(ledger: MemoryLedger, store: &CheckpointStore) -> CurationBot<MemoryLedger> {
    CurationBot::start(config(), ledger, Arc::new(DailyTally::new()), store.clone())
        .await
        .unwrap()
        .with_clock(now)
}

#[tokio::test]
async fn test_star_flows_into_votes_and_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("sb-backup.json"));
    let ledger = ledger();
    let painting = ContentRef::new("bob", "painting");
    ledger.push_block(Block::new(NOW - 6, vec![root_post("bob", "daily")]));
    ledger.push_block(Block::new(
        NOW - 3,
        vec![mention("carol", "re-painting", &painting, "@silentbot star 4")],
    ));

    let mut bot = start(ledger, &store).await;
    assert_eq!(bot.advance_to_head().await.unwrap(), 2);

    let ledger = bot.ledger();
    for account in ["alice", "silentbot"] {
        let votes = ledger.votes_by(account);
        assert_eq!(votes.len(), 1, "{} votes", account);
        assert_eq!(votes[0].permlink, "painting");
        assert_eq!(votes[0].weight, 4000);
    }
    assert_eq!(ledger.comments().len(), 1);

    // Opportunistic candidate waits behind the rate gate.
    let alice = bot.scheduler().account("alice").unwrap();
    assert_eq!(alice.opportunistic().len(), 1);
    assert!(bot.scheduler().account("silentbot").unwrap().opportunistic().is_empty());

    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved, bot.checkpoint());
    assert_eq!(saved.cursor, BlockCursor::new(3));
}

#[tokio::test]
async fn test_commands_dispatched_in_chain_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("sb-backup.json"));
    let ledger = ledger();
    ledger.push_block(Block::new(
        NOW,
        vec![
            mention("carol", "r1", &ContentRef::new("eve", "one"), "@silentbot abuse spam"),
            mention("carol", "r2", &ContentRef::new("eve", "two"), "@silentbot abuse spam"),
        ],
    ));

    let mut bot = start(ledger, &store).await;
    bot.advance_to_head().await.unwrap();

    // First report costs -5000 and is voted at once; the repeat waits at -10000.
    let votes = bot.ledger().votes_by("alice");
    assert_eq!(votes.len(), 1);
    assert_eq!((votes[0].permlink.as_str(), votes[0].weight), ("one", -5000));
    let pending: Vec<i32> = bot
        .scheduler()
        .account("alice")
        .unwrap()
        .primary()
        .iter()
        .map(|c| c.weight)
        .collect();
    assert_eq!(pending, vec![-10000]);
}

#[tokio::test]
async fn test_restart_resumes_without_repeating() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("sb-backup.json"));
    let painting = ContentRef::new("bob", "painting");
    let ledger = ledger();
    ledger.push_block(Block::new(
        NOW,
        vec![mention("carol", "re-painting", &painting, "@silentbot star 2")],
    ));

    let mut first = start(ledger, &store).await;
    first.advance_to_head().await.unwrap();
    let before = first.checkpoint();
    assert_eq!(before.tally.star_count(2), 1);
    assert_eq!(before.tally.accounts["alice"].count(VoteClass::Primary), 1);

    // A second run over the same chain picks up where the first stopped.
    let ledger = MemoryLedger::new();
    ledger.add_post(PostInfo {
        target: painting.clone(),
        created: NOW - 100,
        tags: vec!["creativecoin".into(), "art".into()],
        percent_hbd: Some(10_000),
    });
    ledger.add_content(ContentRef::new("silentbot", "bob-painting-silentbot"));
    ledger.push_block(Block::new(NOW, Vec::new()));
    // The same command, issued again in a later block.
    ledger.push_block(Block::new(
        NOW + 3,
        vec![mention("carol", "re-painting-2", &painting, "@silentbot star 5")],
    ));

    let mut second = start(ledger, &store).await;
    assert_eq!(second.checkpoint(), before);
    assert_eq!(second.tally().snapshot(), before.tally);
    assert_eq!(second.advance_to_head().await.unwrap(), 1);

    assert!(second.ledger().comments().is_empty());
    assert!(second.ledger().votes().is_empty());
    let alice = second.scheduler().account("alice").unwrap();
    assert!(alice.primary().is_empty());
    assert_eq!(alice.last_vote(), NOW);
}

#[tokio::test]
async fn test_cold_start_writes_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("sb-backup.json"));
    let ledger = ledger();
    ledger.set_head(500);

    let bot = start(ledger, &store).await;
    assert_eq!(bot.cursor(), BlockCursor::new(400));
    assert_eq!(store.load().unwrap().unwrap().cursor, BlockCursor::new(400));
}

#[tokio::test]
async fn test_idle_chain_processes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("sb-backup.json"));
    let ledger = ledger();
    ledger.set_head(10);

    let mut bot = start(ledger, &store).await;
    assert_eq!(bot.advance_to_head().await.unwrap(), 10);
    assert_eq!(bot.advance_to_head().await.unwrap(), 0);
    assert_eq!(bot.cursor(), BlockCursor::new(11));
}

#[tokio::test]
async fn test_long_catch_up_runs_in_batches() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("sb-backup.json"));
    store.save(&Checkpoint::new(BlockCursor::new(1))).unwrap();

    let mut bot = start(long_backlog(), &store).await;
    let saves = store.saves();
    assert_eq!(bot.advance_to_head().await.unwrap(), 250);

    // 100 + 100 + 50 blocks, one tick and one save after each batch.
    assert_eq!(store.saves() - saves, 3);
    assert_eq!(bot.cursor(), BlockCursor::new(251));
    assert_eq!(store.load().unwrap().unwrap().cursor, BlockCursor::new(251));

    // Only the first batch's tick gets past the rate gate.
    let voted: Vec<String> = bot
        .ledger()
        .votes_by("alice")
        .into_iter()
        .map(|v| v.permlink)
        .collect();
    assert_eq!(voted, vec!["a".to_string()]);
    let queued: Vec<String> = bot
        .scheduler()
        .account("alice")
        .unwrap()
        .primary()
        .iter()
        .map(|c| c.target.permlink.clone())
        .collect();
    assert_eq!(queued, vec!["b".to_string(), "c".to_string()]);
    assert_eq!(bot.ledger().comments().len(), 3);
}

#[tokio::test]
async fn test_shutdown_stops_catch_up_between_batches() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("sb-backup.json"));
    store.save(&Checkpoint::new(BlockCursor::new(1))).unwrap();

    let mut bot = start(long_backlog(), &store).await;
    bot.run(async {}).await.unwrap();

    assert_eq!(bot.cursor(), BlockCursor::new(101));
    assert_eq!(store.load().unwrap().unwrap().cursor, BlockCursor::new(101));
    assert_eq!(bot.ledger().comments().len(), 1);

    // The next run picks up the rest.
    assert_eq!(bot.advance_to_head().await.unwrap(), 150);
}

#[tokio::test]
async fn test_short_response_table_rejected_at_start() {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("sb-backup.json"));
    let mut config = config();
    config.responses.standard.truncate(3);

    let tally = Arc::new(DailyTally::new());
    let result = CurationBot::start(config, ledger(), tally, store.clone()).await;
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(store.load().unwrap().is_none());
}
