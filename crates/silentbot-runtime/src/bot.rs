//! The curation bot: ingestion loop, command dispatch, scheduling and
//! checkpointing, run forever in one sequential task.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use silentbot_chain::{Block, CapacityOracle, LedgerGateway, Operation, MAX_BLOCK_BATCH};
use silentbot_core::{BotConfig, Result};
use silentbot_curation::{CommandInterpreter, EligibilityGate, EligibilityState};
use silentbot_scheduler::VoteScheduler;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::ingest::{classify, BlockCursor, Classified};
use crate::tally::DailyTally;

/// Target length of one cycle; processing time is subtracted from the pause.
pub const CYCLE_SECS: u64 = 120;

fn wall_clock() -> i64 {
    Utc::now().timestamp()
}

pub struct CurationBot<G> {
    ledger: G,
    tally: Arc<DailyTally>,
    bot: String,
    cursor: BlockCursor,
    scheduler: VoteScheduler,
    interpreter: CommandInterpreter,
    store: CheckpointStore,
    clock: fn() -> i64,
}

impl<G> CurationBot<G>
where
    G: LedgerGateway + CapacityOracle,
{
    /// Fetch every account's interests, then resume from the checkpoint or,
    /// without one, start just behind the head and write one immediately.
    pub async fn start(
        config: BotConfig,
        ledger: G,
        tally: Arc<DailyTally>,
        store: CheckpointStore,
    ) -> Result<Self> {
        config.validate()?;
        let accounts = config.voting_accounts();
        let mut interests = BTreeMap::new();
        for account in &accounts {
            let found = ledger.account_interests(account).await?;
            info!(
                "{}: following {}, {} subscriptions, {} blacklisted",
                account,
                found.following.len(),
                found.subscriptions.len(),
                found.blacklist.len()
            );
            interests.insert(account.clone(), found);
        }

        let bot = config.bot.clone();
        let gate = EligibilityGate::new(&config, interests);
        let mut scheduler = VoteScheduler::new(&accounts);
        let mut interpreter = CommandInterpreter::new(config, gate, EligibilityState::default());

        let (cursor, fresh) = match store.load()? {
            Some(checkpoint) => {
                info!(
                    "Resuming from checkpoint at block {}",
                    checkpoint.cursor.next()
                );
                scheduler.restore(checkpoint.queues);
                interpreter.restore_state(checkpoint.eligibility);
                tally.restore(checkpoint.tally);
                (checkpoint.cursor, false)
            }
            None => {
                let head = ledger.head_height().await?;
                let cursor = BlockCursor::cold_start(head);
                info!(
                    "No checkpoint at {}, starting at block {}",
                    store.path().display(),
                    cursor.next()
                );
                (cursor, true)
            }
        };

        let bot = Self {
            ledger,
            tally,
            bot,
            cursor,
            scheduler,
            interpreter,
            store,
            clock: wall_clock,
        };
        if fresh {
            bot.save();
        }
        Ok(bot)
    }

    /// Replace the wall clock used for scheduling decisions.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn cursor(&self) -> BlockCursor {
        self.cursor
    }

    pub fn scheduler(&self) -> &VoteScheduler {
        &self.scheduler
    }

    pub fn interpreter(&self) -> &CommandInterpreter {
        &self.interpreter
    }

    pub fn ledger(&self) -> &G {
        &self.ledger
    }

    pub fn tally(&self) -> &DailyTally {
        &self.tally
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            cursor: self.cursor,
            queues: self.scheduler.snapshot(),
            eligibility: self.interpreter.state().clone(),
            tally: self.tally.snapshot(),
        }
    }

    fn save(&self) {
        if let Err(e) = self.store.save(&self.checkpoint()) {
            error!("Failed to save checkpoint to {}: {}", self.store.path().display(), e);
        }
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Process every block up to the current head. Returns blocks processed.
    pub async fn advance_to_head(&mut self) -> Result<u64> {
        let never = std::future::pending::<()>();
        tokio::pin!(never);
        let (processed, _) = self.catch_up(never).await?;
        Ok(processed)
    }

    /// Process batches until the head is reached or `shutdown` has completed,
    /// which is checked after every batch. Returns blocks processed and
    /// whether it stopped for shutdown.
    async fn catch_up<F>(&mut self, mut shutdown: Pin<&mut F>) -> Result<(u64, bool)>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut head = self.ledger.head_height().await?;
        let mut processed: u64 = 0;

        loop {
            let backlog = self.cursor.backlog(head);
            if backlog == 0 {
                break;
            }
            let count = backlog.min(MAX_BLOCK_BATCH);
            let blocks = self.ledger.block_range(self.cursor.next(), count).await?;
            if blocks.is_empty() {
                debug!("Node returned no blocks from {}", self.cursor.next());
                break;
            }

            for block in &blocks {
                self.process_block(block).await?;
                self.cursor.advance();
                processed += 1;
            }

            let now = (self.clock)();
            self.scheduler
                .tick_all(&self.ledger, &*self.tally, now)
                .await;
            self.save();

            let remaining = self.cursor.backlog(head);
            let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
            let speed = processed as f64 / elapsed;
            info!(
                "Processed {} blocks, {} remaining, {:.1} blocks/s, ~{:.1} min to head",
                processed,
                remaining,
                speed,
                remaining as f64 / speed / 60.0
            );

            if remaining == 0 {
                break;
            }
            if completed(shutdown.as_mut()).await {
                return Ok((processed, true));
            }
            head = self.ledger.head_height().await?;
        }
        Ok((processed, false))
    }

    async fn process_block(&mut self, block: &Block) -> Result<()> {
        let time = block.time();
        for op in block.operations() {
            let Operation::Comment(comment) = op else {
                continue;
            };
            match classify(comment, &self.bot, time) {
                Some(Classified::Mention(event)) => {
                    let disposition = self
                        .interpreter
                        .handle_mention(
                            &self.ledger,
                            &mut self.scheduler,
                            &*self.tally,
                            &event,
                        )
                        .await?;
                    debug!("Mention {} -> {:?}", event.reply, disposition);
                }
                Some(Classified::RootPost(post)) => {
                    self.interpreter.offer_root_post(&mut self.scheduler, &post);
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Run cycles until `shutdown` completes. Each cycle catches up with the
    /// head, then pauses `CYCLE_SECS` minus the number of blocks processed.
    /// A long catch-up stops at the next batch boundary once `shutdown` fires.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let processed = match self.catch_up(shutdown.as_mut()).await {
                Ok((_, true)) => {
                    info!("Shutting down mid catch-up at block {}", self.cursor.next());
                    self.save();
                    return Ok(());
                }
                Ok((n, false)) => n,
                Err(e) => {
                    warn!("Cycle failed at block {}: {}", self.cursor.next(), e);
                    0
                }
            };
            let pause = Duration::from_secs(CYCLE_SECS.saturating_sub(processed));

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down at block {}", self.cursor.next());
                    self.save();
                    return Ok(());
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

/// True if `shutdown` has completed. Never waits; must not be called again
/// after returning true.
async fn completed<F>(shutdown: Pin<&mut F>) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = shutdown => true,
        _ = std::future::ready(()) => false,
    }
}
