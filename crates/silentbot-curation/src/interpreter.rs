//! Turns mentions into answers and queued votes.
//!
//! Every answer lives at a permlink derived from the content it answers, so
//! a command seen twice (after a restart, say) finds its earlier answer and
//! does nothing the second time.

use std::time::Duration;

use tracing::{debug, info, warn};

use silentbot_chain::{Action, LedgerGateway};
use silentbot_core::{BotConfig, ContentRef, Reporter, Result};
use silentbot_scheduler::VoteScheduler;

use crate::command::Command;
use crate::eligibility::{tag_abuse_penalty, EligibilityGate, EligibilityState, StarRejection};
use crate::events::{MentionEvent, RootPost};
use crate::responses;

/// Attempts at posting one answer before giving up on it.
pub const RESPONSE_ATTEMPTS: u32 = 3;

/// What happened to a mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Not a recognizable command.
    Ignored,
    /// Caller is not a curator. `notified` is true the first time only.
    NotCurator { notified: bool },
    Refused(StarRejection),
    /// An answer already exists; nothing was done.
    AlreadyAnswered,
    /// The target post could not be found.
    MissingPost,
    Rated { stars: u8, weight: i32 },
    Penalized { weight: i32 },
}

pub struct CommandInterpreter {
    config: BotConfig,
    gate: EligibilityGate,
    state: EligibilityState,
    response_delay: Duration,
}

impl CommandInterpreter {
    /// The state's blacklist is extended with the gate's aggregated one.
    pub fn new(config: BotConfig, gate: EligibilityGate, mut state: EligibilityState) -> Self {
        state.extend_blacklist(gate.aggregated_blacklist());
        let response_delay = Duration::from_secs(config.retry_delay_secs);
        Self {
            config,
            gate,
            state,
            response_delay,
        }
    }

    pub fn state(&self) -> &EligibilityState {
        &self.state
    }

    pub fn gate(&self) -> &EligibilityGate {
        &self.gate
    }

    /// Replace the durable state, keeping the current blacklist entries.
    pub fn restore_state(&mut self, mut state: EligibilityState) {
        state.extend_blacklist(std::mem::take(&mut self.state.blacklist));
        self.state = state;
    }

    pub async fn handle_mention<G: LedgerGateway>(
        &mut self,
        ledger: &G,
        scheduler: &mut VoteScheduler,
        reporter: &dyn Reporter,
        event: &MentionEvent,
    ) -> Result<Disposition> {
        let command = Command::parse(&event.body, &self.config.bot);
        if command == Command::Invalid {
            debug!("Ignoring mention {} by {}", event.reply, event.caller());
            return Ok(Disposition::Ignored);
        }

        if !self.gate.is_curator(event.caller()) {
            if self.state.notified_non_curators.contains(event.caller()) {
                return Ok(Disposition::NotCurator { notified: false });
            }
            info!("{} is not a curator, notifying once", event.caller());
            let notified = self
                .respond(ledger, &event.reply, responses::not_a_curator())
                .await?;
            if notified {
                self.state.notify_non_curator(event.caller());
            }
            return Ok(Disposition::NotCurator { notified });
        }

        match command {
            Command::Star(stars) => self.star(ledger, scheduler, reporter, event, stars).await,
            Command::AbuseSpam => self.spam(ledger, scheduler, &event.target).await,
            Command::AbuseTag => self.tag_abuse(ledger, scheduler, &event.target).await,
            Command::Invalid => Ok(Disposition::Ignored),
        }
    }

    /// Offer a root post to the opportunistic queue of every account whose
    /// interests match. Returns how many accounts took it.
    pub fn offer_root_post(&self, scheduler: &mut VoteScheduler, post: &RootPost) -> usize {
        if !self.gate.accepts_app(&post.app) {
            return 0;
        }
        let accounts: Vec<String> = scheduler
            .accounts()
            .map(|a| a.account().to_string())
            .filter(|a| {
                self.gate
                    .opportunistic_match(a, &post.target.author, &post.tags)
            })
            .collect();
        for account in &accounts {
            if let Some(s) = scheduler.account_mut(account) {
                s.offer_opportunistic(post.target.clone(), post.timestamp);
            }
        }
        accounts.len()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    async fn star<G: LedgerGateway>(
        &mut self,
        ledger: &G,
        scheduler: &mut VoteScheduler,
        reporter: &dyn Reporter,
        event: &MentionEvent,
        stars: u8,
    ) -> Result<Disposition> {
        let target = &event.target;

        if self.state.is_blacklisted(&target.author) {
            self.respond(ledger, &event.reply, responses::blacklisted(&target.author))
                .await?;
            return Ok(Disposition::Refused(StarRejection::Blacklisted(
                target.author.clone(),
            )));
        }

        let Some(post) = ledger.get_post(target).await? else {
            warn!("Star for missing post {}, dropping", target);
            return Ok(Disposition::MissingPost);
        };

        if let Err(rejection) = self.gate.check_tags(&post.tags) {
            let body = match rejection {
                StarRejection::NotTribe => responses::not_a_tribe_post(self.gate.tribe()),
                _ => responses::no_curation_tag(self.gate.tribe(), self.gate.tags()),
            };
            self.respond(ledger, &event.reply, body).await?;
            return Ok(Disposition::Refused(rejection));
        }

        if self.answered(ledger, target).await? {
            return Ok(Disposition::AlreadyAnswered);
        }

        let entry = self.config.star_response(post.power_up(), stars).clone();
        self.post_response(ledger, target, entry.body()).await;
        reporter.record_rating(event.caller(), target, stars);
        scheduler.enqueue_primary(entry.percentage, target, post.created);

        info!(
            "{} rated {} with {} stars (power up: {}), queued weight {}",
            event.caller(),
            target,
            stars,
            post.power_up(),
            entry.percentage
        );
        Ok(Disposition::Rated {
            stars,
            weight: entry.percentage,
        })
    }

    async fn spam<G: LedgerGateway>(
        &mut self,
        ledger: &G,
        scheduler: &mut VoteScheduler,
        target: &ContentRef,
    ) -> Result<Disposition> {
        let weight = self.state.spam_penalty(&target.author);
        let body = self.config.abuse.spam.body();
        let disposition = self.penalize(ledger, scheduler, target, weight, body).await?;
        if matches!(disposition, Disposition::Penalized { .. }) {
            self.state.record_spam(&target.author);
            info!("Spam report on {}, penalty {}", target, weight);
        }
        Ok(disposition)
    }

    async fn tag_abuse<G: LedgerGateway>(
        &mut self,
        ledger: &G,
        scheduler: &mut VoteScheduler,
        target: &ContentRef,
    ) -> Result<Disposition> {
        let incident = self.state.next_tag_incident(&target.author);
        let weight = tag_abuse_penalty(incident);
        let body = self.config.abuse.tag.body();
        let disposition = self.penalize(ledger, scheduler, target, weight, body).await?;
        if matches!(disposition, Disposition::Penalized { .. }) {
            self.state.record_tag_abuse(&target.author, incident);
            info!(
                "Tag abuse report #{} on {}, penalty {}",
                incident, target, weight
            );
        }
        Ok(disposition)
    }

    /// Answer an abuse report on the target itself and queue the penalty.
    async fn penalize<G: LedgerGateway>(
        &self,
        ledger: &G,
        scheduler: &mut VoteScheduler,
        target: &ContentRef,
        weight: i32,
        body: String,
    ) -> Result<Disposition> {
        let Some(post) = ledger.get_post(target).await? else {
            warn!("Abuse report for missing post {}, dropping", target);
            return Ok(Disposition::MissingPost);
        };
        if self.answered(ledger, target).await? {
            return Ok(Disposition::AlreadyAnswered);
        }
        self.post_response(ledger, target, body).await;
        scheduler.enqueue_primary(weight, target, post.created);
        Ok(Disposition::Penalized { weight })
    }

    // -----------------------------------------------------------------------
    // Answers
    // -----------------------------------------------------------------------

    /// Whether the bot already answered `parent`.
    async fn answered<G: LedgerGateway>(&self, ledger: &G, parent: &ContentRef) -> Result<bool> {
        let location = ContentRef::new(&self.config.bot, parent.response_permlink(&self.config.bot));
        let exists = ledger.content_exists(&location).await?;
        if exists {
            debug!("Already answered {} at {}", parent, location);
        }
        Ok(exists)
    }

    /// Answer `parent` unless an answer already exists. True once an answer
    /// is on chain.
    async fn respond<G: LedgerGateway>(
        &self,
        ledger: &G,
        parent: &ContentRef,
        body: String,
    ) -> Result<bool> {
        if self.answered(ledger, parent).await? {
            return Ok(true);
        }
        Ok(self.post_response(ledger, parent, body).await)
    }

    /// Post an answer, retrying a bounded number of times on refusal.
    async fn post_response<G: LedgerGateway>(
        &self,
        ledger: &G,
        parent: &ContentRef,
        body: String,
    ) -> bool {
        let action = Action::Comment(responses::build_response(
            &self.config.bot,
            self.gate.tribe(),
            parent,
            body,
        ));
        for attempt in 1..=RESPONSE_ATTEMPTS {
            match ledger.broadcast(&action).await {
                Ok(_) => {
                    debug!("Answered {}", parent);
                    return true;
                }
                Err(e) if attempt < RESPONSE_ATTEMPTS => {
                    warn!(
                        "Answer to {} refused (attempt {}): {}; retrying",
                        parent, attempt, e
                    );
                    tokio::time::sleep(self.response_delay).await;
                }
                Err(e) => {
                    warn!(
                        "Giving up on answer to {} after {} attempts: {}",
                        parent, attempt, e
                    );
                }
            }
        }
        false
    }
}
