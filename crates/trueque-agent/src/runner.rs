//! The negotiation loop: from marketplace state to trades.
//!
//! One cycle:
//! 1. Sync the state snapshot from the marketplace
//! 2. Broadcast a status letter to every peer and rebuild the micro-offer
//!    queue
//! 3. Stop if the objective is met
//! 4. Drain the mailbox oldest-first: classify each letter, re-sync, then
//!    evaluate offers or handle confirmations, transfer, and delete the
//!    letter; every `offers_every_n_letters` letters one queued micro-offer
//!    goes out
//! 5. Stop if the objective is met
//! 6. Sleep for the idle backoff
//!
//! Everything runs sequentially on one task. Failures of individual
//! marketplace calls are logged and skipped; only a state snapshot that
//! cannot be built (missing alias) aborts the run. No decision is taken on a
//! snapshot whose refresh failed: a letter met that way is deleted
//! unanswered, and a cycle whose first sync fails goes straight to backoff.
//!
//! Accepting a trade is two independent calls, package then letter, with no
//! rollback: if the letter fails the package has still been sent.

use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, info, warn};
use trueque_core::confirmation::handle_confirmation;
use trueque_core::evaluator::{evaluate_offer, has_clear_terms};
use trueque_core::letters::{
    RECIPROCATION_SUBJECT, STATUS_SUBJECT, TRADE_CONFIRMATION_SUBJECT, reciprocation_letter,
    status_letter, trade_confirmation_letter,
};
use trueque_core::state::total_needed;
use trueque_core::{NegotiationConfig, NegotiationState, OfferQueue, StateError, Throttle, TradeLedger};
use trueque_types::{Adjudication, Alias, Letter, LetterKind, OfferAnalysis, OutgoingLetter, ResourceMap};

use crate::error::AgentError;
use crate::marketplace::Marketplace;
use crate::oracle::Oracle;

/// Counters reported when the run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Sync cycles started.
    pub cycles: u64,
    /// Letters processed and deleted (or attempted).
    pub letters_processed: u64,
    /// Offers accepted and paid for.
    pub offers_accepted: u64,
    /// Confirmations answered with a reciprocal package.
    pub confirmations_reciprocated: u64,
    /// Packages successfully sent.
    pub packages_sent: u64,
    /// Micro-offers successfully sent.
    pub micro_offers_sent: u64,
}

/// Owner of the current [`NegotiationState`].
///
/// The snapshot is only ever replaced whole: a refresh builds the new
/// snapshot completely before swapping it in, and a failed refresh keeps
/// the previous one.
pub struct StateStore {
    snapshot: NegotiationState,
    scarce_resource: String,
}

impl StateStore {
    /// Build the first snapshot. Any failure is fatal to the run.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the account view cannot be fetched or
    /// turned into a snapshot.
    pub async fn load<M: Marketplace>(marketplace: &M, scarce_resource: &str) -> Result<Self, AgentError> {
        let info = marketplace.account().await?;
        let snapshot = NegotiationState::from_account(&info, scarce_resource)?;
        Ok(Self {
            snapshot,
            scarce_resource: scarce_resource.to_owned(),
        })
    }

    /// Replace the snapshot with a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the fetch or the build fails; the previous
    /// snapshot is kept.
    pub async fn refresh<M: Marketplace>(&mut self, marketplace: &M) -> Result<(), AgentError> {
        let info = marketplace.account().await?;
        self.snapshot = NegotiationState::from_account(&info, &self.scarce_resource)?;
        Ok(())
    }

    /// The current snapshot.
    pub const fn snapshot(&self) -> &NegotiationState {
        &self.snapshot
    }
}

/// Drives negotiation against a marketplace with an oracle.
pub struct NegotiationRunner<M, O> {
    marketplace: M,
    oracle: O,
    policy: NegotiationConfig,
    display_name: Option<String>,
    ledger: TradeLedger,
}

impl<M: Marketplace, O: Oracle> NegotiationRunner<M, O> {
    /// Create a runner with an in-memory ledger and no display name.
    pub fn new(marketplace: M, oracle: O, policy: NegotiationConfig) -> Self {
        Self {
            marketplace,
            oracle,
            policy,
            display_name: None,
            ledger: TradeLedger::in_memory(),
        }
    }

    /// Register `name` with the marketplace when the run starts.
    #[must_use]
    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }

    /// Use `ledger` to record accepted trades.
    #[must_use]
    pub fn with_ledger(mut self, ledger: TradeLedger) -> Self {
        self.ledger = ledger;
        self
    }

    /// The trade ledger.
    pub const fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    /// The marketplace client.
    pub const fn marketplace(&self) -> &M {
        &self.marketplace
    }

    /// Run until the objective is met.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the first snapshot cannot be built, or if
    /// any later snapshot has no alias.
    pub async fn run(&mut self) -> Result<RunSummary, AgentError> {
        let mut summary = RunSummary::default();

        if let Some(name) = self.display_name.clone() {
            match self.marketplace.register_alias(&name).await {
                Ok(()) => info!(display_name = name, "display name registered"),
                Err(e) => warn!(display_name = name, error = %e, "display name registration failed"),
            }
        }

        let mut store = StateStore::load(&self.marketplace, &self.policy.scarce_resource)
            .await
            .inspect_err(|e| error!(error = %e, "initial state sync failed"))?;
        let mut throttle = Throttle::new(self.policy.offers_every_n_letters);

        loop {
            summary.cycles = summary.cycles.saturating_add(1);
            if summary.cycles > 1 && !self.resync(&mut store).await? {
                tokio::time::sleep(self.policy.idle_backoff()).await;
                continue;
            }

            let snapshot = store.snapshot();
            info!(
                cycle = summary.cycles,
                alias = %snapshot.alias(),
                units_needed = total_needed(snapshot),
                mailbox = snapshot.mailbox().len(),
                "sync"
            );

            let peers = self.peers(snapshot.alias()).await;
            self.broadcast_status(snapshot, &peers).await;
            let mut queue = OfferQueue::build(
                &peers,
                snapshot.needs(),
                snapshot.surplus(),
                snapshot.scarce_resource(),
                snapshot.tradeable_scarce(),
                self.policy.micro_offer_quantity,
            );
            debug!(queued = queue.len(), "micro-offer queue rebuilt");

            if snapshot.has_reached_objective() {
                info!(?summary, "objective reached");
                return Ok(summary);
            }

            let letters: Vec<Letter> = snapshot.mailbox().to_vec();
            for letter in &letters {
                self.process_letter(letter, &mut store, &mut summary).await?;

                match self.marketplace.delete_letter(&letter.id).await {
                    Ok(()) => debug!(letter_id = %letter.id, "letter deleted"),
                    Err(e) => warn!(letter_id = %letter.id, error = %e, "letter deletion failed"),
                }
                summary.letters_processed = summary.letters_processed.saturating_add(1);

                if throttle.record_processed()
                    && let Some(offer) = queue.pop()
                {
                    let alias = store.snapshot().alias().clone();
                    let outgoing = compose(alias, offer.peer.clone(), &offer.subject, offer.body);
                    match self.marketplace.send_letter(&outgoing).await {
                        Ok(()) => {
                            summary.micro_offers_sent = summary.micro_offers_sent.saturating_add(1);
                            info!(peer = %offer.peer, remaining = queue.len(), "micro-offer sent");
                        }
                        Err(e) => warn!(peer = %offer.peer, error = %e, "micro-offer send failed"),
                    }
                }
            }

            if !letters.is_empty()
                && self.resync(&mut store).await?
                && store.snapshot().has_reached_objective()
            {
                info!(?summary, "objective reached");
                return Ok(summary);
            }

            debug!(backoff_ms = self.policy.idle_backoff_ms, "idle");
            tokio::time::sleep(self.policy.idle_backoff()).await;
        }
    }

    /// Refresh the snapshot and report whether it is fresh.
    ///
    /// A missing alias is fatal. Any other failure keeps the previous
    /// snapshot and returns `false`; callers must not decide on it.
    async fn resync(&self, store: &mut StateStore) -> Result<bool, AgentError> {
        match store.refresh(&self.marketplace).await {
            Ok(()) => Ok(true),
            Err(AgentError::State(StateError::MissingAlias)) => {
                error!("account view lost its alias");
                Err(AgentError::State(StateError::MissingAlias))
            }
            Err(e) => {
                warn!(error = %e, "state sync failed, keeping previous snapshot");
                Ok(false)
            }
        }
    }

    /// Known peers, excluding ourselves, capped by `max_peers`.
    async fn peers(&self, own_alias: &Alias) -> Vec<Alias> {
        match self.marketplace.people().await {
            Ok(people) => people
                .into_iter()
                .filter(|peer| peer != own_alias)
                .take(self.policy.max_peers.unwrap_or(usize::MAX))
                .collect(),
            Err(e) => {
                warn!(error = %e, "peer listing failed");
                Vec::new()
            }
        }
    }

    async fn broadcast_status(&self, snapshot: &NegotiationState, peers: &[Alias]) {
        let body = status_letter(snapshot.needs(), snapshot.surplus());
        for peer in peers {
            let letter = compose(snapshot.alias().clone(), peer.clone(), STATUS_SUBJECT, body.clone());
            if let Err(e) = self.marketplace.send_letter(&letter).await {
                warn!(peer = %peer, error = %e, "status letter failed");
            }
        }
        debug!(peers = peers.len(), "status broadcast");
    }

    async fn process_letter(
        &mut self,
        letter: &Letter,
        store: &mut StateStore,
        summary: &mut RunSummary,
    ) -> Result<(), AgentError> {
        let analysis = {
            let snapshot = store.snapshot();
            self.oracle.classify(letter, snapshot.needs(), snapshot.surplus()).await
        };
        info!(
            letter_id = %letter.id,
            sender = %letter.sender,
            kind = %analysis.kind,
            "letter classified"
        );

        if !self.resync(store).await? {
            warn!(letter_id = %letter.id, "state not refreshed, letter left unanswered");
            return Ok(());
        }

        if letter.sender.as_str().is_empty() && analysis.kind != LetterKind::Other {
            warn!(letter_id = %letter.id, "letter has no sender, nothing to answer");
            return Ok(());
        }

        match analysis.kind {
            LetterKind::Offer => self.handle_offer(letter, &analysis, store.snapshot(), summary).await,
            LetterKind::Confirmation => {
                self.answer_confirmation(letter, &analysis, store.snapshot(), summary).await;
            }
            LetterKind::Other => debug!(letter_id = %letter.id, "no action for this letter"),
        }
        Ok(())
    }

    async fn handle_offer(
        &mut self,
        letter: &Letter,
        analysis: &OfferAnalysis,
        snapshot: &NegotiationState,
        summary: &mut RunSummary,
    ) {
        let view = snapshot.view();
        let adjudication = if has_clear_terms(analysis) {
            self.oracle.adjudicate(analysis, view.needs, view.surplus).await
        } else {
            Adjudication::rejected()
        };

        let verdict = evaluate_offer(analysis, &adjudication, &view);
        info!(
            letter_id = %letter.id,
            sender = %letter.sender,
            verdict = %verdict.verdict(),
            reason = %verdict.reason(),
            "offer evaluated"
        );
        if !verdict.is_accepted() {
            return;
        }

        if !self.transfer(&letter.sender, &verdict.to_send, summary).await {
            return;
        }
        summary.offers_accepted = summary.offers_accepted.saturating_add(1);

        self.ledger
            .record(&letter.sender, verdict.to_send.clone(), verdict.offered.clone());
        if let Err(e) = self.ledger.save() {
            warn!(error = %e, "ledger save failed");
        }

        let body = trade_confirmation_letter(&verdict.to_send, &verdict.offered);
        let reply = compose(snapshot.alias().clone(), letter.sender.clone(), TRADE_CONFIRMATION_SUBJECT, body);
        if let Err(e) = self.marketplace.send_letter(&reply).await {
            warn!(peer = %letter.sender, error = %e, "trade confirmation letter failed after package was sent");
        }
    }

    async fn answer_confirmation(
        &mut self,
        letter: &Letter,
        analysis: &OfferAnalysis,
        snapshot: &NegotiationState,
        summary: &mut RunSummary,
    ) {
        let verdict = handle_confirmation(analysis, &snapshot.view());
        info!(
            letter_id = %letter.id,
            sender = %letter.sender,
            gift = verdict.is_gift,
            can_send = verdict.can_send,
            reason = %verdict.reason(),
            "confirmation handled"
        );

        if verdict.has_received {
            let settled = self.ledger.settle(&letter.sender);
            if settled > 0 {
                info!(peer = %letter.sender, settled, "ledger entries settled");
                if let Err(e) = self.ledger.save() {
                    warn!(error = %e, "ledger save failed");
                }
            }
        }

        if !verdict.can_send || !self.transfer(&letter.sender, &verdict.to_send, summary).await {
            return;
        }
        summary.confirmations_reciprocated = summary.confirmations_reciprocated.saturating_add(1);

        let body = reciprocation_letter(&verdict.received, &verdict.to_send);
        let reply = compose(snapshot.alias().clone(), letter.sender.clone(), RECIPROCATION_SUBJECT, body);
        if let Err(e) = self.marketplace.send_letter(&reply).await {
            warn!(peer = %letter.sender, error = %e, "reciprocation letter failed after package was sent");
        }
    }

    /// Send a package. Returns whether it went out.
    async fn transfer(&self, peer: &Alias, resources: &ResourceMap, summary: &mut RunSummary) -> bool {
        match self.marketplace.send_package(peer, resources).await {
            Ok(()) => {
                summary.packages_sent = summary.packages_sent.saturating_add(1);
                info!(peer = %peer, ?resources, "package sent");
                true
            }
            Err(e) => {
                warn!(peer = %peer, ?resources, error = %e, "package transfer failed");
                false
            }
        }
    }
}

fn compose(sender: Alias, recipient: Alias, subject: &str, body: String) -> OutgoingLetter {
    OutgoingLetter::compose(
        sender,
        recipient,
        subject,
        body,
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}
