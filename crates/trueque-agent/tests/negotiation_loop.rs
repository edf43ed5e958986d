//! End-to-end tests of the negotiation loop against an in-memory
//! marketplace and a scripted oracle.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::significant_drop_tightening
)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value, json};
use trueque_agent::{AgentError, Marketplace, NegotiationRunner, Oracle, RunSummary};
use trueque_core::letters::{
    MICRO_OFFER_SUBJECT, RECIPROCATION_SUBJECT, STATUS_SUBJECT, TRADE_CONFIRMATION_SUBJECT,
};
use trueque_core::{NegotiationConfig, StateError, TradeLedger};
use trueque_types::{
    Adjudication, Alias, Letter, LetterId, OfferAnalysis, OutgoingLetter, ResourceMap,
};

fn map(entries: &[(&str, u32)]) -> ResourceMap {
    entries.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect()
}

// ---------------------------------------------------------------------------
// In-memory marketplace
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MarketState {
    alias: Option<String>,
    inventory: ResourceMap,
    objective: ResourceMap,
    mailbox: BTreeMap<String, Value>,
    people: Vec<String>,
    sent: Vec<OutgoingLetter>,
    packages: Vec<(Alias, ResourceMap)>,
    deleted: Vec<String>,
    fail_packages: bool,
    /// Added to the inventory each time a letter is deleted, standing in
    /// for resources peers deliver while we work.
    credit_on_delete: ResourceMap,
    /// `/info` calls served so far, counting from 1.
    info_calls: usize,
    /// `/info` calls (by number) that answer with a server error.
    fail_info_calls: Vec<usize>,
    /// Inventories swapped in when `/info` call number N arrives.
    inventory_updates: Vec<(usize, ResourceMap)>,
}

struct MemoryMarket {
    state: Mutex<MarketState>,
}

impl MemoryMarket {
    fn new(inventory: ResourceMap, objective: ResourceMap) -> Self {
        Self {
            state: Mutex::new(MarketState {
                alias: Some("yo".to_owned()),
                inventory,
                objective,
                people: vec!["yo".to_owned(), "ana".to_owned()],
                ..MarketState::default()
            }),
        }
    }

    fn with_letter(self, key: &str, sender: &str, body: &str, timestamp: &str) -> Self {
        self.state.lock().unwrap().mailbox.insert(
            key.to_owned(),
            json!({"id": key, "remi": sender, "asunto": "Trato", "cuerpo": body, "fecha": timestamp}),
        );
        self
    }

    fn with(self, edit: impl FnOnce(&mut MarketState)) -> Self {
        edit(&mut self.state.lock().unwrap());
        self
    }

    fn sent_with_subject(&self, subject: &str) -> Vec<OutgoingLetter> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|letter| letter.subject == subject)
            .cloned()
            .collect()
    }
}

impl Marketplace for MemoryMarket {
    async fn account(&self) -> Result<Value, AgentError> {
        let mut state = self.state.lock().unwrap();
        state.info_calls += 1;
        let call = state.info_calls;
        let update = state
            .inventory_updates
            .iter()
            .find(|(n, _)| *n == call)
            .map(|(_, inventory)| inventory.clone());
        if let Some(inventory) = update {
            state.inventory = inventory;
        }
        if state.fail_info_calls.contains(&call) {
            return Err(AgentError::Marketplace {
                endpoint: "GET /info".to_owned(),
                status: 500,
                body: "busy".to_owned(),
            });
        }
        let mut info = Map::new();
        if let Some(alias) = &state.alias {
            info.insert("Alias".to_owned(), json!(alias));
        }
        info.insert("Recursos".to_owned(), json!(state.inventory));
        info.insert("Objetivo".to_owned(), json!(state.objective));
        info.insert("Buzon".to_owned(), json!(state.mailbox));
        Ok(Value::Object(info))
    }

    async fn people(&self) -> Result<Vec<Alias>, AgentError> {
        Ok(self.state.lock().unwrap().people.iter().map(Alias::new).collect())
    }

    async fn register_alias(&self, name: &str) -> Result<(), AgentError> {
        self.state.lock().unwrap().alias = Some(name.to_owned());
        Ok(())
    }

    async fn send_letter(&self, letter: &OutgoingLetter) -> Result<(), AgentError> {
        self.state.lock().unwrap().sent.push(letter.clone());
        Ok(())
    }

    async fn delete_letter(&self, id: &LetterId) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        state.mailbox.remove(id.as_str());
        state.deleted.push(id.as_str().to_owned());
        let credit = state.credit_on_delete.clone();
        for (resource, units) in credit {
            *state.inventory.entry(resource).or_insert(0) += units;
        }
        Ok(())
    }

    async fn send_package(&self, recipient: &Alias, resources: &ResourceMap) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_packages {
            return Err(AgentError::Marketplace {
                endpoint: "POST /package".to_owned(),
                status: 503,
                body: "unavailable".to_owned(),
            });
        }
        for (resource, units) in resources {
            let held = state.inventory.get_mut(resource).unwrap();
            *held -= units;
        }
        state.packages.push((recipient.clone(), resources.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted oracle
// ---------------------------------------------------------------------------

/// Classifies letters by body and accepts every offer on its raw terms.
#[derive(Default)]
struct ScriptedOracle {
    script: HashMap<String, OfferAnalysis>,
}

impl ScriptedOracle {
    fn with(mut self, body: &str, analysis: OfferAnalysis) -> Self {
        self.script.insert(body.to_owned(), analysis);
        self
    }
}

impl Oracle for ScriptedOracle {
    async fn classify(&self, letter: &Letter, _needs: &ResourceMap, _surplus: &ResourceMap) -> OfferAnalysis {
        self.script.get(&letter.body).cloned().unwrap_or_default()
    }

    async fn adjudicate(
        &self,
        analysis: &OfferAnalysis,
        _needs: &ResourceMap,
        _surplus: &ResourceMap,
    ) -> Adjudication {
        Adjudication::accepted(analysis.offered.clone(), analysis.requested.clone())
    }
}

async fn run_to_end(
    runner: &mut NegotiationRunner<MemoryMarket, ScriptedOracle>,
) -> Result<RunSummary, AgentError> {
    tokio::time::timeout(Duration::from_secs(3600), runner.run())
        .await
        .expect("run never reached the objective")
}

fn policy(offers_every_n_letters: u32) -> NegotiationConfig {
    NegotiationConfig {
        offers_every_n_letters,
        idle_backoff_ms: 100,
        ..NegotiationConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn drains_mailbox_oldest_first_and_deletes_each_letter_once() {
    let market = MemoryMarket::new(map(&[("madera", 0)]), map(&[("madera", 3)]))
        .with_letter("t3", "ana", "tres", "2026-01-03T00:00:00Z")
        .with_letter("t1", "ana", "uno", "2026-01-01T00:00:00Z")
        .with_letter("t2", "ana", "dos", "2026-01-02T00:00:00Z")
        .with(|s| s.credit_on_delete = map(&[("madera", 1)]));
    let mut runner = NegotiationRunner::new(market, ScriptedOracle::default(), policy(10));

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.letters_processed, 3);
    let state = runner.marketplace().state.lock().unwrap();
    assert_eq!(state.deleted, vec!["t1", "t2", "t3"]);
    assert!(state.mailbox.is_empty());
    assert!(state.packages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn sends_one_micro_offer_per_batch_of_letters() {
    let market = MemoryMarket::new(map(&[("madera", 0), ("piedra", 5)]), map(&[("madera", 3)]))
        .with_letter("m1", "ana", "hola", "2026-01-01T00:00:00Z")
        .with_letter("m2", "ana", "hola", "2026-01-02T00:00:00Z")
        .with_letter("m3", "ana", "hola", "2026-01-03T00:00:00Z")
        .with(|s| s.credit_on_delete = map(&[("madera", 1)]));
    let mut runner = NegotiationRunner::new(market, ScriptedOracle::default(), policy(3));

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.micro_offers_sent, 1);
    let offers = runner.marketplace().sent_with_subject(MICRO_OFFER_SUBJECT);
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].recipient.as_str(), "ana");
    assert!(offers[0].body.contains("piedra") && offers[0].body.contains("madera"));
}

#[tokio::test(start_paused = true)]
async fn stops_immediately_when_objective_already_met() {
    let market = MemoryMarket::new(map(&[("madera", 3)]), map(&[("madera", 3)]))
        .with_letter("m1", "ana", "hola", "2026-01-01T00:00:00Z");
    let mut runner = NegotiationRunner::new(market, ScriptedOracle::default(), policy(3));

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.letters_processed, 0);
    assert!(runner.marketplace().state.lock().unwrap().deleted.is_empty());
    assert_eq!(runner.marketplace().sent_with_subject(STATUS_SUBJECT).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_alias_aborts_the_run() {
    let market = MemoryMarket::new(map(&[]), map(&[("madera", 1)])).with(|s| s.alias = None);
    let mut runner = NegotiationRunner::new(market, ScriptedOracle::default(), policy(3));

    let result = run_to_end(&mut runner).await;

    assert!(matches!(result, Err(AgentError::State(StateError::MissingAlias))));
}

#[tokio::test(start_paused = true)]
async fn accepted_offer_pays_confirms_and_records() {
    let offer = OfferAnalysis::offer(map(&[("madera", 2)]), map(&[("piedra", 2)]));
    let market = MemoryMarket::new(map(&[("piedra", 5)]), map(&[("madera", 2)]))
        .with_letter("m1", "ana", "te doy madera", "2026-01-01T00:00:00Z")
        .with(|s| s.credit_on_delete = map(&[("madera", 2)]));
    let oracle = ScriptedOracle::default().with("te doy madera", offer);
    let mut runner = NegotiationRunner::new(market, oracle, policy(10));

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.offers_accepted, 1);
    assert_eq!(summary.packages_sent, 1);
    {
        let state = runner.marketplace().state.lock().unwrap();
        assert_eq!(state.packages, vec![(Alias::new("ana"), map(&[("piedra", 2)]))]);
        assert_eq!(state.inventory.get("piedra"), Some(&3));
        assert_eq!(state.deleted, vec!["m1"]);
    }
    let confirmations = runner.marketplace().sent_with_subject(TRADE_CONFIRMATION_SUBJECT);
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].recipient.as_str(), "ana");

    let owed = runner.ledger().outstanding(&Alias::new("ana"));
    assert_eq!(owed.len(), 1);
    assert_eq!(owed[0].sent, map(&[("piedra", 2)]));
    assert_eq!(owed[0].expected, map(&[("madera", 2)]));
}

#[tokio::test(start_paused = true)]
async fn failed_package_sends_no_confirmation_but_deletes_letter() {
    let offer = OfferAnalysis::offer(map(&[("madera", 2)]), map(&[("piedra", 2)]));
    let market = MemoryMarket::new(map(&[("piedra", 5)]), map(&[("madera", 2)]))
        .with_letter("m1", "ana", "te doy madera", "2026-01-01T00:00:00Z")
        .with(|s| {
            s.fail_packages = true;
            s.credit_on_delete = map(&[("madera", 2)]);
        });
    let oracle = ScriptedOracle::default().with("te doy madera", offer);
    let mut runner = NegotiationRunner::new(market, oracle, policy(10));

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.offers_accepted, 0);
    assert_eq!(summary.packages_sent, 0);
    assert!(runner.marketplace().sent_with_subject(TRADE_CONFIRMATION_SUBJECT).is_empty());
    assert_eq!(runner.marketplace().state.lock().unwrap().deleted, vec!["m1"]);
    assert_eq!(runner.ledger().peers_owing(), 0);
}

#[tokio::test(start_paused = true)]
async fn offer_asking_for_scarce_resource_is_declined() {
    let offer = OfferAnalysis::offer(map(&[("madera", 2)]), map(&[("oro", 1)]));
    let market = MemoryMarket::new(map(&[("oro", 9), ("piedra", 5)]), map(&[("madera", 2)]))
        .with_letter("m1", "ana", "quiero oro", "2026-01-01T00:00:00Z")
        .with(|s| s.credit_on_delete = map(&[("madera", 2)]));
    let oracle = ScriptedOracle::default().with("quiero oro", offer);
    let mut runner = NegotiationRunner::new(market, oracle, policy(10));

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.offers_accepted, 0);
    assert!(runner.marketplace().state.lock().unwrap().packages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn confirmation_is_reciprocated_and_settles_ledger() {
    let confirmation = OfferAnalysis::confirmation(map(&[("madera", 2)]), map(&[("piedra", 1)]));
    let market = MemoryMarket::new(map(&[("piedra", 5)]), map(&[("madera", 2)]))
        .with_letter("c1", "ana", "ya te envié", "2026-01-01T00:00:00Z")
        .with(|s| s.credit_on_delete = map(&[("madera", 2)]));
    let oracle = ScriptedOracle::default().with("ya te envié", confirmation);

    let mut ledger = TradeLedger::in_memory();
    ledger.record(&Alias::new("ana"), map(&[("piedra", 1)]), map(&[("madera", 2)]));
    let mut runner = NegotiationRunner::new(market, oracle, policy(10)).with_ledger(ledger);

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.confirmations_reciprocated, 1);
    assert_eq!(
        runner.marketplace().state.lock().unwrap().packages,
        vec![(Alias::new("ana"), map(&[("piedra", 1)]))]
    );
    assert_eq!(runner.marketplace().sent_with_subject(RECIPROCATION_SUBJECT).len(), 1);
    assert!(runner.ledger().outstanding(&Alias::new("ana")).is_empty());
}

#[tokio::test(start_paused = true)]
async fn display_name_is_registered_before_sync() {
    let market = MemoryMarket::new(map(&[("madera", 1)]), map(&[("madera", 1)])).with(|s| s.alias = None);
    let mut runner = NegotiationRunner::new(market, ScriptedOracle::default(), policy(3))
        .with_display_name(Some("comerciante".to_owned()));

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.cycles, 1);
    assert_eq!(
        runner.marketplace().state.lock().unwrap().alias.as_deref(),
        Some("comerciante")
    );
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_mid_pass_leaves_letter_unanswered() {
    let offer = OfferAnalysis::offer(map(&[("madera", 3)]), map(&[("piedra", 3)]));
    let market = MemoryMarket::new(map(&[("piedra", 5)]), map(&[("madera", 6)]))
        .with_letter("m1", "ana", "madera por piedra", "2026-01-01T00:00:00Z")
        .with_letter("m2", "ana", "más madera por piedra", "2026-01-02T00:00:00Z")
        .with(|s| {
            // 1: initial load, 2: after classifying m1, 3: after classifying m2.
            s.fail_info_calls = vec![3];
            s.credit_on_delete = map(&[("madera", 3)]);
        });
    let oracle = ScriptedOracle::default()
        .with("madera por piedra", offer.clone())
        .with("más madera por piedra", offer);
    let mut runner = NegotiationRunner::new(market, oracle, policy(10));

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.letters_processed, 2);
    assert_eq!(summary.offers_accepted, 1);
    let state = runner.marketplace().state.lock().unwrap();
    assert_eq!(state.packages, vec![(Alias::new("ana"), map(&[("piedra", 3)]))]);
    assert_eq!(state.inventory.get("piedra"), Some(&2));
    assert_eq!(state.deleted, vec!["m1", "m2"]);
}

#[tokio::test(start_paused = true)]
async fn idle_cycles_back_off_and_resync_until_resources_arrive() {
    let market = MemoryMarket::new(map(&[("madera", 0)]), map(&[("madera", 1)]))
        .with(|s| s.inventory_updates = vec![(3, map(&[("madera", 1)]))]);
    let mut runner = NegotiationRunner::new(market, ScriptedOracle::default(), policy(3));
    let started = tokio::time::Instant::now();

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.letters_processed, 0);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(runner.marketplace().state.lock().unwrap().info_calls, 3);
    assert_eq!(runner.marketplace().sent_with_subject(STATUS_SUBJECT).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn offer_is_judged_on_state_fetched_after_classification() {
    let offer = OfferAnalysis::offer(map(&[("madera", 3)]), map(&[("piedra", 3)]));
    let market = MemoryMarket::new(map(&[("piedra", 5)]), map(&[("madera", 3)]))
        .with_letter("m1", "ana", "madera por piedra", "2026-01-01T00:00:00Z")
        .with(|s| {
            // Stone leaves the account between classification and decision.
            s.inventory_updates = vec![(2, map(&[("piedra", 2)]))];
            s.credit_on_delete = map(&[("madera", 3)]);
        });
    let oracle = ScriptedOracle::default().with("madera por piedra", offer);
    let mut runner = NegotiationRunner::new(market, oracle, policy(10));

    let summary = run_to_end(&mut runner).await.unwrap();

    assert_eq!(summary.offers_accepted, 0);
    assert_eq!(summary.packages_sent, 0);
    assert!(runner.marketplace().sent_with_subject(TRADE_CONFIRMATION_SUBJECT).is_empty());
    let state = runner.marketplace().state.lock().unwrap();
    assert!(state.packages.is_empty());
    assert_eq!(state.deleted, vec!["m1"]);
}
