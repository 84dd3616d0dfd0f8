//! Process-wide match directory (spec §4.E). Grounded on
//! `crates/server/src/server.rs`'s `GameServer` — same read-for-list/
//! write-for-create-or-remove lock split, same "drop the read guard
//! before re-acquiring write" discipline in `create_match`.
//!
//! Unlike the teacher, the directory here is a plain `std::sync::RwLock`
//! rather than `tokio::sync::RwLock`: no lookup holds the lock across an
//! `.await` (the handle is cloned out and released immediately, same
//! pattern as `presence`/`router`), so the async lock brings no benefit
//! and the removal callback invoked from the worker's shutdown path can
//! stay synchronous.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use join_coordinator::JoinVerdict;
use match_core::{
    CoreValue, InboundMessage, MatchAddress, MatchCoreError, MatchId, NodeId, Presence,
    PresenceKey, RuntimeConfig, Stream,
};
use match_handler::MatchHandler;
use presence::PresenceTracker;
use router::MessageRouter;
use script_host::ModuleRegistry;

use crate::query;

/// `GetMatch`/`ListMatches` projection (spec §4.E).
#[derive(Clone, Debug)]
pub struct MatchListing {
    pub address: String,
    pub authoritative: bool,
    pub label: String,
    pub size: usize,
    pub tick_rate: u32,
    pub module_name: String,
}

pub struct MatchRegistry {
    node: NodeId,
    config: RuntimeConfig,
    modules: ModuleRegistry,
    tracker: Arc<PresenceTracker>,
    router: Arc<MessageRouter>,
    matches: Arc<RwLock<HashMap<MatchId, MatchHandler>>>,
}

impl MatchRegistry {
    pub fn new(
        node: NodeId,
        config: RuntimeConfig,
        modules: ModuleRegistry,
        tracker: Arc<PresenceTracker>,
        router: Arc<MessageRouter>,
    ) -> Self {
        Self {
            node,
            config,
            modules,
            tracker,
            router,
            matches: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// `CreateMatch` (spec §4.E): validates the module exists, constructs
    /// a handler, runs `init` synchronously so errors propagate here, and
    /// only then records it. Creation failure leaves no trace.
    pub async fn create_match(
        &self,
        module_name: &str,
        params: CoreValue,
    ) -> Result<String, MatchCoreError> {
        let module = self.modules.load(module_name)?;

        let matches = Arc::clone(&self.matches);
        let on_stopped: Box<dyn Fn(MatchId) + Send + Sync> = Box::new(move |id| {
            matches.write().expect("match directory poisoned").remove(&id);
        });

        let handler = match_handler::create_match(
            self.node.clone(),
            module_name.to_string(),
            module,
            params,
            self.config.clone(),
            Arc::clone(&self.tracker),
            Arc::clone(&self.router),
            on_stopped,
        )
        .await?;

        let address = MatchAddress::new(handler.id, handler.node.clone()).to_string();
        self.matches
            .write()
            .expect("match directory poisoned")
            .insert(handler.id, handler);

        Ok(address)
    }

    fn lookup(&self, address: &str) -> Result<MatchHandler, MatchCoreError> {
        let address = MatchAddress::parse(address)
            .ok_or_else(|| MatchCoreError::InvalidArgument(format!("malformed match address {address:?}")))?;
        self.matches
            .read()
            .expect("match directory poisoned")
            .get(&address.match_id)
            .cloned()
            .ok_or(MatchCoreError::NotFound)
    }

    fn listing_of(handler: &MatchHandler) -> MatchListing {
        let descriptor = handler.descriptor();
        MatchListing {
            address: MatchAddress::new(descriptor.match_id, descriptor.node).to_string(),
            authoritative: descriptor.authoritative,
            label: descriptor.label,
            size: descriptor.size,
            tick_rate: descriptor.tick_rate,
            module_name: descriptor.module_name,
        }
    }

    /// `GetMatch` (spec §4.E).
    pub fn get_match(&self, address: &str) -> Option<MatchListing> {
        let handler = self.lookup(address).ok()?;
        Some(Self::listing_of(&handler))
    }

    /// `ListMatches` (spec §4.E, §6 query grammar).
    pub fn list_matches(
        &self,
        limit: usize,
        authoritative: bool,
        label: Option<&str>,
        min_size: Option<usize>,
        max_size: Option<usize>,
        query: Option<&str>,
    ) -> Result<Vec<MatchListing>, MatchCoreError> {
        if !authoritative {
            // Only authoritative, single-node matches exist in this
            // runtime (spec §1 non-goals: no cross-node relay).
            return Ok(Vec::new());
        }

        let parsed_query = query.map(query::parse).transpose().map_err(|e| {
            MatchCoreError::InvalidArgument(e.to_string())
        })?;

        let guard = self.matches.read().expect("match directory poisoned");
        let mut out = Vec::new();
        for handler in guard.values() {
            let listing = Self::listing_of(handler);

            if let Some(want_label) = label {
                if listing.label != want_label {
                    continue;
                }
            }
            if let Some(min) = min_size {
                if listing.size < min {
                    continue;
                }
            }
            if let Some(max) = max_size {
                if listing.size > max {
                    continue;
                }
            }
            if let Some(q) = &parsed_query {
                if !q.matches(&listing.label) {
                    continue;
                }
            }

            out.push(listing);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// `RouteData` (spec §4.E): silently a no-op if the match is gone.
    pub fn route_data(&self, address: &str, message: InboundMessage) {
        if let Ok(handler) = self.lookup(address) {
            handler.route_data(message);
        }
    }

    /// `JoinAttempt` (spec §4.E, §4.F step 1).
    pub async fn join_attempt(
        &self,
        address: &str,
        presence: Presence,
        metadata: CoreValue,
    ) -> Result<JoinVerdict, MatchCoreError> {
        let handler = self.lookup(address)?;
        Ok(handler.join_attempt(presence, metadata).await)
    }

    /// `Mark` (spec §4.F step 2) — the external entry point that
    /// realizes the join coordinator's confirm phase. Not itself
    /// enumerated as a Registry bullet in the spec, but required for a
    /// caller outside the match to ever reach `JoinMarkerTable::confirm`.
    pub fn confirm_join(&self, address: &str, key: PresenceKey) -> Result<(), MatchCoreError> {
        let handler = self.lookup(address)?;
        handler.confirm(key)
    }

    /// `Kick(stream, presences)` (spec §4.E): used by the dispatcher's
    /// buffered `kick` capability when the capability crosses a crate
    /// boundary (our `script-host`/`match-handler` resolve kicks inline
    /// in the worker already; this mirrors the same op at the registry
    /// layer for callers that only hold a `Stream`).
    pub fn kick(&self, stream: &Stream, presences: &[Presence]) -> Result<(), MatchCoreError> {
        let handler = self
            .matches
            .read()
            .expect("match directory poisoned")
            .get(&stream.subject)
            .cloned()
            .ok_or(MatchCoreError::NotFound)?;
        handler.kick(presences)
    }

    /// `RemoveMatch` (spec §4.E) happens automatically: the handler's
    /// `on_stopped` callback registered in `create_match` removes the
    /// entry as the worker's final act, so there is no separate public
    /// method here.
    pub fn match_count(&self) -> usize {
        self.matches.read().expect("match directory poisoned").len()
    }
}
