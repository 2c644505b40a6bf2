//! Active device session
//!
//! A [`Session`] owns the mapping set and the control state store as one
//! [`Layout`], so the two vectors can only ever be replaced together. The
//! ingestion thread, the dispatch loop and the calibration engine all share
//! one `Arc<Session>`.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{MappingRule, MappingSet};
use crate::control::ControlAddress;
use crate::state::ControlStateStore;

/// Mapping set plus its index-aligned state store
#[derive(Debug)]
pub struct Layout {
    config: MappingSet,
    store: Arc<ControlStateStore>,
    routes: HashMap<ControlAddress, Vec<usize>>,
}

impl Layout {
    fn new(config: MappingSet, store: Arc<ControlStateStore>) -> Self {
        debug_assert_eq!(config.mappings.len(), store.len());

        let mut routes: HashMap<ControlAddress, Vec<usize>> = HashMap::new();
        for (index, rule) in config.mappings.iter().enumerate() {
            routes.entry(rule.control.address).or_default().push(index);
        }

        Self { config, store, routes }
    }

    pub fn config(&self) -> &MappingSet {
        &self.config
    }

    pub fn mappings(&self) -> &[MappingRule] {
        &self.config.mappings
    }

    pub fn store(&self) -> &ControlStateStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.config.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.mappings.is_empty()
    }

    /// Mapping indices bound to a control
    pub fn indices_for(&self, address: &ControlAddress) -> &[usize] {
        self.routes.get(address).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Feed a raw sample to every mapping bound to `address`
    pub fn observe(&self, address: &ControlAddress, raw: i32) -> bool {
        let indices = self.indices_for(address);
        for &index in indices {
            self.store.observe(index, raw);
        }
        !indices.is_empty()
    }
}

/// Cooperative stop flag shared by every actor
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Shared state of one device session
#[derive(Debug)]
pub struct Session {
    layout: RwLock<Arc<Layout>>,
    generation: AtomicU64,
    suspended: AtomicUsize,
    stop: StopSignal,
}

impl Session {
    /// Start a session with a fresh store sized to `config`
    pub fn new(config: MappingSet) -> Self {
        let store = Arc::new(ControlStateStore::new(config.mappings.len()));
        Self {
            layout: RwLock::new(Arc::new(Layout::new(config, store))),
            generation: AtomicU64::new(0),
            suspended: AtomicUsize::new(0),
            stop: StopSignal::new(),
        }
    }

    /// Current layout snapshot
    pub fn layout(&self) -> Arc<Layout> {
        self.layout.read().clone()
    }

    /// Bumped whenever the layout is replaced
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Copy of the active mapping set
    pub fn config(&self) -> MappingSet {
        self.layout().config.clone()
    }

    /// Install a new mapping set together with a freshly zeroed store.
    ///
    /// All previously handed out indices become invalid.
    pub fn replace_mappings(&self, config: MappingSet) {
        let store = Arc::new(ControlStateStore::new(config.mappings.len()));
        let count = config.mappings.len();
        self.install(Layout::new(config, store));
        info!("Mapping set replaced ({} mapping(s), state reset)", count);
    }

    /// Edit settings that leave the mapping vector's size and order alone.
    ///
    /// The existing store is kept, so live values survive the edit.
    pub fn update_mapping<F>(&self, index: usize, edit: F) -> Option<MappingRule>
    where
        F: FnOnce(&mut MappingRule),
    {
        let mut guard = self.layout.write();
        let mut config = guard.config.clone();
        let rule = config.mappings.get_mut(index)?;
        let address = rule.control.address;
        edit(rule);
        debug_assert_eq!(
            rule.control.address, address,
            "update_mapping must not rebind the control"
        );
        let updated = rule.clone();

        let store = guard.store.clone();
        *guard = Arc::new(Layout::new(config, store));
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!("Mapping {} updated: {:?}", index, updated);
        Some(updated)
    }

    /// Change the channel used by mappings without an explicit one
    pub fn set_default_channel(&self, channel: u8) {
        let mut guard = self.layout.write();
        let mut config = guard.config.clone();
        config.default_channel = channel;
        let store = guard.store.clone();
        *guard = Arc::new(Layout::new(config, store));
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn install(&self, layout: Layout) {
        *self.layout.write() = Arc::new(layout);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn stop(&self) {
        self.stop.raise();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_raised()
    }

    /// Pause dispatching until the returned guard is dropped
    pub fn suspend_dispatch(&self) -> DispatchSuspension<'_> {
        self.suspended.fetch_add(1, Ordering::AcqRel);
        DispatchSuspension { session: self }
    }

    pub fn is_dispatch_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire) > 0
    }
}

/// RAII guard returned by [`Session::suspend_dispatch`]
#[must_use = "dispatch resumes as soon as the guard is dropped"]
pub struct DispatchSuspension<'a> {
    session: &'a Session,
}

impl Drop for DispatchSuspension<'_> {
    fn drop(&mut self) {
        self.session.suspended.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Cached view of a session's layout for a long-running actor.
///
/// Holds an `Arc<Layout>` and only takes the session lock again when the
/// generation counter moved.
pub struct LayoutCache {
    layout: Arc<Layout>,
    generation: u64,
}

impl LayoutCache {
    pub fn new(session: &Session) -> Self {
        let generation = session.generation();
        Self {
            layout: session.layout(),
            generation,
        }
    }

    /// Current layout, reloaded if the session replaced it.
    ///
    /// Returns `true` in the second slot when a reload happened.
    pub fn refresh(&mut self, session: &Session) -> (&Arc<Layout>, bool) {
        let generation = session.generation();
        let reloaded = generation != self.generation;
        if reloaded {
            self.generation = generation;
            self.layout = session.layout();
        }
        (&self.layout, reloaded)
    }
}
