//! Broker server pool with dead-server tracking.
//!
//! Each server is either active (in rotation) or dead (out of rotation since
//! a recorded instant). A dead server comes back only through
//! [`ServerPool::recycle_dead_servers`], which callers run at the start of
//! every publish. There is no background timer.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tandem_core::Server;
use tracing::{debug, info};

/// Snapshot of the pool for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    /// Servers in rotation order
    pub active: Vec<Server>,
    /// Servers out of rotation
    pub dead: Vec<Server>,
    /// Rotation cursor
    pub current: Option<Server>,
}

/// Active/dead server bookkeeping plus the round-robin cursor.
///
/// Invariants:
/// - a server is never both active and dead
/// - when `active` is non-empty, `current` is one of its members
#[derive(Debug)]
pub struct ServerPool {
    active: Vec<Server>,
    dead: BTreeMap<Server, Instant>,
    current: Option<Server>,
    recycle_timeout: Duration,
    rng: StdRng,
}

impl ServerPool {
    /// Create a pool; duplicates are dropped and the first server becomes current.
    #[must_use]
    pub fn new(servers: Vec<Server>, recycle_timeout: Duration) -> Self {
        Self::with_rng(servers, recycle_timeout, StdRng::from_entropy())
    }

    /// Like [`ServerPool::new`] but with a seeded RNG, so that the server
    /// picked after a death is reproducible.
    #[must_use]
    pub fn with_seed(servers: Vec<Server>, recycle_timeout: Duration, seed: u64) -> Self {
        Self::with_rng(servers, recycle_timeout, StdRng::seed_from_u64(seed))
    }

    fn with_rng(servers: Vec<Server>, recycle_timeout: Duration, rng: StdRng) -> Self {
        let mut active: Vec<Server> = Vec::with_capacity(servers.len());
        for server in servers {
            if !active.contains(&server) {
                active.push(server);
            }
        }
        let current = active.first().cloned();
        Self { active, dead: BTreeMap::new(), current, recycle_timeout, rng }
    }

    /// Advance the cursor to the next active server and return it.
    ///
    /// Returns `None` when no server is active. If the cursor does not point
    /// into the active sequence, the first active server is chosen.
    pub fn select_next(&mut self) -> Option<Server> {
        if self.active.is_empty() {
            return None;
        }

        let next = match self.position_of_current() {
            Some(index) => (index + 1) % self.active.len(),
            None => 0,
        };
        let server = self.active[next].clone();
        self.current = Some(server.clone());
        Some(server)
    }

    /// Take `server` out of rotation as of now.
    pub fn mark_dead(&mut self, server: &Server) {
        self.mark_dead_at(server, Instant::now());
    }

    /// Take `server` out of rotation as of `at`.
    ///
    /// The cursor moves to a randomly chosen remaining server, or becomes
    /// `None` if none is left. Servers that are not active are ignored, so
    /// the pool never gains members.
    pub fn mark_dead_at(&mut self, server: &Server, at: Instant) {
        let Some(index) = self.active.iter().position(|s| s == server) else {
            debug!(server = %server, "Ignoring death of a server outside the rotation");
            return;
        };
        self.active.remove(index);
        self.dead.insert(server.clone(), at);
        debug!(server = %server, active = self.active.len(), "Marked server dead");
        self.pick_random_current();
    }

    /// Point the cursor at a uniformly chosen active server.
    ///
    /// No fairness is implied; this only spreads the next selection.
    fn pick_random_current(&mut self) {
        self.current = if self.active.is_empty() {
            None
        } else {
            let index = self.rng.gen_range(0..self.active.len());
            Some(self.active[index].clone())
        };
    }

    /// Return every server dead for at least the recycle timeout to rotation.
    ///
    /// Returns the recycled servers.
    pub fn recycle_dead_servers(&mut self) -> Vec<Server> {
        self.recycle_dead_servers_at(Instant::now())
    }

    /// [`ServerPool::recycle_dead_servers`] evaluated at `now`.
    pub fn recycle_dead_servers_at(&mut self, now: Instant) -> Vec<Server> {
        if self.dead.is_empty() {
            return Vec::new();
        }

        let timeout = self.recycle_timeout;
        let recycled: Vec<Server> = self
            .dead
            .iter()
            .filter(|(_, died)| now.saturating_duration_since(**died) >= timeout)
            .map(|(server, _)| server.clone())
            .collect();

        for server in &recycled {
            self.dead.remove(server);
            self.active.push(server.clone());
            info!(server = %server, "Recycled dead server");
        }

        if self.current.is_none() {
            self.current = self.active.first().cloned();
        }
        if !recycled.is_empty() {
            debug!(active = self.active.len(), dead = self.dead.len(), "Pool after recycling");
        }
        recycled
    }

    /// Point the cursor at `server`. Only active servers are accepted.
    pub fn set_current(&mut self, server: &Server) -> bool {
        if self.active.contains(server) {
            self.current = Some(server.clone());
            true
        } else {
            false
        }
    }

    fn position_of_current(&self) -> Option<usize> {
        let current = self.current.as_ref()?;
        self.active.iter().position(|s| s == current)
    }

    /// Rotation cursor.
    #[must_use]
    pub const fn current(&self) -> Option<&Server> {
        self.current.as_ref()
    }

    /// Active servers in rotation order.
    #[must_use]
    pub fn active(&self) -> &[Server] {
        &self.active
    }

    /// Dead servers with their time of death.
    pub fn dead(&self) -> impl Iterator<Item = (&Server, Instant)> {
        self.dead.iter().map(|(server, at)| (server, *at))
    }

    /// Whether `server` is currently out of rotation.
    #[must_use]
    pub fn is_dead(&self, server: &Server) -> bool {
        self.dead.contains_key(server)
    }

    /// Number of active servers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True when no server is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Minimum time a server stays dead.
    #[must_use]
    pub const fn recycle_timeout(&self) -> Duration {
        self.recycle_timeout
    }

    /// Snapshot of the pool.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            active: self.active.clone(),
            dead: self.dead.keys().cloned().collect(),
            current: self.current.clone(),
        }
    }
}
