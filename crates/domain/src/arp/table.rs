use std::collections::HashMap;

use tracing::debug;

use crate::arp::entity::{
    ArpCacheEntry, ArpWaiter, RouterPort, ARP_EXPIRATION_MILLIS, ARP_RETRY_MILLIS,
    ARP_STALE_MILLIS, ARP_TIMEOUT_MILLIS,
};
use crate::common::entity::PortId;
use crate::packet::entity::Mac;

/// Outcome of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A usable MAC. When `refresh` is set the entry has gone stale
    /// and the caller should transmit a request for it now.
    Resolved { mac: Mac, refresh: bool },
    /// The address is off the port's local segment and can never
    /// resolve there.
    Unreachable,
    /// Resolution is in flight. On `is_new` the caller owns sending
    /// the first request and arming the retry and timeout timers.
    Pending { is_new: bool },
}

/// Outcome of learning a MAC.
pub struct Learned {
    /// The reply created the entry rather than refreshing one. The
    /// caller owns arming the eviction timer for it.
    pub created: bool,
    /// Waiters to complete with the MAC, outside any lock.
    pub waiters: Vec<ArpWaiter>,
}

/// Outcome of an eviction check.
pub enum ExpiryTick {
    /// Entry evicted. The waiters are failed by the caller.
    Evicted(Vec<ArpWaiter>),
    /// Entry still live. Check again after this many milliseconds.
    Rearm(u64),
    /// Nothing cached under the key.
    Gone,
}

/// Per-router ARP cache, keyed by port and address.
///
/// Pure state machine over a millisecond clock passed into every
/// method. Transmitting frames, arming timers, and invoking waiters
/// all happen in the caller; methods hand back the waiter callbacks
/// that became runnable so they can be fired outside any lock.
#[derive(Debug, Default)]
pub struct ArpTable {
    entries: HashMap<(PortId, u32), ArpCacheEntry>,
}

impl ArpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `nw_addr` on a port at time `now`.
    ///
    /// Starts a pending resolution when nothing is cached. Use
    /// [`add_waiter`](Self::add_waiter) to queue a callback on a
    /// pending outcome.
    pub fn lookup(&mut self, port: &RouterPort, nw_addr: u32, now: u64) -> Lookup {
        if !port.is_local_target(nw_addr) {
            return Lookup::Unreachable;
        }
        let key = (port.id.clone(), nw_addr);
        if let Some(entry) = self.entries.get_mut(&key) {
            match entry.mac {
                Some(mac) if now.saturating_sub(entry.resolved_at) < ARP_EXPIRATION_MILLIS => {
                    let stale = now.saturating_sub(entry.resolved_at) > ARP_STALE_MILLIS;
                    let refresh =
                        stale && now.saturating_sub(entry.last_request) >= ARP_RETRY_MILLIS;
                    if refresh {
                        entry.last_request = now;
                    }
                    return Lookup::Resolved { mac, refresh };
                }
                Some(_) => {
                    // Expired before the eviction timer got to it.
                    // Treat as absent and start over.
                    self.entries.remove(&key);
                }
                None => return Lookup::Pending { is_new: false },
            }
        }
        debug!(port = %port.id, nw_addr, "starting arp resolution");
        self.entries.insert(
            key,
            ArpCacheEntry {
                mac: None,
                first_request: now,
                last_request: now,
                resolved_at: 0,
                waiters: Vec::new(),
            },
        );
        Lookup::Pending { is_new: true }
    }

    /// Queue a callback for a pending resolution. Returns the waiter
    /// unconsumed if no pending entry exists for the key.
    pub fn add_waiter(
        &mut self,
        port: &PortId,
        nw_addr: u32,
        waiter: ArpWaiter,
    ) -> Result<(), ArpWaiter> {
        match self.entries.get_mut(&(port.clone(), nw_addr)) {
            Some(entry) if entry.mac.is_none() => {
                entry.waiters.push(waiter);
                Ok(())
            }
            _ => Err(waiter),
        }
    }

    /// Learn a MAC from a reply (or any ARP we overhear on the port).
    pub fn process_reply(&mut self, port: &PortId, nw_addr: u32, mac: Mac, now: u64) -> Learned {
        let key = (port.clone(), nw_addr);
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.mac = Some(mac);
                entry.resolved_at = now;
                Learned {
                    created: false,
                    waiters: std::mem::take(&mut entry.waiters),
                }
            }
            None => {
                self.entries.insert(
                    key,
                    ArpCacheEntry {
                        mac: Some(mac),
                        first_request: now,
                        last_request: now,
                        resolved_at: now,
                        waiters: Vec::new(),
                    },
                );
                Learned {
                    created: true,
                    waiters: Vec::new(),
                }
            }
        }
    }

    /// Retry timer callback. Returns `true` when the caller should
    /// transmit another request and re-arm the timer.
    pub fn retry_tick(&mut self, port: &PortId, nw_addr: u32, now: u64) -> bool {
        match self.entries.get_mut(&(port.clone(), nw_addr)) {
            Some(entry)
                if entry.mac.is_none()
                    && now.saturating_sub(entry.first_request) < ARP_TIMEOUT_MILLIS =>
            {
                entry.last_request = now;
                true
            }
            _ => false,
        }
    }

    /// Timeout/eviction timer callback. Evicts a pending entry whose
    /// resolution window has closed or a resolved entry past
    /// expiration. A surviving entry hands back the delay to the next
    /// check, keeping one timer chain live per entry.
    pub fn expiry_tick(&mut self, port: &PortId, nw_addr: u32, now: u64) -> ExpiryTick {
        let key = (port.clone(), nw_addr);
        let Some(entry) = self.entries.get(&key) else {
            return ExpiryTick::Gone;
        };
        let deadline = match entry.mac {
            None => entry.first_request + ARP_TIMEOUT_MILLIS,
            Some(_) => entry.resolved_at + ARP_EXPIRATION_MILLIS,
        };
        if now < deadline {
            return ExpiryTick::Rearm(deadline - now);
        }
        debug!(port = %port, nw_addr, "evicting arp entry");
        match self.entries.remove(&key) {
            Some(entry) => ExpiryTick::Evicted(entry.waiters),
            None => ExpiryTick::Gone,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry on a port. Returns the pending waiters, which
    /// the caller fails.
    pub fn purge_port(&mut self, port: &PortId) -> Vec<ArpWaiter> {
        let keys: Vec<_> = self
            .entries
            .keys()
            .filter(|(p, _)| p == port)
            .cloned()
            .collect();
        let mut waiters = Vec::new();
        for key in keys {
            if let Some(entry) = self.entries.remove(&key) {
                waiters.extend(entry.waiters);
            }
        }
        waiters
    }
}
