use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use domain::arp::entity::{
    ArpWaiter, RouterPort, ARP_EXPIRATION_MILLIS, ARP_RETRY_MILLIS, ARP_TIMEOUT_MILLIS,
};
use domain::arp::table::{ArpTable, ExpiryTick, Lookup};
use domain::common::entity::{PortId, RouterId, RuleId};
use domain::common::error::DomainError;
use domain::nat::entity::NatStore;
use domain::packet::entity::{
    ArpOp, ArpPdu, EchoKind, EthernetFrame, FlowMatch, FramePayload, Ipv4Packet, Mac, Transport,
};
use domain::pipeline::entity::{ForwardAction, ForwardInfo};
use domain::route::entity::{NextHop, Route};
use domain::route::table::RoutingTable;
use domain::rule::engine::{ChainEngine, ChainVerdict};
use domain::rule::entity::Rule;
use ports::primary::packet_processor_port::PacketProcessorPort;
use ports::secondary::metrics_port::RouterMetrics;
use ports::secondary::packet_transport_port::PacketTransportPort;
use ports::secondary::reactor_port::ReactorPort;

/// Chain consulted before routing. NAT and filtering on ingress.
pub const PRE_ROUTING: &str = "pre_routing";
/// Chain consulted after the route picked an egress port.
pub const POST_ROUTING: &str = "post_routing";

/// The forwarding plane of one virtual router.
///
/// Cheap to clone; all clones share state behind a single mutex. The
/// pipeline is callback-driven: a packet that cannot forward until its
/// next-hop MAC resolves parks as a waiter in the ARP cache and is
/// finished (or dropped) by the resolution outcome. Frames, waiter
/// completions, and timer arming all happen after the state lock is
/// released.
#[derive(Clone)]
pub struct RouterService {
    inner: Arc<Inner>,
}

struct Inner {
    id: RouterId,
    state: Mutex<State>,
    transport: Arc<dyn PacketTransportPort>,
    reactor: Arc<dyn ReactorPort>,
    metrics: Arc<dyn RouterMetrics>,
}

struct State {
    ports: HashMap<PortId, RouterPort>,
    routes: RoutingTable,
    chains: ChainEngine,
    arp: ArpTable,
    nat: Box<dyn NatStore>,
}

/// Side effects computed under the lock and performed after it drops.
/// Waiters re-enter the service, so running them under the lock would
/// deadlock.
#[derive(Default)]
struct Effects {
    emits: Vec<(PortId, EthernetFrame)>,
    completions: Vec<(ArpWaiter, Option<Mac>)>,
    timers: Vec<(u64, Timer)>,
}

#[derive(Debug, Clone)]
enum Timer {
    ArpRetry { port: PortId, nw_addr: u32 },
    ArpExpiry { port: PortId, nw_addr: u32 },
}

impl RouterService {
    pub fn new(
        id: RouterId,
        nat: Box<dyn NatStore>,
        transport: Arc<dyn PacketTransportPort>,
        reactor: Arc<dyn ReactorPort>,
        metrics: Arc<dyn RouterMetrics>,
    ) -> Self {
        info!(router = %id, "router service created");
        Self {
            inner: Arc::new(Inner {
                id,
                state: Mutex::new(State {
                    ports: HashMap::new(),
                    routes: RoutingTable::new(),
                    chains: ChainEngine::new(),
                    arp: ArpTable::new(),
                    nat,
                }),
                transport,
                reactor,
                metrics,
            }),
        }
    }

    pub fn id(&self) -> &RouterId {
        &self.inner.id
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, DomainError> {
        self.inner
            .state
            .lock()
            .map_err(|_| DomainError::EngineError("router state lock poisoned".into()))
    }

    // ── Port management ────────────────────────────────────────────

    pub fn add_port(&self, port: RouterPort) -> Result<(), DomainError> {
        port.validate()?;
        let mut st = self.state()?;
        if st.ports.contains_key(&port.id) {
            return Err(DomainError::InvalidConfig(format!(
                "port already exists: {}",
                port.id
            )));
        }
        info!(router = %self.inner.id, port = %port.id, "port added");
        st.ports.insert(port.id.clone(), port);
        Ok(())
    }

    /// Tear down a port: its routes are withdrawn, its ARP entries
    /// dropped, and packets parked on them are failed.
    pub fn remove_port(&self, id: &PortId) -> Result<(), DomainError> {
        let mut effects = Effects::default();
        {
            let mut st = self.state()?;
            if st.ports.remove(id).is_none() {
                return Err(DomainError::PortNotFound(id.to_string()));
            }
            let swept = st.routes.remove_port_routes(id);
            let waiters = st.arp.purge_port(id);
            info!(
                router = %self.inner.id,
                port = %id,
                routes_swept = swept,
                waiters_failed = waiters.len(),
                "port removed"
            );
            effects
                .completions
                .extend(waiters.into_iter().map(|w| (w, None)));
            self.inner
                .metrics
                .set_routes_loaded(st.routes.routes().count() as u64);
            self.inner.metrics.set_arp_cache_size(st.arp.len() as u64);
        }
        self.run(effects);
        Ok(())
    }

    pub fn port(&self, id: &PortId) -> Result<RouterPort, DomainError> {
        self.state()?
            .ports
            .get(id)
            .cloned()
            .ok_or_else(|| DomainError::PortNotFound(id.to_string()))
    }

    // ── Route management ───────────────────────────────────────────

    pub fn add_route(&self, route: Route) -> Result<(), DomainError> {
        let mut st = self.state()?;
        if let NextHop::Port { port, .. } = &route.next_hop
            && !st.ports.contains_key(port)
        {
            return Err(DomainError::PortNotFound(port.to_string()));
        }
        st.routes.add_route(route)?;
        self.inner
            .metrics
            .set_routes_loaded(st.routes.routes().count() as u64);
        Ok(())
    }

    pub fn remove_route(&self, route: &Route) -> Result<(), DomainError> {
        let mut st = self.state()?;
        st.routes.remove_route(route)?;
        self.inner
            .metrics
            .set_routes_loaded(st.routes.routes().count() as u64);
        Ok(())
    }

    /// Resolve the next hop a packet with these addresses would take.
    /// `None` means no route; blackhole and reject hops are returned
    /// as such even though all three drop the packet.
    pub fn route_lookup(&self, nw_src: u32, nw_dst: u32) -> Result<Option<NextHop>, DomainError> {
        Ok(self
            .state()?
            .routes
            .lookup(nw_src, nw_dst)
            .map(|r| r.next_hop.clone()))
    }

    // ── Chain management ───────────────────────────────────────────

    pub fn add_chain(&self, name: &str) -> Result<(), DomainError> {
        self.state()?.chains.add_chain(name)
    }

    pub fn remove_chain(&self, name: &str) -> Result<(), DomainError> {
        self.state()?.chains.remove_chain(name)
    }

    pub fn add_rule(&self, chain: &str, rule: Rule) -> Result<(), DomainError> {
        self.state()?.chains.add_rule(chain, rule)
    }

    pub fn remove_rule(&self, chain: &str, id: &RuleId) -> Result<(), DomainError> {
        self.state()?.chains.remove_rule(chain, id)
    }

    // ── Pipeline ───────────────────────────────────────────────────

    fn handle_arp(
        &self,
        st: &mut State,
        ingress: &RouterPort,
        arp: ArpPdu,
        effects: &mut Effects,
    ) -> ForwardAction {
        let now = self.inner.reactor.now_millis();
        match arp.op {
            ArpOp::Request => {
                if !ingress.should_proxy_answer(arp.target_ip) {
                    // Requests the router does not answer are still
                    // absorbed here; ARP never forwards.
                    return ForwardAction::Consumed;
                }
                // Answering means talking back to the sender; learn it.
                let learned = st
                    .arp
                    .process_reply(&ingress.id, arp.sender_ip, arp.sender_mac, now);
                effects
                    .completions
                    .extend(learned.waiters.into_iter().map(|w| (w, Some(arp.sender_mac))));
                if learned.created {
                    effects.timers.push((
                        ARP_EXPIRATION_MILLIS,
                        Timer::ArpExpiry {
                            port: ingress.id.clone(),
                            nw_addr: arp.sender_ip,
                        },
                    ));
                }
                effects.emits.push((
                    ingress.id.clone(),
                    ArpPdu::reply(ingress.mac, arp.target_ip, arp.sender_mac, arp.sender_ip),
                ));
                ForwardAction::Consumed
            }
            ArpOp::Reply => {
                if arp.target_ip != ingress.port_addr && arp.target_mac != ingress.mac {
                    return ForwardAction::Drop;
                }
                let learned = st
                    .arp
                    .process_reply(&ingress.id, arp.sender_ip, arp.sender_mac, now);
                if !learned.waiters.is_empty() {
                    self.inner.metrics.record_arp_resolution("resolved");
                }
                effects
                    .completions
                    .extend(learned.waiters.into_iter().map(|w| (w, Some(arp.sender_mac))));
                if learned.created {
                    effects.timers.push((
                        ARP_EXPIRATION_MILLIS,
                        Timer::ArpExpiry {
                            port: ingress.id.clone(),
                            nw_addr: arp.sender_ip,
                        },
                    ));
                }
                self.inner.metrics.set_arp_cache_size(st.arp.len() as u64);
                ForwardAction::Consumed
            }
        }
    }

    fn handle_ipv4(
        &self,
        st: &mut State,
        ingress: &RouterPort,
        frame: &EthernetFrame,
        pkt: &Ipv4Packet,
        effects: &mut Effects,
    ) -> ForwardAction {
        let match_in = FlowMatch::from_ipv4(frame, pkt);

        // Traffic addressed to one of the router's own ports never
        // forwards. Echo requests are answered; the rest is dropped.
        if st.ports.values().any(|p| p.port_addr == match_in.nw_dst) {
            if let Transport::IcmpEcho {
                kind: EchoKind::Request,
                id,
                seq,
                data,
            } = &pkt.transport
            {
                debug!(router = %self.inner.id, port = %ingress.id, "answering echo request");
                effects.emits.push((
                    ingress.id.clone(),
                    EthernetFrame {
                        src: ingress.mac,
                        dst: frame.src,
                        payload: FramePayload::Ipv4(Ipv4Packet {
                            nw_src: match_in.nw_dst,
                            nw_dst: match_in.nw_src,
                            protocol: 1,
                            transport: Transport::IcmpEcho {
                                kind: EchoKind::Reply,
                                id: *id,
                                seq: *seq,
                                data: data.clone(),
                            },
                        }),
                    },
                ));
                return ForwardAction::Consumed;
            }
            return ForwardAction::Drop;
        }

        let mut match_out = match_in.clone();

        let State { chains, nat, .. } = st;
        let verdict = chains.evaluate(PRE_ROUTING, &mut match_out, &ingress.id, None, nat.as_mut());
        self.inner
            .metrics
            .record_chain_verdict(PRE_ROUTING, verdict_label(verdict));
        if verdict != ChainVerdict::Accept {
            return ForwardAction::Drop;
        }

        // Routing runs on the rewritten headers.
        let next_hop = st
            .routes
            .lookup(match_out.nw_src, match_out.nw_dst)
            .map(|r| r.next_hop.clone());
        let (out_id, gateway) = match next_hop {
            Some(NextHop::Port { port, gateway }) => {
                self.inner.metrics.record_route_lookup("port");
                (port, gateway)
            }
            Some(NextHop::Blackhole) => {
                self.inner.metrics.record_route_lookup("blackhole");
                return ForwardAction::Drop;
            }
            Some(NextHop::Reject) => {
                self.inner.metrics.record_route_lookup("reject");
                return ForwardAction::Drop;
            }
            None => {
                self.inner.metrics.record_route_lookup("none");
                debug!(router = %self.inner.id, "no route, dropping");
                return ForwardAction::Drop;
            }
        };
        let Some(out_port) = st.ports.get(&out_id).cloned() else {
            warn!(router = %self.inner.id, port = %out_id, "route points at missing port");
            return ForwardAction::Drop;
        };

        // The post-routing chain runs once the next-hop MAC is known,
        // inline on a cache hit or from the resume path otherwise.
        let next_hop_ip = gateway.unwrap_or(match_out.nw_dst);
        let now = self.inner.reactor.now_millis();
        match st.arp.lookup(&out_port, next_hop_ip, now) {
            Lookup::Unreachable => {
                debug!(
                    router = %self.inner.id,
                    port = %out_id,
                    "next hop off the port's segment, dropping"
                );
                ForwardAction::Drop
            }
            Lookup::Resolved { mac, refresh } => {
                if refresh {
                    self.inner.metrics.record_arp_request("refresh");
                    effects.emits.push((
                        out_id.clone(),
                        ArpPdu::request(out_port.mac, out_port.port_addr, next_hop_ip),
                    ));
                }
                let State { chains, nat, .. } = st;
                let verdict = chains.evaluate(
                    POST_ROUTING,
                    &mut match_out,
                    &ingress.id,
                    Some(&out_id),
                    nat.as_mut(),
                );
                self.inner
                    .metrics
                    .record_chain_verdict(POST_ROUTING, verdict_label(verdict));
                if verdict != ChainVerdict::Accept {
                    return ForwardAction::Drop;
                }
                match_out.dl_src = out_port.mac;
                match_out.dl_dst = mac;
                effects.emits.push((out_id.clone(), match_out.apply(frame)));
                ForwardAction::Forward { out_port: out_id }
            }
            Lookup::Pending { is_new } => {
                let info = ForwardInfo {
                    in_port: ingress.id.clone(),
                    out_port: out_id.clone(),
                    frame: frame.clone(),
                    match_in,
                    match_out,
                    next_hop_ip,
                };
                let router = self.clone();
                let waiter: ArpWaiter = Box::new(move |mac| router.resume(info, mac));
                if st.arp.add_waiter(&out_id, next_hop_ip, waiter).is_err() {
                    return ForwardAction::Drop;
                }
                if is_new {
                    self.inner.metrics.record_arp_request("initial");
                    effects.emits.push((
                        out_id.clone(),
                        ArpPdu::request(out_port.mac, out_port.port_addr, next_hop_ip),
                    ));
                    effects.timers.push((
                        ARP_RETRY_MILLIS,
                        Timer::ArpRetry {
                            port: out_id.clone(),
                            nw_addr: next_hop_ip,
                        },
                    ));
                    effects.timers.push((
                        ARP_TIMEOUT_MILLIS,
                        Timer::ArpExpiry {
                            port: out_id,
                            nw_addr: next_hop_ip,
                        },
                    ));
                }
                ForwardAction::Paused
            }
        }
    }

    /// Finish a packet parked on next-hop resolution: post-routing
    /// chain, MAC rewrite, emission.
    fn resume(&self, info: ForwardInfo, mac: Option<Mac>) {
        let Some(mac) = mac else {
            debug!(
                router = %self.inner.id,
                port = %info.out_port,
                "resolution failed, dropping suspended packet"
            );
            self.inner.metrics.record_resume(false);
            return;
        };
        let frame = {
            let mut st = match self.state() {
                Ok(st) => st,
                Err(e) => {
                    warn!(router = %self.inner.id, error = %e, "resume aborted");
                    return;
                }
            };
            let Some(out_mac) = st.ports.get(&info.out_port).map(|p| p.mac) else {
                self.inner.metrics.record_resume(false);
                return;
            };
            let mut match_out = info.match_out;
            let State { chains, nat, .. } = &mut *st;
            let verdict = chains.evaluate(
                POST_ROUTING,
                &mut match_out,
                &info.in_port,
                Some(&info.out_port),
                nat.as_mut(),
            );
            self.inner
                .metrics
                .record_chain_verdict(POST_ROUTING, verdict_label(verdict));
            if verdict != ChainVerdict::Accept {
                self.inner.metrics.record_resume(false);
                return;
            }
            match_out.dl_src = out_mac;
            match_out.dl_dst = mac;
            match_out.apply(&info.frame)
        };
        if let Err(e) = self.inner.transport.emit(&info.out_port, frame) {
            warn!(router = %self.inner.id, port = %info.out_port, error = %e, "emit failed");
        }
        self.inner.metrics.record_resume(true);
    }

    // ── Timers and effects ─────────────────────────────────────────

    fn on_timer(&self, timer: Timer) {
        let mut effects = Effects::default();
        {
            let mut st = match self.state() {
                Ok(st) => st,
                Err(e) => {
                    warn!(router = %self.inner.id, error = %e, "timer aborted");
                    return;
                }
            };
            let now = self.inner.reactor.now_millis();
            match &timer {
                Timer::ArpRetry { port, nw_addr } => {
                    if st.arp.retry_tick(port, *nw_addr, now)
                        && let Some(p) = st.ports.get(port)
                    {
                        self.inner.metrics.record_arp_request("retry");
                        effects
                            .emits
                            .push((port.clone(), ArpPdu::request(p.mac, p.port_addr, *nw_addr)));
                        effects.timers.push((ARP_RETRY_MILLIS, timer.clone()));
                    }
                }
                Timer::ArpExpiry { port, nw_addr } => {
                    match st.arp.expiry_tick(port, *nw_addr, now) {
                        ExpiryTick::Evicted(waiters) => {
                            if !waiters.is_empty() {
                                self.inner.metrics.record_arp_resolution("failed");
                            }
                            effects
                                .completions
                                .extend(waiters.into_iter().map(|w| (w, None)));
                        }
                        // The entry was refreshed since this check was
                        // armed. Keep the chain going.
                        ExpiryTick::Rearm(delay) => effects.timers.push((delay, timer.clone())),
                        ExpiryTick::Gone => {}
                    }
                }
            }
            self.inner.metrics.set_arp_cache_size(st.arp.len() as u64);
        }
        self.run(effects);
    }

    fn run(&self, effects: Effects) {
        for (port, frame) in effects.emits {
            if let Err(e) = self.inner.transport.emit(&port, frame) {
                warn!(router = %self.inner.id, port = %port, error = %e, "emit failed");
            }
        }
        for (waiter, mac) in effects.completions {
            waiter(mac);
        }
        for (delay, timer) in effects.timers {
            let router = self.clone();
            self.inner
                .reactor
                .schedule(delay, Box::new(move || router.on_timer(timer)));
        }
    }
}

impl PacketProcessorPort for RouterService {
    fn process(&self, in_port: &PortId, frame: EthernetFrame) -> Result<ForwardAction, DomainError> {
        let mut effects = Effects::default();
        let action = {
            let mut st = self.state()?;
            let ingress = st
                .ports
                .get(in_port)
                .cloned()
                .ok_or_else(|| DomainError::PortNotFound(in_port.to_string()))?;
            match &frame.payload {
                FramePayload::Arp(arp) => {
                    let arp = *arp;
                    self.handle_arp(&mut st, &ingress, arp, &mut effects)
                }
                FramePayload::Ipv4(pkt) => {
                    let pkt = pkt.clone();
                    self.handle_ipv4(&mut st, &ingress, &frame, &pkt, &mut effects)
                }
                FramePayload::Other(ethertype) => {
                    debug!(
                        router = %self.inner.id,
                        port = %in_port,
                        ethertype = format!("{ethertype:#06x}"),
                        "unhandled ethertype"
                    );
                    ForwardAction::NotSupported
                }
            }
        };
        self.inner
            .metrics
            .record_packet(&in_port.0, action_label(&action));
        self.run(effects);
        Ok(action)
    }
}

fn verdict_label(verdict: ChainVerdict) -> &'static str {
    match verdict {
        ChainVerdict::Accept => "accept",
        ChainVerdict::Drop => "drop",
        ChainVerdict::Reject => "reject",
    }
}

fn action_label(action: &ForwardAction) -> &'static str {
    match action {
        ForwardAction::NotSupported => "not_supported",
        ForwardAction::Drop => "drop",
        ForwardAction::Consumed => "consumed",
        ForwardAction::Paused => "paused",
        ForwardAction::Forward { .. } => "forward",
    }
}
