use super::entity::{NatBinding, NatKey, NatKind, NatStore, NatTarget};
use crate::packet::entity::FlowMatch;

/// Apply a forward NAT rewrite to `flow`, creating the translation on
/// first sight of the flow and reusing it afterwards.
///
/// With `dnat` the destination is rewritten, otherwise the source. Both
/// the forward entry and the matching reverse entry are recorded so the
/// return flow can be undone by [`apply_reverse`].
pub fn apply_forward(
    store: &mut dyn NatStore,
    flow: &mut FlowMatch,
    dnat: bool,
    targets: &[NatTarget],
) {
    let fwd_kind = if dnat {
        NatKind::DnatForward
    } else {
        NatKind::SnatForward
    };
    let fwd_key = key_from_flow(fwd_kind, flow);

    let binding = match store.get(&fwd_key) {
        Some(existing) => existing,
        None => {
            let binding = select_binding(flow, targets);
            store.put(fwd_key, binding);
            store.put(reverse_key(flow, dnat, &binding), reverse_binding(flow, dnat));
            binding
        }
    };

    rewrite(flow, dnat, &binding);
}

/// Undo a NAT rewrite on a return flow.
///
/// Returns `false` when no translation exists for the flow, in which
/// case the rule holding this action does not match the packet.
pub fn apply_reverse(store: &dyn NatStore, flow: &mut FlowMatch, dnat: bool) -> bool {
    let kind = if dnat {
        NatKind::DnatReverse
    } else {
        NatKind::SnatReverse
    };
    let Some(binding) = store.get(&key_from_flow(kind, flow)) else {
        return false;
    };
    // Reverse DNAT restores the original public destination as the
    // packet's source; reverse SNAT restores the original source as
    // the packet's destination.
    rewrite(flow, !dnat, &binding);
    true
}

fn key_from_flow(kind: NatKind, flow: &FlowMatch) -> NatKey {
    NatKey {
        kind,
        protocol: flow.nw_proto,
        nw_src: flow.nw_src,
        tp_src: flow.tp_src,
        nw_dst: flow.nw_dst,
        tp_dst: flow.tp_dst,
    }
}

/// Key the return flow will present, as it looks after the forward
/// rewrite has been applied.
fn reverse_key(flow: &FlowMatch, dnat: bool, binding: &NatBinding) -> NatKey {
    let with_ports = flow.has_transport_ports();
    if dnat {
        NatKey {
            kind: NatKind::DnatReverse,
            protocol: flow.nw_proto,
            nw_src: binding.nw_addr,
            tp_src: if with_ports { binding.tp_port } else { 0 },
            nw_dst: flow.nw_src,
            tp_dst: flow.tp_src,
        }
    } else {
        NatKey {
            kind: NatKind::SnatReverse,
            protocol: flow.nw_proto,
            nw_src: flow.nw_dst,
            tp_src: flow.tp_dst,
            nw_dst: binding.nw_addr,
            tp_dst: if with_ports { binding.tp_port } else { 0 },
        }
    }
}

/// What the reverse entry must restore: the pre-rewrite destination for
/// DNAT, the pre-rewrite source for SNAT.
fn reverse_binding(flow: &FlowMatch, dnat: bool) -> NatBinding {
    if dnat {
        NatBinding {
            nw_addr: flow.nw_dst,
            tp_port: flow.tp_dst,
        }
    } else {
        NatBinding {
            nw_addr: flow.nw_src,
            tp_port: flow.tp_src,
        }
    }
}

/// Pick the translated address and port for a new flow.
///
/// Selection is deterministic: the first target's lowest address and
/// lowest port. Flows without transport ports get port 0.
fn select_binding(flow: &FlowMatch, targets: &[NatTarget]) -> NatBinding {
    let target = targets.first().copied().unwrap_or(NatTarget {
        nw_start: flow.nw_dst,
        nw_end: flow.nw_dst,
        tp_start: 0,
        tp_end: 0,
    });
    NatBinding {
        nw_addr: target.nw_start,
        tp_port: if flow.has_transport_ports() {
            target.tp_start
        } else {
            0
        },
    }
}

fn rewrite(flow: &mut FlowMatch, dst: bool, binding: &NatBinding) {
    let with_ports = flow.has_transport_ports();
    if dst {
        flow.nw_dst = binding.nw_addr;
        if with_ports {
            flow.tp_dst = binding.tp_port;
        }
    } else {
        flow.nw_src = binding.nw_addr;
        if with_ports {
            flow.tp_src = binding.tp_port;
        }
    }
}
