use serde::{Deserialize, Serialize};

use crate::packet::entity::fmt_ipv4;

/// An address/port block a NAT rule may translate into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatTarget {
    pub nw_start: u32,
    pub nw_end: u32,
    pub tp_start: u16,
    pub tp_end: u16,
}

impl NatTarget {
    pub fn validate(&self) -> Result<(), String> {
        if self.nw_start > self.nw_end {
            return Err(format!(
                "target address range {} > {}",
                fmt_ipv4(self.nw_start),
                fmt_ipv4(self.nw_end)
            ));
        }
        if self.tp_start > self.tp_end {
            return Err(format!(
                "target port range {} > {}",
                self.tp_start, self.tp_end
            ));
        }
        Ok(())
    }
}

/// Which translation table a key belongs to. Forward entries memoise
/// the chosen target for a flow; reverse entries let the return flow
/// undo the rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NatKind {
    DnatForward,
    DnatReverse,
    SnatForward,
    SnatReverse,
}

/// Lookup key into the NAT store, built from the flow's five-tuple as
/// it looks at the point the NAT rule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NatKey {
    pub kind: NatKind,
    pub protocol: u8,
    pub nw_src: u32,
    pub tp_src: u16,
    pub nw_dst: u32,
    pub tp_dst: u16,
}

/// The translated address and port stored under a [`NatKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NatBinding {
    pub nw_addr: u32,
    pub tp_port: u16,
}

/// Flow translation state shared by every NAT rule of a router.
///
/// Lives in the domain rather than behind a secondary port because
/// rules consult and update it mid-evaluation.
pub trait NatStore: Send {
    fn get(&self, key: &NatKey) -> Option<NatBinding>;
    fn put(&mut self, key: NatKey, binding: NatBinding);
}
