//! Prefix-containment trie.
//!
//! A binary trie over address bits, one subtree per address family, answering
//! one question: is a given prefix covered by any inserted prefix that is
//! equal or less specific? That is the only lookup the merge needs; it does
//! not care *which* entry covers, nor whether a more specific one also would.

use std::net::IpAddr;

use ipnet::IpNet;

#[derive(Debug, Default)]
struct Node {
    /// Index 0 = bit clear, 1 = bit set.
    children: [Option<Box<Node>>; 2],
    /// An inserted prefix ends exactly at this node.
    terminal: bool,
}

/// Containment index over a set of CIDR prefixes.
///
/// v4 and v6 live in separate subtrees and never cross-match; `10.0.0.0/8`
/// does not cover `::ffff:a00:0/104` or any other v6 prefix.
#[derive(Debug, Default)]
pub struct PrefixTrie {
    v4: Node,
    v6: Node,
}

impl PrefixTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a prefix. Host bits below the mask are ignored.
    pub fn insert(&mut self, net: &IpNet) {
        let (bits, len) = key_bits(net);
        let mut node = match net {
            IpNet::V4(_) => &mut self.v4,
            IpNet::V6(_) => &mut self.v6,
        };
        for i in 0..len {
            let b = ((bits >> (127 - i)) & 1) as usize;
            node = node.children[b]
                .get_or_insert_with(|| Box::new(Node::default()))
                .as_mut();
        }
        node.terminal = true;
    }

    /// Does any inserted prefix cover `net` (equal or less specific)?
    ///
    /// Walks the query's network-address bits from the root and reports true
    /// the moment a terminal node is crossed, so an inserted `/8` covers a
    /// queried `/16` beneath it and an inserted `/0` covers everything in its
    /// family. An inserted prefix *more* specific than the query never
    /// matches.
    pub fn covers(&self, net: &IpNet) -> bool {
        let (bits, len) = key_bits(net);
        let mut node = match net {
            IpNet::V4(_) => &self.v4,
            IpNet::V6(_) => &self.v6,
        };
        if node.terminal {
            return true;
        }
        for i in 0..len {
            let b = ((bits >> (127 - i)) & 1) as usize;
            match node.children[b].as_deref() {
                Some(child) => {
                    node = child;
                    if node.terminal {
                        return true;
                    }
                }
                None => return false,
            }
        }
        false
    }
}

/// Network-address bits left-aligned in a u128, plus the mask length.
///
/// v4 addresses occupy the top 32 bits so both families walk identically;
/// family separation is handled by the caller picking the right subtree.
fn key_bits(net: &IpNet) -> (u128, u32) {
    match net.network() {
        IpAddr::V4(a) => (u128::from(u32::from(a)) << 96, u32::from(net.prefix_len())),
        IpAddr::V6(a) => (u128::from(a), u32::from(net.prefix_len())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
