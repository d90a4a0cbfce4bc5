//! `CLUSTER NODES` listing parser
//!
//! Each line reads `<id> <host:port[@bus]> <flags> ...`. Only the first two
//! fields are consumed. Lines that cannot be mapped to a port are skipped
//! without affecting the rest of the listing.

use crate::error::ParseSkip;
use crate::types::{NodeIdMap, NodeIdentity};

/// Result of parsing a listing, with the lines that were skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedListing {
    pub ids: NodeIdMap,
    pub skipped: Vec<ParseSkip>,
}

impl ParsedListing {
    /// Identities in ascending port order
    pub fn identities(&self) -> Vec<NodeIdentity> {
        self.ids
            .iter()
            .map(|(port, id)| NodeIdentity {
                port: *port,
                opaque_id: id.clone(),
            })
            .collect()
    }
}

/// Parse a listing into a port to id map, dropping malformed lines
pub fn parse_cluster_nodes(listing: &str) -> NodeIdMap {
    parse_cluster_nodes_verbose(listing).ids
}

/// Parse a listing and keep a record of every skipped line
pub fn parse_cluster_nodes_verbose(listing: &str) -> ParsedListing {
    let mut parsed = ParsedListing::default();

    for (offset, line) in listing.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(identity) => {
                parsed.ids.insert(identity.port, identity.opaque_id);
            }
            Err(reason) => parsed.skipped.push(ParseSkip {
                line_number: offset + 1,
                line: line.to_string(),
                reason,
            }),
        }
    }

    parsed
}

fn parse_line(line: &str) -> Result<NodeIdentity, String> {
    let mut fields = line.split_whitespace();
    let id = fields.next().ok_or_else(|| "empty line".to_string())?;
    let address = fields
        .next()
        .ok_or_else(|| "missing address field".to_string())?;

    let (_host, rest) = address
        .split_once(':')
        .ok_or_else(|| format!("address `{}` has no port", address))?;
    let port_text = rest.split_once('@').map_or(rest, |(port, _bus)| port);

    let port = port_text
        .parse::<u16>()
        .map_err(|e| format!("invalid port `{}`: {}", port_text, e))?;

    Ok(NodeIdentity {
        port,
        opaque_id: id.to_string(),
    })
}
