//! Routing object naming and payload codec
//!
//! Every published routing object is named
//! `<network>/<sync-marker>/<origin-identity...>/<sequence>`. The payload is
//! a postcard-encoded header followed by a list of typed records. Record
//! kinds this version does not understand are skipped, and bytes following
//! the payload are ignored, so newer peers can extend the format without
//! breaking older ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{DecodeError, EncodeError};
use crate::identity::RouterIdentity;
use crate::name::{Name, NameComponent};
use crate::routing::RoutingEntry;

/// Sync marker used by the reference experiments
pub const DEFAULT_SYNC_MARKER: &str = "ndvrSync";

/// Payload format version written by this codec
pub const PAYLOAD_VERSION: u8 = 1;

/// Oldest payload version this codec accepts
///
/// Newer versions are read through the fields this version knows.
pub const MIN_PAYLOAD_VERSION: u8 = 1;

/// Record kind carrying one [`RoutingEntry`]
pub const RECORD_ROUTING_ENTRY: u16 = 1;

/// One typed record inside a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub kind: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SyncPayload {
    version: u8,
    origin: RouterIdentity,
    sequence: u64,
    records: Vec<Record>,
}

/// Result of decoding a routing object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedObject {
    pub origin: RouterIdentity,
    pub entries: BTreeMap<RouterIdentity, RoutingEntry>,
    pub sequence: u64,
    /// Records of unknown kind that were skipped
    pub skipped_records: usize,
}

/// Maps routing state to names and payload bytes and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCodec {
    sync_prefix: Name,
}

impl NameCodec {
    /// Codec for `network` using the default sync marker
    pub fn new(network: &Name) -> Self {
        Self::with_marker(network, DEFAULT_SYNC_MARKER)
    }

    /// Codec for `network` with a custom sync marker
    pub fn with_marker(network: &Name, marker: &str) -> Self {
        Self {
            sync_prefix: network.clone().append(NameComponent::from(marker)),
        }
    }

    /// `<network>/<sync-marker>`
    pub fn sync_prefix(&self) -> &Name {
        &self.sync_prefix
    }

    /// `<network>/<sync-marker>/<origin>`
    pub fn object_prefix(&self, origin: &RouterIdentity) -> Name {
        self.sync_prefix.clone().append_name(origin.name())
    }

    /// `<network>/<sync-marker>/<origin>/<sequence>`
    pub fn object_name(&self, origin: &RouterIdentity, sequence: u64) -> Name {
        self.object_prefix(origin).append_number(sequence)
    }

    /// Split an object name into origin and sequence number
    pub fn parse_name(&self, name: &Name) -> Result<(RouterIdentity, u64), DecodeError> {
        if !self.sync_prefix.is_prefix_of(name) {
            return Err(DecodeError::WrongPrefix {
                name: name.clone(),
                prefix: self.sync_prefix.clone(),
            });
        }
        if name.len() < self.sync_prefix.len() + 2 {
            return Err(DecodeError::MissingOrigin(name.clone()));
        }
        let sequence = name
            .last()
            .and_then(NameComponent::to_number)
            .ok_or_else(|| DecodeError::BadSequence(name.clone()))?;
        let origin = RouterIdentity::new(name.sub_name(self.sync_prefix.len(), name.len() - 1))
            .map_err(|_| DecodeError::MissingOrigin(name.clone()))?;
        Ok((origin, sequence))
    }

    /// Encode a table (or a subset of it) published by `origin`
    pub fn encode<'a>(
        &self,
        origin: &RouterIdentity,
        entries: impl IntoIterator<Item = &'a RoutingEntry>,
        sequence: u64,
    ) -> Result<(Name, Vec<u8>), EncodeError> {
        let records = entries
            .into_iter()
            .map(|entry| {
                postcard::to_allocvec(entry)
                    .map(|body| Record {
                        kind: RECORD_ROUTING_ENTRY,
                        body,
                    })
                    .map_err(|e| EncodeError(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.encode_records(origin, records, sequence)
    }

    /// Encode pre-built records
    ///
    /// Used directly when emitting record kinds beyond routing entries.
    pub fn encode_records(
        &self,
        origin: &RouterIdentity,
        records: Vec<Record>,
        sequence: u64,
    ) -> Result<(Name, Vec<u8>), EncodeError> {
        let payload = SyncPayload {
            version: PAYLOAD_VERSION,
            origin: origin.clone(),
            sequence,
            records,
        };
        let bytes = postcard::to_allocvec(&payload).map_err(|e| EncodeError(e.to_string()))?;
        Ok((self.object_name(origin, sequence), bytes))
    }

    /// Decode a routing object
    pub fn decode(&self, name: &Name, payload: &[u8]) -> Result<DecodedObject, DecodeError> {
        let (origin, sequence) = self.parse_name(name)?;

        let (header, trailing): (SyncPayload, &[u8]) = postcard::take_from_bytes(payload)
            .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;
        if !trailing.is_empty() {
            trace!(name = %name, trailing = trailing.len(), "Ignoring trailing payload bytes");
        }

        if header.version < MIN_PAYLOAD_VERSION {
            return Err(DecodeError::UnsupportedVersion(header.version));
        }
        if header.version > PAYLOAD_VERSION {
            trace!(name = %name, version = header.version, "Reading newer payload as v1");
        }
        if header.origin != origin {
            return Err(DecodeError::NameMismatch(format!(
                "origin {} in payload, {} in name",
                header.origin, origin
            )));
        }
        if header.sequence != sequence {
            return Err(DecodeError::NameMismatch(format!(
                "sequence {} in payload, {} in name",
                header.sequence, sequence
            )));
        }

        let mut entries = BTreeMap::new();
        let mut skipped_records = 0;
        for record in header.records {
            if record.kind != RECORD_ROUTING_ENTRY {
                skipped_records += 1;
                continue;
            }
            let (entry, _): (RoutingEntry, &[u8]) = postcard::take_from_bytes(&record.body)
                .map_err(|e| DecodeError::MalformedPayload(format!("routing entry: {}", e)))?;
            entries.insert(entry.destination.clone(), entry);
        }

        Ok(DecodedObject {
            origin,
            entries,
            sequence,
            skipped_records,
        })
    }
}
