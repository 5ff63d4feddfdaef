//! Backend enrichment for incomplete records
//!
//! Runs once harvesting has stopped. Two independent lookup classes:
//! - by message id, for records missing author, timestamp, thread or text
//! - by display name, for records still missing an author id
//!
//! Batches are issued concurrently and a failed batch only costs its own
//! members their enrichment. Values already resolved locally are never
//! overwritten.

mod backend;

pub use backend::{HttpBackend, LookupBackend, LookupError, RemoteIdentity, RemoteMessage};

use crate::config::BackendConfig;
use crate::models::Record;
use crate::utils::{batches, collapse_whitespace, non_empty};
use chrono::{TimeZone, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Counters describing one enrichment pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentReport {
    pub message_batches: usize,
    pub message_batches_failed: usize,
    pub identity_batches: usize,
    pub identity_batches_failed: usize,
    /// Fields filled from message lookups
    pub fields_filled: usize,
    /// Author ids filled from the name table
    pub authors_resolved: usize,
}

#[derive(Default)]
struct MessageLookup {
    messages: HashMap<String, RemoteMessage>,
    batches: usize,
    failed: usize,
}

#[derive(Default)]
struct IdentityLookup {
    table: HashMap<String, String>,
    batches: usize,
    failed: usize,
}

/// Fills missing record fields from a [`LookupBackend`]
pub struct Enricher<B> {
    backend: B,
    message_batch_size: usize,
    identity_batch_size: usize,
}

impl<B: LookupBackend> Enricher<B> {
    pub fn new(backend: B, config: &BackendConfig) -> Self {
        Self {
            backend,
            message_batch_size: config.message_batch_size.max(1),
            identity_batch_size: config.identity_batch_size.max(1),
        }
    }

    /// Enrich records in place
    ///
    /// Message data merges first; the name table then fills any author id
    /// that is still unset.
    pub async fn enrich(&self, records: &mut [Record]) -> EnrichmentReport {
        let ids = message_lookup_ids(records);
        let names = identity_lookup_names(records);

        if ids.is_empty() && names.is_empty() {
            log::debug!("[Enrich] All records complete, nothing to look up");
            return EnrichmentReport::default();
        }

        log::info!(
            "[Enrich] Looking up {} message ids and {} display names",
            ids.len(),
            names.len()
        );

        let (messages, identities) =
            tokio::join!(self.fetch_messages(&ids), self.fetch_identities(&names));

        let fields_filled = merge_messages(records, &messages.messages);
        let authors_resolved = apply_identities(records, &identities.table);

        let report = EnrichmentReport {
            message_batches: messages.batches,
            message_batches_failed: messages.failed,
            identity_batches: identities.batches,
            identity_batches_failed: identities.failed,
            fields_filled,
            authors_resolved,
        };
        log::info!(
            "[Enrich] Filled {} fields and {} author ids ({} of {} batches failed)",
            report.fields_filled,
            report.authors_resolved,
            report.message_batches_failed + report.identity_batches_failed,
            report.message_batches + report.identity_batches
        );
        report
    }

    async fn fetch_messages(&self, ids: &[String]) -> MessageLookup {
        let batched = batches(ids, self.message_batch_size);
        let results = join_all(
            batched
                .iter()
                .map(|batch| self.backend.messages_by_id(batch)),
        )
        .await;

        let mut lookup = MessageLookup {
            batches: batched.len(),
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(messages) => lookup.messages.extend(messages),
                Err(e) => {
                    log::warn!("[Enrich] Failed to fetch message metadata: {}", e);
                    lookup.failed += 1;
                }
            }
        }
        lookup
    }

    async fn fetch_identities(&self, names: &[String]) -> IdentityLookup {
        let batched = batches(names, self.identity_batch_size);
        let results = join_all(
            batched
                .iter()
                .map(|batch| self.backend.identities_by_name(batch)),
        )
        .await;

        let mut lookup = IdentityLookup {
            batches: batched.len(),
            ..Default::default()
        };
        for result in results {
            match result {
                Ok(identities) => {
                    for identity in identities {
                        if let (Some(name), Some(id)) =
                            (non_empty(identity.name), non_empty(identity.id))
                        {
                            lookup.table.insert(name, id);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("[Enrich] Failed to look up display names: {}", e);
                    lookup.failed += 1;
                }
            }
        }
        lookup
    }
}

/// Distinct ids of records the message lookup could complete, in record order
fn message_lookup_ids(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| r.needs_enrichment())
        .filter_map(|r| r.id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Distinct display names of records without an author id, in record order
fn identity_lookup_names(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| r.author_id.is_none())
        .filter_map(|r| r.author_name.clone())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

/// Fill unset fields from message lookups; returns the number of fields filled
fn merge_messages(records: &mut [Record], messages: &HashMap<String, RemoteMessage>) -> usize {
    let mut filled = 0;

    for record in records.iter_mut().filter(|r| r.needs_enrichment()) {
        let Some(remote) = record.id.as_ref().and_then(|id| messages.get(id)) else {
            continue;
        };

        if record.author_id.is_none() {
            if let Some(author_id) = non_empty(remote.author_id.clone()) {
                record.author_id = Some(author_id);
                filled += 1;
            }
        }

        if record.timestamp.is_none() {
            let created = remote
                .created_at
                .filter(|ms| *ms > 0)
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
            if created.is_some() {
                record.timestamp = created;
                filled += 1;
            }
        }

        if record.thread_id.is_none() {
            record.thread_id = non_empty(remote.root_id.clone()).or_else(|| record.id.clone());
            filled += 1;
        }

        if record.text.is_empty() {
            let text = collapse_whitespace(remote.text.as_deref().unwrap_or_default());
            if !text.is_empty() {
                record.text = text;
                filled += 1;
            }
        }
    }

    filled
}

/// Fill missing author ids from the name table; returns the number filled
fn apply_identities(records: &mut [Record], table: &HashMap<String, String>) -> usize {
    let mut resolved = 0;
    for record in records.iter_mut().filter(|r| r.author_id.is_none()) {
        let Some(id) = record.author_name.as_ref().and_then(|name| table.get(name)) else {
            continue;
        };
        record.author_id = Some(id.clone());
        resolved += 1;
    }
    resolved
}
