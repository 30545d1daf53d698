// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reassembly of `fragment` envelopes.
//!
//! A bridge asked for `fragment_size` splits large envelopes into pieces
//! sharing one `id`, each carrying `num` (0-based) and `total`. Pieces may
//! arrive in any order; once every slot is filled the concatenated `data` is
//! the JSON text of the original envelope. Partial assemblies older than the
//! timeout are evicted on every push.

use crate::error::DecodeError;
use crate::protocol::Fragment;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct PartialMessage {
    slots: Vec<Option<String>>,
    filled: usize,
    bytes: usize,
    started_at: Instant,
}

impl PartialMessage {
    fn new(total: usize, started_at: Instant) -> Self {
        Self {
            slots: vec![None; total],
            filled: 0,
            bytes: 0,
            started_at,
        }
    }

    fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    fn into_text(self) -> String {
        let mut text = String::with_capacity(self.bytes);
        for piece in self.slots.into_iter().flatten() {
            text.push_str(&piece);
        }
        text
    }
}

/// Stateful fragment reassembler with timeout-based eviction.
#[derive(Debug)]
pub struct Reassembler {
    max_message_bytes: usize,
    timeout: Duration,
    buffers: HashMap<String, PartialMessage>,
}

impl Reassembler {
    pub fn new(max_message_bytes: usize, timeout: Duration) -> Self {
        Self {
            max_message_bytes,
            timeout,
            buffers: HashMap::new(),
        }
    }

    /// Process a fragment using the current time.
    ///
    /// Returns `Ok(Some(text))` when the fragment completes its message and
    /// `Ok(None)` while pieces are still missing.
    pub fn push(&mut self, fragment: Fragment) -> Result<Option<String>, DecodeError> {
        self.push_at(fragment, Instant::now())
    }

    /// Process a fragment using an explicit clock reading.
    pub fn push_at(
        &mut self,
        fragment: Fragment,
        now: Instant,
    ) -> Result<Option<String>, DecodeError> {
        self.purge_expired_at(now);

        let total = match fragment.total {
            Some(total) if total > 0 => total as usize,
            _ => {
                return Err(DecodeError::Fragment(format!(
                    "'{}' has no fragment total",
                    fragment.id
                )))
            }
        };
        let num = fragment.num.unwrap_or(0) as usize;
        if num >= total {
            return Err(DecodeError::Fragment(format!(
                "'{}' fragment {} out of range 0..{}",
                fragment.id, num, total
            )));
        }

        let mut partial = match self.buffers.entry(fragment.id.clone()) {
            Entry::Occupied(occupied) if occupied.get().slots.len() != total => {
                occupied.remove();
                return Err(DecodeError::Fragment(format!(
                    "'{}' changed its fragment total to {}",
                    fragment.id, total
                )));
            }
            Entry::Occupied(occupied) => occupied.remove(),
            Entry::Vacant(_) => PartialMessage::new(total, now),
        };

        if partial.slots[num].is_none() {
            partial.bytes += fragment.data.len();
            if partial.bytes > self.max_message_bytes {
                return Err(DecodeError::Fragment(format!(
                    "'{}' exceeds {} bytes",
                    fragment.id, self.max_message_bytes
                )));
            }
            partial.slots[num] = Some(fragment.data);
            partial.filled += 1;
        } else {
            tracing::debug!("duplicate fragment {} of '{}' ignored", num, fragment.id);
        }

        if partial.is_complete() {
            return Ok(Some(partial.into_text()));
        }
        self.buffers.insert(fragment.id, partial);
        Ok(None)
    }

    /// Drop partial messages older than the timeout; returns their ids.
    pub fn purge_expired_at(&mut self, now: Instant) -> Vec<String> {
        let timeout = self.timeout;
        let expired: Vec<String> = self
            .buffers
            .iter()
            .filter(|(_, partial)| now.saturating_duration_since(partial.started_at) >= timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.buffers.remove(id);
            tracing::warn!("fragmented message '{}' timed out, discarded", id);
        }
        expired
    }

    /// Number of partially assembled messages.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }
}
