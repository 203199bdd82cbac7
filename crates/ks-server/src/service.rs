//! The per-client service task (§4.6): pop a request, parse it, consult the
//! decision collaborator, push a response, and keep an eye on liveness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ks_core::wire::{format_response, parse_request};
use ks_core::RingError;

use crate::reactor::ClientRecord;

/// Re-checking `client_connected` on every empty pop would mean a cross-core
/// atomic load every spin iteration; batching it to once per this many
/// empty pops keeps the hot path a pure local spin, per §4.6.
const LIVENESS_RECHECK_INTERVAL: u32 = 10_000;

const RESPONSE_TIMEOUT_MS: i64 = 5_000;

pub(crate) fn run(record: Arc<ClientRecord>, shutdown: Arc<AtomicBool>) {
    record.channel.get().mark_server_ready();
    tracing::info!(slot = record.slot, channel = %record.channel_name, "service task starting");

    let mut since_liveness_check: u32 = 0;
    let mut buf = [0u8; ks_core::SLOT_CAPACITY];

    loop {
        if shutdown.load(Ordering::Acquire) || !record.running.load(Ordering::Acquire) {
            break;
        }

        match record.channel.get().request_ring().try_pop(&mut buf) {
            Ok(len) => {
                since_liveness_check = 0;
                handle_request(&record, &buf[..len.min(buf.len())]);
                record
                    .last_activity_millis
                    .store(now_millis(), Ordering::Relaxed);
            }
            Err(RingError::Empty) => {
                since_liveness_check += 1;
                if since_liveness_check >= LIVENESS_RECHECK_INTERVAL {
                    since_liveness_check = 0;
                    if !record.channel.get().client_connected() {
                        break;
                    }
                }
                std::hint::spin_loop();
            }
            Err(other) => {
                tracing::warn!(error = %other, slot = record.slot, "unexpected ring error");
                break;
            }
        }
    }

    tracing::info!(slot = record.slot, channel = %record.channel_name, "service task exiting");
}

fn handle_request(record: &ClientRecord, raw: &[u8]) {
    let line = String::from_utf8_lossy(raw);
    let request = match parse_request(&line) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, slot = record.slot, "dropping malformed request");
            return;
        }
    };

    let (allowed, reason) = crate::policy::decide(&request.kernel_type);
    let response = format_response(&request.request_id, allowed, reason);

    if let Err(err) = record
        .channel
        .get()
        .response_ring()
        .push_blocking(response.as_bytes(), RESPONSE_TIMEOUT_MS)
    {
        tracing::warn!(error = %err, slot = record.slot, request_id = %request.request_id, "response send timed out");
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}
