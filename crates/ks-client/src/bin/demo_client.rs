//! A minimal worker process: connects, sends one request per line read from
//! stdin, prints the response, and disconnects cleanly on EOF or signal.
//!
//! Exists so the end-to-end scenarios in the integration tests (and a
//! human at a terminal) have a real second process to exercise the
//! protocol against — it is not part of the scheduler's core contract.

use std::io::{BufRead, Write};
use std::time::Duration;

use ks_client::Connector;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client_type = std::env::args().nth(1).unwrap_or_else(|| "pytorch".to_string());
    let unique_id = std::env::var("UNIQUE_ID").unwrap_or_else(|_| "demo".to_string());

    let connector = match Connector::connect(&client_type, &unique_id, Duration::from_secs(10)) {
        Ok(c) => c,
        Err(err) => {
            tracing::error!(error = %err, "failed to connect");
            std::process::exit(1);
        }
    };
    tracing::info!(channel = connector.channel_name(), "connected");

    let stdin = std::io::stdin();
    let mut request_id = 0u64;
    for line in stdin.lock().lines() {
        let Ok(kernel_type) = line else { break };
        if kernel_type.is_empty() {
            continue;
        }
        request_id += 1;
        let request = format!("{kernel_type}|req-{request_id}|{client_type}|{unique_id}\n");
        if let Err(err) = connector.send_request(&request, 5_000) {
            tracing::warn!(error = %err, "send failed");
            continue;
        }

        let mut buf = [0u8; 256];
        match connector.recv_response(&mut buf, 5_000) {
            Ok(n) => {
                let response = String::from_utf8_lossy(&buf[..n]);
                let mut stdout = std::io::stdout();
                let _ = writeln!(stdout, "{response}");
            }
            Err(err) => tracing::warn!(error = %err, "recv failed"),
        }
    }
}
