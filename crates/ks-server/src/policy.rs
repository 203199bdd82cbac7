//! The admit/deny decision collaborator. Out of scope per §1: the real
//! policy is an external component; this stub always admits, matching the
//! source's own stubbed behavior.

/// Decides whether `kernel_type` may proceed. Always returns `(true,
/// "OK")` — see DESIGN.md for why `source_tag`/`unique_id` are not
/// threaded through to this function (§9 open question, decided).
pub fn decide(_kernel_type: &str) -> (bool, &'static str) {
    (true, "OK")
}
