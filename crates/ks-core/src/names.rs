//! Shared-memory segment naming: the one fixed name (the registry) and the
//! reserved legacy names a dynamically-registering worker must not collide
//! with (§9 "Open questions").

/// The registry segment name, namespaced by the invoking user so that two
/// users on the same host don't collide. Falls back to a fixed suffix if
/// `$USER` isn't set (e.g. running under a stripped-down init system).
pub fn registry_segment_name() -> String {
    match std::env::var("USER") {
        Ok(user) if !user.is_empty() => format!("/kernel_scheduler_registry_{user}"),
        _ => "/kernel_scheduler_registry_nouser".to_string(),
    }
}

/// Names reserved by the two legacy single-channel deployment modes this
/// port does not implement (dynamic-registry-only; see DESIGN.md). Kept
/// here purely as collision guards: a worker-chosen channel name must never
/// equal one of these, since a future build that *does* implement legacy
/// mode would otherwise silently misinterpret a dynamic client's segment.
pub const LEGACY_PYTORCH_CHANNEL: &str = "/kernel_scheduler_pytorch";
pub const LEGACY_SGLANG_CHANNEL: &str = "/kernel_scheduler_sglang";

/// Rejects a client-chosen channel segment name that collides with a
/// reserved legacy name.
pub fn validate_channel_name(name: &str) -> Result<(), &'static str> {
    if name == LEGACY_PYTORCH_CHANNEL || name == LEGACY_SGLANG_CHANNEL {
        Err("channel name collides with a reserved legacy segment name")
    } else {
        Ok(())
    }
}
