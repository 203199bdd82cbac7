//! Debug-only assertion macros for the ring's sequence-number invariants.
//!
//! Active only under `debug_assertions`; zero cost in release builds.

/// INV-SEQ-01: occupied slot count never exceeds the ring's usable capacity.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $usable:expr) => {
        debug_assert!(
            $count <= $usable,
            "ring occupancy {} exceeds usable capacity {}",
            $count,
            $usable
        )
    };
}

/// INV-SEQ-02: a sequence counter (`head` or `tail`) only ever advances.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_monotonic;
