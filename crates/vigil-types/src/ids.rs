use facet::Facet;
use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

////////////////////////////////////////////////////////////////////////////////////
// Timestamps
////////////////////////////////////////////////////////////////////////////////////

/// First-use monotonic anchor for process-relative timestamps.
/// "Process birth" is defined as the first call to `PTime::now()`.
fn ptime_anchor() -> &'static Instant {
    static PTIME_ANCHOR: OnceLock<Instant> = OnceLock::new();
    PTIME_ANCHOR.get_or_init(Instant::now)
}

/// process start time + N milliseconds
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[facet(transparent)]
pub struct PTime(u64);

impl PTime {
    pub fn now() -> Self {
        let elapsed_ms = ptime_anchor().elapsed().as_millis().min(u64::MAX as u128) as u64;
        Self(elapsed_ms)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}ms", self.0)
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Identifiers
////////////////////////////////////////////////////////////////////////////////////

macro_rules! define_u64_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        display = $prefix:literal
    ) => {
        #[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[facet(transparent)]
        $(#[$meta])*
        pub struct $name(u64);

        impl $name {
            /// The first id handed out by a fresh allocator.
            pub const fn first() -> Self {
                Self(1)
            }

            /// Wraps a raw value. Zero is never a valid id.
            pub fn new(raw: u64) -> Option<Self> {
                if raw == 0 { None } else { Some(Self(raw)) }
            }

            /// The id allocated right after this one.
            pub fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }

            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

define_u64_id!(
    /// Identifies one snapshot within a store. Allocated 1, 2, 3, ... per store.
    SnapshotId,
    display = "#"
);

define_u64_id!(
    /// Identifies one failed async outcome in the unhandled registry.
    OutcomeId,
    display = "outcome#"
);

define_u64_id!(
    /// Identifies one subscriber on a report channel.
    SubscriptionId,
    display = "sub#"
);
