// ── Published state store ──
//
// Last-good device state with push-based change notification.

mod state_cache;

pub use state_cache::StateCache;
