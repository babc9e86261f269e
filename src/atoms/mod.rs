// ── Banter Atoms ───────────────────────────────────────────────────────────
// Pure data layer: plain types, the error enum, and the renderer seam.
// Atoms layer rule: no I/O, no side effects, no imports from engine/.

pub mod error;
pub mod traits;
pub mod types;
