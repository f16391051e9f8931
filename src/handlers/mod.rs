// handlers/mod.rs - Three-tier handler layout
//
// Public (no session) → Protected (validated session) → Elevated (admin guard).
// The identity gateway runs in front of all three; the tier only decides
// which extractor a handler asks for.
pub mod elevated;
pub mod protected;
pub mod public;
pub mod render;
