// PHI audit: static scan of every Rust source file for tracing:: calls that
// carry note bodies or patient identifiers. Logs may only name batches,
// facilities and counts.
