//! Debug routing: surface interception and the GPU diagnostic log.

pub mod diagnostics;
pub mod router;

pub use diagnostics::{DIAGNOSTIC_ENTRY_SIZE, DiagnosticLogEntry, decode_entries, format_entries};
pub use router::{DebugMode, DebugSelection, DebugSurfaceRouter, NO_DEBUG_CHANNEL};
