mod codex;
mod openclaw;
mod parser;
mod paths;
mod pipeline;
mod registry;
mod types;

use tracker_core::SessionSource;

pub use codex::CodexDecoder;
pub use openclaw::OpenClawDecoder;
pub use parser::{DecodeContext, LogDecoder, SessionAccumulator};
pub use paths::{default_codex_home, default_openclaw_home};
pub use pipeline::{DEFAULT_RETENTION_DAYS, IngestOptions, ingest_sessions};
pub use registry::{Registry, RegistryLoad, load_registry};
pub use types::{IngestError, IngestIssue, IngestStats, Result};

pub fn decoder_for(source: SessionSource) -> &'static dyn LogDecoder {
    match source {
        SessionSource::OpenClaw => &OpenClawDecoder,
        SessionSource::Codex => &CodexDecoder,
    }
}
