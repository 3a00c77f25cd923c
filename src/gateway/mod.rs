//! Request-scoped relay pipeline: provider routing, legacy form transcoding,
//! XML rendering and the axum front end tying them together.

pub mod config;
pub mod http;
pub mod obfuscate;
pub mod providers;
pub mod render;
pub mod telemetry;
pub mod transcode;
pub mod upstream;

use thiserror::Error;

pub use config::RelayConfig;
pub use http::{RelayHttpState, router};
pub use obfuscate::{ObfuscateError, deobfuscate_key, obfuscate_key};
pub use providers::{FireworksPath, Provider, ProviderRoute, ProviderTable, UpstreamTarget};
pub use render::{RenderedMessage, render_chat_response, render_chat_xml};
pub use transcode::{ChatCompletionRequest, LegacyFormFields, TranscodeOutcome};
pub use upstream::UpstreamClient;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unsupported provider")]
    UnsupportedProvider { token: String },
    #[error("upstream error: {message}")]
    Upstream { message: String },
    #[error("request body exceeded {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
}
