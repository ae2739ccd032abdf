pub mod bootstrap;
pub mod classify;
pub mod credential;
pub mod error;
pub mod model;
pub mod normalize;
pub mod proxy_engine;
pub mod stream_guard;
pub mod upstream_client;
pub mod upstream_request;

pub use credential::{ExtractedCredential, extract_credential, is_valid_credential};
pub use error::{ErrorKind, ProxyError};
pub use model::{ModelSource, ResolvedModel, canonicalize_model, resolve_model};
pub use normalize::{ClientResponseSchema, NormalizedResponse, normalize_response};
pub use proxy_engine::{ChatCall, ModelsCall, ProxyEngine, ProxyResponse};
pub use stream_guard::{StreamGuard, guard_stream};
pub use upstream_client::{UpstreamClient, UpstreamClientConfig, WreqUpstreamClient};
