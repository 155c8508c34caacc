//! Load-balanced dispatch of embed/generate calls.
//!
//! Each logical request tries the best eligible instance first and fails over
//! sequentially to the next-best *distinct* instance, never exceeding `max_attempts`.
//! Every attempt feeds its latency or failure back into the [`InstanceRegistry`].
//!
//! [`InstanceRegistry`]: crate::registry::InstanceRegistry

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod interceptor;
pub mod types;


pub use config::DispatchConfig;
pub use dispatcher::{Dispatcher, validate_embedding};
pub use error::{AttemptError, DispatchError, InterceptorError};
pub use interceptor::{
    AttemptInfo, AuthInterceptor, DispatchInterceptor, REQUEST_ID_HEADER, RefreshingTokenProvider,
    RequestIdInterceptor, StaticTokenProvider, TokenProvider,
};
pub use types::{AttemptRecord, DispatchOutput, DispatchPayload, DispatchRequest, DispatchResult};
