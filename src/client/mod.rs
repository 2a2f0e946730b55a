//! Client subsystem.
//!
//! # Data Flow
//! ```text
//! Application
//!     → wrapper.rs (InferenceClient::chat_completion / execute)
//!     → resilience::RetryExecutor
//!     → transport.rs (Transport::send, bounded by the per-attempt timeout)
//!     → result.rs (CallResult with a fixed user-safe message)
//!     → Application
//! ```

pub mod result;
pub mod simulated;
pub mod transport;
pub mod wrapper;

pub use result::{user_message, CallResult};
pub use simulated::{InjectedFailure, SimulatedReply, SimulatedTransport};
pub use transport::{ChatMessage, ChatRequest, Transport, TransportError};
pub use wrapper::{AttemptError, GuardStatus, InferenceClient};
