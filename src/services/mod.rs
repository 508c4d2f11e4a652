//! Webhook authentication and command dispatch

pub mod hook;
pub mod launcher;
pub mod payload;
pub mod resolver;
pub mod signature;

pub use hook::{DispatchOutcome, HookService, SIGNATURE_HEADER};
pub use launcher::{LaunchError, ProcessLauncher};
pub use payload::{extract_push_event, PayloadError, PushEvent};
pub use resolver::CommandResolver;
pub use signature::{parse_signature_header, verify_signature, HookVerifier};
