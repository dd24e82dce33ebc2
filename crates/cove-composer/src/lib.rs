//! Message composition and optimistic send.
//!
//! Captures text, replies, mentions, and file attachments for one target,
//! then turns a submit into an immediately-visible optimistic entry plus an
//! asynchronous upload-then-mutate pipeline. The input clears the instant
//! the user sends, regardless of network latency.

pub mod composer;
pub mod draft;
pub mod error;
pub mod mentions;
pub mod preview;
pub mod transport;

pub use composer::{Composer, EnterOutcome};
pub use draft::{Draft, DraftAttachment};
pub use error::{SendError, UploadError};
pub use mentions::{MentionPopup, mention_query};
pub use preview::PreviewRegistry;
pub use transport::Transport;
