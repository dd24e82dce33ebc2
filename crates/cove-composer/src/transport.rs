use bytes::Bytes;
use futures_util::future::BoxFuture;

use cove_types::api::{MessageAck, SendMessageRequest, UploadTarget};
use cove_types::models::ContentHandle;

use crate::error::{SendError, UploadError};

/// The mutation and upload primitives the composer drives. Implemented by
/// the backing service client; the demo ships a loopback implementation.
pub trait Transport: Send + Sync + 'static {
    /// Issue a short-lived upload target.
    fn issue_upload(&self) -> BoxFuture<'static, Result<UploadTarget, UploadError>>;

    /// Upload bytes to a previously issued target, exchanging them for a
    /// content handle.
    fn upload(
        &self,
        target: UploadTarget,
        name: String,
        mime: String,
        bytes: Bytes,
    ) -> BoxFuture<'static, Result<ContentHandle, UploadError>>;

    /// The send mutation. Resolves on success, rejects on failure; no
    /// automatic retry happens at this layer.
    fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> BoxFuture<'static, Result<MessageAck, SendError>>;
}
