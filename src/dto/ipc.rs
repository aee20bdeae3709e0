use serde::{Deserialize, Serialize};

use crate::state::groups::GroupCollection;

/// Requests accepted by the persistence gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload")]
pub enum GatewayRequest {
    /// Read the whole collection.
    #[serde(rename = "get-options")]
    GetOptions,
    /// Replace the whole collection.
    #[serde(rename = "save-options")]
    SaveOptions(GroupCollection),
}

impl GatewayRequest {
    /// Channel name of the request, as used in logs.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::GetOptions => "get-options",
            Self::SaveOptions(_) => "save-options",
        }
    }
}

/// Bare status word sent when a request carries no data back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    /// The collection was written.
    Success,
    /// The backend failed to serve the request.
    Error,
}

/// Replies produced by the persistence gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GatewayReply {
    /// Reply to `save-options`, or `error` when `get-options` could not read storage.
    Status(ReplyStatus),
    /// Reply to `get-options`; `{}` when nothing is stored.
    Options(GroupCollection),
}
