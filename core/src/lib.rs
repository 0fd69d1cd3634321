//! Synchronous request/response core for the 115 cloud drive web API.
//!
//! # Overview
//! Builds plain-data [`HttpRequest`] values and parses raw response bodies
//! without touching the network (host-does-IO pattern). The caller executes
//! the actual HTTP round-trip, making the core fully deterministic and
//! testable.
//!
//! # Design
//! - One [`ApiCall`] value per logical call; it owns the mutable query/form
//!   state and is the unit of in-flight-call state. Sequential reuse
//!   (pagination, retry) is deliberate; concurrent calls each get their own
//!   instance.
//! - `parse` returns [`Outcome::Done`] or [`Outcome::Retry`]: the adaptive
//!   listing protocol rewrites the call's own query and asks the caller's
//!   send loop to re-issue it. The loop supplies the attempt cap.
//! - The response envelope reports errors under inconsistent field names;
//!   [`envelope`] centralizes the classification.
//! - Encrypted calls seal their form under a per-instance [`cipher`] key and
//!   unseal the reply with the same key.

pub mod call;
pub mod cipher;
pub mod download;
pub mod envelope;
pub mod error;
pub mod file;
pub mod http;
pub mod time;
pub mod types;

pub use call::{ApiCall, CallState, JsonObject, Outcome, ParamList, Step};
pub use download::DownloadUrlApi;
pub use error::{ApiError, ApiResult};
pub use file::{
    DirAddApi, DirSortApi, FileDeleteApi, FileGetApi, FileListApi, FileMoveApi, FileRenameApi,
    FileSearchApi, SpaceInfoApi, WRONG_ORDER_CODE,
};
pub use http::{HttpMethod, HttpRequest};
pub use types::{
    DownloadInfo, FileEntry, FileGetResult, FileListResult, PathNode, SortOrder, SpaceInfo,
};
