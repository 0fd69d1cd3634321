//! Encrypted download-URL call.
//!
//! The download endpoint obfuscates both directions: the form goes out as
//! JSON encrypted under a per-instance key inside a single `data` field,
//! and the success envelope's `data` field holds the encrypted reply. The
//! outer envelope is classified first; a failure never touches the
//! cipher. One key serves the instance for its whole lifetime, retries
//! included.

use crate::call::{ApiCall, CallState, JsonObject};
use crate::cipher::{self, CipherKey};
use crate::error::{ApiError, ApiResult};
use crate::types::{text_field, DownloadInfo};
use url::form_urlencoded;

const DOWNLOAD_URL: &str = "https://proapi.115.com/app/chrome/downurl";

/// Resolve a pick code to a direct download URL.
pub struct DownloadUrlApi {
    state: CallState,
    key: CipherKey,
}

impl DownloadUrlApi {
    pub fn new(pickcode: &str) -> Self {
        let mut state = CallState::default();
        state.form.set("pickcode", pickcode);
        Self {
            state,
            key: cipher::generate_key(),
        }
    }

    /// The instance key, fixed at construction.
    pub fn key(&self) -> &CipherKey {
        &self.key
    }
}

impl ApiCall for DownloadUrlApi {
    type Output = DownloadInfo;

    fn endpoint(&self) -> &str {
        DOWNLOAD_URL
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn payload(&self) -> Option<String> {
        let sealed = cipher::seal_form(&self.key, &self.state.form);
        let mut body = form_urlencoded::Serializer::new(String::new());
        body.append_pair("data", &sealed);
        Some(body.finish())
    }

    fn extract(&mut self, envelope: JsonObject) -> ApiResult<DownloadInfo> {
        let context = "download info";
        let sealed = envelope
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or(ApiError::decode("data", context))?;
        let plain = cipher::decode(&self.key, sealed)?;
        let value: serde_json::Value = serde_json::from_slice(&plain)?;
        let map = value.as_object().ok_or(ApiError::decode("data", context))?;

        for (file_id, info) in map {
            let Some(info) = info.as_object() else {
                continue;
            };
            let url = info
                .get("url")
                .and_then(|v| v.get("url"))
                .and_then(|v| v.as_str());
            if let Some(url) = url {
                return Ok(DownloadInfo {
                    file_id: file_id.clone(),
                    file_name: text_field(info, "file_name").unwrap_or_default(),
                    url: url.to_string(),
                });
            }
        }
        Err(ApiError::decode("url", context))
    }
}
