//! Typed results and the compact-row entity decoder.
//!
//! Listing and search responses carry entries as JSON objects with short
//! field keys, shaped differently for files and directories. The
//! discriminator is the `fid` key: absent means directory (ids under
//! `cid`/`pid`), present means file (ids under `fid`/`cid`, with size and
//! SHA-1 mandatory). Each variant has its own constructor that validates
//! its mandatory fields before returning a value.

use serde::Serialize;
use serde_json::Value;

use crate::call::JsonObject;
use crate::error::{ApiError, ApiResult};
use crate::time;

/// One file or directory in cloud storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    /// Unique ID of the file/directory.
    pub file_id: String,
    /// ID of the parent directory.
    pub parent_id: String,
    /// Base name.
    pub name: String,
    /// Opaque token for download/playback endpoints.
    pub pickcode: String,
    pub is_dir: bool,
    pub is_hidden: bool,
    /// File size in bytes; 0 for directories.
    pub size: u64,
    /// SHA-1 of file content, hex; never present for directories.
    pub sha1: Option<String>,
    /// Epoch seconds of last update.
    pub update_time: i64,
    pub create_time: Option<i64>,
    pub open_time: Option<i64>,
    pub is_video: bool,
    /// Media duration in seconds for audio/video files.
    pub media_duration: Option<i64>,
    /// Video definition grade for video files.
    pub video_definition: Option<i64>,
}

impl FileEntry {
    /// Decode one compact row from a listing or search response.
    pub fn from_row(row: &JsonObject) -> ApiResult<Self> {
        if row.contains_key("fid") {
            Self::file_from_row(row)
        } else {
            Self::dir_from_row(row)
        }
    }

    fn dir_from_row(row: &JsonObject) -> ApiResult<Self> {
        let context = "directory row";
        Ok(FileEntry {
            file_id: text_field(row, "cid").ok_or(ApiError::decode("cid", context))?,
            parent_id: text_field(row, "pid").ok_or(ApiError::decode("pid", context))?,
            is_dir: true,
            size: 0,
            sha1: None,
            is_video: false,
            media_duration: None,
            video_definition: None,
            ..Self::shared_from_row(row, context)?
        })
    }

    fn file_from_row(row: &JsonObject) -> ApiResult<Self> {
        let context = "file row";
        let size = int_field(row, "s")
            .filter(|s| *s >= 0)
            .ok_or(ApiError::decode("s", context))?;
        Ok(FileEntry {
            file_id: text_field(row, "fid").ok_or(ApiError::decode("fid", context))?,
            parent_id: text_field(row, "cid").ok_or(ApiError::decode("cid", context))?,
            is_dir: false,
            size: size as u64,
            sha1: Some(text_field(row, "sha").ok_or(ApiError::decode("sha", context))?),
            is_video: int_field(row, "iv").unwrap_or(0) == 1,
            media_duration: int_field(row, "play_long"),
            video_definition: int_field(row, "vdi"),
            ..Self::shared_from_row(row, context)?
        })
    }

    // Fields common to both variants; id and file-only fields are filled in
    // by the caller.
    fn shared_from_row(row: &JsonObject, context: &'static str) -> ApiResult<Self> {
        let update_time = row
            .get("te")
            .and_then(time::to_timestamp)
            .or_else(|| row.get("tu").and_then(time::to_timestamp))
            .ok_or(ApiError::decode("te", context))?;
        Ok(FileEntry {
            file_id: String::new(),
            parent_id: String::new(),
            name: text_field(row, "n").ok_or(ApiError::decode("n", context))?,
            pickcode: text_field(row, "pc").ok_or(ApiError::decode("pc", context))?,
            is_dir: false,
            is_hidden: int_field(row, "hdf").unwrap_or(0) != 0,
            size: 0,
            sha1: None,
            update_time,
            create_time: row.get("tp").and_then(time::to_timestamp),
            open_time: row.get("to").and_then(time::to_timestamp),
            is_video: false,
            media_duration: None,
            video_definition: None,
        })
    }
}

/// One window of a listing or search, with the echoed paging state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileListResult {
    pub files: Vec<FileEntry>,
    /// Order mode the server actually applied, as its wire string.
    pub order: String,
    pub is_asc: bool,
    pub offset: usize,
    pub limit: usize,
    /// Total entries across all windows.
    pub count: usize,
}

/// Breadcrumb component of an entry's path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathNode {
    pub file_id: String,
    pub name: String,
}

/// Result of the category-info call.
#[derive(Debug, Clone, Serialize)]
pub struct FileGetResult {
    pub name: String,
    pub pickcode: String,
    pub is_dir: bool,
    pub path: Vec<PathNode>,
}

/// Storage usage. Sizes are reported in fractional units upstream.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SpaceInfo {
    pub total: f64,
    pub remain: f64,
    pub used: f64,
}

/// Resolved download location for one file.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadInfo {
    pub file_id: String,
    pub file_name: String,
    pub url: String,
}

/// Mode to sort files in a directory. Wire strings are closed, one per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortOrder {
    FileName,
    FileSize,
    FileType,
    CreateTime,
    UpdateTime,
    OpenTime,
}

impl SortOrder {
    pub fn as_wire(self) -> &'static str {
        match self {
            SortOrder::FileName => "file_name",
            SortOrder::FileSize => "file_size",
            SortOrder::FileType => "file_type",
            SortOrder::CreateTime => "user_ptime",
            SortOrder::UpdateTime => "user_utime",
            SortOrder::OpenTime => "user_otime",
        }
    }

    pub fn from_wire(wire: &str) -> Option<Self> {
        match wire {
            "file_name" => Some(SortOrder::FileName),
            "file_size" => Some(SortOrder::FileSize),
            "file_type" => Some(SortOrder::FileType),
            "user_ptime" => Some(SortOrder::CreateTime),
            "user_utime" => Some(SortOrder::UpdateTime),
            "user_otime" => Some(SortOrder::OpenTime),
            _ => None,
        }
    }
}

/// Read a field as text, accepting strings and numbers. The vendor mixes
/// both for ids and counters.
pub(crate) fn text_field(obj: &JsonObject, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a field as an integer, accepting numbers and digit strings.
pub(crate) fn int_field(obj: &JsonObject, key: &str) -> Option<i64> {
    int_value(obj.get(key)?)
}

pub(crate) fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> JsonObject {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn row_without_fid_is_a_directory() {
        let entry = FileEntry::from_row(&row(json!({
            "cid": "2593", "pid": "0", "n": "docs", "pc": "pcdir1",
            "hdf": 0, "te": "1638183616"
        })))
        .unwrap();

        assert!(entry.is_dir);
        assert_eq!(entry.file_id, "2593");
        assert_eq!(entry.parent_id, "0");
        assert_eq!(entry.size, 0);
        assert_eq!(entry.sha1, None);
        assert_eq!(entry.update_time, 1638183616);
    }

    #[test]
    fn row_with_fid_is_a_file_with_size_and_digest() {
        let entry = FileEntry::from_row(&row(json!({
            "fid": "88001", "cid": "2593", "n": "movie.mkv", "pc": "pcfile1",
            "s": 734003200, "sha": "da39a3ee5e6b4b0d3255bfef95601890afd80709",
            "hdf": 1, "te": 1638183616, "tp": 1638000000,
            "iv": 1, "play_long": 5400, "vdi": 4
        })))
        .unwrap();

        assert!(!entry.is_dir);
        assert_eq!(entry.file_id, "88001");
        assert_eq!(entry.parent_id, "2593");
        assert_eq!(entry.size, 734003200);
        assert_eq!(
            entry.sha1.as_deref(),
            Some("da39a3ee5e6b4b0d3255bfef95601890afd80709")
        );
        assert!(entry.is_hidden);
        assert!(entry.is_video);
        assert_eq!(entry.media_duration, Some(5400));
        assert_eq!(entry.video_definition, Some(4));
        assert_eq!(entry.create_time, Some(1638000000));
        assert_eq!(entry.open_time, None);
    }

    #[test]
    fn file_row_missing_digest_fails_decode() {
        let err = FileEntry::from_row(&row(json!({
            "fid": "88001", "cid": "2593", "n": "movie.mkv", "pc": "pcfile1",
            "s": 1024, "te": 1638183616
        })))
        .unwrap_err();

        assert!(matches!(
            err,
            ApiError::Decode { field: "sha", .. }
        ));
    }

    #[test]
    fn missing_update_time_fails_but_tu_fallback_works() {
        let base = json!({
            "fid": "1", "cid": "0", "n": "a.txt", "pc": "pc1",
            "s": 1, "sha": "ab"
        });

        let err = FileEntry::from_row(&row(base.clone())).unwrap_err();
        assert!(matches!(err, ApiError::Decode { field: "te", .. }));

        let mut with_tu = row(base);
        with_tu.insert("tu".to_string(), json!(1700000000));
        let entry = FileEntry::from_row(&with_tu).unwrap();
        assert_eq!(entry.update_time, 1700000000);
    }

    #[test]
    fn numeric_strings_are_accepted_for_numbers_and_ids() {
        let entry = FileEntry::from_row(&row(json!({
            "fid": 88002, "cid": 2593, "n": "b.txt", "pc": "pc2",
            "s": "2048", "sha": "cd", "te": "1700000001"
        })))
        .unwrap();

        assert_eq!(entry.file_id, "88002");
        assert_eq!(entry.parent_id, "2593");
        assert_eq!(entry.size, 2048);
    }

    #[test]
    fn absent_hidden_flag_means_visible() {
        let entry = FileEntry::from_row(&row(json!({
            "cid": "1", "pid": "0", "n": "d", "pc": "pc", "te": 1
        })))
        .unwrap();
        assert!(!entry.is_hidden);
    }

    #[test]
    fn sort_order_wire_mapping_round_trips() {
        for order in [
            SortOrder::FileName,
            SortOrder::FileSize,
            SortOrder::FileType,
            SortOrder::CreateTime,
            SortOrder::UpdateTime,
            SortOrder::OpenTime,
        ] {
            assert_eq!(SortOrder::from_wire(order.as_wire()), Some(order));
        }
        assert_eq!(SortOrder::from_wire("user_etime"), None);
    }
}
