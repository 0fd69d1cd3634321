//! File and directory calls: listing, search, category info, and the
//! simple mutation endpoints.
//!
//! # Adaptive listing
//! The server may refuse a requested sort order: it answers with the
//! reserved code [`WRONG_ORDER_CODE`] and the order it insists on.
//! [`FileListApi`] consumes that envelope by rewriting its own `o`/`asc`
//! query fields and returning [`Step::Retry`], so the caller re-issues the
//! very same instance. Any other positive code propagates as a hard
//! failure. The call does not bound attempts; the send loop must.

use crate::call::{ApiCall, CallState, JsonObject, Step};
use crate::envelope;
use crate::error::{ApiError, ApiResult};
use crate::types::{
    int_field, int_value, text_field, FileEntry, FileGetResult, FileListResult, PathNode,
    SortOrder, SpaceInfo,
};

const FILES_URL: &str = "https://webapi.115.com/files";
const NATSORT_FILES_URL: &str = "https://aps.115.com/natsort/files.php";
const SEARCH_URL: &str = "https://webapi.115.com/files/search";
const CATEGORY_GET_URL: &str = "https://webapi.115.com/category/get";
const DELETE_URL: &str = "https://webapi.115.com/rb/delete";
const MOVE_URL: &str = "https://webapi.115.com/files/move";
const RENAME_URL: &str = "https://webapi.115.com/files/batch_rename";
const DIR_ADD_URL: &str = "https://webapi.115.com/files/add";
const DIR_ORDER_URL: &str = "https://webapi.115.com/files/order";
const SPACE_INFO_URL: &str = "https://webapi.115.com/files/index_info";

/// Reserved error code: the requested sort order was rejected and the
/// envelope carries the corrected one.
pub const WRONG_ORDER_CODE: i64 = 20130827;

const DEFAULT_LIMIT: usize = 115;

fn extract_rows(obj: &JsonObject, context: &'static str) -> ApiResult<Vec<FileEntry>> {
    let rows = obj
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or(ApiError::decode("data", context))?;
    let mut files = Vec::with_capacity(rows.len());
    for value in rows {
        let row = value
            .as_object()
            .ok_or(ApiError::decode("data", context))?;
        files.push(FileEntry::from_row(row)?);
    }
    Ok(files)
}

fn usize_field(obj: &JsonObject, key: &str) -> usize {
    int_field(obj, key).filter(|v| *v >= 0).unwrap_or(0) as usize
}

/// List a directory's entries, one page per send.
///
/// The instance is reusable: [`set_offset`](Self::set_offset) advances
/// pagination, and the wrong-order handshake mutates the query in place.
pub struct FileListApi {
    state: CallState,
}

impl FileListApi {
    pub fn new(dir_id: &str) -> Self {
        Self::with_window(dir_id, 0, DEFAULT_LIMIT)
    }

    pub fn with_window(dir_id: &str, offset: usize, limit: usize) -> Self {
        let mut state = CallState::default();
        state.query.set("aid", "1");
        state.query.set("cid", dir_id);
        state.query.set("show_dir", "1");
        state.query.set("o", SortOrder::CreateTime.as_wire());
        state.query.set("asc", "1");
        state.query.set("offset", offset.to_string());
        state.query.set("limit", limit.to_string());
        state.query.set("fc_mix", "0");
        state.query.set("natsort", "1");
        state.query.set("format", "json");
        Self { state }
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.state.query.set("offset", offset.to_string());
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.state.query.set("limit", limit.to_string());
    }
}

impl ApiCall for FileListApi {
    type Output = FileListResult;

    // Name ordering is served by a dedicated natural-sort endpoint.
    fn endpoint(&self) -> &str {
        if self.state.query.get("o") == Some("file_name") {
            NATSORT_FILES_URL
        } else {
            FILES_URL
        }
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn classify(&mut self, envelope: &JsonObject) -> ApiResult<Step> {
        if envelope::error_code(envelope) == WRONG_ORDER_CODE {
            let order = envelope
                .get("order")
                .and_then(|v| v.as_str())
                .ok_or(ApiError::decode("order", "order correction"))?;
            let asc = envelope
                .get("is_asc")
                .and_then(int_value)
                .ok_or(ApiError::decode("is_asc", "order correction"))?;
            tracing::debug!(order, asc, "sort order rejected, retrying as directed");
            self.state.query.set("o", order);
            self.state.query.set("asc", asc.to_string());
            return Ok(Step::Retry);
        }
        envelope::classify(envelope)
    }

    fn extract(&mut self, envelope: JsonObject) -> ApiResult<FileListResult> {
        Ok(FileListResult {
            files: extract_rows(&envelope, "listing")?,
            order: text_field(&envelope, "order").unwrap_or_default(),
            is_asc: int_field(&envelope, "is_ac").unwrap_or(0) != 0,
            offset: usize_field(&envelope, "offset"),
            limit: usize_field(&envelope, "limit"),
            count: usize_field(&envelope, "count"),
        })
    }
}

/// Search files by keyword under a directory subtree.
pub struct FileSearchApi {
    state: CallState,
}

impl FileSearchApi {
    pub fn new(keyword: &str, dir_id: &str) -> Self {
        Self::with_window(keyword, dir_id, 0, DEFAULT_LIMIT)
    }

    pub fn with_window(keyword: &str, dir_id: &str, offset: usize, limit: usize) -> Self {
        let mut state = CallState::default();
        state.query.set("aid", "1");
        state.query.set("cid", dir_id);
        state.query.set("search_value", keyword);
        state.query.set("offset", offset.to_string());
        state.query.set("limit", limit.to_string());
        state.query.set("format", "json");
        Self { state }
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.state.query.set("offset", offset.to_string());
    }
}

impl ApiCall for FileSearchApi {
    type Output = FileListResult;

    fn endpoint(&self) -> &str {
        SEARCH_URL
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn extract(&mut self, envelope: JsonObject) -> ApiResult<FileListResult> {
        Ok(FileListResult {
            files: extract_rows(&envelope, "search result")?,
            order: text_field(&envelope, "order").unwrap_or_default(),
            is_asc: int_field(&envelope, "is_ac").unwrap_or(0) != 0,
            offset: usize_field(&envelope, "offset"),
            // Search echoes its window size under a different name.
            limit: usize_field(&envelope, "page_size"),
            count: usize_field(&envelope, "count"),
        })
    }
}

/// Fetch name, pick code and breadcrumb path for one entry.
pub struct FileGetApi {
    state: CallState,
}

impl FileGetApi {
    pub fn new(file_id: &str) -> Self {
        let mut state = CallState::default();
        state.query.set("cid", file_id);
        Self { state }
    }
}

impl ApiCall for FileGetApi {
    type Output = FileGetResult;

    fn endpoint(&self) -> &str {
        CATEGORY_GET_URL
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn extract(&mut self, envelope: JsonObject) -> ApiResult<FileGetResult> {
        let context = "category info";
        let name =
            text_field(&envelope, "file_name").ok_or(ApiError::decode("file_name", context))?;
        let category = int_field(&envelope, "file_category")
            .ok_or(ApiError::decode("file_category", context))?;
        let mut path = Vec::new();
        if let Some(nodes) = envelope.get("paths").and_then(|v| v.as_array()) {
            for node in nodes {
                let node = node
                    .as_object()
                    .ok_or(ApiError::decode("paths", context))?;
                path.push(PathNode {
                    file_id: text_field(node, "file_id")
                        .ok_or(ApiError::decode("file_id", context))?,
                    name: text_field(node, "file_name")
                        .ok_or(ApiError::decode("file_name", context))?,
                });
            }
        }
        Ok(FileGetResult {
            name,
            // Directories may not carry a pick code.
            pickcode: text_field(&envelope, "pick_code").unwrap_or_default(),
            is_dir: category == 0,
            path,
        })
    }
}

/// Delete entries. The server expects the ids as indexed form fields.
pub struct FileDeleteApi {
    state: CallState,
}

impl FileDeleteApi {
    pub fn new<I, S>(file_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = CallState::default();
        for (index, file_id) in file_ids.into_iter().enumerate() {
            state.form.set(format!("fid[{index}]"), file_id.as_ref());
        }
        state.form.set("ignore_warn", "1");
        Self { state }
    }
}

impl ApiCall for FileDeleteApi {
    type Output = bool;

    fn endpoint(&self) -> &str {
        DELETE_URL
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn extract(&mut self, _envelope: JsonObject) -> ApiResult<bool> {
        Ok(true)
    }
}

/// Move entries into a target directory.
pub struct FileMoveApi {
    state: CallState,
}

impl FileMoveApi {
    pub fn new<I, S>(target_dir_id: &str, file_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = CallState::default();
        state.form.set("pid", target_dir_id);
        for (index, file_id) in file_ids.into_iter().enumerate() {
            state.form.set(format!("fid[{index}]"), file_id.as_ref());
        }
        state.form.set("ignore_warn", "1");
        Self { state }
    }
}

impl ApiCall for FileMoveApi {
    type Output = bool;

    fn endpoint(&self) -> &str {
        MOVE_URL
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn extract(&mut self, _envelope: JsonObject) -> ApiResult<bool> {
        Ok(true)
    }
}

/// Rename entries, keyed by file id.
pub struct FileRenameApi {
    state: CallState,
}

impl FileRenameApi {
    pub fn new<I, S, T>(new_names: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut state = CallState::default();
        for (file_id, new_name) in new_names {
            state.form.set(
                format!("files_new_name[{}]", file_id.as_ref()),
                new_name.as_ref(),
            );
        }
        Self { state }
    }
}

impl ApiCall for FileRenameApi {
    type Output = bool;

    fn endpoint(&self) -> &str {
        RENAME_URL
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn extract(&mut self, _envelope: JsonObject) -> ApiResult<bool> {
        Ok(true)
    }
}

/// Create a directory; the result is the new directory's id.
pub struct DirAddApi {
    state: CallState,
}

impl DirAddApi {
    pub fn new(parent_id: &str, dir_name: &str) -> Self {
        let mut state = CallState::default();
        state.form.set("pid", parent_id);
        state.form.set("cname", dir_name);
        Self { state }
    }
}

impl ApiCall for DirAddApi {
    type Output = String;

    fn endpoint(&self) -> &str {
        DIR_ADD_URL
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn extract(&mut self, envelope: JsonObject) -> ApiResult<String> {
        text_field(&envelope, "file_id").ok_or(ApiError::decode("file_id", "directory creation"))
    }
}

/// Persist a directory's sort order on the server.
pub struct DirSortApi {
    state: CallState,
}

impl DirSortApi {
    pub fn new(dir_id: &str, order: SortOrder, is_asc: bool) -> Self {
        let mut state = CallState::default();
        state.form.set("file_id", dir_id);
        state.form.set("user_order", order.as_wire());
        state.form.set("user_asc", if is_asc { "1" } else { "0" });
        state.form.set("fc_mix", "0");
        Self { state }
    }
}

impl ApiCall for DirSortApi {
    type Output = bool;

    fn endpoint(&self) -> &str {
        DIR_ORDER_URL
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn extract(&mut self, _envelope: JsonObject) -> ApiResult<bool> {
        Ok(true)
    }
}

/// Fetch total/remaining/used storage sizes.
pub struct SpaceInfoApi {
    state: CallState,
}

impl SpaceInfoApi {
    pub fn new() -> Self {
        Self {
            state: CallState::default(),
        }
    }
}

impl Default for SpaceInfoApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiCall for SpaceInfoApi {
    type Output = SpaceInfo;

    fn endpoint(&self) -> &str {
        SPACE_INFO_URL
    }

    fn state(&self) -> &CallState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CallState {
        &mut self.state
    }

    fn extract(&mut self, envelope: JsonObject) -> ApiResult<SpaceInfo> {
        let context = "space info";
        let space = envelope
            .get("data")
            .and_then(|v| v.get("space_info"))
            .ok_or(ApiError::decode("space_info", context))?;
        let size = |key: &'static str| -> ApiResult<f64> {
            space
                .get(key)
                .and_then(|v| v.get("size"))
                .and_then(float_value)
                .ok_or(ApiError::decode(key, context))
        };
        Ok(SpaceInfo {
            total: size("all_total")?,
            remain: size("all_remain")?,
            used: size("all_use")?,
        })
    }
}

fn float_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::Outcome;
    use serde_json::json;

    #[test]
    fn list_query_defaults_match_the_wire_contract() {
        let call = FileListApi::with_window("2593", 0, 30);
        let q = &call.state().query;
        assert_eq!(q.get("aid"), Some("1"));
        assert_eq!(q.get("cid"), Some("2593"));
        assert_eq!(q.get("show_dir"), Some("1"));
        assert_eq!(q.get("o"), Some("user_ptime"));
        assert_eq!(q.get("asc"), Some("1"));
        assert_eq!(q.get("offset"), Some("0"));
        assert_eq!(q.get("limit"), Some("30"));
        assert_eq!(q.get("fc_mix"), Some("0"));
        assert_eq!(q.get("natsort"), Some("1"));
        assert_eq!(q.get("format"), Some("json"));
    }

    #[test]
    fn list_endpoint_switches_for_name_ordering() {
        let mut call = FileListApi::new("0");
        assert!(call.url().starts_with("https://webapi.115.com/files?"));

        call.state_mut().query.set("o", "file_name");
        assert!(call.url().starts_with("https://aps.115.com/natsort/files.php?"));
    }

    #[test]
    fn wrong_order_code_mutates_state_and_retries() {
        let mut call = FileListApi::new("0");
        let outcome = call
            .parse(
                br#"{"state":false,"errNo":20130827,"error":"order not allowed","order":"file_size","is_asc":0}"#,
            )
            .unwrap();

        assert_eq!(outcome, Outcome::Retry);
        assert_eq!(call.state().query.get("o"), Some("file_size"));
        assert_eq!(call.state().query.get("asc"), Some("0"));
    }

    #[test]
    fn wrong_order_accepts_string_is_asc() {
        let mut call = FileListApi::new("0");
        let outcome = call
            .parse(br#"{"state":false,"errNo":20130827,"order":"user_utime","is_asc":"1"}"#)
            .unwrap();
        assert_eq!(outcome, Outcome::Retry);
        assert_eq!(call.state().query.get("o"), Some("user_utime"));
        assert_eq!(call.state().query.get("asc"), Some("1"));
    }

    #[test]
    fn other_error_codes_do_not_touch_state() {
        let mut call = FileListApi::new("0");
        let err = call
            .parse(br#"{"state":false,"errNo":990,"order":"file_size","is_asc":0}"#)
            .unwrap_err();

        assert!(matches!(err, ApiError::Api { code: 990, .. }));
        assert_eq!(call.state().query.get("o"), Some("user_ptime"));
        assert_eq!(call.state().query.get("asc"), Some("1"));
    }

    #[test]
    fn success_after_retry_parses_on_the_same_instance() {
        let mut call = FileListApi::new("0");
        let first = call
            .parse(br#"{"state":false,"errNo":20130827,"order":"file_size","is_asc":0}"#)
            .unwrap();
        assert_eq!(first, Outcome::Retry);

        let body = json!({
            "state": true,
            "data": [
                {"cid": "100", "pid": "0", "n": "docs", "pc": "pcdir", "te": 1700000000},
                {"fid": "201", "cid": "0", "n": "a.bin", "pc": "pca",
                 "s": 4096, "sha": "aa", "te": 1700000100}
            ],
            "order": "file_size", "is_ac": 0, "offset": 0, "limit": 115, "count": 2
        });
        let second = call.parse(body.to_string().as_bytes()).unwrap();
        match second {
            Outcome::Done(result) => {
                assert_eq!(result.files.len(), 2);
                assert_eq!(result.order, "file_size");
                assert!(!result.is_asc);
                assert_eq!(result.count, 2);
                assert!(result.files[0].is_dir);
                assert_eq!(result.files[1].size, 4096);
            }
            Outcome::Retry => panic!("expected a parsed window"),
        }
        // Converged state stays put.
        assert_eq!(call.state().query.get("o"), Some("file_size"));
    }

    #[test]
    fn set_offset_rewrites_only_the_offset() {
        let mut call = FileListApi::with_window("0", 0, 50);
        call.set_offset(50);
        assert_eq!(call.state().query.get("offset"), Some("50"));
        assert_eq!(call.state().query.get("limit"), Some("50"));
    }

    #[test]
    fn search_reads_page_size_as_limit() {
        let mut call = FileSearchApi::new("report", "0");
        let body = json!({
            "state": true, "data": [], "order": "user_ptime", "is_ac": 1,
            "offset": 0, "page_size": 20, "count": 0
        });
        match call.parse(body.to_string().as_bytes()).unwrap() {
            Outcome::Done(result) => {
                assert_eq!(result.limit, 20);
                assert!(result.files.is_empty());
            }
            Outcome::Retry => panic!("unexpected retry"),
        }
    }

    #[test]
    fn delete_and_move_index_their_ids() {
        let delete = FileDeleteApi::new(["10", "11"]);
        assert_eq!(delete.state().form.get("fid[0]"), Some("10"));
        assert_eq!(delete.state().form.get("fid[1]"), Some("11"));
        assert_eq!(delete.state().form.get("ignore_warn"), Some("1"));

        let mv = FileMoveApi::new("999", ["10"]);
        assert_eq!(mv.state().form.get("pid"), Some("999"));
        assert_eq!(mv.state().form.get("fid[0]"), Some("10"));
        assert_eq!(mv.url(), MOVE_URL);
    }

    #[test]
    fn rename_keys_forms_by_file_id() {
        let call = FileRenameApi::new([("88001", "new name.txt")]);
        assert_eq!(
            call.state().form.get("files_new_name[88001]"),
            Some("new name.txt")
        );
    }

    #[test]
    fn dir_add_extracts_the_new_id() {
        let mut call = DirAddApi::new("0", "archive");
        assert_eq!(call.state().form.get("pid"), Some("0"));
        assert_eq!(call.state().form.get("cname"), Some("archive"));

        let ok = call
            .parse(br#"{"state":true,"aid":1,"cid":"0","file_id":"777","file_name":"archive"}"#)
            .unwrap();
        assert_eq!(ok, Outcome::Done("777".to_string()));

        let mut call = DirAddApi::new("0", "archive");
        let err = call.parse(br#"{"state":true}"#).unwrap_err();
        assert!(matches!(err, ApiError::Decode { field: "file_id", .. }));
    }

    #[test]
    fn dir_sort_sends_the_wire_order() {
        let call = DirSortApi::new("100", SortOrder::FileSize, false);
        let form = &call.state().form;
        assert_eq!(form.get("file_id"), Some("100"));
        assert_eq!(form.get("user_order"), Some("file_size"));
        assert_eq!(form.get("user_asc"), Some("0"));
        assert_eq!(form.get("fc_mix"), Some("0"));
    }

    #[test]
    fn space_info_keeps_fractional_sizes() {
        let mut call = SpaceInfoApi::new();
        let body = json!({
            "state": true,
            "data": {"space_info": {
                "all_total": {"size": 100.5},
                "all_remain": {"size": 40.2},
                "all_use": {"size": 60.3}
            }}
        });
        match call.parse(body.to_string().as_bytes()).unwrap() {
            Outcome::Done(info) => {
                assert_eq!(info.total, 100.5);
                assert_eq!(info.remain, 40.2);
                assert_eq!(info.used, 60.3);
            }
            Outcome::Retry => panic!("unexpected retry"),
        }
    }

    #[test]
    fn category_get_decodes_breadcrumbs() {
        let mut call = FileGetApi::new("88001");
        let body = json!({
            "count": "1", "file_category": "1", "file_name": "movie.mkv",
            "pick_code": "pcfile1",
            "paths": [
                {"file_id": 0, "file_name": "根目录"},
                {"file_id": "100", "file_name": "docs"}
            ]
        });
        match call.parse(body.to_string().as_bytes()).unwrap() {
            Outcome::Done(result) => {
                assert_eq!(result.name, "movie.mkv");
                assert_eq!(result.pickcode, "pcfile1");
                assert!(!result.is_dir);
                assert_eq!(
                    result.path,
                    vec![
                        PathNode {
                            file_id: "0".to_string(),
                            name: "根目录".to_string()
                        },
                        PathNode {
                            file_id: "100".to_string(),
                            name: "docs".to_string()
                        },
                    ]
                );
            }
            Outcome::Retry => panic!("unexpected retry"),
        }
    }
}
