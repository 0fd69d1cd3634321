//! In-memory mock of the 115 web API, used by the core's integration tests.
//!
//! Speaks the real wire shapes: JSON envelopes with a `state` flag and
//! vendor error codes, compact listing rows, urlencoded form bodies, and
//! the encrypted `data` field of the download endpoint. Every directory
//! carries an enforced sort order; a listing that asks for anything else is
//! rejected with the wrong-order code and the corrected order, exactly like
//! the production server.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, RawForm, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use uuid::Uuid;

use drive115_core::cipher;
use drive115_core::types::SortOrder;
use drive115_core::WRONG_ORDER_CODE;

const ROOT_ID: &str = "0";
const TOTAL_SPACE: f64 = 1_099_511_627_776.5;
const DEFAULT_LIMIT: usize = 115;

/// One file or directory node.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub pickcode: String,
    pub is_dir: bool,
    pub size: u64,
    pub sha1: String,
    pub hidden: bool,
    pub update_time: i64,
    pub create_time: i64,
    pub is_video: bool,
    pub media_duration: Option<i64>,
    pub video_definition: Option<i64>,
}

impl Node {
    fn dir(id: &str, parent_id: &str, name: &str, pickcode: &str, created: i64) -> Self {
        Node {
            id: id.to_string(),
            parent_id: parent_id.to_string(),
            name: name.to_string(),
            pickcode: pickcode.to_string(),
            is_dir: true,
            size: 0,
            sha1: String::new(),
            hidden: false,
            update_time: created + 30,
            create_time: created,
            is_video: false,
            media_duration: None,
            video_definition: None,
        }
    }
}

/// The in-memory drive: node tree plus per-directory enforced sort orders.
pub struct Drive {
    nodes: HashMap<String, Node>,
    orders: HashMap<String, (SortOrder, bool)>,
    next_id: u64,
}

impl Drive {
    /// A fixed tree: `docs/` with twelve files, an empty `pics/`, and one
    /// video at the root.
    pub fn seeded() -> Self {
        let mut nodes = HashMap::new();
        let mut insert = |node: Node| {
            nodes.insert(node.id.clone(), node);
        };

        insert(Node::dir(ROOT_ID, "", "根目录", "", 1_699_000_000));
        insert(Node::dir("100", ROOT_ID, "docs", "pcdir100", 1_699_900_000));
        insert(Node::dir("101", ROOT_ID, "pics", "pcdir101", 1_699_910_000));

        for i in 1..=12u64 {
            let created = 1_700_000_000 + (i as i64) * 60;
            insert(Node {
                id: format!("{}", 200 + i),
                parent_id: "100".to_string(),
                name: format!("doc-{i:02}.txt"),
                pickcode: format!("pcdoc{i:02}"),
                is_dir: false,
                size: i * 1024,
                sha1: format!("{:040x}", 3500 + i),
                hidden: i == 12,
                update_time: created + 30,
                create_time: created,
                is_video: false,
                media_duration: None,
                video_definition: None,
            });
        }

        insert(Node {
            id: "301".to_string(),
            parent_id: ROOT_ID.to_string(),
            name: "clip.mp4".to_string(),
            pickcode: "pcclip01".to_string(),
            is_dir: false,
            size: 734_003_200,
            sha1: format!("{:040x}", 0xc11f),
            hidden: false,
            update_time: 1_700_100_030,
            create_time: 1_700_100_000,
            is_video: true,
            media_duration: Some(5400),
            video_definition: Some(4),
        });

        Drive {
            nodes,
            orders: HashMap::new(),
            next_id: 1000,
        }
    }

    fn order_for(&self, dir_id: &str) -> (SortOrder, bool) {
        self.orders
            .get(dir_id)
            .copied()
            .unwrap_or((SortOrder::CreateTime, true))
    }

    fn children(&self, dir_id: &str) -> Vec<Node> {
        self.nodes
            .values()
            .filter(|n| n.parent_id == dir_id && n.id != ROOT_ID)
            .cloned()
            .collect()
    }

    fn remove_recursive(&mut self, id: &str) {
        let child_ids: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.parent_id == id && n.id != ROOT_ID)
            .map(|n| n.id.clone())
            .collect();
        for child in child_ids {
            self.remove_recursive(&child);
        }
        self.nodes.remove(id);
    }

    fn is_descendant(&self, id: &str, ancestor: &str) -> bool {
        if ancestor == ROOT_ID {
            return id != ROOT_ID;
        }
        let mut current = id;
        while let Some(node) = self.nodes.get(current) {
            if node.parent_id == ancestor {
                return true;
            }
            if node.parent_id.is_empty() {
                return false;
            }
            current = &node.parent_id;
        }
        false
    }

    /// Breadcrumbs from the root down to `id`'s parent, excluding `id`.
    fn ancestors(&self, id: &str) -> Vec<(String, String)> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(id).map(|n| n.parent_id.clone());
        while let Some(parent_id) = current {
            match self.nodes.get(&parent_id) {
                Some(parent) => {
                    chain.push((parent.id.clone(), parent.name.clone()));
                    current = if parent.parent_id.is_empty() {
                        None
                    } else {
                        Some(parent.parent_id.clone())
                    };
                }
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    fn alloc_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }
}

pub type SharedDrive = Arc<RwLock<Drive>>;

pub fn app() -> Router {
    app_with(Drive::seeded())
}

pub fn app_with(drive: Drive) -> Router {
    let state: SharedDrive = Arc::new(RwLock::new(drive));
    Router::new()
        .route("/files", get(list_files))
        .route("/natsort/files.php", get(list_files))
        .route("/files/search", get(search_files))
        .route("/category/get", get(category_get))
        .route("/rb/delete", post(delete_files))
        .route("/files/move", post(move_files))
        .route("/files/batch_rename", post(rename_files))
        .route("/files/add", post(add_dir))
        .route("/files/order", post(set_order))
        .route("/files/index_info", get(space_info))
        .route("/app/chrome/downurl", post(download_url))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn node_row(node: &Node) -> Value {
    let hdf = if node.hidden { 1 } else { 0 };
    if node.is_dir {
        json!({
            "cid": node.id,
            "pid": node.parent_id,
            "n": node.name,
            "pc": node.pickcode,
            "hdf": hdf,
            "te": node.update_time,
            "tp": node.create_time,
        })
    } else {
        let mut row = json!({
            "fid": node.id,
            "cid": node.parent_id,
            "n": node.name,
            "pc": node.pickcode,
            "s": node.size,
            "sha": node.sha1,
            "hdf": hdf,
            "te": node.update_time,
            "tp": node.create_time,
            "iv": if node.is_video { 1 } else { 0 },
        });
        if let Some(duration) = node.media_duration {
            row["play_long"] = json!(duration);
        }
        if let Some(definition) = node.video_definition {
            row["vdi"] = json!(definition);
        }
        row
    }
}

fn sort_nodes(nodes: &mut [Node], order: SortOrder, asc: bool) {
    nodes.sort_by(|a, b| {
        // Directories list before files while fc_mix is off.
        b.is_dir.cmp(&a.is_dir).then_with(|| {
            let cmp = match order {
                SortOrder::FileName => a.name.cmp(&b.name),
                SortOrder::FileSize => a.size.cmp(&b.size),
                SortOrder::FileType => extension(&a.name).cmp(extension(&b.name)),
                SortOrder::CreateTime => a.create_time.cmp(&b.create_time),
                SortOrder::UpdateTime | SortOrder::OpenTime => {
                    a.update_time.cmp(&b.update_time)
                }
            }
            .then_with(|| a.id.cmp(&b.id));
            if asc {
                cmp
            } else {
                cmp.reverse()
            }
        })
    });
}

fn extension(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

fn form_pairs(bytes: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(bytes)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn param_usize(params: &HashMap<String, String>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

async fn list_files(
    State(state): State<SharedDrive>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let drive = state.read().await;
    let cid = params.get("cid").map(String::as_str).unwrap_or(ROOT_ID);
    let (order, asc) = drive.order_for(cid);

    let requested_order = params.get("o").map(String::as_str).unwrap_or("user_ptime");
    let requested_asc = params.get("asc").map(String::as_str).unwrap_or("1") == "1";
    if requested_order != order.as_wire() || requested_asc != asc {
        tracing::debug!(cid, requested_order, "rejecting listing order");
        return Json(json!({
            "state": false,
            "errNo": WRONG_ORDER_CODE,
            "error": "order not allowed",
            "order": order.as_wire(),
            "is_asc": if asc { 1 } else { 0 },
        }));
    }

    let offset = param_usize(&params, "offset", 0);
    let limit = param_usize(&params, "limit", DEFAULT_LIMIT);
    let mut children = drive.children(cid);
    sort_nodes(&mut children, order, asc);
    let count = children.len();
    let rows: Vec<Value> = children
        .iter()
        .skip(offset)
        .take(limit)
        .map(node_row)
        .collect();

    Json(json!({
        "state": true,
        "data": rows,
        "order": order.as_wire(),
        "is_ac": if asc { 1 } else { 0 },
        "offset": offset,
        "limit": limit,
        "count": count,
    }))
}

async fn search_files(
    State(state): State<SharedDrive>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let drive = state.read().await;
    let cid = params.get("cid").map(String::as_str).unwrap_or(ROOT_ID);
    let keyword = params
        .get("search_value")
        .map(String::as_str)
        .unwrap_or("");
    let offset = param_usize(&params, "offset", 0);
    let limit = param_usize(&params, "limit", DEFAULT_LIMIT);

    let mut matches: Vec<Node> = drive
        .nodes
        .values()
        .filter(|n| {
            n.id != ROOT_ID && n.name.contains(keyword) && drive.is_descendant(&n.id, cid)
        })
        .cloned()
        .collect();
    sort_nodes(&mut matches, SortOrder::CreateTime, true);
    let count = matches.len();
    let rows: Vec<Value> = matches
        .iter()
        .skip(offset)
        .take(limit)
        .map(node_row)
        .collect();

    Json(json!({
        "state": true,
        "data": rows,
        "order": "user_ptime",
        "is_ac": 1,
        "offset": offset,
        "page_size": limit,
        "count": count,
    }))
}

async fn category_get(
    State(state): State<SharedDrive>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let drive = state.read().await;
    let cid = params.get("cid").map(String::as_str).unwrap_or("");
    let Some(node) = drive.nodes.get(cid) else {
        return Json(json!({"state": false, "errno": 50015, "error": "not found"}));
    };

    let paths: Vec<Value> = drive
        .ancestors(cid)
        .into_iter()
        .map(|(file_id, file_name)| json!({"file_id": file_id, "file_name": file_name}))
        .collect();

    // The production endpoint answers without a `state` field.
    Json(json!({
        "count": drive.children(cid).len().to_string(),
        "file_category": if node.is_dir { "0" } else { "1" },
        "file_name": node.name,
        "pick_code": node.pickcode,
        "size": node.size.to_string(),
        "paths": paths,
    }))
}

async fn delete_files(State(state): State<SharedDrive>, RawForm(form): RawForm) -> Json<Value> {
    let mut drive = state.write().await;
    let mut removed = 0usize;
    for (key, value) in form_pairs(&form) {
        if key.starts_with("fid[") && drive.nodes.contains_key(&value) {
            drive.remove_recursive(&value);
            removed += 1;
        }
    }
    if removed == 0 {
        return Json(json!({"state": false, "errno": 990, "error": "nothing to delete"}));
    }
    Json(json!({"state": true}))
}

async fn move_files(State(state): State<SharedDrive>, RawForm(form): RawForm) -> Json<Value> {
    let mut drive = state.write().await;
    let pairs = form_pairs(&form);
    let Some(target) = pairs
        .iter()
        .find(|(k, _)| k == "pid")
        .map(|(_, v)| v.clone())
    else {
        return Json(json!({"state": false, "errno": 990, "error": "missing pid"}));
    };
    if !drive.nodes.get(&target).is_some_and(|n| n.is_dir) {
        return Json(json!({"state": false, "errno": 990, "error": "bad target"}));
    }
    for (key, value) in pairs {
        if key.starts_with("fid[") {
            if let Some(node) = drive.nodes.get_mut(&value) {
                node.parent_id = target.clone();
            }
        }
    }
    Json(json!({"state": true}))
}

async fn rename_files(State(state): State<SharedDrive>, RawForm(form): RawForm) -> Json<Value> {
    let mut drive = state.write().await;
    for (key, value) in form_pairs(&form) {
        let Some(id) = key
            .strip_prefix("files_new_name[")
            .and_then(|k| k.strip_suffix(']'))
        else {
            continue;
        };
        if let Some(node) = drive.nodes.get_mut(id) {
            node.name = value;
        }
    }
    Json(json!({"state": true}))
}

async fn add_dir(State(state): State<SharedDrive>, RawForm(form): RawForm) -> Json<Value> {
    let mut drive = state.write().await;
    let pairs = form_pairs(&form);
    let parent = pairs
        .iter()
        .find(|(k, _)| k == "pid")
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| ROOT_ID.to_string());
    let Some(name) = pairs
        .iter()
        .find(|(k, _)| k == "cname")
        .map(|(_, v)| v.clone())
    else {
        return Json(json!({"state": false, "errno": 990, "error": "missing cname"}));
    };
    if !drive.nodes.get(&parent).is_some_and(|n| n.is_dir) {
        return Json(json!({"state": false, "errno": 990, "error": "bad parent"}));
    }

    let id = drive.alloc_id();
    let pickcode = Uuid::new_v4().simple().to_string();
    let node = Node::dir(&id, &parent, &name, &pickcode, 1_700_200_000);
    drive.nodes.insert(id.clone(), node);

    Json(json!({
        "state": true,
        "aid": 1,
        "cid": parent,
        "cname": name,
        "file_id": id,
        "file_name": name,
    }))
}

async fn set_order(State(state): State<SharedDrive>, RawForm(form): RawForm) -> Json<Value> {
    let mut drive = state.write().await;
    let pairs = form_pairs(&form);
    let find = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };

    let Some(dir_id) = find("file_id") else {
        return Json(json!({"state": false, "errno": 990, "error": "missing file_id"}));
    };
    let Some(order) = find("user_order").as_deref().and_then(SortOrder::from_wire) else {
        return Json(json!({"state": false, "errcode": 1001, "error": "unsupported order"}));
    };
    let asc = find("user_asc").as_deref() == Some("1");
    drive.orders.insert(dir_id, (order, asc));
    Json(json!({"state": true}))
}

async fn space_info(State(state): State<SharedDrive>) -> Json<Value> {
    let drive = state.read().await;
    let used: f64 = drive
        .nodes
        .values()
        .filter(|n| !n.is_dir)
        .map(|n| n.size as f64)
        .sum();
    let remain = TOTAL_SPACE - used;
    Json(json!({
        "state": true,
        "data": {
            "space_info": {
                "all_total": {"size": TOTAL_SPACE},
                "all_remain": {"size": remain},
                "all_use": {"size": used},
            }
        }
    }))
}

async fn download_url(State(state): State<SharedDrive>, RawForm(form): RawForm) -> Json<Value> {
    let drive = state.read().await;
    let Some(sealed) = form_pairs(&form)
        .into_iter()
        .find(|(k, _)| k == "data")
        .map(|(_, v)| v)
    else {
        return Json(json!({"state": false, "errno": 50003, "error": "missing data"}));
    };

    let Ok(key) = cipher::recover_key(&sealed) else {
        return Json(json!({"state": false, "errno": 50003, "error": "bad data"}));
    };
    let request: Value = match cipher::decode(&key, &sealed)
        .ok()
        .and_then(|plain| serde_json::from_slice(&plain).ok())
    {
        Some(value) => value,
        None => return Json(json!({"state": false, "errno": 50003, "error": "bad data"})),
    };
    let pickcode = request
        .get("pickcode")
        .and_then(Value::as_str)
        .unwrap_or("");

    let Some(node) = drive
        .nodes
        .values()
        .find(|n| !n.is_dir && n.pickcode == pickcode)
    else {
        return Json(json!({"state": false, "errno": 50028, "error": "file not found"}));
    };

    // Reply is keyed by file id.
    let mut entries = serde_json::Map::new();
    entries.insert(
        node.id.clone(),
        json!({
            "file_name": node.name,
            "file_size": node.size,
            "pick_code": node.pickcode,
            "url": {"url": format!("https://cdn.mock115.local/{}/{}", node.id, node.name)},
        }),
    );
    let reply = Value::Object(entries);
    Json(json!({"state": true, "data": cipher::encode(&key, &reply.to_string())}))
}
