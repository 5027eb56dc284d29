use crate::application::ports::backend::{BackendClient, RealtimeStream};
use crate::domain::entities::{AuthResponse, Fields, RealtimeEvent, Record, RecordPage};
use crate::domain::value_objects::{
    AuthToken, CollectionName, ListQuery, RealtimeAction, RecordId, SubscriptionTopic,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{json, Value};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

const ID_LENGTH: usize = 15;
const TOKEN_TTL_HOURS: i64 = 24;
const BROADCAST_CAPACITY: usize = 256;

/// 失敗注入・呼び出し回数の対象となる操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    List,
    Get,
    Create,
    Update,
    Delete,
    Subscribe,
    Auth,
}

#[derive(Default)]
struct Store {
    collections: HashMap<CollectionName, Vec<Record>>,
    passwords: HashMap<RecordId, String>,
    tokens: HashMap<String, RecordId>,
}

struct Server {
    store: RwLock<Store>,
    channels: Mutex<HashMap<CollectionName, broadcast::Sender<RealtimeEvent>>>,
    failures: Mutex<VecDeque<(BackendOp, AppError)>>,
    calls: Mutex<HashMap<BackendOp, usize>>,
    write_gate: Arc<RwLock<()>>,
    subscribers: Arc<AtomicUsize>,
    auth_collection: CollectionName,
}

/// プロセス内で完結するバックエンド。複数クライアントが同じサーバー状態を共有できる。
#[derive(Clone)]
pub struct InMemoryBackend {
    server: Arc<Server>,
    token: Arc<RwLock<Option<AuthToken>>>,
}

/// `pause_writes` が返すラッチ。drop するまで書き込み系の操作が待たされる。
pub struct WritePause {
    _guard: OwnedRwLockWriteGuard<()>,
}

impl WritePause {
    pub fn release(self) {}
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            server: Arc::new(Server {
                store: RwLock::new(Store::default()),
                channels: Mutex::new(HashMap::new()),
                failures: Mutex::new(VecDeque::new()),
                calls: Mutex::new(HashMap::new()),
                write_gate: Arc::new(RwLock::new(())),
                subscribers: Arc::new(AtomicUsize::new(0)),
                auth_collection: CollectionName::users(),
            }),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// 同じサーバー状態を共有する別クライアント（トークンは独立）
    pub fn connect_client(&self) -> Self {
        Self {
            server: Arc::clone(&self.server),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// 次の `op` 呼び出しを `error` で失敗させる
    pub fn fail_next(&self, op: BackendOp, error: AppError) {
        if let Ok(mut failures) = self.server.failures.lock() {
            failures.push_back((op, error));
        }
    }

    pub fn calls(&self, op: BackendOp) -> usize {
        self.server
            .calls
            .lock()
            .map(|calls| calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.server.subscribers.load(Ordering::SeqCst)
    }

    /// 書き込み系の操作（create / update / delete）を保留させる
    pub async fn pause_writes(&self) -> WritePause {
        WritePause {
            _guard: Arc::clone(&self.server.write_gate).write_owned().await,
        }
    }

    /// 認証ユーザーを直接登録する
    pub async fn register_user(&self, email: &str, password: &str) -> Result<Record, AppError> {
        let mut fields = Fields::new();
        fields.insert("email".into(), Value::String(email.to_string()));
        fields.insert("password".into(), Value::String(password.to_string()));
        fields.insert(
            "passwordConfirm".into(),
            Value::String(password.to_string()),
        );
        let mut store = self.server.store.write().await;
        self.insert_user(&mut store, fields)
    }

    /// 外部の書き込みとしてレコードを差し込む（楽観的更新を経由しない）
    pub async fn seed(&self, collection: &CollectionName, fields: Fields) -> Record {
        let record = new_record(collection, fields);
        let mut store = self.server.store.write().await;
        store
            .collections
            .entry(collection.clone())
            .or_default()
            .push(record.clone());
        record
    }

    pub async fn records(&self, collection: &CollectionName) -> Vec<Record> {
        let store = self.server.store.read().await;
        store
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn record_call(&self, op: BackendOp) -> Result<(), AppError> {
        if let Ok(mut calls) = self.server.calls.lock() {
            *calls.entry(op).or_insert(0) += 1;
        }
        let injected = self.server.failures.lock().ok().and_then(|mut failures| {
            let index = failures.iter().position(|(failing, _)| *failing == op)?;
            failures.remove(index)
        });
        match injected {
            Some((_, error)) => Err(error),
            None => Ok(()),
        }
    }

    fn channel(&self, collection: &CollectionName) -> broadcast::Sender<RealtimeEvent> {
        let mut channels = match self.server.channels.lock() {
            Ok(channels) => channels,
            Err(poisoned) => poisoned.into_inner(),
        };
        channels
            .entry(collection.clone())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .clone()
    }

    fn publish(&self, action: RealtimeAction, collection: &CollectionName, record: &Record) {
        // 購読者がいない場合の送信エラーは無視する
        let _ = self.channel(collection).send(RealtimeEvent::new(
            action,
            record.clone(),
            collection.clone(),
        ));
    }

    fn insert_user(&self, store: &mut Store, mut fields: Fields) -> Result<Record, AppError> {
        let email = fields
            .get("email")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let password = take_string(&mut fields, "password");
        let confirm = take_string(&mut fields, "passwordConfirm");
        let users = store
            .collections
            .entry(self.server.auth_collection.clone())
            .or_default();
        let taken = users.iter().any(|user| user.get_str("email") == Some(email.as_str()));
        if !email.contains('@') || password.len() < 8 || password != confirm || taken {
            return Err(AppError::Backend {
                status: 400,
                message: "Failed to create record.".to_string(),
            });
        }
        fields.insert("email".into(), Value::String(email));
        fields
            .entry("verified".to_string())
            .or_insert(Value::Bool(false));
        let record = new_record(&self.server.auth_collection, fields);
        users.push(record.clone());
        store.passwords.insert(record.id.clone(), password);
        Ok(record)
    }

    fn issue_token(store: &mut Store, user_id: &RecordId) -> Result<AuthToken, AppError> {
        let exp = (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            json!({ "id": user_id.as_str(), "type": "auth", "exp": exp }).to_string(),
        );
        let signature: String = random_alnum(32);
        let token = AuthToken::new(format!("{header}.{payload}.{signature}"))?;
        store
            .tokens
            .insert(token.as_str().to_string(), user_id.clone());
        Ok(token)
    }

    async fn write_permit(&self) -> tokio::sync::OwnedRwLockReadGuard<()> {
        Arc::clone(&self.server.write_gate).read_owned().await
    }
}

fn random_alnum(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

fn new_record(collection: &CollectionName, fields: Fields) -> Record {
    let id = RecordId::new(random_alnum(ID_LENGTH)).unwrap_or_else(|_| RecordId::placeholder());
    let mut record = Record::new(id, fields);
    record.collection_name = Some(collection.to_string());
    record
}

fn take_string(fields: &mut Fields, key: &str) -> String {
    fields
        .remove(key)
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn not_found() -> AppError {
    AppError::NotFound("The requested resource wasn't found.".to_string())
}

fn field_value(record: &Record, field: &str) -> Value {
    match field {
        "id" => Value::String(record.id.to_string()),
        "created" => Value::String(record.created.to_rfc3339()),
        "updated" => Value::String(record.updated.to_rfc3339()),
        other => record.fields.get(other).cloned().unwrap_or(Value::Null),
    }
}

fn compare_values(a: &Value, b: &Value) -> CmpOrdering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => CmpOrdering::Equal,
        (Value::Null, _) => CmpOrdering::Less,
        (_, Value::Null) => CmpOrdering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_records(records: &mut [Record], sort: &str) {
    let fields: Vec<(&str, bool)> = sort
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| match field.strip_prefix('-') {
            Some(name) => (name, true),
            None => (field.trim_start_matches('+'), false),
        })
        .collect();
    records.sort_by(|a, b| {
        for (field, descending) in &fields {
            let ordering = compare_values(&field_value(a, field), &field_value(b, field));
            let ordering = if *descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != CmpOrdering::Equal {
                return ordering;
            }
        }
        CmpOrdering::Equal
    });
}

/// `field ~ "text"`（部分一致）と `field = value`（完全一致）だけを解釈する
fn matches_filter(record: &Record, filter: &str) -> Result<bool, AppError> {
    let (field, op, raw) = if let Some((field, raw)) = filter.split_once('~') {
        (field.trim(), '~', raw.trim())
    } else if let Some((field, raw)) = filter.split_once('=') {
        (field.trim(), '=', raw.trim())
    } else {
        return Err(AppError::Backend {
            status: 400,
            message: format!("Invalid filter: {filter}"),
        });
    };
    let expected: Value = if raw.starts_with('"') || raw.starts_with('\'') {
        Value::String(raw.trim_matches(|c| c == '"' || c == '\'').to_string())
    } else {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    };
    let actual = field_value(record, field);
    Ok(match op {
        '~' => match (actual.as_str(), expected.as_str()) {
            (Some(actual), Some(needle)) => actual.to_lowercase().contains(&needle.to_lowercase()),
            _ => false,
        },
        _ => actual == expected,
    })
}

#[async_trait]
impl BackendClient for InMemoryBackend {
    async fn list(
        &self,
        collection: &CollectionName,
        query: &ListQuery,
    ) -> Result<RecordPage, AppError> {
        self.record_call(BackendOp::List)?;
        let store = self.server.store.read().await;
        let mut records = store
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default();
        drop(store);

        if let Some(filter) = query.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            let mut kept = Vec::with_capacity(records.len());
            for record in records {
                if matches_filter(&record, filter)? {
                    kept.push(record);
                }
            }
            records = kept;
        }
        if let Some(sort) = query.sort.as_deref() {
            sort_records(&mut records, sort);
        }

        let per_page = query.per_page.max(1);
        let page = query.page.max(1);
        let total = records.len() as i64;
        let items = records
            .into_iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .collect();
        debug!(collection = %collection, page, total, "memory backend list");
        Ok(RecordPage::new(page, per_page, total, items))
    }

    async fn get(&self, collection: &CollectionName, id: &RecordId) -> Result<Record, AppError> {
        self.record_call(BackendOp::Get)?;
        let store = self.server.store.read().await;
        store
            .collections
            .get(collection)
            .and_then(|records| records.iter().find(|record| &record.id == id))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create(
        &self,
        collection: &CollectionName,
        fields: Fields,
    ) -> Result<Record, AppError> {
        let _permit = self.write_permit().await;
        self.record_call(BackendOp::Create)?;
        let mut store = self.server.store.write().await;
        let record = if collection == &self.server.auth_collection {
            self.insert_user(&mut store, fields)?
        } else {
            let record = new_record(collection, fields);
            store
                .collections
                .entry(collection.clone())
                .or_default()
                .push(record.clone());
            record
        };
        drop(store);
        self.publish(RealtimeAction::Create, collection, &record);
        Ok(record)
    }

    async fn update(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        fields: Fields,
    ) -> Result<Record, AppError> {
        let _permit = self.write_permit().await;
        self.record_call(BackendOp::Update)?;
        let mut store = self.server.store.write().await;
        let record = store
            .collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|record| &record.id == id))
            .ok_or_else(not_found)?;
        record.apply_changes(&fields);
        let record = record.clone();
        drop(store);
        self.publish(RealtimeAction::Update, collection, &record);
        Ok(record)
    }

    async fn delete(&self, collection: &CollectionName, id: &RecordId) -> Result<(), AppError> {
        let _permit = self.write_permit().await;
        self.record_call(BackendOp::Delete)?;
        let mut store = self.server.store.write().await;
        let records = store.collections.get_mut(collection).ok_or_else(not_found)?;
        let index = records
            .iter()
            .position(|record| &record.id == id)
            .ok_or_else(not_found)?;
        let record = records.remove(index);
        drop(store);
        self.publish(RealtimeAction::Delete, collection, &record);
        Ok(())
    }

    async fn subscribe(&self, topic: SubscriptionTopic) -> Result<RealtimeStream, AppError> {
        self.record_call(BackendOp::Subscribe)?;
        let mut events = self.channel(topic.collection()).subscribe();
        let (tx, rx) = mpsc::channel(BROADCAST_CAPACITY);
        let filter = topic.clone();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if !filter.accepts(&event.collection, &event.record.id) {
                            continue;
                        }
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "memory realtime subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let subscribers = Arc::clone(&self.server.subscribers);
        subscribers.fetch_add(1, Ordering::SeqCst);
        let abort = handle.abort_handle();
        Ok(RealtimeStream::new(topic, rx, move || {
            abort.abort();
            subscribers.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    async fn auth_with_password(
        &self,
        collection: &CollectionName,
        identity: &str,
        password: &str,
    ) -> Result<AuthResponse, AppError> {
        self.record_call(BackendOp::Auth)?;
        let mut store = self.server.store.write().await;
        let record = store
            .collections
            .get(collection)
            .and_then(|users| {
                users
                    .iter()
                    .find(|user| user.get_str("email") == Some(identity.trim()))
            })
            .cloned();
        let authenticated = record.filter(|user| {
            store
                .passwords
                .get(&user.id)
                .is_some_and(|stored| stored == password)
        });
        let Some(record) = authenticated else {
            return Err(AppError::Backend {
                status: 400,
                message: "Failed to authenticate.".to_string(),
            });
        };
        let token = Self::issue_token(&mut store, &record.id)?;
        Ok(AuthResponse { token, record })
    }

    async fn auth_refresh(&self, collection: &CollectionName) -> Result<AuthResponse, AppError> {
        self.record_call(BackendOp::Auth)?;
        let current = self.token.read().await.clone();
        let mut store = self.server.store.write().await;
        let user_id = current
            .filter(AuthToken::is_valid)
            .and_then(|token| store.tokens.get(token.as_str()).cloned())
            .ok_or_else(|| {
                AppError::Unauthorized(
                    "The request requires valid record authorization token.".to_string(),
                )
            })?;
        let record = store
            .collections
            .get(collection)
            .and_then(|users| users.iter().find(|user| user.id == user_id))
            .cloned()
            .ok_or_else(not_found)?;
        let token = Self::issue_token(&mut store, &record.id)?;
        Ok(AuthResponse { token, record })
    }

    async fn set_auth_token(&self, token: Option<AuthToken>) {
        *self.token.write().await = token;
    }
}
