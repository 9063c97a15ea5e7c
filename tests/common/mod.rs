//! Shared helpers for integration tests.
//!
//! `MemoryStore` is an in-process keyspace that answers the commands the
//! suites send, and `MemoryConnector` hands out clients backed by it. With
//! them every suite can run without a server. Tests that need a real one
//! are `#[ignore]` and read `CONFORMANCE_HOST` / `CONFORMANCE_PORT`.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use valkey_conformance::client::{ClientFuture, ClientHandle, Route, StoreClient, Topology};
use valkey_conformance::config::{AuthenticationInfo, ConnectionRequest, Credential, Endpoint};
use valkey_conformance::connect::{ConnectionFactory, Connector, Target};
use valkey_conformance::context::RunContext;
use valkey_conformance::error::{HarnessError, Result};
use valkey_conformance::reply::Reply;
use valkey_conformance::seeds::{SeedResolver, SeedSources};

/// Global counter for generating unique key prefixes per test.
static TEST_ID: AtomicUsize = AtomicUsize::new(0);

/// Return a unique prefix for test keys to avoid collisions between tests.
pub fn test_prefix() -> String {
    let id = TEST_ID.fetch_add(1, Ordering::Relaxed);
    format!("conformance_test_{}_{}", std::process::id(), id)
}

/// Target for `#[ignore]`d live tests.
pub fn live_target() -> Target {
    let host = std::env::var("CONFORMANCE_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port = std::env::var("CONFORMANCE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6379);
    Target {
        host,
        port,
        ..Target::default()
    }
}

// ── Keyspace ─────────────────────────────────────────────────────

type StreamId = (u64, u64);

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    Hash(BTreeMap<String, String>),
    ZSet(BTreeMap<String, f64>),
    Geo(BTreeMap<String, (f64, f64)>),
    Stream(Vec<(StreamId, Vec<(String, String)>)>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Hash(_) => "hash",
            Self::ZSet(_) | Self::Geo(_) => "zset",
            Self::Stream(_) => "stream",
        }
    }

    fn is_empty_container(&self) -> bool {
        match self {
            Self::Str(_) | Self::Stream(_) => false,
            Self::List(l) => l.is_empty(),
            Self::Set(s) => s.is_empty(),
            Self::Hash(h) => h.is_empty(),
            Self::ZSet(z) => z.is_empty(),
            Self::Geo(g) => g.is_empty(),
        }
    }
}

type Db = HashMap<String, Value>;

#[derive(Default)]
struct State {
    dbs: HashMap<u32, Db>,
    /// Registered connections: id -> name.
    clients: BTreeMap<u64, Option<String>>,
}

/// Shared in-memory server.
pub struct MemoryStore {
    state: Mutex<State>,
    next_client: AtomicU64,
    connects: AtomicUsize,
    version: String,
    server_name: Option<String>,
    password: Credential,
    masters: Vec<String>,
    cluster_enabled: bool,
    refuse: AtomicBool,
    silent_info: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_client: AtomicU64::new(1),
            connects: AtomicUsize::new(0),
            version: "7.2.4".into(),
            server_name: Some("valkey".into()),
            password: Credential::None,
            masters: vec![
                "127.0.0.1:7001".into(),
                "127.0.0.1:7002".into(),
                "127.0.0.1:7003".into(),
            ],
            cluster_enabled: true,
            refuse: AtomicBool::new(false),
            silent_info: AtomicBool::new(false),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Announce as plain Redis (no `server_name`).
    pub fn as_redis(mut self) -> Self {
        self.server_name = None;
        self
    }

    pub fn with_password(mut self, credential: Credential) -> Self {
        self.password = credential;
        self
    }

    pub fn with_masters(mut self, masters: &[&str]) -> Self {
        self.masters = masters.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn without_cluster(mut self) -> Self {
        self.cluster_enabled = false;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Answer `INFO` with a nil reply from now on.
    pub fn silence_info(&self, silent: bool) {
        self.silent_info.store(silent, Ordering::SeqCst);
    }

    /// Refuse every new connection from now on.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Connections accepted so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Connections currently registered (what `CLIENT LIST` shows).
    pub fn live_clients(&self) -> usize {
        self.state.lock().clients.len()
    }

    pub fn contains_key(&self, db: u32, key: &str) -> bool {
        self.state
            .lock()
            .dbs
            .get(&db)
            .is_some_and(|keys| keys.contains_key(key))
    }

    fn accepts(&self, info: &AuthenticationInfo) -> bool {
        match &self.password {
            Credential::None => false,
            Credential::Password(password) => {
                info.password == *password
                    && info.username.as_deref().map_or(true, |u| u == "default")
            }
            Credential::UserPassword { username, password } => {
                info.password == *password && info.username.as_deref() == Some(username.as_str())
            }
        }
    }

    fn info_text(&self) -> String {
        let mut text = String::from("# Server\r\n");
        text.push_str(&format!("redis_version:{}\r\n", self.version));
        if let Some(name) = &self.server_name {
            text.push_str(&format!("server_name:{name}\r\n"));
        }
        let clients = self.live_clients();
        for (field, value) in [
            ("arch_bits", "64".to_string()),
            ("uptime_in_seconds", "120".to_string()),
            ("uptime_in_days", "0".to_string()),
            ("connected_clients", clients.to_string()),
            ("connected_slaves", "0".to_string()),
            ("used_memory", "1048576".to_string()),
            ("total_connections_received", self.connects().to_string()),
            ("total_commands_processed", "42".to_string()),
            ("role", "master".to_string()),
        ] {
            text.push_str(&format!("{field}:{value}\r\n"));
        }
        text
    }
}

// ── Connector & client ───────────────────────────────────────────

/// Connector handing out [`MemoryClient`]s.
#[derive(Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

impl Connector for MemoryConnector {
    fn connect<'a>(&'a self, request: &'a ConnectionRequest) -> ClientFuture<'a, ClientHandle> {
        Box::pin(async move {
            let client = MemoryClient::connect(Arc::clone(&self.store), request)?;
            Ok(ClientHandle::from_client(client))
        })
    }
}

pub struct MemoryClient {
    store: Arc<MemoryStore>,
    topology: Topology,
    id: u64,
    db: u32,
    initial_name: Option<String>,
    request_timeout: Option<Duration>,
    authenticated: AtomicBool,
    registered: AtomicBool,
    closed: AtomicBool,
}

impl MemoryClient {
    fn connect(store: Arc<MemoryStore>, request: &ConnectionRequest) -> Result<Self> {
        if store.refuse.load(Ordering::SeqCst) {
            return Err(HarnessError::Connection("Connection refused".into()));
        }
        if request.cluster_mode_enabled && !store.cluster_enabled {
            return Err(HarnessError::Connection(
                "cluster support disabled on this server".into(),
            ));
        }
        let authenticated = match (&store.password, &request.authentication) {
            (_, Some(info)) if store.accepts(info) => true,
            (_, Some(_)) => {
                return Err(HarnessError::redis(
                    "WRONGPASS invalid username-password pair or user is disabled.",
                ))
            }
            (Credential::None, None) => true,
            (_, None) => false,
        };

        store.connects.fetch_add(1, Ordering::SeqCst);
        let client = Self {
            id: store.next_client.fetch_add(1, Ordering::SeqCst),
            store,
            topology: if request.cluster_mode_enabled {
                Topology::Cluster
            } else {
                Topology::Standalone
            },
            db: request.database_id,
            initial_name: request.client_name.clone(),
            request_timeout: request.request_timeout,
            authenticated: AtomicBool::new(authenticated),
            registered: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };
        if !request.lazy_connect {
            client.register();
        }
        Ok(client)
    }

    fn register(&self) {
        if !self.registered.swap(true, Ordering::SeqCst) {
            self.store
                .state
                .lock()
                .clients
                .insert(self.id, self.initial_name.clone());
        }
    }

    async fn dispatch(&self, args: Vec<String>) -> Result<Reply> {
        let Some(cmd) = args.first().map(|a| a.to_ascii_uppercase()) else {
            return Err(HarnessError::redis("ERR empty command"));
        };
        let rest = &args[1..];
        if cmd == "DEBUG" {
            if rest.first().is_some_and(|s| s.eq_ignore_ascii_case("SLEEP")) {
                let secs: f64 = rest.get(1).and_then(|s| s.parse().ok()).unwrap_or(0.0);
                tokio::time::sleep(Duration::from_secs_f64(secs)).await;
            }
            return Ok(Reply::ok());
        }
        self.run(&cmd, rest)
    }

    fn run(&self, cmd: &str, a: &[String]) -> Result<Reply> {
        if cmd == "AUTH" {
            return self.auth(a);
        }
        if !self.authenticated.load(Ordering::SeqCst) {
            return Err(HarnessError::redis("NOAUTH Authentication required."));
        }
        match cmd {
            "PING" => Ok(match a.first() {
                Some(message) => Reply::bulk(message),
                None => Reply::Status("PONG".into()),
            }),
            "ECHO" => Ok(Reply::bulk(arg(a, 0, cmd)?)),
            "INFO" if self.store.silent_info.load(Ordering::SeqCst) => Ok(Reply::Nil),
            "INFO" => Ok(Reply::bulk(self.store.info_text())),
            "CLIENT" => self.client_command(a),
            _ => {
                let mut state = self.store.state.lock();
                let db = state.dbs.entry(self.db).or_default();
                keyspace(db, cmd, a)
            }
        }
    }

    fn auth(&self, a: &[String]) -> Result<Reply> {
        let info = match a {
            [password] => AuthenticationInfo {
                username: None,
                password: password.clone(),
            },
            [username, password] => AuthenticationInfo {
                username: Some(username.clone()),
                password: password.clone(),
            },
            _ => return Err(arity("AUTH")),
        };
        if self.store.accepts(&info) {
            self.authenticated.store(true, Ordering::SeqCst);
            Ok(Reply::ok())
        } else {
            Err(HarnessError::redis(
                "WRONGPASS invalid username-password pair or user is disabled.",
            ))
        }
    }

    fn client_command(&self, a: &[String]) -> Result<Reply> {
        let sub = arg(a, 0, "CLIENT")?.to_ascii_uppercase();
        let mut state = self.store.state.lock();
        match sub.as_str() {
            "LIST" => {
                let listing: String = state
                    .clients
                    .iter()
                    .map(|(id, name)| {
                        format!(
                            "id={id} addr=127.0.0.1:{} name={} cmd=client|list\n",
                            40000 + id,
                            name.as_deref().unwrap_or("")
                        )
                    })
                    .collect();
                Ok(Reply::bulk(listing))
            }
            "GETNAME" => Ok(state
                .clients
                .get(&self.id)
                .cloned()
                .flatten()
                .map_or(Reply::Nil, Reply::bulk)),
            "SETNAME" => {
                let name = arg(a, 1, "CLIENT")?.to_string();
                state.clients.insert(self.id, Some(name));
                Ok(Reply::ok())
            }
            _ => Err(HarnessError::redis(format!(
                "ERR unknown subcommand '{}'",
                sub.to_lowercase()
            ))),
        }
    }
}

impl StoreClient for MemoryClient {
    fn topology(&self) -> Topology {
        self.topology
    }

    fn execute(&self, args: Vec<String>, _route: Route) -> ClientFuture<'_, Reply> {
        Box::pin(async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(HarnessError::Connection("connection closed".into()));
            }
            self.register();
            match self.request_timeout {
                Some(limit) => tokio::time::timeout(limit, self.dispatch(args)).await?,
                None => self.dispatch(args).await,
            }
        })
    }

    fn masters(&self) -> ClientFuture<'_, Vec<String>> {
        Box::pin(async move {
            match self.topology {
                Topology::Cluster => Ok(self.store.masters.clone()),
                Topology::Standalone => Err(HarnessError::Type(
                    "masters() needs a cluster client".into(),
                )),
            }
        })
    }

    fn close(&self) -> ClientFuture<'_, ()> {
        Box::pin(async move {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.store.state.lock().clients.remove(&self.id);
            }
            Ok(())
        })
    }
}

// ── Command implementations ──────────────────────────────────────

fn wrong_type() -> HarnessError {
    HarnessError::redis("WRONGTYPE Operation against a key holding the wrong kind of value")
}

fn arity(cmd: &str) -> HarnessError {
    HarnessError::redis(format!(
        "ERR wrong number of arguments for '{}' command",
        cmd.to_lowercase()
    ))
}

fn not_an_integer() -> HarnessError {
    HarnessError::redis("ERR value is not an integer or out of range")
}

fn arg<'a>(a: &'a [String], index: usize, cmd: &str) -> Result<&'a str> {
    a.get(index).map(String::as_str).ok_or_else(|| arity(cmd))
}

fn need(a: &[String], count: usize, cmd: &str) -> Result<()> {
    if a.len() < count {
        Err(arity(cmd))
    } else {
        Ok(())
    }
}

fn int_arg(a: &[String], index: usize, cmd: &str) -> Result<i64> {
    arg(a, index, cmd)?.parse().map_err(|_| not_an_integer())
}

fn float_arg(a: &[String], index: usize, cmd: &str) -> Result<f64> {
    arg(a, index, cmd)?
        .parse()
        .map_err(|_| HarnessError::redis("ERR value is not a valid float"))
}

fn bulk_array<'a>(items: impl IntoIterator<Item = &'a String>) -> Reply {
    Reply::Array(items.into_iter().map(Reply::bulk).collect())
}

/// Existing value of the given variant, `None` if absent, WRONGTYPE otherwise.
macro_rules! typed {
    ($db:expr, $key:expr, $variant:ident) => {
        match $db.get_mut($key) {
            None => None,
            Some(Value::$variant(v)) => Some(v),
            Some(_) => return Err(wrong_type()),
        }
    };
}

/// Existing value of the given variant, created empty when absent.
macro_rules! typed_or_default {
    ($db:expr, $key:expr, $variant:ident) => {
        match $db
            .entry($key.to_string())
            .or_insert_with(|| Value::$variant(Default::default()))
        {
            Value::$variant(v) => v,
            _ => return Err(wrong_type()),
        }
    };
}

fn purge(db: &mut Db, key: &str) {
    if db.get(key).is_some_and(Value::is_empty_container) {
        db.remove(key);
    }
}

/// Inclusive index window for LRANGE/ZRANGE semantics.
fn window(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { len + start } else { start }.max(0);
    let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);
    if start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

fn incr_by(db: &mut Db, key: &str, by: i64) -> Result<Reply> {
    let current = match typed!(db, key, Str) {
        Some(s) => s.parse::<i64>().map_err(|_| not_an_integer())?,
        None => 0,
    };
    let next = current.checked_add(by).ok_or_else(not_an_integer)?;
    db.insert(key.to_string(), Value::Str(next.to_string()));
    Ok(Reply::Int(next))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn parse_stream_id(raw: &str, default_seq: u64) -> Option<StreamId> {
    match raw.split_once('-') {
        Some((ms, seq)) => Some((ms.parse().ok()?, seq.parse().ok()?)),
        None => Some((raw.parse().ok()?, default_seq)),
    }
}

fn fields_reply(fields: &[(String, String)]) -> Reply {
    Reply::Array(
        fields
            .iter()
            .flat_map(|(f, v)| [Reply::bulk(f), Reply::bulk(v)])
            .collect(),
    )
}

const EARTH_RADIUS_M: f64 = 6_372_797.560856;

fn haversine((lon1, lat1): (f64, f64), (lon2, lat2): (f64, f64)) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let u = ((lat2 - lat1) / 2.0).sin();
    let v = ((lon2 - lon1).to_radians() / 2.0).sin();
    2.0 * EARTH_RADIUS_M * (u * u + lat1.cos() * lat2.cos() * v * v).sqrt().asin()
}

fn keyspace(db: &mut Db, cmd: &str, a: &[String]) -> Result<Reply> {
    match cmd {
        // strings & keys
        "SET" => {
            need(a, 2, cmd)?;
            db.insert(a[0].clone(), Value::Str(a[1].clone()));
            Ok(Reply::ok())
        }
        "GET" => Ok(typed!(db, arg(a, 0, cmd)?, Str).map_or(Reply::Nil, |s| Reply::bulk(s.as_str()))),
        "GETDEL" => {
            let key = arg(a, 0, cmd)?;
            let value = typed!(db, key, Str).map(|s| s.clone());
            if value.is_some() {
                db.remove(key);
            }
            Ok(value.map_or(Reply::Nil, Reply::bulk))
        }
        "DEL" | "UNLINK" => {
            need(a, 1, cmd)?;
            Ok(Reply::Int(a.iter().filter(|k| db.remove(k.as_str()).is_some()).count() as i64))
        }
        "EXISTS" => {
            need(a, 1, cmd)?;
            Ok(Reply::Int(a.iter().filter(|k| db.contains_key(k.as_str())).count() as i64))
        }
        "TYPE" => Ok(Reply::Status(
            db.get(arg(a, 0, cmd)?).map_or("none", Value::type_name).to_string(),
        )),
        "INCR" => incr_by(db, arg(a, 0, cmd)?, 1),
        "DECR" => incr_by(db, arg(a, 0, cmd)?, -1),
        "INCRBY" => incr_by(db, arg(a, 0, cmd)?, int_arg(a, 1, cmd)?),
        "DECRBY" => {
            let by = int_arg(a, 1, cmd)?.checked_neg().ok_or_else(not_an_integer)?;
            incr_by(db, arg(a, 0, cmd)?, by)
        }
        "APPEND" => {
            need(a, 2, cmd)?;
            let s = typed_or_default!(db, &a[0], Str);
            s.push_str(&a[1]);
            Ok(Reply::Int(s.len() as i64))
        }
        "STRLEN" => Ok(Reply::Int(
            typed!(db, arg(a, 0, cmd)?, Str).map_or(0, |s| s.len()) as i64,
        )),

        // sets
        "SADD" => {
            need(a, 2, cmd)?;
            let set = typed_or_default!(db, &a[0], Set);
            Ok(Reply::Int(a[1..].iter().filter(|m| set.insert((*m).clone())).count() as i64))
        }
        "SREM" => {
            need(a, 2, cmd)?;
            let removed = match typed!(db, &a[0], Set) {
                Some(set) => a[1..].iter().filter(|m| set.remove(m.as_str())).count(),
                None => 0,
            };
            purge(db, &a[0]);
            Ok(Reply::Int(removed as i64))
        }
        "SMEMBERS" => Ok(match typed!(db, arg(a, 0, cmd)?, Set) {
            Some(set) => bulk_array(set.iter()),
            None => Reply::Array(Vec::new()),
        }),
        "SCARD" => Ok(Reply::Int(
            typed!(db, arg(a, 0, cmd)?, Set).map_or(0, |s| s.len()) as i64,
        )),
        "SISMEMBER" => {
            let member = arg(a, 1, cmd)?;
            let found = typed!(db, &a[0], Set).is_some_and(|s| s.contains(member));
            Ok(Reply::Int(i64::from(found)))
        }

        // lists
        "RPUSH" | "LPUSH" => {
            need(a, 2, cmd)?;
            let list = typed_or_default!(db, &a[0], List);
            for element in &a[1..] {
                if cmd == "RPUSH" {
                    list.push_back(element.clone());
                } else {
                    list.push_front(element.clone());
                }
            }
            Ok(Reply::Int(list.len() as i64))
        }
        "LRANGE" => {
            let (start, stop) = (int_arg(a, 1, cmd)?, int_arg(a, 2, cmd)?);
            Ok(match typed!(db, &a[0], List) {
                Some(list) => match window(list.len(), start, stop) {
                    Some((from, to)) => bulk_array(list.range(from..=to)),
                    None => Reply::Array(Vec::new()),
                },
                None => Reply::Array(Vec::new()),
            })
        }
        "LLEN" => Ok(Reply::Int(
            typed!(db, arg(a, 0, cmd)?, List).map_or(0, |l| l.len()) as i64,
        )),
        "LPOP" | "RPOP" => {
            let key = arg(a, 0, cmd)?;
            let popped = match typed!(db, key, List) {
                Some(list) if cmd == "LPOP" => list.pop_front(),
                Some(list) => list.pop_back(),
                None => None,
            };
            purge(db, key);
            Ok(popped.map_or(Reply::Nil, Reply::bulk))
        }
        "LINDEX" => {
            let index = int_arg(a, 1, cmd)?;
            Ok(match typed!(db, &a[0], List) {
                Some(list) => {
                    let len = list.len() as i64;
                    let index = if index < 0 { len + index } else { index };
                    if (0..len).contains(&index) {
                        Reply::bulk(&list[index as usize])
                    } else {
                        Reply::Nil
                    }
                }
                None => Reply::Nil,
            })
        }

        // hashes
        "HSET" | "HMSET" => {
            if a.len() < 3 || (a.len() - 1) % 2 != 0 {
                return Err(arity(cmd));
            }
            let hash = typed_or_default!(db, &a[0], Hash);
            let added = a[1..]
                .chunks(2)
                .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
                .count();
            Ok(if cmd == "HMSET" {
                Reply::ok()
            } else {
                Reply::Int(added as i64)
            })
        }
        "HGET" => {
            let field = arg(a, 1, cmd)?;
            Ok(typed!(db, &a[0], Hash)
                .and_then(|h| h.get(field))
                .map_or(Reply::Nil, |v| Reply::bulk(v.as_str())))
        }
        "HGETALL" => Ok(match typed!(db, arg(a, 0, cmd)?, Hash) {
            Some(hash) => Reply::Array(
                hash.iter()
                    .flat_map(|(f, v)| [Reply::bulk(f), Reply::bulk(v)])
                    .collect(),
            ),
            None => Reply::Array(Vec::new()),
        }),
        "HLEN" => Ok(Reply::Int(
            typed!(db, arg(a, 0, cmd)?, Hash).map_or(0, |h| h.len()) as i64,
        )),
        "HDEL" => {
            need(a, 2, cmd)?;
            let removed = match typed!(db, &a[0], Hash) {
                Some(hash) => a[1..].iter().filter(|f| hash.remove(f.as_str()).is_some()).count(),
                None => 0,
            };
            purge(db, &a[0]);
            Ok(Reply::Int(removed as i64))
        }

        // sorted sets
        "ZADD" => {
            if a.len() < 3 || (a.len() - 1) % 2 != 0 {
                return Err(arity(cmd));
            }
            let mut pairs = Vec::with_capacity((a.len() - 1) / 2);
            for i in (1..a.len()).step_by(2) {
                pairs.push((float_arg(a, i, cmd)?, a[i + 1].clone()));
            }
            let zset = typed_or_default!(db, &a[0], ZSet);
            let added = pairs
                .into_iter()
                .filter(|(score, member)| zset.insert(member.clone(), *score).is_none())
                .count();
            Ok(Reply::Int(added as i64))
        }
        "ZRANGE" => {
            let (start, stop) = (int_arg(a, 1, cmd)?, int_arg(a, 2, cmd)?);
            let with_scores = a.get(3).is_some_and(|s| s.eq_ignore_ascii_case("WITHSCORES"));
            let Some(zset) = typed!(db, &a[0], ZSet) else {
                return Ok(Reply::Array(Vec::new()));
            };
            let mut ordered: Vec<(&String, f64)> = zset.iter().map(|(m, s)| (m, *s)).collect();
            ordered.sort_by(|x, y| x.1.total_cmp(&y.1).then_with(|| x.0.cmp(y.0)));
            let mut out = Vec::new();
            if let Some((from, to)) = window(ordered.len(), start, stop) {
                for (member, score) in &ordered[from..=to] {
                    out.push(Reply::bulk(member.as_str()));
                    if with_scores {
                        out.push(Reply::bulk(score.to_string()));
                    }
                }
            }
            Ok(Reply::Array(out))
        }
        "ZCARD" => Ok(Reply::Int(
            typed!(db, arg(a, 0, cmd)?, ZSet).map_or(0, |z| z.len()) as i64,
        )),
        "ZSCORE" => {
            let member = arg(a, 1, cmd)?;
            Ok(typed!(db, &a[0], ZSet)
                .and_then(|z| z.get(member))
                .map_or(Reply::Nil, |s| Reply::bulk(s.to_string())))
        }

        // streams
        "XADD" => {
            if a.len() < 4 || (a.len() - 2) % 2 != 0 {
                return Err(arity(cmd));
            }
            let top = typed!(db, &a[0], Stream)
                .and_then(|s| s.last().map(|(id, _)| *id))
                .unwrap_or((0, 0));
            let id = if a[1] == "*" {
                let now = now_ms();
                if now > top.0 {
                    (now, 0)
                } else {
                    (top.0, top.1 + 1)
                }
            } else {
                parse_stream_id(&a[1], 0).ok_or_else(|| {
                    HarnessError::redis("ERR Invalid stream ID specified as stream command argument")
                })?
            };
            if id <= top {
                return Err(HarnessError::redis(
                    "ERR The ID specified in XADD is equal or smaller than the target stream top item",
                ));
            }
            let fields = a[2..]
                .chunks(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect();
            typed_or_default!(db, &a[0], Stream).push((id, fields));
            Ok(Reply::bulk(format!("{}-{}", id.0, id.1)))
        }
        "XRANGE" => {
            need(a, 3, cmd)?;
            let bound = |raw: &str, low: bool| -> Result<StreamId> {
                match raw {
                    "-" => Ok((0, 0)),
                    "+" => Ok((u64::MAX, u64::MAX)),
                    _ => parse_stream_id(raw, if low { 0 } else { u64::MAX }).ok_or_else(|| {
                        HarnessError::redis("ERR Invalid stream ID specified as stream command argument")
                    }),
                }
            };
            let (start, end) = (bound(&a[1], true)?, bound(&a[2], false)?);
            Ok(match typed!(db, &a[0], Stream) {
                Some(stream) => Reply::Array(
                    stream
                        .iter()
                        .filter(|(id, _)| (start..=end).contains(id))
                        .map(|((ms, seq), fields)| {
                            Reply::Array(vec![Reply::bulk(format!("{ms}-{seq}")), fields_reply(fields)])
                        })
                        .collect(),
                ),
                None => Reply::Array(Vec::new()),
            })
        }
        "XLEN" => Ok(Reply::Int(
            typed!(db, arg(a, 0, cmd)?, Stream).map_or(0, |s| s.len()) as i64,
        )),

        // geo
        "GEOADD" => {
            if a.len() < 4 || (a.len() - 1) % 3 != 0 {
                return Err(arity(cmd));
            }
            let mut points = Vec::with_capacity((a.len() - 1) / 3);
            for i in (1..a.len()).step_by(3) {
                points.push((float_arg(a, i, cmd)?, float_arg(a, i + 1, cmd)?, a[i + 2].clone()));
            }
            let geo = typed_or_default!(db, &a[0], Geo);
            let added = points
                .into_iter()
                .filter(|(lon, lat, member)| geo.insert(member.clone(), (*lon, *lat)).is_none())
                .count();
            Ok(Reply::Int(added as i64))
        }
        "GEODIST" => {
            need(a, 3, cmd)?;
            let divisor = match a.get(3).map(|u| u.to_ascii_lowercase()).as_deref() {
                None | Some("m") => 1.0,
                Some("km") => 1000.0,
                Some("mi") => 1609.34,
                Some("ft") => 0.3048,
                Some(_) => {
                    return Err(HarnessError::redis(
                        "ERR unsupported unit provided. please use M, KM, FT, MI",
                    ))
                }
            };
            let Some(geo) = typed!(db, &a[0], Geo) else {
                return Ok(Reply::Nil);
            };
            Ok(match (geo.get(&a[1]), geo.get(&a[2])) {
                (Some(from), Some(to)) => Reply::bulk(format!("{:.4}", haversine(*from, *to) / divisor)),
                _ => Reply::Nil,
            })
        }
        "GEOPOS" => {
            let geo = typed!(db, arg(a, 0, cmd)?, Geo);
            let positions = a[1..]
                .iter()
                .map(|member| match geo.as_ref().and_then(|g| g.get(member)) {
                    Some((lon, lat)) => Reply::Array(vec![
                        Reply::bulk(lon.to_string()),
                        Reply::bulk(lat.to_string()),
                    ]),
                    None => Reply::Nil,
                })
                .collect();
            Ok(Reply::Array(positions))
        }

        _ => Err(HarnessError::redis(format!(
            "ERR unknown command '{}'",
            cmd.to_lowercase()
        ))),
    }
}

// ── Run wiring ───────────────────────────────────────────────────

/// Factory aimed at `target` whose clients live in `store`.
pub fn memory_factory(store: &Arc<MemoryStore>, target: Target) -> ConnectionFactory {
    ConnectionFactory::new(target, Arc::new(MemoryConnector::new(Arc::clone(store))))
}

/// Run context over `store` with default target and seeds from the host/port only.
pub fn run_context(store: &Arc<MemoryStore>) -> Arc<RunContext> {
    let target = Target::default();
    let sources = SeedSources {
        host_port: Some(target.endpoint()),
        ..SeedSources::default()
    };
    run_context_with(store, target, sources)
}

pub fn run_context_with(store: &Arc<MemoryStore>, target: Target, sources: SeedSources) -> Arc<RunContext> {
    Arc::new(RunContext::new(
        memory_factory(store, target),
        SeedResolver::new(sources),
    ))
}

/// Target with a credential.
pub fn target_with(credential: Credential) -> Target {
    Target {
        credential,
        ..Target::default()
    }
}

pub fn endpoint(s: &str) -> Endpoint {
    s.parse().expect("test endpoint")
}

/// Captured report bytes as text.
pub fn text(buffer: Vec<u8>) -> String {
    String::from_utf8(buffer).expect("report is utf-8")
}
