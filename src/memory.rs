//! In-process backend.
//!
//! `MemoryStore` keeps every table in one mutex-guarded struct and follows
//! the PostgreSQL schema: versions bump on every update except view counting
//! and object key changes, deletes cascade the same way, and names that are
//! unique in the database are unique here regardless of case. Keyword search
//! is a case-insensitive substring match instead of full-text search.
//!
//! Used by the test suite.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::asset::{Asset, AssetStore, AssetUpdate, NewAsset};
use crate::db::{SearchQuery, SortOrder};
use crate::demo::{Demo, DemoStore, DemoUpdate, NewDemo};
use crate::forum::{
    ForumStore, Message, MessageUpdate, NewMessage, NewThread, NewTopic, Thread, ThreadUpdate,
    Topic, TopicRemoval, TopicUpdate, DEMO_TOPIC_ID,
};
use crate::policy::{Grouping, PolicyAdapter, PolicySnapshot, Rule, FREE_TIER, PAID_TIER, SUPERUSER};
use crate::storage::ObjectStore;
use crate::user::{NewUser, Role, RoleUpdate, Session, User, UserStore, UserUpdate};
use crate::{HangarError, Result};

const MAX_TITLE: usize = 90;

#[derive(Default)]
struct Tables {
    last_id: i64,
    assets: BTreeMap<i64, Asset>,
    demos: BTreeMap<i64, Demo>,
    topics: BTreeMap<i64, Topic>,
    threads: BTreeMap<i64, Thread>,
    messages: BTreeMap<i64, Message>,
    roles: HashMap<Uuid, Role>,
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    rules: BTreeSet<Rule>,
    groupings: BTreeSet<Grouping>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Every table of the service held in memory.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store holding the seed rows: the admin, paidtier and
    /// freetier roles and the demo topic.
    pub fn new() -> Self {
        let mut tables = Tables {
            last_id: DEMO_TOPIC_ID,
            ..Tables::default()
        };
        for name in [SUPERUSER, PAID_TIER, FREE_TIER] {
            let role = Role {
                id: Uuid::new_v4(),
                name: name.to_string(),
                version: 1,
            };
            tables.roles.insert(role.id, role);
        }
        tables.topics.insert(
            DEMO_TOPIC_ID,
            Topic {
                id: DEMO_TOPIC_ID,
                name: "Demos".to_string(),
                version: 1,
            },
        );
        Self {
            tables: Mutex::new(tables),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| HangarError::Internal("memory store lock poisoned".to_string()))
    }
}

// ----------------------------------------------------------------------
// Row checks shared by every table
// ----------------------------------------------------------------------

fn check_title(title: &str, what: &str) -> Result<()> {
    if title.chars().count() > MAX_TITLE {
        return Err(HangarError::Validation(format!(
            "{what} violates a value constraint"
        )));
    }
    Ok(())
}

fn check_counter(value: Option<i32>, what: &str) -> Result<()> {
    match value {
        Some(v) if v < 0 => Err(HangarError::Validation(format!(
            "{what} violates a value constraint"
        ))),
        _ => Ok(()),
    }
}

fn check_version(current: i32, wanted: Option<i32>, label: String) -> Result<()> {
    match wanted {
        Some(v) if v != current => Err(HangarError::Conflict(label)),
        _ => Ok(()),
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

// ----------------------------------------------------------------------
// Search
// ----------------------------------------------------------------------

/// Columns the in-memory search looks at.
trait Searchable: Clone {
    fn id(&self) -> i64;
    fn texts(&self) -> Vec<&str>;
    fn tags(&self) -> Option<&[String]>;
    fn rating(&self) -> i32;
    fn updated_at(&self) -> DateTime<Utc>;
    fn views(&self) -> i32;
}

macro_rules! counted_row {
    ($ty:ty, |$row:ident| $texts:expr) => {
        impl Searchable for $ty {
            fn id(&self) -> i64 {
                self.id
            }
            fn texts(&self) -> Vec<&str> {
                let $row = self;
                $texts
            }
            fn tags(&self) -> Option<&[String]> {
                self.tags.as_deref()
            }
            fn rating(&self) -> i32 {
                self.rating
            }
            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }
            fn views(&self) -> i32 {
                self.views
            }
        }
    };
}

fn texts_of<'a>(required: &'a str, optional: &'a Option<String>) -> Vec<&'a str> {
    let mut texts = vec![required];
    if let Some(text) = optional {
        texts.push(text);
    }
    texts
}

counted_row!(Asset, |row| texts_of(&row.name, &row.description));
counted_row!(Demo, |row| texts_of(&row.title, &row.description));
counted_row!(Thread, |row| vec![row.title.as_str()]);
counted_row!(Message, |row| texts_of(&row.title, &row.body));

fn keyword_hit(query: &SearchQuery, texts: &[&str], tags: Option<&[String]>) -> bool {
    if !query.has_keywords() {
        return true;
    }
    query.keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        texts.iter().any(|t| t.to_lowercase().contains(&keyword))
            || tags.is_some_and(|tags| tags.iter().any(|t| t.to_lowercase() == keyword))
    })
}

fn apply_limit<T>(mut rows: Vec<T>, query: &SearchQuery) -> Vec<T> {
    if let Some(limit) = query.sql_limit() {
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }
    rows
}

fn search_counted<'a, T, I>(rows: I, query: &SearchQuery) -> Vec<T>
where
    T: Searchable + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut hits: Vec<T> = rows
        .filter(|row| keyword_hit(query, &row.texts(), row.tags()))
        .cloned()
        .collect();
    hits.sort_by(|a, b| {
        let primary = match query.order {
            SortOrder::HighestRated => b.rating().cmp(&a.rating()),
            SortOrder::NewestUpdated => b.updated_at().cmp(&a.updated_at()),
            SortOrder::MostViews => b.views().cmp(&a.views()),
            SortOrder::Default => std::cmp::Ordering::Equal,
        };
        primary.then(a.id().cmp(&b.id()))
    });
    apply_limit(hits, query)
}

fn count_view(views: &mut i32, wanted: bool) {
    if wanted {
        *views += 1;
    }
}

// ----------------------------------------------------------------------
// Assets
// ----------------------------------------------------------------------

#[async_trait]
impl AssetStore for MemoryStore {
    async fn insert_asset(&self, asset: &NewAsset) -> Result<Asset> {
        check_title(&asset.name, "asset")?;
        let mut tables = self.lock()?;
        let now = Utc::now();
        let row = Asset {
            id: tables.next_id(),
            name: asset.name.clone(),
            description: asset.description.clone(),
            tags: asset.tags.clone(),
            user_id: asset.user_id,
            object_key: None,
            link: None,
            created_at: now,
            updated_at: now,
            upvotes: 0,
            downvotes: 0,
            views: 0,
            rating: 0,
            version: 1,
        };
        tables.assets.insert(row.id, row.clone());
        Ok(row)
    }

    async fn asset_by_id(&self, id: i64) -> Result<Asset> {
        self.lock()?
            .assets
            .get(&id)
            .cloned()
            .ok_or_else(|| HangarError::NotFound(format!("asset {id}")))
    }

    async fn find_assets(&self, query: &SearchQuery) -> Result<Vec<Asset>> {
        Ok(search_counted(self.lock()?.assets.values(), query))
    }

    async fn update_asset(&self, id: i64, update: &AssetUpdate) -> Result<Asset> {
        if let Some(name) = &update.name {
            check_title(name, "asset")?;
        }
        check_counter(update.upvotes, "asset")?;
        check_counter(update.downvotes, "asset")?;

        let mut tables = self.lock()?;
        let row = tables
            .assets
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("asset {id}")))?;
        check_version(row.version, update.version, format!("asset {id}"))?;

        if let Some(name) = &update.name {
            row.name = name.clone();
        }
        if let Some(description) = &update.description {
            row.description = Some(description.clone());
        }
        if let Some(tags) = &update.tags {
            row.tags = Some(tags.clone());
        }
        if let Some(upvotes) = update.upvotes {
            row.upvotes = upvotes;
        }
        if let Some(downvotes) = update.downvotes {
            row.downvotes = downvotes;
        }
        row.rating = row.upvotes - row.downvotes;
        row.updated_at = Utc::now();
        row.version += 1;
        Ok(row.clone())
    }

    async fn set_asset_key(&self, id: i64, key: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let row = tables
            .assets
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("asset {id}")))?;
        row.object_key = Some(key.to_string());
        Ok(())
    }

    async fn delete_asset(&self, id: i64) -> Result<()> {
        self.lock()?
            .assets
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HangarError::NotFound(format!("asset {id}")))
    }
}

// ----------------------------------------------------------------------
// Demos
// ----------------------------------------------------------------------

#[async_trait]
impl DemoStore for MemoryStore {
    async fn insert_demo(&self, demo: &NewDemo) -> Result<Demo> {
        let thread_id = demo
            .thread_id
            .ok_or_else(|| HangarError::Validation("demo has no thread".to_string()))?;
        check_title(&demo.title, "demo")?;
        check_counter(Some(demo.upvotes), "demo")?;
        check_counter(Some(demo.downvotes), "demo")?;

        let mut tables = self.lock()?;
        if tables.demos.values().any(|d| d.thread_id == thread_id) {
            return Err(HangarError::Validation("demo already exists".to_string()));
        }
        let now = Utc::now();
        let row = Demo {
            id: tables.next_id(),
            title: demo.title.clone(),
            description: demo.description.clone(),
            link: demo.link.clone(),
            tags: demo.tags.clone(),
            user_id: demo.user_id,
            thread_id,
            created_at: now,
            updated_at: now,
            upvotes: demo.upvotes,
            downvotes: demo.downvotes,
            views: 0,
            rating: demo.upvotes - demo.downvotes,
            version: 1,
        };
        tables.demos.insert(row.id, row.clone());
        Ok(row)
    }

    async fn demo_by_id(&self, id: i64, wanted: bool) -> Result<Demo> {
        let mut tables = self.lock()?;
        let row = tables
            .demos
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("demo {id}")))?;
        count_view(&mut row.views, wanted);
        Ok(row.clone())
    }

    async fn find_demos(&self, query: &SearchQuery) -> Result<Vec<Demo>> {
        Ok(search_counted(self.lock()?.demos.values(), query))
    }

    async fn update_demo(&self, id: i64, update: &DemoUpdate) -> Result<Demo> {
        if let Some(title) = &update.title {
            check_title(title, "demo")?;
        }
        check_counter(update.upvotes, "demo")?;
        check_counter(update.downvotes, "demo")?;

        let mut tables = self.lock()?;
        let row = tables
            .demos
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("demo {id}")))?;
        check_version(row.version, update.version, format!("demo {id}"))?;

        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if let Some(description) = &update.description {
            row.description = Some(description.clone());
        }
        if let Some(link) = &update.link {
            row.link = link.clone();
        }
        if let Some(tags) = &update.tags {
            row.tags = Some(tags.clone());
        }
        if let Some(upvotes) = update.upvotes {
            row.upvotes = upvotes;
        }
        if let Some(downvotes) = update.downvotes {
            row.downvotes = downvotes;
        }
        row.rating = row.upvotes - row.downvotes;
        row.updated_at = Utc::now();
        row.version += 1;
        Ok(row.clone())
    }

    async fn delete_demo(&self, id: i64) -> Result<()> {
        self.lock()?
            .demos
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HangarError::NotFound(format!("demo {id}")))
    }
}

// ----------------------------------------------------------------------
// Forum
// ----------------------------------------------------------------------

impl Tables {
    /// Drop a thread and its messages, returning the message IDs.
    fn drop_thread(&mut self, id: i64) -> Option<Vec<i64>> {
        self.threads.remove(&id)?;
        let message_ids: Vec<i64> = self
            .messages
            .values()
            .filter(|m| m.thread_id == id)
            .map(|m| m.id)
            .collect();
        for message_id in &message_ids {
            self.messages.remove(message_id);
        }
        Some(message_ids)
    }
}

#[async_trait]
impl ForumStore for MemoryStore {
    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic> {
        check_title(&topic.name, "topic")?;
        let mut tables = self.lock()?;
        let row = Topic {
            id: tables.next_id(),
            name: topic.name.clone(),
            version: 1,
        };
        tables.topics.insert(row.id, row.clone());
        Ok(row)
    }

    async fn topic_by_id(&self, id: i64) -> Result<Topic> {
        self.lock()?
            .topics
            .get(&id)
            .cloned()
            .ok_or_else(|| HangarError::NotFound(format!("topic {id}")))
    }

    async fn find_topics(&self, query: &SearchQuery) -> Result<Vec<Topic>> {
        let tables = self.lock()?;
        let hits: Vec<Topic> = tables
            .topics
            .values()
            .filter(|t| keyword_hit(query, &[t.name.as_str()], None))
            .cloned()
            .collect();
        Ok(apply_limit(hits, query))
    }

    async fn update_topic(&self, id: i64, update: &TopicUpdate) -> Result<Topic> {
        if let Some(name) = &update.name {
            check_title(name, "topic")?;
        }
        let mut tables = self.lock()?;
        let row = tables
            .topics
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("topic {id}")))?;
        check_version(row.version, update.version, format!("topic {id}"))?;
        if let Some(name) = &update.name {
            row.name = name.clone();
        }
        row.version += 1;
        Ok(row.clone())
    }

    async fn delete_topic(&self, id: i64) -> Result<TopicRemoval> {
        let mut tables = self.lock()?;
        if tables.topics.remove(&id).is_none() {
            return Err(HangarError::NotFound(format!("topic {id}")));
        }
        let thread_ids: Vec<i64> = tables
            .threads
            .values()
            .filter(|t| t.topic_id == id)
            .map(|t| t.id)
            .collect();
        let mut message_ids = Vec::new();
        for thread_id in &thread_ids {
            message_ids.extend(tables.drop_thread(*thread_id).unwrap_or_default());
        }
        message_ids.sort_unstable();
        Ok(TopicRemoval {
            thread_ids,
            message_ids,
        })
    }

    async fn insert_thread(&self, thread: &NewThread) -> Result<Thread> {
        check_title(&thread.title, "thread")?;
        check_counter(Some(thread.upvotes), "thread")?;
        check_counter(Some(thread.downvotes), "thread")?;

        let mut tables = self.lock()?;
        if !tables.topics.contains_key(&thread.topic_id) {
            return Err(HangarError::Validation(
                "thread references a missing or in-use row".to_string(),
            ));
        }
        let now = Utc::now();
        let row = Thread {
            id: tables.next_id(),
            title: thread.title.clone(),
            user_id: thread.user_id,
            topic_id: thread.topic_id,
            tags: thread.tags.clone(),
            created_at: now,
            updated_at: now,
            upvotes: thread.upvotes,
            downvotes: thread.downvotes,
            views: 0,
            rating: thread.upvotes - thread.downvotes,
            version: 1,
        };
        tables.threads.insert(row.id, row.clone());
        Ok(row)
    }

    async fn thread_by_id(&self, id: i64, wanted: bool) -> Result<Thread> {
        let mut tables = self.lock()?;
        let row = tables
            .threads
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("thread {id}")))?;
        count_view(&mut row.views, wanted);
        Ok(row.clone())
    }

    async fn find_threads(&self, query: &SearchQuery) -> Result<Vec<Thread>> {
        Ok(search_counted(self.lock()?.threads.values(), query))
    }

    async fn update_thread(&self, id: i64, update: &ThreadUpdate) -> Result<Thread> {
        if let Some(title) = &update.title {
            check_title(title, "thread")?;
        }
        check_counter(update.upvotes, "thread")?;
        check_counter(update.downvotes, "thread")?;

        let mut tables = self.lock()?;
        let row = tables
            .threads
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("thread {id}")))?;
        check_version(row.version, update.version, format!("thread {id}"))?;

        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if let Some(tags) = &update.tags {
            row.tags = Some(tags.clone());
        }
        if let Some(upvotes) = update.upvotes {
            row.upvotes = upvotes;
        }
        if let Some(downvotes) = update.downvotes {
            row.downvotes = downvotes;
        }
        row.rating = row.upvotes - row.downvotes;
        row.updated_at = Utc::now();
        row.version += 1;
        Ok(row.clone())
    }

    async fn delete_thread(&self, id: i64) -> Result<Vec<i64>> {
        self.lock()?
            .drop_thread(id)
            .ok_or_else(|| HangarError::NotFound(format!("thread {id}")))
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        check_title(&message.title, "message")?;
        let mut tables = self.lock()?;
        if !tables.threads.contains_key(&message.thread_id) {
            return Err(HangarError::Validation(
                "message references a missing or in-use row".to_string(),
            ));
        }
        let now = Utc::now();
        let row = Message {
            id: tables.next_id(),
            thread_id: message.thread_id,
            user_id: message.user_id,
            title: message.title.clone(),
            body: message.body.clone(),
            tags: message.tags.clone(),
            created_at: now,
            updated_at: now,
            upvotes: 0,
            downvotes: 0,
            views: 0,
            rating: 0,
            version: 1,
        };
        tables.messages.insert(row.id, row.clone());
        Ok(row)
    }

    async fn message_by_id(&self, id: i64, wanted: bool) -> Result<Message> {
        let mut tables = self.lock()?;
        let row = tables
            .messages
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("message {id}")))?;
        count_view(&mut row.views, wanted);
        Ok(row.clone())
    }

    async fn find_messages(&self, query: &SearchQuery) -> Result<Vec<Message>> {
        Ok(search_counted(self.lock()?.messages.values(), query))
    }

    async fn messages_by_thread(&self, thread_id: i64, query: &SearchQuery) -> Result<Vec<Message>> {
        let tables = self.lock()?;
        Ok(search_counted(
            tables.messages.values().filter(|m| m.thread_id == thread_id),
            query,
        ))
    }

    async fn update_message(&self, id: i64, update: &MessageUpdate) -> Result<Message> {
        if let Some(title) = &update.title {
            check_title(title, "message")?;
        }
        check_counter(update.upvotes, "message")?;
        check_counter(update.downvotes, "message")?;

        let mut tables = self.lock()?;
        let row = tables
            .messages
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("message {id}")))?;
        check_version(row.version, update.version, format!("message {id}"))?;

        if let Some(title) = &update.title {
            row.title = title.clone();
        }
        if let Some(body) = &update.body {
            row.body = Some(body.clone());
        }
        if let Some(tags) = &update.tags {
            row.tags = Some(tags.clone());
        }
        if let Some(upvotes) = update.upvotes {
            row.upvotes = upvotes;
        }
        if let Some(downvotes) = update.downvotes {
            row.downvotes = downvotes;
        }
        row.rating = row.upvotes - row.downvotes;
        row.updated_at = Utc::now();
        row.version += 1;
        Ok(row.clone())
    }

    async fn delete_message(&self, id: i64) -> Result<()> {
        self.lock()?
            .messages
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HangarError::NotFound(format!("message {id}")))
    }
}

// ----------------------------------------------------------------------
// Users, roles and sessions
// ----------------------------------------------------------------------

impl Tables {
    fn user_named(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| same_name(&u.username, username))
    }

    fn user_mailed(&self, email: &str) -> Option<&User> {
        self.users.values().find(|u| same_name(&u.email, email))
    }

    fn role_named(&self, name: &str) -> Option<&Role> {
        self.roles.values().find(|r| same_name(&r.name, name))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let role_id = user
            .role_id
            .ok_or_else(|| HangarError::Validation("user has no role".to_string()))?;
        let mut tables = self.lock()?;
        if tables.user_named(&user.username).is_some() || tables.user_mailed(&user.email).is_some() {
            return Err(HangarError::Validation("user already exists".to_string()));
        }
        if !tables.roles.contains_key(&role_id) {
            return Err(HangarError::Validation(
                "user references a missing or in-use row".to_string(),
            ));
        }
        let row = User {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            password: user.password_hash.clone(),
            verified: false,
            role_id,
            created_at: Utc::now(),
            karma: 0,
            profile_pic_key: None,
            profile_pic: None,
            version: 1,
        };
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<User> {
        self.lock()?
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| HangarError::NotFound(format!("user {id}")))
    }

    async fn user_by_email(&self, email: &str) -> Result<User> {
        self.lock()?
            .user_mailed(email)
            .cloned()
            .ok_or_else(|| HangarError::NotFound("user".to_string()))
    }

    async fn user_by_username(&self, username: &str) -> Result<User> {
        self.lock()?
            .user_named(username)
            .cloned()
            .ok_or_else(|| HangarError::NotFound("user".to_string()))
    }

    async fn find_users(&self, query: &SearchQuery) -> Result<Vec<User>> {
        let tables = self.lock()?;
        let mut hits: Vec<User> = tables
            .users
            .values()
            .filter(|u| {
                let mut texts = vec![u.username.as_str()];
                if let Some(display_name) = &u.display_name {
                    texts.push(display_name);
                }
                keyword_hit(query, &texts, None)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            let primary = match query.order {
                SortOrder::HighestRated => b.karma.cmp(&a.karma),
                SortOrder::NewestUpdated => b.created_at.cmp(&a.created_at),
                SortOrder::MostViews | SortOrder::Default => std::cmp::Ordering::Equal,
            };
            primary.then_with(|| a.username.to_lowercase().cmp(&b.username.to_lowercase()))
        });
        Ok(apply_limit(hits, query))
    }

    async fn update_user(&self, id: Uuid, update: &UserUpdate) -> Result<User> {
        check_counter(update.karma, "user")?;
        let mut tables = self.lock()?;

        let clash = tables.users.values().any(|u| {
            u.id != id
                && (update.username.as_deref().is_some_and(|n| same_name(&u.username, n))
                    || update.email.as_deref().is_some_and(|e| same_name(&u.email, e)))
        });
        if clash {
            return Err(HangarError::Validation("user already exists".to_string()));
        }
        if let Some(role_id) = update.role_id {
            if !tables.roles.contains_key(&role_id) {
                return Err(HangarError::Validation(
                    "user references a missing or in-use row".to_string(),
                ));
            }
        }

        let row = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("user {id}")))?;
        check_version(row.version, update.version, format!("user {id}"))?;

        if let Some(username) = &update.username {
            row.username = username.clone();
        }
        if let Some(display_name) = &update.display_name {
            row.display_name = Some(display_name.clone());
        }
        if let Some(email) = &update.email {
            row.email = email.clone();
        }
        if let Some(verified) = update.verified {
            row.verified = verified;
        }
        if let Some(karma) = update.karma {
            row.karma = karma;
        }
        if let Some(role_id) = update.role_id {
            row.role_id = role_id;
        }
        row.version += 1;
        Ok(row.clone())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let row = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("user {id}")))?;
        row.password = password_hash.to_string();
        row.version += 1;
        Ok(())
    }

    async fn set_profile_key(&self, id: Uuid, key: &str) -> Result<()> {
        let mut tables = self.lock()?;
        let row = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("user {id}")))?;
        if row.profile_pic_key.as_deref() != Some(key) {
            row.profile_pic_key = Some(key.to_string());
            row.version += 1;
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let mut tables = self.lock()?;
        if tables.users.remove(&id).is_none() {
            return Err(HangarError::NotFound(format!("user {id}")));
        }
        let session_ids: Vec<Uuid> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == id)
            .map(|s| s.id)
            .collect();
        for session_id in &session_ids {
            tables.sessions.remove(session_id);
        }
        Ok(session_ids)
    }

    async fn insert_role(&self, name: &str) -> Result<Role> {
        if name.chars().count() > 255 {
            return Err(HangarError::Validation(
                "role violates a value constraint".to_string(),
            ));
        }
        let mut tables = self.lock()?;
        if tables.role_named(name).is_some() {
            return Err(HangarError::Validation("role already exists".to_string()));
        }
        let row = Role {
            id: Uuid::new_v4(),
            name: name.to_string(),
            version: 1,
        };
        tables.roles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn role_by_id(&self, id: Uuid) -> Result<Role> {
        self.lock()?
            .roles
            .get(&id)
            .cloned()
            .ok_or_else(|| HangarError::NotFound(format!("role {id}")))
    }

    async fn role_by_name(&self, name: &str) -> Result<Role> {
        self.lock()?
            .role_named(name)
            .cloned()
            .ok_or_else(|| HangarError::NotFound(format!("role {name}")))
    }

    async fn find_roles(&self, query: &SearchQuery) -> Result<Vec<Role>> {
        let tables = self.lock()?;
        let mut hits: Vec<Role> = tables
            .roles
            .values()
            .filter(|r| !query.has_keywords() || query.keywords.iter().any(|k| same_name(&r.name, k)))
            .cloned()
            .collect();
        hits.sort_by_key(|r| r.name.to_lowercase());
        Ok(apply_limit(hits, query))
    }

    async fn update_role(&self, id: Uuid, update: &RoleUpdate) -> Result<Role> {
        let mut tables = self.lock()?;
        if let Some(name) = &update.name {
            if tables.role_named(name).is_some_and(|r| r.id != id) {
                return Err(HangarError::Validation("role already exists".to_string()));
            }
        }
        let row = tables
            .roles
            .get_mut(&id)
            .ok_or_else(|| HangarError::NotFound(format!("role {id}")))?;
        check_version(row.version, update.version, format!("role {id}"))?;
        if let Some(name) = &update.name {
            row.name = name.clone();
        }
        row.version += 1;
        Ok(row.clone())
    }

    async fn delete_role(&self, id: Uuid) -> Result<Role> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|u| u.role_id == id) {
            return Err(HangarError::Validation(
                "role references a missing or in-use row".to_string(),
            ));
        }
        tables
            .roles
            .remove(&id)
            .ok_or_else(|| HangarError::NotFound(format!("role {id}")))
    }

    async fn insert_session(&self, user_id: Uuid) -> Result<Session> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&user_id) {
            return Err(HangarError::Validation(
                "session references a missing or in-use row".to_string(),
            ));
        }
        let row = Session {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
        };
        tables.sessions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn session_by_id(&self, id: Uuid) -> Result<Session> {
        self.lock()?
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| HangarError::NotFound(format!("session {id}")))
    }

    async fn sessions_of_user(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let tables = self.lock()?;
        let mut sessions: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        self.lock()?
            .sessions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HangarError::NotFound(format!("session {id}")))
    }

    async fn delete_sessions_of_user(&self, user_id: Uuid) -> Result<u64> {
        let mut tables = self.lock()?;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - tables.sessions.len()) as u64)
    }
}

// ----------------------------------------------------------------------
// Permission tuples
// ----------------------------------------------------------------------

#[async_trait]
impl PolicyAdapter for MemoryStore {
    async fn load(&self) -> Result<PolicySnapshot> {
        let tables = self.lock()?;
        Ok(PolicySnapshot {
            rules: tables.rules.iter().cloned().collect(),
            groupings: tables.groupings.iter().cloned().collect(),
        })
    }

    async fn add_rule(&self, rule: &Rule) -> Result<bool> {
        Ok(self.lock()?.rules.insert(rule.clone()))
    }

    async fn remove_rule(&self, rule: &Rule) -> Result<bool> {
        Ok(self.lock()?.rules.remove(rule))
    }

    async fn remove_object(&self, object: &str, action: Option<&str>) -> Result<u64> {
        let mut tables = self.lock()?;
        let before = tables.rules.len();
        tables
            .rules
            .retain(|r| !(r.object == object && action.map_or(true, |a| r.action == a)));
        Ok((before - tables.rules.len()) as u64)
    }

    async fn remove_subject(&self, subject: &str) -> Result<u64> {
        let mut tables = self.lock()?;
        let before = tables.rules.len() + tables.groupings.len();
        tables.rules.retain(|r| r.subject != subject);
        tables
            .groupings
            .retain(|g| g.member != subject && g.parent != subject);
        Ok((before - tables.rules.len() - tables.groupings.len()) as u64)
    }

    async fn add_grouping(&self, grouping: &Grouping) -> Result<bool> {
        Ok(self.lock()?.groupings.insert(grouping.clone()))
    }
}

// ----------------------------------------------------------------------
// Objects
// ----------------------------------------------------------------------

/// Object store that keeps files in a map.
///
/// Links look like `memory://<key>`.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents stored under `key`.
    pub fn contents(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.objects
            .lock()
            .map_err(|_| HangarError::Internal("object store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: Option<&str>) -> Result<()> {
        self.lock()?.insert(key.to_string(), data);
        Ok(())
    }

    async fn get_link(&self, key: &str) -> Result<String> {
        if self.lock()?.contains_key(key) {
            Ok(format!("memory://{key}"))
        } else {
            Err(HangarError::ObjectNotFound(key.to_string()))
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| HangarError::ObjectNotFound(key.to_string()))
    }
}
