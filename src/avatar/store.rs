//! 头像描述持久化
//!
//! avatar_descriptions 表，(platform, user_id) 唯一；重复写入同一身份时覆盖而不是追加。
//! 记录不会自动过期，失效只能手动删除或重新分析。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::core::AvatarError;

/// 一条头像描述记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarDescription {
    pub person_id: String,
    pub platform: String,
    pub user_id: String,
    pub head_description: String,
    pub avatar_url: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// 头像描述存储接口
#[async_trait]
pub trait AvatarRepository: Send + Sync {
    async fn get(&self, platform: &str, user_id: &str)
        -> Result<Option<AvatarDescription>, AvatarError>;

    /// 按 (platform, user_id) 插入或覆盖
    async fn upsert(&self, record: &AvatarDescription) -> Result<(), AvatarError>;

    async fn delete(&self, platform: &str, user_id: &str) -> Result<bool, AvatarError>;

    async fn count(&self) -> Result<usize, AvatarError>;
}

/// SQLite 实现；语句在 spawn_blocking 中执行，不占用 runtime 工作线程
pub struct SqliteAvatarStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAvatarStore {
    /// 打开（必要时创建）数据库文件并建表；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AvatarError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, AvatarError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AvatarError> {
        init_schema(&conn)?;
        tracing::info!("avatar_descriptions table ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 在阻塞线程池里拿锁并执行同步语句
    async fn with_conn<T, F>(&self, f: F) -> Result<T, AvatarError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&*guard)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(result?)
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS avatar_descriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id TEXT NOT NULL,
            platform TEXT NOT NULL,
            user_id TEXT NOT NULL,
            head_description TEXT NOT NULL,
            analyzed_at TEXT NOT NULL,
            avatar_url TEXT,
            UNIQUE(platform, user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_avatar_descriptions_person
            ON avatar_descriptions(person_id);",
    )
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AvatarDescription> {
    Ok(AvatarDescription {
        person_id: row.get(0)?,
        platform: row.get(1)?,
        user_id: row.get(2)?,
        head_description: row.get(3)?,
        analyzed_at: row.get(4)?,
        avatar_url: row.get(5)?,
    })
}

const SELECT_COLUMNS: &str =
    "SELECT person_id, platform, user_id, head_description, analyzed_at, avatar_url
     FROM avatar_descriptions";

#[async_trait]
impl AvatarRepository for SqliteAvatarStore {
    async fn get(
        &self,
        platform: &str,
        user_id: &str,
    ) -> Result<Option<AvatarDescription>, AvatarError> {
        let (platform, user_id) = (platform.to_string(), user_id.to_string());
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{} WHERE platform = ?1 AND user_id = ?2", SELECT_COLUMNS),
                params![platform, user_id],
                row_to_record,
            )
            .optional()
        })
        .await
    }

    async fn upsert(&self, record: &AvatarDescription) -> Result<(), AvatarError> {
        let row = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO avatar_descriptions
                    (person_id, platform, user_id, head_description, analyzed_at, avatar_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(platform, user_id) DO UPDATE SET
                    person_id = excluded.person_id,
                    head_description = excluded.head_description,
                    analyzed_at = excluded.analyzed_at,
                    avatar_url = COALESCE(excluded.avatar_url, avatar_descriptions.avatar_url)",
                params![
                    row.person_id,
                    row.platform,
                    row.user_id,
                    row.head_description,
                    row.analyzed_at,
                    row.avatar_url,
                ],
            )
        })
        .await?;
        tracing::debug!(
            platform = %record.platform,
            user_id = %record.user_id,
            "avatar description upserted"
        );
        Ok(())
    }

    async fn delete(&self, platform: &str, user_id: &str) -> Result<bool, AvatarError> {
        let (platform, user_id) = (platform.to_string(), user_id.to_string());
        let n = self
            .with_conn(move |conn| {
                conn.execute(
                    "DELETE FROM avatar_descriptions WHERE platform = ?1 AND user_id = ?2",
                    params![platform, user_id],
                )
            })
            .await?;
        Ok(n > 0)
    }

    async fn count(&self) -> Result<usize, AvatarError> {
        let n: i64 = self
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM avatar_descriptions", [], |row| row.get(0))
            })
            .await?;
        Ok(n as usize)
    }
}
