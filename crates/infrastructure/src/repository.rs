use application::MessageRepository;
use async_trait::async_trait;
use domain::{Message, MessageContent, MessageId, RepositoryError, RoomId, UserId};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(db_err.message().to_string());
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::Corrupt(message.into())
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    sender_id: String,
    sender_name: String,
    content: String,
    created_at: OffsetDateTime,
    sequence: i64,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let sequence = u64::try_from(record.sequence)
            .map_err(|_| invalid_data(format!("negative sequence {}", record.sequence)))?;
        Ok(Message {
            id: MessageId::from(record.id),
            sender_id: UserId::parse(record.sender_id)
                .map_err(|err| invalid_data(err.to_string()))?,
            sender_name: record.sender_name,
            content: MessageContent::new(record.content)
                .map_err(|err| invalid_data(err.to_string()))?,
            created_at: record.created_at,
            sequence,
        })
    }
}

/// PostgreSQL 消息仓储
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(&self, room_id: &RoomId, message: &Message) -> Result<(), RepositoryError> {
        let sequence = i64::try_from(message.sequence)
            .map_err(|_| invalid_data(format!("sequence {} out of range", message.sequence)))?;

        sqlx::query(
            r#"
            INSERT INTO messages (room_id, sequence, id, sender_id, sender_name, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(room_id.as_str())
        .bind(sequence)
        .bind(Uuid::from(message.id))
        .bind(message.sender_id.as_str())
        .bind(&message.sender_name)
        .bind(message.content.as_str())
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }

    async fn load_room(&self, room_id: &RoomId) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, sender_id, sender_name, content, created_at, sequence
            FROM messages
            WHERE room_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(room_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        tracing::debug!(room_id = %room_id, count = records.len(), "loaded room history");
        records.into_iter().map(Message::try_from).collect()
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
