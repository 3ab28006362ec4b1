use sqlx::SqlitePool;

// messages.seq orders equal timestamps by insertion.
// messages.room_key is the room id case-folded in Rust, for participation
// lookups; SQLite's lower() only folds ASCII.
// message_readers holds one row per (message, reader) so marking read is a
// row insert rather than a rewrite of the message.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        room_id TEXT NOT NULL,
        room_key TEXT NOT NULL,
        sender_id TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}'
    )",
    "CREATE INDEX IF NOT EXISTS messages_by_room ON messages (room_id, created_at DESC, seq DESC)",
    "CREATE TABLE IF NOT EXISTS message_readers (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id TEXT NOT NULL REFERENCES messages (id),
        user_id TEXT NOT NULL,
        UNIQUE (message_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS profiles (
        user_id TEXT PRIMARY KEY,
        handle TEXT NOT NULL,
        alias TEXT NOT NULL
    )",
];

pub async fn init_schema(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}
