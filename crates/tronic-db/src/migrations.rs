use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            username        TEXT NOT NULL UNIQUE,
            display_name    TEXT NOT NULL,
            password_hash   TEXT NOT NULL,
            role            TEXT NOT NULL DEFAULT 'user',
            avatar_url      TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token       TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            expires_at  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions(user_id);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            room_id     TEXT NOT NULL,
            content     TEXT NOT NULL,
            ai_response TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room_id, created_at);

        CREATE TABLE IF NOT EXISTS command_logs (
            id                  TEXT PRIMARY KEY,
            user_id             TEXT NOT NULL REFERENCES users(id),
            command             TEXT NOT NULL,
            status              TEXT NOT NULL
                                CHECK (status IN ('running', 'completed', 'failed')),
            output              TEXT,
            execution_time_ms   INTEGER,
            created_at          TEXT NOT NULL,
            completed_at        TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_command_logs_user
            ON command_logs(user_id, created_at);

        CREATE TABLE IF NOT EXISTS user_activity (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            action      TEXT NOT NULL,
            details     TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_user_activity_user
            ON user_activity(user_id, created_at);

        CREATE TABLE IF NOT EXISTS system_metrics (
            id           TEXT PRIMARY KEY,
            metric_name  TEXT NOT NULL,
            metric_value REAL NOT NULL,
            metric_unit  TEXT,
            tags         TEXT NOT NULL DEFAULT '{}',
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_system_metrics_created
            ON system_metrics(created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
