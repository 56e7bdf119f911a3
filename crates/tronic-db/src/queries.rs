use crate::models::{ActivityRow, CommandLogRow, MessageRow, MetricRow, SessionRow, UserRow};
use crate::{Database, now_rfc3339};
use anyhow::Result;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        username: &str,
        display_name: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, username, display_name, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, email, username, display_name, password_hash, now_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, token: &str, user_id: &str, expires_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![token, user_id, expires_at, now_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, token: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT token, user_id, expires_at, created_at FROM sessions WHERE token = ?1",
                    [token],
                    |row| {
                        Ok(SessionRow {
                            token: row.get(0)?,
                            user_id: row.get(1)?,
                            expires_at: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
            Ok(())
        })
    }

    /// Sessions whose expiry is still in the future.
    pub fn count_active_sessions(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM sessions WHERE expires_at > ?1",
                [now_rfc3339()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        user_id: &str,
        room_id: &str,
        content: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, user_id, room_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, user_id, room_id, content, created_at],
            )?;
            Ok(())
        })
    }

    /// The single allowed message mutation: attach the AI reply.
    pub fn set_message_ai_response(&self, id: &str, ai_response: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET ai_response = ?1 WHERE id = ?2",
                rusqlite::params![ai_response, id],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{MESSAGE_SELECT} WHERE m.id = ?1"),
                    [id],
                    map_message_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Room history, newest first. `before` is a created_at cursor from the
    /// previous page; callers reverse the result for ascending display order.
    pub fn get_room_messages(
        &self,
        room_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = match before {
                Some(_) => format!(
                    "{MESSAGE_SELECT} WHERE m.room_id = ?1 AND m.created_at < ?3
                     ORDER BY m.created_at DESC LIMIT ?2"
                ),
                None => format!(
                    "{MESSAGE_SELECT} WHERE m.room_id = ?1
                     ORDER BY m.created_at DESC LIMIT ?2"
                ),
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = match before {
                Some(cursor) => stmt
                    .query_map(rusqlite::params![room_id, limit, cursor], map_message_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                None => stmt
                    .query_map(rusqlite::params![room_id, limit], map_message_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })
    }

    pub fn recent_messages(&self, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT} ORDER BY m.created_at DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_messages_by_user(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Command logs --

    pub fn insert_command_log(&self, id: &str, user_id: &str, command: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO command_logs (id, user_id, command, status, created_at)
                 VALUES (?1, ?2, ?3, 'running', ?4)",
                rusqlite::params![id, user_id, command, now_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Move a command log from `running` to a terminal state. Guarded on the
    /// current status so the transition can only happen once; returns whether
    /// a row was updated.
    pub fn finish_command_log(
        &self,
        id: &str,
        status: &str,
        output: &str,
        execution_time_ms: u64,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE command_logs
                 SET status = ?1, output = ?2, execution_time_ms = ?3, completed_at = ?4
                 WHERE id = ?5 AND status = 'running'",
                rusqlite::params![status, output, execution_time_ms, now_rfc3339(), id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn get_command_log(&self, id: &str) -> Result<Option<CommandLogRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{COMMAND_SELECT} WHERE id = ?1"),
                    [id],
                    map_command_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_command_logs(&self, user_id: &str, limit: u32, offset: u32) -> Result<Vec<CommandLogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{COMMAND_SELECT} WHERE user_id = ?1
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit, offset], map_command_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_commands_by_user(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM command_logs WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Activity --

    pub fn insert_activity(&self, id: &str, user_id: &str, action: &str, details: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_activity (id, user_id, action, details, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, user_id, action, details, now_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn get_activity(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
        action: Option<&str>,
    ) -> Result<Vec<ActivityRow>> {
        self.with_conn(|conn| {
            let sql = match action {
                Some(_) => {
                    "SELECT id, user_id, action, details, created_at FROM user_activity
                     WHERE user_id = ?1 AND action = ?4
                     ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
                }
                None => {
                    "SELECT id, user_id, action, details, created_at FROM user_activity
                     WHERE user_id = ?1
                     ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
                }
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = match action {
                Some(tag) => stmt
                    .query_map(rusqlite::params![user_id, limit, offset, tag], map_activity_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                None => stmt
                    .query_map(rusqlite::params![user_id, limit, offset], map_activity_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })
    }

    // -- Metrics --

    pub fn insert_metric(
        &self,
        id: &str,
        metric_name: &str,
        metric_value: f64,
        metric_unit: Option<&str>,
        tags: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO system_metrics (id, metric_name, metric_value, metric_unit, tags, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, metric_name, metric_value, metric_unit, tags, now_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn recent_metrics(&self, limit: u32) -> Result<Vec<MetricRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT metric_name, metric_value, metric_unit, tags, created_at
                 FROM system_metrics ORDER BY created_at DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(MetricRow {
                        metric_name: row.get(0)?,
                        metric_value: row.get(1)?,
                        metric_unit: row.get(2)?,
                        tags: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Liveness probe for the health endpoint.
    pub fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
    }
}

const USER_SELECT: &str =
    "SELECT id, email, username, display_name, password_hash, role, avatar_url, created_at
     FROM users";

fn query_user(
    conn: &rusqlite::Connection,
    column: &str,
    value: &str,
) -> Result<Option<UserRow>> {
    // `column` is always a compile-time literal from the lookup methods above.
    conn.query_row(
        &format!("{USER_SELECT} WHERE {column} = ?1"),
        [value],
        map_user_row,
    )
    .optional()
}

// JOIN users so author display info comes back in a single query
const MESSAGE_SELECT: &str =
    "SELECT m.id, m.user_id, m.room_id, m.content, m.ai_response, u.username, u.display_name, m.created_at
     FROM messages m
     LEFT JOIN users u ON m.user_id = u.id";

const COMMAND_SELECT: &str =
    "SELECT id, user_id, command, status, output, execution_time_ms, created_at, completed_at
     FROM command_logs";

fn map_user_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        display_name: row.get(3)?,
        password_hash: row.get(4)?,
        role: row.get(5)?,
        avatar_url: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_message_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        room_id: row.get(2)?,
        content: row.get(3)?,
        ai_response: row.get(4)?,
        author_username: row.get(5)?,
        author_display_name: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_command_row(row: &rusqlite::Row<'_>) -> std::result::Result<CommandLogRow, rusqlite::Error> {
    Ok(CommandLogRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        command: row.get(2)?,
        status: row.get(3)?,
        output: row.get(4)?,
        execution_time_ms: row.get(5)?,
        created_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

fn map_activity_row(row: &rusqlite::Row<'_>) -> std::result::Result<ActivityRow, rusqlite::Error> {
    Ok(ActivityRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action: row.get(2)?,
        details: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::to_rfc3339;
    use chrono::{Duration, Utc};

    fn db_with_user(id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(id, &format!("{id}@example.com"), id, id, "hash")
            .unwrap();
        db
    }

    #[test]
    fn user_lookups_match_on_exactly_one_column() {
        let db = db_with_user("alice");

        let by_email = db
            .get_user_by_email("alice@example.com")
            .unwrap()
            .expect("found by email");
        assert_eq!(by_email.username, "alice");
        assert_eq!(by_email.role, "user");

        let by_name = db
            .get_user_by_username("alice")
            .unwrap()
            .expect("found by username");
        assert_eq!(by_name.email, "alice@example.com");
        assert!(db.get_user_by_id(&by_name.id).unwrap().is_some());

        // Each lookup matches its own column only.
        assert!(db.get_user_by_email("alice").unwrap().is_none());
        assert!(db.get_user_by_username("alice@example.com").unwrap().is_none());
        assert!(db.get_user_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn session_lifecycle() {
        let db = db_with_user("alice");
        let expires = to_rfc3339(Utc::now() + Duration::hours(24));

        db.create_session("tok-1", "alice", &expires).unwrap();
        let session = db.get_session("tok-1").unwrap().expect("session exists");
        assert_eq!(session.user_id, "alice");
        assert_eq!(db.count_active_sessions().unwrap(), 1);

        db.delete_session("tok-1").unwrap();
        assert!(db.get_session("tok-1").unwrap().is_none());
        assert_eq!(db.count_active_sessions().unwrap(), 0);
    }

    #[test]
    fn expired_sessions_are_not_active() {
        let db = db_with_user("alice");
        let expired = to_rfc3339(Utc::now() - Duration::hours(1));
        db.create_session("tok-old", "alice", &expired).unwrap();
        assert_eq!(db.count_active_sessions().unwrap(), 0);
    }

    #[test]
    fn room_messages_come_back_newest_first_and_scoped() {
        let db = db_with_user("alice");
        db.insert_message("m1", "alice", "general", "first", "2026-01-01T00:00:00.000001Z")
            .unwrap();
        db.insert_message("m2", "alice", "general", "second", "2026-01-01T00:00:00.000002Z")
            .unwrap();
        db.insert_message("m3", "alice", "other", "elsewhere", "2026-01-01T00:00:00.000003Z")
            .unwrap();

        let rows = db.get_room_messages("general", 50, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "second");
        assert_eq!(rows[1].content, "first");
        assert_eq!(rows[0].author_username.as_deref(), Some("alice"));
    }

    #[test]
    fn message_cursor_pages_older_history() {
        let db = db_with_user("alice");
        for i in 1..=5 {
            db.insert_message(
                &format!("m{i}"),
                "alice",
                "general",
                &format!("msg {i}"),
                &format!("2026-01-01T00:00:00.00000{i}Z"),
            )
            .unwrap();
        }

        let page = db
            .get_room_messages("general", 10, Some("2026-01-01T00:00:00.000004Z"))
            .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].content, "msg 3");
    }

    #[test]
    fn ai_response_attachment_is_the_only_mutation() {
        let db = db_with_user("alice");
        db.insert_message("m1", "alice", "ai-assistant", "What is 2+2?", &crate::now_rfc3339())
            .unwrap();
        db.set_message_ai_response("m1", "4").unwrap();

        let row = db.get_message("m1").unwrap().unwrap();
        assert_eq!(row.content, "What is 2+2?");
        assert_eq!(row.ai_response.as_deref(), Some("4"));
    }

    #[test]
    fn command_log_transitions_exactly_once() {
        let db = db_with_user("alice");
        db.insert_command_log("c1", "alice", "ls -la").unwrap();

        assert!(db.finish_command_log("c1", "completed", "listing...", 120).unwrap());
        // A second transition attempt must not touch the row.
        assert!(!db.finish_command_log("c1", "failed", "late", 999).unwrap());

        let row = db.get_command_log("c1").unwrap().unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.output.as_deref(), Some("listing..."));
        assert_eq!(row.execution_time_ms, Some(120));
        assert!(row.completed_at.is_some());
    }

    #[test]
    fn activity_filter_by_action() {
        let db = db_with_user("alice");
        db.insert_activity("a1", "alice", "login", "{}").unwrap();
        db.insert_activity("a2", "alice", "send_message", r#"{"room_id":"general"}"#)
            .unwrap();

        let all = db.get_activity("alice", 50, 0, None).unwrap();
        assert_eq!(all.len(), 2);

        let logins = db.get_activity("alice", 50, 0, Some("login")).unwrap();
        assert_eq!(logins.len(), 1);
        assert_eq!(logins[0].action, "login");
    }

    #[test]
    fn metrics_round_trip() {
        let db = Database::open_in_memory().unwrap();
        db.insert_metric("mt1", "cpu_load", 0.42, Some("ratio"), r#"{"host":"a"}"#)
            .unwrap();
        let metrics = db.recent_metrics(10).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].metric_name, "cpu_load");
    }
}
