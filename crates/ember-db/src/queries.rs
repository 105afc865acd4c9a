use crate::Database;
use crate::models::{MessageRow, ReportRow};
use anyhow::Result;
use rusqlite::Connection;

use ember_types::models::{Message, Report};

impl Database {
    // -- Messages --

    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, match_id, sender_id, sender_nickname, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    message.id.to_string(),
                    message.match_id.to_string(),
                    message.sender_id.to_string(),
                    message.sender_nickname,
                    message.text,
                    message.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Messages for a match ordered oldest-first. `before` is a keyset
    /// cursor: pass the `created_at` of the oldest message from the previous
    /// page to fetch older ones.
    pub fn get_messages(
        &self,
        match_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, match_id, limit, before))
    }

    // -- Reports --

    pub fn insert_report(&self, report: &Report) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reports (id, reporter_id, reporter_nickname, reported_id,
                                      reported_nickname, match_id, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    report.id.to_string(),
                    report.reporter_id.to_string(),
                    report.reporter_nickname,
                    report.reported_id.to_string(),
                    report.reported_nickname,
                    report.match_id.to_string(),
                    report.reason,
                    report.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_reports_for_user(&self, reported_id: &str) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, reporter_id, reporter_nickname, reported_id, reported_nickname,
                        match_id, reason, created_at
                 FROM reports
                 WHERE reported_id = ?1
                 ORDER BY created_at DESC",
            )?;

            let rows = stmt
                .query_map([reported_id], |row| {
                    Ok(ReportRow {
                        id: row.get(0)?,
                        reporter_id: row.get(1)?,
                        reporter_nickname: row.get(2)?,
                        reported_id: row.get(3)?,
                        reported_nickname: row.get(4)?,
                        match_id: row.get(5)?,
                        reason: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_messages(
    conn: &Connection,
    match_id: &str,
    limit: u32,
    before: Option<&str>,
) -> Result<Vec<MessageRow>> {
    let mut sql = String::from(
        "SELECT id, match_id, sender_id, sender_nickname, text, created_at
         FROM messages
         WHERE match_id = ?1",
    );
    if before.is_some() {
        sql.push_str(" AND created_at < ?3");
    }
    sql.push_str(" ORDER BY created_at ASC LIMIT ?2");

    let mut stmt = conn.prepare(&sql)?;

    let map_row = |row: &rusqlite::Row<'_>| {
        Ok(MessageRow {
            id: row.get(0)?,
            match_id: row.get(1)?,
            sender_id: row.get(2)?,
            sender_nickname: row.get(3)?,
            text: row.get(4)?,
            created_at: row.get(5)?,
        })
    };

    let rows = match before {
        Some(cursor) => stmt
            .query_map(rusqlite::params![match_id, limit, cursor], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt
            .query_map(rusqlite::params![match_id, limit], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn message(match_id: Uuid, text: &str, offset_secs: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            match_id,
            sender_id: Uuid::new_v4(),
            sender_nickname: "ana".to_string(),
            text: text.to_string(),
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn messages_round_trip_in_order() {
        let db = Database::open_in_memory().unwrap();
        let match_id = Uuid::new_v4();

        db.insert_message(&message(match_id, "first", 0)).unwrap();
        db.insert_message(&message(match_id, "third", 2)).unwrap();
        db.insert_message(&message(match_id, "second", 1)).unwrap();
        db.insert_message(&message(Uuid::new_v4(), "other match", 0))
            .unwrap();

        let rows = db.get_messages(&match_id.to_string(), 50, None).unwrap();
        let texts: Vec<_> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn message_cursor_pages_backwards() {
        let db = Database::open_in_memory().unwrap();
        let match_id = Uuid::new_v4();
        for i in 0..5 {
            db.insert_message(&message(match_id, &format!("m{}", i), i))
                .unwrap();
        }

        let all = db.get_messages(&match_id.to_string(), 50, None).unwrap();
        let cursor = all[3].created_at.clone();
        let older = db
            .get_messages(&match_id.to_string(), 50, Some(cursor.as_str()))
            .unwrap();
        assert_eq!(older.len(), 3);
        assert_eq!(older.last().unwrap().text, "m2");
    }

    #[test]
    fn reports_append_without_dedup() {
        let db = Database::open_in_memory().unwrap();
        let reported = Uuid::new_v4();

        let mut report = Report {
            id: Uuid::new_v4(),
            reporter_id: Uuid::new_v4(),
            reporter_nickname: "ana".to_string(),
            reported_id: reported,
            reported_nickname: "ben".to_string(),
            match_id: Uuid::new_v4(),
            reason: "spam".to_string(),
            created_at: Utc::now(),
        };
        db.insert_report(&report).unwrap();

        // Same reporter, same reason, new id: still appended.
        report.id = Uuid::new_v4();
        db.insert_report(&report).unwrap();

        let rows = db.get_reports_for_user(&reported.to_string()).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
