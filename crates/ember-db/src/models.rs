/// Database row types — these map directly to SQLite rows.
/// Distinct from ember-types API models to keep the DB layer independent.

pub struct MessageRow {
    pub id: String,
    pub match_id: String,
    pub sender_id: String,
    pub sender_nickname: String,
    pub text: String,
    pub created_at: String,
}

pub struct ReportRow {
    pub id: String,
    pub reporter_id: String,
    pub reporter_nickname: String,
    pub reported_id: String,
    pub reported_nickname: String,
    pub match_id: String,
    pub reason: String,
    pub created_at: String,
}
