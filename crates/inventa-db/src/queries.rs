use crate::Database;
use crate::models::{
    DocumentRow, EncryptedContent, ExportRows, LoginEventRow, NewDocument, RegisterOutcome,
    StatsRow, UserInsert, UserRow,
};
use anyhow::{Result, anyhow};
use inventa_types::models::User;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, username, email, password, public_key, wrapped_private_key, \
     private_key_nonce, key_salt, created_at";

const DOCUMENT_COLUMNS: &str = "id, owner_id, filename, fingerprint, signature, file_size, \
     owner_name, description, document_type, work_type, pow_filename, pow_fingerprint, pow_size, \
     created_at";

const LOGIN_COLUMNS: &str =
    "id, user_id, email, display_name, action, outcome, fail_reason, user_agent, created_at";

impl Database {
    // -- Users --

    /// Insert a user. Email (case-insensitive) and username uniqueness are
    /// enforced by the schema, so concurrent registrations cannot both win.
    pub fn create_user(&self, user: &UserRow) -> Result<UserInsert> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                rusqlite::params![
                    user.id,
                    user.username,
                    user.email,
                    user.password,
                    user.public_key,
                    user.wrapped_private_key,
                    user.private_key_nonce,
                    user.key_salt,
                    user.created_at,
                ],
            );

            match inserted {
                Ok(_) => Ok(UserInsert::Created),
                Err(e) if is_unique_violation(&e) => {
                    if query_user(conn, "email = ?1", &user.email)?.is_some() {
                        Ok(UserInsert::EmailTaken)
                    } else {
                        Ok(UserInsert::UsernameTaken)
                    }
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.iter().map(UserRow::to_user).collect()
        })
    }

    // -- Documents --

    /// Insert-if-absent keyed by fingerprint. The check and the insert are a
    /// single statement guarded by the UNIQUE constraint; on conflict the
    /// record already holding the fingerprint is returned.
    pub fn register_document(&self, doc: &NewDocument) -> Result<RegisterOutcome> {
        self.with_conn(|conn| {
            let row = &doc.row;
            let content = &doc.content;
            let inserted = conn.execute(
                &format!(
                    "INSERT INTO documents ({DOCUMENT_COLUMNS}, ciphertext, nonce, wrapped_key, key_nonce)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                ),
                rusqlite::params![
                    row.id,
                    row.owner_id,
                    row.filename,
                    row.fingerprint,
                    row.signature,
                    row.file_size,
                    row.owner_name,
                    row.description,
                    row.document_type,
                    row.work_type,
                    row.pow_filename,
                    row.pow_fingerprint,
                    row.pow_size,
                    row.created_at,
                    content.ciphertext,
                    content.nonce,
                    content.wrapped_key,
                    content.key_nonce,
                ],
            );

            match inserted {
                Ok(_) => Ok(RegisterOutcome::Inserted),
                Err(e) if is_unique_violation(&e) => {
                    let existing = query_document(conn, "fingerprint = ?1", &row.fingerprint)?
                        .ok_or_else(|| anyhow!("Unique violation on document {} without a fingerprint match", row.id))?;
                    Ok(RegisterOutcome::Duplicate(existing))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_document(&self, id: &str) -> Result<Option<DocumentRow>> {
        self.with_conn(|conn| query_document(conn, "id = ?1", id))
    }

    /// Exact fingerprint match only.
    pub fn get_document_by_fingerprint(&self, fingerprint: &str) -> Result<Option<DocumentRow>> {
        self.with_conn(|conn| query_document(conn, "fingerprint = ?1", fingerprint))
    }

    pub fn get_document_content(&self, id: &str) -> Result<Option<EncryptedContent>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT ciphertext, nonce, wrapped_key, key_nonce FROM documents WHERE id = ?1",
                [id],
                |row| {
                    Ok(EncryptedContent {
                        ciphertext: row.get(0)?,
                        nonce: row.get(1)?,
                        wrapped_key: row.get(2)?,
                        key_nonce: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Newest first; documents registered in the same millisecond are ordered
    /// by insertion, latest first.
    pub fn list_documents_by_owner(&self, owner_id: &str) -> Result<Vec<DocumentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC, seq DESC"
            ))?;
            let rows = stmt
                .query_map([owner_id], map_document)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_all_documents(&self) -> Result<Vec<DocumentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC, seq DESC"
            ))?;
            let rows = stmt
                .query_map([], map_document)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a document only if `owner_id` owns it. Returns whether a row was removed.
    pub fn delete_document(&self, id: &str, owner_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM documents WHERE id = ?1 AND owner_id = ?2",
                [id, owner_id],
            )?;
            Ok(removed > 0)
        })
    }

    // -- Login history --

    pub fn record_login(&self, event: &LoginEventRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO login_history ({LOGIN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                rusqlite::params![
                    event.id,
                    event.user_id,
                    event.email,
                    event.display_name,
                    event.action,
                    event.outcome,
                    event.fail_reason,
                    event.user_agent,
                    event.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Most recent first.
    pub fn login_history(&self, limit: u32) -> Result<Vec<LoginEventRow>> {
        self.with_conn(|conn| query_login_history(conn, Some(limit)))
    }

    // -- Admin --

    /// `today` is a `YYYY-MM-DD` prefix matched against event timestamps.
    pub fn stats(&self, today: &str) -> Result<StatsRow> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64> {
                let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(n.max(0) as u64)
            };

            let today_logins: i64 = conn.query_row(
                "SELECT COUNT(*) FROM login_history WHERE created_at LIKE ?1 || '%'",
                [today],
                |row| row.get(0),
            )?;

            Ok(StatsRow {
                users: count("SELECT COUNT(*) FROM users")?,
                documents: count("SELECT COUNT(*) FROM documents")?,
                login_history: count("SELECT COUNT(*) FROM login_history")?,
                successful_logins: count(
                    "SELECT COUNT(*) FROM login_history WHERE outcome = 'success'",
                )?,
                failed_logins: count(
                    "SELECT COUNT(*) FROM login_history WHERE outcome = 'failure'",
                )?,
                unique_users: count(
                    "SELECT COUNT(DISTINCT user_id) FROM login_history WHERE user_id IS NOT NULL",
                )?,
                today_logins: today_logins.max(0) as u64,
            })
        })
    }

    pub fn export_all(&self) -> Result<ExportRows> {
        let users = self.list_users()?;
        let documents = self
            .list_all_documents()?
            .into_iter()
            .map(DocumentRow::into_document)
            .collect::<Result<Vec<_>>>()?;
        let login_history = self
            .with_conn(|conn| query_login_history(conn, None))?
            .into_iter()
            .map(LoginEventRow::into_event)
            .collect::<Result<Vec<_>>>()?;

        Ok(ExportRows {
            users,
            documents,
            login_history,
        })
    }

    /// Remove every user, document and login event.
    pub fn clear_all(&self) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM documents", [])?;
            tx.execute("DELETE FROM login_history", [])?;
            tx.execute("DELETE FROM users", [])?;
            tx.commit()?;
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}"))?;
    stmt.query_row([value], map_user).optional()
}

fn query_document(conn: &Connection, predicate: &str, value: &str) -> Result<Option<DocumentRow>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE {predicate}"))?;
    stmt.query_row([value], map_document).optional()
}

fn query_login_history(conn: &Connection, limit: Option<u32>) -> Result<Vec<LoginEventRow>> {
    // LIMIT -1 means no limit in SQLite
    let limit = limit.map(i64::from).unwrap_or(-1);
    let mut stmt = conn.prepare(&format!(
        "SELECT {LOGIN_COLUMNS} FROM login_history ORDER BY created_at DESC, seq DESC LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(LoginEventRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                email: row.get(2)?,
                display_name: row.get(3)?,
                action: row.get(4)?,
                outcome: row.get(5)?,
                fail_reason: row.get(6)?,
                user_agent: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        public_key: row.get(4)?,
        wrapped_private_key: row.get(5)?,
        private_key_nonce: row.get(6)?,
        key_salt: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn map_document(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        filename: row.get(2)?,
        fingerprint: row.get(3)?,
        signature: row.get(4)?,
        file_size: row.get(5)?,
        owner_name: row.get(6)?,
        description: row.get(7)?,
        document_type: row.get(8)?,
        work_type: row.get(9)?,
        pow_filename: row.get(10)?,
        pow_fingerprint: row.get(11)?,
        pow_size: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
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
    use crate::models::{EncryptedContent, NewDocument};
    use inventa_types::models::{LoginAction, LoginEvent, LoginOutcome};
    use inventa_types::time;
    use uuid::Uuid;

    fn user_row(username: &str, email: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            password: "$argon2id$placeholder".into(),
            public_key: "cHVibGlj".into(),
            wrapped_private_key: vec![1, 2, 3],
            private_key_nonce: vec![0; 12],
            key_salt: vec![7; 16],
            created_at: time::format(&time::now()),
        }
    }

    fn new_document(owner_id: &str, fingerprint: &str, created_at: &str) -> NewDocument {
        NewDocument {
            row: DocumentRow {
                id: Uuid::new_v4().to_string(),
                owner_id: owner_id.into(),
                filename: "draft.txt".into(),
                fingerprint: fingerprint.into(),
                signature: "c2ln".into(),
                file_size: 5,
                owner_name: "Owner".into(),
                description: String::new(),
                document_type: "article".into(),
                work_type: "human".into(),
                pow_filename: None,
                pow_fingerprint: None,
                pow_size: None,
                created_at: created_at.into(),
            },
            content: EncryptedContent {
                ciphertext: vec![9; 21],
                nonce: vec![0; 12],
                wrapped_key: vec![8; 48],
                key_nonce: vec![1; 12],
            },
        }
    }

    fn login_event(user_id: Option<Uuid>, outcome: LoginOutcome) -> LoginEventRow {
        LoginEventRow::from_event(&LoginEvent {
            id: Uuid::new_v4(),
            user_id,
            email: "someone@example.com".into(),
            display_name: None,
            action: LoginAction::Login,
            outcome,
            fail_reason: None,
            user_agent: Some("test".into()),
            created_at: time::now(),
        })
    }

    #[test]
    fn email_uniqueness_ignores_case() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            db.create_user(&user_row("alice", "alice@example.com")).unwrap(),
            UserInsert::Created
        );
        assert_eq!(
            db.create_user(&user_row("alice2", "ALICE@example.com")).unwrap(),
            UserInsert::EmailTaken
        );
        assert_eq!(
            db.create_user(&user_row("alice", "other@example.com")).unwrap(),
            UserInsert::UsernameTaken
        );
        assert!(db.get_user_by_email("Alice@Example.com").unwrap().is_some());
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_fingerprint_returns_existing_record() {
        let db = Database::open_in_memory().unwrap();
        let alice = user_row("alice", "alice@example.com");
        let bob = user_row("bob", "bob@example.com");
        db.create_user(&alice).unwrap();
        db.create_user(&bob).unwrap();

        let fp = "a".repeat(64);
        let ts = time::format(&time::now());
        let first = new_document(&alice.id, &fp, &ts);
        assert!(matches!(
            db.register_document(&first).unwrap(),
            RegisterOutcome::Inserted
        ));

        match db.register_document(&new_document(&bob.id, &fp, &ts)).unwrap() {
            RegisterOutcome::Duplicate(existing) => {
                assert_eq!(existing.id, first.row.id);
                assert_eq!(existing.owner_id, alice.id);
            }
            RegisterOutcome::Inserted => panic!("duplicate fingerprint was inserted"),
        }

        assert_eq!(db.list_all_documents().unwrap().len(), 1);
    }

    #[test]
    fn fingerprint_lookup_is_exact() {
        let db = Database::open_in_memory().unwrap();
        let alice = user_row("alice", "alice@example.com");
        db.create_user(&alice).unwrap();
        let fp = "b".repeat(64);
        db.register_document(&new_document(&alice.id, &fp, &time::format(&time::now())))
            .unwrap();

        assert!(db.get_document_by_fingerprint(&fp).unwrap().is_some());
        assert!(db.get_document_by_fingerprint(&fp[..63]).unwrap().is_none());
        assert!(db.get_document_by_fingerprint(&"c".repeat(64)).unwrap().is_none());
    }

    #[test]
    fn owner_listing_is_newest_first_with_stable_ties() {
        let db = Database::open_in_memory().unwrap();
        let alice = user_row("alice", "alice@example.com");
        db.create_user(&alice).unwrap();

        let older = new_document(&alice.id, &"1".repeat(64), "2026-01-01T00:00:00.000Z");
        let tie_a = new_document(&alice.id, &"2".repeat(64), "2026-02-01T00:00:00.000Z");
        let tie_b = new_document(&alice.id, &"3".repeat(64), "2026-02-01T00:00:00.000Z");
        for doc in [&older, &tie_a, &tie_b] {
            db.register_document(doc).unwrap();
        }

        let ids: Vec<String> = db
            .list_documents_by_owner(&alice.id)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![tie_b.row.id.clone(), tie_a.row.id.clone(), older.row.id.clone()]);
    }

    #[test]
    fn only_owner_can_delete() {
        let db = Database::open_in_memory().unwrap();
        let alice = user_row("alice", "alice@example.com");
        let bob = user_row("bob", "bob@example.com");
        db.create_user(&alice).unwrap();
        db.create_user(&bob).unwrap();
        let doc = new_document(&alice.id, &"d".repeat(64), &time::format(&time::now()));
        db.register_document(&doc).unwrap();

        assert!(!db.delete_document(&doc.row.id, &bob.id).unwrap());
        assert!(db.get_document(&doc.row.id).unwrap().is_some());
        assert!(db.delete_document(&doc.row.id, &alice.id).unwrap());
        assert!(db.get_document(&doc.row.id).unwrap().is_none());
    }

    #[test]
    fn content_is_stored_alongside_record() {
        let db = Database::open_in_memory().unwrap();
        let alice = user_row("alice", "alice@example.com");
        db.create_user(&alice).unwrap();
        let doc = new_document(&alice.id, &"e".repeat(64), &time::format(&time::now()));
        db.register_document(&doc).unwrap();

        let content = db.get_document_content(&doc.row.id).unwrap().unwrap();
        assert_eq!(content.ciphertext, doc.content.ciphertext);
        assert_eq!(content.wrapped_key, doc.content.wrapped_key);
        assert!(db.get_document_content("missing").unwrap().is_none());
    }

    #[test]
    fn login_history_limit_and_stats() {
        let db = Database::open_in_memory().unwrap();
        let uid = Uuid::new_v4();
        db.record_login(&login_event(Some(uid), LoginOutcome::Success)).unwrap();
        db.record_login(&login_event(Some(uid), LoginOutcome::Failure)).unwrap();
        db.record_login(&login_event(None, LoginOutcome::Failure)).unwrap();

        let recent = db.login_history(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].user_id.is_none());

        let today = time::format(&time::now())[..10].to_string();
        let stats = db.stats(&today).unwrap();
        assert_eq!(stats.login_history, 3);
        assert_eq!(stats.successful_logins, 1);
        assert_eq!(stats.failed_logins, 2);
        assert_eq!(stats.unique_users, 1);
        assert_eq!(stats.today_logins, 3);
    }

    #[test]
    fn clear_all_empties_every_table() {
        let db = Database::open_in_memory().unwrap();
        let alice = user_row("alice", "alice@example.com");
        db.create_user(&alice).unwrap();
        db.register_document(&new_document(&alice.id, &"f".repeat(64), &time::format(&time::now())))
            .unwrap();
        db.record_login(&login_event(None, LoginOutcome::Failure)).unwrap();

        db.clear_all().unwrap();

        let export = db.export_all().unwrap();
        assert!(export.users.is_empty());
        assert!(export.documents.is_empty());
        assert!(export.login_history.is_empty());
    }
}
