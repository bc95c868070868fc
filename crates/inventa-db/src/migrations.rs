use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                  TEXT PRIMARY KEY,
            username            TEXT NOT NULL UNIQUE,
            email               TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password            TEXT NOT NULL,
            public_key          TEXT NOT NULL,
            wrapped_private_key BLOB NOT NULL,
            private_key_nonce   BLOB NOT NULL,
            key_salt            BLOB NOT NULL,
            created_at          TEXT NOT NULL
        );

        -- seq gives a total order for documents registered in the same millisecond
        CREATE TABLE IF NOT EXISTS documents (
            seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
            id                  TEXT NOT NULL UNIQUE,
            owner_id            TEXT NOT NULL REFERENCES users(id),
            filename            TEXT NOT NULL,
            fingerprint         TEXT NOT NULL UNIQUE,
            signature           TEXT NOT NULL,
            file_size           INTEGER NOT NULL,
            owner_name          TEXT NOT NULL,
            description         TEXT NOT NULL DEFAULT '',
            document_type       TEXT NOT NULL,
            work_type           TEXT NOT NULL,
            pow_filename        TEXT,
            pow_fingerprint     TEXT,
            pow_size            INTEGER,
            ciphertext          BLOB NOT NULL,
            nonce               BLOB NOT NULL,
            wrapped_key         BLOB NOT NULL,
            key_nonce           BLOB NOT NULL,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_owner
            ON documents(owner_id, created_at);

        -- user_id is not a foreign key: failed attempts may name no account
        CREATE TABLE IF NOT EXISTS login_history (
            seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
            id                  TEXT NOT NULL UNIQUE,
            user_id             TEXT,
            email               TEXT NOT NULL,
            display_name        TEXT,
            action              TEXT NOT NULL,
            outcome             TEXT NOT NULL,
            fail_reason         TEXT,
            user_agent          TEXT,
            created_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_login_history_created
            ON login_history(created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
