// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Saved message operations.

use rusqlite::{OptionalExtension, params};
use solanagram_core::SolanagramError;
use solanagram_core::traits::InsertOutcome;
use solanagram_core::types::SavedMessage;

use crate::database::{Database, map_tr_err};

/// Insert a message unless its (channel, message, session) key already exists.
///
/// A conflict is not an error: the existing row id is returned as `Duplicate`.
pub async fn insert_saved_message(
    db: &Database,
    msg: &SavedMessage,
) -> Result<InsertOutcome, SolanagramError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| -> Result<InsertOutcome, rusqlite::Error> {
            let changed = conn.execute(
                "INSERT INTO saved_messages
                    (channel_id, message_id, session_id, sender_id, text, metadata, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (channel_id, message_id, session_id) DO NOTHING",
                params![
                    msg.channel_id,
                    msg.message_id,
                    msg.session_id,
                    msg.sender_id,
                    msg.text,
                    msg.metadata,
                    msg.received_at,
                ],
            )?;
            if changed == 1 {
                return Ok(InsertOutcome::Inserted(conn.last_insert_rowid()));
            }
            let existing = conn.query_row(
                "SELECT id FROM saved_messages
                 WHERE channel_id = ?1 AND message_id = ?2 AND session_id = ?3",
                params![msg.channel_id, msg.message_id, msg.session_id],
                |row| row.get(0),
            )?;
            Ok(InsertOutcome::Duplicate(existing))
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one saved message by row id.
pub async fn get_saved_message(
    db: &Database,
    id: i64,
) -> Result<Option<SavedMessage>, SolanagramError> {
    db.connection()
        .call(move |conn| -> Result<Option<SavedMessage>, rusqlite::Error> {
            conn.query_row(
                "SELECT channel_id, message_id, session_id, sender_id, text, metadata, received_at
                 FROM saved_messages WHERE id = ?1",
                params![id],
                |row| {
                    Ok(SavedMessage {
                        channel_id: row.get(0)?,
                        message_id: row.get(1)?,
                        session_id: row.get(2)?,
                        sender_id: row.get(3)?,
                        text: row.get(4)?,
                        metadata: row.get(5)?,
                        received_at: row.get(6)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_messages_for_session(
    db: &Database,
    session_id: &str,
) -> Result<i64, SolanagramError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM saved_messages WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_msg(channel_id: i64, message_id: i64, session_id: &str) -> SavedMessage {
        SavedMessage {
            channel_id,
            message_id,
            session_id: session_id.to_string(),
            sender_id: Some(99),
            text: format!("message {message_id}"),
            metadata: Some(r#"{"views":1}"#.to_string()),
            received_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn redelivered_message_is_stored_once() {
        let (db, _dir) = setup_db().await;

        let first = insert_saved_message(&db, &make_msg(-100, 1, "sess-a"))
            .await
            .unwrap();
        let second = insert_saved_message(&db, &make_msg(-100, 1, "sess-a"))
            .await
            .unwrap();
        let other = insert_saved_message(&db, &make_msg(-100, 2, "sess-a"))
            .await
            .unwrap();

        assert!(matches!(first, InsertOutcome::Inserted(_)));
        assert_eq!(second, InsertOutcome::Duplicate(first.row_id()));
        assert!(matches!(other, InsertOutcome::Inserted(_)));
        assert_eq!(count_messages_for_session(&db, "sess-a").await.unwrap(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn same_message_in_another_session_is_a_new_row() {
        let (db, _dir) = setup_db().await;

        insert_saved_message(&db, &make_msg(-100, 1, "sess-a"))
            .await
            .unwrap();
        let outcome = insert_saved_message(&db, &make_msg(-100, 1, "sess-b"))
            .await
            .unwrap();

        assert!(matches!(outcome, InsertOutcome::Inserted(_)));
        assert_eq!(count_messages_for_session(&db, "sess-b").await.unwrap(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_saved_message_round_trips_fields() {
        let (db, _dir) = setup_db().await;
        let msg = make_msg(-5, 8, "sess-a");
        let id = insert_saved_message(&db, &msg).await.unwrap().row_id();

        assert_eq!(get_saved_message(&db, id).await.unwrap(), Some(msg));
        assert_eq!(get_saved_message(&db, id + 100).await.unwrap(), None);
        db.close().await.unwrap();
    }
}
