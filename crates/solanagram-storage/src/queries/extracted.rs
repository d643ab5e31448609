// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extracted value operations.

use rusqlite::params;
use solanagram_core::SolanagramError;
use solanagram_core::types::ExtractedValue;

use crate::database::{Database, map_tr_err};

/// Insert all values extracted from one message in a single transaction.
pub async fn insert_extracted_values(
    db: &Database,
    values: &[ExtractedValue],
) -> Result<(), SolanagramError> {
    if values.is_empty() {
        return Ok(());
    }
    let values = values.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO extracted_values
                        (saved_message_id, rule_name, search_text, extracted_text, position, extracted_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for v in &values {
                    stmt.execute(params![
                        v.saved_message_id,
                        v.rule_name,
                        v.search_text,
                        v.extracted_text,
                        v.position,
                        v.extracted_at,
                    ])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Values extracted from one message, in insertion order.
pub async fn extracted_values_for_message(
    db: &Database,
    saved_message_id: i64,
) -> Result<Vec<ExtractedValue>, SolanagramError> {
    db.connection()
        .call(move |conn| -> Result<Vec<ExtractedValue>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT saved_message_id, rule_name, search_text, extracted_text, position, extracted_at
                 FROM extracted_values WHERE saved_message_id = ?1
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![saved_message_id], |row| {
                Ok(ExtractedValue {
                    saved_message_id: row.get(0)?,
                    rule_name: row.get(1)?,
                    search_text: row.get(2)?,
                    extracted_text: row.get(3)?,
                    position: row.get(4)?,
                    extracted_at: row.get(5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::messages::insert_saved_message;
    use solanagram_core::types::SavedMessage;
    use tempfile::tempdir;

    async fn setup_db_with_message() -> (Database, i64, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let msg = SavedMessage {
            channel_id: -100,
            message_id: 1,
            session_id: "sess".to_string(),
            sender_id: None,
            text: "CA: So11111111111111111111111111111111111111112".to_string(),
            metadata: None,
            received_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        let id = insert_saved_message(&db, &msg).await.unwrap().row_id();
        (db, id, dir)
    }

    fn make_value(saved_message_id: i64, rule_name: &str, position: i64) -> ExtractedValue {
        ExtractedValue {
            saved_message_id,
            rule_name: rule_name.to_string(),
            search_text: "CA:".to_string(),
            extracted_text: "So1111".to_string(),
            position,
            extracted_at: "2026-01-01T00:00:01.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_read_back_in_order() {
        let (db, id, _dir) = setup_db_with_message().await;

        insert_extracted_values(&db, &[make_value(id, "ca", 3), make_value(id, "ticker", 40)])
            .await
            .unwrap();

        let values = extracted_values_for_message(&db, id).await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].rule_name, "ca");
        assert_eq!(values[1].position, 40);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dangling_message_reference_is_rejected_atomically() {
        let (db, id, _dir) = setup_db_with_message().await;

        let result =
            insert_extracted_values(&db, &[make_value(id, "ok", 0), make_value(id + 50, "bad", 0)])
                .await;
        assert!(result.is_err());
        assert!(extracted_values_for_message(&db, id).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let (db, id, _dir) = setup_db_with_message().await;
        insert_extracted_values(&db, &[]).await.unwrap();
        assert!(extracted_values_for_message(&db, id).await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
