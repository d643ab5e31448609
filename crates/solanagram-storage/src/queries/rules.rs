// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Elaboration rule operations.
//!
//! A worker publishes the rule list it loaded under its listener id, then
//! bumps the outcome counters of the rules it applies.

use std::collections::HashSet;
use std::str::FromStr;

use rusqlite::{OptionalExtension, params};
use solanagram_core::SolanagramError;
use solanagram_core::types::{ElaborationRule, ElaborationType};
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::models::RuleStats;

/// Replace the ordered rule list of a listener.
///
/// Rules keep their id, so counters of surviving rules are preserved.
/// Rules absent from `rules` are deleted.
pub async fn replace_rules_for_listener(
    db: &Database,
    listener_id: i64,
    rules: &[ElaborationRule],
) -> Result<(), SolanagramError> {
    let rules = rules.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            let keep: HashSet<i64> = rules.iter().map(|r| r.id).collect();
            let existing: Vec<i64> = {
                let mut stmt =
                    tx.prepare("SELECT id FROM elaboration_rules WHERE listener_id = ?1")?;
                let rows = stmt.query_map(params![listener_id], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            };
            for id in existing.into_iter().filter(|id| !keep.contains(id)) {
                tx.execute("DELETE FROM elaboration_rules WHERE id = ?1", params![id])?;
            }
            for (position, rule) in rules.iter().enumerate() {
                tx.execute(
                    "INSERT INTO elaboration_rules
                        (id, listener_id, position, elaboration_type, is_active, config)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT (id) DO UPDATE SET
                        listener_id = excluded.listener_id,
                        position = excluded.position,
                        elaboration_type = excluded.elaboration_type,
                        is_active = excluded.is_active,
                        config = excluded.config,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![
                        rule.id,
                        listener_id,
                        position as i64,
                        rule.elaboration_type.to_string(),
                        rule.is_active,
                        rule.config.to_string(),
                    ],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// The ordered rule list of a listener.
pub async fn rules_for_listener(
    db: &Database,
    listener_id: i64,
) -> Result<Vec<ElaborationRule>, SolanagramError> {
    let raw: Vec<(i64, String, bool, String)> = db
        .connection()
        .call(move |conn| -> Result<Vec<(i64, String, bool, String)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, elaboration_type, is_active, config
                 FROM elaboration_rules WHERE listener_id = ?1
                 ORDER BY position ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![listener_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    raw.into_iter()
        .map(|(id, kind, is_active, config)| {
            let elaboration_type = ElaborationType::from_str(&kind).map_err(|_| {
                SolanagramError::Storage {
                    source: format!("rule {id}: unknown elaboration type `{kind}`").into(),
                }
            })?;
            let config = serde_json::from_str(&config).map_err(|e| SolanagramError::Storage {
                source: Box::new(e),
            })?;
            Ok(ElaborationRule {
                id,
                elaboration_type,
                is_active,
                config,
            })
        })
        .collect()
}

/// Bump the success counter, or the error counter and `last_error`, of a rule.
///
/// Unknown rule ids are ignored, e.g. when publishing the list failed.
pub async fn record_rule_outcome(
    db: &Database,
    rule_id: i64,
    error: Option<&str>,
) -> Result<(), SolanagramError> {
    let error = error.map(str::to_string);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            match error {
                None => conn.execute(
                    "UPDATE elaboration_rules
                     SET success_count = success_count + 1,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![rule_id],
                ),
                Some(message) => conn.execute(
                    "UPDATE elaboration_rules
                     SET error_count = error_count + 1, last_error = ?2,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1",
                    params![rule_id, message],
                ),
            }
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        debug!(rule_id, "outcome for unknown rule not recorded");
    }
    Ok(())
}

pub async fn rule_stats(db: &Database, rule_id: i64) -> Result<Option<RuleStats>, SolanagramError> {
    db.connection()
        .call(move |conn| -> Result<Option<RuleStats>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, success_count, error_count, last_error, updated_at
                 FROM elaboration_rules WHERE id = ?1",
                params![rule_id],
                |row| {
                    Ok(RuleStats {
                        rule_id: row.get(0)?,
                        success_count: row.get(1)?,
                        error_count: row.get(2)?,
                        last_error: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("rules.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn extractor(id: i64) -> ElaborationRule {
        ElaborationRule {
            id,
            elaboration_type: ElaborationType::Extractor,
            is_active: true,
            config: json!({"rules": [{"rule_name": "ca", "search_text": "CA:", "extract_length": 44}]}),
        }
    }

    fn redirect(id: i64) -> ElaborationRule {
        ElaborationRule {
            id,
            elaboration_type: ElaborationType::Redirect,
            is_active: false,
            config: json!({"target_channel_id": "-1009"}),
        }
    }

    #[tokio::test]
    async fn rules_come_back_in_configured_order() {
        let (db, _dir) = setup_db().await;
        replace_rules_for_listener(&db, 3, &[redirect(20), extractor(10)])
            .await
            .unwrap();

        let rules = rules_for_listener(&db, 3).await.unwrap();
        assert_eq!(rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![20, 10]);
        assert!(!rules[0].is_active);
        assert_eq!(rules[1], extractor(10));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn replace_preserves_counters_of_surviving_rules() {
        let (db, _dir) = setup_db().await;
        replace_rules_for_listener(&db, 3, &[extractor(1), redirect(2)])
            .await
            .unwrap();
        record_rule_outcome(&db, 1, None).await.unwrap();
        record_rule_outcome(&db, 1, Some("boom")).await.unwrap();

        replace_rules_for_listener(&db, 3, &[extractor(1)]).await.unwrap();

        let stats = rule_stats(&db, 1).await.unwrap().unwrap();
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.last_error.as_deref(), Some("boom"));
        assert!(rule_stats(&db, 2).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn outcome_for_unknown_rule_is_ignored() {
        let (db, _dir) = setup_db().await;
        record_rule_outcome(&db, 404, Some("nope")).await.unwrap();
        assert!(rule_stats(&db, 404).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn listeners_do_not_see_each_others_rules() {
        let (db, _dir) = setup_db().await;
        replace_rules_for_listener(&db, 1, &[extractor(1)]).await.unwrap();
        replace_rules_for_listener(&db, 2, &[redirect(2)]).await.unwrap();
        replace_rules_for_listener(&db, 2, &[]).await.unwrap();

        assert_eq!(rules_for_listener(&db, 1).await.unwrap().len(), 1);
        assert!(rules_for_listener(&db, 2).await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
