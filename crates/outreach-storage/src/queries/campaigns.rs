// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign row operations.
//!
//! Every update is a targeted column merge guarded in SQL, so concurrent
//! writers (orchestrator, dialer, poller) cannot clobber each other.

use chrono::{DateTime, Utc};
use outreach_core::OutreachError;
use outreach_core::types::{Campaign, CampaignPatch, NewCampaign, UpdateOutcome, WriteGuard};
use rusqlite::types::{Type, Value};
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use crate::database::{Database, format_ts, map_tr_err};
use crate::queries::{opt_ts_col, parse_col, ts_col};

pub(crate) const CAMPAIGN_COLUMNS: &str = "id, tenant_id, name, agent_id, campaign_type, \
     custom_message, scheduled_at, started_at, completed_at, total_leads, called, successful, \
     failed, lead_ids, batch_id, status, version, last_synced_at, created_at, updated_at";

/// Rows in these statuses refuse every further write.
const NOT_TERMINAL: &str = "status NOT IN ('completed', 'failed')";

pub(crate) fn row_to_campaign(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    let lead_ids_raw: String = row.get(13)?;
    let lead_ids = serde_json::from_str(&lead_ids_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(e)))?;
    Ok(Campaign {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        agent_id: row.get(3)?,
        campaign_type: parse_col(row, 4)?,
        custom_message: row.get(5)?,
        scheduled_at: opt_ts_col(row, 6)?,
        started_at: opt_ts_col(row, 7)?,
        completed_at: opt_ts_col(row, 8)?,
        total_leads: row.get(9)?,
        called: row.get(10)?,
        successful: row.get(11)?,
        failed: row.get(12)?,
        lead_ids,
        batch_id: row.get(14)?,
        status: parse_col(row, 15)?,
        version: row.get(16)?,
        last_synced_at: opt_ts_col(row, 17)?,
        created_at: ts_col(row, 18)?,
        updated_at: ts_col(row, 19)?,
    })
}

/// Column values of a new campaign row, prepared outside the connection thread.
pub(crate) struct CampaignInsert {
    id: String,
    tenant_id: String,
    name: String,
    agent_id: String,
    campaign_type: String,
    custom_message: Option<String>,
    scheduled_at: Option<String>,
    started_at: Option<String>,
    total_leads: u32,
    lead_ids: String,
    batch_id: Option<String>,
    status: String,
    now: String,
}

impl CampaignInsert {
    pub(crate) fn new(campaign: &NewCampaign, now: DateTime<Utc>) -> Result<Self, OutreachError> {
        let lead_ids = serde_json::to_string(&campaign.lead_ids)
            .map_err(|e| OutreachError::Internal(format!("failed to encode lead ids: {e}")))?;
        Ok(Self {
            id: campaign.id.clone(),
            tenant_id: campaign.tenant_id.clone(),
            name: campaign.name.clone(),
            agent_id: campaign.agent_id.clone(),
            campaign_type: campaign.campaign_type.to_string(),
            custom_message: campaign.custom_message.clone(),
            scheduled_at: campaign.scheduled_at.as_ref().map(format_ts),
            started_at: campaign.started_at.as_ref().map(format_ts),
            total_leads: campaign.total_leads,
            lead_ids,
            batch_id: campaign.batch_id.clone(),
            status: campaign.status.to_string(),
            now: format_ts(&now),
        })
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn execute(&self, conn: &rusqlite::Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO campaigns (id, tenant_id, name, agent_id, campaign_type, custom_message,
                 scheduled_at, started_at, total_leads, lead_ids, batch_id, status,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                self.id,
                self.tenant_id,
                self.name,
                self.agent_id,
                self.campaign_type,
                self.custom_message,
                self.scheduled_at,
                self.started_at,
                self.total_leads,
                self.lead_ids,
                self.batch_id,
                self.status,
                self.now,
            ],
        )?;
        Ok(())
    }
}

pub(crate) fn select_campaign(
    conn: &rusqlite::Connection,
    id: &str,
) -> rusqlite::Result<Option<Campaign>> {
    conn.query_row(
        &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
        params![id],
        row_to_campaign,
    )
    .optional()
}

/// Insert a campaign row and return it as stored.
pub async fn create_campaign(
    db: &Database,
    campaign: &NewCampaign,
    now: DateTime<Utc>,
) -> Result<Campaign, OutreachError> {
    let insert = CampaignInsert::new(campaign, now)?;
    db.connection()
        .call(move |conn| -> Result<Campaign, rusqlite::Error> {
            insert.execute(conn)?;
            select_campaign(conn, insert.id())?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a campaign by id, optionally scoped to a tenant.
pub async fn get_campaign(
    db: &Database,
    tenant_id: Option<&str>,
    campaign_id: &str,
) -> Result<Option<Campaign>, OutreachError> {
    let tenant_id = tenant_id.map(str::to_string);
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Campaign>, rusqlite::Error> {
            let campaign = select_campaign(conn, &campaign_id)?;
            Ok(campaign.filter(|c| tenant_id.as_deref().is_none_or(|t| c.tenant_id == t)))
        })
        .await
        .map_err(map_tr_err)
}

/// All campaigns of a tenant, newest first.
pub async fn list_campaigns(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<Campaign>, OutreachError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Campaign>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE tenant_id = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![tenant_id], row_to_campaign)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// In-flight batch campaigns, least recently updated first.
pub async fn find_active_with_batch(db: &Database) -> Result<Vec<Campaign>, OutreachError> {
    db.connection()
        .call(|conn| -> Result<Vec<Campaign>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAMPAIGN_COLUMNS} FROM campaigns
                 WHERE status IN ('running', 'scheduled')
                   AND batch_id IS NOT NULL AND batch_id != ''
                 ORDER BY updated_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map([], row_to_campaign)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Build the guarded UPDATE for a patch. Parameters are positional, in order.
fn build_update(
    campaign_id: &str,
    patch: &CampaignPatch,
    guard: &WriteGuard,
    now: DateTime<Utc>,
) -> (String, Vec<Value>) {
    let mut sets = vec!["version = version + 1", "updated_at = ?"];
    let mut values = vec![Value::Text(format_ts(&now))];

    if let Some(status) = patch.status {
        sets.push("status = ?");
        values.push(Value::Text(status.to_string()));
    }
    if let Some(batch_id) = &patch.batch_id {
        sets.push("batch_id = COALESCE(batch_id, ?)");
        values.push(Value::Text(batch_id.clone()));
    }
    if let Some(started_at) = &patch.started_at {
        sets.push("started_at = COALESCE(started_at, ?)");
        values.push(Value::Text(format_ts(started_at)));
    }
    if let Some(completed_at) = &patch.completed_at {
        sets.push("completed_at = ?");
        values.push(Value::Text(format_ts(completed_at)));
    }
    if let Some(counters) = patch.counters {
        sets.push("called = MIN(MAX(called, ?), total_leads)");
        sets.push("successful = MIN(MAX(successful, ?), total_leads)");
        sets.push("failed = MIN(MAX(failed, ?), total_leads)");
        values.push(Value::Integer(counters.called.into()));
        values.push(Value::Integer(counters.successful.into()));
        values.push(Value::Integer(counters.failed.into()));
    }
    if let Some(observed_at) = &patch.observed_at {
        sets.push("last_synced_at = ?");
        values.push(Value::Text(format_ts(observed_at)));
    }

    let mut wheres = vec!["id = ?".to_string(), NOT_TERMINAL.to_string()];
    values.push(Value::Text(campaign_id.to_string()));

    if let Some(version) = guard.expected_version {
        wheres.push("version = ?".to_string());
        values.push(Value::Integer(version));
    }
    if !guard.allowed_from.is_empty() {
        let slots = vec!["?"; guard.allowed_from.len()].join(", ");
        wheres.push(format!("status IN ({slots})"));
        values.extend(
            guard
                .allowed_from
                .iter()
                .map(|s| Value::Text(s.to_string())),
        );
    }
    if let Some(observed_at) = &patch.observed_at {
        wheres.push("(last_synced_at IS NULL OR last_synced_at <= ?)".to_string());
        values.push(Value::Text(format_ts(observed_at)));
    }

    let sql = format!(
        "UPDATE campaigns SET {} WHERE {}",
        sets.join(", "),
        wheres.join(" AND ")
    );
    (sql, values)
}

/// Apply a targeted update if the guard still holds.
pub async fn update_campaign_fields(
    db: &Database,
    campaign_id: &str,
    patch: &CampaignPatch,
    guard: &WriteGuard,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, OutreachError> {
    let (sql, values) = build_update(campaign_id, patch, guard, now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(&sql, params_from_iter(values))
        })
        .await
        .map_err(map_tr_err)?;
    Ok(if changed == 1 {
        UpdateOutcome::Applied
    } else {
        UpdateOutcome::Conflict
    })
}

/// Bump `called` plus one outcome counter in a single statement.
pub async fn increment_counters(
    db: &Database,
    campaign_id: &str,
    successful: bool,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, OutreachError> {
    let campaign_id = campaign_id.to_string();
    let (ok, failed) = if successful { (1, 0) } else { (0, 1) };
    let now = format_ts(&now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE campaigns
                     SET called = called + 1, successful = successful + ?1, failed = failed + ?2,
                         version = version + 1, updated_at = ?3
                     WHERE id = ?4 AND called < total_leads AND {NOT_TERMINAL}"
                ),
                params![ok, failed, now, campaign_id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(if changed == 1 {
        UpdateOutcome::Applied
    } else {
        UpdateOutcome::Conflict
    })
}

enum DeleteResult {
    Deleted,
    Missing,
    Running,
}

/// Delete a campaign (and, by cascade, its calls) unless it is running.
pub async fn delete_campaign(
    db: &Database,
    tenant_id: &str,
    campaign_id: &str,
) -> Result<bool, OutreachError> {
    let tenant = tenant_id.to_string();
    let id = campaign_id.to_string();
    let result = db
        .connection()
        .call(move |conn| -> Result<DeleteResult, rusqlite::Error> {
            let deleted = conn.execute(
                "DELETE FROM campaigns WHERE id = ?1 AND tenant_id = ?2 AND status != 'running'",
                params![id, tenant],
            )?;
            if deleted == 1 {
                return Ok(DeleteResult::Deleted);
            }
            let exists: Option<String> = conn
                .query_row(
                    "SELECT status FROM campaigns WHERE id = ?1 AND tenant_id = ?2",
                    params![id, tenant],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(match exists {
                Some(_) => DeleteResult::Running,
                None => DeleteResult::Missing,
            })
        })
        .await
        .map_err(map_tr_err)?;

    match result {
        DeleteResult::Deleted => Ok(true),
        DeleteResult::Missing => Ok(false),
        DeleteResult::Running => Err(OutreachError::Validation(format!(
            "campaign {campaign_id} is running and cannot be deleted"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_core::CampaignStatus;
    use outreach_core::types::{CallCounters, CampaignType};
    use tempfile::tempdir;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_780_000_000 + secs, 0).unwrap()
    }

    fn new_campaign(id: &str, status: CampaignStatus, batch: Option<&str>) -> NewCampaign {
        NewCampaign {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            name: format!("campaign {id}"),
            agent_id: "agent-1".to_string(),
            campaign_type: CampaignType::VoiceCall,
            custom_message: None,
            scheduled_at: None,
            started_at: None,
            total_leads: 3,
            lead_ids: vec!["l1".into(), "l2".into(), "l3".into()],
            batch_id: batch.map(str::to_string),
            status,
        }
    }

    async fn open() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("campaigns.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn counters(called: u32, successful: u32, failed: u32) -> CampaignPatch {
        CampaignPatch {
            counters: Some(CallCounters {
                called,
                successful,
                failed,
            }),
            ..CampaignPatch::default()
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let (db, _dir) = open().await;
        let new = new_campaign("c1", CampaignStatus::Running, Some("b1"));
        let created = create_campaign(&db, &new, at(0)).await.unwrap();
        assert_eq!(created.version, 1);
        assert_eq!(created.created_at, at(0));
        assert_eq!(created.lead_ids, vec!["l1", "l2", "l3"]);

        let fetched = get_campaign(&db, Some("t1"), "c1").await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(get_campaign(&db, Some("t2"), "c1").await.unwrap().is_none());
        assert!(get_campaign(&db, None, "c1").await.unwrap().is_some());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn terminal_rows_refuse_writes() {
        let (db, _dir) = open().await;
        create_campaign(&db, &new_campaign("c1", CampaignStatus::Running, Some("b1")), at(0))
            .await
            .unwrap();
        let done = CampaignPatch::status(CampaignStatus::Completed);
        assert_eq!(
            update_campaign_fields(&db, "c1", &done, &WriteGuard::any(), at(1)).await.unwrap(),
            UpdateOutcome::Applied
        );
        let back = CampaignPatch::status(CampaignStatus::Running);
        assert_eq!(
            update_campaign_fields(&db, "c1", &back, &WriteGuard::any(), at(2)).await.unwrap(),
            UpdateOutcome::Conflict
        );
        let row = get_campaign(&db, None, "c1").await.unwrap().unwrap();
        assert_eq!(row.status, CampaignStatus::Completed);
        assert_eq!(row.version, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn batch_id_is_set_once() {
        let (db, _dir) = open().await;
        create_campaign(&db, &new_campaign("c1", CampaignStatus::Draft, None), at(0))
            .await
            .unwrap();
        for batch in ["b-first", "b-second"] {
            let patch = CampaignPatch {
                batch_id: Some(batch.to_string()),
                ..CampaignPatch::default()
            };
            update_campaign_fields(&db, "c1", &patch, &WriteGuard::any(), at(1))
                .await
                .unwrap();
        }
        let row = get_campaign(&db, None, "c1").await.unwrap().unwrap();
        assert_eq!(row.batch_id.as_deref(), Some("b-first"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn counters_are_monotone_and_clamped() {
        let (db, _dir) = open().await;
        create_campaign(&db, &new_campaign("c1", CampaignStatus::Running, Some("b1")), at(0))
            .await
            .unwrap();
        let guard = WriteGuard::any();
        update_campaign_fields(&db, "c1", &counters(2, 1, 1), &guard, at(1)).await.unwrap();
        update_campaign_fields(&db, "c1", &counters(1, 0, 0), &guard, at(2)).await.unwrap();
        let row = get_campaign(&db, None, "c1").await.unwrap().unwrap();
        assert_eq!((row.called, row.successful, row.failed), (2, 1, 1));

        update_campaign_fields(&db, "c1", &counters(9, 9, 0), &guard, at(3)).await.unwrap();
        let row = get_campaign(&db, None, "c1").await.unwrap().unwrap();
        assert_eq!((row.called, row.successful), (3, 3));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn version_and_status_guards() {
        let (db, _dir) = open().await;
        let new = new_campaign("c1", CampaignStatus::Running, None);
        let created = create_campaign(&db, &new, at(0)).await.unwrap();
        let pause = CampaignPatch::status(CampaignStatus::Paused);

        let stale = WriteGuard::at_version(created.version + 5);
        assert_eq!(
            update_campaign_fields(&db, "c1", &pause, &stale, at(1)).await.unwrap(),
            UpdateOutcome::Conflict
        );
        let wrong_from = WriteGuard::from_statuses(&[CampaignStatus::Paused]);
        assert_eq!(
            update_campaign_fields(&db, "c1", &pause, &wrong_from, at(1)).await.unwrap(),
            UpdateOutcome::Conflict
        );
        let current = WriteGuard {
            expected_version: Some(created.version),
            allowed_from: vec![CampaignStatus::Running],
        };
        assert_eq!(
            update_campaign_fields(&db, "c1", &pause, &current, at(1)).await.unwrap(),
            UpdateOutcome::Applied
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn older_observation_is_rejected() {
        let (db, _dir) = open().await;
        create_campaign(&db, &new_campaign("c1", CampaignStatus::Running, Some("b1")), at(0))
            .await
            .unwrap();
        let mut newer = counters(2, 2, 0);
        newer.observed_at = Some(at(20));
        let mut older = CampaignPatch::status(CampaignStatus::Paused);
        older.observed_at = Some(at(10));

        let guard = WriteGuard::any();
        assert_eq!(
            update_campaign_fields(&db, "c1", &newer, &guard, at(21)).await.unwrap(),
            UpdateOutcome::Applied
        );
        assert_eq!(
            update_campaign_fields(&db, "c1", &older, &guard, at(22)).await.unwrap(),
            UpdateOutcome::Conflict
        );
        let row = get_campaign(&db, None, "c1").await.unwrap().unwrap();
        assert_eq!(row.status, CampaignStatus::Running);
        assert_eq!(row.last_synced_at, Some(at(20)));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn increments_stop_at_total_leads() {
        let (db, _dir) = open().await;
        create_campaign(&db, &new_campaign("c1", CampaignStatus::Running, None), at(0))
            .await
            .unwrap();
        for ok in [true, false, true] {
            assert_eq!(
                increment_counters(&db, "c1", ok, at(1)).await.unwrap(),
                UpdateOutcome::Applied
            );
        }
        assert_eq!(
            increment_counters(&db, "c1", true, at(2)).await.unwrap(),
            UpdateOutcome::Conflict
        );
        let row = get_campaign(&db, None, "c1").await.unwrap().unwrap();
        assert_eq!((row.called, row.successful, row.failed), (3, 2, 1));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn active_discovery_orders_by_staleness() {
        let (db, _dir) = open().await;
        create_campaign(&db, &new_campaign("old", CampaignStatus::Running, Some("b1")), at(0))
            .await
            .unwrap();
        create_campaign(&db, &new_campaign("new", CampaignStatus::Scheduled, Some("b2")), at(5))
            .await
            .unwrap();
        create_campaign(&db, &new_campaign("direct", CampaignStatus::Running, None), at(1))
            .await
            .unwrap();
        create_campaign(&db, &new_campaign("paused", CampaignStatus::Paused, Some("b3")), at(1))
            .await
            .unwrap();

        // Touching "old" makes it the freshest.
        update_campaign_fields(&db, "old", &counters(1, 0, 0), &WriteGuard::any(), at(10))
            .await
            .unwrap();

        let ids: Vec<String> = find_active_with_batch(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_refused_while_running() {
        let (db, _dir) = open().await;
        create_campaign(&db, &new_campaign("c1", CampaignStatus::Running, None), at(0))
            .await
            .unwrap();
        let err = delete_campaign(&db, "t1", "c1").await.unwrap_err();
        assert!(matches!(err, OutreachError::Validation(_)));

        update_campaign_fields(
            &db,
            "c1",
            &CampaignPatch::status(CampaignStatus::Paused),
            &WriteGuard::any(),
            at(1),
        )
        .await
        .unwrap();
        assert!(!delete_campaign(&db, "t2", "c1").await.unwrap());
        assert!(delete_campaign(&db, "t1", "c1").await.unwrap());
        assert!(get_campaign(&db, None, "c1").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
