// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign call row operations.

use chrono::{DateTime, Utc};
use outreach_core::types::{CallPatch, Campaign, CampaignCall, LeadContact, NewCampaign};
use outreach_core::{CallStatus, OutreachError};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use crate::database::{Database, format_ts, map_tr_err};
use crate::queries::campaigns::{CampaignInsert, select_campaign};
use crate::queries::{opt_ts_col, parse_col, parse_opt_col, ts_col};

const CALL_COLUMNS: &str = "id, campaign_id, lead_id, lead_name, phone_number, status, \
     conversation_id, started_at, completed_at, duration, outcome, error, created_at, updated_at";

/// Terminal call rows are never rewritten.
const CALL_NOT_TERMINAL: &str = "status NOT IN ('completed', 'failed')";

const CALL_CLAIMABLE: &str = "status = 'pending'";

fn row_to_call(row: &Row<'_>) -> rusqlite::Result<CampaignCall> {
    Ok(CampaignCall {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        lead_id: row.get(2)?,
        lead_name: row.get(3)?,
        phone_number: row.get(4)?,
        status: parse_col(row, 5)?,
        conversation_id: row.get(6)?,
        started_at: opt_ts_col(row, 7)?,
        completed_at: opt_ts_col(row, 8)?,
        duration: row.get(9)?,
        outcome: parse_opt_col(row, 10)?,
        error: row.get(11)?,
        created_at: ts_col(row, 12)?,
        updated_at: ts_col(row, 13)?,
    })
}

struct CallInsert {
    id: String,
    lead_id: String,
    lead_name: String,
    phone_number: String,
}

fn prepare_calls(leads: &[LeadContact]) -> Vec<CallInsert> {
    leads
        .iter()
        .map(|lead| CallInsert {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id: lead.id.clone(),
            lead_name: lead.name.clone(),
            phone_number: lead.phone_number.clone(),
        })
        .collect()
}

fn insert_calls(
    conn: &rusqlite::Connection,
    campaign_id: &str,
    calls: &[CallInsert],
    now: &str,
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO campaign_calls (id, campaign_id, lead_id, seq, lead_name, phone_number,
             status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?7)",
    )?;
    for (seq, call) in calls.iter().enumerate() {
        stmt.execute(params![
            call.id,
            campaign_id,
            call.lead_id,
            seq as i64,
            call.lead_name,
            call.phone_number,
            now,
        ])?;
    }
    Ok(())
}

fn select_calls(
    conn: &rusqlite::Connection,
    campaign_id: &str,
) -> rusqlite::Result<Vec<CampaignCall>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CALL_COLUMNS} FROM campaign_calls WHERE campaign_id = ?1 ORDER BY seq ASC"
    ))?;
    let rows = stmt.query_map(params![campaign_id], row_to_call)?;
    rows.collect()
}

/// Bulk-insert one `pending` row per lead, in lead order.
pub async fn create_call_rows(
    db: &Database,
    campaign_id: &str,
    leads: &[LeadContact],
    now: DateTime<Utc>,
) -> Result<Vec<CampaignCall>, OutreachError> {
    let campaign_id = campaign_id.to_string();
    let calls = prepare_calls(leads);
    let now = format_ts(&now);
    db.connection()
        .call(move |conn| -> Result<Vec<CampaignCall>, rusqlite::Error> {
            let tx = conn.transaction()?;
            insert_calls(&tx, &campaign_id, &calls, &now)?;
            let rows = select_calls(&tx, &campaign_id)?;
            tx.commit()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a campaign and its call rows in one transaction.
pub async fn create_campaign_with_calls(
    db: &Database,
    campaign: &NewCampaign,
    leads: &[LeadContact],
    now: DateTime<Utc>,
) -> Result<(Campaign, Vec<CampaignCall>), OutreachError> {
    let insert = CampaignInsert::new(campaign, now)?;
    let calls = prepare_calls(leads);
    let now = format_ts(&now);
    db.connection()
        .call(move |conn| -> Result<(Campaign, Vec<CampaignCall>), rusqlite::Error> {
            let tx = conn.transaction()?;
            insert.execute(&tx)?;
            insert_calls(&tx, insert.id(), &calls, &now)?;
            let campaign =
                select_campaign(&tx, insert.id())?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            let rows = select_calls(&tx, insert.id())?;
            tx.commit()?;
            Ok((campaign, rows))
        })
        .await
        .map_err(map_tr_err)
}

/// Call rows of a campaign in creation order.
pub async fn get_campaign_calls(
    db: &Database,
    campaign_id: &str,
) -> Result<Vec<CampaignCall>, OutreachError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<CampaignCall>, rusqlite::Error> {
            select_calls(conn, &campaign_id)
        })
        .await
        .map_err(map_tr_err)
}

/// The first call row of a campaign still waiting to be dialed.
pub async fn next_pending_call(
    db: &Database,
    campaign_id: &str,
) -> Result<Option<CampaignCall>, OutreachError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<CampaignCall>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {CALL_COLUMNS} FROM campaign_calls
                     WHERE campaign_id = ?1 AND status = 'pending'
                     ORDER BY seq ASC LIMIT 1"
                ),
                params![campaign_id],
                row_to_call,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// SET clause and values for a call patch; `None` fields are left untouched.
fn call_sets(patch: &CallPatch, now: DateTime<Utc>) -> (Vec<&'static str>, Vec<Value>) {
    let mut sets = vec!["updated_at = ?"];
    let mut values = vec![Value::Text(format_ts(&now))];
    if let Some(status) = patch.status {
        sets.push("status = ?");
        values.push(Value::Text(status.to_string()));
    }
    if let Some(conversation_id) = &patch.conversation_id {
        sets.push("conversation_id = ?");
        values.push(Value::Text(conversation_id.clone()));
    }
    if let Some(started_at) = &patch.started_at {
        sets.push("started_at = ?");
        values.push(Value::Text(format_ts(started_at)));
    }
    if let Some(completed_at) = &patch.completed_at {
        sets.push("completed_at = ?");
        values.push(Value::Text(format_ts(completed_at)));
    }
    if let Some(duration) = patch.duration {
        sets.push("duration = ?");
        values.push(Value::Integer(duration.into()));
    }
    if let Some(outcome) = patch.outcome {
        sets.push("outcome = ?");
        values.push(Value::Text(outcome.to_string()));
    }
    if let Some(error) = &patch.error {
        sets.push("error = ?");
        values.push(Value::Text(error.clone()));
    }
    (sets, values)
}

/// Update one non-terminal call row by id.
///
/// A patch moving the row to `calling` is a claim: it only applies to a
/// `pending` row, so two dial loops can never both own the same call.
pub async fn update_call(
    db: &Database,
    call_id: &str,
    patch: &CallPatch,
    now: DateTime<Utc>,
) -> Result<bool, OutreachError> {
    let (sets, mut values) = call_sets(patch, now);
    let guard = if patch.status == Some(CallStatus::Calling) {
        CALL_CLAIMABLE
    } else {
        CALL_NOT_TERMINAL
    };
    let sql = format!(
        "UPDATE campaign_calls SET {} WHERE id = ? AND {guard}",
        sets.join(", ")
    );
    values.push(Value::Text(call_id.to_string()));
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(&sql, params_from_iter(values))
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed > 0)
}

/// Update the non-terminal call rows of a campaign that dial `phone_number`.
pub async fn update_call_by_campaign_and_phone(
    db: &Database,
    campaign_id: &str,
    phone_number: &str,
    patch: &CallPatch,
    now: DateTime<Utc>,
) -> Result<usize, OutreachError> {
    let (sets, mut values) = call_sets(patch, now);
    let sql = format!(
        "UPDATE campaign_calls SET {} \
         WHERE campaign_id = ? AND phone_number = ? AND {CALL_NOT_TERMINAL}",
        sets.join(", ")
    );
    values.push(Value::Text(campaign_id.to_string()));
    values.push(Value::Text(phone_number.to_string()));
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(&sql, params_from_iter(values))
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_core::CampaignStatus;
    use outreach_core::types::CampaignType;
    use tempfile::tempdir;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_780_000_000 + secs, 0).unwrap()
    }

    fn lead(id: &str, phone: &str) -> LeadContact {
        LeadContact {
            id: id.to_string(),
            name: format!("Lead {id}"),
            phone_number: phone.to_string(),
            email: None,
        }
    }

    fn new_campaign(leads: &[LeadContact]) -> NewCampaign {
        NewCampaign {
            id: "c1".to_string(),
            tenant_id: "t1".to_string(),
            name: "spring".to_string(),
            agent_id: "agent-1".to_string(),
            campaign_type: CampaignType::VoiceCall,
            custom_message: Some("hello".to_string()),
            scheduled_at: None,
            started_at: Some(at(0)),
            total_leads: leads.len() as u32,
            lead_ids: leads.iter().map(|l| l.id.clone()).collect(),
            batch_id: Some("b1".to_string()),
            status: CampaignStatus::Running,
        }
    }

    async fn setup() -> (Database, tempfile::TempDir, Vec<CampaignCall>) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("calls.db").to_str().unwrap())
            .await
            .unwrap();
        let leads = vec![
            lead("l1", "+15550001"),
            lead("l2", "+15550002"),
            lead("l3", "+15550003"),
        ];
        let (_, calls) = create_campaign_with_calls(&db, &new_campaign(&leads), &leads, at(0))
            .await
            .unwrap();
        (db, dir, calls)
    }

    #[tokio::test]
    async fn calls_are_created_pending_in_lead_order() {
        let (db, _dir, calls) = setup().await;
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.status == CallStatus::Pending));
        let leads: Vec<&str> = calls.iter().map(|c| c.lead_id.as_str()).collect();
        assert_eq!(leads, vec!["l1", "l2", "l3"]);
        assert_eq!(calls[0].lead_name.as_deref(), Some("Lead l1"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_campaign_insert_rolls_back_entirely() {
        let (db, _dir, _) = setup().await;
        let leads = vec![lead("l9", "+15550009")];
        let err = create_campaign_with_calls(&db, &new_campaign(&leads), &leads, at(1)).await;
        assert!(err.is_err(), "duplicate campaign id must fail");
        // The original three rows are untouched, no stray l9 row.
        let calls = get_campaign_calls(&db, "c1").await.unwrap();
        assert_eq!(calls.len(), 3);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn call_rows_are_unique_per_lead() {
        let (db, _dir, _) = setup().await;
        let err = create_call_rows(&db, "c1", &[lead("l1", "+15550001")], at(1)).await;
        assert!(err.is_err());
        assert_eq!(get_campaign_calls(&db, "c1").await.unwrap().len(), 3);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn next_pending_walks_in_order() {
        let (db, _dir, calls) = setup().await;
        let first = next_pending_call(&db, "c1").await.unwrap().unwrap();
        assert_eq!(first.id, calls[0].id);

        let patch = CallPatch {
            status: Some(CallStatus::Completed),
            conversation_id: Some("conv-1".to_string()),
            completed_at: Some(at(5)),
            ..CallPatch::default()
        };
        assert!(update_call(&db, &first.id, &patch, at(5)).await.unwrap());
        let second = next_pending_call(&db, "c1").await.unwrap().unwrap();
        assert_eq!(second.id, calls[1].id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn a_call_can_be_claimed_only_once() {
        let (db, _dir, calls) = setup().await;
        let claim = CallPatch {
            status: Some(CallStatus::Calling),
            started_at: Some(at(2)),
            ..CallPatch::default()
        };
        assert!(update_call(&db, &calls[0].id, &claim, at(2)).await.unwrap());
        assert!(!update_call(&db, &calls[0].id, &claim, at(3)).await.unwrap());

        let stored = get_campaign_calls(&db, "c1").await.unwrap();
        assert_eq!(stored[0].status, CallStatus::Calling);
        assert_eq!(stored[0].started_at, Some(at(2)));

        // The claimed row still accepts its outcome.
        let done = CallPatch {
            status: Some(CallStatus::Completed),
            completed_at: Some(at(4)),
            ..CallPatch::default()
        };
        assert!(update_call(&db, &calls[0].id, &done, at(4)).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn match_by_phone_skips_terminal_rows() {
        let (db, _dir, _) = setup().await;
        let done = CallPatch {
            status: Some(CallStatus::Completed),
            conversation_id: Some("conv-a".to_string()),
            completed_at: Some(at(3)),
            ..CallPatch::default()
        };
        assert_eq!(
            update_call_by_campaign_and_phone(&db, "c1", "+15550002", &done, at(3))
                .await
                .unwrap(),
            1
        );
        let again = CallPatch {
            status: Some(CallStatus::Failed),
            conversation_id: Some("conv-b".to_string()),
            ..CallPatch::default()
        };
        assert_eq!(
            update_call_by_campaign_and_phone(&db, "c1", "+15550002", &again, at(4))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            update_call_by_campaign_and_phone(&db, "c1", "+19999999", &done, at(4))
                .await
                .unwrap(),
            0
        );

        let calls = get_campaign_calls(&db, "c1").await.unwrap();
        assert_eq!(calls[1].status, CallStatus::Completed);
        assert_eq!(calls[1].conversation_id.as_deref(), Some("conv-a"));
        assert_eq!(calls[1].completed_at, Some(at(3)));
        assert_eq!(calls[0].status, CallStatus::Pending);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn deleting_campaign_cascades_to_calls() {
        let (db, _dir, _) = setup().await;
        crate::queries::campaigns::update_campaign_fields(
            &db,
            "c1",
            &outreach_core::CampaignPatch::status(CampaignStatus::Paused),
            &outreach_core::WriteGuard::any(),
            at(1),
        )
        .await
        .unwrap();
        assert!(crate::queries::campaigns::delete_campaign(&db, "t1", "c1").await.unwrap());
        assert!(get_campaign_calls(&db, "c1").await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
