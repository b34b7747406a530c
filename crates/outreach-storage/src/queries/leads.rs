// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead lookup and seeding.

use std::collections::HashSet;

use outreach_core::OutreachError;
use outreach_core::types::LeadContact;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// Insert a lead row for `tenant_id`.
pub async fn insert_lead(
    db: &Database,
    tenant_id: &str,
    name: &str,
    phone_number: Option<&str>,
    email: Option<&str>,
) -> Result<String, OutreachError> {
    let id = uuid::Uuid::new_v4().to_string();
    let row_id = id.clone();
    let tenant_id = tenant_id.to_string();
    let name = name.to_string();
    let phone_number = phone_number.map(str::to_string);
    let email = email.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO leads (id, tenant_id, name, phone_number, email)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row_id, tenant_id, name, phone_number, email],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(id)
}

/// Resolve lead ids to dialable contacts of one tenant.
///
/// Keeps first-appearance order, drops duplicates, and skips ids that are
/// unknown, owned by another tenant, or lack a phone number.
pub async fn resolve_phone_numbers(
    db: &Database,
    tenant_id: &str,
    lead_ids: &[String],
) -> Result<Vec<LeadContact>, OutreachError> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = lead_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();
    let tenant_id = tenant_id.to_string();

    db.connection()
        .call(move |conn| -> Result<Vec<LeadContact>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, name, phone_number, email FROM leads
                 WHERE id = ?1 AND tenant_id = ?2
                   AND phone_number IS NOT NULL AND TRIM(phone_number) != ''",
            )?;
            let mut contacts = Vec::with_capacity(unique.len());
            for id in &unique {
                let found = stmt
                    .query_row(params![id, tenant_id], |row| {
                        Ok(LeadContact {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            phone_number: row.get(2)?,
                            email: row.get(3)?,
                        })
                    })
                    .optional()?;
                contacts.extend(found);
            }
            Ok(contacts)
        })
        .await
        .map_err(map_tr_err)
}
