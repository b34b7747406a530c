// SPDX-FileCopyrightText: 2026 Outreach Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary and applied
//! when the database is opened.

use outreach_core::OutreachError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
///
/// Applied versions are tracked in refinery's `refinery_schema_history` table.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<usize, OutreachError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| OutreachError::Storage {
            source: Box::new(e),
        })?;
    Ok(report.applied_migrations().len())
}
