//! Identity verification persistence.

use rusqlite::{params, OptionalExtension, Row};

use loomnet_core::error::Result;
use loomnet_domain::{VerificationRecord, VerificationStatus};

use crate::{parse_text, Store};

fn map_verification(row: &Row<'_>) -> rusqlite::Result<VerificationRecord> {
    Ok(VerificationRecord {
        verification_id: row.get(0)?,
        identity: row.get(1)?,
        method: parse_text(2, row.get::<_, String>(2)?)?,
        status: parse_text(3, row.get::<_, String>(3)?)?,
        deadline: row.get(4)?,
        created_at: row.get(5)?,
        verified_at: row.get(6)?,
    })
}

impl Store {
    /// Record a new verification attempt.
    pub fn insert_verification(&self, record: &VerificationRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO verifications (verification_id, identity, method, status, \
                 deadline, created_at, verified_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.verification_id,
                    record.identity,
                    record.method.as_str(),
                    record.status.as_str(),
                    record.deadline,
                    record.created_at,
                    record.verified_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Fetch a verification record by id.
    pub fn get_verification(&self, verification_id: &str) -> Result<Option<VerificationRecord>> {
        self.with_conn(|conn| {
            let record = conn
                .query_row(
                    "SELECT verification_id, identity, method, status, deadline, \
                     created_at, verified_at
                     FROM verifications WHERE verification_id = ?1",
                    params![verification_id],
                    map_verification,
                )
                .optional()?;
            Ok(record)
        })
    }

    /// Settle a pending verification. Zero rows updated means a concurrent
    /// caller (or the expiry sweep) settled it first.
    pub fn settle_verification(
        &self,
        verification_id: &str,
        status: VerificationStatus,
        verified_at: Option<i64>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE verifications SET status = ?1, verified_at = ?2
                 WHERE verification_id = ?3 AND status = 'pending'",
                params![status.as_str(), verified_at, verification_id],
            )?;
            Ok(changed)
        })
    }

    /// Sum of fixed method bonuses over this identity's verified records.
    pub fn verification_bonus(&self, identity: &str) -> Result<f64> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT method FROM verifications
                 WHERE identity = ?1 AND status = 'verified'",
            )?;
            let methods = stmt
                .query_map(params![identity], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut bonus = 0.0;
            for raw in methods {
                let method: loomnet_domain::VerificationMethod = raw.parse()?;
                bonus += method.bonus();
            }
            Ok(bonus)
        })
    }

    /// Expire pending verifications whose deadline has passed. Idempotent.
    pub fn expire_pending_verifications(&self, now_ms: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE verifications SET status = 'expired'
                 WHERE status = 'pending' AND deadline < ?1",
                params![now_ms],
            )?;
            Ok(changed)
        })
    }
}
