//! Identity directory persistence.
//!
//! Loomnet consumes identity resolution rather than owning account
//! management; this table is the local projection the registry and route
//! selector check handles against.

use rusqlite::{params, OptionalExtension, Row};

use loomnet_core::error::Result;
use loomnet_core::time::now_ms;
use loomnet_domain::{Identity, IdentityResolution, PrivacyLevel};

use crate::{parse_text, Store};

fn map_identity(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        handle: row.get(0)?,
        privacy_level: parse_text(1, row.get::<_, String>(1)?)?,
        discoverable: row.get::<_, i64>(2)? != 0,
        created_at: row.get(3)?,
    })
}

impl Store {
    /// Create or update an identity record.
    pub fn upsert_identity(
        &self,
        handle: &str,
        privacy_level: PrivacyLevel,
        discoverable: bool,
    ) -> Result<Identity> {
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO identities (handle, privacy_level, discoverable, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(handle) DO UPDATE SET
                     privacy_level = excluded.privacy_level,
                     discoverable = excluded.discoverable",
                params![handle, privacy_level.as_str(), discoverable as i64, now],
            )?;
            Ok(Identity {
                handle: handle.to_string(),
                privacy_level,
                discoverable,
                created_at: now,
            })
        })
    }

    /// Fetch an identity by handle.
    pub fn get_identity(&self, handle: &str) -> Result<Option<Identity>> {
        self.with_conn(|conn| {
            let identity = conn
                .query_row(
                    "SELECT handle, privacy_level, discoverable, created_at
                     FROM identities WHERE handle = ?1",
                    params![handle],
                    map_identity,
                )
                .optional()?;
            Ok(identity)
        })
    }

    /// Whether a handle has a backing record.
    pub fn identity_exists(&self, handle: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM identities WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Resolve a handle the way the external signaling layer does.
    pub fn resolve_identity(&self, handle: &str) -> Result<IdentityResolution> {
        Ok(match self.get_identity(handle)? {
            Some(identity) => IdentityResolution {
                exists: true,
                privacy_level: Some(identity.privacy_level),
                discoverable: identity.discoverable,
            },
            None => IdentityResolution::missing(),
        })
    }
}
