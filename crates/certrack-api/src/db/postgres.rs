//! Postgres implementation of the engine's store boundary.
//!
//! Each [`StoreTx`] wraps a `sqlx::Transaction`; dropping it without
//! `commit` rolls back. Row locks come from `SELECT ... FOR UPDATE`. Audit
//! appends take a transaction-scoped advisory lock so concurrent writers
//! extend the hash chain one at a time.
//!
//! Enum columns are stored as their canonical strings and parsed on read.
//! A row that fails to parse is reported as [`StoreError::Corrupt`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;
use uuid::Uuid;

use certrack_core::{
    AuditEntryId, ComplianceStatus, RecordId, RequestId, RequirementId, Role, Tier, UserId,
};
use certrack_engine::{ComplianceAuditEntry, ComplianceStore, StoreError, StoreTx};
use certrack_state::{
    SwitchRequestStatus, TierSwitchRequest, UserComplianceRecord, UserProfile, Verification,
};

/// Advisory lock key serializing audit-chain appends ("certrack" in ASCII).
const AUDIT_CHAIN_LOCK: i64 = 0x6365_7274_7472_6163;

const PROFILE_COLUMNS: &str = "id, role, tier";
const RECORD_COLUMNS: &str = "id, user_id, requirement_id, status, value, active, \
     verified_by, verified_at, notes, created_at, updated_at";
const REQUEST_COLUMNS: &str = "id, user_id, current_tier, requested_tier, justification, \
     status, requested_at, reviewed_at, reviewed_by, admin_notes";
const AUDIT_COLUMNS: &str = "id, user_id, from_role, to_role, from_tier, to_tier, \
     added_count, removed_count, preserved_count, performed_by, \
     switch_request_id, performed_at, previous_hash, entry_hash";

// -- Error mapping ------------------------------------------------------------

fn store_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            tracing::warn!(error = %err, "failed to decode row");
            StoreError::Corrupt(err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "database operation failed");
            StoreError::Unavailable(err.to_string())
        }
    }
}

fn parse<T>(column: &'static str, raw: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| {
        tracing::warn!(column, value = raw, error = %e, "stored value failed to parse");
        StoreError::Corrupt(format!("{column}: {e}"))
    })
}

fn parse_opt<T>(column: &'static str, raw: Option<&str>) -> Result<Option<T>, StoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|r| parse(column, r)).transpose()
}

fn count(column: &'static str, n: i32) -> Result<u32, StoreError> {
    u32::try_from(n).map_err(|_| StoreError::Corrupt(format!("{column}: negative count {n}")))
}

// -- Rows ---------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    role: String,
    tier: String,
}

impl ProfileRow {
    fn into_profile(self) -> Result<UserProfile, StoreError> {
        Ok(UserProfile::new(
            UserId::from(self.id),
            parse("role", &self.role)?,
            parse("tier", &self.tier)?,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    user_id: Uuid,
    requirement_id: String,
    status: String,
    value: Option<String>,
    active: bool,
    verified_by: Option<Uuid>,
    verified_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_record(self) -> Result<UserComplianceRecord, StoreError> {
        let verification = self.verified_at.map(|verified_at| Verification {
            verified_by: self.verified_by.map(UserId::from),
            verified_at,
            notes: self.notes.clone(),
        });
        Ok(UserComplianceRecord {
            id: RecordId::from(self.id),
            user_id: UserId::from(self.user_id),
            requirement_id: parse::<RequirementId>("requirement_id", &self.requirement_id)?,
            status: parse::<ComplianceStatus>("status", &self.status)?,
            value: self.value,
            active: self.active,
            verification,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    user_id: Uuid,
    current_tier: String,
    requested_tier: String,
    justification: String,
    status: String,
    requested_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<Uuid>,
    admin_notes: Option<String>,
}

impl RequestRow {
    fn into_request(self) -> Result<TierSwitchRequest, StoreError> {
        Ok(TierSwitchRequest {
            id: RequestId::from(self.id),
            user_id: UserId::from(self.user_id),
            current_tier: parse::<Tier>("current_tier", &self.current_tier)?,
            requested_tier: parse::<Tier>("requested_tier", &self.requested_tier)?,
            justification: self.justification,
            status: parse::<SwitchRequestStatus>("status", &self.status)?,
            requested_at: self.requested_at,
            reviewed_at: self.reviewed_at,
            reviewed_by: self.reviewed_by.map(UserId::from),
            admin_notes: self.admin_notes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    user_id: Uuid,
    from_role: Option<String>,
    to_role: String,
    from_tier: Option<String>,
    to_tier: String,
    added_count: i32,
    removed_count: i32,
    preserved_count: i32,
    performed_by: Option<Uuid>,
    switch_request_id: Option<Uuid>,
    performed_at: DateTime<Utc>,
    previous_hash: String,
    entry_hash: String,
}

impl AuditRow {
    fn into_entry(self) -> Result<ComplianceAuditEntry, StoreError> {
        Ok(ComplianceAuditEntry {
            id: AuditEntryId::from(self.id),
            user_id: UserId::from(self.user_id),
            from_role: parse_opt::<Role>("from_role", self.from_role.as_deref())?,
            to_role: parse::<Role>("to_role", &self.to_role)?,
            from_tier: parse_opt::<Tier>("from_tier", self.from_tier.as_deref())?,
            to_tier: parse::<Tier>("to_tier", &self.to_tier)?,
            requirements_added: count("added_count", self.added_count)?,
            requirements_removed: count("removed_count", self.removed_count)?,
            requirements_preserved: count("preserved_count", self.preserved_count)?,
            performed_by: self.performed_by.map(UserId::from),
            switch_request_id: self.switch_request_id.map(RequestId::from),
            performed_at: self.performed_at,
            previous_hash: self.previous_hash,
            entry_hash: self.entry_hash,
        })
    }
}

fn collect<R, T>(
    rows: Vec<R>,
    convert: impl Fn(R) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(convert).collect()
}

fn signed(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

// -- Store --------------------------------------------------------------------

/// Postgres-backed [`ComplianceStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a migrated pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_profile(&mut self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1 FOR UPDATE"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_err)?;
        row.map(ProfileRow::into_profile).transpose()
    }

    async fn put_profile(&mut self, profile: &UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO profiles (id, role, tier, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (id) DO UPDATE
             SET role = EXCLUDED.role, tier = EXCLUDED.tier, updated_at = NOW()",
        )
        .bind(profile.user_id.as_uuid())
        .bind(profile.role.as_str())
        .bind(profile.tier.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn records_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Vec<UserComplianceRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM user_compliance_records
             WHERE user_id = $1 ORDER BY requirement_id"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_err)?;
        collect(rows, RecordRow::into_record)
    }

    async fn upsert_record(&mut self, record: &UserComplianceRecord) -> Result<(), StoreError> {
        let verification = record.verification.as_ref();
        sqlx::query(
            "INSERT INTO user_compliance_records
                 (id, user_id, requirement_id, status, value, active,
                  verified_by, verified_at, notes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (user_id, requirement_id) DO UPDATE
             SET status = EXCLUDED.status,
                 value = EXCLUDED.value,
                 active = EXCLUDED.active,
                 verified_by = EXCLUDED.verified_by,
                 verified_at = EXCLUDED.verified_at,
                 notes = EXCLUDED.notes,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(record.id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(record.requirement_id.as_str())
        .bind(record.status.as_str())
        .bind(record.value.as_deref())
        .bind(record.active)
        .bind(verification.and_then(|v| v.verified_by).map(|u| *u.as_uuid()))
        .bind(verification.map(|v| v.verified_at))
        .bind(verification.and_then(|v| v.notes.as_deref()))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn last_audit_hash(&mut self) -> Result<Option<String>, StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(AUDIT_CHAIN_LOCK)
            .execute(&mut *self.tx)
            .await
            .map_err(store_err)?;
        sqlx::query_scalar::<_, String>(
            "SELECT entry_hash FROM compliance_audit_log ORDER BY seq DESC LIMIT 1",
        )
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_err)
    }

    async fn append_audit(&mut self, entry: &ComplianceAuditEntry) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO compliance_audit_log ({AUDIT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(entry.id.as_uuid())
        .bind(entry.user_id.as_uuid())
        .bind(entry.from_role.map(|r| r.as_str()))
        .bind(entry.to_role.as_str())
        .bind(entry.from_tier.map(|t| t.as_str()))
        .bind(entry.to_tier.as_str())
        .bind(signed(entry.requirements_added))
        .bind(signed(entry.requirements_removed))
        .bind(signed(entry.requirements_preserved))
        .bind(entry.performed_by.map(|u| *u.as_uuid()))
        .bind(entry.switch_request_id.map(|r| *r.as_uuid()))
        .bind(entry.performed_at)
        .bind(&entry.previous_hash)
        .bind(&entry.entry_hash)
        .execute(&mut *self.tx)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn lock_request(
        &mut self,
        request_id: RequestId,
    ) -> Result<Option<TierSwitchRequest>, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM tier_switch_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(request_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_err)?;
        row.map(RequestRow::into_request).transpose()
    }

    async fn pending_request_for(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<TierSwitchRequest>, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM tier_switch_requests
             WHERE user_id = $1 AND status = 'pending'"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_err)?;
        row.map(RequestRow::into_request).transpose()
    }

    async fn insert_request(&mut self, request: &TierSwitchRequest) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO tier_switch_requests ({REQUEST_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(request.id.as_uuid())
        .bind(request.user_id.as_uuid())
        .bind(request.current_tier.as_str())
        .bind(request.requested_tier.as_str())
        .bind(&request.justification)
        .bind(request.status.as_str())
        .bind(request.requested_at)
        .bind(request.reviewed_at)
        .bind(request.reviewed_by.map(|u| *u.as_uuid()))
        .bind(request.admin_notes.as_deref())
        .execute(&mut *self.tx)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn update_request(&mut self, request: &TierSwitchRequest) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE tier_switch_requests
             SET status = $2, reviewed_at = $3, reviewed_by = $4, admin_notes = $5
             WHERE id = $1",
        )
        .bind(request.id.as_uuid())
        .bind(request.status.as_str())
        .bind(request.reviewed_at)
        .bind(request.reviewed_by.map(|u| *u.as_uuid()))
        .bind(request.admin_notes.as_deref())
        .execute(&mut *self.tx)
        .await
        .map_err(store_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!(
                "switch request {} vanished mid-transaction",
                request.id
            )));
        }
        Ok(())
    }

    async fn delete_request(&mut self, request_id: RequestId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tier_switch_requests WHERE id = $1")
            .bind(request_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(store_err)
    }
}

#[async_trait]
impl ComplianceStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(store_err)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(ProfileRow::into_profile).transpose()
    }

    async fn records_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserComplianceRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM user_compliance_records
             WHERE user_id = $1 ORDER BY requirement_id"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        collect(rows, RecordRow::into_record)
    }

    async fn get_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<TierSwitchRequest>, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM tier_switch_requests WHERE id = $1"
        ))
        .bind(request_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(RequestRow::into_request).transpose()
    }

    async fn pending_requests(&self) -> Result<Vec<TierSwitchRequest>, StoreError> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM tier_switch_requests
             WHERE status = 'pending' ORDER BY requested_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        collect(rows, RequestRow::into_request)
    }

    async fn requests_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TierSwitchRequest>, StoreError> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM tier_switch_requests
             WHERE user_id = $1 ORDER BY requested_at DESC, id DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        collect(rows, RequestRow::into_request)
    }

    async fn audit_entries(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Vec<ComplianceAuditEntry>, StoreError> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, AuditRow>(&format!(
                    "SELECT {AUDIT_COLUMNS} FROM compliance_audit_log
                     WHERE user_id = $1 ORDER BY seq ASC"
                ))
                .bind(user_id.as_uuid())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, AuditRow>(&format!(
                    "SELECT {AUDIT_COLUMNS} FROM compliance_audit_log ORDER BY seq ASC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(store_err)?;
        collect(rows, AuditRow::into_entry)
    }
}
