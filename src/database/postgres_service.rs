// =============================================================================
// POSTGRES STORE - Security telemetry persistence
// =============================================================================

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{ConnectOptions, Executor, PgPool, Postgres, QueryBuilder, Row};
use tracing::{error, info, log::LevelFilter};
use uuid::Uuid;

use crate::config::environment::EnvironmentVariables;
use crate::database::security_store::{EventQuery, FailedLogin, StoreError};
use crate::models::{
    dashboard::{
        AlertDigest, DashboardSummary, EventTypeCount, IpCount, SeverityCount, TimelineBucket,
    },
    user::normalize_email,
    AlertStatus, AlertType, AuditEvent, BlockedIp, DashboardSnapshot, EventType, Severity,
    ThreatAlert, User,
};
use crate::security::aggregation::{since_24h, since_7d, TOP_N};

// =============================================================================
// SQL CONSTANTS
// =============================================================================

/// Single initialization SQL script
const INIT_SCHEMA_SQL: &str = include_str!("sql/schema_init.sql");

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

const USER_COLUMNS: &str = "id, email, password_hash, full_name, is_staff, created_at, \
    failed_login_attempts, last_failed_login, is_locked, lockout_until, last_login_ip";

const EVENT_COLUMNS: &str = "id, event_type, severity, timestamp, user_id, user_email, \
    username_attempted, ip_address, user_agent, request_method, request_path, request_id, \
    description, extra_data, status_code";

const ALERT_COLUMNS: &str = "id, alert_type, severity, status, triggered_at, resolved_at, \
    source_ip, affected_user, description, evidence, recommended_action";

// =============================================================================
// POSTGRES STORE
// =============================================================================

/// Storage backend over a single PostgreSQL connection pool.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects the pool and runs the idempotent schema script.
    pub async fn connect(config: Arc<EnvironmentVariables>) -> Result<Self> {
        info!("Initializing PostgresStore...");

        let options: PgConnectOptions = create_connect_options(&config);
        let pool: PgPool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .idle_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        pool.execute(INIT_SCHEMA_SQL)
            .await
            .context("Failed to execute schema initialization SQL")?;

        info!("PostgresStore initialized successfully");
        Ok(Self { pool })
    }

    /// Gracefully closes the pool.
    pub async fn shutdown(&self) {
        info!("Initiating PostgresStore shutdown...");
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

/// Connection options with UTC timezone and environment-dependent SSL
fn create_connect_options(config: &EnvironmentVariables) -> PgConnectOptions {
    let options: PgConnectOptions = PgConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&config.db_user)
        .password(&config.db_password)
        .database(&config.db_name)
        .options([("timezone", "UTC"), ("application_name", "hotel-sentinel")])
        .log_statements(LevelFilter::Debug);

    if config.environment == "development" {
        options.ssl_mode(sqlx::postgres::PgSslMode::Prefer)
    } else {
        options.ssl_mode(sqlx::postgres::PgSslMode::Require)
    }
}

// =============================================================================
// USERS
// =============================================================================

impl PostgresStore {
    pub async fn create_user(&self, user: User) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, is_staff, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.is_staff)
        .bind(user.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                Err(StoreError::Conflict)
            }
            Err(e) => Err(StoreError::Backend(
                anyhow::Error::new(e).context("Failed to insert user"),
            )),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query: String = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row: Option<PgRow> = sqlx::query(&query)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let query: String = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<PgRow> = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn record_failed_login(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        max_failures: i32,
        lockout_until: DateTime<Utc>,
    ) -> Result<Option<FailedLogin>> {
        // The row lock in `prev` serializes concurrent failures for one account
        let query: String = format!(
            r#"
            WITH prev AS (
                SELECT id AS prev_id, is_locked AS was_locked
                FROM users WHERE id = $1
                FOR UPDATE
            )
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1,
                last_failed_login = $2,
                is_locked = is_locked OR failed_login_attempts + 1 >= $3,
                lockout_until = CASE
                    WHEN NOT is_locked AND failed_login_attempts + 1 >= $3 THEN $4
                    ELSE lockout_until
                END
            FROM prev
            WHERE id = prev.prev_id
            RETURNING {USER_COLUMNS}, (is_locked AND NOT was_locked) AS locked_now
            "#
        );
        let row: Option<PgRow> = sqlx::query(&query)
            .bind(id)
            .bind(now)
            .bind(max_failures)
            .bind(lockout_until)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to record failed login")?;

        row.map(|row| -> Result<FailedLogin> {
            Ok(FailedLogin {
                user: user_from_row(&row)?,
                locked_now: row.try_get("locked_now")?,
            })
        })
        .transpose()
    }

    pub async fn record_successful_login(
        &self,
        id: Uuid,
        ip: Option<IpAddr>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0,
                last_login_ip = $2
            WHERE id = $1
              AND NOT COALESCE(is_locked AND lockout_until > $3, FALSE)
            "#,
        )
        .bind(id)
        .bind(ip.map(|ip| ip.to_string()))
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to record successful login")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_expired_lock(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_locked = FALSE,
                lockout_until = NULL,
                failed_login_attempts = 0
            WHERE id = $1
              AND is_locked
              AND (lockout_until IS NULL OR lockout_until <= $2)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to clear expired lock")?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// AUDIT EVENTS
// =============================================================================

impl PostgresStore {
    pub async fn insert_event(&self, event: &AuditEvent) -> Result<()> {
        let query: String = format!(
            "INSERT INTO audit_events ({EVENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        );

        sqlx::query(&query)
            .bind(event.id)
            .bind(event.event_type.as_str())
            .bind(event.severity.as_str())
            .bind(event.timestamp)
            .bind(event.user_id)
            .bind(&event.user_email)
            .bind(&event.username_attempted)
            .bind(event.ip_address.map(|ip| ip.to_string()))
            .bind(&event.user_agent)
            .bind(&event.request_method)
            .bind(&event.request_path)
            .bind(event.request_id)
            .bind(&event.description)
            .bind(&event.extra_data)
            .bind(event.status_code.map(i32::from))
            .execute(&self.pool)
            .await
            .context("Failed to insert audit event")?;

        Ok(())
    }

    pub async fn count_events(&self, query: &EventQuery) -> Result<i64> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_events WHERE TRUE");

        if let Some(event_type) = query.event_type {
            builder.push(" AND event_type = ").push_bind(event_type.as_str());
        }
        if let Some(ip) = query.ip_address {
            builder.push(" AND ip_address = ").push_bind(ip.to_string());
        }
        if let Some(fragment) = query.path_contains {
            builder
                .push(" AND request_path LIKE ")
                .push_bind(format!("%{fragment}%"));
        }
        if let Some(since) = query.since {
            builder.push(" AND timestamp >= ").push_bind(since);
        }

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count audit events")
    }

    pub async fn recent_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let query: String =
            format!("SELECT {EVENT_COLUMNS} FROM audit_events ORDER BY timestamp DESC LIMIT $1");
        let rows: Vec<PgRow> = sqlx::query(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch recent audit events")?;

        rows.iter().map(event_from_row).collect()
    }
}

// =============================================================================
// THREAT ALERTS
// =============================================================================

impl PostgresStore {
    pub async fn insert_alert(&self, alert: &ThreatAlert) -> Result<()> {
        let query: String = format!(
            "INSERT INTO threat_alerts ({ALERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );

        sqlx::query(&query)
            .bind(alert.id)
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(alert.status.as_str())
            .bind(alert.triggered_at)
            .bind(alert.resolved_at)
            .bind(alert.source_ip.map(|ip| ip.to_string()))
            .bind(alert.affected_user)
            .bind(&alert.description)
            .bind(&alert.evidence)
            .bind(&alert.recommended_action)
            .execute(&self.pool)
            .await
            .context("Failed to insert threat alert")?;

        Ok(())
    }

    pub async fn has_open_alert(
        &self,
        alert_type: AlertType,
        ip: IpAddr,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM threat_alerts
                WHERE alert_type = $1 AND source_ip = $2 AND status = 'OPEN' AND triggered_at >= $3
            )
            "#,
        )
        .bind(alert_type.as_str())
        .bind(ip.to_string())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check for open alerts")
    }

    pub async fn list_alerts(
        &self,
        status: Option<AlertStatus>,
        limit: usize,
    ) -> Result<Vec<ThreatAlert>> {
        let query: String = format!(
            "SELECT {ALERT_COLUMNS} FROM threat_alerts \
             WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY triggered_at DESC LIMIT $2"
        );
        let rows: Vec<PgRow> = sqlx::query(&query)
            .bind(status.map(|s| s.as_str()))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list threat alerts")?;

        rows.iter().map(alert_from_row).collect()
    }

    pub async fn set_alert_status(
        &self,
        id: Uuid,
        status: AlertStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<ThreatAlert>> {
        let resolved_at: Option<DateTime<Utc>> = status.is_closed().then_some(now);
        let query: String = format!(
            "UPDATE threat_alerts SET status = $2, resolved_at = $3 WHERE id = $1 \
             RETURNING {ALERT_COLUMNS}"
        );
        let row: Option<PgRow> = sqlx::query(&query)
            .bind(id)
            .bind(status.as_str())
            .bind(resolved_at)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update alert status")?;

        row.as_ref().map(alert_from_row).transpose()
    }
}

// =============================================================================
// IP BLOCKS
// =============================================================================

impl PostgresStore {
    pub async fn upsert_block(&self, block: &BlockedIp) -> Result<bool> {
        // xmax is zero only for freshly inserted tuples
        sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO blocked_ips (ip_address, reason, blocked_at, blocked_until, is_active, auto_blocked)
            VALUES ($1, $2, $3, $4, TRUE, $5)
            ON CONFLICT (ip_address) DO UPDATE
            SET reason = EXCLUDED.reason,
                blocked_until = EXCLUDED.blocked_until,
                is_active = TRUE,
                auto_blocked = EXCLUDED.auto_blocked
            RETURNING (xmax = 0)
            "#,
        )
        .bind(block.ip_address.to_string())
        .bind(&block.reason)
        .bind(block.blocked_at)
        .bind(block.blocked_until)
        .bind(block.auto_blocked)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert blocked IP")
    }

    pub async fn deactivate_block(&self, ip: IpAddr) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE blocked_ips SET is_active = FALSE WHERE ip_address = $1 AND is_active",
        )
        .bind(ip.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to deactivate blocked IP")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_blocked(&self, ip: IpAddr, now: DateTime<Utc>) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM blocked_ips
                WHERE ip_address = $1 AND is_active
                  AND (blocked_until IS NULL OR blocked_until > $2)
            )
            "#,
        )
        .bind(ip.to_string())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check blocked IP")
    }
}

// =============================================================================
// DASHBOARD
// =============================================================================

impl PostgresStore {
    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<DashboardSnapshot> {
        let day_ago: DateTime<Utc> = since_24h(now);
        let week_ago: DateTime<Utc> = since_7d(now);

        let summary: DashboardSummary = self.summary(now, day_ago).await?;

        let timeline: Vec<TimelineBucket> = sqlx::query(
            r#"
            SELECT (date_trunc('hour', timestamp AT TIME ZONE 'UTC') AT TIME ZONE 'UTC') AS hour,
                   COUNT(*) AS count
            FROM audit_events
            WHERE timestamp >= $1
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(day_ago)
        .fetch_all(&self.pool)
        .await
        .context("Failed to build event timeline")?
        .iter()
        .map(|row| -> Result<TimelineBucket, sqlx::Error> {
            Ok(TimelineBucket {
                hour: row.try_get("hour")?,
                count: row.try_get("count")?,
            })
        })
        .collect::<Result<_, sqlx::Error>>()?;

        let mut severity_distribution: Vec<SeverityCount> = sqlx::query(
            r#"
            SELECT severity, COUNT(*) AS count
            FROM audit_events
            WHERE timestamp >= $1
            GROUP BY severity
            "#,
        )
        .bind(week_ago)
        .fetch_all(&self.pool)
        .await
        .context("Failed to build severity distribution")?
        .iter()
        .map(|row| -> Result<SeverityCount> {
            Ok(SeverityCount {
                severity: row.try_get::<String, _>("severity")?.parse()?,
                count: row.try_get("count")?,
            })
        })
        .collect::<Result<_>>()?;
        severity_distribution.sort_by(|a, b| b.severity.cmp(&a.severity));

        let events_by_type: Vec<EventTypeCount> = sqlx::query(
            r#"
            SELECT event_type, COUNT(*) AS count
            FROM audit_events
            WHERE timestamp >= $1
            GROUP BY event_type
            ORDER BY count DESC, event_type ASC
            LIMIT $2
            "#,
        )
        .bind(day_ago)
        .bind(TOP_N as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to rank events by type")?
        .iter()
        .map(|row| -> Result<EventTypeCount> {
            Ok(EventTypeCount {
                event_type: row.try_get::<String, _>("event_type")?.parse()?,
                count: row.try_get("count")?,
            })
        })
        .collect::<Result<_>>()?;

        let top_suspicious_ips: Vec<IpCount> = sqlx::query(
            r#"
            SELECT ip_address, COUNT(*) AS count
            FROM audit_events
            WHERE timestamp >= $1
              AND severity IN ('HIGH', 'CRITICAL')
              AND ip_address IS NOT NULL
            GROUP BY ip_address
            ORDER BY count DESC, ip_address ASC
            LIMIT $2
            "#,
        )
        .bind(day_ago)
        .bind(TOP_N as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to rank suspicious IPs")?
        .iter()
        .map(|row| -> Result<IpCount, sqlx::Error> {
            Ok(IpCount {
                ip_address: row.try_get("ip_address")?,
                count: row.try_get("count")?,
            })
        })
        .collect::<Result<_, sqlx::Error>>()?;

        let recent_alerts: Vec<AlertDigest> = self
            .list_alerts(Some(AlertStatus::Open), TOP_N)
            .await?
            .iter()
            .map(AlertDigest::from)
            .collect();

        Ok(DashboardSnapshot {
            summary,
            event_timeline: timeline,
            severity_distribution,
            events_by_type,
            top_suspicious_ips,
            recent_alerts,
        })
    }

    async fn summary(&self, now: DateTime<Utc>, day_ago: DateTime<Utc>) -> Result<DashboardSummary> {
        let row: PgRow = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM threat_alerts WHERE status = 'OPEN') AS open_alerts,
                (SELECT COUNT(*) FROM audit_events
                    WHERE severity = 'CRITICAL' AND timestamp >= $1) AS critical_events_24h,
                (SELECT COUNT(*) FROM audit_events
                    WHERE event_type = 'LOGIN_FAILED' AND timestamp >= $1) AS failed_logins_24h,
                (SELECT COUNT(*) FROM blocked_ips
                    WHERE is_active AND (blocked_until IS NULL OR blocked_until > $2)) AS blocked_ips,
                (SELECT COUNT(*) FROM threat_alerts WHERE triggered_at >= $1) AS total_alerts_24h
            "#,
        )
        .bind(day_ago)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute dashboard summary")?;

        Ok(DashboardSummary {
            open_alerts: row.try_get("open_alerts")?,
            critical_events_24h: row.try_get("critical_events_24h")?,
            failed_logins_24h: row.try_get("failed_logins_24h")?,
            blocked_ips: row.try_get("blocked_ips")?,
            total_alerts_24h: row.try_get("total_alerts_24h")?,
        })
    }
}

// =============================================================================
// ROW MAPPING
// =============================================================================

fn parse_ip(value: Option<String>) -> Option<IpAddr> {
    value.and_then(|raw| match raw.parse() {
        Ok(ip) => Some(ip),
        Err(_) => {
            error!("Discarding unparsable IP address '{}' read from database", raw);
            None
        }
    })
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        full_name: row.try_get("full_name")?,
        is_staff: row.try_get("is_staff")?,
        created_at: row.try_get("created_at")?,
        failed_login_attempts: row.try_get("failed_login_attempts")?,
        last_failed_login: row.try_get("last_failed_login")?,
        is_locked: row.try_get("is_locked")?,
        lockout_until: row.try_get("lockout_until")?,
        last_login_ip: parse_ip(row.try_get("last_login_ip")?),
    })
}

fn event_from_row(row: &PgRow) -> Result<AuditEvent> {
    let event_type: EventType = row.try_get::<String, _>("event_type")?.parse()?;
    let severity: Severity = row.try_get::<String, _>("severity")?.parse()?;
    let status_code: Option<i32> = row.try_get("status_code")?;

    Ok(AuditEvent {
        id: row.try_get("id")?,
        event_type,
        severity,
        timestamp: row.try_get("timestamp")?,
        user_id: row.try_get("user_id")?,
        user_email: row.try_get("user_email")?,
        username_attempted: row.try_get("username_attempted")?,
        ip_address: parse_ip(row.try_get("ip_address")?),
        user_agent: row.try_get("user_agent")?,
        request_method: row.try_get("request_method")?,
        request_path: row.try_get("request_path")?,
        request_id: row.try_get("request_id")?,
        description: row.try_get("description")?,
        extra_data: row.try_get::<Value, _>("extra_data")?,
        status_code: status_code.and_then(|code| u16::try_from(code).ok()),
    })
}

fn alert_from_row(row: &PgRow) -> Result<ThreatAlert> {
    Ok(ThreatAlert {
        id: row.try_get("id")?,
        alert_type: row.try_get::<String, _>("alert_type")?.parse()?,
        severity: row.try_get::<String, _>("severity")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        triggered_at: row.try_get("triggered_at")?,
        resolved_at: row.try_get("resolved_at")?,
        source_ip: parse_ip(row.try_get("source_ip")?),
        affected_user: row.try_get("affected_user")?,
        description: row.try_get("description")?,
        evidence: row.try_get::<Value, _>("evidence")?,
        recommended_action: row.try_get("recommended_action")?,
    })
}
