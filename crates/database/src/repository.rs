use crate::DbError;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{CoreError, CurrencyCode, PositioningReport};
use sqlx::FromRow;
use sqlx::postgres::PgPool;

/// Whether `append` created a new row or corrected an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    Updated,
}

/// Durable, append-only history of positioning reports per currency.
///
/// Implementations keep one report per `(currency, report_date)`; appending a
/// date that already exists overwrites its fields. Reads always return
/// reports in ascending date order.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Upserts a report by `(currency, report_date)`.
    async fn append(&self, report: &PositioningReport) -> Result<AppendOutcome, DbError>;

    /// The last `n` reports for `currency`, ascending by date.
    ///
    /// Fails with `DbError::InsufficientData` when fewer than `n` exist; the
    /// window is never shortened.
    async fn window(
        &self,
        currency: &CurrencyCode,
        n: usize,
    ) -> Result<Vec<PositioningReport>, DbError>;

    /// The most recent report, or `DbError::NotFound`.
    async fn latest(&self, currency: &CurrencyCode) -> Result<PositioningReport, DbError>;

    /// Reports with `from <= report_date <= to`, ascending by date.
    async fn range(
        &self,
        currency: &CurrencyCode,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PositioningReport>, DbError>;

    /// Number of stored reports for `currency`.
    async fn count(&self, currency: &CurrencyCode) -> Result<usize, DbError>;

    /// Every currency with at least one stored report, in code order.
    async fn currencies(&self) -> Result<Vec<CurrencyCode>, DbError>;
}

pub(crate) fn check_window_size(n: usize) -> Result<(), DbError> {
    if n == 0 {
        return Err(DbError::InvalidRequest(
            "window size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_range(from: NaiveDate, to: NaiveDate) -> Result<(), DbError> {
    if from > to {
        return Err(DbError::InvalidRequest(format!(
            "range start {} is after range end {}",
            from, to
        )));
    }
    Ok(())
}

/// A row of the `cot_reports` table.
#[derive(Debug, Clone, FromRow)]
pub struct DbReportRow {
    pub currency: String,
    pub report_date: NaiveDate,
    pub net_position: i64,
    pub open_interest: i64,
}

impl TryFrom<DbReportRow> for PositioningReport {
    type Error = CoreError;

    // Rows are re-validated on the way out; a corrupt row is a malformed record.
    fn try_from(row: DbReportRow) -> Result<Self, Self::Error> {
        PositioningReport::new(
            row.currency.parse()?,
            row.report_date,
            row.net_position,
            row.open_interest,
        )
    }
}

fn into_reports(rows: Vec<DbReportRow>) -> Result<Vec<PositioningReport>, DbError> {
    rows.into_iter()
        .map(|row| PositioningReport::try_from(row).map_err(DbError::from))
        .collect()
}

/// The `ReportStore` backed by the `cot_reports` table in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    /// Creates a new `PgReportStore` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn append(&self, report: &PositioningReport) -> Result<AppendOutcome, DbError> {
        // `xmax = 0` only holds for a freshly inserted tuple.
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO cot_reports (currency, report_date, net_position, open_interest, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (currency, report_date) DO UPDATE
            SET net_position = EXCLUDED.net_position,
                open_interest = EXCLUDED.open_interest
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(report.currency().as_str())
        .bind(report.report_date())
        .bind(report.net_position())
        .bind(report.open_interest())
        .fetch_one(&self.pool)
        .await?;

        Ok(if inserted {
            AppendOutcome::Inserted
        } else {
            AppendOutcome::Updated
        })
    }

    async fn window(
        &self,
        currency: &CurrencyCode,
        n: usize,
    ) -> Result<Vec<PositioningReport>, DbError> {
        check_window_size(n)?;
        let limit = i64::try_from(n)
            .map_err(|_| DbError::InvalidRequest(format!("window size {} is too large", n)))?;

        let mut rows = sqlx::query_as::<_, DbReportRow>(
            r#"
            SELECT currency, report_date, net_position, open_interest
            FROM cot_reports
            WHERE currency = $1
            ORDER BY report_date DESC
            LIMIT $2
            "#,
        )
        .bind(currency.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if rows.len() < n {
            return Err(DbError::InsufficientData {
                currency: currency.to_string(),
                requested: n,
                available: rows.len(),
            });
        }

        rows.reverse();
        into_reports(rows)
    }

    async fn latest(&self, currency: &CurrencyCode) -> Result<PositioningReport, DbError> {
        let row = sqlx::query_as::<_, DbReportRow>(
            r#"
            SELECT currency, report_date, net_position, open_interest
            FROM cot_reports
            WHERE currency = $1
            ORDER BY report_date DESC
            LIMIT 1
            "#,
        )
        .bind(currency.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(PositioningReport::try_from(row)?)
    }

    async fn range(
        &self,
        currency: &CurrencyCode,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PositioningReport>, DbError> {
        check_range(from, to)?;
        let rows = sqlx::query_as::<_, DbReportRow>(
            r#"
            SELECT currency, report_date, net_position, open_interest
            FROM cot_reports
            WHERE currency = $1 AND report_date BETWEEN $2 AND $3
            ORDER BY report_date ASC
            "#,
        )
        .bind(currency.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        into_reports(rows)
    }

    async fn count(&self, currency: &CurrencyCode) -> Result<usize, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cot_reports WHERE currency = $1")
            .bind(currency.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn currencies(&self) -> Result<Vec<CurrencyCode>, DbError> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT currency FROM cot_reports ORDER BY currency")
                .fetch_all(&self.pool)
                .await?;
        codes
            .into_iter()
            .map(|code| code.parse::<CurrencyCode>().map_err(DbError::from))
            .collect()
    }
}
