//! Bill store
//!
//! Bills, participants and the per-user queries feeding the dashboard and
//! balance computations. Bills are soft-deleted via `is_active`; inactive
//! bills are invisible to every query here.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::{round_money, DomainError, OwnedShare};
use crate::error::AppError;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 8;
const CODE_MAX_ATTEMPTS: u32 = 10;

/// A bill row with the creator's display name resolved.
#[derive(Debug, Clone, Serialize)]
pub struct Bill {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub total_amount: Decimal,
    pub created_by: i64,
    pub creator_name: String,
    pub created_at: DateTime<Utc>,
}

/// A participant row. Registered participants carry `user_id`; guests carry
/// `guest_email`. `name` is resolved from the users table for registered
/// participants.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub id: i64,
    pub bill_id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub guest_email: Option<String>,
    pub amount_owed: Decimal,
}

/// A bill as listed for its creator, with participant aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct BillListItem {
    pub id: i64,
    pub code: String,
    pub title: String,
    pub total_amount: Decimal,
    pub participant_count: i64,
    pub total_owed: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A bill the user participates in, with their own share attached.
#[derive(Debug, Clone, Serialize)]
pub struct Participation {
    pub bill_id: i64,
    pub code: String,
    pub title: String,
    pub total_amount: Decimal,
    pub amount_owed: Decimal,
    pub creator_name: String,
    pub created_at: DateTime<Utc>,
}

/// One entry in the recent-activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityItem {
    pub activity: String,
    pub bill_id: i64,
    pub code: String,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

/// Input for bill creation, validated by the API layer for presence.
#[derive(Debug, Clone)]
pub struct NewBill {
    pub title: String,
    pub description: Option<String>,
    pub total_amount: Decimal,
}

/// Who a new participant is.
#[derive(Debug, Clone)]
pub enum ParticipantInput {
    Registered { user_id: i64 },
    Guest { name: String, email: String },
}

/// Store for bill and participant rows
#[derive(Debug, Clone)]
pub struct BillStore {
    pool: PgPool,
}

impl BillStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Generate a unique 8-character bill code. Draws fresh candidates until
    /// one misses the table, giving up after a bounded number of attempts.
    pub async fn generate_code(&self) -> Result<String, AppError> {
        for _ in 0..CODE_MAX_ATTEMPTS {
            let code = random_code();
            let taken: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM bills WHERE code = $1)")
                    .bind(&code)
                    .fetch_one(&self.pool)
                    .await?;

            if !taken {
                return Ok(code);
            }
        }

        Err(DomainError::CodeGenerationExhausted {
            attempts: CODE_MAX_ATTEMPTS,
        }
        .into())
    }

    /// Create a bill for a user. Returns the stored bill with its code.
    pub async fn create_bill(&self, creator_id: i64, new_bill: &NewBill) -> Result<Bill, AppError> {
        if new_bill.total_amount < Decimal::ZERO {
            return Err(
                DomainError::InvalidAmount("Total amount cannot be negative".to_string()).into(),
            );
        }

        let code = self.generate_code().await?;
        let total_amount = round_money(new_bill.total_amount);

        let bill_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bills (code, title, description, total_amount, created_by, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING id
            "#,
        )
        .bind(&code)
        .bind(&new_bill.title)
        .bind(&new_bill.description)
        .bind(total_amount)
        .bind(creator_id)
        .fetch_one(&self.pool)
        .await?;

        self.get_bill_by_id(bill_id)
            .await?
            .ok_or_else(|| AppError::Internal("bill vanished after insert".to_string()))
    }

    /// Fetch an active bill by id.
    pub async fn get_bill_by_id(&self, bill_id: i64) -> Result<Option<Bill>, AppError> {
        let row: Option<BillRow> = sqlx::query_as(
            r#"
            SELECT b.id, b.code, b.title, b.description, b.total_amount, b.created_by,
                   u.first_name || ' ' || u.last_name, b.created_at
            FROM bills b
            JOIN users u ON b.created_by = u.id
            WHERE b.id = $1 AND b.is_active = TRUE
            "#,
        )
        .bind(bill_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_bill))
    }

    /// Fetch an active bill by its share code.
    pub async fn get_bill_by_code(&self, code: &str) -> Result<Option<Bill>, AppError> {
        let row: Option<BillRow> = sqlx::query_as(
            r#"
            SELECT b.id, b.code, b.title, b.description, b.total_amount, b.created_by,
                   u.first_name || ' ' || u.last_name, b.created_at
            FROM bills b
            JOIN users u ON b.created_by = u.id
            WHERE b.code = $1 AND b.is_active = TRUE
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_bill))
    }

    /// List a user's active bills with participant aggregates, newest first.
    pub async fn get_user_bills(&self, user_id: i64) -> Result<Vec<BillListItem>, AppError> {
        let rows: Vec<(i64, String, String, Decimal, i64, Decimal, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT b.id, b.code, b.title, b.total_amount,
                       COUNT(bp.id), COALESCE(SUM(bp.amount_owed), 0), b.created_at
                FROM bills b
                LEFT JOIN bill_participants bp ON bp.bill_id = b.id
                WHERE b.created_by = $1 AND b.is_active = TRUE
                GROUP BY b.id
                ORDER BY b.created_at DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, code, title, total_amount, participant_count, total_owed, created_at)| {
                    BillListItem {
                        id,
                        code,
                        title,
                        total_amount,
                        participant_count,
                        total_owed,
                        created_at,
                    }
                },
            )
            .collect())
    }

    /// List a bill's participants in insertion order.
    pub async fn get_participants(&self, bill_id: i64) -> Result<Vec<Participant>, AppError> {
        let rows: Vec<(i64, i64, Option<i64>, String, Option<String>, Decimal)> = sqlx::query_as(
            r#"
            SELECT bp.id, bp.bill_id, bp.user_id,
                   COALESCE(u.first_name || ' ' || u.last_name, bp.guest_name, ''),
                   bp.guest_email, bp.amount_owed
            FROM bill_participants bp
            LEFT JOIN users u ON bp.user_id = u.id
            WHERE bp.bill_id = $1
            ORDER BY bp.id
            "#,
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, bill_id, user_id, name, guest_email, amount_owed)| Participant {
                    id,
                    bill_id,
                    user_id,
                    name,
                    guest_email,
                    amount_owed,
                },
            )
            .collect())
    }

    /// Add a participant to an active bill. Registered users may appear at
    /// most once per bill; guests need both a name and an email.
    pub async fn add_participant(
        &self,
        bill_id: i64,
        input: &ParticipantInput,
        amount_owed: Decimal,
    ) -> Result<i64, AppError> {
        if amount_owed < Decimal::ZERO {
            return Err(
                DomainError::InvalidAmount("Amount owed cannot be negative".to_string()).into(),
            );
        }
        let amount_owed = round_money(amount_owed);

        self.get_bill_by_id(bill_id).await?.ok_or(AppError::BillNotFound)?;

        match input {
            ParticipantInput::Registered { user_id } => {
                let user_exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                        .bind(user_id)
                        .fetch_one(&self.pool)
                        .await?;
                if !user_exists {
                    return Err(AppError::UserNotFound(user_id.to_string()));
                }

                let already_added: bool = sqlx::query_scalar(
                    "SELECT EXISTS (SELECT 1 FROM bill_participants WHERE bill_id = $1 AND user_id = $2)",
                )
                .bind(bill_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
                if already_added {
                    return Err(DomainError::DuplicateParticipant {
                        bill_id,
                        user_id: *user_id,
                    }
                    .into());
                }

                // The unique index on (bill_id, user_id) closes the race two
                // concurrent adds leave open between the check and the insert.
                let inserted: Result<i64, sqlx::Error> = sqlx::query_scalar(
                    r#"
                    INSERT INTO bill_participants (bill_id, user_id, amount_owed)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(bill_id)
                .bind(user_id)
                .bind(amount_owed)
                .fetch_one(&self.pool)
                .await;

                match inserted {
                    Ok(participant_id) => Ok(participant_id),
                    Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                        Err(DomainError::DuplicateParticipant {
                            bill_id,
                            user_id: *user_id,
                        }
                        .into())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            ParticipantInput::Guest { name, email } => {
                if name.trim().is_empty() || email.trim().is_empty() {
                    return Err(DomainError::InvalidParticipant.into());
                }

                let participant_id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO bill_participants (bill_id, guest_name, guest_email, amount_owed)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .bind(bill_id)
                .bind(name.trim())
                // Guest emails are matched case-insensitively at session time.
                .bind(email.trim().to_lowercase())
                .bind(amount_owed)
                .fetch_one(&self.pool)
                .await?;

                Ok(participant_id)
            }
        }
    }

    /// Resolve the owning bill of a participant, for permission checks.
    /// Returns `(bill_id, created_by)` of the active bill.
    pub async fn participant_bill(
        &self,
        participant_id: i64,
    ) -> Result<Option<(i64, i64)>, AppError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT b.id, b.created_by
            FROM bill_participants bp
            JOIN bills b ON bp.bill_id = b.id
            WHERE bp.id = $1 AND b.is_active = TRUE
            "#,
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Update a participant's owed amount.
    pub async fn update_participant_amount(
        &self,
        participant_id: i64,
        amount_owed: Decimal,
    ) -> Result<(), AppError> {
        if amount_owed < Decimal::ZERO {
            return Err(
                DomainError::InvalidAmount("Amount owed cannot be negative".to_string()).into(),
            );
        }

        let rows_affected = sqlx::query("UPDATE bill_participants SET amount_owed = $2 WHERE id = $1")
            .bind(participant_id)
            .bind(round_money(amount_owed))
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::ParticipantNotFound);
        }

        Ok(())
    }

    /// Update the share of the guest participant on a bill, matched by the
    /// guest's email.
    pub async fn update_guest_participant_amount(
        &self,
        bill_id: i64,
        guest_email: &str,
        amount_owed: Decimal,
    ) -> Result<(), AppError> {
        if amount_owed < Decimal::ZERO {
            return Err(
                DomainError::InvalidAmount("Amount owed cannot be negative".to_string()).into(),
            );
        }

        let rows_affected = sqlx::query(
            r#"
            UPDATE bill_participants SET amount_owed = $3
            WHERE bill_id = $1 AND guest_email = $2
            "#,
        )
        .bind(bill_id)
        .bind(guest_email)
        .bind(round_money(amount_owed))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::ParticipantNotFound);
        }

        Ok(())
    }

    /// Remove a participant from a bill.
    pub async fn remove_participant(&self, participant_id: i64) -> Result<(), AppError> {
        let rows_affected = sqlx::query("DELETE FROM bill_participants WHERE id = $1")
            .bind(participant_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::ParticipantNotFound);
        }

        Ok(())
    }

    /// Soft-delete a bill. Participant rows are kept.
    pub async fn deactivate_bill(&self, bill_id: i64) -> Result<(), AppError> {
        let rows_affected =
            sqlx::query("UPDATE bills SET is_active = FALSE WHERE id = $1 AND is_active = TRUE")
                .bind(bill_id)
                .execute(&self.pool)
                .await?
                .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::BillNotFound);
        }

        Ok(())
    }

    /// Participant shares across all active bills a user created, for the
    /// owed-to-user side of their net balance.
    pub async fn owned_bill_shares(&self, user_id: i64) -> Result<Vec<OwnedShare>, AppError> {
        let rows: Vec<(Option<i64>, Decimal)> = sqlx::query_as(
            r#"
            SELECT bp.user_id, bp.amount_owed
            FROM bill_participants bp
            JOIN bills b ON bp.bill_id = b.id
            WHERE b.created_by = $1 AND b.is_active = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(participant_user_id, amount_owed)| OwnedShare {
                participant_user_id,
                amount_owed,
            })
            .collect())
    }

    /// Amounts a user owes as a participant across active bills.
    pub async fn participation_amounts(&self, user_id: i64) -> Result<Vec<Decimal>, AppError> {
        let rows: Vec<(Decimal,)> = sqlx::query_as(
            r#"
            SELECT bp.amount_owed
            FROM bill_participants bp
            JOIN bills b ON bp.bill_id = b.id
            WHERE bp.user_id = $1 AND b.is_active = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(amount,)| amount).collect())
    }

    /// Active bills a user participates in, with their share, newest first.
    pub async fn participant_bills(&self, user_id: i64) -> Result<Vec<Participation>, AppError> {
        let rows: Vec<(i64, String, String, Decimal, Decimal, String, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT b.id, b.code, b.title, b.total_amount, bp.amount_owed,
                       u.first_name || ' ' || u.last_name, b.created_at
                FROM bill_participants bp
                JOIN bills b ON bp.bill_id = b.id
                JOIN users u ON b.created_by = u.id
                WHERE bp.user_id = $1 AND b.is_active = TRUE
                ORDER BY b.created_at DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(bill_id, code, title, total_amount, amount_owed, creator_name, created_at)| {
                    Participation {
                        bill_id,
                        code,
                        title,
                        total_amount,
                        amount_owed,
                        creator_name,
                        created_at,
                    }
                },
            )
            .collect())
    }

    /// Recent activity feed: bills the user created and bills they joined,
    /// merged newest-first and capped at 10 entries.
    pub async fn recent_activity(&self, user_id: i64) -> Result<Vec<ActivityItem>, AppError> {
        let rows: Vec<(String, i64, String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT 'created', b.id, b.code, b.title, b.created_at
            FROM bills b
            WHERE b.created_by = $1 AND b.is_active = TRUE
            UNION ALL
            SELECT 'participated', b.id, b.code, b.title, bp.created_at
            FROM bill_participants bp
            JOIN bills b ON bp.bill_id = b.id
            WHERE bp.user_id = $1 AND b.is_active = TRUE
            ORDER BY 5 DESC
            LIMIT 10
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(activity, bill_id, code, title, occurred_at)| ActivityItem {
                activity,
                bill_id,
                code,
                title,
                occurred_at,
            })
            .collect())
    }
}

type BillRow = (
    i64,
    String,
    String,
    Option<String>,
    Decimal,
    i64,
    String,
    DateTime<Utc>,
);

fn into_bill(row: BillRow) -> Bill {
    let (id, code, title, description, total_amount, created_by, creator_name, created_at) = row;
    Bill {
        id,
        code,
        title,
        description,
        total_amount,
        created_by,
        creator_name,
        created_at,
    }
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}
