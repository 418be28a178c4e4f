use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::*;

fn decode_err(e: InvalidColumn) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

// ─── Profile Queries ────────────────────────────────────────────────────────

pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Return the user's profile, creating an empty one on first access.
pub async fn ensure_profile(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
) -> Result<Profile, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO profiles (id, email, full_name)
        VALUES ($1, $2, '')
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(email)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Update the editable profile fields. Returns `None` if no profile exists.
pub async fn update_profile_name(
    pool: &PgPool,
    user_id: Uuid,
    full_name: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(
        r#"
        UPDATE profiles SET full_name = $1, updated_at = (NOW() AT TIME ZONE 'UTC')
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(full_name)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

// ─── Bank Account Queries ───────────────────────────────────────────────────

pub async fn insert_bank_account(
    pool: &PgPool,
    account: &NewBankAccount,
) -> Result<BankAccount, sqlx::Error> {
    sqlx::query_as::<_, BankAccount>(
        r#"
        INSERT INTO bank_accounts
            (user_id, bank_name, account_number_last4, account_type, is_verified)
        VALUES ($1, $2, $3, $4, FALSE)
        RETURNING *
        "#,
    )
    .bind(account.user_id)
    .bind(&account.bank_name)
    .bind(&account.account_number_last4)
    .bind(&account.account_type)
    .fetch_one(pool)
    .await
}

pub async fn get_bank_accounts(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<BankAccount>, sqlx::Error> {
    sqlx::query_as::<_, BankAccount>(
        "SELECT * FROM bank_accounts WHERE user_id = $1 ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Delete a bank account owned by `user_id`. Returns whether a row was removed.
pub async fn delete_bank_account(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM bank_accounts WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ─── Crypto Wallet Queries ──────────────────────────────────────────────────

pub async fn insert_wallet(
    pool: &PgPool,
    wallet: &NewCryptoWallet,
) -> Result<CryptoWallet, sqlx::Error> {
    sqlx::query_as::<_, CryptoWallet>(
        r#"
        INSERT INTO crypto_wallets (user_id, wallet_address, wallet_type, is_verified)
        VALUES ($1, $2, $3, FALSE)
        RETURNING *
        "#,
    )
    .bind(wallet.user_id)
    .bind(&wallet.wallet_address)
    .bind(&wallet.wallet_type)
    .fetch_one(pool)
    .await
}

pub async fn get_wallets(pool: &PgPool, user_id: Uuid) -> Result<Vec<CryptoWallet>, sqlx::Error> {
    sqlx::query_as::<_, CryptoWallet>(
        "SELECT * FROM crypto_wallets WHERE user_id = $1 ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn delete_wallet(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM crypto_wallets WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ─── Transaction Queries ────────────────────────────────────────────────────

/// Insert one transfer attempt record.
pub async fn insert_transaction<'e, E>(
    executor: E,
    tx: &NewTransaction,
) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO transactions
            (user_id, type, amount, currency, recipient_email, recipient_wallet, status, signature)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(tx.user_id)
    .bind(tx.direction.as_str())
    .bind(&tx.amount)
    .bind(&tx.currency)
    .bind(&tx.recipient_email)
    .bind(&tx.recipient_wallet)
    .bind(tx.status.as_str())
    .bind(&tx.signature)
    .fetch_one(executor)
    .await?;
    Ok(row.0)
}

/// A user's transfer history, newest first, optionally filtered by direction.
pub async fn get_transactions(
    pool: &PgPool,
    user_id: Uuid,
    direction: Option<Direction>,
    limit: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT * FROM transactions WHERE user_id = ");
    qb.push_bind(user_id);
    if let Some(direction) = direction {
        qb.push(" AND type = ").push_bind(direction.as_str());
    }
    qb.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);

    let rows: Vec<TransactionRow> = qb.build_query_as().fetch_all(pool).await?;
    rows.into_iter()
        .map(|row| Transaction::try_from(row).map_err(decode_err))
        .collect()
}

/// Records whose on-ledger outcome is still unknown and can be looked up by
/// signature, oldest first.
pub async fn get_unsettled_transactions(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows: Vec<TransactionRow> = sqlx::query_as(
        r#"
        SELECT * FROM transactions
        WHERE status IN ('pending', 'timed_out') AND signature IS NOT NULL
        ORDER BY created_at
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .map(|row| Transaction::try_from(row).map_err(decode_err))
        .collect()
}

/// Move an unsettled record to a new status. Settled records are left alone.
pub async fn update_transaction_status<'e, E>(
    executor: E,
    id: Uuid,
    status: TransferStatus,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE transactions SET status = $1
        WHERE id = $2 AND status IN ('pending', 'timed_out')
        "#,
    )
    .bind(status.as_str())
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

// ─── Contact Queries ────────────────────────────────────────────────────────

pub async fn insert_contact_submission(
    pool: &PgPool,
    submission: &NewContactSubmission,
) -> Result<ContactSubmission, sqlx::Error> {
    sqlx::query_as::<_, ContactSubmission>(
        r#"
        INSERT INTO contact_submissions (email, phone, notes)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&submission.email)
    .bind(&submission.phone)
    .bind(&submission.notes)
    .fetch_one(pool)
    .await
}
