use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A column value that does not belong to the set the schema allows.
#[derive(Debug, thiserror::Error)]
#[error("unexpected {column} value: {value}")]
pub struct InvalidColumn {
    pub column: &'static str,
    pub value: String,
}

// ─── Profile ────────────────────────────────────────────────────────────────

/// Per-user profile row, keyed by the auth service's user id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ─── Bank Account ───────────────────────────────────────────────────────────

/// Linked bank account metadata. Only the last four digits are ever stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_name: String,
    pub account_number_last4: String,
    pub account_type: String,
    pub is_verified: bool,
    pub created_at: NaiveDateTime,
}

/// Insert-ready bank account (no `id`, `is_verified` or `created_at`).
#[derive(Debug, Clone)]
pub struct NewBankAccount {
    pub user_id: Uuid,
    pub bank_name: String,
    pub account_number_last4: String,
    pub account_type: String,
}

impl NewBankAccount {
    /// Keep only the trailing four characters of a full account number.
    pub fn last4(account_number: &str) -> String {
        let digits: Vec<char> = account_number.trim().chars().collect();
        let start = digits.len().saturating_sub(4);
        digits[start..].iter().collect()
    }
}

// ─── Crypto Wallet ──────────────────────────────────────────────────────────

/// An externally held wallet address the user linked to their profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CryptoWallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_address: String,
    pub wallet_type: String,
    pub is_verified: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewCryptoWallet {
    pub user_id: Uuid,
    pub wallet_address: String,
    pub wallet_type: String,
}

// ─── Transaction ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Send,
    Receive,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Send => "send",
            Direction::Receive => "receive",
        }
    }
}

impl FromStr for Direction {
    type Err = InvalidColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send" => Ok(Direction::Send),
            "receive" => Ok(Direction::Receive),
            other => Err(InvalidColumn {
                column: "type",
                value: other.to_string(),
            }),
        }
    }
}

/// Outcome of a transfer as known when it was written (or last reconciled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Completed,
    Failed,
    TimedOut,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
            TransferStatus::TimedOut => "timed_out",
        }
    }

    /// Statuses the reconciler may still move to a terminal value.
    pub fn is_unsettled(self) -> bool {
        matches!(self, TransferStatus::Pending | TransferStatus::TimedOut)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = InvalidColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "completed" => Ok(TransferStatus::Completed),
            "failed" => Ok(TransferStatus::Failed),
            "timed_out" => Ok(TransferStatus::TimedOut),
            other => Err(InvalidColumn {
                column: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Raw `transactions` row as the database hands it back.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub amount: String,
    pub currency: String,
    pub recipient_email: Option<String>,
    pub recipient_wallet: Option<String>,
    pub status: String,
    pub signature: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A recorded transfer attempt, validated at the storage boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub direction: Direction,
    pub amount: String,
    pub currency: String,
    pub recipient_email: Option<String>,
    pub recipient_wallet: Option<String>,
    pub status: TransferStatus,
    pub signature: Option<String>,
    pub created_at: NaiveDateTime,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = InvalidColumn;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            user_id: row.user_id,
            direction: row.kind.parse()?,
            amount: row.amount,
            currency: row.currency,
            recipient_email: row.recipient_email,
            recipient_wallet: row.recipient_wallet,
            status: row.status.parse()?,
            signature: row.signature,
            created_at: row.created_at,
        })
    }
}

/// Insert-ready transaction (no `id` or `created_at`).
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub direction: Direction,
    pub amount: String,
    pub currency: String,
    pub recipient_email: Option<String>,
    pub recipient_wallet: Option<String>,
    pub status: TransferStatus,
    pub signature: Option<String>,
}

// ─── Contact Submission ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContactSubmission {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub notes: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewContactSubmission {
    pub email: String,
    pub phone: String,
    pub notes: String,
}
