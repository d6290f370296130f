//! Escrow Hold and Ledger Account Entities
//!
//! An EscrowHold earmarks captured funds for a seller until delivery is
//! confirmed and no dispute blocks release. Transitions are monotone:
//! Held is the only live status, and Released, Frozen and Refunded are
//! terminal. Ledger accounts carry the balances credited by release and
//! refund transactions.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use mf_common::TsidGenerator;
use serde::{Deserialize, Serialize};

/// Escrow hold status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldStatus {
    /// Funds in trust, awaiting release conditions
    Held,
    /// Funds credited to the seller; terminal
    Released,
    /// Locked by an administrator pending investigation; terminal
    Frozen,
    /// Funds returned to the buyer; terminal
    Refunded,
}

impl HoldStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Held)
    }

    /// Legal transitions of the hold state machine.
    pub fn can_transition_to(&self, next: HoldStatus) -> bool {
        matches!(
            (self, next),
            (HoldStatus::Held, HoldStatus::Released)
                | (HoldStatus::Held, HoldStatus::Frozen)
                | (HoldStatus::Held, HoldStatus::Refunded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Held => "HELD",
            HoldStatus::Released => "RELEASED",
            HoldStatus::Frozen => "FROZEN",
            HoldStatus::Refunded => "REFUNDED",
        }
    }
}

/// Escrow hold entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowHold {
    /// TSID as Crockford Base32 string
    #[serde(rename = "_id")]
    pub id: String,

    pub order_id: String,

    /// Account the funds came from (refund target)
    pub buyer_account_id: String,

    /// Account the funds are earmarked for (release target)
    pub seller_account_id: String,

    /// Amount in minor currency units
    pub amount_minor: i64,

    pub status: HoldStatus,

    /// The hold matures once this passes; release also needs delivery
    /// confirmation and a clean dispute slate
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub hold_expires_at: DateTime<Utc>,

    /// Reason recorded when an administrator freezes the hold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frozen_reason: Option<String>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,

    /// When the hold reached a terminal status
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl EscrowHold {
    /// Create a hold for captured order funds.
    pub fn new(
        order_id: impl Into<String>,
        buyer_account_id: impl Into<String>,
        seller_account_id: impl Into<String>,
        amount_minor: i64,
        hold_expires_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            order_id: order_id.into(),
            buyer_account_id: buyer_account_id.into(),
            seller_account_id: seller_account_id.into(),
            amount_minor,
            status: HoldStatus::Held,
            hold_expires_at,
            frozen_reason: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    /// The hold period has elapsed.
    pub fn matured(&self, now: DateTime<Utc>) -> bool {
        self.hold_expires_at <= now
    }

    /// Flat key-value snapshot for realtime broadcast payloads.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "entity": "escrow_hold",
            "id": self.id,
            "orderId": self.order_id,
            "sellerAccountId": self.seller_account_id,
            "amountMinor": self.amount_minor,
            "status": self.status.as_str(),
        })
    }
}

/// Ledger account balance row
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAccount {
    /// Participant account id
    #[serde(rename = "_id")]
    pub id: String,

    /// Available balance in minor currency units
    pub available_minor: i64,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}
