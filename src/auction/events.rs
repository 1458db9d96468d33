use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum AuctionEvent {
    // 낙찰 확정 이벤트 (결제 서비스가 소비)
    WinnerResolved {
        auction_id: i64,
        bidder_id: i64,
        amount: i64,
        purchase_deadline: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
}
