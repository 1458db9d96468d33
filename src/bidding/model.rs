use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 경매 모델
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Auction {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub description: String,
    pub image_url: Option<String>,
    pub base_price: i64,
    pub current_price: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub seller_id: i64,
    // 최고 입찰 스냅샷 (입찰이 없으면 NULL)
    pub highest_bidder_id: Option<i64>,
    pub highest_bid_amount: Option<i64>,
    pub highest_bid_time: Option<DateTime<Utc>>,
    // 종료 처리 시각 (ENDED 상태에서만 설정, 한 번만 기록)
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// 입찰 모델: (auction_id, bidder_id) 쌍당 한 행만 유지하고 상향 입찰 시 덮어쓴다
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub placed_at: DateTime<Utc>,
}

// 낙찰자 모델: 경매당 최대 한 행 (auction_id UNIQUE)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Winner {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
    pub purchase_deadline: DateTime<Utc>,
    pub purchase_status: String,
    pub payment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// 내 입찰 목록 조회용 (입찰 행 + 해당 경매 요약)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct BidSummary {
    pub auction_id: i64,
    pub title: String,
    pub category: String,
    pub status: String,
    pub current_price: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub my_amount: i64,
    pub placed_at: DateTime<Utc>,
}

// 낙찰자 공개 조회용 (구매 기한/결제 정보는 제외)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct WinnerPublic {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: i64,
}
