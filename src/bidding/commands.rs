/// 경매/입찰 커맨드 처리
/// 1. 경매 등록
/// 2. 입찰 및 상향 입찰
// region:    --- Imports
use crate::auction::status::{evaluate_status, AuctionStatus};
use crate::bidding::model::Auction;
use crate::database::DatabaseManager;
use crate::query::handlers;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Error as SqlxError;
use sqlx::Row;
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Commands

/// 경매 등록 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateAuctionCommand {
    pub seller_id: i64,
    pub title: String,
    pub category: String,
    pub description: String,
    pub image_url: Option<String>,
    pub base_price: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// 입찰 명령 (첫 입찰과 상향 입찰 공용)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub bid_amount: i64,
}

/// 입찰 수리 결과
/// 동시 입찰에 밀린 경우 current_price가 bid_amount보다 높게 반환된다
#[derive(Debug, Serialize)]
pub struct BidAccepted {
    pub bid_amount: i64,
    pub current_price: i64,
}

/// 경매 등록
const INSERT_AUCTION: &str = r#"
    INSERT INTO auctions (title, category, description, image_url, base_price, current_price,
                          start_time, end_time, status, seller_id, created_at)
    VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $9, $10)
    RETURNING id, title, category, description, image_url, base_price, current_price,
              start_time, end_time, status, seller_id,
              highest_bidder_id, highest_bid_amount, highest_bid_time, ended_at, created_at
"#;

/// 입찰 upsert: (auction_id, bidder_id)당 한 행, 상향 입찰은 기존 행을 덮어쓴다
const UPSERT_BID: &str = r#"
    INSERT INTO bids (auction_id, bidder_id, amount, placed_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (auction_id, bidder_id)
    DO UPDATE SET amount = EXCLUDED.amount, placed_at = EXCLUDED.placed_at
"#;

/// 현재 가격 조건부 인상 (compare-and-set)
/// 저장된 가격이 더 낮을 때만 적용: 동시 입찰에서 밀린 쪽은 조용히 무시된다
const RAISE_CURRENT_PRICE: &str = r#"
    UPDATE auctions
    SET current_price = $2,
        highest_bidder_id = $3,
        highest_bid_amount = $2,
        highest_bid_time = $4
    WHERE id = $1 AND status <> 'ENDED' AND current_price < $2
    RETURNING current_price
"#;

/// 다음 입찰이 반드시 초과해야 하는 하한가
/// 동일 금액은 먼저 입찰한 쪽이 선순위이므로 동액 입찰은 수리하지 않는다
pub fn bid_floor(base_price: i64, current_price: i64, top_bid: Option<i64>) -> i64 {
    current_price.max(base_price).max(top_bid.unwrap_or(0))
}

/// 1. 경매 등록
pub async fn handle_create_auction(
    cmd: CreateAuctionCommand,
    db_manager: &DatabaseManager,
) -> Result<Auction, serde_json::Value> {
    info!("{:<12} --> 경매 등록 처리 시작: {:?}", "Command", cmd);

    if cmd.title.trim().is_empty() {
        return Err(serde_json::json!({
            "error": "상품명은 비워둘 수 없습니다.",
            "code": "INVALID_TITLE"
        }));
    }
    if cmd.base_price <= 0 {
        return Err(serde_json::json!({
            "error": "시작 가격은 0보다 커야 합니다.",
            "code": "INVALID_BASE_PRICE"
        }));
    }
    if cmd.start_time >= cmd.end_time {
        return Err(serde_json::json!({
            "error": "종료 시각은 시작 시각 이후여야 합니다.",
            "code": "INVALID_SCHEDULE"
        }));
    }

    let now = Utc::now();
    let status = evaluate_status(now, cmd.start_time, cmd.end_time);

    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(INSERT_AUCTION)
                    .bind(&cmd.title)
                    .bind(&cmd.category)
                    .bind(&cmd.description)
                    .bind(&cmd.image_url)
                    .bind(cmd.base_price)
                    .bind(cmd.start_time)
                    .bind(cmd.end_time)
                    .bind(status.as_str())
                    .bind(cmd.seller_id)
                    .bind(now)
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await
        .map_err(|e: SqlxError| serde_json::json!({"error": e.to_string()}))
}

/// 2. 입찰 및 상향 입찰
/// 저장된 status가 아닌 일정 기준 판정으로 입찰 가능 여부를 검사하고,
/// 하한가(max(시작가, 현재가, 최고 유효 입찰)) 초과분만 수리한다
pub async fn handle_place_bid(
    cmd: PlaceBidCommand,
    db_manager: &DatabaseManager,
) -> Result<BidAccepted, serde_json::Value> {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    if cmd.bid_amount <= 0 {
        return Err(serde_json::json!({
            "error": "입찰 금액은 0보다 커야 합니다.",
            "code": "INVALID_AMOUNT"
        }));
    }

    // 경매 조회
    let auction = match handlers::get_auction_row(db_manager, cmd.auction_id).await {
        Ok(auction) => auction,
        Err(SqlxError::RowNotFound) => {
            return Err(serde_json::json!({
                "error": "존재하지 않는 경매입니다.",
                "code": "AUCTION_NOT_FOUND"
            }))
        }
        Err(e) => return Err(serde_json::json!({"error": e.to_string()})),
    };

    // 경매 상태 검증: 저장된 상태가 오래됐어도 일정 기준으로 판정
    let now = Utc::now();
    match evaluate_status(now, auction.start_time, auction.end_time) {
        AuctionStatus::Upcoming => {
            return Err(serde_json::json!({
                "error": "경매가 아직 시작되지 않았습니다.",
                "code": "NOT_STARTED"
            }))
        }
        AuctionStatus::Ended => {
            return Err(serde_json::json!({
                "error": "경매가 이미 종료되었습니다.",
                "code": "ALREADY_ENDED"
            }))
        }
        AuctionStatus::Ongoing => {}
    }

    // 하한가 계산 (본인의 기존 입찰도 포함된다)
    let top_bid = handlers::get_top_bid(db_manager, cmd.auction_id)
        .await
        .map_err(|e| serde_json::json!({"error": e.to_string()}))?;
    let floor = bid_floor(
        auction.base_price,
        auction.current_price,
        top_bid.map(|bid| bid.amount),
    );

    if cmd.bid_amount <= floor {
        return Err(serde_json::json!({
            "error": "입찰 금액이 현재 하한가 이하입니다.",
            "code": "LOW_BID",
            "floor": floor,
            "bid_amount": cmd.bid_amount
        }));
    }

    // 입찰 행 upsert와 현재 가격 CAS를 한 트랜잭션으로 수행
    // 입찰 행은 입찰자별로 키가 분리되어 경합하지 않고, 경매 행만 CAS로 보호한다
    let auction_id = cmd.auction_id;
    let bidder_id = cmd.bidder_id;
    let bid_amount = cmd.bid_amount;
    let cas_result = db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query(UPSERT_BID)
                    .bind(auction_id)
                    .bind(bidder_id)
                    .bind(bid_amount)
                    .bind(now)
                    .execute(&mut **tx)
                    .await?;

                let updated = sqlx::query(RAISE_CURRENT_PRICE)
                    .bind(auction_id)
                    .bind(bid_amount)
                    .bind(bidder_id)
                    .bind(now)
                    .fetch_optional(&mut **tx)
                    .await?;

                Ok(updated.map(|row| row.get::<i64, _>("current_price")))
            })
        })
        .await
        .map_err(|e: SqlxError| serde_json::json!({"error": e.to_string()}))?;

    match cas_result {
        Some(current_price) => Ok(BidAccepted {
            bid_amount: cmd.bid_amount,
            current_price,
        }),
        None => {
            // 하한가 검사와 쓰기 사이에 더 높은 동시 입찰이 먼저 반영된 경우:
            // 입찰 행은 유효하게 남고 가격 갱신만 무시된다
            warn!(
                "{:<12} --> 동시 입찰에 의해 가격 갱신 생략: auction {} bidder {} amount {}",
                "Command", cmd.auction_id, cmd.bidder_id, cmd.bid_amount
            );
            let current_price = handlers::get_current_price(db_manager, cmd.auction_id)
                .await
                .map_err(|e| serde_json::json!({"error": e.to_string()}))?;
            Ok(BidAccepted {
                bid_amount: cmd.bid_amount,
                current_price,
            })
        }
    }
}

// endregion: --- Commands

// region:    --- Tests


// endregion: --- Tests
