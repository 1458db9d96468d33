// region:    --- Imports
use super::queries;
use crate::auction::status::{evaluate_status, AuctionStatus};
use crate::bidding::model::{Auction, Bid, BidSummary, Winner, WinnerPublic};
use crate::database::DatabaseManager;
use chrono::Utc;
use serde::Deserialize;
use sqlx::Error as SqlxError;
use sqlx::Row;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Filter

/// 경매 목록 조회 필터
#[derive(Debug, Default, Deserialize)]
pub struct AuctionFilter {
    pub status: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

// 페이지네이션 기본값
const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

// endregion: --- Filter

// region:    --- Query Handlers

/// 경매 조회 (저장된 status 그대로, 내부용)
pub async fn get_auction_row(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Auction, SqlxError> {
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(queries::GET_AUCTION)
                    .bind(auction_id)
                    .fetch_one(&mut **tx)
                    .await
            })
        })
        .await
}

/// 경매 조회 (판정 상태로 보정해서 반환)
/// 저장된 상태가 일정과 어긋나면 반환값은 항상 판정값을 따르고,
/// 저장소 보정은 UPCOMING -> ONGOING 승격에 한해 best-effort로 수행한다
pub async fn get_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Auction, SqlxError> {
    info!("{:<12} --> 경매 조회 id: {}", "Query", auction_id);
    let mut auction = get_auction_row(db_manager, auction_id).await?;

    let computed = evaluate_status(Utc::now(), auction.start_time, auction.end_time);
    if auction.status != computed.as_str() {
        if computed == AuctionStatus::Ongoing && auction.status == "UPCOMING" {
            if let Err(e) = sqlx::query(queries::HEAL_PROMOTE_STATUS)
                .bind(auction_id)
                .execute(db_manager.pool())
                .await
            {
                warn!("{:<12} --> 상태 보정 실패 id {}: {:?}", "Query", auction_id, e);
            }
        }
        auction.status = computed.as_str().to_string();
    }

    Ok(auction)
}

/// 경매 목록 조회
pub async fn list_auctions(
    db_manager: &DatabaseManager,
    filter: &AuctionFilter,
) -> Result<Vec<Auction>, SqlxError> {
    info!("{:<12} --> 경매 목록 조회: {:?}", "Query", filter);
    let now = Utc::now();

    let status = filter.status.as_ref().map(|s| s.to_uppercase());
    let category = filter.category.clone();
    let q = filter.q.clone();
    let page_size = filter
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = (filter.page.unwrap_or(1).max(1) - 1) * page_size;

    let mut auctions = db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Auction>(queries::LIST_AUCTIONS)
                    .bind(category)
                    .bind(q)
                    .bind(status)
                    .bind(now)
                    .bind(page_size)
                    .bind(offset)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await?;

    // 반환 상태는 항상 판정값
    for auction in auctions.iter_mut() {
        auction.status = evaluate_status(now, auction.start_time, auction.end_time)
            .as_str()
            .to_string();
    }

    Ok(auctions)
}

/// 최고 유효 입찰 조회
pub async fn get_top_bid(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<Bid>, SqlxError> {
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Bid>(queries::GET_TOP_BID)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 현재 가격 조회
pub async fn get_current_price(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<i64, SqlxError> {
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let result = sqlx::query(queries::GET_CURRENT_PRICE)
                    .bind(auction_id)
                    .fetch_one(&mut **tx)
                    .await?;

                Ok(result.get("current_price"))
            })
        })
        .await
}

/// 내 입찰 목록 조회 (경매당 한 행)
pub async fn get_my_bids(
    db_manager: &DatabaseManager,
    bidder_id: i64,
) -> Result<Vec<BidSummary>, SqlxError> {
    info!("{:<12} --> 내 입찰 목록 조회 bidder: {}", "Query", bidder_id);
    let now = Utc::now();
    let mut bids = db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, BidSummary>(queries::GET_MY_BIDS)
                    .bind(bidder_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await?;

    for bid in bids.iter_mut() {
        bid.status = evaluate_status(now, bid.start_time, bid.end_time)
            .as_str()
            .to_string();
    }

    Ok(bids)
}

/// 내 낙찰 목록 조회
pub async fn get_my_wins(
    db_manager: &DatabaseManager,
    bidder_id: i64,
) -> Result<Vec<Winner>, SqlxError> {
    info!("{:<12} --> 내 낙찰 목록 조회 bidder: {}", "Query", bidder_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Winner>(queries::GET_MY_WINS)
                    .bind(bidder_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// 낙찰자 조회 (전체 정보)
pub async fn get_winner(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<Winner>, SqlxError> {
    info!("{:<12} --> 낙찰자 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Winner>(queries::GET_WINNER)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// 낙찰자 조회 (공개용 최소 정보)
pub async fn get_winner_public(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<WinnerPublic>, SqlxError> {
    info!("{:<12} --> 낙찰자 공개 조회 id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, WinnerPublic>(queries::GET_WINNER_PUBLIC)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

// endregion: --- Query Handlers
