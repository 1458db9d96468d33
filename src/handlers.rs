// region:    --- Imports
use crate::bidding::commands::{
    handle_create_auction as command_create_auction, handle_place_bid as command_place_bid,
    CreateAuctionCommand, PlaceBidCommand,
};
use crate::database::DatabaseManager;
use crate::query;
use crate::query::handlers::AuctionFilter;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Command Handlers

/// 경매 등록 요청 처리
pub async fn handle_create_auction(
    State(db_manager): State<Arc<DatabaseManager>>,
    Json(cmd): Json<CreateAuctionCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 등록 요청 처리 시작: {:?}", "Command", cmd);

    match command_create_auction(cmd, &db_manager).await {
        Ok(auction) => (StatusCode::CREATED, Json(auction)).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(e)).into_response(),
    }
}

/// 입찰 요청 처리
pub async fn handle_bid(
    State(db_manager): State<Arc<DatabaseManager>>,
    Json(cmd): Json<PlaceBidCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);

    match command_place_bid(cmd, &db_manager).await {
        Ok(accepted) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "입찰이 성공적으로 처리되었습니다.",
                "current_price": accepted.current_price,
                "bid_amount": accepted.bid_amount
            })),
        )
            .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(e)).into_response(),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 경매 조회 (판정 상태로 보정)
pub async fn handle_get_auction(
    State(db_manager): State<Arc<DatabaseManager>>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 조회 id: {}", "HandlerQuery", auction_id);
    match query::handlers::get_auction(&db_manager, auction_id).await {
        Ok(auction) => Json(auction).into_response(),
        Err(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "존재하지 않는 경매입니다.",
                "code": "AUCTION_NOT_FOUND"
            })),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 경매 목록 조회
pub async fn handle_list_auctions(
    State(db_manager): State<Arc<DatabaseManager>>,
    Query(filter): Query<AuctionFilter>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 목록 조회: {:?}", "HandlerQuery", filter);
    match query::handlers::list_auctions(&db_manager, &filter).await {
        Ok(auctions) => Json(auctions).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 내 입찰 목록 조회
pub async fn handle_get_my_bids(
    State(db_manager): State<Arc<DatabaseManager>>,
    Path(bidder_id): Path<i64>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 내 입찰 목록 조회 bidder: {}",
        "HandlerQuery", bidder_id
    );
    match query::handlers::get_my_bids(&db_manager, bidder_id).await {
        Ok(bids) => Json(bids).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 내 낙찰 목록 조회
pub async fn handle_get_my_wins(
    State(db_manager): State<Arc<DatabaseManager>>,
    Path(bidder_id): Path<i64>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 내 낙찰 목록 조회 bidder: {}",
        "HandlerQuery", bidder_id
    );
    match query::handlers::get_my_wins(&db_manager, bidder_id).await {
        Ok(wins) => Json(wins).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 낙찰자 조회 (공개용 최소 정보)
pub async fn handle_get_winner(
    State(db_manager): State<Arc<DatabaseManager>>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 낙찰자 조회 id: {}", "HandlerQuery", auction_id);
    match query::handlers::get_winner_public(&db_manager, auction_id).await {
        Ok(Some(winner)) => Json(winner).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "낙찰자가 없습니다.",
                "code": "NO_WINNER"
            })),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// 낙찰자 상세 조회 쿼리 파라미터
/// 요청자 신원 확인은 별도 인증 서비스 담당, 여기서는 관계만 검사한다
#[derive(Debug, Deserialize)]
pub struct WinnerDetailParams {
    pub requester_id: i64,
}

/// 낙찰자 조회 (상세, 낙찰자 본인 또는 판매자 전용)
pub async fn handle_get_winner_detail(
    State(db_manager): State<Arc<DatabaseManager>>,
    Path(auction_id): Path<i64>,
    Query(params): Query<WinnerDetailParams>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 낙찰자 상세 조회 id: {} requester: {}",
        "HandlerQuery", auction_id, params.requester_id
    );

    let auction = match query::handlers::get_auction_row(&db_manager, auction_id).await {
        Ok(auction) => auction,
        Err(sqlx::Error::RowNotFound) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": "존재하지 않는 경매입니다.",
                    "code": "AUCTION_NOT_FOUND"
                })),
            )
                .into_response()
        }
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let winner = match query::handlers::get_winner(&db_manager, auction_id).await {
        Ok(Some(winner)) => winner,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": "낙찰자가 없습니다.",
                    "code": "NO_WINNER"
                })),
            )
                .into_response()
        }
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    if params.requester_id != winner.bidder_id && params.requester_id != auction.seller_id {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": "낙찰자 본인 또는 판매자만 조회할 수 있습니다.",
                "code": "FORBIDDEN"
            })),
        )
            .into_response();
    }

    Json(winner).into_response()
}

// endregion: --- Query Handlers
