// region:    --- Imports
use crate::database::DatabaseManager;
use crate::message_broker::{KafkaManager, WINNER_TOPIC};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod auction;
mod bidding;
mod database;
mod handlers;
mod message_broker;
mod query;
mod scheduler;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::new().await);

    // 데이터베이스 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // Kafka 매니저 생성 및 낙찰 토픽 준비
    let kafka_manager = Arc::new(KafkaManager::new());
    if let Err(e) = kafka_manager.create_topic(WINNER_TOPIC, 1, 1).await {
        error!("{:<12} --> Kafka 토픽 준비 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> Kafka 토픽 준비 성공", "Main");

    // 경매 승격/마감 스케줄러 시작
    let scheduler =
        scheduler::AuctionScheduler::new(db_manager.get_pool(), kafka_manager.get_producer());
    scheduler.start().await;

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let routes_all = Router::new()
        .route(
            "/auctions",
            post(handlers::handle_create_auction).get(handlers::handle_list_auctions),
        )
        .route("/bid", post(handlers::handle_bid))
        .route("/auctions/:id", get(handlers::handle_get_auction))
        .route("/auctions/:id/winner", get(handlers::handle_get_winner))
        .route(
            "/auctions/:id/winner/detail",
            get(handlers::handle_get_winner_detail),
        )
        .route("/bidders/:id/bids", get(handlers::handle_get_my_bids))
        .route("/bidders/:id/wins", get(handlers::handle_get_my_wins))
        .layer(cors)
        .with_state(db_manager);

    // 리스너 생성(로컬 호스트의 3000번 포트를 사용)
    let listener = TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr().unwrap()
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
