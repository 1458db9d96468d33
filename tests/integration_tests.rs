use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gem_auction_service::auction::events::AuctionEvent;
use gem_auction_service::bidding::commands::{
    handle_create_auction, handle_place_bid, CreateAuctionCommand, PlaceBidCommand,
};
use gem_auction_service::bidding::model::Auction;
use gem_auction_service::database::DatabaseManager;
use gem_auction_service::message_broker::WinnerNotifier;
use gem_auction_service::query;
use gem_auction_service::scheduler::AuctionScheduler;
use std::sync::{Arc, Mutex};
use tracing::info;

/// 발행된 낙찰 이벤트를 기록만 하는 테스트용 notifier
#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<AuctionEvent>>,
}

#[async_trait]
impl WinnerNotifier for RecordingNotifier {
    async fn notify_winner(&self, event: &AuctionEvent) -> Result<(), String> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// 데이터베이스 매니저 설정
async fn setup() -> Arc<DatabaseManager> {
    let db_manager = Arc::new(DatabaseManager::new().await);
    db_manager
        .ensure_schema()
        .await
        .expect("스키마 준비 실패");
    db_manager
}

/// 테스트용 경매 생성 (기본: 진행 중 구간, 시작가 10000)
async fn create_test_auction(
    db_manager: &DatabaseManager,
    title: String,
    base_price: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Auction {
    handle_create_auction(
        CreateAuctionCommand {
            seller_id: 900,
            title,
            category: "sapphire".to_string(),
            description: "테스트용 보석 경매입니다.".to_string(),
            image_url: None,
            base_price,
            start_time,
            end_time,
        },
        db_manager,
    )
    .await
    .expect("테스트 경매 생성 실패")
}

/// 테스트용 경매 일정 강제 변경 (마감/승격 패스 검증용)
async fn rewind_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) {
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query("UPDATE auctions SET start_time = $1, end_time = $2 WHERE id = $3")
                    .bind(start_time)
                    .bind(end_time)
                    .bind(auction_id)
                    .execute(&mut **tx)
                    .await
            })
        })
        .await
        .unwrap();
}

/// 동액 입찰 검증용 직접 삽입 (커맨드 경로는 동액을 수리하지 않는다)
async fn insert_bid_directly(
    db_manager: &DatabaseManager,
    auction_id: i64,
    bidder_id: i64,
    amount: i64,
    placed_at: DateTime<Utc>,
) {
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query(
                    "INSERT INTO bids (auction_id, bidder_id, amount, placed_at) VALUES ($1, $2, $3, $4)",
                )
                .bind(auction_id)
                .bind(bidder_id)
                .bind(amount)
                .bind(placed_at)
                .execute(&mut **tx)
                .await
            })
        })
        .await
        .unwrap();
}

/// 입찰 행 수 조회
async fn count_bids(db_manager: &DatabaseManager, auction_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bids WHERE auction_id = $1")
        .bind(auction_id)
        .fetch_one(db_manager.pool())
        .await
        .unwrap()
}

/// 경매 등록 검증 테스트
#[tokio::test]
async fn test_create_auction_validation() {
    let db_manager = setup().await;
    let now = Utc::now();

    // 일정 역전
    let err = handle_create_auction(
        CreateAuctionCommand {
            seller_id: 900,
            title: "일정 역전 경매".to_string(),
            category: "ruby".to_string(),
            description: "생성되면 안 되는 경매입니다.".to_string(),
            image_url: None,
            base_price: 10000,
            start_time: now + Duration::hours(2),
            end_time: now + Duration::hours(1),
        },
        &db_manager,
    )
    .await
    .unwrap_err();
    assert_eq!(err["code"], "INVALID_SCHEDULE");

    // 시작가 0
    let err = handle_create_auction(
        CreateAuctionCommand {
            seller_id: 900,
            title: "시작가 0 경매".to_string(),
            category: "ruby".to_string(),
            description: "생성되면 안 되는 경매입니다.".to_string(),
            image_url: None,
            base_price: 0,
            start_time: now,
            end_time: now + Duration::hours(1),
        },
        &db_manager,
    )
    .await
    .unwrap_err();
    assert_eq!(err["code"], "INVALID_BASE_PRICE");
}

/// 등록 시점 상태는 일정 판정을 따른다
#[tokio::test]
async fn test_create_auction_initial_status() {
    let db_manager = setup().await;
    let now = Utc::now();

    let ongoing = create_test_auction(
        &db_manager,
        "진행 중 등록 테스트".to_string(),
        10000,
        now - Duration::minutes(1),
        now + Duration::hours(2),
    )
    .await;
    assert_eq!(ongoing.status, "ONGOING");
    assert_eq!(ongoing.current_price, ongoing.base_price);

    let upcoming = create_test_auction(
        &db_manager,
        "예정 등록 테스트".to_string(),
        10000,
        now + Duration::hours(1),
        now + Duration::hours(2),
    )
    .await;
    assert_eq!(upcoming.status, "UPCOMING");
}

/// 입찰 테스트
#[tokio::test]
async fn test_place_bid() {
    let db_manager = setup().await;
    let now = Utc::now();
    let auction = create_test_auction(
        &db_manager,
        "입찰 테스트 경매".to_string(),
        10000,
        now - Duration::minutes(1),
        now + Duration::hours(2),
    )
    .await;

    let accepted = handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 1,
            bid_amount: 11000,
        },
        &db_manager,
    )
    .await
    .unwrap();
    assert_eq!(accepted.bid_amount, 11000);
    assert_eq!(accepted.current_price, 11000);

    let updated = query::handlers::get_auction(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(updated.current_price, 11000);
    assert_eq!(updated.highest_bidder_id, Some(1));
    assert_eq!(updated.highest_bid_amount, Some(11000));
}

/// 하한가 이하 입찰 거절 테스트
#[tokio::test]
async fn test_reject_low_bid() {
    let db_manager = setup().await;
    let now = Utc::now();
    let auction = create_test_auction(
        &db_manager,
        "하한가 거절 테스트 경매".to_string(),
        10000,
        now - Duration::minutes(1),
        now + Duration::hours(2),
    )
    .await;

    // 시작가와 동액은 수리하지 않는다
    let err = handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 1,
            bid_amount: 10000,
        },
        &db_manager,
    )
    .await
    .unwrap_err();
    assert_eq!(err["code"], "LOW_BID");
    assert_eq!(err["floor"], 10000);

    handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 1,
            bid_amount: 15000,
        },
        &db_manager,
    )
    .await
    .unwrap();

    // 현재가와 동액도 수리하지 않는다
    let err = handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 2,
            bid_amount: 15000,
        },
        &db_manager,
    )
    .await
    .unwrap_err();
    assert_eq!(err["code"], "LOW_BID");
    assert_eq!(err["floor"], 15000);
}

/// 입찰 구간 밖 거절 테스트: 저장 상태가 오래돼도 일정 판정으로 거절한다
#[tokio::test]
async fn test_reject_outside_window() {
    let db_manager = setup().await;
    let now = Utc::now();

    let upcoming = create_test_auction(
        &db_manager,
        "시작 전 입찰 테스트 경매".to_string(),
        10000,
        now + Duration::hours(1),
        now + Duration::hours(2),
    )
    .await;
    let err = handle_place_bid(
        PlaceBidCommand {
            auction_id: upcoming.id,
            bidder_id: 1,
            bid_amount: 11000,
        },
        &db_manager,
    )
    .await
    .unwrap_err();
    assert_eq!(err["code"], "NOT_STARTED");

    // 종료 시각만 과거로 돌린다: 저장 status는 ONGOING인 채로 남는다
    let stale = create_test_auction(
        &db_manager,
        "종료 후 입찰 테스트 경매".to_string(),
        10000,
        now - Duration::hours(2),
        now + Duration::hours(2),
    )
    .await;
    rewind_auction(
        &db_manager,
        stale.id,
        now - Duration::hours(2),
        now - Duration::hours(1),
    )
    .await;
    let err = handle_place_bid(
        PlaceBidCommand {
            auction_id: stale.id,
            bidder_id: 1,
            bid_amount: 11000,
        },
        &db_manager,
    )
    .await
    .unwrap_err();
    assert_eq!(err["code"], "ALREADY_ENDED");
}

/// 상향 입찰은 새 행이 아니라 기존 행을 덮어쓴다
#[tokio::test]
async fn test_raise_updates_bid_in_place() {
    let db_manager = setup().await;
    let now = Utc::now();
    let auction = create_test_auction(
        &db_manager,
        "상향 입찰 테스트 경매".to_string(),
        10000,
        now - Duration::minutes(1),
        now + Duration::hours(2),
    )
    .await;

    handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 1,
            bid_amount: 12000,
        },
        &db_manager,
    )
    .await
    .unwrap();

    // 본인의 기존 입찰(12000)도 하한가에 포함된다
    let err = handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 1,
            bid_amount: 11000,
        },
        &db_manager,
    )
    .await
    .unwrap_err();
    assert_eq!(err["code"], "LOW_BID");
    assert_eq!(err["floor"], 12000);

    handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 1,
            bid_amount: 13000,
        },
        &db_manager,
    )
    .await
    .unwrap();

    assert_eq!(count_bids(&db_manager, auction.id).await, 1);

    let my_bids = query::handlers::get_my_bids(&db_manager, 1).await.unwrap();
    let row = my_bids
        .iter()
        .find(|bid| bid.auction_id == auction.id)
        .expect("내 입찰 목록에 경매가 없음");
    assert_eq!(row.my_amount, 13000);
}

/// 동액 입찰은 선입찰 우선으로 낙찰된다
#[tokio::test]
async fn test_equal_amount_tiebreak() {
    let db_manager = setup().await;
    let now = Utc::now();
    let auction = create_test_auction(
        &db_manager,
        "동액 입찰 테스트 경매".to_string(),
        100,
        now - Duration::hours(1),
        now + Duration::hours(1),
    )
    .await;

    // A가 150 입찰
    handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 11,
            bid_amount: 150,
        },
        &db_manager,
    )
    .await
    .unwrap();

    // B의 동액 150은 하한가 초과가 아니므로 거절
    let err = handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 12,
            bid_amount: 150,
        },
        &db_manager,
    )
    .await
    .unwrap_err();
    assert_eq!(err["code"], "LOW_BID");
    assert_eq!(err["floor"], 150);

    // B가 151로 상향
    handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 12,
            bid_amount: 151,
        },
        &db_manager,
    )
    .await
    .unwrap();

    rewind_auction(
        &db_manager,
        auction.id,
        now - Duration::hours(2),
        now - Duration::minutes(1),
    )
    .await;
    let notifier = RecordingNotifier::default();
    AuctionScheduler::close_elapsed_auctions(db_manager.pool(), &notifier)
        .await
        .unwrap();

    let winner = query::handlers::get_winner(&db_manager, auction.id)
        .await
        .unwrap()
        .expect("낙찰자가 생성되지 않음");
    assert_eq!(winner.bidder_id, 12);
    assert_eq!(winner.amount, 151);
}

/// 같은 금액이 두 행에 남은 경우 먼저 입찰한 쪽이 최고 입찰로 선택된다
#[tokio::test]
async fn test_equal_rows_earliest_wins() {
    let db_manager = setup().await;
    let now = Utc::now();
    let auction = create_test_auction(
        &db_manager,
        "동액 행 선순위 테스트 경매".to_string(),
        100,
        now - Duration::hours(2),
        now + Duration::hours(1),
    )
    .await;

    insert_bid_directly(&db_manager, auction.id, 21, 300, now - Duration::minutes(30)).await;
    insert_bid_directly(&db_manager, auction.id, 22, 300, now - Duration::minutes(10)).await;

    rewind_auction(
        &db_manager,
        auction.id,
        now - Duration::hours(2),
        now - Duration::minutes(1),
    )
    .await;
    let notifier = RecordingNotifier::default();
    AuctionScheduler::close_elapsed_auctions(db_manager.pool(), &notifier)
        .await
        .unwrap();

    let winner = query::handlers::get_winner(&db_manager, auction.id)
        .await
        .unwrap()
        .expect("낙찰자가 생성되지 않음");
    assert_eq!(winner.bidder_id, 21);
    assert_eq!(winner.amount, 300);
}

/// 마감 패스 멱등성 테스트: 두 번 돌려도 낙찰자/ended_at은 한 번만 만들어진다
#[tokio::test]
async fn test_close_is_idempotent() {
    let db_manager = setup().await;
    let now = Utc::now();
    let auction = create_test_auction(
        &db_manager,
        "멱등 마감 테스트 경매".to_string(),
        10000,
        now - Duration::hours(1),
        now + Duration::hours(1),
    )
    .await;

    handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 31,
            bid_amount: 12000,
        },
        &db_manager,
    )
    .await
    .unwrap();
    handle_place_bid(
        PlaceBidCommand {
            auction_id: auction.id,
            bidder_id: 32,
            bid_amount: 13000,
        },
        &db_manager,
    )
    .await
    .unwrap();

    rewind_auction(
        &db_manager,
        auction.id,
        now - Duration::hours(2),
        now - Duration::minutes(1),
    )
    .await;

    let notifier = RecordingNotifier::default();
    AuctionScheduler::close_elapsed_auctions(db_manager.pool(), &notifier)
        .await
        .unwrap();

    let closed = query::handlers::get_auction_row(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(closed.status, "ENDED");
    let ended_at = closed.ended_at.expect("ended_at이 기록되지 않음");

    let winner = query::handlers::get_winner(&db_manager, auction.id)
        .await
        .unwrap()
        .expect("낙찰자가 생성되지 않음");
    assert_eq!(winner.bidder_id, 32);
    assert_eq!(winner.amount, 13000);
    assert_eq!(winner.purchase_status, "PENDING");
    assert_eq!(winner.purchase_deadline, ended_at + Duration::days(7));

    // 두 번째 스윕: 변화가 없어야 한다
    AuctionScheduler::close_elapsed_auctions(db_manager.pool(), &notifier)
        .await
        .unwrap();

    let after = query::handlers::get_auction_row(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(after.ended_at, Some(ended_at));
    assert_eq!(after.current_price, 13000);

    let winner_after = query::handlers::get_winner(&db_manager, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(winner_after.id, winner.id);
    assert_eq!(winner_after.created_at, winner.created_at);

    // 낙찰 이벤트는 최초 마감 때 한 번만 발행된다
    // 병렬 실행 중인 다른 테스트의 스윕이 먼저 마감했을 수 있으므로 중복 없음을 검증한다
    let events = notifier.events.lock().unwrap();
    let published = events
        .iter()
        .filter(|event| {
            matches!(event, AuctionEvent::WinnerResolved { auction_id, .. } if *auction_id == auction.id)
        })
        .count();
    assert!(published <= 1, "낙찰 이벤트 중복 발행: {}건", published);
    drop(events);

    let my_wins = query::handlers::get_my_wins(&db_manager, 32).await.unwrap();
    assert!(my_wins.iter().any(|w| w.auction_id == auction.id));
}

/// 무입찰 경매는 낙찰자 없이 종료된다
#[tokio::test]
async fn test_close_without_bids() {
    let db_manager = setup().await;
    let now = Utc::now();
    let auction = create_test_auction(
        &db_manager,
        "무입찰 마감 테스트 경매".to_string(),
        10000,
        now - Duration::hours(2),
        now + Duration::hours(1),
    )
    .await;
    rewind_auction(
        &db_manager,
        auction.id,
        now - Duration::hours(2),
        now - Duration::minutes(1),
    )
    .await;

    let notifier = RecordingNotifier::default();
    AuctionScheduler::close_elapsed_auctions(db_manager.pool(), &notifier)
        .await
        .unwrap();

    let closed = query::handlers::get_auction_row(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(closed.status, "ENDED");
    assert!(closed.ended_at.is_some());
    assert_eq!(closed.current_price, closed.base_price);

    let winner = query::handlers::get_winner(&db_manager, auction.id)
        .await
        .unwrap();
    assert!(winner.is_none());

    let events = notifier.events.lock().unwrap();
    assert!(!events.iter().any(|event| {
        matches!(event, AuctionEvent::WinnerResolved { auction_id, .. } if *auction_id == auction.id)
    }));
}

/// 승격 패스와 읽기 경로 상태 보정 테스트
#[tokio::test]
async fn test_promotion_and_read_heal() {
    let db_manager = setup().await;
    let now = Utc::now();

    // 시작 시각만 과거로 돌린다: 저장 status는 UPCOMING인 채로 남는다
    let auction = create_test_auction(
        &db_manager,
        "승격 테스트 경매".to_string(),
        10000,
        now + Duration::hours(1),
        now + Duration::hours(2),
    )
    .await;
    rewind_auction(
        &db_manager,
        auction.id,
        now - Duration::minutes(5),
        now + Duration::hours(2),
    )
    .await;

    // 읽기 경로는 판정값을 반환하고 저장 상태도 승격시킨다
    let read = query::handlers::get_auction(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(read.status, "ONGOING");
    let stored = query::handlers::get_auction_row(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(stored.status, "ONGOING");

    // 승격 패스 재실행은 no-op
    AuctionScheduler::<RecordingNotifier>::promote_due_auctions(db_manager.pool())
        .await
        .unwrap();
    let after = query::handlers::get_auction_row(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(after.status, "ONGOING");
}

/// 경매 목록 필터 테스트
#[tokio::test]
async fn test_list_auctions_filters() {
    let db_manager = setup().await;
    let now = Utc::now();
    let tag = now.timestamp_nanos_opt().unwrap_or_default();
    let category = format!("opal-{}", tag);

    let ongoing = handle_create_auction(
        CreateAuctionCommand {
            seller_id: 900,
            title: format!("목록 진행 {}", tag),
            category: category.clone(),
            description: "목록 필터 테스트용 진행 중 경매입니다.".to_string(),
            image_url: None,
            base_price: 10000,
            start_time: now - Duration::minutes(1),
            end_time: now + Duration::hours(2),
        },
        &db_manager,
    )
    .await
    .unwrap();

    let upcoming = handle_create_auction(
        CreateAuctionCommand {
            seller_id: 900,
            title: format!("목록 예정 {}", tag),
            category: category.clone(),
            description: "목록 필터 테스트용 예정 경매입니다.".to_string(),
            image_url: None,
            base_price: 10000,
            start_time: now + Duration::hours(1),
            end_time: now + Duration::hours(2),
        },
        &db_manager,
    )
    .await
    .unwrap();

    // 카테고리 + 판정 상태 필터
    let filter = query::handlers::AuctionFilter {
        status: Some("ongoing".to_string()),
        category: Some(category.clone()),
        ..Default::default()
    };
    let listed = query::handlers::list_auctions(&db_manager, &filter)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, ongoing.id);
    assert_eq!(listed[0].status, "ONGOING");

    // 검색어 필터
    let filter = query::handlers::AuctionFilter {
        q: Some(format!("목록 예정 {}", tag)),
        ..Default::default()
    };
    let listed = query::handlers::list_auctions(&db_manager, &filter)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, upcoming.id);

    // 페이지네이션
    let filter = query::handlers::AuctionFilter {
        category: Some(category.clone()),
        page: Some(1),
        page_size: Some(1),
        ..Default::default()
    };
    let listed = query::handlers::list_auctions(&db_manager, &filter)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

/// 동시성 입찰 테스트: 경합에서 밀린 가격 갱신이 저장된 최대가를 되돌리지 않는다
#[tokio::test]
async fn test_concurrent_bidding() {
    let db_manager = setup().await;
    let now = Utc::now();
    let auction = create_test_auction(
        &db_manager,
        "동시성 입찰 테스트 경매".to_string(),
        10000,
        now - Duration::minutes(1),
        now + Duration::hours(2),
    )
    .await;

    // 50명의 입찰자가 서로 다른 금액으로 동시에 입찰
    let mut handles = vec![];
    for i in 1..=50i64 {
        let db_manager = Arc::clone(&db_manager);
        let auction_id = auction.id;
        let handle = tokio::spawn(async move {
            handle_place_bid(
                PlaceBidCommand {
                    auction_id,
                    bidder_id: i,
                    bid_amount: 10000 + i * 1000,
                },
                &db_manager,
            )
            .await
        });
        handles.push(handle);
    }

    let mut successful_bids = 0;
    let mut failed_bids = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successful_bids += 1,
            Err(e) => {
                // 경합 순서상 이미 더 높은 가격이 반영된 뒤 도착한 입찰만 거절된다
                assert_eq!(e["code"], "LOW_BID", "예상 밖 거절: {:?}", e);
                failed_bids += 1;
            }
        }
    }
    info!(
        "성공한 입찰 수: {}, 실패한 입찰 수: {}",
        successful_bids, failed_bids
    );
    assert_eq!(successful_bids + failed_bids, 50);

    // 최대 입찰(60000)은 어떤 순서로 실행돼도 살아남는다
    let updated = query::handlers::get_auction_row(&db_manager, auction.id)
        .await
        .unwrap();
    assert_eq!(updated.current_price, 60000);
    assert_eq!(updated.highest_bidder_id, Some(50));

    let top = query::handlers::get_top_bid(&db_manager, auction.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(top.bidder_id, 50);
    assert_eq!(top.amount, 60000);

    // 마감 후 낙찰자도 최대 입찰자다
    rewind_auction(
        &db_manager,
        auction.id,
        now - Duration::hours(2),
        now - Duration::minutes(1),
    )
    .await;
    let notifier = RecordingNotifier::default();
    AuctionScheduler::close_elapsed_auctions(db_manager.pool(), &notifier)
        .await
        .unwrap();
    let winner = query::handlers::get_winner(&db_manager, auction.id)
        .await
        .unwrap()
        .expect("낙찰자가 생성되지 않음");
    assert_eq!(winner.bidder_id, 50);
    assert_eq!(winner.amount, 60000);
}
