/// 경매 상태 스케줄러
/// 주기마다 두 단계의 멱등 패스를 수행한다
/// 1. 승격: 시작 시각이 지난 UPCOMING 경매를 ONGOING으로
/// 2. 마감: 종료 시각이 지난 경매를 ENDED로 전환하고 낙찰자를 확정
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::bidding::model::{Auction, Bid, Winner};
use crate::message_broker::WinnerNotifier;
use crate::query::queries;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

// endregion: --- Imports

// region:    --- Constants

/// 스케줄러 실행 주기
const SWEEP_INTERVAL_SECS: u64 = 60;

/// 낙찰 후 구매 완료 기한
const PURCHASE_DEADLINE_DAYS: i64 = 7;

/// UPCOMING -> ONGOING 승격
const PROMOTE_DUE_AUCTIONS: &str = r#"
    UPDATE auctions SET status = 'ONGOING'
    WHERE status = 'UPCOMING' AND start_time <= $1 AND end_time > $1
"#;

/// 마감 대상 조회 (아직 ENDED로 전환되지 않은 만료 경매)
const GET_CLOSABLE_AUCTIONS: &str = r#"
    SELECT id, title, category, description, image_url, base_price, current_price,
           start_time, end_time, status, seller_id,
           highest_bidder_id, highest_bid_amount, highest_bid_time, ended_at, created_at
    FROM auctions
    WHERE status <> 'ENDED' AND end_time <= $1
"#;

/// 낙찰자 생성: auction_id UNIQUE가 멱등성 키, 재실행 시 no-op
const INSERT_WINNER: &str = r#"
    INSERT INTO winners (auction_id, bidder_id, amount, purchase_deadline, purchase_status, created_at)
    VALUES ($1, $2, $3, $4, 'PENDING', $5)
    ON CONFLICT (auction_id) DO NOTHING
    RETURNING id, auction_id, bidder_id, amount, purchase_deadline, purchase_status, payment_id, created_at
"#;

/// 경매 종료: ended_at은 최초 전환 때 한 번만 기록된다
const CLOSE_AUCTION: &str = r#"
    UPDATE auctions
    SET status = 'ENDED',
        ended_at = $2,
        current_price = GREATEST(current_price, $3),
        highest_bidder_id = COALESCE($4, highest_bidder_id),
        highest_bid_amount = COALESCE($3, highest_bid_amount),
        highest_bid_time = COALESCE($5, highest_bid_time)
    WHERE id = $1 AND status <> 'ENDED'
"#;

// endregion: --- Constants

// region:    --- Auction Scheduler

/// 경매 상태 스케줄러
pub struct AuctionScheduler<N: WinnerNotifier> {
    pool: Arc<PgPool>,
    notifier: Arc<N>,
}

impl<N: WinnerNotifier + Send + Sync + 'static> AuctionScheduler<N> {
    pub fn new(pool: Arc<PgPool>, notifier: Arc<N>) -> Self {
        Self { pool, notifier }
    }

    /// 스케줄러 시작
    pub async fn start(&self) {
        let pool = Arc::clone(&self.pool);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                if let Err(e) = Self::run_sweep(&pool, notifier.as_ref()).await {
                    error!(
                        "{:<12} --> 경매 상태 갱신 중 오류 발생: {:?}",
                        "Scheduler", e
                    );
                }
            }
        });
    }

    /// 한 틱 분량의 스윕 실행
    pub async fn run_sweep(pool: &PgPool, notifier: &N) -> Result<(), sqlx::Error> {
        Self::promote_due_auctions(pool).await?;
        Self::close_elapsed_auctions(pool, notifier).await?;
        Ok(())
    }

    /// 승격 패스: 이미 ONGOING이면 no-op
    pub async fn promote_due_auctions(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let now = Utc::now();
        let result = sqlx::query(PROMOTE_DUE_AUCTIONS).bind(now).execute(pool).await?;

        if result.rows_affected() > 0 {
            info!(
                "{:<12} --> {}건 경매 진행 시작",
                "Scheduler",
                result.rows_affected()
            );
        } else {
            debug!("{:<12} --> 승격 대상 경매 없음", "Scheduler");
        }

        Ok(result.rows_affected())
    }

    /// 마감 패스: 경매별로 처리하고 개별 실패는 다음 틱에 재시도
    pub async fn close_elapsed_auctions(pool: &PgPool, notifier: &N) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let due = sqlx::query_as::<_, Auction>(GET_CLOSABLE_AUCTIONS)
            .bind(now)
            .fetch_all(pool)
            .await?;

        for auction in due {
            if let Err(e) = Self::close_auction(pool, notifier, &auction, now).await {
                error!(
                    "{:<12} --> 경매 {} 마감 실패 (다음 틱에 재시도): {:?}",
                    "Scheduler", auction.id, e
                );
            }
        }

        Ok(())
    }

    /// 단일 경매 마감
    /// 낙찰 행 생성을 상태 전환보다 먼저 수행한다: 중간에 죽어도 경매가
    /// ENDED 전이 아니라서 다음 틱이 다시 선택하고, 최고 입찰 계산은 이미
    /// 동결된 입찰 행의 순수 함수이므로 같은 결과로 수렴한다
    async fn close_auction(
        pool: &PgPool,
        notifier: &N,
        auction: &Auction,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let top_bid = sqlx::query_as::<_, Bid>(queries::GET_TOP_BID)
            .bind(auction.id)
            .fetch_optional(pool)
            .await?;

        let mut resolved: Option<Winner> = None;
        if let Some(top) = &top_bid {
            let deadline = now + chrono::Duration::days(PURCHASE_DEADLINE_DAYS);
            resolved = sqlx::query_as::<_, Winner>(INSERT_WINNER)
                .bind(auction.id)
                .bind(top.bidder_id)
                .bind(top.amount)
                .bind(deadline)
                .bind(now)
                .fetch_optional(pool)
                .await?;
        }

        sqlx::query(CLOSE_AUCTION)
            .bind(auction.id)
            .bind(now)
            .bind(top_bid.as_ref().map(|bid| bid.amount))
            .bind(top_bid.as_ref().map(|bid| bid.bidder_id))
            .bind(top_bid.as_ref().map(|bid| bid.placed_at))
            .execute(pool)
            .await?;

        match &top_bid {
            Some(top) => info!(
                "{:<12} --> 경매 {} 종료: 낙찰자 {} / 낙찰가 {}",
                "Scheduler", auction.id, top.bidder_id, top.amount
            ),
            None => info!(
                "{:<12} --> 경매 {} 종료: 입찰 없음, 유찰 처리",
                "Scheduler", auction.id
            ),
        }

        // 신규 생성된 낙찰만 발행한다 (재실행 틱에서는 resolved가 None)
        // 발행 실패는 치명적이지 않다: 낙찰 행 자체가 내구성 있는 사실이다
        if let Some(winner) = resolved {
            let event = AuctionEvent::WinnerResolved {
                auction_id: winner.auction_id,
                bidder_id: winner.bidder_id,
                amount: winner.amount,
                purchase_deadline: winner.purchase_deadline,
                timestamp: now,
            };
            if let Err(e) = notifier.notify_winner(&event).await {
                error!(
                    "{:<12} --> 낙찰 이벤트 발행 실패 auction {}: {}",
                    "Scheduler", winner.auction_id, e
                );
            }
        }

        Ok(())
    }
}

// endregion: --- Auction Scheduler
