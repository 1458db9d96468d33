/// 경매 조회
pub const GET_AUCTION: &str = "SELECT id, title, category, description, image_url, base_price, current_price, start_time, end_time, status, seller_id, highest_bidder_id, highest_bid_amount, highest_bid_time, ended_at, created_at FROM auctions WHERE id = $1";

/// 경매 목록 조회 (카테고리/검색어/판정 상태 필터 + 페이지네이션)
/// 상태 필터는 저장된 status가 아닌 일정 컬럼으로 판정한다
pub const LIST_AUCTIONS: &str = r#"
    SELECT id, title, category, description, image_url, base_price, current_price,
           start_time, end_time, status, seller_id,
           highest_bidder_id, highest_bid_amount, highest_bid_time, ended_at, created_at
    FROM auctions
    WHERE ($1::text IS NULL OR category = $1)
      AND ($2::text IS NULL OR title ILIKE '%' || $2 || '%' OR description ILIKE '%' || $2 || '%')
      AND ($3::text IS NULL
           OR ($3 = 'UPCOMING' AND start_time > $4)
           OR ($3 = 'ONGOING' AND start_time <= $4 AND end_time > $4)
           OR ($3 = 'ENDED' AND end_time <= $4))
    ORDER BY created_at DESC
    LIMIT $5 OFFSET $6
"#;

/// 최고 유효 입찰 조회 (동일 금액이면 먼저 입찰한 쪽이 선순위)
pub const GET_TOP_BID: &str = r#"
    SELECT id, auction_id, bidder_id, amount, placed_at
    FROM bids
    WHERE auction_id = $1
    ORDER BY amount DESC, placed_at ASC
    LIMIT 1
"#;

/// 현재 가격 조회
pub const GET_CURRENT_PRICE: &str = "SELECT current_price FROM auctions WHERE id = $1";

/// 읽기 경로 상태 보정: UPCOMING -> ONGOING 승격만 수행
/// 종료 전이는 낙찰 처리를 동반하므로 스케줄러 전담
pub const HEAL_PROMOTE_STATUS: &str =
    "UPDATE auctions SET status = 'ONGOING' WHERE id = $1 AND status = 'UPCOMING'";

/// 내 입찰 목록 조회
pub const GET_MY_BIDS: &str = r#"
    SELECT a.id AS auction_id, a.title, a.category, a.status, a.current_price,
           a.start_time, a.end_time, b.amount AS my_amount, b.placed_at
    FROM bids b
    JOIN auctions a ON a.id = b.auction_id
    WHERE b.bidder_id = $1
    ORDER BY b.placed_at DESC
"#;

/// 내 낙찰 목록 조회
pub const GET_MY_WINS: &str = "SELECT id, auction_id, bidder_id, amount, purchase_deadline, purchase_status, payment_id, created_at FROM winners WHERE bidder_id = $1 ORDER BY created_at DESC";

/// 낙찰자 조회 (전체)
pub const GET_WINNER: &str = "SELECT id, auction_id, bidder_id, amount, purchase_deadline, purchase_status, payment_id, created_at FROM winners WHERE auction_id = $1";

/// 낙찰자 조회 (공개용 최소 정보)
pub const GET_WINNER_PUBLIC: &str =
    "SELECT auction_id, bidder_id, amount FROM winners WHERE auction_id = $1";
