/// 경매 라이프사이클 상태 판정
/// 저장된 상태가 아닌 시간 기준의 순수 함수로 판정한다 (읽기 경로와 스케줄러 공용)
// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Auction Status

/// 경매 상태 (UPCOMING -> ONGOING -> ENDED, 역방향 전이 없음)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuctionStatus {
    Upcoming,
    Ongoing,
    Ended,
}

impl AuctionStatus {
    /// DB 저장용 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Upcoming => "UPCOMING",
            AuctionStatus::Ongoing => "ONGOING",
            AuctionStatus::Ended => "ENDED",
        }
    }
}

/// 현재 시각과 경매 일정으로 상태를 판정
/// 입찰 구간은 [start, end) 반개구간: end 도달 시점부터 종료로 본다
pub fn evaluate_status(
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AuctionStatus {
    if end <= now {
        AuctionStatus::Ended
    } else if start <= now {
        AuctionStatus::Ongoing
    } else {
        AuctionStatus::Upcoming
    }
}

// endregion: --- Auction Status

// region:    --- Tests


// endregion: --- Tests
