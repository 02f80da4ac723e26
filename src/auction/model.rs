// region:    --- Imports
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::Deserialize;

// endregion: --- Imports

// region:    --- Auction Status

/// 경매 상태
/// 타임스탬프에서만 파생되며 독립적으로 저장하지 않는다.
/// 전이는 Scheduled -> Live -> Ended 단방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionStatus {
    Scheduled,
    Live,
    Ended,
}

/// 상태 파생
pub fn derive_status(
    start_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AuctionStatus {
    if now < start_at {
        AuctionStatus::Scheduled
    } else if now < ends_at {
        AuctionStatus::Live
    } else {
        AuctionStatus::Ended
    }
}

/// 남은 초 계산: max(0, ends_at - now)
pub fn remaining_seconds(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (ends_at - now).num_seconds().max(0)
}

// endregion: --- Auction Status

// region:    --- Mutation Tri-state

/// 낙관적 로컬 변경의 3 상태
/// 임시 불리언 대신 단계별 상태를 명시해 테스트에서 각 시점을 단언할 수 있다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation<T> {
    /// 서버가 확정한 값
    Confirmed(T),
    /// 확정 대기 중인 낙관적 값
    Optimistic(T),
    /// 실패로 되돌린 값
    Reverted(T),
}

impl<T: Copy> Mutation<T> {
    /// 현재 표시 값
    pub fn value(&self) -> T {
        match self {
            Mutation::Confirmed(v) | Mutation::Optimistic(v) | Mutation::Reverted(v) => *v,
        }
    }
}

// endregion: --- Mutation Tri-state

// region:    --- Entities

/// 차량 (경매 대상) 모델
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: i64,
    pub start_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub cash_offer: f64,
    pub highest_bid: f64,
    pub is_passed: Mutation<bool>,
}

impl Vehicle {
    /// 현재 상태
    pub fn status(&self, now: DateTime<Utc>) -> AuctionStatus {
        derive_status(self.start_at, self.ends_at, now)
    }

    /// 남은 초
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        remaining_seconds(self.ends_at, now)
    }

    /// 경계 정규화: 서버 원시 응답을 엔티티로 변환
    pub fn from_value(value: serde_json::Value) -> Result<Self, ApiError> {
        #[derive(Deserialize)]
        struct Raw {
            id: i64,
            start_at: DateTime<Utc>,
            ends_at: DateTime<Utc>,
            #[serde(default)]
            cash_offer: f64,
            #[serde(default)]
            highest_bid: f64,
            #[serde(default)]
            is_passed: bool,
        }

        let raw: Raw = serde_json::from_value(value)?;
        Ok(Vehicle {
            id: raw.id,
            start_at: raw.start_at,
            ends_at: raw.ends_at,
            cash_offer: raw.cash_offer,
            highest_bid: raw.highest_bid,
            is_passed: Mutation::Confirmed(raw.is_passed),
        })
    }
}

/// 입찰 모델
#[derive(Debug, Clone, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub subject_id: i64,
    pub bidder_id: i64,
    pub amount: f64,
    pub submitted_at: DateTime<Utc>,
    pub status: String,
}

// endregion: --- Entities
