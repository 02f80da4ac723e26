/// 역경매 리더보드 엔진
/// 1. 세션별 역입찰 순위 산정 (낮은 금액 우선, 동률은 먼저 제출한 쪽)
/// 2. 입찰 제출 / 철회 커맨드 (세션 단위 직렬화)
/// 3. 철회는 멱등: 두 번째 호출은 복구 가능한 "이미 철회됨" 결과
// region:    --- Imports
use crate::client::{ApiRequest, AuthenticatedClient};
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Leaderboard Model

/// 역경매 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverseSessionStatus {
    Active,
    Ended,
}

/// 역경매 세션
#[derive(Debug, Clone)]
pub struct ReverseSession {
    pub id: i64,
    pub status: ReverseSessionStatus,
}

/// 리더보드 항목 ((session, bidder) 당 하나, rank 는 파생 값)
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub bidder_id: i64,
    pub amount: f64,
    pub submitted_at: DateTime<Utc>,
    pub rank: u32,
}

/// 순위 산정: 금액 오름차순, 동률은 submitted_at 오름차순, 1..n 부여
/// rank 1 이 선두다.
pub fn rank(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        a.amount
            .total_cmp(&b.amount)
            .then(a.submitted_at.cmp(&b.submitted_at))
    });
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index as u32 + 1;
    }
    entries
}

/// 철회 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    Withdrawn,
    /// 이미 철회된 입찰 (복구 가능, 치명적 오류 아님)
    AlreadyWithdrawn,
}

// endregion: --- Leaderboard Model

// region:    --- Leaderboard Engine

/// 세션별 보류 중인 커맨드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingAction {
    Submit,
    Withdraw,
}

/// 세션별 로컬 보드 상태
struct BoardState {
    status: ReverseSessionStatus,
    entries: Vec<LeaderboardEntry>,
    pending: Option<PendingAction>,
}

/// 리더보드 엔진 구현체
pub struct LeaderboardEngine {
    client: Arc<AuthenticatedClient>,
    boards: Mutex<HashMap<i64, BoardState>>,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    id: i64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    bidder_id: i64,
    amount: f64,
    submitted_at: DateTime<Utc>,
}

impl LeaderboardEngine {
    /// 리더보드 엔진 생성
    pub fn new(client: Arc<AuthenticatedClient>) -> Self {
        Self {
            client,
            boards: Mutex::new(HashMap::new()),
        }
    }

    /// 세션 조회 및 정규화
    pub async fn load_session(&self, session_id: i64) -> Result<ReverseSession, ApiError> {
        let req = ApiRequest::get(format!("/reverse-sessions/{}", session_id));
        let envelope = self.client.send(&req).await?;
        let raw: RawSession = serde_json::from_value(envelope.data)?;

        let status = match raw.status.as_str() {
            "active" => ReverseSessionStatus::Active,
            "ended" => ReverseSessionStatus::Ended,
            other => {
                return Err(ApiError::Decode(format!(
                    "알 수 없는 세션 상태: {}",
                    other
                )))
            }
        };

        let session = ReverseSession {
            id: raw.id,
            status,
        };
        let mut boards = self.boards.lock().unwrap();
        let board = boards.entry(session.id).or_insert_with(|| BoardState {
            status,
            entries: Vec::new(),
            pending: None,
        });
        board.status = status;
        Ok(session)
    }

    /// 리더보드 조회 및 순위 산정
    pub async fn load_board(&self, session_id: i64) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let req = ApiRequest::get(format!("/reverse-sessions/{}/leaderboard", session_id));
        let envelope = self.client.send(&req).await?;
        let raw: Vec<RawEntry> = serde_json::from_value(envelope.data)?;

        let entries = rank(
            raw.into_iter()
                .map(|e| LeaderboardEntry {
                    bidder_id: e.bidder_id,
                    amount: e.amount,
                    submitted_at: e.submitted_at,
                    rank: 0,
                })
                .collect(),
        );

        let mut boards = self.boards.lock().unwrap();
        let board = boards.entry(session_id).or_insert_with(|| BoardState {
            status: ReverseSessionStatus::Active,
            entries: Vec::new(),
            pending: None,
        });
        board.entries = entries.clone();
        Ok(entries)
    }

    /// 로컬 보관 중인 리더보드
    pub fn leaderboard(&self, session_id: i64) -> Vec<LeaderboardEntry> {
        self.boards
            .lock()
            .unwrap()
            .get(&session_id)
            .map(|b| b.entries.clone())
            .unwrap_or_default()
    }

    /// 입찰 제출
    /// 로컬 세션 상태가 active 가 아니면 요청 없이 거절. 성공 시 리더보드 재조회,
    /// 실패 시 로컬 리더보드는 손대지 않는다.
    pub async fn submit_bid(
        &self,
        session_id: i64,
        amount: f64,
        perks: &[String],
    ) -> Result<Vec<LeaderboardEntry>, ApiError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ApiError::Validation(
                "입찰 금액은 0보다 큰 숫자여야 합니다.".to_string(),
            ));
        }

        self.begin_action(session_id, PendingAction::Submit)?;

        let req = ApiRequest::post(
            format!("/reverse-sessions/{}/bids", session_id),
            serde_json::json!({ "amount": amount, "perks": perks }),
        );
        let result = self.client.send(&req).await;
        self.finish_action(session_id);

        match result {
            Ok(envelope) if envelope.success => {
                info!(
                    "{:<12} --> 역입찰 제출: session={} amount={}",
                    "Board", session_id, amount
                );
                self.load_board(session_id).await
            }
            Ok(envelope) => {
                let message = envelope
                    .message
                    .unwrap_or_else(|| "입찰이 거절되었습니다.".to_string());
                Err(ApiError::Validation(message))
            }
            Err(e) => {
                warn!(
                    "{:<12} --> 역입찰 제출 실패: session={} ({})",
                    "Board", session_id, e
                );
                Err(e)
            }
        }
    }

    /// 입찰 철회 (멱등)
    pub async fn withdraw_bid(
        &self,
        session_id: i64,
        bid_id: i64,
    ) -> Result<WithdrawOutcome, ApiError> {
        self.begin_withdraw(session_id)?;

        let req = ApiRequest::post(
            format!("/reverse-sessions/{}/bids/{}/withdraw", session_id, bid_id),
            serde_json::json!({}),
        );
        let result = self.client.send(&req).await;
        self.finish_action(session_id);

        match result {
            Ok(envelope) if envelope.success => {
                info!(
                    "{:<12} --> 역입찰 철회: session={} bid={}",
                    "Board", session_id, bid_id
                );
                self.load_board(session_id).await?;
                Ok(WithdrawOutcome::Withdrawn)
            }
            Ok(envelope) => {
                let message = envelope.message.unwrap_or_default();
                if message.contains("이미 철회")
                    || message.to_ascii_lowercase().contains("already")
                {
                    Ok(WithdrawOutcome::AlreadyWithdrawn)
                } else {
                    Err(ApiError::Validation(message))
                }
            }
            // 서버에서 이미 제거된 항목은 철회 완료로 취급
            Err(ApiError::NotFound) => Ok(WithdrawOutcome::AlreadyWithdrawn),
            Err(e) => Err(e),
        }
    }

    /// 제출 시작 전 로컬 검증: 세션 active + 보류 커맨드 없음
    fn begin_action(&self, session_id: i64, action: PendingAction) -> Result<(), ApiError> {
        let mut boards = self.boards.lock().unwrap();
        let board = boards
            .get_mut(&session_id)
            .ok_or(ApiError::NotFound)?;

        if board.status != ReverseSessionStatus::Active {
            return Err(ApiError::Validation(
                "이미 종료된 세션입니다.".to_string(),
            ));
        }
        if board.pending.is_some() {
            return Err(ApiError::Validation(
                "이전 요청이 처리 중입니다. 잠시 후 다시 시도해 주세요.".to_string(),
            ));
        }
        board.pending = Some(action);
        Ok(())
    }

    /// 철회 시작: 세션이 끝나도 철회는 허용, 보류 커맨드만 차단
    fn begin_withdraw(&self, session_id: i64) -> Result<(), ApiError> {
        let mut boards = self.boards.lock().unwrap();
        let board = boards
            .get_mut(&session_id)
            .ok_or(ApiError::NotFound)?;

        if board.pending.is_some() {
            return Err(ApiError::Validation(
                "이전 요청이 처리 중입니다. 잠시 후 다시 시도해 주세요.".to_string(),
            ));
        }
        board.pending = Some(PendingAction::Withdraw);
        Ok(())
    }

    fn finish_action(&self, session_id: i64) {
        if let Some(board) = self.boards.lock().unwrap().get_mut(&session_id) {
            board.pending = None;
        }
    }
}

// endregion: --- Leaderboard Engine
