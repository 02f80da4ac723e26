/// 경매 상태 모델
/// 1. 타임스탬프에서 상태 / 남은 시간 파생
/// 2. 입찰 / 패스 / 패스 해제 커맨드 (낙관적 갱신 + 권위 재조회)
/// 3. 1 Hz 카운트다운 틱 (관측자 생명주기에 묶인 취소 가능 태스크)
// region:    --- Imports
use crate::client::{ApiRequest, AuthenticatedClient};
use crate::error::ApiError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Modules
pub mod model;

pub use model::{derive_status, remaining_seconds, AuctionStatus, Bid, Mutation, Vehicle};

// endregion: --- Modules

// region:    --- Countdown

/// 카운트다운 관측 핸들
/// 핸들이 드롭되면 틱 태스크가 취소된다 (타이머 누수 방지).
pub struct CountdownHandle {
    rx: watch::Receiver<i64>,
    token: CancellationToken,
}

impl CountdownHandle {
    /// 현재 남은 초
    pub fn remaining(&self) -> i64 {
        *self.rx.borrow()
    }

    /// 남은 초 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.rx.clone()
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// endregion: --- Countdown

// region:    --- Auction State Model

/// 경매 상태 모델 구현체
pub struct AuctionStateModel {
    client: Arc<AuthenticatedClient>,
    vehicles: Mutex<HashMap<i64, Vehicle>>,
}

impl AuctionStateModel {
    /// 경매 상태 모델 생성
    pub fn new(client: Arc<AuthenticatedClient>) -> Self {
        Self {
            client,
            vehicles: Mutex::new(HashMap::new()),
        }
    }

    /// 차량 레코드 조회 및 정규화 (권위 값은 항상 서버)
    pub async fn load_vehicle(&self, vehicle_id: i64) -> Result<Vehicle, ApiError> {
        let req = ApiRequest::get(format!("/vehicles/{}", vehicle_id));
        let envelope = self.client.send(&req).await?;
        let vehicle = Vehicle::from_value(envelope.data)?;
        self.vehicles
            .lock()
            .unwrap()
            .insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    /// 로컬 보관 중인 차량 조회
    pub fn vehicle(&self, vehicle_id: i64) -> Option<Vehicle> {
        self.vehicles.lock().unwrap().get(&vehicle_id).cloned()
    }

    /// 패스
    pub async fn pass(&self, vehicle_id: i64) -> Result<(), ApiError> {
        self.set_passed(vehicle_id, true).await
    }

    /// 패스 해제
    pub async fn unpass(&self, vehicle_id: i64) -> Result<(), ApiError> {
        self.set_passed(vehicle_id, false).await
    }

    /// 패스 플래그 전환: 낙관적 적용 후 서버 확정, 실패 시 되돌림
    async fn set_passed(&self, vehicle_id: i64, passed: bool) -> Result<(), ApiError> {
        let previous = {
            let mut vehicles = self.vehicles.lock().unwrap();
            let vehicle = vehicles.get_mut(&vehicle_id).ok_or(ApiError::NotFound)?;

            // 종료된 경매는 요청 자체를 보내지 않는다
            if vehicle.status(Utc::now()) == AuctionStatus::Ended {
                return Err(ApiError::Validation(
                    "이미 종료된 경매입니다.".to_string(),
                ));
            }

            let previous = vehicle.is_passed.value();
            vehicle.is_passed = Mutation::Optimistic(passed);
            previous
        };

        let action = if passed { "pass" } else { "unpass" };
        let req = ApiRequest::post(
            format!("/vehicles/{}/{}", vehicle_id, action),
            serde_json::json!({}),
        );

        match self.client.send(&req).await {
            Ok(envelope) if envelope.success => {
                if let Some(vehicle) = self.vehicles.lock().unwrap().get_mut(&vehicle_id) {
                    vehicle.is_passed = Mutation::Confirmed(passed);
                }
                info!(
                    "{:<12} --> {} 확정: vehicle={}",
                    "Auction", action, vehicle_id
                );
                Ok(())
            }
            Ok(envelope) => {
                self.revert_passed(vehicle_id, previous);
                let message = envelope
                    .message
                    .unwrap_or_else(|| "요청이 거절되었습니다.".to_string());
                Err(ApiError::Validation(message))
            }
            Err(e) => {
                self.revert_passed(vehicle_id, previous);
                warn!(
                    "{:<12} --> {} 실패, 되돌림: vehicle={} ({})",
                    "Auction", action, vehicle_id, e
                );
                Err(e)
            }
        }
    }

    fn revert_passed(&self, vehicle_id: i64, previous: bool) {
        if let Some(vehicle) = self.vehicles.lock().unwrap().get_mut(&vehicle_id) {
            vehicle.is_passed = Mutation::Reverted(previous);
        }
    }

    /// 입찰
    /// 로컬 검증은 금액이 양의 유한수인지뿐이다. 로컬 highest_bid 와의 비교는
    /// 하지 않으며 (서버가 유일한 권위), 성공 시 레코드를 재조회한다.
    pub async fn bid(&self, vehicle_id: i64, amount: f64) -> Result<Vehicle, ApiError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ApiError::Validation(
                "입찰 금액은 0보다 큰 숫자여야 합니다.".to_string(),
            ));
        }

        let req = ApiRequest::post(
            format!("/vehicles/{}/bid", vehicle_id),
            serde_json::json!({ "amount": amount }),
        );
        let envelope = self.client.send(&req).await?;
        if !envelope.success {
            let message = envelope
                .message
                .unwrap_or_else(|| "입찰이 거절되었습니다.".to_string());
            return Err(ApiError::Validation(message));
        }

        info!(
            "{:<12} --> 입찰 접수: vehicle={} amount={}",
            "Auction", vehicle_id, amount
        );

        // 미확정 값을 표시하지 않도록 서버 확정 레코드를 다시 읽는다
        self.load_vehicle(vehicle_id).await
    }

    /// 카운트다운 관측 시작
    /// 1 Hz 틱으로 남은 초를 발행하고, 0 에 도달하면 0 으로 고정 후 종료한다.
    pub fn observe_countdown(&self, vehicle_id: i64) -> Option<CountdownHandle> {
        let ends_at = self.vehicles.lock().unwrap().get(&vehicle_id)?.ends_at;

        let (tx, rx) = watch::channel(remaining_seconds(ends_at, Utc::now()));
        let token = CancellationToken::new();
        let task_token = token.clone();

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        debug!("{:<12} --> 틱 취소: vehicle={}", "Countdown", vehicle_id);
                        break;
                    }
                    _ = ticker.tick() => {
                        let remaining = remaining_seconds(ends_at, Utc::now());
                        if tx.send(remaining).is_err() {
                            break;
                        }
                        if remaining == 0 {
                            debug!("{:<12} --> 종료, 0 고정: vehicle={}", "Countdown", vehicle_id);
                            break;
                        }
                    }
                }
            }
        });

        Some(CountdownHandle { rx, token })
    }
}

// endregion: --- Auction State Model
