/// 인증 클라이언트
/// 1. 모든 백엔드 호출의 단일 관문 (베어러 토큰 부착)
/// 2. 401 발생 시 단일 비행(single-flight) 리프레시 후 1회 재전송
/// 3. 읽기 요청에 한해 지수 백오프 재시도
// region:    --- Imports
use crate::error::ApiError;
use crate::session::{Session, SessionStore, User};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Modules
pub mod response;

pub use response::{total_pages, ApiEnvelope, Pagination};

// endregion: --- Modules

// region:    --- Request Model

/// 요청 성격: 읽기는 백오프 재시도 대상, 쓰기는 절대 자동 재시도하지 않는다
/// (서버 측 중복 부작용 방지)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Write,
}

/// 백엔드 요청
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: reqwest::Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub kind: RequestKind,
}

impl ApiRequest {
    /// 읽기 요청 생성
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            kind: RequestKind::Read,
        }
    }

    /// 쓰기 요청 생성
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: reqwest::Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            kind: RequestKind::Write,
        }
    }

    /// 삭제 요청 생성
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::DELETE,
            path: path.into(),
            query: Vec::new(),
            body: None,
            kind: RequestKind::Write,
        }
    }

    /// 쿼리 파라미터 추가
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

// endregion: --- Request Model

// region:    --- Authenticated Client

/// 리프레시 경로에 넣으면 안 되는 엔드포인트 (리프레시 루프 방지)
const NON_REFRESHABLE_PATHS: &[&str] = &[
    "/auth/refresh",
    "/auth/login",
    "/auth/logout",
    "/auth/2fa/toggle",
];

/// 읽기 요청 최대 시도 횟수
const MAX_READ_ATTEMPTS: u32 = 3;

/// 백오프 기본 대기 시간 (ms)
const BACKOFF_BASE_MS: u64 = 300;

type RefreshOutcome = Option<Result<String, ApiError>>;

/// 인증 클라이언트 구현체
pub struct AuthenticatedClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<SessionStore>,
    // Refreshing 상태일 때만 Some (팔로워가 구독할 수신기)
    refresh_gate: Mutex<Option<watch::Receiver<RefreshOutcome>>>,
}

/// 리프레시 / 로그인 응답의 토큰 부여 레코드
#[derive(Debug, Deserialize)]
struct TokenGrant {
    token: String,
    expires_at_epoch_ms: i64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

impl AuthenticatedClient {
    /// 인증 클라이언트 생성
    pub fn new(base_url: impl Into<String>, store: Arc<SessionStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            store,
            refresh_gate: Mutex::new(None),
        }
    }

    /// 세션 저장소 참조
    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// 요청 전송
    pub async fn send(&self, req: &ApiRequest) -> Result<ApiEnvelope, ApiError> {
        match req.kind {
            RequestKind::Read => self.send_read(req).await,
            RequestKind::Write => self.send_with_refresh(req).await,
        }
    }

    /// 읽기 요청: 네트워크/서버 오류에 한해 지수 백오프 재시도
    async fn send_read(&self, req: &ApiRequest) -> Result<ApiEnvelope, ApiError> {
        let mut attempt = 0u32;
        loop {
            match self.send_with_refresh(req).await {
                Err(e) if e.is_retryable() && attempt + 1 < MAX_READ_ATTEMPTS => {
                    let delay_ms = BACKOFF_BASE_MS * (1u64 << attempt);
                    warn!(
                        "{:<12} --> 읽기 재시도 {}/{} ({}ms 후): {}",
                        "Client",
                        attempt + 1,
                        MAX_READ_ATTEMPTS - 1,
                        delay_ms,
                        e
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// 1회 전송 + 401 시 리프레시 후 1회 재전송
    async fn send_with_refresh(&self, req: &ApiRequest) -> Result<ApiEnvelope, ApiError> {
        let first = self.execute(req, self.store.token().as_deref()).await;

        match first {
            Err(ApiError::Auth) if Self::refresh_eligible(&req.path) => {
                // 기록된 만료 시각을 이미 지난 세션이면 리프레시 호출 없이 즉시 실패
                if self.store.is_past_expiry() {
                    warn!(
                        "{:<12} --> 세션이 이미 만료됨, 리프레시 생략: {}",
                        "Client", req.path
                    );
                    if let Err(e) = self.store.clear().await {
                        warn!("{:<12} --> 세션 파기 실패: {}", "Client", e);
                    }
                    return Err(ApiError::Auth);
                }

                // 리프레시 실패는 종류와 무관하게 재로그인 요구로 귀결된다
                let token = match self.refresh_access_token().await {
                    Ok(token) => token,
                    Err(e) => {
                        warn!("{:<12} --> 리프레시 실패로 요청 거부: {}", "Client", e);
                        return Err(ApiError::Auth);
                    }
                };

                // 새 토큰으로 원 요청 1회 재전송 (재전송 후 401 은 최종 실패)
                match self.execute(req, Some(&token)).await {
                    Err(ApiError::Auth) => {
                        if let Err(e) = self.store.clear().await {
                            warn!("{:<12} --> 세션 파기 실패: {}", "Client", e);
                        }
                        Err(ApiError::Auth)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// 리프레시-재전송 경로 대상 여부
    fn refresh_eligible(path: &str) -> bool {
        !NON_REFRESHABLE_PATHS.contains(&path)
    }

    /// HTTP 1회 실행 및 봉투 정규화
    async fn execute(
        &self,
        req: &ApiRequest,
        token: Option<&str>,
    ) -> Result<ApiEnvelope, ApiError> {
        let url = format!("{}{}", self.base_url, req.path);
        let mut builder = self.http.request(req.method.clone(), &url);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if !(200..300).contains(&status) {
            return Err(ApiError::from_status(status, &text));
        }

        let envelope: ApiEnvelope = serde_json::from_str(&text)?;
        Ok(envelope)
    }

    // region:    --- Single-flight Refresh

    /// 단일 비행 리프레시
    /// 동시에 401 을 관측한 호출자들은 정확히 한 번의 리프레시만 발생시키고
    /// 전원이 그 하나의 결과를 공유한다.
    pub(crate) async fn refresh_access_token(&self) -> Result<String, ApiError> {
        enum Role {
            Leader(watch::Sender<RefreshOutcome>),
            Follower(watch::Receiver<RefreshOutcome>),
        }

        // Idle -> Refreshing 전이는 게이트 잠금 아래에서만 일어난다
        let role = {
            let mut gate = self.refresh_gate.lock().await;
            match gate.as_ref() {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *gate = Some(rx);
                    Role::Leader(tx)
                }
            }
        };

        let leader_tx = match role {
            Role::Follower(mut rx) => {
                // 이미 진행 중인 리프레시에 합류해 그 결과를 공유
                debug!("{:<12} --> 진행 중인 리프레시 대기", "Refresh");
                let outcome = {
                    let guard = rx
                        .wait_for(|v| v.is_some())
                        .await
                        .map_err(|_| ApiError::Auth)?;
                    guard.clone()
                };
                return outcome.ok_or(ApiError::Auth)?;
            }
            Role::Leader(tx) => tx,
        };

        info!("{:<12} --> 토큰 리프레시 시작", "Refresh");
        let result = self.do_refresh().await;

        // Refreshing -> Idle 복귀 후 결과 방송
        {
            let mut gate = self.refresh_gate.lock().await;
            *gate = None;
        }
        if result.is_err() {
            if let Err(e) = self.store.clear().await {
                warn!("{:<12} --> 세션 파기 실패: {}", "Refresh", e);
            }
        }
        let _ = leader_tx.send(Some(result.clone()));

        match &result {
            Ok(_) => info!("{:<12} --> 토큰 리프레시 성공", "Refresh"),
            Err(e) => warn!("{:<12} --> 토큰 리프레시 실패: {}", "Refresh", e),
        }
        result
    }

    /// 리프레시 엔드포인트 호출 및 세션 갱신
    async fn do_refresh(&self) -> Result<String, ApiError> {
        let session = self.store.current().ok_or(ApiError::Auth)?;
        let refresh_token = session.refresh_token.clone().ok_or(ApiError::Auth)?;

        let req = ApiRequest::post(
            "/auth/refresh",
            serde_json::json!({ "refresh_token": refresh_token }),
        );
        let envelope = self.execute(&req, None).await?;
        if !envelope.success {
            return Err(ApiError::Auth);
        }

        let grant: TokenGrant = serde_json::from_value(envelope.data)?;
        let new_session = Session {
            token: grant.token.clone(),
            user: grant.user.unwrap_or(session.user),
            expires_at_epoch_ms: grant.expires_at_epoch_ms,
            refresh_token: grant.refresh_token.or(Some(refresh_token)),
        };
        self.store.set_session(new_session).await.map_err(|e| {
            warn!("{:<12} --> 세션 저장 실패: {}", "Refresh", e);
            ApiError::Auth
        })?;

        Ok(grant.token)
    }

    // endregion: --- Single-flight Refresh

    // region:    --- Auth Commands

    /// 로그인 (리프레시-재전송 경로 제외)
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let req = ApiRequest::post(
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        );
        let envelope = self.execute(&req, None).await?;
        if !envelope.success {
            let message = envelope
                .message
                .unwrap_or_else(|| "로그인에 실패했습니다.".to_string());
            return Err(ApiError::Validation(message));
        }

        let grant: TokenGrant = serde_json::from_value(envelope.data)?;
        let user = grant
            .user
            .ok_or_else(|| ApiError::Decode("로그인 응답에 user 가 없습니다".to_string()))?;
        let session = Session {
            token: grant.token,
            user,
            expires_at_epoch_ms: grant.expires_at_epoch_ms,
            refresh_token: grant.refresh_token,
        };
        self.store
            .set_session(session.clone())
            .await
            .map_err(|e| ApiError::Decode(e))?;
        info!("{:<12} --> 로그인 성공: user={}", "Client", session.user.id);
        Ok(session)
    }

    /// 로그아웃: 서버 호출 결과와 무관하게 로컬 세션은 파기한다
    pub async fn logout(&self) -> Result<(), ApiError> {
        let req = ApiRequest::post("/auth/logout", serde_json::json!({}));
        if let Err(e) = self.execute(&req, self.store.token().as_deref()).await {
            warn!("{:<12} --> 로그아웃 요청 실패 (세션은 파기): {}", "Client", e);
        }
        if let Err(e) = self.store.clear().await {
            warn!("{:<12} --> 세션 파기 실패: {}", "Client", e);
        }
        Ok(())
    }

    // endregion: --- Auth Commands
}

// endregion: --- Authenticated Client
