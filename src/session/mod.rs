/// 세션 저장소
/// 1. 현재 사용자 / 베어러 토큰 / 만료 시각 보관
/// 2. init / teardown 생명주기와 subscribe / notify 제공
/// 3. 쓰기는 AuthenticatedClient 만 수행한다 (리프레시 순서 보장)
// region:    --- Imports
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Session Model

/// 로그인한 사용자
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// 현재 세션 (토큰 또는 만료 시각이 없으면 세션 없음으로 취급)
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub expires_at_epoch_ms: i64,
    pub refresh_token: Option<String>,
}

impl Session {
    /// 기록된 만료 시각을 지났는지 확인
    pub fn is_past_expiry(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_epoch_ms
    }
}

/// 영속화되는 프로필 레코드 {user, expires_at_epoch_ms}
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredProfile {
    pub user: User,
    pub expires_at_epoch_ms: i64,
}

/// 프로필과 별도로 영속화되는 토큰 레코드
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

// endregion: --- Session Model

// region:    --- Session Backend Trait

/// 세션 영속화 트레이트
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn load_profile(&self) -> Result<Option<StoredProfile>, String>;
    async fn load_tokens(&self) -> Result<Option<StoredTokens>, String>;
    async fn save(&self, profile: &StoredProfile, tokens: &StoredTokens) -> Result<(), String>;
    async fn clear(&self) -> Result<(), String>;
}

/// 메모리 세션 백엔드 (테스트 및 임베디드 용)
#[derive(Default)]
pub struct MemorySessionBackend {
    records: Mutex<(Option<StoredProfile>, Option<StoredTokens>)>,
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn load_profile(&self) -> Result<Option<StoredProfile>, String> {
        Ok(self.records.lock().unwrap().0.clone())
    }

    async fn load_tokens(&self) -> Result<Option<StoredTokens>, String> {
        Ok(self.records.lock().unwrap().1.clone())
    }

    async fn save(&self, profile: &StoredProfile, tokens: &StoredTokens) -> Result<(), String> {
        *self.records.lock().unwrap() = (Some(profile.clone()), Some(tokens.clone()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), String> {
        *self.records.lock().unwrap() = (None, None);
        Ok(())
    }
}

/// 파일 세션 백엔드
/// 프로필과 토큰을 서로 다른 파일에 저장한다.
pub struct FileSessionBackend {
    profile_path: PathBuf,
    tokens_path: PathBuf,
}

impl FileSessionBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            profile_path: dir.join("session.json"),
            tokens_path: dir.join("tokens.json"),
        }
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        path: &PathBuf,
    ) -> Result<Option<T>, String> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(v) => Ok(Some(v)),
                Err(e) => {
                    // 손상된 레코드는 로그아웃 상태로 취급
                    warn!("{:<12} --> 세션 레코드 해석 실패: {}", "Session", e);
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[async_trait]
impl SessionBackend for FileSessionBackend {
    async fn load_profile(&self) -> Result<Option<StoredProfile>, String> {
        Self::read_json(&self.profile_path).await
    }

    async fn load_tokens(&self) -> Result<Option<StoredTokens>, String> {
        Self::read_json(&self.tokens_path).await
    }

    async fn save(&self, profile: &StoredProfile, tokens: &StoredTokens) -> Result<(), String> {
        let profile_raw = serde_json::to_string(profile).map_err(|e| e.to_string())?;
        let tokens_raw = serde_json::to_string(tokens).map_err(|e| e.to_string())?;
        tokio::fs::write(&self.profile_path, profile_raw)
            .await
            .map_err(|e| e.to_string())?;
        tokio::fs::write(&self.tokens_path, tokens_raw)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), String> {
        for path in [&self.profile_path, &self.tokens_path] {
            match tokio::fs::remove_file(path).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.to_string()),
            }
        }
        Ok(())
    }
}

// endregion: --- Session Backend Trait

// region:    --- Session Store

/// 세션 저장소 구현체
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    current: watch::Sender<Option<Session>>,
}

impl SessionStore {
    /// 세션 저장소 생성
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            backend,
            current: tx,
        }
    }

    /// 영속화된 레코드에서 세션 복원
    /// 프로필 또는 토큰 레코드 중 하나라도 없으면 로그아웃 상태
    pub async fn init(&self) -> Result<(), String> {
        let profile = self.backend.load_profile().await?;
        let tokens = self.backend.load_tokens().await?;

        let session = match (profile, tokens) {
            (Some(profile), Some(tokens)) => Some(Session {
                token: tokens.access_token,
                user: profile.user,
                expires_at_epoch_ms: profile.expires_at_epoch_ms,
                refresh_token: tokens.refresh_token,
            }),
            _ => None,
        };

        match &session {
            Some(s) => info!(
                "{:<12} --> 세션 복원: user={} 만료={}",
                "Session", s.user.id, s.expires_at_epoch_ms
            ),
            None => debug!("{:<12} --> 저장된 세션 없음", "Session"),
        }

        let _ = self.current.send(session);
        Ok(())
    }

    /// 메모리 상태만 내려놓는다 (영속 레코드는 유지)
    pub fn teardown(&self) {
        let _ = self.current.send(None);
    }

    /// 현재 세션 조회
    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    /// 현재 베어러 토큰 조회
    pub fn token(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|s| s.token.clone())
    }

    /// 세션 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    /// 기록된 만료 시각을 지났는지 확인 (세션이 없으면 true)
    pub fn is_past_expiry(&self) -> bool {
        let now_ms = Utc::now().timestamp_millis();
        match self.current.borrow().as_ref() {
            Some(s) => s.is_past_expiry(now_ms),
            None => true,
        }
    }

    /// 세션 설정 (로그인 / 리프레시 성공 시 AuthenticatedClient 가 호출)
    pub async fn set_session(&self, session: Session) -> Result<(), String> {
        let profile = StoredProfile {
            user: session.user.clone(),
            expires_at_epoch_ms: session.expires_at_epoch_ms,
        };
        let tokens = StoredTokens {
            access_token: session.token.clone(),
            refresh_token: session.refresh_token.clone(),
        };
        self.backend.save(&profile, &tokens).await?;
        let _ = self.current.send(Some(session));
        Ok(())
    }

    /// 세션 파기 (리프레시 실패 / 로그아웃 / 만료 감지 시)
    pub async fn clear(&self) -> Result<(), String> {
        self.backend.clear().await?;
        let _ = self.current.send(None);
        info!("{:<12} --> 세션 파기", "Session");
        Ok(())
    }
}

// endregion: --- Session Store
