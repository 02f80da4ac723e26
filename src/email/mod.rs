/// 일회용 이메일 조회 협력자
/// 조회 실패는 "확인 불가" 이지 검증 실패가 아니다.
// region:    --- Imports
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

// endregion: --- Imports

// region:    --- Email Verifier

/// 이메일 확인 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailCheck {
    Deliverable,
    Disposable,
    /// 조회 실패 (가입 차단 사유로 쓰지 않는다)
    Unverifiable,
}

/// 이메일 확인 트레이트
#[async_trait]
pub trait EmailVerifier: Send + Sync {
    async fn check(&self, email: &str) -> EmailCheck;
}

/// 서드파티 조회 서비스 기반 구현체
pub struct HttpEmailVerifier {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    disposable: bool,
}

impl HttpEmailVerifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl EmailVerifier for HttpEmailVerifier {
    async fn check(&self, email: &str) -> EmailCheck {
        let result = async {
            let resp = self
                .http
                .get(format!("{}/lookup", self.base_url))
                .query(&[("email", email)])
                .send()
                .await?;
            resp.error_for_status()?.json::<LookupResponse>().await
        }
        .await;

        match result {
            Ok(lookup) if lookup.disposable => EmailCheck::Disposable,
            Ok(_) => EmailCheck::Deliverable,
            Err(e) => {
                warn!("{:<12} --> 이메일 조회 실패, 확인 불가 처리: {}", "Email", e);
                EmailCheck::Unverifiable
            }
        }
    }
}

// endregion: --- Email Verifier
