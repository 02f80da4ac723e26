/// 포털 코어 공통 에러 타입
/// HTTP 상태 코드와 클라이언트 측 검증 오류를 하나의 분류 체계로 관리한다.
// region:    --- Imports
use thiserror::Error;
use tracing::warn;

// endregion: --- Imports

// region:    --- ApiError

/// 백엔드 호출 및 로컬 검증에서 발생하는 에러 분류
///
/// 리프레시 결과를 watch 채널로 공유하기 때문에 Clone 이 필요하고,
/// 그래서 원본 reqwest 에러 대신 문자열로 상세를 보관한다.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 응답을 받지 못함 (연결 실패, 타임아웃 등)
    #[error("네트워크 오류: {0}")]
    Network(String),

    /// 리프레시 후에도 살아남은 401 (재로그인 필요)
    #[error("인증이 만료되었습니다")]
    Auth,

    /// 403
    #[error("권한이 없습니다")]
    Permission,

    /// 404
    #[error("대상을 찾을 수 없습니다")]
    NotFound,

    /// 429
    #[error("요청이 너무 많습니다")]
    RateLimit,

    /// 5xx
    #[error("서버 오류 ({0})")]
    Server(u16),

    /// 클라이언트 측 검증 실패 (네트워크 호출 전에 해결)
    #[error("{0}")]
    Validation(String),

    /// 서버 응답을 엔티티로 정규화하지 못함
    #[error("응답 해석 오류: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP 상태 코드를 에러로 매핑 (2xx 는 호출하지 않음)
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => ApiError::Auth,
            403 => ApiError::Permission,
            404 => ApiError::NotFound,
            429 => ApiError::RateLimit,
            s if s >= 500 => {
                // 상세 내용은 로그로만 남긴다
                warn!("{:<12} --> 서버 오류 {}: {}", "ApiError", s, body);
                ApiError::Server(s)
            }
            s => {
                warn!("{:<12} --> 예상 못한 상태 코드 {}: {}", "ApiError", s, body);
                ApiError::Server(s)
            }
        }
    }

    /// 읽기 요청 재시도 대상 여부 (네트워크/서버 오류만)
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Server(_))
    }

    /// 사용자에게 노출할 짧은 메시지
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => "연결에 실패했습니다. 잠시 후 다시 시도해 주세요.".to_string(),
            ApiError::Auth => "다시 로그인해 주세요.".to_string(),
            ApiError::Permission => "권한이 없습니다.".to_string(),
            ApiError::NotFound => "대상을 찾을 수 없습니다.".to_string(),
            ApiError::RateLimit => "요청이 너무 많습니다. 잠시 후 다시 시도해 주세요.".to_string(),
            ApiError::Server(_) => "서버 오류가 발생했습니다. 잠시 후 다시 시도해 주세요.".to_string(),
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Decode(_) => "응답을 처리하지 못했습니다.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        // 응답 자체를 못 받은 경우만 이 경로를 탄다
        ApiError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

// endregion: --- ApiError
