// region:    --- Imports
use serde::Deserialize;

// endregion: --- Imports

// region:    --- Response Envelope

/// 백엔드 공통 응답 봉투 {success, data, message?, pagination?}
#[derive(Debug, Deserialize, Clone)]
pub struct ApiEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// 서버가 보고하는 페이지 정보 (클라이언트는 이 값을 신뢰한다)
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// 전체 페이지 수 계산 (total=10, per_page=4 => 3)
pub fn total_pages(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page as u64) as u32
}

// endregion: --- Response Envelope
