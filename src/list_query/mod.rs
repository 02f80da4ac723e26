/// 리스트 쿼리 파이프라인
/// 모든 리스트 뷰 (경매 / 입찰 / 예약 / 딜러 / 세션) 가 공유하는
/// 디바운스 검색 + 필터 + 정렬 + 페이지네이션 상태 기계.
/// 결과 반영은 도착 순서가 아니라 최신 발행 순서(highest-sequence-wins)를 따른다.
// region:    --- Imports
use crate::client::Pagination;
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// endregion: --- Imports

// region:    --- Modules
pub mod filters;

pub use filters::TimeWindow;

// endregion: --- Modules

// region:    --- Query Model

/// 검색 디바운스 구간 (ms)
const SEARCH_DEBOUNCE_MS: u64 = 500;

/// 리스트 쿼리 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub search_text: String,
    pub filter_key: Option<String>,
    pub sort_key: Option<String>,
    pub page: u32,
    pub page_size: u32,
    /// 서버가 보고한 전체 개수
    pub total_count: u64,
}

impl ListQuery {
    fn new(page_size: u32) -> Self {
        Self {
            search_text: String::new(),
            filter_key: None,
            sort_key: None,
            page: 1,
            page_size,
            total_count: 0,
        }
    }
}

/// 로딩 상태: Idle -> Searching (디바운스 대기) -> Fetching -> {Loaded | Error}
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Searching,
    Fetching,
    Loaded,
    Error(String),
}

/// 리스트 항목 트레이트: 시간 구간 필터가 참조할 기준 시각 제공
pub trait ListItem: Clone + Send + Sync + 'static {
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        None
    }
}

/// 한 페이지 분량의 결과
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

/// 리스트 페치 트레이트 (뷰마다 엔드포인트 / 파라미터 매핑만 구현)
#[async_trait]
pub trait ListFetcher<T>: Send + Sync {
    async fn fetch(&self, query: &ListQuery) -> Result<ListPage<T>, ApiError>;
}

// endregion: --- Query Model

// region:    --- Pipeline

struct PipelineState<T> {
    query: ListQuery,
    load: LoadState,
    items: Vec<T>,
    pagination: Option<Pagination>,
}

struct Inner<T> {
    fetcher: Arc<dyn ListFetcher<T>>,
    state: Mutex<PipelineState<T>>,
    // 발행 시 증가하는 단조 시퀀스. 최신 발행분보다 오래된 응답은 폐기한다.
    seq: AtomicU64,
    debounce: Mutex<Option<CancellationToken>>,
    // 상태 변경 알림 (버전 번호)
    notify: watch::Sender<u64>,
}

/// 리스트 쿼리 파이프라인 구현체
pub struct ListQueryPipeline<T: ListItem> {
    inner: Arc<Inner<T>>,
}

impl<T: ListItem> ListQueryPipeline<T> {
    /// 파이프라인 생성
    pub fn new(fetcher: Arc<dyn ListFetcher<T>>, page_size: u32) -> Self {
        let (notify, _rx) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state: Mutex::new(PipelineState {
                    query: ListQuery::new(page_size),
                    load: LoadState::Idle,
                    items: Vec::new(),
                    pagination: None,
                }),
                seq: AtomicU64::new(0),
                debounce: Mutex::new(None),
                notify,
            }),
        }
    }

    /// 현재 쿼리
    pub fn query(&self) -> ListQuery {
        self.inner.state.lock().unwrap().query.clone()
    }

    /// 현재 로딩 상태
    pub fn load_state(&self) -> LoadState {
        self.inner.state.lock().unwrap().load.clone()
    }

    /// Searching 과 Fetching 을 하나의 바쁨 표시로 합친다
    pub fn is_busy(&self) -> bool {
        matches!(
            self.load_state(),
            LoadState::Searching | LoadState::Fetching
        )
    }

    /// 현재 항목
    pub fn items(&self) -> Vec<T> {
        self.inner.state.lock().unwrap().items.clone()
    }

    /// 마지막으로 서버가 보고한 페이지 정보
    pub fn pagination(&self) -> Option<Pagination> {
        self.inner.state.lock().unwrap().pagination.clone()
    }

    /// 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.notify.subscribe()
    }

    /// 검색어 변경: 페이지 1 로 리셋, 500ms 디바운스 후 페치 발행
    pub fn set_search_text(&self, text: impl Into<String>) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.query.search_text = text.into();
            state.query.page = 1;
            state.load = LoadState::Searching;
        }
        self.inner.bump();

        // 이전 디바운스 타이머 취소 후 재무장
        let token = CancellationToken::new();
        {
            let mut slot = self.inner.debounce.lock().unwrap();
            if let Some(previous) = slot.replace(token.clone()) {
                previous.cancel();
            }
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("{:<12} --> 디바운스 취소", "ListQuery");
                }
                _ = sleep(Duration::from_millis(SEARCH_DEBOUNCE_MS)) => {
                    Inner::spawn_fetch(&inner);
                }
            }
        });
    }

    /// 필터 변경: 페이지 1 로 리셋, 즉시 페치
    pub fn set_filter_key(&self, filter_key: Option<String>) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.query.filter_key = filter_key;
            state.query.page = 1;
        }
        Inner::spawn_fetch(&self.inner);
    }

    /// 정렬 변경 (페이지 유지)
    pub fn set_sort_key(&self, sort_key: Option<String>) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.query.sort_key = sort_key;
        }
        Inner::spawn_fetch(&self.inner);
    }

    /// 페이지 이동: 서버가 보고한 total_pages 를 넘으면 마지막 페이지로 보정
    pub fn set_page(&self, page: u32) {
        {
            let mut state = self.inner.state.lock().unwrap();
            let mut effective = page.max(1);
            if let Some(pagination) = &state.pagination {
                if pagination.total_pages > 0 && effective > pagination.total_pages {
                    debug!(
                        "{:<12} --> 페이지 보정: {} -> {}",
                        "ListQuery", effective, pagination.total_pages
                    );
                    effective = pagination.total_pages;
                }
            }
            state.query.page = effective;
        }
        Inner::spawn_fetch(&self.inner);
    }

    /// 현재 쿼리로 즉시 페치
    pub fn refresh(&self) {
        Inner::spawn_fetch(&self.inner);
    }

    /// 뷰 이탈: 디바운스 타이머 취소, 진행 중 페치 결과는 폐기되도록 시퀀스 증가
    pub fn teardown(&self) {
        if let Some(token) = self.inner.debounce.lock().unwrap().take() {
            token.cancel();
        }
        self.inner.seq.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.inner.state.lock().unwrap();
            state.load = LoadState::Idle;
        }
        self.inner.bump();
    }
}

impl<T: ListItem> Inner<T> {
    /// 페치 발행: 발행 시점의 시퀀스 태그를 결과에 붙인다
    fn spawn_fetch(inner: &Arc<Self>) {
        let tag = inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let query = {
            let mut state = inner.state.lock().unwrap();
            state.load = LoadState::Fetching;
            state.query.clone()
        };
        inner.bump();

        let task_inner = Arc::clone(inner);
        tokio::spawn(async move {
            let result = task_inner.fetcher.fetch(&query).await;
            Inner::apply_result(&task_inner, tag, &query, result);
        });
    }

    /// 결과 반영 (highest-sequence-wins)
    fn apply_result(
        inner: &Arc<Self>,
        tag: u64,
        issued: &ListQuery,
        result: Result<ListPage<T>, ApiError>,
    ) {
        let latest = inner.seq.load(Ordering::SeqCst);
        if tag < latest {
            debug!(
                "{:<12} --> 오래된 응답 폐기: seq {} < {}",
                "ListQuery", tag, latest
            );
            return;
        }

        let mut clamp_to = None;
        {
            let mut state = inner.state.lock().unwrap();
            match result {
                Ok(page) => {
                    state.items = apply_time_window(page.items, issued.filter_key.as_deref());
                    if let Some(pagination) = &page.pagination {
                        state.query.total_count = pagination.total;
                        // 범위를 벗어난 페이지를 요청했으면 마지막 페이지로 재발행
                        if pagination.total_pages > 0 && issued.page > pagination.total_pages {
                            clamp_to = Some(pagination.total_pages);
                        }
                    }
                    state.pagination = page.pagination;
                    state.load = LoadState::Loaded;
                }
                Err(e) => {
                    warn!("{:<12} --> 페치 실패: {}", "ListQuery", e);
                    state.load = LoadState::Error(e.user_message());
                }
            }
        }
        inner.bump();

        if let Some(page) = clamp_to {
            {
                let mut state = inner.state.lock().unwrap();
                state.query.page = page;
            }
            Inner::spawn_fetch(inner);
        }
    }

    fn bump(&self) {
        self.notify.send_modify(|v| *v += 1);
    }
}

/// 필터 키가 시간 구간이면 클라이언트 측에서 항목을 거른다
fn apply_time_window<T: ListItem>(items: Vec<T>, filter_key: Option<&str>) -> Vec<T> {
    let Some(window) = filter_key.and_then(TimeWindow::parse) else {
        return items;
    };
    let now = Utc::now();
    items
        .into_iter()
        .filter(|item| {
            item.reference_time()
                .map(|t| window.contains(t, now))
                .unwrap_or(false)
        })
        .collect()
}

// endregion: --- Pipeline
