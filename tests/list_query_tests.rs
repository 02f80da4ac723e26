use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dealer_portal_core::client::Pagination;
use dealer_portal_core::error::ApiError;
use dealer_portal_core::list_query::{
    ListFetcher, ListItem, ListPage, ListQuery, ListQueryPipeline, LoadState,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

/// 테스트용 리스트 항목
#[derive(Debug, Clone, PartialEq)]
struct Row {
    name: String,
    at: Option<DateTime<Utc>>,
}

impl Row {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            at: None,
        }
    }
}

impl ListItem for Row {
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.at
    }
}

fn page_of(items: Vec<Row>, total: u64) -> ListPage<Row> {
    let per_page = 4;
    let total_pages = dealer_portal_core::client::total_pages(total, per_page);
    ListPage {
        items,
        pagination: Some(Pagination {
            current_page: 1,
            per_page,
            total,
            total_pages,
            has_next: total_pages > 1,
            has_prev: false,
        }),
    }
}

/// 호출 기록과 지연 응답 큐를 가진 스텁 페처
struct StubFetcher {
    calls: Mutex<Vec<ListQuery>>,
    // (지연 ms, 응답). 큐가 비면 빈 Loaded 페이지를 돌려준다.
    responses: Mutex<VecDeque<(u64, ListPage<Row>)>>,
}

impl StubFetcher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
        })
    }

    fn push_response(&self, delay_ms: u64, page: ListPage<Row>) {
        self.responses.lock().unwrap().push_back((delay_ms, page));
    }

    fn calls(&self) -> Vec<ListQuery> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListFetcher<Row> for StubFetcher {
    async fn fetch(&self, query: &ListQuery) -> Result<ListPage<Row>, ApiError> {
        self.calls.lock().unwrap().push(query.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some((delay_ms, page)) => {
                sleep(Duration::from_millis(delay_ms)).await;
                Ok(page)
            }
            None => Ok(page_of(Vec::new(), 0)),
        }
    }
}

/// "Ford" 를 한 글자씩 입력해도 페치는 정확히 한 번, search="Ford"
#[tokio::test(start_paused = true)]
async fn test_debounce_single_fetch() {
    let fetcher = StubFetcher::new();
    let pipeline = ListQueryPipeline::new(fetcher.clone(), 10);

    for text in ["F", "Fo", "For", "Ford"] {
        pipeline.set_search_text(text);
    }
    assert_eq!(pipeline.load_state(), LoadState::Searching);
    assert!(pipeline.is_busy());

    // 디바운스 500ms 경과 대기
    sleep(Duration::from_millis(700)).await;

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 1, "페치가 한 번만 발행되어야 함");
    assert_eq!(calls[0].search_text, "Ford");
    assert_eq!(calls[0].page, 1);
    assert_eq!(pipeline.load_state(), LoadState::Loaded);
}

/// 먼저 발행된 페치가 나중에 도착하면 폐기된다 (highest-sequence-wins)
#[tokio::test(start_paused = true)]
async fn test_stale_response_discard() {
    let fetcher = StubFetcher::new();
    // A (seq=1) 는 500ms 뒤에, B (seq=2) 는 10ms 뒤에 도착
    fetcher.push_response(500, page_of(vec![Row::named("A")], 1));
    fetcher.push_response(10, page_of(vec![Row::named("B")], 1));

    let pipeline = ListQueryPipeline::new(fetcher.clone(), 10);
    pipeline.refresh();
    pipeline.refresh();

    sleep(Duration::from_millis(1_000)).await;

    let names: Vec<String> = pipeline.items().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["B".to_string()], "최신 발행분만 반영되어야 함");
    assert_eq!(pipeline.load_state(), LoadState::Loaded);
}

/// total=10, per_page=4 => total_pages=3, page=5 요청은 3 으로 보정
#[tokio::test(start_paused = true)]
async fn test_page_clamp_to_total_pages() {
    let fetcher = StubFetcher::new();
    let pipeline = ListQueryPipeline::new(fetcher.clone(), 4);

    // 첫 페치로 서버 페이지 정보를 확보
    pipeline.refresh();
    sleep(Duration::from_millis(50)).await;

    pipeline.set_page(5);
    sleep(Duration::from_millis(50)).await;

    assert_eq!(pipeline.query().page, 3);
    let calls = fetcher.calls();
    assert_eq!(calls.last().map(|q| q.page), Some(3));
}

async fn warm_pagination(fetcher: &Arc<StubFetcher>, pipeline: &ListQueryPipeline<Row>) {
    fetcher.push_response(0, page_of(Vec::new(), 10));
    pipeline.refresh();
    sleep(Duration::from_millis(50)).await;
}

/// 페이지 정보 없이 범위를 벗어난 페이지를 요청하면 응답 후 마지막 페이지로 재발행
#[tokio::test(start_paused = true)]
async fn test_out_of_range_page_refetches_last() {
    let fetcher = StubFetcher::new();
    fetcher.push_response(0, page_of(Vec::new(), 10));
    fetcher.push_response(0, page_of(Vec::new(), 10));

    let pipeline = ListQueryPipeline::new(fetcher.clone(), 4);
    // 아직 pagination 을 모르는 상태에서 page=5 요청
    pipeline.set_page(5);
    sleep(Duration::from_millis(100)).await;

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].page, 5);
    assert_eq!(calls[1].page, 3);
    assert_eq!(pipeline.query().page, 3);
}

/// 검색어 / 필터 변경은 페이지를 1 로 리셋한다
#[tokio::test(start_paused = true)]
async fn test_search_and_filter_reset_page() {
    let fetcher = StubFetcher::new();
    let pipeline = ListQueryPipeline::new(fetcher.clone(), 4);
    warm_pagination(&fetcher, &pipeline).await;

    pipeline.set_page(2);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(pipeline.query().page, 2);

    pipeline.set_filter_key(Some("make".to_string()));
    assert_eq!(pipeline.query().page, 1);

    pipeline.set_page(2);
    sleep(Duration::from_millis(50)).await;
    pipeline.set_search_text("Ford");
    assert_eq!(pipeline.query().page, 1);

    // 정렬 변경은 페이지를 유지한다
    sleep(Duration::from_millis(700)).await;
    pipeline.set_page(2);
    sleep(Duration::from_millis(50)).await;
    pipeline.set_sort_key(Some("ends_at".to_string()));
    assert_eq!(pipeline.query().page, 2);
}

/// teardown 은 디바운스 타이머를 취소하고 진행 중 결과를 폐기한다
#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_pending_work() {
    let fetcher = StubFetcher::new();
    let pipeline = ListQueryPipeline::new(fetcher.clone(), 10);

    // 디바운스 대기 중 teardown -> 페치 자체가 발행되지 않음
    pipeline.set_search_text("Ford");
    pipeline.teardown();
    sleep(Duration::from_millis(700)).await;
    assert!(fetcher.calls().is_empty());
    assert_eq!(pipeline.load_state(), LoadState::Idle);

    // 진행 중 페치도 teardown 이후 도착하면 폐기
    fetcher.push_response(200, page_of(vec![Row::named("A")], 1));
    pipeline.refresh();
    pipeline.teardown();
    sleep(Duration::from_millis(500)).await;
    assert!(pipeline.items().is_empty());
    assert_eq!(pipeline.load_state(), LoadState::Idle);
}

/// 시간 구간 필터 키는 클라이언트 측에서 항목을 거른다
#[tokio::test(start_paused = true)]
async fn test_time_window_filter_applied_client_side() {
    let now = Utc::now();
    let fetcher = StubFetcher::new();
    fetcher.push_response(
        0,
        page_of(
            vec![
                Row {
                    name: "지난 예약".to_string(),
                    at: Some(now - ChronoDuration::hours(1)),
                },
                Row {
                    name: "다가올 예약".to_string(),
                    at: Some(now + ChronoDuration::hours(1)),
                },
                Row::named("시각 없음"),
            ],
            3,
        ),
    );

    let pipeline = ListQueryPipeline::new(fetcher.clone(), 10);
    pipeline.set_filter_key(Some("passed".to_string()));
    sleep(Duration::from_millis(50)).await;

    let names: Vec<String> = pipeline.items().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["지난 예약".to_string()]);
}

/// 페치 실패는 Error 상태와 짧은 사용자 메시지로 귀결된다
#[tokio::test(start_paused = true)]
async fn test_fetch_error_state() {
    struct FailingFetcher;

    #[async_trait]
    impl ListFetcher<Row> for FailingFetcher {
        async fn fetch(&self, _query: &ListQuery) -> Result<ListPage<Row>, ApiError> {
            Err(ApiError::Server(503))
        }
    }

    let pipeline = ListQueryPipeline::new(Arc::new(FailingFetcher), 10);
    pipeline.refresh();
    sleep(Duration::from_millis(50)).await;

    match pipeline.load_state() {
        LoadState::Error(message) => assert!(!message.is_empty()),
        other => panic!("Error 상태가 아님: {:?}", other),
    }
}
