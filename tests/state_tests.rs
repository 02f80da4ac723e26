use chrono::{Duration, Local, TimeZone, Utc};
use dealer_portal_core::auction::{derive_status, remaining_seconds, AuctionStatus, Mutation};
use dealer_portal_core::client::total_pages;
use dealer_portal_core::leaderboard::{rank, LeaderboardEntry};
use dealer_portal_core::list_query::TimeWindow;
use dealer_portal_core::session::{
    FileSessionBackend, MemorySessionBackend, Session, SessionBackend, SessionStore,
    StoredProfile, StoredTokens, User,
};
use std::sync::Arc;

fn test_user() -> User {
    User {
        id: 7,
        name: "테스트 딜러".to_string(),
        email: "dealer@example.com".to_string(),
        role: "dealer".to_string(),
    }
}

/// 남은 초는 시간이 흐를수록 감소하고 음수가 되지 않는다
#[test]
fn test_remaining_seconds_monotone() {
    let start = Utc::now();
    let ends = start + Duration::seconds(90);

    let mut previous = i64::MAX;
    for offset in [0, 30, 60, 89, 90, 91, 3600] {
        let now = start + Duration::seconds(offset);
        let remaining = remaining_seconds(ends, now);
        assert!(remaining >= 0);
        assert!(remaining <= previous, "남은 초가 증가함: offset={}", offset);
        previous = remaining;
    }
    assert_eq!(remaining_seconds(ends, ends + Duration::hours(1)), 0);
}

/// 상태 전이는 Scheduled -> Live -> Ended 단방향이며 Ended 는 되돌아오지 않는다
#[test]
fn test_status_transitions_one_way() {
    let start = Utc::now();
    let ends = start + Duration::minutes(10);

    assert_eq!(
        derive_status(start, ends, start - Duration::seconds(1)),
        AuctionStatus::Scheduled
    );
    // 경계: 시작 시각은 Live, 종료 시각은 Ended
    assert_eq!(derive_status(start, ends, start), AuctionStatus::Live);
    assert_eq!(derive_status(start, ends, ends), AuctionStatus::Ended);

    // Ended 이후 어떤 시점에서도 Ended
    let mut seen_ended = false;
    for offset in 0..30 {
        let now = start + Duration::minutes(offset);
        let status = derive_status(start, ends, now);
        if seen_ended {
            assert_eq!(status, AuctionStatus::Ended);
        }
        if status == AuctionStatus::Ended {
            seen_ended = true;
        }
    }
    assert!(seen_ended);
}

/// 낙관적 변경 3 상태의 표시 값
#[test]
fn test_mutation_tristate_value() {
    assert!(!Mutation::Confirmed(false).value());
    assert!(Mutation::Optimistic(true).value());
    assert!(!Mutation::Reverted(false).value());
    assert_ne!(Mutation::Optimistic(true), Mutation::Confirmed(true));
}

/// 역입찰 순위: 낮은 금액 우선, 동률은 먼저 제출한 쪽
#[test]
fn test_leaderboard_ranking() {
    let base = Utc::now();
    let entry = |bidder_id, amount, secs| LeaderboardEntry {
        bidder_id,
        amount,
        submitted_at: base + Duration::seconds(secs),
        rank: 0,
    };

    let ranked = rank(vec![
        entry(1, 500.0, 10),
        entry(2, 500.0, 5),
        entry(3, 450.0, 20),
    ]);

    let order: Vec<(i64, u32)> = ranked.iter().map(|e| (e.bidder_id, e.rank)).collect();
    assert_eq!(order, vec![(3, 1), (2, 2), (1, 3)]);
}

/// 전체 페이지 수: total=10, per_page=4 => 3
#[test]
fn test_total_pages() {
    assert_eq!(total_pages(10, 4), 3);
    assert_eq!(total_pages(12, 4), 3);
    assert_eq!(total_pages(13, 4), 4);
    assert_eq!(total_pages(0, 4), 0);
    assert_eq!(total_pages(10, 0), 0);
}

/// 시간 구간 필터 (로컬 타임존 기준, 고정 기준 시각으로 평가)
#[test]
fn test_time_windows() {
    // 2026-08-15 는 토요일, 가장 최근 일요일은 08-09
    let now = Local
        .with_ymd_and_hms(2026, 8, 15, 12, 0, 0)
        .single()
        .expect("로컬 기준 시각 생성 실패")
        .with_timezone(&Utc);
    let local = |y, mo, d, h| {
        Local
            .with_ymd_and_hms(y, mo, d, h, 30, 0)
            .single()
            .expect("로컬 시각 생성 실패")
            .with_timezone(&Utc)
    };

    // today = [로컬 자정, +24h)
    assert!(TimeWindow::Today.contains(local(2026, 8, 15, 0), now));
    assert!(TimeWindow::Today.contains(local(2026, 8, 15, 23), now));
    assert!(!TimeWindow::Today.contains(local(2026, 8, 14, 23), now));
    assert!(!TimeWindow::Today.contains(local(2026, 8, 16, 0), now));

    // thisWeek = [08-09 자정, 08-16 자정)
    assert!(TimeWindow::ThisWeek.contains(local(2026, 8, 9, 0), now));
    assert!(TimeWindow::ThisWeek.contains(local(2026, 8, 15, 23), now));
    assert!(!TimeWindow::ThisWeek.contains(local(2026, 8, 8, 23), now));
    assert!(!TimeWindow::ThisWeek.contains(local(2026, 8, 16, 0), now));

    // thisMonth = [08-01 자정, +30d) 고정 30일 구간 (08-31 은 제외)
    assert!(TimeWindow::ThisMonth.contains(local(2026, 8, 1, 0), now));
    assert!(TimeWindow::ThisMonth.contains(local(2026, 8, 30, 23), now));
    assert!(!TimeWindow::ThisMonth.contains(local(2026, 7, 31, 23), now));
    assert!(!TimeWindow::ThisMonth.contains(local(2026, 8, 31, 1), now));

    // passed = now 보다 엄격히 이전
    assert!(TimeWindow::Passed.contains(now - Duration::seconds(1), now));
    assert!(!TimeWindow::Passed.contains(now, now));
    assert!(!TimeWindow::Passed.contains(now + Duration::hours(1), now));

    // 필터 키 해석
    assert_eq!(TimeWindow::parse("thisWeek"), Some(TimeWindow::ThisWeek));
    assert_eq!(TimeWindow::parse("passed"), Some(TimeWindow::Passed));
    assert_eq!(TimeWindow::parse("make"), None);
}

/// 세션 저장소: 저장 / 복원 / 파기, 레코드 일부만 있으면 로그아웃 상태
#[tokio::test]
async fn test_session_store_lifecycle() {
    let backend = Arc::new(MemorySessionBackend::default());
    let store = SessionStore::new(backend.clone());
    store.init().await.expect("초기화 실패");
    assert!(store.current().is_none());
    assert!(store.is_past_expiry());

    let session = Session {
        token: "token-1".to_string(),
        user: test_user(),
        expires_at_epoch_ms: Utc::now().timestamp_millis() + 60_000,
        refresh_token: Some("refresh-1".to_string()),
    };
    store.set_session(session.clone()).await.expect("저장 실패");
    assert_eq!(store.token().as_deref(), Some("token-1"));
    assert!(!store.is_past_expiry());

    // teardown 은 메모리만 비우고 영속 레코드는 유지
    store.teardown();
    assert!(store.current().is_none());
    store.init().await.expect("재초기화 실패");
    assert_eq!(store.current(), Some(session));

    // clear 는 영속 레코드까지 파기
    store.clear().await.expect("파기 실패");
    store.init().await.expect("재초기화 실패");
    assert!(store.current().is_none());
}

/// 파일 백엔드: 프로필과 토큰은 서로 다른 파일, 한쪽만 있으면 세션 없음
#[tokio::test]
async fn test_file_backend_partial_record() {
    let dir = tempfile::tempdir().expect("임시 디렉터리 생성 실패");
    let backend = Arc::new(FileSessionBackend::new(dir.path()));

    let profile = StoredProfile {
        user: test_user(),
        expires_at_epoch_ms: Utc::now().timestamp_millis() + 60_000,
    };
    let tokens = StoredTokens {
        access_token: "token-1".to_string(),
        refresh_token: None,
    };
    backend.save(&profile, &tokens).await.expect("저장 실패");

    let store = SessionStore::new(backend.clone());
    store.init().await.expect("초기화 실패");
    assert!(store.current().is_some());

    // 토큰 파일만 제거하면 로그아웃 상태로 복원된다
    tokio::fs::remove_file(dir.path().join("tokens.json"))
        .await
        .expect("토큰 파일 제거 실패");
    let store2 = SessionStore::new(backend);
    store2.init().await.expect("초기화 실패");
    assert!(store2.current().is_none());
}

/// 세션 변경 구독 알림
#[tokio::test]
async fn test_session_subscribe_notify() {
    let store = SessionStore::new(Arc::new(MemorySessionBackend::default()));
    let mut rx = store.subscribe();

    store
        .set_session(Session {
            token: "token-1".to_string(),
            user: test_user(),
            expires_at_epoch_ms: Utc::now().timestamp_millis() + 60_000,
            refresh_token: None,
        })
        .await
        .expect("저장 실패");

    rx.changed().await.expect("알림 수신 실패");
    assert!(rx.borrow().is_some());

    store.clear().await.expect("파기 실패");
    rx.changed().await.expect("알림 수신 실패");
    assert!(rx.borrow().is_none());
}
