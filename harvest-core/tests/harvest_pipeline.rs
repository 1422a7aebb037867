mod common;

use std::sync::Arc;
use std::time::Duration;

use harvest_core::browser::OverlaySnapshot;
use harvest_core::harvest::{
    ExtractionStatus, FeedKind, HarvestError, HarvestPipeline, HarvestRequest, SessionCredential,
    SessionMode, TargetHandle, TerminationReason,
};

use common::{
    post_href, post_hrefs, post_key, snapshot, test_config, FeedScript, ItemBehavior,
    ScriptedFactory, BASE_URL,
};

fn pipeline(factory: &Arc<ScriptedFactory>) -> HarvestPipeline {
    pipeline_with(factory, test_config())
}

fn pipeline_with(
    factory: &Arc<ScriptedFactory>,
    config: harvest_core::HarvestConfig,
) -> HarvestPipeline {
    HarvestPipeline::new(Arc::new(config), factory.clone())
}

fn request(max_items: usize) -> HarvestRequest {
    HarvestRequest::new("@Someone", FeedKind::Posts, max_items, None).unwrap()
}

fn authenticated_request(max_items: usize) -> HarvestRequest {
    let credential = SessionCredential::new("token-123");
    HarvestRequest::new("someone", FeedKind::Posts, max_items, credential).unwrap()
}

fn with_counted_items(mut script: FeedScript, ids: std::ops::RangeInclusive<usize>) -> FeedScript {
    for i in ids {
        let segment = post_href(&format!("P{i}"));
        script = script.item(
            &segment,
            ItemBehavior::Found(snapshot(&format!("caption {i}"), "12 likes 3 comments")),
        );
    }
    script
}

#[tokio::test]
async fn first_query_above_target_stops_immediately() {
    let script = with_counted_items(FeedScript::with_batches(vec![post_hrefs(1..=15)]), 1..=15);
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(10)).await.unwrap();

    assert_eq!(report.termination, TerminationReason::TargetReached);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.discovered, 15);
    assert_eq!(report.records.len(), 10);
    for (index, record) in report.records.iter().enumerate() {
        assert_eq!(record.item.sequence_number, index + 1);
        assert_eq!(record.item.identity_key, post_key(&format!("P{}", index + 1)));
        assert_eq!(record.item.status, ExtractionStatus::Primary);
        assert_eq!(record.item.likes_raw.as_deref(), Some("12"));
        assert_eq!(record.item.comments_raw.as_deref(), Some("3"));
    }

    let recorder = factory.recorder.lock().unwrap();
    assert!(recorder.load_more.is_empty());
    assert!(recorder.focused.is_empty());
    assert_eq!(recorder.released, 1);
}

#[tokio::test]
async fn exhausted_feed_exits_on_stagnation() {
    let script = with_counted_items(FeedScript::with_batches(vec![post_hrefs(1..=5)]), 1..=5);
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(20)).await.unwrap();

    assert_eq!(report.termination, TerminationReason::StagnationExit);
    assert_eq!(report.discovered, 5);
    assert_eq!(report.records.len(), 5);
    assert_eq!(report.attempts, 4);
    assert_eq!(report.success_count(), 5);

    let recorder = factory.recorder.lock().unwrap();
    assert_eq!(recorder.collect_calls, 4);
    assert_eq!(recorder.load_more.len(), 3);
    assert_eq!(
        recorder.waits,
        vec![
            Duration::from_millis(600),
            Duration::from_millis(650),
            Duration::from_millis(700)
        ]
    );
}

#[tokio::test]
async fn growing_feed_stops_at_attempt_cap() {
    let batches = (1..=50).map(|n| post_hrefs(1..=n)).collect();
    let factory = Arc::new(ScriptedFactory::new(FeedScript::with_batches(batches)));
    let mut config = test_config();
    config.discovery.posts.max_attempts = 5;

    let report = pipeline_with(&factory, config).run(request(1000)).await.unwrap();

    assert_eq!(report.termination, TerminationReason::BudgetExhausted);
    assert!(report.attempts <= 6);
    assert_eq!(report.discovered, 5);
    assert_eq!(report.records.len(), 5);
    assert_eq!(factory.recorder.lock().unwrap().collect_calls, 5);
}

#[tokio::test]
async fn duplicate_and_foreign_links_are_collapsed() {
    let mut batch = post_hrefs(1..=3);
    batch.push(format!("{BASE_URL}/p/P1/?img_index=2"));
    batch.push("/p/P2/#comments".to_string());
    batch.push("/explore/tags/food/".to_string());
    let script = with_counted_items(FeedScript::with_batches(vec![batch]), 1..=3);
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(10)).await.unwrap();

    let keys: Vec<_> = report
        .records
        .iter()
        .map(|record| record.item.identity_key.clone())
        .collect();
    assert_eq!(keys, vec![post_key("P1"), post_key("P2"), post_key("P3")]);
}

#[tokio::test]
async fn stale_credential_fails_before_feed_navigation() {
    let mut script = FeedScript::with_batches(vec![post_hrefs(1..=5)]);
    script.present_selectors = vec!["input[name=\"username\"]".to_string()];
    let factory = Arc::new(ScriptedFactory::new(script));

    let err = pipeline(&factory)
        .run(authenticated_request(5))
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Authentication { .. }));
    assert_eq!(err.status_hint(), 401);
    let recorder = factory.recorder.lock().unwrap();
    assert_eq!(recorder.opened, 1);
    assert_eq!(recorder.released, 1);
    assert!(!recorder.visited.iter().any(|url| url.contains("someone")));
    assert_eq!(recorder.collect_calls, 0);
}

#[tokio::test]
async fn login_redirect_counts_as_rejection() {
    let mut script = FeedScript::with_batches(vec![post_hrefs(1..=5)]);
    script.current_url = format!("{BASE_URL}/accounts/login/?next=%2F");
    let factory = Arc::new(ScriptedFactory::new(script));

    let err = pipeline(&factory)
        .run(authenticated_request(5))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "AUTHENTICATION_FAILED");
    assert_eq!(factory.recorder.lock().unwrap().released, 1);
}

#[tokio::test]
async fn accepted_credential_seeds_cookies_and_authenticates() {
    let mut script =
        with_counted_items(FeedScript::with_batches(vec![post_hrefs(1..=2)]), 1..=2);
    script.present_selectors = vec!["a[href=\"/direct/inbox/\"]".to_string()];
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(authenticated_request(2)).await.unwrap();

    assert_eq!(report.mode, SessionMode::Authenticated);
    let recorder = factory.recorder.lock().unwrap();
    let names: Vec<_> = recorder.cookies.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["sessionid", "csrftoken"]);
    assert_eq!(recorder.cookies[0].value, "token-123");
    assert_eq!(recorder.visited.first().map(String::as_str), Some(BASE_URL));
    assert_eq!(
        recorder.visited.last().map(String::as_str),
        Some("https://www.instagram.com/someone/")
    );
}

#[tokio::test]
async fn guest_mode_skips_cookies() {
    let script = with_counted_items(FeedScript::with_batches(vec![post_hrefs(1..=2)]), 1..=2);
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(2)).await.unwrap();

    assert_eq!(report.mode, SessionMode::Guest);
    assert_eq!(report.metrics.pages_opened, 1);
    let recorder = factory.recorder.lock().unwrap();
    assert!(recorder.cookies.is_empty());
    assert_eq!(recorder.visited, vec!["https://www.instagram.com/someone/"]);
}

#[tokio::test]
async fn private_target_never_reaches_discovery() {
    let mut script = FeedScript::with_batches(vec![post_hrefs(1..=5)]);
    script.page_text = "someone\nThis Account is Private\nFollow to see their photos".into();
    let factory = Arc::new(ScriptedFactory::new(script));

    let err = pipeline(&factory).run(request(5)).await.unwrap_err();

    assert!(matches!(err, HarvestError::PrivateProfile { ref handle } if handle == "someone"));
    let recorder = factory.recorder.lock().unwrap();
    assert_eq!(recorder.collect_calls, 0);
    assert_eq!(recorder.released, 1);
}

#[tokio::test]
async fn missing_target_is_reported() {
    let mut script = FeedScript::with_batches(vec![]);
    script.page_text = "Sorry, this page isn't available.".into();
    let factory = Arc::new(ScriptedFactory::new(script));

    let err = pipeline(&factory).run(request(5)).await.unwrap_err();

    assert_eq!(err.code(), "PROFILE_NOT_FOUND");
    assert_eq!(factory.recorder.lock().unwrap().released, 1);
}

#[tokio::test]
async fn feed_timeout_is_classified_and_session_released() {
    let mut script = FeedScript::with_batches(vec![post_hrefs(1..=5)]);
    script.timeout_on = Some("/someone/".to_string());
    let factory = Arc::new(ScriptedFactory::new(script));

    let err = pipeline(&factory).run(request(5)).await.unwrap_err();

    match err {
        HarvestError::NavigationTimeout { url, timeout_secs } => {
            assert_eq!(url, "https://www.instagram.com/someone/");
            assert_eq!(timeout_secs, 20);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(factory.recorder.lock().unwrap().released, 1);
}

#[tokio::test]
async fn broken_surface_during_discovery_ends_run() {
    let mut script = FeedScript::with_batches(vec![post_hrefs(1..=2), post_hrefs(1..=4)]);
    script.fail_collect_at = Some(2);
    let factory = Arc::new(ScriptedFactory::new(script));

    let err = pipeline(&factory).run(request(10)).await.unwrap_err();

    assert_eq!(err.code(), "SCRAPING_FAILED");
    assert_eq!(factory.recorder.lock().unwrap().released, 1);
}

#[tokio::test]
async fn launch_failure_has_nothing_to_release() {
    let mut script = FeedScript::with_batches(vec![]);
    script.fail_open = true;
    let factory = Arc::new(ScriptedFactory::new(script));

    let err = pipeline(&factory).run(request(5)).await.unwrap_err();

    assert!(matches!(err, HarvestError::Browser(_)));
    let recorder = factory.recorder.lock().unwrap();
    assert_eq!(recorder.opened, 0);
    assert_eq!(recorder.released, 0);
}

#[tokio::test]
async fn failing_item_is_isolated() {
    let script = with_counted_items(FeedScript::with_batches(vec![post_hrefs(1..=5)]), 1..=5)
        .item(&post_href("P3"), ItemBehavior::Broken);
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(5)).await.unwrap();

    assert_eq!(report.records.len(), 5);
    let third = &report.records[2];
    assert_eq!(third.item.sequence_number, 3);
    assert_eq!(third.item.identity_key, post_key("P3"));
    assert_eq!(third.item.status, ExtractionStatus::Failed);
    assert!(!third.success);
    assert!(third.item.thumbnail.is_none());
    assert!(third.item.text.is_none());
    assert!(third.item.likes_raw.is_none());
    assert!(third.item.comments_raw.is_none());
    for index in [0, 1, 3, 4] {
        let record = &report.records[index];
        assert!(record.success);
        assert_eq!(record.item.status, ExtractionStatus::Primary);
        assert_eq!(record.item.text.as_deref(), Some(format!("caption {}", index + 1).as_str()));
    }
    assert_eq!(report.metrics.items_failed, 1);
    assert_eq!(report.metrics.items_extracted, 5);
}

#[tokio::test]
async fn overlay_fills_missing_counts() {
    let segment = post_href("P1");
    let script = FeedScript::with_batches(vec![vec![segment.clone()]])
        .item(&segment, ItemBehavior::Found(snapshot("sunset", "")))
        .overlay(
            &segment,
            OverlaySnapshot {
                entries: Some(vec!["1.2K".into(), "48".into()]),
                tokens: vec![],
            },
        );
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(1)).await.unwrap();

    let record = &report.records[0];
    assert_eq!(record.item.status, ExtractionStatus::FallbackEnriched);
    assert_eq!(record.item.likes_raw.as_deref(), Some("1.2K"));
    assert_eq!(record.item.comments_raw.as_deref(), Some("48"));
    assert_eq!(record.likes(), Some(1200));
    assert_eq!(record.item.thumbnail.as_deref(), Some("https://cdn.example/sunset.jpg"));
    assert_eq!(record.item.text.as_deref(), Some("sunset"));

    let recorder = factory.recorder.lock().unwrap();
    assert_eq!(recorder.focused, vec![segment]);
    assert_eq!(recorder.waits, vec![Duration::from_millis(800)]);
    assert_eq!(report.metrics.focus_simulations, 1);
}

#[tokio::test]
async fn empty_overlay_leaves_primary_result() {
    let segment = post_href("P1");
    let script = FeedScript::with_batches(vec![vec![segment.clone()]])
        .item(&segment, ItemBehavior::Found(snapshot("sunset", "")))
        .overlay(&segment, OverlaySnapshot::default());
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(1)).await.unwrap();

    let record = &report.records[0];
    assert_eq!(record.item.status, ExtractionStatus::Primary);
    assert!(record.item.likes_raw.is_none());
    assert!(record.item.comments_raw.is_none());
    assert!(record.success);
    assert_eq!(report.metrics.overlay_reads, 1);
}

#[tokio::test]
async fn token_scan_used_when_overlay_incomplete() {
    let segment = post_href("P1");
    let script = FeedScript::with_batches(vec![vec![segment.clone()]])
        .item(&segment, ItemBehavior::Found(snapshot("sunset", "931 likes")))
        .overlay(
            &segment,
            OverlaySnapshot {
                entries: Some(vec!["931".into()]),
                tokens: vec!["Follow".into(), "931".into(), "17".into()],
            },
        );
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(1)).await.unwrap();

    let item = &report.records[0].item;
    assert_eq!(item.likes_raw.as_deref(), Some("931"));
    assert_eq!(item.comments_raw.as_deref(), Some("17"));
    assert_eq!(item.status, ExtractionStatus::FallbackEnriched);
}

#[tokio::test]
async fn fallback_runs_only_for_items_missing_counts() {
    let script = FeedScript::with_batches(vec![post_hrefs(1..=4)])
        .item(&post_href("P1"), ItemBehavior::Found(snapshot("a", "5 likes 1 comment")))
        .item(&post_href("P2"), ItemBehavior::Found(snapshot("b", "5 likes")))
        .item(&post_href("P3"), ItemBehavior::Missing)
        .item(&post_href("P4"), ItemBehavior::Found(snapshot("d", "2 comments 9 likes")));
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(4)).await.unwrap();

    let recorder = factory.recorder.lock().unwrap();
    assert_eq!(recorder.focused, vec![post_href("P2"), post_href("P3")]);
    assert_eq!(report.records[2].item.status, ExtractionStatus::Partial);
    assert!(report.records[2].success);
    assert_eq!(report.records[1].item.status, ExtractionStatus::Primary);
    assert_eq!(report.metrics.items_partial, 1);
    assert_eq!(report.metrics.focus_simulations, 0);
    assert_eq!(report.metrics.overlay_reads, 0);
}

#[tokio::test]
async fn unlocated_item_enriched_by_overlay() {
    let segment = post_href("P1");
    let script = FeedScript::with_batches(vec![vec![segment.clone()]])
        .item(&segment, ItemBehavior::Missing)
        .overlay(
            &segment,
            OverlaySnapshot {
                entries: Some(vec!["640".into(), "12".into()]),
                tokens: vec![],
            },
        );
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(1)).await.unwrap();

    let record = &report.records[0];
    assert_eq!(record.item.status, ExtractionStatus::FallbackEnriched);
    assert!(record.success);
    assert!(record.item.thumbnail.is_none());
    assert!(record.item.text.is_none());
    assert_eq!(record.likes(), Some(640));
    assert_eq!(record.comments(), Some(12));
    assert_eq!(report.metrics.items_partial, 0);
    assert_eq!(report.metrics.items_enriched, 1);
}

#[tokio::test]
async fn lone_overlay_count_fills_likes() {
    let segment = post_href("P1");
    let script = FeedScript::with_batches(vec![vec![segment.clone()]])
        .item(&segment, ItemBehavior::Found(snapshot("sunset", "")))
        .overlay(
            &segment,
            OverlaySnapshot {
                entries: Some(vec!["1.2K".into()]),
                tokens: vec!["1.2K".into()],
            },
        );
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(1)).await.unwrap();

    let item = &report.records[0].item;
    assert_eq!(item.likes_raw.as_deref(), Some("1.2K"));
    assert!(item.comments_raw.is_none());
    assert_eq!(item.status, ExtractionStatus::FallbackEnriched);
}

#[tokio::test]
async fn overlay_count_is_not_replaced_by_surface_tokens() {
    let segment = post_href("P1");
    let script = FeedScript::with_batches(vec![vec![segment.clone()]])
        .item(&segment, ItemBehavior::Found(snapshot("sunset", "")))
        .overlay(
            &segment,
            OverlaySnapshot {
                entries: Some(vec!["1.2K".into()]),
                tokens: vec!["87".into(), "5".into()],
            },
        );
    let factory = Arc::new(ScriptedFactory::new(script));

    let report = pipeline(&factory).run(request(1)).await.unwrap();

    let item = &report.records[0].item;
    assert_eq!(item.likes_raw.as_deref(), Some("1.2K"));
    assert_eq!(item.comments_raw.as_deref(), Some("5"));
    assert_eq!(item.status, ExtractionStatus::FallbackEnriched);
}

#[tokio::test]
async fn reels_use_their_own_tuning() {
    let hrefs: Vec<String> = (1..=3).map(|i| format!("/someone/reel/R{i}/")).collect();
    let factory = Arc::new(ScriptedFactory::new(FeedScript::with_batches(vec![hrefs])));
    let request = HarvestRequest::new("someone", FeedKind::Reels, 10, None).unwrap();

    let report = pipeline(&factory).run(request).await.unwrap();

    assert_eq!(report.termination, TerminationReason::StagnationExit);
    assert_eq!(report.records.len(), 3);
    assert_eq!(
        report.records[0].item.identity_key,
        "https://www.instagram.com/someone/reel/R1/"
    );
    let recorder = factory.recorder.lock().unwrap();
    assert_eq!(recorder.visited, vec!["https://www.instagram.com/someone/reels/"]);
    assert_eq!(
        recorder.waits[..3],
        [
            Duration::from_millis(2000),
            Duration::from_millis(2100),
            Duration::from_millis(2200)
        ]
    );
    assert_eq!(
        recorder.lookups,
        vec!["/reel/R1/", "/reel/R2/", "/reel/R3/"]
    );
}

#[tokio::test]
async fn private_profile_is_summarized_not_rejected() {
    let mut script = FeedScript::with_batches(vec![]);
    script.page_text = "This Account is Private".into();
    script.header.text = "someone 12 posts 1.5K followers 300 following".into();
    let factory = Arc::new(ScriptedFactory::new(script));
    let target = TargetHandle::parse("someone").unwrap();

    let summary = pipeline(&factory)
        .inspect_profile(&target, None)
        .await
        .unwrap();

    assert!(summary.private);
    assert_eq!(summary.posts, Some(12));
    assert_eq!(summary.followers, Some(1500));
    assert_eq!(summary.following, Some(300));
    assert_eq!(factory.recorder.lock().unwrap().released, 1);
}
