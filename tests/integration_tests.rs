//! Integration tests for vscode-chat-insights.
//!
//! These tests run the full scan, transform and analytics pipeline over
//! synthetic `workspaceStorage` trees.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use vscode_chat_insights::analytics::{AnalyticsEngine, AnalyticsQuery, DateRange};
use vscode_chat_insights::config::{CacheConfig, ScannerConfig};
use vscode_chat_insights::model::EventType;
use vscode_chat_insights::scanner::SessionScanner;
use vscode_chat_insights::service::UnifiedSessionService;
use vscode_chat_insights::store::{JsonFileStore, MemoryStore, Settings};
use vscode_chat_insights::transform::{event_id, Transformer};

mod generators;

use generators::{SessionConfig, StorageFixture};

fn scanner_for(fixture: &StorageFixture) -> SessionScanner {
    SessionScanner::new(fixture.roots(), ScannerConfig::default())
}

/// Service with retention disabled so fixed historical dates survive.
fn service_for(fixture: &StorageFixture) -> UnifiedSessionService {
    let store = Arc::new(MemoryStore::new());
    Settings {
        auto_cleanup: false,
        ..Settings::default()
    }
    .save(store.as_ref())
    .unwrap();
    UnifiedSessionService::with_scanner(scanner_for(fixture), store).unwrap()
}

mod scanning {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_oversized_file_is_not_counted() {
        let fixture = StorageFixture::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        for (i, id) in ["aa01", "aa02", "aa03"].iter().enumerate() {
            fixture.write_session("ws1", &SessionConfig::new(id, 2, start + Duration::hours(i as i64)));
        }
        let big = serde_json::to_vec(&generators::session(&SessionConfig::new("bb01", 200, start))).unwrap();
        fixture.write_raw("ws1", "bb01.json", &big);

        let config = ScannerConfig {
            max_file_size: 4 * 1024,
            ..ScannerConfig::default()
        };
        let scanner = SessionScanner::new(fixture.roots(), config);
        let (results, stats) = scanner.scan_all().await;

        assert_eq!(stats.scanned_files, 3);
        assert_eq!(stats.skipped_files, 1);
        assert_eq!(stats.parsed_sessions, 3);
        assert_eq!(results.len(), 3);
        assert_eq!(stats.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_transcripts_are_skipped() {
        let fixture = StorageFixture::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        fixture.write_session("ws1", &SessionConfig::new("aa01", 2, start));
        fixture.write_raw("ws1", "cc01.json", b"{ not json");
        fixture.write_raw("ws2", "cc02.json", br#"{"sessionId": "", "creationDate": 1, "version": 1}"#);
        fixture.write_raw("ws2", "notes.txt", b"ignored");

        let (results, stats) = scanner_for(&fixture).scan_all().await;

        assert_eq!(results.len(), 1);
        assert_eq!(stats.error_files, 2);
        assert_eq!(stats.scanned_files, 3);
    }

    #[tokio::test]
    async fn test_missing_root_is_a_diagnostic() {
        let fixture = StorageFixture::new();
        let scanner = SessionScanner::new(
            vec![fixture.root(), fixture.scratch("does-not-exist")],
            ScannerConfig::default(),
        );
        let (results, stats) = scanner.scan_all().await;

        assert!(results.is_empty());
        assert_eq!(stats.roots_scanned, 1);
        assert_eq!(stats.diagnostics.len(), 1);
    }
}

mod transforming {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_events_carry_hierarchy_and_language() {
        let fixture = StorageFixture::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        fixture.write_session("3f2a9c", &SessionConfig::new("aa01", 4, start));

        let (results, _) = scanner_for(&fixture).scan_all().await;
        let events = Transformer::default().transform_all(&results);

        assert_eq!(events.len(), 4);
        let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![EventType::Edit, EventType::Explain, EventType::Completion, EventType::Chat]
        );

        let first = &events[0];
        assert_eq!(first.id, event_id("aa01", "request_0"));
        assert_eq!(first.workspace_id, "3f2a9c");
        assert_eq!(first.hierarchy.instance_id, "instance-2024050609");
        assert!(first.hierarchy.window_id.as_deref().unwrap().starts_with("window-"));
        assert_eq!(first.language.as_deref(), Some("rust"));
        assert!(first.file_name.as_deref().unwrap().ends_with(".rs"));
        assert!(!first.file_name.as_deref().unwrap().contains("lib"));
        assert_eq!(first.duration_ms, Some(1_200));
        assert_eq!(first.prompt_text, None);
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() {
        let fixture = StorageFixture::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        fixture.write_session("ws1", &SessionConfig::new("aa01", 3, start));
        fixture.write_session("ws2", &SessionConfig::new("aa02", 2, start + Duration::days(1)));
        let service = service_for(&fixture);

        let (first, _) = service.scan_all_data().await.unwrap();
        let (second, _) = service.scan_all_data().await.unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }
}

mod analytics {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_end_to_end_query() {
        let fixture = StorageFixture::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        fixture.write_session("ws1", &SessionConfig::new("aa01", 4, start));
        fixture.write_session(
            "ws1",
            &SessionConfig {
                model_id: Some("claude-sonnet".to_string()),
                file: Some("/srv/app/main.py".to_string()),
                ..SessionConfig::new("aa02", 2, start + Duration::days(2))
            },
        );

        let service = Arc::new(service_for(&fixture));
        service.scan_all_data().await.unwrap();
        let engine = AnalyticsEngine::new(service, &CacheConfig::default());

        let range = DateRange::new(start - Duration::days(1), start + Duration::days(5)).unwrap();
        let result = engine.compute_analytics(&AnalyticsQuery::new(range.clone())).unwrap();

        assert_eq!(result.metrics.total_events, 6);
        assert_eq!(result.metrics.unique_sessions, 2);
        assert_eq!(result.time_series.len(), 7);
        assert_eq!(result.time_series.iter().map(|p| p.events).sum::<usize>(), 6);
        assert_eq!(result.languages[0].name, "rust");
        assert_eq!(result.languages[0].count, 4);
        let share: f64 = result.event_types.iter().map(|s| s.percentage).sum();
        assert!((share - 100.0).abs() < 1e-6);
        assert_eq!(result.sessions.len(), 2);

        let python = engine
            .compute_analytics(&AnalyticsQuery::new(range).with_languages(["python"]))
            .unwrap();
        assert_eq!(python.metrics.total_events, 2);
        assert_eq!(python.models[0].name, "claude-sonnet");
    }

    #[tokio::test]
    async fn test_restarts_counted_per_instance() {
        // Three sessions created within the same hour: one instance, three hosts
        let fixture = StorageFixture::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        for (i, id) in ["aa01", "aa02", "aa03"].iter().enumerate() {
            fixture.write_session("ws1", &SessionConfig::new(id, 1, start + Duration::minutes(i as i64 * 10)));
        }

        let service = Arc::new(service_for(&fixture));
        service.scan_all_data().await.unwrap();
        let engine = AnalyticsEngine::new(service, &CacheConfig::default());
        let range = DateRange::new(start, start + Duration::hours(1)).unwrap();
        let result = engine.compute_analytics(&AnalyticsQuery::new(range)).unwrap();

        assert_eq!(result.instances.len(), 1);
        assert_eq!(result.instances[0].session_count, 3);
        assert_eq!(result.instances[0].extension_host_restarts, 2);
        assert_eq!(result.windows.len(), 1);
    }
}

mod persistence {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_scan_statistics_survive_restart() {
        let fixture = StorageFixture::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        fixture.write_session("ws1", &SessionConfig::new("aa01", 2, start));
        let state = fixture.scratch("state.json");

        {
            let store = Arc::new(JsonFileStore::open(&state).unwrap());
            let service = UnifiedSessionService::with_scanner(scanner_for(&fixture), store).unwrap();
            service.scan_all_data().await.unwrap();
        }

        let store = Arc::new(JsonFileStore::open(&state).unwrap());
        let service = UnifiedSessionService::with_scanner(scanner_for(&fixture), store).unwrap();
        let stats = service.last_scan_statistics().unwrap();
        assert_eq!(stats.parsed_sessions, 1);
        assert_eq!(stats.total_requests, 2);
    }

    #[tokio::test]
    async fn test_prompt_text_setting() {
        let fixture = StorageFixture::new();
        let start = Utc::now() - Duration::hours(1);
        fixture.write_session("ws1", &SessionConfig::new("aa01", 1, start));

        let store = Arc::new(MemoryStore::new());
        Settings {
            include_prompt_text: true,
            ..Settings::default()
        }
        .save(store.as_ref())
        .unwrap();
        let service = UnifiedSessionService::with_scanner(scanner_for(&fixture), store).unwrap();

        let (events, _) = service.scan_all_data().await.unwrap();
        assert_eq!(events[0].prompt_text.as_deref(), Some(generators::PROMPTS[0]));
    }
}
