// End-to-end canvas behavior: domains, tool runs, persistence

use motegao_client::ApiClient;
use motegao_core::canvas::Canvas;
use motegao_core::config::Config;
use motegao_core::error::CoreError;
use motegao_core::graph::NodeKind;
use motegao_core::notify::{Notice, NoticeLevel, Notifier};
use motegao_core::persistence::SaveStatus;
use motegao_core::task::TaskEvent;
use motegao_core::tool::{ToolConfig, ToolKind};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn config(autosave: bool) -> Config {
    Config {
        poll_interval_ms: 20,
        autosave,
        ..Config::default()
    }
}

fn canvas_for(server: &MockServer, autosave: bool) -> (Canvas, UnboundedReceiver<Notice>) {
    let client = ApiClient::new(&format!("{}/v1", server.uri())).unwrap();
    let (notifier, rx) = Notifier::channel();
    (Canvas::new(client, &config(autosave), notifier), rx)
}

fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(n) = rx.try_recv() {
        notices.push(n);
    }
    notices
}

async fn mount_update(server: &MockServer, project_id: &str, status: u16) {
    Mock::given(method("PUT"))
        .and(path(format!("/v1/projects/update/{}", project_id)))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"message": "ok"})))
        .mount(server)
        .await;
}

async fn next(canvas: &mut Canvas) -> Option<TaskEvent> {
    tokio::time::timeout(Duration::from_secs(5), canvas.next_event())
        .await
        .expect("timed out waiting for task event")
}

// ============================================================================
// Domain Tests
// ============================================================================

#[tokio::test]
async fn test_duplicate_domain_rejected_with_notice() {
    let server = MockServer::start().await;
    let (mut canvas, mut notices) = canvas_for(&server, false);

    canvas.add_domain("Example.com").await.unwrap();
    let err = canvas.add_domain("example.com").await.unwrap_err();

    assert!(matches!(err, CoreError::DuplicateDomain(_)));
    assert_eq!(canvas.graph().nodes().len(), 1);
    let notices = drain(&mut notices);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warn);
}

#[tokio::test]
async fn test_first_domain_becomes_selected() {
    let server = MockServer::start().await;
    let (mut canvas, _notices) = canvas_for(&server, false);

    canvas.add_domain("a.com").await.unwrap();
    canvas.add_domain("b.com").await.unwrap();
    assert_eq!(canvas.graph().selected_domain().unwrap().name, "a.com");

    canvas.select_domain_named("B.COM").unwrap();
    assert_eq!(canvas.graph().selected_domain().unwrap().name, "b.com");
}

#[tokio::test]
async fn test_delete_selected_domain_clears_selection() {
    let server = MockServer::start().await;
    let (mut canvas, _notices) = canvas_for(&server, false);
    let node = canvas.add_domain("a.com").await.unwrap();

    canvas.delete_node(&node).await.unwrap();
    assert!(canvas.graph().selected_domain().is_none());
    assert!(canvas.graph().domains().is_empty());
}

// ============================================================================
// Tool Run Tests
// ============================================================================

#[tokio::test]
async fn test_run_without_domain_is_precondition_error() {
    let server = MockServer::start().await;
    let (mut canvas, mut notices) = canvas_for(&server, false);

    for kind in ToolKind::ALL {
        let err = canvas.run_tool(&ToolConfig::default_for(kind)).await.unwrap_err();
        assert!(matches!(err, CoreError::NoDomainSelected));
        assert!(canvas.tracker().task(kind).is_none());
    }
    assert!(drain(&mut notices).iter().all(|n| n.level == NoticeLevel::Error));
}

#[tokio::test]
async fn test_only_one_tool_runs_at_a_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/commands/subdomain_dns_enum"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "s1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/s1/result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "PENDING"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/commands/nmap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "n1"})))
        .expect(0)
        .mount(&server)
        .await;

    let (mut canvas, _notices) = canvas_for(&server, false);
    canvas.add_domain("example.com").await.unwrap();
    canvas
        .run_tool(&ToolConfig::default_for(ToolKind::Subdomain))
        .await
        .unwrap();

    let err = canvas
        .run_tool(&ToolConfig::default_for(ToolKind::Nmap))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ToolBusy(ToolKind::Subdomain)));
    assert!(canvas.tracker().task(ToolKind::Nmap).is_none());
}

#[tokio::test]
async fn test_completed_subdomain_scan_lands_on_graph() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/commands/subdomain_dns_enum"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "s2"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/s2/result"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({
                "status": "SUCCESS",
                "result": {"subdomains": ["a.x", "b.x"]}
            })),
        )
        .mount(&server)
        .await;

    let (mut canvas, _notices) = canvas_for(&server, false);
    let domain_node = canvas.add_domain("x").await.unwrap();
    canvas
        .run_tool(&ToolConfig::default_for(ToolKind::Subdomain))
        .await
        .unwrap();

    assert!(matches!(next(&mut canvas).await, Some(TaskEvent::Completed { .. })));

    let graph = canvas.graph();
    assert_eq!(graph.nodes().len(), 2);
    assert_eq!(graph.edges().len(), 1);
    let result = graph
        .nodes()
        .iter()
        .find(|n| n.kind == NodeKind::Subdomain)
        .unwrap();
    assert_eq!(result.result().unwrap().entries(), vec!["a.x", "b.x"]);
    assert_eq!(graph.edges()[0].source, domain_node);
    assert_eq!(graph.edges()[0].target, result.id);
    assert!(graph.last_scan().is_some());
    assert_eq!(canvas.save_status(), SaveStatus::Unsaved);
}

#[tokio::test]
async fn test_completed_event_survives_slow_autosave() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/commands/subdomain_dns_enum"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "s5"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/s5/result"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "SUCCESS", "result": ["a.x"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/projects/update/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "ok"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let (mut canvas, _notices) = canvas_for(&server, true);
    canvas.open_project("slow").await;
    canvas.add_domain("x").await.unwrap();
    canvas
        .run_tool(&ToolConfig::default_for(ToolKind::Subdomain))
        .await
        .unwrap();

    // The result is on the graph as soon as the event is handed back
    let event = tokio::time::timeout(Duration::from_millis(300), canvas.next_event())
        .await
        .expect("completed event waited on the autosave");
    assert!(matches!(event, Some(TaskEvent::Completed { .. })));
    assert_eq!(canvas.graph().nodes().len(), 2);
    assert_eq!(canvas.save_status(), SaveStatus::Unsaved);

    // Abandoning the owed autosave midway keeps it owed
    let _ = tokio::time::timeout(Duration::from_millis(50), canvas.next_event()).await;
    assert_ne!(canvas.save_status(), SaveStatus::Saved);

    canvas.close().await;
    assert_eq!(canvas.save_status(), SaveStatus::Saved);
    assert_eq!(canvas.graph().nodes().len(), 2);
}

#[tokio::test]
async fn test_cancel_without_remote_id_is_error() {
    let server = MockServer::start().await;
    let (mut canvas, mut notices) = canvas_for(&server, false);

    let err = canvas.cancel_tool(ToolKind::Nmap).await.unwrap_err();
    assert!(matches!(err, CoreError::NoRemoteTask(ToolKind::Nmap)));
    assert_eq!(drain(&mut notices)[0].level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_cancel_keeps_partial_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/commands/path_enum"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "p1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/p1/result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "STARTED"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/p1/cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "CANCELLED",
            "result": [{"path": "/admin", "status_code": 200}]
        })))
        .mount(&server)
        .await;

    let (mut canvas, _notices) = canvas_for(&server, false);
    canvas.add_domain("example.com").await.unwrap();
    canvas
        .run_tool(&ToolConfig::default_for(ToolKind::Pathfinder))
        .await
        .unwrap();

    let node = canvas.cancel_tool(ToolKind::Pathfinder).await.unwrap().unwrap();
    let node = canvas.graph().node(&node).unwrap();
    assert_eq!(node.kind, NodeKind::Pathfinder);
    assert_eq!(node.result().unwrap().entries(), vec!["200 /admin"]);
    assert!(canvas.tracker().task(ToolKind::Pathfinder).is_none());
}

#[tokio::test]
async fn test_cancel_ignores_progress_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/commands/subdomain_dns_enum"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "s7"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/s7/result"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "PROGRESS", "result": {"progress": 40}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/s7/cancel"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "CANCELLED", "result": {"progress": 40}})),
        )
        .mount(&server)
        .await;

    let (mut canvas, _notices) = canvas_for(&server, false);
    canvas.add_domain("example.com").await.unwrap();
    canvas
        .run_tool(&ToolConfig::default_for(ToolKind::Subdomain))
        .await
        .unwrap();

    let node = canvas.cancel_tool(ToolKind::Subdomain).await.unwrap();
    assert!(node.is_none());
    assert_eq!(canvas.graph().nodes().len(), 1);
    assert!(canvas.graph().edges().is_empty());
    assert!(canvas.tracker().task(ToolKind::Subdomain).is_none());
}

#[tokio::test]
async fn test_cancel_drops_empty_partial_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/commands/path_enum"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "p4"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/p4/result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "STARTED"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/p4/cancel"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "CANCELLED", "result": {"stage": "warmup"}})),
        )
        .mount(&server)
        .await;

    let (mut canvas, _notices) = canvas_for(&server, false);
    canvas.add_domain("example.com").await.unwrap();
    canvas
        .run_tool(&ToolConfig::default_for(ToolKind::Pathfinder))
        .await
        .unwrap();

    assert!(canvas.cancel_tool(ToolKind::Pathfinder).await.unwrap().is_none());
    assert_eq!(canvas.graph().nodes().len(), 1);
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_missing_project_opens_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/detail/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let (mut canvas, mut notices) = canvas_for(&server, true);
    assert!(!canvas.open_project("gone").await);
    assert!(canvas.graph().is_empty());
    assert_eq!(canvas.project_id(), Some("gone"));
    assert!(drain(&mut notices).is_empty());
}

#[tokio::test]
async fn test_save_status_transitions() {
    let server = MockServer::start().await;
    mount_update(&server, "p1", 200).await;

    let (mut canvas, _notices) = canvas_for(&server, false);
    canvas.open_project("p1").await;
    assert_eq!(canvas.save_status(), SaveStatus::Saved);

    canvas.add_domain("example.com").await.unwrap();
    assert_eq!(canvas.save_status(), SaveStatus::Unsaved);

    canvas.save().await.unwrap();
    assert_eq!(canvas.save_status(), SaveStatus::Saved);
}

#[tokio::test]
async fn test_failed_save_stays_unsaved_with_error() {
    let server = MockServer::start().await;
    mount_update(&server, "p1", 500).await;

    let (mut canvas, mut notices) = canvas_for(&server, true);
    canvas.open_project("p1").await;
    drain(&mut notices);

    // Autosave runs and fails
    canvas.add_domain("example.com").await.unwrap();
    assert_eq!(canvas.save_status(), SaveStatus::Unsaved);
    let notices = drain(&mut notices);
    assert!(notices
        .iter()
        .any(|n| n.level == NoticeLevel::Error && n.message.starts_with("Save failed")));

    assert!(matches!(canvas.save().await, Err(CoreError::SaveFailed(_))));
    assert_eq!(canvas.save_status(), SaveStatus::Unsaved);
}

#[tokio::test]
async fn test_save_without_project() {
    let server = MockServer::start().await;
    let (mut canvas, _notices) = canvas_for(&server, true);
    canvas.add_domain("example.com").await.unwrap();
    assert!(matches!(canvas.save().await, Err(CoreError::NoProject)));
}

#[tokio::test]
async fn test_save_then_load_round_trips_domains() {
    let server = MockServer::start().await;
    mount_update(&server, "p1", 200).await;

    let (mut canvas, _notices) = canvas_for(&server, false);
    canvas.open_project("p1").await;
    let a = canvas.add_domain("a.com").await.unwrap();
    canvas.add_domain("b.com").await.unwrap();
    canvas.select_domain(&a).unwrap();
    canvas.save().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let saved: Value = requests
        .iter()
        .rev()
        .find(|r| r.url.path() == "/v1/projects/update/p1")
        .unwrap()
        .body_json()
        .unwrap();
    assert!(saved["lastModified"].is_string());
    assert!(saved["nodes"][0].get("label").is_none());

    Mock::given(method("GET"))
        .and(path("/v1/projects/detail/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "name": "RECON",
            "nodes": saved["nodes"],
            "edges": saved["edges"],
            "lastModified": saved["lastModified"],
        })))
        .mount(&server)
        .await;

    let (mut reopened, _notices) = canvas_for(&server, false);
    assert!(reopened.open_project("p1").await);
    assert_eq!(reopened.graph().domains(), canvas.graph().domains());
    assert!(reopened.graph().selected_domain().is_none());
    assert!(reopened.graph().nodes().iter().all(|n| !n.label.is_empty()));
}

#[tokio::test]
async fn test_close_cancels_running_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/commands/nmap"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task_id": "n9"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/n9/result"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "PROGRESS", "result": {"progress": 5}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/commands/n9/cancel"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "CANCELLED"})))
        .expect(1)
        .mount(&server)
        .await;

    let (mut canvas, _notices) = canvas_for(&server, false);
    canvas.add_domain("example.com").await.unwrap();
    canvas
        .run_tool(&ToolConfig::default_for(ToolKind::Nmap))
        .await
        .unwrap();

    canvas.close().await;
    assert!(canvas.tracker().running_tool().is_none());
}
