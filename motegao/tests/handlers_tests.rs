use motegao::handlers::*;
use motegao_client::GoogleProfile;
use motegao_core::config::Config;
use motegao_core::data::AuthProvider;
use motegao_core::graph::GraphState;
use motegao_core::notify::{Notice, NoticeLevel};
use motegao_core::result::{NmapReport, ToolResult};
use motegao_core::tool::{ToolConfig, ToolKind};
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

fn context_for(base_url: String, dir: &TempDir) -> AppContext {
    let mut config = Config::default();
    config.api.base_url = base_url;
    AppContext {
        config_dir: dir.path().to_path_buf(),
        config,
    }
}

#[test]
fn test_parse_port_list() {
    assert_eq!(parse_port_list("80,443, 8080").unwrap(), vec![80, 443, 8080]);
    assert_eq!(parse_port_list("22,").unwrap(), vec![22]);
}

#[test]
fn test_parse_port_list_invalid() {
    assert!(parse_port_list("80,http").is_err());
    assert!(parse_port_list("70000").is_err());
    assert!(parse_port_list(" , ").is_err());
}

#[test]
fn test_parse_status_list() {
    assert_eq!(parse_status_list("404,500").unwrap(), vec![404, 500]);
}

#[test]
fn test_parse_ports_range() {
    assert_eq!(parse_ports_range("1-1024").unwrap(), (1, 1024));
    assert_eq!(parse_ports_range(" 80 - 90 ").unwrap(), (80, 90));
}

#[test]
fn test_parse_ports_range_invalid() {
    assert!(parse_ports_range("1024").is_err());
    assert!(parse_ports_range("90-80").is_err());
    assert!(parse_ports_range("a-b").is_err());
}

#[test]
fn test_build_tool_config_keeps_defaults() {
    for kind in ToolKind::ALL {
        assert_eq!(
            build_tool_config(kind, &ScanOptions::default()),
            ToolConfig::default_for(kind)
        );
    }
}

#[test]
fn test_build_tool_config_overrides_subdomain() {
    let opts = ScanOptions {
        wordlist: Some(3),
        threads: Some(50),
        ..ScanOptions::default()
    };
    assert_eq!(
        build_tool_config(ToolKind::Subdomain, &opts),
        ToolConfig::Subdomain {
            wordlist: 3,
            threads: 50
        }
    );
}

#[test]
fn test_build_tool_config_custom_ports_replace_default_list() {
    let opts = ScanOptions {
        ports_range: Some((1, 1024)),
        ..ScanOptions::default()
    };
    match build_tool_config(ToolKind::Nmap, &opts) {
        ToolConfig::Nmap {
            ports_range,
            ports_specific,
            all_ports,
            ..
        } => {
            assert_eq!(ports_range, Some((1, 1024)));
            assert_eq!(ports_specific, None);
            assert!(!all_ports);
        }
        other => panic!("unexpected config {:?}", other),
    }

    let config = build_tool_config(ToolKind::Nmap, &opts);
    assert!(config.to_request("example.com").validate().is_ok());
}

#[test]
fn test_build_tool_config_all_ports_is_valid() {
    let opts = ScanOptions {
        all_ports: true,
        options: vec!["-sS".to_string(), "-Pn".to_string()],
        ..ScanOptions::default()
    };
    let config = build_tool_config(ToolKind::Nmap, &opts);
    assert!(config.to_request("example.com").validate().is_ok());
}

#[test]
fn test_build_tool_config_pathfinder_excludes() {
    let opts = ScanOptions {
        exclude_status: Some(vec![403, 404]),
        ..ScanOptions::default()
    };
    match build_tool_config(ToolKind::Pathfinder, &opts) {
        ToolConfig::Pathfinder { exclude_status, .. } => assert_eq!(exclude_status, vec![403, 404]),
        other => panic!("unexpected config {:?}", other),
    }
}

#[test]
fn test_render_result() {
    let result = ToolResult::Subdomain {
        subdomains: vec!["a.x".to_string(), "b.x".to_string()],
    };
    assert_eq!(render_result(&result), "  • a.x\n  • b.x");

    let invalid = ToolResult::Nmap {
        report: NmapReport::InvalidInvocation,
    };
    assert!(render_result(&invalid).contains("Invalid command"));

    let empty = ToolResult::Pathfinder { hits: vec![] };
    assert_eq!(render_result(&empty), "No paths found");
}

#[test]
fn test_render_notice_keeps_message() {
    let notice = Notice {
        level: NoticeLevel::Error,
        message: "Save failed: boom".to_string(),
    };
    assert!(render_notice(&notice).contains("Save failed: boom"));
}

#[test]
fn test_render_graph_summary() {
    let mut graph = GraphState::new();
    assert_eq!(render_graph_summary(&graph), "(empty canvas)\n");

    let domain = graph.add_domain_node("example.com").unwrap();
    graph.select_domain(&domain).unwrap();
    graph.append_tool_result(&ToolResult::Subdomain {
        subdomains: vec!["a.example.com".to_string()],
    });

    let summary = render_graph_summary(&graph);
    assert!(summary.contains("🎯 example.com"));
    assert!(summary.contains("Subdomains Found (1)"));
    assert!(!summary.contains("not attached"));
}

#[test]
fn test_render_graph_summary_counts_orphans() {
    let mut graph = GraphState::new();
    graph.append_tool_result(&ToolResult::Pathfinder { hits: vec![] });
    let summary = render_graph_summary(&graph);
    assert!(summary.contains("1 result(s) not attached to a domain"));
}

// ============================================================================
// Sign-in Tests
// ============================================================================

#[tokio::test]
async fn test_password_sign_in_stores_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok-1", "token_type": "bearer"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let ctx = context_for(format!("{}/v1", server.uri()), &dir);
    let credentials = Credentials::Password {
        username: "alice".to_string(),
        password: "hunter2".to_string(),
    };

    let session = sign_in(&ctx, &credentials).await.unwrap();
    assert_eq!(session.username, "alice");
    assert_eq!(session.provider, AuthProvider::Password);
    assert_eq!(ctx.client().unwrap().token(), Some("tok-1"));
}

#[tokio::test]
async fn test_google_sign_in_stores_google_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/google-login"))
        .and(body_json(json!({
            "email": "alice@example.com",
            "name": "Alice",
            "google_id": "g-123",
            "picture": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-g"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let ctx = context_for(format!("{}/v1", server.uri()), &dir);
    let credentials = Credentials::Google(GoogleProfile {
        email: "alice@example.com".to_string(),
        name: "Alice".to_string(),
        google_id: "g-123".to_string(),
        picture: None,
    });

    let session = sign_in(&ctx, &credentials).await.unwrap();
    assert_eq!(session.username, "alice@example.com");
    assert_eq!(session.provider, AuthProvider::Google);
    assert_eq!(session.access_token, "tok-g");
}

#[tokio::test]
async fn test_rejected_sign_in_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/login"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "Incorrect username or password"})),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let ctx = context_for(format!("{}/v1", server.uri()), &dir);
    let credentials = Credentials::Password {
        username: "alice".to_string(),
        password: "wrong".to_string(),
    };

    let err = sign_in(&ctx, &credentials).await.unwrap_err();
    assert!(err.to_string().starts_with("Login rejected"));
    assert!(ctx.client().is_err());
}

#[tokio::test]
async fn test_unreachable_api_is_not_a_rejection() {
    let dir = TempDir::new().unwrap();
    let ctx = context_for("http://127.0.0.1:1/v1".to_string(), &dir);
    let credentials = Credentials::Password {
        username: "alice".to_string(),
        password: "hunter2".to_string(),
    };

    let err = sign_in(&ctx, &credentials).await.unwrap_err();
    assert!(err.to_string().starts_with("Could not reach"));
}
