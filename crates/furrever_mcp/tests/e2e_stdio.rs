use rmcp::ServiceExt;
use rmcp::transport::TokioChildProcess;
use std::process::Stdio;
use tokio::process::Command;

use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

async fn mock_backend() -> MockServer {
    let mock = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/u1/pets"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"petID": "p1", "name": "Buddy", "species": "Dog"}
        ])))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/u1/pets/p1/treatmentPlans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"planID": "pl1", "name": "Skin Allergy Management",
             "startDate": "2024-01-01T00:00:00.000Z", "endDate": "2024-01-03T00:00:00.000Z",
             "status": "ACTIVE", "progressPercentage": 50}
        ])))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/u1/pets/p1/scheduledTasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"taskID": "t1", "taskType": "UNKNOWN_TYPE", "description": "Mystery",
             "scheduledDateTime": "2024-01-02T09:00:00.000Z", "status": "PENDING"},
            {"taskID": "t2", "taskType": "WALK", "scheduledDateTime": "garbage"}
        ])))
        .mount(&mock)
        .await;
    mock
}

#[tokio::test]
async fn e2e_stdio_lists_tools_and_builds_timeline() {
    let mock = mock_backend().await;

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_furrever_mcp"));
    cmd.env("FURREVER_BASE_URL", mock.uri());
    cmd.env("FURREVER_USER_ID", "u1");
    cmd.env("FURREVER_API_TOKEN", "tok");
    cmd.env("RUST_LOG", "debug");

    // spawn with piped stderr so we can capture server logs on failure
    let (child, mut stderr_opt) = TokioChildProcess::builder(cmd)
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn child");
    let service = match ().serve(child).await {
        Ok(s) => s,
        Err(e) => {
            if let Some(ref mut stderr) = stderr_opt {
                use tokio::io::AsyncReadExt;
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                eprintln!("child stderr:\n{}", buf);
            }
            panic!("serve failed: {e}");
        }
    };

    let tools = service
        .list_tools(Default::default())
        .await
        .expect("list tools");
    let names: Vec<_> = tools
        .tools
        .into_iter()
        .map(|t| t.name.to_string())
        .collect();
    assert!(names.iter().any(|n| n == "get_wellness_timeline"));
    assert!(names.iter().any(|n| n == "navigate_week"));
    assert!(names.iter().any(|n| n == "list_pets"));

    let args = serde_json::json!({ "week_of": "2024-01-03" });
    let res = service
        .call_tool({
            let mut params = rmcp::model::CallToolRequestParams::new("get_wellness_timeline");
            params.arguments = args.as_object().cloned();
            params
        })
        .await
        .expect("call_tool");
    let v = res.structured_content.expect("structured timeline");
    assert_eq!(v["timeline"]["weekStart"], "2024-01-01");
    assert_eq!(v["timeline"]["stats"]["totalEvents"], 2);
    assert_eq!(v["timeline"]["stats"]["overallProgress"], 50.0);
    assert_eq!(v["timeline"]["days"][1]["total"], 2);
    assert_eq!(v["timeline"]["days"][1]["events"][1]["kind"], "TaskOther");
    assert_eq!(v["skipped"].as_array().map(|a| a.len()), Some(1));

    let args = serde_json::json!({ "direction": "next" });
    let res = service
        .call_tool({
            let mut params = rmcp::model::CallToolRequestParams::new("navigate_week");
            params.arguments = args.as_object().cloned();
            params
        })
        .await
        .expect("navigate");
    let v = res.structured_content.expect("structured timeline");
    assert_eq!(v["timeline"]["weekStart"], "2024-01-08");
    assert_eq!(v["timeline"]["stats"]["overallProgress"], 50.0);

    // navigation is served from the cached snapshot
    let requests = mock.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 3);

    service.cancel().await.expect("cancel");
}
