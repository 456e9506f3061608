use danubedata_client::ApiClient;
use danubedata_config::ProviderConfig;
use danubedata_core::{
    ActionType, ApplyContext, Deployment, ErrorKind, ProviderError, Registry, ResourceProvider,
    ResourceSpec, ResourceState, ResourceStatus, RetryConfig,
};
use danubedata_provider::{Reconciler, WaitConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reconciler_for(server: &MockServer) -> Reconciler {
    let config = ProviderConfig {
        api_token: Some("test-token".to_string()),
        base_url: server.uri(),
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            backoff_multiplier: 2.0,
        },
        ..Default::default()
    };
    let wait = WaitConfig {
        poll_interval: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
    };
    Reconciler::with_client(
        ApiClient::new(&config).unwrap(),
        Arc::new(Registry::builtin()),
        wait,
    )
}

fn ssh_key() -> ResourceSpec {
    ResourceSpec::new("SshKey", "my-key")
        .with_property("name", json!("deployment-key"))
        .with_property("public_key", json!("ssh-ed25519 AAAA"))
}

fn web_server(ssh_key_id: &str) -> ResourceSpec {
    ResourceSpec::new("Vps", "web-server")
        .with_property("name", json!("web-server"))
        .with_property("image", json!("ubuntu-24.04"))
        .with_property("datacenter", json!("fsn1"))
        .with_property("resource_profile", json!("nano_shared"))
        .with_property("ssh_key_id", json!(ssh_key_id))
        .depends_on("ssh_key_id", "my-key", "id")
}

fn running_vps(ssh_key_id: &str) -> ResourceState {
    let registry = Registry::builtin();
    let spec = web_server(ssh_key_id);
    let inputs = registry.apply_defaults("Vps", &spec.properties).unwrap();
    ResourceState::new("101", "Vps", "web-server")
        .with_status(ResourceStatus::Running)
        .with_inputs(inputs)
        .with_output("public_ip", json!("203.0.113.10"))
}

#[tokio::test]
async fn test_ssh_key_then_vps_deployment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ssh-keys"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": 17, "name": "deployment-key", "fingerprint": "SHA256:abc"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vps"))
        .and(body_json(json!({
            "name": "web-server",
            "image": "ubuntu-24.04",
            "datacenter": "fsn1",
            "resource_profile": "nano_shared",
            "auth_method": "ssh_key",
            "ssh_key_id": "17",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": 101, "status": "provisioning"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vps/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": 101, "status": "provisioning"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vps/101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": 101,
                "status": "running",
                "public_ip": "203.0.113.10",
                "private_ip": "10.0.0.5",
            }
        })))
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let ctx = ApplyContext::background();

    let key_spec = reconciler.check(ssh_key(), None).unwrap();
    let plan = reconciler.diff(Some(&key_spec), None).unwrap();
    assert_eq!(plan.action, ActionType::Create);
    let key = reconciler.apply(&plan, &ctx).await.unwrap().unwrap();
    assert_eq!(key.id, "17");
    assert_eq!(key.outputs["fingerprint"], json!("SHA256:abc"));

    // the host resolves the reference before handing the spec over
    let key_id = key.output_value("id").unwrap();
    let vps_spec = reconciler
        .check(web_server(key_id.as_str().unwrap()), None)
        .unwrap();
    let deployment = Deployment::new().with(key_spec).with(vps_spec.clone());
    deployment.validate(reconciler.registry()).unwrap();

    let plan = reconciler.diff(Some(&vps_spec), None).unwrap();
    let vps = reconciler.apply(&plan, &ctx).await.unwrap().unwrap();
    assert_eq!(vps.id, "101");
    assert_eq!(vps.status, ResourceStatus::Running);
    assert_eq!(vps.outputs["public_ip"], json!("203.0.113.10"));
    assert_eq!(vps.inputs["auth_method"], json!("ssh_key"));

    // re-diffing the applied state is a no-op
    let plan = reconciler.diff(Some(&vps_spec), Some(&vps)).unwrap();
    assert_eq!(plan.action, ActionType::NoOp);
    let unchanged = reconciler.apply(&plan, &ctx).await.unwrap().unwrap();
    assert_eq!(unchanged, vps);
}

#[tokio::test]
async fn test_update_patches_only_changed_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/vps/101"))
        .and(body_json(json!({"resource_profile": "small_shared"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": 101, "status": "running", "resource_profile": "small_shared"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let prior = running_vps("17");
    let desired = web_server("17").with_property("resource_profile", json!("small_shared"));

    let plan = reconciler.diff(Some(&desired), Some(&prior)).unwrap();
    assert_eq!(plan.action, ActionType::Update);

    let state = reconciler
        .apply(&plan, &ApplyContext::background())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.id, "101");
    assert_eq!(state.inputs["resource_profile"], json!("small_shared"));
    assert_eq!(state.created_at, prior.created_at);
    // outputs not echoed by PATCH are kept
    assert_eq!(state.outputs["public_ip"], json!("203.0.113.10"));
}

#[tokio::test]
async fn test_replace_deletes_then_creates() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/vps/101"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vps"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 102, "status": "running", "public_ip": "203.0.113.11"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let desired = web_server("17").with_property("image", json!("debian-12"));
    let plan = reconciler
        .diff(Some(&desired), Some(&running_vps("17")))
        .unwrap();
    assert_eq!(plan.action, ActionType::Replace);

    let state = reconciler
        .apply(&plan, &ApplyContext::background())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.id, "102");
    assert_eq!(state.inputs["image"], json!("debian-12"));

    let methods: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.method.to_string())
        .collect();
    assert_eq!(methods, vec!["DELETE", "POST"]);
}

#[tokio::test]
async fn test_delete_of_missing_resource_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/vps/101"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let plan = reconciler.diff(None, Some(&running_vps("17"))).unwrap();
    assert_eq!(plan.action, ActionType::Delete);

    let result = reconciler
        .apply(&plan, &ApplyContext::background())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_cancel_while_provisioning_reports_partial_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": 55, "status": "creating"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/databases/55"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": 55, "status": "creating"}
        })))
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let spec = reconciler
        .check(
            ResourceSpec::new("Database", "app-database")
                .with_property("name", json!("app-database"))
                .with_property("engine", json!("postgresql"))
                .with_property("resource_profile", json!("small")),
            None,
        )
        .unwrap();
    let plan = reconciler.diff(Some(&spec), None).unwrap();

    let (tx, rx) = tokio::sync::watch::channel(false);
    let ctx = ApplyContext::new(rx);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
    });

    let err = reconciler.apply(&plan, &ctx).await.unwrap_err();
    let partial = err.partial_state().expect("created database must be reported");
    assert_eq!(partial.id, "55");
    assert_eq!(partial.status, ResourceStatus::Creating);
    assert!(matches!(
        err,
        ProviderError::Partial { ref source, .. } if matches!(**source, ProviderError::Cancelled)
    ));
}

#[tokio::test]
async fn test_failed_provisioning_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cache"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 7, "status": "pending"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cache/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7, "status": "error"
        })))
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let spec = reconciler
        .check(
            ResourceSpec::new("Cache", "session-cache")
                .with_property("name", json!("session-cache"))
                .with_property("cache_provider", json!("redis"))
                .with_property("resource_profile", json!("micro")),
            None,
        )
        .unwrap();
    let plan = reconciler.diff(Some(&spec), None).unwrap();

    let err = reconciler
        .apply(&plan, &ApplyContext::background())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permanent);
    assert_eq!(err.partial_state().map(|s| s.id.as_str()), Some("7"));
}

#[tokio::test]
async fn test_transient_create_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/buckets"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage/buckets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {
                "id": "b-1",
                "endpoint_url": "https://s3.danubedata.ro",
                "minio_bucket_name": "dd-app-assets",
            }
        })))
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let spec = reconciler
        .check(
            ResourceSpec::new("StorageBucket", "app-assets")
                .with_property("name", json!("app-assets"))
                .with_property("versioning_enabled", json!(true)),
            None,
        )
        .unwrap();
    let plan = reconciler.diff(Some(&spec), None).unwrap();

    let state = reconciler
        .apply(&plan, &ApplyContext::background())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.outputs["endpoint_url"], json!("https://s3.danubedata.ro"));
    assert_eq!(state.inputs["region"], json!("fsn1"));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_quota_error_surfaces_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ssh-keys"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "message": "SSH key limit reached"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let plan = reconciler.diff(Some(&ssh_key()), None).unwrap();
    let err = reconciler
        .apply(&plan, &ApplyContext::background())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Permanent);
    assert!(err.partial_state().is_none());
}

#[tokio::test]
async fn test_read_detects_drift_and_keeps_secret_outputs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/access-keys/k-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "k-1", "name": "assets-key-renamed", "access_key_id": "AKIA1"}
        })))
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let state = ResourceState::new("k-1", "StorageAccessKey", "assets-key")
        .with_status(ResourceStatus::Running)
        .with_inputs(
            serde_json::from_value(json!({"name": "assets-key"})).unwrap(),
        )
        .with_output("access_key_id", json!("AKIA1"))
        .with_output("secret_access_key", json!("s3cr3t"));

    let refreshed = reconciler
        .read(&state, &ApplyContext::background())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.outputs["secret_access_key"], json!("s3cr3t"));
    assert_eq!(refreshed.inputs["name"], json!("assets-key-renamed"));

    // the renamed key no longer matches its declaration
    let declared = ResourceSpec::new("StorageAccessKey", "assets-key")
        .with_property("name", json!("assets-key"));
    let plan = reconciler.diff(Some(&declared), Some(&refreshed)).unwrap();
    assert_eq!(plan.action, ActionType::Replace);
}

#[tokio::test]
async fn test_read_of_deleted_resource_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vps/101"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let result = reconciler
        .read(&running_vps("17"), &ApplyContext::background())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_replace_whose_create_fails_reports_deleted_prior() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/ssh-keys/17"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ssh-keys"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "message": "SSH key limit reached"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let prior = ResourceState::new("17", "SshKey", "my-key")
        .with_status(ResourceStatus::Running)
        .with_inputs(ssh_key().properties);
    let desired = ssh_key().with_property("public_key", json!("ssh-ed25519 BBBB"));
    let plan = reconciler.diff(Some(&desired), Some(&prior)).unwrap();
    assert_eq!(plan.action, ActionType::Replace);

    let err = reconciler
        .apply(&plan, &ApplyContext::background())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permanent);
    let gone = err.partial_state().expect("deleted prior must be reported").clone();
    assert_eq!(gone.id, "17");
    assert_eq!(gone.status, ResourceStatus::Deleted);

    // recording the reported state turns the retry into a plain create
    let plan = reconciler.diff(Some(&desired), Some(&gone)).unwrap();
    assert_eq!(plan.action, ActionType::Create);
}

#[tokio::test]
async fn test_read_ignores_server_filled_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cache/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": 7,
                "status": "running",
                "name": "session-cache",
                "cache_provider": "redis",
                "resource_profile": "micro",
                "datacenter": "fsn1",
                "version": "7.2",
                "endpoint": "session-cache.fsn1.danubedata.ro",
                "port": 6379,
            }
        })))
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let spec = reconciler
        .check(
            ResourceSpec::new("Cache", "session-cache")
                .with_property("name", json!("session-cache"))
                .with_property("cache_provider", json!("redis"))
                .with_property("resource_profile", json!("micro")),
            None,
        )
        .unwrap();
    let state = ResourceState::new("7", "Cache", "session-cache")
        .with_status(ResourceStatus::Running)
        .with_inputs(spec.properties.clone());

    let refreshed = reconciler
        .read(&state, &ApplyContext::background())
        .await
        .unwrap()
        .unwrap();
    assert!(!refreshed.inputs.contains_key("version"));
    assert_eq!(refreshed.outputs["port"], json!(6379));

    let plan = reconciler.diff(Some(&spec), Some(&refreshed)).unwrap();
    assert_eq!(plan.action, ActionType::NoOp);
    assert!(plan.changes.is_empty());
}

#[tokio::test]
async fn test_invoke_lists_and_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vps-snapshots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 1, "name": "nightly-1", "vps_instance_id": 101, "status": "completed"},
                {"id": 2, "name": "nightly-2", "vps_instance_id": 101, "status": "creating"},
                {"id": 3, "name": "other", "vps_instance_id": 202, "status": "completed"},
            ],
            "meta": {"current_page": 1, "last_page": 1},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let args = serde_json::from_value(json!({"vps_instance_id": "101", "status": "completed"})).unwrap();
    let result = reconciler
        .invoke("danubedata:index:getVpsSnapshots", &args, &ApplyContext::background())
        .await
        .unwrap();

    let snapshots = result["snapshots"].as_array().unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0]["name"], json!("nightly-1"));
}

#[tokio::test]
async fn test_invoke_rejects_unknown_filter_before_calling_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = reconciler_for(&server);
    let args = serde_json::from_value(json!({"password": "hunter2"})).unwrap();
    let err = reconciler
        .invoke("getVpss", &args, &ApplyContext::background())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = reconciler
        .invoke("getLoadBalancers", &Default::default(), &ApplyContext::background())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::UnknownFunction(_)));
}
