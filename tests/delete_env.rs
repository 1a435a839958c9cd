// ABOUTME: Integration tests for delete-env against an in-memory cloud and agent.
// ABOUTME: Verifies teardown order, not-found skips, and removal of local artifacts.

mod support;

use bosh_env::stage::StepOutcome;
use support::{TestEnv, names, step};

/// Test: Without a state file there is nothing to delete.
#[tokio::test]
async fn missing_state_file_is_a_no_op() {
    let env = TestEnv::new();

    let (result, steps) = env.delete_env(env.options("first")).await;
    result.unwrap();

    assert!(steps.is_empty());
    assert!(env.ui.contains("No deployment state file found."));
    assert!(env.cloud.calls().is_empty());
    assert!(!env.state_path().exists());
}

/// Test: Deleting a deployed environment removes VM, disk, and stemcell in order.
#[tokio::test]
async fn deletes_deployment_and_local_artifacts() {
    let env = TestEnv::new();
    env.create_env(env.options("first")).await.0.unwrap();
    let installation = env
        .workspace()
        .installation_path(&env.state().installation_id);
    assert!(installation.exists());

    let (result, steps) = env.delete_env(env.options("first")).await;
    result.unwrap();

    assert_eq!(
        names(&steps),
        vec![
            "validating",
            "installing CPI",
            "deleting deployment",
            "Cleaning up rendered CPI jobs",
            "Uninstalling local artifacts for CPI and deployment",
        ]
    );
    assert_eq!(
        step(&steps, "validating").child_names(),
        vec![
            "Validating deployment manifest",
            "Validating release 'bosh'",
            "Validating release 'bosh-warden-cpi'",
            "Validating cpi release",
        ]
    );
    assert_eq!(
        step(&steps, "deleting deployment").child_names(),
        vec![
            "Waiting for the agent on VM 'vm-cid-1'",
            "Draining jobs on instance 'unknown/0'",
            "Stopping jobs on instance 'unknown/0'",
            "Unmounting disk 'disk-cid-1'",
            "Deleting VM 'vm-cid-1'",
            "Deleting disk 'disk-cid-1'",
            "Deleting stemcell 'stemcell-cid-1'",
        ]
    );

    assert_eq!(env.cloud.calls_to("delete_vm"), vec!["delete_vm vm-cid-1"]);
    assert_eq!(
        env.cloud.calls_to("delete_disk"),
        vec!["delete_disk disk-cid-1"]
    );
    assert_eq!(
        env.cloud.calls_to("delete_stemcell"),
        vec!["delete_stemcell stemcell-cid-1"]
    );
    assert!(!env.state_path().exists());
    assert!(!installation.exists());
}

/// Test: The cloud is built with the recorded stemcell's API version.
#[tokio::test]
async fn delete_uses_recorded_stemcell_api_version() {
    let env = TestEnv::new();
    env.create_env(env.options("first")).await.0.unwrap();

    env.delete_env(env.options("first")).await.0.unwrap();

    assert_eq!(env.cloud.stemcell_api_versions(), vec![2, 2]);
}

/// Test: A VM the cloud no longer knows is skipped, and the rest is still deleted.
#[tokio::test]
async fn vanished_vm_is_skipped() {
    let env = TestEnv::new();
    env.create_env(env.options("first")).await.0.unwrap();
    env.cloud.forget_vm("vm-cid-1");

    let (result, steps) = env.delete_env(env.options("first")).await;
    result.unwrap();

    let deleting = step(&steps, "deleting deployment");
    assert_eq!(
        deleting.child_names(),
        vec![
            "Deleting VM 'vm-cid-1'",
            "Deleting disk 'disk-cid-1'",
            "Deleting stemcell 'stemcell-cid-1'",
        ]
    );
    assert_eq!(
        deleting.children[0].outcome,
        StepOutcome::Skipped("VM not found".to_string())
    );
    assert!(!env.agent.calls().iter().any(|c| c == "stop"));
    assert!(!env.state_path().exists());
}

/// Test: A state file without a deployment still uninstalls and removes the state.
#[tokio::test]
async fn state_without_deployment_only_uninstalls() {
    let env = TestEnv::new();
    std::fs::write(env.state_path(), r#"{"director_id": "d-1", "disks": null}"#).unwrap();

    let (result, steps) = env.delete_env(env.options("first")).await;
    result.unwrap();

    assert_eq!(
        names(&steps),
        vec![
            "validating",
            "installing CPI",
            "Cleaning up rendered CPI jobs",
            "Uninstalling local artifacts for CPI and deployment",
        ]
    );
    assert!(env.cloud.calls().is_empty());
    assert!(!env.state_path().exists());
}

/// Test: --skip-drain deletes without running drain scripts.
#[tokio::test]
async fn skip_drain_on_delete() {
    let env = TestEnv::new();
    env.create_env(env.options("first")).await.0.unwrap();

    let mut options = env.options("first");
    options.skip_drain = true;
    let (result, steps) = env.delete_env(options).await;
    result.unwrap();

    let children = step(&steps, "deleting deployment").child_names();
    assert!(!children.iter().any(|c| c.starts_with("Draining")));
    assert!(children.contains(&"Stopping jobs on instance 'unknown/0'"));
}
