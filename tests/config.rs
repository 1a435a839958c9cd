// ABOUTME: Integration tests for the deployment state file and its repositories.
// ABOUTME: Tests state loading, record bookkeeping, and legacy state migration.

use bosh_env::config::*;
use bosh_env::types::{RandomUuidGenerator, StemcellCid, UuidGenerator, VmCid};
use std::sync::Arc;

fn service(path: &std::path::Path) -> Arc<dyn DeploymentStateService> {
    let uuid: Arc<dyn UuidGenerator> = Arc::new(RandomUuidGenerator);
    Arc::new(FileSystemDeploymentStateService::new(path, uuid))
}

fn repos(service: &Arc<dyn DeploymentStateService>) -> Repos {
    Repos::new(Arc::clone(service), Arc::new(RandomUuidGenerator))
}

mod state_file {
    use super::*;

    #[test]
    fn loading_missing_file_mints_director_id_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("env-state.json");
        let service = service(&path);

        let first = service.load().unwrap();
        assert!(!first.director_id.is_empty());
        assert!(path.is_file());

        let second = service.load().unwrap();
        assert_eq!(first.director_id, second.director_id);
    }

    #[test]
    fn null_lists_read_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("env-state.json");
        std::fs::write(
            &path,
            r#"{"director_id":"d-1","disks":null,"stemcells":null,"releases":null,"current_release_ids":null}"#,
        )
        .unwrap();

        let state = service(&path).load().unwrap();

        assert_eq!(state.director_id, "d-1");
        assert!(state.disks.is_empty());
        assert!(state.stemcells.is_empty());
        assert!(state.releases.is_empty());
        assert!(state.current_release_ids.is_empty());
    }

    #[test]
    fn unreadable_json_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("env-state.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(service(&path).load().is_err());
    }

    #[test]
    fn cleanup_removes_file_and_tolerates_absence() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("env-state.json");
        let service = service(&path);
        service.load().unwrap();

        service.cleanup().unwrap();
        assert!(!path.exists());
        service.cleanup().unwrap();
    }

    #[test]
    fn state_path_defaults_beside_manifest() {
        let path = deployment_state_path(std::path::Path::new("/envs/lab/bosh.yml"), None);
        assert_eq!(path, std::path::Path::new("/envs/lab/bosh-state.json"));

        let custom = std::path::Path::new("/tmp/custom.json");
        assert_eq!(
            deployment_state_path(std::path::Path::new("/envs/lab/bosh.yml"), Some(custom)),
            custom
        );
    }
}

mod repositories {
    use super::*;

    #[test]
    fn stemcell_names_and_cids_are_unique() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(&tmp.path().join("state.json"));
        let repos = repos(&service);

        repos
            .stemcells
            .save("ubuntu", "1", 2, &StemcellCid::new("sc-1"))
            .unwrap();

        assert!(
            repos
                .stemcells
                .save("ubuntu", "1", 2, &StemcellCid::new("sc-2"))
                .is_err()
        );
        assert!(
            repos
                .stemcells
                .save("ubuntu", "2", 2, &StemcellCid::new("sc-1"))
                .is_err()
        );
    }

    #[test]
    fn current_stemcell_follows_update_and_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(&tmp.path().join("state.json"));
        let repos = repos(&service);
        let record = repos
            .stemcells
            .save("ubuntu", "1", 2, &StemcellCid::new("sc-1"))
            .unwrap();
        assert!(repos.stemcells.find_current().unwrap().is_none());

        repos.stemcells.update_current(&record.id).unwrap();
        assert_eq!(repos.stemcells.find_current().unwrap(), Some(record));

        repos.stemcells.clear_current().unwrap();
        assert!(repos.stemcells.find_current().unwrap().is_none());
    }

    #[test]
    fn release_update_replaces_records_with_fresh_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(&tmp.path().join("state.json"));
        let repos = repos(&service);

        let first = repos
            .releases
            .update(&[ReleaseVersion::new("bosh", "1")])
            .unwrap();
        let second = repos
            .releases
            .update(&[ReleaseVersion::new("bosh", "1")])
            .unwrap();

        assert_ne!(first[0].id, second[0].id);
        assert_eq!(repos.releases.list().unwrap(), second);
        assert_eq!(service.load().unwrap().current_release_ids, vec![second[0].id.clone()]);
    }

    #[test]
    fn vm_and_manifest_sha_round_trip_through_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        let repos = repos(&service(&path));

        repos.vms.update_current(&VmCid::new("vm-1")).unwrap();
        repos.deployments.update_current("abc123").unwrap();

        let reread = super::repos(&service(&path));
        assert_eq!(reread.vms.find_current().unwrap(), Some(VmCid::new("vm-1")));
        assert_eq!(
            reread.deployments.find_current().unwrap(),
            Some("abc123".to_string())
        );

        reread.vms.clear_current().unwrap();
        assert!(repos.vms.find_current().unwrap().is_none());
    }
}

mod legacy_migration {
    use super::*;

    const LEGACY: &str = "---
instances:
- :id: 1
  :name: micro-robin
  :stemcell_cid: sc-legacy
  :stemcell_name: bosh-stemcell-legacy
  :vm_cid: vm-legacy
  :disk_cid: disk-legacy
";

    #[test]
    fn migrates_first_instance_and_removes_legacy_file() {
        let tmp = tempfile::tempdir().unwrap();
        let legacy = tmp.path().join(LEGACY_STATE_FILENAME);
        std::fs::write(&legacy, LEGACY).unwrap();
        let service = service(&tmp.path().join("bosh-state.json"));

        let migrated =
            LegacyDeploymentStateMigrator::new(Arc::clone(&service), Arc::new(RandomUuidGenerator))
                .migrate_if_exists(&legacy)
                .unwrap();

        assert!(migrated);
        assert!(!legacy.exists());
        let state = service.load().unwrap();
        assert!(!state.director_id.is_empty());
        assert_eq!(state.current_vm_cid, "vm-legacy");
        assert_eq!(state.disk_cids(), vec!["disk-legacy".to_string()]);
        assert_eq!(state.current_disk_id, state.disks[0].id);
        assert_eq!(state.stemcells[0].cid, "sc-legacy");
        assert_eq!(state.stemcells[0].name, "bosh-stemcell-legacy");
        assert!(state.current_stemcell().is_none());
    }

    #[test]
    fn missing_legacy_file_is_not_migrated() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(&tmp.path().join("bosh-state.json"));

        let migrated =
            LegacyDeploymentStateMigrator::new(Arc::clone(&service), Arc::new(RandomUuidGenerator))
                .migrate_if_exists(&tmp.path().join(LEGACY_STATE_FILENAME))
                .unwrap();

        assert!(!migrated);
        assert!(!service.exists());
    }

    #[test]
    fn legacy_path_sits_beside_manifest() {
        assert_eq!(
            legacy_deployment_state_path(std::path::Path::new("/envs/lab/bosh.yml")),
            std::path::Path::new("/envs/lab").join(LEGACY_STATE_FILENAME)
        );
    }
}

mod workspace {
    use super::*;

    #[test]
    fn home_override_wins() {
        temp_env::with_var(HOME_ENV_VAR, Some("/opt/bosh-env"), || {
            let workspace = WorkspaceConfig::from_env().unwrap();
            assert_eq!(workspace.root(), std::path::Path::new("/opt/bosh-env"));
            assert_eq!(
                workspace.installation_path("abc"),
                std::path::Path::new("/opt/bosh-env/installations/abc")
            );
        });
    }

    #[test]
    fn defaults_under_home() {
        temp_env::with_vars(
            [(HOME_ENV_VAR, None), ("HOME", Some("/home/ops"))],
            || {
                let workspace = WorkspaceConfig::from_env().unwrap();
                assert_eq!(workspace.root(), std::path::Path::new("/home/ops/.bosh"));
                assert_eq!(
                    workspace.downloads_dir(),
                    std::path::Path::new("/home/ops/.bosh/downloads")
                );
            },
        );
    }
}
