//! Bootstrap reconciliation tests

mod common;

use common::{FakeRepository, Harness, Mode, entry};
use project_orchestration::{
    BaselineOutcome, DEV_SERVICES_FILENAME, Error, ProjectStore, ProjectType, RetryPolicy,
};
use project_store::MemoryBackend;
use std::sync::atomic::Ordering;

fn count_of(projects: &[project_orchestration::Project], id: &str) -> usize {
    projects.iter().filter(|p| p.id == id).count()
}

#[smol_potat::test]
async fn test_cold_start_imports_repository_and_seeds_baselines() {
    let repository = FakeRepository::with_entries(vec![entry(
        "orders",
        &[
            (
                "application.properties",
                "project.name=Orders\nproject.description=Order intake\nproject.runtime=quarkus\n",
            ),
            ("orders.camel.yaml", "- from:\n    uri: timer:tick\n"),
        ],
    )]);
    let harness = Harness::new(Mode::Local, repository).await;
    assert!(!harness.orchestrator.is_ready());

    let report = harness.orchestrator.try_start().await.unwrap();

    assert!(report.full_import);
    assert_eq!(report.imported, 1);
    assert_eq!(report.baselines.len(), 3);
    for project_type in ProjectType::BASELINE {
        assert_eq!(report.outcome(project_type), Some(&BaselineOutcome::Created));
    }

    let orders = harness.store.get_project("orders").await.unwrap().unwrap();
    assert_eq!(orders.name, "Orders");
    assert_eq!(orders.runtime, "quarkus");
    assert_eq!(orders.last_commit, "orders-head");
    assert_eq!(harness.store.get_project_files("orders").await.unwrap().len(), 2);

    // Seeded baselines are committed once each
    assert_eq!(harness.repository.commits_for("templates"), 1);
    assert_eq!(harness.repository.commits_for("services"), 1);
    assert_eq!(harness.repository.commits_for("kamelets"), 1);

    let templates = harness.store.get_project("templates").await.unwrap().unwrap();
    assert!(!templates.last_commit.is_empty());
    assert!(
        harness
            .store
            .get_project_file("templates", "quarkus-builder-script-docker.sh")
            .await
            .unwrap()
            .is_some()
    );
    assert!(harness.orchestrator.dev_services_code().await.unwrap().is_some());

    assert!(harness.orchestrator.is_ready());
    assert!(harness.orchestrator.health().up);
}

#[smol_potat::test]
async fn test_baseline_ensure_is_idempotent() {
    let harness = Harness::new(Mode::Local, FakeRepository::default()).await;

    harness.orchestrator.try_start().await.unwrap();
    let second = harness.orchestrator.try_start().await.unwrap();

    assert!(!second.full_import);
    for project_type in ProjectType::BASELINE {
        assert_eq!(
            second.outcome(project_type),
            Some(&BaselineOutcome::AlreadyPresent)
        );
    }

    let projects = harness.store.list_projects().await.unwrap();
    for id in ["templates", "kamelets", "services"] {
        assert_eq!(count_of(&projects, id), 1);
        assert_eq!(harness.repository.commits_for(id), 1);
    }
}

#[smol_potat::test]
async fn test_services_folder_in_repository_is_imported_not_seeded() {
    let repository = FakeRepository::with_entries(vec![entry(
        "services",
        &[
            (DEV_SERVICES_FILENAME, "services:\n  kafka:\n    image: kafka\n"),
            ("redis.yaml", "services:\n  redis:\n    image: redis\n"),
        ],
    )]);
    let harness = Harness::new(Mode::Local, repository).await;

    let report = harness.orchestrator.try_start().await.unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(
        report.outcome(ProjectType::Services),
        Some(&BaselineOutcome::AlreadyPresent)
    );

    let services = harness.store.get_project("services").await.unwrap().unwrap();
    assert_eq!(services.project_type, ProjectType::Services);
    assert_eq!(services.last_commit, "services-head");

    let files = harness.store.get_project_files("services").await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(
        harness.orchestrator.dev_services_code().await.unwrap().as_deref(),
        Some("services:\n  kafka:\n    image: kafka\n")
    );
    assert_eq!(harness.repository.commits_for("services"), 0);
    assert!(harness.orchestrator.is_ready());
}

#[smol_potat::test]
async fn test_failed_entry_does_not_stop_other_imports() {
    let repository = FakeRepository::with_entries(vec![
        entry("..", &[("route.yaml", "- from: {}\n")]),
        entry(
            "billing",
            &[("application.properties", "project.name=Billing\n")],
        ),
        entry(
            "orders",
            &[
                ("application.properties", "project.name=Orders\n"),
                ("../../escaped.txt", "x"),
            ],
        ),
    ]);
    let harness = Harness::new(Mode::Local, repository).await;

    let report = harness.orchestrator.try_start().await.unwrap();

    assert!(report.full_import);
    assert_eq!(report.imported, 1);
    let billing = harness.store.get_project("billing").await.unwrap().unwrap();
    assert_eq!(billing.name, "Billing");

    // A rejected entry leaves nothing behind
    assert!(harness.store.get_project("orders").await.unwrap().is_none());
    assert!(harness.store.get_project_files("orders").await.unwrap().is_empty());
    assert!(harness.orchestrator.is_ready());
}

#[smol_potat::test]
async fn test_populated_store_skips_full_import() {
    let repository = FakeRepository::with_entries(vec![entry("orders", &[])]);
    let harness = Harness::new(Mode::Local, repository).await;
    harness
        .store
        .save_project(&project_orchestration::Project::new(
            "existing", "Existing", "", "camel-main",
        ))
        .await
        .unwrap();

    let report = harness.orchestrator.try_start().await.unwrap();

    assert!(!report.full_import);
    assert_eq!(harness.repository.list_calls.load(Ordering::SeqCst), 0);
    assert!(harness.store.get_project("orders").await.unwrap().is_none());
    for id in ["templates", "kamelets", "services"] {
        assert!(harness.store.get_project(id).await.unwrap().is_some());
    }
    assert!(harness.orchestrator.is_ready());
}

#[smol_potat::test]
async fn test_listing_failure_skips_import_but_still_ensures_baselines() {
    let repository = FakeRepository::default();
    repository.fail_listing.store(true, Ordering::SeqCst);
    let harness = Harness::new(Mode::Local, repository).await;

    let report = harness.orchestrator.try_start().await.unwrap();

    assert!(report.full_import);
    assert_eq!(report.imported, 0);
    assert_eq!(
        report.outcome(ProjectType::Templates),
        Some(&BaselineOutcome::Created)
    );
    assert!(harness.orchestrator.is_ready());
}

#[smol_potat::test]
async fn test_failed_baseline_commit_is_reported_and_not_repeated() {
    let repository = FakeRepository::default();
    repository.fail_commit.store(true, Ordering::SeqCst);
    let harness = Harness::new(Mode::Local, repository).await;

    let report = harness.orchestrator.try_start().await.unwrap();
    for project_type in ProjectType::BASELINE {
        assert!(matches!(
            report.outcome(project_type),
            Some(BaselineOutcome::Failed(msg)) if msg.contains("push rejected")
        ));
    }
    // Readiness does not depend on individual baseline steps
    assert!(harness.orchestrator.is_ready());

    // The projects were persisted before the commit failed
    harness.repository.fail_commit.store(false, Ordering::SeqCst);
    let again = harness.orchestrator.try_start().await.unwrap();
    assert_eq!(
        again.outcome(ProjectType::Kamelets),
        Some(&BaselineOutcome::AlreadyPresent)
    );
    let kamelets = harness.store.get_project("kamelets").await.unwrap().unwrap();
    assert!(kamelets.last_commit.is_empty());
}

#[smol_potat::test]
async fn test_unreachable_repository_is_not_ready() {
    let repository = FakeRepository::default();
    repository.unreachable.store(true, Ordering::SeqCst);
    let harness = Harness::new(Mode::Local, repository).await;

    let result = harness.orchestrator.try_start().await;

    assert!(matches!(result, Err(Error::NotReady(_))));
    assert!(!harness.orchestrator.is_ready());
    assert!(!harness.orchestrator.health().up);
    assert!(harness.store.list_projects().await.unwrap().is_empty());
}

#[smol_potat::test]
async fn test_uninitialized_store_is_not_ready() {
    let store = ProjectStore::with_backend(MemoryBackend::new());
    let harness = Harness::with_store(Mode::Local, FakeRepository::default(), store);

    assert!(matches!(
        harness.orchestrator.try_start().await,
        Err(Error::NotReady(_))
    ));
    assert!(!harness.orchestrator.is_ready());
    assert!(
        harness
            .orchestrator
            .list_projects(None)
            .await
            .unwrap()
            .is_empty()
    );
}

#[smol_potat::test]
async fn test_start_with_retry_waits_for_repository() {
    let repository = FakeRepository::default();
    repository.unreachable.store(true, Ordering::SeqCst);
    let harness = Harness::new(Mode::Local, repository).await;

    let repository = harness.repository.clone();
    let heal = smol::spawn(async move {
        smol::Timer::after(std::time::Duration::from_millis(30)).await;
        repository.unreachable.store(false, Ordering::SeqCst);
    });

    let policy = RetryPolicy {
        initial_delay_ms: 5,
        max_delay_ms: 20,
        max_attempts: None,
    };
    let report = harness.orchestrator.start_with_retry(&policy).await.unwrap();
    heal.await;

    assert!(report.full_import);
    assert!(harness.orchestrator.is_ready());
}

#[smol_potat::test]
async fn test_start_with_retry_gives_up() {
    let repository = FakeRepository::default();
    repository.unreachable.store(true, Ordering::SeqCst);
    let harness = Harness::new(Mode::Local, repository).await;

    let policy = RetryPolicy {
        initial_delay_ms: 1,
        max_delay_ms: 1,
        max_attempts: Some(3),
    };
    let result = harness.orchestrator.start_with_retry(&policy).await;

    assert!(matches!(result, Err(Error::NotReady(_))));
    assert!(!harness.orchestrator.is_ready());
}
