//! Create/destroy orchestration against an in-memory store and recording
//! provisioner.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use tideway_core::{CommandError, CommandResult};
use tideway_lifecycle::{
    CleanupPolicy, CleanupQueue, LifecycleController, LifecycleError, ProvisionStep,
    ProvisionerClient, RepositoryCleaner,
};
use tideway_state::{App, AppState, AppStore, StateError, StateStore, Unit};

#[derive(Default)]
struct RecordingProvisioner {
    calls: Mutex<Vec<String>>,
    fail: Option<ProvisionStep>,
}

impl RecordingProvisioner {
    fn failing(step: ProvisionStep) -> Self {
        Self {
            fail: Some(step),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, step: ProvisionStep, call: String) -> CommandResult {
        self.calls.lock().unwrap().push(call.clone());
        if self.fail == Some(step) {
            Err(CommandError::Exit {
                program: "juju".to_string(),
                code: Some(1),
                output: format!("ERROR {step} refused"),
            })
        } else {
            Ok(format!("{call}: ok"))
        }
    }
}

impl ProvisionerClient for RecordingProvisioner {
    fn deploy(&self, framework: &str, name: &str) -> CommandResult {
        self.respond(ProvisionStep::Deploy, format!("deploy {framework} {name}"))
    }

    fn destroy_service(&self, name: &str) -> CommandResult {
        self.respond(ProvisionStep::DestroyService, format!("destroy-service {name}"))
    }

    fn terminate_machine(&self, machine: u32) -> CommandResult {
        self.respond(ProvisionStep::TerminateMachine, format!("terminate-machine {machine}"))
    }
}

#[derive(Default)]
struct RecordingCleaner {
    removed: Mutex<Vec<String>>,
}

impl RepositoryCleaner for RecordingCleaner {
    fn remove_repository(&self, app: &str) -> io::Result<()> {
        self.removed.lock().unwrap().push(app.to_string());
        Ok(())
    }
}

struct Harness {
    store: StateStore,
    provisioner: Arc<RecordingProvisioner>,
    cleaner: Arc<RecordingCleaner>,
    controller: LifecycleController,
    worker: JoinHandle<()>,
}

impl Harness {
    fn new(provisioner: RecordingProvisioner) -> Self {
        let store = StateStore::open_in_memory().unwrap();
        let provisioner = Arc::new(provisioner);
        let cleaner = Arc::new(RecordingCleaner::default());
        let policy = CleanupPolicy {
            max_attempts: 1,
            retry_delay: Duration::from_millis(1),
        };
        let (queue, worker) = CleanupQueue::spawn(cleaner.clone(), policy);
        let controller =
            LifecycleController::new(Arc::new(store.clone()), provisioner.clone(), queue);
        Self {
            store,
            provisioner,
            cleaner,
            controller,
            worker,
        }
    }

    /// Drop the controller (and with it the last queue handle) and wait for
    /// the cleanup worker to drain.
    async fn cleaned(self) -> Vec<String> {
        drop(self.controller);
        self.worker.await.unwrap();
        self.cleaner.removed.lock().unwrap().clone()
    }
}

fn messages(app: &App) -> Vec<&str> {
    app.logs.iter().map(|l| l.message.as_str()).collect()
}

fn deployed_app(name: &str, machine: u32) -> App {
    let mut app = App::new(name, "django");
    app.units.push(Unit {
        instance_id: format!("i-{machine}"),
        ip: "10.0.0.9".to_string(),
        machine,
        ..Unit::default()
    });
    app
}

// ── create ─────────────────────────────────────────────────────────

#[tokio::test]
async fn create_persists_and_deploys() {
    let h = Harness::new(RecordingProvisioner::default());
    let mut app = App::new("blog", "django");

    h.controller.create(&mut app).unwrap();

    assert_eq!(h.provisioner.calls(), ["deploy django blog"]);
    let stored = h.store.get_app("blog").unwrap().unwrap();
    assert_eq!(stored.state, AppState::Pending);
    assert_eq!(
        messages(&stored),
        [
            "creating app blog",
            "deploy django blog: ok",
            "app blog successfully created",
        ]
    );
    assert_eq!(stored.version, app.version);
}

#[tokio::test]
async fn failed_deploy_leaves_pending_record_with_output() {
    let h = Harness::new(RecordingProvisioner::failing(ProvisionStep::Deploy));
    let mut app = App::new("blog", "django");

    let err = h.controller.create(&mut app).unwrap_err();

    assert_eq!(err.step(), Some(ProvisionStep::Deploy));
    let stored = h.store.get_app("blog").unwrap().unwrap();
    assert_eq!(stored.state, AppState::Pending);
    assert_eq!(
        messages(&stored),
        ["creating app blog", "ERROR deploy refused"]
    );
}

#[tokio::test]
async fn create_rejects_invalid_name_before_store() {
    let h = Harness::new(RecordingProvisioner::default());
    let mut app = App::new("Not_Valid", "django");

    let err = h.controller.create(&mut app).unwrap_err();

    assert!(matches!(err, LifecycleError::Validation(_)));
    assert!(h.store.list_apps().unwrap().is_empty());
    assert!(h.provisioner.calls().is_empty());
}

#[tokio::test]
async fn create_rejects_duplicate_name() {
    let h = Harness::new(RecordingProvisioner::default());
    h.controller.create(&mut App::new("blog", "django")).unwrap();

    let err = h.controller.create(&mut App::new("blog", "rails")).unwrap_err();

    assert!(matches!(
        err,
        LifecycleError::State(StateError::AlreadyExists(_))
    ));
    assert_eq!(h.provisioner.calls(), ["deploy django blog"]);
}

// ── destroy ────────────────────────────────────────────────────────

#[tokio::test]
async fn destroy_tears_everything_down() {
    let h = Harness::new(RecordingProvisioner::default());
    let app = deployed_app("blog", 7);
    h.store.insert_app(&app).unwrap();

    h.controller.destroy(&app).unwrap();

    assert!(h.store.get_app("blog").unwrap().is_none());
    assert_eq!(
        h.provisioner.calls(),
        ["destroy-service blog", "terminate-machine 7"]
    );
    assert_eq!(h.cleaned().await, ["blog"]);
}

#[tokio::test]
async fn failed_destroy_service_skips_terminate_but_record_is_gone() {
    let h = Harness::new(RecordingProvisioner::failing(ProvisionStep::DestroyService));
    let app = deployed_app("blog", 7);
    h.store.insert_app(&app).unwrap();

    let err = h.controller.destroy(&app).unwrap_err();

    assert_eq!(err.step(), Some(ProvisionStep::DestroyService));
    assert!(err.to_string().contains("ERROR destroy-service refused"));
    assert!(h.store.get_app("blog").unwrap().is_none());
    assert_eq!(h.provisioner.calls(), ["destroy-service blog"]);
    // Cleanup was already dispatched.
    assert_eq!(h.cleaned().await, ["blog"]);
}

#[tokio::test]
async fn failed_terminate_is_reported() {
    let h = Harness::new(RecordingProvisioner::failing(ProvisionStep::TerminateMachine));
    let app = deployed_app("blog", 3);
    h.store.insert_app(&app).unwrap();

    let err = h.controller.destroy(&app).unwrap_err();

    assert_eq!(err.step(), Some(ProvisionStep::TerminateMachine));
    assert!(h.store.get_app("blog").unwrap().is_none());
}

#[tokio::test]
async fn destroy_without_units_skips_terminate() {
    let h = Harness::new(RecordingProvisioner::default());
    let app = App::new("blog", "django");
    h.store.insert_app(&app).unwrap();

    h.controller.destroy(&app).unwrap();

    assert_eq!(h.provisioner.calls(), ["destroy-service blog"]);
}

#[tokio::test]
async fn destroy_unknown_app_touches_nothing() {
    let h = Harness::new(RecordingProvisioner::default());

    let err = h.controller.destroy(&deployed_app("ghost", 1)).unwrap_err();

    assert!(matches!(err, LifecycleError::NotFound(_)));
    assert!(h.provisioner.calls().is_empty());
    assert!(h.cleaned().await.is_empty());
}

// ── reads ──────────────────────────────────────────────────────────

#[tokio::test]
async fn reads_go_through_the_store() {
    let h = Harness::new(RecordingProvisioner::default());
    let mut blog = App::new("blog", "django");
    blog.teams.push("admin".to_string());
    h.store.insert_app(&blog).unwrap();
    h.store.insert_app(&App::new("shop", "rails")).unwrap();

    assert_eq!(h.controller.get("blog").unwrap().framework, "django");
    assert!(matches!(
        h.controller.get("ghost"),
        Err(LifecycleError::NotFound(_))
    ));
    assert_eq!(h.controller.list().unwrap().len(), 2);

    let admin: Vec<_> = h
        .controller
        .apps_for_team("admin")
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(admin, ["blog"]);
}
