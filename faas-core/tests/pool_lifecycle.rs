//! Integration tests that spawn the real `faas-worker` binary (via
//! `CARGO_BIN_EXE_faas-worker`) against a throwaway function store, so the
//! pool lifecycle is exercised with real process spawn/kill/respawn rather
//! than a mock (§8 ambient test-tooling addition).

use std::path::PathBuf;
use std::time::Duration;

use faas_common::protocol::InvokeFrame;
use faas_core::config::{CoreConfig, SelectionPolicy};
use faas_core::{Dispatcher, Supervisor};
use faas_store::{FsFunctionStore, FunctionStore};

fn worker_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_faas-worker"))
}

#[tokio::test]
async fn happy_invoke_round_trips_through_a_real_worker() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsFunctionStore::new(dir.path());
    let descriptor = store.store("hello", "sh", b"echo HELLO").await.unwrap();

    let config = CoreConfig {
        pool_size: 1,
        worker_binary_path: worker_binary(),
        function_store_root: dir.path().to_path_buf(),
        ..CoreConfig::default()
    };
    let supervisor = Supervisor::new(config);
    supervisor.start().await;
    let dispatcher = Dispatcher::new(supervisor);

    let reply = dispatcher
        .invoke(InvokeFrame {
            fn_: descriptor.id,
            payload: String::new(),
        })
        .await;

    assert!(reply.ok, "expected ok reply, got {:?}", reply.error);
    assert_eq!(reply.output.unwrap(), "HELLO\n");
}

#[tokio::test]
async fn invoke_resolves_functions_by_name_too() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsFunctionStore::new(dir.path());
    store.store("hello", "sh", b"echo HELLO").await.unwrap();

    let config = CoreConfig {
        pool_size: 1,
        worker_binary_path: worker_binary(),
        function_store_root: dir.path().to_path_buf(),
        ..CoreConfig::default()
    };
    let supervisor = Supervisor::new(config);
    supervisor.start().await;
    let dispatcher = Dispatcher::new(supervisor);

    let reply = dispatcher
        .invoke(InvokeFrame {
            fn_: "hello".to_string(),
            payload: String::new(),
        })
        .await;

    assert!(reply.ok, "expected ok reply, got {:?}", reply.error);
}

#[tokio::test]
async fn round_robin_distributes_exactly_evenly_across_four_workers() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsFunctionStore::new(dir.path());
    let descriptor = store.store("who", "sh", b"echo $WORKER_ID").await.unwrap();

    let config = CoreConfig {
        pool_size: 4,
        policy: SelectionPolicy::RoundRobin,
        worker_binary_path: worker_binary(),
        function_store_root: dir.path().to_path_buf(),
        ..CoreConfig::default()
    };
    let supervisor = Supervisor::new(config);
    supervisor.start().await;
    let dispatcher = Dispatcher::new(supervisor);

    let mut counts = [0usize; 4];
    for _ in 0..40 {
        let reply = dispatcher
            .invoke(InvokeFrame {
                fn_: descriptor.id.clone(),
                payload: String::new(),
            })
            .await;
        assert!(reply.ok, "expected ok reply, got {:?}", reply.error);
        let worker_id: usize = reply.output.unwrap().trim().parse().unwrap();
        counts[worker_id] += 1;
    }

    assert_eq!(counts, [10, 10, 10, 10]);
}

#[tokio::test]
async fn pool_size_zero_yields_no_worker_on_every_invoke() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        pool_size: 0,
        worker_binary_path: worker_binary(),
        function_store_root: dir.path().to_path_buf(),
        ..CoreConfig::default()
    };
    let supervisor = Supervisor::new(config);
    supervisor.start().await;
    let dispatcher = Dispatcher::new(supervisor);

    let reply = dispatcher
        .invoke(InvokeFrame {
            fn_: "anything".to_string(),
            payload: String::new(),
        })
        .await;

    assert!(!reply.ok);
    assert_eq!(reply.error.as_deref(), Some("no worker available"));
}

#[tokio::test]
async fn killing_a_worker_is_recovered_by_respawn() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsFunctionStore::new(dir.path());
    let descriptor = store.store("hello", "sh", b"echo HELLO").await.unwrap();

    let config = CoreConfig {
        pool_size: 1,
        worker_binary_path: worker_binary(),
        function_store_root: dir.path().to_path_buf(),
        submit_deadline: Duration::from_millis(500),
        ..CoreConfig::default()
    };
    let supervisor = Supervisor::new(config);
    supervisor.start().await;

    let (_, _, pid, generation_before) = supervisor.slot_states()[0].clone();
    assert_ne!(pid, 0);
    let _ = nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    );

    // Give the reaper + respawn coordinator time to notice and restart.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let (_, state, _, generation_after) = supervisor.slot_states()[0].clone();
        if state == "Idle" && generation_after > generation_before {
            break;
        }
        if std::time::Instant::now() > deadline {
            panic!("slot never respawned after being killed: state={state}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let dispatcher = Dispatcher::new(supervisor);
    let reply = dispatcher
        .invoke(InvokeFrame {
            fn_: descriptor.id,
            payload: String::new(),
        })
        .await;
    assert!(reply.ok, "expected the respawned worker to serve the job, got {:?}", reply.error);
}

#[tokio::test]
async fn shutdown_terminates_every_live_worker_process() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig {
        pool_size: 2,
        worker_binary_path: worker_binary(),
        function_store_root: dir.path().to_path_buf(),
        shutdown_grace: Duration::from_millis(200),
        ..CoreConfig::default()
    };
    let supervisor = Supervisor::new(config);
    supervisor.start().await;

    let pids: Vec<u32> = supervisor
        .slot_states()
        .into_iter()
        .map(|(_, _, pid, _)| pid)
        .collect();
    assert!(pids.iter().all(|&pid| pid != 0));

    supervisor.shutdown().await;

    for pid in pids {
        let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok();
        assert!(!alive, "worker pid {pid} is still alive after shutdown");
    }
}
