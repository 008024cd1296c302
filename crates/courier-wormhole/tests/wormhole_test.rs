use std::sync::Arc;
use std::time::Duration;

use courier_core::rand_id::rand_base62;
use courier_core::{Identity, Keystore};
use courier_server::{build_router, AppState};
use courier_store::testing::TestClock;
use courier_store::Mem;
use courier_wormhole::{new_id, Addr, ContentType, MemoryHub, MessageType, Wormhole};

struct Env {
    base_url: String,
    clock: TestClock,
    hub: MemoryHub,
}

async fn test_env() -> Env {
    let clock = TestClock::at(1_234_567_890_000);
    let store = Arc::new(Mem::new());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let state = AppState::new(store, base_url.clone(), rand_base62(32));
    state.set_time_now(clock.now_fn());

    let router = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Env {
        base_url,
        clock,
        hub: MemoryHub::new(),
    }
}

fn alice() -> Identity {
    Identity::from_seed(&[0x01; 32])
}

fn bob() -> Identity {
    Identity::from_seed(&[0x02; 32])
}

fn wormhole(env: &Env, keystore: Keystore) -> Wormhole {
    let wh = Wormhole::new(
        &env.base_url,
        keystore,
        Arc::new(env.hub.endpoint()),
    )
    .unwrap();
    wh.set_time_now(env.clock.now_fn());
    wh
}

async fn run_rendezvous(env: &Env, use_invite: bool) {
    let (alice, bob) = (alice(), bob());

    let ksa = Keystore::new();
    ksa.save_identity(alice.clone());
    ksa.save_public_key(bob.id());

    let ksb = Keystore::new();
    ksb.save_identity(bob.clone());
    ksb.save_public_key(alice.id());

    let wha = wormhole(env, ksa);
    let whb = wormhole(env, ksb);

    let (connect_tx, mut connect_rx) = tokio::sync::mpsc::channel::<()>(2);
    let tx = connect_tx.clone();
    wha.on_connect(move || {
        let _ = tx.try_send(());
    });
    let tx = connect_tx;
    whb.on_connect(move || {
        let _ = tx.try_send(());
    });

    let (offer, invite_code) = wha.create_offer(alice.id(), bob.id()).await.unwrap();
    assert!(!invite_code.is_empty());

    let dialer = {
        let wha = wha.clone();
        let (alice_id, bob_id, offer) = (alice.id(), bob.id(), offer.clone());
        tokio::spawn(async move {
            wha.connect(alice_id, bob_id, &offer, Some(Duration::from_secs(10)))
                .await
                .unwrap();
        })
    };

    if use_invite {
        whb.listen_by_invite(&invite_code, Some(Duration::from_secs(10)))
            .await
            .unwrap();
    } else {
        whb.listen(bob.id(), alice.id(), &offer, Some(Duration::from_secs(10)))
            .await
            .unwrap();
    }
    dialer.await.unwrap();

    connect_rx.recv().await.unwrap();
    connect_rx.recv().await.unwrap();

    // Raw ping/pong.
    wha.write(b"ping").await.unwrap();
    assert_eq!(whb.read().await.unwrap(), b"ping");
    whb.write(b"pong").await.unwrap();
    assert_eq!(wha.read().await.unwrap(), b"pong");

    // Framed message with pending/ack lifecycle.
    let id = new_id();
    let pending = wha
        .write_message(&id, b"ping", ContentType::Utf8)
        .await
        .unwrap();
    assert_eq!(pending.typ, MessageType::Pending);
    assert_eq!(pending.id, id);

    let msg = whb.read_message(true).await.unwrap();
    assert_eq!(msg.typ, MessageType::Utf8);
    assert_eq!(msg.content, b"ping");
    assert_eq!(msg.id, id);

    let reply = wha.read_message(true).await.unwrap();
    assert_eq!(reply.typ, MessageType::Ack);
    assert_eq!(reply.id, id);

    // Close: both sides observe it exactly once, and the peer's pending
    // read fails with `closed`.
    let (close_tx, mut close_rx) = tokio::sync::mpsc::channel::<()>(2);
    let tx = close_tx.clone();
    wha.on_close(move || {
        let _ = tx.try_send(());
    });
    let tx = close_tx;
    whb.on_close(move || {
        let _ = tx.try_send(());
    });

    wha.close().await;

    let err = whb.read_message(true).await.unwrap_err();
    assert_eq!(err.to_string(), "closed");

    close_rx.recv().await.unwrap();
    close_rx.recv().await.unwrap();
}

#[tokio::test]
async fn test_wormhole_rendezvous() {
    let env = test_env().await;
    run_rendezvous(&env, false).await;
}

#[tokio::test]
async fn test_wormhole_rendezvous_by_invite() {
    let env = test_env().await;
    run_rendezvous(&env, true).await;
}

#[tokio::test]
async fn test_wormhole_no_recipient() {
    let env = test_env().await;
    let (alice, bob) = (alice(), bob());

    let ksa = Keystore::new();
    ksa.save_identity(alice.clone());
    ksa.save_public_key(bob.id());

    // Bob never saved alice's public key.
    let ksb = Keystore::new();
    ksb.save_identity(bob.clone());

    let wha = wormhole(&env, ksa);
    let whb = wormhole(&env, ksb);

    let (offer, _) = wha.create_offer(alice.id(), bob.id()).await.unwrap();
    // Alice does not connect.

    let err = whb
        .listen(bob.id(), alice.id(), &offer, Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), format!("not found {}", alice.id()));
}

#[tokio::test]
async fn test_wormhole_cancel() {
    let env = test_env().await;
    let (alice, bob) = (alice(), bob());

    let ksa = Keystore::new();
    ksa.save_identity(alice.clone());
    ksa.save_public_key(bob.id());

    let wha = wormhole(&env, ksa);

    // Nobody dials this offer, so listen runs into its deadline.
    let offer = Addr {
        ip: "127.0.0.1".to_string(),
        port: 1234,
    };
    let err = wha
        .listen(
            alice.id(),
            bob.id(),
            &offer,
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "context deadline exceeded");
}

#[tokio::test]
async fn test_wormhole_connect_deadline() {
    let env = test_env().await;
    let (alice, bob) = (alice(), bob());

    let ksa = Keystore::new();
    ksa.save_identity(alice.clone());
    ksa.save_public_key(bob.id());

    let wha = wormhole(&env, ksa);

    // No answer is ever posted.
    let (offer, _) = wha.create_offer(alice.id(), bob.id()).await.unwrap();
    let err = wha
        .connect(
            alice.id(),
            bob.id(),
            &offer,
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "context deadline exceeded");
}

#[tokio::test]
async fn test_listen_by_invite_unknown_code() {
    let env = test_env().await;
    let bob = bob();

    let ksb = Keystore::new();
    ksb.save_identity(bob.clone());

    let whb = wormhole(&env, ksb);

    let code = courier_core::invite::generate_code();
    let err = whb
        .listen_by_invite(&code, Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "invite not found");
}

#[tokio::test]
async fn test_duplicate_frames_dropped() {
    let env = test_env().await;
    let (alice, bob) = (alice(), bob());

    let ksa = Keystore::new();
    ksa.save_identity(alice.clone());
    ksa.save_public_key(bob.id());
    let ksb = Keystore::new();
    ksb.save_identity(bob.clone());
    ksb.save_public_key(alice.id());

    let wha = wormhole(&env, ksa);
    let whb = wormhole(&env, ksb);

    let (offer, _) = wha.create_offer(alice.id(), bob.id()).await.unwrap();
    let dialer = {
        let wha = wha.clone();
        let (alice_id, bob_id, offer) = (alice.id(), bob.id(), offer.clone());
        tokio::spawn(async move {
            wha.connect(alice_id, bob_id, &offer, Some(Duration::from_secs(10)))
                .await
                .unwrap();
        })
    };
    whb.listen(bob.id(), alice.id(), &offer, Some(Duration::from_secs(10)))
        .await
        .unwrap();
    dialer.await.unwrap();

    // The same message id sent twice surfaces once at the receiver.
    let id = new_id();
    wha.write_message(&id, b"once", ContentType::Utf8)
        .await
        .unwrap();
    wha.write_message(&id, b"once", ContentType::Utf8)
        .await
        .unwrap();
    let follow_up = new_id();
    wha.write_message(&follow_up, b"after", ContentType::Binary)
        .await
        .unwrap();

    let first = whb.read_message(true).await.unwrap();
    assert_eq!(first.id, id);
    let second = whb.read_message(true).await.unwrap();
    assert_eq!(second.id, follow_up);
    assert_eq!(second.typ, MessageType::Binary);
}
