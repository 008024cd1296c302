use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, warn};

use courier_client::{Client, DiscoType};
use courier_core::{invite, Id, Identity, Keystore, NowFn};

use crate::error::WormholeError;
use crate::messaging::{ContentType, Frame, Message, MessageType};
use crate::transport::{Addr, Transport};

const QUEUE_CAPACITY: usize = 64;
/// Signalling records live 15 minutes.
const DISCO_TTL: Duration = Duration::from_secs(15 * 60);
const POLL_INITIAL: Duration = Duration::from_millis(500);
const POLL_MAX: Duration = Duration::from_secs(5);
/// Without a caller deadline, polling gives up after 10 minutes.
const POLL_GIVE_UP: Duration = Duration::from_secs(600);
const INVITE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    OfferPosted,
    Resolving,
    Connecting,
    Listening,
    Open,
    Closed,
}

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Callbacks {
    on_connect: Option<Callback>,
    on_close: Option<Callback>,
}

struct Inner {
    state: StdMutex<State>,
    pair: StdMutex<Option<(Id, Id)>>,
    callbacks: StdMutex<Callbacks>,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
    raw_rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    msg_rx: Mutex<Option<mpsc::Receiver<Message>>>,
}

impl Inner {
    fn mark_closed(&self) {
        let mut state = self.state.lock().expect("state lock");
        *state = State::Closed;
        self.closed_tx.send_replace(true);
    }

    /// Callback slots are taken on fire, so each runs at most once. They
    /// may run on an internal task; they must not block.
    fn fire_connect(&self) {
        let cb = {
            let mut callbacks = self.callbacks.lock().expect("callbacks lock");
            callbacks.on_connect.take()
        };
        if let Some(cb) = cb {
            cb();
        }
    }

    fn fire_close(&self) {
        let cb = {
            let mut callbacks = self.callbacks.lock().expect("callbacks lock");
            callbacks.on_close.take()
        };
        if let Some(cb) = cb {
            cb();
        }
    }
}

/// A peer-to-peer session between two identity keys. The exchange server
/// brokers the offer/answer swap; everything after `Open` flows directly
/// over the datagram transport.
#[derive(Clone)]
pub struct Wormhole {
    client: Client,
    keystore: Keystore,
    transport: Arc<dyn Transport>,
    now_fn: Arc<StdMutex<NowFn>>,
    inner: Arc<Inner>,
}

impl Wormhole {
    pub fn new(
        server_url: &str,
        keystore: Keystore,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, WormholeError> {
        let client = Client::new(server_url)?;
        let (closed_tx, closed_rx) = watch::channel(false);
        Ok(Self {
            client,
            keystore,
            transport,
            now_fn: Arc::new(StdMutex::new(Arc::new(Utc::now))),
            inner: Arc::new(Inner {
                state: StdMutex::new(State::Idle),
                pair: StdMutex::new(None),
                callbacks: StdMutex::new(Callbacks::default()),
                closed_tx,
                closed_rx,
                raw_rx: Mutex::new(None),
                msg_rx: Mutex::new(None),
            }),
        })
    }

    pub fn set_time_now(&self, now_fn: NowFn) {
        self.client.set_time_now(now_fn.clone());
        let mut guard = self.now_fn.lock().expect("clock lock");
        *guard = now_fn;
    }

    pub fn on_connect(&self, f: impl FnOnce() + Send + 'static) {
        let mut callbacks = self.inner.callbacks.lock().expect("callbacks lock");
        callbacks.on_connect = Some(Box::new(f));
    }

    pub fn on_close(&self, f: impl FnOnce() + Send + 'static) {
        let mut callbacks = self.inner.callbacks.lock().expect("callbacks lock");
        callbacks.on_close = Some(Box::new(f));
    }

    pub fn state(&self) -> State {
        *self.inner.state.lock().expect("state lock")
    }

    fn set_state(&self, state: State) {
        let mut guard = self.inner.state.lock().expect("state lock");
        *guard = state;
    }

    fn now(&self) -> DateTime<Utc> {
        let now_fn = self.now_fn.lock().expect("clock lock");
        now_fn()
    }

    fn is_closed(&self) -> bool {
        *self.inner.closed_rx.borrow()
    }

    /// Post an offer under disco and publish a fresh invite code for it,
    /// regenerating on code collision.
    pub async fn create_offer(
        &self,
        sender: Id,
        recipient: Id,
    ) -> Result<(Addr, String), WormholeError> {
        let key = self
            .keystore
            .identity(&sender)
            .ok_or(WormholeError::NotFound(sender))?;

        let offer = self.transport.local_addr();
        self.client
            .put_disco(&key, &recipient, DiscoType::Offer, &offer.to_sdp(), DISCO_TTL)
            .await?;

        let mut code = invite::generate_code();
        let mut attempts = 1;
        loop {
            match self.client.put_invite(&key, &recipient, &code).await {
                Ok(()) => break,
                Err(err)
                    if err.is_status(400, "invite code collision")
                        && attempts < INVITE_ATTEMPTS =>
                {
                    attempts += 1;
                    code = invite::generate_code();
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.set_state(State::OfferPosted);
        debug!(sender = %sender, recipient = %recipient, "offer posted");
        Ok((offer, code))
    }

    /// Dial the peer: poll disco for its answer, then bring the transport
    /// up. `offer` is the address posted by `create_offer`.
    pub async fn connect(
        &self,
        sender: Id,
        recipient: Id,
        offer: &Addr,
        deadline: Option<Duration>,
    ) -> Result<(), WormholeError> {
        let key = self
            .keystore
            .identity(&sender)
            .ok_or(WormholeError::NotFound(sender))?;

        debug!(offer = %offer, recipient = %recipient, "connecting");
        self.set_state(State::Connecting);

        let at = deadline.map(|d| Instant::now() + d);
        let transport = self.transport.clone();
        self.with_deadline(at, async {
            let sdp = self
                .poll_disco(&recipient, &key, DiscoType::Answer)
                .await?;
            let answer = Addr::from_sdp(&sdp)?;
            transport.connect(&answer).await?;
            Ok(())
        })
        .await?;

        self.open_session(sender, recipient).await;
        Ok(())
    }

    /// Answer an offer: post the answer under disco and wait for the peer
    /// to dial. Fails `not found <id>` when `own` has no key here or `peer`
    /// is unknown to the keystore.
    pub async fn listen(
        &self,
        own: Id,
        peer: Id,
        offer: &Addr,
        deadline: Option<Duration>,
    ) -> Result<(), WormholeError> {
        let at = deadline.map(|d| Instant::now() + d);
        self.listen_at(own, peer, offer, at).await
    }

    async fn listen_at(
        &self,
        own: Id,
        peer: Id,
        offer: &Addr,
        at: Option<Instant>,
    ) -> Result<(), WormholeError> {
        let key = self
            .keystore
            .identity(&own)
            .ok_or(WormholeError::NotFound(own))?;
        if !self.keystore.contains(&peer) {
            return Err(WormholeError::NotFound(peer));
        }

        let answer = self.transport.local_addr();
        self.client
            .put_disco(&key, &peer, DiscoType::Answer, &answer.to_sdp(), DISCO_TTL)
            .await?;
        self.set_state(State::Listening);
        debug!(offer = %offer, answer = %answer, "listening");

        let transport = self.transport.clone();
        let offer = offer.clone();
        self.with_deadline(at, async move {
            transport.accept(&offer).await.map_err(WormholeError::from)
        })
        .await?;

        self.open_session(own, peer).await;
        Ok(())
    }

    /// Resolve an invite code to its identity pair, fetch the offer, and
    /// listen.
    pub async fn listen_by_invite(
        &self,
        code: &str,
        deadline: Option<Duration>,
    ) -> Result<(), WormholeError> {
        let at = deadline.map(|d| Instant::now() + d);

        let requester_id = self
            .keystore
            .identities()
            .into_iter()
            .next()
            .ok_or(WormholeError::NoIdentity)?;
        let requester = self
            .keystore
            .identity(&requester_id)
            .ok_or(WormholeError::NoIdentity)?;

        self.set_state(State::Resolving);
        let resolved = self
            .client
            .resolve_invite(&requester, code)
            .await?
            .ok_or(WormholeError::InviteNotFound)?;
        debug!(sender = %resolved.sender, recipient = %resolved.recipient, "invite resolved");

        let own_key = self
            .keystore
            .identity(&resolved.recipient)
            .ok_or(WormholeError::NotFound(resolved.recipient))?;

        let sdp = self
            .with_deadline(
                at,
                self.poll_disco(&resolved.sender, &own_key, DiscoType::Offer),
            )
            .await?;
        let offer = Addr::from_sdp(&sdp)?;

        self.listen_at(resolved.recipient, resolved.sender, &offer, at).await
    }

    /// Write raw bytes to the peer.
    pub async fn write(&self, data: &[u8]) -> Result<(), WormholeError> {
        if self.is_closed() {
            return Err(WormholeError::Closed);
        }
        let frame = Frame::Raw(data.to_vec());
        self.transport.send(&frame.to_bytes()?).await?;
        Ok(())
    }

    /// Next raw payload from the peer.
    pub async fn read(&self) -> Result<Vec<u8>, WormholeError> {
        let mut guard = self.inner.raw_rx.lock().await;
        match guard.as_mut() {
            Some(rx) => rx.recv().await.ok_or(WormholeError::Closed),
            None if self.is_closed() => Err(WormholeError::Closed),
            None => Err(WormholeError::NotConnected),
        }
    }

    /// Send a framed message; returns the local `pending` record. The peer's
    /// ack arrives later through [`Wormhole::read_message`].
    pub async fn write_message(
        &self,
        id: &str,
        data: &[u8],
        kind: ContentType,
    ) -> Result<Message, WormholeError> {
        if self.is_closed() {
            return Err(WormholeError::Closed);
        }
        let pair = *self.inner.pair.lock().expect("pair lock");
        let (own, _) = pair.ok_or(WormholeError::NotConnected)?;

        let now = self.now();
        let frame = Frame::Msg {
            id: id.to_string(),
            from: own,
            content_type: kind,
            content: data.to_vec(),
            ts: now.timestamp_millis(),
        };
        self.transport.send(&frame.to_bytes()?).await?;

        Ok(Message {
            id: id.to_string(),
            typ: MessageType::Pending,
            content: data.to_vec(),
            timestamp: now,
        })
    }

    /// Next inbound message or ack. Non-blocking reads return `would block`
    /// when the queue is empty.
    pub async fn read_message(&self, blocking: bool) -> Result<Message, WormholeError> {
        let mut guard = self.inner.msg_rx.lock().await;
        let Some(rx) = guard.as_mut() else {
            return if self.is_closed() {
                Err(WormholeError::Closed)
            } else {
                Err(WormholeError::NotConnected)
            };
        };

        if blocking {
            rx.recv().await.ok_or(WormholeError::Closed)
        } else {
            match rx.try_recv() {
                Ok(msg) => Ok(msg),
                Err(mpsc::error::TryRecvError::Empty) => Err(WormholeError::WouldBlock),
                Err(mpsc::error::TryRecvError::Disconnected) => Err(WormholeError::Closed),
            }
        }
    }

    /// Tear the session down: signal the peer in-band, close the transport,
    /// fire `on_close`. Idempotent.
    pub async fn close(&self) {
        if self.is_closed() {
            return;
        }
        if let Ok(bytes) = Frame::Close.to_bytes() {
            let _ = self.transport.send(&bytes).await;
        }
        self.inner.mark_closed();
        self.transport.close().await;
        self.inner.fire_close();
    }

    async fn open_session(&self, own: Id, peer: Id) {
        {
            let mut pair = self.inner.pair.lock().expect("pair lock");
            *pair = Some((own, peer));
        }
        let (raw_tx, raw_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (msg_tx, msg_rx) = mpsc::channel(QUEUE_CAPACITY);
        {
            let mut guard = self.inner.raw_rx.lock().await;
            *guard = Some(raw_rx);
        }
        {
            let mut guard = self.inner.msg_rx.lock().await;
            *guard = Some(msg_rx);
        }
        self.set_state(State::Open);
        self.spawn_reader(peer, raw_tx, msg_tx);
        self.inner.fire_connect();
        debug!(own = %own, peer = %peer, "session open");
    }

    fn spawn_reader(
        &self,
        peer: Id,
        raw_tx: mpsc::Sender<Vec<u8>>,
        msg_tx: mpsc::Sender<Message>,
    ) {
        let transport = self.transport.clone();
        let inner = self.inner.clone();
        let mut closed_rx = self.inner.closed_rx.clone();
        tokio::spawn(async move {
            let mut seen: HashSet<String> = HashSet::new();
            loop {
                if *closed_rx.borrow_and_update() {
                    break;
                }
                let bytes = tokio::select! {
                    _ = closed_rx.changed() => break,
                    res = transport.recv() => match res {
                        Ok(bytes) => bytes,
                        Err(_) => break,
                    },
                };
                let frame = match Frame::from_bytes(&bytes) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(error = %err, "dropping undecodable frame");
                        continue;
                    }
                };
                match frame {
                    Frame::Raw(data) => {
                        if raw_tx.send(data).await.is_err() {
                            break;
                        }
                    }
                    Frame::Msg {
                        id,
                        from,
                        content_type,
                        content,
                        ts,
                    } => {
                        if from != peer {
                            debug!(from = %from, "dropping frame from unbound identity");
                            continue;
                        }
                        if !seen.insert(id.clone()) {
                            continue;
                        }
                        let ack = Frame::Ack { id: id.clone() };
                        if let Ok(bytes) = ack.to_bytes() {
                            let _ = transport.send(&bytes).await;
                        }
                        let msg = Message {
                            id,
                            typ: match content_type {
                                ContentType::Utf8 => MessageType::Utf8,
                                ContentType::Binary => MessageType::Binary,
                            },
                            content,
                            timestamp: DateTime::from_timestamp_millis(ts)
                                .unwrap_or_else(Utc::now),
                        };
                        if msg_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Frame::Ack { id } => {
                        let msg = Message {
                            id,
                            typ: MessageType::Ack,
                            content: Vec::new(),
                            timestamp: Utc::now(),
                        };
                        if msg_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Frame::Close => break,
                }
            }
            // Dropping the queue senders fails pending reads with `closed`.
            inner.mark_closed();
            inner.fire_close();
        });
    }

    /// Poll disco with backoff (500 ms growing to 5 s) until the record
    /// appears, the session closes, or the deadline/give-up elapses.
    async fn poll_disco(
        &self,
        sender: &Id,
        recipient: &Identity,
        typ: DiscoType,
    ) -> Result<String, WormholeError> {
        let mut delay = POLL_INITIAL;
        let started = Instant::now();
        let mut closed_rx = self.inner.closed_rx.clone();
        loop {
            if *closed_rx.borrow() {
                return Err(WormholeError::Closed);
            }
            if let Some(data) = self.client.get_disco(sender, recipient, typ).await? {
                return Ok(data);
            }
            if started.elapsed() >= POLL_GIVE_UP {
                return Err(WormholeError::DeadlineExceeded);
            }
            tokio::select! {
                _ = sleep(delay) => {}
                _ = closed_rx.changed() => return Err(WormholeError::Closed),
            }
            delay = (delay * 3 / 2).min(POLL_MAX);
        }
    }

    /// A deadline error dominates whatever the inner operation was doing.
    async fn with_deadline<T, F>(
        &self,
        deadline: Option<Instant>,
        fut: F,
    ) -> Result<T, WormholeError>
    where
        F: Future<Output = Result<T, WormholeError>>,
    {
        match deadline {
            Some(at) => match timeout_at(at, fut).await {
                Ok(res) => res,
                Err(_) => Err(WormholeError::DeadlineExceeded),
            },
            None => fut.await,
        }
    }
}
