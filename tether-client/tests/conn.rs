use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tether_client::transport::{MemoryDialer, MemoryTransport};
use tether_client::{Conn, Handler, Options};
use tether_crypto::AuthKey;
use tether_mtproto::exchange::BoxFuture;
use tether_mtproto::{
    Cipher, Dialer, EncryptedMessage, ExchangeError, ExchangeResult, KeyExchange, MessageId, MessageType,
    Mtproto2Cipher, PublicKey, ServerExchangeResult, Session, Transport,
};
use tether_rpc::InvocationError;
use tether_tl::{Deserializable, Identifiable, RawVec, Serializable, enums, functions, peek_id, types};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SESSION_ID: i64 = 0x5e55_1011;

// ── Fake server ───────────────────────────────────────────────────────────────

fn auth_key() -> AuthKey {
    let mut data = [0u8; 256];
    for (i, b) in data.iter_mut().enumerate() {
        *b = (i * 7 + 3) as u8;
    }
    AuthKey::from_bytes(data)
}

/// The server end of a memory pipe, speaking the encrypted envelope.
struct Server {
    end:     MemoryTransport,
    keys:    ServerExchangeResult,
    cipher:  Mtproto2Cipher,
    last_id: i64,
}

impl Server {
    fn new(end: MemoryTransport) -> Self {
        Self::with_keys(end, ServerExchangeResult { auth_key: auth_key(), server_salt: 1 })
    }

    fn with_keys(end: MemoryTransport, keys: ServerExchangeResult) -> Self {
        Self { end, keys, cipher: Mtproto2Cipher::server(), last_id: 0 }
    }

    async fn recv(&mut self) -> EncryptedMessage {
        let mut frame = self.end.recv().await.expect("client frame");
        self.cipher.decrypt(&self.keys.auth_key, &mut frame).expect("client frame decrypts")
    }

    /// The next client message that is not an ack, with any gzip layer
    /// removed from its body.
    async fn recv_request(&mut self) -> EncryptedMessage {
        loop {
            let mut msg = self.recv().await;
            match peek_id(&msg.body).unwrap() {
                types::MsgsAck::CONSTRUCTOR_ID => continue,
                types::GzipPacked::CONSTRUCTOR_ID => {
                    msg.body = types::GzipPacked::from_bytes(&msg.body).unwrap().decompress().unwrap();
                    return msg;
                }
                _ => return msg,
            }
        }
    }

    fn next_id(&mut self) -> i64 {
        let mut id = MessageId::new(SystemTime::now(), MessageType::FromServer).0;
        if id <= self.last_id {
            id = self.last_id + 4;
        }
        self.last_id = id;
        id
    }

    fn seal(&self, msg_id: i64, session_id: i64, seq_no: i32, body: Vec<u8>) -> Vec<u8> {
        let msg = EncryptedMessage { salt: self.keys.server_salt, session_id, msg_id, seq_no, body };
        self.cipher.encrypt(&self.keys.auth_key, &msg).unwrap()
    }

    async fn send(&mut self, seq_no: i32, body: Vec<u8>) -> i64 {
        let msg_id = self.next_id();
        let frame = self.seal(msg_id, SESSION_ID, seq_no, body);
        self.end.send(&frame).await.unwrap();
        msg_id
    }

    async fn reply(&mut self, req_msg_id: i64, result: Vec<u8>) -> i64 {
        self.send(1, types::RpcResult { req_msg_id, result }.to_bytes()).await
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

struct NoExchange;

impl KeyExchange<MemoryTransport> for NoExchange {
    fn client<'a>(&'a self, _: &'a MemoryTransport, _: &'a [PublicKey]) -> BoxFuture<'a, Result<ExchangeResult, ExchangeError>> {
        Box::pin(async { Err(ExchangeError::Malformed("a stored key is configured".into())) })
    }
}

/// Writes a marker over the transport, then yields a canned outcome.
struct ScriptedExchange(Mutex<Option<Result<ExchangeResult, ExchangeError>>>);

impl KeyExchange<MemoryTransport> for ScriptedExchange {
    fn client<'a>(&'a self, transport: &'a MemoryTransport, _: &'a [PublicKey]) -> BoxFuture<'a, Result<ExchangeResult, ExchangeError>> {
        Box::pin(async move {
            transport.send(b"req_pq").await?;
            self.0.lock().unwrap().take().expect("exchange runs once")
        })
    }
}

#[derive(Default)]
struct Recorder {
    messages: Mutex<Option<mpsc::UnboundedSender<i64>>>,
    sessions: Mutex<Vec<Session>>,
}

impl Handler for Recorder {
    fn on_message(&self, msg_id: i64, _: &[u8]) -> Result<(), InvocationError> {
        if let Some(tx) = self.messages.lock().unwrap().as_ref() {
            tx.send(msg_id).unwrap();
        }
        Ok(())
    }

    fn on_session(&self, session: &Session) -> Result<(), InvocationError> {
        self.sessions.lock().unwrap().push(session.clone());
        Ok(())
    }
}

fn options() -> Options {
    Options {
        auth_key:      Some(auth_key()),
        session_id:    SESSION_ID,
        salt:          1,
        ping_interval: Duration::from_secs(3600),
        ..Default::default()
    }
}

fn setup(opts: Options) -> (Conn<MemoryDialer>, Server) {
    let (client, server) = MemoryTransport::pair();
    let conn = Conn::new(MemoryDialer::new(client), Arc::new(NoExchange), opts);
    (conn, Server::new(server))
}

fn spawn_run<D, F, Fut>(conn: &Conn<D>, shutdown: &CancellationToken, f: F) -> JoinHandle<Result<(), InvocationError>>
where
    D: Dialer,
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), InvocationError>> + Send + 'static,
{
    let conn = conn.clone();
    let shutdown = shutdown.clone();
    tokio::spawn(async move { conn.run(shutdown, f).await })
}

fn until_cancelled(token: CancellationToken) -> impl Future<Output = Result<(), InvocationError>> {
    async move {
        token.cancelled().await;
        Ok(())
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ping_round_trip_is_acked() {
    let (conn, mut server) = setup(Options { ack_batch_size: 1, ..options() });
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();

    let client = conn.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |cancel| async move {
        let pong = client.invoke(&cancel, &functions::Ping { ping_id: 7 }).await?;
        assert_eq!(pong.ping_id, 7);
        let _ = done_rx.await;
        Ok(())
    });

    let req = server.recv_request().await;
    assert_eq!(req.seq_no & 1, 1, "requests are content messages");
    assert_eq!(req.salt, 1);
    assert_eq!(functions::Ping::from_bytes(&req.body).unwrap(), functions::Ping { ping_id: 7 });

    let pong = types::Pong { msg_id: req.msg_id, ping_id: 7 };
    let result_id = server.reply(req.msg_id, pong.to_bytes()).await;

    let ack = server.recv().await;
    assert_eq!(ack.seq_no & 1, 0, "acks are service messages");
    assert_eq!(types::MsgsAck::from_bytes(&ack.body).unwrap().msg_ids, vec![result_id]);

    done_tx.send(()).unwrap();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn server_error_reaches_caller() {
    let (conn, mut server) = setup(options());
    let client = conn.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |cancel| async move {
        let err = client.invoke(&cancel, &functions::Ping { ping_id: 1 }).await.unwrap_err();
        assert!(err.is("FLOOD_WAIT"));
        Ok(())
    });

    let req = server.recv_request().await;
    let error = types::RpcError { error_code: 420, error_message: "FLOOD_WAIT_5".into() };
    server.reply(req.msg_id, error.to_bytes()).await;

    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn bad_server_salt_is_retried_transparently() {
    let (conn, mut server) = setup(options());
    let client = conn.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |cancel| async move {
        let pong = client.invoke(&cancel, &functions::Ping { ping_id: 3 }).await?;
        assert_eq!(pong.ping_id, 3);
        assert_eq!(client.session().salt, 77);
        Ok(())
    });

    let first = server.recv_request().await;
    assert_eq!(first.salt, 1);
    let bad = types::BadServerSalt {
        bad_msg_id:      first.msg_id,
        bad_msg_seqno:   first.seq_no,
        error_code:      48,
        new_server_salt: 77,
    };
    server.send(0, bad.to_bytes()).await;

    let second = server.recv_request().await;
    assert_eq!(second.salt, 77);
    assert_eq!((second.msg_id, second.seq_no), (first.msg_id, first.seq_no));
    assert_eq!(second.body, first.body);

    server.reply(second.msg_id, types::Pong { msg_id: second.msg_id, ping_id: 3 }.to_bytes()).await;
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancellation_drops_the_exact_request() {
    let (conn, mut server) = setup(options());
    let req_cancel = CancellationToken::new();

    let client = conn.clone();
    let token = req_cancel.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |_| async move {
        let err = client.invoke(&token, &functions::Ping { ping_id: 9 }).await.unwrap_err();
        assert!(matches!(err, InvocationError::Cancelled), "{err}");
        Ok(())
    });

    let req = server.recv_request().await;
    req_cancel.cancel();

    let drop = server.recv_request().await;
    assert_eq!(functions::RpcDropAnswer::from_bytes(&drop.body).unwrap().req_msg_id, req.msg_id);
    assert_ne!(drop.msg_id, req.msg_id);
    server.reply(drop.msg_id, enums::RpcDropAnswer::DroppedRunning.to_bytes()).await;

    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn gzip_results_and_containers_are_transparent() {
    let (conn, mut server) = setup(Options { compress_threshold: 8, ..options() });
    let client = conn.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |cancel| async move {
        let a = client.invoke(&cancel, &functions::Ping { ping_id: 100 }).await?;
        let b = client.invoke(&cancel, &functions::Ping { ping_id: 200 }).await?;
        assert_eq!((a.ping_id, b.ping_id), (100, 200));
        Ok(())
    });

    // A gzip-packed result inside a container.
    let req = server.recv_request().await;
    assert_eq!(functions::Ping::from_bytes(&req.body).unwrap().ping_id, 100);
    let pong = types::Pong { msg_id: req.msg_id, ping_id: 100 }.to_bytes();
    let result = types::RpcResult { req_msg_id: req.msg_id, result: types::GzipPacked::compress(&pong).unwrap().to_bytes() };
    let container = types::MsgContainer {
        messages: RawVec(vec![
            types::ContainerMessage { msg_id: server.next_id(), seq_no: 0, body: types::MsgsAck { msg_ids: vec![req.msg_id] }.to_bytes() },
            types::ContainerMessage { msg_id: server.next_id(), seq_no: 1, body: result.to_bytes() },
        ]),
    };
    server.send(0, container.to_bytes()).await;

    // A gzip-packed rpc_result at the top level.
    let req = server.recv_request().await;
    let pong = types::Pong { msg_id: req.msg_id, ping_id: 200 }.to_bytes();
    let result = types::RpcResult { req_msg_id: req.msg_id, result: pong };
    server.send(1, types::GzipPacked::compress(&result.to_bytes()).unwrap().to_bytes()).await;

    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_resolves_pending_requests() {
    let (conn, mut server) = setup(options());
    let shutdown = CancellationToken::new();
    let (result_tx, result_rx) = tokio::sync::oneshot::channel();

    let client = conn.clone();
    let run = spawn_run(&conn, &shutdown, move |_| async move {
        let res = client.invoke_raw(&CancellationToken::new(), &functions::Ping { ping_id: 1 }.to_bytes()).await;
        let _ = result_tx.send(res);
        Ok(())
    });

    server.recv_request().await;
    shutdown.cancel();

    let res = result_rx.await.unwrap();
    assert!(matches!(res, Err(InvocationError::EngineClosed)), "{res:?}");
    run.await.unwrap().unwrap();
    assert!(server.end.is_closed());
}

// ── Session ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_created_opens_gate_and_fetches_salts() {
    let handler = Arc::new(Recorder::default());
    let (conn, mut server) = setup(Options { handler: handler.clone(), ..options() });
    assert!(!conn.is_ready());

    let client = conn.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |_| async move {
        client.ready().await;
        tokio::time::timeout(Duration::from_secs(5), async {
            while client.session().salt != 900 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .map_err(|_| InvocationError::Timeout("salt update"))?;
        Ok(())
    });

    let created = types::NewSessionCreated {
        first_msg_id: MessageId::new(SystemTime::now(), MessageType::Client).0,
        unique_id:    42,
        server_salt:  500,
    };
    server.send(1, created.to_bytes()).await;

    let fetch = server.recv_request().await;
    assert_eq!(fetch.seq_no & 1, 0, "salt requests are service messages");
    assert_eq!(functions::GetFutureSalts::from_bytes(&fetch.body).unwrap().num, 4);
    assert_eq!(fetch.salt, 500);

    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs() as i32;
    let salts = types::FutureSalts {
        req_msg_id: fetch.msg_id,
        now,
        salts: RawVec(vec![
            types::FutureSalt { valid_since: now - 60, valid_until: now + 60, salt: 800 },
            types::FutureSalt { valid_since: now, valid_until: now + 3600, salt: 900 },
        ]),
    };
    server.send(0, salts.to_bytes()).await;

    run.await.unwrap().unwrap();
    assert!(conn.is_ready());
    let sessions = handler.sessions.lock().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].salt, 500);
}

#[tokio::test]
async fn rejected_messages_never_reach_the_handler() {
    let (tx, mut seen) = mpsc::unbounded_channel();
    let handler = Arc::new(Recorder { messages: Mutex::new(Some(tx)), ..Default::default() });
    let (conn, mut server) = setup(Options { handler, ..options() });
    let shutdown = CancellationToken::new();
    let run = spawn_run(&conn, &shutdown, until_cancelled);

    let update = unknown_update();

    let first = server.next_id();
    let frame = server.seal(first, SESSION_ID, 1, update.clone());
    server.end.send(&frame).await.unwrap();
    // Replay of the very same frame.
    server.end.send(&frame).await.unwrap();
    // Client-typed message id.
    let client_id = MessageId::new(SystemTime::now(), MessageType::Client).0;
    server.end.send(&server.seal(client_id, SESSION_ID, 1, update.clone())).await.unwrap();
    // Another session.
    let other = server.next_id();
    server.end.send(&server.seal(other, SESSION_ID + 1, 1, update.clone())).await.unwrap();
    // Far outside the time window.
    let stale = MessageId::new(SystemTime::now() - Duration::from_secs(3600), MessageType::FromServer).0;
    server.end.send(&server.seal(stale, SESSION_ID, 1, update.clone())).await.unwrap();

    let last = server.send(1, update).await;

    assert_eq!(seen.recv().await, Some(first));
    assert_eq!(seen.recv().await, Some(last));
    assert!(seen.try_recv().is_err());

    shutdown.cancel();
    run.await.unwrap().unwrap();
}

fn unknown_update() -> Vec<u8> {
    let mut body = 0x74ae_4240u32.to_le_bytes().to_vec();
    body.extend_from_slice(&[0; 8]);
    body
}

#[tokio::test(start_paused = true)]
async fn acks_are_batched_until_the_interval() {
    let opts = Options { ack_batch_size: 5, ack_interval: Duration::from_secs(15), ..options() };
    let (conn, mut server) = setup(opts);
    let shutdown = CancellationToken::new();
    let run = spawn_run(&conn, &shutdown, until_cancelled);

    let started = tokio::time::Instant::now();
    let a = server.send(1, unknown_update()).await;
    let b = server.send(1, unknown_update()).await;
    server.send(0, unknown_update()).await;

    let ack = server.recv().await;
    assert!(started.elapsed() >= Duration::from_secs(15), "acks went out after {:?}", started.elapsed());
    assert_eq!(types::MsgsAck::from_bytes(&ack.body).unwrap().msg_ids, vec![a, b]);

    shutdown.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn undecryptable_frame_is_fatal() {
    let (conn, server) = setup(options());
    let run = spawn_run(&conn, &CancellationToken::new(), until_cancelled);

    server.end.send(&[0xab; 72]).await.unwrap();

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(err, InvocationError::Decrypt(_)), "{err}");
}

#[tokio::test]
async fn run_only_once() {
    let (conn, _server) = setup(options());
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let first = conn.run(shutdown.clone(), until_cancelled).await;
    assert!(first.is_ok());
    let second = conn.run(shutdown, until_cancelled).await;
    assert!(matches!(second, Err(InvocationError::AlreadyRan)));
}

// ── Connect ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn key_exchange_installs_session() {
    let (client, server_end) = MemoryTransport::pair();
    let keys = ServerExchangeResult { auth_key: auth_key(), server_salt: 5 };
    let outcome = ExchangeResult { auth_key: keys.auth_key.clone(), session_id: SESSION_ID, server_salt: keys.server_salt };
    let exchange = Arc::new(ScriptedExchange(Mutex::new(Some(Ok(outcome)))));
    let conn = Conn::new(MemoryDialer::new(client), exchange, Options { ping_interval: Duration::from_secs(3600), ..Default::default() });
    let mut server = Server::with_keys(server_end, keys);

    let client = conn.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |cancel| async move {
        assert_eq!(client.session(), Session::new(Some(auth_key()), SESSION_ID, 5));
        client.invoke(&cancel, &functions::Ping { ping_id: 1 }).await?;
        Ok(())
    });

    assert_eq!(server.end.recv().await.unwrap(), b"req_pq");
    let req = server.recv_request().await;
    assert_eq!((req.session_id, req.salt), (SESSION_ID, 5));
    server.reply(req.msg_id, types::Pong { msg_id: req.msg_id, ping_id: 1 }.to_bytes()).await;

    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_exchange_closes_transport() {
    let (client, server_end) = MemoryTransport::pair();
    let exchange = Arc::new(ScriptedExchange(Mutex::new(Some(Err(ExchangeError::UnknownFingerprint)))));
    let conn = Conn::new(MemoryDialer::new(client), exchange, Options::default());

    let err = conn.run(CancellationToken::new(), until_cancelled).await.unwrap_err();
    match err {
        InvocationError::Exchange(e) => assert!(e.is_permanent()),
        other => panic!("unexpected error: {other}"),
    }
    assert!(server_end.is_closed());
}

#[tokio::test]
async fn stored_key_without_session_id_gets_a_random_one() {
    let (conn, mut server) = setup(Options { session_id: 0, ..options() });
    let client = conn.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |cancel| async move {
        assert_ne!(client.session().id, 0);
        client.invoke(&cancel, &functions::Ping { ping_id: 1 }).await?;
        Ok(())
    });

    let req = server.recv_request().await;
    assert_ne!(req.session_id, 0);
    let result = types::RpcResult { req_msg_id: req.msg_id, result: types::Pong { msg_id: req.msg_id, ping_id: 1 }.to_bytes() };
    let id = server.next_id();
    let frame = server.seal(id, req.session_id, 1, result.to_bytes());
    server.end.send(&frame).await.unwrap();

    run.await.unwrap().unwrap();
}

struct StuckDialer;

impl Dialer for StuckDialer {
    type Transport = MemoryTransport;

    async fn dial(&self) -> io::Result<MemoryTransport> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn dial_is_bounded() {
    let opts = Options { dial_timeout: Duration::from_secs(2), ..options() };
    let conn = Conn::new(StuckDialer, Arc::new(NoExchange), opts);
    let err = conn.run(CancellationToken::new(), until_cancelled).await.unwrap_err();
    assert!(matches!(err, InvocationError::Timeout("dial")), "{err}");
}

// ── Keepalive ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn answered_pings_keep_the_connection() {
    let opts = Options { ping_interval: Duration::from_secs(5), ping_timeout: Duration::from_secs(2), ..options() };
    let (conn, mut server) = setup(opts);
    let shutdown = CancellationToken::new();
    let run = spawn_run(&conn, &shutdown, until_cancelled);

    for _ in 0..4 {
        let ping = server.recv_request().await;
        let ping = functions::PingDelayDisconnect::from_bytes(&ping.body).unwrap();
        assert_eq!(ping.disconnect_delay, 7);
        server.send(0, types::Pong { msg_id: 0, ping_id: ping.ping_id }.to_bytes()).await;
    }

    shutdown.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn missed_pong_is_fatal() {
    let opts = Options { ping_interval: Duration::from_secs(5), ping_timeout: Duration::from_secs(2), ..options() };
    let (conn, _server) = setup(opts);

    let err = conn.run(CancellationToken::new(), until_cancelled).await.unwrap_err();
    assert!(matches!(err, InvocationError::PongMissed), "{err}");
}

#[tokio::test]
async fn ping_resolves_on_its_own_pong() {
    let (conn, mut server) = setup(options());
    let client = conn.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |cancel| async move { client.ping(&cancel).await });

    let req = server.recv_request().await;
    assert_eq!(req.seq_no & 1, 0, "pings are service messages");
    let ping = functions::Ping::from_bytes(&req.body).unwrap();

    // Someone else's pong is not an answer.
    server.send(0, types::Pong { msg_id: 0, ping_id: ping.ping_id ^ 1 }.to_bytes()).await;
    server.send(0, types::Pong { msg_id: req.msg_id, ping_id: ping.ping_id }.to_bytes()).await;

    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancelled_ping_returns_cancelled() {
    let (conn, mut server) = setup(options());
    let ping_cancel = CancellationToken::new();

    let client = conn.clone();
    let token = ping_cancel.clone();
    let run = spawn_run(&conn, &CancellationToken::new(), move |_| async move {
        let err = client.ping(&token).await.unwrap_err();
        assert!(matches!(err, InvocationError::Cancelled), "{err}");
        Ok(())
    });

    server.recv_request().await;
    ping_cancel.cancel();

    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_resolves_pending_pings() {
    let (conn, mut server) = setup(options());
    let shutdown = CancellationToken::new();
    let (result_tx, result_rx) = tokio::sync::oneshot::channel();

    let client = conn.clone();
    let run = spawn_run(&conn, &shutdown, move |_| async move {
        let _ = result_tx.send(client.ping(&CancellationToken::new()).await);
        Ok(())
    });

    let req = server.recv_request().await;
    assert_eq!(peek_id(&req.body).unwrap(), functions::Ping::CONSTRUCTOR_ID);
    shutdown.cancel();

    let res = tokio::time::timeout(Duration::from_secs(5), result_rx).await.expect("ping resolves").unwrap();
    assert!(matches!(res, Err(InvocationError::EngineClosed)), "{res:?}");
    run.await.unwrap().unwrap();

    let late = conn.ping(&CancellationToken::new()).await;
    assert!(matches!(late, Err(InvocationError::EngineClosed)), "{late:?}");
}
