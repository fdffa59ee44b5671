use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut as _, Bytes, BytesMut};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};

use commitlog::auth::Acl;
use commitlog::wire::{
    request, ApiKey, ApiVersion, ErrorCode, Record, RequestBody, RequestHeader, RequestMessage,
    ResponseBody, ResponseMessage, Serialize as _, WireSize as _,
};
use commitlog::{Config, Log, Server};

/// Bind a server over a fresh log and serve connections in the background.
/// The returned TempDir keeps the log directory alive for the test.
async fn setup(acl: Option<Acl>) -> (SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = Log::open(dir.path(), Config::default()).expect("open log");
    let server = Arc::new(Server::new(Arc::new(log), acl));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(Arc::clone(&server).handle_connection(stream));
        }
    });

    (addr, dir)
}

/// Policy mirroring the server's ACL file format: `root` gets both actions,
/// `nobody` may only consume.
fn test_acl() -> Acl {
    let mut acl = Acl::default();
    acl.allow("root", "*", "produce");
    acl.allow("root", "*", "consume");
    acl.allow("nobody", "*", "consume");
    acl
}

struct TestClient {
    conn: TcpStream,
    subject: Option<String>,
    correlation_id: i32,
}

impl TestClient {
    async fn connect(addr: SocketAddr, subject: Option<&str>) -> Self {
        Self {
            conn: TcpStream::connect(addr).await.expect("connect"),
            subject: subject.map(str::to_string),
            correlation_id: 0,
        }
    }

    async fn send(&mut self, api_key: ApiKey, body: RequestBody) -> i32 {
        self.correlation_id += 1;

        let message = RequestMessage {
            header: RequestHeader {
                api_key,
                api_version: ApiVersion::parse(api_key, 0).expect("api version"),
                correlation_id: self.correlation_id,
                client_id: self.subject.clone(),
            },
            body,
        };

        let size = message.wire_size();
        let mut buf = BytesMut::with_capacity(4 + size);
        buf.put_i32(size as i32);
        message.put_into(&mut buf);

        self.conn.write_all(&buf).await.expect("send request");
        self.correlation_id
    }

    async fn recv(&mut self, api_key: ApiKey) -> ResponseMessage {
        let size = self.conn.read_i32().await.expect("response size");
        let mut buf = vec![0u8; size as usize];
        self.conn.read_exact(&mut buf).await.expect("response content");

        let (response, n) =
            ResponseMessage::decode(&mut Bytes::from(buf), api_key).expect("decode response");
        assert_eq!(n, size as usize, "response fully consumed");

        response
    }

    async fn produce(&mut self, value: &'static [u8]) -> ResponseMessage {
        let body = RequestBody::Produce(request::Produce {
            record: Record::new(Bytes::from_static(value)),
        });
        let correlation_id = self.send(ApiKey::Produce, body).await;

        let response = self.recv(ApiKey::Produce).await;
        assert_eq!(response.correlation_id, correlation_id);
        response
    }

    async fn consume(&mut self, offset: u64) -> ResponseMessage {
        let correlation_id = self
            .send(ApiKey::Consume, RequestBody::Consume(request::Consume { offset }))
            .await;

        let response = self.recv(ApiKey::Consume).await;
        assert_eq!(response.correlation_id, correlation_id);
        response
    }
}

fn expect_offset(response: &ResponseMessage) -> u64 {
    assert_eq!(response.error_code, ErrorCode::None);
    match response.body {
        ResponseBody::Produce { offset } => offset,
        ref body => panic!("expected a produce body, got {body:?}"),
    }
}

fn expect_record(response: &ResponseMessage) -> &Record {
    assert_eq!(response.error_code, ErrorCode::None);
    match &response.body {
        ResponseBody::Consume { record } => record,
        body => panic!("expected a consume body, got {body:?}"),
    }
}

#[tokio::test]
async fn produce_consume_round_trip() {
    let (addr, _dir) = setup(None).await;
    let mut client = TestClient::connect(addr, Some("root")).await;

    let response = client.produce(b"hello world").await;
    assert_eq!(expect_offset(&response), 0);

    let response = client.consume(0).await;
    let record = expect_record(&response);
    assert_eq!(&record.value[..], b"hello world");
    assert_eq!(record.offset, 0);
}

#[tokio::test]
async fn consume_past_boundary_fails() {
    let (addr, _dir) = setup(None).await;
    let mut client = TestClient::connect(addr, Some("root")).await;

    let response = client.produce(b"hello world").await;
    assert_eq!(expect_offset(&response), 0);

    let response = client.consume(1).await;
    assert_eq!(response.error_code, ErrorCode::OffsetOutOfRange);
    let ResponseBody::Error(message) = &response.body else {
        panic!("expected an error body, got {:?}", response.body);
    };
    let message = message.0.as_deref().expect("error message");
    assert!(message.contains("1"), "message names the offending offset: {message}");
}

#[tokio::test]
async fn produce_consume_streams() {
    let (addr, _dir) = setup(None).await;
    let records: [&'static [u8]; 2] = [b"first message", b"second message"];

    {
        let mut producer = TestClient::connect(addr, Some("root")).await;

        for (want, value) in records.iter().enumerate() {
            let body = RequestBody::ProduceStream(request::Produce {
                record: Record::new(Bytes::from_static(value)),
            });
            producer.send(ApiKey::ProduceStream, body).await;

            let response = producer.recv(ApiKey::ProduceStream).await;
            assert_eq!(response.error_code, ErrorCode::None);
            match response.body {
                ResponseBody::Produce { offset } => assert_eq!(offset, want as u64),
                body => panic!("expected a produce body, got {body:?}"),
            }
        }
    }

    {
        let mut consumer = TestClient::connect(addr, Some("root")).await;
        consumer
            .send(
                ApiKey::ConsumeStream,
                RequestBody::ConsumeStream(request::Consume { offset: 0 }),
            )
            .await;

        for (want, value) in records.iter().enumerate() {
            let response = consumer.recv(ApiKey::ConsumeStream).await;
            let record = expect_record(&response);
            assert_eq!(record.offset, want as u64);
            assert_eq!(&record.value[..], *value);
        }
    }
}

#[tokio::test]
async fn unauthorized_subject_is_denied() {
    let (addr, _dir) = setup(Some(test_acl())).await;

    {
        // no produce/consume permission at all
        let mut intruder = TestClient::connect(addr, Some("intruder")).await;

        let response = intruder.produce(b"stolen goods").await;
        assert_eq!(response.error_code, ErrorCode::AuthorizationFailed);

        let response = intruder.consume(0).await;
        assert_eq!(response.error_code, ErrorCode::AuthorizationFailed);
    }

    {
        // nothing was written by the denied produce
        let mut root = TestClient::connect(addr, Some("root")).await;
        let response = root.consume(0).await;
        assert_eq!(response.error_code, ErrorCode::OffsetOutOfRange);
    }
}

#[tokio::test]
async fn unauthenticated_subject_is_denied() {
    let (addr, _dir) = setup(Some(test_acl())).await;

    let mut anonymous = TestClient::connect(addr, None).await;
    let response = anonymous.produce(b"hello").await;
    assert_eq!(response.error_code, ErrorCode::AuthorizationFailed);
}

#[tokio::test]
async fn consume_only_subject_cannot_produce() {
    let (addr, _dir) = setup(Some(test_acl())).await;

    let mut nobody = TestClient::connect(addr, Some("nobody")).await;
    let response = nobody.produce(b"hello").await;
    assert_eq!(response.error_code, ErrorCode::AuthorizationFailed);

    let mut root = TestClient::connect(addr, Some("root")).await;
    let response = root.produce(b"hello").await;
    assert_eq!(expect_offset(&response), 0);

    let response = nobody.consume(0).await;
    let record = expect_record(&response);
    assert_eq!(&record.value[..], b"hello");
}

#[tokio::test]
async fn consume_stream_follows_the_tail() {
    let (addr, _dir) = setup(None).await;

    // start the stream before anything is in the log
    let mut consumer = TestClient::connect(addr, Some("root")).await;
    consumer
        .send(
            ApiKey::ConsumeStream,
            RequestBody::ConsumeStream(request::Consume { offset: 0 }),
        )
        .await;

    let mut producer = TestClient::connect(addr, Some("root")).await;
    let response = producer.produce(b"late arrival").await;
    assert_eq!(expect_offset(&response), 0);

    let response = consumer.recv(ApiKey::ConsumeStream).await;
    let record = expect_record(&response);
    assert_eq!(&record.value[..], b"late arrival");
}
