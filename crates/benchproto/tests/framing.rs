//! Framing over a real socket pair.

use benchproto::{decode_json, encode_json, FrameCodec, FrameError, Request, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

async fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, _) = listener.accept().await.unwrap();
    (client, server)
}

#[tokio::test]
async fn test_request_survives_byte_at_a_time_writes() {
    let (mut client, server) = socket_pair().await;
    let mut framed = Framed::new(server, FrameCodec::default());

    let body = encode_json(&Request::new("ping")).unwrap();
    let mut wire = (body.len() as u32).to_be_bytes().to_vec();
    wire.extend_from_slice(&body);

    let writer = tokio::spawn(async move {
        for byte in wire {
            client.write_all(&[byte]).await.unwrap();
            client.flush().await.unwrap();
        }
        client
    });

    let frame = framed.next().await.unwrap().unwrap();
    let req: Request = decode_json(&frame).unwrap();
    assert_eq!(req.command_type, "ping");
    drop(writer.await.unwrap());
}

#[tokio::test]
async fn test_response_roundtrip_through_framed() {
    let (client, server) = socket_pair().await;
    let mut a = Framed::new(client, FrameCodec::default());
    let mut b = Framed::new(server, FrameCodec::default());

    let resp = Response::ok(json!({"operations": [], "count": 0}));
    b.send(encode_json(&resp).unwrap()).await.unwrap();

    let frame = a.next().await.unwrap().unwrap();
    let got: Response = decode_json(&frame).unwrap();
    assert_eq!(got, resp);
}

#[tokio::test]
async fn test_disconnect_mid_frame_is_an_error() {
    let (mut client, server) = socket_pair().await;
    let mut framed = Framed::new(server, FrameCodec::default());

    client.write_all(&[0, 0, 0, 10, b'{']).await.unwrap();
    drop(client);

    match framed.next().await {
        Some(Err(FrameError::Io(_))) => {}
        other => panic!("expected io error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_oversized_frame_from_peer() {
    let (client, server) = socket_pair().await;
    let mut sender = Framed::new(client, FrameCodec::default());
    let mut receiver = Framed::new(server, FrameCodec::new(4));

    sender.send(Bytes::from_static(b"{\"a\":1}")).await.unwrap();
    match receiver.next().await {
        Some(Err(FrameError::TooLarge { limit, .. })) => assert_eq!(limit, 4),
        other => panic!("expected TooLarge, got {:?}", other),
    }
}
