use tokio::net::TcpListener;

use ringcache_common::{decode, read_frame, write_frame, GetResponse, MessageTag, SetResponse};
use ringcache_client::PeerClient;
use ringcache_core::PeerGetter;

#[tokio::test]
async fn get_round_trips_through_a_fake_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (tag, body) = read_frame(&mut stream).await.unwrap();
        assert_eq!(tag, MessageTag::Get);
        let req: ringcache_common::GetRequest = decode(&body).unwrap();
        assert_eq!(req.group, "scores");
        assert_eq!(req.key, "Tom");
        write_frame(
            &mut stream,
            MessageTag::GetResponse,
            &GetResponse { value: b"630".to_vec() },
        )
        .await
        .unwrap();
    });

    let client = PeerClient::connect(addr);
    let value = client.get("scores", "Tom").await.unwrap();
    assert_eq!(value, b"630");
}

#[tokio::test]
async fn set_surfaces_peer_rejection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (tag, _body) = read_frame(&mut stream).await.unwrap();
        assert_eq!(tag, MessageTag::Set);
        write_frame(&mut stream, MessageTag::SetResponse, &SetResponse { ok: false })
            .await
            .unwrap();
    });

    let client = PeerClient::connect(addr);
    let err = client.set("scores", "Tom", b"630", 0, false).await.unwrap_err();
    assert!(matches!(err, ringcache_common::Error::PeerRejected(_)));
}

#[tokio::test]
async fn connecting_to_a_closed_port_is_peer_unreachable() {
    // bind then immediately drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client = PeerClient::connect(addr);
    let err = client.get("scores", "Tom").await.unwrap_err();
    assert!(matches!(err, ringcache_common::Error::PeerUnreachable(_)));
}
