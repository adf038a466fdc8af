//! Drives the inbound session state machine over a real loopback socket,
//! covering the wire-level half of the IHAVE and duplicate-submission
//! scenarios (the ingestion side is covered in `tests/ingestion.rs`).

use std::sync::Arc;
use std::time::Duration;

use nntpchand::session::inbound;
use nntpchand::store::{ArticleStore, FilesystemStore};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

async fn spawn_inbound() -> (TcpStream, Arc<dyn ArticleStore>, mpsc::Receiver<nntpchand::MessageId>) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ArticleStore> = Arc::new(FilesystemStore::open(dir.path()).await.unwrap());
    let (infeed_load_tx, infeed_load_rx) = mpsc::channel(8);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_store = store.clone();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let _ = inbound::drive(socket, server_store, infeed_load_tx, Duration::from_secs(5)).await;
    });

    let client = TcpStream::connect(addr).await.unwrap();
    (client, store, infeed_load_rx)
}

async fn read_line(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    line
}

#[tokio::test]
async fn test_ihave_accepts_new_article_then_rejects_duplicate() {
    let (client, store, mut infeed_load_rx) = spawn_inbound().await;
    let (read_half, mut write_half) = client.into_split();
    let mut reader = BufReader::new(read_half);

    // Greeting.
    assert!(read_line(&mut reader).await.starts_with("200"));

    let msgid = "<session1$1@wire.example>";
    write_half
        .write_all(format!("IHAVE {msgid}\r\n").as_bytes())
        .await
        .unwrap();
    let offer_response = read_line(&mut reader).await;
    assert!(offer_response.starts_with("335"), "unexpected: {offer_response}");

    let article = format!(
        "From: poster@example.com\r\n\
         Subject: hello\r\n\
         Newsgroups: overchan.random\r\n\
         Message-ID: {msgid}\r\n\
         Date: Mon, 27 Jul 2026 00:00:00 +0000\r\n\
         Path: wire.example\r\n\
         \r\n\
         wire body\r\n.\r\n"
    );
    write_half.write_all(article.as_bytes()).await.unwrap();
    let transfer_response = read_line(&mut reader).await;
    assert!(transfer_response.starts_with("235"), "unexpected: {transfer_response}");

    let loaded = infeed_load_rx.recv().await.unwrap();
    assert_eq!(loaded.as_str(), msgid);

    // Commit it directly so the store reports it as already known, as the
    // ingestion pipeline would have by the time a real duplicate arrives.
    let parsed = nntpchand::article::ArticleBuilder::new()
        .from("poster@example.com")
        .subject("hello")
        .newsgroups(vec!["overchan.random"])
        .message_id(msgid)
        .body("wire body")
        .build()
        .unwrap();
    store.write_temp(&loaded, &parsed).await.unwrap();
    store.store_post(&parsed).await.unwrap();

    write_half
        .write_all(format!("IHAVE {msgid}\r\n").as_bytes())
        .await
        .unwrap();
    let duplicate_response = read_line(&mut reader).await;
    assert!(duplicate_response.starts_with("435"), "unexpected: {duplicate_response}");
}

#[tokio::test]
async fn test_ihave_rejects_mismatched_message_id() {
    let (client, _store, _infeed_load_rx) = spawn_inbound().await;
    let (read_half, mut write_half) = client.into_split();
    let mut reader = BufReader::new(read_half);

    assert!(read_line(&mut reader).await.starts_with("200"));

    write_half
        .write_all(b"IHAVE <offered$1@wire.example>\r\n")
        .await
        .unwrap();
    assert!(read_line(&mut reader).await.starts_with("335"));

    let article = "From: poster@example.com\r\n\
         Subject: hello\r\n\
         Newsgroups: overchan.random\r\n\
         Message-ID: <different$1@wire.example>\r\n\
         Date: Mon, 27 Jul 2026 00:00:00 +0000\r\n\
         Path: wire.example\r\n\
         \r\n\
         wire body\r\n.\r\n";
    write_half.write_all(article.as_bytes()).await.unwrap();
    let response = read_line(&mut reader).await;
    assert!(response.starts_with("437"), "unexpected: {response}");
}
