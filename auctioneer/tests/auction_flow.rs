//! End-to-end auctions over loopback: real server, real clients, real RDT
//! transfer.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use auctioneer::channel::{ControlChannel, ProtocolError};
use auctioneer::client::{self, ClientConfig, ClientError, ClientOutcome};
use auctioneer::protocol;
use auctioneer::{Server, ServerConfig};
use rdt_over_udp::metrics::RECORD_MARKER;
use rdt_over_udp::{TimerConfig, TransferConfig, TransferError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::net::TcpStream;

async fn start_server(config: ServerConfig) -> SocketAddr {
    let server = Server::bind("127.0.0.1:0".parse().unwrap(), config)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

fn client_config(server: SocketAddr, dir: &Path, file: &str) -> ClientConfig {
    let mut config = ClientConfig::new(server);
    config.file = dir.join(file);
    config.output = dir.join("received.txt");
    config.perf_log = dir.join("performance.txt");
    config.transfer = TransferConfig {
        chunk_size: 2000,
        timer: TimerConfig {
            ack_timeout: Duration::from_millis(100),
            max_retries: Some(50),
        },
    };
    config
}

/// Scripted stdin plus a console the test can watch.
fn io(script: &str) -> (BufReader<&[u8]>, DuplexStream, BufReader<DuplexStream>) {
    let (console, watch) = tokio::io::duplex(16 * 1024);
    (BufReader::new(script.as_bytes()), console, BufReader::new(watch))
}

async fn wait_for_line(console: &mut BufReader<DuplexStream>, needle: &str) {
    let mut line = String::new();
    loop {
        line.clear();
        let n = console.read_line(&mut line).await.unwrap();
        assert!(n > 0, "console closed before {needle:?}");
        if line.contains(needle) {
            return;
        }
    }
}

async fn connect(addr: SocketAddr) -> ControlChannel {
    ControlChannel::new(TcpStream::connect(addr).await.unwrap()).unwrap()
}

/// Connect until the server hands out the seller role again.
async fn reconnect_as_seller(addr: SocketAddr) -> ControlChannel {
    for _ in 0..50 {
        let mut ch = connect(addr).await;
        if ch.recv_line().await.unwrap() == protocol::SELLER_ROLE {
            return ch;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server never returned to idle");
}

#[tokio::test]
async fn sold_item_reaches_winner() {
    let addr = start_server(ServerConfig::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let item: Vec<u8> = (0..5_500u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(dir.path().join("tosend.txt"), &item).unwrap();

    let seller_cfg = client_config(addr, dir.path(), "tosend.txt");
    let (seller_in, seller_console, mut seller_watch) = io("1 10\n1 10 2 lamp\n");
    let seller = tokio::spawn(async move {
        client::run(&seller_cfg, seller_in, seller_console).await
    });
    wait_for_line(&mut seller_watch, protocol::AUCTION_START).await;

    let a_cfg = client_config(addr, dir.path(), "unused");
    let (a_in, a_console, mut a_watch) = io("abc\n15\n");
    let buyer_a = tokio::spawn(async move { client::run(&a_cfg, a_in, a_console).await });
    wait_for_line(&mut a_watch, protocol::WAITING_FOR_BUYERS).await;

    let b_cfg = client_config(addr, dir.path(), "unused");
    let (b_in, b_console, _b_watch) = io("20\n");
    let buyer_b = tokio::spawn(async move { client::run(&b_cfg, b_in, b_console).await });

    match seller.await.unwrap() {
        Ok(ClientOutcome::Sold(report)) => {
            assert_eq!(report.bytes, item.len() as u64);
            assert_eq!(report.data_frames, 3);
            assert_eq!(report.control_frames, 2);
        }
        other => panic!("seller: {other:?}"),
    }
    assert!(matches!(buyer_a.await.unwrap(), Ok(ClientOutcome::Lost)));
    match buyer_b.await.unwrap() {
        Ok(ClientOutcome::Won(report)) => assert_eq!(report.bytes, item.len() as u64),
        other => panic!("buyer b: {other:?}"),
    }

    assert_eq!(std::fs::read(dir.path().join("received.txt")).unwrap(), item);
    let perf = std::fs::read_to_string(dir.path().join("performance.txt")).unwrap();
    assert!(perf.starts_with(RECORD_MARKER));
    assert!(perf.contains("LOSS RATE=0"));
    assert!(perf.contains(&format!("NUMBER OF BYTES={}", item.len())));
}

#[tokio::test]
async fn second_price_tie_and_endpoint_handshake() {
    let addr = start_server(ServerConfig::default()).await;

    let mut seller = connect(addr).await;
    assert_eq!(seller.recv_line().await.unwrap(), protocol::SELLER_ROLE);
    seller.send_line("2 10 3 lamp").await.unwrap();
    assert_eq!(seller.recv_line().await.unwrap(), protocol::AUCTION_START);

    let mut buyers = Vec::new();
    for expected_wait in [true, true, false] {
        let mut b = connect(addr).await;
        assert_eq!(b.recv_line().await.unwrap(), protocol::BUYER_ROLE);
        if expected_wait {
            assert_eq!(b.recv_line().await.unwrap(), protocol::WAITING_FOR_BUYERS);
        }
        buyers.push(b);
    }

    // Second price, tie at the top: first 20 wins and pays 20.
    for (b, bid) in buyers.iter_mut().zip(["5", "20", "20"]) {
        assert_eq!(b.recv_line().await.unwrap(), protocol::BIDDING_START);
        b.send_line(bid).await.unwrap();
        assert_eq!(b.recv_line().await.unwrap(), protocol::BID_RECEIVED);
    }

    assert_eq!(
        seller.recv_line().await.unwrap(),
        protocol::seller_sold("lamp", 20)
    );
    assert_eq!(buyers[0].recv_line().await.unwrap(), protocol::buyer_lost());
    assert_eq!(
        buyers[1].recv_line().await.unwrap(),
        protocol::buyer_won("lamp", 20)
    );
    assert_eq!(buyers[2].recv_line().await.unwrap(), protocol::buyer_lost());

    // Handshake: each side learns the other's address and port.
    seller.send_line("40001").await.unwrap();
    buyers[1].send_line("40002").await.unwrap();
    assert_eq!(seller.recv_line().await.unwrap(), "127.0.0.1 40002");
    assert_eq!(buyers[1].recv_line().await.unwrap(), "127.0.0.1 40001");
    assert!(matches!(seller.recv_line().await, Err(ProtocolError::Closed)));
}

#[tokio::test]
async fn rejects_while_busy_and_restarts_after_no_sale() {
    let addr = start_server(ServerConfig::default()).await;

    let mut seller = connect(addr).await;
    assert_eq!(seller.recv_line().await.unwrap(), protocol::SELLER_ROLE);

    // Seller still configuring.
    let dir = tempfile::tempdir().unwrap();
    let cfg = client_config(addr, dir.path(), "unused");
    let (input, console, _watch) = io("");
    match client::run(&cfg, input, console).await {
        Err(ClientError::Busy(notice)) => assert_eq!(notice, protocol::BUSY),
        other => panic!("expected busy, got {other:?}"),
    }

    seller.send_line("0 50 1 vase").await.unwrap();
    assert_eq!(seller.recv_line().await.unwrap(), protocol::INVALID_REQUEST);
    seller.send_line("1 50 2 vase").await.unwrap();
    assert_eq!(seller.recv_line().await.unwrap(), protocol::AUCTION_START);

    let mut first = connect(addr).await;
    assert_eq!(first.recv_line().await.unwrap(), protocol::BUYER_ROLE);
    assert_eq!(first.recv_line().await.unwrap(), protocol::WAITING_FOR_BUYERS);
    let mut second = connect(addr).await;
    assert_eq!(second.recv_line().await.unwrap(), protocol::BUYER_ROLE);
    assert_eq!(second.recv_line().await.unwrap(), protocol::BIDDING_START);
    assert_eq!(first.recv_line().await.unwrap(), protocol::BIDDING_START);

    // Bidding under way.
    let mut late = connect(addr).await;
    assert_eq!(late.recv_line().await.unwrap(), protocol::BIDDING_BUSY);
    assert!(matches!(late.recv_line().await, Err(ProtocolError::Closed)));

    // Both bids under the reserve of 50.
    first.send_line("-5").await.unwrap();
    assert_eq!(first.recv_line().await.unwrap(), protocol::INVALID_BID);
    first.send_line("30").await.unwrap();
    assert_eq!(first.recv_line().await.unwrap(), protocol::BID_RECEIVED);
    second.send_line("40").await.unwrap();
    assert_eq!(second.recv_line().await.unwrap(), protocol::BID_RECEIVED);

    for buyer in [&mut first, &mut second] {
        let lost = buyer.recv_line().await.unwrap();
        assert!(lost.contains("did not win"));
        assert!(matches!(buyer.recv_line().await, Err(ProtocolError::Closed)));
    }
    let result = seller.recv_line().await.unwrap();
    assert!(result.contains("not sold"));
    assert!(matches!(seller.recv_line().await, Err(ProtocolError::Closed)));

    let mut next = reconnect_as_seller(addr).await;
    next.send_line("1 5 1 chair").await.unwrap();
    assert_eq!(next.recv_line().await.unwrap(), protocol::AUCTION_START);
}

#[tokio::test]
async fn unreadable_bids_are_reprompted() {
    let addr = start_server(ServerConfig::default()).await;

    let mut seller = connect(addr).await;
    assert_eq!(seller.recv_line().await.unwrap(), protocol::SELLER_ROLE);
    seller.send_line("1 10 1 lamp").await.unwrap();
    assert_eq!(seller.recv_line().await.unwrap(), protocol::AUCTION_START);

    let (read, mut write) = TcpStream::connect(addr).await.unwrap().into_split();
    let mut buyer = BufReader::new(read).lines();
    assert_eq!(buyer.next_line().await.unwrap().unwrap(), protocol::BUYER_ROLE);
    assert_eq!(buyer.next_line().await.unwrap().unwrap(), protocol::BIDDING_START);

    write.write_all(b"\xff\xfe\n").await.unwrap();
    assert_eq!(buyer.next_line().await.unwrap().unwrap(), protocol::INVALID_BID);

    let mut long = vec![b'1'; 5000];
    long.push(b'\n');
    write.write_all(&long).await.unwrap();
    assert_eq!(buyer.next_line().await.unwrap().unwrap(), protocol::INVALID_BID);

    write.write_all(b"12\n").await.unwrap();
    assert_eq!(buyer.next_line().await.unwrap().unwrap(), protocol::BID_RECEIVED);
    assert_eq!(
        buyer.next_line().await.unwrap().unwrap(),
        protocol::buyer_won("lamp", 12)
    );
    assert_eq!(
        seller.recv_line().await.unwrap(),
        protocol::seller_sold("lamp", 12)
    );
}

#[tokio::test]
async fn missing_item_aborts_transfer_on_both_sides() {
    let addr = start_server(ServerConfig::default()).await;
    let dir = tempfile::tempdir().unwrap();

    let seller_cfg = client_config(addr, dir.path(), "does-not-exist.txt");
    let (seller_in, seller_console, mut seller_watch) = io("2 10 1 book\n");
    let seller = tokio::spawn(async move {
        client::run(&seller_cfg, seller_in, seller_console).await
    });
    wait_for_line(&mut seller_watch, protocol::AUCTION_START).await;

    // Lone second-price bidder pays the reserve.
    let buyer_cfg = client_config(addr, dir.path(), "unused");
    let (buyer_in, buyer_console, mut buyer_watch) = io("25\n");
    let buyer = tokio::spawn(async move { client::run(&buyer_cfg, buyer_in, buyer_console).await });
    wait_for_line(&mut buyer_watch, &protocol::buyer_won("book", 10)).await;

    assert!(matches!(
        seller.await.unwrap(),
        Err(ClientError::Transfer(TransferError::SourceUnavailable { .. }))
    ));
    assert!(matches!(
        buyer.await.unwrap(),
        Err(ClientError::Transfer(TransferError::SenderAborted(_)))
    ));
    assert!(!dir.path().join("received.txt").exists());
    assert!(!dir.path().join("performance.txt").exists());
}

#[tokio::test]
async fn invalid_attempt_cap_aborts_session() {
    let addr = start_server(ServerConfig {
        max_invalid_attempts: Some(1),
    })
    .await;

    let mut seller = connect(addr).await;
    assert_eq!(seller.recv_line().await.unwrap(), protocol::SELLER_ROLE);
    seller.send_line("nonsense").await.unwrap();
    assert_eq!(seller.recv_line().await.unwrap(), protocol::INVALID_REQUEST);
    seller.send_line("still nonsense").await.unwrap();
    assert!(seller.recv_line().await.is_err());

    let mut next = reconnect_as_seller(addr).await;
    next.send_line("1 5 1 chair").await.unwrap();
    assert_eq!(next.recv_line().await.unwrap(), protocol::AUCTION_START);
}
