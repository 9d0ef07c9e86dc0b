//! The two tasks that drive one auction.
//!
//! The **seller task** owns the seller's control connection from the first
//! auction request to the final handoff.  The **bidding task** is spawned by
//! the arbiter once every buyer slot is filled and owns all buyer
//! connections.  They meet only through the [`Session`]:
//!
//! ```text
//!  seller task                         bidding task
//!  ───────────                         ────────────
//!  read + validate terms
//!  accept_params ──▶ AwaitingBuyers
//!                                      prompt every buyer, read bids
//!  wait_resolution ◀──────────────── publish_resolution
//!  send result                         send results
//!  read port                           read winner port
//!  exchange(Seller) ◀──────────────▶ exchange(Winner)
//!  send winner endpoint                send seller endpoint
//! ```
//!
//! A failure on either side aborts the session so the other task stops
//! waiting.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::channel::{ControlChannel, ProtocolError};
use crate::protocol::{self, AuctionParams, HandshakeError};
use crate::resolver::{resolve, Resolution};
use crate::session::{Party, Session, SessionError};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

/// Seller connection, end to end.
pub async fn run_seller(session: Arc<Session>, channel: ControlChannel, max_invalid: Option<u32>) {
    let id = session.id();
    if let Err(e) = seller_flow(&session, channel, max_invalid).await {
        log::warn!("[seller] auction {id} aborted: {e}");
        session.abort();
    }
}

async fn seller_flow(
    session: &Session,
    mut channel: ControlChannel,
    max_invalid: Option<u32>,
) -> Result<(), CoordinatorError> {
    let params: AuctionParams = read_valid(
        &mut channel,
        max_invalid,
        protocol::INVALID_REQUEST,
        "[seller]",
        |raw| raw.parse::<AuctionParams>(),
    )
    .await?;

    log::info!(
        "[seller] auction {}: {} \"{}\", reserve {}, {} bidder(s)",
        session.id(),
        params.auction_type,
        params.item,
        params.reserve_price,
        params.bidder_count
    );
    session.accept_params(params.clone());
    channel.send_line(protocol::AUCTION_START).await?;

    match session.wait_resolution().await? {
        Resolution::NotSold { .. } => {
            channel
                .finish(&protocol::seller_not_sold(&params.item))
                .await?;
        }
        Resolution::Sold { price, .. } => {
            channel
                .send_line(&protocol::seller_sold(&params.item, price))
                .await?;
            let endpoint = read_endpoint(&mut channel).await?;
            log::debug!("[seller] transfer endpoint {endpoint}");
            let winner = session.exchange(Party::Seller, endpoint).await?;
            channel.finish(&protocol::format_endpoint(winner)).await?;
        }
    }
    Ok(())
}

/// All buyer connections, from the first bid prompt to the winner handoff.
pub async fn run_bidding(
    session: Arc<Session>,
    buyers: Vec<ControlChannel>,
    max_invalid: Option<u32>,
) {
    let id = session.id();
    if let Err(e) = bidding_flow(&session, buyers, max_invalid).await {
        log::warn!("[bidding] auction {id} aborted: {e}");
        session.abort();
    }
}

async fn bidding_flow(
    session: &Session,
    mut buyers: Vec<ControlChannel>,
    max_invalid: Option<u32>,
) -> Result<(), CoordinatorError> {
    log::info!(
        "[bidding] auction {}: bidding opens for {} buyer(s)",
        session.id(),
        buyers.len()
    );
    for buyer in buyers.iter_mut() {
        buyer.send_line(protocol::BIDDING_START).await?;
    }

    for (index, buyer) in buyers.iter_mut().enumerate() {
        let bid = read_valid(
            buyer,
            max_invalid,
            protocol::INVALID_BID,
            "[bidding]",
            protocol::parse_bid,
        )
        .await?;
        session.record_bid(index, bid)?;
        buyer.send_line(protocol::BID_RECEIVED).await?;
        log::debug!("[bidding] buyer #{index} ({}) bid {bid}", buyer.peer());
    }

    let params = session.snapshot().params.ok_or(SessionError::Aborted)?;
    let resolution = resolve(&session.bids()?, params.auction_type, params.reserve_price);
    match resolution {
        Resolution::Sold {
            winner,
            highest,
            price,
        } => log::info!(
            "[bidding] auction {}: buyer #{winner} wins with {highest}, pays {price}",
            session.id()
        ),
        Resolution::NotSold { highest } => log::info!(
            "[bidding] auction {}: highest bid {highest} below reserve {}, not sold",
            session.id(),
            params.reserve_price
        ),
    }
    session.publish_resolution(resolution);

    let mut winner_channel = None;
    for (index, mut buyer) in buyers.into_iter().enumerate() {
        match resolution {
            Resolution::Sold { winner, price, .. } if winner == index => {
                buyer
                    .send_line(&protocol::buyer_won(&params.item, price))
                    .await?;
                winner_channel = Some(buyer);
            }
            _ => {
                // A loser hanging up does not affect the sale.
                if let Err(e) = buyer.finish(&protocol::buyer_lost()).await {
                    log::debug!("[bidding] could not notify buyer #{index}: {e}");
                }
            }
        }
    }

    if let Some(mut winner) = winner_channel {
        let endpoint = read_endpoint(&mut winner).await?;
        log::debug!("[bidding] winner transfer endpoint {endpoint}");
        let seller = session.exchange(Party::Winner, endpoint).await?;
        winner.finish(&protocol::format_endpoint(seller)).await?;
        log::info!(
            "[bidding] auction {}: handed off {seller} -> {endpoint}",
            session.id()
        );
    }
    Ok(())
}

/// Read lines until `parse` accepts one, answering each rejection with
/// `reject`.  Unreadable lines count as rejections.  `limit` bounds the
/// number of rejections.
async fn read_valid<T, E: Display>(
    channel: &mut ControlChannel,
    limit: Option<u32>,
    reject: &str,
    tag: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T, CoordinatorError> {
    let mut invalid = 0u32;
    loop {
        let reason = match channel.recv_line().await {
            Ok(raw) => match parse(&raw) {
                Ok(value) => return Ok(value),
                Err(e) => format!("{raw:?}: {e}"),
            },
            Err(e) if e.is_malformed() => e.to_string(),
            Err(e) => return Err(e.into()),
        };
        invalid += 1;
        log::debug!("{tag} {} rejected {reason}", channel.peer());
        if limit.is_some_and(|max| invalid > max) {
            return Err(ProtocolError::TooManyInvalid(invalid).into());
        }
        channel.send_line(reject).await?;
    }
}

/// The client's transfer port, paired with the address it connected from.
async fn read_endpoint(channel: &mut ControlChannel) -> Result<SocketAddr, CoordinatorError> {
    let port = protocol::parse_port(&channel.recv_line().await?)?;
    Ok(SocketAddr::new(channel.peer().ip(), port))
}
