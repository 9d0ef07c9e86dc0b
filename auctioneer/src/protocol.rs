//! Control-channel vocabulary: auction terms, bids, result notices and the
//! transfer-endpoint handshake.
//!
//! Every message is a single line of UTF-8 text.  Clients do not parse the
//! prose; they look for the marker substrings below (`Invalid`, `Seller`,
//! `waiting`, `connect again later`) and for the fixed prefixes of the result
//! lines (which carry `Success` / `won` / `not sold`).

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use thiserror::Error;

/// Upper bound (exclusive) on the declared number of bidders.
pub const MAX_BIDDERS: usize = 10;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub const SELLER_ROLE: &str =
    "Connected to the Auctioneer server. Your role is: [Seller]. Please submit auction request:";
pub const BUYER_ROLE: &str = "Connected to the Auctioneer server. Your role is: [Buyer]";
pub const BUSY: &str = "Server is busy. Try to connect again later.";
pub const BIDDING_BUSY: &str = "Bidding on-going! Try to connect again later.";
pub const INVALID_REQUEST: &str =
    "Server: Invalid auction request! Please submit auction request:";
pub const AUCTION_START: &str = "Server: Auction start";
pub const WAITING_FOR_BUYERS: &str =
    "The auctioneer is still waiting for other Buyer to connect...";
pub const BIDDING_START: &str = "The bidding has started! Please submit your bid:";
pub const INVALID_BID: &str =
    "Server: Invalid bid. Please submit a positive integer! Please submit your bid:";
pub const BID_RECEIVED: &str = "Server: Bid received. Please wait...";

const FAREWELL: &str = "Disconnecting from the Auctioneer server. Auction is over!";

pub const SOLD_PREFIX: &str = "Auction finished! Success!";
pub const NOT_SOLD_PREFIX: &str = "Auction finished! Unfortunately your item";
pub const WON_PREFIX: &str = "Auction finished! You won";
pub const LOST_PREFIX: &str = "Auction finished! Unfortunately you did not win";

pub const MARK_BUSY: &str = "connect again later";
pub const MARK_INVALID: &str = "Invalid";
pub const MARK_SELLER: &str = "Seller";
pub const MARK_WAITING: &str = "waiting";

pub fn seller_sold(item: &str, price: u64) -> String {
    format!("{SOLD_PREFIX} Your item {item} has been sold for ${price}. {FAREWELL}")
}

pub fn seller_not_sold(item: &str) -> String {
    format!("{NOT_SOLD_PREFIX} {item} was not sold in the Auction. {FAREWELL}")
}

pub fn buyer_won(item: &str, price: u64) -> String {
    format!("{WON_PREFIX} this item {item}! Your payment due is ${price}. {FAREWELL}")
}

pub fn buyer_lost() -> String {
    format!("{LOST_PREFIX} the last round. {FAREWELL}")
}

// ---------------------------------------------------------------------------
// Auction terms
// ---------------------------------------------------------------------------

/// Pricing rule applied by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionType {
    /// Winner pays their own bid.
    FirstPrice,
    /// Winner pays the highest remaining bid.
    SecondPrice,
}

impl fmt::Display for AuctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuctionType::FirstPrice => write!(f, "first-price"),
            AuctionType::SecondPrice => write!(f, "second-price"),
        }
    }
}

/// Why an auction request was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidRequest {
    #[error("expected 4 fields, got {0}")]
    FieldCount(usize),
    #[error("auction type must be 1 or 2, got {0:?}")]
    AuctionType(String),
    #[error("reserve price must be a positive integer, got {0:?}")]
    ReservePrice(String),
    #[error("bidder count must be between 1 and {}, got {0:?}", MAX_BIDDERS - 1)]
    BidderCount(String),
}

/// Validated seller terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionParams {
    pub auction_type: AuctionType,
    pub reserve_price: u64,
    pub bidder_count: usize,
    pub item: String,
}

impl FromStr for AuctionParams {
    type Err = InvalidRequest;

    /// `<type> <reserve> <bidders> <item>`, whitespace separated.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        let [kind, reserve, count, item] = fields[..] else {
            return Err(InvalidRequest::FieldCount(fields.len()));
        };

        let auction_type = match kind.parse::<i64>() {
            Ok(1) => AuctionType::FirstPrice,
            Ok(2) => AuctionType::SecondPrice,
            _ => return Err(InvalidRequest::AuctionType(kind.to_string())),
        };
        let reserve_price = match reserve.parse::<u64>() {
            Ok(p) if p > 0 => p,
            _ => return Err(InvalidRequest::ReservePrice(reserve.to_string())),
        };
        let bidder_count = match count.parse::<usize>() {
            Ok(n) if n > 0 && n < MAX_BIDDERS => n,
            _ => return Err(InvalidRequest::BidderCount(count.to_string())),
        };

        Ok(Self {
            auction_type,
            reserve_price,
            bidder_count,
            item: item.to_string(),
        })
    }
}

/// A bid line that is not a positive integer.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("bid must be a positive integer, got {0:?}")]
pub struct InvalidBid(pub String);

pub fn parse_bid(raw: &str) -> Result<u64, InvalidBid> {
    match raw.trim().parse::<u64>() {
        Ok(bid) if bid > 0 => Ok(bid),
        _ => Err(InvalidBid(raw.trim().to_string())),
    }
}

// ---------------------------------------------------------------------------
// Transfer handshake
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("not a transfer port: {0:?}")]
    Port(String),
    #[error("not an endpoint (\"<ip> <port>\"): {0:?}")]
    Endpoint(String),
}

/// A client's announced transfer port.
pub fn parse_port(raw: &str) -> Result<u16, HandshakeError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| HandshakeError::Port(raw.trim().to_string()))
}

/// `"<ip> <port>"` as sent to the other side of the handshake.
pub fn format_endpoint(endpoint: SocketAddr) -> String {
    format!("{} {}", endpoint.ip(), endpoint.port())
}

pub fn parse_endpoint(raw: &str) -> Result<SocketAddr, HandshakeError> {
    let bad = || HandshakeError::Endpoint(raw.trim().to_string());
    let mut parts = raw.split_whitespace();
    let (Some(ip), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(bad());
    };
    let ip: IpAddr = ip.parse().map_err(|_| bad())?;
    let port: u16 = port.parse().map_err(|_| bad())?;
    Ok(SocketAddr::new(ip, port))
}
