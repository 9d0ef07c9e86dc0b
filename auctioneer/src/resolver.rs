//! Winner selection and clearing price.
//!
//! Pure function over the bids in join order.  Ties at the top go to the
//! earliest bidder.  In a second-price auction exactly one copy of the top bid
//! is removed before taking the next maximum, so a tie at the top clears at
//! the top bid itself.

use crate::protocol::AuctionType;

/// Result of resolving one auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Sold {
        /// Index into the bid list (join order).
        winner: usize,
        highest: u64,
        price: u64,
    },
    NotSold {
        /// Highest bid seen (0 when there were no bids).
        highest: u64,
    },
}

impl Resolution {
    pub fn winner(&self) -> Option<usize> {
        match self {
            Resolution::Sold { winner, .. } => Some(*winner),
            Resolution::NotSold { .. } => None,
        }
    }

    pub fn price(&self) -> Option<u64> {
        match self {
            Resolution::Sold { price, .. } => Some(*price),
            Resolution::NotSold { .. } => None,
        }
    }
}

pub fn resolve(bids: &[u64], auction_type: AuctionType, reserve_price: u64) -> Resolution {
    // First index wins ties: `max_by_key` would keep the last.
    let top = bids
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, u64)>, (i, bid)| match best {
            Some((_, b)) if b >= bid => best,
            _ => Some((i, bid)),
        });

    let Some((winner, highest)) = top else {
        return Resolution::NotSold { highest: 0 };
    };
    if highest < reserve_price {
        return Resolution::NotSold { highest };
    }

    let price = match auction_type {
        AuctionType::FirstPrice => highest,
        AuctionType::SecondPrice => bids
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != winner)
            .map(|(_, &bid)| bid)
            .max()
            // A lone bidder has no competitor; the reserve sets the price.
            .unwrap_or(reserve_price),
    };

    Resolution::Sold {
        winner,
        highest,
        price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AuctionType::{FirstPrice, SecondPrice};

    #[test]
    fn first_price_highest_pays_own_bid() {
        assert_eq!(
            resolve(&[15, 20], FirstPrice, 10),
            Resolution::Sold {
                winner: 1,
                highest: 20,
                price: 20
            }
        );
    }

    #[test]
    fn second_price_tie_clears_at_top_bid() {
        assert_eq!(
            resolve(&[5, 20, 20], SecondPrice, 10),
            Resolution::Sold {
                winner: 1,
                highest: 20,
                price: 20
            }
        );
    }

    #[test]
    fn second_price_pays_runner_up() {
        assert_eq!(
            resolve(&[12, 9], SecondPrice, 10),
            Resolution::Sold {
                winner: 0,
                highest: 12,
                price: 9
            }
        );
    }

    #[test]
    fn second_price_runner_up_may_be_below_reserve() {
        let r = resolve(&[3, 40, 7], SecondPrice, 30);
        assert_eq!(r.winner(), Some(1));
        assert_eq!(r.price(), Some(7));
    }

    #[test]
    fn below_reserve_is_not_sold() {
        assert_eq!(
            resolve(&[30, 49], FirstPrice, 50),
            Resolution::NotSold { highest: 49 }
        );
        assert_eq!(resolve(&[30, 49], SecondPrice, 50).winner(), None);
    }

    #[test]
    fn reserve_is_inclusive() {
        assert_eq!(resolve(&[50], FirstPrice, 50).price(), Some(50));
    }

    #[test]
    fn earliest_bidder_wins_ties() {
        assert_eq!(resolve(&[8, 8, 8], FirstPrice, 1).winner(), Some(0));
        assert_eq!(resolve(&[1, 9, 3, 9], FirstPrice, 1).winner(), Some(1));
    }

    #[test]
    fn lone_second_price_bidder_pays_reserve() {
        assert_eq!(resolve(&[25], SecondPrice, 10).price(), Some(10));
    }

    #[test]
    fn no_bids_no_sale() {
        assert_eq!(resolve(&[], FirstPrice, 1), Resolution::NotSold { highest: 0 });
    }

    #[test]
    fn clearing_price_never_exceeds_highest() {
        let sets: [&[u64]; 5] = [&[1, 2, 3], &[9, 9], &[4], &[100, 1, 99], &[7, 7, 6, 7]];
        for bids in sets {
            let highest = *bids.iter().max().unwrap();
            for kind in [FirstPrice, SecondPrice] {
                match resolve(bids, kind, 1) {
                    Resolution::Sold { price, highest: h, winner } => {
                        assert_eq!(h, highest);
                        assert_eq!(bids[winner], highest);
                        assert!(price <= highest);
                        if kind == FirstPrice {
                            assert_eq!(price, highest);
                        }
                    }
                    other => panic!("expected sale for {bids:?}, got {other:?}"),
                }
            }
        }
    }
}
