//! Integer card representation.
//!
//! A card is an integer in `[0, num_ranks * num_suits)` with
//! `card = rank * num_suits + suit`, so adjacent codes share a rank.
//! All deck geometry beyond that lives in [`crate::game::Game`].

/// A single card. Decks never exceed 52 cards, so `u8` is enough.
pub type Card = u8;

/// Rank characters in ascending order; games with fewer than 13 ranks use
/// a prefix (rank 0 is always displayed as `2`).
const RANK_CHARS: &[u8; 13] = b"23456789TJQKA";

/// Suit characters in fixed order.
const SUIT_CHARS: &[u8; 4] = b"cdhs";

/// Build a card from rank and suit.
#[must_use]
pub fn make_card(rank: u8, suit: u8, num_suits: u8) -> Card {
    rank * num_suits + suit
}

/// Rank of a card (0-based, ascending).
#[must_use]
pub fn rank(card: Card, num_suits: u8) -> u8 {
    card / num_suits
}

/// Suit of a card.
#[must_use]
pub fn suit(card: Card, num_suits: u8) -> u8 {
    card % num_suits
}

/// Two-character display form, e.g. `"Ah"` or `"7c"`.
#[must_use]
pub fn card_string(card: Card, num_suits: u8) -> String {
    let r = rank(card, num_suits) as usize;
    let s = suit(card, num_suits) as usize;
    let mut out = String::with_capacity(2);
    out.push(RANK_CHARS[r.min(12)] as char);
    out.push(SUIT_CHARS[s.min(3)] as char);
    out
}

/// Space-separated display form of a card slice.
#[must_use]
pub fn cards_string(cards: &[Card], num_suits: u8) -> String {
    cards
        .iter()
        .map(|&c| card_string(c, num_suits))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_macros::timed_test;

    #[timed_test]
    fn rank_suit_round_trip() {
        for r in 0..13u8 {
            for s in 0..4u8 {
                let c = make_card(r, s, 4);
                assert_eq!(rank(c, 4), r);
                assert_eq!(suit(c, 4), s);
            }
        }
    }

    #[timed_test]
    fn card_string_full_deck_corners() {
        // 52-card deck: rank 0 suit 0 = 2c, rank 12 suit 3 = As.
        assert_eq!(card_string(make_card(0, 0, 4), 4), "2c");
        assert_eq!(card_string(make_card(12, 3, 4), 4), "As");
    }

    #[timed_test]
    fn card_string_short_deck() {
        // 8-card deck (4 ranks, 2 suits): highest card is 5d.
        assert_eq!(card_string(make_card(3, 1, 2), 2), "5d");
        assert_eq!(cards_string(&[0, 7], 2), "2c 5d");
    }
}
