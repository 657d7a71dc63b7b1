//! Range-vs-range terminal evaluation in O(H) per terminal.
//!
//! All functions take the opponent's reach probabilities as a slice aligned
//! with the strength-sorted hand list. Card-removal correction runs on
//! per-card running sums: for each hand we subtract the opponent mass that
//! collides with either of our hole cards, so no O(H^2) pair loop is
//! needed.
//!
//! The showdown walks equivalence classes of equal hand value in three
//! passes — win counts, cumulative-counter update, lose counts — so ties
//! within a class contribute zero net value.

use crate::hands::BoardHands;

/// Per-card and total opponent reach mass.
#[derive(Debug, Clone)]
pub struct OppTotals {
    /// Opponent mass on hands containing each card.
    pub per_card: Vec<f64>,
    /// Total opponent mass.
    pub sum: f64,
}

/// Accumulate per-card opponent totals over the hand list.
#[must_use]
pub fn opp_totals(hands: &BoardHands, opp: &[f64], max_card1: usize) -> OppTotals {
    let mut per_card = vec![0.0; max_card1];
    let mut sum = 0.0;
    for (i, h) in hands.iter().enumerate() {
        let p = opp[i];
        per_card[usize::from(h.hi)] += p;
        per_card[usize::from(h.lo)] += p;
        sum += p;
    }
    OppTotals { per_card, sum }
}

/// Per-hand showdown value `(win_prob - lose_prob) * half_pot`, with
/// card-removal correction, indexed by strength-sorted hand.
#[must_use]
pub fn showdown_values(
    hands: &BoardHands,
    opp: &[f64],
    half_pot: f64,
    max_card1: usize,
) -> Vec<f64> {
    let totals = opp_totals(hands, opp, max_card1);
    let n = hands.len();
    let mut cum_card = vec![0.0; max_card1];
    let mut opp_cum = 0.0;
    let mut win = vec![0.0; n];
    let mut vals = vec![0.0; n];

    let mut j = 0;
    while j < n {
        let class_value = hands.hand(j).value;
        let begin = j;
        // Pass 1: win mass from strictly weaker classes, minus collisions.
        while j < n && hands.hand(j).value == class_value {
            let h = hands.hand(j);
            win[j] = opp_cum
                - cum_card[usize::from(h.hi)]
                - cum_card[usize::from(h.lo)];
            j += 1;
        }
        // Pass 2: fold this class into the cumulative counters.
        for k in begin..j {
            let p = opp[k];
            if p <= 0.0 {
                continue;
            }
            let h = hands.hand(k);
            cum_card[usize::from(h.hi)] += p;
            cum_card[usize::from(h.lo)] += p;
            opp_cum += p;
        }
        // Pass 3: lose mass from strictly stronger classes.
        for k in begin..j {
            let h = hands.hand(k);
            let better_hi = totals.per_card[usize::from(h.hi)] - cum_card[usize::from(h.hi)];
            let better_lo = totals.per_card[usize::from(h.lo)] - cum_card[usize::from(h.lo)];
            let lose = (totals.sum - opp_cum) - better_hi - better_lo;
            vals[k] = (win[k] - lose) * half_pot;
        }
    }
    vals
}

/// Per-hand sum of opponent reach consistent with us holding the hand
/// (total mass minus hands that share one of our cards).
#[must_use]
pub fn consistent_opp_sums(hands: &BoardHands, opp: &[f64], max_card1: usize) -> Vec<f64> {
    let totals = opp_totals(hands, opp, max_card1);
    hands
        .iter()
        .enumerate()
        .map(|(i, h)| {
            totals.sum + opp[i]
                - totals.per_card[usize::from(h.hi)]
                - totals.per_card[usize::from(h.lo)]
        })
        .collect()
}

/// Per-hand fold value: `signed_half_pot` times the consistent opponent
/// mass. Positive `signed_half_pot` means our side remains.
#[must_use]
pub fn fold_values(
    hands: &BoardHands,
    opp: &[f64],
    signed_half_pot: f64,
    max_card1: usize,
) -> Vec<f64> {
    consistent_opp_sums(hands, opp, max_card1)
        .into_iter()
        .map(|c| c * signed_half_pot)
        .collect()
}
