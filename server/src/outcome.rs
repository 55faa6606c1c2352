//! Splits a game's options into winners and losers from their pooled stakes.

use common::GameMode;

use crate::error::ClassificationError;

/// Winning and losing option indices, parallel to the option list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub winners: Vec<usize>,
    pub losers: Vec<usize>,
    /// Set when a minority game drew no stake at all and the losers were
    /// promoted to winners for display. `winners` and `losers` then hold the
    /// same indices.
    pub promoted: bool,
}

impl Outcome {
    pub fn is_winner(&self, index: usize) -> bool {
        !self.promoted && self.winners.contains(&index)
    }
}

pub fn classify(stakes: &[u64], mode: GameMode) -> Result<Outcome, ClassificationError> {
    let (mut winners, mut losers) = match mode {
        GameMode::Majority => resolve_majority(stakes)?,
        GameMode::Minority => resolve_minority(stakes)?,
    };
    winners.sort_unstable();
    losers.sort_unstable();

    if !winners.is_empty() {
        return Ok(Outcome {
            winners,
            losers,
            promoted: false,
        });
    }

    match mode {
        GameMode::Majority => Err(ClassificationError::NoWinner),
        GameMode::Minority => Ok(Outcome {
            winners: losers.clone(),
            losers,
            promoted: true,
        }),
    }
}

fn resolve_majority(stakes: &[u64]) -> Result<(Vec<usize>, Vec<usize>), ClassificationError> {
    let mut max = *stakes.first().ok_or(ClassificationError::NoOptions)?;
    let mut winners = Vec::new();
    let mut losers = Vec::new();

    for (i, &value) in stakes.iter().enumerate() {
        if value > max {
            losers.append(&mut winners);
            winners.push(i);
            max = value;
        } else if value == max {
            winners.push(i);
        } else {
            losers.push(i);
        }
    }

    // nobody staked anything, so there is nothing to win
    if max == 0 {
        return Err(ClassificationError::NoWinner);
    }
    Ok((winners, losers))
}

fn resolve_minority(stakes: &[u64]) -> Result<(Vec<usize>, Vec<usize>), ClassificationError> {
    // start from the largest stake so an empty option never becomes the minimum
    let mut min = stakes
        .iter()
        .copied()
        .max()
        .ok_or(ClassificationError::NoOptions)?;
    let mut winners = Vec::new();
    let mut losers = Vec::new();

    for (i, &value) in stakes.iter().enumerate() {
        if value == 0 {
            losers.push(i);
        } else if value < min {
            losers.append(&mut winners);
            winners.push(i);
            min = value;
        } else if value == min {
            winners.push(i);
        } else {
            losers.push(i);
        }
    }
    Ok((winners, losers))
}
