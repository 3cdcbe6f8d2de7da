//! Bingo cards: an N×N grid holding each of 1..=N² exactly once, stored
//! row-major.

use rand::seq::SliceRandom;

/// Deals a shuffled card for an `n`×`n` grid.
pub fn generate_card(n: usize) -> Vec<u32> {
    let mut card: Vec<u32> = (1..=(n * n) as u32).collect();
    card.shuffle(&mut rand::rng());
    card
}

/// Checks that `card` holds each of 1..=n² exactly once.
///
/// # Errors
/// A short description of the first problem found.
pub fn validate_card(card: &[u32], n: usize) -> Result<(), String> {
    let cells = n * n;
    if card.len() != cells {
        return Err(format!("expected {cells} numbers, got {}", card.len()));
    }
    let mut seen = vec![false; cells];
    for &number in card {
        let slot = (number as usize).checked_sub(1).filter(|&i| i < cells);
        match slot {
            None => return Err(format!("{number} is outside 1..={cells}")),
            Some(i) if seen[i] => return Err(format!("{number} appears twice")),
            Some(i) => seen[i] = true,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_card_is_a_permutation() {
        for n in [3, 5, 10] {
            let card = generate_card(n);
            assert_eq!(validate_card(&card, n), Ok(()));
        }
    }

    #[test]
    fn test_validate_card_wrong_length() {
        assert!(validate_card(&[1, 2, 3], 2).is_err());
    }

    #[test]
    fn test_validate_card_out_of_range() {
        assert!(validate_card(&[1, 2, 3, 5], 2).is_err());
        assert!(validate_card(&[0, 1, 2, 3], 2).is_err());
    }

    #[test]
    fn test_validate_card_duplicate() {
        let err = validate_card(&[1, 2, 2, 4], 2).unwrap_err();
        assert!(err.contains("twice"), "{err}");
    }

    #[test]
    fn test_validate_card_any_order_is_fine() {
        assert_eq!(validate_card(&[4, 3, 2, 1], 2), Ok(()));
    }
}
