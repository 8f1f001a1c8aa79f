use crate::errors::{Error, Result};

/// Turn per-input target positions into a gather order for the flat concatenation.
///
/// `positions[j][i]` is where element `i` of input `j` should land. Flattened, the positions
/// must be a permutation of `0..len`. The returned vector holds, for each output position, the
/// index into the flat concatenation that belongs there.
///
pub fn inverse_permutation(positions: &[Vec<usize>], len: usize) -> Result<Vec<usize>> {
    let flat = positions.iter().flatten().copied().collect::<Vec<_>>();
    if flat.len() != len {
        return Err(Error::InvalidPositions(format!(
            "got {} positions for {len} concatenated elements",
            flat.len()
        )));
    }

    let mut inverse = vec![None; len];
    for (source, &target) in flat.iter().enumerate() {
        match inverse.get_mut(target) {
            Some(slot @ None) => *slot = Some(source),
            Some(Some(_)) => {
                return Err(Error::InvalidPositions(format!(
                    "position {target} given more than once"
                )))
            }
            None => {
                return Err(Error::InvalidPositions(format!(
                    "position {target} is out of range for length {len}"
                )))
            }
        }
    }

    // Length matches and no duplicates, so every slot is filled
    Ok(inverse.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_permutation() -> Result<()> {
        assert_eq!(
            inverse_permutation(&[vec![0, 2], vec![1, 3]], 4)?,
            vec![0, 2, 1, 3]
        );
        assert_eq!(
            inverse_permutation(&[vec![3], vec![0, 1], vec![2]], 4)?,
            vec![1, 2, 3, 0]
        );
        assert_eq!(inverse_permutation(&[vec![], vec![]], 0)?, Vec::<usize>::new());

        Ok(())
    }

    #[test]
    fn test_invalid_positions() {
        for (positions, len) in [
            (vec![vec![0, 1], vec![1, 2]], 4),
            (vec![vec![0, 1], vec![2, 4]], 4),
            (vec![vec![0, 1], vec![2]], 4),
        ] {
            assert!(matches!(
                inverse_permutation(&positions, len),
                Err(Error::InvalidPositions(_))
            ));
        }
    }
}
