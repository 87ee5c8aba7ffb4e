//! Built-in two-player matrix games.
//!
//! Both games are plain payoff tables stored row-major. They implement
//! [`PayoffFunction`] directly, so a validated game can be handed to either
//! specialization and shared between concurrent runs behind an `Arc`.

use crate::payoff::PayoffFunction;

/// Errors raised when building a game from payoff tables.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    /// The table has no rows or no columns.
    #[error("payoff table is empty")]
    Empty,

    /// A row has a different length than the first row.
    #[error("payoff table row {row} has {actual} entries, expected {expected}")]
    Ragged {
        /// Index of the offending row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        actual: usize,
    },

    /// A symmetric game needs as many rows as columns.
    #[error("symmetric payoff table is {rows}x{columns}, expected a square table")]
    NotSquare {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        columns: usize,
    },

    /// The row and column tables of a bimatrix game differ in shape.
    #[error("row table is {row_shape:?} but column table is {column_shape:?}")]
    ShapeMismatch {
        /// `(rows, columns)` of the row player's table.
        row_shape: (usize, usize),
        /// `(rows, columns)` of the column player's table.
        column_shape: (usize, usize),
    },

    /// An entry is infinite or NaN.
    #[error("payoff at ({row}, {column}) is not finite: {value}")]
    NonFinite {
        /// Row of the entry.
        row: usize,
        /// Column of the entry.
        column: usize,
        /// The offending value.
        value: f64,
    },
}

/// A dense, validated payoff table.
#[derive(Debug, Clone, PartialEq)]
struct Table {
    rows: usize,
    columns: usize,
    cells: Vec<f64>,
}

impl Table {
    fn new(rows: &[Vec<f64>]) -> Result<Self, GameError> {
        let columns = rows.first().map_or(0, Vec::len);
        if rows.is_empty() || columns == 0 {
            return Err(GameError::Empty);
        }

        let mut cells = Vec::with_capacity(rows.len().saturating_mul(columns));
        for (row, values) in rows.iter().enumerate() {
            if values.len() != columns {
                return Err(GameError::Ragged {
                    row,
                    expected: columns,
                    actual: values.len(),
                });
            }
            for (column, &value) in values.iter().enumerate() {
                if !value.is_finite() {
                    return Err(GameError::NonFinite { row, column, value });
                }
            }
            cells.extend_from_slice(values);
        }

        Ok(Self {
            rows: rows.len(),
            columns,
            cells,
        })
    }

    const fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    /// Entry `(row, column)`, or NaN outside the table.
    fn get(&self, row: usize, column: usize) -> f64 {
        if row >= self.rows || column >= self.columns {
            return f64::NAN;
        }
        row.checked_mul(self.columns)
            .and_then(|start| start.checked_add(column))
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or(f64::NAN)
    }

    fn transposed(&self) -> Self {
        let mut cells = Vec::with_capacity(self.cells.len());
        for column in 0..self.columns {
            for row in 0..self.rows {
                cells.push(self.get(row, column));
            }
        }
        Self {
            rows: self.columns,
            columns: self.rows,
            cells,
        }
    }
}

/// A symmetric two-player game: whoever sits in slot `k` receives
/// `table[profile[k]][profile[1 - k]]`.
///
/// Used by [`crate::OnePopulation`] with interaction arity 2. Profiles of any
/// other length get an empty payoff vector, which the cache builder reports
/// as a configuration error.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricMatrixGame {
    table: Table,
}

impl SymmetricMatrixGame {
    /// Validate a square payoff table.
    ///
    /// # Errors
    ///
    /// Returns [`GameError`] if the table is empty, ragged, not square, or
    /// contains a non-finite entry.
    pub fn new(table: &[Vec<f64>]) -> Result<Self, GameError> {
        let table = Table::new(table)?;
        if table.rows != table.columns {
            return Err(GameError::NotSquare {
                rows: table.rows,
                columns: table.columns,
            });
        }
        Ok(Self { table })
    }

    /// Number of strategies.
    pub const fn strategies(&self) -> usize {
        self.table.rows
    }
}

impl PayoffFunction for SymmetricMatrixGame {
    fn payoffs(&self, profile: &[usize]) -> Vec<f64> {
        match *profile {
            [a, b] => vec![self.table.get(a, b), self.table.get(b, a)],
            _ => Vec::new(),
        }
    }
}

/// A two-population game with separate row and column payoff tables.
///
/// Population 0 picks the row, population 1 the column. Both tables are
/// indexed `[row][column]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BimatrixGame {
    row: Table,
    column: Table,
}

impl BimatrixGame {
    /// Validate both tables and check they have the same shape.
    ///
    /// # Errors
    ///
    /// Returns [`GameError`] if either table is malformed or the shapes
    /// differ.
    pub fn new(row: &[Vec<f64>], column: &[Vec<f64>]) -> Result<Self, GameError> {
        let row = Table::new(row)?;
        let column = Table::new(column)?;
        if row.shape() != column.shape() {
            return Err(GameError::ShapeMismatch {
                row_shape: row.shape(),
                column_shape: column.shape(),
            });
        }
        Ok(Self { row, column })
    }

    /// The two-population form of a symmetric game: the column player's
    /// table is the transpose of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError`] if the table is malformed. It need not be
    /// square.
    pub fn symmetric(table: &[Vec<f64>]) -> Result<Self, GameError> {
        let row = Table::new(table)?;
        if row.rows != row.columns {
            return Err(GameError::NotSquare {
                rows: row.rows,
                columns: row.columns,
            });
        }
        let column = row.transposed();
        Ok(Self { row, column })
    }

    /// Strategy counts `(rows, columns)`.
    pub const fn shape(&self) -> (usize, usize) {
        self.row.shape()
    }
}

impl PayoffFunction for BimatrixGame {
    fn payoffs(&self, profile: &[usize]) -> Vec<f64> {
        match *profile {
            [r, c] => vec![self.row.get(r, c), self.column.get(r, c)],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn pd() -> Vec<Vec<f64>> {
        vec![vec![3.0, 0.0], vec![4.0, 1.0]]
    }

    #[test]
    fn symmetric_game_pays_each_slot_from_its_own_view() {
        let game = SymmetricMatrixGame::new(&pd()).unwrap();
        assert_eq!(game.strategies(), 2);
        assert_eq!(game.payoffs(&[0, 0]), vec![3.0, 3.0]);
        assert_eq!(game.payoffs(&[0, 1]), vec![0.0, 4.0]);
        assert_eq!(game.payoffs(&[1, 0]), vec![4.0, 0.0]);
        assert_eq!(game.payoffs(&[1, 1]), vec![1.0, 1.0]);
    }

    #[test]
    fn wrong_arity_yields_no_payoffs() {
        let game = SymmetricMatrixGame::new(&pd()).unwrap();
        assert!(game.payoffs(&[0, 1, 1]).is_empty());
        assert!(game.payoffs(&[0]).is_empty());
    }

    #[test]
    fn out_of_table_lookup_is_nan() {
        let game = SymmetricMatrixGame::new(&pd()).unwrap();
        let payoffs = game.payoffs(&[0, 2]);
        assert!(payoffs.iter().all(|p| p.is_nan()));
    }

    #[test]
    fn symmetric_bimatrix_matches_symmetric_game() {
        let one = SymmetricMatrixGame::new(&pd()).unwrap();
        let two = BimatrixGame::symmetric(&pd()).unwrap();
        for profile in [[0, 0], [0, 1], [1, 0], [1, 1]] {
            assert_eq!(one.payoffs(&profile), two.payoffs(&profile));
        }
    }

    #[test]
    fn bimatrix_reads_both_tables() {
        let row = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let column = vec![vec![-1.0, -2.0, -3.0], vec![-4.0, -5.0, -6.0]];
        let game = BimatrixGame::new(&row, &column).unwrap();
        assert_eq!(game.shape(), (2, 3));
        assert_eq!(game.payoffs(&[1, 2]), vec![6.0, -6.0]);
    }

    #[test]
    fn malformed_tables_are_rejected() {
        assert_eq!(SymmetricMatrixGame::new(&[]), Err(GameError::Empty));
        assert_eq!(
            SymmetricMatrixGame::new(&[vec![1.0, 2.0], vec![3.0]]),
            Err(GameError::Ragged { row: 1, expected: 2, actual: 1 })
        );
        assert_eq!(
            SymmetricMatrixGame::new(&[vec![1.0, 2.0]]),
            Err(GameError::NotSquare { rows: 1, columns: 2 })
        );
        assert!(matches!(
            SymmetricMatrixGame::new(&[vec![f64::INFINITY]]),
            Err(GameError::NonFinite { row: 0, column: 0, .. })
        ));
        assert!(matches!(
            BimatrixGame::new(&pd(), &[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]),
            Err(GameError::ShapeMismatch { .. })
        ));
    }
}
