//! Maximum-weight bipartite matching.
//!
//! Uses the Hungarian method with row/column potentials on a dense matrix
//! where missing edges have weight zero. Because every real edge carries a
//! strictly positive weight, an optimal assignment over the complete matrix
//! restricted to real edges is a maximum-weight matching of the sparse graph.

/// Solve the assignment problem on `weights[row][col]`
///
/// `None` marks a pair that must not be matched. Returns `(row, col)` pairs
/// ordered by row. Rows and columns are scanned in ascending order and ties
/// keep the lower index, so identical input always yields identical output.
pub fn max_weight_assignment(weights: &[Vec<Option<f64>>]) -> Vec<(usize, usize)> {
    let rows = weights.len();
    let cols = weights.first().map_or(0, |r| r.len());
    max_weight_assignment_by(rows, cols, |r, c| weights[r][c])
}

/// Same as [`max_weight_assignment`], reading edge weights on demand
pub fn max_weight_assignment_by<F>(rows: usize, cols: usize, weight: F) -> Vec<(usize, usize)>
where
    F: Fn(usize, usize) -> Option<f64>,
{
    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    let edge = |r: usize, c: usize| weight(r, c).filter(|w| *w > 0.0);

    // The solver needs at least as many columns as rows
    let mut pairs: Vec<(usize, usize)> = if rows <= cols {
        solve(rows, cols, |r, c| edge(r, c).unwrap_or(0.0))
    } else {
        solve(cols, rows, |c, r| edge(r, c).unwrap_or(0.0))
            .into_iter()
            .map(|(c, r)| (r, c))
            .collect()
    };

    pairs.retain(|&(r, c)| edge(r, c).is_some());
    pairs.sort_unstable();
    pairs
}

/// Hungarian method minimizing `-weight` for an `n x m` matrix with `n <= m`
fn solve<F>(n: usize, m: usize, weight: F) -> Vec<(usize, usize)>
where
    F: Fn(usize, usize) -> f64,
{
    // 1-based indices, index 0 is the virtual column
    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; m + 1];
    let mut owner = vec![0_usize; m + 1];
    let mut way = vec![0_usize; m + 1];

    for row in 1..=n {
        owner[0] = row;
        let mut j0 = 0;
        let mut min_v = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = -weight(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < min_v[j] {
                    min_v[j] = cur;
                    way[j] = j0;
                }
                if min_v[j] < delta {
                    delta = min_v[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_v[j] -= delta;
                }
            }

            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }

        // Flip the augmenting path
        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    (1..=m)
        .filter(|&j| owner[j] != 0)
        .map(|j| (owner[j] - 1, j - 1))
        .collect()
}
