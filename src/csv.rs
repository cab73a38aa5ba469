//! CSV tile-data codec.
//!
//! Tile grids travel between the two formats as opaque delimited text. The
//! codec only normalises line endings; it never rewrites the tokens themselves.

/// Append a trailing comma to every non-blank line that lacks one.
///
/// Blank lines pass through unchanged and lines are re-joined with `\n`.
/// Applying `repair` twice gives the same text as applying it once.
pub fn repair(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.ends_with(',') {
                line.to_owned()
            } else {
                format!("{trimmed},")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A non-blank grid line that does not end with a comma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnterminatedLine {
    /// 1-based line number
    pub line: usize,
    /// The trimmed line content
    pub content: String,
}

/// Report every non-blank line whose trimmed content lacks a trailing comma.
pub fn check_line_endings(text: &str) -> Vec<UnterminatedLine> {
    text.split('\n')
        .enumerate()
        .filter_map(|(i, line)| {
            let trimmed = line.trim();
            (!trimmed.is_empty() && !trimmed.ends_with(',')).then(|| UnterminatedLine {
                line: i + 1,
                content: trimmed.to_owned(),
            })
        })
        .collect()
}

/// Render an integer grid as CSV rows of `width` tokens.
///
/// Every row but the last ends with a comma, which is how Tiled writes its
/// own CSV data. A `width` of zero puts everything on one row.
pub fn encode_gids(gids: &[u32], width: usize) -> String {
    let width = if width == 0 { gids.len().max(1) } else { width };
    gids.chunks(width)
        .map(|row| {
            row.iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Problems found by the strict grid check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridIssue {
    /// A token that is not an unsigned tile index
    BadToken {
        /// 1-based line number
        line: usize,
        /// Offending token
        token: String,
    },
    /// A row whose token count differs from the layer width
    RowWidth {
        /// 1-based line number
        line: usize,
        /// Tokens on the row
        found: usize,
        /// Layer width
        expected: usize,
    },
    /// Total tokens differ from `width * height`
    CellCount {
        /// Tokens in the grid
        found: usize,
        /// `width * height`
        expected: usize,
    },
}

impl std::fmt::Display for GridIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridIssue::BadToken { line, token } => {
                write!(f, "line {line}: '{token}' is not a tile index")
            }
            GridIssue::RowWidth {
                line,
                found,
                expected,
            } => write!(f, "line {line}: {found} tiles, expected {expected}"),
            GridIssue::CellCount { found, expected } => {
                write!(f, "grid has {found} tiles, expected {expected}")
            }
        }
    }
}

/// Decode every token and compare the grid shape against `width * height`.
///
/// Blank lines and the empty token after a trailing comma are ignored.
pub fn check_grid(text: &str, width: usize, height: usize) -> Vec<GridIssue> {
    let mut issues = Vec::new();
    let mut cells = 0;

    for (i, line) in text.split('\n').enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        for token in &tokens {
            if token.parse::<u32>().is_err() {
                issues.push(GridIssue::BadToken {
                    line: i + 1,
                    token: (*token).to_owned(),
                });
            }
        }
        if tokens.len() != width {
            issues.push(GridIssue::RowWidth {
                line: i + 1,
                found: tokens.len(),
                expected: width,
            });
        }
        cells += tokens.len();
    }

    if cells != width * height {
        issues.push(GridIssue::CellCount {
            found: cells,
            expected: width * height,
        });
    }
    issues
}
