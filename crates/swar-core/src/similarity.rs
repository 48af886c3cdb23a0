//! Edit-distance text similarity.
//!
//! All comparisons run on normalized text: lower-cased, punctuation
//! stripped, whitespace collapsed.

/// Combining marks that `char::is_alphanumeric` rejects.
///
/// Covers the combining diacritical blocks and the Indic script blocks,
/// where viramas and nuktas are marks but not alphabetic. Indic dandas and
/// the abbreviation sign stay punctuation.
fn is_combining_mark(c: char) -> bool {
    match c as u32 {
        0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F => true,
        0x0964 | 0x0965 | 0x0970 | 0x0DF4 => false,
        0x0900..=0x0DFF => !c.is_alphanumeric() && !c.is_whitespace(),
        _ => false,
    }
}

/// Normalize text for comparison.
///
/// Keeps alphanumerics, combining marks, underscores and whitespace; runs
/// of whitespace collapse to a single space and the ends are trimmed.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || is_combining_mark(*c) || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Character-level Levenshtein distance with unit costs.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b_len {
        matrix[0][j] = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}

/// Similarity of two strings as a percentage in `[0, 100]`.
///
/// Both inputs are normalized first. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    similarity_normalized(&a, &b)
}

/// Same as [`similarity`] for inputs that are already normalized.
pub(crate) fn similarity_normalized(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100.0;
    }
    let distance = edit_distance(a, b);
    100.0 * (1.0 - distance as f64 / longest as f64)
}
