//! Pure output-signal math: entropy, repetition, diversity and the
//! progress-pattern recognizer. No IO, fully deterministic.

/// Shannon entropy (bits) over the byte distribution of the window.
pub fn shannon_entropy(lines: &[String]) -> f64 {
    let mut counts = [0u64; 256];
    let mut total = 0u64;
    for line in lines {
        for &b in line.as_bytes() {
            counts[b as usize] += 1;
            total += 1;
        }
    }
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Max token-trigram repetition ratio over the window (0..1): how often the
/// single most frequent trigram accounts for the text.
pub fn repetition_ratio(lines: &[String]) -> f64 {
    let tokens: Vec<&str> = lines
        .iter()
        .flat_map(|l| l.split_whitespace())
        .collect();
    if tokens.len() < 3 {
        // fall back to whole-line repetition for tiny windows
        return line_repetition(lines);
    }
    let mut counts: std::collections::HashMap<(&str, &str, &str), usize> =
        std::collections::HashMap::new();
    for w in tokens.windows(3) {
        *counts.entry((w[0], w[1], w[2])).or_default() += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    let total = tokens.len() - 2;
    max as f64 / total as f64
}

fn line_repetition(lines: &[String]) -> f64 {
    if lines.is_empty() {
        return 0.0;
    }
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for line in lines {
        *counts.entry(line.as_str()).or_default() += 1;
    }
    let max = counts.values().copied().max().unwrap_or(0);
    max as f64 / lines.len() as f64
}

/// Unique-line / total-line ratio over the sliding window.
pub fn raw_diversity(lines: &[String]) -> f64 {
    if lines.is_empty() {
        return 1.0;
    }
    let unique: std::collections::HashSet<&str> =
        lines.iter().map(|l| l.as_str()).collect();
    unique.len() as f64 / lines.len() as f64
}

/// Minimum window before the progress recognizer speaks up.
const PROGRESS_MIN_LINES: usize = 3;
/// Share of consecutive pairs that must advance for a field to count as
/// monotonic progress.
const PROGRESS_PAIR_FLOOR: f64 = 0.8;

/// Recognize progressing output: a numeric field that advances monotonically
/// across the window, or per-step prefixes with an increasing first number.
pub fn progress_like(lines: &[String]) -> bool {
    if lines.len() < PROGRESS_MIN_LINES {
        return false;
    }
    let numbers: Vec<Vec<f64>> = lines.iter().map(|l| extract_numbers(l)).collect();
    let columns = numbers.iter().map(|n| n.len()).min().unwrap_or(0);
    if columns == 0 {
        return false;
    }

    for col in 0..columns {
        let mut advancing = 0usize;
        let mut non_decreasing = true;
        for pair in numbers.windows(2) {
            let (a, b) = (pair[0][col], pair[1][col]);
            if b > a {
                advancing += 1;
            } else if b < a {
                non_decreasing = false;
                break;
            }
        }
        let pairs = numbers.len() - 1;
        if non_decreasing && advancing as f64 / pairs as f64 >= PROGRESS_PAIR_FLOOR {
            return true;
        }
    }
    false
}

/// All numeric fields in a line, in order.
fn extract_numbers(line: &str) -> Vec<f64> {
    let mut numbers = Vec::new();
    let mut current = String::new();
    for c in line.chars() {
        if c.is_ascii_digit() || (c == '.' && !current.is_empty() && !current.contains('.')) {
            current.push(c);
        } else if !current.is_empty() {
            if let Ok(n) = current.trim_end_matches('.').parse() {
                numbers.push(n);
            }
            current.clear();
        }
    }
    if !current.is_empty() {
        if let Ok(n) = current.trim_end_matches('.').parse() {
            numbers.push(n);
        }
    }
    numbers
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
