use super::*;

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

/// Progressing compute steps with increasing metrics.
fn progress_window() -> Vec<String> {
    (1..=10)
        .map(|i| format!("progress step={i} phase=compute metric=0.9{i:02}"))
        .collect()
}

/// A stuck worker printing the same line ten times.
fn loop_window() -> Vec<String> {
    lines(&["processing request 4242 failed, retrying endlessly"; 10])
}

#[test]
fn entropy_zero_for_empty_window() {
    assert_eq!(shannon_entropy(&[]), 0.0);
}

#[test]
fn entropy_low_for_repeated_single_byte() {
    let window = lines(&["aaaaaaaaaa", "aaaaaaaaaa"]);
    assert!(shannon_entropy(&window) < 0.01);
}

#[test]
fn entropy_higher_for_varied_text() {
    let varied = lines(&["the quick brown fox", "jumps over 13 lazy dogs!"]);
    let flat = lines(&["aaaa aaaa aaaa", "aaaa aaaa aaaa"]);
    assert!(shannon_entropy(&varied) > shannon_entropy(&flat));
}

#[test]
fn repetition_saturates_for_identical_lines() {
    let ratio = repetition_ratio(&loop_window());
    assert!(ratio > 0.8, "ratio {ratio}");
}

#[test]
fn repetition_low_for_varied_lines() {
    let window = lines(&[
        "loading dataset shard 1",
        "tokenizing corpus",
        "building vocabulary",
        "writing checkpoint to disk",
    ]);
    let ratio = repetition_ratio(&window);
    assert!(ratio < 0.3, "ratio {ratio}");
}

#[test]
fn diversity_is_unique_over_total() {
    assert_eq!(raw_diversity(&loop_window()), 0.1);
    assert_eq!(raw_diversity(&progress_window()), 1.0);
    assert_eq!(raw_diversity(&[]), 1.0);
}

#[test]
fn progress_recognizer_accepts_monotonic_steps() {
    assert!(progress_like(&progress_window()));
}

#[test]
fn progress_recognizer_rejects_loops() {
    assert!(!progress_like(&loop_window()));
}

#[test]
fn progress_recognizer_rejects_decreasing_fields() {
    let window = lines(&["step 3", "step 2", "step 1"]);
    assert!(!progress_like(&window));
}

#[test]
fn progress_needs_a_minimum_window() {
    let window = lines(&["step 1", "step 2"]);
    assert!(!progress_like(&window));
}

#[test]
fn progress_tolerates_occasional_plateaus() {
    let window = lines(&["epoch 1", "epoch 2", "epoch 3", "epoch 3", "epoch 4", "epoch 5"]);
    assert!(progress_like(&window));
}

#[test]
fn non_numeric_output_is_not_progress() {
    let window = lines(&["alpha", "beta", "gamma", "delta"]);
    assert!(!progress_like(&window));
}

#[yare::parameterized(
    plain = { "step 12 of 40", &[12.0, 40.0] },
    decimal = { "metric=0.901", &[0.901] },
    trailing_dot = { "done 3.", &[3.0] },
    none = { "no numbers here", &[] },
)]
fn number_extraction(line: &str, expected: &[f64]) {
    assert_eq!(extract_numbers(line), expected);
}
