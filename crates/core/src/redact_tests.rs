use super::*;
use proptest::prelude::*;

#[yare::parameterized(
    bearer = { "curl -H 'Authorization: Bearer sk-live-abc123'" },
    api_key_flag = { "worker --api-key s3cr3t --verbose" },
    api_key_eq = { "worker --api-key=s3cr3t" },
    token_flag = { "deploy --token ghp_abcdef" },
    password_flag = { "psql --password hunter2" },
    env_assign = { "FLOWFORGE_API_KEY=deadbeef ./run.sh" },
    generic_pair = { "connect password=topsecret host=db" },
)]
fn known_secrets_are_removed(input: &str) {
    let redactor = Redactor::new();
    let out = redactor.redact(input);
    assert!(out.contains(REDACTION_MARKER), "no marker in {out:?}");
    assert!(!redactor.contains_secret(&out), "secret survived: {out:?}");
}

#[test]
fn flag_names_survive_redaction() {
    let redactor = Redactor::new();
    let out = redactor.redact("worker --api-key=s3cr3t");
    assert!(out.contains("--api-key"), "flag name lost: {out:?}");
    assert!(!out.contains("s3cr3t"));
}

#[test]
fn clean_text_is_untouched() {
    let redactor = Redactor::new();
    let input = "processing request 4242 failed, retrying endlessly";
    assert_eq!(redactor.redact(input), input);
    assert!(!redactor.contains_secret(input));
}

#[test]
fn redact_command_joins_and_scrubs() {
    let redactor = Redactor::new();
    let out = redactor.redact_command(
        "train",
        &["--model".into(), "m1".into(), "--token".into(), "tok123".into()],
    );
    assert!(out.starts_with("train --model m1"));
    assert!(!out.contains("tok123"));
}

#[test]
fn extra_patterns_extend_catalog() {
    let redactor = Redactor::with_patterns(["xoxb-[0-9A-Za-z-]+"]);
    let out = redactor.redact("slack xoxb-1234-abcd done");
    assert!(!out.contains("xoxb-1234"));
    // Built-ins still active
    assert!(!redactor.redact("--password p").contains("password p"));
}

#[test]
fn invalid_extra_pattern_is_skipped() {
    let redactor = Redactor::with_patterns(["("]);
    assert_eq!(redactor.redact("hello"), "hello");
}

proptest! {
    // Persisted commands never match a known secret
    // pattern after redaction, for any value shape.
    #[test]
    fn redacted_output_never_matches_catalog(
        value in "[A-Za-z0-9_/.+-]{1,32}",
        flag in prop::sample::select(vec!["--api-key", "--token", "--password"]),
        prefix in "[a-z ]{0,16}",
    ) {
        let redactor = Redactor::new();
        let line = format!("{prefix}{flag} {value}");
        let out = redactor.redact(&line);
        prop_assert!(!redactor.contains_secret(&out), "leak in {out:?}");
    }

    #[test]
    fn bearer_tokens_never_survive(token in "[a-z0-9._~+-]{8,64}") {
        let redactor = Redactor::new();
        let out = redactor.redact(&format!("Authorization: Bearer {token}"));
        prop_assert!(!out.contains(&token));
        prop_assert!(!redactor.contains_secret(&out));
    }
}
