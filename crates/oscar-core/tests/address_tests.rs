//! Address validation and pattern matching tests

use oscar_core::{validate_address, Error, Pattern};

fn is_invalid(pattern: &str) -> bool {
    matches!(Pattern::compile(pattern), Err(Error::InvalidAddress(_)))
}

#[test]
fn test_compile_rejects_malformed() {
    assert!(is_invalid("/["));
    assert!(is_invalid("["));
    assert!(is_invalid("foo"));
    assert!(is_invalid(""));
    assert!(is_invalid("/[abc"));
    assert!(is_invalid("/[!"));
    assert!(is_invalid("/[]"));
    assert!(is_invalid("/[!]"));
    assert!(is_invalid("/[z-a]"));
    assert!(is_invalid("/{foo,bar"));
    assert!(is_invalid("/{foo,[bar]}"));
    assert!(is_invalid("/foo]"));
    assert!(is_invalid("/foo}"));
    assert!(is_invalid("/foo bar"));
    assert!(is_invalid("/foo#"));
}

#[test]
fn test_exact_match() {
    let pattern = Pattern::compile("/foo").unwrap();
    assert!(pattern.is_literal());
    assert!(pattern.matches("/foo"));
    assert!(!pattern.matches("/foo/"));
    assert!(!pattern.matches("/bar"));
    assert_eq!(pattern.as_str(), "/foo");
}

#[test]
fn test_question_mark() {
    let pattern = Pattern::compile("/voice/?").unwrap();
    assert!(!pattern.is_literal());
    assert!(pattern.matches("/voice/1"));
    assert!(pattern.matches("/voice/x"));
    assert!(!pattern.matches("/voice/"));
    assert!(!pattern.matches("/voice/12"));
}

#[test]
fn test_star() {
    let pattern = Pattern::compile("/mixer/*/gain").unwrap();
    assert!(pattern.matches("/mixer/1/gain"));
    assert!(pattern.matches("/mixer//gain"));
    assert!(pattern.matches("/mixer/bus/2/gain"));
    assert!(!pattern.matches("/mixer/1/pan"));

    let all = Pattern::compile("/*").unwrap();
    assert!(all.matches("/"));
    assert!(all.matches("/anything/at/all"));
}

#[test]
fn test_character_classes() {
    let pattern = Pattern::compile("/track/[1-3]").unwrap();
    assert!(pattern.matches("/track/1"));
    assert!(pattern.matches("/track/3"));
    assert!(!pattern.matches("/track/4"));

    let set = Pattern::compile("/[abc]x").unwrap();
    assert!(set.matches("/bx"));
    assert!(!set.matches("/dx"));

    let negated = Pattern::compile("/track/[!1-3]").unwrap();
    assert!(negated.matches("/track/4"));
    assert!(negated.matches("/track/a"));
    assert!(!negated.matches("/track/2"));

    let dash = Pattern::compile("/[a-]").unwrap();
    assert!(dash.matches("/a"));
    assert!(dash.matches("/-"));
    assert!(!dash.matches("/b"));

    let bang = Pattern::compile("/[a!]").unwrap();
    assert!(bang.matches("/!"));
}

#[test]
fn test_class_set_operator_characters_are_literal() {
    let and = Pattern::compile("/[a&&b]").unwrap();
    assert!(and.matches("/&"));
    assert!(and.matches("/a"));
    assert!(!and.matches("/c"));

    let tilde = Pattern::compile("/[a~~b]").unwrap();
    assert!(tilde.matches("/~"));
    assert!(tilde.matches("/b"));

    let negated = Pattern::compile("/[!&~]").unwrap();
    assert!(negated.matches("/x"));
    assert!(!negated.matches("/&"));
    assert!(!negated.matches("/~"));
}

#[test]
fn test_alternation() {
    let pattern = Pattern::compile("/synth/{freq,amp}").unwrap();
    assert!(pattern.matches("/synth/freq"));
    assert!(pattern.matches("/synth/amp"));
    assert!(!pattern.matches("/synth/pan"));
    assert!(!pattern.matches("/synth/freqamp"));

    let optional = Pattern::compile("/a{,b}").unwrap();
    assert!(optional.matches("/a"));
    assert!(optional.matches("/ab"));
}

#[test]
fn test_combined_wildcards() {
    let pattern = Pattern::compile("/{left,right}/[0-9]*/?ain").unwrap();
    assert!(pattern.matches("/left/3/gain"));
    assert!(pattern.matches("/right/42x/main"));
    assert!(!pattern.matches("/center/3/gain"));
    assert!(!pattern.matches("/left/x/gain"));
}

#[test]
fn test_regex_metacharacters_are_literal() {
    let pattern = Pattern::compile("/a+b/(c)|d$/*").unwrap();
    assert!(pattern.matches("/a+b/(c)|d$/e"));
    assert!(!pattern.matches("/aab/c/e"));
}

#[test]
fn test_validate_address() {
    assert!(validate_address("/foo/bar").is_ok());
    assert_eq!(
        validate_address("/[").unwrap_err(),
        Error::InvalidAddress("reserved character '[' at offset 1 in \"/[\"".to_string())
    );
    assert!(matches!(validate_address("["), Err(Error::InvalidAddress(_))));
    assert!(matches!(validate_address("/a*"), Err(Error::InvalidAddress(_))));
}

#[test]
fn test_pattern_accepts_what_address_rejects() {
    for s in ["/a*", "/a?", "/[ab]", "/{a,b}"] {
        assert!(validate_address(s).is_err());
        assert!(Pattern::compile(s).is_ok());
    }
}
