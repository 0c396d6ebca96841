//! Cross-cutting runtime properties: determinism, memoization equivalence,
//! label scoping, statistics, options and the error surface

use std::rc::Rc;

use vireo_peg::{
    parse, CharClassMatcher, Grammar, GrammarBuilder, Interpreter, ParseOptions, Position, Value,
};

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// A grammar that backtracks: s <- ("a" "b") / ("a" "c")
fn backtracking_grammar() -> Grammar {
    let mut b = GrammarBuilder::new();
    let a1 = b.literal("a");
    let b1 = b.literal("b");
    let seq1 = b.sequence(&[a1, b1]);
    let a2 = b.literal("a");
    let c2 = b.literal("c");
    let seq2 = b.sequence(&[a2, c2]);
    let ch = b.choice(&[seq1, seq2]);
    b.rule("s", ch);
    b.build()
}

#[test]
fn determinism_across_runs() {
    let g = backtracking_grammar();
    for input in ["ac", "ab", "zz"] {
        let first = parse(&g, "t", input.as_bytes(), ParseOptions::default());
        let second = parse(&g, "t", input.as_bytes(), ParseOptions::default());
        assert_eq!(format!("{:?}", first.value), format!("{:?}", second.value));
        assert_eq!(
            first.errors.map(|e| e.to_string()),
            second.errors.map(|e| e.to_string()),
        );
    }
}

#[test]
fn memoization_never_changes_the_outcome() {
    let g = backtracking_grammar();
    for input in ["ac", "ab", "ax", ""] {
        let plain = parse(&g, "t", input.as_bytes(), ParseOptions::default());
        let memoized = parse(
            &g,
            "t",
            input.as_bytes(),
            ParseOptions::default().with_memoize(true),
        );
        assert_eq!(plain.value, memoized.value, "input {:?}", input);
        assert_eq!(
            plain.errors.map(|e| e.to_string()),
            memoized.errors.map(|e| e.to_string()),
            "input {:?}",
            input
        );
    }
}

#[test]
fn memoization_with_repetition_over_rule_refs() {
    let mut b = GrammarBuilder::new();
    let digit = b.char_class(CharClassMatcher::new().with_ranges(&[('0', '9')]));
    b.rule("digit", digit);
    let item = b.rule_ref("digit");
    let star = b.zero_or_more(item);
    b.rule("digits", star);
    let g = b.build();

    let options = ParseOptions::default()
        .with_entrypoint("digits")
        .with_memoize(true);
    let out = parse(&g, "t", b"123", options);
    assert_eq!(
        out.into_result().unwrap(),
        Value::List(vec![text("1"), text("2"), text("3")])
    );
}

#[test]
fn bindings_from_failed_alternatives_are_discarded() {
    let mut b = GrammarBuilder::new();
    // alt 1 binds x, then fails on the trailing "b"
    let a1 = b.literal("a");
    let xa = b.labeled("x", a1);
    let b1 = b.literal("b");
    let seq1 = b.sequence(&[xa, b1]);
    // alt 2 checks whether x leaked across the backtrack
    let a2 = b.literal("a");
    let c2 = b.literal("c");
    let seq2 = b.sequence(&[a2, c2]);
    let act2 = b.action(seq2, |cx| Ok(Value::Bool(cx.get("x").is_some())));
    let ch = b.choice(&[seq1, act2]);
    b.rule("s", ch);
    let g = b.build();

    let out = parse(&g, "t", b"ac", ParseOptions::default());
    assert_eq!(out.into_result().unwrap(), Value::Bool(false));
}

#[test]
fn labeled_value_vs_text_capture() {
    let mut b = GrammarBuilder::new();
    let digit = b.char_class(CharClassMatcher::new().with_ranges(&[('0', '9')]));
    let digits = b.one_or_more(digit);
    let as_value = b.labeled("v", digits);
    let digit2 = b.char_class(CharClassMatcher::new().with_ranges(&[('0', '9')]));
    let digits2 = b.one_or_more(digit2);
    let as_text = b.labeled_text("t", digits2);
    let dash = b.literal("-");
    let body = b.sequence(&[as_value, dash, as_text]);
    let act = b.action(body, |cx| {
        let v_is_list = matches!(cx.get("v"), Some(Value::List(_)));
        let t = cx
            .get("t")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Ok(Value::Text(format!("{}:{}", v_is_list, t)))
    });
    b.rule("s", act);
    let g = b.build();

    let out = parse(&g, "t", b"12-34", ParseOptions::default());
    assert_eq!(out.into_result().unwrap(), text("true:34"));
}

#[test]
fn statistics_count_choice_alternatives() {
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    let c = b.literal("b");
    let ch = b.choice_at(Position::new(3, 9, 0), &[a, c]);
    b.rule("s", ch);
    let g = b.build();

    let out = parse(
        &g,
        "t",
        b"b",
        ParseOptions::default().with_statistics("no match"),
    );
    assert!(out.errors.is_none());
    let counts = &out.stats.choice_alt_cnt["s 3:9"];
    assert_eq!(counts.get("2"), Some(&1));

    let out = parse(
        &g,
        "t",
        b"z",
        ParseOptions::default().with_statistics("no match"),
    );
    let counts = &out.stats.choice_alt_cnt["s 3:9"];
    assert_eq!(counts.get("no match"), Some(&1));
}

#[test]
fn statistics_are_off_by_default_but_exprs_are_counted() {
    let g = backtracking_grammar();
    let out = parse(&g, "t", b"ac", ParseOptions::default());
    assert!(out.stats.choice_alt_cnt.is_empty());
    assert!(out.stats.expr_cnt > 0);
}

#[test]
fn stats_serialize_to_json() {
    let g = backtracking_grammar();
    let out = parse(
        &g,
        "t",
        b"ac",
        ParseOptions::default().with_statistics("no match"),
    );
    let json = serde_json::to_string(&out.stats).unwrap();
    assert!(json.contains("expr_cnt"));
    assert!(json.contains("choice_alt_cnt"));
}

#[test]
fn entrypoint_option_selects_the_start_rule() {
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    b.rule("first", a);
    let z = b.literal("z");
    b.rule("second", z);
    let g = b.build();

    // default entrypoint is the first rule
    assert!(parse(&g, "t", b"a", ParseOptions::default()).errors.is_none());

    let out = parse(
        &g,
        "t",
        b"z",
        ParseOptions::default().with_entrypoint("second"),
    );
    assert_eq!(out.into_result().unwrap(), text("z"));
}

#[test]
fn invalid_entrypoint_is_a_structural_error() {
    let mut b = GrammarBuilder::new();
    let a = b.literal("a");
    b.rule("s", a);
    let g = b.build();

    let out = parse(
        &g,
        "t",
        b"a",
        ParseOptions::default().with_entrypoint("missing"),
    );
    assert!(out.value.is_none());
    assert!(out
        .errors
        .unwrap()
        .to_string()
        .contains("invalid entrypoint"));
}

#[test]
fn empty_grammar_is_a_structural_error() {
    let g = GrammarBuilder::new().build();
    let out = parse(&g, "t", b"a", ParseOptions::default());
    assert!(out.value.is_none());
    assert!(out
        .errors
        .unwrap()
        .to_string()
        .contains("grammar has no rule"));
}

#[test]
fn undefined_rule_reference() {
    let mut b = GrammarBuilder::new();
    let missing = b.rule_ref("nope");
    b.rule("s", missing);
    let g = b.build();

    let out = parse(&g, "t", b"a", ParseOptions::default());
    assert!(out.value.is_none());
    let rendered = out.errors.unwrap().to_string();
    assert!(rendered.contains("undefined rule: nope"), "got: {}", rendered);
}

#[test]
fn invalid_utf8_is_tolerated_or_reported() {
    let mut b = GrammarBuilder::new();
    let any = b.any();
    b.rule("s", any);
    let g = b.build();

    // reported: the value still comes back, alongside the lexical error
    let out = parse(&g, "t", &[0xff], ParseOptions::default());
    assert_eq!(out.value, Some(text("\u{FFFD}")));
    let rendered = out.errors.unwrap().to_string();
    assert!(rendered.contains("invalid encoding"), "got: {}", rendered);

    // tolerated: no error at all
    let out = parse(
        &g,
        "t",
        &[0xff],
        ParseOptions::default().with_allow_invalid_utf8(true),
    );
    assert_eq!(out.value, Some(text("\u{FFFD}")));
    assert!(out.errors.is_none());
}

#[test]
fn custom_data_reaches_callbacks() {
    #[derive(Debug)]
    struct Limits {
        max: i64,
    }

    let mut b = GrammarBuilder::new();
    let digit = b.char_class(CharClassMatcher::new().with_ranges(&[('0', '9')]));
    let digits = b.one_or_more(digit);
    let act = b.action(digits, |cx| {
        let n: i64 = cx.text_str().parse()?;
        let max = cx.data::<Limits>().map(|l| l.max).unwrap_or(i64::MAX);
        if n > max {
            return Err("value out of range".into());
        }
        Ok(Value::Int(n))
    });
    b.rule("s", act);
    let g = b.build();

    let options = ParseOptions::default().with_custom_data(Rc::new(Limits { max: 100 }));
    let out = parse(&g, "t", b"42", options.clone());
    assert_eq!(out.into_result().unwrap(), Value::Int(42));

    let out = parse(&g, "t", b"420", options);
    assert!(out.value.is_none());
    assert!(out
        .errors
        .unwrap()
        .to_string()
        .contains("value out of range"));
}

#[test]
fn errors_are_deduplicated_by_message() {
    let mut b = GrammarBuilder::new();
    let first = b.rule_ref("nope");
    let second = b.rule_ref("nope");
    let ch = b.choice(&[first, second]);
    b.rule("s", ch);
    let g = b.build();

    // both alternatives fail the same way at the same position; the
    // identical messages collapse to one entry
    let out = parse(&g, "t", b"a", ParseOptions::default());
    let errors = out.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors.to_string().contains("undefined rule: nope"));
}

#[test]
fn shared_grammar_across_interpreters() {
    let g = backtracking_grammar();
    let first = Interpreter::new(&g);
    let second = Interpreter::new(&g);
    assert_eq!(
        first
            .parse("t", b"ab", ParseOptions::default())
            .into_result()
            .unwrap(),
        second
            .parse("t", b"ab", ParseOptions::default())
            .into_result()
            .unwrap()
    );
}
