#![expect(clippy::unwrap_used)] // test code OK

use polaris::ast::{Tag, Value};
use polaris::interpreter::{Config, Interpreter};
use polaris::output::Output;
use polaris::{Error, Severity};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

/// Evaluate each input in order in one session and compare the rendered result
fn run_session(cases: &[(&str, &str)]) {
    let interp = Interpreter::new();
    for (i, (input, expected)) in cases.iter().enumerate() {
        let result = interp
            .eval_str(input)
            .unwrap_or_else(|e| panic!("#{}: '{input}' failed: {e}", i + 1));
        assert_eq!(result.to_string(), *expected, "#{}: '{input}'", i + 1);
    }
}

#[test]
fn classic_programs() {
    run_session(&[
        ("(quote (testing 1 (2.0) -3.14e159))", "(testing 1 (2.0) -3.14e159)"),
        ("(+ 2 2)", "4"),
        ("(+ (* 2 100) (* 1 10))", "210"),
        ("(if (> 6 5) (+ 1 1) (+ 2 2))", "2"),
        ("(if (< 6 5) (+ 1 1) (+ 2 2))", "4"),
        ("(define x 3)", "3"),
        ("x", "3"),
        ("(+ x x)", "6"),
        ("(begin (define x 1) (set! x (+ x 1)) (+ x 1))", "3"),
        ("((lambda (x) (+ x x)) 5)", "10"),
        ("(define twice (lambda (x) (* 2 x)))", "<Lambda>"),
        ("(twice 5)", "10"),
        ("(define compose (lambda (f g) (lambda (x) (f (g x)))))", "<Lambda>"),
        ("((compose list twice) 5)", "(10)"),
        ("(define repeat (lambda (f) (compose f f)))", "<Lambda>"),
        ("((repeat twice) 5)", "20"),
        ("((repeat (repeat twice)) 5)", "80"),
        ("(define fact (lambda (n) (if (<= n 1) 1 (* n (fact (- n 1))))))", "<Lambda>"),
        ("(fact 3)", "6"),
        ("(fact 12)", "479001600"),
        ("(define abs (lambda (n) ((if (> n 0) + -) 0 n)))", "<Lambda>"),
        ("(list (abs -3) (abs 0) (abs 3))", "(3 0 3)"),
        (
            "(define combine (lambda (f)
                (lambda (x y)
                  (if (null? x) (quote ())
                      (f (list (car x) (car y))
                         ((combine f) (cdr x) (cdr y)))))))",
            "<Lambda>",
        ),
        ("(define zip (combine cons))", "<Lambda>"),
        ("(zip (list 1 2 3 4) (list 5 6 7 8))", "((1 5) (2 6) (3 7) (4 8))"),
        (
            "(define riff-shuffle (lambda (deck) (begin
                (define take (lambda (n seq) (if (<= n 0) (quote ()) (cons (car seq) (take (- n 1) (cdr seq))))))
                (define drop (lambda (n seq) (if (<= n 0) seq (drop (- n 1) (cdr seq)))))
                (define mid (lambda (seq) (/ (length seq) 2)))
                ((combine append) (take (mid deck) deck) (drop (mid deck) deck)))))",
            "<Lambda>",
        ),
        ("(riff-shuffle (list 1 2 3 4 5 6 7 8))", "(1 5 2 6 3 7 4 8)"),
        ("((repeat riff-shuffle) (list 1 2 3 4 5 6 7 8))", "(1 3 5 7 2 4 6 8)"),
        (
            "(riff-shuffle (riff-shuffle (riff-shuffle (list 1 2 3 4 5 6 7 8))))",
            "(1 2 3 4 5 6 7 8)",
        ),
    ]);
}

#[test]
fn cdr_of_single_element_list_is_nil() {
    let interp = Interpreter::new();
    let result = interp.eval_str("(cdr (list 1))").unwrap();
    assert_eq!(result.tag(), Tag::Symbol);
    assert_eq!(result.to_string(), "nil");
}

#[test]
fn define_then_lookup_preserves_tag_and_text() {
    let interp = Interpreter::new();
    for literal in ["42", "-7", "2.50", "\"text\"", "(quote sym)", "(list 1 2)"] {
        let expected = interp.eval_str(literal).unwrap();
        interp.eval_str(&format!("(define s {literal})")).unwrap();
        let bound = interp.eval_str("s").unwrap();
        assert_eq!(bound.tag(), expected.tag(), "tag of {literal}");
        assert_eq!(bound.to_string(), expected.to_string(), "text of {literal}");
    }
}

#[test]
fn closures_see_later_definitions() {
    run_session(&[
        ("(define is-even (lambda (n) (if (eq n 0) #t (is-odd (- n 1)))))", "<Lambda>"),
        ("(define is-odd (lambda (n) (if (eq n 0) #f (is-even (- n 1)))))", "<Lambda>"),
        ("(is-even 10)", "#t"),
        ("(is-odd 7)", "#t"),
        ("(is-even 7)", "#f"),
    ]);
}

#[test]
fn numeric_promotion() {
    let interp = Interpreter::new();
    let cases = [
        ("(+ 1 2)", Tag::Integer),
        ("(* 3 4 5)", Tag::Integer),
        ("(+ 1 2.0)", Tag::Double),
        ("(- 10.5 0.5)", Tag::Double),
        ("(/ 1 2.0)", Tag::Double),
    ];
    for (input, tag) in cases {
        assert_eq!(interp.eval_str(input).unwrap().tag(), tag, "{input}");
    }
    assert_eq!(interp.eval_str("(- 10.5 0.5)").unwrap().to_string(), "10.000000");
}

#[test]
fn mixed_folds_and_numeric_strings() {
    run_session(&[
        ("(/ 10 4 0.5)", "5.000000"),
        ("(/ 10 4 2)", "1"),
        ("(+ \"2.5\" 1)", "3"),
        ("(* \"2.5\" 2.0)", "5.000000"),
        ("(if \"#f\" (quote then) (quote else))", "else"),
        ("(if (eq 1 2) (quote then) (quote else))", "else"),
        ("(if nil (quote then) (quote else))", "then"),
        ("(begin (print \"bye\") 0)", "0"),
    ]);
}

#[test]
fn deep_recursion_within_default_limits() {
    run_session(&[
        ("(define sum-to (lambda (n) (if (<= n 0) 0 (+ n (sum-to (- n 1))))))", "<Lambda>"),
        ("(sum-to 1000)", "500500"),
    ]);
}

#[test]
fn fragmented_input_matches_single_line() {
    let program = [
        "(define count-down",
        "  (lambda (n)",
        "    (if (<= n 0)",
        "        (quote done)",
        "        (count-down (- n 1)))))",
        "(count-down 5)",
    ];

    let (output, single) = Output::capture();
    let mut whole = Interpreter::with_output(Config::default(), output);
    assert!(whole.feed(&program[..5].join(" "), true).unwrap());
    assert!(whole.feed(program[5], true).unwrap());

    let (output, fragmented) = Output::capture();
    let mut pieces = Interpreter::with_output(Config::default(), output);
    let completed: Vec<bool> = program
        .iter()
        .map(|line| pieces.feed(line, true).unwrap())
        .collect();
    assert_eq!(completed, vec![false, false, false, false, true, true]);

    assert_eq!(single.lines(), vec!["<Lambda>", "done"]);
    assert_eq!(fragmented.lines(), single.lines());
}

#[test]
fn print_goes_to_session_output() {
    let (output, captured) = Output::capture();
    let mut interp = Interpreter::with_output(Config::default(), output);
    interp.feed("(print \"sum: \" (+ 1 2))", false).unwrap();
    interp.feed("(ref 1 \"two\" (quote three))", true).unwrap();
    assert_eq!(captured.lines(), vec!["sum: 3", "(integer string symbol)"]);
}

#[test]
fn import_through_include_dirs_is_idempotent() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("counter.pol"),
        "(define loads 0)\n(print \"loading counter\")\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("main.pol"),
        "(import \"counter.pol\")\n(set! loads (+ loads 1))\n",
    )
    .unwrap();

    let (output, captured) = Output::capture();
    let config = Config::default().with_include_dir(dir.path());
    let mut interp = Interpreter::with_output(config, output);

    assert!(interp.feed("(import \"main.pol\" \"counter.pol\")", false).unwrap());
    interp.import("main.pol").unwrap();
    assert_eq!(interp.eval_str("loads").unwrap().to_string(), "1");
    assert_eq!(captured.lines(), vec!["loading counter"]);
    assert_eq!(interp.importer().imported().len(), 2);
}

#[test]
fn errors_reach_the_callback_and_the_session_recovers() {
    let reports = Rc::new(RefCell::new(Vec::new()));
    let sink = reports.clone();
    let mut interp = Interpreter::new();
    interp.set_error_callback(Box::new(move |severity: Severity, message: &str| {
        sink.borrow_mut().push((severity, message.to_owned()));
    }));

    let failures = [
        ("(nothing-here)", Error::UnboundSymbol("nothing-here".into())),
        ("(\"text\" 1)", Error::NotCallable("text".into())),
        ("(import)", Error::malformed("import", "no module given")),
        ("(import \"absent.pol\")", Error::ImportNotFound("absent.pol".into())),
    ];
    for (input, expected) in &failures {
        assert_eq!(&interp.feed(input, false).unwrap_err(), expected, "{input}");
    }
    assert!(matches!(
        interp.feed("(+ 1 \"x\")", false).unwrap_err(),
        Error::NumericConversion(_)
    ));

    let reports = reports.borrow();
    assert_eq!(reports.len(), 5);
    assert!(reports.iter().all(|(severity, _)| *severity == Severity::Fatal));
    assert_eq!(reports[0].1, "Unbound symbol: [nothing-here]");

    assert_eq!(interp.eval_str("(+ 1 1)").unwrap(), Value::from(2));
}

#[test]
fn exit_surfaces_as_error() {
    let mut interp = Interpreter::new();
    let err = interp.feed("(begin (print \"bye\") (exit 4))", false).unwrap_err();
    assert_eq!(err.exit_code(), Some(4));
    let err = interp.feed("(exit 3.0)", false).unwrap_err();
    assert_eq!(err.exit_code(), Some(3));
}
