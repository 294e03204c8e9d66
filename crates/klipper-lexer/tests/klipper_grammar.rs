use klipper_lexer::{Grammar, LineTokens, TokenKind, tokenize_document, tokenize_line};
use pretty_assertions::assert_eq;

use TokenKind::{
    Boolean, CommandMnemonic, Comment, IncludePath, Key, Number, Operator, PinReference, Section,
    Text, ValueText, VariableInterpolation,
};

fn grammar() -> Grammar {
    Grammar::klipper().expect("compile built-in grammar")
}

fn lex_line(grammar: &Grammar, state: &str, line: &str) -> (Vec<(TokenKind, String)>, String) {
    let start = grammar.state_id(state).expect("known state");
    let tokens = tokenize_line(line, start, grammar);
    (
        segments(&tokens, line),
        grammar.state_name(tokens.end_state()).to_string(),
    )
}

fn segments(tokens: &LineTokens, line: &str) -> Vec<(TokenKind, String)> {
    tokens
        .segments(line)
        .into_iter()
        .map(|(kind, text)| (kind, text.to_string()))
        .collect()
}

fn toks(items: &[(TokenKind, &str)]) -> Vec<(TokenKind, String)> {
    items.iter().map(|(k, t)| (*k, t.to_string())).collect()
}

/// Kind of the first token whose text is exactly `needle`.
fn kind_of(grammar: &Grammar, line: &str, needle: &str) -> Option<TokenKind> {
    let (tokens, _) = lex_line(grammar, "start", line);
    tokens.into_iter().find(|(_, t)| t == needle).map(|(k, _)| k)
}

#[test]
fn test_key_value_line() {
    let g = grammar();
    let (tokens, end) = lex_line(&g, "start", "serial: /dev/serial/by-id/usb-foo");
    assert_eq!(
        tokens,
        toks(&[
            (Key, "serial"),
            (Operator, ":"),
            (Text, " "),
            (ValueText, "/dev/serial/by-id/usb-foo"),
        ])
    );
    assert_eq!(end, "start");
}

#[test]
fn test_section_header_is_one_token() {
    let g = grammar();
    let (tokens, end) = lex_line(&g, "start", "[stepper_x]");
    assert_eq!(tokens, toks(&[(Section, "[stepper_x]")]));
    assert_eq!(end, "start");

    let (tokens, _) = lex_line(&g, "start", "[tmc2209 stepper_x]");
    assert_eq!(tokens, toks(&[(Section, "[tmc2209 stepper_x]")]));
}

#[test]
fn test_full_line_comments() {
    let g = grammar();
    for line in ["; comment only", "# comment only", "   # indented"] {
        let (tokens, end) = lex_line(&g, "start", line);
        assert_eq!(tokens, toks(&[(Comment, line)]));
        assert_eq!(end, "start");
    }
}

#[test]
fn test_indented_number_is_continuation_not_key() {
    let g = grammar();
    let lines = tokenize_document("rotation_distance: 40\n    40.0", &g);
    assert_eq!(lines.len(), 2);
    assert_eq!(g.state_name(lines[0].end_state()), "start");

    let second = segments(&lines[1], "    40.0");
    assert_eq!(second, toks(&[(Text, "    "), (Number, "40.0")]));
    assert!(second.iter().all(|(k, _)| *k != Key));
}

#[test]
fn test_indented_text_continues_previous_value() {
    let g = grammar();
    let (tokens, end) = lex_line(&g, "start", "  hello world");
    assert_eq!(
        tokens,
        toks(&[
            (Text, "  "),
            (ValueText, "hello"),
            (Text, " "),
            (ValueText, "world"),
        ])
    );
    assert_eq!(end, "start");
}

#[test]
fn test_separators_share_operator_kind() {
    let g = grammar();
    let (colon, _) = lex_line(&g, "start", "control: pid");
    let (equals, _) = lex_line(&g, "start", "control = pid");
    assert_eq!(colon[1], (Operator, ":".to_string()));
    assert_eq!(
        equals,
        toks(&[
            (Key, "control"),
            (Text, " "),
            (Operator, "="),
            (Text, " "),
            (ValueText, "pid"),
        ])
    );
}

#[test]
fn test_alphanumeric_values_stay_whole() {
    let g = grammar();
    assert_eq!(kind_of(&g, "step_pin: PA13", "PA13"), Some(PinReference));
    assert_eq!(kind_of(&g, "dir_pin: !PB11", "!PB11"), Some(PinReference));
    assert_eq!(kind_of(&g, "endstop_pin: ^!PG6", "^!PG6"), Some(PinReference));
    assert_eq!(kind_of(&g, "step_pin: ebb:PD0", "ebb:PD0"), Some(PinReference));
    assert_eq!(kind_of(&g, "sensor_pin: gpio26", "gpio26"), Some(PinReference));
    assert_eq!(kind_of(&g, "spi_bus: spi1", "spi1"), Some(ValueText));
    assert_eq!(kind_of(&g, "serial: /dev/ttyUSB0", "/dev/ttyUSB0"), Some(ValueText));
    assert_eq!(kind_of(&g, "host: 192.168.1.1", "192.168.1.1"), Some(ValueText));
    assert_eq!(kind_of(&g, "canbus_uuid: 0123456789ab", "0123456789ab"), Some(ValueText));
}

#[test]
fn test_numbers_and_booleans() {
    let g = grammar();
    assert_eq!(kind_of(&g, "max_accel: 3000", "3000"), Some(Number));
    assert_eq!(kind_of(&g, "position_min: -5", "-5"), Some(Number));
    assert_eq!(kind_of(&g, "nozzle_diameter: 0.400", "0.400"), Some(Number));
    assert_eq!(kind_of(&g, "pid_Kp: .5", ".5"), Some(Number));
    assert_eq!(kind_of(&g, "interpolate: True", "True"), Some(Boolean));
    assert_eq!(kind_of(&g, "enabled: off", "off"), Some(Boolean));
    assert_eq!(kind_of(&g, "restart_method: command", "command"), Some(ValueText));

    let (tokens, _) = lex_line(&g, "start", "mesh_min: 40, 40");
    assert_eq!(
        tokens[3..].to_vec(),
        toks(&[(Number, "40"), (ValueText, ","), (Text, " "), (Number, "40")])
    );
}

#[test]
fn test_inline_comment_needs_preceding_whitespace() {
    let g = grammar();
    let (tokens, _) = lex_line(&g, "start", "microsteps: 16  # sixteen");
    assert_eq!(
        tokens,
        toks(&[
            (Key, "microsteps"),
            (Operator, ":"),
            (Text, " "),
            (Number, "16"),
            (Text, "  "),
            (Comment, "# sixteen"),
        ])
    );

    assert_eq!(kind_of(&g, "serial: /dev/foo#bar", "/dev/foo#bar"), Some(ValueText));
}

#[test]
fn test_strings_and_interpolation() {
    let g = grammar();
    assert_eq!(
        kind_of(&g, r#"message: "hello # world""#, r#""hello # world""#),
        Some(TokenKind::String)
    );
    assert_eq!(
        kind_of(&g, "message: 'unterminated", "'unterminated"),
        Some(TokenKind::String)
    );

    let (tokens, _) = lex_line(&g, "block", "  M140 S{BED}");
    assert_eq!(
        tokens,
        toks(&[
            (Text, "  "),
            (CommandMnemonic, "M140"),
            (Text, " "),
            (ValueText, "S"),
            (VariableInterpolation, "{BED}"),
        ])
    );

    let line = "  {% set BED = params.BED|default(60)|float %}";
    let (tokens, _) = lex_line(&g, "block", line);
    assert_eq!(tokens[1], (VariableInterpolation, line.trim_start().to_string()));
}

#[test]
fn test_include_header() {
    let g = grammar();
    let (tokens, end) = lex_line(&g, "start", "[include macros/*.cfg]");
    assert_eq!(
        tokens,
        toks(&[
            (Section, "[include "),
            (IncludePath, "macros/*.cfg"),
            (Section, "]"),
        ])
    );
    assert_eq!(end, "start");
}

#[test]
fn test_section_with_trailing_comment() {
    let g = grammar();
    let (tokens, _) = lex_line(&g, "start", "[extruder] ; hotend");
    assert_eq!(
        tokens,
        toks(&[(Section, "[extruder]"), (Text, " "), (Comment, "; hotend")])
    );

    let (tokens, _) = lex_line(&g, "start", "[extruder");
    assert_eq!(tokens, toks(&[(Section, "[extruder")]));
}

#[test]
fn test_gcode_block_spans_lines() {
    let g = grammar();
    let text = "[gcode_macro START]\ngcode:\n  G28\n  ; wait\n\ndescription: x";
    let lines = tokenize_document(text, &g);
    let texts: Vec<&str> = text.split('\n').collect();

    let end_states: Vec<&str> = lines.iter().map(|l| g.state_name(l.end_state())).collect();
    assert_eq!(
        end_states,
        vec!["start", "block", "block", "block", "block", "start"]
    );

    assert_eq!(
        segments(&lines[1], texts[1]),
        toks(&[(Key, "gcode"), (Operator, ":")])
    );
    assert_eq!(
        segments(&lines[2], texts[2]),
        toks(&[(Text, "  "), (CommandMnemonic, "G28")])
    );
    assert_eq!(segments(&lines[3], texts[3]), toks(&[(Comment, "  ; wait")]));
    assert!(lines[4].tokens().is_empty());
    assert_eq!(
        segments(&lines[5], texts[5]),
        toks(&[
            (Key, "description"),
            (Operator, ":"),
            (Text, " "),
            (ValueText, "x"),
        ])
    );
}

#[test]
fn test_block_opens_after_trailing_comment() {
    let g = grammar();
    let text = "gcode: ; body follows\n  G28\n  x = 1";
    let lines = tokenize_document(text, &g);
    let texts: Vec<&str> = text.split('\n').collect();

    let end_states: Vec<&str> = lines.iter().map(|l| g.state_name(l.end_state())).collect();
    assert_eq!(end_states, vec!["block", "block", "block"]);

    assert_eq!(
        segments(&lines[0], texts[0]),
        toks(&[
            (Key, "gcode"),
            (Operator, ":"),
            (Text, " "),
            (Comment, "; body follows"),
        ])
    );
    assert_eq!(
        segments(&lines[2], texts[2]),
        toks(&[
            (Text, "  "),
            (ValueText, "x"),
            (Text, " "),
            (ValueText, "="),
            (Text, " "),
            (Number, "1"),
        ])
    );

    // Without whitespace before it, `#` is part of the value.
    let (_, end) = lex_line(&g, "start", "gcode:#x");
    assert_eq!(end, "start");
}

#[test]
fn test_section_ends_block() {
    let g = grammar();
    let lines = tokenize_document("gcode:\n  G28\n[printer]", &g);
    assert_eq!(g.state_name(lines[1].end_state()), "block");
    assert_eq!(
        segments(&lines[2], "[printer]"),
        toks(&[(Section, "[printer]")])
    );
    assert_eq!(g.state_name(lines[2].end_state()), "start");
}

#[test]
fn test_fixture_tokens_cover_every_line() {
    let g = grammar();
    let text = include_str!("fixtures/printer.cfg");
    let lines = tokenize_document(text, &g);
    let texts: Vec<&str> = text.split('\n').collect();
    assert_eq!(lines.len(), texts.len());

    for (i, (tokens, line)) in lines.iter().zip(&texts).enumerate() {
        let mut col = 0;
        for token in tokens.tokens() {
            assert_eq!(token.start, col, "gap or overlap on line {i}");
            assert!(token.len > 0, "empty token on line {i}");
            col = token.end();
        }
        assert_eq!(col, line.chars().count(), "line {i} not fully covered");
        assert_eq!(tokens.char_len(), col);
    }

    // Every top-level key in the fixture is recognized as such.
    let keys = lines
        .iter()
        .zip(&texts)
        .flat_map(|(tokens, line)| tokens.segments(line))
        .filter(|(kind, _)| *kind == Key)
        .count();
    let expected = texts
        .iter()
        .filter(|l| {
            let is_key = |k: &str| {
                !k.is_empty() && k.trim().chars().all(|c| c.is_alphanumeric() || c == '_')
            };
            !l.starts_with(' ') && l.split_once([':', '=']).is_some_and(|(k, _)| is_key(k))
        })
        .count();
    assert_eq!(keys, expected);
}

#[test]
fn test_tokenize_line_is_pure() {
    let g = grammar();
    let start = g.initial_state();
    let line = "dir_pin: !PF12 # inverted";
    assert_eq!(tokenize_line(line, start, &g), tokenize_line(line, start, &g));
}
