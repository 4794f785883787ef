#[cfg(test)]
mod scanner_tests {
    use lox_interpreter as lox;

    use lox::error::LoxError;
    use lox::scanner::*;
    use lox::session::Session;
    use lox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_one_or_two_char_operators() {
        assert_token_sequence(
            "! != = == < <= > >= / -;",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::SLASH, "/"),
                (TokenType::MINUS, "-"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "class fun var _tmp this2 while orchid or",
            &[
                (TokenType::CLASS, "class"),
                (TokenType::FUN, "fun"),
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "_tmp"),
                (TokenType::IDENTIFIER, "this2"),
                (TokenType::WHILE, "while"),
                (TokenType::IDENTIFIER, "orchid"),
                (TokenType::OR, "or"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_literals() {
        let tokens: Vec<Token> = Scanner::new("12 3.5 4. \"hi there\"")
            .filter_map(Result::ok)
            .collect();

        let kinds: Vec<&TokenType> = tokens.iter().map(|t| &t.token_type).collect();

        assert!(matches!(kinds[0], TokenType::NUMBER(n) if *n == 12.0));
        assert!(matches!(kinds[1], TokenType::NUMBER(n) if *n == 3.5));
        // A trailing dot is not part of the number.
        assert!(matches!(kinds[2], TokenType::NUMBER(n) if *n == 4.0));
        assert_eq!(*kinds[3], TokenType::DOT);
        assert!(matches!(kinds[4], TokenType::STRING(s) if s == "hi there"));
        assert_eq!(tokens[4].lexeme, "\"hi there\"");
        assert_eq!(*kinds[5], TokenType::EOF);
    }

    #[test]
    fn test_scanner_05_comments_and_lines() {
        let source = "var a; // a comment ( ) {\n\"multi\nline\"\n\nprint a;";
        let tokens: Vec<Token> = Scanner::new(source).filter_map(Result::ok).collect();

        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 1, 1, 3, 5, 5, 5, 5]);

        // Monotonic, and exactly one EOF at the end.
        assert!(lines.windows(2).all(|w| w[0] <= w[1]));
        let eofs = tokens
            .iter()
            .filter(|t| t.token_type == TokenType::EOF)
            .count();
        assert_eq!(eofs, 1);
        assert_eq!(tokens.last().unwrap().token_type, TokenType::EOF);
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let scanner = Scanner::new(source);

        // Collect all results (both tokens and errors)
        let results: Vec<_> = scanner.collect();

        // 0: COMMA ','
        // 1: DOT '.'
        // 2: Error for '$'
        // 3: LEFT_PAREN '('
        // 4: Error for '#'
        // 5: EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert_eq!(err.to_string(), "[Line 1] Error: Unexpected character.");
        }

        fn assert_token_matches(
            result: &Result<Token, LoxError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.token_type, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.token_type
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }

    #[test]
    fn test_multibyte_character_is_one_error() {
        let results: Vec<_> = Scanner::new("é;").collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_err());
        assert!(matches!(&results[1], Ok(t) if t.token_type == TokenType::SEMICOLON));
    }

    #[test]
    fn test_unterminated_string_reports_and_finishes() {
        let mut session = Session::with_sink(Box::new(std::io::sink()));
        let tokens = Scanner::new("print \"oops\nmore").scan_tokens(&mut session);

        assert!(session.had_error());
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token_type, TokenType::PRINT);
        assert_eq!(tokens[1].token_type, TokenType::EOF);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_empty_source_is_just_eof() {
        let tokens: Vec<_> = Scanner::new("").collect();

        assert_eq!(tokens.len(), 1);
        assert!(matches!(&tokens[0], Ok(t) if t.token_type == TokenType::EOF && t.line == 1));
    }

    #[test]
    fn test_token_display() {
        let tokens: Vec<Token> = Scanner::new("42 1.5 \"s\" x")
            .filter_map(Result::ok)
            .collect();
        let shown: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();

        assert_eq!(
            shown,
            vec![
                "NUMBER 42 42.0",
                "NUMBER 1.5 1.5",
                "STRING \"s\" s",
                "IDENTIFIER x null",
                "EOF  null",
            ]
        );
    }
}
