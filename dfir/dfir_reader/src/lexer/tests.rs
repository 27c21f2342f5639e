use super::*;

fn token(token: Token, line: usize) -> Option<Result<LocatedToken, LocatedError>> {
    Some(super::token(token, Location { line_number: line }))
}

fn error<'a>(error: LexError, line: usize) -> Option<Result<LocatedToken<'a>, LocatedError>> {
    Some(super::error(error, Location { line_number: line }))
}

#[test]
fn make_lexer() {
    let mut l1 = Lexer::new("");
    let mut l2 = Lexer::new(" ");
    let mut l3 = Lexer::new("\n ");

    assert_eq!(l1.next(), None);
    assert_eq!(l2.next(), None);
    assert_eq!(l3.next(), None);
}

#[test]
fn lex_comment() {
    let mut lex = Lexer::new("; hello");
    assert_eq!(lex.next(), token(Token::Comment("; hello"), 1));
    assert_eq!(lex.next(), None);

    lex = Lexer::new("\n  ;hello\n;foo");
    assert_eq!(lex.next(), token(Token::Comment(";hello"), 2));
    assert_eq!(lex.next(), token(Token::Comment(";foo"), 3));
    assert_eq!(lex.next(), None);

    // Scan a comment after an invalid char.
    let mut lex = Lexer::new("$; hello");
    assert_eq!(lex.next(), error(LexError::InvalidChar, 1));
    assert_eq!(lex.next(), token(Token::Comment("; hello"), 1));
    assert_eq!(lex.next(), None);
}

#[test]
fn lex_binding() {
    let mut lex = Lexer::new("function %main(x: Tensor(?2, f32)) -> Tuple() {\n  output lv1 = t[0]\n}");
    assert_eq!(lex.next(), token(Token::Identifier("function"), 1));
    assert_eq!(lex.next(), token(Token::Name("main"), 1));
    assert_eq!(lex.next(), token(Token::LPar, 1));
    assert_eq!(lex.next(), token(Token::Identifier("x"), 1));
    assert_eq!(lex.next(), token(Token::Colon, 1));
    assert_eq!(lex.next(), token(Token::Identifier("Tensor"), 1));
    assert_eq!(lex.next(), token(Token::LPar, 1));
    assert_eq!(lex.next(), token(Token::Question, 1));
    assert_eq!(lex.next(), token(Token::Integer("2"), 1));
    assert_eq!(lex.next(), token(Token::Comma, 1));
    assert_eq!(lex.next(), token(Token::Identifier("f32"), 1));
    assert_eq!(lex.next(), token(Token::RPar, 1));
    assert_eq!(lex.next(), token(Token::RPar, 1));
    assert_eq!(lex.next(), token(Token::Arrow, 1));
    assert_eq!(lex.next(), token(Token::Identifier("Tuple"), 1));
    assert_eq!(lex.next(), token(Token::LPar, 1));
    assert_eq!(lex.next(), token(Token::RPar, 1));
    assert_eq!(lex.next(), token(Token::LBrace, 1));
    assert_eq!(lex.next(), token(Token::Identifier("output"), 2));
    assert_eq!(lex.next(), token(Token::Identifier("lv1"), 2));
    assert_eq!(lex.next(), token(Token::Equal, 2));
    assert_eq!(lex.next(), token(Token::Identifier("t"), 2));
    assert_eq!(lex.next(), token(Token::LBracket, 2));
    assert_eq!(lex.next(), token(Token::Integer("0"), 2));
    assert_eq!(lex.next(), token(Token::RBracket, 2));
    assert_eq!(lex.next(), token(Token::RBrace, 3));
    assert_eq!(lex.next(), None);
}

#[test]
fn lex_numbers() {
    let mut lex = Lexer::new(" 0 5, -3 1.0 -0.25 1e-3 2.5E4)");
    assert_eq!(lex.next(), token(Token::Integer("0"), 1));
    assert_eq!(lex.next(), token(Token::Integer("5"), 1));
    assert_eq!(lex.next(), token(Token::Comma, 1));
    assert_eq!(lex.next(), token(Token::Integer("-3"), 1));
    assert_eq!(lex.next(), token(Token::Float("1.0"), 1));
    assert_eq!(lex.next(), token(Token::Float("-0.25"), 1));
    assert_eq!(lex.next(), token(Token::Float("1e-3"), 1));
    assert_eq!(lex.next(), token(Token::Float("2.5E4"), 1));
    assert_eq!(lex.next(), token(Token::RPar, 1));
    assert_eq!(lex.next(), None);

    let mut lex = Lexer::new("- x");
    assert_eq!(lex.next(), error(LexError::InvalidChar, 1));
    assert_eq!(lex.next(), token(Token::Identifier("x"), 1));
}
