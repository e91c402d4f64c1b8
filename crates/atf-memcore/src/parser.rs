use crate::error::ExprError;
use crate::lexer::Token;

/// One step of a compiled expression, consumed left-to-right by the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    GlobalIdent(String),
    GetRef,
    DeRef,
    FetchMember(String),
    FetchMemberDeRef(String),
    /// Raw index text; validated as a number only once the builder knows whether it is
    /// indexing a real array/pointer or synthesising a type.
    FetchArray(String),
    TypePointer,
    ReinterpretCast,
    Decltype,
    ConstNumber(String),
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn has(&self) -> bool {
        self.pos < self.tokens.len()
    }

    fn expect_symbol(&mut self, sym: &'static str) -> Result<(), ExprError> {
        match self.next() {
            Some(Token::Symbol(s)) if s == sym => Ok(()),
            Some(other) => Err(ExprError::ExpectedToken {
                expected: sym.to_string(),
                got: other.to_string(),
            }),
            None => Err(ExprError::UnexpectedEof),
        }
    }

    fn expect_word(&mut self) -> Result<String, ExprError> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            Some(other) => Err(ExprError::ExpectedToken {
                expected: "<ident>".to_string(),
                got: other.to_string(),
            }),
            None => Err(ExprError::UnexpectedEof),
        }
    }
}

/// Parses a full token stream into an opcode list. Trailing unconsumed tokens are an
/// error (`Unexpected token 'X'`).
pub fn parse(tokens: &[Token]) -> Result<Vec<Op>, ExprError> {
    let mut cur = Cursor { tokens, pos: 0 };
    let mut ops = Vec::new();
    read_expr(&mut cur, &mut ops)?;
    if cur.has() {
        let tok = cur.next().unwrap();
        return Err(ExprError::UnexpectedToken(tok.to_string()));
    }
    Ok(ops)
}

fn read_ident(cur: &mut Cursor) -> Result<String, ExprError> {
    let mut parts = vec![cur.expect_word()?];
    while matches!(cur.peek(), Some(Token::Symbol("::"))) {
        cur.next();
        parts.push(cur.expect_word()?);
    }
    Ok(parts.join("::"))
}

fn read_primary(cur: &mut Cursor, ops: &mut Vec<Op>) -> Result<(), ExprError> {
    match cur.peek().cloned() {
        Some(Token::Symbol("&")) => {
            cur.next();
            read_expr(cur, ops)?;
            ops.push(Op::GetRef);
            Ok(())
        }
        Some(Token::Symbol("*")) => {
            cur.next();
            read_expr(cur, ops)?;
            ops.push(Op::DeRef);
            Ok(())
        }
        Some(Token::Word(w)) if w == "reinterpret_cast" => {
            cur.next();
            cur.expect_symbol("<")?;
            read_expr(cur, ops)?;
            cur.expect_symbol(">")?;
            cur.expect_symbol("(")?;
            read_expr(cur, ops)?;
            cur.expect_symbol(")")?;
            ops.push(Op::ReinterpretCast);
            Ok(())
        }
        Some(Token::Word(w)) if w == "decltype" => {
            cur.next();
            cur.expect_symbol("(")?;
            read_expr(cur, ops)?;
            cur.expect_symbol(")")?;
            ops.push(Op::Decltype);
            Ok(())
        }
        Some(Token::Symbol("(")) => {
            cur.next();
            read_expr(cur, ops)?;
            cur.expect_symbol(")")?;
            Ok(())
        }
        Some(Token::Word(_)) => {
            let name = read_ident(cur)?;
            ops.push(Op::GlobalIdent(name));
            Ok(())
        }
        Some(Token::Number(n)) => {
            cur.next();
            ops.push(Op::ConstNumber(n));
            Ok(())
        }
        Some(other) => Err(ExprError::UnexpectedToken(other.to_string())),
        None => Err(ExprError::UnexpectedEof),
    }
}

fn read_postfix(cur: &mut Cursor, ops: &mut Vec<Op>) -> Result<(), ExprError> {
    loop {
        match cur.peek() {
            Some(Token::Symbol(".")) => {
                cur.next();
                let name = cur.expect_word()?;
                ops.push(Op::FetchMember(name));
            }
            Some(Token::Symbol("->")) => {
                cur.next();
                let name = cur.expect_word()?;
                ops.push(Op::FetchMemberDeRef(name));
            }
            Some(Token::Symbol("[")) => {
                cur.next();
                let idx = match cur.next() {
                    Some(Token::Number(n)) => n,
                    Some(other) => other.to_string(),
                    None => return Err(ExprError::UnexpectedEof),
                };
                cur.expect_symbol("]")?;
                ops.push(Op::FetchArray(idx));
            }
            Some(Token::Symbol("*")) => {
                cur.next();
                ops.push(Op::TypePointer);
            }
            _ => break,
        }
    }
    Ok(())
}

fn read_expr(cur: &mut Cursor, ops: &mut Vec<Op>) -> Result<(), ExprError> {
    read_primary(cur, ops)?;
    read_postfix(cur, ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_str(s: &str) -> Vec<Op> {
        parse(&tokenize(s).unwrap()).unwrap()
    }

    #[test]
    fn member_access() {
        assert_eq!(
            parse_str("gConfig.count"),
            vec![
                Op::GlobalIdent("gConfig".into()),
                Op::FetchMember("count".into())
            ]
        );
    }

    #[test]
    fn deref_member_chain() {
        assert_eq!(
            parse_str("gConfig->next->count"),
            vec![
                Op::GlobalIdent("gConfig".into()),
                Op::FetchMemberDeRef("next".into()),
                Op::FetchMemberDeRef("count".into()),
            ]
        );
    }

    #[test]
    fn array_index() {
        assert_eq!(
            parse_str("gList[2]"),
            vec![Op::GlobalIdent("gList".into()), Op::FetchArray("2".into())]
        );
    }

    #[test]
    fn get_ref_is_postorder() {
        assert_eq!(
            parse_str("&gConfig"),
            vec![Op::GlobalIdent("gConfig".into()), Op::GetRef]
        );
    }

    #[test]
    fn reinterpret_cast_emits_type_then_expr_then_cast() {
        assert_eq!(
            parse_str("reinterpret_cast<int32_t*>(gConfig)"),
            vec![
                Op::GlobalIdent("int32_t".into()),
                Op::TypePointer,
                Op::GlobalIdent("gConfig".into()),
                Op::ReinterpretCast,
            ]
        );
    }

    #[test]
    fn decltype_wraps_expr() {
        assert_eq!(
            parse_str("decltype(gConfig)"),
            vec![Op::GlobalIdent("gConfig".into()), Op::Decltype]
        );
    }

    #[test]
    fn trailing_tokens_are_an_error() {
        let tokens = tokenize("gConfig )").unwrap();
        let err = parse(&tokens).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected token ')'");
    }

    #[test]
    fn scoped_ident_joins_with_double_colon() {
        assert_eq!(
            parse_str("ns::gConfig"),
            vec![Op::GlobalIdent("ns::gConfig".into())]
        );
    }
}
