//! Parser for the textual IR.

use ahash::AHashMap;
use dfir::{
    Binding, BlockBuilder, BlockKind, Constant, DType, Expr, ExprData, Function, Module, Opcode,
    Shape, Ty, TypeError, TypeInference, Var, VarKind,
};
use stdx::pretty::List;

use crate::error::{Location, ParseResult};
use crate::lexer::{LexError, Lexer, LocatedError, LocatedToken, Token};
use crate::ParseError;

fn type_error(location: Location, err: TypeError) -> ParseError {
    ParseError { location, message: err.to_string() }
}


/// Parse the entire `text` into a module. Types omitted in the source are
/// computed with `infer`.
pub fn parse_module(text: &str, infer: &dyn TypeInference) -> ParseResult<Module> {
    let mut parser = Parser::new(text, infer);
    let mut module = Module::new();
    for func in parser.parse_function_list()? {
        if module.contains(&func.name) {
            return err!(parser.loc, "function %{} is defined twice", func.name);
        }
        module.add(func);
    }
    Ok(module)
}

/// Parse the entire `text` into a single function
pub fn parse_function(text: &str, infer: &dyn TypeInference) -> ParseResult<Function> {
    let mut parser = Parser::new(text, infer);
    let func = parser.parse_function()?;
    parser.expect_end()?;
    Ok(func)
}

struct Parser<'a> {
    lex: Lexer<'a>,

    lex_error: Option<LexError>,

    /// Current lookahead token.
    lookahead: Option<Token<'a>>,

    /// Location of lookahead.
    loc: Location,

    infer: &'a dyn TypeInference,
}

/// Context for resolving references when parsing a single function.
struct Context<'a> {
    function: Function,
    /// Variables by their name in the source. Temporaries introduced during
    /// normalization may force a variable to be renamed in the function.
    names: AHashMap<&'a str, Var>,
}

impl<'a> Context<'a> {
    fn define(&mut self, name: &'a str, var: Var, loc: Location) -> ParseResult<()> {
        if self.names.insert(name, var).is_some() {
            return err!(loc, "{} is defined twice", name);
        }
        Ok(())
    }
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, infer: &'a dyn TypeInference) -> Self {
        Self {
            lex: Lexer::new(text),
            lex_error: None,
            lookahead: None,
            loc: Location { line_number: 0 },
            infer,
        }
    }

    // Consume the current lookahead token and return it.
    fn consume(&mut self) -> Option<Token<'a>> {
        self.lookahead.take()
    }

    // Get the current lookahead token, after making sure there is one.
    // Comments are skipped.
    fn token(&mut self) -> Option<Token<'a>> {
        while self.lookahead.is_none() && self.lex_error.is_none() {
            match self.lex.next() {
                Some(Ok(LocatedToken { token: Token::Comment(_), .. })) => (),
                Some(Ok(LocatedToken { token, location })) => {
                    self.lookahead = Some(token);
                    self.loc = location;
                }
                Some(Err(LocatedError { error, location })) => {
                    self.lex_error = Some(error);
                    self.loc = location;
                }
                None => break,
            }
        }
        self.lookahead
    }

    fn error(&self, message: &str) -> ParseError {
        let message = match self.lex_error {
            Some(LexError::InvalidChar) => "invalid character",
            None => message,
        };
        ParseError { location: self.loc, message: message.to_owned() }
    }

    // Match and consume a token without payload.
    fn match_token(&mut self, want: Token<'a>, err_msg: &str) -> ParseResult<()> {
        if self.token() == Some(want) {
            self.consume();
            Ok(())
        } else {
            Err(self.error(err_msg))
        }
    }

    // If the next token is a `want`, consume it, otherwise do nothing.
    fn optional(&mut self, want: Token<'a>) -> bool {
        if self.token() == Some(want) {
            self.consume();
            true
        } else {
            false
        }
    }

    // Match and consume a specific identifier string.
    // Used for keywords like "function" or "return".
    fn match_identifier(&mut self, want: &'static str, err_msg: &str) -> ParseResult<()> {
        self.match_token(Token::Identifier(want), err_msg)
    }

    // Match and consume an identifier.
    fn match_any_identifier(&mut self, err_msg: &str) -> ParseResult<&'a str> {
        if let Some(Token::Identifier(text)) = self.token() {
            self.consume();
            Ok(text)
        } else {
            Err(self.error(err_msg))
        }
    }

    fn match_integer(&mut self, err_msg: &str) -> ParseResult<u64> {
        if let Some(Token::Integer(text)) = self.token() {
            self.consume();
            text.parse().map_err(|_| self.error("expected a non-negative integer"))
        } else {
            Err(self.error(err_msg))
        }
    }

    fn expect_end(&mut self) -> ParseResult<()> {
        if self.token().is_some() || self.lex_error.is_some() {
            return Err(self.error("expected end of input"));
        }
        Ok(())
    }

    /// Parse a list of function definitions.
    ///
    /// This is the top-level parse function matching the whole contents of a file.
    fn parse_function_list(&mut self) -> ParseResult<Vec<Function>> {
        let mut list = Vec::new();
        while self.token().is_some() {
            list.push(self.parse_function()?);
        }
        self.expect_end()?;
        Ok(list)
    }

    // Parse a whole function definition.
    //
    // function ::= * "function" name "(" params ")" [ "->" type ] "{" blocks return "}"
    //
    fn parse_function(&mut self) -> ParseResult<Function> {
        self.match_identifier("function", "expected 'function'")?;

        let name = match self.token() {
            Some(Token::Name(name)) => {
                self.consume();
                name
            }
            _ => return Err(self.error("expected function name")),
        };

        let mut ctx = Context { function: Function::new(name), names: AHashMap::new() };
        self.parse_params(&mut ctx)?;

        let ret_ty = if self.optional(Token::Arrow) { Some(self.parse_type()?) } else { None };

        self.match_token(Token::LBrace, "expected '{' before function body")?;

        loop {
            let kind = match self.token() {
                Some(Token::Identifier("dataflow")) => BlockKind::Dataflow,
                Some(Token::Identifier("bindings")) => BlockKind::Binding,
                _ => break,
            };
            self.consume();
            self.parse_block(&mut ctx, kind)?;
        }

        self.match_identifier("return", "expected 'dataflow', 'bindings' or 'return'")?;
        let loc = self.loc;
        let ret = self.parse_expr(&mut ctx.function, &ctx.names)?;
        let ret_ty = match ret_ty {
            Some(ty) => ty,
            None => ctx.function.expr_ty(ret, self.infer).map_err(|err| type_error(loc, err))?,
        };
        ctx.function.ret = Some(ret);
        ctx.function.ret_ty = Some(ret_ty);

        self.match_token(Token::RBrace, "expected '}' after function body")?;

        Ok(ctx.function)
    }

    // params ::= "(" [ name ":" type { "," name ":" type } ] ")"
    fn parse_params(&mut self, ctx: &mut Context<'a>) -> ParseResult<()> {
        self.match_token(Token::LPar, "expected '(' before parameters")?;
        if self.optional(Token::RPar) {
            return Ok(());
        }
        loop {
            let name = self.match_any_identifier("expected parameter name")?;
            let loc = self.loc;
            self.match_token(Token::Colon, "expected ':' after parameter name")?;
            let ty = self.parse_type()?;
            let param = ctx.function.make_param(name, ty);
            ctx.define(name, param, loc)?;

            if !self.optional(Token::Comma) {
                break;
            }
        }
        self.match_token(Token::RPar, "expected ')' after parameters")
    }

    // block ::= ("dataflow" | "bindings") * "{" { binding } "}"
    // binding ::= [ "output" ] name [ ":" type ] "=" expr
    fn parse_block(&mut self, ctx: &mut Context<'a>, kind: BlockKind) -> ParseResult<()> {
        self.match_token(Token::LBrace, "expected '{' before block")?;
        let mut builder = BlockBuilder::new(&mut ctx.function, self.infer, kind);

        while !self.optional(Token::RBrace) {
            let mut var_kind = match kind {
                BlockKind::Dataflow => VarKind::Dataflow,
                BlockKind::Binding => VarKind::Output,
            };
            let mut name = self.match_any_identifier("expected binding or '}'")?;
            if name == "output" {
                var_kind = VarKind::Output;
                name = self.match_any_identifier("expected variable name after 'output'")?;
            }
            let loc = self.loc;

            let ty = if self.optional(Token::Colon) { Some(self.parse_type()?) } else { None };
            self.match_token(Token::Equal, "expected '=' after variable name")?;
            let value = self.parse_expr(builder.func, &ctx.names)?;

            let var = match ty {
                Some(ty) => {
                    let value = builder.normalize(value).map_err(|err| type_error(loc, err))?;
                    let var = builder.func.make_var(name, ty, var_kind);
                    builder.push(Binding { var, value });
                    var
                }
                None => builder
                    .emit_new(name, value, var_kind)
                    .map_err(|err| type_error(loc, err))?,
            };
            if ctx.names.insert(name, var).is_some() {
                return err!(loc, "{} is defined twice", name);
            }
        }

        builder.finish();
        Ok(())
    }

    // type ::= "Tensor" "(" shape "," dtype ")" | "Tuple" "(" [ type { "," type } ] ")"
    fn parse_type(&mut self) -> ParseResult<Ty> {
        match self.match_any_identifier("expected type")? {
            "Tensor" => {
                self.match_token(Token::LPar, "expected '(' after 'Tensor'")?;
                let shape = self.parse_shape()?;
                self.match_token(Token::Comma, "expected ',' after tensor shape")?;
                let dtype = self.parse_dtype()?;
                self.match_token(Token::RPar, "expected ')' after tensor dtype")?;
                Ok(Ty::Tensor { shape, dtype })
            }
            "Tuple" => {
                self.match_token(Token::LPar, "expected '(' after 'Tuple'")?;
                let mut fields = Vec::new();
                if !self.optional(Token::RPar) {
                    loop {
                        fields.push(self.parse_type()?);
                        if !self.optional(Token::Comma) {
                            break;
                        }
                    }
                    self.match_token(Token::RPar, "expected ')' after tuple fields")?;
                }
                Ok(Ty::Tuple(fields.into_boxed_slice()))
            }
            _ => Err(self.error("expected 'Tensor' or 'Tuple'")),
        }
    }

    // shape ::= "?" [ integer ] | "(" [ integer { "," integer } [ "," ] ] ")"
    fn parse_shape(&mut self) -> ParseResult<Shape> {
        if self.optional(Token::Question) {
            let ndim = match self.token() {
                Some(Token::Integer(_)) => Some(self.match_integer("expected rank")? as u32),
                _ => None,
            };
            return Ok(Shape::runtime(ndim));
        }

        self.match_token(Token::LPar, "expected shape")?;
        let mut dims = Vec::new();
        while !self.optional(Token::RPar) {
            dims.push(self.match_integer("expected dimension")?);
            if !self.optional(Token::Comma) {
                self.match_token(Token::RPar, "expected ')' after shape")?;
                break;
            }
        }
        Ok(Shape::Known(dims.into_boxed_slice()))
    }

    fn parse_dtype(&mut self) -> ParseResult<DType> {
        let name = self.match_any_identifier("expected dtype")?;
        name.parse().map_err(|_| {
            let expected: Vec<_> = DType::ALL.iter().map(|dtype| dtype.name()).collect();
            let expected = List::new(expected).surround("'");
            let message = format!("unknown dtype {name}, expected {expected}");
            ParseError { location: self.loc, message }
        })
    }

    // expr ::= primary { "[" integer "]" }
    fn parse_expr(
        &mut self,
        func: &mut Function,
        names: &AHashMap<&'a str, Var>,
    ) -> ParseResult<Expr> {
        let mut expr = self.parse_primary(func, names)?;
        while self.optional(Token::LBracket) {
            let index = self.match_integer("expected tuple index")?;
            self.match_token(Token::RBracket, "expected ']' after tuple index")?;
            expr = func.make_tuple_get_item(expr, index as u32);
        }
        Ok(expr)
    }

    // primary ::= name | number | op "(" args ")" | "(" [ expr { "," expr } [ "," ] ] ")"
    fn parse_primary(
        &mut self,
        func: &mut Function,
        names: &AHashMap<&'a str, Var>,
    ) -> ParseResult<Expr> {
        let expr = match self.token() {
            Some(Token::Identifier(name)) => {
                self.consume();
                if self.token() == Some(Token::LPar) {
                    let op = name.parse().map_err(|_| self.error("unknown operator"))?;
                    return self.parse_call(func, names, op);
                }
                match names.get(name) {
                    Some(&var) => func.var_ref(var),
                    None => return err!(self.loc, "unknown variable {}", name),
                }
            }
            Some(Token::Integer(text) | Token::Float(text)) => {
                self.consume();
                let val = text.parse().map_err(|_| self.error("invalid number"))?;
                func.make_expr(ExprData::Constant(Constant { val, dtype: DType::F32 }))
            }
            Some(Token::LPar) => {
                self.consume();
                if self.optional(Token::RPar) {
                    return Ok(func.make_tuple(Vec::<Expr>::new()));
                }
                let first = self.parse_expr(func, names)?;
                if self.optional(Token::RPar) {
                    // parenthesized expression
                    return Ok(first);
                }
                self.match_token(Token::Comma, "expected ',' or ')'")?;
                let mut fields = vec![first];
                while !self.optional(Token::RPar) {
                    fields.push(self.parse_expr(func, names)?);
                    if !self.optional(Token::Comma) {
                        self.match_token(Token::RPar, "expected ')' after tuple fields")?;
                        break;
                    }
                }
                func.make_tuple(fields)
            }
            _ => return Err(self.error("expected expression")),
        };
        Ok(expr)
    }

    fn parse_call(
        &mut self,
        func: &mut Function,
        names: &AHashMap<&'a str, Var>,
        op: Opcode,
    ) -> ParseResult<Expr> {
        self.match_token(Token::LPar, "expected '(' after operator")?;
        if op.is_init() {
            let shape = self.parse_shape()?;
            let Shape::Known(shape) = shape else {
                return Err(self.error("expected static shape"));
            };
            self.match_token(Token::Comma, "expected ',' after shape")?;
            let dtype = self.parse_dtype()?;
            self.match_token(Token::RPar, "expected ')' after dtype")?;
            return Ok(func.make_init(op, &shape, dtype));
        }

        let mut args = Vec::new();
        while !self.optional(Token::RPar) {
            args.push(self.parse_expr(func, names)?);
            if !self.optional(Token::Comma) {
                self.match_token(Token::RPar, "expected ')' after arguments")?;
                break;
            }
        }
        Ok(func.make_call(op, args))
    }
}
