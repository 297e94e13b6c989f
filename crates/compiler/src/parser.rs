//! Recursive-descent parser
//!
//! Produces a concrete parse tree whose nodes are tagged with [`RuleId`]s and
//! carry the text of their defining token (the operator for expression
//! nodes, the name for identifiers, the literal text for constants).
//!
//! Error handling follows the guard model: productions anchored on a
//! delimiter (blocks, parenthesized expressions, statements ending in `;`,
//! ...) report `<what> expected`, bump the per-compilation syntax-error
//! count, and then continue as though the delimiter had been present, so one
//! missing token does not cascade. Mismatches outside a guard abort the
//! translation unit. The IR stage never runs after a syntax error, so
//! partially recovered nodes are never lowered.

use crate::diag::{CellError, Diagnostics, SourcePos};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::rules::RuleId;

/// A node of the concrete parse tree.
#[derive(Debug, Clone)]
pub struct ParseNode {
    pub rule: RuleId,
    pub text: String,
    pub pos: SourcePos,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    fn new(rule: RuleId, text: impl Into<String>, pos: SourcePos) -> Self {
        ParseNode { rule, text: text.into(), pos, children: Vec::new() }
    }

    fn with_children(
        rule: RuleId,
        text: impl Into<String>,
        pos: SourcePos,
        children: Vec<ParseNode>,
    ) -> Self {
        ParseNode { rule, text: text.into(), pos, children }
    }
}

const TYPE_KEYWORDS: &[&str] = &["int", "real", "vec"];

const ASSIGNMENT_OPERATORS: &[&str] =
    &["=", "+=", "-=", "*=", "/=", "%=", "^=", "&=", "|=", "<<=", ">>="];

pub struct Parser<'d> {
    tokens: Vec<Token>,
    pos: usize,
    file: String,
    diags: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    pub fn new(source: &str, file: &str, diags: &'d mut Diagnostics) -> Result<Self, CellError> {
        let tokens = tokenize(source, file)?;
        Ok(Parser { tokens, pos: 0, file: file.to_string(), diags })
    }

    // ------------------------------------------------------------- plumbing

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn here(&self) -> SourcePos {
        match self.peek() {
            Some(t) => t.pos.clone(),
            None => match self.tokens.last() {
                Some(t) => t.pos.clone(),
                None => SourcePos::new(self.file.clone(), 1, 1),
            },
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, text: &str) -> bool {
        self.peek().is_some_and(|t| t.is(text))
    }

    fn check_any(&self, set: &[&str]) -> bool {
        self.peek().is_some_and(|t| set.iter().any(|s| t.is(s)))
    }

    fn consume(&mut self, text: &str) -> bool {
        if self.check(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Guard expectation: report on mismatch and carry on without consuming.
    fn expect(&mut self, text: &str, what: &str) -> bool {
        if self.consume(text) {
            return true;
        }
        let pos = self.here();
        self.diags.syntax_error(&pos, what);
        false
    }

    fn expression_expected(&mut self) {
        let pos = self.here();
        self.diags.syntax_error(&pos, "expression expected");
    }

    // ----------------------------------------------------------- top level

    /// Parse a whole translation unit. The root is labeled `start_symbol`
    /// with a single `translation_unit` child holding the statement list.
    pub fn parse(&mut self) -> Result<ParseNode, CellError> {
        let pos = self.here();
        let mut statements = Vec::new();
        while !self.is_at_end() {
            let before = self.pos;
            if let Some(statement) = self.parse_statement()? {
                statements.push(statement);
            }
            if self.pos == before {
                // nothing matched and nothing was consumed: a stray token
                let t = self.peek().cloned();
                return Err(match t {
                    Some(t) => {
                        CellError::at(&t.pos, format!("parse failure at '{}'", t.text))
                    }
                    None => CellError::new("parse failure"),
                });
            }
        }
        let unit = ParseNode::with_children(RuleId::TranslationUnit, "", pos.clone(), statements);
        Ok(ParseNode::with_children(RuleId::StartSymbol, "", pos, vec![unit]))
    }

    // ----------------------------------------------------------- statements

    fn parse_statement(&mut self) -> Result<Option<ParseNode>, CellError> {
        let Some(t) = self.peek() else {
            return Ok(None);
        };

        if t.is("{") {
            return self.parse_block().map(Some);
        }
        if t.is(";") {
            let pos = t.pos.clone();
            self.advance();
            return Ok(Some(ParseNode::new(RuleId::EmptyStatement, ";", pos)));
        }
        if t.is("if") {
            return self.parse_if_statement().map(Some);
        }
        if t.is("while") {
            return self.parse_while_statement().map(Some);
        }
        if t.is("quit") {
            return self.parse_quit_statement().map(Some);
        }
        if self.starts_declaration() {
            return self.parse_declaration_statement().map(Some);
        }
        self.parse_expression_statement()
    }

    /// Distinguish `int x;` / `int[4] x;` from the expression forms
    /// `int(...)` and `int[4](...)`, which also start with a type keyword.
    fn starts_declaration(&self) -> bool {
        if self.check("global") {
            return true;
        }
        if !self.check_any(TYPE_KEYWORDS) {
            return false;
        }
        match self.peek_at(1) {
            Some(t) if t.kind == TokenKind::Identifier => true,
            Some(t) if t.is("[") => {
                // type '[' INT ']' IDENT  is a declaration;
                // type '[' INT ']' '('    is an array-creation expression
                matches!(self.peek_at(4), Some(t) if t.kind == TokenKind::Identifier)
            }
            _ => false,
        }
    }

    fn parse_block(&mut self) -> Result<ParseNode, CellError> {
        let pos = self.here();
        self.consume("{");
        let mut statements = Vec::new();
        while !self.is_at_end() && !self.check("}") {
            let before = self.pos;
            if let Some(statement) = self.parse_statement()? {
                statements.push(statement);
            }
            if self.pos == before {
                break;
            }
        }
        self.expect("}", "} expected");
        Ok(ParseNode::with_children(RuleId::Block, "{", pos, statements))
    }

    fn parse_declaration_statement(&mut self) -> Result<ParseNode, CellError> {
        let pos = self.here();
        let mut children = Vec::new();

        if self.check("global") {
            let t = self.advance().unwrap();
            children.push(ParseNode::new(RuleId::TypeModifier, t.text, t.pos));
        }

        let Some(ty) = self.advance() else {
            return Err(CellError::at(&pos, "parse failure"));
        };
        let type_text = ty.text.clone();
        children.push(ParseNode::new(RuleId::TypeSpecifier, ty.text, ty.pos));

        if self.check("[") {
            children.push(self.parse_array_specifier());
        }

        match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => {
                let t = self.advance().unwrap();
                children.push(ParseNode::new(RuleId::VariableDeclarator, t.text, t.pos));
            }
            _ => {
                let at = self.here();
                return Err(CellError::at(&at, "parse failure: declarator expected"));
            }
        }

        self.expect(";", "; expected");
        Ok(ParseNode::with_children(RuleId::VariableDeclaration, type_text, pos, children))
    }

    /// `[ <integer-literal> ]`, guarded.
    fn parse_array_specifier(&mut self) -> ParseNode {
        let pos = self.here();
        self.consume("[");
        let mut children = Vec::new();
        match self.peek() {
            Some(t)
                if matches!(
                    t.kind,
                    TokenKind::IntegerHex | TokenKind::IntegerOct | TokenKind::IntegerDec
                ) =>
            {
                let t = self.advance().unwrap();
                children.push(integer_literal_node(&t));
            }
            _ => {
                let at = self.here();
                self.diags.syntax_error(&at, "constant expected");
            }
        }
        self.expect("]", "] expected");
        ParseNode::with_children(RuleId::ArraySpecifier, "[", pos, children)
    }

    fn parse_expression_statement(&mut self) -> Result<Option<ParseNode>, CellError> {
        let pos = self.here();
        let Some(expression) = self.parse_expression()? else {
            // not even the start of an expression: let the caller decide
            return Ok(None);
        };
        self.expect(";", "; expected");
        Ok(Some(ParseNode::with_children(
            RuleId::ExpressionStatement,
            ";",
            pos,
            vec![expression],
        )))
    }

    fn parse_if_statement(&mut self) -> Result<ParseNode, CellError> {
        let pos = self.here();
        self.consume("if");
        let mut children = Vec::new();

        self.expect("(", "( expected");
        match self.parse_expression()? {
            Some(cond) => children.push(cond),
            None => self.expression_expected(),
        }
        self.expect(")", ") expected");

        if let Some(body) = self.parse_statement()? {
            children.push(body);
        }

        if self.check("else") {
            let else_pos = self.here();
            self.advance();
            if let Some(body) = self.parse_statement()? {
                children.push(ParseNode::with_children(
                    RuleId::ElseStatement,
                    "else",
                    else_pos,
                    vec![body],
                ));
            }
        }

        Ok(ParseNode::with_children(RuleId::IfStatement, "if", pos, children))
    }

    fn parse_while_statement(&mut self) -> Result<ParseNode, CellError> {
        let pos = self.here();
        self.consume("while");
        let mut children = Vec::new();

        self.expect("(", "( expected");
        match self.parse_expression()? {
            Some(cond) => children.push(cond),
            None => self.expression_expected(),
        }
        self.expect(")", ") expected");

        if let Some(body) = self.parse_statement()? {
            children.push(body);
        }

        Ok(ParseNode::with_children(RuleId::WhileStatement, "while", pos, children))
    }

    fn parse_quit_statement(&mut self) -> Result<ParseNode, CellError> {
        let pos = self.here();
        self.consume("quit");
        self.expect(";", "; expected");
        Ok(ParseNode::new(RuleId::QuitStatement, "quit", pos))
    }

    // ---------------------------------------------------------- expressions

    fn parse_expression(&mut self) -> Result<Option<ParseNode>, CellError> {
        let Some(left) = self.parse_conditional_expression()? else {
            return Ok(None);
        };
        // assignment is right-associative; the l-value check is semantic
        if self.check_any(ASSIGNMENT_OPERATORS) {
            let op = self.advance().unwrap();
            let Some(right) = self.parse_expression()? else {
                self.expression_expected();
                return Ok(Some(left));
            };
            return Ok(Some(ParseNode::with_children(
                RuleId::Assignment,
                op.text,
                op.pos,
                vec![left, right],
            )));
        }
        Ok(Some(left))
    }

    /// `a ? b : c`, guarded on the `:`.
    fn parse_conditional_expression(&mut self) -> Result<Option<ParseNode>, CellError> {
        let Some(cond) = self.parse_binary_expression(0)? else {
            return Ok(None);
        };
        if !self.check("?") {
            return Ok(Some(cond));
        }
        let op = self.advance().unwrap();
        let mut children = vec![cond];
        match self.parse_expression()? {
            Some(e) => children.push(e),
            None => self.expression_expected(),
        }
        self.expect(":", ": expected");
        match self.parse_expression()? {
            Some(e) => children.push(e),
            None => self.expression_expected(),
        }
        Ok(Some(ParseNode::with_children(
            RuleId::ConditionalExpression,
            op.text,
            op.pos,
            children,
        )))
    }

    /// Precedence climbing over the binary operator tiers, loosest first.
    fn parse_binary_expression(&mut self, level: usize) -> Result<Option<ParseNode>, CellError> {
        const TIERS: &[(&[&str], RuleId)] = &[
            (&["||"], RuleId::ConditionalOrExpression),
            (&["&&"], RuleId::ConditionalAndExpression),
            (&["|"], RuleId::InclusiveOrExpression),
            (&["^"], RuleId::ExclusiveOrExpression),
            (&["&"], RuleId::AndExpression),
            (&["==", "!="], RuleId::EqualityExpression),
            (&["<=", ">=", "<", ">"], RuleId::RelationalExpression),
            (&["<<", ">>"], RuleId::ShiftExpression),
            (&["+", "-"], RuleId::AdditiveExpression),
            (&["*", "/", "%"], RuleId::MultiplicativeExpression),
        ];

        if level == TIERS.len() {
            return self.parse_unary_expression();
        }
        let (ops, rule) = TIERS[level];

        let Some(mut left) = self.parse_binary_expression(level + 1)? else {
            return Ok(None);
        };
        loop {
            if !self.check_any(ops) {
                return Ok(Some(left));
            }
            let saved = self.pos;
            let op = self.advance().unwrap();
            match self.parse_binary_expression(level + 1)? {
                Some(right) => {
                    left = ParseNode::with_children(rule, op.text, op.pos, vec![left, right]);
                }
                None => {
                    // no operand after the operator: back out and let the
                    // enclosing production report the mismatch
                    self.pos = saved;
                    return Ok(Some(left));
                }
            }
        }
    }

    fn parse_unary_expression(&mut self) -> Result<Option<ParseNode>, CellError> {
        const UNARY_OPERATORS: &[&str] = &["!", "~", "++", "--", "+", "-"];
        if self.check_any(UNARY_OPERATORS) {
            let saved = self.pos;
            let op = self.advance().unwrap();
            return match self.parse_unary_expression()? {
                Some(operand) => Ok(Some(ParseNode::with_children(
                    RuleId::UnaryExpression,
                    op.text,
                    op.pos,
                    vec![operand],
                ))),
                None => {
                    self.pos = saved;
                    Ok(None)
                }
            };
        }
        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Option<ParseNode>, CellError> {
        let Some(mut expression) = self.parse_primary_expression()? else {
            return Ok(None);
        };
        while self.check("++") || self.check("--") {
            let op = self.advance().unwrap();
            expression = ParseNode::with_children(
                RuleId::PostfixExpression,
                op.text,
                op.pos,
                vec![expression],
            );
        }
        Ok(Some(expression))
    }

    fn parse_primary_expression(&mut self) -> Result<Option<ParseNode>, CellError> {
        let Some(base) = self.parse_primary_base()? else {
            return Ok(None);
        };

        // member and element accesses chain as siblings under one node
        let mut accessors = Vec::new();
        loop {
            if self.check(".") {
                let saved = self.pos;
                let dot = self.advance().unwrap();
                match self.peek() {
                    Some(t) if t.kind == TokenKind::Identifier => {
                        let name = self.advance().unwrap();
                        let member =
                            ParseNode::new(RuleId::QualifiedIdentifier, name.text, name.pos);
                        accessors.push(ParseNode::with_children(
                            RuleId::MemberAccess,
                            dot.text,
                            dot.pos,
                            vec![member],
                        ));
                    }
                    _ => {
                        self.pos = saved;
                        break;
                    }
                }
                continue;
            }
            if self.check("[") {
                let saved = self.pos;
                let bracket = self.advance().unwrap();
                match self.parse_expression()? {
                    Some(index) => {
                        self.expect("]", "] expected");
                        accessors.push(ParseNode::with_children(
                            RuleId::ElementAccess,
                            bracket.text,
                            bracket.pos,
                            vec![index],
                        ));
                    }
                    None => {
                        self.pos = saved;
                        break;
                    }
                }
                continue;
            }
            break;
        }

        if accessors.is_empty() {
            return Ok(Some(base));
        }
        let pos = base.pos.clone();
        let mut children = vec![base];
        children.extend(accessors);
        Ok(Some(ParseNode::with_children(RuleId::PrimaryExpression, "", pos, children)))
    }

    fn parse_primary_base(&mut self) -> Result<Option<ParseNode>, CellError> {
        let Some(t) = self.peek().cloned() else {
            return Ok(None);
        };

        match t.kind {
            TokenKind::IntegerHex | TokenKind::IntegerOct | TokenKind::IntegerDec => {
                self.advance();
                return Ok(Some(integer_literal_node(&t)));
            }
            TokenKind::Real => {
                self.advance();
                return Ok(Some(ParseNode::new(RuleId::RealLiteral, t.text, t.pos)));
            }
            TokenKind::SystemIdentifier => {
                self.advance();
                return Ok(Some(ParseNode::new(RuleId::SystemIdentifier, t.text, t.pos)));
            }
            TokenKind::Identifier => {
                // invocation or plain identifier
                if self.peek_at(1).is_some_and(|n| n.is("(")) {
                    return self.parse_invocation().map(Some);
                }
                self.advance();
                return Ok(Some(ParseNode::new(RuleId::QualifiedIdentifier, t.text, t.pos)));
            }
            TokenKind::Keyword if t.is("true") || t.is("false") => {
                self.advance();
                return Ok(Some(ParseNode::new(RuleId::BooleanLiteral, t.text, t.pos)));
            }
            TokenKind::Keyword if TYPE_KEYWORDS.contains(&t.text.as_str()) => {
                return self.parse_creation_expression().map(Some);
            }
            _ => {}
        }

        if t.is("(") {
            return self.parse_parenthesized_expression().map(Some);
        }
        Ok(None)
    }

    /// `( expression )`, guarded.
    fn parse_parenthesized_expression(&mut self) -> Result<ParseNode, CellError> {
        let pos = self.here();
        self.consume("(");
        let mut children = Vec::new();
        match self.parse_expression()? {
            Some(e) => children.push(e),
            None => self.expression_expected(),
        }
        self.expect(")", ") expected");
        Ok(ParseNode::with_children(RuleId::ParenthesizedExpression, "(", pos, children))
    }

    /// `ident ( args )`; backs out to a plain identifier on mismatch.
    fn parse_invocation(&mut self) -> Result<ParseNode, CellError> {
        let saved = self.pos;
        let name = self.advance().unwrap();
        let callee =
            ParseNode::new(RuleId::QualifiedIdentifier, name.text.clone(), name.pos.clone());
        self.consume("(");
        let Some(arguments) = self.parse_argument_list()? else {
            self.pos = saved;
            self.advance();
            return Ok(ParseNode::new(RuleId::QualifiedIdentifier, name.text, name.pos));
        };
        if !self.consume(")") {
            self.pos = saved;
            self.advance();
            return Ok(ParseNode::new(RuleId::QualifiedIdentifier, name.text, name.pos));
        }
        Ok(ParseNode::with_children(RuleId::Invocation, "(", name.pos, vec![callee, arguments]))
    }

    /// `vec(...)` object creation or `int[4](...)` array creation, guarded.
    fn parse_creation_expression(&mut self) -> Result<ParseNode, CellError> {
        let ty = self.advance().unwrap();
        let pos = ty.pos.clone();
        let type_node = ParseNode::new(RuleId::TypeSpecifier, ty.text.clone(), ty.pos);
        let mut children = vec![type_node];
        let rule = if self.check("[") {
            children.push(self.parse_array_specifier());
            RuleId::ArrayCreationExpression
        } else {
            RuleId::ObjectCreationExpression
        };

        self.expect("(", "( expected");
        match self.parse_argument_list()? {
            Some(arguments) => children.push(arguments),
            None => self.expression_expected(),
        }
        self.expect(")", ") expected");
        Ok(ParseNode::with_children(rule, ty.text, pos, children))
    }

    /// Comma-separated expressions up to (not including) the closing `)`.
    /// Returns `None` when an argument fails to parse.
    fn parse_argument_list(&mut self) -> Result<Option<ParseNode>, CellError> {
        let pos = self.here();
        let mut arguments = Vec::new();
        if !self.check(")") {
            loop {
                match self.parse_expression()? {
                    Some(e) => arguments.push(e),
                    None => return Ok(None),
                }
                if !self.consume(",") {
                    break;
                }
            }
        }
        Ok(Some(ParseNode::with_children(RuleId::ArgumentList, "", pos, arguments)))
    }
}

fn integer_literal_node(t: &Token) -> ParseNode {
    let rule = match t.kind {
        TokenKind::IntegerHex => RuleId::IntegerLiteralHex,
        TokenKind::IntegerOct => RuleId::IntegerLiteralOct,
        _ => RuleId::IntegerLiteralDec,
    };
    ParseNode::new(rule, t.text.clone(), t.pos.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> (ParseNode, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tree = {
            let mut parser = Parser::new(source, "test.cell", &mut diags).unwrap();
            parser.parse().unwrap()
        };
        (tree, diags)
    }

    fn first_statement(tree: &ParseNode) -> &ParseNode {
        &tree.children[0].children[0]
    }

    #[test]
    fn test_root_is_start_symbol() {
        let (tree, diags) = parse_ok("int x;");
        assert_eq!(tree.rule, RuleId::StartSymbol);
        assert_eq!(tree.children[0].rule, RuleId::TranslationUnit);
        assert!(!diags.has_syntax_errors());
    }

    #[test]
    fn test_multiplicative_binds_tighter_than_additive() {
        let (tree, _) = parse_ok("a + b * c;");
        let statement = first_statement(&tree);
        assert_eq!(statement.rule, RuleId::ExpressionStatement);
        let add = &statement.children[0];
        assert_eq!(add.rule, RuleId::AdditiveExpression);
        assert_eq!(add.text, "+");
        assert_eq!(add.children[0].rule, RuleId::QualifiedIdentifier);
        let mul = &add.children[1];
        assert_eq!(mul.rule, RuleId::MultiplicativeExpression);
        assert_eq!(mul.text, "*");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let (tree, _) = parse_ok("a = b = c;");
        let assign = &first_statement(&tree).children[0];
        assert_eq!(assign.rule, RuleId::Assignment);
        assert_eq!(assign.children[0].rule, RuleId::QualifiedIdentifier);
        let inner = &assign.children[1];
        assert_eq!(inner.rule, RuleId::Assignment);
        assert_eq!(inner.children[0].text, "b");
        assert_eq!(inner.children[1].text, "c");
    }

    #[test]
    fn test_declaration_forms() {
        let (tree, diags) = parse_ok("global vec direction; int[8] counts;");
        assert!(!diags.has_syntax_errors());
        let unit = &tree.children[0];
        let first = &unit.children[0];
        assert_eq!(first.rule, RuleId::VariableDeclaration);
        assert_eq!(first.children[0].rule, RuleId::TypeModifier);
        assert_eq!(first.children[1].text, "vec");
        assert_eq!(first.children[2].rule, RuleId::VariableDeclarator);

        let second = &unit.children[1];
        assert_eq!(second.children[0].text, "int");
        assert_eq!(second.children[1].rule, RuleId::ArraySpecifier);
        assert_eq!(second.children[1].children[0].text, "8");
        assert_eq!(second.children[2].text, "counts");
    }

    #[test]
    fn test_primary_accessor_chain() {
        let (tree, _) = parse_ok("#Position[i].x;");
        let primary = &first_statement(&tree).children[0];
        assert_eq!(primary.rule, RuleId::PrimaryExpression);
        assert_eq!(primary.children[0].rule, RuleId::SystemIdentifier);
        assert_eq!(primary.children[0].text, "#Position");
        assert_eq!(primary.children[1].rule, RuleId::ElementAccess);
        assert_eq!(primary.children[2].rule, RuleId::MemberAccess);
        assert_eq!(primary.children[2].children[0].text, "x");
    }

    #[test]
    fn test_invocation_and_object_creation() {
        let (tree, diags) = parse_ok("d = sqrt(x); f = vec(1.0, 2.0);");
        assert!(!diags.has_syntax_errors());
        let unit = &tree.children[0];
        let call = &unit.children[0].children[0].children[1];
        assert_eq!(call.rule, RuleId::Invocation);
        assert_eq!(call.children[0].text, "sqrt");
        assert_eq!(call.children[1].rule, RuleId::ArgumentList);
        assert_eq!(call.children[1].children.len(), 1);

        let creation = &unit.children[1].children[0].children[1];
        assert_eq!(creation.rule, RuleId::ObjectCreationExpression);
        assert_eq!(creation.children[0].text, "vec");
        assert_eq!(creation.children[1].children.len(), 2);
    }

    #[test]
    fn test_if_else_and_while() {
        let (tree, diags) = parse_ok("if (a > 1) { quit; } else b = 2; while (1) ;");
        assert!(!diags.has_syntax_errors());
        let unit = &tree.children[0];
        let if_node = &unit.children[0];
        assert_eq!(if_node.rule, RuleId::IfStatement);
        assert_eq!(if_node.children.len(), 3);
        assert_eq!(if_node.children[0].rule, RuleId::RelationalExpression);
        assert_eq!(if_node.children[1].rule, RuleId::Block);
        assert_eq!(if_node.children[2].rule, RuleId::ElseStatement);

        let while_node = &unit.children[1];
        assert_eq!(while_node.rule, RuleId::WhileStatement);
        assert_eq!(while_node.children[1].rule, RuleId::EmptyStatement);
    }

    #[test]
    fn test_conditional_expression() {
        let (tree, _) = parse_ok("m = a > b ? a : b;");
        let assign = &first_statement(&tree).children[0];
        let cond = &assign.children[1];
        assert_eq!(cond.rule, RuleId::ConditionalExpression);
        assert_eq!(cond.children.len(), 3);
    }

    #[test]
    fn test_missing_semicolon_recovers() {
        let mut diags = Diagnostics::new();
        let tree = {
            let mut parser = Parser::new("a = 1\nb = 2;", "test.cell", &mut diags).unwrap();
            parser.parse().unwrap()
        };
        assert!(diags.has_syntax_errors());
        assert_eq!(diags.syntax_error_count(), 1);
        assert!(diags.messages()[0].contains("; expected"));
        assert!(diags.messages()[0].contains("(2)"));
        // parsing resumed: the second statement is still present
        assert_eq!(tree.children[0].children.len(), 2);
    }

    #[test]
    fn test_missing_rbrace_reported() {
        let mut diags = Diagnostics::new();
        let _ = {
            let mut parser = Parser::new("{ a = 1;", "test.cell", &mut diags).unwrap();
            parser.parse().unwrap()
        };
        assert!(diags.messages().iter().any(|m| m.contains("} expected")));
    }

    #[test]
    fn test_missing_condition_reported() {
        let mut diags = Diagnostics::new();
        let _ = {
            let mut parser = Parser::new("if () quit;", "test.cell", &mut diags).unwrap();
            parser.parse()
        };
        assert!(diags.messages().iter().any(|m| m.contains("expression expected")));
    }

    #[test]
    fn test_stray_token_aborts() {
        let mut diags = Diagnostics::new();
        let result = {
            let mut parser = Parser::new("] ]", "test.cell", &mut diags).unwrap();
            parser.parse()
        };
        assert!(result.is_err());
    }

    #[test]
    fn test_postfix_and_unary() {
        let (tree, _) = parse_ok("n++; --n; -x;");
        let unit = &tree.children[0];
        assert_eq!(unit.children[0].children[0].rule, RuleId::PostfixExpression);
        assert_eq!(unit.children[0].children[0].text, "++");
        assert_eq!(unit.children[1].children[0].rule, RuleId::UnaryExpression);
        assert_eq!(unit.children[1].children[0].text, "--");
        assert_eq!(unit.children[2].children[0].text, "-");
    }
}
