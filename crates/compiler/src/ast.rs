//! Typed abstract syntax tree
//!
//! One tagged-union node kind per semantic production. Terminal nodes resolve
//! their values during construction from the parse tree: integer literals are
//! parsed with their radix and clamped on overflow, reals narrow to `f32`
//! (overflowing to infinity with a diagnostic), boolean literals lower to the
//! int constants the language actually computes with, and system identifiers
//! drop their `#` prefix.

use crate::diag::{CellError, Diagnostics, SourcePos};
use crate::parser::ParseNode;
use crate::rules::RuleId;

/// Built-in types of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSpec {
    Int,
    Real,
    Vec,
}

impl TypeSpec {
    pub fn from_keyword(text: &str) -> Option<TypeSpec> {
        match text {
            "int" => Some(TypeSpec::Int),
            "real" => Some(TypeSpec::Real),
            "vec" => Some(TypeSpec::Vec),
            _ => None,
        }
    }
}

/// Expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Invalid,

    // unary
    Not,
    BitNot,

    // unary with side effects
    PlusPlus,
    MinusMinus,

    // relational
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // arithmetic
    Mul,
    Div,
    Mod,
    Plus,
    Minus,
    Shl,
    Shr,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,

    // assignment
    Assign,
    MulAssign,
    DivAssign,
    ModAssign,
    PlusAssign,
    MinusAssign,
    ShlAssign,
    ShrAssign,
    BitAndAssign,
    BitXorAssign,
    BitOrAssign,
}

impl Op {
    pub fn from_text(text: &str) -> Op {
        match text {
            "!" => Op::Not,
            "~" => Op::BitNot,
            "++" => Op::PlusPlus,
            "--" => Op::MinusMinus,
            "==" => Op::Eq,
            "!=" => Op::NotEq,
            "<" => Op::Lt,
            ">" => Op::Gt,
            "<=" => Op::LtEq,
            ">=" => Op::GtEq,
            "*" => Op::Mul,
            "/" => Op::Div,
            "%" => Op::Mod,
            "+" => Op::Plus,
            "-" => Op::Minus,
            "<<" => Op::Shl,
            ">>" => Op::Shr,
            "&" => Op::BitAnd,
            "^" => Op::BitXor,
            "|" => Op::BitOr,
            "&&" => Op::And,
            "||" => Op::Or,
            "=" => Op::Assign,
            "*=" => Op::MulAssign,
            "/=" => Op::DivAssign,
            "%=" => Op::ModAssign,
            "+=" => Op::PlusAssign,
            "-=" => Op::MinusAssign,
            "<<=" => Op::ShlAssign,
            ">>=" => Op::ShrAssign,
            "&=" => Op::BitAndAssign,
            "^=" => Op::BitXorAssign,
            "|=" => Op::BitOrAssign,
            _ => Op::Invalid,
        }
    }

    /// The binary operator a compound assignment applies, if this is one.
    pub fn compound_base(self) -> Option<Op> {
        match self {
            Op::MulAssign => Some(Op::Mul),
            Op::DivAssign => Some(Op::Div),
            Op::ModAssign => Some(Op::Mod),
            Op::PlusAssign => Some(Op::Plus),
            Op::MinusAssign => Some(Op::Minus),
            Op::ShlAssign => Some(Op::Shl),
            Op::ShrAssign => Some(Op::Shr),
            Op::BitAndAssign => Some(Op::BitAnd),
            Op::BitXorAssign => Some(Op::BitXor),
            Op::BitOrAssign => Some(Op::BitOr),
            _ => None,
        }
    }
}

/// An AST node: a kind plus the position it came from.
#[derive(Debug, Clone)]
pub struct Ast {
    pub kind: AstKind,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub enum AstKind {
    Program(Vec<Ast>),

    // statements
    Block(Vec<Ast>),
    Empty,
    VarDecl { global: bool, ty: TypeSpec, array_len: Option<i32>, name: String },
    ExprStmt(Box<Ast>),
    If { cond: Box<Ast>, then_body: Box<Ast>, else_body: Option<Box<Ast>> },
    While { cond: Box<Ast>, body: Box<Ast> },
    Quit,

    // expressions
    IntLit { value: i32, radix: u32 },
    RealLit { value: f32 },
    Ident(String),
    SystemIdent(String),
    Unary { op: Op, operand: Box<Ast> },
    Postfix { op: Op, operand: Box<Ast> },
    Binary { op: Op, lhs: Box<Ast>, rhs: Box<Ast> },
    Conditional { cond: Box<Ast>, then_value: Box<Ast>, else_value: Box<Ast> },
    Assign { op: Op, target: Box<Ast>, value: Box<Ast> },
    Invoke { callee: String, args: Vec<Ast> },
    Member { base: Box<Ast>, member: String },
    Element { base: Box<Ast>, index: Box<Ast> },
    MakeObject { ty: TypeSpec, args: Vec<Ast> },
    MakeArray { ty: TypeSpec, len: i32, args: Vec<Ast> },
}

impl Ast {
    fn new(kind: AstKind, pos: &SourcePos) -> Ast {
        Ast { kind, pos: pos.clone() }
    }
}

fn internal(node: &ParseNode, what: &str) -> CellError {
    CellError::at(&node.pos, format!("internal: {} at rule {}", what, node.rule.name()))
}

/// Build the AST for a translation unit from its parse tree.
///
/// Only runs on parse trees produced without syntax errors; a rule that does
/// not map to a constructor here means the grammar and this builder have
/// drifted apart, reported as an internal error rather than a panic.
pub fn build_ast(tree: &ParseNode, diags: &mut Diagnostics) -> Result<Ast, CellError> {
    if tree.rule != RuleId::StartSymbol {
        return Err(internal(tree, "start symbol expected"));
    }
    let unit = tree.children.first().ok_or_else(|| internal(tree, "empty start symbol"))?;
    let statements = unit
        .children
        .iter()
        .map(|s| build_node(s, diags))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Ast::new(AstKind::Program(statements), &tree.pos))
}

fn build_node(node: &ParseNode, diags: &mut Diagnostics) -> Result<Ast, CellError> {
    let pos = &node.pos;
    match node.rule {
        // ------------------------------------------------------- statements
        RuleId::Block => {
            let statements = node
                .children
                .iter()
                .map(|s| build_node(s, diags))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Ast::new(AstKind::Block(statements), pos))
        }
        RuleId::EmptyStatement => Ok(Ast::new(AstKind::Empty, pos)),
        RuleId::QuitStatement => Ok(Ast::new(AstKind::Quit, pos)),
        RuleId::ExpressionStatement => {
            let expression = node.children.first().ok_or_else(|| internal(node, "no expression"))?;
            Ok(Ast::new(AstKind::ExprStmt(Box::new(build_node(expression, diags)?)), pos))
        }
        RuleId::VariableDeclaration => build_declaration(node, diags),
        RuleId::IfStatement => {
            let mut children = node.children.iter();
            let cond = children.next().ok_or_else(|| internal(node, "no condition"))?;
            let then_body = children.next().ok_or_else(|| internal(node, "no body"))?;
            let else_body = match children.next() {
                Some(e) if e.rule == RuleId::ElseStatement => {
                    let body = e.children.first().ok_or_else(|| internal(e, "no else body"))?;
                    Some(Box::new(build_node(body, diags)?))
                }
                Some(other) => return Err(internal(other, "else expected")),
                None => None,
            };
            Ok(Ast::new(
                AstKind::If {
                    cond: Box::new(build_node(cond, diags)?),
                    then_body: Box::new(build_node(then_body, diags)?),
                    else_body,
                },
                pos,
            ))
        }
        RuleId::WhileStatement => {
            let mut children = node.children.iter();
            let cond = children.next().ok_or_else(|| internal(node, "no condition"))?;
            let body = children.next().ok_or_else(|| internal(node, "no body"))?;
            Ok(Ast::new(
                AstKind::While {
                    cond: Box::new(build_node(cond, diags)?),
                    body: Box::new(build_node(body, diags)?),
                },
                pos,
            ))
        }

        // ------------------------------------------------------------ terminals
        RuleId::IntegerLiteralHex | RuleId::IntegerLiteralOct | RuleId::IntegerLiteralDec => {
            let (value, radix) = integer_literal_value(node, diags);
            Ok(Ast::new(AstKind::IntLit { value, radix }, pos))
        }
        RuleId::RealLiteral => {
            let value = real_literal_value(node, diags);
            Ok(Ast::new(AstKind::RealLit { value }, pos))
        }
        RuleId::BooleanLiteral => {
            // no boolean type in the language: true/false are ints
            let value = (node.text == "true") as i32;
            Ok(Ast::new(AstKind::IntLit { value, radix: 10 }, pos))
        }
        RuleId::QualifiedIdentifier | RuleId::Identifier => {
            Ok(Ast::new(AstKind::Ident(node.text.clone()), pos))
        }
        RuleId::SystemIdentifier => {
            let canonical = node.text.strip_prefix('#').unwrap_or(&node.text);
            Ok(Ast::new(AstKind::SystemIdent(canonical.to_string()), pos))
        }

        // ---------------------------------------------------------- expressions
        RuleId::ParenthesizedExpression => {
            let inner = node.children.first().ok_or_else(|| internal(node, "no expression"))?;
            build_node(inner, diags)
        }
        RuleId::UnaryExpression => {
            let operand = node.children.first().ok_or_else(|| internal(node, "no operand"))?;
            Ok(Ast::new(
                AstKind::Unary {
                    op: Op::from_text(&node.text),
                    operand: Box::new(build_node(operand, diags)?),
                },
                pos,
            ))
        }
        RuleId::PostfixExpression => {
            let operand = node.children.first().ok_or_else(|| internal(node, "no operand"))?;
            Ok(Ast::new(
                AstKind::Postfix {
                    op: Op::from_text(&node.text),
                    operand: Box::new(build_node(operand, diags)?),
                },
                pos,
            ))
        }
        RuleId::MultiplicativeExpression
        | RuleId::AdditiveExpression
        | RuleId::ShiftExpression
        | RuleId::RelationalExpression
        | RuleId::EqualityExpression
        | RuleId::AndExpression
        | RuleId::ExclusiveOrExpression
        | RuleId::InclusiveOrExpression
        | RuleId::ConditionalAndExpression
        | RuleId::ConditionalOrExpression => {
            let [lhs, rhs] = node.children.as_slice() else {
                return Err(internal(node, "two operands expected"));
            };
            Ok(Ast::new(
                AstKind::Binary {
                    op: Op::from_text(&node.text),
                    lhs: Box::new(build_node(lhs, diags)?),
                    rhs: Box::new(build_node(rhs, diags)?),
                },
                pos,
            ))
        }
        RuleId::ConditionalExpression => {
            let [cond, then_value, else_value] = node.children.as_slice() else {
                return Err(internal(node, "three operands expected"));
            };
            Ok(Ast::new(
                AstKind::Conditional {
                    cond: Box::new(build_node(cond, diags)?),
                    then_value: Box::new(build_node(then_value, diags)?),
                    else_value: Box::new(build_node(else_value, diags)?),
                },
                pos,
            ))
        }
        RuleId::Assignment => {
            let [target, value] = node.children.as_slice() else {
                return Err(internal(node, "two operands expected"));
            };
            Ok(Ast::new(
                AstKind::Assign {
                    op: Op::from_text(&node.text),
                    target: Box::new(build_node(target, diags)?),
                    value: Box::new(build_node(value, diags)?),
                },
                pos,
            ))
        }
        RuleId::PrimaryExpression => {
            // fold the accessor chain into nested member/element nodes
            let mut children = node.children.iter();
            let base = children.next().ok_or_else(|| internal(node, "no base"))?;
            let mut expression = build_node(base, diags)?;
            for accessor in children {
                expression = match accessor.rule {
                    RuleId::MemberAccess => {
                        let member = accessor
                            .children
                            .first()
                            .ok_or_else(|| internal(accessor, "no member name"))?;
                        Ast::new(
                            AstKind::Member {
                                base: Box::new(expression),
                                member: member.text.clone(),
                            },
                            &accessor.pos,
                        )
                    }
                    RuleId::ElementAccess => {
                        let index = accessor
                            .children
                            .first()
                            .ok_or_else(|| internal(accessor, "no index"))?;
                        Ast::new(
                            AstKind::Element {
                                base: Box::new(expression),
                                index: Box::new(build_node(index, diags)?),
                            },
                            &accessor.pos,
                        )
                    }
                    _ => return Err(internal(accessor, "accessor expected")),
                };
            }
            Ok(expression)
        }
        RuleId::Invocation => {
            let [callee, arguments] = node.children.as_slice() else {
                return Err(internal(node, "callee and arguments expected"));
            };
            let args = arguments
                .children
                .iter()
                .map(|a| build_node(a, diags))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Ast::new(AstKind::Invoke { callee: callee.text.clone(), args }, pos))
        }
        RuleId::ObjectCreationExpression => {
            let [ty, arguments] = node.children.as_slice() else {
                return Err(internal(node, "type and arguments expected"));
            };
            let ty = TypeSpec::from_keyword(&ty.text)
                .ok_or_else(|| internal(node, "type specifier expected"))?;
            let args = arguments
                .children
                .iter()
                .map(|a| build_node(a, diags))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Ast::new(AstKind::MakeObject { ty, args }, pos))
        }
        RuleId::ArrayCreationExpression => {
            let [ty, spec, arguments] = node.children.as_slice() else {
                return Err(internal(node, "type, size and arguments expected"));
            };
            let ty = TypeSpec::from_keyword(&ty.text)
                .ok_or_else(|| internal(node, "type specifier expected"))?;
            let len_node =
                spec.children.first().ok_or_else(|| internal(spec, "no element count"))?;
            let (len, _) = integer_literal_value(len_node, diags);
            let args = arguments
                .children
                .iter()
                .map(|a| build_node(a, diags))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Ast::new(AstKind::MakeArray { ty, len, args }, pos))
        }

        // anything else only occurs nested inside the rules above
        _ => Err(internal(node, "unmatched rule")),
    }
}

fn build_declaration(node: &ParseNode, diags: &mut Diagnostics) -> Result<Ast, CellError> {
    let mut global = false;
    let mut ty = None;
    let mut array_len = None;
    let mut name = None;

    for child in &node.children {
        match child.rule {
            RuleId::TypeModifier => global = true,
            RuleId::TypeSpecifier => {
                ty = Some(
                    TypeSpec::from_keyword(&child.text)
                        .ok_or_else(|| internal(child, "type specifier expected"))?,
                );
            }
            RuleId::ArraySpecifier => {
                let len_node =
                    child.children.first().ok_or_else(|| internal(child, "no element count"))?;
                let (len, _) = integer_literal_value(len_node, diags);
                array_len = Some(len);
            }
            RuleId::VariableDeclarator => name = Some(child.text.clone()),
            _ => return Err(internal(child, "unexpected declaration part")),
        }
    }

    let ty = ty.ok_or_else(|| internal(node, "no type specifier"))?;
    let name = name.ok_or_else(|| internal(node, "no declarator"))?;
    Ok(Ast::new(AstKind::VarDecl { global, ty, array_len, name }, &node.pos))
}

/// Parse an integer literal with the radix encoded by its rule, clamping on
/// overflow with a diagnostic.
fn integer_literal_value(node: &ParseNode, diags: &mut Diagnostics) -> (i32, u32) {
    let (digits, radix) = match node.rule {
        RuleId::IntegerLiteralHex => (&node.text[2..], 16),
        RuleId::IntegerLiteralOct => (&node.text[1..], 8),
        _ => (node.text.as_str(), 10),
    };
    match i64::from_str_radix(digits, radix) {
        Ok(value) if value <= i32::MAX as i64 => (value as i32, radix),
        _ => {
            diags.report(&node.pos, "integer constant overflow");
            (i32::MAX, radix)
        }
    }
}

/// Parse a real literal, narrowing to `f32`; overflow becomes infinity.
fn real_literal_value(node: &ParseNode, diags: &mut Diagnostics) -> f32 {
    let text = node.text.trim_end_matches(['f', 'F']);
    let value = text.parse::<f64>().unwrap_or(f64::INFINITY) as f32;
    if !value.is_finite() {
        diags.report(&node.pos, "real constant overflow");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn build(source: &str) -> (Ast, Diagnostics) {
        let mut diags = Diagnostics::new();
        let tree = {
            let mut parser = Parser::new(source, "test.cell", &mut diags).unwrap();
            parser.parse().unwrap()
        };
        assert!(!diags.has_syntax_errors(), "unexpected syntax errors");
        let ast = build_ast(&tree, &mut diags).unwrap();
        (ast, diags)
    }

    fn statements(ast: &Ast) -> &[Ast] {
        match &ast.kind {
            AstKind::Program(s) => s,
            other => panic!("program expected, got {:?}", other),
        }
    }

    fn first_expression(ast: &Ast) -> &Ast {
        match &statements(ast)[0].kind {
            AstKind::ExprStmt(e) => e,
            other => panic!("expression statement expected, got {:?}", other),
        }
    }

    #[test]
    fn test_integer_literal_radixes() {
        let (ast, _) = build("x = 123; x = 0xFF; x = 0755;");
        let values: Vec<(i32, u32)> = statements(&ast)
            .iter()
            .map(|s| match &s.kind {
                AstKind::ExprStmt(e) => match &e.kind {
                    AstKind::Assign { value, .. } => match value.kind {
                        AstKind::IntLit { value, radix } => (value, radix),
                        ref other => panic!("int literal expected, got {:?}", other),
                    },
                    other => panic!("assignment expected, got {:?}", other),
                },
                other => panic!("statement expected, got {:?}", other),
            })
            .collect();
        assert_eq!(values, vec![(123, 10), (255, 16), (493, 8)]);
    }

    #[test]
    fn test_real_literal_with_exponent_and_suffix() {
        let (ast, _) = build("r = 1.5e2f;");
        match &first_expression(&ast).kind {
            AstKind::Assign { value, .. } => match value.kind {
                AstKind::RealLit { value } => assert_eq!(value, 150.0),
                ref other => panic!("real literal expected, got {:?}", other),
            },
            other => panic!("assignment expected, got {:?}", other),
        }
    }

    #[test]
    fn test_integer_overflow_clamps_and_reports() {
        let (ast, diags) = build("x = 99999999999;");
        match &first_expression(&ast).kind {
            AstKind::Assign { value, .. } => match value.kind {
                AstKind::IntLit { value, .. } => assert_eq!(value, i32::MAX),
                ref other => panic!("int literal expected, got {:?}", other),
            },
            other => panic!("assignment expected, got {:?}", other),
        }
        assert!(diags.messages().iter().any(|m| m.contains("integer constant overflow")));
        assert!(!diags.has_syntax_errors());
    }

    #[test]
    fn test_real_overflow_becomes_infinity() {
        let (ast, diags) = build("r = 1e999;");
        match &first_expression(&ast).kind {
            AstKind::Assign { value, .. } => match value.kind {
                AstKind::RealLit { value } => assert!(value.is_infinite()),
                ref other => panic!("real literal expected, got {:?}", other),
            },
            other => panic!("assignment expected, got {:?}", other),
        }
        assert!(diags.messages().iter().any(|m| m.contains("real constant overflow")));
    }

    #[test]
    fn test_boolean_literals_lower_to_ints() {
        let (ast, _) = build("x = true; y = false;");
        for (statement, expected) in statements(&ast).iter().zip([1, 0]) {
            match &statement.kind {
                AstKind::ExprStmt(e) => match &e.kind {
                    AstKind::Assign { value, .. } => match value.kind {
                        AstKind::IntLit { value, .. } => assert_eq!(value, expected),
                        ref other => panic!("int literal expected, got {:?}", other),
                    },
                    other => panic!("assignment expected, got {:?}", other),
                },
                other => panic!("statement expected, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_system_identifier_is_canonicalized() {
        let (ast, _) = build("#Force = v;");
        match &first_expression(&ast).kind {
            AstKind::Assign { target, .. } => match &target.kind {
                AstKind::SystemIdent(name) => assert_eq!(name, "Force"),
                other => panic!("system identifier expected, got {:?}", other),
            },
            other => panic!("assignment expected, got {:?}", other),
        }
    }

    #[test]
    fn test_accessor_chain_folds_into_nested_nodes() {
        let (ast, _) = build("r = #Position[i].x;");
        match &first_expression(&ast).kind {
            AstKind::Assign { value, .. } => match &value.kind {
                AstKind::Member { base, member } => {
                    assert_eq!(member, "x");
                    match &base.kind {
                        AstKind::Element { base, .. } => match &base.kind {
                            AstKind::SystemIdent(name) => assert_eq!(name, "Position"),
                            other => panic!("system identifier expected, got {:?}", other),
                        },
                        other => panic!("element access expected, got {:?}", other),
                    }
                }
                other => panic!("member access expected, got {:?}", other),
            },
            other => panic!("assignment expected, got {:?}", other),
        }
    }

    #[test]
    fn test_declaration_with_array_specifier() {
        let (ast, _) = build("global int[16] seen;");
        match &statements(&ast)[0].kind {
            AstKind::VarDecl { global, ty, array_len, name } => {
                assert!(*global);
                assert_eq!(*ty, TypeSpec::Int);
                assert_eq!(*array_len, Some(16));
                assert_eq!(name, "seen");
            }
            other => panic!("declaration expected, got {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment_operator_mapping() {
        let (ast, _) = build("x <<= 2;");
        match &first_expression(&ast).kind {
            AstKind::Assign { op, .. } => {
                assert_eq!(*op, Op::ShlAssign);
                assert_eq!(op.compound_base(), Some(Op::Shl));
            }
            other => panic!("assignment expected, got {:?}", other),
        }
    }
}
