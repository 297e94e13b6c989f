//! Grammar rule identifiers
//!
//! Every parse-tree node is tagged with the production that matched it. The
//! enumeration is closed: the AST builder dispatches on it and treats any
//! unhandled value as compiler drift.

/// Identifier of a grammar production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    // Terminals
    Identifier,
    SystemIdentifier,
    IntegerLiteralHex,
    IntegerLiteralOct,
    IntegerLiteralDec,
    RealLiteral,
    BooleanLiteral,
    TypeSpecifier,
    TypeModifier,

    // Basic concepts
    StartSymbol,
    TranslationUnit,

    // Expressions
    ArgumentList,
    PrimaryExpression,
    ParenthesizedExpression,
    MemberAccess,
    Invocation,
    ElementAccess,
    ObjectCreationExpression,
    ArrayCreationExpression,
    PostfixExpression,
    UnaryExpression,
    MultiplicativeExpression,
    AdditiveExpression,
    ShiftExpression,
    RelationalExpression,
    EqualityExpression,
    AndExpression,
    ExclusiveOrExpression,
    InclusiveOrExpression,
    ConditionalAndExpression,
    ConditionalOrExpression,
    ConditionalExpression,
    Assignment,

    // Statements
    Block,
    EmptyStatement,
    VariableDeclaration,
    VariableDeclarator,
    ExpressionStatement,
    IfStatement,
    ElseStatement,
    WhileStatement,
    QuitStatement,
    QualifiedIdentifier,
    ArraySpecifier,
}

impl RuleId {
    /// Production name, as used in dumps and internal-error messages.
    pub fn name(self) -> &'static str {
        match self {
            RuleId::Identifier => "IDENTIFIER",
            RuleId::SystemIdentifier => "SYSTEM_IDENTIFIER",
            RuleId::IntegerLiteralHex => "INTEGER_LITERAL_HEX",
            RuleId::IntegerLiteralOct => "INTEGER_LITERAL_OCT",
            RuleId::IntegerLiteralDec => "INTEGER_LITERAL_DEC",
            RuleId::RealLiteral => "REAL_LITERAL",
            RuleId::BooleanLiteral => "BOOLEAN_LITERAL",
            RuleId::TypeSpecifier => "type_specifier",
            RuleId::TypeModifier => "type_modifier",
            RuleId::StartSymbol => "start_symbol",
            RuleId::TranslationUnit => "translation_unit",
            RuleId::ArgumentList => "argument_list",
            RuleId::PrimaryExpression => "primary_expression",
            RuleId::ParenthesizedExpression => "parenthesized_expression",
            RuleId::MemberAccess => "member_access",
            RuleId::Invocation => "invocation",
            RuleId::ElementAccess => "element_access",
            RuleId::ObjectCreationExpression => "object_creation_expression",
            RuleId::ArrayCreationExpression => "array_creation_expression",
            RuleId::PostfixExpression => "postfix_expression",
            RuleId::UnaryExpression => "unary_expression",
            RuleId::MultiplicativeExpression => "multiplicative_expression",
            RuleId::AdditiveExpression => "additive_expression",
            RuleId::ShiftExpression => "shift_expression",
            RuleId::RelationalExpression => "relational_expression",
            RuleId::EqualityExpression => "equality_expression",
            RuleId::AndExpression => "and_expression",
            RuleId::ExclusiveOrExpression => "exclusive_or_expression",
            RuleId::InclusiveOrExpression => "inclusive_or_expression",
            RuleId::ConditionalAndExpression => "conditional_and_expression",
            RuleId::ConditionalOrExpression => "conditional_or_expression",
            RuleId::ConditionalExpression => "conditional_expression",
            RuleId::Assignment => "assignment",
            RuleId::Block => "block",
            RuleId::EmptyStatement => "empty_statement",
            RuleId::VariableDeclaration => "variable_declaration",
            RuleId::VariableDeclarator => "variable_declarator",
            RuleId::ExpressionStatement => "expression_statement",
            RuleId::IfStatement => "if_statement",
            RuleId::ElseStatement => "else_statement",
            RuleId::WhileStatement => "while_statement",
            RuleId::QuitStatement => "quit_statement",
            RuleId::QualifiedIdentifier => "qualified_identifier",
            RuleId::ArraySpecifier => "array_specifier",
        }
    }
}
