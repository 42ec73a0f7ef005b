// C-minus Recursive Descent Parser
//
// Drives the code generator directly: every grammar action fires through
// `CodeGenerator::apply` at its position in the production, left to right.
// No syntax tree is built.

use crate::compiler::actions::Action;
use crate::compiler::codegen::CodeGenerator;
use crate::compiler::error::CompilerError;
use crate::compiler::lexer::{Token, TokenKind};

pub struct Parser<'g> {
    tokens: Vec<Token>,
    current: usize,
    generator: &'g mut CodeGenerator,
}

impl<'g> Parser<'g> {
    pub fn new(mut tokens: Vec<Token>, generator: &'g mut CodeGenerator) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::End) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::end(line));
        }
        Parser {
            tokens,
            current: 0,
            generator,
        }
    }

    /// program → declaration* END
    pub fn parse(&mut self) -> Result<(), CompilerError> {
        let first = self.peek().clone();
        self.act(Action::BeginProgram, &first)?;

        while !self.is_at_end() {
            self.parse_declaration()?;
        }

        let end = self.peek().clone();
        self.act(Action::EndProgram, &end)
    }

    fn parse_declaration(&mut self) -> Result<(), CompilerError> {
        self.parse_type()?;
        let name = self.consume_kind(TokenKind::Id, "identifier")?;
        self.act(Action::PushName, &name)?;

        if self.match_symbol(";") {
            self.act(Action::DeclareVariable, &name)
        } else if self.check_symbol("[") {
            self.parse_array_size(&name)
        } else if self.match_symbol("(") {
            self.act(Action::DeclareFunction, &name)?;
            self.parse_params()?;
            self.consume_symbol(")")?;
            self.act(Action::BeginFunction, &name)?;
            self.parse_compound()?;
            let close = self.previous().clone();
            self.act(Action::EndFunction, &close)
        } else {
            Err(self.unexpected("';', '[' or '('"))
        }
    }

    /// `[ NUM ] ;` after a declared name
    fn parse_array_size(&mut self, name: &Token) -> Result<(), CompilerError> {
        self.consume_symbol("[")?;
        let size = self.consume_kind(TokenKind::Num, "array size")?;
        self.act(Action::PushNumber, &size)?;
        self.consume_symbol("]")?;
        self.consume_symbol(";")?;
        self.act(Action::DeclareArray, name)
    }

    fn parse_type(&mut self) -> Result<(), CompilerError> {
        let token = self.peek().clone();
        if token.is_keyword("int") || token.is_keyword("void") {
            self.act(Action::PushType, &token)?;
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected("type specifier"))
        }
    }

    fn is_type_keyword(&self) -> bool {
        let token = self.peek();
        token.is_keyword("int") || token.is_keyword("void")
    }

    fn parse_params(&mut self) -> Result<(), CompilerError> {
        // `(void)` declares no parameters
        if self.peek().is_keyword("void") && self.peek_next().is_some_and(|t| t.is_symbol(")")) {
            self.advance();
            return Ok(());
        }
        loop {
            self.parse_param()?;
            if !self.match_symbol(",") {
                return Ok(());
            }
        }
    }

    fn parse_param(&mut self) -> Result<(), CompilerError> {
        self.parse_type()?;
        let name = self.consume_kind(TokenKind::Id, "parameter name")?;
        self.act(Action::PushName, &name)?;
        if self.match_symbol("[") {
            self.consume_symbol("]")?;
            self.act(Action::AddArrayParameter, &name)
        } else {
            self.act(Action::AddParameter, &name)
        }
    }

    fn parse_compound(&mut self) -> Result<(), CompilerError> {
        let open = self.consume_symbol("{")?;
        self.act(Action::ScopeUp, &open)?;

        while self.is_type_keyword() {
            self.parse_local_declaration()?;
        }
        while !self.check_symbol("}") {
            if self.is_at_end() {
                return Err(self.unexpected("'}'"));
            }
            self.parse_statement()?;
        }

        let close = self.consume_symbol("}")?;
        self.act(Action::ScopeDown, &close)
    }

    fn parse_local_declaration(&mut self) -> Result<(), CompilerError> {
        self.parse_type()?;
        let name = self.consume_kind(TokenKind::Id, "identifier")?;
        self.act(Action::PushName, &name)?;
        if self.match_symbol(";") {
            self.act(Action::DeclareVariable, &name)
        } else if self.check_symbol("[") {
            self.parse_array_size(&name)
        } else {
            Err(self.unexpected("';' or '['"))
        }
    }

    fn parse_statement(&mut self) -> Result<(), CompilerError> {
        let token = self.peek().clone();
        if token.is_symbol(";") {
            self.advance();
            Ok(())
        } else if token.is_symbol("{") {
            self.parse_compound()
        } else if token.is_keyword("break") {
            self.advance();
            self.consume_symbol(";")?;
            self.act(Action::RegisterBreak, &token)
        } else if token.is_keyword("if") {
            self.parse_if_stmt()
        } else if token.is_keyword("repeat") {
            self.parse_repeat_stmt()
        } else if token.is_keyword("return") {
            self.parse_return_stmt()
        } else {
            self.parse_expression()?;
            let semi = self.consume_symbol(";")?;
            self.act(Action::PopExpression, &semi)
        }
    }

    fn parse_if_stmt(&mut self) -> Result<(), CompilerError> {
        self.advance();
        self.consume_symbol("(")?;
        self.parse_expression()?;
        let close = self.consume_symbol(")")?;
        self.act(Action::ReserveJumpSlot, &close)?;
        self.parse_statement()?;

        if self.peek().is_keyword("else") {
            let else_token = self.advance().clone();
            self.act(Action::EmitCondJumpAndReserveNext, &else_token)?;
            self.parse_statement()?;
            let here = self.peek().clone();
            self.act(Action::PatchJumpToHere, &here)
        } else {
            let here = self.peek().clone();
            self.act(Action::PatchCondJumpToHere, &here)
        }
    }

    /// repeat statement until ( expression )
    fn parse_repeat_stmt(&mut self) -> Result<(), CompilerError> {
        let repeat = self.advance().clone();
        self.act(Action::PushBreakScope, &repeat)?;
        self.act(Action::LabelHere, &repeat)?;
        self.parse_statement()?;

        if !self.peek().is_keyword("until") {
            return Err(self.unexpected("'until'"));
        }
        self.advance();
        self.consume_symbol("(")?;
        self.parse_expression()?;
        let close = self.consume_symbol(")")?;
        self.act(Action::JumpBackIfFalse, &close)?;
        self.act(Action::CloseBreakScope, &close)
    }

    fn parse_return_stmt(&mut self) -> Result<(), CompilerError> {
        let ret = self.advance().clone();
        if !self.match_symbol(";") {
            self.parse_expression()?;
            self.act(Action::StoreReturnValue, &ret)?;
            self.consume_symbol(";")?;
        }
        self.act(Action::MarkReturn, &ret)
    }

    /// expression → simple ( '=' expression )?
    fn parse_expression(&mut self) -> Result<(), CompilerError> {
        let is_lvalue = self.parse_simple_expression()?;
        if self.check_symbol("=") {
            if !is_lvalue {
                return Err(self.unexpected("an assignable expression before '='"));
            }
            let eq = self.advance().clone();
            self.parse_expression()?;
            self.act(Action::Assign, &eq)?;
        }
        Ok(())
    }

    /// Returns whether the parsed expression is a bare variable or element
    fn parse_simple_expression(&mut self) -> Result<bool, CompilerError> {
        let mut is_lvalue = self.parse_additive()?;
        if self.check_symbol("<") || self.check_symbol("==") {
            self.parse_operator_and(Self::parse_additive)?;
            is_lvalue = false;
        }
        Ok(is_lvalue)
    }

    fn parse_additive(&mut self) -> Result<bool, CompilerError> {
        let mut is_lvalue = self.parse_term()?;
        while self.check_symbol("+") || self.check_symbol("-") {
            self.parse_operator_and(Self::parse_term)?;
            is_lvalue = false;
        }
        Ok(is_lvalue)
    }

    fn parse_term(&mut self) -> Result<bool, CompilerError> {
        let mut is_lvalue = self.parse_factor()?;
        while self.check_symbol("*") {
            self.parse_operator_and(Self::parse_factor)?;
            is_lvalue = false;
        }
        Ok(is_lvalue)
    }

    /// Operator token, right operand, then the binary operation itself
    fn parse_operator_and(
        &mut self,
        operand: fn(&mut Self) -> Result<bool, CompilerError>,
    ) -> Result<(), CompilerError> {
        let op = self.advance().clone();
        self.act(Action::PushOperator, &op)?;
        operand(self)?;
        self.act(Action::ComputeBinary, &op)
    }

    fn parse_factor(&mut self) -> Result<bool, CompilerError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Symbol if token.lexeme == "(" => {
                self.advance();
                self.parse_expression()?;
                self.consume_symbol(")")?;
                Ok(false)
            }
            TokenKind::Num => {
                self.act(Action::PushNumber, &token)?;
                self.advance();
                Ok(false)
            }
            TokenKind::Id => {
                self.act(Action::PushIdentifier, &token)?;
                self.advance();
                if self.match_symbol("[") {
                    self.parse_expression()?;
                    self.consume_symbol("]")?;
                    self.act(Action::IndexArray, &token)?;
                    Ok(true)
                } else if self.check_symbol("(") {
                    let open = self.advance().clone();
                    self.act(Action::PushArgCount, &open)?;
                    self.parse_args()?;
                    self.consume_symbol(")")?;
                    self.act(Action::Call, &token)?;
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_args(&mut self) -> Result<(), CompilerError> {
        if self.check_symbol(")") {
            return Ok(());
        }
        loop {
            self.parse_expression()?;
            let here = self.peek().clone();
            self.act(Action::IncrementArgCount, &here)?;
            if !self.match_symbol(",") {
                return Ok(());
            }
        }
    }

    // Helper methods

    fn act(&mut self, action: Action, token: &Token) -> Result<(), CompilerError> {
        self.generator.apply(action, token)
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::End
    }

    fn peek(&self) -> &Token {
        // `new` guarantees a trailing END token
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check_symbol(&self, symbol: &str) -> bool {
        self.peek().is_symbol(symbol)
    }

    fn match_symbol(&mut self, symbol: &str) -> bool {
        if self.check_symbol(symbol) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_symbol(&mut self, symbol: &str) -> Result<Token, CompilerError> {
        if self.check_symbol(symbol) {
            Ok(self.advance().clone())
        } else {
            Err(self.unexpected(&format!("'{}'", symbol)))
        }
    }

    fn consume_kind(&mut self, kind: TokenKind, what: &str) -> Result<Token, CompilerError> {
        if self.peek().kind == kind {
            Ok(self.advance().clone())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> CompilerError {
        let token = self.peek();
        let found = if token.kind == TokenKind::End {
            "end of input".to_string()
        } else {
            format!("'{}'", token.lexeme)
        };
        CompilerError::SyntaxError(format!("expected {}, found {}", expected, found), token.line)
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
