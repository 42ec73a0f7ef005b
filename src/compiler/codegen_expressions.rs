// Expression actions: operands, arithmetic/relational operators, assignment
// and array indexing

use crate::compiler::codegen::{BinaryOp, CodeGenerator, SemanticValue};
use crate::compiler::config::WORD_SIZE;
use crate::compiler::error::CompilerError;
use crate::compiler::instruction::{Instruction, Operand};
use crate::compiler::lexer::Token;
use crate::compiler::semantic::Symbol;

impl CodeGenerator {
    pub(crate) fn push_identifier(&mut self, token: &Token) -> Result<(), CompilerError> {
        let symbol = match self.symbols.resolve(&token.lexeme) {
            Ok(symbol) => symbol,
            Err(err) => {
                self.record_symbol_error(err, token.line)?;
                Symbol::placeholder(&token.lexeme)
            }
        };
        self.push(SemanticValue::Symbol(symbol));
        Ok(())
    }

    pub(crate) fn push_number(&mut self, token: &Token) -> Result<(), CompilerError> {
        let value = match token.lexeme.parse::<i32>() {
            Ok(value) => value,
            Err(_) => {
                self.record_error(
                    token.line,
                    format!("Integer literal '{}' is out of range.", token.lexeme),
                );
                0
            }
        };
        self.push(SemanticValue::Literal(value));
        Ok(())
    }

    pub(crate) fn push_operator(&mut self, token: &Token) -> Result<(), CompilerError> {
        let op = BinaryOp::from_lexeme(&token.lexeme).ok_or_else(|| {
            CompilerError::internal(format!("'{}' is not a binary operator", token.lexeme))
        })?;
        self.push(SemanticValue::Operator(op));
        Ok(())
    }

    /// An operand is usable as an int if it is a scalar (or a stand-in for a
    /// value whose error is already on record)
    fn is_int_operand(symbol: &Symbol) -> bool {
        symbol.is_placeholder || (!symbol.is_function && symbol.symbol_type.is_scalar())
    }

    /// Report the first operand that is not an int. Returns false if one was found.
    pub(crate) fn check_int_operands(&mut self, operands: &[&Symbol], line: usize) -> bool {
        match operands.iter().find(|s| !Self::is_int_operand(s)) {
            Some(bad) => {
                let found = bad.describe();
                self.record_error(
                    line,
                    format!("Type mismatch in operands, Got {} instead of int.", found),
                );
                false
            }
            None => true,
        }
    }

    pub(crate) fn compute_binary(&mut self, token: &Token) -> Result<(), CompilerError> {
        let rhs = self.pop_symbol()?;
        let op = self.pop_operator()?;
        let lhs = self.pop_symbol()?;

        if !self.check_int_operands(&[&lhs, &rhs], token.line) {
            self.push(SemanticValue::Symbol(Symbol::placeholder("")));
            return Ok(());
        }

        let result = self.symbols.new_temporary(false)?;
        let a = self.checked_operand(&lhs)?;
        let b = self.checked_operand(&rhs)?;
        let dst = self.checked_operand(&result)?;
        self.store.emit(op.instruction(a, b, dst));
        self.push(SemanticValue::Symbol(result));
        Ok(())
    }

    /// `dst = src`; the assigned value is the expression's value
    pub(crate) fn assign(&mut self, token: &Token) -> Result<(), CompilerError> {
        let src = self.pop_symbol()?;
        let dst = self.pop_symbol()?;

        if !self.check_int_operands(&[&dst, &src], token.line) {
            self.push(SemanticValue::Symbol(Symbol::placeholder("")));
            return Ok(());
        }

        let value = self.checked_operand(&src)?;
        let target = self.checked_operand(&dst)?;
        self.store.emit(Instruction::assign(value, target));
        self.push(SemanticValue::Symbol(src));
        Ok(())
    }

    /// Compute the address of `array[index]` into a fresh indexed temporary:
    /// `t = index * 4; t = t + base`, where the base is a constant for global
    /// arrays, `CF + offset` for local arrays and the pointer cell's content
    /// for by-reference parameters.
    pub(crate) fn index_array(&mut self, token: &Token) -> Result<(), CompilerError> {
        let index = self.pop_symbol()?;
        let array = self.pop_symbol()?;

        if array.is_placeholder {
            self.push(SemanticValue::Symbol(Symbol::placeholder(&array.name)));
            return Ok(());
        }
        if array.is_function || !array.symbol_type.is_reference() {
            self.record_error(token.line, format!("'{}' is not an array.", array.name));
            self.push(SemanticValue::Symbol(Symbol::placeholder(&array.name)));
            return Ok(());
        }
        if !self.check_int_operands(&[&index], token.line) {
            self.push(SemanticValue::Symbol(Symbol::placeholder(&array.name)));
            return Ok(());
        }

        let element = self.symbols.new_temporary(true)?;
        let offset = self.checked_operand(&index)?;
        // The element's cell itself, not the value it points to
        let cell = self.cell_operand(&element)?;
        self.store.emit(Instruction::mul(
            offset,
            Operand::Immediate(WORD_SIZE as i32),
            cell,
        ));
        let base = self
            .resolve_reference(&array)?
            .map(|r| r.operand)
            .ok_or_else(|| CompilerError::internal("array base did not resolve"))?;
        self.store.emit(Instruction::add(cell, base, cell));
        self.push(SemanticValue::Symbol(element));
        Ok(())
    }
}
