// C-minus Code Generator
//
// One-pass semantic analysis and three-address code generation. The parser
// calls `apply` once per grammar action; each action pops and pushes values on
// the semantic stack, consults the symbol table and emits instructions.
//
// Action methods live in several files:
// - codegen.rs: state, dispatch, declarations, program start/end, output
// - codegen_expressions.rs: operands, arithmetic, assignment, indexing
// - codegen_branch.rs: if/else, repeat-until, break
// - codegen_calls.rs: prologue/epilogue, return, call sites
// - codegen_resolve.rs: mapping symbols to machine operands

use crate::compiler::actions::Action;
use crate::compiler::activation::RA_OFFSET;
use crate::compiler::codegen_emit::{InstructionStore, Placeholder};
use crate::compiler::codegen_resolve::ScratchPool;
use crate::compiler::config::CompilerConfig;
use crate::compiler::error::{CompilerError, SemanticError};
use crate::compiler::instruction::{render_listing, Instruction, Operand};
use crate::compiler::lexer::Token;
use crate::compiler::semantic::{Symbol, SymbolError, SymbolTable, SymbolType};
use std::fmt;

pub const NO_CODE_MESSAGE: &str = "The output code has not been generated.";
pub const SEMANTICALLY_CORRECT_MESSAGE: &str = "The input program is semantically correct.";

/// Binary operators understood by `compute_binary`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Lt,
    Eq,
}

impl BinaryOp {
    pub fn from_lexeme(lexeme: &str) -> Option<Self> {
        match lexeme {
            "+" => Some(BinaryOp::Add),
            "-" => Some(BinaryOp::Sub),
            "*" => Some(BinaryOp::Mul),
            "<" => Some(BinaryOp::Lt),
            "==" => Some(BinaryOp::Eq),
            _ => None,
        }
    }

    pub fn instruction(self, a: Operand, b: Operand, dst: Operand) -> Instruction {
        match self {
            BinaryOp::Add => Instruction::add(a, b, dst),
            BinaryOp::Sub => Instruction::sub(a, b, dst),
            BinaryOp::Mul => Instruction::mul(a, b, dst),
            BinaryOp::Lt => Instruction::lt(a, b, dst),
            BinaryOp::Eq => Instruction::eq(a, b, dst),
        }
    }
}

/// Element of the semantic stack
#[derive(Debug, PartialEq)]
pub enum SemanticValue {
    TypeName(SymbolType),
    Name(String),
    Symbol(Symbol),
    Operator(BinaryOp),
    /// Program counter captured by `label_here`
    Label(usize),
    /// Slot reserved for an unconditional jump
    Slot(Placeholder),
    /// Slot reserved for a conditional jump whose condition is already
    /// materialized in the instructions right before it
    Branch { slot: Placeholder, cond: Operand },
    Literal(i32),
}

impl SemanticValue {
    fn kind(&self) -> &'static str {
        match self {
            SemanticValue::TypeName(_) => "type",
            SemanticValue::Name(_) => "name",
            SemanticValue::Symbol(_) => "symbol",
            SemanticValue::Operator(_) => "operator",
            SemanticValue::Label(_) => "label",
            SemanticValue::Slot(_) => "slot",
            SemanticValue::Branch { .. } => "branch",
            SemanticValue::Literal(_) => "literal",
        }
    }
}

/// Layout summary of a compiled function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSummary {
    pub name: String,
    pub entry: usize,
    pub params: Vec<SymbolType>,
    pub frame_size: u32,
    pub len: u32,
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "{:<16} entry {:>4}  ({})  frame {} bytes, record {} bytes",
            self.name,
            self.entry,
            params.join(", "),
            self.frame_size,
            self.len
        )
    }
}

/// Per-function bookkeeping while its body is being compiled
#[derive(Debug)]
pub(crate) struct FunctionContext {
    pub(crate) name: String,
    /// "advance SP by the frame size" slot, known only at function end
    pub(crate) prologue_slot: Option<Placeholder>,
    /// Early-return jumps converging on the epilogue
    pub(crate) returns: Vec<Placeholder>,
}

#[derive(Debug)]
pub struct CodeGenerator {
    pub(crate) config: CompilerConfig,
    pub(crate) store: InstructionStore,
    pub(crate) symbols: SymbolTable,
    pub(crate) stack: Vec<SemanticValue>,
    pub(crate) scratch: ScratchPool,
    pub(crate) arg_counts: Vec<usize>,
    pub(crate) break_scopes: Vec<Vec<Placeholder>>,
    pub(crate) function: Option<FunctionContext>,
    start_slot: Option<Placeholder>,
    pub(crate) frames: Vec<FrameSummary>,
    errors: Vec<SemanticError>,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl CodeGenerator {
    pub fn new(config: CompilerConfig) -> Self {
        CodeGenerator {
            store: InstructionStore::new(),
            symbols: SymbolTable::new(config.data_base),
            stack: Vec::new(),
            scratch: ScratchPool::new(&config),
            arg_counts: Vec::new(),
            break_scopes: Vec::new(),
            function: None,
            start_slot: None,
            frames: Vec::new(),
            errors: Vec::new(),
            config,
        }
    }

    /// Run one grammar action. Scratch cells never outlive an action.
    pub fn apply(&mut self, action: Action, token: &Token) -> Result<(), CompilerError> {
        self.scratch.reset();
        log::debug!(
            "ACTION {} on {} (line {}), stack depth {}",
            action,
            token,
            token.line,
            self.stack.len()
        );

        match action {
            Action::BeginProgram => self.begin_program(),
            Action::EndProgram => self.end_program(token),

            Action::PushType => self.push_type(token),
            Action::PushName => {
                self.push(SemanticValue::Name(token.lexeme.clone()));
                Ok(())
            }
            Action::DeclareVariable => self.declare_variable(token),
            Action::DeclareArray => self.declare_array(token),
            Action::DeclareFunction => self.declare_function(token),
            Action::AddParameter => self.add_parameter(token, false),
            Action::AddArrayParameter => self.add_parameter(token, true),
            Action::ScopeUp => self.symbols.scope_up(),
            Action::ScopeDown => self.symbols.scope_down(),

            Action::PushIdentifier => self.push_identifier(token),
            Action::PushNumber => self.push_number(token),
            Action::PushOperator => self.push_operator(token),
            Action::ComputeBinary => self.compute_binary(token),
            Action::Assign => self.assign(token),
            Action::IndexArray => self.index_array(token),
            Action::PopExpression => self.pop().map(|_| ()),

            Action::ReserveJumpSlot => self.reserve_jump_slot(token),
            Action::EmitCondJumpAndReserveNext => self.emit_cond_jump_and_reserve_next(),
            Action::PatchJumpToHere => self.patch_jump_to_here(),
            Action::PatchCondJumpToHere => self.patch_cond_jump_to_here(),
            Action::LabelHere => {
                self.push(SemanticValue::Label(self.store.pc()));
                Ok(())
            }
            Action::JumpBackIfFalse => self.jump_back_if_false(token),

            Action::PushBreakScope => {
                self.break_scopes.push(Vec::new());
                Ok(())
            }
            Action::RegisterBreak => self.register_break(token),
            Action::CloseBreakScope => self.close_break_scope(),

            Action::BeginFunction => self.begin_function(),
            Action::EndFunction => self.end_function(),
            Action::StoreReturnValue => self.store_return_value(token),
            Action::MarkReturn => self.mark_return(),
            Action::PushArgCount => {
                self.arg_counts.push(0);
                Ok(())
            }
            Action::IncrementArgCount => match self.arg_counts.last_mut() {
                Some(count) => {
                    *count += 1;
                    Ok(())
                }
                None => Err(CompilerError::internal(
                    "increment_arg_count without push_arg_count",
                )),
            },
            Action::Call => self.call(token),
        }
    }

    /// Dispatch by grammar-table name; unknown names are fatal.
    pub fn apply_named(&mut self, name: &str, token: &Token) -> Result<(), CompilerError> {
        let action: Action = name.parse()?;
        self.apply(action, token)
    }

    // Semantic stack helpers

    pub(crate) fn push(&mut self, value: SemanticValue) {
        log::trace!("SS push {:?}", value);
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self) -> Result<SemanticValue, CompilerError> {
        self.stack
            .pop()
            .ok_or_else(|| CompilerError::internal("semantic stack underflow"))
    }

    fn unexpected(expected: &str, found: &SemanticValue) -> CompilerError {
        CompilerError::internal(format!(
            "expected {} on the semantic stack, found {}",
            expected,
            found.kind()
        ))
    }

    /// Pop an operand; raw literals become constants
    pub(crate) fn pop_symbol(&mut self) -> Result<Symbol, CompilerError> {
        match self.pop()? {
            SemanticValue::Symbol(symbol) => Ok(symbol),
            SemanticValue::Literal(value) => Ok(Symbol::constant(value)),
            other => Err(Self::unexpected("symbol", &other)),
        }
    }

    pub(crate) fn pop_name(&mut self) -> Result<String, CompilerError> {
        match self.pop()? {
            SemanticValue::Name(name) => Ok(name),
            other => Err(Self::unexpected("name", &other)),
        }
    }

    pub(crate) fn pop_type(&mut self) -> Result<SymbolType, CompilerError> {
        match self.pop()? {
            SemanticValue::TypeName(symbol_type) => Ok(symbol_type),
            other => Err(Self::unexpected("type", &other)),
        }
    }

    pub(crate) fn pop_operator(&mut self) -> Result<BinaryOp, CompilerError> {
        match self.pop()? {
            SemanticValue::Operator(op) => Ok(op),
            other => Err(Self::unexpected("operator", &other)),
        }
    }

    pub(crate) fn pop_label(&mut self) -> Result<usize, CompilerError> {
        match self.pop()? {
            SemanticValue::Label(pc) => Ok(pc),
            other => Err(Self::unexpected("label", &other)),
        }
    }

    pub(crate) fn pop_slot(&mut self) -> Result<Placeholder, CompilerError> {
        match self.pop()? {
            SemanticValue::Slot(slot) => Ok(slot),
            other => Err(Self::unexpected("slot", &other)),
        }
    }

    pub(crate) fn pop_branch(&mut self) -> Result<(Placeholder, Operand), CompilerError> {
        match self.pop()? {
            SemanticValue::Branch { slot, cond } => Ok((slot, cond)),
            other => Err(Self::unexpected("branch", &other)),
        }
    }

    // Diagnostics

    pub(crate) fn record_error(&mut self, line: usize, message: impl Into<String>) {
        let error = SemanticError::new(line, message);
        log::debug!("SEMANTIC ERROR {}", error);
        self.errors.push(error);
    }

    /// Record a user-facing symbol error; internal ones abort.
    pub(crate) fn record_symbol_error(
        &mut self,
        err: SymbolError,
        line: usize,
    ) -> Result<(), CompilerError> {
        match err {
            SymbolError::Duplicate(name) => {
                self.record_error(line, format!("'{}' is already defined in this scope.", name));
                Ok(())
            }
            SymbolError::Undeclared(name) => {
                self.record_error(line, format!("'{}' is not defined.", name));
                Ok(())
            }
            SymbolError::TooLarge(name) => {
                self.record_error(line, format!("Storage for '{}' is too large.", name));
                Ok(())
            }
            SymbolError::Internal(fatal) => Err(fatal),
        }
    }

    // Program start and end

    fn begin_program(&mut self) -> Result<(), CompilerError> {
        if self.start_slot.is_some() {
            return Err(CompilerError::internal("begin_program applied twice"));
        }
        self.start_slot = Some(self.store.reserve());
        Ok(())
    }

    /// Emit the start-up stub: stack and frame pointers start right after the
    /// global data, then `main` is called with a return address equal to the
    /// program length, which halts the machine.
    fn end_program(&mut self, token: &Token) -> Result<(), CompilerError> {
        if let Some(open) = self.symbols.current_function() {
            return Err(CompilerError::internal(format!(
                "end of program while '{}' is still open",
                open
            )));
        }
        let start = self
            .start_slot
            .take()
            .ok_or_else(|| CompilerError::internal("end_program without begin_program"))?;

        let main = self
            .symbols
            .resolve("main")
            .ok()
            .filter(|symbol| {
                symbol.is_function
                    && symbol.value >= 0
                    && symbol.symbol_type == SymbolType::Void
                    && symbol.args.as_ref().is_some_and(|args| args.is_empty())
            });

        let stub = self.store.pc();
        match main {
            Some(main) => {
                let sp = Operand::Direct(self.config.stack_pointer);
                let fp = Operand::Direct(self.config.frame_pointer);
                let stack_base = Operand::Immediate(self.symbols.data_end() as i32);
                self.store.emit(Instruction::assign(stack_base, sp));
                self.store.emit(Instruction::assign(stack_base, fp));
                let ra = self.field_operand(self.config.stack_pointer, RA_OFFSET)?;
                let return_pc = self.store.pc() + 2;
                self.store
                    .emit(Instruction::assign(Operand::Immediate(return_pc as i32), ra));
                self.store.emit(Instruction::jp(main.address() as usize));
            }
            None => self.record_error(token.line, "main function not found."),
        }
        self.store.patch(start, Instruction::jp(stub))?;

        log::info!(
            "Code generation finished: {} instructions, {} semantic errors, data segment ends at {}",
            self.store.len(),
            self.errors.len(),
            self.symbols.data_end()
        );
        Ok(())
    }

    // Declarations

    fn push_type(&mut self, token: &Token) -> Result<(), CompilerError> {
        let symbol_type = SymbolType::from_keyword(&token.lexeme).ok_or_else(|| {
            CompilerError::internal(format!("'{}' is not a type keyword", token.lexeme))
        })?;
        self.push(SemanticValue::TypeName(symbol_type));
        Ok(())
    }

    /// `void` only names function return types
    fn check_not_void(&mut self, symbol_type: SymbolType, name: &str, line: usize) -> SymbolType {
        if symbol_type == SymbolType::Void {
            self.record_error(line, format!("Illegal type of void for '{}'.", name));
            SymbolType::Int
        } else {
            symbol_type
        }
    }

    fn declare_variable(&mut self, token: &Token) -> Result<(), CompilerError> {
        let name = self.pop_name()?;
        let declared = self.pop_type()?;
        let symbol_type = self.check_not_void(declared, &name, token.line);
        let installed = self.symbols.install_variable(&name, symbol_type);
        self.finish_declaration(&name, installed, token.line)
    }

    fn declare_array(&mut self, token: &Token) -> Result<(), CompilerError> {
        let size = self.pop_symbol()?;
        let name = self.pop_name()?;
        let declared = self.pop_type()?;
        let element = self.check_not_void(declared, &name, token.line);
        let words = size.value.max(0) as u32;
        let installed = self.symbols.install_array(&name, element.array_of(), words);
        self.finish_declaration(&name, installed, token.line)
    }

    /// Report a rejected declaration. A name whose storage did not fit stays
    /// bound to a placeholder so its uses do not cascade.
    fn finish_declaration(
        &mut self,
        name: &str,
        installed: Result<Symbol, SymbolError>,
        line: usize,
    ) -> Result<(), CompilerError> {
        match installed {
            Ok(_) => Ok(()),
            Err(err @ SymbolError::TooLarge(_)) => {
                self.record_symbol_error(err, line)?;
                self.symbols.install_placeholder(name)
            }
            Err(err) => self.record_symbol_error(err, line),
        }
    }

    fn add_parameter(&mut self, token: &Token, by_reference: bool) -> Result<(), CompilerError> {
        let name = self.pop_name()?;
        let declared = self.pop_type()?;
        let element = self.check_not_void(declared, &name, token.line);
        let symbol_type = if by_reference {
            element.pointer_to()
        } else {
            element
        };
        if let Err(err) = self.symbols.add_parameter(&name, symbol_type) {
            self.record_symbol_error(err, token.line)?;
        }
        Ok(())
    }

    // Results

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    pub fn frames(&self) -> &[FrameSummary] {
        &self.frames
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Program counter of the next instruction
    pub fn pc(&self) -> usize {
        self.store.pc()
    }

    pub fn instructions(&self) -> Result<Vec<Instruction>, CompilerError> {
        self.store.instructions()
    }

    /// `<pc>\t(<OP>, a, b, c)` per line, or the fixed no-code message when
    /// any semantic error was recorded
    pub fn listing(&self) -> Result<String, CompilerError> {
        if self.has_errors() {
            return Ok(NO_CODE_MESSAGE.to_string());
        }
        Ok(render_listing(&self.store.instructions()?))
    }

    pub fn diagnostics(&self) -> String {
        if self.errors.is_empty() {
            return format!("{}\n", SEMANTICALLY_CORRECT_MESSAGE);
        }
        let mut out = String::new();
        for error in &self.errors {
            out.push_str(&format!("{}\n", error));
        }
        out
    }
}

#[cfg(test)]
#[path = "codegen_tests.rs"]
mod tests;
