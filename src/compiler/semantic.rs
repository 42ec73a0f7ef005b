// Symbol table for C-minus
//
// Globals live in one flat table. While a function is being compiled it owns a
// stack of lexical scopes; the bottom scope holds the parameters. Nested scopes
// share the function's activation record, so closing a scope hides its names
// but never gives its storage back.

use crate::compiler::activation::{segment_end, ActivationRecord, ADDRESS_LIMIT, DECLARED_LIMIT};
use crate::compiler::error::CompilerError;
use indexmap::IndexMap;
use std::fmt;

/// Name of the built-in print primitive
pub const OUTPUT_FUNCTION: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolType {
    Void,
    Int,
    ArrayInt,
    ArrayVoid,
    PointerInt,
    PointerVoid,
    /// Temporary holding the address of the value, not the value itself
    Indexed,
}

impl SymbolType {
    /// Type named by a `void`/`int` keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "int" => Some(SymbolType::Int),
            "void" => Some(SymbolType::Void),
            _ => None,
        }
    }

    pub fn array_of(self) -> Self {
        match self {
            SymbolType::Void => SymbolType::ArrayVoid,
            _ => SymbolType::ArrayInt,
        }
    }

    pub fn pointer_to(self) -> Self {
        match self {
            SymbolType::Void => SymbolType::PointerVoid,
            _ => SymbolType::PointerInt,
        }
    }

    /// Usable where an `int` value is expected
    pub fn is_scalar(self) -> bool {
        matches!(self, SymbolType::Int | SymbolType::Indexed)
    }

    /// Passed by reference (base address)
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            SymbolType::ArrayInt
                | SymbolType::ArrayVoid
                | SymbolType::PointerInt
                | SymbolType::PointerVoid
        )
    }

    /// Name used in diagnostics
    pub fn describe(self) -> &'static str {
        match self {
            SymbolType::Void => "void",
            SymbolType::Int | SymbolType::Indexed => "int",
            _ => "array",
        }
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub symbol_type: SymbolType,
    /// Constant value, absolute global address, frame offset or entry pc
    pub value: i32,
    pub args: Option<Vec<SymbolType>>,
    pub is_function: bool,
    pub is_global: bool,
    pub is_constant: bool,
    /// Stand-in pushed after a recorded semantic error
    pub is_placeholder: bool,
}

impl Symbol {
    fn storage(
        name: &str,
        symbol_type: SymbolType,
        addr: u32,
        is_global: bool,
    ) -> Result<Self, CompilerError> {
        let value = i32::try_from(addr).map_err(|_| {
            CompilerError::internal(format!("address {} of '{}' is out of range", addr, name))
        })?;
        Ok(Symbol {
            name: name.to_string(),
            symbol_type,
            value,
            args: None,
            is_function: false,
            is_global,
            is_constant: false,
            is_placeholder: false,
        })
    }

    pub fn constant(value: i32) -> Self {
        Symbol {
            name: String::new(),
            symbol_type: SymbolType::Int,
            value,
            args: None,
            is_function: false,
            is_global: false,
            is_constant: true,
            is_placeholder: false,
        }
    }

    /// `#0` stand-in that downstream checks accept silently
    pub fn placeholder(name: &str) -> Self {
        Symbol {
            name: name.to_string(),
            is_placeholder: true,
            ..Symbol::constant(0)
        }
    }

    /// Value of a call to a `void` function
    pub fn void_result(callee: &str) -> Self {
        Symbol {
            name: callee.to_string(),
            symbol_type: SymbolType::Void,
            is_constant: true,
            ..Symbol::constant(0)
        }
    }

    /// Address or offset held in `value`
    pub fn address(&self) -> u32 {
        self.value as u32
    }

    /// Category used in operand type diagnostics
    pub fn describe(&self) -> &'static str {
        if self.is_function {
            "function"
        } else {
            self.symbol_type.describe()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolError {
    Duplicate(String),
    Undeclared(String),
    /// Declared storage does not fit in the address range
    TooLarge(String),
    /// Contract violation between parser and table; aborts compilation
    Internal(CompilerError),
}

impl From<CompilerError> for SymbolError {
    fn from(err: CompilerError) -> Self {
        SymbolError::Internal(err)
    }
}

/// Layout of a function whose body is complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedFunction {
    pub name: String,
    pub entry: usize,
    pub params: Vec<SymbolType>,
    pub record: ActivationRecord,
}

#[derive(Debug)]
struct OpenFunction {
    name: String,
    entry: usize,
    /// Whether `name` in the global table refers to this function
    registered: bool,
    params: Vec<SymbolType>,
    record: ActivationRecord,
    scopes: Vec<IndexMap<String, Symbol>>,
}

#[derive(Debug)]
pub struct SymbolTable {
    globals: IndexMap<String, Symbol>,
    data_pointer: u32,
    function: Option<OpenFunction>,
    temp_counter: usize,
}

impl SymbolTable {
    pub fn new(data_base: u32) -> Self {
        let mut table = SymbolTable {
            globals: IndexMap::new(),
            data_pointer: data_base,
            function: None,
            temp_counter: 0,
        };
        table.add_builtin_functions();
        table
    }

    fn add_builtin_functions(&mut self) {
        log::debug!("SYMBOLS: registering builtin {}", OUTPUT_FUNCTION);
        let output = Symbol {
            name: OUTPUT_FUNCTION.to_string(),
            symbol_type: SymbolType::Void,
            value: -1,
            args: Some(vec![SymbolType::Int]),
            is_function: true,
            is_global: true,
            is_constant: false,
            is_placeholder: false,
        };
        self.globals.insert(OUTPUT_FUNCTION.to_string(), output);
    }

    /// First address past the global data segment
    pub fn data_end(&self) -> u32 {
        self.data_pointer
    }

    pub fn globals(&self) -> impl Iterator<Item = &Symbol> {
        self.globals.values()
    }

    pub fn current_function(&self) -> Option<&str> {
        self.function.as_ref().map(|f| f.name.as_str())
    }

    /// Number of open lexical scopes, parameter scope included
    pub fn scope_depth(&self) -> usize {
        self.function.as_ref().map_or(0, |f| f.scopes.len())
    }

    fn allocate(&mut self, words: u32) -> Result<(u32, bool), CompilerError> {
        match self.function.as_mut() {
            Some(function) => Ok((function.record.allocate(words)?, false)),
            None => {
                let addr = self.data_pointer;
                self.data_pointer = segment_end(addr, words, ADDRESS_LIMIT).ok_or_else(|| {
                    CompilerError::internal("data segment exceeds the address range")
                })?;
                Ok((addr, true))
            }
        }
    }

    /// Whether a declaration of `words` words fits in the current segment
    fn has_room(&self, words: u32) -> bool {
        match &self.function {
            Some(function) => function.record.fits(words),
            None => segment_end(self.data_pointer, words, DECLARED_LIMIT).is_some(),
        }
    }

    fn is_declared_in_current_scope(&self, name: &str) -> bool {
        match &self.function {
            Some(function) => function
                .scopes
                .last()
                .is_some_and(|scope| scope.contains_key(name)),
            None => self.globals.contains_key(name),
        }
    }

    fn insert_current(&mut self, symbol: Symbol) -> Result<(), CompilerError> {
        match self.function.as_mut() {
            Some(function) => {
                let scope = function
                    .scopes
                    .last_mut()
                    .ok_or_else(|| CompilerError::internal("function has no open scope"))?;
                scope.insert(symbol.name.clone(), symbol);
            }
            None => {
                self.globals.insert(symbol.name.clone(), symbol);
            }
        }
        Ok(())
    }

    pub fn install_variable(
        &mut self,
        name: &str,
        symbol_type: SymbolType,
    ) -> Result<Symbol, SymbolError> {
        self.install_storage(name, symbol_type, 1)
    }

    pub fn install_array(
        &mut self,
        name: &str,
        symbol_type: SymbolType,
        size: u32,
    ) -> Result<Symbol, SymbolError> {
        self.install_storage(name, symbol_type, size)
    }

    fn install_storage(
        &mut self,
        name: &str,
        symbol_type: SymbolType,
        words: u32,
    ) -> Result<Symbol, SymbolError> {
        if self.is_declared_in_current_scope(name) {
            return Err(SymbolError::Duplicate(name.to_string()));
        }
        if !self.has_room(words) {
            return Err(SymbolError::TooLarge(name.to_string()));
        }
        let (addr, is_global) = self.allocate(words)?;
        let symbol = Symbol::storage(name, symbol_type, addr, is_global)?;
        log::debug!(
            "SYMBOLS: install {} {} at {}{} ({} words)",
            symbol_type,
            name,
            if is_global { "" } else { "CF+" },
            addr,
            words
        );
        self.insert_current(symbol.clone())?;
        Ok(symbol)
    }

    /// Bind `name` to a stand-in after its declaration was rejected, so later
    /// uses of the name report nothing further
    pub fn install_placeholder(&mut self, name: &str) -> Result<(), CompilerError> {
        self.insert_current(Symbol::placeholder(name))
    }

    /// Open a function. The function is always opened so its body can still
    /// be compiled; a name clash is reported after the fact.
    pub fn install_function(
        &mut self,
        name: &str,
        return_type: SymbolType,
        entry_pc: usize,
    ) -> Result<(), SymbolError> {
        if let Some(open) = &self.function {
            return Err(SymbolError::Internal(CompilerError::internal(format!(
                "function '{}' declared while '{}' is still open",
                name, open.name
            ))));
        }
        let duplicate = self.globals.contains_key(name);
        if !duplicate {
            let symbol = Symbol {
                name: name.to_string(),
                symbol_type: return_type,
                value: entry_pc as i32,
                args: Some(Vec::new()),
                is_function: true,
                is_global: true,
                is_constant: false,
                is_placeholder: false,
            };
            self.globals.insert(name.to_string(), symbol);
        }
        log::debug!("SYMBOLS: open function {} at pc {}", name, entry_pc);
        self.function = Some(OpenFunction {
            name: name.to_string(),
            entry: entry_pc,
            registered: !duplicate,
            params: Vec::new(),
            record: ActivationRecord::new(),
            scopes: vec![IndexMap::new()],
        });
        if duplicate {
            Err(SymbolError::Duplicate(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// Append a parameter to the open function's calling contract
    pub fn add_parameter(
        &mut self,
        name: &str,
        symbol_type: SymbolType,
    ) -> Result<Symbol, SymbolError> {
        let function = self.function.as_mut().ok_or_else(|| {
            CompilerError::internal(format!("parameter '{}' outside of a function", name))
        })?;
        if function.scopes.len() != 1 {
            return Err(CompilerError::internal(format!(
                "parameter '{}' added after the function body was opened",
                name
            ))
            .into());
        }
        function.params.push(symbol_type);
        if function.registered {
            if let Some(global) = self.globals.get_mut(&function.name) {
                global.args = Some(function.params.clone());
            }
        }
        // The slot is taken even for a clashing name so later parameters keep
        // the offsets callers write them to.
        let offset = function.record.allocate(1)?;
        if function.scopes[0].contains_key(name) {
            return Err(SymbolError::Duplicate(name.to_string()));
        }
        let symbol = Symbol::storage(name, symbol_type, offset, false)?;
        log::debug!("SYMBOLS: parameter {} {} at CF+{}", symbol_type, name, offset);
        function.scopes[0].insert(name.to_string(), symbol.clone());
        Ok(symbol)
    }

    pub fn scope_up(&mut self) -> Result<(), CompilerError> {
        let function = self
            .function
            .as_mut()
            .ok_or_else(|| CompilerError::internal("scope_up with no open function"))?;
        function.scopes.push(IndexMap::new());
        Ok(())
    }

    pub fn scope_down(&mut self) -> Result<(), CompilerError> {
        let function = self
            .function
            .as_mut()
            .ok_or_else(|| CompilerError::internal("scope_down with no open function"))?;
        if function.scopes.len() <= 1 {
            return Err(CompilerError::internal(
                "scope_down without a matching scope_up",
            ));
        }
        function.scopes.pop();
        Ok(())
    }

    /// Innermost local scope outwards, then globals
    pub fn resolve(&self, name: &str) -> Result<Symbol, SymbolError> {
        if let Some(function) = &self.function {
            for scope in function.scopes.iter().rev() {
                if let Some(symbol) = scope.get(name) {
                    return Ok(symbol.clone());
                }
            }
        }
        self.globals
            .get(name)
            .cloned()
            .ok_or_else(|| SymbolError::Undeclared(name.to_string()))
    }

    /// Recover a function's declared symbol from its entry address.
    /// Only function symbols are matched, so a data address that happens to
    /// equal an entry pc cannot be mistaken for it.
    pub fn resolve_by_address(&self, addr: i32) -> Option<Symbol> {
        let locals = self
            .function
            .iter()
            .flat_map(|f| f.scopes.iter().rev())
            .flat_map(|scope| scope.values());
        locals
            .chain(self.globals.values())
            .find(|symbol| symbol.is_function && symbol.value == addr)
            .cloned()
    }

    /// Fresh word in the current activation record (or the data segment when
    /// no function is open). Temporaries are never reused.
    pub fn new_temporary(&mut self, indexed: bool) -> Result<Symbol, CompilerError> {
        let (addr, is_global) = self.allocate(1)?;
        let symbol_type = if indexed {
            SymbolType::Indexed
        } else {
            SymbolType::Int
        };
        let name = format!("t{}", self.temp_counter);
        self.temp_counter += 1;
        log::trace!("SYMBOLS: temporary {} {} at {}", name, symbol_type, addr);
        Symbol::storage(&name, symbol_type, addr, is_global)
    }

    /// Close the open function and hand back its finalized layout
    pub fn end_function(&mut self) -> Result<ClosedFunction, CompilerError> {
        let mut function = self
            .function
            .take()
            .ok_or_else(|| CompilerError::internal("end_function with no open function"))?;
        if function.scopes.len() != 1 {
            return Err(CompilerError::internal(format!(
                "function '{}' closed with {} unclosed scopes",
                function.name,
                function.scopes.len() - 1
            )));
        }
        function.record.finalize()?;
        log::debug!(
            "SYMBOLS: close function {} (frame size {})",
            function.name,
            function.record.frame_size()
        );
        Ok(ClosedFunction {
            name: function.name,
            entry: function.entry,
            params: function.params,
            record: function.record,
        })
    }
}

#[cfg(test)]
#[path = "semantic_tests.rs"]
mod tests;
