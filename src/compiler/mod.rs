// C-minus Compiler Module
// One-pass front and back end: source text in, three-address code listing out

pub mod actions;
pub mod activation;
pub mod codegen;
pub mod codegen_branch;
pub mod codegen_calls;
pub mod codegen_emit;
pub mod codegen_expressions;
pub mod codegen_resolve;
pub mod config;
pub mod error;
pub mod instruction;
pub mod lexer;
pub mod parser;
pub mod semantic;

pub use codegen::{CodeGenerator, FrameSummary, NO_CODE_MESSAGE, SEMANTICALLY_CORRECT_MESSAGE};
pub use config::CompilerConfig;
pub use error::{CompilerError, SemanticError};
pub use instruction::{Instruction, Op, Operand};

/// Result of compiling one source file
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    /// Empty when any semantic error was recorded
    pub instructions: Vec<Instruction>,
    pub errors: Vec<SemanticError>,
    pub frames: Vec<FrameSummary>,
}

impl CompileOutput {
    pub fn is_semantically_correct(&self) -> bool {
        self.errors.is_empty()
    }

    /// Contents of the code listing artifact
    pub fn listing(&self) -> String {
        if self.is_semantically_correct() {
            instruction::render_listing(&self.instructions)
        } else {
            NO_CODE_MESSAGE.to_string()
        }
    }

    /// Contents of the semantic error artifact
    pub fn diagnostics(&self) -> String {
        if self.errors.is_empty() {
            return format!("{}\n", SEMANTICALLY_CORRECT_MESSAGE);
        }
        self.errors.iter().map(|e| format!("{}\n", e)).collect()
    }
}

/// Main compiler structure
pub struct CminusCompiler {
    config: CompilerConfig,
}

impl Default for CminusCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl CminusCompiler {
    /// Create a compiler with the default memory layout
    pub fn new() -> Self {
        CminusCompiler {
            config: CompilerConfig::default(),
        }
    }

    pub fn with_config(config: CompilerConfig) -> Result<Self, CompilerError> {
        config.validate()?;
        Ok(CminusCompiler { config })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile C-minus source. Semantic errors are part of the output; only
    /// lexical, syntax and internal errors fail the call.
    pub fn compile(&self, source: &str) -> Result<CompileOutput, CompilerError> {
        // Phase 1: Lexical Analysis
        let mut lexer = lexer::Lexer::new(source);
        let tokens = lexer.tokenize()?;

        // Phase 2: Parsing, driving semantic analysis and code generation
        let mut generator = CodeGenerator::new(self.config.clone());
        parser::Parser::new(tokens, &mut generator).parse()?;

        if generator.stack_depth() != 0 {
            return Err(CompilerError::internal(format!(
                "{} value(s) left on the semantic stack",
                generator.stack_depth()
            )));
        }

        let instructions = if generator.has_errors() {
            Vec::new()
        } else {
            generator.instructions()?
        };

        log::info!(
            "Compiled {} instructions, {} function(s), {} semantic error(s)",
            instructions.len(),
            generator.frames().len(),
            generator.errors().len()
        );

        Ok(CompileOutput {
            instructions,
            errors: generator.errors().to_vec(),
            frames: generator.frames().to_vec(),
        })
    }
}
