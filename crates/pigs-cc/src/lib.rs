//! `pigs-cc`: a compiler from a restricted C99 subset to the textual
//! assembly of the PIGS scripting VM (accumulator `A`, flags `F`,
//! variables `v0..v149`, parameters `p0..p9`, tags).
//!
//! The pipeline is strictly sequential: parse all inputs into one
//! translation unit (with the built-in API header logically prepended),
//! resolve symbols and scopes, assign VM variable slots, lower to an
//! instruction list, run the peephole reducer, and serialise.

pub mod alloc;
pub mod api;
pub mod codegen;
mod consteval;
pub mod error;
pub mod frontend;
pub mod pigs;
pub mod resolve;
pub mod source;

/// Test harness: compile-from-string helpers and a reference VM
/// interpreter. Only available to tests or with the `test-harness`
/// feature.
#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

use crate::alloc::Allocation;
use crate::frontend::ast::Ast;
use crate::pigs::instruction::{Asm, Instruction, TagTable, MAX_TAGS, USABLE_SLOTS};
use crate::source::SourceMap;

pub use error::{Error, Result};
pub use source::Loc;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Run the peephole reducer (disabled by `-n`).
    pub reduce: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { reduce: true }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Stats {
    /// High-water mark of user variable slots (out of 146).
    pub variables_used: u32,
    /// Tags defined in the emitted program (out of 50).
    pub tags_used: usize,
}

impl Stats {
    pub fn summary(&self) -> String {
        format!(
            "variables used: {}/{USABLE_SLOTS}, tags used: {}/{MAX_TAGS}",
            self.variables_used, self.tags_used
        )
    }
}

#[derive(Debug)]
pub struct CompiledProgram {
    code: Vec<Asm>,
    tags: TagTable,
    allocation: Allocation,
    sources: SourceMap,
    stats: Stats,
}

impl CompiledProgram {
    /// Serialise to the VM's textual assembly syntax.
    pub fn encode(&self, comments: bool) -> String {
        pigs::emit::encode(&self.code, &self.tags, &self.allocation, &self.sources, comments)
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn instructions(&self) -> &[Asm] {
        &self.code
    }

    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }
}

/// Compile named C sources, in order, as one translation unit.
pub fn compile(files: &[(&str, &str)]) -> std::result::Result<CompiledProgram, Vec<Error>> {
    compile_with_options(files, &CompileOptions::default())
}

pub fn compile_with_options(
    files: &[(&str, &str)],
    options: &CompileOptions,
) -> std::result::Result<CompiledProgram, Vec<Error>> {
    let mut sources = SourceMap::new();
    let mut ast = Ast::new();

    let user_supplies_header = files
        .iter()
        .any(|(name, _)| name.rsplit(['/', '\\']).next() == Some(api::API_HEADER_NAME));
    let builtin_header = [(api::API_HEADER_NAME, api::API_HEADER)];
    let header: &[(&str, &str)] = if user_supplies_header { &[] } else { &builtin_header };

    for &(name, text) in header.iter().chain(files) {
        let file = sources.add(name, text).name.clone();
        frontend::parser::parse_into(&mut ast, file, text).map_err(|e| vec![e])?;
    }

    let resolved = resolve::resolve(&ast)?;
    let allocation = alloc::allocate(&ast, &resolved);
    let (mut code, tags) = codegen::generate(&ast, &resolved, &allocation)?;
    if options.reduce {
        code = pigs::reduce::reduce(code, &tags);
    }

    let stats = Stats {
        variables_used: allocation.slots_used,
        tags_used: code
            .iter()
            .filter(|asm| matches!(asm.instr, Instruction::Tag(_)))
            .count(),
    };
    if stats.variables_used > USABLE_SLOTS {
        tracing::warn!(
            "program uses {} VM variables, the VM only has {USABLE_SLOTS}",
            stats.variables_used
        );
    }
    if stats.tags_used > MAX_TAGS {
        tracing::warn!(
            "program defines {} tags, the VM only accepts {MAX_TAGS}",
            stats.tags_used
        );
    }

    Ok(CompiledProgram { code, tags, allocation, sources, stats })
}
