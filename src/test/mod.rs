//! Shared fixtures for unit tests.
//!
//! The workspace fixture mirrors a small i386 image: one 8 KiB map at `0x56560000`, a thunk
//! for `kernel32.CreateFileA`, an internal function without thunk, and a couple of strings.

use crate::{
    arch::{Architecture, RegisterTable, StaticRegisterTable},
    expr::Expr,
    workspace::{MemoryWorkspace, Workspace},
    Error, Result,
};

pub const IMAGE_BASE: u64 = 0x56560000;
pub const THUNK_ADDRESS: u64 = 0x56561000;
pub const FUNCTION_ADDRESS: u64 = 0x56561100;
pub const STRING_ADDRESS: u64 = 0x56560100;
pub const UNICODE_ADDRESS: u64 = 0x56560200;

pub fn i386_registers() -> StaticRegisterTable {
    Architecture::I386.register_table()
}

pub fn fixture_workspace() -> MemoryWorkspace {
    let mut ws = MemoryWorkspace::new();
    ws.add_memory_map(IMAGE_BASE, 0x2000, "woot");
    ws.add_function(THUNK_ADDRESS, Some("kernel32.CreateFileA"));
    ws.add_function(FUNCTION_ADDRESS, None);
    ws.add_string(STRING_ADDRESS, "hello");
    ws.add_unicode(UNICODE_ADDRESS, "wide");
    ws
}

/// A 4 byte register (or any other named) variable.
pub fn reg(name: &str) -> Expr {
    Expr::variable(name, 4)
}

/// The symbolic call argument `argN`.
pub fn arg(index: usize) -> Expr {
    Expr::variable(format!("arg{index}"), 4)
}

/// A register table that cannot be consulted.
pub struct UnavailableRegisters;

impl RegisterTable for UnavailableRegisters {
    fn register_index(&self, name: &str) -> Result<Option<usize>> {
        Err(Error::CollaboratorUnavailable(format!(
            "register table offline while resolving '{name}'"
        )))
    }
}

/// A workspace that cannot answer any query.
pub struct UnavailableWorkspace;

impl Workspace for UnavailableWorkspace {
    fn is_valid_address(&self, address: u64) -> Result<bool> {
        Err(Error::CollaboratorUnavailable(format!(
            "workspace offline while checking {address:#x}"
        )))
    }

    fn is_function(&self, address: u64) -> Result<bool> {
        self.is_valid_address(address)
    }

    fn thunk_name(&self, address: u64) -> Result<Option<String>> {
        self.is_valid_address(address).map(|_| None)
    }

    fn string_literal(&self, address: u64) -> Result<Option<String>> {
        self.is_valid_address(address).map(|_| None)
    }

    fn pointer_width(&self) -> u8 {
        4
    }
}
