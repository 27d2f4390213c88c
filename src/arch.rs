//! Architecture register tables.
//!
//! The engine only needs to know whether a variable name is a physical register. The
//! [`RegisterTable`] trait answers that; [`StaticRegisterTable`] is a name-to-index table and
//! [`Architecture`] provides ready-made tables for common targets.

use std::collections::HashMap;

use strum::{Display, EnumIter, EnumString};

use crate::Result;

/// Register name lookup.
pub trait RegisterTable {
    /// Returns the register index for `name`, or `None` if `name` is not a register
    /// (for example a symbolic call argument such as `arg0`).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CollaboratorUnavailable`] if the table cannot be consulted.
    fn register_index(&self, name: &str) -> Result<Option<usize>>;
}

impl<R: RegisterTable + ?Sized> RegisterTable for &R {
    fn register_index(&self, name: &str) -> Result<Option<usize>> {
        (**self).register_index(name)
    }
}

/// A fixed register table mapping names to their position in the definition order.
#[derive(Debug, Clone, Default)]
pub struct StaticRegisterTable {
    indices: HashMap<String, usize>,
}

impl StaticRegisterTable {
    /// Builds a table from register names. Duplicate names keep their first index.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut indices = HashMap::new();
        for (index, name) in names.into_iter().enumerate() {
            indices.entry(name.into()).or_insert(index);
        }
        Self { indices }
    }

    /// Number of registers in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns `true` if the table holds no registers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns `true` if `name` is a register of this table.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }
}

impl RegisterTable for StaticRegisterTable {
    fn register_index(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.indices.get(name).copied())
    }
}

const I386_REGISTERS: &[&str] = &[
    "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "eip", "eflags", "ax", "cx", "dx",
    "bx", "sp", "bp", "si", "di", "al", "cl", "dl", "bl", "ah", "ch", "dh", "bh", "es", "cs",
    "ss", "ds", "fs", "gs",
];

const AMD64_REGISTERS: &[&str] = &[
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15", "rip", "rflags", "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi",
    "r8d", "r9d", "r10d", "r11d", "r12d", "r13d", "r14d", "r15d", "ax", "cx", "dx", "bx", "sp",
    "bp", "si", "di", "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil",
];

const ARM_REGISTERS: &[&str] = &[
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "sp", "lr",
    "pc", "cpsr",
];

/// Supported architectures.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Architecture {
    /// 32-bit x86.
    I386,
    /// x86-64.
    Amd64,
    /// 32-bit ARM.
    Arm,
}

impl Architecture {
    /// Register names of this architecture, in index order.
    #[must_use]
    pub fn register_names(self) -> &'static [&'static str] {
        match self {
            Self::I386 => I386_REGISTERS,
            Self::Amd64 => AMD64_REGISTERS,
            Self::Arm => ARM_REGISTERS,
        }
    }

    /// Builds the register table of this architecture.
    #[must_use]
    pub fn register_table(self) -> StaticRegisterTable {
        StaticRegisterTable::new(self.register_names().iter().copied())
    }

    /// Native pointer width in bytes.
    #[must_use]
    pub const fn pointer_width(self) -> u8 {
        match self {
            Self::I386 | Self::Arm => 4,
            Self::Amd64 => 8,
        }
    }
}
