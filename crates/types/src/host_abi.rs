//! The fixed host ABI table (`bvm/Shaders/common.h`).
//!
//! This table is the single source of truth both the compiler (import resolution,
//! `bvm2.cpp`'s `ResolveBindings`) and the interpreter (`CallHost` dispatch) build
//! against, so a `HostOp`'s position here *is* its binding id. Keeping it in `types`
//! rather than duplicating it in both `compiler` and `vm` avoids a dependency edge
//! between those two crates that would otherwise only exist to share sixteen constants.

/// Argument/return type codes used in import signature matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    I32,
    I64,
}

/// One entry per host function a compiled module may import from module `env`.
/// The table's index is the `binding_id` assigned at link time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum HostOp {
    MemCpy = 0,
    MemSet = 1,
    MemCmp = 2,
    MemIs0 = 3,
    LoadVar = 4,
    SaveVar = 5,
    Halt = 6,
    AddSig = 7,
    FundsLock = 8,
    FundsUnlock = 9,
    RefAdd = 10,
    RefRelease = 11,
    AssetCreate = 12,
    AssetEmit = 13,
    AssetDestroy = 14,
    CallFar = 15,
    GetHdr = 16,
    VarsEnum = 17,
    VarsMoveNext = 18,
    DocGroup = 19,
    DocArray = 20,
    DocAddText = 21,
    DocAddBlob = 22,
    DocAddNum32 = 23,
    DocAddNum64 = 24,
    DocGetText = 25,
    DocGetBlob = 26,
    DocGetNum32 = 27,
    DocGetNum64 = 28,
}

impl HostOp {
    pub const COUNT: usize = 29;

    pub fn from_binding_id(id: u32) -> Option<Self> {
        HOST_ABI_TABLE
            .iter()
            .find(|entry| entry.binding_id == id)
            .map(|entry| entry.op)
    }

    pub fn binding_id(self) -> u32 {
        self as u32
    }
}

/// A single row of the host ABI table: the Beam-flavored import name a compiled module
/// uses (`Env_LoadVar`, ...), its argument/return signature, and its binding id.
#[derive(Debug, Clone, Copy)]
pub struct HostAbiEntry {
    pub name: &'static str,
    pub args: &'static [TypeCode],
    pub ret: Option<TypeCode>,
    pub op: HostOp,
    pub binding_id: u32,
}

use TypeCode::{I32, I64};

pub const HOST_ABI_TABLE: &[HostAbiEntry] = &[
    HostAbiEntry { name: "Env_MemCpy", args: &[I32, I32, I32], ret: None, op: HostOp::MemCpy, binding_id: HostOp::MemCpy as u32 },
    HostAbiEntry { name: "Env_MemSet", args: &[I32, I32, I32], ret: None, op: HostOp::MemSet, binding_id: HostOp::MemSet as u32 },
    HostAbiEntry { name: "Env_MemCmp", args: &[I32, I32, I32], ret: Some(I32), op: HostOp::MemCmp, binding_id: HostOp::MemCmp as u32 },
    HostAbiEntry { name: "Env_MemIs0", args: &[I32, I32], ret: Some(I32), op: HostOp::MemIs0, binding_id: HostOp::MemIs0 as u32 },
    HostAbiEntry { name: "Env_LoadVar", args: &[I32, I32, I32, I32], ret: Some(I32), op: HostOp::LoadVar, binding_id: HostOp::LoadVar as u32 },
    HostAbiEntry { name: "Env_SaveVar", args: &[I32, I32, I32, I32], ret: None, op: HostOp::SaveVar, binding_id: HostOp::SaveVar as u32 },
    HostAbiEntry { name: "Env_Halt", args: &[], ret: None, op: HostOp::Halt, binding_id: HostOp::Halt as u32 },
    HostAbiEntry { name: "Env_AddSig", args: &[I32], ret: None, op: HostOp::AddSig, binding_id: HostOp::AddSig as u32 },
    HostAbiEntry { name: "Env_FundsLock", args: &[I64, I32], ret: None, op: HostOp::FundsLock, binding_id: HostOp::FundsLock as u32 },
    HostAbiEntry { name: "Env_FundsUnlock", args: &[I64, I32], ret: None, op: HostOp::FundsUnlock, binding_id: HostOp::FundsUnlock as u32 },
    HostAbiEntry { name: "Env_RefAdd", args: &[I32], ret: None, op: HostOp::RefAdd, binding_id: HostOp::RefAdd as u32 },
    HostAbiEntry { name: "Env_RefRelease", args: &[I32], ret: None, op: HostOp::RefRelease, binding_id: HostOp::RefRelease as u32 },
    HostAbiEntry { name: "Env_AssetCreate", args: &[I32, I32], ret: Some(I32), op: HostOp::AssetCreate, binding_id: HostOp::AssetCreate as u32 },
    HostAbiEntry { name: "Env_AssetEmit", args: &[I32, I64], ret: Some(I32), op: HostOp::AssetEmit, binding_id: HostOp::AssetEmit as u32 },
    HostAbiEntry { name: "Env_AssetDestroy", args: &[I32], ret: Some(I32), op: HostOp::AssetDestroy, binding_id: HostOp::AssetDestroy as u32 },
    HostAbiEntry { name: "Env_CallFar", args: &[I32, I32, I32, I32], ret: Some(I32), op: HostOp::CallFar, binding_id: HostOp::CallFar as u32 },
    HostAbiEntry { name: "Env_get_Hdr", args: &[I64, I32], ret: Some(I32), op: HostOp::GetHdr, binding_id: HostOp::GetHdr as u32 },
    HostAbiEntry { name: "Env_VarsEnum", args: &[I32, I32, I32, I32], ret: None, op: HostOp::VarsEnum, binding_id: HostOp::VarsEnum as u32 },
    HostAbiEntry { name: "Env_VarsMoveNext", args: &[I32, I32, I32, I32], ret: Some(I32), op: HostOp::VarsMoveNext, binding_id: HostOp::VarsMoveNext as u32 },
    HostAbiEntry { name: "Env_DocGroup", args: &[I32], ret: None, op: HostOp::DocGroup, binding_id: HostOp::DocGroup as u32 },
    HostAbiEntry { name: "Env_DocArray", args: &[I32], ret: None, op: HostOp::DocArray, binding_id: HostOp::DocArray as u32 },
    HostAbiEntry { name: "Env_DocAddText", args: &[I32, I32], ret: None, op: HostOp::DocAddText, binding_id: HostOp::DocAddText as u32 },
    HostAbiEntry { name: "Env_DocAddBlob", args: &[I32, I32, I32], ret: None, op: HostOp::DocAddBlob, binding_id: HostOp::DocAddBlob as u32 },
    HostAbiEntry { name: "Env_DocAddNum32", args: &[I32, I32], ret: None, op: HostOp::DocAddNum32, binding_id: HostOp::DocAddNum32 as u32 },
    HostAbiEntry { name: "Env_DocAddNum64", args: &[I32, I64], ret: None, op: HostOp::DocAddNum64, binding_id: HostOp::DocAddNum64 as u32 },
    HostAbiEntry { name: "Env_DocGetText", args: &[I32, I32, I32], ret: Some(I32), op: HostOp::DocGetText, binding_id: HostOp::DocGetText as u32 },
    HostAbiEntry { name: "Env_DocGetBlob", args: &[I32, I32, I32], ret: Some(I32), op: HostOp::DocGetBlob, binding_id: HostOp::DocGetBlob as u32 },
    HostAbiEntry { name: "Env_DocGetNum32", args: &[I32], ret: Some(I32), op: HostOp::DocGetNum32, binding_id: HostOp::DocGetNum32 as u32 },
    HostAbiEntry { name: "Env_DocGetNum64", args: &[I32], ret: Some(I64), op: HostOp::DocGetNum64, binding_id: HostOp::DocGetNum64 as u32 },
];

/// Resolves an import by exact name + signature match, Beam's `ResolveBindings` rule:
/// any mismatch (unknown name, wrong arity, wrong type codes) is a link error upstream.
pub fn resolve(name: &str, args: &[TypeCode], ret: Option<TypeCode>) -> Option<&'static HostAbiEntry> {
    HOST_ABI_TABLE
        .iter()
        .find(|e| e.name == name && e.args == args && e.ret == ret)
}
