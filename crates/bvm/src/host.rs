//! The `vm::HostInterface` implementation: the seam between the interpreter
//! and the persistent state it is never trusted to touch directly.
//!
//! Grounded in the teacher's `HostShim` (`crates/avm/src/host_interface.rs`),
//! but without its `unsafe` raw-pointer re-entrancy trick — `vm::Vm` already
//! owns far-call recursion internally (`push_far_call`/`run_current_frame`),
//! so this struct only ever needs ordinary `&mut` borrows of the state it
//! wraps for the lifetime of one top-level invocation.

use std::collections::BTreeMap;

use types::{AssetId, BvmError, ContractId, PeerId, VarKey, VarTag};

use crate::charge::ChargeSchedule;
use crate::doc::{DocumentBuilder, RequestDocument};

/// The asset id `AssetCreate`/`AssetDestroy` lock/unlock their deposit
/// against. Asset id 0 is never mintable through `AssetCreate` itself (ids
/// are assigned starting at 1 by `state::assets::create_asset`'s counter),
/// so it is free to reserve as the protocol's own deposit currency.
pub const NATIVE_ASSET: AssetId = AssetId(0);

/// Supplies the canonical per-height scalar `Env_get_Hdr` reduces a block
/// header to. The VM consumes only this interface, never a header's full
/// contents or the chain's wire format — block header sourcing is an
/// external collaborator.
pub trait BlockHeaderProvider {
    fn header_scalar(&self, height: u32) -> Option<i64>;
}

/// A header provider over a fixed, already-known prefix of the chain — the
/// shape a test harness or a single-process simulation needs.
#[derive(Debug, Clone, Default)]
pub struct FixedHeaders {
    scalars: BTreeMap<u32, i64>,
}

impl FixedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, height: u32, scalar: i64) -> Self {
        self.scalars.insert(height, scalar);
        self
    }
}

impl BlockHeaderProvider for FixedHeaders {
    fn header_scalar(&self, height: u32) -> Option<i64> {
        self.scalars.get(&height).copied()
    }
}

#[derive(Debug, Default)]
struct VarsCursor {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: usize,
}

/// Wraps one top-level invocation's state and wiring. `read_only` gates every
/// mutating host call with `InvariantViolation` regardless of what the
/// compiled module attempts — the manager persona's "never mutates state"
/// guarantee is enforced here rather than trusted to the module's own ABI
/// usage.
pub struct Host<'a> {
    pub state: &'a mut state::State,
    pub headers: &'a dyn BlockHeaderProvider,
    pub schedule: ChargeSchedule,
    pub read_only: bool,
    pub request: RequestDocument,
    pub response: DocumentBuilder,
    cursor: Option<VarsCursor>,
}

impl<'a> std::fmt::Debug for Host<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").field("read_only", &self.read_only).finish_non_exhaustive()
    }
}

impl<'a> Host<'a> {
    pub fn new(state: &'a mut state::State, headers: &'a dyn BlockHeaderProvider, schedule: ChargeSchedule) -> Self {
        Self {
            state,
            headers,
            schedule,
            read_only: false,
            request: RequestDocument::new(),
            response: DocumentBuilder::new(),
            cursor: None,
        }
    }

    pub fn read_only(mut self, request: RequestDocument) -> Self {
        self.read_only = true;
        self.request = request;
        self
    }

    fn reject_if_read_only(&self) -> Result<(), BvmError> {
        if self.read_only {
            return Err(BvmError::InvariantViolation("the manager persona may not mutate state".into()));
        }
        Ok(())
    }
}

impl<'a> vm::HostInterface for Host<'a> {
    fn load_var(&mut self, cid: ContractId, subkey: &[u8]) -> Vec<u8> {
        match VarKey::new(cid, VarTag::Internal, subkey.to_vec()) {
            Ok(key) => self.state.vars.read_exact(&key),
            Err(_) => Vec::new(),
        }
    }

    fn save_var(&mut self, cid: ContractId, subkey: Vec<u8>, value: Vec<u8>) -> Result<(), BvmError> {
        self.reject_if_read_only()?;
        let key = VarKey::new(cid, VarTag::Internal, subkey)?;
        let prev = self.state.vars.write_or_delete(&key, &value)?;
        self.state.undo.push(state::UndoAction::VarWrite { key: key.to_bytes(), prev });
        Ok(())
    }

    fn add_sig(&mut self, pubkey: &[u8]) -> Result<(), BvmError> {
        self.reject_if_read_only()?;
        self.state.sigs.add_sig(pubkey)
    }

    fn funds_lock(&mut self, cid: ContractId, aid: AssetId, amount: u64) -> Result<(), BvmError> {
        self.reject_if_read_only()?;
        state::lock_amount(&self.state.vars, &mut self.state.undo, cid, aid, amount as u128)?;
        self.state.funds.lock(aid, amount);
        Ok(())
    }

    fn funds_unlock(&mut self, cid: ContractId, aid: AssetId, amount: u64) -> Result<(), BvmError> {
        self.reject_if_read_only()?;
        state::unlock_amount(&self.state.vars, &mut self.state.undo, cid, aid, amount as u128)?;
        self.state.funds.unlock(aid, amount);
        Ok(())
    }

    fn ref_add(&mut self, cid: ContractId, target: ContractId) -> Result<(), BvmError> {
        self.reject_if_read_only()?;
        if !self.state.vars.exists(&VarKey::code_record(target)) {
            return Err(BvmError::InvariantViolation(format!(
                "cannot reference {}: no contract is deployed at that id",
                target
            )));
        }
        state::ref_add(&self.state.vars, &mut self.state.undo, cid, target)
    }

    fn ref_release(&mut self, cid: ContractId, target: ContractId) -> Result<(), BvmError> {
        self.reject_if_read_only()?;
        state::ref_release(&self.state.vars, &mut self.state.undo, cid, target)
    }

    fn asset_create(&mut self, cid: ContractId, metadata: &[u8]) -> Result<(AssetId, PeerId), BvmError> {
        self.reject_if_read_only()?;
        let (aid, owner) = state::create_asset(&self.state.vars, &mut self.state.undo, cid, metadata)?;
        self.state.funds.lock(NATIVE_ASSET, self.schedule.asset_deposit);
        Ok((aid, owner))
    }

    fn asset_emit(&mut self, cid: ContractId, aid: AssetId, delta: i64) -> Result<bool, BvmError> {
        self.reject_if_read_only()?;
        state::emit_asset(&self.state.vars, &mut self.state.undo, cid, aid, delta as i128)
    }

    fn asset_destroy(&mut self, cid: ContractId, aid: AssetId) -> Result<bool, BvmError> {
        self.reject_if_read_only()?;
        let destroyed = state::destroy_asset(&self.state.vars, &mut self.state.undo, cid, aid)?;
        if destroyed {
            self.state.funds.unlock(NATIVE_ASSET, self.schedule.asset_deposit);
        }
        Ok(destroyed)
    }

    fn load_contract_code(&mut self, cid: ContractId) -> Result<Vec<u8>, BvmError> {
        let code = self.state.vars.read_exact(&VarKey::code_record(cid));
        if code.is_empty() {
            return Err(BvmError::LinkError(format!("no contract is deployed at {}", cid)));
        }
        Ok(code)
    }

    fn get_hdr(&mut self, height: u32) -> Result<i64, BvmError> {
        self.headers
            .header_scalar(height)
            .ok_or(BvmError::BlockNotReady { height: height as u64 })
    }

    fn vars_enum(&mut self, cid: ContractId, k_min: &[u8], k_max: &[u8]) -> u32 {
        let min_key = VarKey::new(cid, VarTag::Internal, k_min.to_vec()).map(|k| k.to_bytes());
        let max_key = VarKey::new(cid, VarTag::Internal, k_max.to_vec()).map(|k| k.to_bytes());
        let entries = match (min_key, max_key) {
            (Ok(min_key), Ok(max_key)) => self
                .state
                .vars
                .range(&min_key, &max_key)
                .into_iter()
                .filter_map(|(k, v)| VarKey::from_bytes(&k).map(|vk| (vk.subkey, v)))
                .collect(),
            _ => Vec::new(),
        };
        self.cursor = Some(VarsCursor { entries, pos: 0 });
        0
    }

    fn vars_move_next(&mut self, _cursor: u32) -> Option<(Vec<u8>, Vec<u8>)> {
        let cursor = self.cursor.as_mut()?;
        let entry = cursor.entries.get(cursor.pos)?.clone();
        cursor.pos += 1;
        Some(entry)
    }

    fn doc_group(&mut self, name: &[u8]) {
        self.response.open_group(name);
    }

    fn doc_array(&mut self, name: &[u8]) {
        self.response.open_array(name);
    }

    fn doc_add_text(&mut self, name: &[u8], text: &[u8]) {
        self.response.add_text(name, text);
    }

    fn doc_add_blob(&mut self, name: &[u8], blob: &[u8]) {
        self.response.add_blob(name, blob);
    }

    fn doc_add_num32(&mut self, name: &[u8], value: i32) {
        self.response.add_num32(name, value);
    }

    fn doc_add_num64(&mut self, name: &[u8], value: i64) {
        self.response.add_num64(name, value);
    }

    fn doc_get_text(&mut self, name: &[u8]) -> Option<Vec<u8>> {
        self.request.get_text(name)
    }

    fn doc_get_blob(&mut self, name: &[u8]) -> Option<Vec<u8>> {
        self.request.get_blob(name)
    }

    fn doc_get_num32(&mut self, name: &[u8]) -> Option<i32> {
        self.request.get_num32(name)
    }

    fn doc_get_num64(&mut self, name: &[u8]) -> Option<i64> {
        self.request.get_num64(name)
    }
}
