//! Transaction model and builders for room operations.
//!
//! # Responsibilities
//! - Model programmable transactions (inputs + commands), BCS-serializable
//! - Build unsigned `join_room`, `deposit` and `claim` transactions
//! - Hash room passwords before they are embedded
//!
//! Builders are pure: they do no I/O and never retry. Balance and object
//! ownership checks belong to the caller.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use thiserror::Error;

use crate::blockchain::types::{Address, ObjectId, TypeTag};
use crate::config::ChainConfig;

/// Errors raised while constructing a transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxBuildError {
    /// Contract coordinates are missing or malformed.
    #[error("Invalid contract configuration: {0}")]
    InvalidContract(String),

    /// Amounts must be positive.
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// A private room was joined with an empty password.
    #[error("Password must not be empty")]
    EmptyPassword,

    /// BCS encoding failed.
    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Result type for transaction construction.
pub type TxBuildResult<T> = Result<T, TxBuildError>;

/// How an object is passed to a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectArg {
    /// Object owned by the sender.
    Owned(ObjectId),
    /// Shared object, optionally taken by mutable reference.
    Shared { id: ObjectId, mutable: bool },
}

impl ObjectArg {
    fn id(&self) -> &ObjectId {
        match self {
            ObjectArg::Owned(id) => id,
            ObjectArg::Shared { id, .. } => id,
        }
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    /// BCS-encoded pure value.
    Pure(Vec<u8>),
    /// Object reference.
    Object(ObjectArg),
}

/// Reference to a value inside a programmable transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

/// A Move function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

/// A single step of a programmable transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    MoveCall(Box<MoveCall>),
    TransferObjects(Vec<Argument>, Argument),
    SplitCoins(Argument, Vec<Argument>),
    MergeCoins(Argument, Vec<Argument>),
}

/// Inputs and commands executed atomically.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgrammableTransaction {
    pub inputs: Vec<CallArg>,
    pub commands: Vec<Command>,
}

/// A fully-built transaction awaiting a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub sender: Address,
    pub kind: ProgrammableTransaction,
    pub gas_budget: u64,
}

impl UnsignedTransaction {
    /// BCS bytes, the payload that gets signed.
    pub fn to_bytes(&self) -> TxBuildResult<Vec<u8>> {
        bcs::to_bytes(self).map_err(|e| TxBuildError::Encode(e.to_string()))
    }

    /// Base64 of the BCS bytes, as sent over JSON APIs.
    pub fn to_base64(&self) -> TxBuildResult<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    /// The Move calls in this transaction, in order.
    pub fn move_calls(&self) -> impl Iterator<Item = &MoveCall> {
        self.kind.commands.iter().filter_map(|c| match c {
            Command::MoveCall(call) => Some(call.as_ref()),
            _ => None,
        })
    }
}

/// Incremental construction of a programmable transaction.
#[derive(Default)]
struct PtbBuilder {
    inputs: Vec<CallArg>,
    commands: Vec<Command>,
}

impl PtbBuilder {
    fn pure<T: Serialize>(&mut self, value: &T) -> TxBuildResult<Argument> {
        let bytes = bcs::to_bytes(value).map_err(|e| TxBuildError::Encode(e.to_string()))?;
        self.inputs.push(CallArg::Pure(bytes));
        Ok(Argument::Input((self.inputs.len() - 1) as u16))
    }

    fn object(&mut self, arg: ObjectArg) -> Argument {
        // The same object may only appear once among the inputs.
        if let Some(idx) = self.inputs.iter().position(|i| match i {
            CallArg::Object(existing) => existing.id() == arg.id(),
            CallArg::Pure(_) => false,
        }) {
            return Argument::Input(idx as u16);
        }
        self.inputs.push(CallArg::Object(arg));
        Argument::Input((self.inputs.len() - 1) as u16)
    }

    fn command(&mut self, command: Command) -> Argument {
        self.commands.push(command);
        Argument::Result((self.commands.len() - 1) as u16)
    }

    fn finish(self) -> ProgrammableTransaction {
        ProgrammableTransaction {
            inputs: self.inputs,
            commands: self.commands,
        }
    }
}

/// One-way hash of a room password.
pub fn hash_password(password: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(password.as_bytes()));
    out
}

/// Coordinates of the deployed savings contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRef {
    pub package_id: ObjectId,
    pub module: String,
    pub coin_type: TypeTag,
    pub clock_id: ObjectId,
}

impl ContractRef {
    /// Resolve contract coordinates from chain configuration.
    pub fn from_config(config: &ChainConfig) -> TxBuildResult<Self> {
        if config.package_id.is_empty() {
            return Err(TxBuildError::InvalidContract("package_id is not set".to_string()));
        }
        let package_id = ObjectId::from_str(&config.package_id)
            .map_err(|e| TxBuildError::InvalidContract(e.to_string()))?;
        let coin_type = TypeTag::from_str(&config.usdc_type)
            .map_err(|e| TxBuildError::InvalidContract(e.to_string()))?;
        let clock_id = ObjectId::from_str(&config.clock_id)
            .map_err(|e| TxBuildError::InvalidContract(e.to_string()))?;
        Ok(Self {
            package_id,
            module: config.module.clone(),
            coin_type,
            clock_id,
        })
    }
}

/// Parameters for joining a room.
#[derive(Debug, Clone)]
pub struct JoinRoomParams {
    pub sender: Address,
    pub room_id: ObjectId,
    pub vault_id: ObjectId,
    /// Stablecoin object the first deposit is split from.
    pub payment_coin: ObjectId,
    pub deposit_amount: u64,
    /// Plaintext password for private rooms.
    pub password: Option<String>,
}

/// Parameters for a periodic deposit.
#[derive(Debug, Clone)]
pub struct DepositParams {
    pub sender: Address,
    pub room_id: ObjectId,
    pub vault_id: ObjectId,
    pub position_id: ObjectId,
    pub payment_coin: ObjectId,
    pub amount: u64,
}

/// Parameters for claiming principal and yield.
#[derive(Debug, Clone)]
pub struct ClaimParams {
    pub sender: Address,
    pub room_id: ObjectId,
    pub vault_id: ObjectId,
    pub position_id: ObjectId,
}

/// Transaction builder for room operations.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    contract: ContractRef,
    gas_budget: u64,
}

impl TxBuilder {
    /// Create a new transaction builder.
    pub fn new(contract: ContractRef, gas_budget: u64) -> Self {
        Self {
            contract,
            gas_budget,
        }
    }

    /// Create a builder from chain configuration.
    pub fn from_config(config: &ChainConfig) -> TxBuildResult<Self> {
        Ok(Self::new(ContractRef::from_config(config)?, config.gas_budget))
    }

    pub fn contract(&self) -> &ContractRef {
        &self.contract
    }

    fn move_call(&self, function: &str, arguments: Vec<Argument>) -> Command {
        Command::MoveCall(Box::new(MoveCall {
            package: self.contract.package_id,
            module: self.contract.module.clone(),
            function: function.to_string(),
            type_arguments: vec![self.contract.coin_type.clone()],
            arguments,
        }))
    }

    fn clock(&self, ptb: &mut PtbBuilder) -> Argument {
        ptb.object(ObjectArg::Shared {
            id: self.contract.clock_id,
            mutable: false,
        })
    }

    fn finish(&self, sender: Address, ptb: PtbBuilder) -> UnsignedTransaction {
        UnsignedTransaction {
            sender,
            kind: ptb.finish(),
            gas_budget: self.gas_budget,
        }
    }

    /// Build a `join_room` transaction.
    ///
    /// The first deposit is split from `payment_coin`. A password, when
    /// given, is embedded as its SHA-256 digest; public rooms pass an empty
    /// vector.
    pub fn join_room(&self, params: &JoinRoomParams) -> TxBuildResult<UnsignedTransaction> {
        if params.deposit_amount == 0 {
            return Err(TxBuildError::ZeroAmount);
        }
        let password_hash: Vec<u8> = match params.password.as_deref() {
            Some("") => return Err(TxBuildError::EmptyPassword),
            Some(pw) => hash_password(pw).to_vec(),
            None => Vec::new(),
        };

        let mut ptb = PtbBuilder::default();
        let room = ptb.object(ObjectArg::Shared {
            id: params.room_id,
            mutable: true,
        });
        let vault = ptb.object(ObjectArg::Shared {
            id: params.vault_id,
            mutable: true,
        });
        let clock = self.clock(&mut ptb);
        let coin = ptb.object(ObjectArg::Owned(params.payment_coin));
        let amount = ptb.pure(&params.deposit_amount)?;
        let hash = ptb.pure(&password_hash)?;

        let split = ptb.command(Command::SplitCoins(coin, vec![amount]));
        let deposit_coin = match split {
            Argument::Result(idx) => Argument::NestedResult(idx, 0),
            other => other,
        };
        ptb.command(self.move_call("join_room", vec![room, vault, clock, deposit_coin, hash]));

        Ok(self.finish(params.sender, ptb))
    }

    /// Build a periodic `deposit` transaction.
    pub fn deposit(&self, params: &DepositParams) -> TxBuildResult<UnsignedTransaction> {
        if params.amount == 0 {
            return Err(TxBuildError::ZeroAmount);
        }

        let mut ptb = PtbBuilder::default();
        let room = ptb.object(ObjectArg::Shared {
            id: params.room_id,
            mutable: true,
        });
        let vault = ptb.object(ObjectArg::Shared {
            id: params.vault_id,
            mutable: true,
        });
        let position = ptb.object(ObjectArg::Owned(params.position_id));
        let clock = self.clock(&mut ptb);
        let coin = ptb.object(ObjectArg::Owned(params.payment_coin));
        let amount = ptb.pure(&params.amount)?;

        let split = ptb.command(Command::SplitCoins(coin, vec![amount]));
        let deposit_coin = match split {
            Argument::Result(idx) => Argument::NestedResult(idx, 0),
            other => other,
        };
        ptb.command(self.move_call("deposit", vec![room, vault, position, clock, deposit_coin]));

        Ok(self.finish(params.sender, ptb))
    }

    /// Build a `claim_all` transaction returning principal and yield share.
    pub fn claim(&self, params: &ClaimParams) -> TxBuildResult<UnsignedTransaction> {
        let mut ptb = PtbBuilder::default();
        let room = ptb.object(ObjectArg::Shared {
            id: params.room_id,
            mutable: true,
        });
        let vault = ptb.object(ObjectArg::Shared {
            id: params.vault_id,
            mutable: true,
        });
        let position = ptb.object(ObjectArg::Owned(params.position_id));
        let clock = self.clock(&mut ptb);
        ptb.command(self.move_call("claim_all", vec![room, vault, position, clock]));

        Ok(self.finish(params.sender, ptb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> TxBuilder {
        let config = ChainConfig {
            package_id: "0xabc".to_string(),
            usdc_type: "0xabc::usdc::USDC".to_string(),
            ..ChainConfig::default()
        };
        TxBuilder::from_config(&config).unwrap()
    }

    fn id(n: u8) -> ObjectId {
        ObjectId::from_bytes([n; 32])
    }

    fn join_params(password: Option<&str>) -> JoinRoomParams {
        JoinRoomParams {
            sender: Address::from_bytes([9; 32]),
            room_id: id(1),
            vault_id: id(2),
            payment_coin: id(3),
            deposit_amount: 10_000_000,
            password: password.map(str::to_string),
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_private_join_embeds_hash_not_plaintext() {
        let tx = builder().join_room(&join_params(Some("mypassword"))).unwrap();
        let bytes = tx.to_bytes().unwrap();
        assert!(!contains(&bytes, b"mypassword"));
        assert!(contains(&bytes, &hash_password("mypassword")));

        let expected = bcs::to_bytes(&hash_password("mypassword").to_vec()).unwrap();
        assert!(tx.kind.inputs.contains(&CallArg::Pure(expected)));
    }

    #[test]
    fn test_public_join_embeds_empty_vector() {
        let tx = builder().join_room(&join_params(None)).unwrap();
        let empty = bcs::to_bytes(&Vec::<u8>::new()).unwrap();
        assert!(tx.kind.inputs.contains(&CallArg::Pure(empty)));
    }

    #[test]
    fn test_join_rejects_empty_password_and_zero_amount() {
        assert_eq!(
            builder().join_room(&join_params(Some(""))).unwrap_err(),
            TxBuildError::EmptyPassword
        );
        let mut params = join_params(None);
        params.deposit_amount = 0;
        assert_eq!(builder().join_room(&params).unwrap_err(), TxBuildError::ZeroAmount);
    }

    #[test]
    fn test_join_call_shape() {
        let tx = builder().join_room(&join_params(None)).unwrap();
        assert_eq!(tx.kind.commands.len(), 2);
        assert!(matches!(tx.kind.commands[0], Command::SplitCoins(_, _)));
        let call = tx.move_calls().next().unwrap();
        assert_eq!(call.module, "money_race");
        assert_eq!(call.function, "join_room");
        assert_eq!(call.type_arguments[0].name, "USDC");
        assert_eq!(call.arguments[3], Argument::NestedResult(0, 0));
        assert_eq!(tx.gas_budget, ChainConfig::default().gas_budget);
    }

    #[test]
    fn test_deposit_and_claim() {
        let b = builder();
        let deposit = b
            .deposit(&DepositParams {
                sender: Address::from_bytes([9; 32]),
                room_id: id(1),
                vault_id: id(2),
                position_id: id(4),
                payment_coin: id(3),
                amount: 5,
            })
            .unwrap();
        assert_eq!(deposit.move_calls().next().unwrap().function, "deposit");
        assert!(deposit
            .kind
            .inputs
            .contains(&CallArg::Object(ObjectArg::Owned(id(4)))));

        let claim = b
            .claim(&ClaimParams {
                sender: Address::from_bytes([9; 32]),
                room_id: id(1),
                vault_id: id(2),
                position_id: id(4),
            })
            .unwrap();
        assert_eq!(claim.kind.commands.len(), 1);
        assert_eq!(claim.move_calls().next().unwrap().function, "claim_all");
    }

    #[test]
    fn test_duplicate_objects_share_one_input() {
        let mut params = join_params(None);
        params.vault_id = params.room_id;
        let tx = builder().join_room(&params).unwrap();
        let call = tx.move_calls().next().unwrap();
        assert_eq!(call.arguments[0], call.arguments[1]);
    }

    #[test]
    fn test_builds_are_deterministic() {
        let a = builder().join_room(&join_params(Some("pw"))).unwrap();
        let b = builder().join_room(&join_params(Some("pw"))).unwrap();
        assert_eq!(a.to_base64().unwrap(), b.to_base64().unwrap());
    }

    #[test]
    fn test_missing_package_is_reported() {
        let err = TxBuilder::from_config(&ChainConfig::default()).unwrap_err();
        assert!(matches!(err, TxBuildError::InvalidContract(_)));
    }
}
