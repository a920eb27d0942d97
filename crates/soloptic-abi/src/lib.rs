// SPDX-License-Identifier: AGPL-3.0

//! Contract interface descriptions, argument synthesis and calldata encoding

pub mod synth;
pub mod types;

pub use synth::{payable_value, synthesize_args, synthesize_call_args, synthesize_value};
pub use types::{parse_type, AbiParam, ParamType};

use ethers::abi::{encode, Token};
use ethers::types::{H160, I256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use soloptic_constants::{SEED_FUNCTION_NAME, WITHDRAW_NAME_FRAGMENT};
use soloptic_exceptions::{SolopticException, SolopticResult};
use soloptic_hashes::function_selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateMutability {
    Pure,
    View,
    #[default]
    NonPayable,
    Payable,
}

/// An invocable entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiFunction {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default)]
    pub state_mutability: StateMutability,
    /// Pre-0.5 compilers only emit this flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payable: Option<bool>,
}

impl AbiFunction {
    pub fn new(name: &str, inputs: Vec<AbiParam>, state_mutability: StateMutability) -> Self {
        Self {
            name: name.to_string(),
            inputs,
            outputs: Vec::new(),
            state_mutability,
            payable: None,
        }
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`
    pub fn signature(&self) -> SolopticResult<String> {
        let types = self
            .inputs
            .iter()
            .map(|p| p.param_type().map(|t| t.canonical()))
            .collect::<SolopticResult<Vec<_>>>()?;
        Ok(format!("{}({})", self.name, types.join(",")))
    }

    pub fn selector(&self) -> SolopticResult<[u8; 4]> {
        Ok(function_selector(&self.signature()?))
    }

    pub fn is_payable(&self) -> bool {
        self.state_mutability == StateMutability::Payable || self.payable == Some(true)
    }

    /// Name suggests a withdrawal and the first input is an unsigned amount
    pub fn looks_like_withdrawal(&self) -> bool {
        self.name.to_lowercase().contains(WITHDRAW_NAME_FRAGMENT)
            && self
                .inputs
                .first()
                .and_then(|p| p.param_type().ok())
                .is_some_and(|t| t.is_unsigned_int())
    }

    /// Zero-argument payable `deposit()` used to seed contract state
    pub fn is_seed_deposit(&self) -> bool {
        self.name == SEED_FUNCTION_NAME && self.inputs.is_empty() && self.is_payable()
    }
}

/// Every `function` entry of an interface description, in declaration order
pub fn parse_abi(abi: &Value) -> SolopticResult<Vec<AbiFunction>> {
    let entries = abi
        .as_array()
        .ok_or_else(|| SolopticException::Internal("ABI is not an array".to_string()))?;

    entries
        .iter()
        .filter(|entry| entry.get("type").and_then(|t| t.as_str()) == Some("function"))
        .map(|entry| {
            serde_json::from_value(entry.clone())
                .map_err(|e| SolopticException::Internal(format!("Invalid ABI entry: {}", e)))
        })
        .collect()
}

/// Find the seeding entry point, if the contract has one
pub fn find_seed_deposit(functions: &[AbiFunction]) -> Option<&AbiFunction> {
    functions.iter().find(|f| f.is_seed_deposit())
}

/// A synthesized argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Uint(u64),
    Int(i64),
    Address([u8; 20]),
    Bool(bool),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    String(String),
    Array(Vec<ArgValue>),
    /// Type-correct zero for types we do not randomize
    Zero(ParamType),
}

impl ArgValue {
    pub fn to_token(&self) -> Token {
        match self {
            ArgValue::Uint(v) => Token::Uint(U256::from(*v)),
            ArgValue::Int(v) => Token::Int(I256::from(*v).into_raw()),
            ArgValue::Address(a) => Token::Address(H160::from(*a)),
            ArgValue::Bool(b) => Token::Bool(*b),
            ArgValue::Bytes(b) => Token::Bytes(b.clone()),
            ArgValue::FixedBytes(b) => Token::FixedBytes(b.clone()),
            ArgValue::String(s) => Token::String(s.clone()),
            ArgValue::Array(items) => Token::Array(items.iter().map(|i| i.to_token()).collect()),
            ArgValue::Zero(ty) => zero_token(ty),
        }
    }
}

/// Zero value for a type
pub fn zero_token(ty: &ParamType) -> Token {
    match ty {
        ParamType::Uint(_) | ParamType::Unsupported(_) => Token::Uint(U256::zero()),
        ParamType::Int(_) => Token::Int(U256::zero()),
        ParamType::Address => Token::Address(H160::zero()),
        ParamType::Bool => Token::Bool(false),
        ParamType::FixedBytes(n) => Token::FixedBytes(vec![0; *n]),
        ParamType::Bytes => Token::Bytes(Vec::new()),
        ParamType::String => Token::String(String::new()),
        ParamType::Array(_) => Token::Array(Vec::new()),
        ParamType::FixedArray(inner, n) => Token::FixedArray(vec![zero_token(inner); *n]),
        ParamType::Tuple(items) => Token::Tuple(items.iter().map(zero_token).collect()),
    }
}

/// Selector followed by the ABI-encoded arguments
pub fn encode_call(function: &AbiFunction, args: &[ArgValue]) -> SolopticResult<Vec<u8>> {
    if args.len() != function.inputs.len() {
        return Err(SolopticException::Internal(format!(
            "{} takes {} arguments, got {}",
            function.name,
            function.inputs.len(),
            args.len()
        )));
    }

    let tokens: Vec<Token> = args.iter().map(|a| a.to_token()).collect();
    let mut calldata = function.selector()?.to_vec();
    calldata.extend(encode(&tokens));
    Ok(calldata)
}
