// SPDX-License-Identifier: AGPL-3.0

//! Random argument synthesis
//!
//! Values stay small on purpose: the goal is calls that succeed and exercise
//! the common path, not boundary testing.

use crate::types::{AbiParam, ParamType};
use crate::{AbiFunction, ArgValue};
use rand::Rng;
use soloptic_constants::{
    MAX_PAYABLE_WEI, PAYABLE_STEP_WEI, RANDOM_BYTES_LEN, RANDOM_STRING_LEN, RANDOM_STRING_PREFIX,
    RANDOM_UINT_BOUND,
};
use soloptic_exceptions::SolopticResult;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Exclusive upper bound for a random integer of the given signedness and width
fn int_bound(signed: bool, bits: usize) -> u64 {
    let magnitude_bits = if signed { bits - 1 } else { bits };
    if magnitude_bits >= 64 {
        return RANDOM_UINT_BOUND;
    }
    RANDOM_UINT_BOUND.min(1u64 << magnitude_bits)
}

fn random_bytes<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.gen()).collect()
}

fn random_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut token = String::from(RANDOM_STRING_PREFIX);
    for _ in 0..RANDOM_STRING_LEN {
        token.push(TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char);
    }
    token
}

/// One value for a declared type
pub fn synthesize_value<R: Rng + ?Sized>(ty: &ParamType, caller: [u8; 20], rng: &mut R) -> ArgValue {
    match ty {
        ParamType::Uint(bits) => ArgValue::Uint(rng.gen_range(0..int_bound(false, *bits))),
        ParamType::Int(bits) => ArgValue::Int(rng.gen_range(0..int_bound(true, *bits)) as i64),
        ParamType::Address => ArgValue::Address(caller),
        ParamType::Bool => ArgValue::Bool(rng.gen_bool(0.5)),
        ParamType::FixedBytes(n) => {
            let mut bytes = random_bytes(rng, RANDOM_BYTES_LEN.min(*n));
            bytes.resize(*n, 0);
            ArgValue::FixedBytes(bytes)
        }
        ParamType::Bytes => ArgValue::Bytes(random_bytes(rng, RANDOM_BYTES_LEN)),
        ParamType::String => ArgValue::String(random_token(rng)),
        ParamType::Array(inner) => {
            let len = rng.gen_range(0..=1);
            ArgValue::Array(
                (0..len)
                    .map(|_| synthesize_value(inner, caller, rng))
                    .collect(),
            )
        }
        ParamType::FixedArray(..) | ParamType::Tuple(_) | ParamType::Unsupported(_) => {
            ArgValue::Zero(ty.clone())
        }
    }
}

/// One value per declared input
pub fn synthesize_args<R: Rng + ?Sized>(
    inputs: &[AbiParam],
    caller: [u8; 20],
    rng: &mut R,
) -> SolopticResult<Vec<ArgValue>> {
    inputs
        .iter()
        .map(|input| Ok(synthesize_value(&input.param_type()?, caller, rng)))
        .collect()
}

/// Arguments for one fuzz call, including the withdrawal heuristic
pub fn synthesize_call_args<R: Rng + ?Sized>(
    function: &AbiFunction,
    caller: [u8; 20],
    rng: &mut R,
) -> SolopticResult<Vec<ArgValue>> {
    let mut args = synthesize_args(&function.inputs, caller, rng)?;
    if function.looks_like_withdrawal() {
        if let (Some(first), Some(input)) = (args.first_mut(), function.inputs.first()) {
            if let ParamType::Uint(bits) = input.param_type()? {
                *first = ArgValue::Uint(rng.gen_range(0..int_bound(false, bits)));
            }
        }
    }
    Ok(args)
}

/// Value in wei for a payable call: [0, 1] ether at 10^-4 ether granularity
pub fn payable_value<R: Rng + ?Sized>(rng: &mut R) -> u128 {
    let steps = MAX_PAYABLE_WEI / PAYABLE_STEP_WEI;
    rng.gen_range(0..=steps) * PAYABLE_STEP_WEI
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateMutability;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const CALLER: [u8; 20] = [0xaa; 20];

    #[test]
    fn test_int_bounds() {
        assert_eq!(int_bound(false, 256), 1000);
        assert_eq!(int_bound(false, 8), 256);
        assert_eq!(int_bound(true, 8), 128);
        assert_eq!(int_bound(true, 16), 1000);
    }

    #[test]
    fn test_values_within_policy() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            match synthesize_value(&ParamType::Uint(256), CALLER, &mut rng) {
                ArgValue::Uint(v) => assert!(v < 1000),
                other => panic!("unexpected {:?}", other),
            }
            match synthesize_value(&ParamType::Uint(8), CALLER, &mut rng) {
                ArgValue::Uint(v) => assert!(v < 256),
                other => panic!("unexpected {:?}", other),
            }
            match synthesize_value(&ParamType::Int(8), CALLER, &mut rng) {
                ArgValue::Int(v) => assert!((0..128).contains(&v)),
                other => panic!("unexpected {:?}", other),
            }
            match synthesize_value(&ParamType::Array(Box::new(ParamType::Bool)), CALLER, &mut rng) {
                ArgValue::Array(items) => assert!(items.len() <= 1),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_fixed_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            synthesize_value(&ParamType::Address, CALLER, &mut rng),
            ArgValue::Address(CALLER)
        );

        match synthesize_value(&ParamType::FixedBytes(32), CALLER, &mut rng) {
            ArgValue::FixedBytes(b) => {
                assert_eq!(b.len(), 32);
                assert!(b[4..].iter().all(|x| *x == 0));
            }
            other => panic!("unexpected {:?}", other),
        }
        match synthesize_value(&ParamType::FixedBytes(2), CALLER, &mut rng) {
            ArgValue::FixedBytes(b) => assert_eq!(b.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        match synthesize_value(&ParamType::Bytes, CALLER, &mut rng) {
            ArgValue::Bytes(b) => assert_eq!(b.len(), 4),
            other => panic!("unexpected {:?}", other),
        }
        match synthesize_value(&ParamType::String, CALLER, &mut rng) {
            ArgValue::String(s) => {
                assert_eq!(s.len(), 10);
                assert!(s.starts_with("s_"));
                assert!(s[2..].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
            }
            other => panic!("unexpected {:?}", other),
        }

        let tuple = ParamType::Tuple(vec![ParamType::Bool]);
        assert_eq!(
            synthesize_value(&tuple, CALLER, &mut rng),
            ArgValue::Zero(tuple.clone())
        );
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let inputs = vec![
            AbiParam::new("a", "uint256"),
            AbiParam::new("b", "string"),
            AbiParam::new("c", "bool[]"),
        ];
        let first = synthesize_args(&inputs, CALLER, &mut StdRng::seed_from_u64(42)).unwrap();
        let second = synthesize_args(&inputs, CALLER, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_withdrawal_amount_respects_width() {
        let withdraw = AbiFunction::new(
            "withdraw",
            vec![AbiParam::new("amount", "uint8")],
            StateMutability::NonPayable,
        );
        assert!(withdraw.looks_like_withdrawal());

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            match synthesize_call_args(&withdraw, CALLER, &mut rng).unwrap().as_slice() {
                [ArgValue::Uint(v)] => assert!(*v < 256),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_payable_value() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let v = payable_value(&mut rng);
            assert!(v <= MAX_PAYABLE_WEI);
            assert_eq!(v % PAYABLE_STEP_WEI, 0);
        }
    }
}
