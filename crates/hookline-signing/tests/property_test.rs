//! Property-based tests for the signing primitives.
//!
//! Validates the core security invariants over arbitrary inputs: every
//! signed payload verifies against its own signature, any single-byte
//! mutation breaks verification, and malformed signature input never
//! panics.

use hookline_signing::{sign, verify_api_key, verify_signature};
use proptest::prelude::*;

fn secret_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,64}"
}

proptest! {
    #[test]
    fn signature_round_trips_for_any_payload(
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        secret in secret_strategy(),
    ) {
        let signature = sign(&payload, &secret);
        prop_assert!(verify_signature(&payload, &signature, &secret));
    }

    #[test]
    fn single_byte_mutation_breaks_signature(
        payload in prop::collection::vec(any::<u8>(), 1..1024),
        secret in secret_strategy(),
        index in any::<prop::sample::Index>(),
    ) {
        let signature = sign(&payload, &secret);

        let mut mutated = payload.clone();
        let position = index.index(mutated.len());
        mutated[position] ^= 0xff;

        prop_assert!(!verify_signature(&mutated, &signature, &secret));
    }

    #[test]
    fn different_secrets_never_cross_verify(
        payload in prop::collection::vec(any::<u8>(), 0..512),
        secret_a in secret_strategy(),
        secret_b in secret_strategy(),
    ) {
        prop_assume!(secret_a != secret_b);
        let signature = sign(&payload, &secret_a);
        prop_assert!(!verify_signature(&payload, &signature, &secret_b));
    }

    #[test]
    fn arbitrary_signature_input_never_panics(
        payload in prop::collection::vec(any::<u8>(), 0..256),
        signature in ".{0,128}",
        secret in secret_strategy(),
    ) {
        // Overwhelmingly likely to be invalid; the property under test is
        // that verification degrades to `false` instead of erroring.
        let _ = verify_signature(&payload, &signature, &secret);
    }

    #[test]
    fn api_key_comparison_is_reflexive(key in "[ -~]{0,64}") {
        prop_assert!(verify_api_key(&key, &key));
    }

    #[test]
    fn api_key_comparison_rejects_prefixes(key in "[ -~]{1,64}") {
        let extended = format!("{key}x");
        prop_assert!(!verify_api_key(&key, &extended));
        prop_assert!(!verify_api_key(&extended, &key));
    }
}
