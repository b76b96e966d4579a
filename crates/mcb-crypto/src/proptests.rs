#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::derive::tests::TEST_PARAMS;
    use crate::derive::DeriveStream;
    use crate::ecies;
    use crate::keys::Keypair;
    use crate::signature::{sign_bytes, verify_bytes};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Sign/verify round trip, and any single flipped byte breaks it
        #[test]
        fn test_signature_round_trip_and_tamper(
            payload in prop::collection::vec(any::<u8>(), 1..512),
            flip in any::<prop::sample::Index>(),
        ) {
            let kp = Keypair::generate();
            let sig = sign_bytes(kp.secret(), &payload).unwrap();
            prop_assert!(verify_bytes(kp.public(), &payload, &sig));

            let mut bad_payload = payload.clone();
            let i = flip.index(bad_payload.len());
            bad_payload[i] ^= 0x01;
            prop_assert!(!verify_bytes(kp.public(), &bad_payload, &sig));

            let mut sig_bytes = hex::decode(&sig).unwrap();
            let j = flip.index(sig_bytes.len());
            sig_bytes[j] ^= 0x01;
            prop_assert!(!verify_bytes(kp.public(), &payload, &hex::encode(sig_bytes)));
        }

        // ECIES recovers the exact plaintext for the matching key only
        #[test]
        fn test_ecies_round_trip(plaintext in prop::collection::vec(any::<u8>(), 0..1024)) {
            let kp = Keypair::generate();
            let ct = ecies::encrypt(kp.public(), &plaintext).unwrap();
            let recovered = ecies::decrypt(kp.secret(), &ct).unwrap();
            prop_assert_eq!(recovered.as_slice(), plaintext.as_slice());

            let other = Keypair::generate();
            prop_assert!(ecies::decrypt(other.secret(), &ct).is_err());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        // Reading N then M bytes equals reading N+M bytes from a fresh stream
        #[test]
        fn test_stream_extension(n in 0usize..96, m in 0usize..96) {
            let password = b"extension-property-pw";
            let mut whole = DeriveStream::new(password, &TEST_PARAMS).unwrap();
            let expected = whole.read(n + m).unwrap();

            let mut parts = DeriveStream::new(password, &TEST_PARAMS).unwrap();
            let mut got = parts.read(n).unwrap().to_vec();
            got.extend_from_slice(&parts.read(m).unwrap());

            prop_assert_eq!(got.as_slice(), expected.as_slice());
            prop_assert_eq!(parts.consumed(), n + m);
        }
    }
}
