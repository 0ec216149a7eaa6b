use crypto_threading::{
    core::library::version_at_least, Algorithm, MacAlgorithm, Registrar, SoftwareLibrary,
};
use once_cell::sync::Lazy;
use proptest::prelude::*;

static REGISTRAR: Lazy<Registrar<SoftwareLibrary>> =
    Lazy::new(|| Registrar::new(SoftwareLibrary::new()));

// Strategy for generating supported digest algorithms
fn sha2_algorithms() -> impl Strategy<Value = Algorithm> {
    prop_oneof![
        Just(Algorithm::Sha224),
        Just(Algorithm::Sha256),
        Just(Algorithm::Sha384),
        Just(Algorithm::Sha512),
    ]
}

fn hmac_algorithms() -> impl Strategy<Value = MacAlgorithm> {
    prop_oneof![
        Just(MacAlgorithm::HmacSha224),
        Just(MacAlgorithm::HmacSha256),
        Just(MacAlgorithm::HmacSha384),
        Just(MacAlgorithm::HmacSha512),
    ]
}

// Strategy for generating input plus chunk boundaries inside it
fn chunked_data() -> impl Strategy<Value = (Vec<u8>, Vec<usize>)> {
    prop::collection::vec(any::<u8>(), 0..2000).prop_flat_map(|data| {
        let len = data.len();
        (Just(data), prop::collection::vec(0..=len, 0..8))
    })
}

// Strategy for dotted numeric versions
fn versions() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0..50u32, 1..4)
}

fn dotted(parts: &[u32]) -> String {
    parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(".")
}

fn split_points(len: usize, mut cuts: Vec<usize>) -> Vec<(usize, usize)> {
    cuts.push(0);
    cuts.push(len);
    cuts.sort_unstable();
    cuts.dedup();
    cuts.windows(2).map(|w| (w[0], w[1])).collect()
}

proptest! {
    #[test]
    fn test_streamed_digest_matches_one_shot(
        algo in sha2_algorithms(),
        (data, cuts) in chunked_data(),
    ) {
        let crypto = REGISTRAR.handle_or_init().unwrap();
        let expected = crypto.hash(algo, &data).unwrap();
        prop_assert_eq!(expected.len(), algo.digest_len());

        let mut digest = crypto.digest(algo).unwrap();
        for (start, end) in split_points(data.len(), cuts) {
            digest.update(&data[start..end]).unwrap();
        }
        prop_assert_eq!(digest.finish().unwrap(), expected);
    }

    #[test]
    fn test_streamed_mac_verifies(
        algo in hmac_algorithms(),
        key in prop::collection::vec(any::<u8>(), 1..200),
        (data, cuts) in chunked_data(),
    ) {
        let crypto = REGISTRAR.handle_or_init().unwrap();

        let mut one_shot = crypto.mac(algo, &key).unwrap();
        one_shot.update(&data).unwrap();
        let tag = one_shot.finish().unwrap();
        prop_assert_eq!(tag.len(), algo.mac_len());

        let mut streamed = crypto.mac(algo, &key).unwrap();
        for (start, end) in split_points(data.len(), cuts) {
            streamed.update(&data[start..end]).unwrap();
        }
        prop_assert!(streamed.verify(&tag).unwrap());
    }

    #[test]
    fn test_version_is_at_least_itself(version in versions()) {
        let v = dotted(&version);
        prop_assert!(version_at_least(&v, &v));

        // Trailing zero components do not change the ordering
        let padded = format!("{}.0", v);
        prop_assert!(version_at_least(&padded, &v));
        prop_assert!(version_at_least(&v, &padded));
    }

    #[test]
    fn test_version_ordering_matches_numeric_ordering(a in versions(), b in versions()) {
        let pad = |v: &[u32]| {
            let mut v = v.to_vec();
            v.resize(4, 0);
            v
        };
        let (va, vb) = (dotted(&a), dotted(&b));
        prop_assert_eq!(version_at_least(&va, &vb), pad(&a) >= pad(&b));
    }

    #[test]
    fn test_random_bytes_length(len in 0..4096usize) {
        let crypto = REGISTRAR.handle_or_init().unwrap();
        let bytes = crypto.random_bytes(len, Default::default()).unwrap();
        prop_assert_eq!(bytes.len(), len);
    }
}
