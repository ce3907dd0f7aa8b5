// Tests for the digest registry

use delta::hash::{Algorithm, HashError, HashRegistry, Hasher};

#[test]
fn test_supported_algorithms_sorted_by_name() {
    let algorithms = HashRegistry::supported_algorithms(true);
    let names: Vec<&str> = algorithms.iter().map(|a| a.name()).collect();

    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert_eq!(names.first(), Some(&"blake2b"));
    assert_eq!(names.last(), Some(&"xxh3"));
}

#[test]
fn test_supported_algorithms_deterministic() {
    assert_eq!(
        HashRegistry::supported_algorithms(true),
        HashRegistry::supported_algorithms(true)
    );
}

#[test]
fn test_variable_length_excluded_by_default() {
    let fixed = HashRegistry::supported_algorithms(true);
    assert_eq!(fixed.len(), 15);
    assert!(!fixed.contains(&Algorithm::Shake128));
    assert!(!fixed.contains(&Algorithm::Shake256));

    let all = HashRegistry::supported_algorithms(false);
    assert_eq!(all.len(), 17);
    assert!(all.contains(&Algorithm::Shake128));
}

#[test]
fn test_parse_accepts_aliases() {
    assert_eq!("SHA-256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
    assert_eq!("sha3-512".parse::<Algorithm>().unwrap(), Algorithm::Sha3_512);
    assert_eq!("blake2b-512".parse::<Algorithm>().unwrap(), Algorithm::Blake2b);
    assert_eq!("shake128".parse::<Algorithm>().unwrap(), Algorithm::Shake128);
    assert_eq!(" md5 ".parse::<Algorithm>().unwrap(), Algorithm::Md5);
}

#[test]
fn test_parse_rejects_unknown() {
    match "crc32".parse::<Algorithm>() {
        Err(HashError::UnsupportedAlgorithm { algorithm }) => assert_eq!(algorithm, "crc32"),
        other => panic!("Expected UnsupportedAlgorithm, got {:?}", other),
    }
}

#[test]
fn test_name_round_trips_through_parse() {
    for alg in HashRegistry::supported_algorithms(false) {
        assert_eq!(alg.name().parse::<Algorithm>().unwrap(), alg);
    }
}

#[test]
fn test_known_vectors_for_abc() {
    let cases = [
        (Algorithm::Md5, "900150983cd24fb0d6963f7d28e17f72"),
        (Algorithm::Sha1, "a9993e364706816aba3e25717850c26c9cd0d89d"),
        (
            Algorithm::Sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        ),
        (
            Algorithm::Sha3_256,
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532",
        ),
        (
            Algorithm::Blake2s,
            "508c5e8c327c14e2e1a72ba34eeb452f37458b209ed63a294d999b4c86675982",
        ),
        (
            Algorithm::Shake128,
            "5881092dd818bf5cf8a3ddb793fbcba74097d5c526a6d35f97b83351940f2cc8",
        ),
    ];

    for (alg, expected) in cases {
        let mut hasher = HashRegistry::new_accumulator(alg);
        hasher.update(b"abc");
        assert_eq!(hasher.finalize_hex(), expected, "{}", alg);
    }
}

#[test]
fn test_incremental_updates_match_single_update() {
    for alg in HashRegistry::supported_algorithms(false) {
        let mut whole = HashRegistry::new_accumulator(alg);
        whole.update(b"The quick brown fox jumps over the lazy dog");

        let mut pieces = HashRegistry::new_accumulator(alg);
        pieces.update(b"The quick ");
        pieces.update(b"");
        pieces.update(b"brown fox jumps");
        pieces.update(b" over the lazy dog");

        assert_eq!(whole.finalize_hex(), pieces.finalize_hex(), "{}", alg);
    }
}

#[test]
fn test_accumulators_do_not_share_state() {
    let mut first = HashRegistry::new_accumulator(Algorithm::Sha256);
    let mut second = HashRegistry::new_accumulator(Algorithm::Sha256);
    first.update(b"left");
    second.update(b"right");
    assert_ne!(first.finalize_hex(), second.finalize_hex());
}

#[test]
fn test_get_hasher_by_name() {
    let hasher = HashRegistry::get_hasher("sha-512").unwrap();
    assert_eq!(hasher.output_size(), 64);
    assert!(HashRegistry::get_hasher("rot13").is_err());
}

#[test]
fn test_resolve_dedups_and_sorts() {
    let names = vec!["sha256".to_string(), "md5".to_string(), "SHA-256".to_string()];
    let resolved = HashRegistry::resolve(&names).unwrap();
    assert_eq!(resolved, vec![Algorithm::Md5, Algorithm::Sha256]);
}

#[test]
fn test_list_algorithms_marks_non_cryptographic() {
    let infos = HashRegistry::list_algorithms(true);
    let xxh3 = infos.iter().find(|i| i.name == "xxh3").unwrap();
    assert!(!xxh3.cryptographic);
    assert_eq!(xxh3.output_bits, 64);
    let sha256 = infos.iter().find(|i| i.name == "sha256").unwrap();
    assert!(sha256.cryptographic);
    assert_eq!(sha256.output_bits, 256);
}

#[test]
fn test_resolve_rejects_empty_list() {
    assert!(matches!(
        HashRegistry::resolve(&[]),
        Err(HashError::NoAlgorithms)
    ));
}
