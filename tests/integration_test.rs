use crypto_threading::{
    Algorithm, CipherAlgorithm, Error, ErrorCode, KdfParams, LibraryInitState, MacAlgorithm,
    RandomLevel, Result,
};
use std::io::Write;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[test]
fn test_full_library_flow() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    println!("Testing memory guard before initialization...");
    assert!(crypto_threading::enable_memory_guard());

    println!("Testing initialization...");
    let crypto = crypto_threading::init(|x| {
        assert!(x.check_version("1.6"));
        x.disable_secmem().enable_secure_rndpool();
        x.run_self_tests()?;
        Ok(())
    })?;
    assert_eq!(crypto_threading::state(), LibraryInitState::Initialized);
    assert!(!crypto.is_fips_mode_active());
    assert!(crypto.check_version(crypto_threading::MIN_VERSION));
    assert!(!crypto.version().is_empty());

    println!("Testing repeated initialization...");
    let again = crypto_threading::init(|_| panic!("registration body ran twice"))?;
    assert_eq!(again.version(), crypto.version());
    assert!(!crypto_threading::enable_memory_guard());
    assert!(crypto_threading::registrar().library().is_memory_guard_enabled());

    println!("Testing digests...");
    let cases: [(Algorithm, &str); 4] = [
        (Algorithm::Sha224, "23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7"),
        (Algorithm::Sha256, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"),
        (
            Algorithm::Sha384,
            "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed8086072ba1e7cc2358baeca134c825a7",
        ),
        (
            Algorithm::Sha512,
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f",
        ),
    ];
    for (algo, expected) in cases {
        assert_eq!(to_hex(&crypto.hash(algo, b"abc")?), expected, "{}", algo);
    }

    let mut digest = crypto.digest(Algorithm::Sha256)?;
    for chunk in [b"a", b"b", b"c"] {
        digest.write_all(chunk)?;
    }
    assert_eq!(digest.finish()?, crypto.hash(Algorithm::Sha256, b"abc")?);

    println!("Testing MACs...");
    let mut mac = crypto.mac(MacAlgorithm::HmacSha256, b"Jefe")?;
    mac.update(b"what do ya want for nothing?")?;
    assert_eq!(
        to_hex(&mac.finish()?),
        "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
    );

    println!("Testing key derivation...");
    let mut key = [0u8; 32];
    crypto.derive(
        &KdfParams::pbkdf2(Algorithm::Sha256, 4096, b"salt"),
        b"password",
        &mut key,
    )?;
    assert_eq!(
        to_hex(&key),
        "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
    );

    println!("Testing ciphers...");
    let mut cipher = crypto.cipher(CipherAlgorithm::ChaCha20Poly1305, &key)?;
    let nonce = crypto.random_bytes(CipherAlgorithm::ChaCha20Poly1305.nonce_len(), RandomLevel::Strong)?;
    let sealed = cipher.encrypt(&nonce, b"header", b"attack at dawn")?;
    assert_eq!(sealed.len(), 14 + CipherAlgorithm::ChaCha20Poly1305.tag_len());
    assert_eq!(cipher.decrypt(&nonce, b"header", &sealed)?, b"attack at dawn");
    match cipher.decrypt(&nonce, b"footer", &sealed) {
        Err(Error::Library(code)) => assert_eq!(code.code(), ErrorCode::CHECKSUM),
        other => panic!("unexpected: {:?}", other),
    }

    println!("Testing random bytes...");
    let a = crypto.random_bytes(32, RandomLevel::Strong)?;
    let b = crypto_threading::random_bytes(32, RandomLevel::VeryStrong)?;
    assert_eq!(a.len(), 32);
    assert_ne!(a, b);

    println!("Testing unsupported algorithms...");
    match crypto_threading::hash(Algorithm::Sha3_256, b"abc") {
        Err(Error::UnsupportedAlgorithm(name)) => assert_eq!(name, "SHA3-256"),
        other => panic!("unexpected: {:?}", other),
    }

    Ok(())
}
