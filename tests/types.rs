// ABOUTME: Integration tests for type-safe identifiers and validated types.
// ABOUTME: Tests CIDs, artifact digests, mbus URL credentials, and the temp root.

use bosh_env::types::*;
use proptest::prelude::*;

mod cid_tests {
    use super::*;

    #[test]
    fn displays_raw_value() {
        let cid = VmCid::new("vm-1234");
        assert_eq!(cid.to_string(), "vm-1234");
        assert_eq!(cid.as_str(), "vm-1234");
        assert_eq!(format!("{cid:?}"), "Cid(\"vm-1234\")");
    }

    #[test]
    fn equal_by_value() {
        assert_eq!(DiskCid::new("d-1"), DiskCid::new(String::from("d-1")));
        assert_ne!(DiskCid::new("d-1"), DiskCid::new("d-2"));
    }

    #[test]
    fn serializes_as_plain_string() {
        let cid = StemcellCid::new("sc-1");
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, "\"sc-1\"");

        let back: StemcellCid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cid);
    }

    #[test]
    fn into_inner_returns_value() {
        assert_eq!(VmCid::new("vm-9").into_inner(), "vm-9");
    }
}

mod digest_tests {
    use super::*;

    // sha1("hello") and sha256("hello")
    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn bare_hex_is_sha1() {
        let digest = Digest::parse(HELLO_SHA1).unwrap();
        assert_eq!(digest.algorithm(), DigestAlgorithm::Sha1);
        assert_eq!(digest.hex(), HELLO_SHA1);
        assert_eq!(digest.to_string(), HELLO_SHA1);
    }

    #[test]
    fn prefixed_sha256() {
        let digest = Digest::parse(&format!("sha256:{HELLO_SHA256}")).unwrap();
        assert_eq!(digest.algorithm(), DigestAlgorithm::Sha256);
        assert_eq!(digest.to_string(), format!("sha256:{HELLO_SHA256}"));
    }

    #[test]
    fn explicit_sha1_prefix_displays_bare() {
        let digest = Digest::parse(&format!("sha1:{HELLO_SHA1}")).unwrap();
        assert_eq!(digest.to_string(), HELLO_SHA1);
    }

    #[test]
    fn uppercase_hex_is_normalized() {
        let digest = Digest::parse(&HELLO_SHA1.to_uppercase()).unwrap();
        assert_eq!(digest.hex(), HELLO_SHA1);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(Digest::parse("  "), Err(DigestError::Empty)));
        assert!(matches!(
            Digest::parse("md5:abc"),
            Err(DigestError::UnsupportedAlgorithm(a)) if a == "md5"
        ));
        assert!(matches!(Digest::parse("xyz"), Err(DigestError::NotHex(_))));
        assert!(matches!(Digest::parse("sha256:"), Err(DigestError::NotHex(_))));
    }

    #[test]
    fn matches_file_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("artifact.tgz");
        std::fs::write(&path, b"hello").unwrap();

        assert!(Digest::parse(HELLO_SHA1).unwrap().matches_file(&path).unwrap());
        assert!(
            Digest::parse(&format!("sha256:{HELLO_SHA256}"))
                .unwrap()
                .matches_file(&path)
                .unwrap()
        );
        assert!(
            !Digest::parse("0000000000000000000000000000000000000000")
                .unwrap()
                .matches_file(&path)
                .unwrap()
        );
    }

    #[test]
    fn of_file_missing_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Digest::of_file(DigestAlgorithm::Sha1, &tmp.path().join("nope")).is_err());
    }

    #[test]
    fn sha256_hex_of_bytes() {
        assert_eq!(sha256_hex(b"hello"), HELLO_SHA256);
    }

    proptest! {
        #[test]
        fn any_hex_string_parses_as_sha1(hex in "[0-9a-fA-F]{1,64}") {
            let digest = Digest::parse(&hex).unwrap();
            prop_assert_eq!(digest.algorithm(), DigestAlgorithm::Sha1);
            prop_assert_eq!(digest.hex(), hex.to_ascii_lowercase());
        }
    }
}

mod mbus_tests {
    use super::*;

    #[test]
    fn credentials_are_split_off() {
        let mbus = MbusUrl::parse("https://mbus:pw@10.0.0.6:6868").unwrap();
        assert_eq!(mbus.username.as_deref(), Some("mbus"));
        assert_eq!(mbus.password.as_deref(), Some("pw"));
        assert!(!mbus.url.as_str().contains("pw"));
        assert_eq!(mbus.join("/blobs/x"), "https://10.0.0.6:6868/blobs/x");
    }

    #[test]
    fn username_without_password() {
        let mbus = MbusUrl::parse("https://mbus@10.0.0.6:6868").unwrap();
        assert_eq!(mbus.username.as_deref(), Some("mbus"));
        assert!(mbus.password.is_none());
    }

    #[test]
    fn rejects_unparseable_url() {
        assert!(MbusUrl::parse("not a url").is_err());
    }
}

mod temp_root_tests {
    use super::*;

    #[test]
    fn create_makes_missing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let root = TempRoot::create(tmp.path().join("a").join("b")).unwrap();
        assert!(root.path().is_dir());

        let dir = root.new_dir("stemcell").unwrap();
        assert!(
            dir.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("stemcell-")
        );
    }
}

mod uuid_tests {
    use super::*;

    #[test]
    fn generator_is_usable_as_trait_object() {
        let generator: std::sync::Arc<dyn UuidGenerator> = std::sync::Arc::new(RandomUuidGenerator);
        assert_ne!(generator.generate(), generator.generate());
    }
}
