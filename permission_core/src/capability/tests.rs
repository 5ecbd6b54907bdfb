use super::*;
use crate::config::PlatformConfig;

const SETS: [CapabilitySet; 8] = [
    CapabilitySet::empty(),
    CapabilitySet::IMAGES,
    CapabilitySet::VIDEO,
    CapabilitySet::AUDIO,
    CapabilitySet::IMAGES.union(CapabilitySet::VIDEO),
    CapabilitySet::IMAGES.union(CapabilitySet::AUDIO),
    CapabilitySet::VIDEO.union(CapabilitySet::AUDIO),
    CapabilitySet::ALL_MEDIA,
];

fn platform(level: u32) -> Platform {
    Platform::new(PlatformConfig::with_level(level)).unwrap()
}

#[test]
fn test_union_is_commutative_and_idempotent() {
    for a in SETS {
        assert_eq!(a.union(a), a);
        for b in SETS {
            assert_eq!(a.union(b), b.union(a));
            assert_eq!(a | b, a.union(b));
        }
    }
}

#[test]
fn test_union_is_associative() {
    for a in SETS {
        for b in SETS {
            for c in SETS {
                assert_eq!(a.union(b).union(c), a.union(b.union(c)));
            }
        }
    }
}

#[test]
fn test_bits_match_categories() {
    assert_eq!(CapabilitySet::IMAGES.bits(), 1);
    assert_eq!(CapabilitySet::VIDEO.bits(), 2);
    assert_eq!(CapabilitySet::AUDIO.bits(), 4);
    assert_eq!(CapabilitySet::ALL_MEDIA.bits(), 7);
}

#[test]
fn test_resolve_fine_grained() {
    let resolved = (CapabilitySet::IMAGES | CapabilitySet::VIDEO).resolve(&platform(33));
    let expected: PermissionSet = [
        "android.permission.READ_MEDIA_IMAGES".to_string(),
        "android.permission.READ_MEDIA_VIDEO".to_string(),
    ]
    .into_iter()
    .collect();
    assert_eq!(resolved, expected);
}

#[test]
fn test_resolve_legacy_collapses_to_one_identifier() {
    let resolved = (CapabilitySet::IMAGES | CapabilitySet::VIDEO).resolve(&platform(32));
    assert_eq!(resolved.len(), 1);
    assert!(resolved.contains("android.permission.READ_EXTERNAL_STORAGE"));

    let all = CapabilitySet::ALL_MEDIA.resolve(&platform(21));
    assert_eq!(all, resolved);
}

#[test]
fn test_resolve_empty_set_is_empty_everywhere() {
    assert!(CapabilitySet::empty().resolve(&platform(34)).is_empty());
    assert!(CapabilitySet::empty().resolve(&platform(26)).is_empty());
}

#[test]
fn test_resolve_uses_configured_identifiers() {
    let mut config = PlatformConfig::with_level(40);
    config.identifiers.audio = "custom.AUDIO".to_string();
    let platform = Platform::new(config).unwrap();

    let resolved = CapabilitySet::AUDIO.resolve(&platform);
    assert_eq!(resolved.into_iter().collect::<Vec<_>>(), vec!["custom.AUDIO"]);
}

#[test]
fn test_parse_and_display() {
    assert_eq!(
        "Images+Video".parse::<CapabilitySet>().unwrap(),
        CapabilitySet::IMAGES | CapabilitySet::VIDEO
    );
    assert_eq!(
        "audio, image".parse::<CapabilitySet>().unwrap(),
        CapabilitySet::IMAGES | CapabilitySet::AUDIO
    );
    assert_eq!("all".parse::<CapabilitySet>().unwrap(), CapabilitySet::ALL_MEDIA);
    assert!(matches!(
        "images+documents".parse::<CapabilitySet>(),
        Err(ConfigError::UnknownCategory(name)) if name == "documents"
    ));

    assert_eq!(CapabilitySet::ALL_MEDIA.to_string(), "images+video+audio");
    assert_eq!(CapabilitySet::empty().to_string(), "none");
}
