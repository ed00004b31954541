use mangler::Options;

#[derive(Debug)]
struct Vector {
    name: String,
    input: Vec<u8>,
    mangled: Vec<u8>,
}

fn hex_to_bytes(s: &str) -> Vec<u8> {
    let s = s.trim();
    if s.is_empty() {
        return Vec::new();
    }
    assert!(
        s.len().is_multiple_of(2),
        "hex string must have even length"
    );
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

fn load_vectors() -> Vec<Vector> {
    let manifest = include_str!("vectors/manifest.tsv");
    manifest
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|line| {
            let parts: Vec<_> = line.split('|').collect();
            assert_eq!(parts.len(), 4, "invalid vector row: {line}");
            Vector {
                name: parts[0].to_string(),
                input: hex_to_bytes(parts[2]),
                mangled: hex_to_bytes(parts[3]),
            }
        })
        .collect()
}

#[test]
fn vector_database_is_non_empty() {
    let vectors = load_vectors();
    assert!(vectors.len() >= 10);
}

#[test]
fn mangle_matches_all_vectors() {
    for v in load_vectors() {
        let mangled = mangler::mangle(&v.input).unwrap();
        assert_eq!(mangled, v.mangled, "vector {}", v.name);
    }
}

#[test]
fn unmangle_all_vectors() {
    for v in load_vectors() {
        let decoded = mangler::unmangle(&v.mangled)
            .unwrap_or_else(|e| panic!("vector {}: {e}", v.name));
        assert_eq!(decoded, v.input, "vector {}", v.name);
        assert!(mangler::verify(&v.input, &v.mangled), "vector {}", v.name);
    }
}

#[test]
fn greedy_roundtrip_all_vectors() {
    let opts = Options {
        lookahead: false,
        ..Options::default()
    };
    for v in load_vectors() {
        let mangled = mangler::mangle_with_options(&v.input, &opts).unwrap();
        let decoded = mangler::unmangle(&mangled).unwrap();
        assert_eq!(decoded, v.input, "vector {}", v.name);
    }
}

#[test]
fn greedy_differs_only_where_lookahead_defers() {
    let opts = Options {
        lookahead: false,
        ..Options::default()
    };
    for v in load_vectors() {
        let greedy = mangler::mangle_with_options(&v.input, &opts).unwrap();
        if v.name == "lookahead_defer" {
            assert_ne!(greedy, v.mangled);
        } else {
            assert_eq!(greedy, v.mangled, "vector {}", v.name);
        }
    }
}
