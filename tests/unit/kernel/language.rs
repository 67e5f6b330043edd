use super::*;
use std::path::Path;

#[test]
fn from_path_maps_supported_extensions() {
    let cases = [
        ("a.rs", Some(LanguageId::Rust)),
        ("a.go", Some(LanguageId::Go)),
        ("a.pyi", Some(LanguageId::Python)),
        ("a.mjs", Some(LanguageId::JavaScript)),
        ("a.jsx", Some(LanguageId::Jsx)),
        ("a.cts", Some(LanguageId::TypeScript)),
        ("a.tsx", Some(LanguageId::Tsx)),
        ("a.h", Some(LanguageId::Cpp)),
        ("a.java", Some(LanguageId::Java)),
        ("a.yml", Some(LanguageId::Yaml)),
        ("a.htm", Some(LanguageId::Html)),
        ("README.md", Some(LanguageId::Markdown)),
        ("run.zsh", Some(LanguageId::Bash)),
        ("q.sql", Some(LanguageId::Sql)),
        ("a.txt", None),
        ("Makefile", None),
    ];

    for (path, expected) in cases {
        assert_eq!(LanguageId::from_path(Path::new(path)), expected, "{path}");
    }
}

#[test]
fn extensions_round_trip_through_from_extension() {
    for language in LanguageId::ALL {
        for ext in language.extensions() {
            assert_eq!(LanguageId::from_extension(ext), Some(language), "{ext}");
        }
    }
}

#[test]
fn language_for_path_falls_back_to_plaintext() {
    assert_eq!(language_for_path(Path::new("src/main.rs")), "rust");
    assert_eq!(language_for_path(Path::new("app.tsx")), "typescriptreact");
    assert_eq!(language_for_path(Path::new("notes")), PLAINTEXT);
    assert_eq!(language_for_path(Path::new("data.bin")), PLAINTEXT);
}
