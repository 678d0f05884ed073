use std::collections::HashSet;
use std::path::Path;

fn main() {
    let schema_path = Path::new("ranks/default_ranks.json");
    validate_schema_file(schema_path);
    set_build_dependencies();
}

fn validate_schema_file(schema_path: &Path) {
    // Ensure the rank schema exists at build time
    assert!(
        schema_path.exists(),
        "\n\nRANK SCHEMA BUILD ERROR: File not found\n\
         Path: {}\n\
         Please create the rank schema file before building.\n",
        schema_path.display()
    );

    let contents = std::fs::read_to_string(schema_path).unwrap_or_else(|e| {
        panic!(
            "\n\nRANK SCHEMA BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            schema_path.display()
        );
    });

    let schema: serde_json::Value = serde_json::from_str(&contents).unwrap_or_else(|e| {
        panic!(
            "\n\nRANK SCHEMA BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            schema_path.display()
        );
    });

    validate_schema_structure(&schema);
}

fn validate_schema_structure(schema: &serde_json::Value) {
    assert!(
        schema.is_object(),
        "\n\nRANK SCHEMA BUILD ERROR: Root must be a JSON object\n\
         Got: {schema}\n"
    );

    let ranks = schema.get("ranks").unwrap_or_else(|| {
        panic!(
            "\n\nRANK SCHEMA BUILD ERROR: Missing 'ranks' field\n\
             The schema must have a top-level 'ranks' array.\n"
        );
    });

    let ranks = ranks.as_array().unwrap_or_else(|| {
        panic!(
            "\n\nRANK SCHEMA BUILD ERROR: 'ranks' must be an array\n\
             Got: {ranks}\n"
        );
    });

    assert!(
        !ranks.is_empty(),
        "\n\nRANK SCHEMA BUILD ERROR: 'ranks' must not be empty\n"
    );

    validate_rank_names(ranks);

    println!("cargo:warning=Validated rank schema: {} ranks", ranks.len());
}

fn validate_rank_names(ranks: &[serde_json::Value]) {
    let mut seen = HashSet::new();

    for (i, rank) in ranks.iter().enumerate() {
        let name = rank.as_str().unwrap_or_else(|| {
            panic!("\n\nRANK SCHEMA BUILD ERROR: Rank at index {i} is not a string\nGot: {rank}\n");
        });

        assert!(
            !name.trim().is_empty(),
            "\n\nRANK SCHEMA BUILD ERROR: Rank at index {i} is blank\n"
        );
        assert!(
            !name.eq_ignore_ascii_case("unranked"),
            "\n\nRANK SCHEMA BUILD ERROR: 'unranked' is reserved and cannot be listed (index {i})\n"
        );
        assert!(
            seen.insert(name.to_lowercase()),
            "\n\nRANK SCHEMA BUILD ERROR: Duplicate rank '{name}' at index {i}\n"
        );
    }
}

fn set_build_dependencies() {
    // Tell cargo to rerun if the schema changes
    println!("cargo:rerun-if-changed=ranks/default_ranks.json");

    // Tell cargo to rerun if build.rs changes
    println!("cargo:rerun-if-changed=build.rs");
}
