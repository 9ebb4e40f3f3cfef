//! Basic usage example for `blindex`.

use blindex::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("blindex Basic Usage Example");
    println!("===========================\n");

    // In production the master key comes from BLIND_INDEX_MASTER_KEY or a key file
    let master_key = KeyMaterial::text(blindex::generate_key());
    let master = LazyMasterKey::new(master_key);

    let context = IndexContext::for_index("users", "email").with_version(2).build();
    println!("Index context: {context}");
    println!("  - Table: {}", context.table_name());
    println!("  - Column: {}\n", context.field_name());

    let email = IndexedField::new(
        context,
        FieldConfig::new()
            .with_algorithm(Algorithm::Argon2id)
            .with_size(16)
            .with_expression(|value| value.as_text().map(|text| text.trim().to_lowercase().into())),
        master,
    );

    let first = email.compute(Some("Alice@Example.com ".into()))?;
    let second = email.compute(Some("alice@example.com".into()))?;
    println!("Blind index 1: {:?}", first.as_ref().and_then(Digest::as_text));
    println!("Blind index 2: {:?}", second.as_ref().and_then(Digest::as_text));
    println!("Indexes match: {}\n", first == second);

    let raw = compute_blind_index(
        Some(Value::from(vec![0x01u8, 0x02, 0x03])),
        email.key_source(),
        &FieldConfig::new().with_algorithm(Algorithm::Pbkdf2Sha256).with_encode(false),
    )?;
    if let Some(digest) = raw {
        println!("Raw digest: {} bytes", digest.as_bytes().len());
    }

    println!("Null values are not indexed: {:?}", email.compute(None)?);
    Ok(())
}
