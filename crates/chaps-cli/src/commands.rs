use std::sync::Arc;

use anyhow::{bail, Context};
use chaps_crypto::KEY_SIZE;
use chaps_object::{DefaultChapsFactory, Object, SequentialHandleGenerator};
use chaps_pool::ObjectPool;
use chaps_store::{FileObjectStore, ObjectStore, StoreConfig, StoreStats};
use chaps_types::attributes::{attribute_name, CKA_LABEL};
use chaps_types::InternalBlobId;
use colored::Colorize;
use serde_json::json;
use zeroize::Zeroizing;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = store_config(&cli.store)?;
    match cli.command {
        Command::Info => cmd_info(&config, cli.format),
        Command::Internal(args) => cmd_internal(&config, args.id, cli.format),
        Command::List(args) => cmd_list(&config, args, cli.format),
        Command::Compact => cmd_compact(&config, cli.format),
    }
}

fn store_config(args: &StoreArgs) -> anyhow::Result<StoreConfig> {
    match (&args.config, &args.store) {
        (Some(path), _) => StoreConfig::load(path)
            .with_context(|| format!("loading store config {}", path.display())),
        (None, Some(path)) => Ok(StoreConfig::at(path)),
        (None, None) => Ok(StoreConfig::default()),
    }
}

fn open_store(config: &StoreConfig) -> anyhow::Result<FileObjectStore> {
    FileObjectStore::open(config)
        .with_context(|| format!("opening store {}", config.path.display()))
}

fn cmd_info(config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let stats = open_store(config)?.stats();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => print_stats(config, &stats),
    }
    Ok(())
}

fn print_stats(config: &StoreConfig, stats: &StoreStats) {
    println!("Store {}", config.path.display().to_string().bold());
    println!("  Internal blobs:  {}", stats.internal_blobs);
    println!("  Public objects:  {}", stats.public_objects);
    println!("  Private objects: {}", stats.private_objects);
    println!("  Next store id:   {}", stats.next_store_id);
    println!(
        "  Journal:         {} bytes, {} dead records",
        stats.journal_bytes, stats.dead_records
    );
}

fn cmd_internal(config: &StoreConfig, id: InternalBlobId, format: OutputFormat) -> anyhow::Result<()> {
    let blob = open_store(config)?.get_internal_blob(id)?;
    match format {
        OutputFormat::Json => {
            let value = json!({ "id": id.name(), "blob": blob.as_deref().map(hex::encode) });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => match blob {
            Some(blob) if blob.is_empty() => println!("{}: {}", id.name().bold(), "(empty)".dimmed()),
            Some(blob) => println!("{}: {}", id.name().bold(), hex::encode(blob)),
            None => println!("{}: {}", id.name().bold(), "(not set)".yellow()),
        },
    }
    Ok(())
}

fn parse_key(key_hex: &str) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    let key = Zeroizing::new(hex::decode(key_hex.trim()).context("key is not valid hex")?);
    if key.len() != KEY_SIZE {
        bail!("key must be {KEY_SIZE} bytes, got {}", key.len());
    }
    Ok(key)
}

fn describe(object: &Object) -> serde_json::Value {
    let attributes: Vec<String> = object
        .get_attribute_map()
        .keys()
        .map(|&attribute| attribute_name(attribute))
        .collect();
    json!({
        "handle": object.handle().get(),
        "store_id": object.store_id().map(|id| id.get()),
        "class": object.get_object_class(),
        "private": object.is_private(),
        "label": object.get_attribute_string(CKA_LABEL),
        "attributes": attributes,
    })
}

fn cmd_list(config: &StoreConfig, args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = args.key_hex.as_deref().map(parse_key).transpose()?;
    let pool = ObjectPool::new(
        Arc::new(DefaultChapsFactory),
        Arc::new(SequentialHandleGenerator::new()),
        Some(Box::new(open_store(config)?)),
    );
    pool.init()?;
    if let Some(key) = &key {
        pool.set_encryption_key(key)?;
    }

    let mut described = Vec::new();
    for object in pool.find(&Object::new())? {
        let object = object
            .read()
            .map_err(|_| anyhow::anyhow!("object lock poisoned"))?;
        described.push(describe(&object));
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&described)?),
        OutputFormat::Text => {
            if described.is_empty() {
                println!("No objects.");
            }
            for object in &described {
                let privacy = if object["private"] == true {
                    "private".red()
                } else {
                    "public".green()
                };
                println!(
                    "{} {} class={} {}",
                    format!("#{}", object["store_id"]).yellow(),
                    privacy,
                    object["class"],
                    object["label"].as_str().unwrap_or("").bold()
                );
                println!("    {}", object["attributes"].to_string().dimmed());
            }
            if key.is_none() {
                println!("{}", "Private objects hidden; pass --key-hex to list them.".dimmed());
            }
        }
    }
    Ok(())
}

fn cmd_compact(config: &StoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let before = store.stats();
    store.compact()?;
    let after = store.stats();
    match format {
        OutputFormat::Json => {
            let value = json!({ "before": before, "after": after });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => println!(
            "{} Compacted {}: {} -> {} bytes, {} dead records dropped",
            "✓".green().bold(),
            config.path.display(),
            before.journal_bytes,
            after.journal_bytes,
            before.dead_records
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaps_store::ObjectBlob;
    use chaps_types::attributes::CKA_PRIVATE;
    use std::path::PathBuf;

    #[test]
    fn key_must_be_32_hex_bytes() {
        assert_eq!(parse_key(&"00".repeat(32)).unwrap().len(), 32);
        assert!(parse_key("zz").is_err());
        assert!(parse_key("0011").is_err());
    }

    #[test]
    fn config_selection() {
        let dir = tempfile::tempdir().unwrap();
        let toml = dir.path().join("store.toml");
        std::fs::write(&toml, "path = \"/var/lib/chaps/db.journal\"\n").unwrap();

        let from_file = store_config(&StoreArgs { config: Some(toml), store: None }).unwrap();
        assert_eq!(from_file.path, PathBuf::from("/var/lib/chaps/db.journal"));

        let from_path = store_config(&StoreArgs {
            config: None,
            store: Some(PathBuf::from("x.journal")),
        })
        .unwrap();
        assert_eq!(from_path.path, PathBuf::from("x.journal"));

        let missing = store_config(&StoreArgs {
            config: Some(dir.path().join("missing.toml")),
            store: None,
        });
        assert!(missing.is_err());
    }

    #[test]
    fn describe_lists_names_not_values() {
        let mut object = Object::new();
        object.set_attribute_bool(CKA_PRIVATE, true);
        object.set_attribute_string(CKA_LABEL, "my key");
        let value = describe(&object);
        assert_eq!(value["private"], true);
        assert_eq!(value["label"], "my key");
        assert_eq!(value["attributes"], json!(["CKA_PRIVATE", "CKA_LABEL"]));
        assert!(value["store_id"].is_null());
    }

    #[test]
    fn commands_run_against_a_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::at(dir.path().join("db.journal"));
        {
            let mut store = FileObjectStore::open(&config).unwrap();
            store.set_encryption_key(&[0u8; 32]).unwrap();
            store
                .set_internal_blob(InternalBlobId::EncryptedAuthKey, &[0xde, 0xad])
                .unwrap();
            let mut object = Object::new();
            object.set_attribute_bool(CKA_PRIVATE, false);
            let blob = object.serialize().unwrap();
            store.insert_object_blob(&ObjectBlob::public(blob)).unwrap();
        }

        for format in [OutputFormat::Text, OutputFormat::Json] {
            cmd_info(&config, format).unwrap();
            cmd_internal(&config, InternalBlobId::EncryptedAuthKey, format).unwrap();
            cmd_internal(&config, InternalBlobId::AuthDataHash, format).unwrap();
            cmd_list(&config, ListArgs { key_hex: None }, format).unwrap();
            cmd_list(&config, ListArgs { key_hex: Some("00".repeat(32)) }, format).unwrap();
            cmd_compact(&config, format).unwrap();
        }
        assert!(cmd_list(&config, ListArgs { key_hex: Some("00".into()) }, OutputFormat::Text).is_err());
    }
}
