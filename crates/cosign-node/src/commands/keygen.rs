//! Key generation

use anyhow::Result;
use cosign_effects::generate_identity;
use toml::{Table, Value};

/// Print a fresh identity for `signer` as a config snippet
pub fn run(signer: &str) -> Result<()> {
    let keys = generate_identity();

    let mut identity = Table::new();
    identity.insert("signer_id".into(), Value::String(signer.to_string()));
    identity.insert("signing_key".into(), Value::String(keys.signing_key));
    identity.insert("decryption_key".into(), Value::String(keys.decryption_key));

    let mut own = Table::new();
    own.insert("identity".into(), Value::Table(identity));

    println!("# keep secret: this node's configuration");
    print!("{}", toml::to_string(&own)?);
    println!();
    println!("# share: add to peers' [keyring]");
    println!("{signer} = \"{}\"", keys.verifying_key);
    println!();
    println!("# share: encryption recipient key for {signer}");
    println!("# {}", keys.recipient_key);
    Ok(())
}
