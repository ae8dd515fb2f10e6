//! # Message Content Demo
//!
//! Seals message text for a recipient and signs it, the way outgoing
//! messages are composed before they reach the request envelope.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example signing_demo
//! ```

use hushpost_core::crypto::RsaKeyPair;
use hushpost_core::protocol::{open_from_sender, seal_for_recipient, sign_content, verify_content};

fn main() -> hushpost_core::Result<()> {
    println!("=== HushPost Core: Message Content Demo ===\n");

    // Step 1: Two users
    println!("Step 1: Generating key pairs for Alice and Bob...");
    let alice = RsaKeyPair::generate()?;
    let bob = RsaKeyPair::generate()?;
    let alice_public = alice.public_key_base64()?;
    let bob_public = bob.public_key_base64()?;
    println!();

    // Step 2: Alice seals a message for Bob
    let text = "Meet at the north entrance. Bring the printed copy, not the file.";
    println!("Step 2: Alice seals {} bytes for Bob...", text.len());
    let sealed = seal_for_recipient(text, &bob_public)?;
    println!("  encrypted_content: {}...", &sealed[..40]);
    println!();

    // Step 3: Alice signs the sealed content
    println!("Step 3: Alice signs the sealed content (RSA PKCS#1 v1.5 / SHA-256)...");
    let signature = sign_content(&sealed, alice.private_key())?;
    println!("  signature: {}...", &signature[..40]);
    println!();

    // Step 4: Bob verifies and opens
    println!("Step 4: Bob verifies the signature and opens the content...");
    println!("  Signature valid: {}", verify_content(&sealed, &signature, &alice_public));
    println!("  Text: {}", open_from_sender(&sealed, bob.private_key())?);
    println!();

    // Step 5: Tampering
    println!("Step 5: Checking against the wrong sender key...");
    println!("  Signature valid: {}", verify_content(&sealed, &signature, &bob_public));
    match open_from_sender(&sealed, alice.private_key()) {
        Ok(_) => println!("  Alice could open Bob's message (unexpected)"),
        Err(e) => println!("  Alice cannot open it: {}", e),
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
