//! # Request Envelope Demo
//!
//! Walks one request through the sealed envelope used for every call to
//! the messaging server, playing both the client and the server.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example envelope_demo
//! ```

use hushpost_core::crypto::RsaKeyPair;
use hushpost_core::protocol::{open_request, seal_request, SealedEnvelope};

fn main() -> hushpost_core::Result<()> {
    println!("=== HushPost Core: Request Envelope Demo ===\n");

    // Step 1: The server's long-term key pair
    println!("Step 1: Generating the server's RSA-2048 key pair...");
    let server = RsaKeyPair::generate()?;
    println!("  Public key (base64 DER): {}...", &server.public_key_base64()?[..32]);
    println!();

    println!("  ┌─────────────────────────────────────────────────────────────┐");
    println!("  │                    ENVELOPE FLOW                            │");
    println!("  ├─────────────────────────────────────────────────────────────┤");
    println!("  │                                                             │");
    println!("  │  CLIENT:                                                   │");
    println!("  │    K = fresh 256-bit key                                   │");
    println!("  │    wrapped = RSA-OAEP(server public key, K)                │");
    println!("  │    (req, resp) = HKDF(K)                                   │");
    println!("  │    ciphertext = AES-GCM(req, record, aad = path)           │");
    println!("  │                                                             │");
    println!("  │  SERVER:                                                   │");
    println!("  │    K = RSA-OAEP-decrypt(wrapped)                           │");
    println!("  │    reply = AES-GCM(resp, answer, aad = path)               │");
    println!("  │                                                             │");
    println!("  └─────────────────────────────────────────────────────────────┘");
    println!();

    // Step 2: Client seals a request
    let path = b"/api/messages/send";
    let record = br#"{"id":"m-1","text":"","type":"direct"}"#;
    println!("Step 2: Sealing {} bytes for {}...", record.len(), String::from_utf8_lossy(path));
    let (wire, pending) = seal_request(record, server.public_key(), path)?;
    let envelope = SealedEnvelope::from_bytes(&wire)?;
    println!("  Envelope version: {}", envelope.version);
    println!("  Wrapped key:      {} bytes", envelope.wrapped_key.len());
    println!("  Ciphertext:       {} bytes", envelope.ciphertext.len());
    println!();

    // Step 3: Server opens it and answers
    println!("Step 3: Server opens the request and seals its answer...");
    let (opened, sealer) = open_request(&wire, server.private_key(), path)?;
    assert_eq!(opened, record);
    let answer = sealer.seal(br#"{"success":true}"#)?;
    println!("  Reply ciphertext: {} bytes", answer.len());
    println!();

    // Step 4: Client opens the reply
    println!("Step 4: Client opens the reply...");
    let reply = pending.open(&answer)?;
    println!("  Reply: {}", String::from_utf8_lossy(&reply));
    println!();

    // Step 5: A reply bound to another path is rejected
    println!("Step 5: Replaying the request against another path...");
    match open_request(&wire, server.private_key(), b"/api/login") {
        Ok(_) => println!("  Unexpectedly accepted"),
        Err(e) => println!("  Rejected: {}", e),
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
