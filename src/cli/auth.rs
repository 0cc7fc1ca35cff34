//! Storing and removing the access token

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::core::keyring::{CredentialStore, KEYRING_SERVICE};

pub fn run_auth(account: &str, credentials: &dyn CredentialStore) -> Result<(), Box<dyn Error>> {
    println!("🔐 streamchat token setup");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    print!("Enter the access token for '{account}': ");
    io::stdout().flush()?;

    let stdin = io::stdin();
    let token = read_token(&mut stdin.lock())?;
    store_token(credentials, account, &token)?;

    println!("✓ Token stored in the system keyring ({KEYRING_SERVICE}/{account})");
    Ok(())
}

pub fn run_deauth(account: &str, credentials: &dyn CredentialStore) -> Result<(), Box<dyn Error>> {
    if credentials.remove_token(account)? {
        println!("✓ Removed the stored token for '{account}'");
    } else {
        println!("No stored token for '{account}'");
    }
    Ok(())
}

pub fn read_token<R: BufRead>(input: &mut R) -> Result<String, Box<dyn Error>> {
    let mut token = String::new();
    input.read_line(&mut token)?;
    let token = token.trim();
    if token.is_empty() {
        return Err("Token cannot be empty".into());
    }
    Ok(token.to_string())
}

pub fn store_token(
    credentials: &dyn CredentialStore,
    account: &str,
    token: &str,
) -> Result<(), Box<dyn Error>> {
    credentials.store_token(account, token)?;
    Ok(())
}
